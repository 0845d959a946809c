//! 渲染器模块
//!
//! 与图形 API 无关的帧流水线核心：
//!
//! - `sync`：栅栏协议（signal / wait / flush）
//! - `resource`：持久映射的上传缓冲区
//! - `constants`：常量缓冲区布局
//! - `frame_resource`：帧资源环
//! - `scene`：渲染项、材质和脏帧计数
//! - `pipeline`：每帧的状态机
//! - `render_loop`：示例接口、暂停处理和帧统计
//!
//! 具体的 GPU 对象由 [`crate::gfx`] 中的后端提供。

pub mod constants;
pub mod frame_resource;
pub mod pipeline;
pub mod render_loop;
pub mod resource;
pub mod scene;
pub mod sync;

pub use frame_resource::{FrameResource, FrameResourceRing};
pub use pipeline::{FramePipeline, FrameState};
pub use render_loop::{FrameStats, RenderLoop, Sample, TickOutcome};
pub use resource::{BufferUsageType, UploadBuffer};
pub use sync::{Fence, FenceValue};
