//! 图形后端模块
//!
//! 本模块封装了具体图形 API 的底层实现：
//! - `backend`：帧流水线依赖的统一 trait
//! - `software`：无窗口的模拟 GPU，测试和 `--headless` 使用
//! - `dx12`：DirectX 12 实现（仅 Windows）
//!
//! 所有后端都实现了 [`backend::GraphicsDevice`] 等 trait，
//! 帧资源环和栅栏协议因此不依赖具体的图形 API。

pub mod backend;
#[cfg(target_os = "windows")]
pub mod dx12;
pub mod software;

pub use backend::{CommandAllocator, CommandQueue, GpuFence, GraphicsDevice, MappedMemory};
#[cfg(target_os = "windows")]
pub use dx12::{Dx12Context, Dx12Device};
pub use software::{SoftwareDevice, SoftwareQueue};
