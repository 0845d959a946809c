//! DirectX 12 图形 API 实现模块
//!
//! 本模块包含了所有 DirectX 12 相关的代码，包括：
//! - `util`：原生调用的错误转换、资源屏障、默认缓冲区上传、着色器编译
//! - `device`：后端 trait 的 D3D12 实现（栅栏、队列、分配器、上传堆）
//! - `context`：设备、交换链、RTV/DSV 堆、深度缓冲和窗口大小改变
//! - `mesh`：GPU 上的顶点/索引缓冲区
//! - `texture`：纹理上传和 SRV 堆

pub mod context;
pub mod device;
pub mod mesh;
pub mod texture;
pub mod util;

pub use context::Dx12Context;
pub use device::{Dx12Allocator, Dx12Device, Dx12Fence, Dx12Queue, Dx12UploadMemory};
pub use mesh::{primitive_topology, MeshGeometry};
pub use texture::{SrvHeap, Texture};
