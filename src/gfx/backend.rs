//! 图形后端的统一抽象接口
//!
//! 帧流水线只依赖这里的几个 trait：一个可由 GPU 推进的栅栏、一个能在已提交工作
//! 之后插入 signal 的命令队列、可重置的命令分配器以及持久映射的上传内存。
//! Direct3D 12 后端和软件后端各自实现它们。

use crate::core::error::Result;

/// GPU 栅栏
///
/// 完成值只会单调增加。
pub trait GpuFence {
    /// GPU 已经完成的栅栏值
    fn completed_value(&self) -> u64;

    /// 阻塞调用线程直到完成值 >= `value`
    ///
    /// 通过操作系统的等待原语实现，不轮询，也没有超时。
    fn wait_for(&self, value: u64) -> Result<()>;
}

/// 命令队列
pub trait CommandQueue {
    type Fence: GpuFence;

    /// 在队列中插入一条指令：之前的工作全部完成后把栅栏设置为 `value`
    fn signal(&self, fence: &Self::Fence, value: u64) -> Result<()>;
}

/// 命令分配器
pub trait CommandAllocator {
    /// 回收命令内存，调用前 GPU 必须已经执行完由它记录的命令
    fn reset(&self) -> Result<()>;
}

/// 持久映射的 CPU 可写、GPU 可读内存
///
/// 写入不做任何同步，调用者负责保证 GPU 已经读完要覆盖的区域。
pub trait MappedMemory {
    /// 字节大小
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 首字节的 GPU 虚拟地址
    fn gpu_address(&self) -> u64;

    /// 把 `data` 拷贝到 `offset` 处，越界时 panic
    fn write_bytes(&mut self, offset: usize, data: &[u8]);

    /// 从 `offset` 处读取 `out.len()` 个字节，越界时 panic
    fn read_bytes(&self, offset: usize, out: &mut [u8]);
}

/// 图形设备
///
/// 只包含帧资源需要的创建函数，其余设备功能由具体后端直接提供。
pub trait GraphicsDevice {
    type Fence: GpuFence;
    type Allocator: CommandAllocator;
    type Memory: MappedMemory;

    /// 创建栅栏
    fn create_fence(&self, initial_value: u64) -> Result<Self::Fence>;

    /// 创建直接命令分配器
    fn create_command_allocator(&self) -> Result<Self::Allocator>;

    /// 在上传堆上创建并映射 `byte_size` 字节的缓冲区
    fn create_upload_memory(&self, byte_size: usize) -> Result<Self::Memory>;

    /// 后端名称，用于日志
    fn backend_name(&self) -> &'static str;
}
