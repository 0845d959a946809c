//! 上传缓冲区
//!
//! 持久映射的 CPU -> GPU 缓冲区，按元素下标写入。构造时映射，
//! 底层内存被 drop 时解除映射。
//!
//! 写入不做任何读同步：覆盖某个元素之前，调用者必须保证 GPU 已经读完它之前的内容。
//! 帧资源环的栅栏等待正是用来保证这一点的。

use std::marker::PhantomData;
use std::mem::size_of;

use bytemuck::Pod;

use crate::core::error::Result;
use crate::gfx::backend::{GraphicsDevice, MappedMemory};

/// 常量缓冲区的最小对齐
pub const CONSTANT_BUFFER_ALIGNMENT: usize = 256;

/// 常量缓冲区的大小必须是 256 字节的整数倍
///
/// ```
/// use d3d_frame::renderer::resource::constant_buffer_byte_size;
/// assert_eq!(constant_buffer_byte_size(10), 256);
/// assert_eq!(constant_buffer_byte_size(300), 512);
/// ```
pub const fn constant_buffer_byte_size(byte_size: usize) -> usize {
    (byte_size + CONSTANT_BUFFER_ALIGNMENT - 1) & !(CONSTANT_BUFFER_ALIGNMENT - 1)
}

/// 缓冲区使用类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsageType {
    /// 常量缓冲区，元素按 256 字节对齐
    Constant,
    /// 普通上传缓冲区，元素紧密排列
    Upload,
}

impl BufferUsageType {
    /// 类型 `T` 在该用途下的元素步长
    pub const fn element_stride<T>(self) -> usize {
        match self {
            BufferUsageType::Constant => constant_buffer_byte_size(size_of::<T>()),
            BufferUsageType::Upload => size_of::<T>(),
        }
    }
}

/// 上传缓冲区
///
/// # 类型参数
///
/// * `T` - 元素类型
/// * `M` - 后端的映射内存
pub struct UploadBuffer<T: Pod, M: MappedMemory> {
    memory: M,
    element_count: usize,
    element_stride: usize,
    usage: BufferUsageType,
    _marker: PhantomData<T>,
}

impl<T: Pod, M: MappedMemory> UploadBuffer<T, M> {
    /// 创建并映射上传缓冲区
    ///
    /// # 参数
    ///
    /// * `device` - 图形设备
    /// * `element_count` - 元素数量，0 时仍然分配一个元素，避免创建空资源
    /// * `usage` - 缓冲区使用类型
    pub fn new<D>(device: &D, element_count: usize, usage: BufferUsageType) -> Result<Self>
    where
        D: GraphicsDevice<Memory = M>,
    {
        let element_stride = usage.element_stride::<T>();
        let memory = device.create_upload_memory(element_stride * element_count.max(1))?;

        Ok(Self {
            memory,
            element_count,
            element_stride,
            usage,
            _marker: PhantomData,
        })
    }

    /// 把 `value` 拷贝到第 `index` 个元素
    ///
    /// `index` 超出元素数量时 panic。
    pub fn copy_data(&mut self, index: usize, value: &T) {
        assert!(
            index < self.element_count,
            "upload buffer index {} out of range ({} elements)",
            index,
            self.element_count
        );
        self.memory
            .write_bytes(index * self.element_stride, bytemuck::bytes_of(value));
    }

    /// 读回第 `index` 个元素当前的内容
    pub fn read(&self, index: usize) -> T {
        assert!(index < self.element_count);
        let mut value = T::zeroed();
        self.memory
            .read_bytes(index * self.element_stride, bytemuck::bytes_of_mut(&mut value));
        value
    }

    /// 第 `index` 个元素的 GPU 虚拟地址
    pub fn gpu_address(&self, index: usize) -> u64 {
        self.memory.gpu_address() + (index * self.element_stride) as u64
    }

    pub fn element_count(&self) -> usize {
        self.element_count
    }

    pub fn element_stride(&self) -> usize {
        self.element_stride
    }

    pub fn usage(&self) -> BufferUsageType {
        self.usage
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::software::SoftwareDevice;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
    struct Small {
        a: [u8; 10],
    }

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
    struct Large {
        a: [[u32; 25]; 3],
    }

    #[test]
    fn test_constant_buffer_alignment() {
        assert_eq!(constant_buffer_byte_size(1), 256);
        assert_eq!(constant_buffer_byte_size(256), 256);
        assert_eq!(constant_buffer_byte_size(257), 512);
        assert_eq!(BufferUsageType::Constant.element_stride::<Small>(), 256);
        assert_eq!(BufferUsageType::Constant.element_stride::<Large>(), 512);
        assert_eq!(BufferUsageType::Upload.element_stride::<Small>(), 10);
    }

    #[test]
    fn test_upload_buffer_stride_and_addresses() {
        let device = SoftwareDevice::new();
        let cb = UploadBuffer::<Small, _>::new(&device, 4, BufferUsageType::Constant).unwrap();
        assert_eq!(cb.element_stride(), 256);
        assert_eq!(cb.memory().len(), 1024);
        assert_eq!(cb.gpu_address(3) - cb.gpu_address(0), 768);

        let plain = UploadBuffer::<Large, _>::new(&device, 2, BufferUsageType::Upload).unwrap();
        assert_eq!(plain.element_stride(), 300);
        assert_eq!(plain.memory().len(), 600);
    }

    #[test]
    fn test_copy_data_writes_only_target_element() {
        let device = SoftwareDevice::new();
        let mut cb = UploadBuffer::<Small, _>::new(&device, 3, BufferUsageType::Constant).unwrap();
        let value = Small { a: [7; 10] };
        cb.copy_data(1, &value);
        assert_eq!(cb.read(1), value);
        assert_eq!(cb.read(0), Small { a: [0; 10] });
        assert_eq!(cb.read(2), Small { a: [0; 10] });
    }

    #[test]
    #[should_panic]
    fn test_copy_data_out_of_range_panics() {
        let device = SoftwareDevice::new();
        let mut cb = UploadBuffer::<Small, _>::new(&device, 1, BufferUsageType::Constant).unwrap();
        cb.copy_data(1, &Small { a: [0; 10] });
    }

    #[test]
    fn test_zero_elements_still_allocates() {
        let device = SoftwareDevice::new();
        let cb = UploadBuffer::<Small, _>::new(&device, 0, BufferUsageType::Constant).unwrap();
        assert_eq!(cb.element_count(), 0);
        assert_eq!(cb.memory().len(), 256);
    }
}
