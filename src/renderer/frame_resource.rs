//! 帧资源环
//!
//! N 组独立的每帧资源（命令分配器 + 常量缓冲区），让 CPU 在 GPU 还在消费第 K 帧时
//! 准备第 K+1 帧。每个槽位记录最后一次使用它的提交对应的栅栏值。
//!
//! [`FrameResourceRing::advance`] 是整个系统唯一的背压点：如果即将复用的槽位
//! 还没被 GPU 执行完，CPU 在这里等待，因此 CPU 最多领先 GPU N-1 帧。

use tracing::{debug, trace};

use super::constants::{MaterialConstants, ObjectConstants, PassConstants};
use super::resource::{BufferUsageType, UploadBuffer};
use super::sync::{Fence, FenceValue};
use crate::core::error::{ConfigError, Result};
use crate::gfx::backend::GraphicsDevice;

/// 一个槽位的帧资源
pub struct FrameResource<D: GraphicsDevice> {
    /// 该帧命令使用的分配器，GPU 执行完之前不能重置
    pub command_allocator: D::Allocator,
    pub pass_cb: UploadBuffer<PassConstants, D::Memory>,
    pub object_cb: UploadBuffer<ObjectConstants, D::Memory>,
    pub material_cb: UploadBuffer<MaterialConstants, D::Memory>,
    /// 最后一次使用该槽位的提交对应的栅栏值，`UNSET` 表示从未提交
    pub fence: FenceValue,
}

impl<D: GraphicsDevice> std::fmt::Debug for FrameResource<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameResource").field("fence", &self.fence).finish_non_exhaustive()
    }
}

impl<D: GraphicsDevice> FrameResource<D> {
    pub fn new(device: &D, pass_count: usize, object_count: usize, material_count: usize) -> Result<Self> {
        Ok(Self {
            command_allocator: device.create_command_allocator()?,
            pass_cb: UploadBuffer::new(device, pass_count, BufferUsageType::Constant)?,
            object_cb: UploadBuffer::new(device, object_count, BufferUsageType::Constant)?,
            material_cb: UploadBuffer::new(device, material_count, BufferUsageType::Constant)?,
            fence: FenceValue::UNSET,
        })
    }

    /// GPU 是否已经用完这个槽位
    pub fn is_available(&self, completed: FenceValue) -> bool {
        self.fence.is_unset() || completed >= self.fence
    }
}

/// 帧资源环
pub struct FrameResourceRing<D: GraphicsDevice> {
    resources: Vec<FrameResource<D>>,
    current_index: usize,
}

impl<D: GraphicsDevice> FrameResourceRing<D> {
    /// 创建 `count` 个槽位，当前下标为 0
    ///
    /// # 参数
    ///
    /// * `count` - 槽位数 N，必须大于 0
    /// * `pass_count` / `object_count` / `material_count` - 每个槽位常量缓冲区的元素数量
    pub fn new(
        device: &D,
        count: usize,
        pass_count: usize,
        object_count: usize,
        material_count: usize,
    ) -> Result<Self> {
        if count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "graphics.frame_resources".to_string(),
                reason: "At least one frame resource is required".to_string(),
            }
            .into());
        }

        let resources = (0..count)
            .map(|_| FrameResource::new(device, pass_count, object_count, material_count))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            count,
            pass_count,
            object_count,
            material_count,
            backend = device.backend_name(),
            "Frame resources created"
        );

        Ok(Self {
            resources,
            current_index: 0,
        })
    }

    /// 前进到下一个槽位
    ///
    /// 如果该槽位记录的栅栏值已设置且 GPU 尚未完成，阻塞直到完成。
    pub fn advance(&mut self, fence: &Fence<D::Fence>) -> Result<&mut FrameResource<D>> {
        let index = (self.current_index + 1) % self.resources.len();
        let pending = self.resources[index].fence;

        if !pending.is_unset() && fence.completed_value() < pending {
            trace!(slot = index, fence = pending.value(), "Frame resource still in flight");
            fence.wait(pending)?;
        }

        // 等待成功后才移动下标，失败时可以原样重试
        self.current_index = index;
        Ok(&mut self.resources[index])
    }

    /// 记录当前槽位的提交栅栏值
    pub fn mark_submitted(&mut self, value: FenceValue) {
        self.current_mut().fence = value;
    }

    pub fn current(&self) -> &FrameResource<D> {
        &self.resources[self.current_index]
    }

    pub fn current_mut(&mut self) -> &mut FrameResource<D> {
        &mut self.resources[self.current_index]
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameResource<D>> {
        self.resources.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::software::{SoftwareDevice, SoftwareFence, SoftwareQueue};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn ring(count: usize) -> (FrameResourceRing<SoftwareDevice>, Fence<SoftwareFence>) {
        let device = SoftwareDevice::new();
        let ring = FrameResourceRing::new(&device, count, 1, 4, 2).unwrap();
        let fence = Fence::new(device.create_fence(0).unwrap());
        (ring, fence)
    }

    #[test]
    fn test_zero_slots_rejected() {
        let device = SoftwareDevice::new();
        assert!(FrameResourceRing::new(&device, 0, 1, 1, 1).is_err());
    }

    #[test]
    fn test_index_after_m_advances_is_m_mod_n() {
        for n in 1..=4 {
            let (mut ring, fence) = ring(n);
            assert_eq!(ring.current_index(), 0);
            for m in 1..=13 {
                ring.advance(&fence).unwrap();
                assert_eq!(ring.current_index(), m % n, "n={} m={}", n, m);
            }
        }
    }

    #[test]
    fn test_buffers_sized_per_slot() {
        let (ring, _) = ring(3);
        assert_eq!(ring.len(), 3);
        for resource in ring.iter() {
            assert_eq!(resource.pass_cb.element_count(), 1);
            assert_eq!(resource.object_cb.element_count(), 4);
            assert_eq!(resource.material_cb.element_count(), 2);
            assert!(resource.fence.is_unset());
        }
    }

    #[test]
    fn test_first_n_advances_never_wait_then_fourth_blocks() {
        let (mut ring, mut fence) = ring(3);
        let queue = SoftwareQueue::new().unwrap();
        queue.suspend();

        // GPU 挂起，三次提交都不会完成，但新槽位都从未使用过
        let mut submitted = Vec::new();
        for _ in 0..3 {
            ring.advance(&fence).unwrap();
            let value = fence.signal(&queue).unwrap();
            ring.mark_submitted(value);
            submitted.push((ring.current_index(), value));
        }
        assert_eq!(fence.completed_value(), FenceValue::UNSET);
        assert_eq!(submitted[0], (1, FenceValue::new(1)));

        let released = Arc::new(AtomicBool::new(false));
        let gpu = {
            let raw = fence.raw().clone();
            let released = released.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                released.store(true, Ordering::SeqCst);
                raw.signal_cpu(1);
            })
        };

        // 第四次回到槽位 1，必须等到栅栏值 1 完成
        let resource = ring.advance(&fence).unwrap();
        assert_eq!(resource.fence, FenceValue::new(1));
        assert!(released.load(Ordering::SeqCst));
        assert!(fence.completed_value() >= FenceValue::new(1));
        assert_eq!(ring.current_index(), 1);

        gpu.join().unwrap();
        queue.resume();
    }

    #[test]
    fn test_completed_slot_does_not_wait() {
        let (mut ring, mut fence) = ring(2);
        let queue = SoftwareQueue::new().unwrap();
        for _ in 0..6 {
            ring.advance(&fence).unwrap();
            let value = fence.flush(&queue).unwrap();
            ring.mark_submitted(value);
            assert!(ring.current().is_available(fence.completed_value()));
        }
    }
}
