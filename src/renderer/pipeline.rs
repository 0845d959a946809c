//! 帧流水线状态机
//!
//! 每帧依次经过：
//!
//! ```text
//! Idle ──begin_frame──► Updating ──begin_recording──► Recording ──submit──► Submitted
//!  ▲                                                                           │
//!  └──────────────────────────── 下一帧 begin_frame ───────────────────────────┘
//! ```
//!
//! - `begin_frame`：前进到下一个帧资源槽位，必要时等待栅栏
//! - `begin_recording`：重置该槽位的命令分配器
//! - `submit`：执行调用者的提交，signal 新的栅栏值并记录到槽位上
//!
//! 顺序错误的调用返回 [`RenderError::Runtime`]。

use tracing::trace;

use super::frame_resource::{FrameResource, FrameResourceRing};
use super::sync::{Fence, FenceValue};
use crate::core::error::{RenderError, Result};
use crate::gfx::backend::{CommandAllocator, CommandQueue, GraphicsDevice};

/// 帧状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Updating,
    Recording,
    Submitted,
}

/// 帧流水线
pub struct FramePipeline<D: GraphicsDevice> {
    ring: FrameResourceRing<D>,
    state: FrameState,
    frames_submitted: u64,
}

impl<D: GraphicsDevice> FramePipeline<D> {
    pub fn new(ring: FrameResourceRing<D>) -> Self {
        Self {
            ring,
            state: FrameState::Idle,
            frames_submitted: 0,
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    /// 帧资源数量 N
    pub fn frame_count(&self) -> usize {
        self.ring.len()
    }

    pub fn ring(&self) -> &FrameResourceRing<D> {
        &self.ring
    }

    /// 当前槽位
    pub fn current(&self) -> &FrameResource<D> {
        self.ring.current()
    }

    pub fn current_mut(&mut self) -> &mut FrameResource<D> {
        self.ring.current_mut()
    }

    /// Idle/Submitted -> Updating
    pub fn begin_frame(&mut self, fence: &Fence<D::Fence>) -> Result<&mut FrameResource<D>> {
        self.require_state(&[FrameState::Idle, FrameState::Submitted], "begin_frame")?;
        let frame = self.ring.advance(fence)?;
        self.state = FrameState::Updating;
        Ok(frame)
    }

    /// Updating -> Recording
    ///
    /// 重置当前槽位的命令分配器，之后可以基于它重置命令列表。
    pub fn begin_recording(&mut self) -> Result<&D::Allocator> {
        self.require_state(&[FrameState::Updating], "begin_recording")?;
        let allocator = &self.ring.current().command_allocator;
        allocator.reset()?;
        self.state = FrameState::Recording;
        Ok(allocator)
    }

    /// Recording -> Submitted
    ///
    /// `execute` 负责关闭并提交命令列表；栅栏 signal 在它之后入队，
    /// 因此 GPU 完成该值时这一帧读取的所有常量都已经读完。
    pub fn submit<Q, E>(&mut self, fence: &mut Fence<D::Fence>, queue: &Q, execute: E) -> Result<FenceValue>
    where
        Q: CommandQueue<Fence = D::Fence>,
        E: FnOnce(&Q) -> Result<()>,
    {
        self.require_state(&[FrameState::Recording], "submit")?;
        execute(queue)?;
        let value = fence.signal(queue)?;
        self.ring.mark_submitted(value);
        self.state = FrameState::Submitted;
        self.frames_submitted += 1;
        trace!(
            slot = self.ring.current_index(),
            fence = value.value(),
            "Frame submitted"
        );
        Ok(value)
    }

    /// 等待 GPU 执行完所有已提交的工作，状态回到 Idle
    pub fn flush<Q>(&mut self, fence: &mut Fence<D::Fence>, queue: &Q) -> Result<()>
    where
        Q: CommandQueue<Fence = D::Fence>,
    {
        fence.flush(queue)?;
        if self.state == FrameState::Submitted {
            self.state = FrameState::Idle;
        }
        Ok(())
    }

    fn require_state(&self, allowed: &[FrameState], operation: &str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(RenderError::Runtime(format!(
                "{} called in state {:?}",
                operation, self.state
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::GpuFence;
    use crate::gfx::software::{SoftwareDevice, SoftwareFence, SoftwareQueue};

    fn pipeline(n: usize) -> (FramePipeline<SoftwareDevice>, Fence<SoftwareFence>, SoftwareQueue) {
        let device = SoftwareDevice::new();
        let ring = FrameResourceRing::new(&device, n, 1, 1, 1).unwrap();
        let fence = Fence::new(device.create_fence(0).unwrap());
        (FramePipeline::new(ring), fence, SoftwareQueue::new().unwrap())
    }

    #[test]
    fn test_state_transitions() {
        let (mut pipeline, mut fence, queue) = pipeline(3);
        assert_eq!(pipeline.state(), FrameState::Idle);

        pipeline.begin_frame(&fence).unwrap();
        assert_eq!(pipeline.state(), FrameState::Updating);

        pipeline.begin_recording().unwrap();
        assert_eq!(pipeline.state(), FrameState::Recording);
        assert_eq!(pipeline.current().command_allocator.reset_count(), 1);

        let value = pipeline.submit(&mut fence, &queue, |_| Ok(())).unwrap();
        assert_eq!(pipeline.state(), FrameState::Submitted);
        assert_eq!(pipeline.current().fence, value);
        assert_eq!(pipeline.frames_submitted(), 1);

        pipeline.flush(&mut fence, &queue).unwrap();
        assert_eq!(pipeline.state(), FrameState::Idle);
        assert!(fence.raw().completed_value() >= value.value());
    }

    #[test]
    fn test_out_of_order_calls_rejected() {
        let (mut pipeline, mut fence, queue) = pipeline(2);
        assert!(pipeline.begin_recording().is_err());
        assert!(pipeline.submit(&mut fence, &queue, |_| Ok(())).is_err());

        pipeline.begin_frame(&fence).unwrap();
        assert!(pipeline.begin_frame(&fence).is_err());
        assert!(pipeline.submit(&mut fence, &queue, |_| Ok(())).is_err());
        assert_eq!(pipeline.state(), FrameState::Updating);
    }

    #[test]
    fn test_failed_execute_does_not_signal() {
        let (mut pipeline, mut fence, queue) = pipeline(2);
        pipeline.begin_frame(&fence).unwrap();
        pipeline.begin_recording().unwrap();
        let err = pipeline
            .submit(&mut fence, &queue, |_| Err(RenderError::Runtime("boom".into())))
            .unwrap_err();
        assert!(matches!(err, RenderError::Runtime(_)));
        assert!(fence.current_value().is_unset());
        assert!(pipeline.current().fence.is_unset());
    }

    #[test]
    fn test_failed_wait_leaves_frame_retryable() {
        let (mut pipeline, mut fence, queue) = pipeline(2);
        queue.suspend();
        let mut values = Vec::new();
        for _ in 0..2 {
            pipeline.begin_frame(&fence).unwrap();
            pipeline.begin_recording().unwrap();
            values.push(pipeline.submit(&mut fence, &queue, |_| Ok(())).unwrap());
        }
        assert_eq!(pipeline.ring().current_index(), 0);

        // 第三帧要复用槽位 1，等待期间设备被移除
        fence.raw().set_removed(true);
        let err = pipeline.begin_frame(&fence).unwrap_err();
        assert!(err.is_device_lost());
        assert_eq!(pipeline.state(), FrameState::Submitted);
        assert_eq!(pipeline.ring().current_index(), 0);

        fence.raw().set_removed(false);
        queue.resume();
        pipeline.begin_frame(&fence).unwrap();
        assert_eq!(pipeline.state(), FrameState::Updating);
        assert_eq!(pipeline.ring().current_index(), 1);
        assert!(fence.is_completed(values[0]));
    }

    #[test]
    fn test_single_slot_waits_for_previous_frame() {
        let (mut pipeline, mut fence, queue) = pipeline(1);
        let mut last = FenceValue::UNSET;
        for _ in 0..5 {
            pipeline.begin_frame(&fence).unwrap();
            // N=1：复用唯一的槽位前，上一帧必须已经完成
            assert!(fence.is_completed(last));
            pipeline.begin_recording().unwrap();
            last = pipeline
                .submit(&mut fence, &queue, |q| {
                    q.execute(|| std::thread::sleep(std::time::Duration::from_millis(5)))
                })
                .unwrap();
        }
    }
}
