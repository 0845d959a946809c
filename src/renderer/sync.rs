//! GPU 同步机制模块
//!
//! CPU 侧的栅栏协议：
//!
//! - `signal(queue)`：生成一个严格递增的新值，并在队列中所有已提交工作之后插入 signal
//! - `wait(value)`：阻塞直到 GPU 完成值 >= `value`
//! - `flush(queue)`：signal 一个新值并等待它，用于初始化、窗口大小改变和退出
//!
//! 值 0 表示“从未提交”，等待它总是立即返回。

use tracing::trace;

use crate::core::error::Result;
use crate::gfx::backend::{CommandQueue, GpuFence};

/// Fence 值
///
/// 用于 CPU-GPU 同步的单调递增值，`FenceValue::UNSET` 表示尚未提交。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FenceValue(u64);

impl FenceValue {
    /// 从未提交的哨兵值
    pub const UNSET: FenceValue = FenceValue(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// 下一个 Fence 值
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn is_unset(&self) -> bool {
        self.0 == 0
    }
}

/// 栅栏
///
/// 包装后端的原始栅栏，并记录 CPU 侧最近一次 signal 的值。
pub struct Fence<F: GpuFence> {
    raw: F,
    current: FenceValue,
}

impl<F: GpuFence> Fence<F> {
    /// 包装原始栅栏，CPU 侧当前值从它的完成值开始
    pub fn new(raw: F) -> Self {
        let current = FenceValue::new(raw.completed_value());
        Self { raw, current }
    }

    /// 最近一次 signal 的值
    pub fn current_value(&self) -> FenceValue {
        self.current
    }

    /// GPU 已经完成的值
    pub fn completed_value(&self) -> FenceValue {
        FenceValue::new(self.raw.completed_value())
    }

    pub fn is_completed(&self, value: FenceValue) -> bool {
        self.completed_value() >= value
    }

    pub fn raw(&self) -> &F {
        &self.raw
    }

    /// 在队列中插入下一个栅栏值
    ///
    /// # 返回值
    ///
    /// 新的栅栏值，严格大于之前所有提交过的值
    pub fn signal<Q>(&mut self, queue: &Q) -> Result<FenceValue>
    where
        Q: CommandQueue<Fence = F>,
    {
        let next = self.current.next();
        queue.signal(&self.raw, next.value())?;
        self.current = next;
        trace!(value = next.value(), "Fence signaled");
        Ok(next)
    }

    /// 阻塞直到 GPU 完成 `value`
    pub fn wait(&self, value: FenceValue) -> Result<()> {
        if value.is_unset() || self.is_completed(value) {
            return Ok(());
        }

        trace!(
            value = value.value(),
            completed = self.completed_value().value(),
            "Waiting for GPU"
        );
        self.raw.wait_for(value.value())
    }

    /// 刷新命令队列：signal 一个新值并等待 GPU 完成它
    pub fn flush<Q>(&mut self, queue: &Q) -> Result<FenceValue>
    where
        Q: CommandQueue<Fence = F>,
    {
        let value = self.signal(queue)?;
        self.wait(value)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::software::{SoftwareFence, SoftwareQueue};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fence_value() {
        assert!(FenceValue::UNSET.is_unset());
        assert_eq!(FenceValue::new(4).next().value(), 5);
        assert!(FenceValue::new(2) > FenceValue::new(1));
    }

    #[test]
    fn test_signal_is_strictly_increasing() {
        let queue = SoftwareQueue::new().unwrap();
        let mut fence = Fence::new(SoftwareFence::new(0));
        let mut last = FenceValue::UNSET;
        for _ in 0..10 {
            let value = fence.signal(&queue).unwrap();
            assert!(value > last);
            last = value;
        }
        assert_eq!(fence.current_value(), last);
    }

    #[test]
    fn test_flush_completes_signaled_value() {
        let queue = SoftwareQueue::new().unwrap();
        let mut fence = Fence::new(SoftwareFence::new(0));
        queue.execute(|| thread::sleep(Duration::from_millis(20))).unwrap();
        let value = fence.flush(&queue).unwrap();
        assert_eq!(fence.completed_value(), value);
        assert_eq!(fence.current_value(), value);
    }

    #[test]
    fn test_wait_never_returns_early() {
        let queue = SoftwareQueue::new().unwrap();
        queue.suspend();
        let mut fence = Fence::new(SoftwareFence::new(0));
        let v1 = fence.signal(&queue).unwrap();
        let v2 = fence.signal(&queue).unwrap();

        let resumed = Arc::new(AtomicBool::new(false));
        let resumer = {
            let queue = queue.clone();
            let resumed = resumed.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                resumed.store(true, Ordering::SeqCst);
                queue.resume();
            })
        };

        fence.wait(v2).unwrap();
        assert!(resumed.load(Ordering::SeqCst));
        assert!(fence.completed_value() >= v2);
        assert!(fence.is_completed(v1));
        resumer.join().unwrap();
    }

    #[test]
    fn test_wait_on_unset_returns_immediately() {
        let queue = SoftwareQueue::new().unwrap();
        queue.suspend();
        let fence = Fence::new(SoftwareFence::new(0));
        fence.wait(FenceValue::UNSET).unwrap();
        queue.resume();
    }
}
