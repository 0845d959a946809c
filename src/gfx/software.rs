//! 软件后端
//!
//! 无窗口、无 GPU 的模拟实现，用于测试帧流水线和 `--headless` 运行模式。
//!
//! - 命令队列由一个工作线程按 FIFO 顺序执行提交的任务和栅栏 signal
//! - 栅栏使用 `Mutex` + `Condvar`，等待时线程挂起而不是轮询
//! - 队列可以被挂起/恢复，用来模拟落后的 GPU
//! - 上传内存是普通的堆内存，“GPU”任务通过 [`HostMemoryReader`] 读取它

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::core::error::{GraphicsError, RenderError, Result};
use crate::gfx::backend::{CommandAllocator, CommandQueue, GpuFence, GraphicsDevice, MappedMemory};

/// 模拟的缓冲区地址对齐（与 D3D12 默认的 64KB 资源对齐一致）
const ALLOCATION_ALIGNMENT: u64 = 64 * 1024;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct FenceState {
    completed: Mutex<u64>,
    cond: Condvar,
    removed: AtomicBool,
}

/// 软件栅栏
#[derive(Clone)]
pub struct SoftwareFence {
    state: Arc<FenceState>,
}

impl SoftwareFence {
    pub fn new(initial_value: u64) -> Self {
        Self {
            state: Arc::new(FenceState {
                completed: Mutex::new(initial_value),
                cond: Condvar::new(),
                removed: AtomicBool::new(false),
            }),
        }
    }

    /// 直接从 CPU 设置完成值，相当于 `ID3D12Fence::Signal`
    ///
    /// 完成值不会减小。
    pub fn signal_cpu(&self, value: u64) {
        let mut completed = lock(&self.state.completed);
        if value > *completed {
            *completed = value;
            self.state.cond.notify_all();
        }
    }

    /// 模拟设备移除：尚未完成的等待立即以 `DeviceLost` 返回
    pub fn set_removed(&self, removed: bool) {
        let _completed = lock(&self.state.completed);
        self.state.removed.store(removed, Ordering::Release);
        self.state.cond.notify_all();
    }
}

impl GpuFence for SoftwareFence {
    fn completed_value(&self) -> u64 {
        *lock(&self.state.completed)
    }

    fn wait_for(&self, value: u64) -> Result<()> {
        let mut completed = lock(&self.state.completed);
        while *completed < value {
            if self.state.removed.load(Ordering::Acquire) {
                return Err(GraphicsError::DeviceLost(format!("fence wait for {} abandoned", value)).into());
            }
            completed = self
                .state
                .cond
                .wait(completed)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Ok(())
    }
}

enum Job {
    Work(Box<dyn FnOnce() + Send>),
    Signal(SoftwareFence, u64),
}

struct Gate {
    suspended: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    fn wait_until_open(&self) {
        let mut suspended = lock(&self.suspended);
        while *suspended {
            suspended = self.cond.wait(suspended).unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn set(&self, suspended: bool) {
        *lock(&self.suspended) = suspended;
        self.cond.notify_all();
    }
}

struct QueueShared {
    sender: Option<Sender<Job>>,
    gate: Arc<Gate>,
    worker: Option<JoinHandle<()>>,
    submitted: AtomicU64,
}

impl Drop for QueueShared {
    fn drop(&mut self) {
        // 关闭通道，让工作线程执行完剩余任务后退出
        self.sender.take();
        self.gate.set(false);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Software queue worker panicked");
            }
        }
    }
}

/// 软件命令队列
///
/// 克隆得到的是同一个队列的句柄。
#[derive(Clone)]
pub struct SoftwareQueue {
    shared: Arc<QueueShared>,
}

impl SoftwareQueue {
    pub fn new() -> Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let gate = Arc::new(Gate {
            suspended: Mutex::new(false),
            cond: Condvar::new(),
        });

        let worker_gate = gate.clone();
        let worker = thread::Builder::new()
            .name("software-gpu".to_string())
            .spawn(move || run_worker(receiver, worker_gate))
            .map_err(|e| GraphicsError::DeviceCreation(format!("Failed to spawn software queue: {}", e)))?;

        Ok(Self {
            shared: Arc::new(QueueShared {
                sender: Some(sender),
                gate,
                worker: Some(worker),
                submitted: AtomicU64::new(0),
            }),
        })
    }

    /// 提交一段“GPU 工作”，按提交顺序在工作线程上执行
    pub fn execute<W>(&self, work: W) -> Result<()>
    where
        W: FnOnce() + Send + 'static,
    {
        self.shared.submitted.fetch_add(1, Ordering::Relaxed);
        self.send(Job::Work(Box::new(work)))
    }

    /// 挂起队列，已提交但尚未开始的任务会一直等到 [`resume`](Self::resume)
    pub fn suspend(&self) {
        debug!("Software queue suspended");
        self.shared.gate.set(true);
    }

    pub fn resume(&self) {
        debug!("Software queue resumed");
        self.shared.gate.set(false);
    }

    /// 已提交的工作数量（不含 signal）
    pub fn submitted_work(&self) -> u64 {
        self.shared.submitted.load(Ordering::Relaxed)
    }

    fn send(&self, job: Job) -> Result<()> {
        let sender = self.shared.sender.as_ref().ok_or_else(queue_closed)?;
        sender.send(job).map_err(|_| queue_closed())?;
        Ok(())
    }
}

fn queue_closed() -> RenderError {
    GraphicsError::CommandExecution("software queue worker is not running".to_string()).into()
}

fn run_worker(receiver: Receiver<Job>, gate: Arc<Gate>) {
    for job in receiver {
        gate.wait_until_open();
        match job {
            Job::Work(work) => work(),
            Job::Signal(fence, value) => fence.signal_cpu(value),
        }
    }
}

impl CommandQueue for SoftwareQueue {
    type Fence = SoftwareFence;

    fn signal(&self, fence: &SoftwareFence, value: u64) -> Result<()> {
        self.send(Job::Signal(fence.clone(), value))
    }
}

/// 软件命令分配器，只记录被重置的次数
#[derive(Default)]
pub struct SoftwareAllocator {
    resets: AtomicU64,
}

impl SoftwareAllocator {
    pub fn reset_count(&self) -> u64 {
        self.resets.load(Ordering::Relaxed)
    }
}

impl CommandAllocator for SoftwareAllocator {
    fn reset(&self) -> Result<()> {
        self.resets.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// 软件上传内存
pub struct HostMemory {
    bytes: Arc<Mutex<Vec<u8>>>,
    gpu_address: u64,
}

impl HostMemory {
    /// 供“GPU”任务读取的句柄
    pub fn reader(&self) -> HostMemoryReader {
        HostMemoryReader {
            bytes: self.bytes.clone(),
            gpu_address: self.gpu_address,
        }
    }
}

impl MappedMemory for HostMemory {
    fn len(&self) -> usize {
        lock(&self.bytes).len()
    }

    fn gpu_address(&self) -> u64 {
        self.gpu_address
    }

    fn write_bytes(&mut self, offset: usize, data: &[u8]) {
        lock(&self.bytes)[offset..offset + data.len()].copy_from_slice(data);
    }

    fn read_bytes(&self, offset: usize, out: &mut [u8]) {
        let len = out.len();
        out.copy_from_slice(&lock(&self.bytes)[offset..offset + len]);
    }
}

/// 上传内存的只读句柄
#[derive(Clone)]
pub struct HostMemoryReader {
    bytes: Arc<Mutex<Vec<u8>>>,
    gpu_address: u64,
}

impl HostMemoryReader {
    pub fn gpu_address(&self) -> u64 {
        self.gpu_address
    }

    pub fn read_bytes(&self, offset: usize, out: &mut [u8]) {
        let len = out.len();
        out.copy_from_slice(&lock(&self.bytes)[offset..offset + len]);
    }

    /// 按 Pod 类型读取
    pub fn read<T: bytemuck::Pod>(&self, offset: usize) -> T {
        let mut value = T::zeroed();
        self.read_bytes(offset, bytemuck::bytes_of_mut(&mut value));
        value
    }
}

/// 软件设备
pub struct SoftwareDevice {
    next_address: AtomicU64,
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self {
            next_address: AtomicU64::new(ALLOCATION_ALIGNMENT),
        }
    }
}

impl Default for SoftwareDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for SoftwareDevice {
    type Fence = SoftwareFence;
    type Allocator = SoftwareAllocator;
    type Memory = HostMemory;

    fn create_fence(&self, initial_value: u64) -> Result<SoftwareFence> {
        Ok(SoftwareFence::new(initial_value))
    }

    fn create_command_allocator(&self) -> Result<SoftwareAllocator> {
        Ok(SoftwareAllocator::default())
    }

    fn create_upload_memory(&self, byte_size: usize) -> Result<HostMemory> {
        let reserved = (byte_size as u64).max(1).div_ceil(ALLOCATION_ALIGNMENT) * ALLOCATION_ALIGNMENT;
        let gpu_address = self.next_address.fetch_add(reserved, Ordering::Relaxed);
        Ok(HostMemory {
            bytes: Arc::new(Mutex::new(vec![0; byte_size])),
            gpu_address,
        })
    }

    fn backend_name(&self) -> &'static str {
        "Software"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_queue_runs_jobs_in_order() {
        let queue = SoftwareQueue::new().unwrap();
        let fence = SoftwareFence::new(0);
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let log = log.clone();
            queue.execute(move || lock(&log).push(i)).unwrap();
        }
        queue.signal(&fence, 1).unwrap();
        fence.wait_for(1).unwrap();
        assert_eq!(*lock(&log), vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.submitted_work(), 5);
    }

    #[test]
    fn test_suspended_queue_holds_signals() {
        let queue = SoftwareQueue::new().unwrap();
        let fence = SoftwareFence::new(0);
        queue.suspend();
        queue.signal(&fence, 3).unwrap();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(fence.completed_value(), 0);
        queue.resume();
        fence.wait_for(3).unwrap();
        assert_eq!(fence.completed_value(), 3);
    }

    #[test]
    fn test_removed_fence_fails_pending_waits() {
        let fence = SoftwareFence::new(1);
        fence.set_removed(true);
        assert!(fence.wait_for(1).is_ok());
        assert!(fence.wait_for(2).unwrap_err().is_device_lost());

        fence.set_removed(false);
        fence.signal_cpu(2);
        assert!(fence.wait_for(2).is_ok());
    }

    #[test]
    fn test_fence_never_decreases() {
        let fence = SoftwareFence::new(5);
        fence.signal_cpu(2);
        assert_eq!(fence.completed_value(), 5);
        fence.signal_cpu(9);
        assert_eq!(fence.completed_value(), 9);
    }

    #[test]
    fn test_host_memory_reader_sees_writes() {
        let device = SoftwareDevice::new();
        let mut memory = device.create_upload_memory(512).unwrap();
        let reader = memory.reader();
        memory.write_bytes(256, &7u32.to_ne_bytes());
        assert_eq!(reader.read::<u32>(256), 7);
        assert_eq!(reader.gpu_address(), memory.gpu_address());
        assert_eq!(memory.len(), 512);
    }

    #[test]
    fn test_allocations_do_not_overlap() {
        let device = SoftwareDevice::new();
        let a = device.create_upload_memory(100_000).unwrap();
        let b = device.create_upload_memory(10).unwrap();
        assert!(b.gpu_address() >= a.gpu_address() + 100_000);
        assert_eq!(a.gpu_address() % ALLOCATION_ALIGNMENT, 0);
    }

    #[test]
    fn test_drop_drains_pending_work() {
        let fence = SoftwareFence::new(0);
        {
            let queue = SoftwareQueue::new().unwrap();
            queue.execute(|| thread::sleep(Duration::from_millis(10))).unwrap();
            queue.signal(&fence, 1).unwrap();
        }
        assert_eq!(fence.completed_value(), 1);
    }
}
