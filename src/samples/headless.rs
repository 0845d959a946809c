//! 无窗口运行模式
//!
//! 在软件后端上运行 fabric 场景固定帧数。每次提交的“GPU 工作”在工作线程上
//! 稍作延迟后读取该槽位的渲染通道常量，与提交时 CPU 写入的值比较。
//! 如果 CPU 在 GPU 读取前覆盖了槽位，读到的值就会不一致，记为一次过期读取。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::fabric_scene::FabricScene;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::input::MouseButtons;
use crate::core::timer::GameTimer;
use crate::geometry::{textured_box, MeshData, Vertex};
use crate::gfx::backend::GraphicsDevice;
use crate::gfx::software::{SoftwareDevice, SoftwareFence, SoftwareQueue};
use crate::renderer::constants::PassConstants;
use crate::renderer::{Fence, FramePipeline, FrameResourceRing, RenderLoop, Sample, TickOutcome};

/// 每帧模拟的 GPU 耗时
pub const DEFAULT_GPU_LATENCY: Duration = Duration::from_millis(2);

/// 运行结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessReport {
    pub frames_submitted: u64,
    /// GPU 读到的常量与提交时一致的帧数
    pub verified_frames: u64,
    pub stale_reads: u64,
    pub last_fence: u64,
}

#[derive(Default)]
struct ReadCheck {
    verified: AtomicU64,
    stale: AtomicU64,
}

/// 软件后端上的 fabric 示例
pub struct HeadlessFabric {
    title: String,
    device: SoftwareDevice,
    queue: SoftwareQueue,
    fence: Fence<SoftwareFence>,
    pipeline: FramePipeline<SoftwareDevice>,
    scene: FabricScene<MeshData<Vertex>>,
    gpu_latency: Duration,
    check: Arc<ReadCheck>,
}

impl HeadlessFabric {
    pub fn new(config: &Config) -> Result<Self> {
        let device = SoftwareDevice::new();
        let queue = SoftwareQueue::new()?;
        let fence = Fence::new(device.create_fence(0)?);
        let frame_count = config.graphics.frame_resources;

        let mut scene = FabricScene::new(&config.camera, frame_count);
        let mesh = textured_box(1.0, 1.0, 1.0);
        let args = mesh.whole();
        scene.add_box(Arc::new(mesh), args);

        let ring = FrameResourceRing::new(&device, frame_count, 1, scene.items().len(), scene.materials().len())?;

        Ok(Self {
            title: format!("{} (headless)", config.window.title),
            device,
            queue,
            fence,
            pipeline: FramePipeline::new(ring),
            scene,
            gpu_latency: DEFAULT_GPU_LATENCY,
            check: Arc::new(ReadCheck::default()),
        })
    }

    pub fn with_gpu_latency(mut self, latency: Duration) -> Self {
        self.gpu_latency = latency;
        self
    }

    /// 挂起/恢复软件队列，模拟落后的 GPU
    pub fn queue(&self) -> &SoftwareQueue {
        &self.queue
    }

    pub fn pipeline(&self) -> &FramePipeline<SoftwareDevice> {
        &self.pipeline
    }

    pub fn fence(&self) -> &Fence<SoftwareFence> {
        &self.fence
    }

    /// 等待所有已提交的帧执行完
    pub fn flush(&mut self) -> Result<()> {
        self.pipeline.flush(&mut self.fence, &self.queue)
    }

    pub fn report(&self) -> HeadlessReport {
        HeadlessReport {
            frames_submitted: self.pipeline.frames_submitted(),
            verified_frames: self.check.verified.load(Ordering::Acquire),
            stale_reads: self.check.stale.load(Ordering::Acquire),
            last_fence: self.fence.current_value().value(),
        }
    }
}

impl Sample for HeadlessFabric {
    fn title(&self) -> &str {
        &self.title
    }

    fn initialize(&mut self) -> Result<()> {
        info!(
            backend = self.device.backend_name(),
            frame_resources = self.pipeline.frame_count(),
            "Headless sample initialized"
        );
        Ok(())
    }

    fn on_resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.scene.on_resize(width, height);
        Ok(())
    }

    fn update(&mut self, timer: &GameTimer) -> Result<()> {
        // 相机匀速绕场景旋转，保证每帧的常量都不同
        self.scene.camera.rotate(0.01, 0.0);
        let frame = self.pipeline.begin_frame(&self.fence)?;
        self.scene.update_frame(frame, timer);
        Ok(())
    }

    fn draw(&mut self, _timer: &GameTimer) -> Result<()> {
        self.pipeline.begin_recording()?;

        let frame = self.pipeline.current();
        let expected: PassConstants = frame.pass_cb.read(0);
        let reader = frame.pass_cb.memory().reader();
        let check = self.check.clone();
        let latency = self.gpu_latency;

        let value = self.pipeline.submit(&mut self.fence, &self.queue, move |queue| {
            queue.execute(move || {
                thread::sleep(latency);
                let seen: PassConstants = reader.read(0);
                if seen == expected {
                    check.verified.fetch_add(1, Ordering::AcqRel);
                } else {
                    check.stale.fetch_add(1, Ordering::AcqRel);
                }
            })
        })?;
        debug!(fence = value.value(), "Headless frame submitted");
        Ok(())
    }

    fn on_mouse_move(&mut self, buttons: MouseButtons, x: f32, y: f32) {
        self.scene.camera.on_mouse_move(buttons, x, y);
    }
}

/// 按配置运行无窗口模式
pub fn run(config: &Config) -> Result<HeadlessReport> {
    let mut sample = HeadlessFabric::new(config)?;
    sample.initialize()?;
    sample.on_resize(config.window.width, config.window.height)?;

    let started = Instant::now();
    let mut render_loop = RenderLoop::new();
    render_loop.start();
    for _ in 0..config.sample.frames {
        if let TickOutcome::Rendered(Some(stats)) = render_loop.tick(&mut sample)? {
            info!("{}", stats.window_title(sample.title()));
        }
    }
    sample.flush()?;

    let report = sample.report();
    info!(
        frames = report.frames_submitted,
        verified = report.verified_frames,
        stale = report.stale_reads,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Headless run finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::FrameState;

    fn config(frame_resources: usize, frames: u32) -> Config {
        let mut config = Config::default();
        config.graphics.frame_resources = frame_resources;
        config.sample.headless = true;
        config.sample.frames = frames;
        config
    }

    #[test]
    fn test_headless_run_never_reads_stale_constants() {
        let report = run(&config(3, 12)).unwrap();
        assert_eq!(report.frames_submitted, 12);
        assert_eq!(report.verified_frames, 12);
        assert_eq!(report.stale_reads, 0);
        // 12 帧 + 最后一次 flush
        assert_eq!(report.last_fence, 13);
    }

    #[test]
    fn test_single_frame_resource_is_serialized() {
        let report = run(&config(1, 5)).unwrap();
        assert_eq!(report.verified_frames, 5);
        assert_eq!(report.stale_reads, 0);
    }

    #[test]
    fn test_cpu_stalls_when_ring_is_full() {
        const N: usize = 2;
        let mut sample = HeadlessFabric::new(&config(N, 0))
            .unwrap()
            .with_gpu_latency(Duration::ZERO);
        sample.initialize().unwrap();
        sample.on_resize(800, 600).unwrap();
        sample.queue().suspend();

        let mut timer = GameTimer::new();
        timer.reset();
        // 第一帧用槽位 1，第二帧用槽位 0，两个槽位都还没有被复用
        for _ in 0..N {
            timer.tick();
            sample.update(&timer).unwrap();
            sample.draw(&timer).unwrap();
        }
        assert_eq!(sample.pipeline().state(), FrameState::Submitted);
        assert_eq!(sample.fence().completed_value().value(), 0);

        let queue = sample.queue().clone();
        let release = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            queue.resume();
        });

        // 第三帧要复用槽位 1，必须等到第一帧完成
        let started = Instant::now();
        timer.tick();
        sample.update(&timer).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(40));
        assert!(sample.fence().completed_value().value() >= 1);
        sample.draw(&timer).unwrap();

        release.join().unwrap();
        sample.flush().unwrap();
        let report = sample.report();
        assert_eq!(report.verified_frames, 3);
        assert_eq!(report.stale_reads, 0);
    }
}
