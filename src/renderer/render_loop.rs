//! 渲染循环
//!
//! [`Sample`] 是每个示例程序实现的能力接口；[`RenderLoop`] 持有计时器和暂停状态，
//! 每个 tick 依次调用 `update` 和 `draw`。窗口消息的转发见 [`crate::app`]。

use std::thread;
use std::time::Duration;

use winit::event::MouseButton;

use crate::core::error::Result;
use crate::core::input::MouseButtons;
use crate::core::timer::GameTimer;

/// 暂停时每个 tick 的睡眠时间
pub const PAUSED_SLEEP: Duration = Duration::from_millis(100);

/// 示例程序
pub trait Sample {
    /// 窗口标题
    fn title(&self) -> &str;

    /// 构建 GPU 资源，在第一次 `on_resize` 之前调用一次
    fn initialize(&mut self) -> Result<()>;

    /// 客户区大小改变
    fn on_resize(&mut self, width: u32, height: u32) -> Result<()>;

    /// 更新相机和常量缓冲区
    fn update(&mut self, timer: &GameTimer) -> Result<()>;

    /// 记录并提交命令
    fn draw(&mut self, timer: &GameTimer) -> Result<()>;

    fn on_mouse_down(&mut self, _button: MouseButton, _x: f32, _y: f32) {}

    fn on_mouse_up(&mut self, _button: MouseButton, _x: f32, _y: f32) {}

    fn on_mouse_move(&mut self, _buttons: MouseButtons, _x: f32, _y: f32) {}
}

/// 一秒内的帧统计
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStatsReport {
    pub fps: f32,
    /// 每帧毫秒数
    pub mspf: f32,
}

impl FrameStatsReport {
    /// `"<title>    fps: X   mspf: Y"`
    pub fn window_title(&self, title: &str) -> String {
        format!("{}    fps: {:.0}   mspf: {:.3}", title, self.fps, self.mspf)
    }
}

/// 帧率统计
#[derive(Debug, Default)]
pub struct FrameStats {
    frame_count: u32,
    time_elapsed: f32,
}

impl FrameStats {
    /// 记录一帧，每经过一秒总时间返回一次统计结果
    pub fn record(&mut self, total_time: f32) -> Option<FrameStatsReport> {
        self.frame_count += 1;

        let window = total_time - self.time_elapsed;
        if window < 1.0 {
            return None;
        }

        let fps = self.frame_count as f32 / window;
        self.frame_count = 0;
        self.time_elapsed += 1.0;
        Some(FrameStatsReport { fps, mspf: 1000.0 / fps })
    }
}

/// 一次 tick 的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// 暂停中，没有更新和绘制
    Paused,
    /// 完成一帧，可能附带帧统计
    Rendered(Option<FrameStatsReport>),
}

/// 渲染循环
pub struct RenderLoop {
    timer: GameTimer,
    stats: FrameStats,
    paused: bool,
    paused_sleep: Duration,
}

impl RenderLoop {
    pub fn new() -> Self {
        Self {
            timer: GameTimer::new(),
            stats: FrameStats::default(),
            paused: false,
            paused_sleep: PAUSED_SLEEP,
        }
    }

    /// 修改暂停时的睡眠时间
    pub fn with_paused_sleep(mut self, sleep: Duration) -> Self {
        self.paused_sleep = sleep;
        self
    }

    pub fn timer(&self) -> &GameTimer {
        &self.timer
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// 进入消息循环前调用
    pub fn start(&mut self) {
        self.timer.reset();
        self.paused = false;
    }

    /// 暂停（窗口失去焦点或最小化）
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            self.timer.stop();
        }
    }

    /// 恢复
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.timer.start();
        }
    }

    /// 执行一次循环
    pub fn tick<S: Sample + ?Sized>(&mut self, sample: &mut S) -> Result<TickOutcome> {
        self.timer.tick();

        if self.paused {
            thread::sleep(self.paused_sleep);
            return Ok(TickOutcome::Paused);
        }

        let report = self.stats.record(self.timer.total_time());
        sample.update(&self.timer)?;
        sample.draw(&self.timer)?;
        Ok(TickOutcome::Rendered(report))
    }
}

impl Default for RenderLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::RenderError;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
        fail_draw: bool,
    }

    impl Sample for Recorder {
        fn title(&self) -> &str {
            "recorder"
        }
        fn initialize(&mut self) -> Result<()> {
            self.calls.push("initialize");
            Ok(())
        }
        fn on_resize(&mut self, _width: u32, _height: u32) -> Result<()> {
            self.calls.push("resize");
            Ok(())
        }
        fn update(&mut self, _timer: &GameTimer) -> Result<()> {
            self.calls.push("update");
            Ok(())
        }
        fn draw(&mut self, _timer: &GameTimer) -> Result<()> {
            self.calls.push("draw");
            if self.fail_draw {
                return Err(RenderError::Runtime("draw failed".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_tick_updates_then_draws() {
        let mut render_loop = RenderLoop::new();
        let mut sample = Recorder::default();
        render_loop.start();
        assert!(matches!(render_loop.tick(&mut sample).unwrap(), TickOutcome::Rendered(_)));
        assert_eq!(sample.calls, vec!["update", "draw"]);
    }

    #[test]
    fn test_paused_tick_skips_sample() {
        let mut render_loop = RenderLoop::new().with_paused_sleep(Duration::from_millis(1));
        let mut sample = Recorder::default();
        render_loop.start();
        render_loop.pause();
        assert!(render_loop.timer().is_stopped());
        assert_eq!(render_loop.tick(&mut sample).unwrap(), TickOutcome::Paused);
        assert!(sample.calls.is_empty());

        render_loop.resume();
        assert!(!render_loop.timer().is_stopped());
        render_loop.tick(&mut sample).unwrap();
        assert_eq!(sample.calls, vec!["update", "draw"]);
    }

    #[test]
    fn test_draw_error_propagates() {
        let mut render_loop = RenderLoop::new();
        let mut sample = Recorder { fail_draw: true, ..Default::default() };
        render_loop.start();
        assert!(render_loop.tick(&mut sample).is_err());
    }

    #[test]
    fn test_frame_stats_once_per_second() {
        let mut stats = FrameStats::default();
        let mut reports = Vec::new();
        // 60 帧/秒，持续 2.5 秒
        for i in 1..=150 {
            if let Some(report) = stats.record(i as f32 / 60.0) {
                reports.push(report);
            }
        }
        assert_eq!(reports.len(), 2);
        assert!((reports[0].fps - 60.0).abs() < 0.5);
        assert!((reports[0].mspf - 16.667).abs() < 0.2);
        assert_eq!(
            FrameStatsReport { fps: 60.0, mspf: 16.6667 }.window_title("Box"),
            "Box    fps: 60   mspf: 16.667"
        );
    }
}
