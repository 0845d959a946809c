//! 游戏计时器
//!
//! 跟踪每帧的时间间隔和总运行时间，支持暂停和恢复。
//! 暂停期间经过的时间不计入总时间。

use std::time::{Duration, Instant};

/// 游戏计时器
///
/// 典型用法：程序启动时调用 [`reset`](GameTimer::reset)，每帧调用一次
/// [`tick`](GameTimer::tick)，窗口失去焦点时 [`stop`](GameTimer::stop)，
/// 重新获得焦点时 [`start`](GameTimer::start)。
#[derive(Debug, Clone)]
pub struct GameTimer {
    base_time: Instant,
    prev_time: Instant,
    curr_time: Instant,
    stop_time: Option<Instant>,
    paused_time: Duration,
    delta_time: f64,
}

impl GameTimer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            base_time: now,
            prev_time: now,
            curr_time: now,
            stop_time: None,
            paused_time: Duration::ZERO,
            delta_time: 0.0,
        }
    }

    /// 上一次 tick 到本次 tick 的秒数
    pub fn delta_time(&self) -> f32 {
        self.delta_time as f32
    }

    /// 自 reset 以来的秒数，不含暂停时间
    pub fn total_time(&self) -> f32 {
        let end = self.stop_time.unwrap_or(self.curr_time);
        let elapsed = end.saturating_duration_since(self.base_time);
        elapsed.saturating_sub(self.paused_time).as_secs_f32()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_time.is_some()
    }

    /// 在消息循环开始前调用
    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    /// 从暂停中恢复
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    /// 暂停
    pub fn stop(&mut self) {
        self.stop_at(Instant::now());
    }

    /// 每帧调用一次
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    fn reset_at(&mut self, now: Instant) {
        self.base_time = now;
        self.prev_time = now;
        self.curr_time = now;
        self.stop_time = None;
        self.paused_time = Duration::ZERO;
        self.delta_time = 0.0;
    }

    fn start_at(&mut self, now: Instant) {
        if let Some(stop_time) = self.stop_time.take() {
            self.paused_time += now.saturating_duration_since(stop_time);
            self.prev_time = now;
        }
    }

    fn stop_at(&mut self, now: Instant) {
        if self.stop_time.is_none() {
            self.stop_time = Some(now);
        }
    }

    fn tick_at(&mut self, now: Instant) {
        if self.is_stopped() {
            self.delta_time = 0.0;
            return;
        }

        self.curr_time = now;
        // Instant 单调，但仍然防止出现负值
        self.delta_time = now.saturating_duration_since(self.prev_time).as_secs_f64();
        self.prev_time = now;
    }
}

impl Default for GameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_tick_measures_delta() {
        let t0 = Instant::now();
        let mut timer = GameTimer::new();
        timer.reset_at(t0);
        timer.tick_at(t0 + ms(16));
        assert!((timer.delta_time() - 0.016).abs() < 1e-6);
        timer.tick_at(t0 + ms(40));
        assert!((timer.delta_time() - 0.024).abs() < 1e-6);
        assert!((timer.total_time() - 0.040).abs() < 1e-6);
    }

    #[test]
    fn test_pause_excluded_from_total_time() {
        let t0 = Instant::now();
        let mut timer = GameTimer::new();
        timer.reset_at(t0);
        timer.tick_at(t0 + ms(100));

        timer.stop_at(t0 + ms(100));
        assert!(timer.is_stopped());
        timer.tick_at(t0 + ms(500));
        assert_eq!(timer.delta_time(), 0.0);
        assert!((timer.total_time() - 0.100).abs() < 1e-6);

        timer.start_at(t0 + ms(1100));
        assert!(!timer.is_stopped());
        timer.tick_at(t0 + ms(1150));
        assert!((timer.delta_time() - 0.050).abs() < 1e-6);
        assert!((timer.total_time() - 0.150).abs() < 1e-6);
    }

    #[test]
    fn test_repeated_stop_keeps_first_stop_time() {
        let t0 = Instant::now();
        let mut timer = GameTimer::new();
        timer.reset_at(t0);
        timer.stop_at(t0 + ms(10));
        timer.stop_at(t0 + ms(90));
        timer.start_at(t0 + ms(110));
        timer.tick_at(t0 + ms(120));
        assert!((timer.total_time() - 0.020).abs() < 1e-6);
    }

    #[test]
    fn test_start_without_stop_is_noop() {
        let t0 = Instant::now();
        let mut timer = GameTimer::new();
        timer.reset_at(t0);
        timer.start_at(t0 + ms(30));
        timer.tick_at(t0 + ms(50));
        assert!((timer.delta_time() - 0.050).abs() < 1e-6);
    }
}
