//! 窗口消息循环
//!
//! 把 winit 事件转发给 [`Sample`]，并在事件循环空闲时驱动 [`RenderLoop`]：
//!
//! - 失去焦点或最小化时暂停，恢复后继续
//! - 客户区大小改变时调用 `on_resize`（最小化时跳过）
//! - Escape 松开或关闭窗口时退出
//! - 每秒把帧率写到标题栏
//!
//! `update`/`draw` 返回的第一个错误会结束循环并由 [`run`] 返回。

use std::sync::Arc;

use tracing::{debug, error, info};
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::window::Window;

use crate::core::error::{RenderError, Result};
use crate::core::input::{is_escape_release, InputEvent, InputSystem};
use crate::renderer::{RenderLoop, Sample, TickOutcome};

/// 窗口是否应该渲染
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowActivity {
    focused: bool,
    minimized: bool,
}

impl Default for WindowActivity {
    fn default() -> Self {
        Self {
            focused: true,
            minimized: false,
        }
    }
}

impl WindowActivity {
    pub fn is_active(&self) -> bool {
        self.focused && !self.minimized
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    /// 按客户区大小更新最小化状态，返回窗口是否可见
    pub fn set_size(&mut self, width: u32, height: u32) -> bool {
        self.minimized = width == 0 || height == 0;
        !self.minimized
    }

    fn apply(&self, render_loop: &mut RenderLoop) {
        if self.is_active() {
            render_loop.resume();
        } else {
            render_loop.pause();
        }
    }
}

struct App<'a, S: Sample> {
    window: &'a Window,
    sample: S,
    render_loop: RenderLoop,
    input: InputSystem,
    activity: WindowActivity,
}

impl<'a, S: Sample> App<'a, S> {
    fn handle_window_event(&mut self, event: WindowEvent, elwt: &EventLoopWindowTarget<()>) -> Result<()> {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                elwt.exit();
            }
            WindowEvent::Resized(size) => {
                let visible = self.activity.set_size(size.width, size.height);
                self.activity.apply(&mut self.render_loop);
                if visible {
                    debug!(width = size.width, height = size.height, "Window resized");
                    self.sample.on_resize(size.width, size.height)?;
                }
            }
            WindowEvent::Focused(focused) => {
                self.activity.set_focused(focused);
                self.activity.apply(&mut self.render_loop);
                if !focused {
                    self.input.release_all();
                }
            }
            WindowEvent::KeyboardInput { event, .. } if is_escape_release(&event) => {
                info!("Escape released, shutting down");
                elwt.exit();
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if let Some(event) = self.input.on_mouse_button(button, state) {
                    self.dispatch(event);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let event = self.input.on_cursor_moved(position.x, position.y);
                self.dispatch(event);
            }
            _ => {}
        }
        Ok(())
    }

    fn dispatch(&mut self, event: InputEvent) {
        match event {
            InputEvent::MouseDown { button, x, y } => self.sample.on_mouse_down(button, x, y),
            InputEvent::MouseUp { button, x, y } => self.sample.on_mouse_up(button, x, y),
            InputEvent::MouseMove { buttons, x, y } => self.sample.on_mouse_move(buttons, x, y),
        }
    }

    fn tick(&mut self) -> Result<()> {
        if let TickOutcome::Rendered(Some(stats)) = self.render_loop.tick(&mut self.sample)? {
            self.window.set_title(&stats.window_title(self.sample.title()));
        }
        Ok(())
    }
}

/// 运行示例程序直到窗口关闭
///
/// `window` 必须是 `sample` 渲染的窗口。
pub fn run<S: Sample>(event_loop: EventLoop<()>, window: Arc<Window>, mut sample: S) -> Result<()> {
    sample.initialize()?;
    let size = window.inner_size();
    sample.on_resize(size.width, size.height)?;
    window.set_title(sample.title());

    let mut app = App {
        window: &window,
        sample,
        render_loop: RenderLoop::new(),
        input: InputSystem::new(),
        activity: WindowActivity::default(),
    };
    let mut failure = None;

    event_loop.set_control_flow(ControlFlow::Poll);
    app.render_loop.start();
    info!("Entering main loop");

    event_loop
        .run(|event, elwt| {
            let result = match event {
                Event::WindowEvent { window_id, event } if window_id == app.window.id() => {
                    app.handle_window_event(event, elwt)
                }
                Event::AboutToWait => app.tick(),
                _ => Ok(()),
            };

            if let Err(e) = result {
                if e.is_device_lost() {
                    error!("Device lost: {}", e);
                } else {
                    error!("Frame failed: {}", e);
                }
                failure = Some(e);
                elwt.exit();
            }
        })
        .map_err(|e| RenderError::Runtime(format!("Event loop error: {}", e)))?;

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimize_pauses_until_restored() {
        let mut render_loop = RenderLoop::new();
        render_loop.start();
        let mut activity = WindowActivity::default();

        assert!(!activity.set_size(0, 0));
        activity.apply(&mut render_loop);
        assert!(render_loop.is_paused());

        assert!(activity.set_size(640, 480));
        activity.apply(&mut render_loop);
        assert!(!render_loop.is_paused());
    }

    #[test]
    fn test_focus_and_minimize_combine() {
        let mut render_loop = RenderLoop::new();
        render_loop.start();
        let mut activity = WindowActivity::default();

        activity.set_focused(false);
        activity.set_size(0, 0);
        activity.apply(&mut render_loop);
        assert!(render_loop.is_paused());

        // 恢复大小但仍然没有焦点
        activity.set_size(800, 600);
        activity.apply(&mut render_loop);
        assert!(render_loop.is_paused());

        activity.set_focused(true);
        activity.apply(&mut render_loop);
        assert!(activity.is_active());
        assert!(!render_loop.is_paused());
    }
}
