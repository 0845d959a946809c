//! Input tracking for window messages
//!
//! The window loop feeds raw winit events into an [`InputSystem`], which keeps
//! the pressed mouse buttons and the last cursor position and turns them into
//! [`InputEvent`]s that a sample understands.

use winit::event::{ElementState, KeyEvent, MouseButton};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Snapshot of the mouse buttons held during a move
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MouseButtons {
    pub left: bool,
    pub right: bool,
    pub middle: bool,
}

impl MouseButtons {
    fn set(&mut self, button: MouseButton, pressed: bool) -> bool {
        match button {
            MouseButton::Left => self.left = pressed,
            MouseButton::Right => self.right = pressed,
            MouseButton::Middle => self.middle = pressed,
            _ => return false,
        }
        true
    }

    pub fn any(&self) -> bool {
        self.left || self.right || self.middle
    }
}

/// Mouse input translated into client-area coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    MouseDown { button: MouseButton, x: f32, y: f32 },
    MouseUp { button: MouseButton, x: f32, y: f32 },
    MouseMove { buttons: MouseButtons, x: f32, y: f32 },
}

/// Tracks mouse state between window messages
#[derive(Debug, Default)]
pub struct InputSystem {
    buttons: MouseButtons,
    cursor: (f32, f32),
}

impl InputSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buttons(&self) -> MouseButtons {
        self.buttons
    }

    pub fn cursor(&self) -> (f32, f32) {
        self.cursor
    }

    /// Process a mouse button event
    ///
    /// Buttons other than left/right/middle are ignored.
    pub fn on_mouse_button(&mut self, button: MouseButton, state: ElementState) -> Option<InputEvent> {
        let pressed = state == ElementState::Pressed;
        if !self.buttons.set(button, pressed) {
            return None;
        }

        let (x, y) = self.cursor;
        Some(if pressed {
            InputEvent::MouseDown { button, x, y }
        } else {
            InputEvent::MouseUp { button, x, y }
        })
    }

    /// Process a cursor move in physical pixels
    pub fn on_cursor_moved(&mut self, x: f64, y: f64) -> InputEvent {
        self.cursor = (x as f32, y as f32);
        InputEvent::MouseMove {
            buttons: self.buttons,
            x: self.cursor.0,
            y: self.cursor.1,
        }
    }

    /// Forget held buttons, e.g. when the window loses focus mid-drag
    pub fn release_all(&mut self) {
        self.buttons = MouseButtons::default();
    }
}

/// Returns true for a released Escape key
pub fn is_escape_release(event: &KeyEvent) -> bool {
    event.state == ElementState::Released
        && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_state_follows_events() {
        let mut input = InputSystem::new();
        input.on_cursor_moved(10.0, 20.0);

        let down = input.on_mouse_button(MouseButton::Left, ElementState::Pressed);
        assert_eq!(down, Some(InputEvent::MouseDown { button: MouseButton::Left, x: 10.0, y: 20.0 }));
        assert!(input.buttons().left);

        match input.on_cursor_moved(15.0, 25.0) {
            InputEvent::MouseMove { buttons, x, y } => {
                assert!(buttons.left && !buttons.right);
                assert_eq!((x, y), (15.0, 25.0));
            }
            other => panic!("unexpected {:?}", other),
        }

        let up = input.on_mouse_button(MouseButton::Left, ElementState::Released);
        assert_eq!(up, Some(InputEvent::MouseUp { button: MouseButton::Left, x: 15.0, y: 25.0 }));
        assert!(!input.buttons().any());
    }

    #[test]
    fn test_extra_buttons_ignored() {
        let mut input = InputSystem::new();
        assert_eq!(input.on_mouse_button(MouseButton::Back, ElementState::Pressed), None);
        assert!(!input.buttons().any());
    }

    #[test]
    fn test_release_all() {
        let mut input = InputSystem::new();
        input.on_mouse_button(MouseButton::Right, ElementState::Pressed);
        input.on_mouse_button(MouseButton::Middle, ElementState::Pressed);
        input.release_all();
        assert_eq!(input.buttons(), MouseButtons::default());
    }
}
