//! Keyboard and mouse state owned by the frame loop.
use std::collections::HashSet;

use winit::keyboard::{Key, NamedKey};

/// Actions bound to keys in the preview window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    TogglePause,
    Reset,
    ToggleMute,
    Exit,
}

impl Control {
    pub fn from_key(key: &Key) -> Option<Self> {
        match key {
            Key::Named(NamedKey::Space) => Some(Control::TogglePause),
            Key::Named(NamedKey::Escape) => Some(Control::Exit),
            Key::Character(value) => match value.as_str() {
                " " => Some(Control::TogglePause),
                "r" | "R" => Some(Control::Reset),
                "m" | "M" => Some(Control::ToggleMute),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Left-button mouse state packed the way ShaderToy's `iMouse` expects.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct MouseState {
    /// Last cursor position seen, bottom-left origin.
    cursor: Option<[f32; 2]>,
    /// Position while the button was last held.
    drag: [f32; 2],
    /// Where the last click happened.
    click: [f32; 2],
    pressed: bool,
    /// Set on the frame a click lands, cleared by `end_frame`.
    click_pulse: bool,
    clicked: bool,
}

#[derive(Debug, Default)]
pub struct InputState {
    pressed_keys: HashSet<Key>,
    mouse: MouseState,
    height: f32,
}

impl InputState {
    pub fn new(surface_height: u32) -> Self {
        Self {
            height: surface_height as f32,
            ..Self::default()
        }
    }

    pub fn set_surface_height(&mut self, height: u32) {
        self.height = height as f32;
    }

    /// Records a key transition. Returns true for a fresh press, false for
    /// releases and auto-repeat.
    pub fn key(&mut self, key: Key, pressed: bool) -> bool {
        if pressed {
            self.pressed_keys.insert(key)
        } else {
            self.pressed_keys.remove(&key);
            false
        }
    }

    /// Cursor position in window pixels, top-left origin.
    pub fn cursor_moved(&mut self, x: f64, y: f64) {
        let position = [x as f32, self.height - y as f32];
        self.mouse.cursor = Some(position);
        if self.mouse.pressed {
            self.mouse.drag = position;
        }
    }

    pub fn mouse_button(&mut self, pressed: bool) {
        let mouse = &mut self.mouse;
        if pressed && !mouse.pressed {
            let position = mouse.cursor.unwrap_or_default();
            mouse.click = position;
            mouse.drag = position;
            mouse.click_pulse = true;
            mouse.clicked = true;
        }
        mouse.pressed = pressed;
    }

    /// `[x, y, ±click_x, ±click_y]`, all zero until the first click.
    pub fn mouse_uniform(&self) -> [f32; 4] {
        let mouse = &self.mouse;
        if !mouse.clicked {
            return [0.0; 4];
        }
        let [click_x, click_y] = mouse.click;
        [
            mouse.drag[0],
            mouse.drag[1],
            if mouse.pressed { click_x } else { -click_x },
            if mouse.click_pulse { click_y } else { -click_y },
        ]
    }

    /// Clears per-frame pulses once a frame has been rendered.
    pub fn end_frame(&mut self) {
        self.mouse.click_pulse = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mouse_is_zero_before_any_click() {
        let mut input = InputState::new(400);
        input.cursor_moved(10.0, 20.0);
        assert_eq!(input.mouse_uniform(), [0.0; 4]);
    }

    #[test]
    fn click_drag_release_follows_shadertoy_signs() {
        let mut input = InputState::new(400);
        input.cursor_moved(100.0, 150.0);
        input.mouse_button(true);
        assert_eq!(input.mouse_uniform(), [100.0, 250.0, 100.0, 250.0]);

        input.end_frame();
        input.cursor_moved(120.0, 100.0);
        assert_eq!(input.mouse_uniform(), [120.0, 300.0, 100.0, -250.0]);

        input.mouse_button(false);
        input.cursor_moved(300.0, 10.0);
        input.end_frame();
        assert_eq!(input.mouse_uniform(), [120.0, 300.0, -100.0, -250.0]);
    }

    #[test]
    fn click_pulse_survives_until_frame_end() {
        let mut input = InputState::new(100);
        input.cursor_moved(5.0, 25.0);
        input.mouse_button(true);
        input.mouse_button(false);
        assert_eq!(input.mouse_uniform()[3], 75.0);
        input.end_frame();
        assert_eq!(input.mouse_uniform()[3], -75.0);
    }

    #[test]
    fn key_presses_ignore_auto_repeat() {
        let mut input = InputState::new(100);
        let key = Key::Character("m".into());
        assert!(input.key(key.clone(), true));
        assert!(!input.key(key.clone(), true));
        assert!(!input.key(key.clone(), false));
        assert!(input.key(key, true));
    }

    #[test]
    fn controls_map_from_keys() {
        assert_eq!(
            Control::from_key(&Key::Named(NamedKey::Space)),
            Some(Control::TogglePause)
        );
        assert_eq!(
            Control::from_key(&Key::Character("R".into())),
            Some(Control::Reset)
        );
        assert_eq!(
            Control::from_key(&Key::Character("m".into())),
            Some(Control::ToggleMute)
        );
        assert_eq!(
            Control::from_key(&Key::Named(NamedKey::Escape)),
            Some(Control::Exit)
        );
        assert_eq!(Control::from_key(&Key::Character("q".into())), None);
    }
}
