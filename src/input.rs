use std::collections::HashSet;
use std::f32::consts::PI;
use std::time::Duration;

use glam::{UVec2, Vec2};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Still time after button-down before a press counts as a drag.
pub const DEFAULT_DRAG_DELAY: Duration = Duration::from_millis(50);

/// Tracks keyboard and mouse state between frames.
#[derive(Default)]
pub struct Input {
    keys_pressed: HashSet<KeyCode>,
    mouse_buttons_down: HashSet<MouseButton>,
    mouse_position: Vec2,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call at the end of each frame to reset per-frame state.
    pub fn end_frame(&mut self) {
        self.keys_pressed.clear();
    }

    /// Process a window event and update input state.
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    if event.state == ElementState::Pressed && !event.repeat {
                        self.keys_pressed.insert(key);
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => {
                    self.mouse_buttons_down.insert(*button);
                }
                ElementState::Released => {
                    self.mouse_buttons_down.remove(button);
                }
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.mouse_position = Vec2::new(position.x as f32, position.y as f32);
            }
            _ => {}
        }
    }

    /// Returns true if the key was pressed this frame.
    pub fn key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    /// Returns true if the mouse button is currently held down.
    pub fn mouse_down(&self, button: MouseButton) -> bool {
        self.mouse_buttons_down.contains(&button)
    }

    /// Current mouse position in window coordinates.
    pub fn mouse_position(&self) -> Vec2 {
        self.mouse_position
    }

}

/// Vertical extent of one wheel event in lines. Positive scrolls up.
pub fn wheel_lines(delta: &MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => *y,
        MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 120.0,
    }
}

/// Turns pointer drags into camera orbit increments.
///
/// A press only becomes a drag once the pointer has been held for
/// [`delay`](Self::delay); until then no rotation is produced, so a plain
/// click never nudges the camera.
#[derive(Clone, Debug)]
pub struct OrbitDrag {
    delay: Duration,
    last: Option<Vec2>,
    pressed_at: Duration,
}

impl Default for OrbitDrag {
    fn default() -> Self {
        Self::new(DEFAULT_DRAG_DELAY)
    }
}

impl OrbitDrag {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last: None,
            pressed_at: Duration::ZERO,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_tracking(&self) -> bool {
        self.last.is_some()
    }

    /// Forget the current drag. Call when the button is released.
    pub fn release(&mut self) {
        self.last = None;
    }

    /// Feed a pointer sample taken at `now` while the drag button is held.
    ///
    /// Returns `(Δφ, Δθ)` once the delay has elapsed: the displacement since
    /// the previous sample, normalised by the surface size and scaled by π.
    pub fn pointer_moved(&mut self, position: Vec2, now: Duration, surface: UVec2) -> Option<Vec2> {
        let Some(last) = self.last else {
            self.last = Some(position);
            self.pressed_at = now;
            return None;
        };

        if now.saturating_sub(self.pressed_at) <= self.delay {
            return None;
        }

        let size = surface.max(UVec2::ONE).as_vec2();
        self.last = Some(position);
        Some(PI * (last - position) / size)
    }
}
