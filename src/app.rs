use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::KeyCode;
use winit::window::{Window, WindowAttributes, WindowId};

use crate::config::ViewerConfig;
use crate::error::{Result, ViewerError};
use crate::gpu::GpuContext;
use crate::input::{Input, OrbitDrag, wheel_lines};
use crate::orchestrator::RenderOrchestrator;
use crate::state::ViewerCommand;

/// Degrees the volume turns per arrow-key press.
pub const ROTATION_STEP_DEGREES: f32 = 15.0;

const PRESET_KEYS: [KeyCode; 4] = [
    KeyCode::Digit1,
    KeyCode::Digit2,
    KeyCode::Digit3,
    KeyCode::Digit4,
];

/// Open the viewer window and run until it is closed.
///
/// # Errors
///
/// Returns the first fatal error: window or GPU initialisation, shader
/// compilation, or an event-loop failure.
pub fn run(config: ViewerConfig) -> Result<()> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ViewerApp::Pending { config };
    event_loop.run_app(&mut app)?;

    match app {
        ViewerApp::Failed(error) => Err(error),
        _ => Ok(()),
    }
}

enum ViewerApp {
    Pending {
        config: ViewerConfig,
    },
    Running {
        window: Arc<Window>,
        orchestrator: RenderOrchestrator,
        input: Input,
        drag: OrbitDrag,
        start_time: Instant,
    },
    Failed(ViewerError),
}

impl ViewerApp {
    fn start(event_loop: &ActiveEventLoop, config: &ViewerConfig) -> Result<Self> {
        let window_attrs = WindowAttributes::default()
            .with_title(&config.window.title)
            .with_inner_size(winit::dpi::LogicalSize::new(
                config.window.width,
                config.window.height,
            ));
        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .map_err(|e| ViewerError::Window(e.to_string()))?,
        );

        let gpu = GpuContext::new(window.clone())?;
        let orchestrator = RenderOrchestrator::new(gpu, config)?;
        log::info!("viewer ready");

        Ok(Self::Running {
            window,
            orchestrator,
            input: Input::new(),
            drag: OrbitDrag::new(config.drag_delay()),
            start_time: Instant::now(),
        })
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let ViewerApp::Pending { config } = self {
            match Self::start(event_loop, config) {
                Ok(running) => *self = running,
                Err(error) => {
                    log::error!("startup failed: {error}");
                    *self = ViewerApp::Failed(error);
                    event_loop.exit();
                }
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let ViewerApp::Running {
            window,
            orchestrator,
            input,
            drag,
            start_time,
        } = self
        else {
            return;
        };

        input.handle_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                orchestrator.queue(ViewerCommand::Resize(size.width, size.height));
            }
            WindowEvent::MouseWheel { delta, .. } => {
                orchestrator.camera_mut().scroll(wheel_lines(&delta));
            }
            WindowEvent::DroppedFile(path) => {
                log::info!("loading dropped file {}", path.display());
                orchestrator.queue(ViewerCommand::LoadDataset(path));
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => {
                    let size = orchestrator.gpu().size();
                    drag.pointer_moved(input.mouse_position(), start_time.elapsed(), size);
                }
                ElementState::Released => drag.release(),
            },
            WindowEvent::CursorMoved { .. } if input.mouse_down(MouseButton::Left) => {
                let size = orchestrator.gpu().size();
                if let Some(delta) =
                    drag.pointer_moved(input.mouse_position(), start_time.elapsed(), size)
                {
                    orchestrator.camera_mut().orbit(delta.x, delta.y);
                }
            }
            WindowEvent::RedrawRequested => {
                if input.key_pressed(KeyCode::Escape) {
                    event_loop.exit();
                    return;
                }
                queue_key_commands(input, orchestrator);

                orchestrator.frame();

                input.end_frame();
                window.request_redraw();
            }
            _ => {}
        }
    }
}

fn queue_key_commands(input: &Input, orchestrator: &mut RenderOrchestrator) {
    if let Some(index) = PRESET_KEYS.iter().position(|&key| input.key_pressed(key)) {
        orchestrator.queue(ViewerCommand::SelectPreset(index));
    }

    if input.key_pressed(KeyCode::KeyR) {
        orchestrator.queue(ViewerCommand::SetRotation(Vec3::ZERO));
        return;
    }

    let step = rotation_step(input);
    if step != Vec3::ZERO {
        let rotation = orchestrator.state().rotation() + step;
        orchestrator.queue(ViewerCommand::SetRotation(rotation));
    }
}

fn rotation_step(input: &Input) -> Vec3 {
    let mut step = Vec3::ZERO;
    if input.key_pressed(KeyCode::ArrowUp) {
        step.x -= ROTATION_STEP_DEGREES;
    }
    if input.key_pressed(KeyCode::ArrowDown) {
        step.x += ROTATION_STEP_DEGREES;
    }
    if input.key_pressed(KeyCode::ArrowLeft) {
        step.y -= ROTATION_STEP_DEGREES;
    }
    if input.key_pressed(KeyCode::ArrowRight) {
        step.y += ROTATION_STEP_DEGREES;
    }
    step
}
