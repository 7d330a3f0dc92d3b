mod audio;
mod config;
mod controller;
mod entity;
mod orchestrator;
mod physics;
mod registry;
mod resolve;
mod slicer;
mod state;

#[cfg(test)]
mod replay;
#[cfg(test)]
mod testing;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use oort_core::input::{Action, InputService, InputState, Key, MouseBtn};
use oort_core::services::{
    FrameControl, FrameListener, ObjectKind, RenderTargetListener, Services, WindowEventListener,
};
use oort_core::time::FrameClock;
use oort_devtools::{GameOverlay, OverlayStats, ScreenState};
use oort_platform::PlatformConfig;
use oort_render::{GpuContext, SceneRenderer};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::audio::LogAudio;
use crate::config::{load_config_from_path, load_config_or_default, ConfigWatcher, GameConfig};
use crate::orchestrator::FrameOrchestrator;

const CONFIG_PATH: &str = "assets/config/oort.json";

struct EngineState {
    window: Arc<Window>,
    gpu: GpuContext,
    renderer: SceneRenderer,
    overlay: GameOverlay,
    screens: ScreenState,
    audio: LogAudio,
    input: InputState,
    /// Wall-clock source only; the orchestrator keeps its own clamped clock.
    frame_timer: FrameClock,
    orchestrator: FrameOrchestrator,
    config_watcher: ConfigWatcher,
}

impl EngineState {
    fn new(window: Arc<Window>, config: GameConfig) -> Result<Self, String> {
        let gpu = GpuContext::new(window.clone())?;
        let renderer = SceneRenderer::new(&gpu);
        let overlay = GameOverlay::new(&gpu.device, gpu.surface_format, &window);

        let mut orchestrator = FrameOrchestrator::new(config.clone());
        orchestrator.window_resized(gpu.size.0, gpu.size.1);

        Ok(Self {
            window,
            gpu,
            renderer,
            overlay,
            screens: ScreenState::new(),
            audio: LogAudio::default(),
            input: InputState::new(),
            frame_timer: FrameClock::new(config.physics.max_step_dt),
            orchestrator,
            config_watcher: ConfigWatcher::new(PathBuf::from(CONFIG_PATH)),
        })
    }

    /// Frame boundary: a bad file is logged and the running values stay.
    fn poll_config(&mut self) {
        if !self.config_watcher.should_reload() {
            return;
        }
        match load_config_from_path(self.config_watcher.path()) {
            Ok(config) => {
                log::info!("Config reloaded from {}", self.config_watcher.path().display());
                self.orchestrator.apply_config(config);
            }
            Err(err) => log::error!("Config reload failed, keeping previous values: {err}"),
        }
    }

    fn overlay_stats(&self) -> OverlayStats {
        let registry = self.orchestrator.registry();
        let stats = self.orchestrator.stats();
        OverlayStats {
            state_label: self.orchestrator.state().label().to_string(),
            camera_label: self.orchestrator.camera_view().label().to_string(),
            live_entities: registry.live_count() as u32,
            pending_destroy: registry.pending_count() as u32,
            lasers: registry.pool.count(ObjectKind::Laser) as u32,
            asteroids: registry.pool.count(ObjectKind::Asteroid) as u32,
            wave: registry.pool.wave,
            collisions: stats.collisions,
            splits: stats.splits,
            dropped_spawns: stats.dropped_spawns,
            triangles: self.renderer.scene.triangle_count() as u32,
            muted: self.orchestrator.mute_state().muted,
            paused: self.orchestrator.is_paused(),
        }
    }

    /// Returns false when the session asked to exit.
    fn run_frame(&mut self) -> bool {
        self.poll_config();

        let elapsed = self.frame_timer.measure();
        let control = {
            let mut services = Services {
                render: &mut self.renderer.scene,
                audio: &mut self.audio,
                gui: &mut self.screens,
            };
            self.orchestrator
                .frame_rendering_queued(elapsed, &mut self.input, &mut services)
        };
        if control == FrameControl::Exit {
            return false;
        }
        if self.input.is_action_triggered(Action::ToggleOverlay) {
            self.overlay.toggle_debug();
        }
        // Overlay clicks below are queued after this, so the next frame sees them.
        self.input.end_frame();

        let view = self.orchestrator.camera_view();
        self.orchestrator
            .pre_render_target_update(view, &mut self.renderer.scene);
        self.renderer.prepare(&self.gpu);
        self.orchestrator
            .post_render_target_update(view, &mut self.renderer.scene);

        self.render();
        true
    }

    fn render(&mut self) {
        let Some((output, view)) = self.gpu.begin_frame() else {
            return;
        };

        let stats = self.overlay_stats();
        let (egui_primitives, egui_textures_delta, overlay_actions) = self.overlay.prepare(
            &self.window,
            &self.screens,
            self.orchestrator.clock(),
            Some(stats),
        );

        for action in overlay_actions.menu {
            self.input.trigger_action(action);
        }
        if overlay_actions.toggle_pause {
            let paused = self.orchestrator.is_paused();
            self.orchestrator.set_paused(!paused);
        }
        if overlay_actions.single_step {
            self.orchestrator.request_single_step();
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.gpu.size.0, self.gpu.size.1],
            pixels_per_point: self.window.scale_factor() as f32,
        };

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        self.renderer
            .draw(&mut encoder, &view, &self.gpu.depth_view);

        self.overlay.upload(
            &self.gpu.device,
            &self.gpu.queue,
            &mut encoder,
            &egui_primitives,
            &egui_textures_delta,
            &screen_descriptor,
        );

        {
            let mut egui_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui Render Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();

            self.overlay
                .paint(&mut egui_pass, &egui_primitives, &screen_descriptor);
        }

        self.overlay.cleanup(&egui_textures_delta);

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
    }
}

struct App {
    config: GameConfig,
    state: Option<EngineState>,
}

impl App {
    fn new(config: GameConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let platform = PlatformConfig {
            title: self.config.window.title.clone(),
            width: self.config.window.width,
            height: self.config.window.height,
        };
        let window = match oort_platform::create_window(event_loop, &platform) {
            Ok(window) => window,
            Err(err) => {
                log::error!("{err}");
                event_loop.exit();
                return;
            }
        };
        log::info!("Window created: {}x{}", platform.width, platform.height);

        match EngineState::new(window, self.config.clone()) {
            Ok(state) => self.state = Some(state),
            Err(err) => {
                log::error!("Renderer setup failed: {err}");
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let state = match self.state.as_mut() {
            Some(s) => s,
            None => return,
        };

        let egui_consumed = state.overlay.handle_window_event(&state.window, &event);

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested");
                state.orchestrator.window_closed();
            }

            WindowEvent::Resized(physical_size) => {
                let w = physical_size.width;
                let h = physical_size.height;
                if w > 0 && h > 0 {
                    state.gpu.resize(w, h);
                    state.renderer.resize(w, h);
                    state.orchestrator.window_resized(w, h);
                }
            }

            WindowEvent::Focused(focused) => {
                state.orchestrator.window_focus_changed(focused);
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key_code) = event.physical_key {
                    forward_key(&mut state.input, key_code, event.state, egui_consumed);
                }
            }

            WindowEvent::MouseInput {
                state: button_state,
                button,
                ..
            } => {
                forward_mouse(&mut state.input, button, button_state, egui_consumed);
            }

            WindowEvent::CursorMoved { position, .. } => {
                state.input.mouse_position = (position.x, position.y);
            }

            WindowEvent::RedrawRequested => {
                if state.gpu.size.0 == 0 || state.gpu.size.1 == 0 {
                    return;
                }
                if !state.run_frame() {
                    log::info!("Exiting after {} frames", state.orchestrator.clock().frame_count);
                    event_loop.exit();
                }
            }

            _ => {}
        }
    }
}

/// Presses egui used stay with egui; releases always reach the game so a
/// key held while a menu opened over it cannot stick.
fn forward_key(input: &mut InputState, key_code: KeyCode, element: ElementState, egui_consumed: bool) {
    let Some(key) = map_key(key_code) else {
        return;
    };
    match element {
        ElementState::Pressed if !egui_consumed => input.key_down(key),
        ElementState::Pressed => {}
        ElementState::Released => input.key_up(key),
    }
}

fn forward_mouse(input: &mut InputState, button: MouseButton, element: ElementState, egui_consumed: bool) {
    let Some(btn) = map_mouse(button) else {
        return;
    };
    match element {
        ElementState::Pressed if !egui_consumed => input.mouse_down(btn),
        ElementState::Pressed => {}
        ElementState::Released => input.mouse_up(btn),
    }
}

fn map_key(key_code: KeyCode) -> Option<Key> {
    match key_code {
        KeyCode::ArrowLeft => Some(Key::Left),
        KeyCode::ArrowRight => Some(Key::Right),
        KeyCode::ArrowUp => Some(Key::Up),
        KeyCode::ArrowDown => Some(Key::Down),
        KeyCode::Escape => Some(Key::Escape),
        KeyCode::Space => Some(Key::Space),
        KeyCode::Enter | KeyCode::NumpadEnter => Some(Key::Enter),
        KeyCode::Backspace => Some(Key::Backspace),
        KeyCode::F3 => Some(Key::F3),
        KeyCode::KeyW => Some(Key::W),
        KeyCode::KeyA => Some(Key::A),
        KeyCode::KeyS => Some(Key::S),
        KeyCode::KeyD => Some(Key::D),
        KeyCode::KeyH => Some(Key::H),
        KeyCode::KeyM => Some(Key::M),
        KeyCode::KeyC => Some(Key::C),
        KeyCode::KeyP => Some(Key::P),
        KeyCode::KeyR => Some(Key::R),
        _ => None,
    }
}

fn map_mouse(button: MouseButton) -> Option<MouseBtn> {
    match button {
        MouseButton::Left => Some(MouseBtn::Left),
        MouseButton::Right => Some(MouseBtn::Right),
        MouseButton::Middle => Some(MouseBtn::Middle),
        _ => None,
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Oort starting...");
    let config = load_config_or_default(Path::new(CONFIG_PATH));

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            log::error!("Failed to create event loop: {err}");
            return;
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    if let Err(err) = event_loop.run_app(&mut app) {
        log::error!("Event loop error: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_bound_key_has_a_physical_key() {
        let codes = [
            KeyCode::Enter,
            KeyCode::KeyH,
            KeyCode::Backspace,
            KeyCode::Escape,
            KeyCode::KeyR,
            KeyCode::Space,
            KeyCode::KeyM,
            KeyCode::KeyC,
            KeyCode::KeyP,
            KeyCode::F3,
        ];
        let mut bound: Vec<Action> = codes
            .iter()
            .filter_map(|code| map_key(*code))
            .filter_map(Action::for_key)
            .collect();
        bound.dedup();
        for action in Action::ALL {
            assert!(bound.contains(action), "{action:?} has no key");
        }
    }

    #[test]
    fn left_click_fires() {
        let btn = map_mouse(MouseButton::Left).expect("mapped");
        assert_eq!(Action::for_mouse(btn), Some(Action::Fire));
    }

    #[test]
    fn release_reaches_input_even_when_egui_consumed_it() {
        let mut input = InputState::new();
        forward_key(&mut input, KeyCode::KeyW, ElementState::Pressed, false);
        assert!(input.is_held(Key::W));
        forward_key(&mut input, KeyCode::KeyW, ElementState::Released, true);
        assert!(!input.is_held(Key::W));

        forward_mouse(&mut input, MouseButton::Left, ElementState::Pressed, false);
        forward_mouse(&mut input, MouseButton::Left, ElementState::Released, true);
        assert!(!input.is_mouse_held(MouseBtn::Left));
    }

    #[test]
    fn consumed_press_is_not_forwarded() {
        let mut input = InputState::new();
        forward_key(&mut input, KeyCode::Enter, ElementState::Pressed, true);
        assert!(!input.is_held(Key::Enter));
        assert!(!input.is_action_pending(Action::Start));
    }
}
