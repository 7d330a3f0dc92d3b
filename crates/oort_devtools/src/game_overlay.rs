//! Game screens and debug panel rendered via egui on top of the 3D scene.
//!
//! Same three-phase split as any egui-wgpu integration:
//!
//!   1. `prepare()` -- run egui UI logic, produce tessellated primitives
//!   2. `upload()`  -- upload textures and update GPU buffers (borrows encoder mutably)
//!   3. `paint()`   -- render into a new render pass with `forget_lifetime()`
//!   4. `cleanup()` -- free textures egui no longer references
//!
//! Menu screens are always drawn when `ScreenState` says they are up. The
//! debug panel only runs when `debug_visible` is true (toggled by F3). Button
//! clicks never act directly; they come back as `OverlayActions` and the
//! binary queues them as input actions for the next frame.

use oort_core::input::Action;
use oort_core::services::Screen;
use oort_core::time::FrameClock;
use winit::window::Window;

use crate::screens::ScreenState;

#[derive(Debug, Clone, Default)]
pub struct OverlayStats {
    pub state_label: String,
    pub camera_label: String,
    pub live_entities: u32,
    /// Destroyed but not yet compacted.
    pub pending_destroy: u32,
    pub lasers: u32,
    pub asteroids: u32,
    pub wave: u32,
    pub collisions: u64,
    pub splits: u64,
    pub dropped_spawns: u64,
    pub triangles: u32,
    pub muted: bool,
    pub paused: bool,
}

#[derive(Debug, Clone, Default)]
pub struct OverlayActions {
    /// Actions from clicked menu buttons, in click order.
    pub menu: Vec<Action>,
    pub toggle_pause: bool,
    /// Advance one simulation step while paused.
    pub single_step: bool,
}

pub struct GameOverlay {
    pub egui_ctx: egui::Context,
    pub egui_winit_state: egui_winit::State,
    pub egui_renderer: egui_wgpu::Renderer,
    pub debug_visible: bool,
}

const CONTROLS: &[(&str, &str)] = &[
    ("W / S", "thrust forward / reverse"),
    ("A D / Left Right", "yaw"),
    ("Up / Down", "pitch"),
    ("Space / Left mouse", "fire laser"),
    ("C", "cycle camera"),
    ("M", "mute audio"),
    ("P", "pause"),
    ("F3", "debug panel"),
];

impl GameOverlay {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        window: &Window,
    ) -> Self {
        let egui_ctx = egui::Context::default();
        let egui_winit_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            window,
            None,
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(device, surface_format, None, 1, false);

        Self {
            egui_ctx,
            egui_winit_state,
            egui_renderer,
            debug_visible: false,
        }
    }

    pub fn handle_window_event(
        &mut self,
        window: &Window,
        event: &winit::event::WindowEvent,
    ) -> bool {
        let response = self.egui_winit_state.on_window_event(window, event);
        response.consumed
    }

    pub fn toggle_debug(&mut self) {
        self.debug_visible = !self.debug_visible;
        log::info!("Debug panel: {}", if self.debug_visible { "ON" } else { "OFF" });
    }

    pub fn prepare(
        &mut self,
        window: &Window,
        screens: &ScreenState,
        clock: &FrameClock,
        stats: Option<OverlayStats>,
    ) -> (
        Vec<egui::ClippedPrimitive>,
        egui::TexturesDelta,
        OverlayActions,
    ) {
        let mut actions = OverlayActions::default();
        let raw_input = self.egui_winit_state.take_egui_input(window);
        let debug_visible = self.debug_visible;
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            if screens.is_visible(Screen::Home) {
                home_screen(ctx, &mut actions);
            }
            if screens.is_visible(Screen::HowTo) {
                how_to_screen(ctx, &mut actions);
            }
            if screens.is_visible(Screen::Hud) {
                hud(ctx, screens.score());
            }
            if screens.is_visible(Screen::EndGame) {
                end_game_screen(ctx, screens.score(), &mut actions);
            }
            if debug_visible {
                debug_panel(ctx, clock, stats.as_ref(), &mut actions);
            }
        });

        self.egui_winit_state
            .handle_platform_output(window, full_output.platform_output);

        let primitives = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        (primitives, full_output.textures_delta, actions)
    }

    /// Upload textures and update buffers. Call before creating the egui render pass.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        primitives: &[egui::ClippedPrimitive],
        textures_delta: &egui::TexturesDelta,
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
    ) {
        for (id, image_delta) in &textures_delta.set {
            self.egui_renderer
                .update_texture(device, queue, *id, image_delta);
        }

        self.egui_renderer
            .update_buffers(device, queue, encoder, primitives, screen_descriptor);
    }

    /// Render into an existing render pass. Call after `upload()`.
    pub fn paint(
        &self,
        render_pass: &mut wgpu::RenderPass<'static>,
        primitives: &[egui::ClippedPrimitive],
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
    ) {
        self.egui_renderer
            .render(render_pass, primitives, screen_descriptor);
    }

    pub fn cleanup(&mut self, textures_delta: &egui::TexturesDelta) {
        for id in &textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}

fn menu_window(title: &'static str) -> egui::Window<'static> {
    egui::Window::new(title)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .collapsible(false)
        .resizable(false)
        .title_bar(false)
}

fn home_screen(ctx: &egui::Context, actions: &mut OverlayActions) {
    menu_window("Home").show(ctx, |ui| {
        ui.vertical_centered(|ui| {
            ui.heading(egui::RichText::new("OORT").size(48.0));
            ui.label("Clear the cloud. Don't get hit.");
            ui.add_space(16.0);
            if ui.button("Start  [Enter]").clicked() {
                actions.menu.push(Action::Start);
            }
            if ui.button("How to play  [H]").clicked() {
                actions.menu.push(Action::Help);
            }
            if ui.button("Quit  [Esc]").clicked() {
                actions.menu.push(Action::Quit);
            }
        });
    });
}

fn how_to_screen(ctx: &egui::Context, actions: &mut OverlayActions) {
    menu_window("How to play").show(ctx, |ui| {
        ui.heading("How to play");
        ui.label("Shoot asteroids to split them. The smallest ones shatter.");
        ui.label("A hit from any asteroid ends the run.");
        ui.separator();
        egui::Grid::new("controls").striped(true).show(ui, |ui| {
            for (keys, what) in CONTROLS {
                ui.monospace(*keys);
                ui.label(*what);
                ui.end_row();
            }
        });
        ui.separator();
        if ui.button("Back  [Backspace]").clicked() {
            actions.menu.push(Action::Back);
        }
    });
}

fn hud(ctx: &egui::Context, score: i64) {
    egui::Area::new(egui::Id::new("hud"))
        .anchor(egui::Align2::LEFT_TOP, [16.0, 12.0])
        .interactable(false)
        .show(ctx, |ui| {
            ui.label(
                egui::RichText::new(format!("Score {score}"))
                    .size(28.0)
                    .color(egui::Color32::WHITE),
            );
        });
}

fn end_game_screen(ctx: &egui::Context, score: i64, actions: &mut OverlayActions) {
    menu_window("Game over").show(ctx, |ui| {
        ui.vertical_centered(|ui| {
            ui.heading(egui::RichText::new("GAME OVER").size(40.0));
            ui.label(format!("Final score: {score}"));
            ui.add_space(12.0);
            if ui.button("Play again  [R]").clicked() {
                actions.menu.push(Action::Replay);
            }
            if ui.button("Main menu  [Esc]").clicked() {
                actions.menu.push(Action::Quit);
            }
        });
    });
}

fn debug_panel(
    ctx: &egui::Context,
    clock: &FrameClock,
    stats: Option<&OverlayStats>,
    actions: &mut OverlayActions,
) {
    egui::Window::new("Debug")
        .default_pos([10.0, 60.0])
        .show(ctx, |ui| {
            ui.label(format!("FPS: {:.1}", clock.smoothed_fps));
            ui.label(format!("Frame time: {:.2} ms", clock.smoothed_frame_time_ms));
            ui.label(format!("Frame: {}", clock.frame_count));
            ui.label(format!("Clamped frames: {}", clock.clamped_frames));
            let Some(stats) = stats else {
                return;
            };
            ui.separator();
            ui.label(format!("State: {}", stats.state_label));
            ui.label(format!("Camera: {}", stats.camera_label));
            ui.label(format!(
                "Entities: {} live, {} pending",
                stats.live_entities, stats.pending_destroy
            ));
            ui.label(format!(
                "Asteroids: {}  Lasers: {}  Wave: {}",
                stats.asteroids, stats.lasers, stats.wave
            ));
            ui.label(format!("Triangles: {}", stats.triangles));
            ui.label(format!(
                "Collisions: {}  Splits: {}  Dropped spawns: {}",
                stats.collisions, stats.splits, stats.dropped_spawns
            ));
            ui.label(if stats.muted { "Audio: muted" } else { "Audio: on" });

            ui.separator();
            ui.horizontal(|ui| {
                let pause_label = if stats.paused { "Resume" } else { "Pause" };
                if ui.button(pause_label).clicked() {
                    actions.toggle_pause = true;
                }
                if stats.paused && ui.button("Step").clicked() {
                    actions.single_step = true;
                }
            });
            if stats.paused {
                ui.label("\u{23f8} PAUSED");
            }
        });
}
