//! Per-frame driver of a game session.
//!
//! `FrameOrchestrator` owns the whole session context (state machine,
//! registry, physics, slicer, score, rng, camera and mute flags) and is handed
//! to the event loop as a `FrameListener`, `WindowEventListener` and
//! `RenderTargetListener`. The output services are borrowed per call, so the
//! orchestrator never holds on to the renderer, mixer or GUI.
//!
//! Frame order: clamp dt, consume input actions, simulate (SINGLE only),
//! compact destroyed entities, push transforms and camera, push score.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use oort_core::input::{Action, InputService};
use oort_core::services::{
    CameraRig, CameraView, EntityId, FrameControl, FrameListener, ObjectKind, RenderMeshService,
    RenderTargetListener, Screen, Services, SoundId, Transform, WindowEventListener,
};
use oort_core::time::FrameClock;

use crate::audio::MuteState;
use crate::config::GameConfig;
use crate::controller::{ShipController, ShipInput};
use crate::entity::{rock_mesh, KindData, SpawnRequest, WALL_NORMALS};
use crate::physics::PhysicsSimulator;
use crate::registry::EntityRegistry;
use crate::slicer::{MeshSlicer, PlaneSlicer};
use crate::state::{Effect, GameState, GameStateMachine, MenuAction};

/// Counters for the debug overlay.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionStats {
    pub collisions: u64,
    pub splits: u64,
    pub destroyed_asteroids: u64,
    pub dropped_spawns: u64,
}

pub struct FrameOrchestrator {
    pub(crate) config: GameConfig,
    pub(crate) clock: FrameClock,
    pub(crate) machine: GameStateMachine,
    pub(crate) registry: EntityRegistry,
    pub(crate) physics: PhysicsSimulator,
    pub(crate) slicer: Box<dyn MeshSlicer>,
    controller: ShipController,
    pub(crate) score: i64,
    pub(crate) session_time: f64,
    rng: StdRng,
    camera_view: CameraView,
    paused: bool,
    step_requested: bool,
    mute: MuteState,
    exit_requested: bool,
    booted: bool,
    pub(crate) stats: SessionStats,
}

impl FrameOrchestrator {
    pub fn new(config: GameConfig) -> Self {
        Self::with_slicer(config, Box::new(PlaneSlicer))
    }

    pub fn with_slicer(config: GameConfig, slicer: Box<dyn MeshSlicer>) -> Self {
        Self {
            clock: FrameClock::new(config.physics.max_step_dt),
            machine: GameStateMachine::new(),
            registry: EntityRegistry::new(&config.spawn),
            physics: PhysicsSimulator::new(config.physics.max_step_dt),
            slicer,
            controller: ShipController::from_config(&config.ship),
            score: 0,
            session_time: 0.0,
            rng: StdRng::seed_from_u64(config.spawn.seed),
            camera_view: CameraView::default(),
            paused: false,
            step_requested: false,
            mute: MuteState::default(),
            exit_requested: false,
            booted: false,
            stats: SessionStats::default(),
            config,
        }
    }

    pub fn state(&self) -> GameState {
        self.machine.current()
    }

    #[cfg(test)]
    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn camera_view(&self) -> CameraView {
        self.camera_view
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            log::info!("Simulation {}", if paused { "paused" } else { "resumed" });
        }
        self.paused = paused;
    }

    /// Advance exactly one simulation step on the next frame while paused.
    pub fn request_single_step(&mut self) {
        self.step_requested = true;
    }

    pub fn mute_state(&self) -> MuteState {
        self.mute
    }

    /// Reapply tuning between frames. Caps bind future spawns only and the
    /// arena size takes effect at the next arena spawn.
    pub fn apply_config(&mut self, config: GameConfig) {
        self.registry.pool.apply_config(&config.spawn);
        self.controller = ShipController::from_config(&config.ship);
        self.physics.max_step_dt = config.physics.max_step_dt;
        self.clock.max_dt = config.physics.max_step_dt;
        self.config = config;
        log::info!("Config applied");
    }

    fn boot(&mut self, services: &mut Services<'_>) {
        self.booted = true;
        services.gui.show_screen(Screen::Home);
        services.audio.start_music();
        self.mute.apply(services.audio);
    }

    /// Run a state-machine action: teardown, state change, setup. Returns
    /// false (and does nothing) when the action is illegal here.
    pub(crate) fn apply_menu(&mut self, action: MenuAction, services: &mut Services<'_>) -> bool {
        let Some(transition) = self.machine.request(action) else {
            log::debug!("Ignored {action:?} in {}", self.machine.current());
            return false;
        };
        for &effect in &transition.teardown {
            self.apply_effect(effect, services);
        }
        self.machine.enter(transition.next);
        for &effect in &transition.setup {
            self.apply_effect(effect, services);
        }
        true
    }

    fn apply_effect(&mut self, effect: Effect, services: &mut Services<'_>) {
        match effect {
            Effect::ClearDynamic => {
                let cleared = self.registry.clear(|kind| kind != ObjectKind::Wall);
                log::debug!("Cleared {cleared} dynamic objects");
            }
            Effect::ClearAll => {
                let cleared = self.registry.clear(|_| true);
                log::debug!("Cleared {cleared} objects");
            }
            Effect::ResetScore => {
                self.score = 0;
                services.gui.set_score_text(0);
            }
            Effect::SpawnArena => self.spawn_arena(services.render),
            Effect::ShowScreen(screen) => services.gui.show_screen(screen),
            Effect::HideScreen(screen) => services.gui.hide_screen(screen),
            Effect::StartMusic => {
                services.audio.start_music();
                self.mute.apply(services.audio);
            }
            Effect::StopMusic => services.audio.stop_music(),
            Effect::PlaySound(sound) => self.mute.play(services.audio, sound),
        }
    }

    /// Spawn through the registry if the current state allows it. Refused
    /// and over-cap requests are dropped with a debug line.
    pub(crate) fn spawn(
        &mut self,
        request: SpawnRequest,
        render: &mut dyn RenderMeshService,
    ) -> Option<EntityId> {
        let kind = request.kind();
        if !self.machine.current().permits_spawn(kind) {
            log::debug!("Dropped {kind} spawn in {}", self.machine.current());
            self.stats.dropped_spawns += 1;
            return None;
        }
        match self.registry.create(request, &mut self.physics, render) {
            Ok(id) => Some(id),
            Err(err) => {
                log::debug!("Dropped spawn: {err}");
                self.stats.dropped_spawns += 1;
                None
            }
        }
    }

    fn spawn_arena(&mut self, render: &mut dyn RenderMeshService) {
        self.rng = StdRng::seed_from_u64(self.config.spawn.seed);
        self.session_time = 0.0;
        let half = self.config.physics.arena_half_extent;
        for normal in WALL_NORMALS {
            self.spawn(SpawnRequest::wall(normal, half), render);
        }
        self.spawn(SpawnRequest::ship(self.config.ship.radius, Vec3::ZERO), render);

        let initial = self.config.spawn.initial_wave;
        self.registry.pool.begin_waves(initial);
        self.spawn_wave(initial, render);
        log::info!("Arena ready: {initial} asteroids, half extent {half}");
    }

    pub(crate) fn spawn_wave(&mut self, count: usize, render: &mut dyn RenderMeshService) {
        let size = self.config.spawn.initial_asteroid_size;
        let batch = self.registry.pool.wave;
        for _ in 0..count {
            let request = self.random_asteroid(size, batch);
            if self.spawn(request, render).is_none() {
                break;
            }
        }
    }

    fn random_asteroid(&mut self, size: u32, batch: u32) -> SpawnRequest {
        let asteroid = self.config.asteroid.clone();
        let radius = asteroid.radius_per_size * size as f32;
        let limit = (self.config.physics.arena_half_extent - radius * 1.2 - 1.0).max(0.0);
        let ship_position = self
            .registry
            .first_of(ObjectKind::Spaceship)
            .and_then(|id| self.registry.live(id))
            .map(|ship| ship.transform.position)
            .unwrap_or(Vec3::ZERO);

        let mut position = Vec3::ZERO;
        for _ in 0..16 {
            position = Vec3::new(
                self.rng.gen_range(-limit..=limit),
                self.rng.gen_range(-limit..=limit),
                self.rng.gen_range(-limit..=limit),
            );
            if position.distance(ship_position) >= asteroid.spawn_clearance + radius {
                break;
            }
        }

        let speed = self.rng.gen_range(asteroid.min_speed..=asteroid.max_speed);
        let velocity = random_unit(&mut self.rng) * speed;
        let spin = random_unit(&mut self.rng) * self.rng.gen_range(0.0..=asteroid.max_spin.max(0.0));
        let mesh = rock_mesh(radius, &mut self.rng);
        SpawnRequest::asteroid(
            mesh,
            size,
            batch,
            Transform::from_position(position),
            velocity,
            spin,
            asteroid.density,
        )
    }

    fn handle_actions(&mut self, input: &mut dyn InputService, services: &mut Services<'_>) {
        if self.machine.current() == GameState::Replay {
            self.apply_menu(MenuAction::Start, services);
        }

        for &menu in MenuAction::PLAYER {
            let Some(action) = menu.to_action() else {
                continue;
            };
            if !input.is_action_triggered(action) {
                continue;
            }
            if menu == MenuAction::Quit && self.machine.current() == GameState::Home {
                log::info!("Quit requested from HOME");
                self.exit_requested = true;
                continue;
            }
            self.apply_menu(menu, services);
        }

        if input.is_action_triggered(Action::ToggleMute) {
            self.mute.toggle();
            self.mute.apply(services.audio);
            log::info!("Audio {}", if self.mute.muted { "muted" } else { "unmuted" });
        }
        if input.is_action_triggered(Action::CycleCamera) {
            self.camera_view = self.camera_view.next();
            log::info!("Camera view: {}", self.camera_view.label());
        }
        if input.is_action_triggered(Action::TogglePause) {
            self.set_paused(!self.paused);
        }
    }

    fn simulate(&mut self, dt: f32, input: &mut dyn InputService, services: &mut Services<'_>) {
        self.session_time += f64::from(dt);

        self.control_ship(dt, input, services);
        self.expire_lasers();

        let events = self.physics.step(dt);
        self.registry.sync_from_physics(&self.physics);
        self.stats.collisions += events.len() as u64;
        self.resolve_collisions(&events, services);

        if self.machine.current() == GameState::Single {
            if let Some(count) = self.registry.pool.tick_respawn(dt) {
                log::info!("Wave {} incoming: {count} asteroids", self.registry.pool.wave);
                self.spawn_wave(count, services.render);
            }
        }
    }

    fn control_ship(&mut self, dt: f32, input: &mut dyn InputService, services: &mut Services<'_>) {
        let Some(ship_id) = self.registry.first_of(ObjectKind::Spaceship) else {
            return;
        };
        let Some(handle) = self.registry.live(ship_id).and_then(|o| o.body) else {
            return;
        };
        let intent = ShipInput::from_input(input);
        if let Some(body) = self.physics.body_mut(handle) {
            let (orientation, velocity) =
                self.controller
                    .step(intent, body.orientation, body.velocity, dt);
            body.orientation = orientation;
            body.velocity = velocity;
        }

        let mut ready = false;
        if let Some(KindData::Spaceship { cooldown, .. }) =
            self.registry.get_mut(ship_id).map(|o| &mut o.data)
        {
            *cooldown = (*cooldown - dt).max(0.0);
            ready = *cooldown <= 0.0;
        }
        if input.is_action_triggered(Action::Fire) && ready {
            self.fire_laser(ship_id, services);
        }
    }

    fn fire_laser(&mut self, ship_id: EntityId, services: &mut Services<'_>) {
        let Some(ship) = self.registry.live(ship_id) else {
            return;
        };
        let Some(body) = ship.body.and_then(|h| self.physics.body(h)) else {
            return;
        };
        let forward = body.orientation * Vec3::NEG_Z;
        let laser = &self.config.laser;
        let muzzle = body.position + forward * (self.config.ship.radius + laser.radius + 0.1);
        let request = SpawnRequest::laser(
            ship_id,
            muzzle,
            forward,
            body.velocity,
            laser.speed,
            laser.radius,
            self.session_time,
        );
        if self.spawn(request, services.render).is_some() {
            if let Some(KindData::Spaceship { cooldown, .. }) =
                self.registry.get_mut(ship_id).map(|o| &mut o.data)
            {
                *cooldown = self.config.laser.cooldown;
            }
            self.mute.play(services.audio, SoundId::LaserShot);
        }
    }

    fn expire_lasers(&mut self) {
        let lifetime = f64::from(self.config.laser.lifetime);
        let expired: Vec<EntityId> = self
            .registry
            .iter_kind(ObjectKind::Laser)
            .filter(|o| match o.data {
                KindData::Laser { spawned_at, .. } => self.session_time - spawned_at >= lifetime,
                _ => false,
            })
            .map(|o| o.id)
            .collect();
        for id in expired {
            self.registry.destroy(id);
        }
    }

    fn push_transforms(&mut self, render: &mut dyn RenderMeshService) {
        self.registry.sync_from_physics(&self.physics);
        for object in self.registry.iter_live() {
            render.update_transform(object.id, object.transform);
        }
        render.set_camera(self.camera_rig());
    }

    fn ship_transform(&self) -> Option<Transform> {
        self.registry
            .first_of(ObjectKind::Spaceship)
            .and_then(|id| self.registry.live(id))
            .map(|ship| ship.transform)
    }

    pub fn camera_rig(&self) -> CameraRig {
        let half = self.config.physics.arena_half_extent;
        let overview = CameraRig {
            view: CameraView::Overview,
            eye: Vec3::new(0.0, half * 0.75, half * 0.95),
            target: Vec3::ZERO,
            up: Vec3::Y,
        };
        let Some(ship) = self.ship_transform() else {
            return overview;
        };
        let forward = ship.forward();
        let up = ship.up();
        match self.camera_view {
            CameraView::Overview => overview,
            CameraView::Chase => CameraRig {
                view: CameraView::Chase,
                eye: ship.position - forward * 12.0 + up * 4.0,
                target: ship.position + forward * 10.0,
                up,
            },
            CameraView::Cockpit => CameraRig {
                view: CameraView::Cockpit,
                eye: ship.position + forward * (self.config.ship.radius * 0.5),
                target: ship.position + forward * 50.0,
                up,
            },
        }
    }
}

impl FrameListener for FrameOrchestrator {
    fn frame_rendering_queued(
        &mut self,
        elapsed: f64,
        input: &mut dyn InputService,
        services: &mut Services<'_>,
    ) -> FrameControl {
        if !self.booted {
            self.boot(services);
        }
        if self.exit_requested {
            return FrameControl::Exit;
        }

        let dt = self.clock.begin_frame(elapsed);
        self.handle_actions(input, services);
        if self.exit_requested {
            return FrameControl::Exit;
        }

        if self.machine.current() == GameState::Single {
            let step = !self.paused || std::mem::take(&mut self.step_requested);
            if step {
                self.simulate(dt, input, services);
            }
        }

        self.registry.compact(&mut self.physics, services.render);
        self.push_transforms(services.render);
        if self.machine.current() == GameState::Single {
            services.gui.set_score_text(self.score);
        }
        log::trace!(
            "Frame {} dt={dt:.4} state={} live={}",
            self.clock.frame_count,
            self.machine.current(),
            self.registry.live_count()
        );
        FrameControl::Continue
    }
}

impl WindowEventListener for FrameOrchestrator {
    fn window_resized(&mut self, width: u32, height: u32) {
        log::debug!("Viewport {width}x{height}");
    }

    fn window_focus_changed(&mut self, focused: bool) {
        if !focused && self.machine.current() == GameState::Single && !self.paused {
            log::info!("Focus lost, pausing");
            self.set_paused(true);
        }
    }

    fn window_closed(&mut self) {
        self.exit_requested = true;
    }
}

impl RenderTargetListener for FrameOrchestrator {
    fn pre_render_target_update(&mut self, view: CameraView, render: &mut dyn RenderMeshService) {
        if view == CameraView::Cockpit {
            if let Some(ship) = self.registry.first_of(ObjectKind::Spaceship) {
                render.set_visible(ship, false);
            }
        }
    }

    fn post_render_target_update(&mut self, view: CameraView, render: &mut dyn RenderMeshService) {
        if view == CameraView::Cockpit {
            if let Some(ship) = self.registry.first_of(ObjectKind::Spaceship) {
                render.set_visible(ship, true);
            }
        }
    }
}

fn random_unit(rng: &mut StdRng) -> Vec3 {
    let v = Vec3::new(
        rng.gen_range(-1.0f32..=1.0),
        rng.gen_range(-1.0f32..=1.0),
        rng.gen_range(-1.0f32..=1.0),
    );
    v.try_normalize().unwrap_or(Vec3::X)
}
