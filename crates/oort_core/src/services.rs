//! Contracts between the simulation core and the engine services around it.
//!
//! The core never owns a window, a GPU, a mixer or a widget toolkit. It drives
//! them through the narrow traits below, and receives its own per-frame entry
//! point through the three listener traits. The binary wires concrete
//! implementations together by composition.

use glam::{Mat4, Quat, Vec3};

use crate::input::InputService;
use crate::mesh::MeshHandle;

/// Stable integer handle for a simulated entity. Ids are never reused within
/// a process, so a stale id can be looked up safely and simply misses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u32);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKind {
    Spaceship,
    Laser,
    Asteroid,
    Wall,
}

impl ObjectKind {
    pub const ALL: &'static [ObjectKind] = &[
        ObjectKind::Spaceship,
        ObjectKind::Laser,
        ObjectKind::Asteroid,
        ObjectKind::Wall,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Spaceship => "spaceship",
            Self::Laser => "laser",
            Self::Asteroid => "asteroid",
            Self::Wall => "wall",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// World transform with uniform scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub orientation: Quat,
    pub scale: f32,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
        scale: 1.0,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(Vec3::splat(self.scale), self.orientation, self.position)
    }

    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.orientation * (local * self.scale)
    }

    pub fn inverse_transform_point(&self, world: Vec3) -> Vec3 {
        let scale = if self.scale.abs() > f32::EPSILON {
            self.scale
        } else {
            1.0
        };
        (self.orientation.inverse() * (world - self.position)) / scale
    }

    /// Rotate a direction into world space (no scale, no translation).
    pub fn transform_direction(&self, local: Vec3) -> Vec3 {
        self.orientation * local
    }

    pub fn inverse_transform_direction(&self, world: Vec3) -> Vec3 {
        self.orientation.inverse() * world
    }

    /// Ship convention: forward is local -Z.
    pub fn forward(&self) -> Vec3 {
        self.orientation * Vec3::NEG_Z
    }

    pub fn up(&self) -> Vec3 {
        self.orientation * Vec3::Y
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Screen {
    Home,
    HowTo,
    Hud,
    EndGame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundId {
    GameLoss,
    AsteroidHit,
    LaserShot,
    Menu,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraView {
    #[default]
    Overview,
    Chase,
    Cockpit,
}

impl CameraView {
    pub fn next(self) -> Self {
        match self {
            Self::Overview => Self::Chase,
            Self::Chase => Self::Cockpit,
            Self::Cockpit => Self::Overview,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Chase => "chase",
            Self::Cockpit => "cockpit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraRig {
    pub view: CameraView,
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            view: CameraView::Overview,
            eye: Vec3::new(0.0, 60.0, 120.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
        }
    }
}

/// Render-engine side of an entity: one mesh instance per live id.
pub trait RenderMeshService {
    fn attach_mesh(&mut self, id: EntityId, kind: ObjectKind, mesh: MeshHandle, transform: Transform);
    fn detach_mesh(&mut self, id: EntityId);
    fn update_transform(&mut self, id: EntityId, transform: Transform);
    fn set_visible(&mut self, id: EntityId, visible: bool);
    fn set_camera(&mut self, rig: CameraRig);
}

/// Fire-and-forget audio triggers. Nothing here may block the frame.
pub trait AudioService {
    fn play_sound(&mut self, sound: SoundId);
    fn mute_music(&mut self, mute: bool);
    fn start_music(&mut self);
    fn stop_music(&mut self);
}

pub trait GuiService {
    fn show_screen(&mut self, screen: Screen);
    fn hide_screen(&mut self, screen: Screen);
    fn set_score_text(&mut self, value: i64);
}

/// The output services one frame may touch.
pub struct Services<'a> {
    pub render: &'a mut dyn RenderMeshService,
    pub audio: &'a mut dyn AudioService,
    pub gui: &'a mut dyn GuiService,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameControl {
    Continue,
    Exit,
}

/// Invoked once per rendered frame with the elapsed wall time in seconds.
pub trait FrameListener {
    fn frame_rendering_queued(
        &mut self,
        elapsed: f64,
        input: &mut dyn InputService,
        services: &mut Services<'_>,
    ) -> FrameControl;
}

pub trait WindowEventListener {
    fn window_resized(&mut self, width: u32, height: u32);
    fn window_focus_changed(&mut self, focused: bool);
    fn window_closed(&mut self);
}

/// Hooks around drawing a camera's view, used to hide geometry the camera
/// sits inside of.
pub trait RenderTargetListener {
    fn pre_render_target_update(&mut self, view: CameraView, render: &mut dyn RenderMeshService);
    fn post_render_target_update(&mut self, view: CameraView, render: &mut dyn RenderMeshService);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_point_round_trips_through_inverse() {
        let transform = Transform {
            position: Vec3::new(3.0, -1.0, 2.0),
            orientation: Quat::from_rotation_y(0.7) * Quat::from_rotation_x(-0.3),
            scale: 2.5,
        };
        let local = Vec3::new(0.5, 1.0, -2.0);
        let back = transform.inverse_transform_point(transform.transform_point(local));
        assert!((back - local).length() < 1e-4);
    }

    #[test]
    fn forward_is_negative_z_for_identity() {
        assert_eq!(Transform::IDENTITY.forward(), Vec3::NEG_Z);
        assert_eq!(Transform::IDENTITY.up(), Vec3::Y);
    }

    #[test]
    fn camera_view_cycles_through_all_views() {
        let start = CameraView::default();
        assert_eq!(start.next().next().next(), start);
        assert_ne!(start.next(), start);
    }

    #[test]
    fn entity_id_orders_by_value() {
        assert!(EntityId(1) < EntityId(2));
        assert_eq!(format!("{}", EntityId(7)), "#7");
    }
}
