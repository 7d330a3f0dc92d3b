//! Recording fakes for the engine services.

use glam::Vec3;
use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use oort_core::mesh::{Mesh, MeshHandle};
use oort_core::services::{
    AudioService, CameraRig, EntityId, GuiService, ObjectKind, RenderMeshService, Screen,
    Services, SoundId, Transform,
};

use crate::slicer::{MeshSlicer, PlaneSlicer, SliceError};

#[derive(Debug, Clone)]
pub struct RenderedMesh {
    pub kind: ObjectKind,
    pub transform: Transform,
    pub visible: bool,
}

#[derive(Debug, Default)]
pub struct RecordingRender {
    pub attached: BTreeMap<EntityId, RenderedMesh>,
    pub detached: Vec<EntityId>,
    pub camera: Option<CameraRig>,
    pub transform_updates: usize,
    pub visibility_changes: Vec<(EntityId, bool)>,
}

impl RenderMeshService for RecordingRender {
    fn attach_mesh(&mut self, id: EntityId, kind: ObjectKind, _mesh: MeshHandle, transform: Transform) {
        self.attached.insert(
            id,
            RenderedMesh {
                kind,
                transform,
                visible: true,
            },
        );
    }

    fn detach_mesh(&mut self, id: EntityId) {
        self.attached.remove(&id);
        self.detached.push(id);
    }

    fn update_transform(&mut self, id: EntityId, transform: Transform) {
        if let Some(entry) = self.attached.get_mut(&id) {
            entry.transform = transform;
            self.transform_updates += 1;
        }
    }

    fn set_visible(&mut self, id: EntityId, visible: bool) {
        if let Some(entry) = self.attached.get_mut(&id) {
            entry.visible = visible;
        }
        self.visibility_changes.push((id, visible));
    }

    fn set_camera(&mut self, rig: CameraRig) {
        self.camera = Some(rig);
    }
}

#[derive(Debug, Default)]
pub struct RecordingAudio {
    pub sounds: Vec<SoundId>,
    pub music_muted: Option<bool>,
    pub music_starts: usize,
    pub music_stops: usize,
}

impl AudioService for RecordingAudio {
    fn play_sound(&mut self, sound: SoundId) {
        self.sounds.push(sound);
    }

    fn mute_music(&mut self, mute: bool) {
        self.music_muted = Some(mute);
    }

    fn start_music(&mut self) {
        self.music_starts += 1;
    }

    fn stop_music(&mut self) {
        self.music_stops += 1;
    }
}

#[derive(Debug, Default)]
pub struct RecordingGui {
    pub visible: BTreeSet<Screen>,
    pub shown: Vec<Screen>,
    pub score: Option<i64>,
}

impl GuiService for RecordingGui {
    fn show_screen(&mut self, screen: Screen) {
        self.visible.insert(screen);
        self.shown.push(screen);
    }

    fn hide_screen(&mut self, screen: Screen) {
        self.visible.remove(&screen);
    }

    fn set_score_text(&mut self, value: i64) {
        self.score = Some(value);
    }
}

/// All three fakes, lendable as one `Services` bundle.
#[derive(Debug, Default)]
pub struct Harness {
    pub render: RecordingRender,
    pub audio: RecordingAudio,
    pub gui: RecordingGui,
}

impl Harness {
    pub fn services(&mut self) -> Services<'_> {
        Services {
            render: &mut self.render,
            audio: &mut self.audio,
            gui: &mut self.gui,
        }
    }
}

/// Delegates to `PlaneSlicer` and counts calls through a shared cell.
#[derive(Debug, Default, Clone)]
pub struct CountingSlicer {
    pub calls: Rc<Cell<usize>>,
}

impl MeshSlicer for CountingSlicer {
    fn slice(
        &self,
        mesh: &Mesh,
        plane_point: Vec3,
        plane_normal: Vec3,
    ) -> Result<(Mesh, Mesh), SliceError> {
        self.calls.set(self.calls.get() + 1);
        PlaneSlicer.slice(mesh, plane_point, plane_normal)
    }
}
