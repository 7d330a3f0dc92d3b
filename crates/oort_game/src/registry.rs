//! Owns every game object and the spawn caps.
//!
//! Destruction is two-phase. `destroy` only marks the object dead, fixes the
//! counters and queues the id; the physics body and render mesh stay put
//! until `compact` runs at the end of the frame. Collision events from the
//! current step can therefore still name a destroyed id safely: lookups see
//! `alive == false` and skip it.

use std::collections::BTreeMap;
use thiserror::Error;

use oort_core::services::{EntityId, ObjectKind, RenderMeshService};

use crate::config::SpawnConfig;
use crate::entity::{GameObject, KindData, SpawnRequest};
use crate::physics::{BodyDesc, PhysicsSimulator};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    #[error("{kind} cap of {cap} reached")]
    CapacityExceeded { kind: ObjectKind, cap: usize },
}

/// Live counters, caps and wave bookkeeping.
#[derive(Debug, Clone)]
pub struct SpawnPool {
    pub laser_count: usize,
    pub asteroid_count: usize,
    pub ship_count: usize,
    pub wall_count: usize,
    pub laser_cap: usize,
    pub asteroid_cap: usize,
    /// Size of the next wave.
    pub respawn_n: usize,
    pub wave: u32,
    respawn_timer: f32,
    respawn_delay: f32,
    wave_growth: usize,
}

impl SpawnPool {
    pub const SHIP_CAP: usize = 1;

    pub fn from_config(spawn: &SpawnConfig) -> Self {
        Self {
            laser_count: 0,
            asteroid_count: 0,
            ship_count: 0,
            wall_count: 0,
            laser_cap: spawn.laser_cap,
            asteroid_cap: spawn.asteroid_cap,
            respawn_n: spawn.initial_wave.min(spawn.asteroid_cap),
            wave: 0,
            respawn_timer: 0.0,
            respawn_delay: spawn.respawn_delay,
            wave_growth: spawn.wave_growth,
        }
    }

    /// Reload path: new caps bind future spawns only, live objects stay.
    pub fn apply_config(&mut self, spawn: &SpawnConfig) {
        self.laser_cap = spawn.laser_cap;
        self.asteroid_cap = spawn.asteroid_cap;
        self.respawn_delay = spawn.respawn_delay;
        self.wave_growth = spawn.wave_growth;
        self.respawn_n = self.respawn_n.min(self.asteroid_cap);
    }

    pub fn count(&self, kind: ObjectKind) -> usize {
        match kind {
            ObjectKind::Spaceship => self.ship_count,
            ObjectKind::Laser => self.laser_count,
            ObjectKind::Asteroid => self.asteroid_count,
            ObjectKind::Wall => self.wall_count,
        }
    }

    pub fn cap(&self, kind: ObjectKind) -> Option<usize> {
        match kind {
            ObjectKind::Spaceship => Some(Self::SHIP_CAP),
            ObjectKind::Laser => Some(self.laser_cap),
            ObjectKind::Asteroid => Some(self.asteroid_cap),
            ObjectKind::Wall => None,
        }
    }

    pub fn check(&self, kind: ObjectKind) -> Result<(), SpawnError> {
        match self.cap(kind) {
            Some(cap) if self.count(kind) >= cap => Err(SpawnError::CapacityExceeded { kind, cap }),
            _ => Ok(()),
        }
    }

    fn counter_mut(&mut self, kind: ObjectKind) -> &mut usize {
        match kind {
            ObjectKind::Spaceship => &mut self.ship_count,
            ObjectKind::Laser => &mut self.laser_count,
            ObjectKind::Asteroid => &mut self.asteroid_count,
            ObjectKind::Wall => &mut self.wall_count,
        }
    }

    fn increment(&mut self, kind: ObjectKind) {
        *self.counter_mut(kind) += 1;
    }

    fn decrement(&mut self, kind: ObjectKind) {
        let counter = self.counter_mut(kind);
        *counter = counter.saturating_sub(1);
    }

    /// Start a fresh session: the first wave has `initial` rocks and the
    /// one after it is already grown.
    pub fn begin_waves(&mut self, initial: usize) {
        self.wave = 1;
        self.respawn_timer = 0.0;
        self.respawn_n = (initial + self.wave_growth).min(self.asteroid_cap);
    }

    /// Advance the empty-field timer. Returns the size of the wave to spawn
    /// once the field has been clear for the respawn delay.
    pub fn tick_respawn(&mut self, dt: f32) -> Option<usize> {
        if self.asteroid_count > 0 {
            self.respawn_timer = 0.0;
            return None;
        }
        self.respawn_timer += dt;
        if self.respawn_timer < self.respawn_delay {
            return None;
        }
        self.respawn_timer = 0.0;
        self.wave += 1;
        let size = self.respawn_n;
        self.respawn_n = (self.respawn_n + self.wave_growth).min(self.asteroid_cap);
        Some(size)
    }
}

pub struct EntityRegistry {
    objects: BTreeMap<EntityId, GameObject>,
    next_id: u32,
    pending: Vec<EntityId>,
    pub pool: SpawnPool,
}

impl EntityRegistry {
    pub fn new(spawn: &SpawnConfig) -> Self {
        Self {
            objects: BTreeMap::new(),
            next_id: 1,
            pending: Vec::new(),
            pool: SpawnPool::from_config(spawn),
        }
    }

    pub fn create(
        &mut self,
        request: SpawnRequest,
        physics: &mut PhysicsSimulator,
        render: &mut dyn RenderMeshService,
    ) -> Result<EntityId, SpawnError> {
        let kind = request.kind();
        self.pool.check(kind)?;

        let id = EntityId(self.next_id);
        self.next_id += 1;

        let body = physics.add_body(BodyDesc {
            entity: id,
            shape: request.shape,
            position: request.transform.position,
            orientation: request.transform.orientation,
            velocity: request.velocity,
            angular_velocity: request.angular_velocity,
            inverse_mass: if request.mass > 0.0 {
                1.0 / request.mass
            } else {
                0.0
            },
        });
        render.attach_mesh(id, kind, request.mesh.clone(), request.transform);

        if let KindData::Laser {
            owner: Some(owner), ..
        } = request.data
        {
            if let Some(KindData::Spaceship { fired, .. }) =
                self.objects.get_mut(&owner).map(|o| &mut o.data)
            {
                fired.push(id);
            }
        }

        self.objects.insert(
            id,
            GameObject {
                id,
                transform: request.transform,
                body: Some(body),
                mesh: request.mesh,
                alive: true,
                data: request.data,
            },
        );
        self.pool.increment(kind);
        log::trace!("Spawned {kind} {id}");
        Ok(id)
    }

    /// Mark dead and queue for compaction. False when the id is unknown or
    /// already dead; the counters move at most once per object.
    pub fn destroy(&mut self, id: EntityId) -> bool {
        let Some(object) = self.objects.get_mut(&id) else {
            return false;
        };
        if !object.alive {
            return false;
        }
        object.alive = false;
        let kind = object.kind();
        let owner = match object.data {
            KindData::Laser { owner, .. } => owner,
            _ => None,
        };

        if let Some(KindData::Spaceship { fired, .. }) =
            owner.and_then(|o| self.objects.get_mut(&o)).map(|o| &mut o.data)
        {
            fired.retain(|&laser| laser != id);
        }

        self.pool.decrement(kind);
        self.pending.push(id);
        log::trace!("Destroyed {kind} {id}");
        true
    }

    /// Release bodies and meshes of everything destroyed since the last call.
    pub fn compact(
        &mut self,
        physics: &mut PhysicsSimulator,
        render: &mut dyn RenderMeshService,
    ) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let mut released = 0;
        for id in pending {
            let Some(object) = self.objects.remove(&id) else {
                continue;
            };
            if let Some(body) = object.body {
                physics.remove_body(body);
            }
            render.detach_mesh(id);
            released += 1;
        }
        released
    }

    pub fn get(&self, id: EntityId) -> Option<&GameObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut GameObject> {
        self.objects.get_mut(&id)
    }

    /// The live object with this id, if any.
    pub fn live(&self, id: EntityId) -> Option<&GameObject> {
        self.objects.get(&id).filter(|o| o.alive)
    }

    #[cfg(test)]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.live(id).is_some()
    }

    pub fn iter_live(&self) -> impl Iterator<Item = &GameObject> + Clone + '_ {
        self.objects.values().filter(|o| o.alive)
    }

    /// Restartable: clone the iterator to walk the same objects again.
    pub fn iter_kind(&self, kind: ObjectKind) -> impl Iterator<Item = &GameObject> + Clone + '_ {
        self.objects
            .values()
            .filter(move |o| o.alive && o.kind() == kind)
    }

    #[cfg(test)]
    pub fn ids_of(&self, kind: ObjectKind) -> Vec<EntityId> {
        self.iter_kind(kind).map(|o| o.id).collect()
    }

    pub fn first_of(&self, kind: ObjectKind) -> Option<EntityId> {
        self.iter_kind(kind).next().map(|o| o.id)
    }

    /// Destroy every live object whose kind passes `filter`.
    pub fn clear(&mut self, filter: impl Fn(ObjectKind) -> bool) -> usize {
        let ids: Vec<EntityId> = self
            .iter_live()
            .filter(|o| filter(o.kind()))
            .map(|o| o.id)
            .collect();
        ids.into_iter().filter(|&id| self.destroy(id)).count()
    }

    pub fn live_count(&self) -> usize {
        self.objects.values().filter(|o| o.alive).count()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Copy integrated body poses back into the object transforms.
    pub fn sync_from_physics(&mut self, physics: &PhysicsSimulator) {
        for object in self.objects.values_mut().filter(|o| o.alive) {
            if let Some(body) = object.body.and_then(|h| physics.body(h)) {
                if body.is_static() {
                    continue;
                }
                object.transform.position = body.position;
                object.transform.orientation = body.orientation;
            }
        }
    }
}
