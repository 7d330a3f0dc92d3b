//! Collision resolution: what each contact from a physics step means for the
//! game.
//!
//! Events are handled in the order the simulator reports them and the first
//! event naming an entity wins. Once an entity is destroyed by an earlier
//! event of the same step, later events naming it are dropped. Losing the
//! ship only changes state after every event of the step is resolved.

use glam::Vec3;

use oort_core::services::{EntityId, ObjectKind, Services, SoundId, Transform};

use crate::entity::{KindData, SpawnRequest};
use crate::orchestrator::FrameOrchestrator;
use crate::physics::CollisionEvent;
use crate::state::MenuAction;

impl FrameOrchestrator {
    pub(crate) fn resolve_collisions(
        &mut self,
        events: &[CollisionEvent],
        services: &mut Services<'_>,
    ) {
        let mut ship_lost = false;
        for event in events {
            let kinds = (
                self.registry.live(event.entity_a).map(|o| o.kind()),
                self.registry.live(event.entity_b).map(|o| o.kind()),
            );
            let (Some(kind_a), Some(kind_b)) = kinds else {
                log::trace!(
                    "Dropped stale contact {} x {}",
                    event.entity_a,
                    event.entity_b
                );
                continue;
            };
            ship_lost |= self.resolve_pair(event, kind_a, kind_b, services);
        }
        if ship_lost {
            self.mute_state().play(services.audio, SoundId::GameLoss);
            self.apply_menu(MenuAction::ShipDestroyed, services);
        }
    }

    /// Returns true when this contact destroyed the ship.

    fn resolve_pair(
        &mut self,
        event: &CollisionEvent,
        kind_a: ObjectKind,
        kind_b: ObjectKind,
        services: &mut Services<'_>,
    ) -> bool {
        use ObjectKind::*;
        let (a, b) = (event.entity_a, event.entity_b);
        match (kind_a, kind_b) {
            (Laser, Asteroid) => self.laser_hits_asteroid(a, b, event, services),
            (Asteroid, Laser) => self.laser_hits_asteroid(b, a, event, services),
            (Asteroid, Asteroid) => {
                self.physics
                    .bounce_pair(event.body_a, event.body_b, event.normal, event.penetration);
            }
            (Asteroid, Wall) => self.bounce_off_wall(a, b, event),
            (Wall, Asteroid) => self.bounce_off_wall(b, a, event),
            (Spaceship, Asteroid) => return self.ship_destroyed(a),
            (Asteroid, Spaceship) => return self.ship_destroyed(b),
            (Spaceship, Wall) | (Wall, Spaceship) => {
                let (ship, wall) = if kind_a == Spaceship { (a, b) } else { (b, a) };
                if self.config.ship.walls_are_hazards {
                    return self.ship_destroyed(ship);
                }
                self.bounce_off_wall(ship, wall, event);
            }
            (Laser, Wall) => {
                self.registry.destroy(a);
            }
            (Wall, Laser) => {
                self.registry.destroy(b);
            }
            (Laser, Laser) | (Laser, Spaceship) | (Spaceship, Laser) | (Wall, Wall) => {}
            (Spaceship, Spaceship) => {}
        }
        false
    }

    fn bounce_off_wall(&mut self, mover: EntityId, wall: EntityId, event: &CollisionEvent) {
        let Some(handle) = self.registry.live(mover).and_then(|o| o.body) else {
            return;
        };
        self.physics
            .bounce_off_static(handle, event.normal_from(wall), event.penetration);
    }

    fn ship_destroyed(&mut self, ship: EntityId) -> bool {
        if !self.registry.destroy(ship) {
            return false;
        }
        log::info!("Ship {ship} destroyed at score {}", self.score);
        true
    }

    fn laser_hits_asteroid(
        &mut self,
        laser: EntityId,
        asteroid: EntityId,
        event: &CollisionEvent,
        services: &mut Services<'_>,
    ) {
        let direction = self.laser_direction(laser);
        self.registry.destroy(laser);
        self.mute_state().play(services.audio, SoundId::AsteroidHit);

        let Some(rock) = self.registry.live(asteroid).cloned() else {
            return;
        };
        let Some(size) = rock.asteroid_size() else {
            return;
        };
        let batch = match rock.data {
            KindData::Asteroid { batch, .. } => batch,
            _ => 0,
        };

        if size <= self.config.asteroid.min_size {
            self.destroy_asteroid(asteroid, "minimum size");
            return;
        }

        let normal = event
            .normal
            .cross(direction)
            .try_normalize()
            .unwrap_or_else(|| direction.any_orthonormal_vector());
        let local_point = rock.transform.inverse_transform_point(event.point);
        let local_normal = rock.transform.inverse_transform_direction(normal);

        let (behind, in_front) = match self.slicer.slice(&rock.mesh, local_point, local_normal) {
            Ok(pieces) => pieces,
            Err(err) => {
                log::debug!("Slicing {asteroid} failed ({err}), destroying instead");
                self.destroy_asteroid(asteroid, "degenerate cut");
                return;
            }
        };

        let (velocity, spin) = rock
            .body
            .and_then(|h| self.physics.body(h))
            .map(|body| (body.velocity, body.angular_velocity))
            .unwrap_or((Vec3::ZERO, Vec3::ZERO));
        self.registry.destroy(asteroid);
        self.score += self.config.scoring.split_points;
        self.stats.splits += 1;

        let separation = self.config.asteroid.separation_speed;
        let density = self.config.asteroid.density;
        let mut spawned = 0;
        for (piece, side) in [(behind, -1.0f32), (in_front, 1.0)] {
            let (centred, local_centroid) = piece.recentered();
            let transform = Transform {
                position: rock.transform.transform_point(local_centroid),
                orientation: rock.transform.orientation,
                scale: 1.0,
            };
            let request = SpawnRequest::asteroid(
                centred,
                size - 1,
                batch,
                transform,
                velocity + normal * (side * separation),
                spin,
                density,
            );
            if self.spawn(request, services.render).is_some() {
                spawned += 1;
            }
        }
        log::debug!("Split {asteroid} (size {size}) into {spawned} fragments");
    }

    fn destroy_asteroid(&mut self, asteroid: EntityId, reason: &str) {
        if self.registry.destroy(asteroid) {
            self.score += self.config.scoring.destroy_points;
            self.stats.destroyed_asteroids += 1;
            log::debug!("Destroyed {asteroid} ({reason})");
        }
    }

    /// Direction of travel, falling back to the muzzle direction for a
    /// laser that has somehow stopped.
    fn laser_direction(&self, laser: EntityId) -> Vec3 {
        let Some(object) = self.registry.get(laser) else {
            return Vec3::NEG_Z;
        };
        let fired = match object.data {
            KindData::Laser { direction, .. } => direction,
            _ => Vec3::NEG_Z,
        };
        object
            .body
            .and_then(|h| self.physics.body(h))
            .and_then(|body| body.velocity.try_normalize())
            .unwrap_or(fired)
    }
}
