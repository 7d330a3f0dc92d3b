//! Rigid-body integration and contact detection for the arena.
//!
//! Bodies are spheres (ship, lasers, asteroids) or static half-space planes
//! (walls). `step` integrates every body, then reports contacts without
//! resolving them; the frame orchestrator decides per pair whether a contact
//! bounces, splits or destroys. The two bounce helpers at the bottom are the
//! only response code here.
//!
//! Determinism: bodies live in a `BTreeMap` keyed by monotonically increasing
//! handles and pairs are visited in handle order, so identical inputs always
//! produce the identical event list. No hash-ordered container is iterated.

use glam::{Quat, Vec3};
use std::collections::BTreeMap;

use oort_core::services::EntityId;

const EPS: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Sphere { radius: f32 },
    /// Solid half-space `normal . p < offset`; `normal` points into the arena.
    Plane { normal: Vec3, offset: f32 },
}

#[derive(Debug, Clone, Copy)]
pub struct BodyDesc {
    pub entity: EntityId,
    pub shape: Shape,
    pub position: Vec3,
    pub orientation: Quat,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    /// Zero means infinite mass.
    pub inverse_mass: f32,
}

#[cfg(test)]
impl BodyDesc {
    pub fn sphere(entity: EntityId, radius: f32, position: Vec3, mass: f32) -> Self {
        Self {
            entity,
            shape: Shape::Sphere { radius },
            position,
            orientation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            inverse_mass: if mass > 0.0 { 1.0 / mass } else { 0.0 },
        }
    }

    pub fn wall(entity: EntityId, inward_normal: Vec3, point_on_plane: Vec3) -> Self {
        let normal = inward_normal.normalize_or_zero();
        Self {
            entity,
            shape: Shape::Plane {
                normal,
                offset: normal.dot(point_on_plane),
            },
            position: point_on_plane,
            orientation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            inverse_mass: 0.0,
        }
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RigidBody {
    pub entity: EntityId,
    pub shape: Shape,
    pub position: Vec3,
    prev_position: Vec3,
    pub orientation: Quat,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub inverse_mass: f32,
}

impl RigidBody {
    fn from_desc(desc: BodyDesc) -> Self {
        Self {
            entity: desc.entity,
            shape: desc.shape,
            position: desc.position,
            prev_position: desc.position,
            orientation: desc.orientation,
            velocity: desc.velocity,
            angular_velocity: desc.angular_velocity,
            inverse_mass: desc.inverse_mass,
        }
    }

    pub fn is_static(&self) -> bool {
        self.inverse_mass == 0.0 && matches!(self.shape, Shape::Plane { .. })
    }
}

/// One contact found during a step. `normal` points from A towards B.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionEvent {
    pub entity_a: EntityId,
    pub entity_b: EntityId,
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub point: Vec3,
    pub normal: Vec3,
    pub relative_speed: f32,
    pub penetration: f32,
}

impl CollisionEvent {
    /// Contact normal pointing away from `entity`, towards the other party.
    pub fn normal_from(&self, entity: EntityId) -> Vec3 {
        if entity == self.entity_a {
            self.normal
        } else {
            -self.normal
        }
    }
}

struct Contact {
    point: Vec3,
    normal: Vec3,
    penetration: f32,
}

pub struct PhysicsSimulator {
    bodies: BTreeMap<BodyHandle, RigidBody>,
    next_handle: u32,
    pub max_step_dt: f32,
    pub step_count: u64,
}

impl PhysicsSimulator {
    pub fn new(max_step_dt: f32) -> Self {
        Self {
            bodies: BTreeMap::new(),
            next_handle: 1,
            max_step_dt,
            step_count: 0,
        }
    }

    pub fn add_body(&mut self, desc: BodyDesc) -> BodyHandle {
        let handle = BodyHandle(self.next_handle);
        self.next_handle += 1;
        self.bodies.insert(handle, RigidBody::from_desc(desc));
        handle
    }

    pub fn remove_body(&mut self, handle: BodyHandle) -> Option<RigidBody> {
        self.bodies.remove(&handle)
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(&handle)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(&handle)
    }

    #[cfg(test)]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Integrate every body by `dt` (clamped to `max_step_dt`) and return the
    /// contacts of the resulting configuration, ordered by body handle pair.
    pub fn step(&mut self, dt: f32) -> Vec<CollisionEvent> {
        let dt = if dt.is_finite() {
            dt.clamp(0.0, self.max_step_dt)
        } else {
            0.0
        };
        self.step_count += 1;

        for body in self.bodies.values_mut() {
            body.prev_position = body.position;
            if body.is_static() {
                continue;
            }
            body.position += body.velocity * dt;
            if body.angular_velocity != Vec3::ZERO {
                body.orientation =
                    (Quat::from_scaled_axis(body.angular_velocity * dt) * body.orientation)
                        .normalize();
            }
        }

        let entries: Vec<(&BodyHandle, &RigidBody)> = self.bodies.iter().collect();
        let mut events = Vec::new();
        for i in 0..entries.len() {
            for j in (i + 1)..entries.len() {
                let (&handle_a, a) = entries[i];
                let (&handle_b, b) = entries[j];
                if a.inverse_mass == 0.0 && b.inverse_mass == 0.0 && a.velocity == b.velocity {
                    continue;
                }
                if let Some(contact) = detect(a, b) {
                    events.push(CollisionEvent {
                        entity_a: a.entity,
                        entity_b: b.entity,
                        body_a: handle_a,
                        body_b: handle_b,
                        point: contact.point,
                        normal: contact.normal,
                        relative_speed: (a.velocity - b.velocity).length(),
                        penetration: contact.penetration,
                    });
                }
            }
        }
        events.sort_by_key(|e| (e.body_a, e.body_b));
        events
    }

    /// Reflect a body's velocity off an immovable surface whose normal points
    /// towards the body, and push it out of the surface. Returns false when
    /// the body was already moving away.
    pub fn bounce_off_static(&mut self, handle: BodyHandle, normal: Vec3, penetration: f32) -> bool {
        let Some(body) = self.bodies.get_mut(&handle) else {
            return false;
        };
        body.position += normal * penetration.max(0.0);
        let approach = body.velocity.dot(normal);
        if approach >= 0.0 {
            return false;
        }
        body.velocity -= 2.0 * approach * normal;
        true
    }

    /// Elastic impulse between two movable bodies along `normal` (A to B),
    /// plus mass-weighted separation. Returns false when they were separating.
    pub fn bounce_pair(
        &mut self,
        a: BodyHandle,
        b: BodyHandle,
        normal: Vec3,
        penetration: f32,
    ) -> bool {
        let (Some(body_a), Some(body_b)) = (self.bodies.get(&a), self.bodies.get(&b)) else {
            return false;
        };
        let (ima, imb) = (body_a.inverse_mass, body_b.inverse_mass);
        let total = ima + imb;
        if total <= 0.0 {
            return false;
        }
        let closing = (body_b.velocity - body_a.velocity).dot(normal);
        let correction = normal * penetration.max(0.0) / total;
        let impulse = if closing < 0.0 {
            -2.0 * closing / total
        } else {
            0.0
        };

        if let Some(body_a) = self.bodies.get_mut(&a) {
            body_a.position -= correction * ima;
            body_a.velocity -= normal * impulse * ima;
        }
        if let Some(body_b) = self.bodies.get_mut(&b) {
            body_b.position += correction * imb;
            body_b.velocity += normal * impulse * imb;
        }
        closing < 0.0
    }
}

impl Default for PhysicsSimulator {
    fn default() -> Self {
        Self::new(1.0 / 30.0)
    }
}

fn detect(a: &RigidBody, b: &RigidBody) -> Option<Contact> {
    match (a.shape, b.shape) {
        (Shape::Sphere { radius: ra }, Shape::Sphere { radius: rb }) => {
            sphere_sphere(a, ra, b, rb)
        }
        (Shape::Plane { normal, offset }, Shape::Sphere { radius }) => {
            sphere_plane(b.position, radius, normal, offset)
        }
        (Shape::Sphere { radius }, Shape::Plane { normal, offset }) => {
            sphere_plane(a.position, radius, normal, offset).map(|c| Contact {
                normal: -c.normal,
                ..c
            })
        }
        (Shape::Plane { .. }, Shape::Plane { .. }) => None,
    }
}

/// Swept test on the relative motion over the step, so a fast sphere cannot
/// pass through a small one between two samples.
fn sphere_sphere(a: &RigidBody, ra: f32, b: &RigidBody, rb: f32) -> Option<Contact> {
    let reach = ra + rb;
    let start = a.prev_position - b.prev_position;
    let end = a.position - b.position;
    let travel = end - start;

    let c = start.length_squared() - reach * reach;
    let t = if c <= 0.0 {
        0.0
    } else {
        let qa = travel.length_squared();
        if qa < EPS {
            return None;
        }
        let qb = start.dot(travel);
        let disc = qb * qb - qa * c;
        if disc < 0.0 {
            return None;
        }
        let t = (-qb - disc.sqrt()) / qa;
        if !(0.0..=1.0).contains(&t) {
            return None;
        }
        t
    };

    let pa = a.prev_position.lerp(a.position, t);
    let pb = b.prev_position.lerp(b.position, t);
    let separation = pb - pa;
    let normal = if separation.length_squared() > EPS {
        separation.normalize()
    } else if travel.length_squared() > EPS {
        -travel.normalize()
    } else {
        Vec3::Y
    };
    Some(Contact {
        point: pa + normal * ra,
        normal,
        penetration: (reach - end.length()).max(0.0),
    })
}

/// Normal in the result points from the plane towards the sphere.
fn sphere_plane(center: Vec3, radius: f32, normal: Vec3, offset: f32) -> Option<Contact> {
    let distance = normal.dot(center) - offset;
    if distance >= radius {
        return None;
    }
    Some(Contact {
        point: center - normal * distance,
        normal,
        penetration: radius - distance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(sim: &mut PhysicsSimulator, id: u32, radius: f32, pos: Vec3, vel: Vec3) -> BodyHandle {
        sim.add_body(BodyDesc::sphere(EntityId(id), radius, pos, 1.0).with_velocity(vel))
    }

    #[test]
    fn step_clamps_large_dt() {
        let mut sim = PhysicsSimulator::new(1.0 / 30.0);
        let h = sphere(&mut sim, 1, 1.0, Vec3::ZERO, Vec3::new(30.0, 0.0, 0.0));
        sim.step(1.0);
        let body = sim.body(h).expect("body exists");
        assert!((body.position.x - 1.0).abs() < 1e-4, "moved {}", body.position.x);
    }

    #[test]
    fn overlapping_spheres_report_contact_with_a_to_b_normal() {
        let mut sim = PhysicsSimulator::default();
        sphere(&mut sim, 1, 1.0, Vec3::ZERO, Vec3::ZERO);
        sphere(&mut sim, 2, 1.0, Vec3::new(1.5, 0.0, 0.0), Vec3::ZERO);
        let events = sim.step(0.0);
        assert_eq!(events.len(), 1);
        let event = events[0];
        assert_eq!(event.entity_a, EntityId(1));
        assert_eq!(event.entity_b, EntityId(2));
        assert!((event.normal - Vec3::X).length() < 1e-5);
        assert!((event.penetration - 0.5).abs() < 1e-5);
        assert_eq!(event.normal_from(EntityId(2)), -event.normal);
    }

    #[test]
    fn fast_sphere_does_not_tunnel_through_small_one() {
        let mut sim = PhysicsSimulator::new(1.0);
        // Travels 100 units in one step straight through a radius-0.5 target.
        sphere(&mut sim, 1, 0.1, Vec3::new(-50.0, 0.0, 0.0), Vec3::new(100.0, 0.0, 0.0));
        sphere(&mut sim, 2, 0.5, Vec3::ZERO, Vec3::ZERO);
        let events = sim.step(1.0);
        assert_eq!(events.len(), 1);
        assert!((events[0].point.x - -0.5).abs() < 1e-3);
    }

    #[test]
    fn sphere_against_wall_reports_inward_normal() {
        let mut sim = PhysicsSimulator::default();
        let wall = sim.add_body(BodyDesc::wall(EntityId(1), Vec3::NEG_X, Vec3::new(10.0, 0.0, 0.0)));
        let ball = sphere(&mut sim, 2, 1.0, Vec3::new(9.5, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0));
        let events = sim.step(0.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].body_a, wall);
        assert!((events[0].normal - Vec3::NEG_X).length() < 1e-5);

        assert!(sim.bounce_off_static(ball, events[0].normal, events[0].penetration));
        let body = sim.body(ball).expect("ball exists");
        assert!(body.velocity.x < 0.0);
        assert!(body.position.x <= 9.0 + 1e-4);
    }

    #[test]
    fn static_walls_never_collide_with_each_other() {
        let mut sim = PhysicsSimulator::default();
        sim.add_body(BodyDesc::wall(EntityId(1), Vec3::X, Vec3::new(-5.0, 0.0, 0.0)));
        sim.add_body(BodyDesc::wall(EntityId(2), Vec3::Y, Vec3::new(0.0, -5.0, 0.0)));
        assert!(sim.step(0.016).is_empty());
    }

    #[test]
    fn equal_mass_head_on_bounce_exchanges_velocities() {
        let mut sim = PhysicsSimulator::default();
        let a = sphere(&mut sim, 1, 1.0, Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0));
        let b = sphere(&mut sim, 2, 1.0, Vec3::new(1.9, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
        let events = sim.step(0.0);
        assert_eq!(events.len(), 1);
        assert!(sim.bounce_pair(a, b, events[0].normal, events[0].penetration));
        let va = sim.body(a).expect("a").velocity;
        let vb = sim.body(b).expect("b").velocity;
        assert!((va.x - -1.0).abs() < 1e-4);
        assert!((vb.x - 2.0).abs() < 1e-4);
        // Separating now: a second bounce is refused.
        assert!(!sim.bounce_pair(a, b, events[0].normal, 0.0));
    }

    #[test]
    fn collision_order_is_reproducible() {
        fn run() -> Vec<(EntityId, EntityId, [f32; 3])> {
            let mut sim = PhysicsSimulator::default();
            let half = 10.0;
            for (i, (normal, point)) in [
                (Vec3::X, Vec3::new(-half, 0.0, 0.0)),
                (Vec3::NEG_X, Vec3::new(half, 0.0, 0.0)),
                (Vec3::Z, Vec3::new(0.0, 0.0, -half)),
                (Vec3::NEG_Z, Vec3::new(0.0, 0.0, half)),
            ]
            .into_iter()
            .enumerate()
            {
                sim.add_body(BodyDesc::wall(EntityId(i as u32 + 1), normal, point));
            }
            let mut handles = Vec::new();
            for k in 0..8u32 {
                let angle = k as f32 * 0.785;
                let pos = Vec3::new(angle.cos() * 4.0, 0.0, angle.sin() * 4.0);
                let vel = Vec3::new(-angle.sin() * 6.0 + 1.0, 0.0, angle.cos() * 6.0);
                handles.push(sphere(&mut sim, 10 + k, 1.0, pos, vel));
            }
            let mut log = Vec::new();
            for frame in 0..240 {
                let dt = if frame % 3 == 0 { 1.0 / 30.0 } else { 1.0 / 60.0 };
                for event in sim.step(dt) {
                    log.push((event.entity_a, event.entity_b, event.point.to_array()));
                    let wall = sim.body(event.body_a).is_some_and(|b| b.is_static());
                    if wall {
                        sim.bounce_off_static(event.body_b, event.normal, event.penetration);
                    } else {
                        sim.bounce_pair(event.body_a, event.body_b, event.normal, event.penetration);
                    }
                }
            }
            log
        }

        let first = run();
        let second = run();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn removed_body_is_gone() {
        let mut sim = PhysicsSimulator::default();
        let h = sphere(&mut sim, 1, 1.0, Vec3::ZERO, Vec3::ZERO);
        assert!(sim.remove_body(h).is_some());
        assert!(sim.remove_body(h).is_none());
        assert_eq!(sim.body_count(), 0);
    }
}
