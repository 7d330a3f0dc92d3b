use glam::{Quat, Vec3};
use rand::Rng;
use std::sync::Arc;

use oort_core::mesh::{Mesh, MeshHandle};
use oort_core::services::{EntityId, ObjectKind, Transform};

use crate::physics::{BodyHandle, Shape};

#[derive(Debug, Clone, PartialEq)]
pub enum KindData {
    Spaceship {
        /// Live lasers this ship has fired, oldest first.
        fired: Vec<EntityId>,
        cooldown: f32,
    },
    Laser {
        spawned_at: f64,
        owner: Option<EntityId>,
        direction: Vec3,
    },
    Asteroid {
        size: u32,
        /// Wave number the rock (or its ancestor) arrived with.
        batch: u32,
    },
    Wall,
}

impl KindData {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Spaceship { .. } => ObjectKind::Spaceship,
            Self::Laser { .. } => ObjectKind::Laser,
            Self::Asteroid { .. } => ObjectKind::Asteroid,
            Self::Wall => ObjectKind::Wall,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GameObject {
    pub id: EntityId,
    pub transform: Transform,
    pub body: Option<BodyHandle>,
    pub mesh: MeshHandle,
    pub alive: bool,
    pub data: KindData,
}

impl GameObject {
    pub fn kind(&self) -> ObjectKind {
        self.data.kind()
    }

    pub fn asteroid_size(&self) -> Option<u32> {
        match self.data {
            KindData::Asteroid { size, .. } => Some(size),
            _ => None,
        }
    }
}

/// Everything `EntityRegistry::create` needs except the id it allocates.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub data: KindData,
    pub mesh: MeshHandle,
    pub transform: Transform,
    pub shape: Shape,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    /// Zero for immovable bodies.
    pub mass: f32,
}

impl SpawnRequest {
    pub fn kind(&self) -> ObjectKind {
        self.data.kind()
    }

    pub fn ship(radius: f32, position: Vec3) -> Self {
        let mesh = Mesh::ship_hull(radius * 2.0, radius * 1.2);
        Self {
            data: KindData::Spaceship {
                fired: Vec::new(),
                cooldown: 0.0,
            },
            mesh: Arc::new(mesh),
            transform: Transform::from_position(position),
            shape: Shape::Sphere { radius },
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            mass: 1.0,
        }
    }

    /// A laser bolt leaving `muzzle` along the unit `direction`, oriented so
    /// its long axis follows the flight path.
    pub fn laser(
        owner: EntityId,
        muzzle: Vec3,
        direction: Vec3,
        inherited_velocity: Vec3,
        speed: f32,
        radius: f32,
        now: f64,
    ) -> Self {
        let mesh = Mesh::cuboid(Vec3::new(radius, radius, radius * 4.0));
        Self {
            data: KindData::Laser {
                spawned_at: now,
                owner: Some(owner),
                direction,
            },
            mesh: Arc::new(mesh),
            transform: Transform {
                position: muzzle,
                orientation: Quat::from_rotation_arc(Vec3::NEG_Z, direction),
                scale: 1.0,
            },
            shape: Shape::Sphere { radius },
            velocity: inherited_velocity + direction * speed,
            angular_velocity: Vec3::ZERO,
            mass: 0.01,
        }
    }

    /// The mesh must already be centred on its centroid; the collision
    /// sphere is fitted to it.
    pub fn asteroid(
        mesh: Mesh,
        size: u32,
        batch: u32,
        transform: Transform,
        velocity: Vec3,
        angular_velocity: Vec3,
        density: f32,
    ) -> Self {
        let radius = mesh.bounding_radius().max(0.05);
        let mass = (mesh.volume() * density).max(1e-3);
        Self {
            data: KindData::Asteroid { size, batch },
            mesh: Arc::new(mesh),
            transform,
            shape: Shape::Sphere { radius },
            velocity,
            angular_velocity,
            mass,
        }
    }

    /// One face of the arena box. `inward` points towards the origin.
    pub fn wall(inward: Vec3, half_extent: f32) -> Self {
        let inward = inward.normalize_or_zero();
        let point = -inward * half_extent;
        let mesh = Mesh::cuboid(Vec3::new(half_extent, half_extent, 0.25));
        Self {
            data: KindData::Wall,
            mesh: Arc::new(mesh),
            transform: Transform {
                // Panel sits just outside the half-space so the inner face
                // lines up with the collision plane.
                position: point - inward * 0.25,
                orientation: Quat::from_rotation_arc(Vec3::Z, inward),
                scale: 1.0,
            },
            shape: Shape::Plane {
                normal: inward,
                offset: inward.dot(point),
            },
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            mass: 0.0,
        }
    }
}

/// Arena walls: the six faces of an axis-aligned cube.
pub const WALL_NORMALS: [Vec3; 6] = [
    Vec3::X,
    Vec3::NEG_X,
    Vec3::Y,
    Vec3::NEG_Y,
    Vec3::Z,
    Vec3::NEG_Z,
];

/// Roughened icosphere, recentred so its centroid is the local origin.
pub fn rock_mesh(radius: f32, rng: &mut impl Rng) -> Mesh {
    let base = Mesh::icosphere(radius, 1);
    let rough = base.displaced(|p| p * rng.gen_range(0.8f32..1.1));
    rough.recentered().0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn rock_mesh_is_closed_and_centred() {
        let mut rng = StdRng::seed_from_u64(7);
        let mesh = rock_mesh(4.0, &mut rng);
        assert!(mesh.is_closed());
        assert!(mesh.volume() > 0.0);
        assert!(mesh.centroid().length() < 1e-3);
        assert!(mesh.bounding_radius() < 4.0 * 1.2);
    }

    #[test]
    fn same_seed_gives_same_rock() {
        let a = rock_mesh(2.0, &mut StdRng::seed_from_u64(99));
        let b = rock_mesh(2.0, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn wall_plane_faces_origin() {
        for normal in WALL_NORMALS {
            let request = SpawnRequest::wall(normal, 50.0);
            let Shape::Plane { normal: n, offset } = request.shape else {
                panic!("wall should be a plane");
            };
            // Origin is inside: signed distance equals the half extent.
            assert!((n.dot(Vec3::ZERO) - offset - 50.0).abs() < 1e-4);
            assert_eq!(request.kind(), ObjectKind::Wall);
            assert_eq!(request.mass, 0.0);
        }
    }

    #[test]
    fn laser_points_along_direction() {
        let request = SpawnRequest::laser(
            EntityId(1),
            Vec3::ZERO,
            Vec3::X,
            Vec3::ZERO,
            90.0,
            0.25,
            0.0,
        );
        assert!((request.transform.forward() - Vec3::X).length() < 1e-5);
        assert!((request.velocity - Vec3::new(90.0, 0.0, 0.0)).length() < 1e-4);
    }
}
