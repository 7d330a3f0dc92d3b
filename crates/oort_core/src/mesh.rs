//! Indexed triangle meshes shared by physics, slicing and rendering.
//!
//! Meshes are closed and wound counter-clockwise when viewed from outside, so
//! the signed-tetrahedron volume is positive. Every consumer relies on that:
//! mass comes from `volume()`, fragment spawn points from `centroid()`, and
//! the slicer's caps are oriented against it.

use glam::Vec3;
use std::collections::HashMap;
use std::sync::Arc;

pub type MeshHandle = Arc<Mesh>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn new(positions: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Self {
        Self {
            positions,
            triangles,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn triangle(&self, index: usize) -> [Vec3; 3] {
        let [a, b, c] = self.triangles[index];
        [
            self.positions[a as usize],
            self.positions[b as usize],
            self.positions[c as usize],
        ]
    }

    /// Unnormalized face normal (length is twice the triangle area).
    pub fn face_normal(&self, index: usize) -> Vec3 {
        let [a, b, c] = self.triangle(index);
        (b - a).cross(c - a)
    }

    pub fn volume(&self) -> f32 {
        self.triangles
            .iter()
            .map(|&[a, b, c]| {
                let (p0, p1, p2) = (
                    self.positions[a as usize],
                    self.positions[b as usize],
                    self.positions[c as usize],
                );
                p0.dot(p1.cross(p2)) / 6.0
            })
            .sum()
    }

    /// Volume-weighted centroid. Falls back to the vertex average for
    /// zero-volume input.
    pub fn centroid(&self) -> Vec3 {
        let mut weighted = Vec3::ZERO;
        let mut total = 0.0f32;
        for &[a, b, c] in &self.triangles {
            let (p0, p1, p2) = (
                self.positions[a as usize],
                self.positions[b as usize],
                self.positions[c as usize],
            );
            let v = p0.dot(p1.cross(p2)) / 6.0;
            weighted += (p0 + p1 + p2) * (v / 4.0);
            total += v;
        }
        if total.abs() > f32::EPSILON {
            weighted / total
        } else if self.positions.is_empty() {
            Vec3::ZERO
        } else {
            self.positions.iter().copied().sum::<Vec3>() / self.positions.len() as f32
        }
    }

    /// Radius of the smallest origin-centred sphere containing every vertex.
    pub fn bounding_radius(&self) -> f32 {
        self.positions
            .iter()
            .map(|p| p.length())
            .fold(0.0f32, f32::max)
    }

    /// True when every directed edge has exactly one opposite twin, i.e. the
    /// surface is watertight and consistently wound.
    pub fn is_closed(&self) -> bool {
        if self.triangles.is_empty() {
            return false;
        }
        let mut directed: HashMap<(u32, u32), u32> = HashMap::new();
        for &[a, b, c] in &self.triangles {
            for edge in [(a, b), (b, c), (c, a)] {
                *directed.entry(edge).or_insert(0) += 1;
            }
        }
        directed
            .iter()
            .all(|(&(a, b), &count)| count == 1 && directed.get(&(b, a)) == Some(&1))
    }

    /// Translate so the centroid sits at the origin. Returns the new mesh and
    /// the centroid it was moved from.
    pub fn recentered(&self) -> (Mesh, Vec3) {
        let centroid = self.centroid();
        let positions = self.positions.iter().map(|&p| p - centroid).collect();
        (Mesh::new(positions, self.triangles.clone()), centroid)
    }

    pub fn displaced(&self, mut f: impl FnMut(Vec3) -> Vec3) -> Mesh {
        let positions = self.positions.iter().map(|&p| f(p)).collect();
        Mesh::new(positions, self.triangles.clone())
    }

    pub fn icosphere(radius: f32, subdivisions: u32) -> Mesh {
        let t = (1.0 + 5.0f32.sqrt()) / 2.0;
        let mut positions: Vec<Vec3> = [
            (-1.0, t, 0.0),
            (1.0, t, 0.0),
            (-1.0, -t, 0.0),
            (1.0, -t, 0.0),
            (0.0, -1.0, t),
            (0.0, 1.0, t),
            (0.0, -1.0, -t),
            (0.0, 1.0, -t),
            (t, 0.0, -1.0),
            (t, 0.0, 1.0),
            (-t, 0.0, -1.0),
            (-t, 0.0, 1.0),
        ]
        .iter()
        .map(|&(x, y, z)| Vec3::new(x, y, z).normalize())
        .collect();

        let mut triangles: Vec<[u32; 3]> = vec![
            [0, 11, 5],
            [0, 5, 1],
            [0, 1, 7],
            [0, 7, 10],
            [0, 10, 11],
            [1, 5, 9],
            [5, 11, 4],
            [11, 10, 2],
            [10, 7, 6],
            [7, 1, 8],
            [3, 9, 4],
            [3, 4, 2],
            [3, 2, 6],
            [3, 6, 8],
            [3, 8, 9],
            [4, 9, 5],
            [2, 4, 11],
            [6, 2, 10],
            [8, 6, 7],
            [9, 8, 1],
        ];

        for _ in 0..subdivisions {
            let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
            let mut next = Vec::with_capacity(triangles.len() * 4);
            for &[a, b, c] in &triangles {
                let ab = midpoint_index(&mut positions, &mut midpoints, a, b);
                let bc = midpoint_index(&mut positions, &mut midpoints, b, c);
                let ca = midpoint_index(&mut positions, &mut midpoints, c, a);
                next.push([a, ab, ca]);
                next.push([b, bc, ab]);
                next.push([c, ca, bc]);
                next.push([ab, bc, ca]);
            }
            triangles = next;
        }

        let positions = positions.into_iter().map(|p| p * radius).collect();
        Mesh::new(positions, triangles)
    }

    pub fn cuboid(half_extents: Vec3) -> Mesh {
        let positions = (0..8u32)
            .map(|i| {
                Vec3::new(
                    if i & 1 != 0 { half_extents.x } else { -half_extents.x },
                    if i & 2 != 0 { half_extents.y } else { -half_extents.y },
                    if i & 4 != 0 { half_extents.z } else { -half_extents.z },
                )
            })
            .collect();
        let triangles = vec![
            [0, 2, 1],
            [1, 2, 3],
            [4, 5, 6],
            [5, 7, 6],
            [0, 4, 2],
            [2, 4, 6],
            [1, 3, 5],
            [3, 7, 5],
            [0, 1, 4],
            [1, 5, 4],
            [2, 6, 3],
            [3, 6, 7],
        ];
        Mesh::new(positions, triangles)
    }

    /// Square pyramid pointing down -Z (the ship's forward axis).
    pub fn ship_hull(length: f32, width: f32) -> Mesh {
        let half_l = length * 0.5;
        let half_w = width * 0.5;
        let half_h = width * 0.25;
        let positions = vec![
            Vec3::new(0.0, 0.0, -half_l),
            Vec3::new(-half_w, -half_h, half_l),
            Vec3::new(half_w, -half_h, half_l),
            Vec3::new(half_w, half_h, half_l),
            Vec3::new(-half_w, half_h, half_l),
        ];
        let triangles = vec![
            [0, 1, 2],
            [0, 2, 3],
            [0, 3, 4],
            [0, 4, 1],
            [1, 3, 2],
            [1, 4, 3],
        ];
        let (mesh, _) = orient_convex(Mesh::new(positions, triangles)).recentered();
        mesh
    }
}

fn midpoint_index(
    positions: &mut Vec<Vec3>,
    cache: &mut HashMap<(u32, u32), u32>,
    a: u32,
    b: u32,
) -> u32 {
    let key = if a < b { (a, b) } else { (b, a) };
    if let Some(&index) = cache.get(&key) {
        return index;
    }
    let mid = ((positions[a as usize] + positions[b as usize]) * 0.5).normalize();
    let index = positions.len() as u32;
    positions.push(mid);
    cache.insert(key, index);
    index
}

/// Flip any triangle of a convex mesh whose normal faces the interior.
fn orient_convex(mut mesh: Mesh) -> Mesh {
    let inside = mesh.positions.iter().copied().sum::<Vec3>() / mesh.positions.len().max(1) as f32;
    for i in 0..mesh.triangles.len() {
        let [a, _, _] = mesh.triangle(i);
        if mesh.face_normal(i).dot(a - inside) < 0.0 {
            mesh.triangles[i].swap(1, 2);
        }
    }
    mesh
}
