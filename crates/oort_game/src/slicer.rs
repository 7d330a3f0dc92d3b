//! Plane cuts of closed triangle meshes.
//!
//! Fragment A is the part behind the plane (`normal . (p - point) < 0`) and
//! its cap faces `+normal`; fragment B is the part in front and its cap faces
//! `-normal`. Vertices within `EPS` of the plane count as lying on it and are
//! kept with fragment B, so a plane that only grazes the mesh is reported as
//! degenerate instead of producing a zero-volume sliver.

use glam::Vec3;
use std::collections::HashMap;
use thiserror::Error;

use oort_core::mesh::Mesh;

const EPS: f32 = 1e-5;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SliceError {
    #[error("cut plane does not split the mesh")]
    DegenerateCut,
    #[error("mesh has no triangles")]
    EmptyMesh,
    #[error("triangle index {index} out of range for {vertices} vertices")]
    IndexOutOfRange { index: u32, vertices: usize },
}

pub trait MeshSlicer {
    /// Split `mesh` by the plane through `plane_point` with `plane_normal`.
    /// Returns `(behind, in_front)`; the input is left untouched.
    fn slice(
        &self,
        mesh: &Mesh,
        plane_point: Vec3,
        plane_normal: Vec3,
    ) -> Result<(Mesh, Mesh), SliceError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlaneSlicer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Corner {
    Original(u32),
    Cut(usize),
}

/// Vertex remapping for one output fragment.
#[derive(Default)]
struct FragmentBuilder {
    positions: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
    remap: HashMap<Corner, u32>,
}

impl FragmentBuilder {
    fn index(&mut self, corner: Corner, source: &[Vec3], cuts: &[Vec3]) -> u32 {
        if let Some(&index) = self.remap.get(&corner) {
            return index;
        }
        let position = match corner {
            Corner::Original(i) => source[i as usize],
            Corner::Cut(i) => cuts[i],
        };
        let index = self.push_point(position);
        self.remap.insert(corner, index);
        index
    }

    /// Fan-triangulate a convex polygon of 3 or 4 corners.
    fn push_polygon(&mut self, polygon: &[Corner], source: &[Vec3], cuts: &[Vec3]) {
        let indices: Vec<u32> = polygon
            .iter()
            .map(|&corner| self.index(corner, source, cuts))
            .collect();
        for k in 1..indices.len().saturating_sub(1) {
            self.triangles.push([indices[0], indices[k], indices[k + 1]]);
        }
    }

    fn push_point(&mut self, position: Vec3) -> u32 {
        self.positions.push(position);
        (self.positions.len() - 1) as u32
    }

    fn finish(self) -> Mesh {
        Mesh::new(self.positions, self.triangles)
    }
}

impl MeshSlicer for PlaneSlicer {
    fn slice(
        &self,
        mesh: &Mesh,
        plane_point: Vec3,
        plane_normal: Vec3,
    ) -> Result<(Mesh, Mesh), SliceError> {
        if mesh.is_empty() {
            return Err(SliceError::EmptyMesh);
        }
        let vertices = mesh.positions.len();
        if let Some(&index) = mesh
            .triangles
            .iter()
            .flatten()
            .find(|&&i| i as usize >= vertices)
        {
            return Err(SliceError::IndexOutOfRange { index, vertices });
        }
        let normal = plane_normal.normalize_or_zero();
        if normal == Vec3::ZERO {
            return Err(SliceError::DegenerateCut);
        }

        let distances: Vec<f32> = mesh
            .positions
            .iter()
            .map(|&p| {
                let d = normal.dot(p - plane_point);
                if d.abs() <= EPS {
                    0.0
                } else {
                    d
                }
            })
            .collect();
        let referenced = mesh.triangles.iter().flatten();
        let any_behind = referenced.clone().any(|&i| distances[i as usize] < 0.0);
        let any_front = referenced.clone().any(|&i| distances[i as usize] > 0.0);
        if !any_behind || !any_front {
            return Err(SliceError::DegenerateCut);
        }

        let mut cut_positions: Vec<Vec3> = Vec::new();
        let mut cut_cache: HashMap<(u32, u32), usize> = HashMap::new();
        let mut behind = FragmentBuilder::default();
        let mut front = FragmentBuilder::default();
        // Directed along fragment B's boundary.
        let mut segments: Vec<(usize, usize)> = Vec::new();

        for &tri in &mesh.triangles {
            let mut front_poly: Vec<Corner> = Vec::with_capacity(4);
            let mut behind_poly: Vec<Corner> = Vec::with_capacity(4);
            for k in 0..3 {
                let a = tri[k];
                let b = tri[(k + 1) % 3];
                let a_front = distances[a as usize] >= 0.0;
                let b_front = distances[b as usize] >= 0.0;
                if a_front {
                    front_poly.push(Corner::Original(a));
                } else {
                    behind_poly.push(Corner::Original(a));
                }
                if a_front != b_front {
                    let key = if a < b { (a, b) } else { (b, a) };
                    let cut = *cut_cache.entry(key).or_insert_with(|| {
                        let (lo, hi) = key;
                        let (d_lo, d_hi) = (distances[lo as usize], distances[hi as usize]);
                        let t = (d_lo / (d_lo - d_hi)).clamp(0.0, 1.0);
                        let p = mesh.positions[lo as usize]
                            .lerp(mesh.positions[hi as usize], t);
                        cut_positions.push(p);
                        cut_positions.len() - 1
                    });
                    front_poly.push(Corner::Cut(cut));
                    behind_poly.push(Corner::Cut(cut));
                }
            }

            if front_poly.len() >= 3 {
                let m = front_poly.len();
                for i in 0..m {
                    if let (Corner::Cut(u), Corner::Cut(v)) = (front_poly[i], front_poly[(i + 1) % m]) {
                        segments.push((u, v));
                    }
                }
                front.push_polygon(&front_poly, &mesh.positions, &cut_positions);
            }
            if behind_poly.len() >= 3 {
                behind.push_polygon(&behind_poly, &mesh.positions, &cut_positions);
            }
        }

        if segments.len() < 3 {
            return Err(SliceError::DegenerateCut);
        }

        let centre = segments
            .iter()
            .map(|&(u, _)| cut_positions[u])
            .sum::<Vec3>()
            / segments.len() as f32;
        let basis_u = normal.any_orthonormal_vector();
        let basis_v = normal.cross(basis_u);
        let angle = |p: Vec3| {
            let r = p - centre;
            r.dot(basis_v).atan2(r.dot(basis_u))
        };
        segments.sort_by(|&(a0, a1), &(b0, b1)| {
            let ma = angle((cut_positions[a0] + cut_positions[a1]) * 0.5);
            let mb = angle((cut_positions[b0] + cut_positions[b1]) * 0.5);
            ma.total_cmp(&mb)
        });

        let front_centre = front.push_point(centre);
        let behind_centre = behind.push_point(centre);
        for &(u, v) in &segments {
            let fu = front.index(Corner::Cut(u), &mesh.positions, &cut_positions);
            let fv = front.index(Corner::Cut(v), &mesh.positions, &cut_positions);
            front.triangles.push([front_centre, fv, fu]);
            let bu = behind.index(Corner::Cut(u), &mesh.positions, &cut_positions);
            let bv = behind.index(Corner::Cut(v), &mesh.positions, &cut_positions);
            behind.triangles.push([behind_centre, bu, bv]);
        }

        let (a, b) = (behind.finish(), front.finish());
        if !a.is_closed() || !b.is_closed() {
            log::debug!("Slice produced an open fragment; treating cut as degenerate");
            return Err(SliceError::DegenerateCut);
        }
        Ok((a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuboid_splits_into_two_closed_pieces() {
        let mesh = Mesh::cuboid(Vec3::new(1.0, 2.0, 3.0));
        let (behind, front) = PlaneSlicer
            .slice(&mesh, Vec3::new(0.3, 0.0, 0.0), Vec3::X)
            .expect("plane crosses the box");
        assert!(behind.is_closed());
        assert!(front.is_closed());
        assert!((behind.volume() - 31.2).abs() < 1e-3);
        assert!((front.volume() - 16.8).abs() < 1e-3);
        assert!(behind.centroid().x < 0.3);
        assert!(front.centroid().x > 0.3);
    }

    #[test]
    fn sphere_fragments_are_smaller_and_sum_to_whole() {
        let mesh = Mesh::icosphere(3.0, 2);
        let normal = Vec3::new(0.3, 1.0, -0.2);
        let (a, b) = PlaneSlicer
            .slice(&mesh, Vec3::new(0.1, 0.2, 0.0), normal)
            .expect("plane through the interior");
        let whole = mesh.volume();
        assert!(a.is_closed() && b.is_closed());
        assert!(a.volume() > 0.0 && a.volume() < whole);
        assert!(b.volume() > 0.0 && b.volume() < whole);
        assert!((a.volume() + b.volume() - whole).abs() < whole * 1e-3);
    }

    #[test]
    fn input_mesh_is_not_modified() {
        let mesh = Mesh::icosphere(1.0, 1);
        let before = mesh.clone();
        let _ = PlaneSlicer.slice(&mesh, Vec3::ZERO, Vec3::Z);
        assert_eq!(mesh, before);
    }

    #[test]
    fn plane_missing_the_mesh_is_degenerate() {
        let mesh = Mesh::cuboid(Vec3::ONE);
        assert_eq!(
            PlaneSlicer.slice(&mesh, Vec3::new(5.0, 0.0, 0.0), Vec3::X),
            Err(SliceError::DegenerateCut)
        );
    }

    #[test]
    fn plane_touching_a_face_is_degenerate() {
        let mesh = Mesh::cuboid(Vec3::ONE);
        assert_eq!(
            PlaneSlicer.slice(&mesh, Vec3::new(1.0, 0.0, 0.0), Vec3::X),
            Err(SliceError::DegenerateCut)
        );
    }

    #[test]
    fn zero_normal_is_degenerate() {
        let mesh = Mesh::cuboid(Vec3::ONE);
        assert_eq!(
            PlaneSlicer.slice(&mesh, Vec3::ZERO, Vec3::ZERO),
            Err(SliceError::DegenerateCut)
        );
    }

    #[test]
    fn empty_mesh_is_reported() {
        assert_eq!(
            PlaneSlicer.slice(&Mesh::default(), Vec3::ZERO, Vec3::X),
            Err(SliceError::EmptyMesh)
        );
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let mut mesh = Mesh::cuboid(Vec3::ONE);
        mesh.triangles[3][1] = 99;
        assert_eq!(
            PlaneSlicer.slice(&mesh, Vec3::ZERO, Vec3::X),
            Err(SliceError::IndexOutOfRange {
                index: 99,
                vertices: mesh.positions.len()
            })
        );
    }
}
