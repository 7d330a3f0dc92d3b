//! Mesh instances keyed by entity id, flattened into one world-space vertex
//! buffer per frame.
//!
//! `SceneMeshes` is the CPU side and implements `RenderMeshService`; it never
//! touches the GPU, so the simulation can drive it in tests. `SceneRenderer`
//! owns the buffers and pipeline and uploads the flattened scene on demand.

use std::collections::BTreeMap;

use oort_core::mesh::MeshHandle;
use oort_core::services::{CameraRig, EntityId, ObjectKind, RenderMeshService, Transform};

use crate::camera::Camera3D;
use crate::gpu_context::GpuContext;
use crate::mesh_pipeline::MeshPipeline;
use crate::vertex::MeshVertex;

#[derive(Debug, Clone)]
pub struct SceneInstance {
    pub kind: ObjectKind,
    pub mesh: MeshHandle,
    pub transform: Transform,
    pub visible: bool,
}

#[derive(Debug, Default)]
pub struct SceneMeshes {
    instances: BTreeMap<EntityId, SceneInstance>,
    pub camera: CameraRig,
    dirty: bool,
}

impl SceneMeshes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn get(&self, id: EntityId) -> Option<&SceneInstance> {
        self.instances.get(&id)
    }

    pub fn visible_count(&self) -> usize {
        self.instances.values().filter(|i| i.visible).count()
    }

    pub fn triangle_count(&self) -> usize {
        self.instances
            .values()
            .filter(|i| i.visible)
            .map(|i| i.mesh.triangle_count())
            .sum()
    }

    /// True once since the last call if any instance changed.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Flat-shaded world-space geometry for every visible instance. Vertices
    /// are not shared between faces so each carries its face normal.
    pub fn build_mesh(&self) -> (Vec<MeshVertex>, Vec<u32>) {
        let triangles = self.triangle_count();
        let mut vertices = Vec::with_capacity(triangles * 3);
        let mut indices = Vec::with_capacity(triangles * 3);

        for instance in self.instances.values().filter(|i| i.visible) {
            let color = kind_color(instance.kind);
            let mesh = &instance.mesh;
            for t in 0..mesh.triangle_count() {
                let normal = instance
                    .transform
                    .transform_direction(mesh.face_normal(t))
                    .normalize_or_zero()
                    .to_array();
                for corner in mesh.triangle(t) {
                    indices.push(vertices.len() as u32);
                    vertices.push(MeshVertex {
                        position: instance.transform.transform_point(corner).to_array(),
                        normal,
                        color,
                    });
                }
            }
        }
        (vertices, indices)
    }
}

impl RenderMeshService for SceneMeshes {
    fn attach_mesh(&mut self, id: EntityId, kind: ObjectKind, mesh: MeshHandle, transform: Transform) {
        if self
            .instances
            .insert(
                id,
                SceneInstance {
                    kind,
                    mesh,
                    transform,
                    visible: true,
                },
            )
            .is_some()
        {
            log::warn!("Mesh for {id} attached twice; replacing");
        }
        self.dirty = true;
    }

    fn detach_mesh(&mut self, id: EntityId) {
        if self.instances.remove(&id).is_some() {
            self.dirty = true;
        }
    }

    fn update_transform(&mut self, id: EntityId, transform: Transform) {
        if let Some(instance) = self.instances.get_mut(&id) {
            if instance.transform != transform {
                instance.transform = transform;
                self.dirty = true;
            }
        }
    }

    fn set_visible(&mut self, id: EntityId, visible: bool) {
        if let Some(instance) = self.instances.get_mut(&id) {
            if instance.visible != visible {
                instance.visible = visible;
                self.dirty = true;
            }
        }
    }

    fn set_camera(&mut self, rig: CameraRig) {
        self.camera = rig;
    }
}

pub fn kind_color(kind: ObjectKind) -> [f32; 4] {
    match kind {
        ObjectKind::Spaceship => [0.35, 0.75, 1.0, 1.0],
        ObjectKind::Laser => [1.0, 0.25, 0.2, 1.0],
        ObjectKind::Asteroid => [0.62, 0.55, 0.48, 1.0],
        ObjectKind::Wall => [0.3, 0.35, 0.5, 0.25],
    }
}

pub struct SceneRenderer {
    pub scene: SceneMeshes,
    pub camera: Camera3D,
    pipeline: MeshPipeline,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    vertex_capacity: usize,
    index_capacity: usize,
    index_count: u32,
}

impl SceneRenderer {
    pub fn new(gpu: &GpuContext) -> Self {
        let pipeline = MeshPipeline::new(&gpu.device, gpu.surface_format);
        let camera = Camera3D::new(gpu.size.0, gpu.size.1);

        let camera_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Uniform Buffer"),
            size: std::mem::size_of::<crate::camera::CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let camera_bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &pipeline.camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let vertex_capacity = 1024;
        let index_capacity = 1024;
        Self {
            scene: SceneMeshes::new(),
            camera,
            vertex_buffer: create_vertex_buffer(&gpu.device, vertex_capacity),
            index_buffer: create_index_buffer(&gpu.device, index_capacity),
            pipeline,
            camera_buffer,
            camera_bind_group,
            vertex_capacity,
            index_capacity,
            index_count: 0,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.viewport = (width, height);
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Upload the camera and, if the scene changed, the rebuilt geometry.
    pub fn prepare(&mut self, gpu: &GpuContext) {
        self.camera.rig = self.scene.camera;
        gpu.queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::cast_slice(&[self.camera.build_uniform()]),
        );

        if !self.scene.take_dirty() {
            return;
        }
        let (vertices, indices) = self.scene.build_mesh();
        self.ensure_mesh_capacity(gpu, vertices.len(), indices.len());
        if !vertices.is_empty() {
            gpu.queue
                .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&vertices));
            gpu.queue
                .write_buffer(&self.index_buffer, 0, bytemuck::cast_slice(&indices));
        }
        self.index_count = indices.len() as u32;
    }

    pub fn draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: 0.01,
                        g: 0.01,
                        b: 0.03,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });

        if self.index_count == 0 {
            return;
        }
        render_pass.set_pipeline(&self.pipeline.render_pipeline);
        render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        render_pass.draw_indexed(0..self.index_count, 0, 0..1);
    }

    fn ensure_mesh_capacity(&mut self, gpu: &GpuContext, vertex_count: usize, index_count: usize) {
        let needed_vertices = vertex_count.max(1);
        if needed_vertices > self.vertex_capacity {
            self.vertex_capacity = needed_vertices.next_power_of_two();
            self.vertex_buffer = create_vertex_buffer(&gpu.device, self.vertex_capacity);
        }

        let needed_indices = index_count.max(1);
        if needed_indices > self.index_capacity {
            self.index_capacity = needed_indices.next_power_of_two();
            self.index_buffer = create_index_buffer(&gpu.device, self.index_capacity);
        }
    }
}

fn create_vertex_buffer(device: &wgpu::Device, vertex_capacity: usize) -> wgpu::Buffer {
    let byte_len = (vertex_capacity * std::mem::size_of::<MeshVertex>()).max(1) as u64;
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Scene Vertex Buffer"),
        size: byte_len,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_index_buffer(device: &wgpu::Device, index_capacity: usize) -> wgpu::Buffer {
    let byte_len = (index_capacity * std::mem::size_of::<u32>()).max(1) as u64;
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Scene Index Buffer"),
        size: byte_len,
        usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use oort_core::mesh::Mesh;
    use std::sync::Arc;

    fn cube() -> MeshHandle {
        Arc::new(Mesh::cuboid(Vec3::splat(1.0)))
    }

    #[test]
    fn build_mesh_places_vertices_in_world_space() {
        let mut scene = SceneMeshes::new();
        let offset = Vec3::new(10.0, 0.0, 0.0);
        scene.attach_mesh(
            EntityId(1),
            ObjectKind::Asteroid,
            cube(),
            Transform::from_position(offset),
        );
        let (vertices, indices) = scene.build_mesh();
        assert_eq!(indices.len(), cube().triangle_count() * 3);
        assert_eq!(vertices.len(), indices.len());
        for v in &vertices {
            assert!((v.position[0] - 10.0).abs() <= 1.0 + 1e-5);
            let n = Vec3::from_array(v.normal);
            assert!((n.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn hidden_and_detached_instances_are_skipped() {
        let mut scene = SceneMeshes::new();
        scene.attach_mesh(EntityId(1), ObjectKind::Spaceship, cube(), Transform::IDENTITY);
        scene.attach_mesh(EntityId(2), ObjectKind::Asteroid, cube(), Transform::IDENTITY);
        scene.set_visible(EntityId(1), false);
        assert_eq!(scene.visible_count(), 1);
        scene.detach_mesh(EntityId(2));
        assert!(scene.build_mesh().1.is_empty());
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn dirty_flag_tracks_changes_only() {
        let mut scene = SceneMeshes::new();
        scene.attach_mesh(EntityId(1), ObjectKind::Laser, cube(), Transform::IDENTITY);
        assert!(scene.take_dirty());
        assert!(!scene.take_dirty());

        scene.update_transform(EntityId(1), Transform::IDENTITY);
        assert!(!scene.take_dirty());
        scene.update_transform(EntityId(1), Transform::from_position(Vec3::X));
        assert!(scene.take_dirty());

        // Unknown ids are ignored.
        scene.update_transform(EntityId(9), Transform::IDENTITY);
        scene.detach_mesh(EntityId(9));
        assert!(!scene.take_dirty());
    }
}
