use glam::{Mat4, Vec3};
use oort_core::services::CameraRig;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    /// xyz is the direction light travels; w unused.
    pub light_dir: [f32; 4],
}

pub struct Camera3D {
    pub rig: CameraRig,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    pub viewport: (u32, u32),
}

impl Camera3D {
    pub fn new(viewport_width: u32, viewport_height: u32) -> Self {
        Self {
            rig: CameraRig::default(),
            fov_y: 60f32.to_radians(),
            near: 0.1,
            far: 1000.0,
            viewport: (viewport_width, viewport_height),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.viewport.0.max(1) as f32 / self.viewport.1.max(1) as f32
    }

    pub fn view_proj(&self) -> Mat4 {
        // look_at_rh degenerates when up is parallel to the view direction.
        let forward = (self.rig.target - self.rig.eye)
            .try_normalize()
            .unwrap_or(Vec3::NEG_Z);
        let up = if forward.cross(self.rig.up).length_squared() > 1e-6 {
            self.rig.up
        } else {
            forward.any_orthonormal_vector()
        };
        let view = Mat4::look_at_rh(self.rig.eye, self.rig.target, up);
        let proj = Mat4::perspective_rh(self.fov_y, self.aspect(), self.near, self.far);
        proj * view
    }

    pub fn build_uniform(&self) -> CameraUniform {
        let light = Vec3::new(-0.4, -1.0, -0.3).normalize();
        CameraUniform {
            view_proj: self.view_proj().to_cols_array_2d(),
            light_dir: light.extend(0.0).to_array(),
        }
    }
}
