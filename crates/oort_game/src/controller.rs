use glam::{Quat, Vec3};

use oort_core::input::{InputService, Key};

use crate::config::ShipConfig;

/// Held-key intent for one frame, each axis in `[-1, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShipInput {
    pub thrust: f32,
    /// Positive turns left.
    pub yaw: f32,
    /// Positive raises the nose.
    pub pitch: f32,
}

impl ShipInput {
    pub fn from_input(input: &dyn InputService) -> Self {
        let axis = |pos: bool, neg: bool| match (pos, neg) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        };
        Self {
            thrust: axis(input.is_key_down(Key::W), input.is_key_down(Key::S)),
            yaw: axis(
                input.is_key_down(Key::A) || input.is_key_down(Key::Left),
                input.is_key_down(Key::D) || input.is_key_down(Key::Right),
            ),
            pitch: axis(input.is_key_down(Key::Up), input.is_key_down(Key::Down)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ShipController {
    pub thrust: f32,
    pub max_speed: f32,
    pub drag: f32,
    pub turn_rate: f32,
}

impl ShipController {
    pub fn from_config(config: &ShipConfig) -> Self {
        Self {
            thrust: config.thrust,
            max_speed: config.max_speed,
            drag: config.drag,
            turn_rate: config.turn_rate,
        }
    }

    /// Turn in the ship's local frame, then accelerate along the new nose
    /// direction. With no thrust the speed bleeds off at `drag`.
    pub fn step(&self, input: ShipInput, orientation: Quat, velocity: Vec3, dt: f32) -> (Quat, Vec3) {
        let turn = self.turn_rate * dt;
        let orientation = (orientation
            * Quat::from_rotation_y(input.yaw * turn)
            * Quat::from_rotation_x(input.pitch * turn))
        .normalize();

        let forward = orientation * Vec3::NEG_Z;
        let velocity = if input.thrust != 0.0 {
            velocity + forward * (input.thrust * self.thrust * dt)
        } else {
            let speed = velocity.length();
            let slowed = move_towards(speed, 0.0, self.drag * dt);
            if speed > 0.0 {
                velocity * (slowed / speed)
            } else {
                velocity
            }
        };
        (orientation, velocity.clamp_length_max(self.max_speed))
    }
}

fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    if (target - current).abs() <= max_delta {
        target
    } else if target > current {
        current + max_delta
    } else {
        current - max_delta
    }
}
