//! Keyboard fly camera moving in the XZ plane

use std::f32::consts::TAU;

use glfw::Key;
use prism_engine::foundation::math::Vec3;
use prism_engine::render::backends::vulkan::Window;
use prism_engine::scene::TransformComponent;

const PITCH_LIMIT: f32 = 1.5;

/// Keys the controller listens to
#[derive(Debug, Clone, Copy)]
pub struct KeyMappings {
    pub move_left: Key,
    pub move_right: Key,
    pub move_forward: Key,
    pub move_backward: Key,
    pub move_up: Key,
    pub move_down: Key,
    pub look_left: Key,
    pub look_right: Key,
    pub look_up: Key,
    pub look_down: Key,
}

impl Default for KeyMappings {
    fn default() -> Self {
        Self {
            move_left: Key::A,
            move_right: Key::D,
            move_forward: Key::W,
            move_backward: Key::S,
            move_up: Key::E,
            move_down: Key::Q,
            look_left: Key::Left,
            look_right: Key::Right,
            look_up: Key::Up,
            look_down: Key::Down,
        }
    }
}

/// Per-axis input in [-1, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MovementInput {
    /// x: pitch, y: yaw
    pub look: Vec3,
    /// x: right, y: up, z: forward
    pub movement: Vec3,
}

/// Moves a transform from keyboard state
#[derive(Debug, Clone)]
pub struct CameraController {
    pub keys: KeyMappings,
    pub move_speed: f32,
    pub look_speed: f32,
}

impl Default for CameraController {
    fn default() -> Self {
        Self {
            keys: KeyMappings::default(),
            move_speed: 3.0,
            look_speed: 1.5,
        }
    }
}

impl CameraController {
    /// Sample the keyboard
    pub fn read_input(&self, window: &Window) -> MovementInput {
        let axis = |positive: Key, negative: Key| {
            f32::from(u8::from(window.key_pressed(positive))) - f32::from(u8::from(window.key_pressed(negative)))
        };
        let k = &self.keys;
        MovementInput {
            look: Vec3::new(axis(k.look_up, k.look_down), axis(k.look_right, k.look_left), 0.0),
            movement: Vec3::new(
                axis(k.move_right, k.move_left),
                axis(k.move_up, k.move_down),
                axis(k.move_forward, k.move_backward),
            ),
        }
    }

    /// Apply `input` for `dt` seconds
    pub fn apply(&self, input: &MovementInput, dt: f32, transform: &mut TransformComponent) {
        if input.look.norm_squared() > f32::EPSILON {
            transform.rotation += self.look_speed * dt * input.look.normalize();
        }
        transform.rotation.x = transform.rotation.x.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        transform.rotation.y = transform.rotation.y.rem_euclid(TAU);

        let yaw = transform.rotation.y;
        let forward = Vec3::new(yaw.sin(), 0.0, yaw.cos());
        let right = Vec3::new(forward.z, 0.0, -forward.x);
        let up = Vec3::new(0.0, -1.0, 0.0);

        let direction = right * input.movement.x + up * input.movement.y + forward * input.movement.z;
        if direction.norm_squared() > f32::EPSILON {
            transform.translation += self.move_speed * dt * direction.normalize();
        }
    }
}
