use crate::config::CameraData;
use cgmath::{Deg, InnerSpace, Matrix4, Point3, Rad, Vector3, perspective};
use std::f32::consts::FRAC_PI_2;
use winit::event::MouseScrollDelta;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const SAFE_PITCH: f32 = FRAC_PI_2 - 0.001;
const MIN_RADIUS: f32 = 0.05;

/// Camera orbiting a target point
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub target: Point3<f32>,
    pub radius: f32,
    pub yaw: Rad<f32>,
    pub pitch: Rad<f32>,
}

impl OrbitCamera {
    pub fn new<P: Into<Point3<f32>>>(position: P, target: P) -> Self {
        let target = target.into();
        let offset = position.into() - target;
        let radius = offset.magnitude().max(MIN_RADIUS);
        Self {
            target,
            radius,
            yaw: Rad(offset.z.atan2(offset.x)),
            pitch: Rad((offset.y / radius).clamp(-1.0, 1.0).asin()),
        }
    }

    pub fn position(&self) -> Point3<f32> {
        let (sin_pitch, cos_pitch) = self.pitch.0.sin_cos();
        let (sin_yaw, cos_yaw) = self.yaw.0.sin_cos();
        self.target
            + Vector3::new(cos_pitch * cos_yaw, sin_pitch, cos_pitch * sin_yaw) * self.radius
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position(), self.target, Vector3::unit_y())
    }
}

pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width.max(1) as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

pub fn from_config(data: &CameraData, width: u32, height: u32) -> (OrbitCamera, Projection) {
    (
        OrbitCamera::new(data.position, data.target),
        Projection::new(width, height, Deg(data.fovy_deg), data.znear, data.zfar),
    )
}

/// Left drag orbits, the wheel zooms
#[derive(Debug)]
pub struct OrbitController {
    rotate_speed: f32,
    zoom_speed: f32,
    dragging: bool,
    last_cursor: Option<(f64, f64)>,
    pending_rotate: (f32, f32),
    pending_zoom: f32,
}

impl OrbitController {
    pub fn new(rotate_speed: f32, zoom_speed: f32) -> Self {
        Self {
            rotate_speed,
            zoom_speed,
            dragging: false,
            last_cursor: None,
            pending_rotate: (0.0, 0.0),
            pending_zoom: 0.0,
        }
    }

    pub fn set_dragging(&mut self, dragging: bool) {
        self.dragging = dragging;
    }

    pub fn handle_cursor(&mut self, x: f64, y: f64) {
        if let Some((last_x, last_y)) = self.last_cursor {
            if self.dragging {
                self.pending_rotate.0 += (x - last_x) as f32;
                self.pending_rotate.1 += (y - last_y) as f32;
            }
        }
        self.last_cursor = Some((x, y));
    }

    pub fn handle_scroll(&mut self, delta: &MouseScrollDelta) {
        self.pending_zoom += match delta {
            MouseScrollDelta::LineDelta(_, scroll) => *scroll,
            MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 50.0,
        };
    }

    pub fn update_camera(&mut self, camera: &mut OrbitCamera) {
        let (dx, dy) = std::mem::take(&mut self.pending_rotate);
        camera.yaw += Rad(dx * self.rotate_speed);
        let pitch = camera.pitch.0 + dy * self.rotate_speed;
        camera.pitch = Rad(pitch.clamp(-SAFE_PITCH, SAFE_PITCH));

        let zoom = std::mem::take(&mut self.pending_zoom);
        camera.radius = (camera.radius * (1.0 - zoom * self.zoom_speed).max(0.1)).max(MIN_RADIUS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point3<f32>, b: [f32; 3]) -> bool {
        (a.x - b[0]).abs() < 1e-4 && (a.y - b[1]).abs() < 1e-4 && (a.z - b[2]).abs() < 1e-4
    }

    #[test]
    fn orbit_reproduces_start_position() {
        let camera = OrbitCamera::new([0.0, 1.5, 3.5], [0.0, 0.0, 0.0]);
        assert!(close(camera.position(), [0.0, 1.5, 3.5]));
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = OrbitCamera::new([0.0, 1.5, 3.5], [0.0, 0.0, 0.0]);
        let mut controller = OrbitController::new(0.01, 0.1);
        controller.set_dragging(true);
        controller.handle_cursor(0.0, 0.0);
        controller.handle_cursor(0.0, 100_000.0);
        controller.update_camera(&mut camera);
        assert!(camera.pitch.0 <= SAFE_PITCH);
    }

    #[test]
    fn zoom_never_collapses() {
        let mut camera = OrbitCamera::new([0.0, 0.0, 1.0], [0.0, 0.0, 0.0]);
        let mut controller = OrbitController::new(0.01, 0.1);
        for _ in 0..200 {
            controller.handle_scroll(&MouseScrollDelta::LineDelta(0.0, 5.0));
            controller.update_camera(&mut camera);
        }
        assert!(camera.radius >= MIN_RADIUS);
    }
}
