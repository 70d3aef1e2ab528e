//! Camera and world-to-screen projection.
//!
//! World convention: right-handed, +Y up. Yaw 0 looks down -Z and yaw 90
//! looks down -X; positive pitch looks down. Angles are in degrees.

use glam::{Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Points with clip-space W at or below this are behind the camera.
const MIN_CLIP_W: f32 = 0.001;

/// Floor for basis vector lengths in the look-at matrix.
const MIN_AXIS_LENGTH: f32 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraPose {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    /// Vertical field of view in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 70.0, 0.0),
            yaw: 0.0,
            pitch: 0.0,
            fov: 70.0,
            near: 0.05,
            far: 1000.0,
        }
    }
}

impl CameraPose {
    /// Unit view direction.
    pub fn forward(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.to_radians().sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.to_radians().sin_cos();
        Vec3::new(-sin_yaw * cos_pitch, -sin_pitch, -cos_yaw * cos_pitch)
    }

    pub fn view_matrix(&self) -> Mat4 {
        look_at(self.position, self.position + self.forward(), Vec3::Y)
    }

    /// Requires `far > near`.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov.to_radians(), aspect, self.near, self.far)
    }

    /// Combined transform for column vectors: `projection * view`.
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }
}

/// Right-handed look-at. Near-zero basis lengths are clamped rather than
/// dividing by zero, so a camera looking straight along `up` yields a
/// degenerate (but finite) matrix.
pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    let f = clamped_normalize(target - eye);
    let r = clamped_normalize(f.cross(up));
    let u = r.cross(f);

    Mat4::from_cols(
        Vec4::new(r.x, u.x, -f.x, 0.0),
        Vec4::new(r.y, u.y, -f.y, 0.0),
        Vec4::new(r.z, u.z, -f.z, 0.0),
        Vec4::new(-r.dot(eye), -u.dot(eye), f.dot(eye), 1.0),
    )
}

fn clamped_normalize(v: Vec3) -> Vec3 {
    v / v.length().max(MIN_AXIS_LENGTH)
}

/// Project `world` to pixel coordinates in a `width` x `height` surface,
/// origin top-left. `None` if the point is behind the camera.
pub fn project(world: Vec3, view_projection: &Mat4, width: f32, height: f32) -> Option<Vec2> {
    let clip = *view_projection * world.extend(1.0);
    if clip.w <= MIN_CLIP_W {
        return None;
    }

    let ndc_x = clip.x / clip.w;
    let ndc_y = clip.y / clip.w;
    Some(Vec2::new(
        (ndc_x * 0.5 + 0.5) * width,
        (-ndc_y * 0.5 + 0.5) * height,
    ))
}
