//! Camera and model controls.
//!
//! Each demo owns its input state: the scene viewer moves a [`Camera`], the
//! forward and deferred demos edit a model matrix through [`ModelControls`].
//! Mouse input arrives as cursor positions; [`CursorTracker`] turns them into
//! pixel deltas.

use cgmath::{Deg, EuclideanSpace, InnerSpace, Matrix4, Point3, Rad, SquareMatrix, Vector2, Vector3};
use winit::{dpi::PhysicalPosition, keyboard::KeyCode};

const MOVE_STEP: f32 = 0.1;
const MOUSE_DEGREES: f32 = 30.0;

/// Maps OpenGL clip depth (-1..1) onto wgpu's (0..1).
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Right-handed perspective projection with wgpu's depth range.
pub fn perspective(fovy: Deg<f32>, aspect: f32, znear: f32, zfar: f32) -> Matrix4<f32> {
    OPENGL_TO_WGPU_MATRIX * cgmath::perspective(fovy, aspect, znear, zfar)
}

/// `T(offset) * R(axis, angle) * T(-offset)`: rotation about a point.
///
/// `axis` must be normalized.
pub fn make_local_rotate(offset: Vector3<f32>, axis: Vector3<f32>, angle: Deg<f32>) -> Matrix4<f32> {
    Matrix4::from_translation(offset)
        * Matrix4::from_axis_angle(axis, angle)
        * Matrix4::from_translation(-offset)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub eye: Point3<f32>,
    pub look_at: Point3<f32>,
    /// Spin angle applied to scene nodes, changed with J/K.
    pub rot_angle: Deg<f32>,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Point3::new(0.0, 0.0, 1.0),
            look_at: Point3::origin(),
            rot_angle: Deg(0.0),
        }
    }
}

impl Camera {
    pub const FOVY: Deg<f32> = Deg(90.0);
    pub const ZNEAR: f32 = 0.01;
    pub const ZFAR: f32 = 50.0;

    /// Applies a key press. Returns whether the key was consumed.
    pub fn handle_key(&mut self, key: KeyCode) -> bool {
        let forward = self.look_at - self.eye;
        match key {
            KeyCode::KeyJ => self.rot_angle += Deg(1.0),
            KeyCode::KeyK => self.rot_angle -= Deg(1.0),
            KeyCode::KeyW => self.translate(step(forward)),
            KeyCode::KeyS => self.translate(-step(forward)),
            KeyCode::KeyA => self.translate(-step(forward.cross(Vector3::unit_y()))),
            KeyCode::KeyD => self.translate(step(forward.cross(Vector3::unit_y()))),
            _ => return false,
        }
        true
    }

    fn translate(&mut self, change: Vector3<f32>) {
        self.eye += change;
        self.look_at += change;
    }

    /// Turns the view by a cursor delta in pixels: yaw about +Y, then pitch
    /// about the camera's right axis. Ignored for an empty framebuffer.
    pub fn mouse_look(&mut self, delta: Vector2<f32>, framebuffer: (u32, u32)) {
        let (width, height) = framebuffer;
        if width == 0 || height == 0 {
            return;
        }
        let rel = Vector2::new(-delta.x / width as f32, -delta.y / height as f32);
        let eye = self.eye.to_vec();

        let yaw = make_local_rotate(eye, Vector3::unit_y(), Deg(-MOUSE_DEGREES * rel.x));
        let mut look_at = yaw * self.look_at.to_homogeneous();

        let right = (Point3::from_homogeneous(look_at) - self.eye).cross(Vector3::unit_y());
        if right.magnitude2() > f32::EPSILON {
            let pitch = make_local_rotate(eye, right.normalize(), Deg(-MOUSE_DEGREES * rel.y));
            look_at = pitch * look_at;
        }
        self.look_at = Point3::from_homogeneous(look_at);
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.eye, self.look_at, Vector3::unit_y())
    }

    pub fn projection(&self, framebuffer: (u32, u32)) -> Matrix4<f32> {
        perspective(Self::FOVY, aspect(framebuffer), Self::ZNEAR, Self::ZFAR)
    }
}

fn step(direction: Vector3<f32>) -> Vector3<f32> {
    if direction.magnitude2() > f32::EPSILON {
        direction.normalize() * MOVE_STEP
    } else {
        Vector3::new(0.0, 0.0, 0.0)
    }
}

/// Width over height, 1 while either dimension is zero.
pub fn aspect((width, height): (u32, u32)) -> f32 {
    if width == 0 || height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

/// Turns absolute cursor positions into pixel deltas between events.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CursorTracker {
    last: Option<PhysicalPosition<f64>>,
}

impl CursorTracker {
    /// Difference to the previous position in pixels. The first position
    /// only primes the tracker.
    pub fn moved(&mut self, position: PhysicalPosition<f64>) -> Option<Vector2<f32>> {
        let delta = self.last.map(|last| {
            Vector2::new(
                (position.x - last.x) as f32,
                (position.y - last.y) as f32,
            )
        });
        self.last = Some(position);
        delta
    }

    /// Forget the last position, e.g. when the cursor left the window.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Keyboard and mouse editing of a single model matrix.
///
/// Every edit is pre-multiplied and mirrored in a readable description such
/// as `Sx(0.8)*R(+5)*v`.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelControls {
    model: Matrix4<f32>,
    description: String,
    left_button_down: bool,
}

impl Default for ModelControls {
    fn default() -> Self {
        Self {
            model: Matrix4::identity(),
            description: "v".to_string(),
            left_button_down: false,
        }
    }
}

impl ModelControls {
    pub fn model(&self) -> Matrix4<f32> {
        self.model
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_left_button(&mut self, down: bool) {
        self.left_button_down = down;
    }

    pub fn handle_key(&mut self, key: KeyCode) -> bool {
        let (m, label) = match key {
            KeyCode::Space => {
                *self = Self {
                    left_button_down: self.left_button_down,
                    ..Self::default()
                };
                log::info!("{}", self.description);
                return true;
            }
            KeyCode::KeyQ => (Matrix4::from_angle_z(Deg(5.0)), "R(+5)"),
            KeyCode::KeyE => (Matrix4::from_angle_z(Deg(-5.0)), "R(-5)"),
            KeyCode::KeyF => (Matrix4::from_nonuniform_scale(0.8, 1.0, 1.0), "Sx(0.8)"),
            KeyCode::KeyG => (Matrix4::from_nonuniform_scale(1.25, 1.0, 1.0), "Sx(1.25)"),
            KeyCode::KeyR => (Matrix4::from_nonuniform_scale(1.0, 0.8, 1.0), "Sy(0.8)"),
            KeyCode::KeyT => (Matrix4::from_nonuniform_scale(1.0, 1.25, 1.0), "Sy(1.25)"),
            KeyCode::KeyW => (Matrix4::from_translation(Vector3::new(0.0, 0.1, 0.0)), "Ty(+0.1)"),
            KeyCode::KeyS => (Matrix4::from_translation(Vector3::new(0.0, -0.1, 0.0)), "Ty(-0.1)"),
            KeyCode::KeyA => (Matrix4::from_translation(Vector3::new(-0.1, 0.0, 0.0)), "Tx(-0.1)"),
            KeyCode::KeyD => (Matrix4::from_translation(Vector3::new(0.1, 0.0, 0.0)), "Tx(+0.1)"),
            _ => return false,
        };
        self.model = m * self.model;
        self.description = format!("{label}*{}", self.description);
        log::debug!("model: {:?}", Into::<[[f32; 4]; 4]>::into(self.model));
        log::info!("{}", self.description);
        true
    }

    /// Rotates by `2 * dx` radians (the pixel delta normalized by the framebuffer width)
    /// about +Y, or about +X while the left button is held.
    pub fn handle_mouse(&mut self, delta: Vector2<f32>, framebuffer: (u32, u32)) {
        let (width, _) = framebuffer;
        if width == 0 {
            return;
        }
        let angle = Rad(2.0 * delta.x / width as f32);
        let r = if self.left_button_down {
            Matrix4::from_angle_x(angle)
        } else {
            Matrix4::from_angle_y(angle)
        };
        self.model = r * self.model;
    }
}

/// Normal matrix for `view * model`: inverse transpose of its upper 3x3.
///
/// Falls back to the plain upper 3x3 when the matrix is singular.
pub fn normal_matrix(view_model: &Matrix4<f32>) -> cgmath::Matrix3<f32> {
    use cgmath::Matrix;
    let upper = cgmath::Matrix3::from_cols(
        view_model.x.truncate(),
        view_model.y.truncate(),
        view_model.z.truncate(),
    );
    upper.invert().map(|inv| inv.transpose()).unwrap_or(upper)
}
