use glam::{Mat4, Vec3};

/// Perspective camera that orbits a pivot point
pub struct Camera {
    position: Vec3,
    forward: Vec3,
    up: Vec3,
    world_up: Vec3,
    fov_y_deg: f32,
    near: f32,
    far: f32,
    pivot: Vec3,
}

impl Camera {
    const DEFAULT_FOV_Y_DEG: f32 = 45.0;

    pub fn new() -> Self {
        let mut camera = Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            world_up: Vec3::Y,
            fov_y_deg: Self::DEFAULT_FOV_Y_DEG,
            near: 0.1,
            far: 100.0,
            pivot: Vec3::ZERO,
        };
        camera.look_at(Vec3::ZERO);
        camera
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.look_at(self.pivot);
    }

    pub fn look_at(&mut self, target: Vec3) {
        if target == self.position {
            return;
        }
        self.pivot = target;
        self.forward = (target - self.position).normalize();
        let right = self.forward.cross(self.world_up).normalize();
        self.up = right.cross(self.forward).normalize();
    }

    /// Place the camera on a horizontal circle around the pivot.
    pub fn orbit(&mut self, angle_rad: f32, radius: f32) {
        let offset = Vec3::new(angle_rad.sin(), 0.0, angle_rad.cos()) * radius;
        self.set_position(self.pivot + offset);
    }

    pub fn get_viewproj_mat(&self, aspect_ratio: f32) -> Mat4 {
        self.get_proj_mat(aspect_ratio) * self.get_view_mat()
    }

    pub fn get_view_mat(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward, self.up)
    }

    pub fn get_proj_mat(&self, aspect_ratio: f32) -> Mat4 {
        let mut proj = Mat4::perspective_rh(
            self.fov_y_deg.to_radians(),
            aspect_ratio,
            self.near,
            self.far,
        );
        // Vulkan clip space has Y pointing down
        proj.y_axis.y *= -1.0;
        proj
    }

    pub fn get_position(&self) -> Vec3 {
        self.position
    }

    pub fn get_forward(&self) -> Vec3 {
        self.forward
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}
