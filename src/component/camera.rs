//! 轨道相机组件
//!
//! 相机始终看向原点，位置由球坐标 (theta, phi, radius) 决定。
//! 鼠标左键拖动改变角度，右键拖动改变半径，两者都被限制在配置的范围内。

use std::f32::consts::PI;

use crate::core::config::CameraConfig;
use crate::core::input::MouseButtons;
use crate::math::{matrix, utils, Matrix4, Vector3};

/// 轨道参数的取值范围
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitBounds {
    pub radius_min: f32,
    pub radius_max: f32,
    pub phi_min: f32,
    pub phi_max: f32,
}

impl Default for OrbitBounds {
    fn default() -> Self {
        Self::from(&CameraConfig::default())
    }
}

impl From<&CameraConfig> for OrbitBounds {
    fn from(config: &CameraConfig) -> Self {
        Self {
            radius_min: config.radius_min,
            radius_max: config.radius_max,
            phi_min: config.phi_margin,
            phi_max: PI - config.phi_margin,
        }
    }
}

/// 轨道相机
pub struct OrbitCamera {
    theta: f32,
    phi: f32,
    radius: f32,
    bounds: OrbitBounds,

    /// 每像素旋转的弧度
    rotate_per_pixel: f32,
    /// 每像素缩放的距离
    zoom_per_pixel: f32,

    last_mouse: (f32, f32),

    near_z: f32,
    far_z: f32,
    aspect: f32,
    fov_y: f32,

    eye: Vector3,
    view_matrix: Matrix4,
    proj_matrix: Matrix4,
}

impl OrbitCamera {
    /// 按配置创建相机
    ///
    /// 初始半径取 `config.radius`，未设置时取 `default_radius`。初始值不做限制，
    /// 第一次缩放时才会被拉回范围内。
    pub fn new(config: &CameraConfig, default_radius: f32) -> Self {
        let mut camera = Self {
            theta: config.theta,
            phi: config.phi,
            radius: config.radius.unwrap_or(default_radius),
            bounds: OrbitBounds::from(config),
            rotate_per_pixel: utils::deg_to_rad(config.rotate_degrees_per_pixel),
            zoom_per_pixel: config.zoom_per_pixel,
            last_mouse: (0.0, 0.0),
            near_z: 0.0,
            far_z: 0.0,
            aspect: 0.0,
            fov_y: 0.0,
            eye: Vector3::zeros(),
            view_matrix: Matrix4::identity(),
            proj_matrix: Matrix4::identity(),
        };
        camera.set_lens(0.25 * PI, 1.0, 1.0, 1000.0);
        camera.update_view();
        camera
    }

    /// 设置视锥体参数
    pub fn set_lens(&mut self, fov_y: f32, aspect: f32, near_z: f32, far_z: f32) {
        self.fov_y = fov_y;
        self.aspect = aspect;
        self.near_z = near_z;
        self.far_z = far_z;
        self.proj_matrix = matrix::perspective_fov_lh(fov_y, aspect, near_z, far_z);
    }

    /// 只改变宽高比（窗口大小改变时）
    pub fn set_aspect(&mut self, aspect: f32) {
        self.set_lens(self.fov_y, aspect, self.near_z, self.far_z);
    }

    pub fn on_mouse_down(&mut self, x: f32, y: f32) {
        self.last_mouse = (x, y);
    }

    /// 根据按住的按键把鼠标位移转换为轨道参数的变化
    pub fn on_mouse_move(&mut self, buttons: MouseButtons, x: f32, y: f32) {
        let dx_px = x - self.last_mouse.0;
        let dy_px = y - self.last_mouse.1;

        if buttons.left {
            self.rotate(dx_px * self.rotate_per_pixel, dy_px * self.rotate_per_pixel);
        } else if buttons.right {
            self.zoom(self.zoom_per_pixel * dx_px - self.zoom_per_pixel * dy_px);
        }

        self.last_mouse = (x, y);
    }

    /// 旋转（弧度），phi 被限制在 [phi_min, phi_max]
    pub fn rotate(&mut self, d_theta: f32, d_phi: f32) {
        self.theta += d_theta;
        self.phi = utils::clamp(self.phi + d_phi, self.bounds.phi_min, self.bounds.phi_max);
    }

    /// 改变半径，结果被限制在 [radius_min, radius_max]
    pub fn zoom(&mut self, delta: f32) {
        self.radius = utils::clamp(self.radius + delta, self.bounds.radius_min, self.bounds.radius_max);
    }

    /// 由轨道参数重新计算观察点和观察矩阵
    pub fn update_view(&mut self) {
        self.eye = utils::spherical_to_cartesian(self.radius, self.theta, self.phi);
        self.view_matrix = matrix::look_at_lh(&self.eye, &Vector3::zeros(), &Vector3::y());
    }

    pub fn theta(&self) -> f32 { self.theta }
    pub fn phi(&self) -> f32 { self.phi }
    pub fn radius(&self) -> f32 { self.radius }
    pub fn near_z(&self) -> f32 { self.near_z }
    pub fn far_z(&self) -> f32 { self.far_z }
    pub fn bounds(&self) -> OrbitBounds { self.bounds }
    pub fn eye_position(&self) -> Vector3 { self.eye }
    pub fn view_matrix(&self) -> &Matrix4 { &self.view_matrix }
    pub fn proj_matrix(&self) -> &Matrix4 { &self.proj_matrix }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(radius: f32) -> OrbitCamera {
        OrbitCamera::new(&CameraConfig::default(), radius)
    }

    const RIGHT: MouseButtons = MouseButtons { left: false, right: true, middle: false };
    const LEFT: MouseButtons = MouseButtons { left: true, right: false, middle: false };

    #[test]
    fn test_initial_orbit() {
        let cam = camera(5.0);
        assert!((cam.theta() - 1.5 * PI).abs() < 1e-6);
        assert!((cam.phi() - 0.25 * PI).abs() < 1e-6);
        assert_eq!(cam.radius(), 5.0);
        assert!((cam.eye_position().norm() - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_radius_stays_in_bounds_under_right_drag() {
        let mut cam = camera(2.5);
        cam.on_mouse_down(0.0, 0.0);
        let mut pos = 0.0;
        for step in 0..200 {
            let delta = if step < 100 { 97.0 } else { -131.0 };
            pos += delta;
            cam.on_mouse_move(RIGHT, pos, -pos);
            assert!(cam.radius() >= 5.0 && cam.radius() <= 150.0, "radius {}", cam.radius());
        }
    }

    #[test]
    fn test_zoom_uses_dx_minus_dy() {
        let mut cam = camera(10.0);
        cam.on_mouse_down(100.0, 100.0);
        cam.on_mouse_move(RIGHT, 120.0, 90.0);
        assert!((cam.radius() - (10.0 + 0.05 * 20.0 + 0.05 * 10.0)).abs() < 1e-5);
    }

    #[test]
    fn test_phi_stays_in_bounds_under_left_drag() {
        let mut cam = camera(5.0);
        cam.on_mouse_down(0.0, 0.0);
        for i in 1..=400 {
            let y = if i <= 200 { i as f32 * 50.0 } else { (400 - i) as f32 * -50.0 };
            cam.on_mouse_move(LEFT, 0.0, y);
            assert!(cam.phi() >= 0.1 - 1e-6 && cam.phi() <= PI - 0.1 + 1e-6, "phi {}", cam.phi());
        }
    }

    #[test]
    fn test_rotation_quarter_degree_per_pixel() {
        let mut cam = camera(5.0);
        let theta0 = cam.theta();
        cam.on_mouse_down(0.0, 0.0);
        cam.on_mouse_move(LEFT, 4.0, 0.0);
        assert!((cam.theta() - theta0 - utils::deg_to_rad(1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_move_without_buttons_only_tracks_position() {
        let mut cam = camera(5.0);
        cam.on_mouse_move(MouseButtons::default(), 300.0, 300.0);
        assert_eq!(cam.radius(), 5.0);
        cam.on_mouse_move(RIGHT, 300.0, 300.0);
        assert_eq!(cam.radius(), 5.0);
    }

    #[test]
    fn test_update_view_targets_origin() {
        let mut cam = camera(8.0);
        cam.rotate(0.3, 0.2);
        cam.update_view();
        let origin_in_view = cam.view_matrix() * crate::math::Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!((origin_in_view.z - 8.0).abs() < 1e-4);
    }
}
