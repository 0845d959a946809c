//! 数学库模块
//!
//! 基于 `nalgebra`，提供简洁的类型别名和 Direct3D 风格（左手坐标系，
//! 深度范围 [0, 1]）的矩阵辅助函数。
//!
//! 所有矩阵使用列向量约定（`M * v`），上传到 GPU 时按列主序存储，
//! HLSL 端以 `mul(M, v)` 使用，无需转置。

pub use nalgebra::{Matrix4 as Mat4, Point3, Vector3 as Vec3, Vector4 as Vec4};

pub type Vector3 = Vec3<f32>;
pub type Vector4 = Vec4<f32>;
pub type Matrix4 = Mat4<f32>;

/// 颜色类型（RGBA，范围 0.0-1.0）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const RED: Color = Color::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: Color = Color::new(0.0, 0.502, 0.0, 1.0);
    pub const BLUE: Color = Color::new(0.0, 0.0, 1.0, 1.0);
    pub const YELLOW: Color = Color::new(1.0, 1.0, 0.0, 1.0);
    pub const CYAN: Color = Color::new(0.0, 1.0, 1.0, 1.0);
    pub const MAGENTA: Color = Color::new(1.0, 0.0, 1.0, 1.0);
    pub const LIGHT_STEEL_BLUE: Color = Color::new(0.690, 0.769, 0.871, 1.0);
}

/// 数学常量
pub mod constants {
    pub const PI: f32 = std::f32::consts::PI;

    /// 角度转弧度的系数
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// 数学工具函数
pub mod utils {
    use super::constants::DEG_TO_RAD;

    /// 限制值在范围内
    pub fn clamp<T: PartialOrd>(value: T, min: T, max: T) -> T {
        if value < min {
            min
        } else if value > max {
            max
        } else {
            value
        }
    }

    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * DEG_TO_RAD
    }

    /// 球坐标转笛卡尔坐标（y 轴向上）
    pub fn spherical_to_cartesian(radius: f32, theta: f32, phi: f32) -> super::Vector3 {
        super::Vector3::new(
            radius * phi.sin() * theta.cos(),
            radius * phi.cos(),
            radius * phi.sin() * theta.sin(),
        )
    }
}

/// 矩阵辅助函数
pub mod matrix {
    use super::*;

    pub fn translation(x: f32, y: f32, z: f32) -> Matrix4 {
        Matrix4::new_translation(&Vector3::new(x, y, z))
    }

    pub fn scaling(x: f32, y: f32, z: f32) -> Matrix4 {
        Matrix4::new_nonuniform_scaling(&Vector3::new(x, y, z))
    }

    /// 左手坐标系透视投影，深度映射到 [0, 1]
    pub fn perspective_fov_lh(fov_y: f32, aspect: f32, near: f32, far: f32) -> Matrix4 {
        let h = 1.0 / (0.5 * fov_y).tan();
        let w = h / aspect;
        let range = far / (far - near);
        Matrix4::new(
            w, 0.0, 0.0, 0.0,
            0.0, h, 0.0, 0.0,
            0.0, 0.0, range, -range * near,
            0.0, 0.0, 1.0, 0.0,
        )
    }

    /// 左手坐标系观察矩阵
    pub fn look_at_lh(eye: &Vector3, target: &Vector3, up: &Vector3) -> Matrix4 {
        Matrix4::look_at_lh(&Point3::from(*eye), &Point3::from(*target), up)
    }

    /// 求逆，奇异矩阵返回单位矩阵
    pub fn inverse(m: &Matrix4) -> Matrix4 {
        m.try_inverse().unwrap_or_else(Matrix4::identity)
    }

    /// 列主序数组，直接作为常量缓冲区中的 float4x4 上传
    pub fn to_gpu(m: &Matrix4) -> [[f32; 4]; 4] {
        (*m).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(m: &Matrix4, p: Vector3) -> Vector3 {
        let clip = m * Vector4::new(p.x, p.y, p.z, 1.0);
        Vector3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w)
    }

    #[test]
    fn test_perspective_depth_range() {
        let proj = matrix::perspective_fov_lh(0.25 * constants::PI, 4.0 / 3.0, 1.0, 1000.0);
        assert!(project(&proj, Vector3::new(0.0, 0.0, 1.0)).z.abs() < 1e-5);
        assert!((project(&proj, Vector3::new(0.0, 0.0, 1000.0)).z - 1.0).abs() < 1e-5);
        assert!(project(&proj, Vector3::new(0.0, 0.0, 10.0)).z > 0.0);
    }

    #[test]
    fn test_look_at_lh_puts_target_in_front() {
        let eye = Vector3::new(0.0, 0.0, -5.0);
        let view = matrix::look_at_lh(&eye, &Vector3::zeros(), &Vector3::y());
        let origin = view * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!((origin.z - 5.0).abs() < 1e-5);
        assert!(origin.x.abs() < 1e-5 && origin.y.abs() < 1e-5);
    }

    #[test]
    fn test_to_gpu_is_column_major() {
        let m = matrix::translation(1.0, 2.0, 3.0);
        let gpu = matrix::to_gpu(&m);
        assert_eq!(gpu[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(gpu[0], [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_inverse_of_singular_is_identity() {
        assert_eq!(matrix::inverse(&Matrix4::zeros()), Matrix4::identity());
        let m = matrix::scaling(2.0, 4.0, 8.0);
        let inv = matrix::inverse(&m);
        assert!(((m * inv) - Matrix4::identity()).norm() < 1e-6);
    }

    #[test]
    fn test_spherical_to_cartesian() {
        let p = utils::spherical_to_cartesian(2.0, 0.0, 0.5 * constants::PI);
        assert!((p.x - 2.0).abs() < 1e-5 && p.y.abs() < 1e-5 && p.z.abs() < 1e-5);
        assert_eq!(utils::clamp(7, 0, 5), 5);
        assert!((utils::deg_to_rad(180.0) - constants::PI).abs() < 1e-6);
    }
}
