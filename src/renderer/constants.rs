//! GPU 常量缓冲区布局
//!
//! 与 HLSL 中 cbuffer 的打包规则一致（float3 后紧跟一个 float 可以共用 16 字节）。
//! 矩阵按列主序存储，见 [`crate::math::matrix::to_gpu`]。

use bytemuck::{Pod, Zeroable};

use crate::math::{matrix, Matrix4};

/// 着色器中光源数组的长度
pub const MAX_LIGHTS: usize = 16;

type GpuMatrix = [[f32; 4]; 4];

const IDENTITY: GpuMatrix = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// 每个渲染项的常量 (b0)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ObjectConstants {
    pub world: GpuMatrix,
    pub tex_transform: GpuMatrix,
}

impl Default for ObjectConstants {
    fn default() -> Self {
        Self {
            world: IDENTITY,
            tex_transform: IDENTITY,
        }
    }
}

impl ObjectConstants {
    pub fn new(world: &Matrix4, tex_transform: &Matrix4) -> Self {
        Self {
            world: matrix::to_gpu(world),
            tex_transform: matrix::to_gpu(tex_transform),
        }
    }
}

/// 线框立方体使用的常量
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct WorldViewProjConstants {
    pub world_view_proj: GpuMatrix,
}

/// 材质常量 (b2)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MaterialConstants {
    pub diffuse_albedo: [f32; 4],
    pub fresnel_r0: [f32; 3],
    pub roughness: f32,
    pub mat_transform: GpuMatrix,
}

impl Default for MaterialConstants {
    fn default() -> Self {
        Self {
            diffuse_albedo: [1.0; 4],
            fresnel_r0: [0.01; 3],
            roughness: 0.25,
            mat_transform: IDENTITY,
        }
    }
}

/// 光源
///
/// 方向光只使用 `strength` 和 `direction`。
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Light {
    pub strength: [f32; 3],
    pub falloff_start: f32,
    pub direction: [f32; 3],
    pub falloff_end: f32,
    pub position: [f32; 3],
    pub spot_power: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            strength: [0.5; 3],
            falloff_start: 1.0,
            direction: [0.0, -1.0, 0.0],
            falloff_end: 10.0,
            position: [0.0; 3],
            spot_power: 64.0,
        }
    }
}

impl Light {
    pub fn directional(direction: [f32; 3], strength: [f32; 3]) -> Self {
        Self {
            direction,
            strength,
            ..Self::default()
        }
    }
}

/// 每帧的渲染通道常量 (b1)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PassConstants {
    pub view: GpuMatrix,
    pub inv_view: GpuMatrix,
    pub proj: GpuMatrix,
    pub inv_proj: GpuMatrix,
    pub view_proj: GpuMatrix,
    pub inv_view_proj: GpuMatrix,
    pub eye_pos_w: [f32; 3],
    pub cb_per_object_pad1: f32,
    pub render_target_size: [f32; 2],
    pub inv_render_target_size: [f32; 2],
    pub near_z: f32,
    pub far_z: f32,
    pub total_time: f32,
    pub delta_time: f32,
    pub ambient_light: [f32; 4],
    pub lights: [Light; MAX_LIGHTS],
}

impl Default for PassConstants {
    fn default() -> Self {
        Self {
            view: IDENTITY,
            inv_view: IDENTITY,
            proj: IDENTITY,
            inv_proj: IDENTITY,
            view_proj: IDENTITY,
            inv_view_proj: IDENTITY,
            eye_pos_w: [0.0; 3],
            cb_per_object_pad1: 0.0,
            render_target_size: [0.0; 2],
            inv_render_target_size: [0.0; 2],
            near_z: 0.0,
            far_z: 0.0,
            total_time: 0.0,
            delta_time: 0.0,
            ambient_light: [0.0, 0.0, 0.0, 1.0],
            lights: [Light::default(); MAX_LIGHTS],
        }
    }
}

impl PassConstants {
    /// 由观察矩阵和投影矩阵填充所有矩阵字段
    pub fn set_view_proj(&mut self, view: &Matrix4, proj: &Matrix4) {
        let view_proj = proj * view;
        self.view = matrix::to_gpu(view);
        self.inv_view = matrix::to_gpu(&matrix::inverse(view));
        self.proj = matrix::to_gpu(proj);
        self.inv_proj = matrix::to_gpu(&matrix::inverse(proj));
        self.view_proj = matrix::to_gpu(&view_proj);
        self.inv_view_proj = matrix::to_gpu(&matrix::inverse(&view_proj));
    }

    pub fn set_render_target_size(&mut self, width: u32, height: u32) {
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        self.render_target_size = [w, h];
        self.inv_render_target_size = [1.0 / w, 1.0 / h];
    }
}
