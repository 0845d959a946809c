//! fabric 示例的场景
//!
//! 与图形后端无关：轨道相机、一个 "wood" 材质、立方体渲染项、三盏方向光，
//! 以及每帧写入当前帧资源的常量。D3D12 窗口版和无窗口版共用这一份场景。

use std::f32::consts::PI;
use std::sync::Arc;

use crate::component::OrbitCamera;
use crate::core::config::CameraConfig;
use crate::core::timer::GameTimer;
use crate::geometry::SubmeshGeometry;
use crate::gfx::backend::GraphicsDevice;
use crate::math::Color;
use crate::renderer::constants::{Light, PassConstants};
use crate::renderer::frame_resource::FrameResource;
use crate::renderer::scene::{
    update_material_constants, update_object_constants, Material, MaterialId, RenderItem,
};

/// 相机的初始半径
pub const DEFAULT_RADIUS: f32 = 2.5;

pub const CLEAR_COLOR: Color = Color::LIGHT_STEEL_BLUE;

pub const WOOD: MaterialId = MaterialId(0);

const NEAR_Z: f32 = 1.0;
const FAR_Z: f32 = 1000.0;

/// 每帧写入常量缓冲区的数量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameWrites {
    pub objects: usize,
    pub materials: usize,
}

/// fabric 场景
pub struct FabricScene<G> {
    pub camera: OrbitCamera,
    materials: Vec<Material>,
    items: Vec<RenderItem<G>>,
    pass: PassConstants,
    frame_count: usize,
}

impl<G> FabricScene<G> {
    /// # 参数
    ///
    /// * `camera` - 轨道相机配置，未设置半径时使用 [`DEFAULT_RADIUS`]
    /// * `frame_count` - 帧资源数量 N，新数据需要传播到的槽位数
    pub fn new(camera: &CameraConfig, frame_count: usize) -> Self {
        let mut wood = Material::new("wood", 0, 0, frame_count);
        wood.diffuse_albedo = [1.0, 1.0, 1.0, 1.0];
        wood.fresnel_r0 = [0.05, 0.05, 0.05];
        wood.roughness = 0.2;

        let mut pass = PassConstants::default();
        pass.near_z = NEAR_Z;
        pass.far_z = FAR_Z;
        pass.ambient_light = [0.25, 0.25, 0.35, 1.0];
        pass.lights[..3].copy_from_slice(&key_lights());
        // 其余光源槽位不发光
        for light in &mut pass.lights[3..] {
            light.strength = [0.0; 3];
        }

        Self {
            camera: OrbitCamera::new(camera, DEFAULT_RADIUS),
            materials: vec![wood],
            items: Vec::new(),
            pass,
            frame_count,
        }
    }

    /// 添加一个使用 wood 材质的立方体，返回它的物体常量下标
    pub fn add_box(&mut self, geometry: Arc<G>, args: SubmeshGeometry) -> usize {
        let index = self.items.len();
        self.items
            .push(RenderItem::new(index, WOOD, geometry, args, self.frame_count));
        index
    }

    pub fn items(&self) -> &[RenderItem<G>] {
        &self.items
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn material(&self, id: MaterialId) -> &Material {
        &self.materials[id.0]
    }

    pub fn materials_mut(&mut self) -> &mut [Material] {
        &mut self.materials
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// 最近一次写入的渲染通道常量
    pub fn pass_constants(&self) -> &PassConstants {
        &self.pass
    }

    pub fn on_resize(&mut self, width: u32, height: u32) {
        self.camera.set_lens(0.25 * PI, width as f32 / height.max(1) as f32, NEAR_Z, FAR_Z);
        self.pass.set_render_target_size(width, height);
    }

    /// 更新相机并把常量写入 `frame`
    ///
    /// `frame` 必须是刚由帧资源环返回的槽位，GPU 已经不再读取它。
    pub fn update_frame<D: GraphicsDevice>(&mut self, frame: &mut FrameResource<D>, timer: &GameTimer) -> FrameWrites {
        self.camera.update_view();

        let objects = update_object_constants(&mut self.items, &mut frame.object_cb);
        let materials = update_material_constants(&mut self.materials, &mut frame.material_cb);

        let eye = self.camera.eye_position();
        self.pass.set_view_proj(self.camera.view_matrix(), self.camera.proj_matrix());
        self.pass.eye_pos_w = [eye.x, eye.y, eye.z];
        self.pass.total_time = timer.total_time();
        self.pass.delta_time = timer.delta_time();
        frame.pass_cb.copy_data(0, &self.pass);

        FrameWrites { objects, materials }
    }
}

/// 三盏方向光：主光、补光、背光
pub fn key_lights() -> [Light; 3] {
    [
        Light::directional([0.57735, -0.57735, 0.57735], [0.6, 0.6, 0.6]),
        Light::directional([-0.57735, -0.57735, 0.57735], [0.3, 0.3, 0.3]),
        Light::directional([0.0, -0.707, -0.707], [0.15, 0.15, 0.15]),
    ]
}

/// 纹理文件缺失时使用的棋盘格，RGBA8
pub fn checkerboard_rgba(size: u32, cells: u32) -> Vec<u8> {
    let cell = (size / cells.max(1)).max(1);
    let light = [200u8, 160, 110, 255];
    let dark = [120u8, 80, 45, 255];

    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let texel = if (x / cell + y / cell) % 2 == 0 { light } else { dark };
            pixels.extend_from_slice(&texel);
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::textured_box;
    use crate::gfx::software::SoftwareDevice;
    use crate::renderer::frame_resource::FrameResourceRing;
    use crate::renderer::sync::Fence;

    #[test]
    fn test_scene_defaults() {
        let scene: FabricScene<()> = FabricScene::new(&CameraConfig::default(), 3);
        assert_eq!(scene.camera.radius(), DEFAULT_RADIUS);
        let wood = scene.material(WOOD);
        assert_eq!(wood.name, "wood");
        assert_eq!(wood.fresnel_r0, [0.05; 3]);
        assert_eq!(wood.roughness, 0.2);
        assert_eq!(scene.pass_constants().ambient_light, [0.25, 0.25, 0.35, 1.0]);
        assert_eq!(scene.pass_constants().lights[1].strength, [0.3; 3]);
        assert!(scene.pass_constants().lights[3..]
            .iter()
            .all(|light| light.strength == [0.0; 3]));
    }

    #[test]
    fn test_update_frame_writes_dirty_data_once_per_slot() {
        const N: usize = 3;
        let device = SoftwareDevice::new();
        let mut ring = FrameResourceRing::new(&device, N, 1, 1, 1).unwrap();
        let fence = Fence::new(device.create_fence(0).unwrap());

        let mesh = textured_box(1.0, 1.0, 1.0);
        let args = mesh.whole();
        let mut scene = FabricScene::new(&CameraConfig::default(), N);
        scene.add_box(Arc::new(mesh), args);
        scene.on_resize(800, 600);

        let mut timer = GameTimer::new();
        timer.reset();

        let mut writes = Vec::new();
        for _ in 0..N + 1 {
            timer.tick();
            let frame = ring.advance(&fence).unwrap();
            writes.push(scene.update_frame(frame, &timer));
            assert_eq!(frame.pass_cb.read(0), *scene.pass_constants());
        }

        let once = FrameWrites { objects: 1, materials: 1 };
        assert_eq!(writes, vec![once, once, once, FrameWrites::default()]);
        assert_eq!(scene.pass_constants().render_target_size, [800.0, 600.0]);
    }

    #[test]
    fn test_checkerboard_alternates_cells() {
        let pixels = checkerboard_rgba(8, 2);
        assert_eq!(pixels.len(), 8 * 8 * 4);
        let texel = |x: usize, y: usize| &pixels[(y * 8 + x) * 4..(y * 8 + x) * 4 + 4];
        assert_eq!(texel(0, 0), texel(3, 3));
        assert_ne!(texel(0, 0), texel(4, 0));
        assert_eq!(texel(4, 0), texel(0, 4));
    }
}
