//! 渲染项与材质
//!
//! 网格和材质是共享资源，渲染项只引用它们。每个渲染项和材质都带一个
//! “脏帧计数”：数据改变时设为 N（帧资源数量），之后每帧把常量拷贝到当前槽位
//! 并减一，减到 0 时所有槽位都拿到了新数据。

use std::sync::Arc;

use super::constants::{MaterialConstants, ObjectConstants};
use super::resource::UploadBuffer;
use crate::geometry::SubmeshGeometry;
use crate::gfx::backend::MappedMemory;
use crate::math::{matrix, Matrix4};

/// 图元拓扑
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimitiveTopology {
    #[default]
    TriangleList,
    LineList,
}

/// 材质在材质表中的下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(pub usize);

/// 材质
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    /// 在材质常量缓冲区中的下标
    pub cb_index: usize,
    /// 漫反射纹理在 SRV 堆中的下标
    pub diffuse_srv_index: usize,
    pub diffuse_albedo: [f32; 4],
    pub fresnel_r0: [f32; 3],
    pub roughness: f32,
    pub transform: Matrix4,
    num_frames_dirty: usize,
}

impl Material {
    /// 新材质对所有槽位都是脏的
    pub fn new(name: impl Into<String>, cb_index: usize, diffuse_srv_index: usize, frame_count: usize) -> Self {
        Self {
            name: name.into(),
            cb_index,
            diffuse_srv_index,
            diffuse_albedo: [1.0; 4],
            fresnel_r0: [0.01; 3],
            roughness: 0.25,
            transform: Matrix4::identity(),
            num_frames_dirty: frame_count,
        }
    }

    /// 修改了公开字段之后调用
    pub fn mark_dirty(&mut self, frame_count: usize) {
        self.num_frames_dirty = frame_count;
    }

    pub fn num_frames_dirty(&self) -> usize {
        self.num_frames_dirty
    }

    pub fn constants(&self) -> MaterialConstants {
        MaterialConstants {
            diffuse_albedo: self.diffuse_albedo,
            fresnel_r0: self.fresnel_r0,
            roughness: self.roughness,
            mat_transform: matrix::to_gpu(&self.transform),
        }
    }
}

/// 渲染项：一次绘制调用的描述
///
/// `G` 是后端的网格类型，由多个渲染项共享。
pub struct RenderItem<G> {
    world: Matrix4,
    tex_transform: Matrix4,
    num_frames_dirty: usize,
    /// 在物体常量缓冲区中的下标
    pub obj_cb_index: usize,
    pub material: MaterialId,
    pub geometry: Arc<G>,
    pub topology: PrimitiveTopology,
    pub args: SubmeshGeometry,
}

impl<G> RenderItem<G> {
    pub fn new(
        obj_cb_index: usize,
        material: MaterialId,
        geometry: Arc<G>,
        args: SubmeshGeometry,
        frame_count: usize,
    ) -> Self {
        Self {
            world: Matrix4::identity(),
            tex_transform: Matrix4::identity(),
            num_frames_dirty: frame_count,
            obj_cb_index,
            material,
            geometry,
            topology: PrimitiveTopology::TriangleList,
            args,
        }
    }

    pub fn world(&self) -> &Matrix4 {
        &self.world
    }

    pub fn num_frames_dirty(&self) -> usize {
        self.num_frames_dirty
    }

    /// 设置世界矩阵，接下来 `frame_count` 帧都会重新上传
    pub fn set_world(&mut self, world: Matrix4, frame_count: usize) {
        self.world = world;
        self.num_frames_dirty = frame_count;
    }

    pub fn constants(&self) -> ObjectConstants {
        ObjectConstants::new(&self.world, &self.tex_transform)
    }
}

/// 把脏的渲染项常量拷贝到当前槽位的物体常量缓冲区
///
/// # 返回值
///
/// 本次写入的渲染项数量
pub fn update_object_constants<G, M: MappedMemory>(
    items: &mut [RenderItem<G>],
    object_cb: &mut UploadBuffer<ObjectConstants, M>,
) -> usize {
    let mut written = 0;
    for item in items.iter_mut().filter(|item| item.num_frames_dirty > 0) {
        object_cb.copy_data(item.obj_cb_index, &item.constants());
        item.num_frames_dirty -= 1;
        written += 1;
    }
    written
}

/// 把脏的材质常量拷贝到当前槽位的材质常量缓冲区
pub fn update_material_constants<M: MappedMemory>(
    materials: &mut [Material],
    material_cb: &mut UploadBuffer<MaterialConstants, M>,
) -> usize {
    let mut written = 0;
    for material in materials.iter_mut().filter(|m| m.num_frames_dirty > 0) {
        material_cb.copy_data(material.cb_index, &material.constants());
        material.num_frames_dirty -= 1;
        written += 1;
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::software::SoftwareDevice;
    use crate::renderer::frame_resource::FrameResourceRing;
    use crate::renderer::sync::Fence;
    use crate::gfx::backend::GraphicsDevice;

    const N: usize = 3;

    #[test]
    fn test_dirty_counter_propagates_to_every_slot_once() {
        let device = SoftwareDevice::new();
        let mut ring = FrameResourceRing::new(&device, N, 1, 2, 1).unwrap();
        let fence = Fence::new(device.create_fence(0).unwrap());

        let mesh = Arc::new(());
        let mut items = vec![
            RenderItem::new(0, MaterialId(0), mesh.clone(), SubmeshGeometry::default(), N),
            RenderItem::new(1, MaterialId(0), mesh, SubmeshGeometry::default(), N),
        ];

        // 初始数据传播完
        for _ in 0..N {
            let frame = ring.advance(&fence).unwrap();
            update_object_constants(&mut items, &mut frame.object_cb);
        }
        assert!(items.iter().all(|item| item.num_frames_dirty() == 0));

        let moved = matrix::translation(0.0, 2.0, 0.0);
        items[1].set_world(moved, N);

        let mut writes = Vec::new();
        for _ in 0..N + 2 {
            let frame = ring.advance(&fence).unwrap();
            writes.push(update_object_constants(&mut items, &mut frame.object_cb));
        }
        assert_eq!(writes, vec![1, 1, 1, 0, 0]);
        assert_eq!(items[1].num_frames_dirty(), 0);

        let expected = ObjectConstants::new(&moved, &Matrix4::identity());
        for resource in ring.iter() {
            assert_eq!(resource.object_cb.read(1), expected);
            assert_eq!(resource.object_cb.read(0), ObjectConstants::default());
        }
    }

    #[test]
    fn test_material_dirty_counter() {
        let device = SoftwareDevice::new();
        let mut ring = FrameResourceRing::new(&device, N, 1, 1, 2).unwrap();
        let fence = Fence::new(device.create_fence(0).unwrap());

        let mut materials = vec![Material::new("a", 0, 0, N), Material::new("b", 1, 0, N)];
        materials[1].roughness = 0.9;
        materials[1].mark_dirty(N);

        let mut total = 0;
        for _ in 0..N {
            let frame = ring.advance(&fence).unwrap();
            total += update_material_constants(&mut materials, &mut frame.material_cb);
        }
        assert_eq!(total, 2 * N);
        for resource in ring.iter() {
            assert_eq!(resource.material_cb.read(1).roughness, 0.9);
        }

        let frame = ring.advance(&fence).unwrap();
        assert_eq!(update_material_constants(&mut materials, &mut frame.material_cb), 0);
    }
}
