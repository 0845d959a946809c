/// 网格数据结构模块
///
/// CPU 侧的顶点/索引数据，以及描述一次 DrawIndexedInstanced 调用的子网格参数。

use std::mem::size_of;

use bytemuck::Pod;

use super::vertex::{ColorVertex, Vertex};
use crate::math::Color;

/// 子网格绘制参数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmeshGeometry {
    pub index_count: u32,
    pub start_index_location: u32,
    pub base_vertex_location: i32,
}

/// CPU 侧网格数据
#[derive(Debug, Clone, Default)]
pub struct MeshData<V: Pod> {
    pub vertices: Vec<V>,
    pub indices: Vec<u16>,
}

impl<V: Pod> MeshData<V> {
    pub fn vertex_byte_stride(&self) -> u32 {
        size_of::<V>() as u32
    }

    pub fn vertex_buffer_byte_size(&self) -> u32 {
        (self.vertices.len() * size_of::<V>()) as u32
    }

    pub fn index_buffer_byte_size(&self) -> u32 {
        (self.indices.len() * size_of::<u16>()) as u32
    }

    /// 覆盖整个网格的子网格
    pub fn whole(&self) -> SubmeshGeometry {
        SubmeshGeometry {
            index_count: self.indices.len() as u32,
            start_index_location: 0,
            base_vertex_location: 0,
        }
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// 8 个顶点、每个角一种颜色的立方体，边长 2
pub fn colored_box() -> MeshData<ColorVertex> {
    let corner = |position: [f32; 3], color: Color| ColorVertex {
        position,
        color: color.to_array(),
    };

    let vertices = vec![
        corner([-1.0, -1.0, -1.0], Color::WHITE),
        corner([-1.0, 1.0, -1.0], Color::BLACK),
        corner([1.0, 1.0, -1.0], Color::RED),
        corner([1.0, -1.0, -1.0], Color::GREEN),
        corner([-1.0, -1.0, 1.0], Color::BLUE),
        corner([-1.0, 1.0, 1.0], Color::YELLOW),
        corner([1.0, 1.0, 1.0], Color::CYAN),
        corner([1.0, -1.0, 1.0], Color::MAGENTA),
    ];

    #[rustfmt::skip]
    let indices = vec![
        0, 1, 2, 0, 2, 3, // front
        4, 6, 5, 4, 7, 6, // back
        4, 5, 1, 4, 1, 0, // left
        3, 2, 6, 3, 6, 7, // right
        1, 5, 6, 1, 6, 2, // top
        4, 0, 3, 4, 3, 7, // bottom
    ];

    MeshData { vertices, indices }
}

/// 每个面 4 个独立顶点的立方体，带外法线和纹理坐标
pub fn textured_box(width: f32, height: f32, depth: f32) -> MeshData<Vertex> {
    let (w, h, d) = (0.5 * width, 0.5 * height, 0.5 * depth);

    #[rustfmt::skip]
    let vertices = vec![
        // front
        Vertex::new([-w, -h, -d], [0.0, 0.0, -1.0], [0.0, 1.0]),
        Vertex::new([-w,  h, -d], [0.0, 0.0, -1.0], [0.0, 0.0]),
        Vertex::new([ w,  h, -d], [0.0, 0.0, -1.0], [1.0, 0.0]),
        Vertex::new([ w, -h, -d], [0.0, 0.0, -1.0], [1.0, 1.0]),
        // back
        Vertex::new([-w, -h,  d], [0.0, 0.0, 1.0], [1.0, 1.0]),
        Vertex::new([ w, -h,  d], [0.0, 0.0, 1.0], [0.0, 1.0]),
        Vertex::new([ w,  h,  d], [0.0, 0.0, 1.0], [0.0, 0.0]),
        Vertex::new([-w,  h,  d], [0.0, 0.0, 1.0], [1.0, 0.0]),
        // top
        Vertex::new([-w,  h, -d], [0.0, 1.0, 0.0], [0.0, 1.0]),
        Vertex::new([-w,  h,  d], [0.0, 1.0, 0.0], [0.0, 0.0]),
        Vertex::new([ w,  h,  d], [0.0, 1.0, 0.0], [1.0, 0.0]),
        Vertex::new([ w,  h, -d], [0.0, 1.0, 0.0], [1.0, 1.0]),
        // bottom
        Vertex::new([-w, -h, -d], [0.0, -1.0, 0.0], [1.0, 1.0]),
        Vertex::new([ w, -h, -d], [0.0, -1.0, 0.0], [0.0, 1.0]),
        Vertex::new([ w, -h,  d], [0.0, -1.0, 0.0], [0.0, 0.0]),
        Vertex::new([-w, -h,  d], [0.0, -1.0, 0.0], [1.0, 0.0]),
        // left
        Vertex::new([-w, -h,  d], [-1.0, 0.0, 0.0], [0.0, 1.0]),
        Vertex::new([-w,  h,  d], [-1.0, 0.0, 0.0], [0.0, 0.0]),
        Vertex::new([-w,  h, -d], [-1.0, 0.0, 0.0], [1.0, 0.0]),
        Vertex::new([-w, -h, -d], [-1.0, 0.0, 0.0], [1.0, 1.0]),
        // right
        Vertex::new([ w, -h, -d], [1.0, 0.0, 0.0], [0.0, 1.0]),
        Vertex::new([ w,  h, -d], [1.0, 0.0, 0.0], [0.0, 0.0]),
        Vertex::new([ w,  h,  d], [1.0, 0.0, 0.0], [1.0, 0.0]),
        Vertex::new([ w, -h,  d], [1.0, 0.0, 0.0], [1.0, 1.0]),
    ];

    let indices = (0..6u16)
        .flat_map(|face| {
            let b = face * 4;
            [b, b + 1, b + 2, b, b + 2, b + 3]
        })
        .collect();

    MeshData { vertices, indices }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vector3;

    #[test]
    fn test_colored_box_shape() {
        let mesh = colored_box();
        assert_eq!(mesh.vertices.len(), 8);
        assert_eq!(mesh.indices.len(), 36);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
        assert_eq!(mesh.vertex_buffer_byte_size(), 8 * 28);
        assert_eq!(mesh.index_buffer_byte_size(), 72);
        assert_eq!(mesh.whole().index_count, 36);
    }

    #[test]
    fn test_textured_box_winding_faces_outward() {
        let mesh = textured_box(1.0, 1.0, 1.0);
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);

        for tri in mesh.indices.chunks(3) {
            let p = |i: u16| Vector3::from(mesh.vertices[i as usize].position);
            let n = Vector3::from(mesh.vertices[tri[0] as usize].normal);
            let face_normal = (p(tri[1]) - p(tri[0])).cross(&(p(tri[2]) - p(tri[0])));
            assert!(face_normal.dot(&n) > 0.0, "triangle {:?}", tri);
            // 法线与面的中心方向一致
            assert!(p(tri[0]).dot(&n) > 0.0);
        }
    }

    #[test]
    fn test_byte_views() {
        let mesh = textured_box(2.0, 2.0, 2.0);
        assert_eq!(mesh.vertex_bytes().len(), mesh.vertex_buffer_byte_size() as usize);
        assert_eq!(mesh.index_bytes().len(), mesh.index_buffer_byte_size() as usize);
        assert_eq!(mesh.vertex_byte_stride(), 32);
    }
}
