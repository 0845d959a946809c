/// 顶点格式定义
///
/// 内存布局与 GPU 输入布局一致，使用 `#[repr(C)]` 保证顺序和对齐。

use bytemuck::{Pod, Zeroable};

/// 带颜色的顶点（线框立方体）
///
/// - position: 12 bytes, offset 0
/// - color: 16 bytes, offset 12
#[repr(C)]
#[derive(Default, Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ColorVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

/// 带法线和纹理坐标的顶点（光照纹理立方体）
///
/// - position: 12 bytes, offset 0
/// - normal: 12 bytes, offset 12
/// - tex_c: 8 bytes, offset 24
#[repr(C)]
#[derive(Default, Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_c: [f32; 2],
}

impl Vertex {
    #[inline]
    pub const fn new(position: [f32; 3], normal: [f32; 3], tex_c: [f32; 2]) -> Self {
        Self { position, normal, tex_c }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn test_vertex_layouts() {
        assert_eq!(size_of::<ColorVertex>(), 28);
        assert_eq!(offset_of!(ColorVertex, color), 12);

        assert_eq!(size_of::<Vertex>(), 32);
        assert_eq!(offset_of!(Vertex, normal), 12);
        assert_eq!(offset_of!(Vertex, tex_c), 24);
    }
}
