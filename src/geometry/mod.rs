/// 几何数据模块
///
/// - `vertex`: 顶点格式
/// - `mesh`: CPU 侧网格数据、子网格绘制参数和立方体生成函数

pub mod mesh;
pub mod vertex;

pub use mesh::{colored_box, textured_box, MeshData, SubmeshGeometry};
pub use vertex::{ColorVertex, Vertex};
