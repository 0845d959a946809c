//! 组件模块
//!
//! 目前只有示例程序使用的轨道相机。

mod camera;

pub use camera::{OrbitBounds, OrbitCamera};
