//! 示例程序
//!
//! - `box_app`：线框立方体（Windows）
//! - `fabric`：带纹理和光照的立方体（Windows）
//! - `fabric_scene`：fabric 示例与后端无关的场景
//! - `headless`：在软件后端上运行 fabric 场景

#[cfg(target_os = "windows")]
pub mod box_app;
#[cfg(target_os = "windows")]
pub mod fabric;
pub mod fabric_scene;
pub mod headless;

#[cfg(target_os = "windows")]
pub use box_app::BoxApp;
#[cfg(target_os = "windows")]
pub use fabric::FabricApp;
pub use fabric_scene::FabricScene;
pub use headless::{HeadlessFabric, HeadlessReport};
