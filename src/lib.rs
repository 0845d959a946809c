//! D3D Frame - Direct3D 12 示例框架
//!
//! 围绕“帧资源”流水线组织的小型渲染框架：CPU 准备第 K+1 帧的同时 GPU 执行第 K 帧，
//! 两者只通过一个单调递增的栅栏同步。
//!
//! # 模块结构
//!
//! - `core`: 配置、日志、错误处理、计时器和输入
//! - `math`: nalgebra 类型别名和 Direct3D 风格的矩阵函数
//! - `geometry`: 顶点格式和立方体网格
//! - `component`: 轨道相机
//! - `gfx`: 后端抽象，Direct3D 12 实现和用于测试的软件实现
//! - `renderer`: 栅栏、上传缓冲区、帧资源环、帧流水线和渲染循环
//! - `samples`: 线框立方体、fabric 立方体和无窗口模式
//! - `app`: winit 消息循环
//!
//! # 使用示例
//!
//! ```no_run
//! use d3d_frame::core::Config;
//! use d3d_frame::samples::headless;
//!
//! let mut config = Config::default();
//! config.sample.frames = 60;
//! let report = headless::run(&config).unwrap();
//! assert_eq!(report.stale_reads, 0);
//! ```

pub mod app;
pub mod component;
pub mod core;
pub mod geometry;
pub mod gfx;
pub mod math;
pub mod renderer;
pub mod samples;
