//! 核心功能模块
//!
//! 提供与图形 API 无关的基础设施：日志、配置、错误处理、计时器和输入。
//!
//! - `log`：日志系统，基于 tracing
//! - `config`：配置管理，支持 TOML 文件和命令行覆盖
//! - `error`：统一的错误类型
//! - `timer`：带暂停功能的游戏计时器
//! - `input`：鼠标/键盘状态跟踪

pub mod config;
pub mod error;
pub mod input;
pub mod log;
pub mod timer;

pub use config::Config;
pub use error::{RenderError, Result};
pub use timer::GameTimer;
