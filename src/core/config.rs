//! 配置管理模块
//!
//! 支持从 TOML 配置文件加载，也支持命令行参数覆盖。
//!
//! # 配置文件格式 (config.toml)
//!
//! ```toml
//! [window]
//! width = 800
//! height = 600
//! title = "D3D Frame"
//! resizable = true
//!
//! [graphics]
//! frame_resources = 3      # 帧资源环的槽位数 N
//! vsync = false
//! back_buffer_count = 2
//! depth_format = "d24s8"   # 或 "d32"
//!
//! [camera]
//! radius_min = 5.0
//! radius_max = 150.0
//! phi_margin = 0.1
//!
//! [sample]
//! kind = "fabric"          # 或 "box"
//! texture = "textures/wood.png"
//!
//! [logging]
//! level = "info"           # trace, debug, info, warn, error
//! file_output = false
//! ```

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::path::Path;

use super::error::{ConfigError, Result};

/// 帧资源数量的上限
pub const MAX_FRAME_RESOURCES: usize = 8;

/// 窗口客户区的最小宽高（逻辑像素）
pub const MIN_WINDOW_SIZE: u32 = 200;

/// 框架配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 窗口配置
    pub window: WindowConfig,

    /// 图形配置
    pub graphics: GraphicsConfig,

    /// 轨道相机配置
    pub camera: CameraConfig,

    /// 示例程序选择
    pub sample: SampleConfig,

    /// 日志配置
    pub logging: LoggingConfig,
}

/// 窗口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_resizable")]
    pub resizable: bool,
}

/// 图形配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// 帧资源环的槽位数
    #[serde(default = "default_frame_resources")]
    pub frame_resources: usize,

    /// 垂直同步
    #[serde(default = "default_vsync")]
    pub vsync: bool,

    /// 交换链缓冲数量
    #[serde(default = "default_back_buffer_count")]
    pub back_buffer_count: u32,

    /// 深度缓冲格式
    #[serde(default = "default_depth_format")]
    pub depth_format: DepthFormat,
}

/// 深度缓冲格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepthFormat {
    #[serde(rename = "d24s8")]
    D24S8,
    #[serde(rename = "d32")]
    D32,
}

/// 轨道相机配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_theta")]
    pub theta: f32,

    #[serde(default = "default_phi")]
    pub phi: f32,

    /// 初始半径，未设置时由示例程序决定
    #[serde(default)]
    pub radius: Option<f32>,

    #[serde(default = "default_radius_min")]
    pub radius_min: f32,

    #[serde(default = "default_radius_max")]
    pub radius_max: f32,

    /// phi 与 0 和 π 之间保留的间隔
    #[serde(default = "default_phi_margin")]
    pub phi_margin: f32,

    /// 左键拖动时每像素旋转的角度（度）
    #[serde(default = "default_rotate_degrees_per_pixel")]
    pub rotate_degrees_per_pixel: f32,

    /// 右键拖动时每像素缩放的距离
    #[serde(default = "default_zoom_per_pixel")]
    pub zoom_per_pixel: f32,
}

/// 示例程序类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    /// 线框立方体
    Box,
    /// 带纹理和光照的立方体
    Fabric,
}

/// 示例程序配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleConfig {
    #[serde(default = "default_sample_kind")]
    pub kind: SampleKind,

    /// 无窗口模式，使用软件后端运行固定帧数
    #[serde(default)]
    pub headless: bool,

    /// 无窗口模式下运行的帧数
    #[serde(default = "default_headless_frames")]
    pub frames: u32,

    /// fabric 示例的漫反射纹理，缺失时使用程序生成的棋盘格
    #[serde(default = "default_texture")]
    pub texture: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    #[serde(default = "default_file_output")]
    pub file_output: bool,

    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }
fn default_title() -> String { "D3D Frame".to_string() }
fn default_resizable() -> bool { true }
fn default_frame_resources() -> usize { 3 }
fn default_vsync() -> bool { false }
fn default_back_buffer_count() -> u32 { 2 }
fn default_depth_format() -> DepthFormat { DepthFormat::D24S8 }
fn default_theta() -> f32 { 1.5 * PI }
fn default_phi() -> f32 { 0.25 * PI }
fn default_radius_min() -> f32 { 5.0 }
fn default_radius_max() -> f32 { 150.0 }
fn default_phi_margin() -> f32 { 0.1 }
fn default_rotate_degrees_per_pixel() -> f32 { 0.25 }
fn default_zoom_per_pixel() -> f32 { 0.05 }
fn default_sample_kind() -> SampleKind { SampleKind::Fabric }
fn default_headless_frames() -> u32 { 120 }
fn default_texture() -> String { "textures/wood.png".to_string() }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_file_output() -> bool { false }
fn default_log_file() -> String { "d3d_frame.log".to_string() }

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
            resizable: default_resizable(),
        }
    }
}

impl WindowConfig {
    /// 初始客户区大小，不小于 [`MIN_WINDOW_SIZE`]
    pub fn inner_size(&self) -> (u32, u32) {
        (self.width.max(MIN_WINDOW_SIZE), self.height.max(MIN_WINDOW_SIZE))
    }
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            frame_resources: default_frame_resources(),
            vsync: default_vsync(),
            back_buffer_count: default_back_buffer_count(),
            depth_format: default_depth_format(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            theta: default_theta(),
            phi: default_phi(),
            radius: None,
            radius_min: default_radius_min(),
            radius_max: default_radius_max(),
            phi_margin: default_phi_margin(),
            rotate_degrees_per_pixel: default_rotate_degrees_per_pixel(),
            zoom_per_pixel: default_zoom_per_pixel(),
        }
    }
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            kind: default_sample_kind(),
            headless: false,
            frames: default_headless_frames(),
            texture: default_texture(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: default_file_output(),
            log_file: default_log_file(),
        }
    }
}

impl Config {
    /// 从配置文件加载
    ///
    /// # 参数
    ///
    /// * `path` - 配置文件路径
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path_str))?;

        Self::from_toml(&contents)
    }

    /// 从 TOML 文本解析
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 从配置文件加载，如果文件不存在或无法解析则使用默认配置
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_default()
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// 从命令行参数覆盖配置
    ///
    /// 支持的参数：
    /// - `--box` / `--fabric`: 选择示例程序
    /// - `--headless`: 使用软件后端，不创建窗口
    /// - `--frames <value>`: 无窗口模式下运行的帧数
    /// - `--frame-resources <value>`: 帧资源数量
    /// - `--width <value>` / `--height <value>`: 窗口尺寸
    pub fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

        if args.iter().any(|a| a == "--box") {
            self.sample.kind = SampleKind::Box;
        }
        if args.iter().any(|a| a == "--fabric") {
            self.sample.kind = SampleKind::Fabric;
        }
        if args.iter().any(|a| a == "--headless") {
            self.sample.headless = true;
        }

        if let Some(width) = parse_flag(&args, "--width") {
            self.window.width = width;
        }
        if let Some(height) = parse_flag(&args, "--height") {
            self.window.height = height;
        }
        if let Some(frames) = parse_flag(&args, "--frames") {
            self.sample.frames = frames;
        }
        if let Some(count) = parse_flag(&args, "--frame-resources") {
            self.graphics.frame_resources = count;
        }
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(invalid("window.width/height", "Window dimensions must be greater than 0"));
        }

        if !(1..=MAX_FRAME_RESOURCES).contains(&self.graphics.frame_resources) {
            return Err(invalid(
                "graphics.frame_resources",
                &format!("Must be between 1 and {}", MAX_FRAME_RESOURCES),
            ));
        }

        if !(2..=3).contains(&self.graphics.back_buffer_count) {
            return Err(invalid("graphics.back_buffer_count", "Must be 2 or 3"));
        }

        let camera = &self.camera;
        if camera.radius_min <= 0.0 || camera.radius_min >= camera.radius_max {
            return Err(invalid(
                "camera.radius_min/radius_max",
                "Radius bounds must be positive and radius_min < radius_max",
            ));
        }

        if camera.phi_margin <= 0.0 || camera.phi_margin >= 0.5 * PI {
            return Err(invalid("camera.phi_margin", "Must be inside (0, π/2)"));
        }

        Ok(())
    }
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    let idx = args.iter().position(|a| a == flag)?;
    args.get(idx + 1)?.parse().ok()
}

fn invalid(field: &str, reason: &str) -> super::error::RenderError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.graphics.frame_resources, 3);
        assert_eq!(config.graphics.depth_format, DepthFormat::D24S8);
        assert_eq!(config.camera.radius_min, 5.0);
        assert_eq!(config.camera.radius_max, 150.0);
        assert_eq!(config.sample.kind, SampleKind::Fabric);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.window.width = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.graphics.frame_resources = 0;
        assert!(config.validate().is_err());
        config.graphics.frame_resources = MAX_FRAME_RESOURCES + 1;
        assert!(config.validate().is_err());
        config.graphics.frame_resources = 1;
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.camera.radius_min = 200.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.camera.phi_margin = 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_window_size_clamped_to_minimum() {
        let mut window = WindowConfig::default();
        assert_eq!(window.inner_size(), (window.width, window.height));
        window.width = 120;
        window.height = 40;
        assert_eq!(window.inner_size(), (MIN_WINDOW_SIZE, MIN_WINDOW_SIZE));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [graphics]
            frame_resources = 2
            depth_format = "d32"

            [sample]
            kind = "box"
            "#,
        )
        .unwrap();
        assert_eq!(config.graphics.frame_resources, 2);
        assert_eq!(config.graphics.depth_format, DepthFormat::D32);
        assert_eq!(config.sample.kind, SampleKind::Box);
        assert_eq!(config.window.width, 800);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let err = Config::from_toml("[graphics\nframe_resources = ").unwrap_err();
        assert!(err.to_string().starts_with("Configuration error: Failed to parse config"));
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        config.apply_args([
            "d3d_frame", "--box", "--headless", "--width", "1024", "--frames", "9",
            "--frame-resources", "2", "--height", "oops",
        ]);
        assert_eq!(config.sample.kind, SampleKind::Box);
        assert!(config.sample.headless);
        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.sample.frames, 9);
        assert_eq!(config.graphics.frame_resources, 2);
    }

    #[test]
    fn test_save_and_reload() {
        let path = std::env::temp_dir().join(format!("d3d_frame_config_{}.toml", std::process::id()));
        let mut config = Config::default();
        config.camera.radius = Some(2.5);
        config.save_to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.camera.radius, Some(2.5));
        assert_eq!(loaded.graphics.frame_resources, config.graphics.frame_resources);
    }
}
