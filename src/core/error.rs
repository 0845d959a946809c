//! 错误处理模块
//!
//! 定义了框架中使用的统一错误类型。所有原生图形 API 调用失败都会被转换为
//! [`GraphicsError`] 并通过 `?` 向上传播，只有入口点才会把错误展示给用户。
//!
//! 设备丢失（device removed/reset）是唯一被视为不可恢复的错误，见
//! [`RenderError::is_device_lost`]。

use std::fmt;

/// 框架统一的 Result 类型
pub type Result<T> = std::result::Result<T, RenderError>;

/// 框架的错误类型
#[derive(Debug)]
pub enum RenderError {
    /// 配置错误
    Config(ConfigError),

    /// 图形 API 错误
    Graphics(GraphicsError),

    /// IO 错误
    Io(std::io::Error),

    /// 日志系统错误
    Log(String),

    /// 初始化错误
    Initialization(String),

    /// 运行时错误（例如帧流水线状态不合法）
    Runtime(String),
}

/// 配置相关的错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),

    /// 配置文件解析失败
    ParseError(String),

    /// 配置值无效
    InvalidValue { field: String, reason: String },
}

/// 图形 API 相关的错误
#[derive(Debug)]
pub enum GraphicsError {
    /// 设备创建失败
    DeviceCreation(String),

    /// 交换链错误
    SwapchainError(String),

    /// 着色器编译失败
    ShaderCompilation(String),

    /// 资源创建失败
    ResourceCreation(String),

    /// 渲染命令执行失败
    CommandExecution(String),

    /// 原生 API 调用失败
    ///
    /// 记录失败的调用文本、调用位置、HRESULT 以及系统给出的可读描述。
    NativeCall {
        call: String,
        file: &'static str,
        line: u32,
        code: i32,
        message: String,
    },

    /// 设备丢失，不可恢复
    DeviceLost(String),
}

impl RenderError {
    /// 是否为不可恢复的设备丢失
    pub fn is_device_lost(&self) -> bool {
        matches!(self, RenderError::Graphics(GraphicsError::DeviceLost(_)))
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Config(e) => write!(f, "Configuration error: {}", e),
            RenderError::Graphics(e) => write!(f, "Graphics error: {}", e),
            RenderError::Io(e) => write!(f, "IO error: {}", e),
            RenderError::Log(msg) => write!(f, "Log error: {}", msg),
            RenderError::Initialization(msg) => write!(f, "Initialization error: {}", msg),
            RenderError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphicsError::DeviceCreation(msg) => write!(f, "Device creation failed: {}", msg),
            GraphicsError::SwapchainError(msg) => write!(f, "Swapchain error: {}", msg),
            GraphicsError::ShaderCompilation(msg) => write!(f, "Shader compilation failed: {}", msg),
            GraphicsError::ResourceCreation(msg) => write!(f, "Resource creation failed: {}", msg),
            GraphicsError::CommandExecution(msg) => write!(f, "Command execution failed: {}", msg),
            GraphicsError::NativeCall { call, file, line, code, message } => write!(
                f,
                "{} failed in {}; line {}; hr=0x{:08X}; error: {}",
                call, file, line, *code as u32, message
            ),
            GraphicsError::DeviceLost(msg) => write!(f, "Device lost: {}", msg),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Io(e) => Some(e),
            RenderError::Config(e) => Some(e),
            RenderError::Graphics(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for GraphicsError {}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::Io(err)
    }
}

impl From<ConfigError> for RenderError {
    fn from(err: ConfigError) -> Self {
        RenderError::Config(err)
    }
}

impl From<GraphicsError> for RenderError {
    fn from(err: GraphicsError) -> Self {
        RenderError::Graphics(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_call_display() {
        let err = RenderError::from(GraphicsError::NativeCall {
            call: "device.CreateFence".to_string(),
            file: "src/gfx/dx12/device.rs",
            line: 42,
            code: 0x887A0005u32 as i32,
            message: "The GPU device instance has been suspended.".to_string(),
        });
        let text = err.to_string();
        assert!(text.starts_with("Graphics error: device.CreateFence failed"));
        assert!(text.contains("src/gfx/dx12/device.rs; line 42"));
        assert!(text.contains("hr=0x887A0005"));
    }

    #[test]
    fn test_device_lost_is_the_only_fatal_kind() {
        assert!(RenderError::from(GraphicsError::DeviceLost("removed".into())).is_device_lost());
        assert!(!RenderError::from(GraphicsError::CommandExecution("x".into())).is_device_lost());
        assert!(!RenderError::Runtime("x".into()).is_device_lost());
    }

    #[test]
    fn test_io_error_has_source() {
        use std::error::Error;
        let err = RenderError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "IO error: missing");
    }
}
