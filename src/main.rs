//! D3D Frame 程序入口
//!
//! ```bash
//! # fabric 立方体（默认）
//! cargo run
//!
//! # 线框立方体（固定单个帧资源）
//! cargo run -- --box
//!
//! # fabric 立方体，两个帧资源
//! cargo run -- --frame-resources 2
//!
//! # 软件后端，不创建窗口
//! cargo run -- --headless --frames 300
//! ```

use anyhow::{bail, Context};
use tracing::{info, warn};

use d3d_frame::core::log;
use d3d_frame::core::Config;
use d3d_frame::samples::headless;

fn main() {
    if let Err(e) = run() {
        eprintln!("{:#}", e);
        show_error(&e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let mut config = Config::from_file_or_default("config.toml");
    config.apply_args(std::env::args().skip(1));
    config.validate().context("Invalid configuration")?;

    let log_file = config
        .logging
        .file_output
        .then_some(config.logging.log_file.as_str());
    log::init_logger(config.logging.level, config.logging.file_output, log_file)?;

    info!(version = env!("CARGO_PKG_VERSION"), "D3D Frame starting");
    info!(
        sample = ?config.sample.kind,
        frame_resources = config.graphics.frame_resources,
        width = config.window.width,
        height = config.window.height,
        headless = config.sample.headless,
        "Configuration loaded"
    );

    if config.sample.headless || !cfg!(target_os = "windows") {
        if !config.sample.headless {
            warn!("Direct3D 12 is only available on Windows; running headless");
        }
        let report = headless::run(&config).context("Headless run failed")?;
        if report.stale_reads > 0 {
            bail!(
                "{} of {} frames read constants that were overwritten before the GPU consumed them",
                report.stale_reads,
                report.frames_submitted
            );
        }
        return Ok(());
    }

    #[cfg(target_os = "windows")]
    run_windowed(&config)?;
    Ok(())
}

#[cfg(target_os = "windows")]
fn run_windowed(config: &Config) -> anyhow::Result<()> {
    use d3d_frame::app;
    use d3d_frame::core::config::SampleKind;
    use d3d_frame::gfx::Dx12Context;
    use d3d_frame::samples::{BoxApp, FabricApp};
    use winit::event_loop::EventLoop;

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let context = Dx12Context::new(&event_loop, config).context("Failed to initialize Direct3D 12")?;
    let window = context.window().clone();

    match config.sample.kind {
        SampleKind::Box => app::run(event_loop, window, BoxApp::new(context, config)?)?,
        SampleKind::Fabric => app::run(event_loop, window, FabricApp::new(context, config)?)?,
    }
    info!("Shut down cleanly");
    Ok(())
}

#[cfg(target_os = "windows")]
fn show_error(error: &anyhow::Error) {
    use windows::core::HSTRING;
    use windows::Win32::UI::WindowsAndMessaging::{MessageBoxW, MB_ICONERROR, MB_OK};

    let text = HSTRING::from(format!("{:#}", error));
    unsafe {
        MessageBoxW(None, &text, &HSTRING::from("D3D Frame"), MB_OK | MB_ICONERROR);
    }
}

#[cfg(not(target_os = "windows"))]
fn show_error(_error: &anyhow::Error) {}
