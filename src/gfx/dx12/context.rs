//! DirectX 12 图形上下文
//!
//! 封装设备、命令队列、交换链、RTV/DSV 描述符堆和深度缓冲。
//!
//! # 初始化流程
//!
//! 1. 启用调试层（Debug 模式）
//! 2. 创建 DXGI 工厂，列出适配器
//! 3. 创建 D3D12 设备，硬件设备失败时退回 WARP
//! 4. 创建命令队列、初始化用的命令分配器和命令列表
//! 5. 创建交换链和描述符堆
//! 6. 创建栅栏
//! 7. 按窗口大小创建渲染目标视图和深度缓冲
//!
//! 每帧的命令分配器属于帧资源环，不在这里。

use std::sync::Arc;

use raw_window_handle::{HasWindowHandle, RawWindowHandle};
use tracing::{debug, info, warn};
use windows::core::Interface;
use windows::Win32::Foundation::{HWND, RECT};
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::*;
use winit::dpi::LogicalSize;
use winit::event_loop::EventLoop;
use winit::window::{Window, WindowBuilder};

use super::device::{Dx12Allocator, Dx12Device, Dx12Fence, Dx12Queue};
use super::util::{dx_call, heap_properties, required, transition_barrier};
use crate::core::config::{Config, DepthFormat, MIN_WINDOW_SIZE};
use crate::core::error::{GraphicsError, RenderError, Result};
use crate::gfx::backend::{CommandAllocator, GraphicsDevice};
use crate::renderer::pipeline::FramePipeline;
use crate::renderer::sync::{Fence, FenceValue};

/// 交换链缓冲格式
pub const BACK_BUFFER_FORMAT: DXGI_FORMAT = DXGI_FORMAT_R8G8B8A8_UNORM;

/// DirectX 12 图形上下文
pub struct Dx12Context {
    window: Arc<Window>,
    device: Dx12Device,
    queue: Dx12Queue,
    swap_chain: IDXGISwapChain3,
    back_buffers: Vec<ID3D12Resource>,
    back_buffer_count: u32,
    rtv_heap: ID3D12DescriptorHeap,
    rtv_descriptor_size: usize,
    dsv_heap: ID3D12DescriptorHeap,
    depth_format: DXGI_FORMAT,
    depth_stencil_buffer: Option<ID3D12Resource>,
    /// 初始化和 resize 时使用的命令分配器
    setup_allocator: Dx12Allocator,
    /// 整个程序共用一个命令列表，每帧基于当前帧资源的分配器重置
    command_list: ID3D12GraphicsCommandList,
    fence: Fence<Dx12Fence>,
    viewport: D3D12_VIEWPORT,
    scissor_rect: RECT,
    vsync: bool,
    width: u32,
    height: u32,
}

impl Dx12Context {
    /// 创建窗口和 DirectX 12 上下文
    ///
    /// # 参数
    ///
    /// * `event_loop` - Winit 事件循环，用于创建窗口
    /// * `config` - 窗口大小、标题和图形配置
    pub fn new(event_loop: &EventLoop<()>, config: &Config) -> Result<Self> {
        let (width, height) = config.window.inner_size();

        let window = Arc::new(
            WindowBuilder::new()
                .with_title(config.window.title.clone())
                .with_inner_size(LogicalSize::new(width, height))
                .with_min_inner_size(LogicalSize::new(MIN_WINDOW_SIZE, MIN_WINDOW_SIZE))
                .with_resizable(config.window.resizable)
                .build(event_loop)
                .map_err(|e| RenderError::Initialization(format!("Failed to create window: {}", e)))?,
        );

        unsafe {
            #[cfg(debug_assertions)]
            {
                let mut debug: Option<ID3D12Debug> = None;
                match D3D12GetDebugInterface(&mut debug) {
                    Ok(()) => {
                        if let Some(debug) = debug {
                            debug.EnableDebugLayer();
                            debug!("DX12 Debug Layer enabled");
                        }
                    }
                    Err(_) => warn!("Failed to enable DX12 Debug Layer"),
                }
            }

            let factory_flags = if cfg!(debug_assertions) {
                DXGI_CREATE_FACTORY_DEBUG
            } else {
                DXGI_CREATE_FACTORY_FLAGS(0)
            };
            let factory: IDXGIFactory4 = dx_call!(CreateDXGIFactory2(factory_flags))?;
            log_adapters(&factory);

            let device = create_device(&factory)?;
            let queue = device.create_queue()?;
            let setup_allocator = device.create_command_allocator()?;
            let command_list = device.create_command_list(&setup_allocator)?;

            let hwnd = window_hwnd(&window)?;
            let back_buffer_count = config.graphics.back_buffer_count;
            let swap_chain_desc = DXGI_SWAP_CHAIN_DESC1 {
                Width: width,
                Height: height,
                Format: BACK_BUFFER_FORMAT,
                SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
                BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
                BufferCount: back_buffer_count,
                SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
                ..Default::default()
            };
            let swap_chain: IDXGISwapChain1 = dx_call!(factory.CreateSwapChainForHwnd(
                queue.raw(),
                hwnd,
                &swap_chain_desc,
                None,
                None,
            ))?;
            let swap_chain: IDXGISwapChain3 = dx_call!(swap_chain.cast())?;
            info!(width, height, buffers = back_buffer_count, "Swap chain created");

            let rtv_heap: ID3D12DescriptorHeap = dx_call!(device.raw().CreateDescriptorHeap(&D3D12_DESCRIPTOR_HEAP_DESC {
                Type: D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
                NumDescriptors: back_buffer_count,
                Flags: D3D12_DESCRIPTOR_HEAP_FLAG_NONE,
                NodeMask: 0,
            }))?;
            let rtv_descriptor_size =
                device.raw().GetDescriptorHandleIncrementSize(D3D12_DESCRIPTOR_HEAP_TYPE_RTV) as usize;

            let dsv_heap: ID3D12DescriptorHeap = dx_call!(device.raw().CreateDescriptorHeap(&D3D12_DESCRIPTOR_HEAP_DESC {
                Type: D3D12_DESCRIPTOR_HEAP_TYPE_DSV,
                NumDescriptors: 1,
                Flags: D3D12_DESCRIPTOR_HEAP_FLAG_NONE,
                NodeMask: 0,
            }))?;

            let fence = Fence::new(device.create_fence(0)?);

            let depth_format = match config.graphics.depth_format {
                DepthFormat::D24S8 => DXGI_FORMAT_D24_UNORM_S8_UINT,
                DepthFormat::D32 => DXGI_FORMAT_D32_FLOAT,
            };

            let mut context = Self {
                window,
                device,
                queue,
                swap_chain,
                back_buffers: Vec::new(),
                back_buffer_count,
                rtv_heap,
                rtv_descriptor_size,
                dsv_heap,
                depth_format,
                depth_stencil_buffer: None,
                setup_allocator,
                command_list,
                fence,
                viewport: D3D12_VIEWPORT::default(),
                scissor_rect: RECT::default(),
                vsync: config.graphics.vsync,
                width,
                height,
            };

            let size = context.window.inner_size();
            context.resize(size.width, size.height)?;

            info!("DX12 Backend initialization complete");
            Ok(context)
        }
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn device(&self) -> &Dx12Device {
        &self.device
    }

    pub fn queue(&self) -> &Dx12Queue {
        &self.queue
    }

    pub fn command_list(&self) -> &ID3D12GraphicsCommandList {
        &self.command_list
    }

    pub fn fence(&self) -> &Fence<Dx12Fence> {
        &self.fence
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    pub fn depth_format(&self) -> DXGI_FORMAT {
        self.depth_format
    }

    pub fn viewport(&self) -> &D3D12_VIEWPORT {
        &self.viewport
    }

    pub fn scissor_rect(&self) -> &RECT {
        &self.scissor_rect
    }

    /// 当前的后台缓冲
    pub fn current_back_buffer(&self) -> Result<&ID3D12Resource> {
        let index = unsafe { self.swap_chain.GetCurrentBackBufferIndex() } as usize;
        self.back_buffers.get(index).ok_or_else(|| {
            GraphicsError::SwapchainError(format!("Back buffer {} does not exist", index)).into()
        })
    }

    pub fn current_back_buffer_view(&self) -> D3D12_CPU_DESCRIPTOR_HANDLE {
        let index = unsafe { self.swap_chain.GetCurrentBackBufferIndex() } as usize;
        let start = unsafe { self.rtv_heap.GetCPUDescriptorHandleForHeapStart() };
        D3D12_CPU_DESCRIPTOR_HANDLE {
            ptr: start.ptr + index * self.rtv_descriptor_size,
        }
    }

    pub fn depth_stencil_view(&self) -> D3D12_CPU_DESCRIPTOR_HANDLE {
        unsafe { self.dsv_heap.GetCPUDescriptorHandleForHeapStart() }
    }

    /// 阻塞直到 GPU 执行完所有已提交的命令
    pub fn flush(&mut self) -> Result<()> {
        self.fence.flush(&self.queue)?;
        Ok(())
    }

    /// 重置命令列表用于初始化命令（资源上传等）
    pub fn begin_setup(&mut self) -> Result<&ID3D12GraphicsCommandList> {
        self.flush()?;
        self.setup_allocator.reset()?;
        unsafe {
            dx_call!(self
                .command_list
                .Reset(self.setup_allocator.raw(), None::<&ID3D12PipelineState>))?;
        }
        Ok(&self.command_list)
    }

    /// 关闭并提交初始化命令，等待执行完
    pub fn end_setup(&mut self) -> Result<()> {
        unsafe { dx_call!(self.command_list.Close())? };
        self.queue.execute(&self.command_list)?;
        self.flush()
    }

    /// 窗口大小改变
    ///
    /// 等待 GPU 空闲，释放旧的后台缓冲和深度缓冲，调整交换链大小，
    /// 重建渲染目标视图和深度缓冲，再次等待 GPU 空闲。宽或高为 0（最小化）时什么都不做。
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }

        self.begin_setup()?;

        self.back_buffers.clear();
        self.depth_stencil_buffer = None;

        unsafe {
            dx_call!(self.swap_chain.ResizeBuffers(
                self.back_buffer_count,
                width,
                height,
                BACK_BUFFER_FORMAT,
                DXGI_SWAP_CHAIN_FLAG(0),
            ))?;

            let rtv_start = self.rtv_heap.GetCPUDescriptorHandleForHeapStart();
            for i in 0..self.back_buffer_count {
                let buffer: ID3D12Resource = dx_call!(self.swap_chain.GetBuffer(i))?;
                let handle = D3D12_CPU_DESCRIPTOR_HANDLE {
                    ptr: rtv_start.ptr + i as usize * self.rtv_descriptor_size,
                };
                self.device.raw().CreateRenderTargetView(&buffer, None, handle);
                self.back_buffers.push(buffer);
            }

            let depth_desc = D3D12_RESOURCE_DESC {
                Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE2D,
                Alignment: 0,
                Width: width as u64,
                Height: height,
                DepthOrArraySize: 1,
                MipLevels: 1,
                Format: self.depth_format,
                SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
                Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
                Flags: D3D12_RESOURCE_FLAG_ALLOW_DEPTH_STENCIL,
            };
            let clear_value = D3D12_CLEAR_VALUE {
                Format: self.depth_format,
                Anonymous: D3D12_CLEAR_VALUE_0 {
                    DepthStencil: D3D12_DEPTH_STENCIL_VALUE { Depth: 1.0, Stencil: 0 },
                },
            };
            let mut depth_stencil_buffer: Option<ID3D12Resource> = None;
            dx_call!(self.device.raw().CreateCommittedResource(
                &heap_properties(D3D12_HEAP_TYPE_DEFAULT),
                D3D12_HEAP_FLAG_NONE,
                &depth_desc,
                D3D12_RESOURCE_STATE_COMMON,
                Some(&clear_value as *const _),
                &mut depth_stencil_buffer,
            ))?;
            let depth_stencil_buffer = required(depth_stencil_buffer, "CreateCommittedResource")?;
            self.device
                .raw()
                .CreateDepthStencilView(&depth_stencil_buffer, None, self.depth_stencil_view());

            self.command_list.ResourceBarrier(&[transition_barrier(
                &depth_stencil_buffer,
                D3D12_RESOURCE_STATE_COMMON,
                D3D12_RESOURCE_STATE_DEPTH_WRITE,
            )]);
            self.depth_stencil_buffer = Some(depth_stencil_buffer);
        }

        self.end_setup()?;

        self.width = width;
        self.height = height;
        self.viewport = D3D12_VIEWPORT {
            TopLeftX: 0.0,
            TopLeftY: 0.0,
            Width: width as f32,
            Height: height as f32,
            MinDepth: 0.0,
            MaxDepth: 1.0,
        };
        self.scissor_rect = RECT {
            left: 0,
            top: 0,
            right: width as i32,
            bottom: height as i32,
        };

        debug!(width, height, "Swap chain resized");
        Ok(())
    }

    /// 呈现当前后台缓冲
    ///
    /// 设备被移除或重置时返回 [`GraphicsError::DeviceLost`]。
    pub fn present(&self) -> Result<()> {
        present(&self.swap_chain, &self.device, self.vsync)
    }

    /// 关闭命令列表，提交、呈现，然后 signal 栅栏并记录到当前帧资源上
    pub fn submit_frame(&mut self, pipeline: &mut FramePipeline<Dx12Device>) -> Result<FenceValue> {
        unsafe { dx_call!(self.command_list.Close())? };
        let command_list = &self.command_list;
        let swap_chain = &self.swap_chain;
        let device = &self.device;
        let vsync = self.vsync;
        pipeline.submit(&mut self.fence, &self.queue, |queue| {
            queue.execute(command_list)?;
            present(swap_chain, device, vsync)
        })
    }

    /// 设置视口、裁剪矩形，把后台缓冲转换为渲染目标并清除颜色和深度
    pub fn begin_back_buffer_pass(&self, clear_color: [f32; 4]) -> Result<()> {
        let back_buffer = self.current_back_buffer()?;
        let rtv = self.current_back_buffer_view();
        let dsv = self.depth_stencil_view();
        let list = &self.command_list;

        unsafe {
            list.RSSetViewports(&[self.viewport]);
            list.RSSetScissorRects(&[self.scissor_rect]);
            list.ResourceBarrier(&[transition_barrier(
                back_buffer,
                D3D12_RESOURCE_STATE_PRESENT,
                D3D12_RESOURCE_STATE_RENDER_TARGET,
            )]);
            list.ClearRenderTargetView(rtv, &clear_color, None);
            list.ClearDepthStencilView(
                dsv,
                D3D12_CLEAR_FLAG_DEPTH | D3D12_CLEAR_FLAG_STENCIL,
                1.0,
                0,
                None,
            );
            list.OMSetRenderTargets(1, Some(&rtv as *const _), true, Some(&dsv as *const _));
        }
        Ok(())
    }

    /// 把后台缓冲转换回呈现状态
    pub fn end_back_buffer_pass(&self) -> Result<()> {
        let back_buffer = self.current_back_buffer()?;
        unsafe {
            self.command_list.ResourceBarrier(&[transition_barrier(
                back_buffer,
                D3D12_RESOURCE_STATE_RENDER_TARGET,
                D3D12_RESOURCE_STATE_PRESENT,
            )]);
        }
        Ok(())
    }
}

impl Drop for Dx12Context {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to flush command queue on shutdown: {}", e);
        }
    }
}

fn present(swap_chain: &IDXGISwapChain3, device: &Dx12Device, vsync: bool) -> Result<()> {
    let sync_interval = if vsync { 1 } else { 0 };
    let hr = unsafe { swap_chain.Present(sync_interval, DXGI_PRESENT(0)) };
    if hr == DXGI_ERROR_DEVICE_REMOVED || hr == DXGI_ERROR_DEVICE_RESET {
        let reason = unsafe { device.raw().GetDeviceRemovedReason() };
        return Err(GraphicsError::DeviceLost(format!(
            "Present failed: {}; removed reason: {:?}",
            hr.message(),
            reason
        ))
        .into());
    }
    dx_call!(hr.ok())
}

fn window_hwnd(window: &Window) -> Result<HWND> {
    let handle = window
        .window_handle()
        .map_err(|e| RenderError::Initialization(format!("Failed to get window handle: {}", e)))?;
    match handle.as_raw() {
        RawWindowHandle::Win32(win32) => Ok(HWND(win32.hwnd.get() as *mut core::ffi::c_void)),
        _ => Err(RenderError::Initialization(
            "Expected Win32 window handle on Windows platform".to_string(),
        )),
    }
}

/// 硬件设备创建失败时退回 WARP 软件光栅化器
fn create_device(factory: &IDXGIFactory4) -> Result<Dx12Device> {
    unsafe {
        let mut device: Option<ID3D12Device> = None;
        if let Err(e) = D3D12CreateDevice(None, D3D_FEATURE_LEVEL_11_0, &mut device) {
            warn!("Hardware device creation failed ({}), falling back to WARP", e.message());
            let warp: IDXGIAdapter = dx_call!(factory.EnumWarpAdapter())?;
            dx_call!(D3D12CreateDevice(&warp, D3D_FEATURE_LEVEL_11_0, &mut device))?;
        }
        let device = required(device, "D3D12CreateDevice").map_err(|e| {
            RenderError::Graphics(GraphicsError::DeviceCreation(e.to_string()))
        })?;
        info!("D3D12 Device created successfully");
        Ok(Dx12Device::new(device))
    }
}

fn log_adapters(factory: &IDXGIFactory4) {
    let mut index = 0;
    while let Ok(adapter) = unsafe { factory.EnumAdapters1(index) } {
        if let Ok(desc) = unsafe { adapter.GetDesc1() } {
            let len = desc.Description.iter().position(|&c| c == 0).unwrap_or(desc.Description.len());
            let name = String::from_utf16_lossy(&desc.Description[..len]);
            debug!(index, adapter = %name, dedicated_video_memory = desc.DedicatedVideoMemory, "Adapter");
        }
        index += 1;
    }
}
