//! DirectX 12 辅助函数
//!
//! 所有原生调用都通过 [`dx_call!`] 包装：失败时记录调用的源码文本、调用位置、
//! HRESULT 和系统给出的错误描述。设备被移除或重置时返回
//! [`GraphicsError::DeviceLost`]。

use std::mem::ManuallyDrop;
use std::panic::Location;
use std::path::Path;

use tracing::{error, warn};
use windows::core::PCSTR;
use windows::Win32::Graphics::Direct3D::Fxc::*;
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::{
    DXGI_ERROR_DEVICE_HUNG, DXGI_ERROR_DEVICE_REMOVED, DXGI_ERROR_DEVICE_RESET,
};

use crate::core::error::{GraphicsError, RenderError, Result};

/// 执行一个返回 `windows::core::Result` 的原生调用，失败时转换为框架错误
macro_rules! dx_call {
    ($call:expr) => {
        $crate::gfx::dx12::util::DxResultExt::dx($call, stringify!($call))
    };
}
pub(crate) use dx_call;

/// `windows::core::Result` 到框架 `Result` 的转换
pub trait DxResultExt<T> {
    fn dx(self, call: &str) -> Result<T>;
}

impl<T> DxResultExt<T> for windows::core::Result<T> {
    #[track_caller]
    fn dx(self, call: &str) -> Result<T> {
        let location = Location::caller();
        self.map_err(|err| native_error(call, location, err))
    }
}

fn native_error(call: &str, location: &'static Location<'static>, err: windows::core::Error) -> RenderError {
    let code = err.code();
    let message = err.message().to_string();

    if code == DXGI_ERROR_DEVICE_REMOVED || code == DXGI_ERROR_DEVICE_RESET || code == DXGI_ERROR_DEVICE_HUNG {
        error!(call, file = location.file(), line = location.line(), "Device lost: {}", message);
        return GraphicsError::DeviceLost(format!("{}: {}", call, message)).into();
    }

    GraphicsError::NativeCall {
        call: call.to_string(),
        file: location.file(),
        line: location.line(),
        code: code.0,
        message,
    }
    .into()
}

/// 输出参数形式的创建函数成功后对象仍为空的情况
pub fn required<T>(value: Option<T>, call: &str) -> Result<T> {
    value.ok_or_else(|| GraphicsError::ResourceCreation(format!("{} returned no object", call)).into())
}

pub fn heap_properties(heap_type: D3D12_HEAP_TYPE) -> D3D12_HEAP_PROPERTIES {
    D3D12_HEAP_PROPERTIES {
        Type: heap_type,
        ..Default::default()
    }
}

pub fn buffer_desc(byte_size: u64) -> D3D12_RESOURCE_DESC {
    D3D12_RESOURCE_DESC {
        Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
        Alignment: 0,
        Width: byte_size,
        Height: 1,
        DepthOrArraySize: 1,
        MipLevels: 1,
        Format: DXGI_FORMAT_UNKNOWN,
        SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
        Layout: D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
        Flags: D3D12_RESOURCE_FLAG_NONE,
    }
}

/// 资源状态转换屏障
///
/// 屏障不持有资源的引用，`resource` 必须活到命令列表执行完。
pub fn transition_barrier(
    resource: &ID3D12Resource,
    before: D3D12_RESOURCE_STATES,
    after: D3D12_RESOURCE_STATES,
) -> D3D12_RESOURCE_BARRIER {
    D3D12_RESOURCE_BARRIER {
        Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
        Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
        Anonymous: D3D12_RESOURCE_BARRIER_0 {
            Transition: ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                pResource: unsafe { std::mem::transmute_copy(resource) },
                Subresource: D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES,
                StateBefore: before,
                StateAfter: after,
            }),
        },
    }
}

/// 在默认堆上创建缓冲区并记录从上传堆的拷贝
///
/// # 返回值
///
/// `(默认堆缓冲区, 上传堆缓冲区)`。上传堆缓冲区必须保留到命令列表执行完。
pub fn create_default_buffer(
    device: &ID3D12Device,
    command_list: &ID3D12GraphicsCommandList,
    data: &[u8],
) -> Result<(ID3D12Resource, ID3D12Resource)> {
    let byte_size = data.len() as u64;

    unsafe {
        let mut default_buffer: Option<ID3D12Resource> = None;
        dx_call!(device.CreateCommittedResource(
            &heap_properties(D3D12_HEAP_TYPE_DEFAULT),
            D3D12_HEAP_FLAG_NONE,
            &buffer_desc(byte_size),
            D3D12_RESOURCE_STATE_COMMON,
            None,
            &mut default_buffer,
        ))?;
        let default_buffer = required(default_buffer, "CreateCommittedResource")?;

        let mut upload_buffer: Option<ID3D12Resource> = None;
        dx_call!(device.CreateCommittedResource(
            &heap_properties(D3D12_HEAP_TYPE_UPLOAD),
            D3D12_HEAP_FLAG_NONE,
            &buffer_desc(byte_size),
            D3D12_RESOURCE_STATE_GENERIC_READ,
            None,
            &mut upload_buffer,
        ))?;
        let upload_buffer = required(upload_buffer, "CreateCommittedResource")?;

        let mut mapped = std::ptr::null_mut();
        dx_call!(upload_buffer.Map(0, None, Some(&mut mapped)))?;
        std::ptr::copy_nonoverlapping(data.as_ptr(), mapped as *mut u8, data.len());
        upload_buffer.Unmap(0, None);

        command_list.ResourceBarrier(&[transition_barrier(
            &default_buffer,
            D3D12_RESOURCE_STATE_COMMON,
            D3D12_RESOURCE_STATE_COPY_DEST,
        )]);
        command_list.CopyBufferRegion(&default_buffer, 0, &upload_buffer, 0, byte_size);
        command_list.ResourceBarrier(&[transition_barrier(
            &default_buffer,
            D3D12_RESOURCE_STATE_COPY_DEST,
            D3D12_RESOURCE_STATE_GENERIC_READ,
        )]);

        Ok((default_buffer, upload_buffer))
    }
}

fn blob_text(blob: &ID3DBlob) -> String {
    let bytes = unsafe {
        std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize())
    };
    String::from_utf8_lossy(bytes).trim_end_matches('\0').trim().to_string()
}

/// 在运行时编译 HLSL 文件
///
/// 编译器输出的错误和警告都会写入日志。
///
/// # 参数
///
/// * `path` - HLSL 源文件
/// * `entry_point` - 入口函数名，例如 `"VS"`
/// * `target` - 着色器模型，例如 `"vs_5_0"`
pub fn compile_shader(path: &Path, entry_point: &str, target: &str) -> Result<ID3DBlob> {
    let source = std::fs::read_to_string(path)?;
    let entry_point_c = format!("{}\0", entry_point);
    let target_c = format!("{}\0", target);

    let flags = if cfg!(debug_assertions) {
        D3DCOMPILE_DEBUG | D3DCOMPILE_SKIP_OPTIMIZATION
    } else {
        0
    };

    let mut code = None;
    let mut errors = None;
    let result = unsafe {
        D3DCompile(
            source.as_ptr() as _,
            source.len(),
            None,
            None,
            None,
            PCSTR(entry_point_c.as_ptr()),
            PCSTR(target_c.as_ptr()),
            flags,
            0,
            &mut code,
            Some(&mut errors),
        )
    };

    let messages = errors.as_ref().map(blob_text).unwrap_or_default();
    if result.is_err() {
        error!(shader = %path.display(), entry_point, target, "{}", messages);
        return Err(GraphicsError::ShaderCompilation(format!(
            "{} ({}, {}): {}",
            path.display(),
            entry_point,
            target,
            messages
        ))
        .into());
    }
    if !messages.is_empty() {
        warn!(shader = %path.display(), entry_point, "{}", messages);
    }

    required(code, "D3DCompile")
}

/// 序列化并创建根签名
pub fn create_root_signature(
    device: &ID3D12Device,
    desc: &D3D12_ROOT_SIGNATURE_DESC,
) -> Result<ID3D12RootSignature> {
    let mut blob = None;
    let mut errors = None;
    let result = unsafe {
        D3D12SerializeRootSignature(desc, D3D_ROOT_SIGNATURE_VERSION_1, &mut blob, Some(&mut errors))
    };

    if let Some(errors) = errors.as_ref() {
        let messages = blob_text(errors);
        if !messages.is_empty() {
            error!("Root signature serialization: {}", messages);
        }
    }
    result.dx("D3D12SerializeRootSignature")?;
    let blob = required(blob, "D3D12SerializeRootSignature")?;

    unsafe {
        dx_call!(device.CreateRootSignature(
            0,
            std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize()),
        ))
    }
}

/// 着色器目录：`<crate>/src/gfx/dx12/shaders`
pub fn shader_path(file_name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("src/gfx/dx12/shaders")
        .join(file_name)
}

/// 图形管线状态的可变部分
pub struct PipelineDesc<'a> {
    pub root_signature: &'a ID3D12RootSignature,
    pub vertex_shader: &'a ID3DBlob,
    pub pixel_shader: &'a ID3DBlob,
    pub input_layout: &'a [D3D12_INPUT_ELEMENT_DESC],
    pub fill_mode: D3D12_FILL_MODE,
    pub cull_mode: D3D12_CULL_MODE,
    pub render_target_format: DXGI_FORMAT,
    pub depth_format: DXGI_FORMAT,
}

/// 创建图形管线状态对象
///
/// 混合、深度模板等其余状态使用 D3D12 的默认值。
pub fn create_graphics_pso(device: &ID3D12Device, desc: &PipelineDesc<'_>) -> Result<ID3D12PipelineState> {
    let render_target_blend = D3D12_RENDER_TARGET_BLEND_DESC {
        BlendEnable: false.into(),
        LogicOpEnable: false.into(),
        SrcBlend: D3D12_BLEND_ONE,
        DestBlend: D3D12_BLEND_ZERO,
        BlendOp: D3D12_BLEND_OP_ADD,
        SrcBlendAlpha: D3D12_BLEND_ONE,
        DestBlendAlpha: D3D12_BLEND_ZERO,
        BlendOpAlpha: D3D12_BLEND_OP_ADD,
        LogicOp: D3D12_LOGIC_OP_NOOP,
        RenderTargetWriteMask: D3D12_COLOR_WRITE_ENABLE_ALL.0 as u8,
    };
    let keep_stencil = D3D12_DEPTH_STENCILOP_DESC {
        StencilFailOp: D3D12_STENCIL_OP_KEEP,
        StencilDepthFailOp: D3D12_STENCIL_OP_KEEP,
        StencilPassOp: D3D12_STENCIL_OP_KEEP,
        StencilFunc: D3D12_COMPARISON_FUNC_ALWAYS,
    };

    let mut pso_desc = D3D12_GRAPHICS_PIPELINE_STATE_DESC {
        pRootSignature: unsafe { std::mem::transmute_copy(desc.root_signature) },
        VS: D3D12_SHADER_BYTECODE {
            pShaderBytecode: unsafe { desc.vertex_shader.GetBufferPointer() },
            BytecodeLength: unsafe { desc.vertex_shader.GetBufferSize() },
        },
        PS: D3D12_SHADER_BYTECODE {
            pShaderBytecode: unsafe { desc.pixel_shader.GetBufferPointer() },
            BytecodeLength: unsafe { desc.pixel_shader.GetBufferSize() },
        },
        BlendState: D3D12_BLEND_DESC {
            AlphaToCoverageEnable: false.into(),
            IndependentBlendEnable: false.into(),
            RenderTarget: [render_target_blend; 8],
        },
        SampleMask: u32::MAX,
        RasterizerState: D3D12_RASTERIZER_DESC {
            FillMode: desc.fill_mode,
            CullMode: desc.cull_mode,
            FrontCounterClockwise: false.into(),
            DepthBias: 0,
            DepthBiasClamp: 0.0,
            SlopeScaledDepthBias: 0.0,
            DepthClipEnable: true.into(),
            MultisampleEnable: false.into(),
            AntialiasedLineEnable: false.into(),
            ForcedSampleCount: 0,
            ConservativeRaster: D3D12_CONSERVATIVE_RASTERIZATION_MODE_OFF,
        },
        DepthStencilState: D3D12_DEPTH_STENCIL_DESC {
            DepthEnable: true.into(),
            DepthWriteMask: D3D12_DEPTH_WRITE_MASK_ALL,
            DepthFunc: D3D12_COMPARISON_FUNC_LESS,
            StencilEnable: false.into(),
            StencilReadMask: 0xFF,
            StencilWriteMask: 0xFF,
            FrontFace: keep_stencil,
            BackFace: keep_stencil,
        },
        InputLayout: D3D12_INPUT_LAYOUT_DESC {
            pInputElementDescs: desc.input_layout.as_ptr(),
            NumElements: desc.input_layout.len() as u32,
        },
        PrimitiveTopologyType: D3D12_PRIMITIVE_TOPOLOGY_TYPE_TRIANGLE,
        NumRenderTargets: 1,
        DSVFormat: desc.depth_format,
        SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
        ..Default::default()
    };
    pso_desc.RTVFormats[0] = desc.render_target_format;

    unsafe { dx_call!(device.CreateGraphicsPipelineState(&pso_desc)) }
}
