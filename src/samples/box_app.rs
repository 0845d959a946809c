//! 线框立方体示例
//!
//! 8 个顶点各带一种颜色，线框模式、不剔除，黑色背景。
//! 每帧只更新一个 world-view-proj 矩阵，通过根 CBV 绑定到 b0。
//!
//! 只有一个帧资源：CPU 在复用唯一的槽位之前等待上一帧执行完。
//! 矩阵按槽位各存一份，忽略 `graphics.frame_resources` 配置。

use std::sync::Arc;

use tracing::{info, warn};
use windows::core::s;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use winit::event::MouseButton;

use crate::component::OrbitCamera;
use crate::core::config::Config;
use crate::core::error::{RenderError, Result};
use crate::core::input::MouseButtons;
use crate::core::timer::GameTimer;
use crate::geometry::colored_box;
use crate::gfx::dx12::context::BACK_BUFFER_FORMAT;
use crate::gfx::dx12::util::{compile_shader, create_graphics_pso, create_root_signature, dx_call, shader_path, PipelineDesc};
use crate::gfx::dx12::{primitive_topology, Dx12Context, Dx12Device, Dx12UploadMemory, MeshGeometry};
use crate::math::{matrix, Color};
use crate::renderer::constants::WorldViewProjConstants;
use crate::renderer::scene::PrimitiveTopology;
use crate::renderer::{BufferUsageType, FramePipeline, FrameResourceRing, Sample, UploadBuffer};

/// 相机的初始半径
pub const DEFAULT_RADIUS: f32 = 5.0;

const FRAME_COUNT: usize = 1;

struct BoxGpu {
    root_signature: ID3D12RootSignature,
    pso: ID3D12PipelineState,
    geometry: Arc<MeshGeometry>,
}

/// 线框立方体
pub struct BoxApp {
    context: Dx12Context,
    pipeline: FramePipeline<Dx12Device>,
    camera: OrbitCamera,
    /// 每个帧资源槽位一份，与环的下标对应
    constants: Vec<UploadBuffer<WorldViewProjConstants, Dx12UploadMemory>>,
    gpu: Option<BoxGpu>,
    title: String,
}

impl BoxApp {
    pub fn new(context: Dx12Context, config: &Config) -> Result<Self> {
        let ring = FrameResourceRing::new(context.device(), FRAME_COUNT, 0, 0, 0)?;
        let constants = (0..FRAME_COUNT)
            .map(|_| UploadBuffer::new(context.device(), 1, BufferUsageType::Constant))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            pipeline: FramePipeline::new(ring),
            camera: OrbitCamera::new(&config.camera, DEFAULT_RADIUS),
            constants,
            gpu: None,
            title: format!("{} - Box", config.window.title),
            context,
        })
    }

    fn build_root_signature(&self) -> Result<ID3D12RootSignature> {
        let parameter = D3D12_ROOT_PARAMETER {
            ParameterType: D3D12_ROOT_PARAMETER_TYPE_CBV,
            Anonymous: D3D12_ROOT_PARAMETER_0 {
                Descriptor: D3D12_ROOT_DESCRIPTOR {
                    ShaderRegister: 0,
                    RegisterSpace: 0,
                },
            },
            ShaderVisibility: D3D12_SHADER_VISIBILITY_ALL,
        };
        let desc = D3D12_ROOT_SIGNATURE_DESC {
            NumParameters: 1,
            pParameters: &parameter,
            NumStaticSamplers: 0,
            pStaticSamplers: std::ptr::null(),
            Flags: D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT,
        };
        create_root_signature(self.context.device().raw(), &desc)
    }

    fn build_pso(&self, root_signature: &ID3D12RootSignature) -> Result<ID3D12PipelineState> {
        let path = shader_path("color.hlsl");
        let vertex_shader = compile_shader(&path, "VS", "vs_5_0")?;
        let pixel_shader = compile_shader(&path, "PS", "ps_5_0")?;

        let input_layout = [
            D3D12_INPUT_ELEMENT_DESC {
                SemanticName: s!("POSITION"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32B32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 0,
                InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
            D3D12_INPUT_ELEMENT_DESC {
                SemanticName: s!("COLOR"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32B32A32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 12,
                InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
        ];

        create_graphics_pso(
            self.context.device().raw(),
            &PipelineDesc {
                root_signature,
                vertex_shader: &vertex_shader,
                pixel_shader: &pixel_shader,
                input_layout: &input_layout,
                fill_mode: D3D12_FILL_MODE_WIREFRAME,
                cull_mode: D3D12_CULL_MODE_NONE,
                render_target_format: BACK_BUFFER_FORMAT,
                depth_format: self.context.depth_format(),
            },
        )
    }
}

impl Sample for BoxApp {
    fn title(&self) -> &str {
        &self.title
    }

    fn initialize(&mut self) -> Result<()> {
        let root_signature = self.build_root_signature()?;
        let pso = self.build_pso(&root_signature)?;

        let list = self.context.begin_setup()?.clone();
        let mut geometry = MeshGeometry::upload(self.context.device(), &list, "boxGeo", "box", &colored_box())?;
        self.context.end_setup()?;
        geometry.dispose_uploaders();

        self.gpu = Some(BoxGpu {
            root_signature,
            pso,
            geometry: Arc::new(geometry),
        });
        info!("Box sample initialized");
        Ok(())
    }

    fn on_resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.context.resize(width, height)?;
        self.camera.set_aspect(self.context.aspect_ratio());
        Ok(())
    }

    fn update(&mut self, _timer: &GameTimer) -> Result<()> {
        self.pipeline.begin_frame(self.context.fence())?;
        self.camera.update_view();

        // 世界矩阵为单位矩阵
        let view_proj = self.camera.proj_matrix() * self.camera.view_matrix();
        let slot = self.pipeline.ring().current_index();
        self.constants[slot].copy_data(
            0,
            &WorldViewProjConstants {
                world_view_proj: matrix::to_gpu(&view_proj),
            },
        );
        Ok(())
    }

    fn draw(&mut self, _timer: &GameTimer) -> Result<()> {
        let gpu = self
            .gpu
            .as_ref()
            .ok_or_else(|| RenderError::Runtime("Box sample drawn before initialize".to_string()))?;
        let constants = self.constants[self.pipeline.ring().current_index()].gpu_address(0);

        let allocator = self.pipeline.begin_recording()?;
        let list = self.context.command_list();
        unsafe { dx_call!(list.Reset(allocator.raw(), &gpu.pso))? };

        self.context.begin_back_buffer_pass(Color::BLACK.to_array())?;
        let args = gpu
            .geometry
            .submesh("box")
            .ok_or_else(|| RenderError::Runtime("box submesh missing".to_string()))?;
        unsafe {
            list.SetGraphicsRootSignature(&gpu.root_signature);
            list.IASetVertexBuffers(0, Some(&[gpu.geometry.vertex_buffer_view()]));
            let index_view = gpu.geometry.index_buffer_view();
            list.IASetIndexBuffer(Some(&index_view as *const _));
            list.IASetPrimitiveTopology(primitive_topology(PrimitiveTopology::TriangleList));
            list.SetGraphicsRootConstantBufferView(0, constants);
            list.DrawIndexedInstanced(args.index_count, 1, args.start_index_location, args.base_vertex_location, 0);
        }
        self.context.end_back_buffer_pass()?;

        self.context.submit_frame(&mut self.pipeline)?;
        Ok(())
    }

    fn on_mouse_down(&mut self, _button: MouseButton, x: f32, y: f32) {
        self.camera.on_mouse_down(x, y);
    }

    fn on_mouse_move(&mut self, buttons: MouseButtons, x: f32, y: f32) {
        self.camera.on_mouse_move(buttons, x, y);
    }
}

impl Drop for BoxApp {
    fn drop(&mut self) {
        // 等 GPU 用完常量缓冲区和网格之后再释放
        if let Err(e) = self.context.flush() {
            warn!("Failed to flush before releasing box resources: {}", e);
        }
    }
}
