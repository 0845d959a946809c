//! 带纹理和光照的立方体
//!
//! 场景和常量更新见 [`FabricScene`]，这里只负责 D3D12 资源和命令记录。
//!
//! 根签名布局：
//!
//! | 参数 | 内容 |
//! |------|------|
//! | 0 | 描述符表，漫反射纹理 SRV (t0) |
//! | 1 | 根 CBV，物体常量 (b0) |
//! | 2 | 根 CBV，渲染通道常量 (b1) |
//! | 3 | 根 CBV，材质常量 (b2) |
//!
//! 外加 s0-s5 六个静态采样器。

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use windows::core::s;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use winit::event::MouseButton;

use super::fabric_scene::{checkerboard_rgba, FabricScene, CLEAR_COLOR};
use crate::core::config::Config;
use crate::core::error::{RenderError, Result};
use crate::core::input::MouseButtons;
use crate::core::timer::GameTimer;
use crate::geometry::textured_box;
use crate::gfx::dx12::context::BACK_BUFFER_FORMAT;
use crate::gfx::dx12::util::{compile_shader, create_graphics_pso, create_root_signature, dx_call, shader_path, PipelineDesc};
use crate::gfx::dx12::{primitive_topology, Dx12Context, Dx12Device, MeshGeometry, SrvHeap, Texture};
use crate::renderer::{FramePipeline, FrameResourceRing, Sample};

const OBJECT_COUNT: usize = 1;
const MATERIAL_COUNT: usize = 1;

const CHECKERBOARD_SIZE: u32 = 256;
const CHECKERBOARD_CELLS: u32 = 8;

struct FabricGpu {
    root_signature: ID3D12RootSignature,
    pso: ID3D12PipelineState,
    srv_heap: SrvHeap,
    _texture: Texture,
}

/// fabric 示例
pub struct FabricApp {
    context: Dx12Context,
    pipeline: FramePipeline<Dx12Device>,
    scene: FabricScene<MeshGeometry>,
    texture_path: String,
    gpu: Option<FabricGpu>,
    title: String,
}

impl FabricApp {
    pub fn new(context: Dx12Context, config: &Config) -> Result<Self> {
        let frame_count = config.graphics.frame_resources;
        let ring = FrameResourceRing::new(context.device(), frame_count, 1, OBJECT_COUNT, MATERIAL_COUNT)?;

        Ok(Self {
            pipeline: FramePipeline::new(ring),
            scene: FabricScene::new(&config.camera, frame_count),
            texture_path: config.sample.texture.clone(),
            gpu: None,
            title: format!("{} - Fabric", config.window.title),
            context,
        })
    }

    fn build_root_signature(&self) -> Result<ID3D12RootSignature> {
        let srv_range = D3D12_DESCRIPTOR_RANGE {
            RangeType: D3D12_DESCRIPTOR_RANGE_TYPE_SRV,
            NumDescriptors: 1,
            BaseShaderRegister: 0,
            RegisterSpace: 0,
            OffsetInDescriptorsFromTableStart: D3D12_DESCRIPTOR_RANGE_OFFSET_APPEND,
        };

        let root_cbv = |register: u32| D3D12_ROOT_PARAMETER {
            ParameterType: D3D12_ROOT_PARAMETER_TYPE_CBV,
            Anonymous: D3D12_ROOT_PARAMETER_0 {
                Descriptor: D3D12_ROOT_DESCRIPTOR {
                    ShaderRegister: register,
                    RegisterSpace: 0,
                },
            },
            ShaderVisibility: D3D12_SHADER_VISIBILITY_ALL,
        };

        let parameters = [
            D3D12_ROOT_PARAMETER {
                ParameterType: D3D12_ROOT_PARAMETER_TYPE_DESCRIPTOR_TABLE,
                Anonymous: D3D12_ROOT_PARAMETER_0 {
                    DescriptorTable: D3D12_ROOT_DESCRIPTOR_TABLE {
                        NumDescriptorRanges: 1,
                        pDescriptorRanges: &srv_range,
                    },
                },
                ShaderVisibility: D3D12_SHADER_VISIBILITY_PIXEL,
            },
            root_cbv(0),
            root_cbv(1),
            root_cbv(2),
        ];
        let samplers = static_samplers();

        let desc = D3D12_ROOT_SIGNATURE_DESC {
            NumParameters: parameters.len() as u32,
            pParameters: parameters.as_ptr(),
            NumStaticSamplers: samplers.len() as u32,
            pStaticSamplers: samplers.as_ptr(),
            Flags: D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT,
        };
        create_root_signature(self.context.device().raw(), &desc)
    }

    fn build_pso(&self, root_signature: &ID3D12RootSignature) -> Result<ID3D12PipelineState> {
        let path = shader_path("default.hlsl");
        let vertex_shader = compile_shader(&path, "VS", "vs_5_0")?;
        let pixel_shader = compile_shader(&path, "PS", "ps_5_0")?;

        let element = |name, format, offset| D3D12_INPUT_ELEMENT_DESC {
            SemanticName: name,
            SemanticIndex: 0,
            Format: format,
            InputSlot: 0,
            AlignedByteOffset: offset,
            InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
            InstanceDataStepRate: 0,
        };
        let input_layout = [
            element(s!("POSITION"), DXGI_FORMAT_R32G32B32_FLOAT, 0),
            element(s!("NORMAL"), DXGI_FORMAT_R32G32B32_FLOAT, 12),
            element(s!("TEXCOORD"), DXGI_FORMAT_R32G32_FLOAT, 24),
        ];

        create_graphics_pso(
            self.context.device().raw(),
            &PipelineDesc {
                root_signature,
                vertex_shader: &vertex_shader,
                pixel_shader: &pixel_shader,
                input_layout: &input_layout,
                fill_mode: D3D12_FILL_MODE_SOLID,
                cull_mode: D3D12_CULL_MODE_BACK,
                render_target_format: BACK_BUFFER_FORMAT,
                depth_format: self.context.depth_format(),
            },
        )
    }

    /// 加载漫反射纹理，失败时使用棋盘格
    fn load_texture(&self, list: &ID3D12GraphicsCommandList) -> Result<Texture> {
        let device = self.context.device();
        match Texture::load(device, list, "woodCrateTex", Path::new(&self.texture_path)) {
            Ok(texture) => Ok(texture),
            Err(e) => {
                warn!("{}; using a generated checkerboard", e);
                Texture::from_rgba8(
                    device,
                    list,
                    "checkerboard",
                    CHECKERBOARD_SIZE,
                    CHECKERBOARD_SIZE,
                    &checkerboard_rgba(CHECKERBOARD_SIZE, CHECKERBOARD_CELLS),
                )
            }
        }
    }
}

/// s0-s5：point/linear/anisotropic × wrap/clamp
fn static_samplers() -> [D3D12_STATIC_SAMPLER_DESC; 6] {
    let sampler = |register: u32, filter, address, max_anisotropy| D3D12_STATIC_SAMPLER_DESC {
        Filter: filter,
        AddressU: address,
        AddressV: address,
        AddressW: address,
        MipLODBias: 0.0,
        MaxAnisotropy: max_anisotropy,
        ComparisonFunc: D3D12_COMPARISON_FUNC_LESS_EQUAL,
        BorderColor: D3D12_STATIC_BORDER_COLOR_OPAQUE_WHITE,
        MinLOD: 0.0,
        MaxLOD: D3D12_FLOAT32_MAX,
        ShaderRegister: register,
        RegisterSpace: 0,
        ShaderVisibility: D3D12_SHADER_VISIBILITY_ALL,
    };

    [
        sampler(0, D3D12_FILTER_MIN_MAG_MIP_POINT, D3D12_TEXTURE_ADDRESS_MODE_WRAP, 16),
        sampler(1, D3D12_FILTER_MIN_MAG_MIP_POINT, D3D12_TEXTURE_ADDRESS_MODE_CLAMP, 16),
        sampler(2, D3D12_FILTER_MIN_MAG_MIP_LINEAR, D3D12_TEXTURE_ADDRESS_MODE_WRAP, 16),
        sampler(3, D3D12_FILTER_MIN_MAG_MIP_LINEAR, D3D12_TEXTURE_ADDRESS_MODE_CLAMP, 16),
        sampler(4, D3D12_FILTER_ANISOTROPIC, D3D12_TEXTURE_ADDRESS_MODE_WRAP, 8),
        sampler(5, D3D12_FILTER_ANISOTROPIC, D3D12_TEXTURE_ADDRESS_MODE_CLAMP, 8),
    ]
}

impl Sample for FabricApp {
    fn title(&self) -> &str {
        &self.title
    }

    fn initialize(&mut self) -> Result<()> {
        let root_signature = self.build_root_signature()?;
        let pso = self.build_pso(&root_signature)?;

        let list = self.context.begin_setup()?.clone();
        let mesh = textured_box(1.0, 1.0, 1.0);
        let mut geometry = MeshGeometry::upload(self.context.device(), &list, "boxGeo", "box", &mesh)?;
        let mut texture = self.load_texture(&list)?;
        self.context.end_setup()?;
        geometry.dispose_uploaders();
        texture.dispose_upload();

        let mut srv_heap = SrvHeap::new(self.context.device(), 1)?;
        let srv_index = srv_heap.push_texture(self.context.device(), &texture)?;
        if let Some(material) = self.scene.materials_mut().first_mut() {
            material.diffuse_srv_index = srv_index;
        }

        let args = geometry
            .submesh("box")
            .ok_or_else(|| RenderError::Runtime("box submesh missing".to_string()))?;
        self.scene.add_box(Arc::new(geometry), args);

        self.gpu = Some(FabricGpu {
            root_signature,
            pso,
            srv_heap,
            _texture: texture,
        });
        info!(frame_resources = self.pipeline.frame_count(), "Fabric sample initialized");
        Ok(())
    }

    fn on_resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.context.resize(width, height)?;
        self.scene.on_resize(self.context.width(), self.context.height());
        Ok(())
    }

    fn update(&mut self, timer: &GameTimer) -> Result<()> {
        let frame = self.pipeline.begin_frame(self.context.fence())?;
        self.scene.update_frame(frame, timer);
        Ok(())
    }

    fn draw(&mut self, _timer: &GameTimer) -> Result<()> {
        let gpu = self
            .gpu
            .as_ref()
            .ok_or_else(|| RenderError::Runtime("Fabric sample drawn before initialize".to_string()))?;

        let allocator = self.pipeline.begin_recording()?;
        let list = self.context.command_list();
        unsafe { dx_call!(list.Reset(allocator.raw(), &gpu.pso))? };

        self.context.begin_back_buffer_pass(CLEAR_COLOR.to_array())?;

        let frame = self.pipeline.current();
        unsafe {
            list.SetDescriptorHeaps(&[Some(gpu.srv_heap.heap().clone())]);
            list.SetGraphicsRootSignature(&gpu.root_signature);
            list.SetGraphicsRootConstantBufferView(2, frame.pass_cb.gpu_address(0));

            for item in self.scene.items() {
                let material = self.scene.material(item.material);
                let index_view = item.geometry.index_buffer_view();
                list.IASetVertexBuffers(0, Some(&[item.geometry.vertex_buffer_view()]));
                list.IASetIndexBuffer(Some(&index_view as *const _));
                list.IASetPrimitiveTopology(primitive_topology(item.topology));

                list.SetGraphicsRootDescriptorTable(0, gpu.srv_heap.gpu_handle(material.diffuse_srv_index));
                list.SetGraphicsRootConstantBufferView(1, frame.object_cb.gpu_address(item.obj_cb_index));
                list.SetGraphicsRootConstantBufferView(3, frame.material_cb.gpu_address(material.cb_index));

                list.DrawIndexedInstanced(
                    item.args.index_count,
                    1,
                    item.args.start_index_location,
                    item.args.base_vertex_location,
                    0,
                );
            }
        }

        self.context.end_back_buffer_pass()?;
        self.context.submit_frame(&mut self.pipeline)?;
        Ok(())
    }

    fn on_mouse_down(&mut self, _button: MouseButton, x: f32, y: f32) {
        self.scene.camera.on_mouse_down(x, y);
    }

    fn on_mouse_move(&mut self, buttons: MouseButtons, x: f32, y: f32) {
        self.scene.camera.on_mouse_move(buttons, x, y);
    }
}

impl Drop for FabricApp {
    fn drop(&mut self) {
        if let Err(e) = self.context.flush() {
            warn!("Failed to flush before releasing fabric resources: {}", e);
        }
    }
}
