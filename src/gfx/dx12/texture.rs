//! 纹理与着色器资源视图
//!
//! 纹理以 RGBA8 格式放在默认堆上。行数据先按 256 字节的行距写入上传堆，
//! 再用 `CopyTextureRegion` 拷贝。

use std::path::Path;

use tracing::{debug, info};
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use super::device::Dx12Device;
use super::util::{buffer_desc, dx_call, heap_properties, required, transition_barrier};
use crate::core::error::{GraphicsError, Result};

const TEXTURE_FORMAT: DXGI_FORMAT = DXGI_FORMAT_R8G8B8A8_UNORM;

/// 默认堆上的二维纹理
pub struct Texture {
    pub name: String,
    resource: ID3D12Resource,
    upload: Option<ID3D12Resource>,
    width: u32,
    height: u32,
}

impl Texture {
    /// 从图片文件加载
    pub fn load(
        device: &Dx12Device,
        command_list: &ID3D12GraphicsCommandList,
        name: &str,
        path: &Path,
    ) -> Result<Self> {
        let image = image::open(path)
            .map_err(|e| GraphicsError::ResourceCreation(format!("Failed to load {}: {}", path.display(), e)))?
            .to_rgba8();
        let (width, height) = image.dimensions();
        info!(name, path = %path.display(), width, height, "Texture loaded");
        Self::from_rgba8(device, command_list, name, width, height, image.as_raw())
    }

    /// 记录 RGBA8 像素的上传命令
    ///
    /// `pixels` 按行紧密排列，长度必须是 `width * height * 4`。
    pub fn from_rgba8(
        device: &Dx12Device,
        command_list: &ID3D12GraphicsCommandList,
        name: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<Self> {
        let row_bytes = width as usize * 4;
        if width == 0 || height == 0 || pixels.len() != row_bytes * height as usize {
            return Err(GraphicsError::ResourceCreation(format!(
                "Texture {}: {} bytes do not match {}x{} RGBA8",
                name,
                pixels.len(),
                width,
                height
            ))
            .into());
        }

        let pitch_alignment = D3D12_TEXTURE_DATA_PITCH_ALIGNMENT as usize;
        let row_pitch = (row_bytes + pitch_alignment - 1) & !(pitch_alignment - 1);

        let desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE2D,
            Alignment: 0,
            Width: width as u64,
            Height: height,
            DepthOrArraySize: 1,
            MipLevels: 1,
            Format: TEXTURE_FORMAT,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
            Flags: D3D12_RESOURCE_FLAG_NONE,
        };

        unsafe {
            let mut resource: Option<ID3D12Resource> = None;
            dx_call!(device.raw().CreateCommittedResource(
                &heap_properties(D3D12_HEAP_TYPE_DEFAULT),
                D3D12_HEAP_FLAG_NONE,
                &desc,
                D3D12_RESOURCE_STATE_COPY_DEST,
                None,
                &mut resource,
            ))?;
            let resource = required(resource, "CreateCommittedResource")?;

            let mut upload: Option<ID3D12Resource> = None;
            dx_call!(device.raw().CreateCommittedResource(
                &heap_properties(D3D12_HEAP_TYPE_UPLOAD),
                D3D12_HEAP_FLAG_NONE,
                &buffer_desc((row_pitch * height as usize) as u64),
                D3D12_RESOURCE_STATE_GENERIC_READ,
                None,
                &mut upload,
            ))?;
            let upload = required(upload, "CreateCommittedResource")?;

            let mut mapped = std::ptr::null_mut();
            dx_call!(upload.Map(0, None, Some(&mut mapped)))?;
            let mapped = mapped as *mut u8;
            for (row, data) in pixels.chunks_exact(row_bytes).enumerate() {
                std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.add(row * row_pitch), row_bytes);
            }
            upload.Unmap(0, None);

            let dst = D3D12_TEXTURE_COPY_LOCATION {
                pResource: std::mem::transmute_copy(&resource),
                Type: D3D12_TEXTURE_COPY_TYPE_SUBRESOURCE_INDEX,
                Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 { SubresourceIndex: 0 },
            };
            let src = D3D12_TEXTURE_COPY_LOCATION {
                pResource: std::mem::transmute_copy(&upload),
                Type: D3D12_TEXTURE_COPY_TYPE_PLACED_FOOTPRINT,
                Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                    PlacedFootprint: D3D12_PLACED_SUBRESOURCE_FOOTPRINT {
                        Offset: 0,
                        Footprint: D3D12_SUBRESOURCE_FOOTPRINT {
                            Format: TEXTURE_FORMAT,
                            Width: width,
                            Height: height,
                            Depth: 1,
                            RowPitch: row_pitch as u32,
                        },
                    },
                },
            };
            command_list.CopyTextureRegion(&dst, 0, 0, 0, &src, None);
            command_list.ResourceBarrier(&[transition_barrier(
                &resource,
                D3D12_RESOURCE_STATE_COPY_DEST,
                D3D12_RESOURCE_STATE_PIXEL_SHADER_RESOURCE,
            )]);

            debug!(name, width, height, row_pitch, "Texture upload recorded");

            Ok(Self {
                name: name.to_string(),
                resource,
                upload: Some(upload),
                width,
                height,
            })
        }
    }

    pub fn resource(&self) -> &ID3D12Resource {
        &self.resource
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// 上传命令执行完之后释放上传堆缓冲区
    pub fn dispose_upload(&mut self) {
        self.upload = None;
    }
}

/// 着色器可见的 CBV/SRV/UAV 描述符堆，只追加
pub struct SrvHeap {
    heap: ID3D12DescriptorHeap,
    descriptor_size: usize,
    capacity: u32,
    len: u32,
}

impl SrvHeap {
    pub fn new(device: &Dx12Device, capacity: u32) -> Result<Self> {
        unsafe {
            let heap: ID3D12DescriptorHeap = dx_call!(device.raw().CreateDescriptorHeap(&D3D12_DESCRIPTOR_HEAP_DESC {
                Type: D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
                NumDescriptors: capacity,
                Flags: D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE,
                NodeMask: 0,
            }))?;
            let descriptor_size = device
                .raw()
                .GetDescriptorHandleIncrementSize(D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV)
                as usize;
            Ok(Self {
                heap,
                descriptor_size,
                capacity,
                len: 0,
            })
        }
    }

    pub fn heap(&self) -> &ID3D12DescriptorHeap {
        &self.heap
    }

    /// 为纹理创建 SRV，返回它在堆中的下标
    pub fn push_texture(&mut self, device: &Dx12Device, texture: &Texture) -> Result<usize> {
        if self.len >= self.capacity {
            return Err(GraphicsError::ResourceCreation(format!(
                "SRV heap is full ({} descriptors)",
                self.capacity
            ))
            .into());
        }

        let index = self.len as usize;
        let desc = D3D12_SHADER_RESOURCE_VIEW_DESC {
            Format: TEXTURE_FORMAT,
            ViewDimension: D3D12_SRV_DIMENSION_TEXTURE2D,
            Shader4ComponentMapping: D3D12_DEFAULT_SHADER_4_COMPONENT_MAPPING,
            Anonymous: D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                Texture2D: D3D12_TEX2D_SRV {
                    MostDetailedMip: 0,
                    MipLevels: 1,
                    PlaneSlice: 0,
                    ResourceMinLODClamp: 0.0,
                },
            },
        };

        unsafe {
            let start = self.heap.GetCPUDescriptorHandleForHeapStart();
            let handle = D3D12_CPU_DESCRIPTOR_HANDLE {
                ptr: start.ptr + index * self.descriptor_size,
            };
            device
                .raw()
                .CreateShaderResourceView(texture.resource(), Some(&desc as *const _), handle);
        }

        self.len += 1;
        debug!(texture = %texture.name, index, "SRV created");
        Ok(index)
    }

    pub fn gpu_handle(&self, index: usize) -> D3D12_GPU_DESCRIPTOR_HANDLE {
        let start = unsafe { self.heap.GetGPUDescriptorHandleForHeapStart() };
        D3D12_GPU_DESCRIPTOR_HANDLE {
            ptr: start.ptr + (index * self.descriptor_size) as u64,
        }
    }
}
