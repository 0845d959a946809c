//! GPU 网格
//!
//! 顶点和索引数据放在默认堆上，通过初始化命令列表从上传堆拷贝。上传堆缓冲区
//! 在命令执行完之前必须保留，之后调用 [`MeshGeometry::dispose_uploaders`] 释放。

use std::collections::HashMap;

use bytemuck::Pod;
use tracing::debug;
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::DXGI_FORMAT_R16_UINT;

use super::device::Dx12Device;
use super::util::create_default_buffer;
use crate::core::error::Result;
use crate::geometry::{MeshData, SubmeshGeometry};
use crate::renderer::scene::PrimitiveTopology;

/// 默认堆上的网格，多个渲染项共享
pub struct MeshGeometry {
    pub name: String,
    vertex_buffer: ID3D12Resource,
    index_buffer: ID3D12Resource,
    vertex_uploader: Option<ID3D12Resource>,
    index_uploader: Option<ID3D12Resource>,
    vertex_byte_stride: u32,
    vertex_buffer_byte_size: u32,
    index_buffer_byte_size: u32,
    /// 按名字索引的子网格
    pub draw_args: HashMap<String, SubmeshGeometry>,
}

impl MeshGeometry {
    /// 记录顶点/索引缓冲区的上传命令
    ///
    /// `command_list` 必须处于记录状态，整个网格注册为名为 `submesh` 的子网格。
    pub fn upload<V: Pod>(
        device: &Dx12Device,
        command_list: &ID3D12GraphicsCommandList,
        name: &str,
        submesh: &str,
        mesh: &MeshData<V>,
    ) -> Result<Self> {
        let (vertex_buffer, vertex_uploader) =
            create_default_buffer(device.raw(), command_list, mesh.vertex_bytes())?;
        let (index_buffer, index_uploader) =
            create_default_buffer(device.raw(), command_list, mesh.index_bytes())?;

        let mut draw_args = HashMap::new();
        draw_args.insert(submesh.to_string(), mesh.whole());

        debug!(
            name,
            vertices = mesh.vertices.len(),
            indices = mesh.indices.len(),
            "Mesh geometry uploaded"
        );

        Ok(Self {
            name: name.to_string(),
            vertex_buffer,
            index_buffer,
            vertex_uploader: Some(vertex_uploader),
            index_uploader: Some(index_uploader),
            vertex_byte_stride: mesh.vertex_byte_stride(),
            vertex_buffer_byte_size: mesh.vertex_buffer_byte_size(),
            index_buffer_byte_size: mesh.index_buffer_byte_size(),
            draw_args,
        })
    }

    pub fn vertex_buffer_view(&self) -> D3D12_VERTEX_BUFFER_VIEW {
        D3D12_VERTEX_BUFFER_VIEW {
            BufferLocation: unsafe { self.vertex_buffer.GetGPUVirtualAddress() },
            SizeInBytes: self.vertex_buffer_byte_size,
            StrideInBytes: self.vertex_byte_stride,
        }
    }

    pub fn index_buffer_view(&self) -> D3D12_INDEX_BUFFER_VIEW {
        D3D12_INDEX_BUFFER_VIEW {
            BufferLocation: unsafe { self.index_buffer.GetGPUVirtualAddress() },
            SizeInBytes: self.index_buffer_byte_size,
            Format: DXGI_FORMAT_R16_UINT,
        }
    }

    pub fn submesh(&self, name: &str) -> Option<SubmeshGeometry> {
        self.draw_args.get(name).copied()
    }

    /// 上传命令执行完之后释放上传堆缓冲区
    pub fn dispose_uploaders(&mut self) {
        self.vertex_uploader = None;
        self.index_uploader = None;
    }
}

pub fn primitive_topology(topology: PrimitiveTopology) -> D3D_PRIMITIVE_TOPOLOGY {
    match topology {
        PrimitiveTopology::TriangleList => D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST,
        PrimitiveTopology::LineList => D3D_PRIMITIVE_TOPOLOGY_LINELIST,
    }
}
