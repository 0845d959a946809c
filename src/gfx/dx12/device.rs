//! 后端 trait 的 DirectX 12 实现
//!
//! - [`Dx12Fence`]：`ID3D12Fence` 加一个等待用的事件句柄，drop 时关闭句柄
//! - [`Dx12Queue`]：直接命令队列
//! - [`Dx12Allocator`]：直接命令分配器
//! - [`Dx12UploadMemory`]：上传堆上的缓冲区，创建时映射，drop 时解除映射

use tracing::debug;
use windows::core::Interface;
use windows::Win32::Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0};
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::System::Threading::{CreateEventA, WaitForSingleObject, INFINITE};

use super::util::{buffer_desc, dx_call, heap_properties, required};
use crate::core::error::{GraphicsError, Result};
use crate::gfx::backend::{CommandAllocator, CommandQueue, GpuFence, GraphicsDevice, MappedMemory};

/// D3D12 设备
#[derive(Clone)]
pub struct Dx12Device {
    device: ID3D12Device,
}

impl Dx12Device {
    pub fn new(device: ID3D12Device) -> Self {
        Self { device }
    }

    pub fn raw(&self) -> &ID3D12Device {
        &self.device
    }

    /// 创建直接命令队列
    pub fn create_queue(&self) -> Result<Dx12Queue> {
        let desc = D3D12_COMMAND_QUEUE_DESC {
            Type: D3D12_COMMAND_LIST_TYPE_DIRECT,
            Flags: D3D12_COMMAND_QUEUE_FLAG_NONE,
            ..Default::default()
        };
        let queue: ID3D12CommandQueue = unsafe { dx_call!(self.device.CreateCommandQueue(&desc))? };
        Ok(Dx12Queue { queue })
    }

    /// 基于 `allocator` 创建命令列表，创建后立即关闭
    pub fn create_command_list(&self, allocator: &Dx12Allocator) -> Result<ID3D12GraphicsCommandList> {
        unsafe {
            let list: ID3D12GraphicsCommandList = dx_call!(self.device.CreateCommandList(
                0,
                D3D12_COMMAND_LIST_TYPE_DIRECT,
                allocator.raw(),
                None::<&ID3D12PipelineState>,
            ))?;
            dx_call!(list.Close())?;
            Ok(list)
        }
    }
}

impl GraphicsDevice for Dx12Device {
    type Fence = Dx12Fence;
    type Allocator = Dx12Allocator;
    type Memory = Dx12UploadMemory;

    fn create_fence(&self, initial_value: u64) -> Result<Dx12Fence> {
        unsafe {
            let fence: ID3D12Fence = dx_call!(self.device.CreateFence(initial_value, D3D12_FENCE_FLAG_NONE))?;
            let event = dx_call!(CreateEventA(None, false, false, None))?;
            Ok(Dx12Fence { fence, event })
        }
    }

    fn create_command_allocator(&self) -> Result<Dx12Allocator> {
        let allocator: ID3D12CommandAllocator =
            unsafe { dx_call!(self.device.CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT))? };
        Ok(Dx12Allocator { allocator })
    }

    fn create_upload_memory(&self, byte_size: usize) -> Result<Dx12UploadMemory> {
        unsafe {
            let mut resource: Option<ID3D12Resource> = None;
            dx_call!(self.device.CreateCommittedResource(
                &heap_properties(D3D12_HEAP_TYPE_UPLOAD),
                D3D12_HEAP_FLAG_NONE,
                &buffer_desc(byte_size as u64),
                D3D12_RESOURCE_STATE_GENERIC_READ,
                None,
                &mut resource,
            ))?;
            let resource = required(resource, "CreateCommittedResource")?;

            let mut mapped = std::ptr::null_mut();
            dx_call!(resource.Map(0, None, Some(&mut mapped)))?;
            debug!(byte_size, "Upload buffer mapped");

            Ok(Dx12UploadMemory {
                resource,
                mapped: mapped as *mut u8,
                len: byte_size,
            })
        }
    }

    fn backend_name(&self) -> &'static str {
        "DirectX 12"
    }
}

/// D3D12 栅栏
pub struct Dx12Fence {
    fence: ID3D12Fence,
    event: HANDLE,
}

impl Dx12Fence {
    pub fn raw(&self) -> &ID3D12Fence {
        &self.fence
    }
}

impl GpuFence for Dx12Fence {
    fn completed_value(&self) -> u64 {
        unsafe { self.fence.GetCompletedValue() }
    }

    fn wait_for(&self, value: u64) -> Result<()> {
        if self.completed_value() >= value {
            return Ok(());
        }

        unsafe {
            dx_call!(self.fence.SetEventOnCompletion(value, self.event))?;
            let status = WaitForSingleObject(self.event, INFINITE);
            if status != WAIT_OBJECT_0 {
                return Err(GraphicsError::CommandExecution(format!(
                    "WaitForSingleObject on fence value {} returned 0x{:X}",
                    value, status.0
                ))
                .into());
            }
        }
        Ok(())
    }
}

impl Drop for Dx12Fence {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.event);
        }
    }
}

/// 直接命令队列
#[derive(Clone)]
pub struct Dx12Queue {
    queue: ID3D12CommandQueue,
}

impl Dx12Queue {
    pub fn raw(&self) -> &ID3D12CommandQueue {
        &self.queue
    }

    /// 提交一个已关闭的命令列表
    pub fn execute(&self, command_list: &ID3D12GraphicsCommandList) -> Result<()> {
        let list: ID3D12CommandList = dx_call!(command_list.cast())?;
        unsafe { self.queue.ExecuteCommandLists(&[Some(list)]) };
        Ok(())
    }
}

impl CommandQueue for Dx12Queue {
    type Fence = Dx12Fence;

    fn signal(&self, fence: &Dx12Fence, value: u64) -> Result<()> {
        unsafe { dx_call!(self.queue.Signal(fence.raw(), value)) }
    }
}

/// 直接命令分配器
pub struct Dx12Allocator {
    allocator: ID3D12CommandAllocator,
}

impl Dx12Allocator {
    pub fn raw(&self) -> &ID3D12CommandAllocator {
        &self.allocator
    }
}

impl CommandAllocator for Dx12Allocator {
    fn reset(&self) -> Result<()> {
        unsafe { dx_call!(self.allocator.Reset()) }
    }
}

/// 持久映射的上传堆缓冲区
pub struct Dx12UploadMemory {
    resource: ID3D12Resource,
    mapped: *mut u8,
    len: usize,
}

impl Dx12UploadMemory {
    pub fn resource(&self) -> &ID3D12Resource {
        &self.resource
    }
}

impl MappedMemory for Dx12UploadMemory {
    fn len(&self) -> usize {
        self.len
    }

    fn gpu_address(&self) -> u64 {
        unsafe { self.resource.GetGPUVirtualAddress() }
    }

    fn write_bytes(&mut self, offset: usize, data: &[u8]) {
        assert!(offset + data.len() <= self.len, "upload buffer write out of range");
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.mapped.add(offset), data.len());
        }
    }

    fn read_bytes(&self, offset: usize, out: &mut [u8]) {
        assert!(offset + out.len() <= self.len, "upload buffer read out of range");
        unsafe {
            std::ptr::copy_nonoverlapping(self.mapped.add(offset), out.as_mut_ptr(), out.len());
        }
    }
}

impl Drop for Dx12UploadMemory {
    fn drop(&mut self) {
        unsafe { self.resource.Unmap(0, None) };
    }
}
