// Buffer creation and upload paths
//
// Device-local buffers are filled through a staging buffer on discrete
// GPUs. Integrated GPUs expose device-local memory that is also host
// visible, so the staging hop is skipped there and the data is written
// through a mapped pointer directly.

use ash::vk;
use std::ffi::c_void;

use super::DeviceContext;
use crate::error::RenderResult;

pub struct Buffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
}

impl Buffer {
    pub fn new(
        device: &DeviceContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        memory_flags: vk::MemoryPropertyFlags,
    ) -> RenderResult<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.device.create_buffer(&buffer_info, None)? };
        let requirements = unsafe { device.device.get_buffer_memory_requirements(buffer) };

        let memory_type = device.find_memory_type(requirements.memory_type_bits, memory_flags)?;
        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);

        let memory = unsafe { device.device.allocate_memory(&alloc_info, None)? };
        unsafe { device.device.bind_buffer_memory(buffer, memory, 0)? };

        Ok(Self {
            buffer,
            memory,
            size,
        })
    }

    /// Map the whole buffer, write `data`, unmap. Memory must be host
    /// visible and coherent.
    pub fn write(&self, device: &DeviceContext, data: &[u8]) -> RenderResult<()> {
        debug_assert!(data.len() as vk::DeviceSize <= self.size);
        unsafe {
            let mapped =
                device
                    .device
                    .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped as *mut u8, data.len());
            device.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Map the buffer and leave it mapped, for per-frame updates
    pub fn map(&self, device: &DeviceContext) -> RenderResult<*mut c_void> {
        let mapped = unsafe {
            device
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())?
        };
        Ok(mapped)
    }

    pub fn destroy(&self, device: &DeviceContext) {
        unsafe {
            device.device.destroy_buffer(self.buffer, None);
            device.device.free_memory(self.memory, None);
        }
    }
}

/// Create a device-local buffer holding `data`. On discrete GPUs the data
/// goes through a host-visible staging buffer and a transfer submission;
/// on unified-memory hardware the device-local buffer is written directly.
pub fn upload_buffer(
    device: &DeviceContext,
    command_pool: vk::CommandPool,
    data: &[u8],
    usage: vk::BufferUsageFlags,
) -> RenderResult<Buffer> {
    let size = data.len() as vk::DeviceSize;

    if device.unified_memory {
        let buffer = Buffer::new(
            device,
            size,
            usage,
            vk::MemoryPropertyFlags::DEVICE_LOCAL
                | vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        buffer.write(device, data)?;
        return Ok(buffer);
    }

    let staging = Buffer::new(
        device,
        size,
        vk::BufferUsageFlags::TRANSFER_SRC,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )?;
    staging.write(device, data)?;

    let buffer = Buffer::new(
        device,
        size,
        usage | vk::BufferUsageFlags::TRANSFER_DST,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    );
    let buffer = match buffer {
        Ok(buffer) => buffer,
        Err(e) => {
            staging.destroy(device);
            return Err(e);
        }
    };

    let copy_result = copy_buffer(device, command_pool, staging.buffer, buffer.buffer, size);
    staging.destroy(device);
    if let Err(e) = copy_result {
        buffer.destroy(device);
        return Err(e);
    }

    Ok(buffer)
}

pub fn copy_buffer(
    device: &DeviceContext,
    command_pool: vk::CommandPool,
    src: vk::Buffer,
    dst: vk::Buffer,
    size: vk::DeviceSize,
) -> RenderResult<()> {
    one_time_submit(device, command_pool, |cmd| {
        let region = vk::BufferCopy::builder().size(size).build();
        unsafe {
            device.device.cmd_copy_buffer(cmd, src, dst, &[region]);
        }
    })
}

/// Record and submit a single-use command buffer on the graphics queue,
/// waiting for it to complete before returning
pub fn one_time_submit<F>(
    device: &DeviceContext,
    command_pool: vk::CommandPool,
    record: F,
) -> RenderResult<()>
where
    F: FnOnce(vk::CommandBuffer),
{
    let alloc_info = vk::CommandBufferAllocateInfo::builder()
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_pool(command_pool)
        .command_buffer_count(1);

    let command_buffer = unsafe { device.device.allocate_command_buffers(&alloc_info)?[0] };

    let begin_info = vk::CommandBufferBeginInfo::builder()
        .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

    let result = (|| {
        unsafe {
            device
                .device
                .begin_command_buffer(command_buffer, &begin_info)?;
        }
        record(command_buffer);
        unsafe {
            device.device.end_command_buffer(command_buffer)?;

            let command_buffers = [command_buffer];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
            device.device.queue_submit(
                device.graphics_queue,
                &[submit_info.build()],
                vk::Fence::null(),
            )?;
            device.device.queue_wait_idle(device.graphics_queue)?;
        }
        Ok(())
    })();

    unsafe {
        device
            .device
            .free_command_buffers(command_pool, &[command_buffer]);
    }
    result
}
