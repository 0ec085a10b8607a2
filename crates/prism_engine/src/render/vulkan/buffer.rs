//! Device memory buffers
//!
//! [`Buffer`] owns a `vk::Buffer` plus its backing allocation. Vertex and
//! index data live in device-local memory filled through a staging copy;
//! uniform data lives in host-visible, host-coherent memory that stays
//! persistently mapped for per-frame writes.

use crate::render::vulkan::commands::CommandPool;
use crate::render::vulkan::{VulkanError, VulkanResult};
use ash::vk;
use bytemuck::Pod;
use std::ffi::c_void;
use std::marker::PhantomData;

/// Find a memory type index satisfying both the resource's type filter and
/// the requested property flags.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    for index in 0..memory_properties.memory_type_count {
        let supported = type_filter & (1 << index) != 0;
        let adequate = memory_properties.memory_types[index as usize]
            .property_flags
            .contains(properties);
        if supported && adequate {
            return Ok(index);
        }
    }
    Err(VulkanError::NoSuitableMemoryType)
}

/// Owned buffer with bound device memory
pub struct Buffer {
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    mapped: Option<*mut c_void>,
    device: ash::Device,
}

impl Buffer {
    pub fn new(
        device: ash::Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        if size == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "Buffer size must be non-zero".to_string(),
            });
        }

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { device.create_buffer(&buffer_info, None) }
            .map_err(VulkanError::Api)?;

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type = match find_memory_type(
            memory_properties,
            requirements.memory_type_bits,
            properties,
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);
        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(VulkanError::Api(e));
            }
        };

        unsafe { device.bind_buffer_memory(buffer, memory, 0) }.map_err(VulkanError::Api)?;

        Ok(Self {
            buffer,
            memory,
            size,
            mapped: None,
            device,
        })
    }

    /// Map the whole allocation and keep it mapped for the buffer's
    /// lifetime. Requires host-visible memory.
    pub fn map_persistent(&mut self) -> VulkanResult<()> {
        if self.mapped.is_some() {
            return Ok(());
        }
        let ptr = unsafe {
            self.device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
        }
        .map_err(VulkanError::Api)?;
        self.mapped = Some(ptr);
        Ok(())
    }

    /// Copy bytes into the mapped region at the given offset. Host-coherent
    /// memory needs no explicit flush.
    pub fn write_bytes(&self, offset: usize, bytes: &[u8]) -> VulkanResult<()> {
        let mapped = self.mapped.ok_or_else(|| VulkanError::InvalidOperation {
            reason: "Buffer is not mapped".to_string(),
        })?;
        if offset + bytes.len() > self.size as usize {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "Write of {} bytes at offset {} exceeds buffer size {}",
                    bytes.len(),
                    offset,
                    self.size
                ),
            });
        }
        unsafe {
            let dst = (mapped as *mut u8).add(offset);
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
        }
        Ok(())
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Create a device-local buffer and fill it through a staging copy.
    pub fn device_local_with_data(
        device: ash::Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        command_pool: &CommandPool,
        queue: vk::Queue,
        usage: vk::BufferUsageFlags,
        bytes: &[u8],
    ) -> VulkanResult<Self> {
        let size = bytes.len() as vk::DeviceSize;
        let mut staging = Self::new(
            device.clone(),
            memory_properties,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.map_persistent()?;
        staging.write_bytes(0, bytes)?;

        let buffer = Self::new(
            device,
            memory_properties,
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        command_pool.execute_single_time(queue, |device, cmd| {
            let region = vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size,
            };
            unsafe {
                device.cmd_copy_buffer(cmd, staging.handle(), buffer.handle(), &[region]);
            }
        })?;

        Ok(buffer)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            if self.mapped.take().is_some() {
                self.device.unmap_memory(self.memory);
            }
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Device-local vertex buffer
pub struct VertexBuffer {
    buffer: Buffer,
    vertex_count: u32,
}

impl VertexBuffer {
    pub fn new<T: Pod>(
        device: ash::Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        command_pool: &CommandPool,
        queue: vk::Queue,
        vertices: &[T],
    ) -> VulkanResult<Self> {
        let buffer = Buffer::device_local_with_data(
            device,
            memory_properties,
            command_pool,
            queue,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            bytemuck::cast_slice(vertices),
        )?;
        Ok(Self {
            buffer,
            vertex_count: vertices.len() as u32,
        })
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}

/// Device-local 32-bit index buffer
pub struct IndexBuffer {
    buffer: Buffer,
    index_count: u32,
}

impl IndexBuffer {
    pub fn new(
        device: ash::Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        command_pool: &CommandPool,
        queue: vk::Queue,
        indices: &[u32],
    ) -> VulkanResult<Self> {
        let buffer = Buffer::device_local_with_data(
            device,
            memory_properties,
            command_pool,
            queue,
            vk::BufferUsageFlags::INDEX_BUFFER,
            bytemuck::cast_slice(indices),
        )?;
        Ok(Self {
            buffer,
            index_count: indices.len() as u32,
        })
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// Host-visible uniform buffer for one `T`, persistently mapped
pub struct UniformBuffer<T: Pod> {
    buffer: Buffer,
    _marker: PhantomData<T>,
}

impl<T: Pod> UniformBuffer<T> {
    pub fn new(
        device: ash::Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
    ) -> VulkanResult<Self> {
        let mut buffer = Buffer::new(
            device,
            memory_properties,
            std::mem::size_of::<T>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        buffer.map_persistent()?;
        Ok(Self {
            buffer,
            _marker: PhantomData,
        })
    }

    /// Publish a new value for this frame slot.
    pub fn write(&self, value: &T) -> VulkanResult<()> {
        self.buffer.write_bytes(0, bytemuck::bytes_of(value))
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    pub fn range(&self) -> vk::DeviceSize {
        std::mem::size_of::<T>() as vk::DeviceSize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties_with_types(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: flags.len() as u32,
            ..Default::default()
        };
        for (i, &f) in flags.iter().enumerate() {
            props.memory_types[i].property_flags = f;
        }
        props
    }

    #[test]
    fn memory_type_respects_filter_and_flags() {
        let props = properties_with_types(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);

        // Filter admits both types; property flags select the second.
        let index = find_memory_type(
            &props,
            0b11,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .unwrap();
        assert_eq!(index, 1);

        // Filter excludes the matching type entirely.
        let err = find_memory_type(&props, 0b01, vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert!(matches!(err, Err(VulkanError::NoSuitableMemoryType)));
    }

    #[test]
    fn memory_type_requires_all_requested_flags() {
        let props = properties_with_types(&[vk::MemoryPropertyFlags::HOST_VISIBLE]);
        let err = find_memory_type(
            &props,
            0b01,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        );
        assert!(err.is_err());
    }
}
