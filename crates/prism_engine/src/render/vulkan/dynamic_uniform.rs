//! Dynamic uniform buffer arena
//!
//! Packs per-instance model and normal matrices into one allocation whose
//! block stride honors the device's minimum uniform-buffer offset
//! alignment. The CPU side is an owned, bounds-checked arena; each frame it
//! is copied wholesale into a persistently mapped host-coherent buffer
//! belonging to that frame slot, and draws select their block with a
//! dynamic offset of `index * stride`.

use crate::foundation::math::Mat4;
use crate::render::vulkan::buffer::Buffer;
use crate::render::vulkan::{VulkanError, VulkanResult};
use ash::vk;

const MAT4_SIZE: usize = std::mem::size_of::<[f32; 16]>();

/// Unpadded payload per instance: model matrix plus normal matrix.
pub const INSTANCE_BLOCK_SIZE: usize = 2 * MAT4_SIZE;

/// Round the instance block up to the device alignment.
///
/// Valid because Vulkan guarantees `min_alignment` is a power of two. An
/// alignment of zero means the device imposes no requirement, so the
/// unpadded block size is used as-is.
pub fn block_stride(min_alignment: u64) -> u64 {
    let base = INSTANCE_BLOCK_SIZE as u64;
    if min_alignment == 0 {
        base
    } else {
        (base + min_alignment - 1) & !(min_alignment - 1)
    }
}

/// CPU-side packed instance storage
pub struct InstanceArena {
    data: Vec<u8>,
    stride: usize,
    count: usize,
}

impl InstanceArena {
    pub fn new(min_alignment: u64, count: usize) -> VulkanResult<Self> {
        if count == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "Instance arena requires at least one instance".to_string(),
            });
        }
        let stride = block_stride(min_alignment) as usize;
        Ok(Self {
            data: vec![0; count * stride],
            stride,
            count,
        })
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn total_size(&self) -> usize {
        self.data.len()
    }

    /// Byte offset handed to the descriptor bind for instance `index`.
    /// Always a multiple of the device alignment because the stride is.
    pub fn dynamic_offset(&self, index: usize) -> u32 {
        (index * self.stride) as u32
    }

    /// Write one instance's model matrix and its normal matrix.
    pub fn write_instance(
        &mut self,
        index: usize,
        model: &Mat4,
        normal: &Mat4,
    ) -> VulkanResult<()> {
        if index >= self.count {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "Instance index {} out of bounds for arena of {}",
                    index, self.count
                ),
            });
        }
        let base = index * self.stride;
        self.data[base..base + MAT4_SIZE].copy_from_slice(bytemuck::cast_slice(model.as_slice()));
        self.data[base + MAT4_SIZE..base + INSTANCE_BLOCK_SIZE]
            .copy_from_slice(bytemuck::cast_slice(normal.as_slice()));
        Ok(())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Instance arena paired with one GPU buffer per frame slot
pub struct DynamicUniformArena {
    arena: InstanceArena,
    buffers: Vec<Buffer>,
}

impl DynamicUniformArena {
    pub fn new(
        device: &ash::Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        min_alignment: u64,
        instance_count: usize,
        frames_in_flight: usize,
    ) -> VulkanResult<Self> {
        let arena = InstanceArena::new(min_alignment, instance_count)?;
        let mut buffers = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            let mut buffer = Buffer::new(
                device.clone(),
                memory_properties,
                arena.total_size() as vk::DeviceSize,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            )?;
            buffer.map_persistent()?;
            buffers.push(buffer);
        }
        log::debug!(
            "Dynamic uniform arena: {} instances, stride {} bytes, {} bytes per frame slot",
            instance_count,
            arena.stride(),
            arena.total_size()
        );
        Ok(Self { arena, buffers })
    }

    pub fn write_instance(
        &mut self,
        index: usize,
        model: &Mat4,
        normal: &Mat4,
    ) -> VulkanResult<()> {
        self.arena.write_instance(index, model, normal)
    }

    /// Copy the packed region into the given frame slot's buffer. Called
    /// once per frame after every instance has been written.
    pub fn publish(&self, frame_slot: usize) -> VulkanResult<()> {
        let buffer = self
            .buffers
            .get(frame_slot)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("No dynamic uniform buffer for frame slot {}", frame_slot),
            })?;
        buffer.write_bytes(0, self.arena.bytes())
    }

    pub fn buffer_handle(&self, frame_slot: usize) -> vk::Buffer {
        self.buffers[frame_slot].handle()
    }

    pub fn dynamic_offset(&self, index: usize) -> u32 {
        self.arena.dynamic_offset(index)
    }

    /// Range bound in the descriptor: the unpadded two-matrix payload. The
    /// padding up to the stride carries no data the shader should see.
    pub fn descriptor_range(&self) -> vk::DeviceSize {
        INSTANCE_BLOCK_SIZE as vk::DeviceSize
    }

    pub fn instance_count(&self) -> usize {
        self.arena.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    #[test]
    fn stride_is_aligned_and_covers_payload() {
        for alignment in [1u64, 16, 64, 128, 256, 512] {
            for count in [1usize, 2, 7, 64] {
                let arena = InstanceArena::new(alignment, count).unwrap();
                let stride = arena.stride() as u64;
                assert_eq!(stride % alignment, 0, "alignment {}", alignment);
                assert!(stride >= INSTANCE_BLOCK_SIZE as u64);
                assert_eq!(arena.total_size(), count * arena.stride());
            }
        }
    }

    #[test]
    fn zero_alignment_means_no_padding() {
        let arena = InstanceArena::new(0, 4).unwrap();
        assert_eq!(arena.stride(), INSTANCE_BLOCK_SIZE);
        assert_eq!(arena.total_size(), 4 * INSTANCE_BLOCK_SIZE);
    }

    #[test]
    fn alignment_smaller_than_block_does_not_shrink_stride() {
        // 64-byte alignment: 128 is already a multiple, no padding added.
        let arena = InstanceArena::new(64, 1).unwrap();
        assert_eq!(arena.stride(), 128);
    }

    #[test]
    fn typical_256_byte_alignment_pads_to_256() {
        let arena = InstanceArena::new(256, 3).unwrap();
        assert_eq!(arena.stride(), 256);
        assert_eq!(arena.dynamic_offset(0), 0);
        assert_eq!(arena.dynamic_offset(2), 512);
    }

    #[test]
    fn writes_land_at_block_offsets() {
        let mut arena = InstanceArena::new(256, 2).unwrap();
        let model = Mat4::new_translation(&Vec3::new(5.0, 0.0, 0.0));
        let normal = Mat4::identity();
        arena.write_instance(1, &model, &normal).unwrap();

        // Block 0 untouched.
        assert!(arena.bytes()[..256].iter().all(|&b| b == 0));

        // Model matrix starts at the stride boundary; its first float is
        // the [0][0] element, 1.0.
        let base = 256;
        let first: f32 = bytemuck::pod_read_unaligned(&arena.bytes()[base..base + 4]);
        assert_eq!(first, 1.0);

        // Normal matrix follows the model matrix at +128.
        let normal_first: f32 =
            bytemuck::pod_read_unaligned(&arena.bytes()[base + 128..base + 132]);
        assert_eq!(normal_first, 1.0);
    }

    #[test]
    fn out_of_bounds_instance_rejected() {
        let mut arena = InstanceArena::new(256, 2).unwrap();
        let m = Mat4::identity();
        assert!(arena.write_instance(2, &m, &m).is_err());
    }

    #[test]
    fn zero_instances_rejected() {
        assert!(InstanceArena::new(256, 0).is_err());
    }
}
