//! Command pool and recording
//!
//! The pool is created once against the graphics queue family and hands out
//! one primary command buffer per frame slot, reset and re-recorded every
//! frame. [`CommandRecorder`] wraps a buffer for the duration of one
//! frame's recording; [`ActiveRenderPass`] scopes draw commands so the pass
//! cannot be left open.

use crate::render::vulkan::{VulkanError, VulkanResult};
use ash::vk;

/// Command buffer allocator tied to one queue family
pub struct CommandPool {
    pool: vk::CommandPool,
    device: ash::Device,
}

impl CommandPool {
    pub fn new(device: ash::Device, queue_family: u32) -> VulkanResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family);
        let pool = unsafe { device.create_command_pool(&create_info, None) }
            .map_err(VulkanError::Api)?;
        log::debug!("Command pool created for queue family {}", queue_family);
        Ok(Self { pool, device })
    }

    /// Allocate primary command buffers, one per frame slot. Allocated once;
    /// the buffers are reset each frame, never reallocated.
    pub fn allocate_primary(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);
        unsafe { self.device.allocate_command_buffers(&alloc_info) }
            .map_err(VulkanError::Api)
    }

    /// Record and synchronously execute a one-shot command buffer. Used for
    /// staging copies, layout transitions, and mip blits during setup.
    pub fn execute_single_time<F>(&self, queue: vk::Queue, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe { self.device.allocate_command_buffers(&alloc_info) }
            .map_err(VulkanError::Api)?;
        let command_buffer = buffers[0];

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        let result = unsafe {
            self.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)
                .and_then(|_| {
                    record(&self.device, command_buffer);
                    self.device
                        .end_command_buffer(command_buffer)
                        .map_err(VulkanError::Api)
                })
                .and_then(|_| {
                    let buffers = [command_buffer];
                    let submit_info = vk::SubmitInfo::builder().command_buffers(&buffers);
                    self.device
                        .queue_submit(queue, &[submit_info.build()], vk::Fence::null())
                        .map_err(VulkanError::Api)
                })
                .and_then(|_| {
                    self.device
                        .queue_wait_idle(queue)
                        .map_err(VulkanError::Api)
                })
        };

        unsafe {
            self.device
                .free_command_buffers(self.pool, &[command_buffer]);
        }
        result
    }

    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.pool, None);
        }
        log::debug!("Command pool destroyed");
    }
}

/// Records one frame's commands into a pre-allocated primary buffer
pub struct CommandRecorder<'a> {
    device: &'a ash::Device,
    command_buffer: vk::CommandBuffer,
}

impl<'a> CommandRecorder<'a> {
    /// Reset the buffer and begin recording.
    pub fn begin(
        device: &'a ash::Device,
        command_buffer: vk::CommandBuffer,
    ) -> VulkanResult<Self> {
        unsafe {
            device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)?;
            let begin_info = vk::CommandBufferBeginInfo::builder();
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }
        Ok(Self {
            device,
            command_buffer,
        })
    }

    pub fn end(self) -> VulkanResult<vk::CommandBuffer> {
        unsafe {
            self.device
                .end_command_buffer(self.command_buffer)
                .map_err(VulkanError::Api)?;
        }
        Ok(self.command_buffer)
    }

    pub fn handle(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// Begin a render pass; the returned guard ends it on drop.
    pub fn begin_render_pass(
        &self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    ) -> ActiveRenderPass<'_> {
        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(clear_values);
        unsafe {
            self.device.cmd_begin_render_pass(
                self.command_buffer,
                &begin_info,
                vk::SubpassContents::INLINE,
            );
        }
        ActiveRenderPass { recorder: self }
    }
}

/// Scope guard for an open render pass
pub struct ActiveRenderPass<'a> {
    recorder: &'a CommandRecorder<'a>,
}

impl ActiveRenderPass<'_> {
    fn device(&self) -> &ash::Device {
        self.recorder.device
    }

    fn buffer(&self) -> vk::CommandBuffer {
        self.recorder.command_buffer
    }

    /// Set dynamic viewport and scissor covering the full extent.
    pub fn set_viewport_scissor(&self, extent: vk::Extent2D) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        unsafe {
            self.device().cmd_set_viewport(self.buffer(), 0, &[viewport]);
            self.device().cmd_set_scissor(self.buffer(), 0, &[scissor]);
        }
    }

    pub fn bind_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe {
            self.device().cmd_bind_pipeline(
                self.buffer(),
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    pub fn bind_vertex_buffer(&self, buffer: vk::Buffer) {
        unsafe {
            self.device()
                .cmd_bind_vertex_buffers(self.buffer(), 0, &[buffer], &[0]);
        }
    }

    pub fn bind_index_buffer(&self, buffer: vk::Buffer) {
        unsafe {
            self.device()
                .cmd_bind_index_buffer(self.buffer(), buffer, 0, vk::IndexType::UINT32);
        }
    }

    /// Bind one descriptor set, with dynamic offsets for any dynamic
    /// uniform bindings it contains.
    pub fn bind_descriptor_set(
        &self,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
        dynamic_offsets: &[u32],
    ) {
        unsafe {
            self.device().cmd_bind_descriptor_sets(
                self.buffer(),
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[set],
                dynamic_offsets,
            );
        }
    }

    pub fn draw_indexed(&self, index_count: u32) {
        unsafe {
            self.device()
                .cmd_draw_indexed(self.buffer(), index_count, 1, 0, 0, 0);
        }
    }
}

impl Drop for ActiveRenderPass<'_> {
    fn drop(&mut self) {
        unsafe {
            self.device().cmd_end_render_pass(self.buffer());
        }
    }
}
