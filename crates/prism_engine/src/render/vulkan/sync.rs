//! Frame synchronization primitives
//!
//! Thin RAII wrappers over Vulkan semaphores and fences, plus the per-frame
//! bundle the renderer keeps one of per frame slot. These outlive every
//! swapchain rebuild; they are created at startup and dropped at shutdown.

use crate::render::vulkan::{VulkanError, VulkanResult};
use ash::vk;

/// GPU-side ordering primitive between queue operations
pub struct Semaphore {
    semaphore: vk::Semaphore,
    device: ash::Device,
}

impl Semaphore {
    pub fn new(device: ash::Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe { device.create_semaphore(&create_info, None) }
            .map_err(VulkanError::Api)?;
        Ok(Self { semaphore, device })
    }

    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// CPU-observable completion primitive signaled by queue submission
pub struct Fence {
    fence: vk::Fence,
    device: ash::Device,
}

impl Fence {
    /// Create a fence. Frame fences start signaled so the first wait on a
    /// slot that has never been submitted returns immediately.
    pub fn new(device: ash::Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe { device.create_fence(&create_info, None) }
            .map_err(VulkanError::Api)?;
        Ok(Self { fence, device })
    }

    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Block until the fence signals. A timeout here means the GPU has
    /// stalled; callers treat it as fatal rather than retrying.
    pub fn wait(&self, timeout_ns: u64) -> VulkanResult<()> {
        unsafe { self.device.wait_for_fences(&[self.fence], true, timeout_ns) }
            .map_err(VulkanError::Api)
    }

    /// Return the fence to the unsignaled state. Only valid once the wait
    /// has returned; resetting before a successful acquire deadlocks the
    /// next frame.
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe { self.device.reset_fences(&[self.fence]) }.map_err(VulkanError::Api)
    }

    pub fn is_signaled(&self) -> VulkanResult<bool> {
        unsafe { self.device.get_fence_status(self.fence) }.map_err(VulkanError::Api)
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization triple owned by one frame slot
pub struct FrameSync {
    /// Signaled by acquire when the swapchain image can be written
    pub image_available: Semaphore,
    /// Signaled by the graphics submission; present waits on it
    pub render_finished: Semaphore,
    /// Signaled by the graphics submission; the CPU waits on it before
    /// reusing this slot's command buffer and uniform memory
    pub in_flight: Fence,
}

impl FrameSync {
    pub fn new(device: &ash::Device) -> VulkanResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device.clone(), true)?,
        })
    }
}
