// Synchronization primitives
//
// One semaphore pair and one fence: the draw loop keeps a single frame in flight

use anyhow::{Context, Result};
use ash::vk;

use super::VulkanDevice;

pub struct FrameSync {
    /// Signalled when the swapchain image is ready to be drawn to
    pub image_available: vk::Semaphore,
    /// Signalled when drawing finished; presentation waits on it
    pub render_finished: vk::Semaphore,
    /// Signalled when the GPU is done with the command buffer
    pub in_flight_fence: vk::Fence,
}

impl FrameSync {
    pub fn new(device: &VulkanDevice) -> Result<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        // Start signalled so the first frame does not block forever
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        let device = &device.device;
        unsafe {
            let image_available = device
                .create_semaphore(&semaphore_info, None)
                .context("Failed to create semaphores")?;

            let render_finished = match device.create_semaphore(&semaphore_info, None) {
                Ok(semaphore) => semaphore,
                Err(e) => {
                    device.destroy_semaphore(image_available, None);
                    return Err(e).context("Failed to create semaphores");
                }
            };

            let in_flight_fence = match device.create_fence(&fence_info, None) {
                Ok(fence) => fence,
                Err(e) => {
                    device.destroy_semaphore(render_finished, None);
                    device.destroy_semaphore(image_available, None);
                    return Err(e).context("Failed to create fence");
                }
            };

            Ok(Self {
                image_available,
                render_finished,
                in_flight_fence,
            })
        }
    }

    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_available, None);
            device.destroy_semaphore(self.render_finished, None);
            device.destroy_fence(self.in_flight_fence, None);
        }
    }
}
