// =============================================================================
// RENDERER - The full object chain and the per-frame draw
// =============================================================================
//
// Creation order (each step depends on the one before):
//   instance → debug messenger → surface → physical device → logical device
//   → swapchain → image views → render pass → pipeline → framebuffers
//   → command pool/buffer → sync objects
//
// Destruction runs in reverse. Handles not created yet are null, and
// destroying a null handle is a no-op, so a half-built renderer can be
// dropped safely.

use anyhow::{Context, Result};
use ash::vk;
use raw_window_handle::HasRawDisplayHandle;
use std::path::PathBuf;
use std::sync::Arc;
use winit::window::Window;

use crate::backend::commands::{self, DrawTarget};
use crate::backend::sync::FrameSync;
use crate::backend::{pipeline, Surface, Swapchain, VulkanDevice, VulkanInstance};
use crate::config::Config;

/// Owns every Vulkan object of the application.
///
/// IMPORTANT: Field order matters for Drop! `swapchain` is released in
/// `drop`, then `device`, `surface` and finally `instance`.
pub struct Renderer {
    // ─────────────────────────────────────────────────────────────────────────
    // SYNCHRONIZATION & COMMANDS
    // ─────────────────────────────────────────────────────────────────────────
    sync: Option<FrameSync>,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,

    // ─────────────────────────────────────────────────────────────────────────
    // PIPELINE
    // ─────────────────────────────────────────────────────────────────────────
    framebuffers: Vec<vk::Framebuffer>,
    pipeline: vk::Pipeline,
    pipeline_layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
    /// Format the render pass was built for
    render_pass_format: vk::Format,

    // ─────────────────────────────────────────────────────────────────────────
    // VULKAN CORE
    // ─────────────────────────────────────────────────────────────────────────
    /// `None` while the window is minimised
    swapchain: Option<Swapchain>,
    device: Arc<VulkanDevice>,
    surface: Surface,
    _instance: Arc<VulkanInstance>,

    // ─────────────────────────────────────────────────────────────────────────
    // SETTINGS & STATE
    // ─────────────────────────────────────────────────────────────────────────
    present_mode: vk::PresentModeKHR,
    clear_color: [f32; 4],
    shader_dir: PathBuf,
    framebuffer_size: vk::Extent2D,
    needs_recreate: bool,
    frames_drawn: u64,
}

impl Renderer {
    pub fn new(window: &Window, config: &Config) -> Result<Self> {
        log::info!("Initializing Vulkan...");

        let instance = VulkanInstance::new(window.raw_display_handle(), config.enable_validation())?;
        let surface = Surface::new(instance.clone(), window)?;
        let device = VulkanDevice::new(instance.clone(), &surface)?;

        let size = window.inner_size();

        let mut renderer = Self {
            sync: None,
            command_pool: vk::CommandPool::null(),
            command_buffer: vk::CommandBuffer::null(),
            framebuffers: Vec::new(),
            pipeline: vk::Pipeline::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            render_pass: vk::RenderPass::null(),
            render_pass_format: vk::Format::UNDEFINED,
            swapchain: None,
            device,
            surface,
            _instance: instance,
            present_mode: config.preferred_present_mode(),
            clear_color: config.graphics.clear_color,
            shader_dir: config.graphics.shader_dir.clone(),
            framebuffer_size: vk::Extent2D {
                width: size.width,
                height: size.height,
            },
            needs_recreate: false,
            frames_drawn: 0,
        };

        renderer.create_swapchain_resources()?;

        renderer.command_pool = commands::create_command_pool(&renderer.device)?;
        renderer.command_buffer =
            commands::allocate_command_buffer(&renderer.device, renderer.command_pool)?;

        renderer.sync = Some(FrameSync::new(&renderer.device)?);

        log::info!("Vulkan initialized successfully!");
        Ok(renderer)
    }

    /// Window framebuffer changed size; the swapchain is rebuilt before the next frame
    pub fn resize(&mut self, width: u32, height: u32) {
        self.framebuffer_size = vk::Extent2D { width, height };
        self.needs_recreate = true;
    }

    pub fn is_minimized(&self) -> bool {
        is_empty_extent(self.framebuffer_size)
    }

    // =========================================================================
    // SWAPCHAIN-DEPENDENT RESOURCES
    // =========================================================================

    /// Create swapchain, image views and framebuffers, plus render pass and
    /// pipeline when the surface format is new
    fn create_swapchain_resources(&mut self) -> Result<()> {
        if self.is_minimized() {
            log::debug!("Window minimized, deferring swapchain creation");
            self.needs_recreate = true;
            return Ok(());
        }

        let swapchain = Swapchain::new(
            self.device.clone(),
            &self.surface,
            self.present_mode,
            self.framebuffer_size.width,
            self.framebuffer_size.height,
        )?;

        if self.render_pass == vk::RenderPass::null() || self.render_pass_format != swapchain.format {
            self.destroy_pipeline_objects();

            self.render_pass = pipeline::create_render_pass(&self.device, swapchain.format)?;
            self.render_pass_format = swapchain.format;

            let (graphics_pipeline, layout) =
                pipeline::create_triangle_pipeline(&self.device, self.render_pass, &self.shader_dir)?;
            self.pipeline = graphics_pipeline;
            self.pipeline_layout = layout;
        }

        self.framebuffers = pipeline::create_framebuffers(
            &self.device,
            &swapchain.image_views,
            self.render_pass,
            swapchain.extent,
        )?;

        self.swapchain = Some(swapchain);
        self.needs_recreate = false;
        Ok(())
    }

    /// Recreate swapchain after a resize or an out-of-date report
    fn recreate_swapchain(&mut self) -> Result<()> {
        if self.is_minimized() {
            return Ok(());
        }

        // Wait for GPU to finish all work before destroying resources
        self.device.wait_idle()?;

        pipeline::destroy_framebuffers(&self.device, &self.framebuffers);
        self.framebuffers.clear();

        // The surface can only have one swapchain at a time
        self.swapchain = None;

        self.create_swapchain_resources()
    }

    fn destroy_pipeline_objects(&mut self) {
        unsafe {
            self.device.device.destroy_pipeline(self.pipeline, None);
            self.device
                .device
                .destroy_pipeline_layout(self.pipeline_layout, None);
            self.device.device.destroy_render_pass(self.render_pass, None);
        }
        self.pipeline = vk::Pipeline::null();
        self.pipeline_layout = vk::PipelineLayout::null();
        self.render_pass = vk::RenderPass::null();
    }

    // =========================================================================
    // RENDER LOOP
    // =========================================================================

    /// Draw one frame. Nothing is waited on or submitted while the window
    /// is minimised.
    ///
    /// FRAME TIMELINE:
    /// wait_fence ─> acquire_image ─> reset_fence ─> record ─> submit ─> present
    pub fn draw_frame(&mut self) -> Result<()> {
        match plan_frame(self.framebuffer_size, self.needs_recreate, self.swapchain.is_some()) {
            FrameStep::Skip => return Ok(()),
            FrameStep::Recreate => self.recreate_swapchain()?,
            FrameStep::Draw => {}
        }

        let Some(swapchain) = self.swapchain.as_ref() else {
            return Ok(());
        };
        let sync = self.sync.as_ref().context("Sync objects not initialized")?;
        let device = &self.device.device;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 1: Wait until the GPU is done with the previous frame
        // ─────────────────────────────────────────────────────────────────────
        unsafe { device.wait_for_fences(&[sync.in_flight_fence], true, u64::MAX) }
            .context("Failed to wait for in-flight fence")?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 2: Acquire next swapchain image
        // ─────────────────────────────────────────────────────────────────────
        let (image_index, suboptimal) = match swapchain.acquire_next_image(sync.image_available)? {
            Some(acquired) => acquired,
            None => {
                // Fence is still signalled, so the next frame will not deadlock
                self.needs_recreate = true;
                return Ok(());
            }
        };

        // Only reset once we know work will be submitted
        unsafe { device.reset_fences(&[sync.in_flight_fence]) }
            .context("Failed to reset in-flight fence")?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 3: Record the command buffer
        // ─────────────────────────────────────────────────────────────────────
        unsafe { device.reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty()) }
            .context("Failed to reset command buffer")?;

        let target = DrawTarget {
            render_pass: self.render_pass,
            framebuffer: self.framebuffers[image_index as usize],
            pipeline: self.pipeline,
            extent: swapchain.extent,
            clear_color: self.clear_color,
        };
        commands::record_command_buffer(device, self.command_buffer, &target)?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 4: Submit
        // ─────────────────────────────────────────────────────────────────────
        let wait_semaphores = [sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [self.command_buffer];
        let signal_semaphores = [sync.render_finished];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            device.queue_submit(self.device.graphics_queue, &[submit_info], sync.in_flight_fence)
        }
        .context("Failed to submit draw command buffer")?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 5: Present
        // ─────────────────────────────────────────────────────────────────────
        let present_wants_recreate =
            swapchain.present(self.device.present_queue, image_index, &signal_semaphores)?;

        if suboptimal || present_wants_recreate {
            self.needs_recreate = true;
        }

        self.frames_drawn += 1;
        Ok(())
    }

    /// Block until the GPU has finished all submitted work
    pub fn wait_idle(&self) -> Result<()> {
        self.device.wait_idle()
    }
}

/// What `draw_frame` does before touching the GPU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameStep {
    /// Zero-sized framebuffer, nothing to present to
    Skip,
    /// Rebuild the swapchain first, then draw
    Recreate,
    Draw,
}

fn is_empty_extent(extent: vk::Extent2D) -> bool {
    extent.width == 0 || extent.height == 0
}

fn plan_frame(framebuffer_size: vk::Extent2D, needs_recreate: bool, has_swapchain: bool) -> FrameStep {
    if is_empty_extent(framebuffer_size) {
        FrameStep::Skip
    } else if needs_recreate || !has_swapchain {
        FrameStep::Recreate
    } else {
        FrameStep::Draw
    }
}

// =============================================================================
// CLEANUP
// =============================================================================

impl Drop for Renderer {
    fn drop(&mut self) {
        log::info!(
            "Cleaning up Vulkan resources ({} frames drawn)...",
            self.frames_drawn
        );

        // Wait for GPU to finish before destroying anything
        let _ = self.device.wait_idle();

        // Destroy in reverse order of creation!
        if let Some(sync) = self.sync.take() {
            sync.destroy(&self.device.device);
        }

        unsafe {
            // Also frees the command buffer
            self.device
                .device
                .destroy_command_pool(self.command_pool, None);
        }

        pipeline::destroy_framebuffers(&self.device, &self.framebuffers);
        self.framebuffers.clear();

        self.destroy_pipeline_objects();

        // Image views and swapchain, while device and surface are still alive
        self.swapchain = None;

        // device, surface and instance are released by their own Drop impls

        log::info!("Cleanup complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    #[test]
    fn minimized_window_skips_even_with_pending_recreate() {
        assert_eq!(plan_frame(extent(0, 0), true, true), FrameStep::Skip);
        assert_eq!(plan_frame(extent(800, 0), true, true), FrameStep::Skip);
        assert_eq!(plan_frame(extent(0, 600), false, true), FrameStep::Skip);
        assert_eq!(plan_frame(extent(0, 0), true, false), FrameStep::Skip);
    }

    #[test]
    fn restored_window_recreates_before_drawing() {
        assert_eq!(plan_frame(extent(800, 600), true, true), FrameStep::Recreate);
        assert_eq!(plan_frame(extent(800, 600), false, false), FrameStep::Recreate);
    }

    #[test]
    fn steady_state_draws() {
        assert_eq!(plan_frame(extent(800, 600), false, true), FrameStep::Draw);
        assert_eq!(plan_frame(extent(1, 1), false, true), FrameStep::Draw);
    }

    #[test]
    fn empty_extent_needs_both_sides() {
        assert!(is_empty_extent(extent(0, 0)));
        assert!(is_empty_extent(extent(0, 600)));
        assert!(!is_empty_extent(extent(800, 600)));
    }
}
