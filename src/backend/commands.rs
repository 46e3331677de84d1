// Command pool, command buffer and per-frame recording
//
// A single primary buffer is reset and re-recorded every frame

use anyhow::{Context, Result};
use ash::vk;

use super::VulkanDevice;

/// Pool on the graphics family; buffers may be reset individually
pub fn create_command_pool(device: &VulkanDevice) -> Result<vk::CommandPool> {
    let pool_info = vk::CommandPoolCreateInfo::builder()
        .queue_family_index(device.graphics_queue_family)
        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

    unsafe { device.device.create_command_pool(&pool_info, None) }
        .context("Failed to create command pool")
}

pub fn allocate_command_buffer(
    device: &VulkanDevice,
    command_pool: vk::CommandPool,
) -> Result<vk::CommandBuffer> {
    let alloc_info = vk::CommandBufferAllocateInfo::builder()
        .command_pool(command_pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(1);

    let buffers = unsafe { device.device.allocate_command_buffers(&alloc_info) }
        .context("Failed to allocate command buffers")?;

    buffers
        .into_iter()
        .next()
        .context("Driver returned no command buffer")
}

/// Everything one frame's draw needs
pub struct DrawTarget {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub pipeline: vk::Pipeline,
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
}

/// Record: clear, bind pipeline, full-extent viewport/scissor, draw 3 vertices
pub fn record_command_buffer(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    target: &DrawTarget,
) -> Result<()> {
    let begin_info = vk::CommandBufferBeginInfo::builder();

    let clear_values = [vk::ClearValue {
        color: vk::ClearColorValue {
            float32: target.clear_color,
        },
    }];

    let render_area = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: target.extent,
    };

    let render_pass_info = vk::RenderPassBeginInfo::builder()
        .render_pass(target.render_pass)
        .framebuffer(target.framebuffer)
        .render_area(render_area)
        .clear_values(&clear_values);

    let viewport = vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: target.extent.width as f32,
        height: target.extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    };

    unsafe {
        device
            .begin_command_buffer(cmd, &begin_info)
            .context("Failed to begin recording command buffer")?;

        device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);
        device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, target.pipeline);
        device.cmd_set_viewport(cmd, 0, &[viewport]);
        device.cmd_set_scissor(cmd, 0, &[render_area]);

        // vertex_count, instance_count, first_vertex, first_instance
        device.cmd_draw(cmd, 3, 1, 0, 0);

        device.cmd_end_render_pass(cmd);

        device
            .end_command_buffer(cmd)
            .context("Failed to record command buffer")?;
    }

    Ok(())
}
