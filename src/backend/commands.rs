// Command pool and the single reusable command buffer
//
// The buffer is re-recorded for the acquired image every frame. That is
// safe because the frame loop waits for the device to go idle before the
// next acquire.

use crate::error::{GraphicsError, Result};
use ash::vk;

pub struct CommandPool {
    device: ash::Device,
    pub pool: vk::CommandPool,
    pub command_buffer: vk::CommandBuffer,
}

impl CommandPool {
    pub fn new(device: &ash::Device, queue_family: u32) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            // RESET: the single buffer is re-recorded every frame
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let pool = unsafe { device.create_command_pool(&pool_info, None) }
            .map_err(GraphicsError::CommandPoolCreationFailed)?;

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffer = match unsafe { device.allocate_command_buffers(&alloc_info) } {
            Ok(buffers) => buffers[0],
            Err(result) => {
                unsafe { device.destroy_command_pool(pool, None) };
                return Err(GraphicsError::CommandPoolCreationFailed(result));
            }
        };

        Ok(Self {
            device: device.clone(),
            pool,
            command_buffer,
        })
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        // Also frees the command buffer
        unsafe { self.device.destroy_command_pool(self.pool, None) };
    }
}

/// Everything needed to record one frame's commands
#[derive(Debug, Clone, Copy)]
pub struct DrawPass {
    pub render_pass: vk::RenderPass,
    pub pipeline: vk::Pipeline,
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
}

impl DrawPass {
    /// Record: clear the target, draw the triangle.
    pub fn record(
        &self,
        device: &ash::Device,
        command_buffer: vk::CommandBuffer,
        framebuffer: vk::Framebuffer,
    ) -> Result<()> {
        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: self.clear_color,
            },
        }];

        let render_pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.extent,
            })
            .clear_values(&clear_values);

        unsafe {
            device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(GraphicsError::CommandRecordingFailed)?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(GraphicsError::CommandRecordingFailed)?;

            device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_info,
                vk::SubpassContents::INLINE,
            );
            device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline,
            );
            device.cmd_draw(command_buffer, 3, 1, 0, 0);
            device.cmd_end_render_pass(command_buffer);

            device
                .end_command_buffer(command_buffer)
                .map_err(GraphicsError::CommandRecordingFailed)?;
        }

        Ok(())
    }
}
