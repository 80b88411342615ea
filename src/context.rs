// =============================================================================
// GRAPHICS CONTEXT - Ordered bring-up of every Vulkan object
// =============================================================================
//
// BRING-UP ORDER (each step consumes the previous ones):
//   instance -> surface -> physical device -> logical device + queues
//   -> swapchain -> image views -> render pass -> pipeline -> framebuffers
//   -> command pool/buffer -> semaphores
//
// Teardown is the exact reverse and is handled by `ResourceStack`. If any
// step fails, the objects built so far are locals and drop in reverse
// declaration order, so partial bring-up unwinds cleanly too.

use crate::backend::lifetime::CREATION_ORDER;
use crate::backend::{
    select_physical_device, CommandPool, DrawPass, FramePacing, FrameSync, Framebuffers,
    GraphicsPipeline, ImageStatus, ImageViews, Instance, Presenter, RenderPass, ResourceKind,
    ResourceStack, Surface, Swapchain, VulkanDevice, VulkanQuery,
};
use crate::config::Config;
use crate::error::{GraphicsError, Result};
use crate::frame_loop::FrameBackend;
use crate::window::WindowSystem;
use ash::vk;

pub struct GraphicsContext {
    // Copies of handles owned by `resources`, used every frame.
    device: ash::Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    presenter: Presenter,
    framebuffers: Vec<vk::Framebuffer>,
    draw: DrawPass,
    command_buffer: vk::CommandBuffer,
    image_available: vk::Semaphore,
    render_finished: vk::Semaphore,

    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub image_count: usize,
    pacing: FramePacing,

    resources: ResourceStack,
}

impl GraphicsContext {
    pub fn new(config: &Config, window: &dyn WindowSystem) -> Result<Self> {
        log::info!("Initializing Vulkan...");
        let layers = config.enabled_validation_layers();

        // ─────────────────────────────────────────────────────────────────────
        // STEP 1: Instance + surface
        // ─────────────────────────────────────────────────────────────────────
        let instance = Instance::new(
            &config.window.title,
            &window.required_instance_extensions()?,
            layers,
            config.vulkan.debug_mode,
        )?;
        let surface = Surface::new(&instance, window)?;
        let query = VulkanQuery::new(&instance, &surface);

        // ─────────────────────────────────────────────────────────────────────
        // STEP 2: Physical device + logical device
        // ─────────────────────────────────────────────────────────────────────
        let strategy = config.vulkan.device_selection.strategy();
        let selected = select_physical_device(
            &query,
            &config.vulkan.required_device_extensions,
            strategy.as_ref(),
        )?;
        log::debug!(
            "{}: {} surface format(s), {} present mode(s)",
            selected.name,
            selected.surface.formats.len(),
            selected.surface.present_modes.len()
        );
        let device = VulkanDevice::new(
            &instance,
            &selected,
            &config.vulkan.required_device_extensions,
            layers,
        )?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 3: Swapchain + per-image views (surface support queried again)
        // ─────────────────────────────────────────────────────────────────────
        let swapchain = Swapchain::new(
            &instance.instance,
            &device,
            &surface,
            &query,
            window.framebuffer_size(),
            config.vulkan.present_mode.as_vk(),
        )?;
        let image_views = ImageViews::new(&device.device, &swapchain)?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 4: Render pass, pipeline, framebuffers
        // ─────────────────────────────────────────────────────────────────────
        let render_pass = RenderPass::new(&device.device, swapchain.format())?;
        let pipeline = GraphicsPipeline::new(
            &device.device,
            &render_pass,
            swapchain.extent(),
            &config.render.vertex_shader,
            &config.render.fragment_shader,
        )?;
        let framebuffers =
            Framebuffers::new(&device.device, &image_views, &render_pass, swapchain.extent())?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 5: Commands + synchronization
        // ─────────────────────────────────────────────────────────────────────
        let commands = CommandPool::new(&device.device, device.families.graphics)?;
        let sync = FrameSync::new(&device.device)?;

        debug_assert_eq!(image_views.views.len(), swapchain.images.len());
        debug_assert_eq!(framebuffers.framebuffers.len(), swapchain.images.len());

        let context = Self {
            device: device.device.clone(),
            graphics_queue: device.graphics_queue,
            present_queue: device.present_queue,
            presenter: Presenter::new(&swapchain),
            framebuffers: framebuffers.framebuffers.clone(),
            draw: DrawPass {
                render_pass: render_pass.render_pass,
                pipeline: pipeline.pipeline,
                extent: swapchain.extent(),
                clear_color: config.render.clear_color,
            },
            command_buffer: commands.command_buffer,
            image_available: sync.image_available,
            render_finished: sync.render_finished,
            format: swapchain.format(),
            extent: swapchain.extent(),
            image_count: swapchain.images.len(),
            pacing: FramePacing {
                max_frames_in_flight: config.render.max_frames_in_flight,
            },
            resources: Self::take_ownership(
                instance,
                surface,
                device,
                swapchain,
                image_views,
                render_pass,
                pipeline,
                framebuffers,
                commands,
                sync,
            ),
        };

        log::info!(
            "Vulkan initialized: {}x{}, {:?}, {} swapchain image(s)",
            context.extent.width,
            context.extent.height,
            context.format,
            context.image_count
        );
        Ok(context)
    }

    // Push in creation order so the stack releases in reverse.
    #[allow(clippy::too_many_arguments)]
    fn take_ownership(
        instance: Instance,
        surface: Surface,
        device: VulkanDevice,
        swapchain: Swapchain,
        image_views: ImageViews,
        render_pass: RenderPass,
        pipeline: GraphicsPipeline,
        framebuffers: Framebuffers,
        commands: CommandPool,
        sync: FrameSync,
    ) -> ResourceStack {
        let mut resources = ResourceStack::new();
        resources.push(ResourceKind::Instance, instance);
        resources.push(ResourceKind::Surface, surface);
        resources.push(ResourceKind::Device, device);
        resources.push(ResourceKind::Swapchain, swapchain);
        resources.push(ResourceKind::ImageViews, image_views);
        resources.push(ResourceKind::RenderPass, render_pass);
        resources.push(ResourceKind::Pipeline, pipeline);
        resources.push(ResourceKind::Framebuffers, framebuffers);
        resources.push(ResourceKind::CommandPool, commands);
        resources.push(ResourceKind::Semaphores, sync);
        debug_assert_eq!(resources.kinds(), CREATION_ORDER);
        resources
    }

    pub fn pacing(&self) -> FramePacing {
        self.pacing
    }
}

impl FrameBackend for GraphicsContext {
    fn acquire(&mut self) -> Result<(u32, ImageStatus)> {
        self.presenter.acquire_next_image(self.image_available)
    }

    fn submit(&mut self, image_index: u32) -> Result<()> {
        let framebuffer = framebuffer_for(&self.framebuffers, image_index)?;

        self.draw
            .record(&self.device, self.command_buffer, framebuffer)?;

        let wait_semaphores = [self.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [self.command_buffer];
        let signal_semaphores = [self.render_finished];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)      // Wait for image to be available
            .wait_dst_stage_mask(&wait_stages)      // Which stage waits
            .command_buffers(&command_buffers)      // Commands to execute
            .signal_semaphores(&signal_semaphores); // Signal when done

        unsafe {
            self.device
                .queue_submit(self.graphics_queue, &[submit_info], vk::Fence::null())
        }
        .map_err(GraphicsError::driver("vkQueueSubmit"))
    }

    fn present(&mut self, image_index: u32) -> Result<ImageStatus> {
        self.presenter
            .present(self.present_queue, image_index, &[self.render_finished])
    }

    fn wait_idle(&mut self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }
            .map_err(GraphicsError::driver("vkDeviceWaitIdle"))
    }
}

/// Framebuffer for an acquired image. Framebuffers are index-aligned with
/// the swapchain images, so a miss means the driver returned a bad index.
fn framebuffer_for(framebuffers: &[vk::Framebuffer], image_index: u32) -> Result<vk::Framebuffer> {
    framebuffers
        .get(image_index as usize)
        .copied()
        .ok_or(GraphicsError::ImageIndexOutOfRange {
            index: image_index,
            count: framebuffers.len(),
        })
}

impl Drop for GraphicsContext {
    fn drop(&mut self) {
        log::info!("Cleaning up Vulkan resources...");

        // Wait for GPU to finish before destroying anything
        if let Err(e) = self.wait_idle() {
            log::warn!("Device did not go idle before teardown: {}", e);
        }

        self.resources.release_all();
        log::info!("Cleanup complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn acquired_index_selects_matching_framebuffer() {
        let framebuffers: Vec<vk::Framebuffer> =
            (1..=3).map(vk::Framebuffer::from_raw).collect();

        assert_eq!(framebuffer_for(&framebuffers, 2).unwrap(), framebuffers[2]);
    }

    #[test]
    fn index_past_image_count_is_reported() {
        let framebuffers = vec![vk::Framebuffer::from_raw(1); 2];

        let err = framebuffer_for(&framebuffers, 2).unwrap_err();
        assert!(matches!(
            err,
            GraphicsError::ImageIndexOutOfRange { index: 2, count: 2 }
        ));
    }
}
