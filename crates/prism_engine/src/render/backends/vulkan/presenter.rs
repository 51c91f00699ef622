//! Swapchain presentation over a live Vulkan context

use ash::{vk, Device};

use super::commands::CommandPool;
use super::initialization::VulkanContext;
use super::state::{
    FrameSync, FramebufferSet, ImagesInFlight, RenderPass, ScenePassFormats, Semaphore, SurfaceTarget,
    Swapchain,
};
use super::{VulkanError, VulkanResult};
use crate::render::renderer::{AcquireOutcome, PresentOutcome, PresentationBackend};

/// [`PresentationBackend`] implementation for a window surface
pub struct VulkanPresenter {
    device: Device,
    frames: Vec<FrameSync>,
    render_finished: Vec<Semaphore>,
    images_in_flight: ImagesInFlight,
    framebuffers: FramebufferSet,
    render_pass: RenderPass,
    swapchain: Swapchain,
    command_pool: CommandPool,
    clear_color: [f32; 4],
    vsync: bool,
    context: VulkanContext,
}

impl VulkanPresenter {
    /// Create the swapchain, forward render pass and per-frame sync objects
    pub fn new(
        context: VulkanContext,
        window_extent: vk::Extent2D,
        frames_in_flight: usize,
        clear_color: [f32; 4],
        vsync: bool,
    ) -> VulkanResult<Self> {
        let device = context.raw_device();
        let memory_properties = context.memory_properties();

        let swapchain = Swapchain::new(
            context.swapchain_loader(),
            device.clone(),
            &surface_target(&context),
            window_extent,
            vsync,
            vk::SwapchainKHR::null(),
        )?;
        let formats = ScenePassFormats {
            color: swapchain.format().format,
            depth: context.depth_format()?,
        };
        let render_pass = RenderPass::scene(device.clone(), formats)?;
        let framebuffers = FramebufferSet::new(
            &device,
            &memory_properties,
            &render_pass,
            swapchain.image_views(),
            swapchain.extent(),
        )?;

        let command_pool = CommandPool::new(device.clone(), context.graphics_queue_family())?;
        let command_buffers = command_pool.allocate_command_buffers(frames_in_flight as u32)?;
        let frames = command_buffers
            .into_iter()
            .map(|command_buffer| FrameSync::new(device.clone(), command_buffer))
            .collect::<VulkanResult<Vec<_>>>()?;

        let render_finished = per_image_semaphores(&device, swapchain.image_count())?;
        let images_in_flight = ImagesInFlight::new(swapchain.image_count());

        log::info!(
            "Presenter ready: {} frames in flight, {} swapchain images",
            frames.len(),
            swapchain.image_count()
        );

        Ok(Self {
            device,
            frames,
            render_finished,
            images_in_flight,
            framebuffers,
            render_pass,
            swapchain,
            command_pool,
            clear_color,
            vsync,
            context,
        })
    }

    /// Vulkan context the presenter renders with
    pub fn context(&self) -> &VulkanContext {
        &self.context
    }

    fn frame(&self, frame: usize) -> VulkanResult<&FrameSync> {
        self.frames
            .get(frame)
            .ok_or_else(|| VulkanError::invalid(format!("frame slot {} out of range", frame)))
    }
}

fn surface_target(context: &VulkanContext) -> SurfaceTarget<'_> {
    SurfaceTarget {
        physical_device: context.physical_device.device,
        surface: context.surface,
        surface_loader: &context.surface_loader,
    }
}

fn per_image_semaphores(device: &Device, count: usize) -> VulkanResult<Vec<Semaphore>> {
    (0..count).map(|_| Semaphore::new(device.clone())).collect()
}

impl PresentationBackend for VulkanPresenter {
    fn wait_for_frame(&mut self, frame: usize) -> VulkanResult<()> {
        self.frame(frame)?.in_flight.wait()
    }

    fn acquire_next_image(&mut self, frame: usize) -> VulkanResult<AcquireOutcome> {
        let image_available = self.frame(frame)?.image_available.handle();
        let result = unsafe {
            self.swapchain.loader().acquire_next_image(
                self.swapchain.handle(),
                u64::MAX,
                image_available,
                vk::Fence::null(),
            )
        };

        let (image_index, suboptimal) = match result {
            Ok(acquired) => acquired,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => return Ok(AcquireOutcome::OutOfDate),
            Err(err) => return Err(VulkanError::Api(err)),
        };

        // Another slot may still be rendering into this image
        if let Some(owner) = self.images_in_flight.claim(image_index, frame) {
            self.frame(owner)?.in_flight.wait()?;
        }

        Ok(AcquireOutcome::Acquired {
            image_index,
            suboptimal,
        })
    }

    fn begin_commands(&mut self, frame: usize) -> VulkanResult<vk::CommandBuffer> {
        let command_buffer = self.frame(frame)?.command_buffer;
        let begin_info = vk::CommandBufferBeginInfo::builder();
        unsafe {
            self.device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)?;
            self.device.begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }
        Ok(command_buffer)
    }

    fn end_commands(&mut self, frame: usize) -> VulkanResult<()> {
        let command_buffer = self.frame(frame)?.command_buffer;
        unsafe {
            self.device.end_command_buffer(command_buffer)
                .map_err(VulkanError::Api)
        }
    }

    fn begin_render_pass(&mut self, frame: usize, image_index: u32) -> VulkanResult<()> {
        let command_buffer = self.frame(frame)?.command_buffer;
        let extent = self.swapchain.extent();

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(self.render_pass.handle())
            .framebuffer(self.framebuffers.get(image_index)?)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

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
            self.device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_info,
                vk::SubpassContents::INLINE,
            );
            self.device.cmd_set_viewport(command_buffer, 0, &[viewport]);
            self.device.cmd_set_scissor(command_buffer, 0, &[scissor]);
        }
        Ok(())
    }

    fn end_render_pass(&mut self, frame: usize) -> VulkanResult<()> {
        let command_buffer = self.frame(frame)?.command_buffer;
        unsafe {
            self.device.cmd_end_render_pass(command_buffer);
        }
        Ok(())
    }

    fn submit_and_present(&mut self, frame: usize, image_index: u32) -> VulkanResult<PresentOutcome> {
        let sync = self.frame(frame)?;
        let render_finished = self
            .render_finished
            .get(image_index as usize)
            .ok_or_else(|| VulkanError::invalid(format!("no semaphore for image {}", image_index)))?
            .handle();

        let wait_semaphores = [sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [sync.command_buffer];
        let signal_semaphores = [render_finished];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        sync.in_flight.reset()?;
        unsafe {
            self.device
                .queue_submit(
                    self.context.graphics_queue(),
                    &[submit_info.build()],
                    sync.in_flight.handle(),
                )
                .map_err(VulkanError::Api)?;
        }

        let swapchains = [self.swapchain.handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.swapchain
                .loader()
                .queue_present(self.context.present_queue(), &present_info)
        };

        match result {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(err) => Err(VulkanError::Api(err)),
        }
    }

    fn recreate_swapchain(&mut self, extent: vk::Extent2D) -> VulkanResult<()> {
        self.wait_idle()?;

        let swapchain = Swapchain::new(
            self.context.swapchain_loader(),
            self.device.clone(),
            &surface_target(&self.context),
            extent,
            self.vsync,
            self.swapchain.handle(),
        )?;

        if swapchain.format().format != self.render_pass.formats().color {
            return Err(VulkanError::invalid(
                "swapchain image format changed across recreation",
            ));
        }

        let framebuffers = FramebufferSet::new(
            &self.device,
            &self.context.memory_properties(),
            &self.render_pass,
            swapchain.image_views(),
            swapchain.extent(),
        )?;

        if swapchain.image_count() != self.render_finished.len() {
            self.render_finished = per_image_semaphores(&self.device, swapchain.image_count())?;
        }
        self.images_in_flight.reset(swapchain.image_count());

        // Old framebuffers reference the old views, so they go first
        self.framebuffers = framebuffers;
        self.swapchain = swapchain;
        Ok(())
    }

    fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    fn render_pass(&self) -> vk::RenderPass {
        self.render_pass.handle()
    }

    fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle().map_err(VulkanError::Api) }
    }
}

impl Drop for VulkanPresenter {
    fn drop(&mut self) {
        let command_buffers: Vec<vk::CommandBuffer> =
            self.frames.iter().map(|frame| frame.command_buffer).collect();
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device
                .free_command_buffers(self.command_pool.handle(), &command_buffers);
        }
    }
}
