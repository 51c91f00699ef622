//! Frame loop over a presentation backend
//!
//! [`Renderer`] owns the frame-in-flight index and the swapchain recreation
//! policy. Everything that touches the swapchain, fences or semaphores sits
//! behind [`PresentationBackend`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use ash::vk;

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Result of asking the swapchain for the next image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is ready to be rendered into
    Acquired {
        /// Swapchain image index
        image_index: u32,
        /// The swapchain still works but no longer matches the surface
        suboptimal: bool,
    },
    /// The swapchain must be recreated before rendering
    OutOfDate,
}

/// Result of presenting a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Presented normally
    Presented,
    /// Presented, but the swapchain should be recreated
    Suboptimal,
    /// Not presented; the swapchain must be recreated
    OutOfDate,
}

/// Swapchain, synchronization and command buffer operations the frame loop drives
pub trait PresentationBackend {
    /// Block until the GPU has retired the previous use of slot `frame`
    fn wait_for_frame(&mut self, frame: usize) -> VulkanResult<()>;

    /// Acquire the next swapchain image for slot `frame`
    fn acquire_next_image(&mut self, frame: usize) -> VulkanResult<AcquireOutcome>;

    /// Start recording slot `frame`'s command buffer
    fn begin_commands(&mut self, frame: usize) -> VulkanResult<vk::CommandBuffer>;

    /// Finish recording slot `frame`'s command buffer
    fn end_commands(&mut self, frame: usize) -> VulkanResult<()>;

    /// Begin the forward render pass on `image`, clearing color and depth
    fn begin_render_pass(&mut self, frame: usize, image_index: u32) -> VulkanResult<()>;

    /// End the forward render pass
    fn end_render_pass(&mut self, frame: usize) -> VulkanResult<()>;

    /// Submit slot `frame` and present `image`
    fn submit_and_present(&mut self, frame: usize, image_index: u32) -> VulkanResult<PresentOutcome>;

    /// Rebuild the swapchain and everything sized from it
    fn recreate_swapchain(&mut self, extent: vk::Extent2D) -> VulkanResult<()>;

    /// Current swapchain extent
    fn extent(&self) -> vk::Extent2D;

    /// Render pass compatible with every swapchain framebuffer
    fn render_pass(&self) -> vk::RenderPass;

    /// Wait until the device is idle
    fn wait_idle(&self) -> VulkanResult<()>;
}

/// Resize notifications shared between the window and the renderer
///
/// The window side calls [`ResizeSignal::notify`]; the renderer consumes the
/// flag at frame boundaries only.
#[derive(Debug, Clone)]
pub struct ResizeSignal {
    inner: Arc<ResizeState>,
}

#[derive(Debug)]
struct ResizeState {
    pending: AtomicBool,
    extent: AtomicU64,
}

fn pack(width: u32, height: u32) -> u64 {
    (u64::from(width) << 32) | u64::from(height)
}

impl ResizeSignal {
    /// Signal starting at the initial framebuffer extent
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            inner: Arc::new(ResizeState {
                pending: AtomicBool::new(false),
                extent: AtomicU64::new(pack(width, height)),
            }),
        }
    }

    /// Record a new framebuffer size
    pub fn notify(&self, width: u32, height: u32) {
        self.inner.extent.store(pack(width, height), Ordering::Release);
        self.inner.pending.store(true, Ordering::Release);
    }

    /// Latest framebuffer size
    pub fn extent(&self) -> vk::Extent2D {
        let packed = self.inner.extent.load(Ordering::Acquire);
        vk::Extent2D {
            width: (packed >> 32) as u32,
            height: packed as u32,
        }
    }

    /// Clear the pending flag, returning whether it was set
    pub fn take(&self) -> bool {
        self.inner.pending.swap(false, Ordering::AcqRel)
    }

    /// Whether a resize is waiting to be handled
    pub fn is_pending(&self) -> bool {
        self.inner.pending.load(Ordering::Acquire)
    }
}

/// Where the renderer is within a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Between frames
    Idle,
    /// Command buffer recording, outside the render pass
    FrameStarted,
    /// Inside the swapchain render pass
    RenderPassActive,
}

/// Drives acquire, record, submit and present for N frames in flight
pub struct Renderer<B: PresentationBackend> {
    backend: B,
    frames_in_flight: usize,
    current_frame: usize,
    current_image: u32,
    current_command_buffer: vk::CommandBuffer,
    state: FrameState,
    resize: ResizeSignal,
    needs_recreate: bool,
}

impl<B: PresentationBackend> Renderer<B> {
    /// Create a renderer over `backend`
    pub fn new(backend: B, frames_in_flight: usize, resize: ResizeSignal) -> VulkanResult<Self> {
        if frames_in_flight == 0 {
            return Err(VulkanError::invalid("frames in flight must be at least 1"));
        }
        Ok(Self {
            backend,
            frames_in_flight,
            current_frame: 0,
            current_image: 0,
            current_command_buffer: vk::CommandBuffer::null(),
            state: FrameState::Idle,
            resize,
            needs_recreate: false,
        })
    }

    /// Acquire an image and start recording
    ///
    /// Returns `Ok(None)` when no frame can be rendered this iteration: the
    /// window is minimized or the swapchain was just recreated. The caller
    /// skips drawing and tries again next iteration.
    pub fn begin_frame(&mut self) -> VulkanResult<Option<vk::CommandBuffer>> {
        self.expect_state(FrameState::Idle, "begin_frame")?;

        let extent = self.resize.extent();
        if extent.width == 0 || extent.height == 0 {
            return Ok(None);
        }
        if self.resize.take() || self.needs_recreate {
            self.recreate_swapchain()?;
        }

        self.backend.wait_for_frame(self.current_frame)?;

        match self.backend.acquire_next_image(self.current_frame)? {
            AcquireOutcome::OutOfDate => {
                log::debug!("Swapchain out of date during acquire");
                self.recreate_swapchain()?;
                Ok(None)
            }
            AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            } => {
                self.needs_recreate |= suboptimal;
                self.current_image = image_index;
                self.current_command_buffer = self.backend.begin_commands(self.current_frame)?;
                self.state = FrameState::FrameStarted;
                Ok(Some(self.current_command_buffer))
            }
        }
    }

    /// Submit and present the frame, then advance the frame-in-flight index
    pub fn end_frame(&mut self) -> VulkanResult<()> {
        self.expect_state(FrameState::FrameStarted, "end_frame")?;

        self.backend.end_commands(self.current_frame)?;
        let outcome = self
            .backend
            .submit_and_present(self.current_frame, self.current_image)?;

        self.state = FrameState::Idle;
        self.current_command_buffer = vk::CommandBuffer::null();

        let resized = self.resize.take();
        if resized || self.needs_recreate || outcome != PresentOutcome::Presented {
            self.recreate_swapchain()?;
        }

        self.current_frame = (self.current_frame + 1) % self.frames_in_flight;
        Ok(())
    }

    /// Begin the render pass both render systems record into
    pub fn begin_swapchain_render_pass(&mut self) -> VulkanResult<()> {
        self.expect_state(FrameState::FrameStarted, "begin_swapchain_render_pass")?;
        self.backend
            .begin_render_pass(self.current_frame, self.current_image)?;
        self.state = FrameState::RenderPassActive;
        Ok(())
    }

    /// End the swapchain render pass
    pub fn end_swapchain_render_pass(&mut self) -> VulkanResult<()> {
        self.expect_state(FrameState::RenderPassActive, "end_swapchain_render_pass")?;
        self.backend.end_render_pass(self.current_frame)?;
        self.state = FrameState::FrameStarted;
        Ok(())
    }

    fn recreate_swapchain(&mut self) -> VulkanResult<()> {
        let extent = self.resize.extent();
        if extent.width == 0 || extent.height == 0 {
            self.needs_recreate = true;
            return Ok(());
        }
        log::info!("Recreating swapchain at {}x{}", extent.width, extent.height);
        self.backend.recreate_swapchain(extent)?;
        self.needs_recreate = false;
        Ok(())
    }

    fn expect_state(&self, expected: FrameState, operation: &str) -> VulkanResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(VulkanError::invalid(format!(
                "{} called in state {:?}, expected {:?}",
                operation, self.state, expected
            )))
        }
    }

    /// Current frame-in-flight slot
    pub fn frame_index(&self) -> usize {
        self.current_frame
    }

    /// Number of frame-in-flight slots
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Current position in the frame state machine
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Whether a frame is being recorded
    pub fn is_frame_in_progress(&self) -> bool {
        self.state != FrameState::Idle
    }

    /// Command buffer of the frame being recorded
    pub fn current_command_buffer(&self) -> VulkanResult<vk::CommandBuffer> {
        if self.is_frame_in_progress() {
            Ok(self.current_command_buffer)
        } else {
            Err(VulkanError::invalid("no frame in progress"))
        }
    }

    /// Width over height of the swapchain
    pub fn aspect_ratio(&self) -> f32 {
        let extent = self.backend.extent();
        if extent.height == 0 {
            1.0
        } else {
            extent.width as f32 / extent.height as f32
        }
    }

    /// Render pass used by the render systems' pipelines
    pub fn swapchain_render_pass(&self) -> vk::RenderPass {
        self.backend.render_pass()
    }

    /// Presentation backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable presentation backend
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Wait for the GPU to go idle
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.backend.wait_idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::vulkan::testing::{MockPresenter, PresenterCall};

    fn renderer(frames: usize) -> (Renderer<MockPresenter>, ResizeSignal) {
        let signal = ResizeSignal::new(800, 600);
        let renderer = Renderer::new(MockPresenter::new(800, 600), frames, signal.clone()).unwrap();
        (renderer, signal)
    }

    fn run_frame(renderer: &mut Renderer<MockPresenter>) -> bool {
        if renderer.begin_frame().unwrap().is_none() {
            return false;
        }
        renderer.begin_swapchain_render_pass().unwrap();
        renderer.end_swapchain_render_pass().unwrap();
        renderer.end_frame().unwrap();
        true
    }

    #[test]
    fn test_frame_index_cycles_modulo_frames_in_flight() {
        let (mut renderer, _) = renderer(2);
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(renderer.frame_index());
            assert!(run_frame(&mut renderer));
        }
        assert_eq!(seen, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_out_of_date_acquire_recreates_and_skips_frame() {
        let (mut renderer, _) = renderer(2);
        assert!(run_frame(&mut renderer));
        assert_eq!(renderer.frame_index(), 1);

        renderer.backend_mut().queue_acquire(AcquireOutcome::OutOfDate);
        assert_eq!(renderer.begin_frame().unwrap(), None);
        assert_eq!(renderer.frame_index(), 1);
        assert_eq!(renderer.state(), FrameState::Idle);
        assert_eq!(renderer.backend().recreations(), 1);
        assert!(!renderer
            .backend()
            .calls()
            .iter()
            .skip_while(|call| **call != PresenterCall::Recreate)
            .any(|call| matches!(call, PresenterCall::BeginCommands(_))));

        assert!(run_frame(&mut renderer));
        assert_eq!(renderer.frame_index(), 0);
    }

    #[test]
    fn test_suboptimal_present_triggers_recreation() {
        let (mut renderer, _) = renderer(2);
        renderer.backend_mut().queue_present(PresentOutcome::Suboptimal);
        assert!(run_frame(&mut renderer));
        assert_eq!(renderer.backend().recreations(), 1);
        assert_eq!(renderer.frame_index(), 1);
    }

    #[test]
    fn test_resize_is_consumed_at_frame_boundary() {
        let (mut renderer, signal) = renderer(2);
        renderer.begin_frame().unwrap().unwrap();
        signal.notify(1024, 768);
        assert_eq!(renderer.backend().recreations(), 0);

        renderer.end_frame().unwrap();
        assert_eq!(renderer.backend().recreations(), 1);
        assert_eq!(
            renderer.backend().extent(),
            vk::Extent2D { width: 1024, height: 768 }
        );
        assert!(!signal.is_pending());
    }

    #[test]
    fn test_minimized_window_yields_no_frame() {
        let (mut renderer, signal) = renderer(2);
        signal.notify(0, 0);
        assert_eq!(renderer.begin_frame().unwrap(), None);
        assert!(!renderer
            .backend()
            .calls()
            .iter()
            .any(|call| matches!(call, PresenterCall::Acquire(_))));

        signal.notify(640, 480);
        assert!(run_frame(&mut renderer));
        assert_eq!(renderer.backend().recreations(), 1);
    }

    #[test]
    fn test_out_of_order_calls_are_rejected() {
        let (mut renderer, _) = renderer(2);
        assert!(renderer.end_frame().is_err());
        assert!(renderer.begin_swapchain_render_pass().is_err());

        renderer.begin_frame().unwrap().unwrap();
        assert!(renderer.begin_frame().is_err());
        renderer.begin_swapchain_render_pass().unwrap();
        assert!(renderer.end_frame().is_err());
        renderer.end_swapchain_render_pass().unwrap();
        renderer.end_frame().unwrap();
    }

    #[test]
    fn test_resize_signal_packs_extent() {
        let signal = ResizeSignal::new(1, 2);
        assert_eq!(signal.extent(), vk::Extent2D { width: 1, height: 2 });
        signal.notify(u32::MAX, 7);
        assert!(signal.take());
        assert!(!signal.take());
        assert_eq!(signal.extent(), vk::Extent2D { width: u32::MAX, height: 7 });
    }

    #[test]
    fn test_zero_frames_in_flight_is_rejected() {
        assert!(Renderer::new(MockPresenter::new(1, 1), 0, ResizeSignal::new(1, 1)).is_err());
    }
}
