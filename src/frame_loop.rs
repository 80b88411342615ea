// =============================================================================
// FRAME LOOP - Acquire, submit, present, wait
// =============================================================================
//
// FRAME TIMELINE (one frame in flight):
// ┌──────────────────────────────────────────────────────────────────────┐
// │  poll ─> acquire ─> submit ─> present ─> wait idle ─> (next frame)   │
// │           │          │          │                                    │
// │     signals      waits on   waits on                                 │
// │  image_available  image_   render_                                   │
// │                   available finished,                                │
// │                   signals                                            │
// │                   render_finished                                    │
// └──────────────────────────────────────────────────────────────────────┘
//
// The idle wait collapses every CPU/GPU race into one blocking point, which
// is what lets a single semaphore pair serve every frame.

use crate::backend::{FramePacing, ImageStatus};
use crate::error::Result;
use crate::window::WindowSystem;

/// The GPU side of a frame, as seen by the loop
pub trait FrameBackend {
    /// Block until an image is available; returns its index.
    fn acquire(&mut self) -> Result<(u32, ImageStatus)>;
    /// Record and submit the frame's commands for `image_index`.
    fn submit(&mut self, image_index: u32) -> Result<()>;
    fn present(&mut self, image_index: u32) -> Result<ImageStatus>;
    fn wait_idle(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Acquiring,
    Submitting { image_index: u32 },
    Presenting { image_index: u32 },
    WaitingIdle,
}

pub struct FrameLoop {
    state: FrameState,
    pacing: FramePacing,
    frames_presented: u64,
    suboptimal_reported: bool,
}

impl FrameLoop {
    pub fn new(pacing: FramePacing) -> Self {
        Self {
            state: FrameState::Idle,
            pacing,
            frames_presented: 0,
            suboptimal_reported: false,
        }
    }

    /// State reached so far; after an error this is where the frame stopped.
    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Draw frames until the window asks to close, then drain the GPU.
    /// The only cancellation point is the top of each iteration.
    pub fn run<W, B>(&mut self, window: &mut W, backend: &mut B) -> Result<u64>
    where
        W: WindowSystem + ?Sized,
        B: FrameBackend + ?Sized,
    {
        log::info!("Entering frame loop");

        loop {
            window.poll_events();
            if window.should_close() {
                break;
            }
            self.draw_frame(backend)?;
        }

        backend.wait_idle()?;
        log::info!("Frame loop finished after {} frame(s)", self.frames_presented);
        Ok(self.frames_presented)
    }

    pub fn draw_frame<B: FrameBackend + ?Sized>(&mut self, backend: &mut B) -> Result<()> {
        self.enter(FrameState::Acquiring);
        let (image_index, status) = backend.acquire()?;
        self.check(status);

        self.enter(FrameState::Submitting { image_index });
        backend.submit(image_index)?;

        self.enter(FrameState::Presenting { image_index });
        let status = backend.present(image_index)?;
        self.check(status);

        if self.pacing.waits_idle_each_frame() {
            self.enter(FrameState::WaitingIdle);
            backend.wait_idle()?;
        }

        self.enter(FrameState::Idle);
        self.frames_presented += 1;
        Ok(())
    }

    fn enter(&mut self, state: FrameState) {
        log::trace!("Frame {}: {:?} -> {:?}", self.frames_presented, self.state, state);
        self.state = state;
    }

    // Suboptimal images still present correctly; recreation would fix it
    // but is not implemented, so say so once instead of every frame.
    fn check(&mut self, status: ImageStatus) {
        if status == ImageStatus::Suboptimal && !self.suboptimal_reported {
            log::warn!("Swapchain is suboptimal for the surface; continuing without recreation");
            self.suboptimal_reported = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphicsError;
    use ash::{vk, Entry};
    use pretty_assertions::assert_eq;
    use std::ffi::c_char;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Acquire,
        Submit(u32),
        Present(u32),
        WaitIdle,
    }

    #[derive(Default)]
    struct MockBackend {
        calls: Vec<Call>,
        image_count: u32,
        next_image: u32,
        acquire_status: Option<ImageStatus>,
        fail_acquire_at: Option<usize>,
        fail_present_at: Option<usize>,
        acquires: usize,
        presents: usize,
    }

    impl MockBackend {
        fn new(image_count: u32) -> Self {
            Self {
                image_count,
                ..Default::default()
            }
        }
    }

    impl FrameBackend for MockBackend {
        fn acquire(&mut self) -> Result<(u32, ImageStatus)> {
            self.calls.push(Call::Acquire);
            self.acquires += 1;
            if self.fail_acquire_at == Some(self.acquires) {
                return Err(GraphicsError::SwapchainOutOfDate);
            }
            let index = self.next_image;
            self.next_image = (self.next_image + 1) % self.image_count;
            Ok((index, self.acquire_status.unwrap_or(ImageStatus::Optimal)))
        }

        fn submit(&mut self, image_index: u32) -> Result<()> {
            self.calls.push(Call::Submit(image_index));
            Ok(())
        }

        fn present(&mut self, image_index: u32) -> Result<ImageStatus> {
            self.calls.push(Call::Present(image_index));
            self.presents += 1;
            if self.fail_present_at == Some(self.presents) {
                return Err(GraphicsError::SwapchainOutOfDate);
            }
            Ok(ImageStatus::Optimal)
        }

        fn wait_idle(&mut self) -> Result<()> {
            self.calls.push(Call::WaitIdle);
            Ok(())
        }
    }

    /// Requests close after a fixed number of polls.
    struct MockWindow {
        polls: usize,
        close_after: usize,
    }

    impl MockWindow {
        fn closing_after(close_after: usize) -> Self {
            Self {
                polls: 0,
                close_after,
            }
        }
    }

    impl WindowSystem for MockWindow {
        fn should_close(&self) -> bool {
            self.polls > self.close_after
        }

        fn poll_events(&mut self) {
            self.polls += 1;
        }

        fn framebuffer_size(&self) -> (u32, u32) {
            (800, 600)
        }

        fn required_instance_extensions(&self) -> Result<Vec<*const c_char>> {
            Ok(Vec::new())
        }

        fn create_surface(
            &self,
            _entry: &Entry,
            _instance: &ash::Instance,
        ) -> Result<vk::SurfaceKHR> {
            Ok(vk::SurfaceKHR::null())
        }
    }

    #[test]
    fn frame_runs_acquire_submit_present_wait() {
        let mut backend = MockBackend::new(3);
        let mut frames = FrameLoop::new(FramePacing::SINGLE);

        frames.draw_frame(&mut backend).unwrap();

        assert_eq!(
            backend.calls,
            vec![Call::Acquire, Call::Submit(0), Call::Present(0), Call::WaitIdle]
        );
        assert_eq!(frames.state(), FrameState::Idle);
        assert_eq!(frames.frames_presented(), 1);
    }

    #[test]
    fn acquired_index_flows_to_submit_and_present() {
        let mut backend = MockBackend::new(3);
        backend.next_image = 2;
        let mut frames = FrameLoop::new(FramePacing::SINGLE);

        frames.draw_frame(&mut backend).unwrap();
        frames.draw_frame(&mut backend).unwrap();

        assert_eq!(
            backend.calls,
            vec![
                Call::Acquire,
                Call::Submit(2),
                Call::Present(2),
                Call::WaitIdle,
                Call::Acquire,
                Call::Submit(0),
                Call::Present(0),
                Call::WaitIdle,
            ]
        );
    }

    #[test]
    fn loop_stops_on_close_and_drains() {
        let mut backend = MockBackend::new(2);
        let mut window = MockWindow::closing_after(3);
        let mut frames = FrameLoop::new(FramePacing::SINGLE);

        let presented = frames.run(&mut window, &mut backend).unwrap();

        assert_eq!(presented, 3);
        assert_eq!(window.polls, 4);
        // 3 frames of 4 calls, plus the final drain before teardown.
        assert_eq!(backend.calls.len(), 13);
        assert_eq!(backend.calls.last(), Some(&Call::WaitIdle));
    }

    #[test]
    fn close_before_first_frame_draws_nothing() {
        let mut backend = MockBackend::new(2);
        let mut window = MockWindow::closing_after(0);
        let mut frames = FrameLoop::new(FramePacing::SINGLE);

        assert_eq!(frames.run(&mut window, &mut backend).unwrap(), 0);
        assert_eq!(backend.calls, vec![Call::WaitIdle]);
    }

    #[test]
    fn out_of_date_acquire_fails_loudly() {
        let mut backend = MockBackend::new(2);
        backend.fail_acquire_at = Some(2);
        let mut window = MockWindow::closing_after(10);
        let mut frames = FrameLoop::new(FramePacing::SINGLE);

        let err = frames.run(&mut window, &mut backend).unwrap_err();

        assert!(matches!(err, GraphicsError::SwapchainOutOfDate));
        assert_eq!(frames.state(), FrameState::Acquiring);
        assert_eq!(frames.frames_presented(), 1);
    }

    #[test]
    fn out_of_date_present_stops_before_idle_wait() {
        let mut backend = MockBackend::new(2);
        backend.fail_present_at = Some(1);
        let mut frames = FrameLoop::new(FramePacing::SINGLE);

        let err = frames.draw_frame(&mut backend).unwrap_err();

        assert!(matches!(err, GraphicsError::SwapchainOutOfDate));
        assert_eq!(frames.state(), FrameState::Presenting { image_index: 0 });
        assert_eq!(backend.calls, vec![Call::Acquire, Call::Submit(0), Call::Present(0)]);
    }

    #[test]
    fn suboptimal_frames_keep_presenting() {
        let mut backend = MockBackend::new(2);
        backend.acquire_status = Some(ImageStatus::Suboptimal);
        let mut frames = FrameLoop::new(FramePacing::SINGLE);

        frames.draw_frame(&mut backend).unwrap();
        frames.draw_frame(&mut backend).unwrap();

        assert_eq!(frames.frames_presented(), 2);
        assert!(frames.suboptimal_reported);
    }
}
