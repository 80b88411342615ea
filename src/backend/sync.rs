// Synchronization primitives
//
// One semaphore pair shared by every frame. Only valid with a single frame
// in flight: the frame loop waits for device idle at the end of each frame.

use crate::error::{GraphicsError, Result};
use ash::vk;

/// Frame synchronization - created once, reused every frame
pub struct FrameSync {
    device: ash::Device,
    /// Signalled by acquire, waited on by the submit.
    pub image_available: vk::Semaphore,
    /// Signalled by the submit, waited on by present.
    pub render_finished: vk::Semaphore,
}

impl FrameSync {
    pub fn new(device: &ash::Device) -> Result<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::default();

        let image_available = unsafe { device.create_semaphore(&semaphore_info, None) }
            .map_err(GraphicsError::SemaphoreCreationFailed)?;

        let render_finished = match unsafe { device.create_semaphore(&semaphore_info, None) } {
            Ok(semaphore) => semaphore,
            Err(result) => {
                unsafe { device.destroy_semaphore(image_available, None) };
                return Err(GraphicsError::SemaphoreCreationFailed(result));
            }
        };

        Ok(Self {
            device: device.clone(),
            image_available,
            render_finished,
        })
    }
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.render_finished, None);
            self.device.destroy_semaphore(self.image_available, None);
        }
    }
}

/// How many frames may be queued on the GPU at once. The semaphore pair and
/// the idle wait only support 1; raising it needs per-frame fences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePacing {
    pub max_frames_in_flight: usize,
}

impl FramePacing {
    pub const SINGLE: Self = Self {
        max_frames_in_flight: 1,
    };

    /// Whether the loop must drain the device before starting the next frame.
    pub fn waits_idle_each_frame(&self) -> bool {
        self.max_frames_in_flight <= 1
    }
}

impl Default for FramePacing {
    fn default() -> Self {
        Self::SINGLE
    }
}
