// Graphics errors
//
// Every failure in the bring-up sequence maps to one variant here.
// Startup treats all of them as fatal; nothing is retried.

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphicsError>;

#[derive(Debug, Error)]
pub enum GraphicsError {
    #[error("failed to load the Vulkan library (is a Vulkan driver installed?)")]
    LibraryLoad(#[from] ash::LoadingError),

    #[error("failed to create Vulkan instance: {0}")]
    InstanceCreationFailed(vk::Result),

    #[error("validation layers requested but not available: {}", .0.join(", "))]
    ValidationLayersUnavailable(Vec<String>),

    #[error("failed to create window surface: {0}")]
    SurfaceCreationFailed(vk::Result),

    #[error("window handle unavailable")]
    WindowHandle(#[from] raw_window_handle::HandleError),

    #[error("no GPU with Vulkan support found")]
    NoGpuFound,

    #[error("no suitable GPU found ({candidates} candidate(s) rejected)")]
    NoSuitableGpu { candidates: usize },

    #[error("failed to create logical device: {0}")]
    DeviceCreationFailed(vk::Result),

    #[error("surface reports no supported formats")]
    NoSurfaceFormats,

    #[error("failed to create swapchain: {0}")]
    SwapchainCreationFailed(vk::Result),

    #[error("failed to create swapchain image view: {0}")]
    ImageViewCreationFailed(vk::Result),

    #[error("failed to create render pass: {0}")]
    RenderPassCreationFailed(vk::Result),

    #[error("failed to create framebuffer: {0}")]
    FramebufferCreationFailed(vk::Result),

    #[error("failed to open shader {path:?}")]
    ShaderOpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("shader {path:?} is not valid SPIR-V")]
    InvalidSpirv {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create shader module: {0}")]
    ShaderModuleCreationFailed(vk::Result),

    #[error("failed to create graphics pipeline: {0}")]
    PipelineCreationFailed(vk::Result),

    #[error("failed to create command pool: {0}")]
    CommandPoolCreationFailed(vk::Result),

    #[error("failed to record command buffer: {0}")]
    CommandRecordingFailed(vk::Result),

    #[error("failed to create semaphore: {0}")]
    SemaphoreCreationFailed(vk::Result),

    /// The surface changed under the swapchain. Recreation is not supported,
    /// so this ends the frame loop.
    #[error("swapchain is out of date (window surface changed)")]
    SwapchainOutOfDate,

    #[error("acquired image index {index} out of range ({count} swapchain image(s))")]
    ImageIndexOutOfRange { index: u32, count: usize },

    #[error("name {0:?} contains an interior NUL byte")]
    InvalidName(String),

    #[error("{call} failed: {result}")]
    Driver {
        call: &'static str,
        result: vk::Result,
    },
}

impl GraphicsError {
    /// Wrap a raw `vk::Result` from a query call that has no dedicated variant.
    pub fn driver(call: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::Driver { call, result }
    }
}
