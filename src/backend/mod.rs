// Backend module - Vulkan bring-up, one object per module
//
// Design: Thin RAII wrappers around ash; each type owns exactly one Vulkan
// object (or one homogeneous set) and destroys it on drop.
// Selection and negotiation are pure functions over `DeviceQuery` results.

pub mod commands;
pub mod device;
pub mod instance;
pub mod lifetime;
pub mod pipeline;
pub mod probe;
pub mod render_target;
pub mod selector;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use commands::{CommandPool, DrawPass};
pub use device::VulkanDevice;
pub use instance::Instance;
pub use lifetime::{ResourceKind, ResourceStack};
pub use pipeline::GraphicsPipeline;
pub use probe::VulkanQuery;
pub use render_target::{Framebuffers, RenderPass};
pub use selector::select_physical_device;
pub use surface::Surface;
pub use swapchain::{ImageStatus, ImageViews, Presenter, Swapchain};
pub use sync::{FramePacing, FrameSync};
