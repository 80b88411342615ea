// Resource lifetime - reverse-order release of owned Vulkan objects
//
// Every wrapper in the backend releases its handle in `Drop`. The context
// pushes each wrapper here right after creating it, and the stack drops them
// last-in first-out, so teardown is always the exact reverse of creation.

use std::any::Any;
use std::fmt;

/// What a stack entry owns. Used for logging and ordering checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Instance,
    Surface,
    Device,
    Swapchain,
    ImageViews,
    RenderPass,
    Pipeline,
    Framebuffers,
    CommandPool,
    Semaphores,
}

/// Order in which the context creates, and pushes, its resources.
pub(crate) const CREATION_ORDER: [ResourceKind; 10] = [
    ResourceKind::Instance,
    ResourceKind::Surface,
    ResourceKind::Device,
    ResourceKind::Swapchain,
    ResourceKind::ImageViews,
    ResourceKind::RenderPass,
    ResourceKind::Pipeline,
    ResourceKind::Framebuffers,
    ResourceKind::CommandPool,
    ResourceKind::Semaphores,
];

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Instance => "instance",
            Self::Surface => "surface",
            Self::Device => "device",
            Self::Swapchain => "swapchain",
            Self::ImageViews => "image views",
            Self::RenderPass => "render pass",
            Self::Pipeline => "graphics pipeline",
            Self::Framebuffers => "framebuffers",
            Self::CommandPool => "command pool",
            Self::Semaphores => "semaphores",
        };
        f.write_str(name)
    }
}

/// LIFO owner of type-erased RAII wrappers.
#[derive(Default)]
pub struct ResourceStack {
    entries: Vec<(ResourceKind, Box<dyn Any>)>,
}

impl ResourceStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `resource`. It is dropped after everything pushed later.
    pub fn push<R: 'static>(&mut self, kind: ResourceKind, resource: R) {
        log::debug!("Created {}", kind);
        self.entries.push((kind, Box::new(resource)));
    }

    /// Kinds currently owned, in creation order.
    pub fn kinds(&self) -> Vec<ResourceKind> {
        self.entries.iter().map(|(kind, _)| *kind).collect()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop everything, newest first.
    pub fn release_all(&mut self) {
        while let Some((kind, resource)) = self.entries.pop() {
            drop(resource);
            log::debug!("Released {}", kind);
        }
    }
}

impl Drop for ResourceStack {
    fn drop(&mut self) {
        self.release_all();
    }
}
