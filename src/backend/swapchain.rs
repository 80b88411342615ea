// Swapchain - Window presentation
//
// Manages the chain of images we render to and present to the screen.
// Negotiation (format, present mode, extent, image count, sharing) is pure
// and lives in `SwapchainConfig`; creation only applies it.

use super::probe::{DeviceQuery, ResolvedFamilies, SurfaceSupport};
use super::{Surface, VulkanDevice};
use crate::error::{GraphicsError, Result};
use ash::{khr::swapchain, vk};

/// How swapchain images are shared between queue families. Concurrent mode
/// always names two distinct families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharingPolicy {
    Exclusive,
    Concurrent([u32; 2]),
}

impl SharingPolicy {
    pub fn for_families(families: ResolvedFamilies) -> Self {
        if families.is_shared() {
            Self::Exclusive
        } else {
            Self::Concurrent([families.graphics, families.present])
        }
    }

    pub fn mode(&self) -> vk::SharingMode {
        match self {
            Self::Exclusive => vk::SharingMode::EXCLUSIVE,
            Self::Concurrent(_) => vk::SharingMode::CONCURRENT,
        }
    }

    pub fn family_indices(&self) -> &[u32] {
        match self {
            Self::Exclusive => &[],
            Self::Concurrent(indices) => indices,
        }
    }
}

/// Negotiated swapchain parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainConfig {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    /// Requested minimum; the driver may create more.
    pub image_count: u32,
    pub sharing: SharingPolicy,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainConfig {
    pub fn negotiate(
        support: &SurfaceSupport,
        framebuffer_size: (u32, u32),
        families: ResolvedFamilies,
        preferred_present_mode: vk::PresentModeKHR,
    ) -> Result<Self> {
        let caps = &support.capabilities;

        Ok(Self {
            surface_format: choose_surface_format(&support.formats)?,
            present_mode: choose_present_mode(&support.present_modes, preferred_present_mode),
            extent: choose_extent(caps, framebuffer_size),
            image_count: choose_image_count(caps),
            sharing: SharingPolicy::for_families(families),
            pre_transform: caps.current_transform,
        })
    }
}

/// Prefer 8-bit BGRA sRGB, else whatever the driver lists first.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Result<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
        .ok_or(GraphicsError::NoSurfaceFormats)
}

/// Use the preferred mode when offered. FIFO is always supported.
pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if modes.contains(&preferred) {
        preferred
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// A current extent of `u32::MAX` means the surface size follows the
/// swapchain; use the framebuffer size clamped into the supported range.
pub fn choose_extent(
    caps: &vk::SurfaceCapabilitiesKHR,
    framebuffer_size: (u32, u32),
) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    let (width, height) = framebuffer_size;
    let (min, max) = (caps.min_image_extent, caps.max_image_extent);
    // An inverted range resolves to its minimum.
    vk::Extent2D {
        width: width.clamp(min.width, max.width.max(min.width)),
        height: height.clamp(min.height, max.height.max(min.height)),
    }
}

/// One more than the minimum, capped when the surface declares a maximum
/// (0 means unbounded).
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = caps.min_image_count.saturating_add(1);
    if caps.max_image_count > 0 {
        count.min(caps.max_image_count)
    } else {
        count
    }
}

pub struct Swapchain {
    pub loader: swapchain::Device,
    pub swapchain: vk::SwapchainKHR,
    /// Owned by the swapchain, never destroyed individually.
    pub images: Vec<vk::Image>,
    pub config: SwapchainConfig,
}

/// Result of acquire or present that did not fail outright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    Optimal,
    /// Still presentable, but no longer matches the surface exactly.
    Suboptimal,
}

impl ImageStatus {
    fn from_suboptimal(suboptimal: bool) -> Self {
        if suboptimal {
            Self::Suboptimal
        } else {
            Self::Optimal
        }
    }
}

impl Swapchain {
    /// Query the surface again and build the image chain.
    pub fn new<Q: DeviceQuery + ?Sized>(
        instance: &ash::Instance,
        device: &VulkanDevice,
        surface: &Surface,
        query: &Q,
        framebuffer_size: (u32, u32),
        preferred_present_mode: vk::PresentModeKHR,
    ) -> Result<Self> {
        let support = query.surface_support(device.physical_device)?;
        let config = SwapchainConfig::negotiate(
            &support,
            framebuffer_size,
            device.families,
            preferred_present_mode,
        )?;

        log::info!(
            "Creating swapchain: {}x{}, {:?}/{:?}, {:?}, {} image(s) requested, {:?}",
            config.extent.width,
            config.extent.height,
            config.surface_format.format,
            config.surface_format.color_space,
            config.present_mode,
            config.image_count,
            config.sharing.mode()
        );

        let loader = swapchain::Device::new(instance, &device.device);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.surface)
            .min_image_count(config.image_count)
            .image_format(config.surface_format.format)
            .image_color_space(config.surface_format.color_space)
            .image_extent(config.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(config.sharing.mode())
            .queue_family_indices(config.sharing.family_indices())
            .pre_transform(config.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(config.present_mode)
            .clipped(true);

        let swapchain = unsafe { loader.create_swapchain(&create_info, None) }
            .map_err(GraphicsError::SwapchainCreationFailed)?;

        // The driver may create more images than requested.
        let images = match unsafe { loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(result) => {
                unsafe { loader.destroy_swapchain(swapchain, None) };
                return Err(GraphicsError::driver("vkGetSwapchainImagesKHR")(result));
            }
        };

        log::info!("Created swapchain with {} images", images.len());

        Ok(Self {
            loader,
            swapchain,
            images,
            config,
        })
    }

    pub fn format(&self) -> vk::Format {
        self.config.surface_format.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.config.extent
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_swapchain(self.swapchain, None) };
    }
}

/// Cheap copy of what the frame loop needs from the swapchain
#[derive(Clone)]
pub struct Presenter {
    loader: swapchain::Device,
    swapchain: vk::SwapchainKHR,
}

impl Presenter {
    pub fn new(swapchain: &Swapchain) -> Self {
        Self {
            loader: swapchain.loader.clone(),
            swapchain: swapchain.swapchain,
        }
    }

    /// Acquire the next image, waiting without timeout. Out-of-date is an error.
    pub fn acquire_next_image(&self, signal: vk::Semaphore) -> Result<(u32, ImageStatus)> {
        let result = unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, signal, vk::Fence::null())
        };

        match result {
            Ok((index, suboptimal)) => Ok((index, ImageStatus::from_suboptimal(suboptimal))),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(GraphicsError::SwapchainOutOfDate),
            Err(e) => Err(GraphicsError::driver("vkAcquireNextImageKHR")(e)),
        }
    }

    /// Present rendered image to screen
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<ImageStatus> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.loader.queue_present(queue, &present_info) };

        match result {
            Ok(suboptimal) => Ok(ImageStatus::from_suboptimal(suboptimal)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(GraphicsError::SwapchainOutOfDate),
            Err(e) => Err(GraphicsError::driver("vkQueuePresentKHR")(e)),
        }
    }
}

/// One color view per swapchain image, same order
pub struct ImageViews {
    device: ash::Device,
    pub views: Vec<vk::ImageView>,
}

impl ImageViews {
    pub fn new(device: &ash::Device, swapchain: &Swapchain) -> Result<Self> {
        let mut image_views = Self {
            device: device.clone(),
            views: Vec::with_capacity(swapchain.images.len()),
        };

        // Views created so far are released by Drop if a later one fails.
        for &image in &swapchain.images {
            let create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(swapchain.format())
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            let view = unsafe { device.create_image_view(&create_info, None) }
                .map_err(GraphicsError::ImageViewCreationFailed)?;
            image_views.views.push(view);
        }

        Ok(image_views)
    }
}

impl Drop for ImageViews {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.views {
                self.device.destroy_image_view(view, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::probe::mock::{MockDevice, MockDriver};
    use super::*;
    use pretty_assertions::assert_eq;

    const SENTINEL: vk::Extent2D = vk::Extent2D {
        width: u32::MAX,
        height: u32::MAX,
    };

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: SENTINEL,
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    const SHARED: ResolvedFamilies = ResolvedFamilies {
        graphics: 0,
        present: 0,
    };

    #[test]
    fn image_count_adds_headroom_when_unbounded() {
        assert_eq!(choose_image_count(&caps(2, 0)), 3);
    }

    #[test]
    fn image_count_clamps_to_max() {
        assert_eq!(choose_image_count(&caps(3, 3)), 3);
        assert_eq!(choose_image_count(&caps(1, 8)), 2);
    }

    #[test]
    fn sentinel_extent_clamps_framebuffer_size() {
        let mut caps = caps(2, 0);
        caps.min_image_extent = vk::Extent2D {
            width: 200,
            height: 100,
        };
        caps.max_image_extent = vk::Extent2D {
            width: 1024,
            height: 768,
        };

        assert_eq!(
            choose_extent(&caps, (800, 600)),
            vk::Extent2D {
                width: 800,
                height: 600
            }
        );
        assert_eq!(
            choose_extent(&caps, (4000, 50)),
            vk::Extent2D {
                width: 1024,
                height: 100
            }
        );
    }

    #[test]
    fn inverted_extent_range_does_not_panic() {
        let mut caps = caps(2, 0);
        caps.min_image_extent = vk::Extent2D {
            width: 640,
            height: 480,
        };
        caps.max_image_extent = vk::Extent2D {
            width: 320,
            height: 240,
        };

        assert_eq!(
            choose_extent(&caps, (800, 600)),
            vk::Extent2D {
                width: 640,
                height: 480
            }
        );
    }

    #[test]
    fn image_count_saturates_at_u32_max() {
        assert_eq!(choose_image_count(&caps(u32::MAX, 0)), u32::MAX);
    }

    #[test]
    fn reported_extent_is_used_verbatim() {
        let mut caps = caps(2, 0);
        caps.current_extent = vk::Extent2D {
            width: 1280,
            height: 720,
        };
        assert_eq!(choose_extent(&caps, (800, 600)), caps.current_extent);
    }

    #[test]
    fn preferred_format_wins_anywhere_in_list() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(choose_surface_format(&formats).unwrap(), formats[1]);
    }

    #[test]
    fn format_falls_back_to_first_entry() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
        ];
        assert_eq!(choose_surface_format(&formats).unwrap(), formats[0]);
    }

    #[test]
    fn empty_format_list_is_an_error() {
        assert!(matches!(choose_surface_format(&[]), Err(GraphicsError::NoSurfaceFormats)));
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let preferred = vk::PresentModeKHR::MAILBOX;
        let offered = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&offered, preferred),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE], preferred),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn sharing_is_concurrent_only_for_distinct_families() {
        let exclusive = SharingPolicy::for_families(SHARED);
        assert_eq!(exclusive, SharingPolicy::Exclusive);
        assert_eq!(exclusive.mode(), vk::SharingMode::EXCLUSIVE);
        assert!(exclusive.family_indices().is_empty());

        let concurrent = SharingPolicy::for_families(ResolvedFamilies {
            graphics: 0,
            present: 2,
        });
        assert_eq!(concurrent.mode(), vk::SharingMode::CONCURRENT);
        assert_eq!(concurrent.family_indices(), &[0, 2]);
    }

    #[test]
    fn negotiates_expected_config_from_mocked_surface() {
        let mut device = MockDevice::capable("gpu");
        device.surface.formats = vec![
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        device.surface.present_modes = vec![vk::PresentModeKHR::FIFO];
        device.surface.capabilities = caps(2, 0);
        let driver = MockDriver::new(vec![device]);

        let support = driver.surface_support(MockDriver::handle(0)).unwrap();
        let config =
            SwapchainConfig::negotiate(&support, (800, 600), SHARED, vk::PresentModeKHR::MAILBOX)
                .unwrap();

        assert_eq!(
            config,
            SwapchainConfig {
                surface_format: format(
                    vk::Format::B8G8R8A8_SRGB,
                    vk::ColorSpaceKHR::SRGB_NONLINEAR
                ),
                present_mode: vk::PresentModeKHR::FIFO,
                extent: vk::Extent2D {
                    width: 800,
                    height: 600
                },
                image_count: 3,
                sharing: SharingPolicy::Exclusive,
                pre_transform: vk::SurfaceTransformFlagsKHR::empty(),
            }
        );
    }
}
