// Capability prober - what a physical device can do for our surface
//
// All driver queries go through `DeviceQuery` so selection and swapchain
// negotiation can be exercised without a GPU.

use super::{Instance, Surface};
use crate::error::{GraphicsError, Result};
use ash::vk;

/// Driver queries needed to judge a physical device.
pub trait DeviceQuery {
    fn physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>>;
    fn properties(&self, device: vk::PhysicalDevice) -> DeviceInfo;
    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties>;
    fn supports_present(&self, device: vk::PhysicalDevice, family: u32) -> Result<bool>;
    fn device_extensions(&self, device: vk::PhysicalDevice) -> Result<Vec<String>>;
    fn surface_support(&self, device: vk::PhysicalDevice) -> Result<SurfaceSupport>;
}

/// Identity and ranking inputs of a physical device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    /// Sum of all DEVICE_LOCAL heaps, in bytes.
    pub local_memory: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilySelection {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilySelection {
    /// Pick families from the probed list. A family that can do both is
    /// preferred so the swapchain can stay exclusive.
    pub fn find<Q: DeviceQuery + ?Sized>(query: &Q, device: vk::PhysicalDevice) -> Result<Self> {
        let families = query.queue_families(device);
        let mut selection = Self::default();

        for (index, family) in families.iter().enumerate() {
            let index = index as u32;
            let graphics = family.queue_count > 0
                && family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
            let present = query.supports_present(device, index)?;

            if graphics && present {
                return Ok(Self {
                    graphics: Some(index),
                    present: Some(index),
                });
            }
            if graphics && selection.graphics.is_none() {
                selection.graphics = Some(index);
            }
            if present && selection.present.is_none() {
                selection.present = Some(index);
            }
        }

        Ok(selection)
    }

    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// Both indices, once complete.
    pub fn resolved(&self) -> Option<ResolvedFamilies> {
        Some(ResolvedFamilies {
            graphics: self.graphics?,
            present: self.present?,
        })
    }
}

/// A complete `QueueFamilySelection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl ResolvedFamilies {
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }
}

/// Snapshot of what the surface supports on one device. Queried fresh for
/// every swapchain build; never cached across frames.
#[derive(Debug, Clone, Default)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Everything the selector needs to know about one physical device
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    pub device: vk::PhysicalDevice,
    pub info: DeviceInfo,
    pub families: QueueFamilySelection,
    pub missing_extensions: Vec<String>,
    /// Only queried when every required extension is present.
    pub surface: Option<SurfaceSupport>,
}

impl DeviceCandidate {
    pub fn probe<Q: DeviceQuery + ?Sized>(
        query: &Q,
        device: vk::PhysicalDevice,
        required_extensions: &[String],
    ) -> Result<Self> {
        let info = query.properties(device);
        let families = QueueFamilySelection::find(query, device)?;

        let supported = query.device_extensions(device)?;
        let missing_extensions: Vec<String> = required_extensions
            .iter()
            .filter(|ext| !supported.contains(ext))
            .cloned()
            .collect();

        let surface = if missing_extensions.is_empty() {
            Some(query.surface_support(device)?)
        } else {
            None
        };

        Ok(Self {
            device,
            info,
            families,
            missing_extensions,
            surface,
        })
    }

    /// Complete queue families, all required extensions, and at least one
    /// surface format and present mode.
    pub fn is_suitable(&self) -> bool {
        self.rejection_reason().is_none()
    }

    /// Human-readable reason for rejection, for logs.
    pub fn rejection_reason(&self) -> Option<String> {
        if !self.families.is_complete() {
            return Some(format!("incomplete queue families {:?}", self.families));
        }
        if !self.missing_extensions.is_empty() {
            return Some(format!("missing extensions {:?}", self.missing_extensions));
        }
        match &self.surface {
            Some(surface) if surface.is_adequate() => None,
            _ => Some("no surface formats or present modes".to_string()),
        }
    }
}

/// `DeviceQuery` backed by the real driver
pub struct VulkanQuery<'a> {
    instance: &'a ash::Instance,
    surface: &'a Surface,
}

impl<'a> VulkanQuery<'a> {
    pub fn new(instance: &'a Instance, surface: &'a Surface) -> Self {
        Self {
            instance: &instance.instance,
            surface,
        }
    }
}

impl DeviceQuery for VulkanQuery<'_> {
    fn physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>> {
        unsafe { self.instance.enumerate_physical_devices() }
            .map_err(GraphicsError::driver("vkEnumeratePhysicalDevices"))
    }

    fn properties(&self, device: vk::PhysicalDevice) -> DeviceInfo {
        let props = unsafe { self.instance.get_physical_device_properties(device) };
        let memory = unsafe { self.instance.get_physical_device_memory_properties(device) };

        let local_memory = memory
            .memory_heaps_as_slice()
            .iter()
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum();

        let name = props
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "<unnamed device>".to_string());

        DeviceInfo {
            name,
            device_type: props.device_type,
            local_memory,
        }
    }

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        unsafe { self.instance.get_physical_device_queue_family_properties(device) }
    }

    fn supports_present(&self, device: vk::PhysicalDevice, family: u32) -> Result<bool> {
        unsafe {
            self.surface
                .loader
                .get_physical_device_surface_support(device, family, self.surface.surface)
        }
        .map_err(GraphicsError::driver("vkGetPhysicalDeviceSurfaceSupportKHR"))
    }

    fn device_extensions(&self, device: vk::PhysicalDevice) -> Result<Vec<String>> {
        let extensions = unsafe { self.instance.enumerate_device_extension_properties(device) }
            .map_err(GraphicsError::driver("vkEnumerateDeviceExtensionProperties"))?;

        Ok(extensions
            .iter()
            .filter_map(|ext| ext.extension_name_as_c_str().ok())
            .map(|name| name.to_string_lossy().into_owned())
            .collect())
    }

    fn surface_support(&self, device: vk::PhysicalDevice) -> Result<SurfaceSupport> {
        let loader = &self.surface.loader;
        let surface = self.surface.surface;

        unsafe {
            Ok(SurfaceSupport {
                capabilities: loader
                    .get_physical_device_surface_capabilities(device, surface)
                    .map_err(GraphicsError::driver("vkGetPhysicalDeviceSurfaceCapabilitiesKHR"))?,
                formats: loader
                    .get_physical_device_surface_formats(device, surface)
                    .map_err(GraphicsError::driver("vkGetPhysicalDeviceSurfaceFormatsKHR"))?,
                present_modes: loader
                    .get_physical_device_surface_present_modes(device, surface)
                    .map_err(GraphicsError::driver("vkGetPhysicalDeviceSurfacePresentModesKHR"))?,
            })
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mock::{MockDevice, MockDriver};
    use super::*;
    use pretty_assertions::assert_eq;

    fn required() -> Vec<String> {
        vec!["VK_KHR_swapchain".to_string()]
    }

    fn probe(device: MockDevice) -> DeviceCandidate {
        let driver = MockDriver::new(vec![device]);
        DeviceCandidate::probe(&driver, MockDriver::handle(0), &required()).unwrap()
    }

    #[test]
    fn capable_device_is_suitable() {
        let candidate = probe(MockDevice::capable("gpu"));
        assert!(candidate.is_suitable());
        assert_eq!(candidate.rejection_reason(), None);
    }

    #[test]
    fn missing_present_family_alone_rejects() {
        let mut device = MockDevice::capable("gpu");
        device.families = vec![(vk::QueueFlags::GRAPHICS, false)];

        let candidate = probe(device);
        assert!(!candidate.families.is_complete());
        assert!(candidate.missing_extensions.is_empty());
        assert!(candidate.surface.as_ref().unwrap().is_adequate());
        assert!(!candidate.is_suitable());
    }

    #[test]
    fn missing_graphics_family_alone_rejects() {
        let mut device = MockDevice::capable("gpu");
        device.families = vec![(vk::QueueFlags::COMPUTE, true)];

        let candidate = probe(device);
        assert_eq!(candidate.families.graphics, None);
        assert!(!candidate.is_suitable());
    }

    #[test]
    fn missing_extension_alone_rejects() {
        let mut device = MockDevice::capable("gpu");
        device.extensions = vec!["VK_KHR_maintenance1".to_string()];

        let candidate = probe(device);
        assert!(candidate.families.is_complete());
        assert_eq!(candidate.missing_extensions, required());
        // Surface is not queried without the swapchain extension.
        assert!(candidate.surface.is_none());
        assert!(!candidate.is_suitable());
    }

    #[test]
    fn empty_formats_alone_rejects() {
        let mut device = MockDevice::capable("gpu");
        device.surface.formats.clear();

        let candidate = probe(device);
        assert!(candidate.families.is_complete());
        assert!(candidate.missing_extensions.is_empty());
        assert!(!candidate.is_suitable());
    }

    #[test]
    fn empty_present_modes_alone_rejects() {
        let mut device = MockDevice::capable("gpu");
        device.surface.present_modes.clear();

        let candidate = probe(device);
        assert!(!candidate.is_suitable());
        assert!(candidate.rejection_reason().unwrap().contains("present modes"));
    }

    #[test]
    fn shared_family_is_preferred() {
        let mut device = MockDevice::capable("gpu");
        device.families = vec![
            (vk::QueueFlags::GRAPHICS, false),
            (vk::QueueFlags::TRANSFER, true),
            (vk::QueueFlags::GRAPHICS, true),
        ];

        let families = probe(device).families;
        assert_eq!(
            families,
            QueueFamilySelection {
                graphics: Some(2),
                present: Some(2),
            }
        );
    }

    #[test]
    fn split_families_take_first_of_each() {
        let mut device = MockDevice::capable("gpu");
        device.families = vec![
            (vk::QueueFlags::COMPUTE, false),
            (vk::QueueFlags::GRAPHICS, false),
            (vk::QueueFlags::TRANSFER, true),
            (vk::QueueFlags::COMPUTE, true),
        ];

        let families = probe(device).families;
        assert_eq!(families.graphics, Some(1));
        assert_eq!(families.present, Some(2));
        assert!(!families.resolved().unwrap().is_shared());
    }

    #[test]
    fn resolved_requires_both_roles() {
        let partial = QueueFamilySelection {
            graphics: Some(0),
            present: None,
        };
        assert_eq!(partial.resolved(), None);
    }
}
