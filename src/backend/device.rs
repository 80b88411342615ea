// Vulkan Device - Core GPU interface
//
// Responsibilities:
// - Logical device creation with one queue request per distinct family
// - Required device extensions (+ validation layers in debug mode)
// - Graphics and present queue handles

use super::instance::c_names;
use super::probe::ResolvedFamilies;
use super::selector::SelectedDevice;
use super::Instance;
use crate::error::{GraphicsError, Result};
use ash::vk;
use std::collections::BTreeSet;
use std::ffi::c_char;

/// Logical device wrapper with automatic cleanup
pub struct VulkanDevice {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub families: ResolvedFamilies,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
}

impl VulkanDevice {
    /// Create the logical device
    ///
    /// # Arguments
    /// * `selected` - Physical device and queue families from the selector
    /// * `extensions` - Required device extensions
    /// * `validation_layers` - Passed through for older loaders; empty outside debug mode
    pub fn new(
        instance: &Instance,
        selected: &SelectedDevice,
        extensions: &[String],
        validation_layers: &[String],
    ) -> Result<Self> {
        log::info!("Creating logical device on {}", selected.name);

        let families = selected.families;
        let queue_priorities = [1.0];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_queue_families(families)
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();
        log::debug!("Requesting {} queue family(ies)", queue_create_infos.len());

        let extension_names = c_names(extensions)?;
        let extension_ptrs: Vec<*const c_char> =
            extension_names.iter().map(|name| name.as_ptr()).collect();

        let layer_names = c_names(validation_layers)?;
        let layer_ptrs: Vec<*const c_char> =
            layer_names.iter().map(|name| name.as_ptr()).collect();

        let features = vk::PhysicalDeviceFeatures::default();

        #[allow(deprecated)]
        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .instance
                .create_device(selected.device, &create_info, None)
        }
        .map_err(GraphicsError::DeviceCreationFailed)?;

        let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(families.present, 0) };

        Ok(Self {
            device,
            physical_device: selected.device,
            families,
            graphics_queue,
            present_queue,
        })
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }
            .map_err(GraphicsError::driver("vkDeviceWaitIdle"))
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        // Wait for device to finish
        let _ = self.wait_idle();

        unsafe { self.device.destroy_device(None) };
    }
}

/// Distinct family indices to request queues from. The driver rejects two
/// requests for the same family, so a shared graphics+present family
/// yields a single entry.
pub fn unique_queue_families(families: ResolvedFamilies) -> Vec<u32> {
    [families.graphics, families.present]
        .into_iter()
        .collect::<BTreeSet<u32>>()
        .into_iter()
        .collect()
}
