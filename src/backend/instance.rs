// Vulkan Instance - Entry point to the driver
//
// Responsibilities:
// - Load the Vulkan library
// - Instance creation with the window system's surface extensions
// - Validation layers + debug messenger (debug mode only)

use crate::error::{GraphicsError, Result};
use ash::{ext::debug_utils, vk, Entry};
use std::ffi::{c_char, CStr, CString};

/// Vulkan instance wrapper with automatic cleanup
pub struct Instance {
    // Destroyed explicitly in Drop, before the instance.
    debug_utils: Option<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    pub instance: ash::Instance,
    pub entry: Entry,
}

impl Instance {
    /// Create the Vulkan instance
    ///
    /// # Arguments
    /// * `app_name` - Application name reported to the driver
    /// * `window_extensions` - Instance extensions the window system needs for surfaces
    /// * `validation_layers` - Layers to enable; empty outside debug mode
    /// * `debug_mode` - Enables the debug-utils extension and messenger
    pub fn new(
        app_name: &str,
        window_extensions: &[*const c_char],
        validation_layers: &[String],
        debug_mode: bool,
    ) -> Result<Self> {
        log::info!("Creating Vulkan instance: {}", app_name);

        let entry = unsafe { Entry::load() }?;

        if debug_mode {
            let available = Self::available_layers(&entry)?;
            let missing = missing_names(&available, validation_layers);
            if !missing.is_empty() {
                return Err(GraphicsError::ValidationLayersUnavailable(missing));
            }
        }

        Self::log_available_extensions(&entry)?;

        let api_version = match unsafe { entry.try_enumerate_instance_version() } {
            Ok(Some(version)) => version,
            Ok(None) => vk::API_VERSION_1_0,
            Err(result) => return Err(GraphicsError::InstanceCreationFailed(result)),
        };
        log::info!(
            "Instance API version: {}.{}.{}",
            vk::api_version_major(api_version),
            vk::api_version_minor(api_version),
            vk::api_version_patch(api_version)
        );

        let app_name_cstr = c_name(app_name)?;
        let engine_name = c"No Engine";

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(api_version);

        let mut extensions = window_extensions.to_vec();
        if debug_mode {
            extensions.push(debug_utils::NAME.as_ptr());
        }

        let layer_names = c_names(validation_layers)?;
        let layer_ptrs: Vec<*const c_char> = if debug_mode {
            layer_names.iter().map(|name| name.as_ptr()).collect()
        } else {
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(GraphicsError::InstanceCreationFailed)?;

        let debug_utils = if debug_mode {
            match Self::setup_debug_messenger(&entry, &instance) {
                Ok(messenger) => Some(messenger),
                Err(result) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(GraphicsError::driver("vkCreateDebugUtilsMessengerEXT")(result));
                }
            }
        } else {
            None
        };

        Ok(Self {
            debug_utils,
            instance,
            entry,
        })
    }

    fn available_layers(entry: &Entry) -> Result<Vec<String>> {
        let layers = unsafe { entry.enumerate_instance_layer_properties() }
            .map_err(GraphicsError::driver("vkEnumerateInstanceLayerProperties"))?;

        let names: Vec<String> = layers
            .iter()
            .filter_map(|layer| layer.layer_name_as_c_str().ok())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();

        log::debug!("Available layers: {:?}", names);
        Ok(names)
    }

    fn log_available_extensions(entry: &Entry) -> Result<()> {
        let extensions = unsafe { entry.enumerate_instance_extension_properties(None) }
            .map_err(GraphicsError::driver("vkEnumerateInstanceExtensionProperties"))?;

        for extension in &extensions {
            if let Ok(name) = extension.extension_name_as_c_str() {
                log::debug!("Available instance extension: {}", name.to_string_lossy());
            }
        }
        Ok(())
    }

    fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> std::result::Result<(debug_utils::Instance, vk::DebugUtilsMessengerEXT), vk::Result> {
        let loader = debug_utils::Instance::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None) }?;

        Ok((loader, messenger))
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug_utils.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Requested names that do not appear in `available`, in request order.
pub fn missing_names(available: &[String], requested: &[String]) -> Vec<String> {
    requested
        .iter()
        .filter(|name| !available.contains(name))
        .cloned()
        .collect()
}

pub(crate) fn c_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| GraphicsError::InvalidName(name.to_string()))
}

pub(crate) fn c_names(names: &[String]) -> Result<Vec<CString>> {
    names.iter().map(|name| c_name(name)).collect()
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = if p_callback_data.is_null() {
        None
    } else {
        unsafe { (*p_callback_data).message_as_c_str() }
    };
    let message = message.map(CStr::to_string_lossy).unwrap_or_default();

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message);
        }
        _ => {
            log::debug!("[Vulkan] {}", message);
        }
    }

    vk::FALSE
}
