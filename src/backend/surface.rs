// Window surface - the presentation target created from the native window

use super::Instance;
use crate::error::Result;
use crate::window::WindowSystem;
use ash::{khr::surface, vk};

pub struct Surface {
    pub loader: surface::Instance,
    pub surface: vk::SurfaceKHR,
}

impl Surface {
    pub fn new(instance: &Instance, window: &dyn WindowSystem) -> Result<Self> {
        let surface = window.create_surface(&instance.entry, &instance.instance)?;
        let loader = surface::Instance::new(&instance.entry, &instance.instance);
        log::info!("Created window surface");
        Ok(Self { loader, surface })
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_surface(self.surface, None) };
    }
}
