// Device selector - enumerate physical devices and pick one
//
// Suitability is a fixed predicate (see `DeviceCandidate::is_suitable`).
// Which suitable device wins is up to a `SelectionStrategy`.

use super::probe::{DeviceCandidate, DeviceQuery, ResolvedFamilies, SurfaceSupport};
use crate::config::DeviceSelection;
use crate::error::{GraphicsError, Result};
use ash::vk;
use std::cmp::Ordering;

/// Ranking comparator over suitable devices. `Greater` means `a` is better.
/// Ties keep enumeration order.
pub trait SelectionStrategy {
    fn compare(&self, a: &DeviceCandidate, b: &DeviceCandidate) -> Ordering;
}

/// First suitable device in driver order. Deterministic, not performance-aware.
pub struct FirstSuitable;

impl SelectionStrategy for FirstSuitable {
    fn compare(&self, _a: &DeviceCandidate, _b: &DeviceCandidate) -> Ordering {
        Ordering::Equal
    }
}

/// Discrete over integrated over everything else, then more device-local memory.
pub struct PreferDiscrete;

impl PreferDiscrete {
    fn type_score(device_type: vk::PhysicalDeviceType) -> u32 {
        match device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
            vk::PhysicalDeviceType::VIRTUAL_GPU => 10,
            vk::PhysicalDeviceType::CPU => 1,
            _ => 0,
        }
    }
}

impl SelectionStrategy for PreferDiscrete {
    fn compare(&self, a: &DeviceCandidate, b: &DeviceCandidate) -> Ordering {
        Self::type_score(a.info.device_type)
            .cmp(&Self::type_score(b.info.device_type))
            .then(a.info.local_memory.cmp(&b.info.local_memory))
    }
}

impl DeviceSelection {
    pub fn strategy(self) -> Box<dyn SelectionStrategy> {
        match self {
            DeviceSelection::FirstSuitable => Box::new(FirstSuitable),
            DeviceSelection::PreferDiscrete => Box::new(PreferDiscrete),
        }
    }
}

/// The winning device with its resolved queue families
#[derive(Debug, Clone)]
pub struct SelectedDevice {
    pub device: vk::PhysicalDevice,
    pub name: String,
    pub families: ResolvedFamilies,
    /// Surface support seen during selection. Swapchain creation queries
    /// again; this copy is for logging only.
    pub surface: SurfaceSupport,
}

pub fn select_physical_device<Q: DeviceQuery + ?Sized>(
    query: &Q,
    required_extensions: &[String],
    strategy: &dyn SelectionStrategy,
) -> Result<SelectedDevice> {
    let devices = query.physical_devices()?;
    if devices.is_empty() {
        return Err(GraphicsError::NoGpuFound);
    }
    log::info!("Found {} physical device(s)", devices.len());

    let mut best: Option<DeviceCandidate> = None;

    for device in &devices {
        let candidate = DeviceCandidate::probe(query, *device, required_extensions)?;

        if !candidate.is_suitable() {
            log::info!(
                "Skipping {}: {}",
                candidate.info.name,
                candidate.rejection_reason().unwrap_or_default()
            );
            continue;
        }
        log::debug!(
            "Suitable: {} ({:?}, {} MiB local)",
            candidate.info.name,
            candidate.info.device_type,
            candidate.info.local_memory >> 20
        );

        let better = match &best {
            None => true,
            Some(current) => strategy.compare(&candidate, current) == Ordering::Greater,
        };
        if better {
            best = Some(candidate);
        }
    }

    let best = best.ok_or(GraphicsError::NoSuitableGpu {
        candidates: devices.len(),
    })?;

    let (Some(families), Some(surface)) = (best.families.resolved(), best.surface) else {
        // is_suitable() guarantees both; keep the error path instead of panicking.
        return Err(GraphicsError::NoSuitableGpu {
            candidates: devices.len(),
        });
    };

    log::info!(
        "Selected GPU: {} (graphics family {}, present family {})",
        best.info.name,
        families.graphics,
        families.present
    );

    Ok(SelectedDevice {
        device: best.device,
        name: best.info.name,
        families,
        surface,
    })
}
