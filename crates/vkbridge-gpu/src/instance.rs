//! Instance creation and physical device selection.

use crate::config::InstanceRequirements;
use crate::error::{GpuError, Result};
use crate::matching::{as_ptrs, find_extension_matches, find_layer_matches};
use crate::util::fixed_str;
use ash::vk;
use std::ffi::{CStr, CString};

/// Surface extensions needed to present on the current platform.
///
/// Pass them as required instance extensions when a surface will be created.
pub fn platform_surface_extensions() -> Vec<&'static CStr> {
    vec![
        ash::khr::surface::NAME,
        #[cfg(target_os = "windows")]
        ash::khr::win32_surface::NAME,
        #[cfg(target_os = "linux")]
        ash::khr::xlib_surface::NAME,
        #[cfg(target_os = "linux")]
        ash::khr::wayland_surface::NAME,
        #[cfg(target_os = "macos")]
        ash::ext::metal_surface::NAME,
        #[cfg(target_os = "macos")]
        ash::khr::portability_enumeration::NAME,
    ]
}

/// Create a Vulkan instance with the negotiated layers and extensions.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    requirements: &InstanceRequirements,
) -> Result<ash::Instance> {
    let app_name = CString::new(requirements.app_name.as_str())?;
    let engine_name = CString::new(requirements.engine_name.as_str())?;

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(&engine_name)
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(requirements.packed_api_version());

    let available_layers = entry.enumerate_instance_layer_properties()?;
    let layers = find_layer_matches(
        &available_layers,
        &requirements.required_layers,
        &requirements.requested_layers,
    )?;

    let available_extensions = entry.enumerate_instance_extension_properties(None)?;
    let extensions = find_extension_matches(
        &available_extensions,
        &requirements.required_extensions,
        &requirements.requested_extensions,
    )?;

    let layer_names = layers.to_cstrings()?;
    let extension_names = extensions.to_cstrings()?;
    let layer_ptrs = as_ptrs(&layer_names);
    let extension_ptrs = as_ptrs(&extension_names);

    // Required for MoltenVK
    let portability = ash::khr::portability_enumeration::NAME.to_str().ok();
    let create_flags = if extensions
        .enabled
        .iter()
        .any(|name| Some(name.as_str()) == portability)
    {
        vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
    } else {
        vk::InstanceCreateFlags::empty()
    };

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_ptrs)
        .enabled_layer_names(&layer_ptrs)
        .flags(create_flags);

    let instance = entry.create_instance(&create_info, None)?;

    tracing::info!(
        layers = ?layers.enabled,
        extensions = ?extensions.enabled,
        "Created Vulkan instance for {}",
        requirements.app_name
    );

    Ok(instance)
}

/// Load the Vulkan library and create an instance.
///
/// # Safety
/// See [`ash::Entry::load`].
pub unsafe fn load_and_create_instance(
    requirements: &InstanceRequirements,
) -> Result<(ash::Entry, ash::Instance)> {
    let entry = ash::Entry::load().map_err(|e| GpuError::Loading(e.to_string()))?;
    let instance = create_instance(&entry, requirements)?;
    Ok((entry, instance))
}

/// Weight of a device type. Higher is preferred.
pub fn device_type_weight(device_type: vk::PhysicalDeviceType) -> i32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 4000,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 3000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 2000,
        vk::PhysicalDeviceType::CPU => 1000,
        _ => 0,
    }
}

/// Whether the families with at least one queue together cover `mask`.
pub fn covers_queue_flags(families: &[vk::QueueFamilyProperties], mask: vk::QueueFlags) -> bool {
    let combined = families
        .iter()
        .filter(|family| family.queue_count > 0)
        .fold(vk::QueueFlags::empty(), |acc, family| acc | family.queue_flags);
    combined & mask == mask
}

/// Score a physical device for selection.
///
/// Devices that cannot serve both graphics and compute score `-1`.
pub fn score_device(
    properties: &vk::PhysicalDeviceProperties,
    families: &[vk::QueueFamilyProperties],
) -> i32 {
    if !covers_queue_flags(families, vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE) {
        return -1;
    }
    device_type_weight(properties.device_type)
}

/// Index of the best non-negative score. Ties keep the first one seen.
pub fn select_best(scores: impl IntoIterator<Item = i32>) -> Option<usize> {
    let mut best: Option<(usize, i32)> = None;
    for (index, score) in scores.into_iter().enumerate() {
        if score < 0 {
            continue;
        }
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((index, score));
        }
    }
    best.map(|(index, _)| index)
}

/// A physical device with the name and score it was ranked by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredDevice {
    /// Raw physical device handle.
    pub handle: vk::PhysicalDevice,
    /// Device name as reported by the driver.
    pub name: String,
    /// Result of [`score_device`].
    pub score: i32,
}

/// Pick the best of `candidates` and log which device won.
pub fn select_scored(candidates: &[ScoredDevice]) -> Option<&ScoredDevice> {
    let selected = select_best(candidates.iter().map(|candidate| candidate.score))
        .map(|index| &candidates[index]);
    match selected {
        Some(candidate) => tracing::info!("Selected physical device {}", candidate.name),
        None => tracing::warn!("No physical device supports graphics and compute"),
    }
    selected
}

/// Select the best physical device among `devices`.
///
/// Returns `None` when no candidate supports graphics and compute.
///
/// # Safety
/// The instance must be valid and `devices` enumerated from it.
pub unsafe fn select_physical_device(
    instance: &ash::Instance,
    devices: &[vk::PhysicalDevice],
) -> Option<vk::PhysicalDevice> {
    let candidates: Vec<ScoredDevice> = devices
        .iter()
        .map(|&handle| {
            let properties = instance.get_physical_device_properties(handle);
            let families = instance.get_physical_device_queue_family_properties(handle);
            let name = fixed_str(&properties.device_name).unwrap_or("<unnamed device>");
            let score = score_device(&properties, &families);
            tracing::debug!("Physical device {} scored {}", name, score);
            ScoredDevice {
                handle,
                name: name.to_owned(),
                score,
            }
        })
        .collect();

    select_scored(&candidates).map(|candidate| candidate.handle)
}

/// Enumerate the instance's physical devices and select the best.
///
/// # Safety
/// The instance must be valid.
pub unsafe fn select_enumerated_device(
    instance: &ash::Instance,
) -> Result<Option<vk::PhysicalDevice>> {
    let devices = instance.enumerate_physical_devices()?;
    Ok(select_physical_device(instance, &devices))
}
