//! Physical device description and logical device creation.

use crate::capabilities::{CapabilityIndices, QueueCapability, QueueFamily};
use crate::config::DeviceRequirements;
use crate::device::{bind_queue_purposes, LogicalDevice, PerPurpose, QueuePurpose};
use crate::error::{GpuError, Result};
use crate::features::{features_from_names, find_feature_matches};
use crate::matching::find_extension_matches;
use crate::resource::{GpuResource, ResourceKind};
use crate::util::fixed_str;
use ash::vk;
use ash::vk::Handle;
use std::collections::BTreeSet;
use std::ffi::CStr;

/// Priority of every queue created by this crate.
static QUEUE_PRIORITIES: [f32; 1] = [1.0];

/// A surface together with the loader used to query it.
#[derive(Clone, Copy)]
pub struct PresentationSurface<'a> {
    /// Surface extension function table.
    pub loader: &'a ash::khr::surface::Instance,
    /// Surface to present to.
    pub surface: vk::SurfaceKHR,
}

impl<'a> PresentationSurface<'a> {
    /// Pair a surface with its loader.
    pub fn new(loader: &'a ash::khr::surface::Instance, surface: vk::SurfaceKHR) -> Self {
        Self { loader, surface }
    }
}

/// Surface capabilities, formats and present modes a device offers for a surface.
#[derive(Debug, Clone)]
pub struct SwapChainSupportInfo {
    /// Raw surface capabilities.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Everything known about one physical device.
#[derive(Debug, Clone)]
pub struct PhysicalDeviceDescriptor {
    handle: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    features: vk::PhysicalDeviceFeatures,
    available_extensions: Vec<vk::ExtensionProperties>,
    queue_families: Vec<QueueFamily>,
    indices: CapabilityIndices,
}

impl PhysicalDeviceDescriptor {
    /// Query a physical device.
    ///
    /// # Safety
    /// The instance and physical device must be valid.
    pub unsafe fn query(instance: &ash::Instance, handle: vk::PhysicalDevice) -> Result<Self> {
        let properties = instance.get_physical_device_properties(handle);
        let features = instance.get_physical_device_features(handle);
        let extensions = instance.enumerate_device_extension_properties(handle)?;
        let families = instance.get_physical_device_queue_family_properties(handle);

        Ok(Self::from_parts(handle, properties, features, extensions, &families))
    }

    /// Build a descriptor from already-queried data.
    ///
    /// One [`QueueFamily`] is derived per entry of `families`, in order.
    pub fn from_parts(
        handle: vk::PhysicalDevice,
        properties: vk::PhysicalDeviceProperties,
        features: vk::PhysicalDeviceFeatures,
        available_extensions: Vec<vk::ExtensionProperties>,
        families: &[vk::QueueFamilyProperties],
    ) -> Self {
        let queue_families: Vec<QueueFamily> = families
            .iter()
            .zip(0u32..)
            .map(|(props, index)| QueueFamily::new(props, index))
            .collect();
        let indices = CapabilityIndices::scan(&queue_families);

        Self {
            handle,
            properties,
            features,
            available_extensions,
            queue_families,
            indices,
        }
    }

    /// Get the raw physical device handle.
    pub fn handle(&self) -> vk::PhysicalDevice {
        self.handle
    }

    /// Core device properties.
    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    /// Core features the device supports.
    pub fn features(&self) -> &vk::PhysicalDeviceFeatures {
        &self.features
    }

    /// Device extensions the driver reports.
    pub fn available_extensions(&self) -> &[vk::ExtensionProperties] {
        &self.available_extensions
    }

    /// Queue families in index order.
    pub fn queue_families(&self) -> &[QueueFamily] {
        &self.queue_families
    }

    /// First family index per capability.
    pub fn indices(&self) -> &CapabilityIndices {
        &self.indices
    }

    /// Index of the first family supporting `capability`.
    pub fn queue_index(&self, capability: QueueCapability) -> Option<u32> {
        self.indices.get(capability)
    }

    /// Device name as reported by the driver.
    pub fn name(&self) -> &str {
        fixed_str(&self.properties.device_name).unwrap_or("<unnamed device>")
    }

    /// Drop the handle; the descriptor is invalid afterwards.
    pub fn invalidate(&mut self) {
        self.handle = vk::PhysicalDevice::null();
    }

    /// Query swap-chain support for `surface`. Never cached: surface
    /// capabilities change with the window.
    ///
    /// # Safety
    /// The surface must be valid and created from the same instance.
    pub unsafe fn swap_chain_support(
        &self,
        surface: &PresentationSurface<'_>,
    ) -> Result<SwapChainSupportInfo> {
        ensure_surface(surface.surface)?;
        let capabilities = surface
            .loader
            .get_physical_device_surface_capabilities(self.handle, surface.surface)?;
        let formats = surface
            .loader
            .get_physical_device_surface_formats(self.handle, surface.surface)?;
        let present_modes = surface
            .loader
            .get_physical_device_surface_present_modes(self.handle, surface.surface)?;

        Ok(SwapChainSupportInfo {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// Index of the first family able to present to `surface`.
    ///
    /// # Safety
    /// The surface must be valid and created from the same instance.
    pub unsafe fn presentable_queue_index(
        &self,
        surface: &PresentationSurface<'_>,
    ) -> Result<Option<u32>> {
        ensure_surface(surface.surface)?;
        first_presentable(&self.queue_families, |index| {
            let supported = surface.loader.get_physical_device_surface_support(
                self.handle,
                index,
                surface.surface,
            )?;
            Ok(supported)
        })
    }

    /// Distinct families needed to serve every capability bit in `queues`.
    ///
    /// Bits the device has no family for are skipped.
    pub fn requested_queue_families(&self, queues: vk::QueueFlags) -> BTreeSet<u32> {
        [
            QueueCapability::Graphics,
            QueueCapability::Compute,
            QueueCapability::Transfer,
            QueueCapability::Protected,
            QueueCapability::SparseBinding,
        ]
        .into_iter()
        .filter(|capability| queues.contains(capability.flags()))
        .filter_map(|capability| self.indices.get(capability))
        .collect()
    }

    /// Requested families for `queues`, plus the family found by a
    /// presentation scan when one was run.
    ///
    /// A scan that found no presentable family fails with
    /// [`GpuError::PresentationUnsupported`]; a failed scan is passed through.
    pub fn resolve_queue_families(
        &self,
        queues: vk::QueueFlags,
        presentation_scan: Option<Result<Option<u32>>>,
    ) -> Result<(BTreeSet<u32>, Option<u32>)> {
        let mut families = self.requested_queue_families(queues);
        let presentation = match presentation_scan.transpose()? {
            Some(found) => {
                let index = found.ok_or(GpuError::PresentationUnsupported)?;
                families.insert(index);
                Some(index)
            }
            None => None,
        };
        Ok((families, presentation))
    }

    /// Create a logical device with one queue per distinct family needed for
    /// `queues`, plus a presentation family when `surface` is given.
    ///
    /// # Safety
    /// The instance must be the one this device was enumerated from.
    pub unsafe fn create_logical_device(
        &self,
        instance: &ash::Instance,
        queues: vk::QueueFlags,
        extensions: &[&CStr],
        features: &vk::PhysicalDeviceFeatures,
        surface: Option<&PresentationSurface<'_>>,
    ) -> Result<LogicalDevice> {
        let presentation_scan = surface.map(|surface| self.presentable_queue_index(surface));
        let (families, presentation) = self.resolve_queue_families(queues, presentation_scan)?;

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&QUEUE_PRIORITIES)
            })
            .collect();

        let extension_names: Vec<*const std::ffi::c_char> =
            extensions.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(features);

        self.create_logical_device_with(instance, &create_info, presentation)
    }

    /// Create a logical device from a caller-built create info and retrieve
    /// one queue per purpose whose family was requested.
    ///
    /// # Safety
    /// The instance must be the one this device was enumerated from, and
    /// every pointer in `create_info` must be valid.
    pub unsafe fn create_logical_device_with(
        &self,
        instance: &ash::Instance,
        create_info: &vk::DeviceCreateInfo<'_>,
        presentation: Option<u32>,
    ) -> Result<LogicalDevice> {
        let device = instance
            .create_device(self.handle, create_info, None)
            .map_err(GpuError::DeviceCreation)?;

        let queue_infos: &[vk::DeviceQueueCreateInfo<'_>] =
            if create_info.p_queue_create_infos.is_null() {
                &[]
            } else {
                std::slice::from_raw_parts(
                    create_info.p_queue_create_infos,
                    create_info.queue_create_info_count as usize,
                )
            };

        let mut targets = PerPurpose::default();
        targets.set(QueuePurpose::Graphics, self.indices.graphics());
        targets.set(QueuePurpose::Compute, self.indices.compute());
        targets.set(QueuePurpose::Transfer, self.indices.transfer());
        targets.set(QueuePurpose::Presentation, presentation);
        targets.set(QueuePurpose::Protected, self.indices.protected());
        targets.set(QueuePurpose::SparseBinding, self.indices.sparse_binding());

        let families = bind_queue_purposes(
            queue_infos.iter().map(|info| info.queue_family_index),
            &targets,
        );
        let queues = families.map(|_, family| device.get_device_queue(family, 0));

        tracing::info!(
            "Created logical device on {} with {} queue families",
            self.name(),
            queue_infos.len()
        );

        Ok(LogicalDevice::new(device, self.handle, families, queues))
    }

    /// Create a device with graphics, compute and transfer queues.
    ///
    /// # Safety
    /// The instance must be the one this device was enumerated from.
    pub unsafe fn create_core_device(&self, instance: &ash::Instance) -> Result<LogicalDevice> {
        self.create_logical_device(
            instance,
            QueueCapability::Core.flags(),
            &[],
            &vk::PhysicalDeviceFeatures::default(),
            None,
        )
    }

    /// Create a core device that can also present to `surface`.
    ///
    /// # Safety
    /// The instance must be the one this device was enumerated from.
    pub unsafe fn create_presentable_core_device(
        &self,
        instance: &ash::Instance,
        surface: &PresentationSurface<'_>,
        extensions: &[&CStr],
        features: &vk::PhysicalDeviceFeatures,
    ) -> Result<LogicalDevice> {
        ensure_surface(surface.surface)?;
        self.create_logical_device(
            instance,
            QueueCapability::Core.flags(),
            extensions,
            features,
            Some(surface),
        )
    }

    /// Negotiate extensions and features from `requirements` against this
    /// device, then create the device.
    ///
    /// # Safety
    /// The instance must be the one this device was enumerated from.
    pub unsafe fn create_device_for(
        &self,
        instance: &ash::Instance,
        requirements: &DeviceRequirements,
        surface: Option<&PresentationSurface<'_>>,
    ) -> Result<LogicalDevice> {
        let extensions = find_extension_matches(
            &self.available_extensions,
            &requirements.required_extensions,
            &requirements.requested_extensions,
        )?;
        let features = find_feature_matches(
            &self.features,
            &features_from_names(&requirements.required_features)?,
            &features_from_names(&requirements.requested_features)?,
        )?;

        tracing::debug!(extensions = ?extensions.enabled, "Negotiated device extensions");

        let names = extensions.to_cstrings()?;
        let name_refs: Vec<&CStr> = names.iter().map(|name| name.as_c_str()).collect();

        self.create_logical_device(instance, requirements.queues(), &name_refs, &features, surface)
    }
}

impl GpuResource for PhysicalDeviceDescriptor {
    type Raw = vk::PhysicalDevice;

    const KIND: ResourceKind = ResourceKind::PhysicalDevice;

    fn is_valid(&self) -> bool {
        !self.handle.is_null()
    }

    fn get(&self) -> vk::PhysicalDevice {
        self.handle
    }
}

/// Reject a null surface before it reaches the driver.
pub fn ensure_surface(surface: vk::SurfaceKHR) -> Result<vk::SurfaceKHR> {
    if surface.is_null() {
        Err(GpuError::InvalidSurface)
    } else {
        Ok(surface)
    }
}

/// First family, in index order, for which `supports` returns true.
pub fn first_presentable<F>(families: &[QueueFamily], mut supports: F) -> Result<Option<u32>>
where
    F: FnMut(u32) -> Result<bool>,
{
    for family in families {
        if supports(family.index)? {
            return Ok(Some(family.index));
        }
    }
    Ok(None)
}
