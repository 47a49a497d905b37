//! Caller-supplied negotiation inputs.
//!
//! Both structs deserialize with `serde`, so they can live in whatever config
//! file the application already parses, and both offer builder-style setters
//! for code-side construction.

use ash::vk;
use serde::{Deserialize, Serialize};

/// Standard Khronos validation layer.
pub const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Which queue capabilities a logical device should serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSelection {
    /// Create a graphics queue.
    pub graphics: bool,
    /// Create a compute queue.
    pub compute: bool,
    /// Create a transfer queue.
    pub transfer: bool,
    /// Create a protected-memory queue.
    pub protected: bool,
    /// Create a sparse binding queue.
    pub sparse_binding: bool,
}

impl Default for QueueSelection {
    fn default() -> Self {
        Self {
            graphics: true,
            compute: true,
            transfer: true,
            protected: false,
            sparse_binding: false,
        }
    }
}

impl QueueSelection {
    /// The selection as native queue flags.
    pub fn flags(&self) -> vk::QueueFlags {
        [
            (self.graphics, vk::QueueFlags::GRAPHICS),
            (self.compute, vk::QueueFlags::COMPUTE),
            (self.transfer, vk::QueueFlags::TRANSFER),
            (self.protected, vk::QueueFlags::PROTECTED),
            (self.sparse_binding, vk::QueueFlags::SPARSE_BINDING),
        ]
        .into_iter()
        .filter(|(wanted, _)| *wanted)
        .fold(vk::QueueFlags::empty(), |acc, (_, flag)| acc | flag)
    }
}

/// Extensions, features and queues wanted from a logical device.
///
/// Feature names use the Vulkan spelling of `VkPhysicalDeviceFeatures`
/// members, e.g. `samplerAnisotropy`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceRequirements {
    /// Queue capabilities to create queues for.
    pub queues: QueueSelection,
    /// Extensions that must be present.
    pub required_extensions: Vec<String>,
    /// Extensions enabled only when available.
    pub requested_extensions: Vec<String>,
    /// Feature names, as in `FEATURE_FLAGS`, that must be supported.
    pub required_features: Vec<String>,
    /// Feature names enabled when supported.
    pub requested_features: Vec<String>,
}

impl DeviceRequirements {
    /// Create empty requirements serving graphics, compute and transfer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue flags to create queues for.
    pub fn queues(&self) -> vk::QueueFlags {
        self.queues.flags()
    }

    /// Replace the queue selection.
    pub fn with_queues(mut self, queues: QueueSelection) -> Self {
        self.queues = queues;
        self
    }

    /// Add an extension the device cannot be created without.
    pub fn require_extension(mut self, name: impl Into<String>) -> Self {
        self.required_extensions.push(name.into());
        self
    }

    /// Add an extension that is skipped with a warning when missing.
    pub fn request_extension(mut self, name: impl Into<String>) -> Self {
        self.requested_extensions.push(name.into());
        self
    }

    /// Add a feature the device must support.
    pub fn require_feature(mut self, name: impl Into<String>) -> Self {
        self.required_features.push(name.into());
        self
    }

    /// Add a feature enabled only when supported.
    pub fn request_feature(mut self, name: impl Into<String>) -> Self {
        self.requested_features.push(name.into());
        self
    }
}

/// Application info, extensions and layers wanted from an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceRequirements {
    /// Application name reported to the driver.
    pub app_name: String,
    /// Engine name reported to the driver.
    pub engine_name: String,
    /// Vulkan API version as (major, minor).
    pub api_version: (u32, u32),
    /// Instance extensions that must be present.
    pub required_extensions: Vec<String>,
    /// Instance extensions enabled only when available.
    pub requested_extensions: Vec<String>,
    /// Layers that must be present.
    pub required_layers: Vec<String>,
    /// Layers enabled only when available.
    pub requested_layers: Vec<String>,
}

impl Default for InstanceRequirements {
    fn default() -> Self {
        let mut requirements = Self {
            app_name: "vkbridge".to_string(),
            engine_name: "vkbridge".to_string(),
            api_version: (1, 3),
            required_extensions: Vec::new(),
            requested_extensions: Vec::new(),
            required_layers: Vec::new(),
            requested_layers: Vec::new(),
        };
        if cfg!(debug_assertions) {
            requirements.requested_layers.push(VALIDATION_LAYER.to_string());
        }
        requirements
    }
}

impl InstanceRequirements {
    /// Create a new set of requirements.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Set the API version.
    pub fn api_version(mut self, major: u32, minor: u32) -> Self {
        self.api_version = (major, minor);
        self
    }

    /// Enable or disable the validation layer. It is only requested, so a
    /// missing layer logs a warning instead of failing.
    pub fn validation(mut self, enable: bool) -> Self {
        self.requested_layers.retain(|layer| layer != VALIDATION_LAYER);
        if enable {
            self.requested_layers.push(VALIDATION_LAYER.to_string());
        }
        self
    }

    /// Add an instance extension that must be present.
    pub fn require_extension(mut self, name: impl Into<String>) -> Self {
        self.required_extensions.push(name.into());
        self
    }

    /// Add an instance extension enabled only when available.
    pub fn request_extension(mut self, name: impl Into<String>) -> Self {
        self.requested_extensions.push(name.into());
        self
    }

    /// Add a layer that must be present.
    pub fn require_layer(mut self, name: impl Into<String>) -> Self {
        self.required_layers.push(name.into());
        self
    }

    /// Packed `VK_MAKE_API_VERSION` value.
    pub fn packed_api_version(&self) -> u32 {
        vk::make_api_version(0, self.api_version.0, self.api_version.1, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_queues_are_core() {
        assert_eq!(
            DeviceRequirements::new().queues(),
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER
        );
    }

    #[test]
    fn requirements_deserialize_from_toml() {
        let requirements: DeviceRequirements = toml::from_str(
            r#"
            required_extensions = ["VK_KHR_swapchain"]
            requested_features = ["samplerAnisotropy"]

            [queues]
            graphics = false
            sparse_binding = true
            "#,
        )
        .unwrap();

        assert_eq!(requirements.required_extensions, vec!["VK_KHR_swapchain"]);
        assert!(requirements.requested_extensions.is_empty());
        assert_eq!(requirements.requested_features, vec!["samplerAnisotropy"]);
        assert_eq!(
            requirements.queues(),
            vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER | vk::QueueFlags::SPARSE_BINDING
        );
    }

    #[test]
    fn validation_toggle_does_not_duplicate_layer() {
        let requirements = InstanceRequirements::new().validation(true).validation(true);
        let count = requirements
            .requested_layers
            .iter()
            .filter(|l| *l == VALIDATION_LAYER)
            .count();
        assert_eq!(count, 1);

        let requirements = requirements.validation(false);
        assert!(requirements.requested_layers.is_empty());
    }

    #[test]
    fn builder_collects_names() {
        let requirements = DeviceRequirements::new()
            .require_extension("VK_KHR_swapchain")
            .request_feature("wideLines")
            .require_feature("shaderInt64");

        assert_eq!(requirements.required_extensions, vec!["VK_KHR_swapchain"]);
        assert_eq!(requirements.requested_features, vec!["wideLines"]);
        assert_eq!(requirements.required_features, vec!["shaderInt64"]);
    }
}
