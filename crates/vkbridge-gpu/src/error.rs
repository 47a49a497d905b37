//! GPU error types.

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

/// Which kind of named property a name lookup was performed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    /// Instance or device extension.
    Extension,
    /// Instance layer.
    Layer,
}

impl std::fmt::Display for NameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extension => f.write_str("extension"),
            Self::Layer => f.write_str("layer"),
        }
    }
}

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// The Vulkan loader could not be loaded.
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// `vkCreateDevice` did not report success.
    #[error("Logical device creation failed: {0}")]
    DeviceCreation(vk::Result),

    /// A required feature is not available on the device.
    #[error("Required feature unavailable: {0}")]
    RequiredFeatureUnavailable(&'static str),

    /// A feature name does not match any `VkPhysicalDeviceFeatures` member.
    #[error("Unknown device feature: {0}")]
    UnknownFeature(String),

    /// A required extension or layer is not available.
    #[error("Required {kind} unavailable: {name}")]
    RequiredNameUnavailable {
        /// Extension or layer.
        kind: NameKind,
        /// The missing name.
        name: String,
    },

    /// A surface was supplied but no queue family can present to it.
    #[error("No queue family supports presentation to the given surface")]
    PresentationUnsupported,

    /// A null surface handle was passed where presentation is required.
    #[error("Invalid surface handle")]
    InvalidSurface,

    /// Shader file could not be read.
    #[error("Failed to read shader file {}: {source}", path.display())]
    ShaderLoad {
        /// Path of the shader file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Shader bytecode is not valid SPIR-V.
    #[error("Invalid SPIR-V bytecode: {0}")]
    InvalidSpirv(#[source] std::io::Error),

    /// `vkCreateShaderModule` failed.
    #[error("Shader module creation failed: {0}")]
    ShaderModule(vk::Result),

    /// Pipeline creation failed.
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// None of the known depth formats is usable.
    #[error("No compatible depth format found")]
    NoDepthFormat,

    /// A name contained an interior nul byte.
    #[error("Invalid name: {0}")]
    InvalidName(#[from] std::ffi::NulError),

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_name_message_names_kind_and_name() {
        let err = GpuError::RequiredNameUnavailable {
            kind: NameKind::Layer,
            name: "VK_LAYER_KHRONOS_validation".to_string(),
        };
        insta::assert_snapshot!(
            err.to_string(),
            @"Required layer unavailable: VK_LAYER_KHRONOS_validation"
        );
    }

    #[test]
    fn required_feature_message_names_flag() {
        let err = GpuError::RequiredFeatureUnavailable("wideLines");
        assert_eq!(err.to_string(), "Required feature unavailable: wideLines");
    }
}
