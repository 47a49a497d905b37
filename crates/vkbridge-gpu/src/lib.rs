//! Thin convenience layer over Vulkan.
//!
//! This crate provides:
//! - Physical device description, scoring and selection
//! - Queue family capability detection and logical device creation
//! - Extension, layer and feature negotiation
//! - One-shot command submission
//! - Compute and render pipeline construction
//!
//! Native `ash::vk` types pass through the API unchanged.

pub mod capabilities;
pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod features;
pub mod format;
pub mod instance;
pub mod matching;
pub mod physical;
pub mod pipeline;
pub mod resource;
pub mod shader;
pub mod util;

pub use capabilities::{CapabilityIndices, QueueCapability, QueueFamily};
pub use command::{CommandDevice, QueueClosure, SubmitSync};
pub use config::{DeviceRequirements, InstanceRequirements, QueueSelection};
pub use device::{DeviceBundle, DeviceHandlePair, LogicalDevice, PerPurpose, QueuePurpose};
pub use error::{GpuError, NameKind, Result};
pub use features::{feature_names, features_from_names, find_feature_matches, FEATURE_FLAGS};
pub use format::{select_depth_format, select_depth_format_with};
pub use instance::{create_instance, score_device, select_physical_device, ScoredDevice};
pub use matching::{find_extension_matches, find_layer_matches, NameMatches, NamedProperty};
pub use physical::{PhysicalDeviceDescriptor, PresentationSurface, SwapChainSupportInfo};
pub use pipeline::{
    ComputeConstructionSet, ComputePipeline, ComputePipelineBuilder, ComputeStage, LayoutInfo,
    RenderConstructionSet, RenderPipeline, RenderPipelineBuilder, RenderTarget, ShaderStage,
    SpecializationData,
};
pub use resource::{GpuResource, ResourceKind};
pub use shader::{create_shader_module, load_shader_module};
