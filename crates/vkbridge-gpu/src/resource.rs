//! Common validity interface for wrapped Vulkan resources.
//!
//! Every wrapper exposes whether it currently holds a usable object, the raw
//! value it wraps, and which kind of resource it is. Resource kinds are a closed
//! enum; raw Vulkan handles report their `vk::ObjectType`.

use ash::vk;

/// Kind of a wrapped resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A raw Vulkan handle of the given object type.
    Handle(vk::ObjectType),
    /// [`PhysicalDeviceDescriptor`](crate::PhysicalDeviceDescriptor).
    PhysicalDevice,
    /// [`LogicalDevice`](crate::LogicalDevice).
    LogicalDevice,
    /// [`DeviceHandlePair`](crate::DeviceHandlePair).
    DeviceHandlePair,
    /// [`DeviceBundle`](crate::DeviceBundle).
    DeviceBundle,
    /// [`ComputePipeline`](crate::ComputePipeline).
    ComputePipeline,
    /// [`RenderPipeline`](crate::RenderPipeline).
    RenderPipeline,
}

/// A resource that may or may not be initialized.
pub trait GpuResource {
    /// The raw value handed to Vulkan calls.
    type Raw;

    /// Kind tag for this resource type.
    const KIND: ResourceKind;

    /// Whether the resource holds a usable object.
    fn is_valid(&self) -> bool;

    /// The raw value.
    fn get(&self) -> Self::Raw;

    /// Kind tag of this resource.
    fn kind(&self) -> ResourceKind {
        Self::KIND
    }

    /// Whether this resource is of the given kind.
    fn provides(&self, kind: ResourceKind) -> bool {
        self.kind() == kind
    }
}

// Raw handles are nullable; null means uninitialized.
impl<H: vk::Handle + Copy> GpuResource for H {
    type Raw = H;

    const KIND: ResourceKind = ResourceKind::Handle(H::TYPE);

    fn is_valid(&self) -> bool {
        !self.is_null()
    }

    fn get(&self) -> H {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn null_handles_are_invalid() {
        assert!(!vk::Pipeline::null().is_valid());
        assert!(vk::Pipeline::from_raw(7).is_valid());
    }

    #[test]
    fn handle_kind_reports_object_type() {
        let layout = vk::PipelineLayout::from_raw(3);
        assert_eq!(
            layout.kind(),
            ResourceKind::Handle(vk::ObjectType::PIPELINE_LAYOUT)
        );
        assert!(!layout.provides(ResourceKind::Handle(vk::ObjectType::PIPELINE)));
    }
}
