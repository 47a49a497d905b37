//! Logical device handles and queue binding.

use crate::physical::PhysicalDeviceDescriptor;
use crate::resource::{GpuResource, ResourceKind};
use ash::vk;
use ash::vk::Handle;

/// Purpose a device queue is retrieved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueuePurpose {
    Graphics,
    Compute,
    Transfer,
    Presentation,
    Protected,
    SparseBinding,
}

impl QueuePurpose {
    /// Binding order. When several purposes resolve to the same family they
    /// are considered in this order.
    pub const ALL: [Self; 6] = [
        Self::Graphics,
        Self::Compute,
        Self::Transfer,
        Self::Presentation,
        Self::Protected,
        Self::SparseBinding,
    ];

    const fn slot(self) -> usize {
        match self {
            Self::Graphics => 0,
            Self::Compute => 1,
            Self::Transfer => 2,
            Self::Presentation => 3,
            Self::Protected => 4,
            Self::SparseBinding => 5,
        }
    }
}

/// One optional value per [`QueuePurpose`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerPurpose<T> {
    slots: [Option<T>; 6],
}

impl<T> Default for PerPurpose<T> {
    fn default() -> Self {
        Self {
            slots: [None, None, None, None, None, None],
        }
    }
}

impl<T: Copy> PerPurpose<T> {
    /// Value bound for `purpose`.
    pub fn get(&self, purpose: QueuePurpose) -> Option<T> {
        self.slots[purpose.slot()]
    }

    /// Bind `purpose` to `value`, or unbind it with `None`.
    pub fn set(&mut self, purpose: QueuePurpose, value: Option<T>) {
        self.slots[purpose.slot()] = value;
    }

    /// Map every bound slot through `f`.
    pub fn map<U>(&self, mut f: impl FnMut(QueuePurpose, T) -> U) -> PerPurpose<U> {
        let mut out = PerPurpose::default();
        for purpose in QueuePurpose::ALL {
            out.slots[purpose.slot()] = self.get(purpose).map(|value| f(purpose, value));
        }
        out
    }
}

/// Decide which requested family each purpose retrieves its queue from.
///
/// `requested` is the family of each queue-create-info entry, in the order
/// they were passed to device creation. `targets` is the family each purpose
/// wants. A purpose binds on the first entry whose family equals its target;
/// purposes whose target was never requested stay unbound.
pub fn bind_queue_purposes(
    requested: impl IntoIterator<Item = u32>,
    targets: &PerPurpose<u32>,
) -> PerPurpose<u32> {
    let mut bound = PerPurpose::default();
    for family in requested {
        for purpose in QueuePurpose::ALL {
            if bound.get(purpose).is_none() && targets.get(purpose) == Some(family) {
                bound.set(purpose, Some(family));
            }
        }
    }
    bound
}

/// A logical device together with the queues retrieved at creation.
///
/// Queues belong to the device and become invalid once it is destroyed.
pub struct LogicalDevice {
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    queue_families: PerPurpose<u32>,
    queues: PerPurpose<vk::Queue>,
}

impl LogicalDevice {
    pub(crate) fn new(
        device: ash::Device,
        physical_device: vk::PhysicalDevice,
        queue_families: PerPurpose<u32>,
        queues: PerPurpose<vk::Queue>,
    ) -> Self {
        Self {
            device,
            physical_device,
            queue_families,
            queues,
        }
    }

    /// Get the device function table.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the raw device handle.
    pub fn handle(&self) -> vk::Device {
        self.device.handle()
    }

    /// Get the physical device this device was created from.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Queue retrieved for `purpose`, if one was requested.
    pub fn queue(&self, purpose: QueuePurpose) -> Option<vk::Queue> {
        self.queues.get(purpose)
    }

    /// Family the queue for `purpose` came from.
    pub fn queue_family(&self, purpose: QueuePurpose) -> Option<u32> {
        self.queue_families.get(purpose)
    }

    /// Graphics queue, if requested.
    pub fn graphics_queue(&self) -> Option<vk::Queue> {
        self.queue(QueuePurpose::Graphics)
    }

    /// Compute queue, if requested.
    pub fn compute_queue(&self) -> Option<vk::Queue> {
        self.queue(QueuePurpose::Compute)
    }

    /// Transfer queue, if requested.
    pub fn transfer_queue(&self) -> Option<vk::Queue> {
        self.queue(QueuePurpose::Transfer)
    }

    /// Queue able to present to the surface the device was created for.
    pub fn presentation_queue(&self) -> Option<vk::Queue> {
        self.queue(QueuePurpose::Presentation)
    }

    /// Protected-memory queue, if requested.
    pub fn protected_queue(&self) -> Option<vk::Queue> {
        self.queue(QueuePurpose::Protected)
    }

    /// Sparse binding queue, if requested.
    pub fn sparse_binding_queue(&self) -> Option<vk::Queue> {
        self.queue(QueuePurpose::SparseBinding)
    }

    /// The (device, physical device) key for this device.
    pub fn handle_pair(&self) -> DeviceHandlePair {
        DeviceHandlePair::new(self.handle(), self.physical_device)
    }

    /// Destroy the device.
    ///
    /// # Safety
    /// All objects created from the device must already be destroyed and no
    /// queue may be in use.
    pub unsafe fn destroy(&self) {
        self.device.destroy_device(None);
    }
}

impl GpuResource for LogicalDevice {
    type Raw = vk::Device;

    const KIND: ResourceKind = ResourceKind::LogicalDevice;

    fn is_valid(&self) -> bool {
        !self.handle().is_null()
    }

    fn get(&self) -> vk::Device {
        self.handle()
    }
}

/// Non-owning (device, physical device) pair used as a lookup key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DeviceHandlePair {
    /// Logical device handle.
    pub device: vk::Device,
    /// Physical device the logical device was opened on.
    pub physical_device: vk::PhysicalDevice,
}

impl DeviceHandlePair {
    /// Pair two raw handles.
    pub fn new(device: vk::Device, physical_device: vk::PhysicalDevice) -> Self {
        Self {
            device,
            physical_device,
        }
    }
}

impl GpuResource for DeviceHandlePair {
    type Raw = Self;

    const KIND: ResourceKind = ResourceKind::DeviceHandlePair;

    fn is_valid(&self) -> bool {
        !self.device.is_null() && !self.physical_device.is_null()
    }

    fn get(&self) -> Self {
        *self
    }
}

impl From<DeviceHandlePair> for vk::Device {
    fn from(pair: DeviceHandlePair) -> Self {
        pair.device
    }
}

impl From<DeviceHandlePair> for vk::PhysicalDevice {
    fn from(pair: DeviceHandlePair) -> Self {
        pair.physical_device
    }
}

/// A logical device and the physical device it was opened on.
pub struct DeviceBundle {
    /// The opened device and its queues.
    pub logical: LogicalDevice,
    /// Description of the device it was opened on.
    pub physical: PhysicalDeviceDescriptor,
}

impl DeviceBundle {
    pub fn handle_pair(&self) -> DeviceHandlePair {
        DeviceHandlePair::new(self.logical.handle(), self.physical.handle())
    }
}

impl GpuResource for DeviceBundle {
    type Raw = DeviceHandlePair;

    const KIND: ResourceKind = ResourceKind::DeviceBundle;

    fn is_valid(&self) -> bool {
        self.logical.is_valid() && self.physical.is_valid()
    }

    fn get(&self) -> DeviceHandlePair {
        self.handle_pair()
    }
}

impl PartialEq<DeviceHandlePair> for DeviceBundle {
    fn eq(&self, other: &DeviceHandlePair) -> bool {
        self.handle_pair() == *other
    }
}

impl PartialEq<DeviceBundle> for DeviceHandlePair {
    fn eq(&self, other: &DeviceBundle) -> bool {
        other == self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(entries: &[(QueuePurpose, u32)]) -> PerPurpose<u32> {
        let mut t = PerPurpose::default();
        for &(purpose, family) in entries {
            t.set(purpose, Some(family));
        }
        t
    }

    #[test]
    fn shared_family_binds_every_matching_purpose() {
        let t = targets(&[
            (QueuePurpose::Graphics, 0),
            (QueuePurpose::Compute, 0),
            (QueuePurpose::Transfer, 0),
            (QueuePurpose::Presentation, 0),
        ]);
        let bound = bind_queue_purposes([0], &t);

        for purpose in [
            QueuePurpose::Graphics,
            QueuePurpose::Compute,
            QueuePurpose::Transfer,
            QueuePurpose::Presentation,
        ] {
            assert_eq!(bound.get(purpose), Some(0));
        }
        assert_eq!(bound.get(QueuePurpose::Protected), None);
    }

    #[test]
    fn unrequested_family_stays_unbound() {
        let t = targets(&[(QueuePurpose::Graphics, 0), (QueuePurpose::Transfer, 2)]);
        let bound = bind_queue_purposes([0], &t);

        assert_eq!(bound.get(QueuePurpose::Graphics), Some(0));
        assert_eq!(bound.get(QueuePurpose::Transfer), None);
    }

    #[test]
    fn first_entry_wins_for_duplicated_families() {
        let t = targets(&[(QueuePurpose::Compute, 1)]);
        let bound = bind_queue_purposes([1, 0, 1], &t);
        assert_eq!(bound.get(QueuePurpose::Compute), Some(1));
    }

    #[test]
    fn distinct_families_bind_independently() {
        let t = targets(&[
            (QueuePurpose::Graphics, 0),
            (QueuePurpose::Compute, 1),
            (QueuePurpose::SparseBinding, 2),
        ]);
        let bound = bind_queue_purposes([2, 1, 0], &t);

        assert_eq!(bound.get(QueuePurpose::Graphics), Some(0));
        assert_eq!(bound.get(QueuePurpose::Compute), Some(1));
        assert_eq!(bound.get(QueuePurpose::SparseBinding), Some(2));
    }

    #[test]
    fn handle_pair_validity_needs_both_handles() {
        let device = vk::Device::from_raw(1);
        let physical = vk::PhysicalDevice::from_raw(2);

        assert!(DeviceHandlePair::new(device, physical).is_valid());
        assert!(!DeviceHandlePair::new(vk::Device::null(), physical).is_valid());
        assert!(!DeviceHandlePair::default().is_valid());
        assert_eq!(
            DeviceHandlePair::new(device, physical),
            DeviceHandlePair::new(device, physical)
        );
    }
}
