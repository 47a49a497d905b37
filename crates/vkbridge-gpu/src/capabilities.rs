//! Queue family capability detection.

use ash::vk;

/// Capability a queue family can be selected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueCapability {
    /// Graphics, compute and transfer on the same family.
    Core,
    /// Graphics operations.
    Graphics,
    /// Compute dispatches.
    Compute,
    /// Transfer (copy) operations.
    Transfer,
    /// Protected memory operations.
    Protected,
    /// Sparse memory binding.
    SparseBinding,
}

impl QueueCapability {
    /// All capabilities, in scan order.
    pub const ALL: [Self; 6] = [
        Self::Core,
        Self::Graphics,
        Self::Compute,
        Self::Transfer,
        Self::Protected,
        Self::SparseBinding,
    ];

    /// Queue flag bits this capability stands for.
    pub fn flags(self) -> vk::QueueFlags {
        match self {
            Self::Core => {
                vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER
            }
            Self::Graphics => vk::QueueFlags::GRAPHICS,
            Self::Compute => vk::QueueFlags::COMPUTE,
            Self::Transfer => vk::QueueFlags::TRANSFER,
            Self::Protected => vk::QueueFlags::PROTECTED,
            Self::SparseBinding => vk::QueueFlags::SPARSE_BINDING,
        }
    }

    const fn slot(self) -> usize {
        match self {
            Self::Core => 0,
            Self::Graphics => 1,
            Self::Compute => 2,
            Self::Transfer => 3,
            Self::Protected => 4,
            Self::SparseBinding => 5,
        }
    }
}

/// Capabilities of a single queue family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamily {
    /// Family index on the physical device.
    pub index: u32,
    /// Number of queues in the family.
    pub queue_count: u32,
    /// Raw capability bits.
    pub flags: vk::QueueFlags,
    /// Minimum granularity of image transfers on this family.
    pub min_image_transfer_granularity: vk::Extent3D,
    /// Meaningful bits in timestamps written on this family.
    pub timestamp_valid_bits: u32,

    /// `GRAPHICS` is set.
    pub graphics: bool,
    /// `COMPUTE` is set.
    pub compute: bool,
    /// `TRANSFER` is set.
    pub transfer: bool,
    /// `SPARSE_BINDING` is set.
    pub sparse_binding: bool,
    /// `PROTECTED` is set.
    pub protected: bool,
}

impl QueueFamily {
    /// Derive capabilities from native family properties at `index`.
    pub fn new(properties: &vk::QueueFamilyProperties, index: u32) -> Self {
        let flags = properties.queue_flags;
        Self {
            index,
            queue_count: properties.queue_count,
            flags,
            min_image_transfer_granularity: properties.min_image_transfer_granularity,
            timestamp_valid_bits: properties.timestamp_valid_bits,
            graphics: flags.contains(vk::QueueFlags::GRAPHICS),
            compute: flags.contains(vk::QueueFlags::COMPUTE),
            transfer: flags.contains(vk::QueueFlags::TRANSFER),
            sparse_binding: flags.contains(vk::QueueFlags::SPARSE_BINDING),
            protected: flags.contains(vk::QueueFlags::PROTECTED),
        }
    }

    /// Graphics, compute and transfer are all supported.
    pub fn has_core_queue_support(&self) -> bool {
        self.graphics && self.compute && self.transfer
    }

    /// Core support plus sparse binding and protected memory.
    pub fn has_all_queue_support(&self) -> bool {
        self.has_core_queue_support() && self.sparse_binding && self.protected
    }

    /// Whether this family qualifies for `capability`.
    pub fn supports(&self, capability: QueueCapability) -> bool {
        match capability {
            QueueCapability::Core => self.has_core_queue_support(),
            QueueCapability::Graphics => self.graphics,
            QueueCapability::Compute => self.compute,
            QueueCapability::Transfer => self.transfer,
            QueueCapability::Protected => self.protected,
            QueueCapability::SparseBinding => self.sparse_binding,
        }
    }
}

/// First family index supporting each capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilityIndices {
    slots: [Option<u32>; 6],
}

impl CapabilityIndices {
    /// Scan families in order; the first family supporting a capability wins.
    pub fn scan(families: &[QueueFamily]) -> Self {
        let mut indices = Self::default();
        for family in families {
            for capability in QueueCapability::ALL {
                let slot = &mut indices.slots[capability.slot()];
                if slot.is_none() && family.supports(capability) {
                    *slot = Some(family.index);
                }
            }
        }
        indices
    }

    /// Index of the first family supporting `capability`, if any.
    pub fn get(&self, capability: QueueCapability) -> Option<u32> {
        self.slots[capability.slot()]
    }

    /// First family with graphics, compute and transfer.
    pub fn core(&self) -> Option<u32> {
        self.get(QueueCapability::Core)
    }

    /// First graphics-capable family.
    pub fn graphics(&self) -> Option<u32> {
        self.get(QueueCapability::Graphics)
    }

    /// First compute-capable family.
    pub fn compute(&self) -> Option<u32> {
        self.get(QueueCapability::Compute)
    }

    /// First transfer-capable family.
    pub fn transfer(&self) -> Option<u32> {
        self.get(QueueCapability::Transfer)
    }

    /// First family supporting protected memory.
    pub fn protected(&self) -> Option<u32> {
        self.get(QueueCapability::Protected)
    }

    /// First family supporting sparse binding.
    pub fn sparse_binding(&self) -> Option<u32> {
        self.get(QueueCapability::SparseBinding)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn family_props(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            timestamp_valid_bits: 64,
            min_image_transfer_granularity: vk::Extent3D {
                width: 1,
                height: 1,
                depth: 1,
            },
        }
    }

    fn families(flags: &[vk::QueueFlags]) -> Vec<QueueFamily> {
        flags
            .iter()
            .enumerate()
            .map(|(i, &f)| QueueFamily::new(&family_props(f, 1), i as u32))
            .collect()
    }

    #[test]
    fn core_support_requires_all_three() {
        let all = vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER;
        assert!(QueueFamily::new(&family_props(all, 1), 0).has_core_queue_support());

        for missing in [
            vk::QueueFlags::GRAPHICS,
            vk::QueueFlags::COMPUTE,
            vk::QueueFlags::TRANSFER,
        ] {
            let family = QueueFamily::new(&family_props(all & !missing, 1), 0);
            assert!(!family.has_core_queue_support(), "missing {missing:?}");
        }
    }

    #[test]
    fn all_support_requires_sparse_and_protected() {
        let core = vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER;
        let family = QueueFamily::new(&family_props(core | vk::QueueFlags::SPARSE_BINDING, 1), 0);
        assert!(!family.has_all_queue_support());

        let family = QueueFamily::new(
            &family_props(
                core | vk::QueueFlags::SPARSE_BINDING | vk::QueueFlags::PROTECTED,
                1,
            ),
            0,
        );
        assert!(family.has_all_queue_support());
    }

    #[test]
    fn record_keeps_native_properties() {
        let family = QueueFamily::new(&family_props(vk::QueueFlags::TRANSFER, 4), 2);
        assert_eq!(family.index, 2);
        assert_eq!(family.queue_count, 4);
        assert_eq!(family.timestamp_valid_bits, 64);
        assert!(family.transfer && !family.graphics && !family.compute);
    }

    #[test]
    fn scan_picks_lowest_index_per_capability() {
        let fams = families(&[
            vk::QueueFlags::TRANSFER,
            vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
        ]);
        let indices = CapabilityIndices::scan(&fams);

        assert_eq!(indices.transfer(), Some(0));
        assert_eq!(indices.compute(), Some(1));
        assert_eq!(indices.graphics(), Some(2));
        assert_eq!(indices.core(), Some(2));
        assert_eq!(indices.protected(), None);
        assert_eq!(indices.sparse_binding(), None);
    }

    #[test]
    fn core_index_always_points_at_core_family() {
        let fams = families(&[
            vk::QueueFlags::GRAPHICS,
            vk::QueueFlags::COMPUTE,
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
        ]);
        let indices = CapabilityIndices::scan(&fams);
        let core = indices.core().unwrap();
        assert!(fams[core as usize].has_core_queue_support());
        assert!(fams[..core as usize]
            .iter()
            .all(|f| !f.has_core_queue_support()));
    }

    #[test]
    fn empty_device_leaves_everything_unset() {
        let indices = CapabilityIndices::scan(&[]);
        assert!(QueueCapability::ALL
            .iter()
            .all(|&c| indices.get(c).is_none()));
    }
}
