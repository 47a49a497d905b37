//! Small helpers shared across the crate.

use ash::vk;
use std::ffi::{c_char, CStr};

/// Decode a fixed-size, nul-terminated driver string.
pub fn fixed_str(raw: &[c_char]) -> Option<&str> {
    let bytes: &[u8] = bytemuck::cast_slice(raw);
    CStr::from_bytes_until_nul(bytes).ok()?.to_str().ok()
}

/// Repeat `values` until the result holds `target` elements.
///
/// # Panics
/// Panics if `values` is empty or `target` is not a multiple of its length.
pub fn duplicate_extend_vector<T: Clone>(values: &[T], target: usize) -> Vec<T> {
    assert!(!values.is_empty(), "cannot extend an empty vector");
    assert_eq!(
        target % values.len(),
        0,
        "target length {target} is not a multiple of {}",
        values.len()
    );
    values.iter().cycle().take(target).cloned().collect()
}

/// Sum of descriptor counts over all pool sizes.
pub fn total_descriptor_count(sizes: &[vk::DescriptorPoolSize]) -> u32 {
    sizes.iter().map(|size| size.descriptor_count).sum()
}

/// Symbolic name of a result code.
pub fn vk_result_str(result: vk::Result) -> &'static str {
    match result {
        vk::Result::SUCCESS => "VK_SUCCESS",
        vk::Result::NOT_READY => "VK_NOT_READY",
        vk::Result::TIMEOUT => "VK_TIMEOUT",
        vk::Result::EVENT_SET => "VK_EVENT_SET",
        vk::Result::EVENT_RESET => "VK_EVENT_RESET",
        vk::Result::INCOMPLETE => "VK_INCOMPLETE",
        vk::Result::ERROR_OUT_OF_HOST_MEMORY => "VK_ERROR_OUT_OF_HOST_MEMORY",
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => "VK_ERROR_OUT_OF_DEVICE_MEMORY",
        vk::Result::ERROR_INITIALIZATION_FAILED => "VK_ERROR_INITIALIZATION_FAILED",
        vk::Result::ERROR_DEVICE_LOST => "VK_ERROR_DEVICE_LOST",
        vk::Result::ERROR_MEMORY_MAP_FAILED => "VK_ERROR_MEMORY_MAP_FAILED",
        vk::Result::ERROR_LAYER_NOT_PRESENT => "VK_ERROR_LAYER_NOT_PRESENT",
        vk::Result::ERROR_EXTENSION_NOT_PRESENT => "VK_ERROR_EXTENSION_NOT_PRESENT",
        vk::Result::ERROR_FEATURE_NOT_PRESENT => "VK_ERROR_FEATURE_NOT_PRESENT",
        vk::Result::ERROR_INCOMPATIBLE_DRIVER => "VK_ERROR_INCOMPATIBLE_DRIVER",
        vk::Result::ERROR_TOO_MANY_OBJECTS => "VK_ERROR_TOO_MANY_OBJECTS",
        vk::Result::ERROR_FORMAT_NOT_SUPPORTED => "VK_ERROR_FORMAT_NOT_SUPPORTED",
        vk::Result::ERROR_FRAGMENTED_POOL => "VK_ERROR_FRAGMENTED_POOL",
        vk::Result::ERROR_UNKNOWN => "VK_ERROR_UNKNOWN",
        vk::Result::ERROR_OUT_OF_POOL_MEMORY => "VK_ERROR_OUT_OF_POOL_MEMORY",
        vk::Result::ERROR_INVALID_EXTERNAL_HANDLE => "VK_ERROR_INVALID_EXTERNAL_HANDLE",
        vk::Result::ERROR_FRAGMENTATION => "VK_ERROR_FRAGMENTATION",
        vk::Result::ERROR_INVALID_OPAQUE_CAPTURE_ADDRESS => {
            "VK_ERROR_INVALID_OPAQUE_CAPTURE_ADDRESS"
        }
        vk::Result::PIPELINE_COMPILE_REQUIRED => "VK_PIPELINE_COMPILE_REQUIRED",
        vk::Result::ERROR_SURFACE_LOST_KHR => "VK_ERROR_SURFACE_LOST_KHR",
        vk::Result::ERROR_NATIVE_WINDOW_IN_USE_KHR => "VK_ERROR_NATIVE_WINDOW_IN_USE_KHR",
        vk::Result::SUBOPTIMAL_KHR => "VK_SUBOPTIMAL_KHR",
        vk::Result::ERROR_OUT_OF_DATE_KHR => "VK_ERROR_OUT_OF_DATE_KHR",
        vk::Result::ERROR_INCOMPATIBLE_DISPLAY_KHR => "VK_ERROR_INCOMPATIBLE_DISPLAY_KHR",
        vk::Result::ERROR_VALIDATION_FAILED_EXT => "VK_ERROR_VALIDATION_FAILED_EXT",
        vk::Result::ERROR_INVALID_SHADER_NV => "VK_ERROR_INVALID_SHADER_NV",
        _ => "VK_UNKNOWN_RESULT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_extend_cycles_input() {
        assert_eq!(duplicate_extend_vector(&[1, 2], 6), vec![1, 2, 1, 2, 1, 2]);
        assert_eq!(duplicate_extend_vector(&["a"], 3), vec!["a", "a", "a"]);
        assert!(duplicate_extend_vector(&[1, 2, 3], 0).is_empty());
    }

    #[test]
    #[should_panic(expected = "not a multiple")]
    fn duplicate_extend_rejects_uneven_target() {
        let _ = duplicate_extend_vector(&[1, 2], 3);
    }

    #[test]
    fn descriptor_counts_sum() {
        let sizes = [
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(4),
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::STORAGE_IMAGE)
                .descriptor_count(3),
        ];
        assert_eq!(total_descriptor_count(&sizes), 7);
        assert_eq!(total_descriptor_count(&[]), 0);
    }

    #[test]
    fn result_names() {
        assert_eq!(vk_result_str(vk::Result::SUCCESS), "VK_SUCCESS");
        assert_eq!(
            vk_result_str(vk::Result::ERROR_DEVICE_LOST),
            "VK_ERROR_DEVICE_LOST"
        );
        assert_eq!(vk_result_str(vk::Result::from_raw(-12345)), "VK_UNKNOWN_RESULT");
    }

    #[test]
    fn fixed_str_stops_at_nul() {
        let raw: [c_char; 6] = [b'a' as c_char, b'b' as c_char, 0, b'x' as c_char, 0, 0];
        assert_eq!(fixed_str(&raw), Some("ab"));
        assert_eq!(fixed_str(&[b'a' as c_char]), None);
    }
}
