//! Depth format selection.

use crate::error::{GpuError, Result};
use ash::vk;

/// Fallback depth formats, most precise first.
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 5] = [
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
    vk::Format::D16_UNORM_S8_UINT,
    vk::Format::D32_SFLOAT,
    vk::Format::D16_UNORM,
];

/// Whether `format` carries a stencil aspect alongside depth.
pub fn has_stencil_component(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D16_UNORM_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D32_SFLOAT_S8_UINT
    )
}

fn is_usable(properties: &vk::FormatProperties, format: vk::Format, require_stencil: bool) -> bool {
    properties
        .optimal_tiling_features
        .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        && (!require_stencil || has_stencil_component(format))
}

/// Pick a depth attachment format using `query` for format properties.
///
/// `preferred` is returned as-is when usable; otherwise the first usable
/// entry of [`DEPTH_FORMAT_CANDIDATES`] is.
pub fn select_depth_format_with<F>(
    mut query: F,
    preferred: vk::Format,
    require_stencil: bool,
) -> Result<vk::Format>
where
    F: FnMut(vk::Format) -> vk::FormatProperties,
{
    if is_usable(&query(preferred), preferred, require_stencil) {
        return Ok(preferred);
    }

    let selected = DEPTH_FORMAT_CANDIDATES
        .into_iter()
        .find(|&format| is_usable(&query(format), format, require_stencil))
        .ok_or(GpuError::NoDepthFormat)?;

    tracing::debug!(
        "Depth format {:?} unavailable, using {:?}",
        preferred,
        selected
    );
    Ok(selected)
}

/// Pick a depth attachment format supported by `physical_device`.
///
/// # Safety
/// The instance and physical device must be valid.
pub unsafe fn select_depth_format(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    preferred: vk::Format,
    require_stencil: bool,
) -> Result<vk::Format> {
    select_depth_format_with(
        |format| instance.get_physical_device_format_properties(physical_device, format),
        preferred,
        require_stencil,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supporting(
        formats: &'static [vk::Format],
    ) -> impl FnMut(vk::Format) -> vk::FormatProperties {
        move |format| {
            let mut props = vk::FormatProperties::default();
            if formats.contains(&format) {
                props.optimal_tiling_features = vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
            }
            props
        }
    }

    #[test]
    fn usable_preferred_format_skips_the_scan() {
        let mut queried = Vec::new();
        let mut inner = supporting(&[vk::Format::D32_SFLOAT]);
        let format = select_depth_format_with(
            |f| {
                queried.push(f);
                inner(f)
            },
            vk::Format::D32_SFLOAT,
            false,
        )
        .unwrap();

        assert_eq!(format, vk::Format::D32_SFLOAT);
        assert_eq!(queried, vec![vk::Format::D32_SFLOAT]);
    }

    #[test]
    fn stencil_requirement_falls_back_to_candidates() {
        let format = select_depth_format_with(
            supporting(&[vk::Format::D32_SFLOAT, vk::Format::D24_UNORM_S8_UINT]),
            vk::Format::D32_SFLOAT,
            true,
        )
        .unwrap();
        assert_eq!(format, vk::Format::D24_UNORM_S8_UINT);
    }

    #[test]
    fn candidates_are_tried_in_order() {
        let format = select_depth_format_with(
            supporting(&[vk::Format::D16_UNORM, vk::Format::D32_SFLOAT]),
            vk::Format::D32_SFLOAT_S8_UINT,
            false,
        )
        .unwrap();
        assert_eq!(format, vk::Format::D32_SFLOAT);
    }

    #[test]
    fn nothing_usable_is_an_error() {
        let err =
            select_depth_format_with(supporting(&[]), vk::Format::D16_UNORM, false).unwrap_err();
        assert!(matches!(err, GpuError::NoDepthFormat));
    }

    #[test]
    fn colour_formats_have_no_stencil() {
        assert!(!has_stencil_component(vk::Format::R8G8B8A8_UNORM));
        assert!(!has_stencil_component(vk::Format::D32_SFLOAT));
        assert!(has_stencil_component(vk::Format::D24_UNORM_S8_UINT));
    }
}
