//! Physical device feature negotiation.
//!
//! `vk::PhysicalDeviceFeatures` is a flat struct of 55 booleans. [`FEATURE_FLAGS`]
//! lists every member once as a (name, getter, setter) triple so that the
//! negotiation passes can iterate the struct instead of spelling out each field.

use crate::error::{GpuError, Result};
use ash::vk;

/// One named member of `vk::PhysicalDeviceFeatures`.
#[derive(Clone, Copy)]
pub struct FeatureFlag {
    /// Vulkan spelling of the member, e.g. `wideLines`.
    pub name: &'static str,
    get: fn(&vk::PhysicalDeviceFeatures) -> vk::Bool32,
    set: fn(&mut vk::PhysicalDeviceFeatures, vk::Bool32),
}

impl FeatureFlag {
    /// Whether the flag is enabled in `features`.
    pub fn is_enabled(&self, features: &vk::PhysicalDeviceFeatures) -> bool {
        (self.get)(features) != vk::FALSE
    }

    /// Enable or disable the flag in `features`.
    pub fn set(&self, features: &mut vk::PhysicalDeviceFeatures, enabled: bool) {
        (self.set)(features, if enabled { vk::TRUE } else { vk::FALSE });
    }
}

impl std::fmt::Debug for FeatureFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FeatureFlag").field(&self.name).finish()
    }
}

macro_rules! feature_flags {
    ($($field:ident => $name:literal),* $(,)?) => {
        mod getters {
            use ash::vk;
            $(pub(super) fn $field(f: &vk::PhysicalDeviceFeatures) -> vk::Bool32 {
                f.$field
            })*
        }

        mod setters {
            use ash::vk;
            $(pub(super) fn $field(f: &mut vk::PhysicalDeviceFeatures, v: vk::Bool32) {
                f.$field = v;
            })*
        }

        /// Every member of `vk::PhysicalDeviceFeatures`, in declaration order.
        pub const FEATURE_FLAGS: &[FeatureFlag] = &[
            $(FeatureFlag {
                name: $name,
                get: getters::$field,
                set: setters::$field,
            },)*
        ];
    };
}

feature_flags! {
    robust_buffer_access => "robustBufferAccess",
    full_draw_index_uint32 => "fullDrawIndexUint32",
    image_cube_array => "imageCubeArray",
    independent_blend => "independentBlend",
    geometry_shader => "geometryShader",
    tessellation_shader => "tessellationShader",
    sample_rate_shading => "sampleRateShading",
    dual_src_blend => "dualSrcBlend",
    logic_op => "logicOp",
    multi_draw_indirect => "multiDrawIndirect",
    draw_indirect_first_instance => "drawIndirectFirstInstance",
    depth_clamp => "depthClamp",
    depth_bias_clamp => "depthBiasClamp",
    fill_mode_non_solid => "fillModeNonSolid",
    depth_bounds => "depthBounds",
    wide_lines => "wideLines",
    large_points => "largePoints",
    alpha_to_one => "alphaToOne",
    multi_viewport => "multiViewport",
    sampler_anisotropy => "samplerAnisotropy",
    texture_compression_etc2 => "textureCompressionETC2",
    texture_compression_astc_ldr => "textureCompressionASTC_LDR",
    texture_compression_bc => "textureCompressionBC",
    occlusion_query_precise => "occlusionQueryPrecise",
    pipeline_statistics_query => "pipelineStatisticsQuery",
    vertex_pipeline_stores_and_atomics => "vertexPipelineStoresAndAtomics",
    fragment_stores_and_atomics => "fragmentStoresAndAtomics",
    shader_tessellation_and_geometry_point_size => "shaderTessellationAndGeometryPointSize",
    shader_image_gather_extended => "shaderImageGatherExtended",
    shader_storage_image_extended_formats => "shaderStorageImageExtendedFormats",
    shader_storage_image_multisample => "shaderStorageImageMultisample",
    shader_storage_image_read_without_format => "shaderStorageImageReadWithoutFormat",
    shader_storage_image_write_without_format => "shaderStorageImageWriteWithoutFormat",
    shader_uniform_buffer_array_dynamic_indexing => "shaderUniformBufferArrayDynamicIndexing",
    shader_sampled_image_array_dynamic_indexing => "shaderSampledImageArrayDynamicIndexing",
    shader_storage_buffer_array_dynamic_indexing => "shaderStorageBufferArrayDynamicIndexing",
    shader_storage_image_array_dynamic_indexing => "shaderStorageImageArrayDynamicIndexing",
    shader_clip_distance => "shaderClipDistance",
    shader_cull_distance => "shaderCullDistance",
    shader_float64 => "shaderFloat64",
    shader_int64 => "shaderInt64",
    shader_int16 => "shaderInt16",
    shader_resource_residency => "shaderResourceResidency",
    shader_resource_min_lod => "shaderResourceMinLod",
    sparse_binding => "sparseBinding",
    sparse_residency_buffer => "sparseResidencyBuffer",
    sparse_residency_image2_d => "sparseResidencyImage2D",
    sparse_residency_image3_d => "sparseResidencyImage3D",
    sparse_residency2_samples => "sparseResidency2Samples",
    sparse_residency4_samples => "sparseResidency4Samples",
    sparse_residency8_samples => "sparseResidency8Samples",
    sparse_residency16_samples => "sparseResidency16Samples",
    sparse_residency_aliased => "sparseResidencyAliased",
    variable_multisample_rate => "variableMultisampleRate",
    inherited_queries => "inheritedQueries",
}

/// Look up a flag by its Vulkan name.
pub fn feature_by_name(name: &str) -> Option<&'static FeatureFlag> {
    FEATURE_FLAGS.iter().find(|flag| flag.name == name)
}

/// Build a feature struct with exactly the named flags enabled.
pub fn features_from_names<S: AsRef<str>>(names: &[S]) -> Result<vk::PhysicalDeviceFeatures> {
    let mut features = vk::PhysicalDeviceFeatures::default();
    for name in names {
        let name = name.as_ref();
        let flag = feature_by_name(name).ok_or_else(|| GpuError::UnknownFeature(name.to_string()))?;
        flag.set(&mut features, true);
    }
    Ok(features)
}

/// Names of the flags enabled in `features`.
pub fn feature_names(features: &vk::PhysicalDeviceFeatures) -> Vec<&'static str> {
    FEATURE_FLAGS
        .iter()
        .filter(|flag| flag.is_enabled(features))
        .map(|flag| flag.name)
        .collect()
}

/// Apply `op` to each flag of `a` and `b`, writing the result into `out`.
///
/// `op` receives the flag so it can name it in diagnostics. The first error
/// aborts the fold; `out` may then be partially written.
pub fn fold_features<F>(
    a: &vk::PhysicalDeviceFeatures,
    b: &vk::PhysicalDeviceFeatures,
    out: &mut vk::PhysicalDeviceFeatures,
    mut op: F,
) -> Result<()>
where
    F: FnMut(&FeatureFlag, bool, bool, bool) -> Result<bool>,
{
    for flag in FEATURE_FLAGS {
        let current = flag.is_enabled(out);
        let value = op(flag, flag.is_enabled(a), flag.is_enabled(b), current)?;
        flag.set(out, value);
    }
    Ok(())
}

/// Apply `op` to each flag of `input`, writing the result into `out`.
pub fn map_features<F>(
    input: &vk::PhysicalDeviceFeatures,
    out: &mut vk::PhysicalDeviceFeatures,
    mut op: F,
) where
    F: FnMut(&FeatureFlag, bool) -> bool,
{
    for flag in FEATURE_FLAGS {
        let value = op(flag, flag.is_enabled(input));
        flag.set(out, value);
    }
}

/// Determine the features to enable at logical device creation.
///
/// Requested flags that the device lacks are still enabled and logged as a
/// warning. Required flags that the device lacks fail the whole negotiation.
/// The result enables every flag that is required or requested.
pub fn find_feature_matches(
    available: &vk::PhysicalDeviceFeatures,
    required: &vk::PhysicalDeviceFeatures,
    requested: &vk::PhysicalDeviceFeatures,
) -> Result<vk::PhysicalDeviceFeatures> {
    let mut enabled = vk::PhysicalDeviceFeatures::default();

    fold_features(requested, available, &mut enabled, |flag, wanted, present, _| {
        if wanted && !present {
            tracing::warn!(
                feature = flag.name,
                "Feature '{}' is requested, but not available on the given device",
                flag.name
            );
        }
        Ok(wanted)
    })?;

    // Required flags take precedence over whatever the requested pass wrote.
    fold_features(required, available, &mut enabled, |flag, needed, present, current| {
        if needed && !present {
            return Err(GpuError::RequiredFeatureUnavailable(flag.name));
        }
        Ok(needed || current)
    })?;

    Ok(enabled)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Counts WARN events emitted while installed.
    #[derive(Clone, Default)]
    pub(crate) struct WarnCounter(pub(crate) Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// Run `f` with a subscriber counting warnings; returns the result and the count.
    pub(crate) fn count_warnings<T>(f: impl FnOnce() -> T) -> (T, usize) {
        let counter = WarnCounter::default();
        let subscriber = tracing_subscriber::registry().with(counter.clone());
        let result = tracing::subscriber::with_default(subscriber, f);
        (result, counter.0.load(Ordering::SeqCst))
    }

    fn features(names: &[&str]) -> vk::PhysicalDeviceFeatures {
        features_from_names(names).unwrap()
    }

    #[test]
    fn table_covers_every_member() {
        assert_eq!(FEATURE_FLAGS.len(), 55);

        let mut names: Vec<_> = FEATURE_FLAGS.iter().map(|f| f.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 55, "duplicate names in feature table");
    }

    #[test]
    fn each_flag_sets_a_distinct_member() {
        for flag in FEATURE_FLAGS {
            let mut f = vk::PhysicalDeviceFeatures::default();
            flag.set(&mut f, true);
            assert_eq!(feature_names(&f), vec![flag.name]);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = features_from_names(&["warpDrive"]).unwrap_err();
        assert!(matches!(err, GpuError::UnknownFeature(name) if name == "warpDrive"));
    }

    #[test]
    fn missing_required_feature_fails_with_its_name() {
        let available = features(&["geometryShader"]);
        let required = features(&["wideLines"]);
        let requested = vk::PhysicalDeviceFeatures::default();

        let err = find_feature_matches(&available, &required, &requested).unwrap_err();
        assert!(matches!(err, GpuError::RequiredFeatureUnavailable("wideLines")));
    }

    #[test]
    fn missing_requested_feature_warns_and_stays_enabled() {
        let available = vk::PhysicalDeviceFeatures::default();
        let required = vk::PhysicalDeviceFeatures::default();
        let requested = features(&["geometryShader"]);

        let (result, warnings) =
            count_warnings(|| find_feature_matches(&available, &required, &requested));

        let enabled = result.unwrap();
        assert_eq!(enabled.geometry_shader, vk::TRUE);
        assert_eq!(warnings, 1);
    }

    #[test]
    fn result_is_union_of_required_and_requested() {
        let available = features(&["geometryShader", "samplerAnisotropy", "shaderInt64"]);
        let required = features(&["samplerAnisotropy"]);
        let requested = features(&["geometryShader"]);

        let enabled = find_feature_matches(&available, &required, &requested).unwrap();
        assert_eq!(
            feature_names(&enabled),
            vec!["geometryShader", "samplerAnisotropy"]
        );
    }

    #[test]
    fn map_features_applies_to_every_flag() {
        let input = features(&["logicOp"]);
        let mut inverted = vk::PhysicalDeviceFeatures::default();
        map_features(&input, &mut inverted, |_, enabled| !enabled);

        assert_eq!(inverted.logic_op, vk::FALSE);
        assert_eq!(feature_names(&inverted).len(), 54);
    }
}
