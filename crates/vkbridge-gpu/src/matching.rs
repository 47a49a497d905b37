//! Extension and layer name negotiation.

use crate::error::{GpuError, NameKind, Result};
use ash::vk;
use std::collections::HashMap;
use std::ffi::{c_char, CString};

/// A driver-reported property carrying a fixed-size name.
pub trait NamedProperty {
    /// What kind of name this is, used in diagnostics.
    const KIND: NameKind;

    /// The raw, nul-terminated name array.
    fn raw_name(&self) -> &[c_char];

    /// The name as UTF-8, if it is nul-terminated and valid.
    fn name(&self) -> Option<&str> {
        crate::util::fixed_str(self.raw_name())
    }
}

impl NamedProperty for vk::ExtensionProperties {
    const KIND: NameKind = NameKind::Extension;

    fn raw_name(&self) -> &[c_char] {
        &self.extension_name
    }
}

impl NamedProperty for vk::LayerProperties {
    const KIND: NameKind = NameKind::Layer;

    fn raw_name(&self) -> &[c_char] {
        &self.layer_name
    }
}

/// Outcome of a name negotiation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameMatches {
    /// Names to enable, in the order they were matched. Requested names come
    /// first, then required ones; a name in both lists appears twice.
    pub enabled: Vec<String>,
    /// Availability of every name looked at.
    pub results: HashMap<String, bool>,
}

impl NameMatches {
    /// Enabled names as owned C strings for create-info structures.
    pub fn to_cstrings(&self) -> Result<Vec<CString>> {
        to_cstrings(&self.enabled)
    }
}

/// Convert names to C strings.
pub fn to_cstrings<S: AsRef<str>>(names: &[S]) -> Result<Vec<CString>> {
    names
        .iter()
        .map(|name| CString::new(name.as_ref()).map_err(GpuError::from))
        .collect()
}

/// Pointers into `names`, valid while `names` is alive.
pub fn as_ptrs(names: &[CString]) -> Vec<*const c_char> {
    names.iter().map(|name| name.as_ptr()).collect()
}

/// Negotiate `required` and `requested` names against `available`.
///
/// A missing requested name is logged and recorded as `false`. A missing
/// required name aborts with [`GpuError::RequiredNameUnavailable`].
pub fn find_matches<P, S>(available: &[P], required: &[S], requested: &[S]) -> Result<NameMatches>
where
    P: NamedProperty,
    S: AsRef<str>,
{
    let mut matches = NameMatches::default();

    for name in requested {
        let name = name.as_ref();
        match lookup(available, name) {
            Some(found) => {
                matches.enabled.push(found.to_string());
                matches.results.insert(found.to_string(), true);
            }
            None => {
                tracing::warn!("Requested {} {} is not available", P::KIND, name);
                matches.results.insert(name.to_string(), false);
            }
        }
    }

    for name in required {
        let name = name.as_ref();
        let found = lookup(available, name).ok_or_else(|| GpuError::RequiredNameUnavailable {
            kind: P::KIND,
            name: name.to_string(),
        })?;
        matches.enabled.push(found.to_string());
        matches.results.insert(found.to_string(), true);
    }

    Ok(matches)
}

/// Negotiate extension names.
pub fn find_extension_matches<S: AsRef<str>>(
    available: &[vk::ExtensionProperties],
    required: &[S],
    requested: &[S],
) -> Result<NameMatches> {
    find_matches(available, required, requested)
}

/// Negotiate layer names.
pub fn find_layer_matches<S: AsRef<str>>(
    available: &[vk::LayerProperties],
    required: &[S],
    requested: &[S],
) -> Result<NameMatches> {
    find_matches(available, required, requested)
}

fn lookup<'a, P: NamedProperty>(available: &'a [P], name: &str) -> Option<&'a str> {
    available
        .iter()
        .filter_map(|property| property.name())
        .find(|candidate| *candidate == name)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::features::tests::count_warnings;

    fn write_name(dst: &mut [c_char], name: &str) {
        for (slot, byte) in dst.iter_mut().zip(name.bytes()) {
            *slot = byte as c_char;
        }
    }

    pub(crate) fn extension(name: &str) -> vk::ExtensionProperties {
        let mut props = vk::ExtensionProperties::default();
        write_name(&mut props.extension_name, name);
        props
    }

    fn layer(name: &str) -> vk::LayerProperties {
        let mut props = vk::LayerProperties::default();
        write_name(&mut props.layer_name, name);
        props
    }

    #[test]
    fn property_names_decode() {
        assert_eq!(extension("VK_KHR_swapchain").name(), Some("VK_KHR_swapchain"));
        assert_eq!(vk::ExtensionProperties::default().name(), Some(""));
    }

    #[test]
    fn name_in_both_lists_is_enabled_twice() {
        let available = [extension("VK_KHR_bar"), extension("VK_KHR_foo")];
        let matches =
            find_extension_matches(&available, &["VK_KHR_foo"], &["VK_KHR_foo"]).unwrap();

        insta::assert_snapshot!(matches.enabled.join(","), @"VK_KHR_foo,VK_KHR_foo");
        assert_eq!(matches.results.get("VK_KHR_foo"), Some(&true));
    }

    #[test]
    fn missing_requested_name_warns_and_is_skipped() {
        let available = [extension("VK_KHR_foo")];
        let (result, warnings) = count_warnings(|| {
            find_extension_matches(&available, &[] as &[&str], &["VK_EXT_missing", "VK_KHR_foo"])
        });

        let matches = result.unwrap();
        assert_eq!(matches.enabled, vec!["VK_KHR_foo".to_string()]);
        assert_eq!(matches.results.get("VK_EXT_missing"), Some(&false));
        assert_eq!(warnings, 1);
    }

    #[test]
    fn missing_required_layer_fails() {
        let available = [layer("VK_LAYER_KHRONOS_validation")];
        let err = find_layer_matches(&available, &["VK_LAYER_missing"], &[]).unwrap_err();

        match err {
            GpuError::RequiredNameUnavailable { kind, name } => {
                assert_eq!(kind, NameKind::Layer);
                assert_eq!(name, "VK_LAYER_missing");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn requested_names_precede_required_names() {
        let available = [extension("A"), extension("B"), extension("C")];
        let matches = find_extension_matches(&available, &["C", "A"], &["B"]).unwrap();
        assert_eq!(matches.enabled, vec!["B", "C", "A"]);
    }

    #[test]
    fn match_is_exact() {
        let available = [extension("VK_KHR_swapchain_mutable_format")];
        let err = find_extension_matches(&available, &["VK_KHR_swapchain"], &[]).unwrap_err();
        assert!(matches!(err, GpuError::RequiredNameUnavailable { .. }));
    }

    #[test]
    fn interior_nul_is_rejected() {
        assert!(matches!(
            to_cstrings(&["bad\0name"]),
            Err(GpuError::InvalidName(_))
        ));
    }
}
