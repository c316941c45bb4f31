//! Identifier codec for devices and datapoints.
//!
//! Datapoint ids are derived from human-entered names and must stay unique
//! across the whole document. Derivation is deterministic so renaming a
//! node back to an earlier name lands on the same id.

/// Canonical slug for a piece of free text.
///
/// Lower-cases the input, collapses every run of characters outside
/// `[a-z0-9]` into a single `_`, and strips leading and trailing
/// separators. Empty or all-separator input yields an empty slug.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;
    for c in text.trim().chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }
    slug
}

/// Composite datapoint id, `<device-slug>.<name-slug>`.
///
/// Returns `None` when either slug comes out empty: no id can be derived
/// and the caller must block whatever edit needed one.
pub fn datapoint_id(device_name: &str, datapoint_name: &str) -> Option<String> {
    let device = slugify(device_name);
    let name = slugify(datapoint_name);
    if device.is_empty() || name.is_empty() {
        return None;
    }
    Some(format!("{device}.{name}"))
}

/// Resolve `base` against a taken-set, probing `base_2`, `base_3`, ...
/// until `exists` clears a candidate.
pub fn unique_id<F>(base: &str, exists: F) -> String
where
    F: Fn(&str) -> bool,
{
    if !exists(base) {
        return base.to_string();
    }
    let mut suffix = 2u32;
    loop {
        let candidate = format!("{base}_{suffix}");
        if !exists(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_collapses_runs() {
        assert_eq!(slugify("Boiler Room #2"), "boiler_room_2");
        assert_eq!(slugify("  Flow--Rate  "), "flow_rate");
        assert_eq!(slugify("TEMP"), "temp");
        assert_eq!(slugify("__x__"), "x");
    }

    #[test]
    fn test_slugify_degenerate_input() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("   "), "");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_slugify_is_idempotent() {
        for input in ["Boiler Room #2", "  Flow--Rate  ", "x", "a b c", "42"] {
            let once = slugify(input);
            assert_eq!(slugify(&once), once);
        }
    }

    #[test]
    fn test_datapoint_id_composition() {
        assert_eq!(
            datapoint_id("Boiler Room", "Flow Rate"),
            Some("boiler_room.flow_rate".to_string())
        );
        assert_eq!(datapoint_id("!!!", "Flow"), None);
        assert_eq!(datapoint_id("Boiler", "   "), None);
    }

    #[test]
    fn test_unique_id_probes_suffixes() {
        let taken = ["dev.flow", "dev.flow_2"];
        let exists = |id: &str| taken.contains(&id);
        assert_eq!(unique_id("dev.flow", exists), "dev.flow_3");
        assert_eq!(unique_id("dev.temp", exists), "dev.temp");
    }
}
