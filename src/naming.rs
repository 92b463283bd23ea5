//! Identifier derivation for generated variables, steps and routines.

use itertools::Itertools;

/// Turns a designer-facing title into a workflow identifier.
///
/// The result is lowercase ASCII alphanumerics separated by single
/// underscores and always starts with a letter. Returns an empty string when
/// the title contains nothing usable; callers supply their own fallback.
pub fn sanitize_identifier(title: &str) -> String {
    let lowered: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    let joined = lowered.split('_').filter(|part| !part.is_empty()).join("_");

    match joined.chars().next() {
        Some(c) if c.is_ascii_digit() => format!("n_{}", joined),
        _ => joined,
    }
}

/// Normalizes a branch label into the key used in edge handles:
/// uppercased, with spaces replaced by underscores.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_uppercase().replace(' ', "_")
}
