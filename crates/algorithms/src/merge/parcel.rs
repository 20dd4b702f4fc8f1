//! Parcel identifier tokens and their concatenation

use std::collections::BTreeSet;

use parcelmerge_core::AttributeValue;

/// Separator between parcel identifiers
pub const PARCEL_SEPARATOR: char = ',';

/// Parcel identifiers held in one attribute value.
///
/// Whitespace is removed, the rest split on commas and empty tokens dropped.
/// Numbers use their display form.
pub fn parcel_tokens(value: &AttributeValue) -> Vec<String> {
    let Some(text) = value.as_text() else {
        return Vec::new();
    };
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    compact
        .split(PARCEL_SEPARATOR)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Sorted, de-duplicated parcel identifiers of all values, comma-joined.
///
/// Sorting is lexicographic, so `"12"` comes before `"3"`.
pub fn concat_parcel_ids<'a, I>(values: I) -> String
where
    I: IntoIterator<Item = &'a AttributeValue>,
{
    let tokens: BTreeSet<String> = values.into_iter().flat_map(parcel_tokens).collect();
    tokens
        .into_iter()
        .collect::<Vec<_>>()
        .join(&PARCEL_SEPARATOR.to_string())
}

/// First `max_chars` characters of `value`, with `...` when cut
pub(crate) fn preview(value: &str, max_chars: usize) -> String {
    let mut chars = value.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
