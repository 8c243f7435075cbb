//! Header normalization collaborator.
//!
//! Raw wire headers arrive with case-varied keys, possibly repeated. This
//! module folds them into a mapping from lower-cased key to list-of-values,
//! preserving the on-wire value order per key. The download core only needs
//! case-insensitive single-value lookup of `content-length`; the full map is
//! exposed for callers that want more.

use std::collections::HashMap;

use reqwest::header::{CONTENT_LENGTH, HeaderMap};

/// Normalizes wire headers into a lower-cased-key multimap.
///
/// Repeated headers keep their delivery order. Values that are not valid
/// UTF-8 are skipped.
#[must_use]
pub fn normalize(headers: &HeaderMap) -> HashMap<String, Vec<String>> {
    let mut normalized: HashMap<String, Vec<String>> = HashMap::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            normalized
                .entry(name.as_str().to_ascii_lowercase())
                .or_default()
                .push(value.to_string());
        }
    }
    normalized
}

/// Case-insensitive single-value lookup in a normalized header map.
///
/// Returns the first value when the header was repeated.
#[must_use]
pub fn single_value<'a>(
    normalized: &'a HashMap<String, Vec<String>>,
    name: &str,
) -> Option<&'a str> {
    normalized
        .get(&name.to_ascii_lowercase())
        .and_then(|values| values.first())
        .map(String::as_str)
}

/// Extracts the declared body size from a `content-length` header.
///
/// Absence, a non-UTF-8 value, or a value that does not parse as a
/// non-negative integer all yield `None`. The declared size is advisory
/// only; the download loop never uses it to terminate early.
#[must_use]
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}
