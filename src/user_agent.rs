//! Shared User-Agent string for outbound HTTP requests.
//!
//! Single source for project URL and UA format so every request this crate
//! issues identifies itself consistently (good citizenship; RFC 9308).

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/streamfetch";

/// Default User-Agent attached to every outbound request, in addition to any
/// caller-supplied headers.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("streamfetch/{version} (+{PROJECT_UA_URL})")
}
