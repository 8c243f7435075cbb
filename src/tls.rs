//! TLS/security options passed through to the underlying HTTP client.
//!
//! The download core treats these as opaque: they are applied once when the
//! client is built and never inspected afterwards. Which options a caller
//! should pick is policy and lives outside this crate.

use reqwest::ClientBuilder;

/// Peer-verification configuration forwarded to the transport.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// Skip certificate verification for the remote peer.
    ///
    /// Only meaningful for testing against self-signed endpoints; the
    /// default (`false`) verifies normally.
    pub accept_invalid_certs: bool,
}

impl TlsOptions {
    /// Applies these options to a client builder.
    pub(crate) fn apply(&self, builder: ClientBuilder) -> ClientBuilder {
        if self.accept_invalid_certs {
            builder.danger_accept_invalid_certs(true)
        } else {
            builder
        }
    }
}
