//! Proxy-environment collaborator.
//!
//! Reads `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY` (and their lower-case
//! variants) once, when the HTTP client is built, and configures the
//! transport's proxy routing. The no-proxy list is a comma-separated host
//! set. A proxy URL without both host and port is ignored without error.

use reqwest::{ClientBuilder, NoProxy, Proxy};
use tracing::{debug, warn};
use url::Url;

/// Applies proxy routing from the process environment to a client builder.
///
/// System proxy auto-detection is disabled first so the environment is the
/// single source of proxy configuration.
pub(crate) fn apply_env_proxies(builder: ClientBuilder) -> ClientBuilder {
    let mut builder = builder.no_proxy();
    let no_proxy = no_proxy_from_env();

    if let Some(proxy_url) = env_proxy_for_scheme("https")
        && let Some(resolved) = build_proxy(|url: &str| Proxy::https(url), &proxy_url, no_proxy.clone())
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy_url) = env_proxy_for_scheme("http")
        && let Some(resolved) = build_proxy(|url: &str| Proxy::http(url), &proxy_url, no_proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

/// Builds a proxy from an environment value, dropping unusable URLs.
fn build_proxy(
    constructor: fn(&str) -> Result<Proxy, reqwest::Error>,
    proxy_url: &str,
    no_proxy: Option<NoProxy>,
) -> Option<Proxy> {
    if !has_host_and_port(proxy_url) {
        warn!(proxy_url, "ignoring proxy URL without host and port");
        return None;
    }
    match constructor(proxy_url) {
        Ok(proxy) => {
            debug!(proxy_url, "using proxy from environment");
            Some(proxy.no_proxy(no_proxy))
        }
        Err(error) => {
            warn!(proxy_url, error = %error, "ignoring unusable proxy URL");
            None
        }
    }
}

/// Returns true when the URL parses and carries both a host and a port
/// (explicit or known scheme default).
fn has_host_and_port(proxy_url: &str) -> bool {
    Url::parse(proxy_url)
        .map(|url| url.host_str().is_some() && url.port_or_known_default().is_some())
        .unwrap_or(false)
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    match scheme {
        "https" => find_first_proxy_var(&["HTTPS_PROXY", "https_proxy"]),
        "http" => find_first_proxy_var(&["HTTP_PROXY", "http_proxy"]),
        _ => None,
    }
}

fn find_first_proxy_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

/// Parses the comma-separated no-proxy host set from the environment.
fn no_proxy_from_env() -> Option<NoProxy> {
    find_first_proxy_var(&["NO_PROXY", "no_proxy"])
        .as_deref()
        .and_then(NoProxy::from_string)
}
