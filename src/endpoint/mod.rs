//! Endpoint normalization.
//!
//! Users paste provider URLs in several shapes (`https://host`, `https://host/v1`,
//! `https://host/v1-openai/` ...). Everything is reduced to a bare base first;
//! the OpenAI-compatible flavor then appends `/v1` because the shared call
//! paths build their routes relative to a versioned base.

use crate::core::credentials::Credentials;
use crate::core::error::InvokeError;

/// Version suffixes removed from a base URL, applied in this order.
pub const VERSION_SUFFIXES: [&str; 6] = [
    "/v1",
    "/v1/",
    "/v1-openai",
    "/v1-openai/",
    "/openai-v1",
    "/openai-v1/",
];

pub const OPENAI_COMPAT_VERSION_PATH: &str = "/v1";

/// Strips trailing slashes, then each version suffix at most once in
/// [`VERSION_SUFFIXES`] order.
pub fn strip_version_suffix(raw: &str) -> String {
    let mut base = raw.trim_end_matches('/');
    for suffix in VERSION_SUFFIXES {
        if let Some(stripped) = base.strip_suffix(suffix) {
            base = stripped;
        }
    }
    base.to_string()
}

/// Base URL used by the rerank adapter, which appends `/v1/rerank` itself.
pub fn rerank_base_url(raw: &str) -> String {
    strip_version_suffix(raw)
}

/// Base URL ending in `/v1`, as expected by the OpenAI-compatible call paths.
pub fn openai_compat_base_url(raw: &str) -> String {
    format!("{}{OPENAI_COMPAT_VERSION_PATH}", strip_version_suffix(raw))
}

pub fn rerank_credentials(credentials: &Credentials) -> Result<Credentials, InvokeError> {
    let endpoint_url = credentials.endpoint_url()?;
    Ok(credentials.with_endpoint_url(rerank_base_url(endpoint_url)))
}

pub fn openai_compat_credentials(credentials: &Credentials) -> Result<Credentials, InvokeError> {
    let endpoint_url = credentials.endpoint_url()?;
    Ok(credentials.with_endpoint_url(openai_compat_base_url(endpoint_url)))
}
