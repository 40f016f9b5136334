//! Client identifier extraction from request headers.

use hyper::header::HeaderMap;

/// Identifier used when no client address can be recovered. All such
/// callers share one bucket.
pub const UNKNOWN_IDENTIFIER: &str = "unknown";

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Best-effort client identifier.
///
/// Fallback chain: first entry of `x-forwarded-for`, then `x-real-ip`, then
/// [`UNKNOWN_IDENTIFIER`]. Values are trimmed; blank or non-UTF-8 headers
/// fall through to the next source.
pub fn extract_identifier(headers: &HeaderMap) -> String {
    forwarded_for(headers)
        .or_else(|| real_ip(headers))
        .unwrap_or_else(|| UNKNOWN_IDENTIFIER.to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(X_FORWARDED_FOR)?.to_str().ok()?;
    non_blank(value.split(',').next()?)
}

fn real_ip(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(X_REAL_IP)?.to_str().ok()?;
    non_blank(value)
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
