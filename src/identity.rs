//! Client identity resolution for rate limiting.
//!
//! `CF-Connecting-IP` is set authoritatively by the edge in front of the
//! gateway, so it wins over `X-Forwarded-For`. Without either header every
//! request shares the `"unknown"` bucket.

use axum::http::HeaderMap;

pub const CONNECTING_IP_HEADER: &str = "cf-connecting-ip";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Returns the identifier used to bucket this request. Never empty.
pub fn client_identifier(headers: &HeaderMap) -> String {
    if let Some(ip) = header_str(headers, CONNECTING_IP_HEADER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return ip.to_string();
    }

    // X-Forwarded-For: client, proxy1, proxy2
    if let Some(ip) = header_str(headers, FORWARDED_FOR_HEADER)
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return ip.to_string();
    }

    UNKNOWN_CLIENT.to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
