use axum::http::HeaderMap;

/// Client label used when no proxy header identifies the caller.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Extract the client address from proxy headers.
///
/// Takes the first entry of `X-Forwarded-For`, then `X-Real-IP`, then the
/// literal `"unknown"`. Values are used as opaque labels and not parsed.
pub fn client_from_headers(headers: &HeaderMap) -> String {
    if let Some(h) = headers.get("x-forwarded-for").and_then(|hv| hv.to_str().ok()) {
        if let Some(first) = h.split(',').next().map(str::trim).filter(|s| !s.is_empty()) {
            return first.to_string();
        }
    }
    if let Some(h) = headers.get("x-real-ip").and_then(|hv| hv.to_str().ok()) {
        let h = h.trim();
        if !h.is_empty() {
            return h.to_string();
        }
    }
    UNKNOWN_CLIENT.to_string()
}

/// Rate-limit key for a client and request path.
pub fn rate_limit_key(client: &str, path: &str) -> String {
    format!("{}:{}", client, path)
}
