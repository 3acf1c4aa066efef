//! Shared parsing and reply helpers for route handlers.
//!
//! Bodies arrive URL-encoded (`key=value&key2=value2`) from the bridge;
//! replies are JSON strings.

/// Parse a URL-encoded form body into key-value pairs.
pub fn parse_form_body(body: &str) -> Vec<(String, String)> {
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (percent_decode(key), percent_decode(value)),
            None => (percent_decode(pair), String::new()),
        })
        .collect()
}

/// Percent-decode a URL-encoded value. Decodes into raw bytes first so
/// multi-byte UTF-8 sequences survive; malformed escapes pass through as-is.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                match decoded {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parse a query string (with or without the leading `?`).
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    parse_form_body(query.strip_prefix('?').unwrap_or(query))
}

/// Look up a value by key.
pub fn get_param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Parse a `u64` parameter (generation tokens).
pub fn get_u64(params: &[(String, String)], key: &str) -> Option<u64> {
    get_param(params, key).and_then(|v| v.parse().ok())
}

/// Parse a boolean parameter; accepts `true`/`false` and `1`/`0`.
pub fn get_bool(params: &[(String, String)], key: &str) -> Option<bool> {
    match get_param(params, key)? {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// `{"ok":true}` — the reply for mutations with nothing else to report.
pub fn ok_reply() -> String {
    r#"{"ok":true}"#.to_string()
}

/// `{"error":"..."}` with the message JSON-escaped.
pub fn error_reply(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}
