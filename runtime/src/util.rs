use serde_json::Value;
use tollgate_core::HitlError;

pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}

/// Append percent-encoded path segments to `base`, keeping any path prefix it has.
pub fn endpoint_url(base: &str, segments: &[&str]) -> Result<reqwest::Url, HitlError> {
    let mut url = reqwest::Url::parse(base)
        .map_err(|e| HitlError::Network(format!("Invalid base URL '{base}': {e}")))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| HitlError::Network(format!("Base URL '{base}' cannot carry a path")))?;
        path.pop_if_empty().extend(segments);
    }
    Ok(url)
}

/// Parse a response body leniently: empty or unparsable bodies become `Null`.
pub fn parse_response_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes).unwrap_or(Value::Null)
}

pub fn read_json_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn parse_env_u64_with_bounds(
    raw: Option<String>,
    min: u64,
    max: u64,
    default: u64,
) -> (u64, bool) {
    match raw.and_then(|value| value.trim().parse::<u64>().ok()) {
        Some(parsed) => (parsed.clamp(min, max), true),
        None => (default, false),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn endpoint_url_encodes_segments_and_keeps_prefix() {
        let url = endpoint_url(
            "http://localhost:8000/engine/",
            &["api", "workflow", "s 1", "response"],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/engine/api/workflow/s%201/response"
        );
        let url = endpoint_url("http://localhost:8000", &["ws", "w1"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/ws/w1");
    }

    #[test]
    fn endpoint_url_rejects_garbage_base() {
        assert!(endpoint_url("not a url", &["x"]).is_err());
    }

    #[test]
    fn parse_response_body_is_lenient() {
        assert_eq!(parse_response_body(b""), Value::Null);
        assert_eq!(parse_response_body(b"<html>oops"), Value::Null);
        assert_eq!(parse_response_body(br#"{"ok":true}"#), json!({"ok": true}));
    }

    #[test]
    fn read_json_string_takes_first_non_blank_key() {
        let data = json!({"prompt": "  ", "message": "Proceed?"});
        assert_eq!(
            read_json_string(&data, &["prompt", "message"]).as_deref(),
            Some("Proceed?")
        );
        assert_eq!(read_json_string(&data, &["missing"]), None);
    }

    #[test]
    fn parse_env_u64_with_bounds_clamps_and_defaults() {
        assert_eq!(parse_env_u64_with_bounds(Some("5".into()), 10, 100, 50), (10, true));
        assert_eq!(parse_env_u64_with_bounds(Some("500".into()), 10, 100, 50), (100, true));
        assert_eq!(parse_env_u64_with_bounds(Some("abc".into()), 10, 100, 50), (50, false));
        assert_eq!(parse_env_u64_with_bounds(None, 10, 100, 50), (50, false));
    }
}
