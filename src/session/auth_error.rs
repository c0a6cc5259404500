//! Detection of upstream authentication failures.
//!
//! The backend relays provider errors as free text, so detection is layered: a
//! structured check (HTTP status, `code` field) first, then an ordered list of
//! substring predicates over the lowercased payload. The heuristic is best effort
//! and can both miss and over-match.

use serde_json::Value;

struct AuthPattern {
    name: &'static str,
    matches: fn(&str) -> bool,
}

// Ordered; the first match is reported.
const AUTH_EXPIRED_PATTERNS: &[AuthPattern] = &[
    AuthPattern {
        name: "access-token-expired",
        matches: |t| t.contains("access token") && t.contains("expired"),
    },
    AuthPattern {
        name: "invalid-access-token",
        matches: |t| t.contains("invalid access token"),
    },
    AuthPattern {
        name: "authentication-token",
        matches: |t| t.contains("authentication token"),
    },
    AuthPattern {
        name: "status-401",
        matches: |t| t.contains("status\":401"),
    },
    AuthPattern {
        name: "provider-401",
        matches: |t| {
            t.contains("spotify api hatası (401)") || t.contains("spotify api error (401)")
        },
    },
];

const STRUCTURED_AUTH_CODES: &[&str] = &["auth_expired", "token_expired", "invalid_token"];

fn payload_text(detail: &Value) -> String {
    match detail {
        Value::String(s) => s.clone(),
        Value::Object(_) | Value::Array(_) => detail.to_string(),
        _ => String::new(),
    }
}

/// Name of the first heuristic pattern matching `detail`, if any.
pub fn matched_auth_pattern(detail: &Value) -> Option<&'static str> {
    let lowered = payload_text(detail).to_lowercase();
    AUTH_EXPIRED_PATTERNS
        .iter()
        .find(|p| (p.matches)(&lowered))
        .map(|p| p.name)
}

/// Heuristic: does this error payload describe an expired or rejected token?
pub fn is_auth_expired_error(detail: &Value) -> bool {
    matched_auth_pattern(detail).is_some()
}

/// Structured check first (401/403, `code` field), string heuristic as fallback.
pub fn is_auth_failure(status: Option<u16>, detail: &Value) -> bool {
    if matches!(status, Some(401) | Some(403)) {
        return true;
    }
    let structured = detail
        .get("code")
        .and_then(Value::as_str)
        .is_some_and(|code| STRUCTURED_AUTH_CODES.contains(&code));
    structured || is_auth_expired_error(detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_known_expiry_messages() {
        assert!(is_auth_expired_error(&json!("Access token has expired")));
        assert!(is_auth_expired_error(&json!("The access token expired")));
        assert!(is_auth_expired_error(&json!("invalid access token")));
        assert!(is_auth_expired_error(&json!("No Authentication Token provided")));
        assert!(is_auth_expired_error(&json!("Spotify API error (401): {...}")));
    }

    #[test]
    fn detects_backend_provider_401_phrase() {
        let detail = json!("Spotify API hatası (401): {\"error\": {\"message\": \"Unauthorized\"}}");
        assert_eq!(matched_auth_pattern(&detail), Some("provider-401"));
        assert!(is_auth_failure(Some(500), &detail));
        assert!(!is_auth_expired_error(&json!("Spotify API hatası (404): not found")));
    }

    #[test]
    fn detects_status_marker_in_structured_payload() {
        let detail = json!({"error": {"status": 401, "message": "Unauthorized"}});
        assert!(is_auth_expired_error(&detail));
        assert_eq!(matched_auth_pattern(&detail), Some("status-401"));
    }

    #[test]
    fn patterns_are_reported_in_order() {
        let detail = json!("Invalid access token: access token expired");
        assert_eq!(matched_auth_pattern(&detail), Some("access-token-expired"));
    }

    #[test]
    fn ignores_unrelated_errors() {
        assert!(!is_auth_expired_error(&json!("Playlist not found")));
        assert!(!is_auth_expired_error(&json!({"status": 404})));
        assert!(!is_auth_expired_error(&json!("token expired")));
        assert!(!is_auth_expired_error(&json!(401)));
        assert!(!is_auth_expired_error(&Value::Null));
    }

    #[test]
    fn structured_layer_wins_before_heuristic() {
        assert!(is_auth_failure(Some(401), &json!("Playlist not found")));
        assert!(is_auth_failure(Some(403), &Value::Null));
        assert!(is_auth_failure(Some(400), &json!({"code": "token_expired"})));
        assert!(is_auth_failure(Some(500), &json!("invalid access token")));
        assert!(!is_auth_failure(Some(500), &json!("Playlist not found")));
        assert!(!is_auth_failure(None, &json!({"code": "rate_limited"})));
    }
}
