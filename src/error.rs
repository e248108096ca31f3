//! Classification of gateway failures.
//!
//! Every failed call is mapped once, here, to an [`ApiError`]. Pages never
//! inspect raw status codes or bodies; they render [`ApiError::user_message`].

use serde_json::Value;

/// Field name and the messages the gateway reported for it, in body order.
pub type FieldErrors = Vec<(String, Vec<String>)>;

/// Shown whenever no response was received at all.
pub const CONNECTIVITY_MESSAGE: &str = "Could not reach the server.";

/// Longest raw body kept in an upstream error message
const MAX_RAW_BODY: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// 401 from any endpoint. Carries the gateway's `detail` when present.
    #[error("authentication required{}", detail_suffix(.detail))]
    Unauthorized { detail: Option<String> },
    #[error("validation failed: {}", join_messages(.fields))]
    Validation { fields: FieldErrors },
    #[error("not found")]
    NotFound,
    #[error("gateway error {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("credential storage failed: {0}")]
    Storage(String),
}

impl ApiError {
    /// Map a non-success response to its error variant.
    pub fn classify(status: u16, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        match status {
            401 => ApiError::Unauthorized {
                detail: parsed.as_ref().and_then(detail_message),
            },
            404 => ApiError::NotFound,
            400 | 422 => match parsed.as_ref().and_then(field_errors) {
                Some(fields) => ApiError::Validation { fields },
                None => ApiError::Upstream {
                    status,
                    message: raw_message(parsed.as_ref(), body),
                },
            },
            _ => ApiError::Upstream {
                status,
                message: raw_message(parsed.as_ref(), body),
            },
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// Text for inline display. `fallback` is the page's generic message for
    /// failures that carry nothing worth showing.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Unauthorized { detail: Some(detail) } if !detail.is_empty() => detail.clone(),
            ApiError::Validation { fields } => {
                let joined = join_messages(fields);
                if joined.is_empty() {
                    fallback.to_string()
                } else {
                    joined
                }
            }
            ApiError::Network(_) => CONNECTIVITY_MESSAGE.to_string(),
            _ => fallback.to_string(),
        }
    }
}

/// All messages, in field order, separated by single spaces.
pub fn join_messages(fields: &FieldErrors) -> String {
    fields
        .iter()
        .flat_map(|(_, messages)| messages.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!(": {}", d))
        .unwrap_or_default()
}

fn detail_message(value: &Value) -> Option<String> {
    ["detail", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

fn field_errors(value: &Value) -> Option<FieldErrors> {
    let mut fields = FieldErrors::new();
    match value {
        Value::Object(map) => {
            for (name, entry) in map {
                let mut messages = Vec::new();
                collect_strings(entry, &mut messages);
                if !messages.is_empty() {
                    fields.push((name.clone(), messages));
                }
            }
        }
        Value::Array(_) => {
            let mut messages = Vec::new();
            collect_strings(value, &mut messages);
            if !messages.is_empty() {
                fields.push(("non_field_errors".to_string(), messages));
            }
        }
        _ => return None,
    }
    if fields.is_empty() {
        None
    } else {
        Some(fields)
    }
}

// Nested serializers (passenger lists) report errors as arrays of objects.
fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect_strings(item, out)),
        Value::Number(n) => out.push(n.to_string()),
        Value::Bool(_) | Value::Null => {}
    }
}

fn raw_message(parsed: Option<&Value>, body: &str) -> String {
    if let Some(message) = parsed.and_then(detail_message) {
        return message;
    }
    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_RAW_BODY {
        format!("{}...", trimmed.chars().take(MAX_RAW_BODY).collect::<String>())
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_unauthorized_keeps_detail() {
        let err = ApiError::classify(401, r#"{"detail": "Invalid credentials"}"#);
        assert_eq!(
            err,
            ApiError::Unauthorized {
                detail: Some("Invalid credentials".to_string())
            }
        );
        assert_eq!(err.user_message("fallback"), "Invalid credentials");
    }

    #[test]
    fn test_classify_unauthorized_without_body() {
        let err = ApiError::classify(401, "");
        assert!(err.is_unauthorized());
        assert_eq!(err.user_message("Login failed."), "Login failed.");
    }

    #[test]
    fn test_classify_validation_fields() {
        let body = r#"{"username": ["A user with that username already exists."], "email": ["Enter a valid email address."]}"#;
        let err = ApiError::classify(400, body);
        match &err {
            ApiError::Validation { fields } => {
                let names: Vec<&str> = fields.iter().map(|(name, _)| name.as_str()).collect();
                assert_eq!(names, vec!["username", "email"]);
                assert_eq!(fields[1].1, vec!["Enter a valid email address.".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            err.user_message("fallback"),
            "A user with that username already exists. Enter a valid email address."
        );
    }

    #[test]
    fn test_validation_messages_follow_body_order() {
        let body = r#"{"password": ["This password is too short."], "email": ["Enter a valid email address."], "username": ["This field is required."]}"#;
        assert_eq!(
            ApiError::classify(400, body).user_message("fallback"),
            "This password is too short. Enter a valid email address. This field is required."
        );
    }

    #[test]
    fn test_classify_error_string_body() {
        let err = ApiError::classify(400, r#"{"error": "No hay suficientes asientos disponibles"}"#);
        assert_eq!(
            err.user_message("fallback"),
            "No hay suficientes asientos disponibles"
        );
    }

    #[test]
    fn test_classify_nested_passenger_errors() {
        let body = r#"{"pasajeros": [{"nombre": ["This field is required."]}, {}]}"#;
        let err = ApiError::classify(400, body);
        assert_eq!(err.user_message("fallback"), "This field is required.");
    }

    #[test]
    fn test_classify_non_json_400_is_upstream() {
        let err = ApiError::classify(400, "<html>bad request</html>");
        assert!(matches!(err, ApiError::Upstream { status: 400, .. }));
        assert_eq!(err.user_message("Something failed."), "Something failed.");
    }

    #[test]
    fn test_classify_not_found_and_server_error() {
        assert_eq!(ApiError::classify(404, r#"{"detail": "Not found."}"#), ApiError::NotFound);
        let err = ApiError::classify(500, "boom");
        assert_eq!(
            err,
            ApiError::Upstream {
                status: 500,
                message: "boom".to_string()
            }
        );
    }

    #[test]
    fn test_network_message_is_generic() {
        let err = ApiError::Network("connection refused".to_string());
        assert_eq!(err.user_message("ignored"), CONNECTIVITY_MESSAGE);
    }

    #[test]
    fn test_raw_message_truncated() {
        let body = "x".repeat(500);
        match ApiError::classify(502, &body) {
            ApiError::Upstream { message, .. } => {
                assert!(message.ends_with("..."));
                assert_eq!(message.len(), MAX_RAW_BODY + 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
