//! Decoded response bodies.

use serde::Serialize;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Response body: JSON when it parses, raw text otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ApiResponse {
    Json(Value),
    Raw(String),
}

impl ApiResponse {
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str(body) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Raw(body.to_string()),
        }
    }

    /// The service's `status` field. Missing or non-integer reads as `-1`.
    pub fn status(&self) -> i64 {
        match self {
            Self::Json(value) => value.get("status").and_then(Value::as_i64).unwrap_or(-1),
            Self::Raw(_) => -1,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == 0
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Json(value) => value.get(key),
            Self::Raw(_) => None,
        }
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(Value::as_str)
    }

    /// Share API acceptance: `result == "ok"`.
    pub fn result_is_ok(&self) -> bool {
        self.str_field("result") == Some("ok")
    }

    /// Compact description for errors and logs. Never includes the body.
    pub fn summary(&self) -> String {
        let body = match self {
            Self::Json(value) => value.to_string(),
            Self::Raw(text) => text.clone(),
        };
        let mut hasher = DefaultHasher::new();
        body.hash(&mut hasher);
        format!(
            "status={},len={},digest={:016x}",
            self.status(),
            body.len(),
            hasher.finish()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_body_is_decoded() {
        let response = ApiResponse::from_body(r#"{"status":0,"passcode":"123456"}"#);
        assert!(response.is_success());
        assert_eq!(response.str_field("passcode"), Some("123456"));
    }

    #[test]
    fn test_non_json_body_is_raw() {
        let response = ApiResponse::from_body("<html>bad gateway</html>");
        assert_eq!(response, ApiResponse::Raw("<html>bad gateway</html>".to_string()));
        assert_eq!(response.status(), -1);
        assert!(!response.is_success());
    }

    #[test]
    fn test_status_defaults_to_minus_one() {
        assert_eq!(ApiResponse::Json(json!({})).status(), -1);
        assert_eq!(ApiResponse::Json(json!({"status": "0"})).status(), -1);
        assert_eq!(ApiResponse::Json(json!([1, 2])).status(), -1);
        assert_eq!(ApiResponse::Json(json!({"status": -950})).status(), -950);
    }

    #[test]
    fn test_result_is_ok() {
        assert!(ApiResponse::Json(json!({"result": "ok"})).result_is_ok());
        assert!(!ApiResponse::Json(json!({"result": "fail"})).result_is_ok());
        assert!(!ApiResponse::Raw("ok".to_string()).result_is_ok());
    }

    #[test]
    fn test_summary_hides_body() {
        let response = ApiResponse::Json(json!({"status": 1, "access_token": "secret"}));
        let summary = response.summary();
        assert!(summary.starts_with("status=1,"));
        assert!(!summary.contains("secret"));
    }

    #[test]
    fn test_serializes_untagged() {
        let value = serde_json::to_value(ApiResponse::Json(json!({"result": "ok"}))).unwrap();
        assert_eq!(value, json!({"result": "ok"}));
        let value = serde_json::to_value(ApiResponse::Raw("oops".into())).unwrap();
        assert_eq!(value, json!("oops"));
    }
}
