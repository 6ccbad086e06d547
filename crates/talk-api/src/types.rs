//! Values passed to and from the remote operations.

use crate::ApiResponse;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use talk_config_and_utils::DeviceDefaults;

/// The device this client registers as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub uuid: String,
    pub name: String,
    pub model: String,
    pub os_version: String,
}

impl DeviceIdentity {
    pub fn new(uuid: impl Into<String>, defaults: &DeviceDefaults) -> Self {
        Self {
            uuid: uuid.into(),
            name: defaults.name.clone(),
            model: defaults.model.clone(),
            os_version: defaults.os_version.clone(),
        }
    }
}

/// Account credentials. Held in memory only.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Extra payload attached to a chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Chat log type; plain text is 1.
    #[serde(rename = "type", default = "default_attachment_kind")]
    pub kind: i64,
    pub payload: Value,
}

fn default_attachment_kind() -> i64 {
    Attachment::DEFAULT_KIND
}

impl Attachment {
    pub const DEFAULT_KIND: i64 = 1;

    pub fn new(payload: Value) -> Self {
        Self {
            kind: Self::DEFAULT_KIND,
            payload,
        }
    }

    pub fn with_kind(kind: i64, payload: Value) -> Self {
        Self { kind, payload }
    }

    /// `extra` field value: the payload as a JSON string. An empty payload
    /// encodes as `{}`.
    pub fn encode_extra(&self) -> Result<String, serde_json::Error> {
        match &self.payload {
            Value::Null => Ok("{}".to_string()),
            payload => serde_json::to_string(payload),
        }
    }
}

/// Passcode issued by `generate_passcode`, consumed within the same attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct PasscodeChallenge {
    pub passcode: String,
    /// External token used to confirm the passcode without a second device.
    pub auth_token: Option<String>,
}

impl PasscodeChallenge {
    /// Read the passcode from a successful generate response. The service
    /// sends it as a string, sometimes as a number.
    pub fn from_response(response: &ApiResponse, auth_token: Option<String>) -> Option<Self> {
        let passcode = match response.field("passcode")? {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        Some(Self {
            passcode,
            auth_token,
        })
    }
}

impl fmt::Debug for PasscodeChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasscodeChallenge")
            .field("passcode", &self.passcode)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("user@example.com", "hunter2");
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("user@example.com"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_device_identity_from_defaults() {
        let device = DeviceIdentity::new("abc", &DeviceDefaults::default());
        assert_eq!(device.uuid, "abc");
        assert_eq!(device.name, "talkbridge");
    }

    #[test]
    fn test_attachment_defaults_to_text_kind() {
        let attachment: Attachment = serde_json::from_value(json!({"payload": {"k": "v"}})).unwrap();
        assert_eq!(attachment.kind, 1);
        assert_eq!(attachment.encode_extra().unwrap(), r#"{"k":"v"}"#);
        assert_eq!(Attachment::new(Value::Null).encode_extra().unwrap(), "{}");
    }

    #[test]
    fn test_challenge_accepts_string_or_number() {
        let from_str = ApiResponse::Json(json!({"status": 0, "passcode": "123456"}));
        assert_eq!(
            PasscodeChallenge::from_response(&from_str, None).unwrap().passcode,
            "123456"
        );
        let from_num = ApiResponse::Json(json!({"status": 0, "passcode": 654321}));
        assert_eq!(
            PasscodeChallenge::from_response(&from_num, None).unwrap().passcode,
            "654321"
        );
        let missing = ApiResponse::Json(json!({"status": 0}));
        assert!(PasscodeChallenge::from_response(&missing, None).is_none());
    }
}
