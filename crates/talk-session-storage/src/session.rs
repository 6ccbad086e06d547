//! Session record types.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Random bytes in a device uuid (hex-encoded to 40 characters).
pub const DEVICE_UUID_BYTES: usize = 20;

/// Generate a fresh device uuid: 20 random bytes, lowercase hex.
pub fn generate_device_uuid() -> String {
    let mut bytes = [0u8; DEVICE_UUID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Access/refresh token pair.
///
/// Both tokens are always present and non-empty; a half pair cannot be
/// constructed.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionTokens {
    access_token: String,
    refresh_token: String,
}

impl SessionTokens {
    /// Returns `None` when either token is empty.
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Option<Self> {
        let access_token = access_token.into();
        let refresh_token = refresh_token.into();
        if access_token.is_empty() || refresh_token.is_empty() {
            return None;
        }
        Some(Self {
            access_token,
            refresh_token,
        })
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// Short, non-reversible label for logs.
    pub fn fingerprint(&self) -> String {
        let prefix: String = self.access_token.chars().take(4).collect();
        format!("{}…({})", prefix, self.access_token.len())
    }
}

impl fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokens")
            .field("access_token", &self.fingerprint())
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// The on-disk session: device uuid plus the current token pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SessionRecord", into = "SessionRecord")]
pub struct PersistedSession {
    device_uuid: Option<String>,
    tokens: Option<SessionTokens>,
}

/// Wire shape of the session file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    device_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

impl From<SessionRecord> for PersistedSession {
    fn from(record: SessionRecord) -> Self {
        let tokens = match (record.access_token, record.refresh_token) {
            (Some(access), Some(refresh)) => SessionTokens::new(access, refresh),
            _ => None,
        };
        Self {
            device_uuid: record.device_uuid.filter(|uuid| !uuid.is_empty()),
            tokens,
        }
    }
}

impl From<PersistedSession> for SessionRecord {
    fn from(session: PersistedSession) -> Self {
        let (access_token, refresh_token) = match session.tokens {
            Some(tokens) => (Some(tokens.access_token), Some(tokens.refresh_token)),
            None => (None, None),
        };
        Self {
            device_uuid: session.device_uuid,
            access_token,
            refresh_token,
        }
    }
}

impl PersistedSession {
    pub fn new(device_uuid: Option<String>, tokens: Option<SessionTokens>) -> Self {
        Self {
            device_uuid,
            tokens,
        }
    }

    pub fn device_uuid(&self) -> Option<&str> {
        self.device_uuid.as_deref()
    }

    pub fn tokens(&self) -> Option<&SessionTokens> {
        self.tokens.as_ref()
    }

    pub fn has_tokens(&self) -> bool {
        self.tokens.is_some()
    }

    pub fn set_tokens(&mut self, tokens: SessionTokens) {
        self.tokens = Some(tokens);
    }

    /// Drop the token pair, keeping the device uuid.
    pub fn clear_tokens(&mut self) {
        self.tokens = None;
    }

    /// Return the stored device uuid, generating one when absent.
    ///
    /// The second element is `true` when a new uuid was generated. Only the
    /// in-memory record changes; persisting it is up to the caller.
    pub fn ensure_device_uuid(&mut self) -> (String, bool) {
        if let Some(uuid) = &self.device_uuid {
            return (uuid.clone(), false);
        }
        let uuid = generate_device_uuid();
        self.device_uuid = Some(uuid.clone());
        (uuid, true)
    }
}
