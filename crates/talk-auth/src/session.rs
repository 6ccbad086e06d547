//! Session management.
//!
//! [`SessionManager`] resolves an authenticated session before every protected
//! call: it loads the stored record, runs the protocol engine, and persists
//! the resulting tokens before any of them is used.

use crate::auth_fsm::{AuthMachine, AuthMachineInput, AuthMachineState, AuthState};
use crate::engine::{AuthAttempt, AuthProtocolEngine, AuthVia};
use crate::AuthResult;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use talk_api::{ApiResponse, Attachment, Credentials, DeviceIdentity, TalkApi, TransportClient};
use talk_config_and_utils::{Config, DeviceDefaults};
use talk_session_storage::{PersistedSession, SessionStore, SessionTokens};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Outcome of [`SessionManager::send_message`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SendResult {
    /// The service accepted the message (`result == "ok"`).
    Delivered { response: ApiResponse },
    /// The service answered without accepting the message.
    Rejected { response: ApiResponse },
    /// Authentication or transport failed; the message was not sent.
    Failed { reason: String },
}

impl SendResult {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendResult::Delivered { .. })
    }
}

/// A session that was authenticated and persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSession {
    pub device_uuid: String,
    pub tokens: SessionTokens,
    pub via: AuthVia,
}

/// Owns the session record and the authentication lifecycle.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    api: TalkApi,
    engine: AuthProtocolEngine,
    device_defaults: DeviceDefaults,
    credentials: Credentials,
    authorization_token: Mutex<Option<String>>,
    /// Serializes authentication attempts within the process.
    attempt_gate: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
    last_state: Mutex<AuthMachineState>,
}

impl SessionManager {
    pub fn new(
        config: &Config,
        store: Arc<dyn SessionStore>,
        transport: Arc<dyn TransportClient>,
        credentials: Credentials,
    ) -> Self {
        let api = TalkApi::new(transport, config.api.clone());
        let engine = AuthProtocolEngine::new(api.clone(), config.registration.clone());
        Self {
            store,
            api,
            engine,
            device_defaults: config.device.clone(),
            credentials,
            authorization_token: Mutex::new(None),
            attempt_gate: tokio::sync::Mutex::new(()),
            cancel: CancellationToken::new(),
            last_state: Mutex::new(AuthMachineState::NoSession),
        }
    }

    /// Token for abandoning the registration wait of [`send_message`].
    ///
    /// Cancellation is permanent: later `send_message` calls fail with a
    /// cancellation reason.
    ///
    /// [`send_message`]: SessionManager::send_message
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// External token used to confirm the passcode without a second device.
    pub fn set_authorization_token(&self, token: Option<String>) {
        *self.authorization_token.lock() = token.filter(|t| !t.is_empty());
    }

    /// State where the last authentication attempt ended.
    pub fn auth_state(&self) -> AuthState {
        AuthState::from(&*self.last_state.lock())
    }

    /// The stored record, without any network call.
    pub fn stored_session(&self) -> AuthResult<PersistedSession> {
        Ok(self.store.load()?)
    }

    /// Refresh the stored session, or run the full login flow, and persist
    /// the result.
    pub async fn ensure_authenticated(
        &self,
        cancel: &CancellationToken,
    ) -> AuthResult<AuthenticatedSession> {
        let _gate = self.attempt_gate.lock().await;
        let _lock = self.store.lock()?;

        let mut session = self.store.load()?;
        let device_uuid = self.store.load_or_create_device_uuid(&mut session);

        let attempt = AuthAttempt {
            credentials: self.credentials.clone(),
            device: DeviceIdentity::new(device_uuid.clone(), &self.device_defaults),
            stored_tokens: session.tokens().cloned(),
            authorization_token: self.authorization_token.lock().clone(),
        };

        let mut machine = AuthMachine::new();
        let result = self.engine.run(&mut machine, &attempt, cancel).await;
        *self.last_state.lock() = machine.state().clone();
        let outcome = result?;

        session.set_tokens(outcome.tokens.clone());
        self.store.save(&session)?;
        info!(via = ?outcome.via, "session persisted");

        Ok(AuthenticatedSession {
            device_uuid,
            tokens: outcome.tokens,
            via: outcome.via,
        })
    }

    /// Authenticate, then send `message` to `chat_id`.
    ///
    /// Never returns an error: failures are logged once and reported as
    /// [`SendResult::Failed`].
    pub async fn send_message(
        &self,
        chat_id: i64,
        message: &str,
        attachment: Option<&Attachment>,
    ) -> SendResult {
        let session = match self.ensure_authenticated(&self.cancel).await {
            Ok(session) => session,
            Err(e) => {
                error!(chat_id, error = %e, "authentication failed, message not sent");
                return SendResult::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let response = match self
            .api
            .send_message(
                chat_id,
                message,
                attachment,
                &session.device_uuid,
                &session.tokens,
            )
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(chat_id, error = %e, "message delivery failed");
                return SendResult::Failed {
                    reason: format!("message delivery failed: {}", e),
                };
            }
        };

        if response.result_is_ok() {
            info!(chat_id, "message delivered");
            SendResult::Delivered { response }
        } else {
            warn!(chat_id, summary = %response.summary(), "message rejected");
            SendResult::Rejected { response }
        }
    }

    /// Drop the stored tokens. The device uuid is kept.
    pub async fn logout(&self) -> AuthResult<()> {
        let _gate = self.attempt_gate.lock().await;
        let _lock = self.store.lock()?;

        let mut session = self.store.load()?;
        if session.has_tokens() {
            session.clear_tokens();
            self.store.save(&session)?;
            info!("stored tokens removed");
        }

        let mut last_state = self.last_state.lock();
        if matches!(
            *last_state,
            AuthMachineState::Authenticated | AuthMachineState::AuthFailed
        ) {
            let mut machine = AuthMachine::from_state(last_state.clone());
            if machine.consume(&AuthMachineInput::Reset).is_ok() {
                *last_state = machine.state().clone();
            }
        }
        Ok(())
    }
}
