//! Authentication protocol engine.
//!
//! Drives an [`AuthMachine`] through one authentication attempt. Each state
//! has one handler; a handler performs the remote call for its state and
//! returns the input that advances the machine. The engine never touches
//! storage.

use crate::auth_fsm::{AuthMachine, AuthMachineInput, AuthMachineState, AuthState};
use crate::{AuthError, AuthResult, ProtocolError, StateError};
use std::time::Duration;
use talk_api::{ApiResponse, Credentials, DeviceIdentity, PasscodeChallenge, TalkApi};
use talk_config_and_utils::RegistrationPolicy;
use talk_session_storage::SessionTokens;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Everything one attempt needs.
#[derive(Debug, Clone)]
pub struct AuthAttempt {
    pub credentials: Credentials,
    pub device: DeviceIdentity,
    /// Tokens from storage; when present a refresh is tried first.
    pub stored_tokens: Option<SessionTokens>,
    /// External token for confirming the passcode directly.
    pub authorization_token: Option<String>,
}

/// How the attempt obtained its tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthVia {
    Refreshed,
    LoggedIn,
}

/// Tokens from a successful attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub tokens: SessionTokens,
    pub via: AuthVia,
}

/// Values carried between handlers within one attempt.
#[derive(Default)]
struct AttemptScratch {
    challenge: Option<PasscodeChallenge>,
    outcome: Option<AuthOutcome>,
}

/// Runs the refresh-or-login protocol.
#[derive(Clone)]
pub struct AuthProtocolEngine {
    api: TalkApi,
    policy: RegistrationPolicy,
}

impl AuthProtocolEngine {
    pub fn new(api: TalkApi, policy: RegistrationPolicy) -> Self {
        Self { api, policy }
    }

    /// Drive `machine` from its current state to a terminal one.
    ///
    /// The machine is left in `Authenticated` or `AuthFailed` so callers can
    /// report where the attempt ended.
    pub async fn run(
        &self,
        machine: &mut AuthMachine,
        attempt: &AuthAttempt,
        cancel: &CancellationToken,
    ) -> AuthResult<AuthOutcome> {
        let mut scratch = AttemptScratch::default();

        loop {
            let step = match machine.state() {
                AuthMachineState::NoSession => Ok(self.on_no_session(attempt)),
                AuthMachineState::RefreshAttempt => self.on_refresh_attempt(attempt, &mut scratch).await,
                AuthMachineState::FullAuthFlow => self.on_full_auth_flow(attempt, &mut scratch).await,
                AuthMachineState::PasscodeGenerated => Ok(self.on_passcode_generated(&scratch)),
                AuthMachineState::AwaitingAuthorization => {
                    Ok(self.on_awaiting_authorization(&scratch).await)
                }
                AuthMachineState::DeviceRegistrationPolling => {
                    self.on_registration_polling(attempt, cancel).await
                }
                AuthMachineState::LoggedIn => self.on_logged_in(attempt, &mut scratch).await,
                AuthMachineState::Authenticated => {
                    return scratch
                        .outcome
                        .take()
                        .ok_or_else(|| StateError::NoTokens.into());
                }
                AuthMachineState::AuthFailed => {
                    return Err(AuthError::InvalidStateTransition(
                        "attempt started from AuthFailed".to_string(),
                    ));
                }
            };

            match step {
                Ok(input) => transition(machine, &input)?,
                Err(err) => {
                    if machine.consume(&AuthMachineInput::Failed).is_err() {
                        warn!(state = ?machine.state(), "attempt aborted outside a failing state");
                    }
                    return Err(err);
                }
            }
        }
    }

    fn on_no_session(&self, attempt: &AuthAttempt) -> AuthMachineInput {
        if attempt.stored_tokens.is_some() {
            debug!("stored tokens found, refreshing");
            AuthMachineInput::TokensFound
        } else {
            info!("no stored tokens, starting full authentication");
            AuthMachineInput::NoTokens
        }
    }

    async fn on_refresh_attempt(
        &self,
        attempt: &AuthAttempt,
        scratch: &mut AttemptScratch,
    ) -> AuthResult<AuthMachineInput> {
        let stored = attempt.stored_tokens.as_ref().ok_or(StateError::NoTokens)?;

        let failure = match self
            .api
            .refresh_tokens(&attempt.credentials, stored, &attempt.device.uuid)
            .await
        {
            Ok(response) if response.is_success() => match tokens_from(&response) {
                Some(tokens) => {
                    info!(token = %tokens.fingerprint(), "tokens refreshed");
                    scratch.outcome = Some(AuthOutcome {
                        tokens,
                        via: AuthVia::Refreshed,
                    });
                    return Ok(AuthMachineInput::RefreshSucceeded);
                }
                None => ProtocolError::RefreshFailed(format!(
                    "response without tokens ({})",
                    response.summary()
                ))
                .to_string(),
            },
            Ok(response) => ProtocolError::RefreshFailed(response.summary()).to_string(),
            Err(e) => format!("token refresh request failed: {}", e),
        };

        warn!(error = %failure, "refresh failed, falling back to full authentication");
        Ok(AuthMachineInput::RefreshRejected)
    }

    async fn on_full_auth_flow(
        &self,
        attempt: &AuthAttempt,
        scratch: &mut AttemptScratch,
    ) -> AuthResult<AuthMachineInput> {
        let response = self
            .api
            .generate_passcode(&attempt.credentials, &attempt.device)
            .await?;

        if !response.is_success() {
            return Err(ProtocolError::PasscodeGenerationFailed(response.summary()).into());
        }

        let challenge =
            PasscodeChallenge::from_response(&response, attempt.authorization_token.clone())
                .ok_or_else(|| {
                    ProtocolError::PasscodeGenerationFailed(format!(
                        "response without passcode ({})",
                        response.summary()
                    ))
                })?;

        info!(passcode = %challenge.passcode, "passcode generated");
        scratch.challenge = Some(challenge);
        Ok(AuthMachineInput::PasscodeIssued)
    }

    fn on_passcode_generated(&self, scratch: &AttemptScratch) -> AuthMachineInput {
        match &scratch.challenge {
            Some(challenge) if challenge.auth_token.is_some() => {
                AuthMachineInput::AuthorizationTokenPresent
            }
            challenge => {
                let window = self.policy.interval() * self.policy.max_attempts;
                info!(
                    passcode = %challenge.as_ref().map(|c| c.passcode.as_str()).unwrap_or_default(),
                    window_secs = window.as_secs(),
                    "confirm the passcode on a signed-in device"
                );
                AuthMachineInput::NoAuthorizationToken
            }
        }
    }

    async fn on_awaiting_authorization(&self, scratch: &AttemptScratch) -> AuthMachineInput {
        let Some((passcode, token)) = scratch
            .challenge
            .as_ref()
            .and_then(|c| c.auth_token.as_deref().map(|t| (c.passcode.as_str(), t)))
        else {
            return AuthMachineInput::AuthorizationAttempted;
        };

        match self.api.authorize_passcode(passcode, token).await {
            Ok(response) if response.is_success() => info!("passcode authorized"),
            Ok(response) => warn!(
                summary = %response.summary(),
                "passcode authorization rejected, continuing with registration"
            ),
            Err(e) => warn!(
                error = %e,
                "passcode authorization request failed, continuing with registration"
            ),
        }
        AuthMachineInput::AuthorizationAttempted
    }

    async fn on_registration_polling(
        &self,
        attempt: &AuthAttempt,
        cancel: &CancellationToken,
    ) -> AuthResult<AuthMachineInput> {
        let max_attempts = self.policy.max_attempts;
        let interval = self.policy.interval();
        let mut last_response = String::from("no response");

        for attempt_no in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(AuthError::Cancelled);
            }

            let response = self
                .api
                .register_device(&attempt.credentials, &attempt.device.uuid)
                .await?;

            if response.is_success() {
                info!(attempt = attempt_no, "device registered");
                return Ok(AuthMachineInput::DeviceRegistered);
            }

            debug!(
                attempt = attempt_no,
                max_attempts,
                status = response.status(),
                "device not registered yet"
            );
            last_response = response.summary();

            if attempt_no < max_attempts {
                wait_or_cancel(interval, cancel).await?;
            }
        }

        Err(ProtocolError::DeviceRegistrationTimeout {
            attempts: max_attempts,
            last_response,
        }
        .into())
    }

    async fn on_logged_in(
        &self,
        attempt: &AuthAttempt,
        scratch: &mut AttemptScratch,
    ) -> AuthResult<AuthMachineInput> {
        let response = self
            .api
            .login(&attempt.credentials, &attempt.device)
            .await?;

        if !response.is_success() {
            return Err(ProtocolError::LoginFailed(response.summary()).into());
        }

        let tokens = tokens_from(&response).ok_or_else(|| {
            ProtocolError::LoginFailed(format!("response without tokens ({})", response.summary()))
        })?;

        info!(token = %tokens.fingerprint(), "logged in");
        scratch.outcome = Some(AuthOutcome {
            tokens,
            via: AuthVia::LoggedIn,
        });
        Ok(AuthMachineInput::TokensIssued)
    }
}

fn transition(machine: &mut AuthMachine, input: &AuthMachineInput) -> AuthResult<()> {
    let old_state = AuthState::from(machine.state());
    machine.consume(input).map_err(|_| {
        AuthError::InvalidStateTransition(format!(
            "Cannot apply {:?} in state {:?}",
            input,
            machine.state()
        ))
    })?;
    debug!(
        old_state = ?old_state,
        new_state = ?AuthState::from(machine.state()),
        "Auth state transition"
    );
    Ok(())
}

async fn wait_or_cancel(interval: Duration, cancel: &CancellationToken) -> AuthResult<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AuthError::Cancelled),
        _ = tokio::time::sleep(interval) => Ok(()),
    }
}

/// Both tokens as non-empty strings, or nothing.
fn tokens_from(response: &ApiResponse) -> Option<SessionTokens> {
    SessionTokens::new(
        response.str_field("access_token")?,
        response.str_field("refresh_token")?,
    )
}
