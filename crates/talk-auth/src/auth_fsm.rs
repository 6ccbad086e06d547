//! Authentication protocol state machine using rust-fsm.
//!
//! One machine is created per authentication attempt. The engine owns the
//! side effects; the machine only decides which state comes next.
//!
//! ## State Diagram
//!
//! ```text
//!                 ┌─────────────┐
//!                 │  NoSession  │ (initial)
//!                 └──────┬──────┘
//!          TokensFound   │   NoTokens
//!        ┌───────────────┴───────────────┐
//!        ▼                               ▼
//! ┌────────────────┐  RefreshRejected ┌──────────────┐
//! │ RefreshAttempt │ ───────────────► │ FullAuthFlow │
//! └───────┬────────┘                  └──────┬───────┘
//!         │ RefreshSucceeded                 │ PasscodeIssued
//!         │                                  ▼
//!         │                         ┌───────────────────┐
//!         │                         │ PasscodeGenerated │
//!         │                         └─────────┬─────────┘
//!         │      AuthorizationTokenPresent    │    NoAuthorizationToken
//!         │            ┌──────────────────────┤
//!         │            ▼                      │
//!         │  ┌───────────────────────┐        │
//!         │  │ AwaitingAuthorization │        │
//!         │  └───────────┬───────────┘        │
//!         │              │ AuthorizationAttempted
//!         │              ▼                    ▼
//!         │       ┌───────────────────────────────┐
//!         │       │   DeviceRegistrationPolling   │
//!         │       └───────────────┬───────────────┘
//!         │                       │ DeviceRegistered
//!         │                       ▼
//!         │                 ┌──────────┐
//!         │                 │ LoggedIn │
//!         │                 └────┬─────┘
//!         │                      │ TokensIssued
//!         ▼                      ▼
//!       ┌──────────────────────────┐
//!       │      Authenticated       │
//!       └──────────────────────────┘
//! ```
//!
//! `Failed` moves FullAuthFlow, DeviceRegistrationPolling and LoggedIn to
//! `AuthFailed`. Both terminal states accept `Reset`.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub auth_machine(NoSession)

    NoSession => {
        TokensFound => RefreshAttempt,
        NoTokens => FullAuthFlow
    },
    RefreshAttempt => {
        RefreshSucceeded => Authenticated,
        // Rejected, malformed, or unreachable: never fatal
        RefreshRejected => FullAuthFlow
    },
    FullAuthFlow => {
        PasscodeIssued => PasscodeGenerated,
        Failed => AuthFailed
    },
    PasscodeGenerated => {
        AuthorizationTokenPresent => AwaitingAuthorization,
        NoAuthorizationToken => DeviceRegistrationPolling
    },
    AwaitingAuthorization => {
        // Best effort; the outcome does not gate progress
        AuthorizationAttempted => DeviceRegistrationPolling
    },
    DeviceRegistrationPolling => {
        DeviceRegistered => LoggedIn,
        Failed => AuthFailed
    },
    LoggedIn => {
        TokensIssued => Authenticated,
        Failed => AuthFailed
    },
    Authenticated => {
        Reset => NoSession
    },
    AuthFailed => {
        Reset => NoSession
    }
}

pub use auth_machine::Input as AuthMachineInput;
pub use auth_machine::State as AuthMachineState;
pub use auth_machine::StateMachine as AuthMachine;

/// Serializable view of the machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    NoSession,
    RefreshAttempt,
    FullAuthFlow,
    PasscodeGenerated,
    AwaitingAuthorization,
    DeviceRegistrationPolling,
    LoggedIn,
    Authenticated,
    AuthFailed,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated)
    }

    /// True while an attempt is in progress.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            AuthState::NoSession | AuthState::Authenticated | AuthState::AuthFailed
        )
    }
}

impl From<&AuthMachineState> for AuthState {
    fn from(state: &AuthMachineState) -> Self {
        match state {
            AuthMachineState::NoSession => AuthState::NoSession,
            AuthMachineState::RefreshAttempt => AuthState::RefreshAttempt,
            AuthMachineState::FullAuthFlow => AuthState::FullAuthFlow,
            AuthMachineState::PasscodeGenerated => AuthState::PasscodeGenerated,
            AuthMachineState::AwaitingAuthorization => AuthState::AwaitingAuthorization,
            AuthMachineState::DeviceRegistrationPolling => AuthState::DeviceRegistrationPolling,
            AuthMachineState::LoggedIn => AuthState::LoggedIn,
            AuthMachineState::Authenticated => AuthState::Authenticated,
            AuthMachineState::AuthFailed => AuthState::AuthFailed,
        }
    }
}
