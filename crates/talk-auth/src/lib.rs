//! Authentication and session lifecycle for talkbridge.
//!
//! This crate provides:
//! - An explicit FSM for the authentication protocol (refresh, or passcode,
//!   device registration and login)
//! - [`AuthProtocolEngine`], which drives one authentication attempt
//! - [`SessionManager`], which persists the resulting session and sends
//!   messages with it

mod auth_fsm;
mod engine;
mod error;
mod session;

#[cfg(test)]
mod tests;

pub use auth_fsm::auth_machine;
pub use auth_fsm::{AuthMachine, AuthMachineInput, AuthMachineState, AuthState};
pub use engine::{AuthAttempt, AuthOutcome, AuthProtocolEngine, AuthVia};
pub use error::{AuthError, AuthResult, ProtocolError, StateError};
pub use session::{AuthenticatedSession, SendResult, SessionManager};
