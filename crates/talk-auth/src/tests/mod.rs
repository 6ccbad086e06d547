//! Integration tests for the authentication lifecycle.
//!
//! - `harness.rs`      - scripted transport and a session manager on a temp dir
//! - `refresh.rs`      - stored tokens: refresh and fallback to the full flow
//! - `registration.rs` - device registration polling bounds and cancellation
//! - `scenarios.rs`    - end-to-end attempts and persistence
//! - `send.rs`         - message delivery outcomes and failure logging

mod scenarios;
