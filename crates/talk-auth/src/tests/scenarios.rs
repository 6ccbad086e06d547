//! End-to-end authentication attempts and what they leave on disk.

use super::harness::{
    Endpoint, Reply, ScriptedTransport, TestHarness, EMAIL, PASSWORD, SEEDED_UUID,
};
use crate::{AuthError, AuthState, AuthVia, ProtocolError, SessionManager};
use serde_json::json;
use std::sync::Arc;
use talk_api::Credentials;
use talk_config_and_utils::Config;
use talk_session_storage::{
    MemorySessionStore, PersistedSession, SessionStore, SessionTokens, StorageError,
};
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn fresh_device_full_flow_persists_tokens() {
    let harness = TestHarness::new();
    harness.transport.queue(Endpoint::Register, Reply::status(1));
    harness.transport.queue(Endpoint::Register, Reply::status(1));
    harness.transport.queue(Endpoint::Register, Reply::status(0));

    let session = harness
        .manager
        .ensure_authenticated(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(session.via, AuthVia::LoggedIn);
    assert_eq!(harness.transport.count(Endpoint::Register), 3);
    assert_eq!(harness.transport.count(Endpoint::Refresh), 0);

    let on_disk = harness.session_json();
    assert_eq!(on_disk["access_token"], "AT1");
    assert_eq!(on_disk["refresh_token"], "RT1");
    let uuid = on_disk["device_uuid"].as_str().unwrap();
    assert_eq!(uuid.len(), 40);
    assert_eq!(uuid, session.device_uuid);

    let generate = &harness.transport.calls_to(Endpoint::Generate)[0];
    assert_eq!(generate.request.body["device"]["uuid"], uuid);
    assert_eq!(generate.request.body["email"], EMAIL);
    assert_eq!(generate.request.header_value("Authorization"), Some(EMAIL));
}

#[tokio::test(start_paused = true)]
async fn stored_session_refreshes_and_overwrites_tokens() {
    let harness = TestHarness::new();
    harness.seed(SEEDED_UUID, "AT0", "RT0");

    harness
        .manager
        .ensure_authenticated(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(harness.transport.count(Endpoint::Generate), 0);
    assert_eq!(harness.transport.count(Endpoint::Register), 0);
    assert_eq!(
        harness.session_json(),
        json!({
            "device_uuid": SEEDED_UUID,
            "access_token": "AT2",
            "refresh_token": "RT2"
        })
    );
}

#[tokio::test(start_paused = true)]
async fn device_uuid_survives_reauthentication() {
    let harness = TestHarness::new();
    let first = harness
        .manager
        .ensure_authenticated(&CancellationToken::new())
        .await
        .unwrap();
    let second = harness
        .manager
        .ensure_authenticated(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(first.device_uuid, second.device_uuid);
    assert_eq!(second.via, AuthVia::Refreshed);
}

#[tokio::test(start_paused = true)]
async fn passcode_failure_aborts_before_registration() {
    let harness = TestHarness::new();
    harness.transport.queue(Endpoint::Generate, Reply::status(-100));

    let result = harness
        .manager
        .ensure_authenticated(&CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(AuthError::Protocol(ProtocolError::PasscodeGenerationFailed(_)))
    ));
    assert_eq!(harness.transport.count(Endpoint::Register), 0);
    assert_eq!(harness.manager.auth_state(), AuthState::AuthFailed);
    assert!(!harness.session_path().exists());
}

#[tokio::test(start_paused = true)]
async fn passcode_transport_error_aborts() {
    let harness = TestHarness::new();
    harness
        .transport
        .queue(Endpoint::Generate, Reply::TransportFailure);

    let result = harness
        .manager
        .ensure_authenticated(&CancellationToken::new())
        .await;

    assert!(matches!(result, Err(AuthError::Transport(_))));
    assert_eq!(harness.transport.sequence(), vec![Endpoint::Generate]);
}

#[tokio::test(start_paused = true)]
async fn login_rejection_is_login_failed() {
    let harness = TestHarness::new();
    harness.transport.queue(Endpoint::Login, Reply::status(-1));

    let result = harness
        .manager
        .ensure_authenticated(&CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(AuthError::Protocol(ProtocolError::LoginFailed(_)))
    ));
    assert!(!harness.session_path().exists());
}

#[tokio::test(start_paused = true)]
async fn login_with_empty_token_is_login_failed() {
    let harness = TestHarness::new();
    harness.transport.queue(Endpoint::Login, Reply::tokens("AT1", ""));

    let result = harness
        .manager
        .ensure_authenticated(&CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(AuthError::Protocol(ProtocolError::LoginFailed(_)))
    ));
}

#[tokio::test(start_paused = true)]
async fn login_request_signed_with_query_parameters() {
    let harness = TestHarness::new();
    let session = harness
        .manager
        .ensure_authenticated(&CancellationToken::new())
        .await
        .unwrap();

    let login = &harness.transport.calls_to(Endpoint::Login)[0];
    assert!(login.request.url.contains("forced=true"));
    assert!(login.request.url.contains("permanent=true"));
    assert!(login.request.url.contains("one_store=false"));
    assert!(login
        .request
        .url
        .contains(&format!("device_uuid={}", session.device_uuid)));
    assert!(login.request.body.is_empty());
    assert_eq!(login.request.header_value("Accept-Encoding"), Some("gzip"));
}

#[tokio::test(start_paused = true)]
async fn authorization_token_triggers_passcode_authorization() {
    let harness = TestHarness::new();
    harness
        .manager
        .set_authorization_token(Some("ext-token".to_string()));

    harness
        .manager
        .ensure_authenticated(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        harness.transport.sequence(),
        vec![
            Endpoint::Generate,
            Endpoint::Authorize,
            Endpoint::Register,
            Endpoint::Login
        ]
    );
    let authorize = &harness.transport.calls_to(Endpoint::Authorize)[0];
    assert_eq!(authorize.request.body["passcode"], "123456");
    assert_eq!(authorize.request.header_value("Authorization"), Some("ext-token"));
}

#[tokio::test(start_paused = true)]
async fn authorization_failure_does_not_gate_registration() {
    let harness = TestHarness::new();
    harness
        .manager
        .set_authorization_token(Some("ext-token".to_string()));
    harness
        .transport
        .queue(Endpoint::Authorize, Reply::TransportFailure);

    let session = harness
        .manager
        .ensure_authenticated(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(session.tokens.access_token(), "AT1");
    assert_eq!(harness.transport.count(Endpoint::Register), 1);
}

#[tokio::test(start_paused = true)]
async fn without_authorization_token_no_authorize_call() {
    let harness = TestHarness::new();
    harness.manager.set_authorization_token(Some(String::new()));

    harness
        .manager
        .ensure_authenticated(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(harness.transport.count(Endpoint::Authorize), 0);
}

#[tokio::test(start_paused = true)]
async fn store_locked_by_another_process() {
    let harness = TestHarness::new();
    let _held = harness.store.lock().unwrap();

    let result = harness
        .manager
        .ensure_authenticated(&CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(AuthError::Storage(StorageError::Locked(_)))
    ));
    assert!(harness.transport.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn lock_released_after_attempt() {
    let harness = TestHarness::new();
    harness
        .manager
        .ensure_authenticated(&CancellationToken::new())
        .await
        .unwrap();

    assert!(!harness.store.lock_path().exists());
    assert!(harness.store.lock().is_ok());
}

#[tokio::test(start_paused = true)]
async fn logout_keeps_device_uuid() {
    let harness = TestHarness::new();
    let session = harness
        .manager
        .ensure_authenticated(&CancellationToken::new())
        .await
        .unwrap();

    harness.manager.logout().await.unwrap();

    let stored = harness.manager.stored_session().unwrap();
    assert!(!stored.has_tokens());
    assert_eq!(stored.device_uuid(), Some(session.device_uuid.as_str()));
    assert_eq!(harness.manager.auth_state(), AuthState::NoSession);
}

#[tokio::test(start_paused = true)]
async fn concurrent_attempts_are_serialized() {
    let harness = TestHarness::new();
    let first = {
        let manager = harness.manager.clone();
        tokio::spawn(async move { manager.ensure_authenticated(&CancellationToken::new()).await })
    };
    let second = {
        let manager = harness.manager.clone();
        tokio::spawn(async move { manager.ensure_authenticated(&CancellationToken::new()).await })
    };

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();

    assert_eq!(first.device_uuid, second.device_uuid);
    assert_eq!(harness.transport.count(Endpoint::Login), 1);
    assert_eq!(harness.transport.count(Endpoint::Refresh), 1);
}

#[tokio::test(start_paused = true)]
async fn in_memory_store_saves_once_and_releases_lock() {
    let transport = Arc::new(ScriptedTransport::new());
    let store = MemorySessionStore::with_session(PersistedSession::new(
        Some(SEEDED_UUID.to_string()),
        SessionTokens::new("AT0", "RT0"),
    ));
    let manager = SessionManager::new(
        &Config::default(),
        Arc::new(store.clone()),
        transport.clone(),
        Credentials::new(EMAIL, PASSWORD),
    );

    let session = manager
        .ensure_authenticated(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(session.via, AuthVia::Refreshed);
    assert_eq!(transport.sequence(), vec![Endpoint::Refresh]);
    assert_eq!(store.save_count(), 1);
    assert!(!store.is_locked());
    assert_eq!(store.load().unwrap().tokens().unwrap().access_token(), "AT2");
}

#[tokio::test(start_paused = true)]
async fn in_memory_store_held_lock_blocks_attempt() {
    let transport = Arc::new(ScriptedTransport::new());
    let store = MemorySessionStore::new();
    let manager = SessionManager::new(
        &Config::default(),
        Arc::new(store.clone()),
        transport.clone(),
        Credentials::new(EMAIL, PASSWORD),
    );

    let held = store.lock().unwrap();
    let result = manager.ensure_authenticated(&CancellationToken::new()).await;
    assert!(matches!(
        result,
        Err(AuthError::Storage(StorageError::Locked(_)))
    ));
    assert!(transport.calls().is_empty());

    drop(held);
    manager
        .ensure_authenticated(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(store.save_count(), 1);
}
