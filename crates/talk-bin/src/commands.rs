//! Subcommand handlers. Each returns the process exit code.

use anyhow::{bail, Context};
use serde_json::{json, Value};
use std::sync::Arc;
use talk_api::{Attachment, Credentials, HttpTransport};
use talk_auth::{AuthVia, SendResult, SessionManager};
use talk_config_and_utils::{Config, Paths};
use talk_session_storage::{FileSessionStore, SessionStore};
use tracing::info;

/// Account inputs taken from flags or the environment.
pub struct AuthArgs {
    pub email: Option<String>,
    pub password: Option<String>,
    pub auth_token: Option<String>,
}

impl AuthArgs {
    fn credentials(&self) -> anyhow::Result<Credentials> {
        match (self.email.as_deref(), self.password.as_deref()) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Ok(Credentials::new(email, password))
            }
            _ => bail!("--email and --password (or TALK_EMAIL and TALK_PASSWORD) are required"),
        }
    }
}

/// Build an attachment from its JSON payload.
pub fn parse_attachment(payload: Option<&str>, kind: i64) -> anyhow::Result<Option<Attachment>> {
    payload
        .map(|raw| {
            let value: Value = serde_json::from_str(raw).context("attachment is not valid JSON")?;
            Ok(Attachment::with_kind(kind, value))
        })
        .transpose()
}

fn manager(config: &Config, paths: &Paths, credentials: Credentials) -> anyhow::Result<SessionManager> {
    let store = Arc::new(FileSessionStore::new(paths.session_file()));
    let transport = Arc::new(HttpTransport::new(config.api.clone())?);
    Ok(SessionManager::new(config, store, transport, credentials))
}

/// Cancel the manager's registration wait on Ctrl-C.
fn cancel_on_ctrl_c(manager: &SessionManager) {
    let token = manager.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling");
            token.cancel();
        }
    });
}

pub async fn send(
    config: &Config,
    paths: &Paths,
    auth: AuthArgs,
    chat_id: i64,
    message: &str,
    attachment: Option<Attachment>,
) -> anyhow::Result<i32> {
    let manager = manager(config, paths, auth.credentials()?)?;
    manager.set_authorization_token(auth.auth_token);
    cancel_on_ctrl_c(&manager);

    let result = manager
        .send_message(chat_id, message, attachment.as_ref())
        .await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(match result {
        SendResult::Failed { .. } => 1,
        _ => 0,
    })
}

pub async fn login(config: &Config, paths: &Paths, auth: AuthArgs) -> anyhow::Result<i32> {
    let manager = manager(config, paths, auth.credentials()?)?;
    manager.set_authorization_token(auth.auth_token);
    cancel_on_ctrl_c(&manager);

    let outcome = manager
        .ensure_authenticated(&manager.cancellation_token())
        .await;
    let (code, report) = match outcome {
        Ok(session) => (
            0,
            json!({
                "state": manager.auth_state(),
                "device_uuid": session.device_uuid,
                "via": match session.via {
                    AuthVia::Refreshed => "refreshed",
                    AuthVia::LoggedIn => "logged_in",
                },
            }),
        ),
        Err(e) => (
            1,
            json!({
                "state": manager.auth_state(),
                "error": e.to_string(),
            }),
        ),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(code)
}

pub fn status(paths: &Paths) -> anyhow::Result<i32> {
    let store = FileSessionStore::new(paths.session_file());
    let session = store.load()?;
    let report = json!({
        "session_file": paths.session_file(),
        "device_uuid": session.device_uuid(),
        "has_tokens": session.has_tokens(),
        "token": session.tokens().map(|tokens| tokens.fingerprint()),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(0)
}

pub async fn logout(config: &Config, paths: &Paths) -> anyhow::Result<i32> {
    // Dropping tokens never reaches the service, so no account is needed.
    let manager = manager(config, paths, Credentials::new("", ""))?;
    manager.logout().await?;
    println!("{}", json!({ "status": "logged_out" }));
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use talk_session_storage::{PersistedSession, SessionTokens};
    use tempfile::tempdir;

    fn args(email: Option<&str>, password: Option<&str>) -> AuthArgs {
        AuthArgs {
            email: email.map(str::to_string),
            password: password.map(str::to_string),
            auth_token: None,
        }
    }

    #[test]
    fn credentials_require_email_and_password() {
        assert!(args(Some("a@b.c"), Some("pw")).credentials().is_ok());
        assert!(args(Some("a@b.c"), None).credentials().is_err());
        assert!(args(None, Some("pw")).credentials().is_err());
        assert!(args(Some(""), Some("pw")).credentials().is_err());
    }

    #[test]
    fn attachment_parsed_with_kind() {
        let attachment = parse_attachment(Some(r#"{"url":"x"}"#), 2)
            .unwrap()
            .unwrap();
        assert_eq!(attachment.kind, 2);
        assert_eq!(attachment.payload, json!({"url": "x"}));
    }

    #[test]
    fn missing_attachment_is_none() {
        assert!(parse_attachment(None, 1).unwrap().is_none());
    }

    #[test]
    fn invalid_attachment_json_is_rejected() {
        assert!(parse_attachment(Some("{not json"), 1).is_err());
    }

    #[tokio::test]
    async fn logout_clears_tokens_without_network() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let store = FileSessionStore::new(paths.session_file());
        store
            .save(&PersistedSession::new(
                Some("device".to_string()),
                SessionTokens::new("AT", "RT"),
            ))
            .unwrap();

        let code = logout(&Config::default(), &paths).await.unwrap();

        assert_eq!(code, 0);
        let stored = store.load().unwrap();
        assert!(!stored.has_tokens());
        assert_eq!(stored.device_uuid(), Some("device"));
    }

    #[test]
    fn status_reads_missing_session() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        assert_eq!(status(&paths).unwrap(), 0);
    }
}
