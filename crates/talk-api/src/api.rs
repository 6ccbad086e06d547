//! Remote operations.

use crate::{
    ApiRequest, ApiResponse, Attachment, BodyEncoding, Credentials, DeviceIdentity, RequestSigner,
    TransportClient, TransportResult,
};
use serde_json::json;
use std::sync::Arc;
use talk_config_and_utils::ApiConfig;
use talk_session_storage::SessionTokens;
use tracing::debug;
use url::Url;

/// `Talk-Language` sent with passcode authorization.
pub const TALK_LANGUAGE_HEADER_VALUE: &str = "en";

const GENERATE_PASSCODE_PATH: &str = "passcodeLogin/generate";
const REGISTER_DEVICE_PATH: &str = "passcodeLogin/registerDevice";
const LOGIN_PATH: &str = "login.json";
const REFRESH_PATH: &str = "oauth2_token.json";
const SEND_MESSAGE_PATH: &str = "authWrite";

/// The account and share API operations.
///
/// Calls before a session exists are signed with `X-VC` over the account
/// email. Protected calls take a [`SessionTokens`] value.
#[derive(Clone)]
pub struct TalkApi {
    transport: Arc<dyn TransportClient>,
    config: ApiConfig,
    signer: RequestSigner,
}

impl TalkApi {
    pub fn new(transport: Arc<dyn TransportClient>, config: ApiConfig) -> Self {
        let signer = RequestSigner::new(config.user_agent());
        Self {
            transport,
            config,
            signer,
        }
    }

    /// Request a passcode for `device`.
    pub async fn generate_passcode(
        &self,
        credentials: &Credentials,
        device: &DeviceIdentity,
    ) -> TransportResult<ApiResponse> {
        let request = ApiRequest::post(
            self.config.endpoint(GENERATE_PASSCODE_PATH),
            BodyEncoding::Json,
        )
        .header("X-VC", self.signer.sign(&credentials.email))
        .header("Authorization", credentials.email.as_str())
        .field("email", credentials.email.as_str())
        .field("password", credentials.password.as_str())
        .field("permanent", true)
        .field(
            "device",
            json!({
                "name": device.name,
                "uuid": device.uuid,
                "model": device.model,
                "osVersion": device.os_version,
                "isOneStore": false,
            }),
        );

        debug!("requesting passcode");
        self.transport.execute(request).await
    }

    /// Confirm `passcode` with an externally obtained token.
    pub async fn authorize_passcode(
        &self,
        passcode: &str,
        auth_token: &str,
    ) -> TransportResult<ApiResponse> {
        let request = ApiRequest::post(self.config.authorize_url.as_str(), BodyEncoding::Json)
            .header("Authorization", auth_token)
            .header("Talk-Agent", self.config.talk_agent())
            .header("Talk-Language", TALK_LANGUAGE_HEADER_VALUE)
            .header("Content-Type", BodyEncoding::Json.content_type())
            .header("User-Agent", self.config.user_agent())
            .field("passcode", passcode);

        debug!("authorizing passcode");
        self.transport.execute(request).await
    }

    /// Ask whether the passcode for `device_uuid` has been confirmed.
    pub async fn register_device(
        &self,
        credentials: &Credentials,
        device_uuid: &str,
    ) -> TransportResult<ApiResponse> {
        let request = ApiRequest::post(self.config.endpoint(REGISTER_DEVICE_PATH), BodyEncoding::Json)
            .header("X-VC", self.signer.sign(&credentials.email))
            .header("Authorization", credentials.email.as_str())
            .field("email", credentials.email.as_str())
            .field("password", credentials.password.as_str())
            .field("device", json!({ "uuid": device_uuid }));

        self.transport.execute(request).await
    }

    /// Log in a registered device. Parameters travel in the query string.
    pub async fn login(
        &self,
        credentials: &Credentials,
        device: &DeviceIdentity,
    ) -> TransportResult<ApiResponse> {
        let mut url = Url::parse(&self.config.endpoint(LOGIN_PATH))?;
        url.query_pairs_mut()
            .append_pair("forced", "true")
            .append_pair("permanent", "true")
            .append_pair("one_store", "false")
            .append_pair("device_name", &device.name)
            .append_pair("email", &credentials.email)
            .append_pair("password", &credentials.password)
            .append_pair("device_uuid", &device.uuid);

        let request = ApiRequest::post(url.to_string(), BodyEncoding::Form)
            .header("X-VC", self.signer.sign(&credentials.email))
            .header("Authorization", credentials.email.as_str())
            .header("Accept-Language", self.config.language.as_str())
            .header("Accept-Encoding", "gzip")
            .gzip();

        debug!("logging in");
        self.transport.execute(request).await
    }

    /// Exchange the current token pair for a new one.
    pub async fn refresh_tokens(
        &self,
        credentials: &Credentials,
        tokens: &SessionTokens,
        device_uuid: &str,
    ) -> TransportResult<ApiResponse> {
        let request = ApiRequest::post(self.config.endpoint(REFRESH_PATH), BodyEncoding::Json)
            .header("X-VC", self.signer.sign(&credentials.email))
            .header(
                "Authorization",
                format!("{}-{}", tokens.access_token(), device_uuid),
            )
            .field("grant_type", "refresh_token")
            .field("access_token", tokens.access_token())
            .field("refresh_token", tokens.refresh_token());

        debug!(token = %tokens.fingerprint(), "refreshing tokens");
        self.transport.execute(request).await
    }

    /// Post `message` to `chat_id` through the share API.
    pub async fn send_message(
        &self,
        chat_id: i64,
        message: &str,
        attachment: Option<&Attachment>,
        device_uuid: &str,
        tokens: &SessionTokens,
    ) -> TransportResult<ApiResponse> {
        let (kind, extra) = match attachment {
            Some(attachment) => (attachment.kind, Some(attachment.encode_extra()?)),
            None => (Attachment::DEFAULT_KIND, None),
        };

        let request = ApiRequest::post(
            self.config.share_endpoint(SEND_MESSAGE_PATH),
            BodyEncoding::Form,
        )
        .header("User-Agent", self.config.share_user_agent())
        .field("target", json!({ "chatId": chat_id }))
        .field(
            "chatLog",
            json!({ "type": kind, "message": message, "extra": extra }),
        )
        .field("duuid", device_uuid)
        .field("oauthToken", tokens.access_token());

        debug!(chat_id, "sending message");
        self.transport.execute(request).await
    }
}
