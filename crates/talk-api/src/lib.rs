//! Client for the talk account and share APIs.
//!
//! - [`sign`] / [`RequestSigner`]: the `X-VC` request tag
//! - [`TransportClient`]: one HTTP exchange, with [`HttpTransport`] backed by reqwest
//! - [`TalkApi`]: the remote operations used by authentication and message delivery
//!
//! Every operation returns the decoded [`ApiResponse`]; interpreting the
//! service's `status` field is left to the caller.

mod api;
mod error;
mod response;
mod signer;
mod transport;
mod types;

pub use api::{TalkApi, TALK_LANGUAGE_HEADER_VALUE};
pub use error::{TransportError, TransportResult};
pub use response::ApiResponse;
pub use signer::{sign, RequestSigner, XVC_LENGTH, XVC_SEEDS};
pub use transport::{
    baseline_headers, merge_headers, ApiRequest, BodyEncoding, HttpTransport, TransportClient,
};
pub use types::{Attachment, Credentials, DeviceIdentity, PasscodeChallenge};
