//! `X-VC` request signing.
//!
//! The tag is the first 16 hex characters of
//! `SHA-512("<seed1>|<user agent>|<seed2>|<identity>|<seed3>")`. It authorizes
//! calls made before a session token exists, plus the token refresh call.

use sha2::{Digest, Sha512};

/// Seeds used by the current client version.
pub const XVC_SEEDS: [&str; 3] = ["CAREY", "GLENN", "PETER"];

/// Length of the tag in hex characters.
pub const XVC_LENGTH: usize = 16;

/// Compute the `X-VC` tag for `identity` (normally the account email).
pub fn sign<S: AsRef<str>>(identity: &str, seeds: &[S; 3], user_agent: &str) -> String {
    let input = format!(
        "{}|{}|{}|{}|{}",
        seeds[0].as_ref(),
        user_agent,
        seeds[1].as_ref(),
        identity,
        seeds[2].as_ref()
    );
    let digest = Sha512::digest(input.as_bytes());
    let mut tag = hex::encode(digest);
    tag.truncate(XVC_LENGTH);
    tag
}

/// Signer bound to a user agent and seed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSigner {
    seeds: [String; 3],
    user_agent: String,
}

impl RequestSigner {
    /// Signer with the default seeds.
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self::with_seeds(XVC_SEEDS.map(String::from), user_agent)
    }

    pub fn with_seeds(seeds: [String; 3], user_agent: impl Into<String>) -> Self {
        Self {
            seeds,
            user_agent: user_agent.into(),
        }
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn sign(&self, identity: &str) -> String {
        sign(identity, &self.seeds, &self.user_agent)
    }
}
