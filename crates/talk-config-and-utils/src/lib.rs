//! Configuration, filesystem layout, and logging bootstrap for talkbridge.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    ApiConfig, Config, DeviceDefaults, RegistrationPolicy, DEFAULT_API_BASE_URL,
    DEFAULT_APP_VERSION, DEFAULT_AUTHORIZE_URL, DEFAULT_LANGUAGE, DEFAULT_LOG_LEVEL,
    DEFAULT_PLATFORM, DEFAULT_SHARE_BASE_URL,
};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
