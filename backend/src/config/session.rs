//! Session secret loading and validation.
//!
//! Secret material comes from the file named by `SESSION_SECRET_FILE`, or
//! from `SESSION_SECRET` when no file is configured. Debug builds tolerate a
//! missing or short secret by generating an ephemeral one; release builds
//! refuse to start without a valid secret.

use std::path::PathBuf;

use mockable::Env;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::domain::session::{SessionSecret, SessionSecretError};

const SECRET_FILE_ENV: &str = "SESSION_SECRET_FILE";
const SECRET_ENV: &str = "SESSION_SECRET";
const ALLOW_EPHEMERAL_ENV: &str = "SESSION_ALLOW_EPHEMERAL";
const BOOL_EXPECTED: &str = "1|0|true|false|yes|no|y|n";

/// Build mode for session configuration validation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BuildMode {
    /// Debug builds tolerate defaults and emit warnings for missing values.
    Debug,
    /// Release builds require explicit, valid session settings.
    Release,
}

impl BuildMode {
    /// Determine the build mode from `cfg!(debug_assertions)`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use gateway::config::BuildMode;
    ///
    /// let mode = BuildMode::from_debug_assertions();
    /// if cfg!(debug_assertions) {
    ///     assert_eq!(mode, BuildMode::Debug);
    /// } else {
    ///     assert_eq!(mode, BuildMode::Release);
    /// }
    /// ```
    #[must_use]
    pub fn from_debug_assertions() -> Self {
        if cfg!(debug_assertions) {
            Self::Debug
        } else {
            Self::Release
        }
    }

    fn is_debug(self) -> bool {
        matches!(self, Self::Debug)
    }
}

/// Session settings derived from the environment.
#[derive(Debug)]
pub struct SessionSettings {
    /// Signing secret for session tokens.
    pub secret: SessionSecret,
    /// Whether the secret was generated for this process only.
    pub ephemeral: bool,
}

/// Errors raised while validating session configuration.
#[derive(thiserror::Error, Debug)]
pub enum SessionConfigError {
    /// No secret source is configured.
    #[error("missing session secret; set SESSION_SECRET_FILE or SESSION_SECRET")]
    MissingSecret,
    /// A variable is present but contains an invalid value.
    #[error("invalid value for {name}='{value}'; expected {expected}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    /// Reading the secret file failed.
    #[error("failed to read session secret at {path}: {source}")]
    SecretRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The configured secret is too short for release builds.
    #[error("session secret from {origin} too short: need >= {min_len} bytes, got {length}")]
    SecretTooShort {
        origin: String,
        length: usize,
        min_len: usize,
    },
    /// Release builds must not allow ephemeral secrets.
    #[error("SESSION_ALLOW_EPHEMERAL must be 0 in release builds")]
    EphemeralNotAllowed,
}

/// Build session settings from environment variables and build mode.
///
/// Logs the secret's fingerprint so operators can tell which secret is
/// active.
///
/// # Examples
///
/// ```rust
/// use gateway::config::{session_settings_from_env, BuildMode};
/// use mockable::MockEnv;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut env = MockEnv::new();
/// env.expect_string().returning(|name| match name {
///     "SESSION_SECRET" => Some("0123456789abcdef0123456789abcdef".to_owned()),
///     "SESSION_ALLOW_EPHEMERAL" => Some("0".to_owned()),
///     _ => None,
/// });
///
/// let settings = session_settings_from_env(&env, BuildMode::Release)?;
/// assert!(!settings.ephemeral);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns [`SessionConfigError`] when release-mode requirements are not
/// met or the secret file cannot be read.
pub fn session_settings_from_env<E: Env>(
    env: &E,
    mode: BuildMode,
) -> Result<SessionSettings, SessionConfigError> {
    let allow_ephemeral = allow_ephemeral_from_env(env, mode)?;
    let settings = match secret_from_env(env, mode)? {
        Some(secret) => SessionSettings {
            secret,
            ephemeral: false,
        },
        None if mode.is_debug() || allow_ephemeral => {
            warn!("using ephemeral session secret (dev only); sessions end on restart");
            SessionSettings {
                secret: SessionSecret::generate(),
                ephemeral: true,
            }
        }
        None => return Err(SessionConfigError::MissingSecret),
    };
    info!(
        fingerprint = %settings.secret.fingerprint(),
        ephemeral = settings.ephemeral,
        "session secret loaded"
    );
    Ok(settings)
}

fn allow_ephemeral_from_env<E: Env>(env: &E, mode: BuildMode) -> Result<bool, SessionConfigError> {
    match env.string(ALLOW_EPHEMERAL_ENV) {
        Some(value) => match parse_bool(&value) {
            Some(true) => {
                if mode.is_debug() {
                    Ok(true)
                } else {
                    Err(SessionConfigError::EphemeralNotAllowed)
                }
            }
            Some(false) => Ok(false),
            None => {
                if mode.is_debug() {
                    warn!(
                        value = %value,
                        "invalid SESSION_ALLOW_EPHEMERAL; defaulting to disabled"
                    );
                    Ok(false)
                } else {
                    Err(SessionConfigError::InvalidEnv {
                        name: ALLOW_EPHEMERAL_ENV,
                        value,
                        expected: BOOL_EXPECTED,
                    })
                }
            }
        },
        None => Ok(false),
    }
}

/// `Ok(None)` means "no usable secret, fall back if allowed".
fn secret_from_env<E: Env>(
    env: &E,
    mode: BuildMode,
) -> Result<Option<SessionSecret>, SessionConfigError> {
    let (origin, bytes) = if let Some(path) = env.string(SECRET_FILE_ENV) {
        let path = PathBuf::from(path);
        match std::fs::read(&path) {
            Ok(bytes) => (path.display().to_string(), Zeroizing::new(bytes)),
            Err(error) if mode.is_debug() => {
                warn!(path = %path.display(), error = %error, "session secret file unreadable");
                return Ok(None);
            }
            Err(error) => {
                return Err(SessionConfigError::SecretRead {
                    path,
                    source: error,
                });
            }
        }
    } else if let Some(value) = env.string(SECRET_ENV) {
        (SECRET_ENV.to_owned(), Zeroizing::new(value.into_bytes()))
    } else {
        return Ok(None);
    };

    match SessionSecret::from_bytes(bytes.to_vec()) {
        Ok(secret) => Ok(Some(secret)),
        Err(SessionSecretError::TooShort { length, min_len }) => {
            if mode.is_debug() {
                warn!(origin = %origin, length, "session secret too short; ignoring it");
                Ok(None)
            } else {
                Err(SessionConfigError::SecretTooShort {
                    origin,
                    length,
                    min_len,
                })
            }
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}
