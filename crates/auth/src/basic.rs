//! HTTP Basic credentials (RFC 7617), transport-agnostic.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use constant_time_eq::constant_time_eq;
use thiserror::Error;

/// Username/password pair presented by a caller.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("authorization scheme is not Basic")]
    WrongScheme,

    #[error("credentials are not valid base64")]
    Encoding,

    #[error("credentials are missing the ':' separator")]
    Malformed,

    #[error("invalid username or password")]
    InvalidCredentials,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parse the value of an `Authorization` header (`Basic <base64>`).
    pub fn from_authorization(header: &str) -> Result<Self, AuthError> {
        let (scheme, encoded) = header.trim().split_once(' ').ok_or(AuthError::WrongScheme)?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return Err(AuthError::WrongScheme);
        }

        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|_| AuthError::Encoding)?;
        let decoded = String::from_utf8(decoded).map_err(|_| AuthError::Encoding)?;

        // Passwords may contain ':'; usernames may not.
        let (username, password) = decoded.split_once(':').ok_or(AuthError::Malformed)?;
        Ok(Self::new(username, password))
    }

    /// Render as an `Authorization` header value.
    pub fn to_authorization(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password);
        format!("Basic {}", STANDARD.encode(raw))
    }
}

/// Checks presented credentials against a configured account.
pub trait CredentialValidator: Send + Sync {
    fn validate(&self, presented: &Credentials) -> Result<(), AuthError>;
}

/// A single account configured at startup.
#[derive(Debug, Clone)]
pub struct StaticCredentialValidator {
    expected: Credentials,
}

impl StaticCredentialValidator {
    pub fn new(expected: Credentials) -> Self {
        Self { expected }
    }
}

impl CredentialValidator for StaticCredentialValidator {
    fn validate(&self, presented: &Credentials) -> Result<(), AuthError> {
        // Both fields are always compared.
        let user_ok = constant_time_eq(
            presented.username.as_bytes(),
            self.expected.username.as_bytes(),
        );
        let pass_ok = constant_time_eq(
            presented.password.as_bytes(),
            self.expected.password.as_bytes(),
        );

        if user_ok & pass_ok {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}
