use std::time::{Duration, SystemTime, UNIX_EPOCH};

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Display)]
pub enum TokenEncryptionError {
    #[display(fmt = "token expired")]
    Expired,
    #[display(fmt = "invalid token signature")]
    InvalidSignature,
    #[display(fmt = "malformed token")]
    Malformed,
    #[display(fmt = "token encoding failure")]
    Encoding,
}

impl std::error::Error for TokenEncryptionError {}

pub struct TokenIssuer;

impl TokenIssuer {
    pub const fn as_str() -> &'static str {
        "video_editor_api"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenSubject {
    User(Uuid),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPayload<T> {
    pub exp: u64,
    pub iat: u64,
    pub iss: String,
    pub sub: TokenSubject,
    pub data: T,
}

impl<T> TokenPayload<T> {
    pub fn new(expiration: Duration, sub: TokenSubject, data: T) -> Self {
        let iat = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self {
            exp: iat + expiration.as_secs(),
            iat,
            iss: TokenIssuer::as_str().into(),
            sub,
            data,
        }
    }

    pub fn user_id(&self) -> Uuid {
        match self.sub {
            TokenSubject::User(id) => id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Token<T> {
    pub(in crate::domain) token: String,
    pub(in crate::domain) payload: TokenPayload<T>,
}

impl<T> Token<T> {
    pub fn payload(&self) -> &TokenPayload<T> {
        &self.payload
    }
}

impl<T> From<Token<T>> for String {
    fn from(token: Token<T>) -> Self {
        token.token
    }
}

/// Identity asserted by a verified third party ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}
