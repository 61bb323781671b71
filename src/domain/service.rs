use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde_json::Value;
use uuid::Uuid;

use super::{
    datatype::{
        media::MediaMetadata,
        security::{IdentityClaims, Token, TokenEncryptionError, TokenPayload},
    },
    entity::iam::Subscription,
};
use crate::error::{
    security::AuthenticationError,
    service::{ServiceError, UploadError},
};

pub trait TokenEncryptionService {
    fn issue_token<T>(&self, payload: &TokenPayload<T>) -> Result<String, TokenEncryptionError>
    where
        T: serde::Serialize;

    fn verify_token<T>(&self, token: &str) -> Result<TokenPayload<T>, TokenEncryptionError>
    where
        T: serde::de::DeserializeOwned;
}

impl<T> Token<T> {
    pub fn new<TS>(payload: TokenPayload<T>, encrypter: &TS) -> Result<Self, TokenEncryptionError>
    where
        TS: TokenEncryptionService,
        T: serde::Serialize,
    {
        let token = encrypter.issue_token(&payload)?;
        Ok(Self { token, payload })
    }

    pub fn verify<TS>(token: String, encrypter: &TS) -> Result<Self, TokenEncryptionError>
    where
        TS: TokenEncryptionService,
        T: serde::de::DeserializeOwned,
    {
        let payload = encrypter.verify_token(&token)?;
        Ok(Self { token, payload })
    }
}

/// Verifies ID tokens issued by an external identity provider.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify_identity(&self, id_token: &str) -> Result<IdentityClaims, AuthenticationError>;
}

/// Body received in chunks, as read from a request.
pub type ByteChunks<'a> = BoxStream<'a, Result<Bytes, UploadError>>;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Streams `body` into `key` as a multipart upload, returning the stored size.
    async fn upload_stream(
        &self,
        key: &str,
        content_type: &str,
        metadata: HashMap<String, String>,
        body: ByteChunks<'_>,
    ) -> Result<u64, UploadError>;

    /// Stores a local file in a single request.
    async fn put_file(&self, key: &str, path: &Path, content_type: &str)
        -> Result<(), ServiceError>;

    /// Downloads `key` into `dest`, returning the written size.
    async fn download_file(&self, key: &str, dest: &Path) -> Result<u64, ServiceError>;

    async fn delete_object(&self, key: &str) -> Result<(), ServiceError>;

    /// URL the object can be fetched from, public or presigned.
    async fn access_url(&self, key: &str) -> Result<String, ServiceError>;

    /// Object key of an URL previously returned by [`ObjectStorage::access_url`].
    fn extract_key(&self, url: &str) -> Option<String>;
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcription with word level timestamps, as returned by the provider.
    async fn transcribe(&self, audio: &Path) -> Result<Value, ServiceError>;
}

/// Chat completion request constrained to a JSON schema.
#[derive(Debug, Clone)]
pub struct StructuredPrompt<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub user: String,
    pub schema_name: &'a str,
    pub schema: &'a Value,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete_json(&self, prompt: &StructuredPrompt<'_>) -> Result<Value, ServiceError>;
}

#[async_trait]
pub trait MediaProcessor: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<MediaMetadata, ServiceError>;

    /// Transcodes to a rendition `height` pixels tall, returning its path.
    async fn transcode_low_res(&self, path: &Path, height: u32) -> Result<PathBuf, ServiceError>;

    /// Extracts a mono speech-rate MP3 track, returning its path.
    async fn extract_audio(&self, path: &Path) -> Result<PathBuf, ServiceError>;
}

/// Payment provider price ids of the paid plans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanPrices {
    pub premium: String,
    pub ultra: String,
}

impl PlanPrices {
    pub fn price(&self, plan: Subscription) -> Option<&str> {
        match plan {
            Subscription::Free => None,
            Subscription::Premium => Some(&self.premium),
            Subscription::Ultra => Some(&self.ultra),
        }
    }

    pub fn plan(&self, price_id: &str) -> Option<Subscription> {
        if price_id.is_empty() {
            None
        } else if price_id == self.premium {
            Some(Subscription::Premium)
        } else if price_id == self.ultra {
            Some(Subscription::Ultra)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    pub email: &'a str,
    pub user_id: Uuid,
    pub plan: Subscription,
    pub price_id: &'a str,
    pub success_url: String,
    pub cancel_url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn prices(&self) -> &PlanPrices;

    /// Creates a subscription checkout session, returning its URL.
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest<'_>,
    ) -> Result<String, ServiceError>;

    /// Price id of the first line item of a checkout session.
    async fn session_price_id(&self, session_id: &str) -> Result<Option<String>, ServiceError>;

    async fn customer_email(&self, customer_id: &str) -> Result<Option<String>, ServiceError>;

    /// Checks the signature header of a webhook delivery and parses its event.
    fn verify_event(&self, payload: &[u8], signature: &str) -> Result<Value, ServiceError>;
}
