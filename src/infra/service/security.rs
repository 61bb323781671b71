use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{
    domain::{
        datatype::security::{IdentityClaims, TokenEncryptionError, TokenIssuer, TokenPayload},
        service::{IdentityVerifier, TokenEncryptionService},
    },
    error::security::AuthenticationError,
};

impl From<jsonwebtoken::errors::Error> for TokenEncryptionError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::Json(_) | ErrorKind::Utf8(_) | ErrorKind::Crypto(_) => Self::Encoding,
            _ => Self::Malformed,
        }
    }
}

pub struct JWTEncryptionService {
    header: Header,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JWTEncryptionService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.set_issuer(&[TokenIssuer::as_str()]);
        validation.leeway = 60;
        validation.validate_exp = true;
        validation.validate_nbf = false;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            header: Header::new(Algorithm::HS256),
            validation,
        }
    }
}

impl TokenEncryptionService for JWTEncryptionService {
    fn issue_token<T>(&self, payload: &TokenPayload<T>) -> Result<String, TokenEncryptionError>
    where
        T: Serialize,
    {
        let token = jsonwebtoken::encode(&self.header, payload, &self.encoding_key)?;
        Ok(token)
    }

    fn verify_token<T>(&self, token: &str) -> Result<TokenPayload<T>, TokenEncryptionError>
    where
        T: DeserializeOwned,
    {
        let token_data =
            jsonwebtoken::decode::<TokenPayload<T>>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }
}

const GOOGLE_CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];
const CERTS_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

struct CachedKeys {
    fetched: Instant,
    keys: HashMap<String, DecodingKey>,
}

/// Verifies Google Sign-In ID tokens against Google's published RSA keys.
pub struct GoogleIdentityVerifier {
    client: reqwest::Client,
    validation: Validation,
    keys: RwLock<Option<CachedKeys>>,
}

impl GoogleIdentityVerifier {
    pub fn new(client: reqwest::Client, client_id: &str) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[client_id]);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = 10;

        Self {
            client,
            validation,
            keys: RwLock::new(None),
        }
    }

    async fn fetch_keys(&self) -> Result<HashMap<String, DecodingKey>, AuthenticationError> {
        let set: JwkSet = self
            .client
            .get(GOOGLE_CERTS_URL)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|err| {
                tracing::error!("could not fetch identity provider keys: {err}");
                AuthenticationError::InvalidCredential
            })?
            .json()
            .await
            .map_err(|err| {
                tracing::error!("invalid identity provider key set: {err}");
                AuthenticationError::InvalidCredential
            })?;

        Ok(set
            .keys
            .into_iter()
            .filter_map(|jwk| {
                DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
                    .map(|key| (jwk.kid, key))
                    .ok()
            })
            .collect())
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthenticationError> {
        {
            let cache = self.keys.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched.elapsed() < CERTS_TTL {
                    if let Some(key) = cached.keys.get(kid) {
                        return Ok(key.clone());
                    }
                }
            }
        }

        let keys = self.fetch_keys().await?;
        let key = keys.get(kid).cloned();
        *self.keys.write().await = Some(CachedKeys {
            fetched: Instant::now(),
            keys,
        });

        key.ok_or(AuthenticationError::InvalidCredential)
    }
}

#[async_trait]
impl IdentityVerifier for GoogleIdentityVerifier {
    async fn verify_identity(&self, id_token: &str) -> Result<IdentityClaims, AuthenticationError> {
        let header =
            jsonwebtoken::decode_header(id_token).map_err(|_| AuthenticationError::InvalidCredential)?;
        let kid = header.kid.ok_or(AuthenticationError::InvalidCredential)?;
        let key = self.decoding_key(&kid).await?;

        let claims = jsonwebtoken::decode::<GoogleClaims>(id_token, &key, &self.validation)
            .map_err(|err| {
                tracing::warn!("rejected identity token: {err}");
                AuthenticationError::InvalidCredential
            })?
            .claims;

        Ok(IdentityClaims {
            subject: claims.sub,
            email: claims.email.ok_or(AuthenticationError::InvalidCredential)?,
            name: claims.name,
            picture: claims.picture,
        })
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    use super::*;
    use crate::domain::datatype::security::{Token, TokenSubject};

    #[test]
    fn issued_token_verifies() {
        let service = JWTEncryptionService::new("secret");
        let user_id = Uuid::new_v4();
        let payload = TokenPayload::new(Duration::from_secs(60), TokenSubject::User(user_id), ());

        let token: String = Token::new(payload, &service).unwrap().into();
        let verified = Token::<()>::verify(token, &service).unwrap();

        assert_eq!(verified.payload().user_id(), user_id);
        assert_eq!(verified.payload().iss, TokenIssuer::as_str());
    }

    #[test]
    fn token_from_other_key_is_rejected() {
        let payload = TokenPayload::new(
            Duration::from_secs(60),
            TokenSubject::User(Uuid::new_v4()),
            (),
        );
        let token: String = Token::new(payload, &JWTEncryptionService::new("one"))
            .unwrap()
            .into();

        let result = Token::<()>::verify(token, &JWTEncryptionService::new("other"));

        assert!(matches!(result, Err(TokenEncryptionError::InvalidSignature)));
    }

    #[test]
    fn garbage_token_is_malformed() {
        let result = Token::<()>::verify("abc".into(), &JWTEncryptionService::new("secret"));
        assert!(result.is_err());
    }
}
