use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use crate::{
    domain::service::{CheckoutRequest, PaymentGateway, PlanPrices},
    error::service::{ServiceError, ServiceKind},
};

type HmacSha256 = Hmac<Sha256>;

const API_URL: &str = "https://api.stripe.com/v1";

/// Maximum age of a signed webhook delivery, in seconds.
pub const SIGNATURE_TOLERANCE: i64 = 300;

fn payment_error(message: impl Into<String>) -> ServiceError {
    ServiceError::new(ServiceKind::Payment, message)
}

/// Timestamp and `v1` signatures of a `Stripe-Signature` header.
fn parse_signature_header(header: &str) -> Option<(i64, Vec<Vec<u8>>)> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for item in header.split(',') {
        match item.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    Some((timestamp?, signatures))
}

/// Checks `header` signs `payload` with `secret` no longer than the tolerance before `now`.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), ServiceError> {
    let (timestamp, signatures) =
        parse_signature_header(header).ok_or_else(|| payment_error("malformed signature header"))?;
    if signatures.is_empty() {
        return Err(payment_error("no v1 signature in header"));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| payment_error("invalid webhook secret"))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matches = signatures
        .iter()
        .any(|signature| mac.clone().verify_slice(signature).is_ok());
    if !matches {
        return Err(payment_error("signature mismatch"));
    }

    if (now - timestamp).abs() > SIGNATURE_TOLERANCE {
        return Err(payment_error("signature timestamp outside tolerance"));
    }

    Ok(())
}

/// Stripe REST API client for subscription checkouts and webhooks.
pub struct StripeGateway {
    client: reqwest::Client,
    api_key: String,
    webhook_secret: String,
    prices: PlanPrices,
}

impl StripeGateway {
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        webhook_secret: String,
        prices: PlanPrices,
    ) -> Self {
        Self {
            client,
            api_key,
            webhook_secret,
            prices,
        }
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, ServiceError> {
        let dispatch = |err: reqwest::Error| ServiceError::dispatch(ServiceKind::Payment, err.into());
        self.client
            .get(format!("{API_URL}/{path}"))
            .basic_auth(&self.api_key, None::<&str>)
            .query(query)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(dispatch)?
            .json()
            .await
            .map_err(dispatch)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn prices(&self) -> &PlanPrices {
        &self.prices
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest<'_>,
    ) -> Result<String, ServiceError> {
        let user_id = request.user_id.to_string();
        let plan = request.plan.as_str().to_lowercase();
        let form = [
            ("mode", "subscription"),
            ("payment_method_types[0]", "card"),
            ("line_items[0][price]", request.price_id),
            ("line_items[0][quantity]", "1"),
            ("success_url", request.success_url.as_str()),
            ("cancel_url", request.cancel_url.as_str()),
            ("customer_email", request.email),
            ("metadata[user_id]", user_id.as_str()),
            ("metadata[plan]", plan.as_str()),
        ];

        let dispatch = |err: reqwest::Error| ServiceError::dispatch(ServiceKind::Payment, err.into());
        let session: Value = self
            .client
            .post(format!("{API_URL}/checkout/sessions"))
            .basic_auth(&self.api_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(dispatch)?
            .json()
            .await
            .map_err(dispatch)?;

        let url = session["url"]
            .as_str()
            .ok_or_else(|| payment_error("checkout session without url"))?;
        tracing::info!(user_id = %request.user_id, plan, "checkout session created");
        Ok(url.to_owned())
    }

    async fn session_price_id(&self, session_id: &str) -> Result<Option<String>, ServiceError> {
        let session = self
            .get(
                &format!("checkout/sessions/{session_id}"),
                &[("expand[]", "line_items")],
            )
            .await?;
        Ok(session["line_items"]["data"][0]["price"]["id"]
            .as_str()
            .map(String::from))
    }

    async fn customer_email(&self, customer_id: &str) -> Result<Option<String>, ServiceError> {
        let customer = self.get(&format!("customers/{customer_id}"), &[]).await?;
        Ok(customer["email"].as_str().map(String::from))
    }

    fn verify_event(&self, payload: &[u8], signature: &str) -> Result<Value, ServiceError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        verify_signature(payload, signature, &self.webhook_secret, now)?;

        serde_json::from_slice(payload)
            .map_err(|err| payment_error(format!("invalid event payload: {err}")))
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    const SECRET: &str = "whsec_test";
    const PAYLOAD: &[u8] = br#"{"type":"invoice.paid"}"#;

    fn sign(payload: &[u8], timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        format!(
            "t={timestamp},v1={}",
            hex::encode(mac.finalize().into_bytes())
        )
    }

    #[test]
    fn valid_signature_is_accepted() {
        let header = sign(PAYLOAD, 1_000);
        assert!(verify_signature(PAYLOAD, &header, SECRET, 1_100).is_ok());
    }

    #[test]
    fn any_matching_signature_is_accepted() {
        let header = format!("{},v1=00ff", sign(PAYLOAD, 1_000)).replacen("v1=", "v1=abcd,v1=", 1);
        assert!(verify_signature(PAYLOAD, &header, SECRET, 1_000).is_ok());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let header = sign(PAYLOAD, 1_000);
        let err = verify_signature(br#"{"type":"other"}"#, &header, SECRET, 1_000).unwrap_err();
        assert_eq!(err.message, "signature mismatch");
    }

    #[test]
    fn stale_signature_is_rejected() {
        let header = sign(PAYLOAD, 1_000);
        let err = verify_signature(PAYLOAD, &header, SECRET, 1_000 + SIGNATURE_TOLERANCE + 1)
            .unwrap_err();
        assert_eq!(err.message, "signature timestamp outside tolerance");
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert!(verify_signature(PAYLOAD, "garbage", SECRET, 0).is_err());
        assert!(verify_signature(PAYLOAD, "t=1", SECRET, 1).is_err());
    }
}
