use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use salvo::Service;
use sha2::Sha256;
use video_editor::{
    config::env_var,
    infra::{database::connection::create_lazy_pool, router, services},
};

pub const BASE_URL: &str = "http://127.0.0.1:8000";

/// Application service over a pool that never connects unless a query runs.
pub fn test_service() -> Service {
    let env = env_var::get();
    let pool = create_lazy_pool(&env.database_url).expect("Expect a valid database url");
    Service::new(router::app(services::from_env(pool, env)))
}

pub fn url(path: &str) -> String {
    format!("{BASE_URL}{path}")
}

/// `Stripe-Signature` header for `payload` signed now with the configured webhook secret.
pub fn webhook_signature(payload: &str) -> String {
    let secret = &env_var::get().stripe_webhook_secret;
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Expect a time after the epoch")
        .as_secs();

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("Expect any key length");
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}
