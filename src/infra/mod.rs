pub mod controller;
pub mod database;
pub mod service;

pub mod services {
    use std::{sync::Arc, time::Duration};

    use sqlx::PgPool;

    use super::{
        controller::Services,
        service::{
            media::FfmpegProcessor,
            openai::OpenAiClient,
            payment::StripeGateway,
            security::{GoogleIdentityVerifier, JWTEncryptionService},
            storage::R2Storage,
        },
    };
    use crate::{config::env_var::EnvVar, domain::service::PlanPrices};

    /// Client shared by every outbound HTTP integration.
    pub fn http_client() -> reqwest::Client {
        let keep_alive = 1000 * 60 * 60; // 1 hours
        let connect_timeout = 1000 * 5; // 5 sec

        reqwest::Client::builder()
            .tcp_keepalive(Duration::from_millis(keep_alive))
            .connect_timeout(Duration::from_millis(connect_timeout))
            .pool_max_idle_per_host(5)
            .gzip(true)
            .build()
            .expect("Expect to create a http client")
    }

    pub fn from_env(pool: PgPool, env: &EnvVar) -> Services {
        let client = http_client();
        let openai = Arc::new(OpenAiClient::new(client.clone(), env.openai_api_key.clone()));

        Services {
            pool,
            token: Arc::new(JWTEncryptionService::new(&env.token_key)),
            identity: Arc::new(GoogleIdentityVerifier::new(
                client.clone(),
                &env.google_client_id,
            )),
            storage: Arc::new(R2Storage::new(
                &env.r2_endpoint_url,
                &env.r2_access_key_id,
                &env.r2_secret_access_key,
                env.r2_bucket_name.clone(),
                env.r2_public_url.clone(),
            )),
            media: Arc::new(FfmpegProcessor::new()),
            transcriber: openai.clone(),
            model: openai,
            payment: Arc::new(StripeGateway::new(
                client,
                env.stripe_api_key.clone(),
                env.stripe_webhook_secret.clone(),
                PlanPrices {
                    premium: env.stripe_price_premium.clone(),
                    ultra: env.stripe_price_ultra.clone(),
                },
            )),
            temp_dir: env.temp_dir.clone(),
            frontend_url: env.frontend_url.clone(),
        }
    }
}

pub mod router {
    use salvo::{
        cors::Cors, logging::Logger, routing::PathFilter, size_limiter::max_size, Router,
    };

    use super::controller::*;
    use crate::domain::datatype::media::MAX_UPLOAD_SIZE;

    const LOCAL_FRONTEND: &str = "http://localhost:3000";

    /// Multipart framing and the `name` field on top of the media limit.
    pub const UPLOAD_BODY_LIMIT: u64 = MAX_UPLOAD_SIZE + 1024 * 1024;

    pub fn app(services: Services) -> Router {
        PathFilter::register_wisp_regex(
            "uuid",
            regex::Regex::new(
                "^(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$",
            )
            .expect("Expect a valid uuid regex"),
        );

        let cors = Cors::builder()
            .allow_origins(vec![services.frontend_url.as_str(), LOCAL_FRONTEND])
            .allow_credentials(true)
            .allow_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allow_headers(vec![
                "authorization",
                "content-type",
                "accept",
                "stripe-signature",
            ])
            .build();

        let s = &services;
        Router::with_hoop(cors)
            .hoop(Logger)
            .get(RootController)
            .push(Router::with_path("health").get(HealthController))
            .push(
                Router::with_path("auth")
                    .push(Router::with_path("google").post(GoogleAuthController::new(s.clone())))
                    .push(Router::with_path("me").get(MeController::new(s.clone())))
                    .push(Router::with_path("refresh").post(RefreshTokenController::new(s.clone()))),
            )
            .push(
                Router::with_path("users")
                    .get(ListUsersController::new(s.clone()))
                    .push(Router::with_path("<id:uuid>").get(GetUserController::new(s.clone()))),
            )
            .push(
                Router::with_path("uploads/video")
                    .hoop(max_size(UPLOAD_BODY_LIMIT))
                    .post(UploadVideoController::new(s.clone()))
                    .push(
                        Router::with_path("<id:uuid>/status")
                            .get(UploadStatusController::new(s.clone())),
                    ),
            )
            .push(
                Router::with_path("videos")
                    .get(ListVideosController::new(s.clone()))
                    .push(Router::with_path("generate").post(GenerateCaptionsController::new(s.clone())))
                    .push(Router::with_path("change_styles").post(ChangeStyleController::new(s.clone())))
                    .push(
                        Router::with_path("<id:uuid>")
                            .get(GetVideoController::new(s.clone()))
                            .put(UpdateVideoController::new(s.clone()))
                            .delete(DeleteVideoController::new(s.clone())),
                    ),
            )
            .push(
                Router::with_path("styles")
                    .get(ListStylesController::new(s.clone()))
                    .post(CreateStyleController::new(s.clone()))
                    .push(Router::with_path("defaults").get(DefaultStylesController::new(s.clone())))
                    .push(
                        Router::with_path("<id:uuid>")
                            .get(GetStyleController::new(s.clone()))
                            .put(UpdateStyleController::new(s.clone()))
                            .delete(DeleteStyleController::new(s.clone())),
                    ),
            )
            .push(
                Router::with_path("payments")
                    .push(
                        Router::with_path("create-checkout-session")
                            .get(CheckoutSessionController::new(s.clone())),
                    )
                    .push(Router::with_path("webhook").post(PaymentWebhookController::new(s.clone())))
                    .push(
                        Router::with_path("subscription-status")
                            .get(SubscriptionStatusController::new(s.clone())),
                    ),
            )
    }
}
