use std::{path::PathBuf, str::FromStr, sync::Arc};

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use multer::Multipart;
use salvo::{
    http::{header::CONTENT_TYPE, StatusCode},
    writer::Json,
    Depot, FlowCtrl, Handler, Request, Response,
};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    app::{
        resource::{
            iam::GoogleAuthDto,
            media::{ChangeStyle, GenerateCaptions, UpdateVideo, UploadVideo},
            style::{CreateStyle, UpdateStyle},
        },
        use_case::{self, caption::CaptionServices},
    },
    base::Page,
    domain::{
        entity::iam::User,
        service::{
            IdentityVerifier, LanguageModel, MediaProcessor, ObjectStorage, PaymentGateway,
            Transcriber,
        },
    },
    error::{
        app::ApplicationError, http::BadRequest, security::UnauthorizedError, service::UploadError,
    },
    infra::service::security::JWTEncryptionService,
};

macro_rules! map_res_err {
    ($result:ident, $response:ident) => {
        match $result {
            Err(err) => {
                $response.render(err);
                return;
            }
            Ok(ok) => ok,
        }
    };
}

/// Shared services handed to every controller.
#[derive(Clone)]
pub struct Services {
    pub pool: PgPool,
    pub token: Arc<JWTEncryptionService>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub storage: Arc<dyn ObjectStorage>,
    pub media: Arc<dyn MediaProcessor>,
    pub transcriber: Arc<dyn Transcriber>,
    pub model: Arc<dyn LanguageModel>,
    pub payment: Arc<dyn PaymentGateway>,
    pub temp_dir: PathBuf,
    pub frontend_url: String,
}

macro_rules! controller {
    ($($name:ident),+ $(,)?) => {
        $(
            pub struct $name {
                services: Services,
            }

            impl $name {
                pub fn new(services: Services) -> Self {
                    Self { services }
                }
            }
        )+
    };
}

/// Extract a authorization token from a request.
///
/// Token must be formated in the Bearer authentication scheme
/// described in [RFC 6750](https://datatracker.ietf.org/doc/html/rfc6750)
fn extract_token(req: &Request) -> Result<&str, UnauthorizedError> {
    let scheme: Option<&str> = req.header("authorization");
    scheme
        .ok_or(UnauthorizedError::TokenNotPresent)?
        .strip_prefix("Bearer ")
        .ok_or(UnauthorizedError::MalformattedToken)
}

/// Extract a uuid from a request id param
fn extract_id(req: &Request) -> Result<Uuid, BadRequest> {
    req.params()
        .get("id")
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| BadRequest::InvalidParam("id".into()))
}

fn query_param<T: FromStr>(req: &Request, key: &str) -> Option<T> {
    req.queries().get(key).and_then(|value| value.parse().ok())
}

fn extract_page(req: &Request) -> Page {
    Page::new(query_param(req, "skip"), query_param(req, "limit"))
}

fn bearer_token(req: &Request) -> Result<String, UnauthorizedError> {
    extract_token(req).map(String::from)
}

async fn authenticate(
    services: &Services,
    token: Result<String, UnauthorizedError>,
) -> Result<User, ApplicationError<()>> {
    let token = token?;
    use_case::iam::current_user(&services.pool, services.token.as_ref(), &token).await
}

pub struct RootController;

#[async_trait]
impl Handler for RootController {
    async fn handle(&self, _: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        res.render(Json(json!({
            "message": "Video Editor API",
            "version": "1.0.0",
        })));
        res.set_status_code(StatusCode::OK);
    }
}

pub struct HealthController;

#[async_trait]
impl Handler for HealthController {
    async fn handle(&self, _: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        res.render(Json(json!({ "status": "healthy" })));
        res.set_status_code(StatusCode::OK);
    }
}

controller!(
    GoogleAuthController,
    MeController,
    RefreshTokenController,
    ListUsersController,
    GetUserController,
);

#[async_trait]
impl Handler for GoogleAuthController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result: Result<GoogleAuthDto, _> = req.parse_body().await.map_err(BadRequest::from);
        let dto = map_res_err!(result, res);

        let result = use_case::iam::authenticate_google(
            &self.services.pool,
            self.services.identity.as_ref(),
            self.services.token.as_ref(),
            dto,
        )
        .await;
        let auth_response = map_res_err!(result, res);

        res.render(Json(auth_response));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for MeController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result = authenticate(&self.services, bearer_token(req)).await;
        let user = map_res_err!(result, res);

        let result = use_case::iam::me(&self.services.pool, &user).await;
        let resource = map_res_err!(result, res);

        res.render(Json(resource));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for RefreshTokenController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result = authenticate(&self.services, bearer_token(req)).await;
        let user = map_res_err!(result, res);

        let result = use_case::iam::refresh_token(self.services.token.as_ref(), &user);
        let token = map_res_err!(result, res);

        res.render(Json(token));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for ListUsersController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result = authenticate(&self.services, bearer_token(req)).await;
        map_res_err!(result, res);

        let result = use_case::iam::list_users(&self.services.pool, extract_page(req)).await;
        let users = map_res_err!(result, res);

        res.render(Json(users));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for GetUserController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result = extract_id(req);
        let id = map_res_err!(result, res);
        let result = authenticate(&self.services, bearer_token(req)).await;
        let user = map_res_err!(result, res);

        let result = use_case::iam::get_user(&self.services.pool, &user, id).await;
        let resource = map_res_err!(result, res);

        res.render(Json(resource));
        res.set_status_code(StatusCode::OK);
    }
}

controller!(UploadVideoController, UploadStatusController);

/// Multipart reader over the request body, bytes are pulled as fields are consumed.
fn multipart_body(req: &mut Request) -> Result<Multipart<'static>, BadRequest> {
    let boundary = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| multer::parse_boundary(value).ok())
        .ok_or(BadRequest::InvalidContent)?;
    let body = req.take_body().ok_or(BadRequest::InvalidContent)?;
    Ok(Multipart::new(body, boundary))
}

#[async_trait]
impl Handler for UploadVideoController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result = authenticate(&self.services, bearer_token(req)).await;
        let user = map_res_err!(result, res);

        let result = multipart_body(req);
        let mut multipart = map_res_err!(result, res);

        let storage = self.services.storage.as_ref();
        let mut name: Option<String> = None;
        let mut stored = None;
        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!("malformed upload body: {err}");
                    res.render(BadRequest::InvalidContent);
                    return;
                }
            };
            let field_name = field.name().map(String::from);

            match field_name.as_deref() {
                Some("name") => match field.text().await {
                    Ok(text) => name = Some(text).filter(|text| !text.is_empty()),
                    Err(err) => {
                        tracing::warn!("unreadable upload name: {err}");
                        res.render(BadRequest::InvalidContent);
                        return;
                    }
                },
                Some("file") if stored.is_none() => {
                    let upload = UploadVideo {
                        filename: field.file_name().unwrap_or("video").to_owned(),
                        content_type: field.content_type().map(|mime| mime.to_string()),
                        name: name.clone(),
                    };
                    let body = field
                        .map_err(|err| UploadError::Body(err.to_string()))
                        .boxed();
                    let result = use_case::upload::store_video(storage, &user, upload, body).await;
                    stored = Some(map_res_err!(result, res));
                }
                _ => {}
            }
        }

        let Some(stored) = stored else {
            res.render(BadRequest::MissingField("file".into()));
            return;
        };
        let result =
            use_case::upload::register_video(&self.services.pool, storage, &user, stored, name)
                .await;
        let resource = map_res_err!(result, res);

        res.render(Json(resource));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for UploadStatusController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result = extract_id(req);
        let id = map_res_err!(result, res);
        let result = authenticate(&self.services, bearer_token(req)).await;
        let user = map_res_err!(result, res);

        let result = use_case::upload::upload_status(&self.services.pool, &user, id).await;
        let resource = map_res_err!(result, res);

        res.render(Json(resource));
        res.set_status_code(StatusCode::OK);
    }
}

controller!(
    ListVideosController,
    GetVideoController,
    UpdateVideoController,
    DeleteVideoController,
    GenerateCaptionsController,
    ChangeStyleController,
);

#[async_trait]
impl Handler for ListVideosController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result = authenticate(&self.services, bearer_token(req)).await;
        let user = map_res_err!(result, res);

        let result =
            use_case::video::list_videos(&self.services.pool, &user, extract_page(req)).await;
        let videos = map_res_err!(result, res);

        res.render(Json(videos));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for GetVideoController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result = extract_id(req);
        let id = map_res_err!(result, res);
        let result = authenticate(&self.services, bearer_token(req)).await;
        let user = map_res_err!(result, res);

        let fresh_url = query_param(req, "fresh_url").unwrap_or(false);
        let result = use_case::video::get_video(
            &self.services.pool,
            self.services.storage.as_ref(),
            &user,
            id,
            fresh_url,
        )
        .await;
        let video = map_res_err!(result, res);

        res.render(Json(video));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for UpdateVideoController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result = extract_id(req);
        let id = map_res_err!(result, res);
        let result = authenticate(&self.services, bearer_token(req)).await;
        let user = map_res_err!(result, res);

        let result: Result<UpdateVideo, _> = req.parse_body().await.map_err(BadRequest::from);
        let dto = map_res_err!(result, res);

        let result = use_case::video::update_video(&self.services.pool, &user, id, dto).await;
        let video = map_res_err!(result, res);

        res.render(Json(video));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for DeleteVideoController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result = extract_id(req);
        let id = map_res_err!(result, res);
        let result = authenticate(&self.services, bearer_token(req)).await;
        let user = map_res_err!(result, res);

        let result = use_case::video::delete_video(
            &self.services.pool,
            self.services.storage.as_ref(),
            &user,
            id,
        )
        .await;
        let resource = map_res_err!(result, res);

        res.render(Json(resource));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for GenerateCaptionsController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result = authenticate(&self.services, bearer_token(req)).await;
        let user = map_res_err!(result, res);

        let result: Result<GenerateCaptions, _> =
            req.parse_body().await.map_err(BadRequest::from);
        let dto = map_res_err!(result, res);

        let services = CaptionServices {
            storage: self.services.storage.as_ref(),
            media: self.services.media.as_ref(),
            transcriber: self.services.transcriber.as_ref(),
            model: self.services.model.as_ref(),
            temp_dir: &self.services.temp_dir,
        };
        let result =
            use_case::caption::generate_captions(&self.services.pool, &services, &user, dto).await;
        let resource = map_res_err!(result, res);

        res.render(Json(resource));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for ChangeStyleController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result = authenticate(&self.services, bearer_token(req)).await;
        let user = map_res_err!(result, res);

        let result: Result<ChangeStyle, _> = req.parse_body().await.map_err(BadRequest::from);
        let dto = map_res_err!(result, res);

        let result = use_case::caption::change_style(
            &self.services.pool,
            self.services.model.as_ref(),
            &user,
            dto,
        )
        .await;
        let resource = map_res_err!(result, res);

        res.render(Json(resource));
        res.set_status_code(StatusCode::OK);
    }
}

controller!(
    CreateStyleController,
    ListStylesController,
    DefaultStylesController,
    GetStyleController,
    UpdateStyleController,
    DeleteStyleController,
);

#[async_trait]
impl Handler for CreateStyleController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result = authenticate(&self.services, bearer_token(req)).await;
        let user = map_res_err!(result, res);

        let result: Result<CreateStyle, _> = req.parse_body().await.map_err(BadRequest::from);
        let dto = map_res_err!(result, res);

        let result = use_case::style::create_style(&self.services.pool, &user, dto).await;
        let style = map_res_err!(result, res);

        res.render(Json(style));
        res.set_status_code(StatusCode::CREATED);
    }
}

#[async_trait]
impl Handler for ListStylesController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result = authenticate(&self.services, bearer_token(req)).await;
        map_res_err!(result, res);

        let include_default = query_param(req, "include_default").unwrap_or(true);
        let result =
            use_case::style::list_styles(&self.services.pool, include_default, extract_page(req))
                .await;
        let styles = map_res_err!(result, res);

        res.render(Json(styles));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for DefaultStylesController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result = authenticate(&self.services, bearer_token(req)).await;
        map_res_err!(result, res);

        let result = use_case::style::list_default_styles(&self.services.pool).await;
        let styles = map_res_err!(result, res);

        res.render(Json(styles));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for GetStyleController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result = extract_id(req);
        let id = map_res_err!(result, res);
        let result = authenticate(&self.services, bearer_token(req)).await;
        map_res_err!(result, res);

        let result = use_case::style::get_style(&self.services.pool, id).await;
        let style = map_res_err!(result, res);

        res.render(Json(style));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for UpdateStyleController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result = extract_id(req);
        let id = map_res_err!(result, res);
        let result = authenticate(&self.services, bearer_token(req)).await;
        let user = map_res_err!(result, res);

        let result: Result<UpdateStyle, _> = req.parse_body().await.map_err(BadRequest::from);
        let dto = map_res_err!(result, res);

        let result = use_case::style::update_style(&self.services.pool, &user, id, dto).await;
        let style = map_res_err!(result, res);

        res.render(Json(style));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for DeleteStyleController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result = extract_id(req);
        let id = map_res_err!(result, res);
        let result = authenticate(&self.services, bearer_token(req)).await;
        let user = map_res_err!(result, res);

        let result = use_case::style::delete_style(&self.services.pool, &user, id).await;
        let resource = map_res_err!(result, res);

        res.render(Json(resource));
        res.set_status_code(StatusCode::OK);
    }
}

controller!(
    CheckoutSessionController,
    PaymentWebhookController,
    SubscriptionStatusController,
);

#[async_trait]
impl Handler for CheckoutSessionController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result = authenticate(&self.services, bearer_token(req)).await;
        let user = map_res_err!(result, res);

        let result = use_case::payment::create_checkout_sessions(
            self.services.payment.as_ref(),
            &user,
            &self.services.frontend_url,
        )
        .await;
        let sessions = map_res_err!(result, res);

        res.render(Json(sessions));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for PaymentWebhookController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let signature: Option<String> = req.header("stripe-signature");
        let result = req.payload().await.map_err(BadRequest::from);
        let payload = map_res_err!(result, res);

        let result = use_case::payment::handle_webhook(
            &self.services.pool,
            self.services.payment.as_ref(),
            payload,
            signature.as_deref(),
        )
        .await;
        let resource = map_res_err!(result, res);

        res.render(Json(resource));
        res.set_status_code(StatusCode::OK);
    }
}

#[async_trait]
impl Handler for SubscriptionStatusController {
    async fn handle(&self, req: &mut Request, _: &mut Depot, res: &mut Response, _: &mut FlowCtrl) {
        let result = authenticate(&self.services, bearer_token(req)).await;
        let user = map_res_err!(result, res);

        res.render(Json(use_case::payment::subscription_status(&user)));
        res.set_status_code(StatusCode::OK);
    }
}
