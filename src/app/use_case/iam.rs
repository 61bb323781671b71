use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    app::resource::{
        iam::{
            AuthenticateUserResponse, GoogleAuthDto, TokenResponse, UserResponse,
            UserWithVideosResponse, TOKEN_TYPE,
        },
        media::VideoResponse,
    },
    base::Page,
    config::env_var,
    domain::{
        datatype::security::{Token, TokenPayload, TokenSubject},
        entity::{iam::User, Entity},
        service::{IdentityVerifier, TokenEncryptionService},
    },
    error::{
        app::ApplicationError,
        resource::{NotFoundError, ValidationError, ValidationErrorKind, ValidationFieldError},
        security::{ForbiddenError, UnauthorizedError},
        service::{ServiceError, ServiceKind},
    },
    infra::database::repository,
};

fn access_token_expiration() -> Duration {
    Duration::from_secs(env_var::get().access_token_expire_minutes * 60)
}

fn issue_access_token<TS: TokenEncryptionService>(
    token_service: &TS,
    user_id: Uuid,
) -> Result<String, ServiceError> {
    let payload = TokenPayload::new(access_token_expiration(), TokenSubject::User(user_id), ());
    let token = Token::new(payload, token_service)
        .map_err(|err| ServiceError::new(ServiceKind::Token, err.to_string()))?;
    Ok(token.into())
}

/// Signs in with a Google ID token, creating the account on first sign in.
pub async fn authenticate_google<IV, TS>(
    pool: &PgPool,
    identity: &IV,
    token_service: &TS,
    dto: GoogleAuthDto,
) -> Result<AuthenticateUserResponse, ApplicationError<GoogleAuthDto>>
where
    IV: IdentityVerifier + ?Sized,
    TS: TokenEncryptionService,
{
    let claims = identity.verify_identity(&dto.token).await?;

    let user = match repository::user::find_by_google_id(pool, &claims.subject).await? {
        Some(user) => user,
        None => {
            if repository::user::find_by_email(pool, &claims.email)
                .await?
                .is_some()
            {
                return Err(ValidationError::from_resource(
                    dto,
                    vec![ValidationFieldError::new(
                        "base::email",
                        claims.email,
                        "/email".into(),
                        vec![ValidationErrorKind::AlreadyExists],
                    )],
                )
                .into());
            }

            let user = User::new(claims.email, claims.subject, claims.name, claims.picture);
            repository::user::insert(pool, &user).await?;
            tracing::info!(user_id = %user.ident(), "user registered");
            user
        }
    };

    let access_token = issue_access_token(token_service, user.ident())?;
    Ok(AuthenticateUserResponse {
        access_token,
        token_type: TOKEN_TYPE,
        user: user.into(),
    })
}

/// User owning the access token.
pub async fn current_user<R, TS>(
    pool: &PgPool,
    token_service: &TS,
    token: &str,
) -> Result<User, ApplicationError<R>>
where
    TS: TokenEncryptionService,
{
    let token = Token::<()>::verify(token.into(), token_service).map_err(|err| {
        tracing::debug!("rejected access token: {err}");
        UnauthorizedError::InvalidToken
    })?;

    repository::user::find(pool, token.payload().user_id())
        .await?
        .ok_or_else(|| UnauthorizedError::InvalidToken.into())
}

async fn with_videos<R>(
    pool: &PgPool,
    user: &User,
) -> Result<UserWithVideosResponse, ApplicationError<R>> {
    let videos = repository::video::list_by_owner(pool, user.ident(), Page::all()).await?;
    Ok(UserWithVideosResponse {
        user: user.into(),
        videos: videos.into_iter().map(VideoResponse::from).collect(),
    })
}

pub async fn me(pool: &PgPool, user: &User) -> Result<UserWithVideosResponse, ApplicationError<()>> {
    with_videos(pool, user).await
}

pub fn refresh_token<TS: TokenEncryptionService>(
    token_service: &TS,
    user: &User,
) -> Result<TokenResponse, ApplicationError<()>> {
    Ok(TokenResponse {
        access_token: issue_access_token(token_service, user.ident())?,
        token_type: TOKEN_TYPE,
    })
}

pub async fn list_users(
    pool: &PgPool,
    page: Page,
) -> Result<Vec<UserResponse>, ApplicationError<()>> {
    let users = repository::user::list(pool, page).await?;
    Ok(users.into_iter().map(UserResponse::from).collect())
}

/// Profile of `id`, only readable by the user themself.
pub async fn get_user(
    pool: &PgPool,
    current: &User,
    id: Uuid,
) -> Result<UserWithVideosResponse, ApplicationError<()>> {
    if current.ident() != id {
        return Err(ForbiddenError::AccessDenied.into());
    }

    let user = repository::user::find(pool, id)
        .await?
        .ok_or_else(|| NotFoundError::new::<UserResponse>(id))?;
    with_videos(pool, &user).await
}
