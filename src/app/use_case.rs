pub mod caption;
pub mod iam;
pub mod payment;
pub mod style;
pub mod upload;
pub mod video;

use uuid::Uuid;

use crate::{
    app::resource::media::VideoResponse,
    domain::entity::{iam::User, media::Video, Entity},
    error::{app::ApplicationError, resource::NotFoundError},
    infra::database::repository,
};

/// `video` when it exists and belongs to `user`.
///
/// Videos of other users are reported as missing.
fn owned<R>(video: Option<Video>, user: &User, id: Uuid) -> Result<Video, ApplicationError<R>> {
    video
        .filter(|video| video.is_owned_by(user.ident()))
        .ok_or_else(|| NotFoundError::new::<VideoResponse>(id).into())
}

/// Video `id` when it belongs to `user`.
pub(crate) async fn owned_video<R>(
    pool: &sqlx::PgPool,
    user: &User,
    id: Uuid,
) -> Result<Video, ApplicationError<R>> {
    owned(repository::video::find(pool, id).await?, user, id)
}
