use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    app::resource::media::{DeleteVideoResponse, UpdateVideo, VideoResponse},
    base::Page,
    domain::{
        entity::{
            iam::User,
            media::{VideoPatch, VideoStatus},
            Entity,
        },
        service::ObjectStorage,
    },
    error::{app::ApplicationError, resource::ValidationError},
    infra::database::repository,
};

pub async fn list_videos(
    pool: &PgPool,
    user: &User,
    page: Page,
) -> Result<Vec<VideoResponse>, ApplicationError<()>> {
    let videos = repository::video::list_by_owner(pool, user.ident(), page).await?;
    Ok(videos.into_iter().map(VideoResponse::from).collect())
}

async fn refresh_url<S>(storage: &S, url: &mut Option<String>)
where
    S: ObjectStorage + ?Sized,
{
    let Some(key) = url.as_deref().and_then(|url| storage.extract_key(url)) else {
        return;
    };
    match storage.access_url(&key).await {
        Ok(fresh) => *url = Some(fresh),
        Err(err) => tracing::warn!(key = %key, "could not refresh access url: {err}"),
    }
}

/// Video of the user, with its object URLs signed again when `fresh_url` is set.
pub async fn get_video<S>(
    pool: &PgPool,
    storage: &S,
    user: &User,
    id: Uuid,
    fresh_url: bool,
) -> Result<VideoResponse, ApplicationError<()>>
where
    S: ObjectStorage + ?Sized,
{
    let video = super::owned_video(pool, user, id).await?;
    let mut response = VideoResponse::from(video);

    if fresh_url {
        refresh_url(storage, &mut response.original_url).await;
        refresh_url(storage, &mut response.low_res_url).await;
        refresh_url(storage, &mut response.high_res_url).await;
    }

    Ok(response)
}

pub async fn update_video(
    pool: &PgPool,
    user: &User,
    id: Uuid,
    dto: UpdateVideo,
) -> Result<VideoResponse, ApplicationError<UpdateVideo>> {
    let status = match dto.status.as_deref().map(str::parse::<VideoStatus>) {
        Some(Err(field)) => return Err(ValidationError::from_resource(dto, vec![field]).into()),
        Some(Ok(status)) => Some(status),
        None => None,
    };

    let mut video = super::owned_video(pool, user, id).await?;
    video.apply(VideoPatch {
        name: dto.name,
        transcript: dto.transcript,
        current_style: dto.current_style,
        style_id: dto.style_id,
        status,
    });
    repository::video::update(pool, &video).await?;

    Ok(video.into())
}

/// Deletes the video record, then its stored objects on a best effort basis.
pub async fn delete_video<S>(
    pool: &PgPool,
    storage: &S,
    user: &User,
    id: Uuid,
) -> Result<DeleteVideoResponse, ApplicationError<()>>
where
    S: ObjectStorage + ?Sized,
{
    let video = super::owned_video(pool, user, id).await?;
    repository::video::delete(pool, id).await?;

    let mut keys: Vec<String> = [video.original_url(), video.low_res_url(), video.high_res_url()]
        .into_iter()
        .flatten()
        .filter_map(|url| storage.extract_key(url))
        .collect();
    keys.sort();
    keys.dedup();

    for key in keys {
        if let Err(err) = storage.delete_object(&key).await {
            tracing::warn!(video_id = %id, key = %key, "could not delete stored object: {err}");
        }
    }
    tracing::info!(video_id = %id, "video deleted");

    Ok(DeleteVideoResponse {
        message: "Video deleted",
        video_id: id,
    })
}
