use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    app::resource::media::{UploadStatusResponse, UploadVideo, UploadVideoResponse},
    domain::{
        datatype::media::{
            resolve_content_type, upload_key, UploadedMedia, ALLOWED_EXTENSIONS, MAX_UPLOAD_SIZE,
        },
        entity::{iam::User, media::Video, Entity},
        service::{ByteChunks, ObjectStorage},
    },
    error::{
        app::ApplicationError,
        resource::{ValidationError, ValidationErrorKind, ValidationFieldError},
        service::UploadError,
    },
    infra::database::repository,
};

fn file_error(upload: UploadVideo, kind: ValidationErrorKind) -> ApplicationError<UploadVideo> {
    let value = upload.filename.clone();
    ValidationError::from_resource(
        upload,
        vec![ValidationFieldError::new(
            "media::file",
            value,
            "/file".into(),
            vec![kind],
        )],
    )
    .into()
}

fn too_large(upload: UploadVideo) -> ApplicationError<UploadVideo> {
    file_error(upload, ValidationErrorKind::MaxLength(MAX_UPLOAD_SIZE))
}

/// Media object written to storage but not yet registered as a video.
#[derive(Debug, Clone)]
pub struct StoredVideo {
    pub key: String,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
}

/// Streams an uploaded media file into storage.
///
/// The content type is checked before any byte of `body` is read.
pub async fn store_video<S>(
    storage: &S,
    user: &User,
    upload: UploadVideo,
    body: ByteChunks<'_>,
) -> Result<StoredVideo, ApplicationError<UploadVideo>>
where
    S: ObjectStorage + ?Sized,
{
    let Some(content_type) = resolve_content_type(upload.content_type.as_deref(), &upload.filename)
    else {
        let allowed = ALLOWED_EXTENSIONS.iter().map(|ext| ext.to_string()).collect();
        return Err(file_error(upload, ValidationErrorKind::UnknownVariant(allowed)));
    };

    let key = upload_key(user.ident(), &upload.filename);
    let metadata = HashMap::from([
        ("original-filename".to_owned(), upload.filename.clone()),
        ("uploaded-by".to_owned(), user.ident().to_string()),
        ("content-type".to_owned(), content_type.clone()),
    ]);

    tracing::info!(
        user_id = %user.ident(),
        key = %key,
        content_type = %content_type,
        "uploading video"
    );
    let size = match storage
        .upload_stream(&key, &content_type, metadata, body)
        .await
    {
        Ok(size) => size,
        Err(UploadError::TooLarge { .. }) => return Err(too_large(upload)),
        Err(UploadError::Body(err)) => {
            tracing::warn!(key = %key, "upload body interrupted: {err}");
            return Err(file_error(upload, ValidationErrorKind::Invalid));
        }
        Err(UploadError::Service(err)) => return Err(err.into()),
    };

    Ok(StoredVideo {
        key,
        filename: upload.filename,
        content_type,
        size,
    })
}

/// Registers the video of a stored upload.
///
/// The stored object is removed when the video can not be registered.
pub async fn register_video<S>(
    pool: &PgPool,
    storage: &S,
    user: &User,
    stored: StoredVideo,
    name: Option<String>,
) -> Result<UploadVideoResponse, ApplicationError<UploadVideo>>
where
    S: ObjectStorage + ?Sized,
{
    let StoredVideo {
        key,
        filename,
        content_type,
        size,
    } = stored;

    let registered = async {
        let original_url = storage.access_url(&key).await?;
        let video = Video::uploaded(
            user.ident(),
            UploadedMedia {
                name,
                original_url,
                original_filename: filename,
                content_type,
                file_size: size as i64,
            },
        );
        repository::video::insert(pool, &video).await?;
        Ok::<_, ApplicationError<UploadVideo>>(video)
    }
    .await;

    let video = match registered {
        Ok(video) => video,
        Err(err) => {
            if let Err(cleanup) = storage.delete_object(&key).await {
                tracing::warn!(key = %key, "could not remove unregistered upload: {cleanup}");
            }
            return Err(err);
        }
    };
    tracing::info!(video_id = %video.ident(), size, "video uploaded");

    Ok(UploadVideoResponse {
        video_id: video.ident(),
        status: video.status(),
        message: "Video uploaded successfully",
        original_url: video.original_url().clone().unwrap_or_default(),
        name: video.name().clone(),
        user_id: user.ident(),
    })
}

pub async fn upload_status(
    pool: &PgPool,
    user: &User,
    id: Uuid,
) -> Result<UploadStatusResponse, ApplicationError<()>> {
    let video = super::owned_video(pool, user, id).await?;
    Ok(UploadStatusResponse {
        video_id: video.ident(),
        status: video.status(),
        original_url: video.original_url().clone(),
        high_res_url: video.high_res_url().clone(),
        progress: None,
    })
}

#[cfg(test)]
mod test {
    use std::{
        path::Path,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::{stream, StreamExt};
    use pretty_assertions::assert_eq;
    use salvo::{http::StatusCode, Response};

    use super::*;
    use crate::error::service::{ServiceError, ServiceKind};

    /// Storage reading the whole body, answering with the configured outcome.
    struct StubStorage {
        outcome: fn(u64) -> Result<u64, UploadError>,
        reads: AtomicUsize,
    }

    impl StubStorage {
        fn new(outcome: fn(u64) -> Result<u64, UploadError>) -> Self {
            Self {
                outcome,
                reads: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ObjectStorage for StubStorage {
        async fn upload_stream(
            &self,
            _: &str,
            _: &str,
            _: HashMap<String, String>,
            mut body: ByteChunks<'_>,
        ) -> Result<u64, UploadError> {
            let mut total = 0;
            while let Some(chunk) = body.next().await {
                self.reads.fetch_add(1, Ordering::SeqCst);
                total += chunk?.len() as u64;
            }
            (self.outcome)(total)
        }

        async fn put_file(&self, _: &str, _: &Path, _: &str) -> Result<(), ServiceError> {
            unimplemented!()
        }

        async fn download_file(&self, _: &str, _: &Path) -> Result<u64, ServiceError> {
            unimplemented!()
        }

        async fn delete_object(&self, _: &str) -> Result<(), ServiceError> {
            Ok(())
        }

        async fn access_url(&self, key: &str) -> Result<String, ServiceError> {
            Ok(format!("https://cdn.example.com/{key}"))
        }

        fn extract_key(&self, _: &str) -> Option<String> {
            None
        }
    }

    fn upload(filename: &str) -> UploadVideo {
        UploadVideo {
            filename: filename.into(),
            content_type: None,
            name: None,
        }
    }

    fn body(chunks: Vec<Result<Bytes, UploadError>>) -> ByteChunks<'static> {
        stream::iter(chunks).boxed()
    }

    fn status_of(err: ApplicationError<UploadVideo>) -> Option<StatusCode> {
        let mut res = Response::new();
        res.render(err);
        res.status_code()
    }

    fn user() -> User {
        User::new("a@b.com".into(), "sub-1".into(), None, None)
    }

    #[tokio::test]
    async fn stores_the_streamed_body() {
        let storage = StubStorage::new(Ok);
        let user = user();
        let chunks = vec![Ok(Bytes::from_static(b"abc")), Ok(Bytes::from_static(b"de"))];

        let stored = store_video(&storage, &user, upload("clip.mp4"), body(chunks))
            .await
            .unwrap();

        assert_eq!(stored.size, 5);
        assert_eq!(stored.content_type, "video/mp4");
        assert!(stored.key.starts_with(&format!("videos/user_{}/", user.ident())));
        assert!(stored.key.ends_with(".mp4"));
        assert_eq!(storage.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unsupported_type_is_rejected_before_reading() {
        let storage = StubStorage::new(Ok);
        let chunks = vec![Ok(Bytes::from_static(b"abc"))];

        let err = store_video(&storage, &user(), upload("notes.txt"), body(chunks))
            .await
            .unwrap_err();

        assert_eq!(status_of(err), Some(StatusCode::BAD_REQUEST));
        assert_eq!(storage.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oversized_upload_is_a_bad_request() {
        let storage = StubStorage::new(|_| Err(UploadError::TooLarge { limit: MAX_UPLOAD_SIZE }));
        let chunks = vec![Ok(Bytes::from_static(b"abc"))];

        let err = store_video(&storage, &user(), upload("clip.mov"), body(chunks))
            .await
            .unwrap_err();

        match &err {
            ApplicationError::Validation(validation) => {
                let field = &validation.fields[0];
                assert_eq!(field.path, "/file");
                assert_eq!(field.kinds, vec![ValidationErrorKind::MaxLength(MAX_UPLOAD_SIZE)]);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(status_of(err), Some(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn interrupted_body_is_a_bad_request() {
        let storage = StubStorage::new(Ok);
        let chunks = vec![
            Ok(Bytes::from_static(b"abc")),
            Err(UploadError::Body("connection reset".into())),
        ];

        let err = store_video(&storage, &user(), upload("clip.mp4"), body(chunks))
            .await
            .unwrap_err();

        assert_eq!(status_of(err), Some(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn storage_failure_is_a_server_error() {
        let storage =
            StubStorage::new(|_| Err(ServiceError::new(ServiceKind::Storage, "down").into()));

        let err = store_video(&storage, &user(), upload("clip.mp4"), body(vec![]))
            .await
            .unwrap_err();

        assert_eq!(status_of(err), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }
}
