use std::path::{Path, PathBuf};

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    app::resource::media::{
        ChangeStyle, ChangeStyleResponse, GenerateCaptions, GenerateCaptionsResponse,
    },
    base::ResourceID,
    domain::{
        datatype::media::low_res_key,
        entity::{
            iam::User,
            media::{ProcessedMedia, Video},
            style::Style,
            Entity,
        },
        service::{LanguageModel, MediaProcessor, ObjectStorage, Transcriber},
        subtitle::{
            pipeline::SubtitlePipeline,
            registry::{style_config, StyleConfig, STYLE_NAMES},
        },
    },
    error::{
        app::ApplicationError,
        persistence::PersistenceError,
        resource::{ValidationError, ValidationErrorKind, ValidationFieldError},
        security::ForbiddenError,
        service::{DispatchError, ServiceError, ServiceKind},
    },
    infra::database::repository,
};

/// Height of the rendition used for preview and transcription.
pub const LOW_RES_HEIGHT: u32 = 360;

const PREVIEW_CHARS: usize = 200;

/// Services taking part in caption generation.
pub struct CaptionServices<'a> {
    pub storage: &'a dyn ObjectStorage,
    pub media: &'a dyn MediaProcessor,
    pub transcriber: &'a dyn Transcriber,
    pub model: &'a dyn LanguageModel,
    pub temp_dir: &'a Path,
}

/// Style requested by a `style_config`, `"default"` when it names none.
pub fn style_name(style_config: &Value) -> &str {
    style_config["id"].as_str().unwrap_or("default")
}

/// Transcript text cut to its first 200 characters.
pub fn transcript_preview(transcript: &Value) -> String {
    let text = transcript["text"].as_str().unwrap_or_default();
    if text.chars().count() > PREVIEW_CHARS {
        let cut: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        text.to_owned()
    }
}

/// Last component of a client supplied file name.
fn local_filename(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "video.mp4".into())
}

fn invalid_field<R: ResourceID>(
    resource: R,
    type_id: &'static str,
    value: String,
    path: &str,
    kind: ValidationErrorKind,
) -> ApplicationError<R> {
    ValidationError::from_resource(
        resource,
        vec![ValidationFieldError::new(
            type_id,
            value,
            path.into(),
            vec![kind],
        )],
    )
    .into()
}

fn resolve_style<R: ResourceID>(resource: R, name: &str) -> Result<StyleConfig, ApplicationError<R>> {
    style_config(name).ok_or_else(|| {
        invalid_field(
            resource,
            "subtitle::style",
            name.to_owned(),
            "/style_config/id",
            ValidationErrorKind::UnknownVariant(STYLE_NAMES.iter().map(|s| s.to_string()).collect()),
        )
    })
}

async fn generate_timeline<L>(
    model: &L,
    config: StyleConfig,
    transcript: &Value,
) -> Result<Value, ServiceError>
where
    L: LanguageModel + ?Sized,
{
    let groups = SubtitlePipeline::new(model, config)
        .run(transcript)
        .await
        .map_err(|err| ServiceError::new(ServiceKind::Pipeline, err.to_string()))?;
    serde_json::to_value(groups)
        .map_err(|err| ServiceError::new(ServiceKind::Pipeline, err.to_string()))
}

async fn prepare_media(
    services: &CaptionServices<'_>,
    work_dir: &Path,
    key: &str,
    filename: &str,
    user_id: Uuid,
    video_id: Uuid,
) -> Result<ProcessedMedia, ServiceError> {
    let source = work_dir.join(filename);
    services.storage.download_file(key, &source).await?;

    let metadata = services.media.probe(&source).await?;
    let low_res: PathBuf = services
        .media
        .transcode_low_res(&source, LOW_RES_HEIGHT)
        .await?;
    let audio = services.media.extract_audio(&low_res).await?;

    let low_res_name = low_res
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_owned());
    let low_res_key = low_res_key(user_id, video_id, &low_res_name);
    let content_type = mime_guess::from_path(&low_res)
        .first_raw()
        .unwrap_or("video/mp4");

    let upload = async {
        services
            .storage
            .put_file(&low_res_key, &low_res, content_type)
            .await?;
        services.storage.access_url(&low_res_key).await
    };
    let (transcript, low_res_url) =
        tokio::try_join!(services.transcriber.transcribe(&audio), upload)?;

    Ok(ProcessedMedia {
        transcript,
        low_res_url,
        metadata,
    })
}

/// Downloads, probes, transcodes and transcribes a stored video in a scratch directory.
async fn process_media(
    services: &CaptionServices<'_>,
    key: &str,
    filename: &str,
    user_id: Uuid,
    video_id: Uuid,
) -> Result<ProcessedMedia, ServiceError> {
    let work_dir = services.temp_dir.join(format!("{user_id}-{video_id}"));
    tokio::fs::create_dir_all(&work_dir)
        .await
        .map_err(|err| ServiceError::dispatch(ServiceKind::Media, DispatchError::from(err)))?;

    let result = prepare_media(services, &work_dir, key, filename, user_id, video_id).await;

    if let Err(err) = tokio::fs::remove_dir_all(&work_dir).await {
        tracing::warn!(path = %work_dir.display(), "could not remove work directory: {err}");
    }
    result
}

/// Stores a generated style and the video now pointing at it, both or neither.
async fn save_generated_style(
    pool: &PgPool,
    style: &Style,
    video: &Video,
) -> Result<(), PersistenceError> {
    let mut trx = pool.begin().await?;
    repository::style::insert(&mut trx, style).await?;
    repository::video::update(&mut trx, video).await?;
    trx.commit().await?;
    Ok(())
}

struct Generated {
    style: Style,
    timeline: Value,
    low_res_url: String,
    preview: String,
}

async fn run_generation(
    pool: &PgPool,
    services: &CaptionServices<'_>,
    video: &mut Video,
    user: &User,
    dto: &GenerateCaptions,
    key: &str,
    style_name: &str,
    config: StyleConfig,
) -> Result<Generated, ApplicationError<()>> {
    let filename = local_filename(&dto.video_filename);
    let media = process_media(services, key, &filename, user.ident(), video.ident()).await?;
    tracing::info!(video_id = %video.ident(), "media processed");

    let timeline = generate_timeline(services.model, config, &media.transcript).await?;
    let style = Style::generated(
        style_name.to_owned(),
        video.ident(),
        timeline.clone(),
        user.ident(),
    );
    let preview = transcript_preview(&media.transcript);
    let low_res_url = media.low_res_url.clone();
    video.complete_processing(
        media,
        dto.style_config.clone(),
        style_name.to_owned(),
        style.ident(),
    );
    save_generated_style(pool, &style, video).await?;

    Ok(Generated {
        style,
        timeline,
        low_res_url,
        preview,
    })
}

/// Runs the whole caption pipeline for an uploaded video.
///
/// The video is `processing` while it runs, then `ready`, or `error` when any stage fails.
pub async fn generate_captions(
    pool: &PgPool,
    services: &CaptionServices<'_>,
    user: &User,
    dto: GenerateCaptions,
) -> Result<GenerateCaptionsResponse, ApplicationError<GenerateCaptions>> {
    if dto.user_id != user.ident() {
        return Err(ForbiddenError::AccessDenied.into());
    }

    let style_name = style_name(&dto.style_config).to_owned();
    let config = resolve_style(dto.clone(), &style_name)?;
    let Some(key) = services.storage.extract_key(&dto.video_url) else {
        let url = dto.video_url.clone();
        return Err(invalid_field(
            dto,
            "base::url",
            url,
            "/video_url",
            ValidationErrorKind::Invalid,
        ));
    };

    let mut video = super::owned_video(pool, user, dto.video_id).await?;
    video.start_processing();
    repository::video::update(pool, &video).await?;
    tracing::info!(video_id = %video.ident(), style = %style_name, "caption generation started");

    let generated = match run_generation(
        pool,
        services,
        &mut video,
        user,
        &dto,
        &key,
        &style_name,
        config,
    )
    .await
    {
        Ok(generated) => generated,
        Err(err) => {
            tracing::error!(video_id = %video.ident(), "caption generation failed: {err}");
            if let Err(err) = repository::video::mark_failed(pool, video.ident()).await {
                tracing::error!(video_id = %video.ident(), "could not flag video as failed: {err}");
            }
            return Err(ServiceError::new(
                ServiceKind::Pipeline,
                format!("Processing failed: {err}"),
            )
            .into());
        }
    };
    tracing::info!(video_id = %video.ident(), style_id = %generated.style.ident(), "captions ready");

    Ok(GenerateCaptionsResponse {
        success: true,
        video_id: video.ident(),
        status: video.status(),
        low_res_url: generated.low_res_url,
        result: generated.timeline,
        style_id: generated.style.ident(),
        style_name,
        transcript_preview: generated.preview,
    })
}

/// Response for a video switched back to a style generated earlier.
fn switched_response(
    video: &Video,
    style: &Style,
    style_name: String,
    current_style: Value,
) -> ChangeStyleResponse {
    ChangeStyleResponse {
        success: true,
        video_id: video.ident(),
        style_id: style.ident(),
        message: format!("Switched to existing style '{style_name}'"),
        style_name,
        current_style,
        result: style.styled_transcript().clone(),
        is_new_style: false,
        all_styles: None,
    }
}

/// Response for a style generated on this request, listing every style of the video.
fn generated_response(
    video: &Video,
    style: &Style,
    style_name: String,
    current_style: Value,
) -> ChangeStyleResponse {
    ChangeStyleResponse {
        success: true,
        video_id: video.ident(),
        style_id: style.ident(),
        message: format!("Generated and switched to new style '{style_name}'"),
        style_name,
        current_style,
        result: style.styled_transcript().clone(),
        is_new_style: true,
        all_styles: Some(video.all_styles_mapping().keys().cloned().collect()),
    }
}

/// Switches the video to another caption style, generating it on first use.
pub async fn change_style<L>(
    pool: &PgPool,
    model: &L,
    user: &User,
    dto: ChangeStyle,
) -> Result<ChangeStyleResponse, ApplicationError<ChangeStyle>>
where
    L: LanguageModel + ?Sized,
{
    let style_name = style_name(&dto.style_config).to_owned();
    let config = resolve_style(dto.clone(), &style_name)?;

    let mut video = super::owned_video(pool, user, dto.video_id).await?;
    let Some(transcript) = video.transcript().clone() else {
        return Err(invalid_field(
            dto,
            "media::transcript",
            String::new(),
            "/transcript",
            ValidationErrorKind::Required,
        ));
    };

    if let Some(style_id) = video.known_style(&style_name) {
        match repository::style::find(pool, style_id).await? {
            Some(style) => {
                video.switch_style(dto.style_config.clone(), style_name.clone(), style_id);
                repository::video::update(pool, &video).await?;
                tracing::info!(video_id = %video.ident(), style = %style_name, "switched to existing style");

                return Ok(switched_response(&video, &style, style_name, dto.style_config));
            }
            None => {
                tracing::warn!(video_id = %video.ident(), %style_id, "mapped style is gone, generating again")
            }
        }
    }

    tracing::info!(video_id = %video.ident(), style = %style_name, "generating new style");
    let timeline = generate_timeline(model, config, &transcript)
        .await
        .map_err(|err| {
            tracing::error!(video_id = %video.ident(), "style generation failed: {err}");
            ServiceError::new(
                ServiceKind::Pipeline,
                format!("Style generation failed: {}", err.message),
            )
        })?;

    let style = Style::generated(style_name.clone(), video.ident(), timeline, user.ident());
    video.switch_style(dto.style_config.clone(), style_name.clone(), style.ident());
    save_generated_style(pool, &style, &video).await?;

    Ok(generated_response(&video, &style, style_name, dto.style_config))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::domain::{datatype::media::UploadedMedia, subtitle::generator::test::ScriptedModel};

    fn uploaded_video(owner: Uuid) -> Video {
        Video::uploaded(
            owner,
            UploadedMedia {
                name: None,
                original_url: "https://cdn.example.com/videos/user_1/abc.mp4".into(),
                original_filename: "clip.mp4".into(),
                content_type: "video/mp4".into(),
                file_size: 1024,
            },
        )
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn style_name_defaults() {
        assert_eq!(style_name(&json!({"id": "matt"})), "matt");
        assert_eq!(style_name(&json!({})), "default");
        assert_eq!(style_name(&Value::Null), "default");
    }

    #[test]
    fn preview_is_truncated() {
        let short = json!({"text": "hello there"});
        assert_eq!(transcript_preview(&short), "hello there");

        let long = json!({"text": "a".repeat(250)});
        let preview = transcript_preview(&long);
        assert_eq!(preview.len(), 203);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn client_filenames_stay_in_work_dir() {
        assert_eq!(local_filename("../../etc/passwd"), "passwd");
        assert_eq!(local_filename("clip.mp4"), "clip.mp4");
        assert_eq!(local_filename(""), "video.mp4");
    }

    #[test]
    fn unknown_style_is_rejected() {
        let result = resolve_style((), "default");
        assert!(matches!(result, Err(ApplicationError::Validation(_))));
        assert!(resolve_style((), "matt").is_ok());
    }

    #[test]
    fn known_style_is_reused_with_its_captions() {
        let owner = Uuid::new_v4();
        let mut video = uploaded_video(owner);
        let style = Style::generated("matt".into(), video.ident(), json!([{"text": "hi"}]), owner);
        video.switch_style(json!({"id": "matt"}), "matt".into(), style.ident());
        assert_eq!(video.known_style("matt"), Some(style.ident()));

        let res = switched_response(&video, &style, "matt".into(), json!({"id": "matt"}));

        assert!(!res.is_new_style);
        assert_eq!(res.style_id, style.ident());
        assert_eq!(res.result, Some(json!([{"text": "hi"}])));
        assert_eq!(res.all_styles, None);
        assert_eq!(res.message, "Switched to existing style 'matt'");
    }

    #[test]
    fn new_style_lists_every_style_of_the_video() {
        let owner = Uuid::new_v4();
        let mut video = uploaded_video(owner);
        let first = Style::generated("matt".into(), video.ident(), json!([]), owner);
        video.switch_style(json!({"id": "matt"}), "matt".into(), first.ident());
        assert_eq!(video.known_style("minimal"), None);

        let second = Style::generated("minimal".into(), video.ident(), json!([{"text": "yo"}]), owner);
        video.switch_style(json!({"id": "minimal"}), "minimal".into(), second.ident());
        let res = generated_response(&video, &second, "minimal".into(), json!({"id": "minimal"}));

        assert!(res.is_new_style);
        assert_eq!(res.style_id, second.ident());
        assert_eq!(res.result, Some(json!([{"text": "yo"}])));
        assert_eq!(res.all_styles, Some(vec!["matt".to_owned(), "minimal".to_owned()]));
        assert_eq!(res.message, "Generated and switched to new style 'minimal'");
    }

    #[tokio::test]
    async fn style_change_can_run_on_a_worker_thread() {
        let pool = PgPool::connect_lazy("postgres://localhost/captions").unwrap();
        let scripted = ScriptedModel::new(Vec::new());
        let model: &dyn LanguageModel = &scripted;
        let user = User::new("a@b.com".into(), "sub-1".into(), None, None);
        let dto = ChangeStyle {
            video_id: Uuid::new_v4(),
            style_config: json!({"id": "matt"}),
        };

        assert_send(&change_style(&pool, model, &user, dto));
    }
}
