use std::{collections::BTreeMap, str::FromStr};

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{impl_entity, state_ref, EntityData};
use crate::{
    base::ResourceID,
    domain::datatype::media::{MediaMetadata, UploadedMedia},
    error::resource::{ValidationErrorKind, ValidationFieldError},
};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    #[display(fmt = "created")]
    Created,
    #[display(fmt = "uploaded")]
    Uploaded,
    #[display(fmt = "processing")]
    Processing,
    #[display(fmt = "ready")]
    Ready,
    #[display(fmt = "error")]
    Error,
}

impl VideoStatus {
    pub const VARIANTS: [&'static str; 5] = ["created", "uploaded", "processing", "ready", "error"];

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Created => "created",
            VideoStatus::Uploaded => "uploaded",
            VideoStatus::Processing => "processing",
            VideoStatus::Ready => "ready",
            VideoStatus::Error => "error",
        }
    }
}

impl ResourceID for VideoStatus {
    fn resource_id() -> &'static str {
        "media::video_status"
    }
}

impl FromStr for VideoStatus {
    type Err = ValidationFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "uploaded" => Ok(Self::Uploaded),
            "processing" => Ok(Self::Processing),
            "ready" => Ok(Self::Ready),
            "error" => Ok(Self::Error),
            _ => Err(ValidationFieldError::new(
                Self::resource_id(),
                s.into(),
                "/status".into(),
                vec![ValidationErrorKind::UnknownVariant(
                    Self::VARIANTS.iter().map(|v| v.to_string()).collect(),
                )],
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoState {
    pub(in crate::domain) name: Option<String>,
    pub(in crate::domain) transcript: Option<serde_json::Value>,
    pub(in crate::domain) original_url: Option<String>,
    pub(in crate::domain) low_res_url: Option<String>,
    pub(in crate::domain) high_res_url: Option<String>,
    pub(in crate::domain) original_filename: Option<String>,
    pub(in crate::domain) content_type: Option<String>,
    pub(in crate::domain) file_size: Option<i64>,
    pub(in crate::domain) duration: Option<f64>,
    pub(in crate::domain) width: Option<i32>,
    pub(in crate::domain) height: Option<i32>,
    pub(in crate::domain) fps: Option<f64>,
    pub(in crate::domain) current_style: serde_json::Value,
    pub(in crate::domain) owner_id: Uuid,
    pub(in crate::domain) style_id: Option<Uuid>,
    pub(in crate::domain) status: VideoStatus,
    pub(in crate::domain) all_styles_mapping: BTreeMap<String, Uuid>,
}

#[derive(Debug, Clone)]
pub struct Video {
    pub(in crate::domain) data: EntityData,
    pub(in crate::domain) state: VideoState,
}

impl_entity!(Video, VideoState);

/// User editable video fields, `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct VideoPatch {
    pub name: Option<String>,
    pub transcript: Option<serde_json::Value>,
    pub current_style: Option<serde_json::Value>,
    pub style_id: Option<Uuid>,
    pub status: Option<VideoStatus>,
}

/// Outcome of the caption generation media stage.
#[derive(Debug, Clone)]
pub struct ProcessedMedia {
    pub transcript: serde_json::Value,
    pub low_res_url: String,
    pub metadata: MediaMetadata,
}

impl Video {
    state_ref!(name, Option<String>);
    state_ref!(transcript, Option<serde_json::Value>);
    state_ref!(original_url, Option<String>);
    state_ref!(low_res_url, Option<String>);
    state_ref!(high_res_url, Option<String>);
    state_ref!(original_filename, Option<String>);
    state_ref!(content_type, Option<String>);
    state_ref!(current_style, serde_json::Value);
    state_ref!(all_styles_mapping, BTreeMap<String, Uuid>);

    pub fn file_size(&self) -> Option<i64> {
        self.state.file_size
    }

    pub fn duration(&self) -> Option<f64> {
        self.state.duration
    }

    pub fn width(&self) -> Option<i32> {
        self.state.width
    }

    pub fn height(&self) -> Option<i32> {
        self.state.height
    }

    pub fn fps(&self) -> Option<f64> {
        self.state.fps
    }

    pub fn owner_id(&self) -> Uuid {
        self.state.owner_id
    }

    pub fn style_id(&self) -> Option<Uuid> {
        self.state.style_id
    }

    pub fn status(&self) -> VideoStatus {
        self.state.status
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.state.owner_id == user_id
    }

    /// Video record of a file just stored in the object store.
    pub fn uploaded(owner_id: Uuid, media: UploadedMedia) -> Self {
        let name = media
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| media.original_filename.clone());

        Self::restore(
            EntityData::new(),
            VideoState {
                name: Some(name),
                transcript: None,
                high_res_url: Some(media.original_url.clone()),
                original_url: Some(media.original_url),
                low_res_url: None,
                original_filename: Some(media.original_filename),
                content_type: Some(media.content_type),
                file_size: Some(media.file_size),
                duration: None,
                width: None,
                height: None,
                fps: None,
                current_style: serde_json::Value::Object(Default::default()),
                owner_id,
                style_id: None,
                status: VideoStatus::Uploaded,
                all_styles_mapping: BTreeMap::new(),
            },
        )
    }

    pub fn apply(&mut self, patch: VideoPatch) {
        if let Some(name) = patch.name {
            self.state.name = Some(name);
        }
        if let Some(transcript) = patch.transcript {
            self.state.transcript = Some(transcript);
        }
        if let Some(current_style) = patch.current_style {
            self.state.current_style = current_style;
        }
        if let Some(style_id) = patch.style_id {
            self.state.style_id = Some(style_id);
        }
        if let Some(status) = patch.status {
            self.state.status = status;
        }
        self.data.touch();
    }

    pub fn start_processing(&mut self) {
        self.state.status = VideoStatus::Processing;
        self.data.touch();
    }

    /// Stores the generation output and makes `style_id` the only known style of the video.
    pub fn complete_processing(
        &mut self,
        media: ProcessedMedia,
        style_config: serde_json::Value,
        style_name: String,
        style_id: Uuid,
    ) {
        self.state.transcript = Some(media.transcript);
        self.state.low_res_url = Some(media.low_res_url);
        self.state.status = VideoStatus::Ready;
        self.state.width = Some(media.metadata.width);
        self.state.height = Some(media.metadata.height);
        self.state.fps = Some(media.metadata.fps);
        self.state.duration = Some(media.metadata.duration);
        self.state.current_style = style_config;
        self.state.style_id = Some(style_id);
        self.state.all_styles_mapping = BTreeMap::from([(style_name, style_id)]);
        self.data.touch();
    }

    /// Style id previously generated for `style_name`, if any.
    pub fn known_style(&self, style_name: &str) -> Option<Uuid> {
        self.state.all_styles_mapping.get(style_name).copied()
    }

    /// Makes `style_id` the active style, registering it under `style_name`.
    pub fn switch_style(
        &mut self,
        style_config: serde_json::Value,
        style_name: String,
        style_id: Uuid,
    ) {
        self.state.all_styles_mapping.insert(style_name, style_id);
        self.state.current_style = style_config;
        self.state.style_id = Some(style_id);
        self.data.touch();
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::domain::entity::Entity;

    fn uploaded_video(name: Option<&str>) -> Video {
        Video::uploaded(
            Uuid::new_v4(),
            UploadedMedia {
                name: name.map(String::from),
                original_url: "https://cdn.example.com/videos/user_1/abc.mp4".into(),
                original_filename: "clip.mp4".into(),
                content_type: "video/mp4".into(),
                file_size: 1024,
            },
        )
    }

    #[test]
    fn uploaded_video_defaults() {
        let video = uploaded_video(None);

        assert_eq!(video.status(), VideoStatus::Uploaded);
        assert_eq!(video.name().as_deref(), Some("clip.mp4"));
        assert_eq!(video.high_res_url(), video.original_url());
        assert_eq!(video.current_style(), &json!({}));
        assert!(video.all_styles_mapping().is_empty());

        let named = uploaded_video(Some("My clip"));
        assert_eq!(named.name().as_deref(), Some("My clip"));
    }

    #[test]
    fn apply_patch_only_touches_present_fields() {
        let mut video = uploaded_video(Some("before"));
        video.apply(VideoPatch {
            status: Some(VideoStatus::Ready),
            ..Default::default()
        });

        assert_eq!(video.name().as_deref(), Some("before"));
        assert_eq!(video.status(), VideoStatus::Ready);
        assert_eq!(video.version(), 2);
    }

    #[test]
    fn switch_style_extends_mapping() {
        let mut video = uploaded_video(None);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        video.complete_processing(
            ProcessedMedia {
                transcript: json!({"text": "hello"}),
                low_res_url: "low".into(),
                metadata: MediaMetadata {
                    width: 1080,
                    height: 1920,
                    duration: 12.5,
                    fps: 30.0,
                },
            },
            json!({"id": "matt"}),
            "matt".into(),
            first,
        );
        assert_eq!(video.status(), VideoStatus::Ready);
        assert_eq!(video.known_style("matt"), Some(first));

        video.switch_style(json!({"id": "two_line"}), "two_line".into(), second);
        assert_eq!(video.style_id(), Some(second));
        assert_eq!(video.known_style("matt"), Some(first));
        assert_eq!(video.all_styles_mapping().len(), 2);
    }

    #[test]
    fn every_change_advances_the_version_once() {
        let mut video = uploaded_video(None);
        assert_eq!(video.version(), 1);

        video.start_processing();
        assert_eq!(video.version(), 2);
        assert_eq!(video.status(), VideoStatus::Processing);

        video.switch_style(json!({"id": "matt"}), "matt".into(), Uuid::new_v4());
        assert_eq!(video.version(), 3);
        assert!(video.updated().is_some());
    }

    #[test]
    fn parse_status() {
        assert_eq!("processing".parse::<VideoStatus>(), Ok(VideoStatus::Processing));
        assert!("done".parse::<VideoStatus>().is_err());
    }
}
