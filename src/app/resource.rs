macro_rules! resource_response {
    (struct $name:ident; $($field:ident: $field_ty:ty),+ ,) => {
		#[derive(core::fmt::Debug, core::clone::Clone, serde::Serialize)]
        pub struct $name {
            pub id: Uuid,
            pub created: DateTime<Utc>,
            pub updated: Option<DateTime<Utc>>,
            pub version: u32,
            $(pub $field: $field_ty),+
        }
    };
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub mod iam {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    use super::media::VideoResponse;
    use crate::{base::resource_id, domain::entity::iam::Subscription};

    pub const TOKEN_TYPE: &str = "bearer";

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct GoogleAuthDto {
        pub token: String,
    }

    resource_id!(GoogleAuthDto, "iam::GoogleAuth");

    resource_response! {
        struct UserResponse;
        email: String,
        name: Option<String>,
        picture: Option<String>,
        credits: i32,
        subscription: Subscription,
    }

    resource_id!(UserResponse, "iam::User");

    #[derive(Debug, Clone, Serialize)]
    pub struct UserWithVideosResponse {
        #[serde(flatten)]
        pub user: UserResponse,
        pub videos: Vec<VideoResponse>,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct TokenResponse {
        pub access_token: String,
        pub token_type: &'static str,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct AuthenticateUserResponse {
        pub access_token: String,
        pub token_type: &'static str,
        pub user: UserResponse,
    }

    resource_id!(AuthenticateUserResponse, "iam::AuthenticateUser");
}

pub mod media {
    use std::collections::BTreeMap;

    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use serde_json::Value;
    use uuid::Uuid;

    use crate::{base::resource_id, domain::entity::media::VideoStatus};

    resource_response! {
        struct VideoResponse;
        name: Option<String>,
        transcript: Option<Value>,
        original_url: Option<String>,
        low_res_url: Option<String>,
        high_res_url: Option<String>,
        original_filename: Option<String>,
        content_type: Option<String>,
        file_size: Option<i64>,
        duration: Option<f64>,
        width: Option<i32>,
        height: Option<i32>,
        fps: Option<f64>,
        current_style: Value,
        owner_id: Uuid,
        style_id: Option<Uuid>,
        status: VideoStatus,
        all_styles_mapping: BTreeMap<String, Uuid>,
    }

    resource_id!(VideoResponse, "media::Video");

    /// Multipart upload as received, before it is stored.
    #[derive(Debug, Clone, Default, Serialize)]
    pub struct UploadVideo {
        pub filename: String,
        pub content_type: Option<String>,
        pub name: Option<String>,
    }

    resource_id!(UploadVideo, "media::UploadVideo");

    #[derive(Debug, Clone, Serialize)]
    pub struct UploadVideoResponse {
        pub video_id: Uuid,
        pub status: VideoStatus,
        pub message: &'static str,
        pub original_url: String,
        pub name: Option<String>,
        pub user_id: Uuid,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct UploadStatusResponse {
        pub video_id: Uuid,
        pub status: VideoStatus,
        pub original_url: Option<String>,
        pub high_res_url: Option<String>,
        pub progress: Option<u8>,
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct UpdateVideo {
        pub name: Option<String>,
        pub transcript: Option<Value>,
        pub current_style: Option<Value>,
        pub style_id: Option<Uuid>,
        pub status: Option<String>,
    }

    resource_id!(UpdateVideo, "media::UpdateVideo");

    #[derive(Debug, Clone, Serialize)]
    pub struct DeleteVideoResponse {
        pub message: &'static str,
        pub video_id: Uuid,
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct GenerateCaptions {
        pub user_id: Uuid,
        pub video_id: Uuid,
        pub video_url: String,
        #[serde(default)]
        pub style_config: Value,
        pub video_filename: String,
    }

    resource_id!(GenerateCaptions, "media::GenerateCaptions");

    #[derive(Debug, Clone, Serialize)]
    pub struct GenerateCaptionsResponse {
        pub success: bool,
        pub video_id: Uuid,
        pub status: VideoStatus,
        pub low_res_url: String,
        pub result: Value,
        pub style_id: Uuid,
        pub style_name: String,
        pub transcript_preview: String,
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct ChangeStyle {
        pub video_id: Uuid,
        #[serde(default)]
        pub style_config: Value,
    }

    resource_id!(ChangeStyle, "media::ChangeStyle");

    #[derive(Debug, Clone, Serialize)]
    pub struct ChangeStyleResponse {
        pub success: bool,
        pub video_id: Uuid,
        pub style_id: Uuid,
        pub style_name: String,
        pub current_style: Value,
        pub result: Option<Value>,
        pub message: String,
        pub is_new_style: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub all_styles: Option<Vec<String>>,
    }
}

pub mod style {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use serde_json::Value;
    use uuid::Uuid;

    use crate::base::resource_id;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct CreateStyle {
        pub name: String,
        pub description: Option<String>,
        pub matt: Option<Value>,
        pub three_lines: Option<Value>,
        pub two_lines: Option<Value>,
        pub one_line: Option<Value>,
        pub spotlight: Option<Value>,
        pub split_screen: Option<Value>,
        pub minimal: Option<Value>,
        pub dynamic: Option<Value>,
    }

    resource_id!(CreateStyle, "style::CreateStyle");

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct UpdateStyle {
        pub name: Option<String>,
        pub description: Option<String>,
        pub matt: Option<Value>,
        pub three_lines: Option<Value>,
        pub two_lines: Option<Value>,
        pub one_line: Option<Value>,
        pub spotlight: Option<Value>,
        pub split_screen: Option<Value>,
        pub minimal: Option<Value>,
        pub dynamic: Option<Value>,
    }

    resource_id!(UpdateStyle, "style::UpdateStyle");

    resource_response! {
        struct StyleResponse;
        name: String,
        description: Option<String>,
        matt: Value,
        three_lines: Value,
        two_lines: Value,
        one_line: Value,
        spotlight: Value,
        split_screen: Value,
        minimal: Value,
        dynamic: Value,
        styled_transcript: Option<Value>,
        creator_id: Option<Uuid>,
        is_default: bool,
    }

    resource_id!(StyleResponse, "style::Style");
}

pub mod payment {
    use serde::Serialize;

    use crate::domain::entity::iam::Subscription;

    #[derive(Debug, Clone, Serialize)]
    pub struct CheckoutSessionsResponse {
        pub premium: String,
        pub ultra: String,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct SubscriptionStatusResponse {
        pub subscription: Subscription,
        pub credits: i32,
        pub email: String,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct WebhookResponse {
        pub status: &'static str,
    }
}
