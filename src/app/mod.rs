pub mod resource;
pub mod use_case;

pub mod transform {
    pub mod user {
        use crate::{
            app::resource::iam::UserResponse,
            domain::entity::{iam::User, Entity},
        };

        impl From<&User> for UserResponse {
            fn from(user: &User) -> Self {
                Self {
                    id: user.ident(),
                    created: user.created(),
                    updated: user.updated(),
                    version: user.version(),
                    email: user.email().clone(),
                    name: user.name().clone(),
                    picture: user.picture().clone(),
                    credits: user.credits(),
                    subscription: user.subscription(),
                }
            }
        }

        impl From<User> for UserResponse {
            fn from(user: User) -> Self {
                Self::from(&user)
            }
        }
    }

    pub mod video {
        use crate::{
            app::resource::media::VideoResponse,
            domain::entity::{media::Video, Entity},
        };

        impl From<&Video> for VideoResponse {
            fn from(video: &Video) -> Self {
                Self {
                    id: video.ident(),
                    created: video.created(),
                    updated: video.updated(),
                    version: video.version(),
                    file_size: video.file_size(),
                    duration: video.duration(),
                    width: video.width(),
                    height: video.height(),
                    fps: video.fps(),
                    owner_id: video.owner_id(),
                    style_id: video.style_id(),
                    status: video.status(),
                    name: video.name().clone(),
                    transcript: video.transcript().clone(),
                    original_url: video.original_url().clone(),
                    low_res_url: video.low_res_url().clone(),
                    high_res_url: video.high_res_url().clone(),
                    original_filename: video.original_filename().clone(),
                    content_type: video.content_type().clone(),
                    current_style: video.current_style().clone(),
                    all_styles_mapping: video.all_styles_mapping().clone(),
                }
            }
        }

        impl From<Video> for VideoResponse {
            fn from(video: Video) -> Self {
                Self::from(&video)
            }
        }
    }

    pub mod style {
        use serde_json::Value;

        use crate::{
            app::resource::style::{CreateStyle, StyleResponse, UpdateStyle},
            domain::entity::{
                style::{Style, StyleLayouts, StylePatch},
                Entity,
            },
        };

        impl From<Style> for StyleResponse {
            fn from(style: Style) -> Self {
                let layouts = style.layouts().clone();
                Self {
                    id: style.ident(),
                    created: style.created(),
                    updated: style.updated(),
                    version: style.version(),
                    creator_id: style.creator_id(),
                    is_default: style.is_default(),
                    name: style.name().clone(),
                    description: style.description().clone(),
                    styled_transcript: style.styled_transcript().clone(),
                    matt: layouts.matt,
                    three_lines: layouts.three_lines,
                    two_lines: layouts.two_lines,
                    one_line: layouts.one_line,
                    spotlight: layouts.spotlight,
                    split_screen: layouts.split_screen,
                    minimal: layouts.minimal,
                    dynamic: layouts.dynamic,
                }
            }
        }

        impl From<CreateStyle> for StyleLayouts {
            fn from(dto: CreateStyle) -> Self {
                let or_empty =
                    |value: Option<Value>| value.unwrap_or_else(|| Value::Object(Default::default()));
                Self {
                    matt: or_empty(dto.matt),
                    three_lines: or_empty(dto.three_lines),
                    two_lines: or_empty(dto.two_lines),
                    one_line: or_empty(dto.one_line),
                    spotlight: or_empty(dto.spotlight),
                    split_screen: or_empty(dto.split_screen),
                    minimal: or_empty(dto.minimal),
                    dynamic: or_empty(dto.dynamic),
                }
            }
        }

        impl From<UpdateStyle> for StylePatch {
            fn from(dto: UpdateStyle) -> Self {
                Self {
                    name: dto.name,
                    description: dto.description,
                    matt: dto.matt,
                    three_lines: dto.three_lines,
                    two_lines: dto.two_lines,
                    one_line: dto.one_line,
                    spotlight: dto.spotlight,
                    split_screen: dto.split_screen,
                    minimal: dto.minimal,
                    dynamic: dto.dynamic,
                }
            }
        }
    }
}
