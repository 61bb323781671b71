use std::collections::BTreeMap;

use serde_json::Value;
use sqlx::{postgres::PgRow, types::Json, Row};
use uuid::Uuid;

use super::entity::{
    iam::{User, UserState},
    media::{Video, VideoState},
    style::{Style, StyleLayouts, StyleState},
    EntityData,
};

fn decode_error<E>(err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(err))
}

impl TryFrom<&PgRow> for EntityData {
    type Error = sqlx::Error;

    fn try_from(row: &PgRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            created: row.try_get("created")?,
            updated: row.try_get("updated")?,
            version: row.try_get::<i64, _>("version")? as u32,
        })
    }
}

impl TryFrom<&PgRow> for UserState {
    type Error = sqlx::Error;

    fn try_from(row: &PgRow) -> Result<Self, Self::Error> {
        Ok(Self {
            email: row.try_get("email")?,
            google_id: row.try_get("google_id")?,
            name: row.try_get("name")?,
            picture: row.try_get("picture")?,
            credits: row.try_get("credits")?,
            subscription: row
                .try_get::<&str, _>("subscription")?
                .parse()
                .map_err(decode_error)?,
        })
    }
}

impl TryFrom<&PgRow> for User {
    type Error = sqlx::Error;

    fn try_from(row: &PgRow) -> Result<Self, Self::Error> {
        Ok(Self::restore(row.try_into()?, row.try_into()?))
    }
}

impl TryFrom<&PgRow> for VideoState {
    type Error = sqlx::Error;

    fn try_from(row: &PgRow) -> Result<Self, Self::Error> {
        let Json(all_styles_mapping) =
            row.try_get::<Json<BTreeMap<String, Uuid>>, _>("all_styles_mapping")?;

        Ok(Self {
            name: row.try_get("name")?,
            transcript: row.try_get::<Option<Value>, _>("transcript")?,
            original_url: row.try_get("original_url")?,
            low_res_url: row.try_get("low_res_url")?,
            high_res_url: row.try_get("high_res_url")?,
            original_filename: row.try_get("original_filename")?,
            content_type: row.try_get("content_type")?,
            file_size: row.try_get("file_size")?,
            duration: row.try_get("duration")?,
            width: row.try_get("width")?,
            height: row.try_get("height")?,
            fps: row.try_get("fps")?,
            current_style: row.try_get::<Value, _>("current_style")?,
            owner_id: row.try_get("owner_id")?,
            style_id: row.try_get("style_id")?,
            status: row
                .try_get::<&str, _>("status")?
                .parse()
                .map_err(decode_error)?,
            all_styles_mapping,
        })
    }
}

impl TryFrom<&PgRow> for Video {
    type Error = sqlx::Error;

    fn try_from(row: &PgRow) -> Result<Self, Self::Error> {
        Ok(Self::restore(row.try_into()?, row.try_into()?))
    }
}

impl TryFrom<&PgRow> for StyleLayouts {
    type Error = sqlx::Error;

    fn try_from(row: &PgRow) -> Result<Self, Self::Error> {
        Ok(Self {
            matt: row.try_get("matt")?,
            three_lines: row.try_get("three_lines")?,
            two_lines: row.try_get("two_lines")?,
            one_line: row.try_get("one_line")?,
            spotlight: row.try_get("spotlight")?,
            split_screen: row.try_get("split_screen")?,
            minimal: row.try_get("minimal")?,
            dynamic: row.try_get("dynamic")?,
        })
    }
}

impl TryFrom<&PgRow> for StyleState {
    type Error = sqlx::Error;

    fn try_from(row: &PgRow) -> Result<Self, Self::Error> {
        Ok(Self {
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            layouts: row.try_into()?,
            styled_transcript: row.try_get::<Option<Value>, _>("styled_transcript")?,
            creator_id: row.try_get("creator_id")?,
            is_default: row.try_get("is_default")?,
        })
    }
}

impl TryFrom<&PgRow> for Style {
    type Error = sqlx::Error;

    fn try_from(row: &PgRow) -> Result<Self, Self::Error> {
        Ok(Self::restore(row.try_into()?, row.try_into()?))
    }
}
