pub mod connection {
    use std::time::Duration;

    use sqlx::{postgres::PgPoolOptions, PgPool};

    use crate::{config::env_var, error::persistence::PersistenceError};

    fn pool_options() -> PgPoolOptions {
        PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .acquire_timeout(Duration::from_millis(1000))
            .idle_timeout(Duration::from_millis(1000 * 30))
            .max_lifetime(Duration::from_millis(1000 * 10))
    }

    pub async fn create_sqlx_pool() -> PgPool {
        let dburl = env_var::get().database_url.clone();
        pool_options()
            .connect(&dburl)
            .await
            .expect("Expect to create a database pool with a open connection")
    }

    /// Pool that only connects on first use.
    pub fn create_lazy_pool(dburl: &str) -> Result<PgPool, PersistenceError> {
        Ok(pool_options().connect_lazy(dburl)?)
    }

    /// Creates the schema objects missing from the database.
    pub async fn apply_schema(pool: &PgPool) -> Result<(), PersistenceError> {
        let mut trx = pool.begin().await?;
        for sttm in include_str!("../../dbschema.sql").split(';') {
            if sttm.trim().is_empty() {
                continue;
            }
            sqlx::query(sttm).execute(&mut trx).await?;
        }
        trx.commit().await?;

        tracing::info!("database schema applied");
        Ok(())
    }
}

pub mod repository {
    use sqlx::{
        postgres::{PgExecutor, PgRow},
        types::Json,
        PgPool,
    };
    use uuid::Uuid;

    use crate::{
        base::Page,
        domain::entity::{iam::User, media::Video, style::Style, Entity},
        error::persistence::PersistenceError,
    };

    fn decode_all<T>(rows: Vec<PgRow>) -> Result<Vec<T>, PersistenceError>
    where
        T: for<'r> TryFrom<&'r PgRow, Error = sqlx::Error>,
    {
        Ok(rows
            .iter()
            .map(|row| T::try_from(row))
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Outcome of an update guarded by the version the entity was read at.
    fn versioned(rows_affected: u64) -> Result<(), PersistenceError> {
        if rows_affected == 0 {
            return Err(PersistenceError::Conflict);
        }
        Ok(())
    }

    fn decode_opt<T>(row: Option<PgRow>) -> Result<Option<T>, PersistenceError>
    where
        T: for<'r> TryFrom<&'r PgRow, Error = sqlx::Error>,
    {
        Ok(row.as_ref().map(|row| T::try_from(row)).transpose()?)
    }

    pub mod user {
        use chrono::Utc;
        use sqlx::Row;

        use super::*;
        use crate::domain::entity::iam::Subscription;

        const SELECT: &str = concat!(
            "SELECT id, created, updated, version, email, google_id, name, picture, ",
            "credits, subscription FROM app.\"user\""
        );

        pub async fn insert(pool: &PgPool, user: &User) -> Result<(), PersistenceError> {
            sqlx::query(concat!(
                "INSERT INTO app.\"user\" (id, created, updated, version, email, google_id, ",
                "name, picture, credits, subscription) ",
                "VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
            ))
            .bind(user.ident())
            .bind(user.created())
            .bind(user.updated())
            .bind(user.version() as i64)
            .bind(user.email())
            .bind(user.google_id())
            .bind(user.name())
            .bind(user.picture())
            .bind(user.credits())
            .bind(user.subscription().as_str())
            .execute(pool)
            .await?;

            Ok(())
        }

        /// Adds `credits` to the account of `email` and sets its plan in a single statement.
        ///
        /// Returns the account id and its new balance, `None` when no account has that email.
        pub async fn add_credits_by_email(
            pool: &PgPool,
            email: &str,
            credits: i32,
            subscription: Subscription,
        ) -> Result<Option<(Uuid, i32)>, PersistenceError> {
            let row = sqlx::query(concat!(
                "UPDATE app.\"user\" SET credits = credits + $2, subscription = $3, ",
                "updated = $4, version = version + 1 WHERE email = $1 RETURNING id, credits"
            ))
            .bind(email)
            .bind(credits)
            .bind(subscription.as_str())
            .bind(Utc::now())
            .fetch_optional(pool)
            .await?;

            Ok(row
                .map(|row| Ok::<_, sqlx::Error>((row.try_get("id")?, row.try_get("credits")?)))
                .transpose()?)
        }

        pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<User>, PersistenceError> {
            let row = sqlx::query(&format!("{SELECT} WHERE id = $1"))
                .bind(id)
                .fetch_optional(pool)
                .await?;
            decode_opt(row)
        }

        pub async fn find_by_google_id(
            pool: &PgPool,
            google_id: &str,
        ) -> Result<Option<User>, PersistenceError> {
            let row = sqlx::query(&format!("{SELECT} WHERE google_id = $1"))
                .bind(google_id)
                .fetch_optional(pool)
                .await?;
            decode_opt(row)
        }

        pub async fn find_by_email(
            pool: &PgPool,
            email: &str,
        ) -> Result<Option<User>, PersistenceError> {
            let row = sqlx::query(&format!("{SELECT} WHERE email = $1"))
                .bind(email)
                .fetch_optional(pool)
                .await?;
            decode_opt(row)
        }

        pub async fn list(pool: &PgPool, page: Page) -> Result<Vec<User>, PersistenceError> {
            let rows = sqlx::query(&format!("{SELECT} ORDER BY created OFFSET $1 LIMIT $2"))
                .bind(page.skip)
                .bind(page.limit)
                .fetch_all(pool)
                .await?;
            decode_all(rows)
        }
    }

    pub mod video {
        use chrono::Utc;

        use super::*;
        use crate::domain::entity::media::VideoStatus;

        const SELECT: &str = concat!(
            "SELECT id, created, updated, version, name, transcript, original_url, low_res_url, ",
            "high_res_url, original_filename, content_type, file_size, duration, width, height, ",
            "fps, current_style, owner_id, style_id, status, all_styles_mapping FROM app.video"
        );

        pub async fn insert(pool: &PgPool, video: &Video) -> Result<(), PersistenceError> {
            sqlx::query(concat!(
                "INSERT INTO app.video (id, created, updated, version, name, transcript, ",
                "original_url, low_res_url, high_res_url, original_filename, content_type, ",
                "file_size, duration, width, height, fps, current_style, owner_id, style_id, ",
                "status, all_styles_mapping) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, ",
                "$11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)"
            ))
            .bind(video.ident())
            .bind(video.created())
            .bind(video.updated())
            .bind(video.version() as i64)
            .bind(video.name())
            .bind(video.transcript())
            .bind(video.original_url())
            .bind(video.low_res_url())
            .bind(video.high_res_url())
            .bind(video.original_filename())
            .bind(video.content_type())
            .bind(video.file_size())
            .bind(video.duration())
            .bind(video.width())
            .bind(video.height())
            .bind(video.fps())
            .bind(video.current_style())
            .bind(video.owner_id())
            .bind(video.style_id())
            .bind(video.status().as_str())
            .bind(Json(video.all_styles_mapping()))
            .execute(pool)
            .await?;

            Ok(())
        }

        /// Persists every mutable field of the video.
        ///
        /// Fails with [`PersistenceError::Conflict`] when the row is no longer at the version
        /// preceding `video`.
        pub async fn update<'c, E>(executor: E, video: &Video) -> Result<(), PersistenceError>
        where
            E: PgExecutor<'c>,
        {
            let result = sqlx::query(concat!(
                "UPDATE app.video SET updated = $2, version = $3, name = $4, transcript = $5, ",
                "low_res_url = $6, high_res_url = $7, duration = $8, width = $9, height = $10, ",
                "fps = $11, current_style = $12, style_id = $13, status = $14, ",
                "all_styles_mapping = $15 WHERE id = $1 AND version = $3 - 1"
            ))
            .bind(video.ident())
            .bind(video.updated())
            .bind(video.version() as i64)
            .bind(video.name())
            .bind(video.transcript())
            .bind(video.low_res_url())
            .bind(video.high_res_url())
            .bind(video.duration())
            .bind(video.width())
            .bind(video.height())
            .bind(video.fps())
            .bind(video.current_style())
            .bind(video.style_id())
            .bind(video.status().as_str())
            .bind(Json(video.all_styles_mapping()))
            .execute(executor)
            .await?;

            versioned(result.rows_affected())
        }

        /// Flags the video as failed whatever its current version.
        pub async fn mark_failed(pool: &PgPool, id: Uuid) -> Result<bool, PersistenceError> {
            let result = sqlx::query(concat!(
                "UPDATE app.video SET status = $2, updated = $3, version = version + 1 ",
                "WHERE id = $1"
            ))
            .bind(id)
            .bind(VideoStatus::Error.as_str())
            .bind(Utc::now())
            .execute(pool)
            .await?;
            Ok(result.rows_affected() > 0)
        }

        pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Video>, PersistenceError> {
            let row = sqlx::query(&format!("{SELECT} WHERE id = $1"))
                .bind(id)
                .fetch_optional(pool)
                .await?;
            decode_opt(row)
        }

        pub async fn list_by_owner(
            pool: &PgPool,
            owner_id: Uuid,
            page: Page,
        ) -> Result<Vec<Video>, PersistenceError> {
            let rows = sqlx::query(&format!(
                "{SELECT} WHERE owner_id = $1 ORDER BY created OFFSET $2 LIMIT $3"
            ))
            .bind(owner_id)
            .bind(page.skip)
            .bind(page.limit)
            .fetch_all(pool)
            .await?;
            decode_all(rows)
        }

        pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, PersistenceError> {
            let result = sqlx::query("DELETE FROM app.video WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await?;
            Ok(result.rows_affected() > 0)
        }
    }

    pub mod style {
        use super::*;

        const SELECT: &str = concat!(
            "SELECT id, created, updated, version, name, description, matt, three_lines, ",
            "two_lines, one_line, spotlight, split_screen, minimal, dynamic, styled_transcript, ",
            "creator_id, is_default FROM app.style"
        );

        pub async fn insert<'c, E>(executor: E, style: &Style) -> Result<(), PersistenceError>
        where
            E: PgExecutor<'c>,
        {
            let layouts = style.layouts();
            sqlx::query(concat!(
                "INSERT INTO app.style (id, created, updated, version, name, description, matt, ",
                "three_lines, two_lines, one_line, spotlight, split_screen, minimal, dynamic, ",
                "styled_transcript, creator_id, is_default) VALUES ($1, $2, $3, $4, $5, $6, $7, ",
                "$8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"
            ))
            .bind(style.ident())
            .bind(style.created())
            .bind(style.updated())
            .bind(style.version() as i64)
            .bind(style.name())
            .bind(style.description())
            .bind(&layouts.matt)
            .bind(&layouts.three_lines)
            .bind(&layouts.two_lines)
            .bind(&layouts.one_line)
            .bind(&layouts.spotlight)
            .bind(&layouts.split_screen)
            .bind(&layouts.minimal)
            .bind(&layouts.dynamic)
            .bind(style.styled_transcript())
            .bind(style.creator_id())
            .bind(style.is_default())
            .execute(executor)
            .await?;

            Ok(())
        }

        pub async fn update(pool: &PgPool, style: &Style) -> Result<(), PersistenceError> {
            let layouts = style.layouts();
            let result = sqlx::query(concat!(
                "UPDATE app.style SET updated = $2, version = $3, name = $4, description = $5, ",
                "matt = $6, three_lines = $7, two_lines = $8, one_line = $9, spotlight = $10, ",
                "split_screen = $11, minimal = $12, dynamic = $13 ",
                "WHERE id = $1 AND version = $3 - 1"
            ))
            .bind(style.ident())
            .bind(style.updated())
            .bind(style.version() as i64)
            .bind(style.name())
            .bind(style.description())
            .bind(&layouts.matt)
            .bind(&layouts.three_lines)
            .bind(&layouts.two_lines)
            .bind(&layouts.one_line)
            .bind(&layouts.spotlight)
            .bind(&layouts.split_screen)
            .bind(&layouts.minimal)
            .bind(&layouts.dynamic)
            .execute(pool)
            .await?;

            versioned(result.rows_affected())
        }

        pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Style>, PersistenceError> {
            let row = sqlx::query(&format!("{SELECT} WHERE id = $1"))
                .bind(id)
                .fetch_optional(pool)
                .await?;
            decode_opt(row)
        }

        pub async fn list(
            pool: &PgPool,
            include_default: bool,
            page: Page,
        ) -> Result<Vec<Style>, PersistenceError> {
            let filter = if include_default {
                ""
            } else {
                " WHERE NOT is_default"
            };
            let rows = sqlx::query(&format!(
                "{SELECT}{filter} ORDER BY created OFFSET $1 LIMIT $2"
            ))
            .bind(page.skip)
            .bind(page.limit)
            .fetch_all(pool)
            .await?;
            decode_all(rows)
        }

        pub async fn list_defaults(pool: &PgPool) -> Result<Vec<Style>, PersistenceError> {
            let rows = sqlx::query(&format!("{SELECT} WHERE is_default ORDER BY created"))
                .fetch_all(pool)
                .await?;
            decode_all(rows)
        }

        pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, PersistenceError> {
            let result = sqlx::query("DELETE FROM app.style WHERE id = $1 AND NOT is_default")
                .bind(id)
                .execute(pool)
                .await?;
            Ok(result.rows_affected() > 0)
        }
    }
}
