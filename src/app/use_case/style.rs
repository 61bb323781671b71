use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    app::resource::{
        style::{CreateStyle, StyleResponse, UpdateStyle},
        MessageResponse,
    },
    base::Page,
    domain::entity::{
        iam::User,
        style::{Style, StyleLayouts},
        Entity,
    },
    error::{
        app::ApplicationError,
        resource::{NotFoundError, ValidationError, ValidationErrorKind, ValidationFieldError},
        security::ForbiddenError,
    },
    infra::database::repository,
};

async fn find_style<R>(pool: &PgPool, id: Uuid) -> Result<Style, ApplicationError<R>> {
    repository::style::find(pool, id)
        .await?
        .ok_or_else(|| NotFoundError::new::<StyleResponse>(id).into())
}

/// Default styles are read-only, custom ones only writable by their creator.
fn check_writable<R>(style: &Style, user: &User) -> Result<(), ApplicationError<R>> {
    if style.is_default() {
        return Err(ForbiddenError::DefaultResource.into());
    }
    if !style.is_created_by(user.ident()) {
        return Err(ForbiddenError::AccessDenied.into());
    }
    Ok(())
}

pub async fn create_style(
    pool: &PgPool,
    user: &User,
    dto: CreateStyle,
) -> Result<StyleResponse, ApplicationError<CreateStyle>> {
    if dto.name.trim().is_empty() {
        let value = dto.name.clone();
        return Err(ValidationError::from_resource(
            dto,
            vec![ValidationFieldError::new(
                "base::string",
                value,
                "/name".into(),
                vec![ValidationErrorKind::Required],
            )],
        )
        .into());
    }

    let name = dto.name.clone();
    let description = dto.description.clone();
    let style = Style::new(
        name,
        description,
        StyleLayouts::from(dto),
        None,
        Some(user.ident()),
    );
    repository::style::insert(pool, &style).await?;
    tracing::info!(style_id = %style.ident(), user_id = %user.ident(), "style created");

    Ok(style.into())
}

pub async fn list_styles(
    pool: &PgPool,
    include_default: bool,
    page: Page,
) -> Result<Vec<StyleResponse>, ApplicationError<()>> {
    let styles = repository::style::list(pool, include_default, page).await?;
    Ok(styles.into_iter().map(StyleResponse::from).collect())
}

pub async fn list_default_styles(pool: &PgPool) -> Result<Vec<StyleResponse>, ApplicationError<()>> {
    let styles = repository::style::list_defaults(pool).await?;
    Ok(styles.into_iter().map(StyleResponse::from).collect())
}

pub async fn get_style(pool: &PgPool, id: Uuid) -> Result<StyleResponse, ApplicationError<()>> {
    Ok(find_style(pool, id).await?.into())
}

pub async fn update_style(
    pool: &PgPool,
    user: &User,
    id: Uuid,
    dto: UpdateStyle,
) -> Result<StyleResponse, ApplicationError<UpdateStyle>> {
    let mut style = find_style(pool, id).await?;
    check_writable(&style, user)?;

    style.apply(dto.into());
    repository::style::update(pool, &style).await?;

    Ok(style.into())
}

pub async fn delete_style(
    pool: &PgPool,
    user: &User,
    id: Uuid,
) -> Result<MessageResponse, ApplicationError<()>> {
    let style = find_style(pool, id).await?;
    check_writable(&style, user)?;

    if !repository::style::delete(pool, id).await? {
        return Err(NotFoundError::new::<StyleResponse>(id).into());
    }
    tracing::info!(style_id = %id, "style deleted");

    Ok(MessageResponse {
        message: "Style deleted successfully".into(),
    })
}
