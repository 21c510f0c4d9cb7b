use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::{Sqlite, SqlitePool};

use crate::errors::{ConstraintViolation, RequestError};
use crate::models::Tag;

static SLUG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("slug pattern is valid"));
static COLOR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("color pattern is valid"));

pub async fn get_tags_in_db(pool: &SqlitePool) -> Result<Vec<Tag>, RequestError> {
    let result = sqlx::query_as::<Sqlite, Tag>("SELECT id, name, color, slug FROM tags ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(result)
}

pub async fn get_tag_in_db(pool: &SqlitePool, id: i64) -> Result<Tag, RequestError> {
    sqlx::query_as::<Sqlite, Tag>("SELECT id, name, color, slug FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(RequestError::NotFound("Tag not found"))
}

pub async fn create_tag_in_db(
    pool: &SqlitePool,
    name: &str,
    color: &str,
    slug: &str,
) -> Result<Tag, RequestError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RequestError::validation("Tag name must not be empty"));
    }
    if !COLOR_PATTERN.is_match(color) {
        return Err(RequestError::validation("Tag color must look like #RRGGBB"));
    }
    if !SLUG_PATTERN.is_match(slug) {
        return Err(RequestError::validation(
            "Tag slug may contain only letters, digits, - and _",
        ));
    }

    // Colors are unique regardless of hex digit case.
    let color = color.to_ascii_uppercase();

    let mut tx = pool.begin().await?;
    let tag = sqlx::query_as::<Sqlite, Tag>(
        r#"
        INSERT INTO tags (name, color, slug)
        VALUES ($1, $2, $3)
        RETURNING id, name, color, slug
        "#,
    )
    .bind(name)
    .bind(&color)
    .bind(slug)
    .fetch_one(&mut tx)
    .await
    .map_err(RequestError::from)
    .map_err(|e| match e.constraint_violation() {
        Some(ConstraintViolation::Unique) => {
            RequestError::validation("A tag with that name, color or slug already exists")
        }
        _ => e,
    })?;
    tx.commit().await?;
    Ok(tag)
}
