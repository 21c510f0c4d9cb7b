use sqlx::{Sqlite, SqlitePool};

use crate::errors::{ConstraintViolation, RequestError};
use crate::models::Ingredient;

use super::escape_like;

/// Ingredients whose name contains `name` (case-insensitive), with names
/// starting with it listed first. Without a filter every ingredient is returned.
///
/// SQLite only folds ASCII case, so matching runs against `search_name`, the
/// name lowercased on insert, with the filter lowercased the same way.
pub async fn list_ingredients_in_db(
    pool: &SqlitePool,
    name: Option<&str>,
) -> Result<Vec<Ingredient>, RequestError> {
    let name = name.map(str::trim).filter(|name| !name.is_empty());
    let result = match name {
        Some(name) => {
            let escaped = escape_like(&name.to_lowercase());
            sqlx::query_as::<Sqlite, Ingredient>(
                r#"
                SELECT id, name, measurement_unit
                FROM   ingredients
                WHERE  search_name LIKE '%' || $1 || '%' ESCAPE '\'
                ORDER  BY search_name LIKE $1 || '%' ESCAPE '\' DESC, name, measurement_unit
                "#,
            )
            .bind(escaped)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<Sqlite, Ingredient>(
                "SELECT id, name, measurement_unit FROM ingredients ORDER BY name, measurement_unit",
            )
            .fetch_all(pool)
            .await?
        }
    };
    Ok(result)
}

pub async fn get_ingredient_in_db(pool: &SqlitePool, id: i64) -> Result<Ingredient, RequestError> {
    sqlx::query_as::<Sqlite, Ingredient>(
        "SELECT id, name, measurement_unit FROM ingredients WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(RequestError::NotFound("Ingredient not found"))
}

pub async fn create_ingredient_in_db(
    pool: &SqlitePool,
    name: &str,
    measurement_unit: &str,
) -> Result<Ingredient, RequestError> {
    let (name, measurement_unit) = (name.trim(), measurement_unit.trim());
    if name.is_empty() || measurement_unit.is_empty() {
        return Err(RequestError::validation(
            "Ingredient name and measurement unit must not be empty",
        ));
    }

    let mut tx = pool.begin().await?;
    let ingredient = sqlx::query_as::<Sqlite, Ingredient>(
        r#"
        INSERT INTO ingredients (name, measurement_unit, search_name)
        VALUES ($1, $2, $3)
        RETURNING id, name, measurement_unit
        "#,
    )
    .bind(name)
    .bind(measurement_unit)
    .bind(name.to_lowercase())
    .fetch_one(&mut tx)
    .await
    .map_err(RequestError::from)
    .map_err(|e| match e.constraint_violation() {
        Some(ConstraintViolation::Unique) => {
            RequestError::validation("This ingredient already exists with that unit")
        }
        _ => e,
    })?;
    tx.commit().await?;
    Ok(ingredient)
}
