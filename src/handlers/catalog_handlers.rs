use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use sqlx::SqlitePool;

use crate::{
    data_formats::{IngredientQueryParams, IngredientResponse, TagResponse},
    db_helpers::{get_ingredient_in_db, get_tag_in_db, get_tags_in_db, list_ingredients_in_db},
};

use super::JsonResult;

// ----------------- Tag Handlers -----------------
pub async fn list_tags(Extension(pool): Extension<Arc<SqlitePool>>) -> JsonResult<Vec<TagResponse>> {
    let tags = get_tags_in_db(&pool).await?;
    Ok(Json(tags.into_iter().map(TagResponse::from).collect()))
}

pub async fn get_tag(
    Extension(pool): Extension<Arc<SqlitePool>>,
    Path(id): Path<i64>,
) -> JsonResult<TagResponse> {
    let tag = get_tag_in_db(&pool, id).await?;
    Ok(Json(tag.into()))
}

// ----------------- Ingredient Handlers -----------------
pub async fn list_ingredients(
    Extension(pool): Extension<Arc<SqlitePool>>,
    Query(IngredientQueryParams { name }): Query<IngredientQueryParams>,
) -> JsonResult<Vec<IngredientResponse>> {
    let ingredients = list_ingredients_in_db(&pool, name.as_deref()).await?;
    Ok(Json(
        ingredients
            .into_iter()
            .map(IngredientResponse::from)
            .collect(),
    ))
}

pub async fn get_ingredient(
    Extension(pool): Extension<Arc<SqlitePool>>,
    Path(id): Path<i64>,
) -> JsonResult<IngredientResponse> {
    let ingredient = get_ingredient_in_db(&pool, id).await?;
    Ok(Json(ingredient.into()))
}
