use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::{header, StatusCode, Uri},
    response::IntoResponse,
    Extension, Json,
};
use sqlx::SqlitePool;

use crate::{
    authentication::{AuthUser, MaybeUser},
    config::Config,
    data_formats::{
        Paginated, QueryPairs, RecipeQueryParams, RecipeRequest, RecipeResponse,
        RecipeShortResponse,
    },
    db_helpers::{
        add_recipe_to_list_in_db, check_recipe_references_in_db, create_recipe_in_db,
        delete_recipe_in_db, ensure_recipe_author_in_db, generate_shopping_list_in_db,
        get_recipe_in_db, list_recipes_in_db, remove_recipe_from_list_in_db, update_recipe_in_db,
        validate_recipe_request, RecipeList, RecipeWrite,
    },
    errors::RequestError,
    media::{remove_media_file, with_saved_image},
    shopping_list::SHOPPING_LIST_FILENAME,
};

use super::{paginate, CreatedResult, JsonResult};

// ----------------- Recipe Handlers -----------------
pub async fn list_recipes(
    Extension(pool): Extension<Arc<SqlitePool>>,
    Extension(config): Extension<Arc<Config>>,
    maybe_user: MaybeUser,
    uri: Uri,
    Query(pairs): Query<QueryPairs>,
) -> JsonResult<Paginated<RecipeResponse>> {
    let params = RecipeQueryParams::from_pairs(&pairs, config.page_size)?;
    let pagination = params.pagination;
    let (recipes, count) = list_recipes_in_db(&pool, maybe_user.get_id(), params).await?;
    let page = paginate(recipes, count, pagination, &uri, &pairs)?;
    Ok(Json(
        page.map(|recipe| RecipeResponse::new(recipe, &config.media_url)),
    ))
}

pub async fn get_recipe(
    Extension(pool): Extension<Arc<SqlitePool>>,
    Extension(config): Extension<Arc<Config>>,
    maybe_user: MaybeUser,
    Path(id): Path<i64>,
) -> JsonResult<RecipeResponse> {
    let recipe = get_recipe_in_db(&pool, maybe_user.get_id(), id).await?;
    Ok(Json(RecipeResponse::new(recipe, &config.media_url)))
}

pub async fn create_recipe(
    Extension(pool): Extension<Arc<SqlitePool>>,
    Extension(config): Extension<Arc<Config>>,
    AuthUser { id, .. }: AuthUser,
    Json(request): Json<RecipeRequest>,
) -> CreatedResult<RecipeResponse> {
    let mut fields = validate_recipe_request(request, RecipeWrite::Create)?;
    // Nothing is written to disk for a payload that references unknown rows.
    check_recipe_references_in_db(&pool, &fields).await?;
    let image = fields
        .image
        .take()
        .ok_or_else(|| RequestError::validation("image is required"))?;
    let recipe = with_saved_image(&config.media_root, image, |image| {
        create_recipe_in_db(&pool, id, fields, image)
    })
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(RecipeResponse::new(recipe, &config.media_url)),
    ))
}

pub async fn update_recipe(
    Extension(pool): Extension<Arc<SqlitePool>>,
    Extension(config): Extension<Arc<Config>>,
    AuthUser { id, .. }: AuthUser,
    Path(recipe_id): Path<i64>,
    Json(request): Json<RecipeRequest>,
) -> JsonResult<RecipeResponse> {
    let mut fields = validate_recipe_request(request, RecipeWrite::Update)?;
    ensure_recipe_author_in_db(&pool, id, recipe_id).await?;
    check_recipe_references_in_db(&pool, &fields).await?;
    let update = match fields.image.take() {
        Some(image) => {
            with_saved_image(&config.media_root, image, |image| {
                update_recipe_in_db(&pool, id, recipe_id, fields, Some(image))
            })
            .await?
        }
        None => update_recipe_in_db(&pool, id, recipe_id, fields, None).await?,
    };
    if let Some(replaced) = &update.replaced_image {
        remove_media_file(&config.media_root, replaced).await;
    }
    Ok(Json(RecipeResponse::new(update.detail, &config.media_url)))
}

pub async fn delete_recipe(
    Extension(pool): Extension<Arc<SqlitePool>>,
    Extension(config): Extension<Arc<Config>>,
    AuthUser { id, .. }: AuthUser,
    Path(recipe_id): Path<i64>,
) -> Result<StatusCode, RequestError> {
    let image = delete_recipe_in_db(&pool, id, recipe_id).await?;
    remove_media_file(&config.media_root, &image).await;
    Ok(StatusCode::NO_CONTENT)
}

// ----------------- Favorite Handlers -----------------
pub async fn favorite_recipe(
    Extension(pool): Extension<Arc<SqlitePool>>,
    Extension(config): Extension<Arc<Config>>,
    AuthUser { id, .. }: AuthUser,
    Path(recipe_id): Path<i64>,
) -> CreatedResult<RecipeShortResponse> {
    add_to_list(&pool, &config, id, recipe_id, RecipeList::Favorites).await
}

pub async fn unfavorite_recipe(
    Extension(pool): Extension<Arc<SqlitePool>>,
    AuthUser { id, .. }: AuthUser,
    Path(recipe_id): Path<i64>,
) -> Result<StatusCode, RequestError> {
    remove_recipe_from_list_in_db(&pool, id, recipe_id, RecipeList::Favorites).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ----------------- Shopping Cart Handlers -----------------
pub async fn add_to_shopping_cart(
    Extension(pool): Extension<Arc<SqlitePool>>,
    Extension(config): Extension<Arc<Config>>,
    AuthUser { id, .. }: AuthUser,
    Path(recipe_id): Path<i64>,
) -> CreatedResult<RecipeShortResponse> {
    add_to_list(&pool, &config, id, recipe_id, RecipeList::ShoppingCart).await
}

pub async fn remove_from_shopping_cart(
    Extension(pool): Extension<Arc<SqlitePool>>,
    AuthUser { id, .. }: AuthUser,
    Path(recipe_id): Path<i64>,
) -> Result<StatusCode, RequestError> {
    remove_recipe_from_list_in_db(&pool, id, recipe_id, RecipeList::ShoppingCart).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn download_shopping_cart(
    Extension(pool): Extension<Arc<SqlitePool>>,
    AuthUser { id, .. }: AuthUser,
) -> Result<impl IntoResponse, RequestError> {
    let list = generate_shopping_list_in_db(&pool, id).await?;
    let disposition = format!("attachment; filename=\"{}\"", SHOPPING_LIST_FILENAME);
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_owned()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        list,
    ))
}

async fn add_to_list(
    pool: &SqlitePool,
    config: &Config,
    user_id: i64,
    recipe_id: i64,
    list: RecipeList,
) -> CreatedResult<RecipeShortResponse> {
    let recipe = add_recipe_to_list_in_db(pool, user_id, recipe_id, list).await?;
    Ok((
        StatusCode::CREATED,
        Json(RecipeShortResponse::new(recipe, &config.media_url)),
    ))
}
