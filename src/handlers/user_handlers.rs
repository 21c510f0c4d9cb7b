use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::{StatusCode, Uri},
    Extension, Json,
};
use sqlx::SqlitePool;

use crate::{
    authentication::{
        get_jwt_token, hash_password_argon2, verify_password_argon2, AuthUser, MaybeUser,
    },
    config::Config,
    data_formats::{
        CreatedUserResponse, LoginRequest, Pagination, Paginated, QueryPairs, RegisterRequest,
        SetPasswordRequest, SubscriptionQueryParams, SubscriptionResponse, TokenResponse,
        UserResponse,
    },
    db_helpers::{
        follow_user_in_db, get_profile_in_db, get_user_by_email, get_user_by_id, insert_user,
        list_profiles_in_db, list_subscriptions_in_db, set_password_in_db, unfollow_user_in_db,
        validate_password, validate_registration,
    },
    errors::RequestError,
};

use super::{paginate, CreatedResult, JsonResult};

// ----------------- Auth Handlers -----------------
pub async fn login_user(
    Extension(pool): Extension<Arc<SqlitePool>>,
    Extension(config): Extension<Arc<Config>>,
    Json(request): Json<LoginRequest>,
) -> JsonResult<TokenResponse> {
    let invalid = || RequestError::validation("Unable to log in with provided credentials.");

    let user = get_user_by_email(&pool, request.email.trim())
        .await?
        .ok_or_else(invalid)?;
    let is_password_correct = verify_password_argon2(request.password, &user.password)
        .await
        .map_err(|e| {
            tracing::error!("Could not verify password: {}", e);
            RequestError::ServerError
        })?;
    if !is_password_correct {
        return Err(invalid());
    }

    let auth_token = get_jwt_token(user.id, &config.jwt_secret).map_err(|e| {
        tracing::error!("Could not issue token: {}", e);
        RequestError::ServerError
    })?;
    tracing::info!("User {} logged in", user.id);
    Ok(Json(TokenResponse { auth_token }))
}

/// Tokens are stateless, so there is nothing to revoke server-side.
pub async fn logout_user(AuthUser { id, .. }: AuthUser) -> StatusCode {
    tracing::info!("User {} logged out", id);
    StatusCode::NO_CONTENT
}

// ----------------- User Handlers -----------------
pub async fn register_user(
    Extension(pool): Extension<Arc<SqlitePool>>,
    Json(mut user): Json<RegisterRequest>,
) -> CreatedResult<CreatedUserResponse> {
    validate_registration(&user)?;
    user.password = hash_password_argon2(user.password).await.map_err(|e| {
        tracing::error!("Could not hash password: {}", e);
        RequestError::ServerError
    })?;

    let user = insert_user(&pool, &user).await?;
    Ok((StatusCode::CREATED, Json(CreatedUserResponse::new(user))))
}

pub async fn list_users(
    Extension(pool): Extension<Arc<SqlitePool>>,
    Extension(config): Extension<Arc<Config>>,
    maybe_user: MaybeUser,
    uri: Uri,
    Query(pairs): Query<QueryPairs>,
) -> JsonResult<Paginated<UserResponse>> {
    let pagination = Pagination::from_pairs(&pairs, config.page_size)?;
    let (profiles, count) = list_profiles_in_db(&pool, maybe_user.get_id(), pagination).await?;
    let page = paginate(profiles, count, pagination, &uri, &pairs)?;
    Ok(Json(page.map(UserResponse::from)))
}

pub async fn get_user(
    Extension(pool): Extension<Arc<SqlitePool>>,
    maybe_user: MaybeUser,
    Path(id): Path<i64>,
) -> JsonResult<UserResponse> {
    let profile = get_profile_in_db(&pool, maybe_user.get_id(), id).await?;
    Ok(Json(profile.into()))
}

pub async fn get_current_user(
    Extension(pool): Extension<Arc<SqlitePool>>,
    AuthUser { id, .. }: AuthUser,
) -> JsonResult<UserResponse> {
    let profile = get_profile_in_db(&pool, Some(id), id).await?;
    Ok(Json(profile.into()))
}

pub async fn set_password(
    Extension(pool): Extension<Arc<SqlitePool>>,
    AuthUser { id, .. }: AuthUser,
    Json(SetPasswordRequest {
        new_password,
        current_password,
    }): Json<SetPasswordRequest>,
) -> Result<StatusCode, RequestError> {
    let user = get_user_by_id(&pool, id)
        .await?
        .ok_or(RequestError::NotFound("User not found"))?;
    let is_password_correct = verify_password_argon2(current_password, &user.password)
        .await
        .map_err(|e| {
            tracing::error!("Could not verify password: {}", e);
            RequestError::ServerError
        })?;
    if !is_password_correct {
        return Err(RequestError::validation("Current password is incorrect"));
    }
    validate_password(&new_password)?;

    let hash = hash_password_argon2(new_password).await.map_err(|e| {
        tracing::error!("Could not hash password: {}", e);
        RequestError::ServerError
    })?;
    set_password_in_db(&pool, id, &hash).await?;
    tracing::info!("User {} changed password", id);
    Ok(StatusCode::NO_CONTENT)
}

// ----------------- Subscription Handlers -----------------
pub async fn list_subscriptions(
    Extension(pool): Extension<Arc<SqlitePool>>,
    Extension(config): Extension<Arc<Config>>,
    AuthUser { id, .. }: AuthUser,
    uri: Uri,
    Query(pairs): Query<QueryPairs>,
) -> JsonResult<Paginated<SubscriptionResponse>> {
    let params = SubscriptionQueryParams::from_pairs(&pairs, config.page_size)?;
    let pagination = params.pagination;
    let (subscriptions, count) = list_subscriptions_in_db(&pool, id, params).await?;
    let page = paginate(subscriptions, count, pagination, &uri, &pairs)?;
    Ok(Json(page.map(|subscription| {
        SubscriptionResponse::new(
            subscription.profile,
            subscription.recipes,
            subscription.recipes_count,
            &config.media_url,
        )
    })))
}

pub async fn subscribe(
    Extension(pool): Extension<Arc<SqlitePool>>,
    Extension(config): Extension<Arc<Config>>,
    AuthUser { id, .. }: AuthUser,
    Path(author_id): Path<i64>,
    Query(pairs): Query<QueryPairs>,
) -> CreatedResult<SubscriptionResponse> {
    let params = SubscriptionQueryParams::from_pairs(&pairs, config.page_size)?;
    let subscription = follow_user_in_db(&pool, id, author_id, params.recipes_limit).await?;
    Ok((
        StatusCode::CREATED,
        Json(SubscriptionResponse::new(
            subscription.profile,
            subscription.recipes,
            subscription.recipes_count,
            &config.media_url,
        )),
    ))
}

pub async fn unsubscribe(
    Extension(pool): Extension<Arc<SqlitePool>>,
    AuthUser { id, .. }: AuthUser,
    Path(author_id): Path<i64>,
) -> Result<StatusCode, RequestError> {
    unfollow_user_in_db(&pool, id, author_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
