pub mod authentication;
pub mod config;
pub mod data_formats;
pub mod db_helpers;
pub mod errors;
pub mod handlers;
pub mod media;
pub mod models;
pub mod shopping_list;

use anyhow::Context;
pub use anyhow::Result;
use axum::http::StatusCode;
use axum::{routing::*, Extension, Json, Router};
use config::Config;
pub use data_formats::*;
use handlers::*;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use std::{net::TcpListener, sync::Arc};
use tower_http::{services::ServeDir, trace::TraceLayer};

pub type JsonResponse<T> = (StatusCode, Json<T>);

pub async fn run_app(config: Config) -> Result<()> {
    let listener = TcpListener::bind(config.address)
        .with_context(|| format!("Could not bind {}", config.address))?;
    let pool = init_db(&config.database_url).await?;
    let app = make_router(Arc::new(config), pool);
    serve(listener, app).await
}

/// Serves `app` on an already bound listener until the server stops.
pub async fn serve(listener: TcpListener, app: Router) -> Result<()> {
    tracing::info!("Server started on {}", listener.local_addr()?);
    axum::Server::from_tcp(listener)?
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

pub async fn init_db(db_url: &str) -> Result<SqlitePool> {
    if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
        tracing::info!("Creating database {}", db_url);
        Sqlite::create_database(db_url)
            .await
            .with_context(|| format!("Could not create database {}", db_url))?;
    } else {
        tracing::debug!("Database already exists");
    }
    let pool = SqlitePool::connect(db_url).await?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations completed");
    Ok(pool)
}

pub fn make_router(config: Arc<Config>, pool: SqlitePool) -> Router {
    let api = Router::new()
        .route("/auth/token/login/", post(login_user))
        .route("/auth/token/logout/", post(logout_user))
        .route("/users/", get(list_users).post(register_user))
        .route("/users/me/", get(get_current_user))
        .route("/users/set_password/", post(set_password))
        .route("/users/subscriptions/", get(list_subscriptions))
        .route("/users/:id/", get(get_user))
        .route("/users/:id/subscribe/", post(subscribe).delete(unsubscribe))
        .route("/tags/", get(list_tags))
        .route("/tags/:id/", get(get_tag))
        .route("/ingredients/", get(list_ingredients))
        .route("/ingredients/:id/", get(get_ingredient))
        .route("/recipes/", get(list_recipes).post(create_recipe))
        .route(
            "/recipes/download_shopping_cart/",
            get(download_shopping_cart),
        )
        .route(
            "/recipes/:id/",
            get(get_recipe).patch(update_recipe).delete(delete_recipe),
        )
        .route(
            "/recipes/:id/favorite/",
            post(favorite_recipe).delete(unfavorite_recipe),
        )
        .route(
            "/recipes/:id/shopping_cart/",
            post(add_to_shopping_cart).delete(remove_from_shopping_cart),
        );

    Router::new()
        .route("/check_health", get(alive))
        .nest("/api", api)
        .nest_service(config.media_mount(), ServeDir::new(&config.media_root))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(pool)))
        .layer(Extension(config))
}
