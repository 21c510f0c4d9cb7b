use axum::{
    http::{StatusCode, Uri},
    Json,
};

use crate::data_formats::{Pagination, Paginated};
use crate::errors::RequestError;

mod catalog_handlers;
mod recipe_handlers;
mod user_handlers;

pub use catalog_handlers::*;
pub use recipe_handlers::*;
pub use user_handlers::*;

type JsonResult<T> = Result<Json<T>, RequestError>;
type CreatedResult<T> = Result<(StatusCode, Json<T>), RequestError>;

// ----------------- Helper Handlers -----------------
pub async fn alive() -> &'static str {
    "alive"
}

pub async fn not_found(uri: Uri) -> Result<(), (StatusCode, String)> {
    Err((
        StatusCode::NOT_FOUND,
        format!("URL {} provided was not found", uri),
    ))
}

/// Wraps one page of results; a page past the end is reported as missing.
fn paginate<T>(
    results: Vec<T>,
    count: i64,
    pagination: Pagination,
    uri: &Uri,
    pairs: &[(String, String)],
) -> Result<Paginated<T>, RequestError> {
    if results.is_empty() && pagination.page > 1 {
        return Err(RequestError::NotFound("Invalid page."));
    }
    Ok(Paginated::new(results, count, pagination, uri.path(), pairs))
}
