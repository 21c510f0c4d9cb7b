use axum::{http::StatusCode, response::IntoResponse, Json};

use crate::JsonResponse;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    NotAuthorized(&'static str),
    #[error("You do not have permission to perform this action.")]
    Forbidden,
    #[error("Internal Server Error")]
    ServerError,
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct RequestErrorJsonWrapper {
    pub errors: String,
}

impl RequestErrorJsonWrapper {
    pub fn new(error: &str) -> RequestErrorJsonWrapper {
        RequestErrorJsonWrapper {
            errors: error.to_string(),
        }
    }
}

/// Which storage constraint rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintViolation {
    Unique,
    Check,
}

impl RequestError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Classifies a failed write by the SQLite constraint that rejected it.
    pub fn constraint_violation(&self) -> Option<ConstraintViolation> {
        let RequestError::DatabaseError(sqlx::Error::Database(e)) = self else {
            return None;
        };
        let message = e.message();
        if message.contains("UNIQUE constraint failed") {
            Some(ConstraintViolation::Unique)
        } else if message.contains("CHECK constraint failed") {
            Some(ConstraintViolation::Check)
        } else {
            None
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::Validation(_) | RequestError::Conflict(_) => StatusCode::BAD_REQUEST,
            RequestError::NotFound(_) => StatusCode::NOT_FOUND,
            RequestError::NotAuthorized(_) => StatusCode::UNAUTHORIZED,
            RequestError::Forbidden => StatusCode::FORBIDDEN,
            RequestError::ServerError | RequestError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn to_json_response(&self) -> JsonResponse<RequestErrorJsonWrapper> {
        let message = match self {
            RequestError::DatabaseError(e) => {
                tracing::error!("Database error: {}", e);
                "Internal Server Error".to_owned()
            }
            other => other.to_string(),
        };
        (self.status_code(), Json(RequestErrorJsonWrapper::new(&message)))
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> axum::response::Response {
        self.to_json_response().into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            RequestError::validation("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RequestError::conflict("twice").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RequestError::NotFound("Recipe not found").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            RequestError::NotAuthorized("Invalid token").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(RequestError::Forbidden.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn database_errors_are_not_leaked() {
        let (status, Json(body)) =
            RequestError::DatabaseError(sqlx::Error::RowNotFound).to_json_response();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.errors, "Internal Server Error");
    }

    #[test]
    fn messages_are_carried_into_the_body() {
        let (_, Json(body)) = RequestError::NotFound("Recipe not found").to_json_response();
        assert_eq!(body.errors, "Recipe not found");
    }
}
