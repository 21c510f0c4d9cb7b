use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::{
    data_formats::{Pagination, RegisterRequest},
    errors::{ConstraintViolation, RequestError},
    models::{Profile, User},
};

pub const RESERVED_USERNAME: &str = "me";
const USERNAME_MAX_LENGTH: usize = 150;
const NAME_MAX_LENGTH: usize = 150;
const EMAIL_MAX_LENGTH: usize = 254;
pub const PASSWORD_MIN_LENGTH: usize = 8;

static USERNAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\w.@+-]+$").expect("username pattern is valid")
});

const USER_COLUMNS: &str = "id, email, username, first_name, last_name, password, created_at";

const PROFILE_QUERY: &str = r#"
    SELECT users.id,
           users.email,
           users.username,
           users.first_name,
           users.last_name,
           EXISTS (SELECT 1
                   FROM   follows
                   WHERE  follows.follower_id = $1
                          AND follows.following_id = users.id) AS is_subscribed
    FROM   users
"#;

// ----------------- Validation -----------------

pub fn validate_username(username: &str) -> Result<(), RequestError> {
    if username == RESERVED_USERNAME {
        return Err(RequestError::validation(format!(
            "Username \"{}\" is reserved",
            RESERVED_USERNAME
        )));
    }
    if username.is_empty() || username.chars().count() > USERNAME_MAX_LENGTH {
        return Err(RequestError::validation(format!(
            "Username must be between 1 and {} characters",
            USERNAME_MAX_LENGTH
        )));
    }
    if !USERNAME_PATTERN.is_match(username) {
        return Err(RequestError::validation(
            "Username may contain only letters, digits and @/./+/-/_",
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), RequestError> {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        return Err(RequestError::validation(format!(
            "Password must be at least {} characters",
            PASSWORD_MIN_LENGTH
        )));
    }
    Ok(())
}

pub fn validate_registration(request: &RegisterRequest) -> Result<(), RequestError> {
    validate_username(&request.username)?;
    let email = request.email.trim();
    if email.is_empty()
        || email.chars().count() > EMAIL_MAX_LENGTH
        || !email.contains('@')
        || email.starts_with('@')
        || email.ends_with('@')
    {
        return Err(RequestError::validation("Enter a valid email address"));
    }
    for (field, value) in [
        ("first_name", &request.first_name),
        ("last_name", &request.last_name),
    ] {
        if value.trim().is_empty() || value.chars().count() > NAME_MAX_LENGTH {
            return Err(RequestError::validation(format!(
                "{} must be between 1 and {} characters",
                field, NAME_MAX_LENGTH
            )));
        }
    }
    validate_password(&request.password)
}

// ----------------- User Queries -----------------

pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, RequestError> {
    let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
    let result = sqlx::query_as::<Sqlite, User>(&query)
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(result)
}

pub async fn get_user_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, RequestError> {
    let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
    let result = sqlx::query_as::<Sqlite, User>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(result)
}

/// Inserts a user; `user.password` must already be hashed.
pub async fn insert_user(pool: &SqlitePool, user: &RegisterRequest) -> Result<User, RequestError> {
    let mut tx = pool.begin().await?;
    let query = format!(
        r#"
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {}
        "#,
        USER_COLUMNS
    );
    let result = sqlx::query_as::<Sqlite, User>(&query)
        .bind(user.email.trim())
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password)
        .fetch_one(&mut tx)
        .await
        .map_err(RequestError::from)
        .map_err(|e| match e.constraint_violation() {
            Some(ConstraintViolation::Unique) => {
                RequestError::validation("A user with that email or username already exists")
            }
            Some(ConstraintViolation::Check) => RequestError::validation(format!(
                "Username \"{}\" is reserved",
                RESERVED_USERNAME
            )),
            None => e,
        })?;
    tx.commit().await?;
    tracing::info!("Registered user {} ({})", result.username, result.id);
    Ok(result)
}

pub async fn set_password_in_db(
    pool: &SqlitePool,
    id: i64,
    password_hash: &str,
) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password_hash)
        .bind(id)
        .execute(&mut tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RequestError::NotFound("User not found"));
    }
    tx.commit().await?;
    Ok(())
}

// ----------------- Profile Queries -----------------

pub(crate) async fn load_profile(
    conn: &mut SqliteConnection,
    viewer: Option<i64>,
    id: i64,
) -> Result<Option<Profile>, RequestError> {
    let query = format!("{} WHERE users.id = $2", PROFILE_QUERY);
    let result = sqlx::query_as::<Sqlite, Profile>(&query)
        .bind(viewer)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(result)
}

/// A user as seen by `viewer`.
pub async fn get_profile_in_db(
    pool: &SqlitePool,
    viewer: Option<i64>,
    id: i64,
) -> Result<Profile, RequestError> {
    let mut conn = pool.acquire().await?;
    load_profile(&mut conn, viewer, id)
        .await?
        .ok_or(RequestError::NotFound("User not found"))
}

pub async fn list_profiles_in_db(
    pool: &SqlitePool,
    viewer: Option<i64>,
    pagination: Pagination,
) -> Result<(Vec<Profile>, i64), RequestError> {
    let mut conn = pool.acquire().await?;
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(&mut *conn)
        .await?;
    let query = format!("{} ORDER BY users.id LIMIT $2 OFFSET $3", PROFILE_QUERY);
    let profiles = sqlx::query_as::<Sqlite, Profile>(&query)
        .bind(viewer)
        .bind(i64::from(pagination.limit))
        .bind(pagination.offset())
        .fetch_all(&mut *conn)
        .await?;
    Ok((profiles, count))
}
