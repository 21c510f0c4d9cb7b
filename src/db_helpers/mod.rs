use sqlx::query::{QueryAs, QueryScalar};
use sqlx::sqlite::SqliteArguments;
use sqlx::{Sqlite, SqliteConnection};

use crate::errors::{ConstraintViolation, RequestError};

mod ingredient_helpers;
mod profile_helpers;
mod recipe_helpers;
mod relation_helpers;
mod tag_helpers;
mod user_helpers;

pub use ingredient_helpers::*;
pub use profile_helpers::*;
pub use recipe_helpers::*;
pub use relation_helpers::*;
pub use tag_helpers::*;
pub use user_helpers::*;

#[derive(Debug, Clone)]
enum Bind {
    Int(i64),
    Text(String),
}

/// Collects optional `WHERE` conditions together with their `?` parameters.
struct QueryBuilder {
    conditions: Vec<String>,
    params: Vec<Bind>,
}

impl QueryBuilder {
    fn new() -> Self {
        Self {
            conditions: vec![],
            params: vec![],
        }
    }

    fn add_param(mut self, condition: &str, param: Option<Bind>) -> Self {
        if let Some(value) = param {
            self.conditions.push(condition.to_owned());
            self.params.push(value);
        }
        self
    }

    /// `template` holds a single `{}` that becomes `?, ?, ...`, one per value.
    fn add_params(mut self, template: &str, params: Vec<Bind>) -> Self {
        if !params.is_empty() {
            let placeholders = vec!["?"; params.len()].join(", ");
            self.conditions.push(template.replace("{}", &placeholders));
            self.params.extend(params);
        }
        self
    }

    pub fn build(self) -> (String, Vec<Bind>) {
        let query = if self.conditions.is_empty() {
            String::from("1 = 1")
        } else {
            self.conditions.join(" AND ")
        };
        (query, self.params)
    }
}

fn bind_query_as<'q, O>(
    mut query: QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    params: &[Bind],
) -> QueryAs<'q, Sqlite, O, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            Bind::Int(value) => query.bind(*value),
            Bind::Text(value) => query.bind(value.clone()),
        };
    }
    query
}

fn bind_query_scalar<'q, O>(
    mut query: QueryScalar<'q, Sqlite, O, SqliteArguments<'q>>,
    params: &[Bind],
) -> QueryScalar<'q, Sqlite, O, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            Bind::Int(value) => query.bind(*value),
            Bind::Text(value) => query.bind(value.clone()),
        };
    }
    query
}

// ----------------- Helper Functions -----------------

/// Turns a storage constraint violation into a conflict with `message`.
fn conflict_on_constraint(error: RequestError, message: &str) -> RequestError {
    match error.constraint_violation() {
        Some(ConstraintViolation::Unique) | Some(ConstraintViolation::Check) => {
            RequestError::conflict(message)
        }
        None => error,
    }
}

async fn recipe_exists(conn: &mut SqliteConnection, recipe_id: i64) -> Result<bool, RequestError> {
    let found = sqlx::query_scalar::<_, i64>("SELECT id FROM recipes WHERE id = $1")
        .bind(recipe_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

async fn user_exists(conn: &mut SqliteConnection, user_id: i64) -> Result<bool, RequestError> {
    let found = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

/// Escapes `%`, `_` and `\` for use inside a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicU32, Ordering};

    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    use crate::data_formats::{IngredientAmount, RegisterRequest};
    use crate::models::{Ingredient, Tag, User};

    use super::*;

    static NEXT_COLOR: AtomicU32 = AtomicU32::new(0xE26C2D);

    /// One connection, so every query sees the same in-memory database.
    pub async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory database");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    /// A pool over a database file, with the default number of connections.
    /// The directory must outlive the pool.
    pub async fn file_pool() -> (tempfile::TempDir, SqlitePool) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let url = format!("sqlite://{}/foodgram.db", dir.path().display());
        let pool = crate::init_db(&url).await.expect("Failed to open database file");
        (dir, pool)
    }

    pub async fn user(pool: &SqlitePool, username: &str) -> User {
        insert_user(
            pool,
            &RegisterRequest {
                email: format!("{}@example.com", username),
                username: username.to_owned(),
                first_name: "Test".to_owned(),
                last_name: "User".to_owned(),
                password: "not-a-real-hash".to_owned(),
            },
        )
        .await
        .expect("Failed to insert user")
    }

    /// Each fixture tag gets its own color, since colors are unique.
    pub async fn tag(pool: &SqlitePool, name: &str) -> Tag {
        let color = format!("#{:06X}", NEXT_COLOR.fetch_add(1, Ordering::Relaxed));
        create_tag_in_db(pool, name, &color, &name.to_lowercase())
            .await
            .expect("Failed to insert tag")
    }

    pub async fn ingredient(pool: &SqlitePool, name: &str, unit: &str) -> Ingredient {
        create_ingredient_in_db(pool, name, unit)
            .await
            .expect("Failed to insert ingredient")
    }

    pub fn amounts(items: &[(i64, i64)]) -> Vec<IngredientAmount> {
        items
            .iter()
            .map(|&(id, amount)| IngredientAmount { id, amount })
            .collect()
    }

    /// Inserts a recipe directly, bypassing image handling.
    pub async fn recipe(
        pool: &SqlitePool,
        author_id: i64,
        name: &str,
        tags: &[i64],
        ingredients: &[(i64, i64)],
    ) -> i64 {
        let fields = RecipeFields {
            name: Some(name.to_owned()),
            text: Some("Mix and bake.".to_owned()),
            cooking_time: Some(10),
            image: None,
            tags: tags.to_vec(),
            ingredients: amounts(ingredients),
        };
        create_recipe_in_db(pool, author_id, fields, "recipes/images/test.png".to_owned())
            .await
            .expect("Failed to insert recipe")
            .recipe
            .id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_joins_conditions_in_order() {
        let (query, params) = QueryBuilder::new()
            .add_param("recipes.author_id = ?", Some(Bind::Int(4)))
            .add_param("recipes.name = ?", None)
            .add_params(
                "tags.slug IN ({})",
                vec![Bind::Text("a".into()), Bind::Text("b".into())],
            )
            .build();

        assert_eq!(query, "recipes.author_id = ? AND tags.slug IN (?, ?)");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn empty_builder_matches_everything() {
        let (query, params) = QueryBuilder::new().add_params("x IN ({})", vec![]).build();
        assert_eq!(query, "1 = 1");
        assert!(params.is_empty());
    }

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
