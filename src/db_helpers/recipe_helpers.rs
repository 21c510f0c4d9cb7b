use std::collections::HashSet;

use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::data_formats::{IngredientAmount, RecipeQueryParams, RecipeRequest};
use crate::errors::RequestError;
use crate::media::{decode_data_url, DecodedImage};
use crate::models::{Recipe, RecipeDetail, RecipeIngredient, Tag};

use super::{bind_query_as, bind_query_scalar, load_profile, Bind, QueryBuilder};

const RECIPE_NAME_MAX_LENGTH: usize = 200;
/// Upper bound for ingredient amounts and cooking time, as stored.
pub const POSITIVE_INTEGER_MAX: i64 = 2_147_483_647;

const RECIPE_QUERY: &str = r#"
    SELECT recipes.id,
           recipes.author_id,
           recipes.name,
           recipes.text,
           recipes.cooking_time,
           recipes.image,
           recipes.created_at,
           EXISTS (SELECT 1
                   FROM   favorites
                   WHERE  favorites.recipe_id = recipes.id
                          AND favorites.user_id = ?) AS is_favorited,
           EXISTS (SELECT 1
                   FROM   shopping_cart
                   WHERE  shopping_cart.recipe_id = recipes.id
                          AND shopping_cart.user_id = ?) AS is_in_shopping_cart
    FROM   recipes
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeWrite {
    Create,
    Update,
}

/// A recipe payload that passed validation. Optional fields are only absent on update.
#[derive(Debug)]
pub struct RecipeFields {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i64>,
    pub image: Option<DecodedImage>,
    pub tags: Vec<i64>,
    pub ingredients: Vec<IngredientAmount>,
}

// ----------------- Validation -----------------

pub fn validate_ingredients(ingredients: &[IngredientAmount]) -> Result<(), RequestError> {
    if ingredients.is_empty() {
        return Err(RequestError::validation("At least one ingredient is required"));
    }
    let mut seen = HashSet::with_capacity(ingredients.len());
    for ingredient in ingredients {
        if !seen.insert(ingredient.id) {
            return Err(RequestError::validation(format!(
                "Duplicate ingredient: {}",
                ingredient.id
            )));
        }
        if !(1..=POSITIVE_INTEGER_MAX).contains(&ingredient.amount) {
            return Err(RequestError::validation(format!(
                "Ingredient amount must be between 1 and {}",
                POSITIVE_INTEGER_MAX
            )));
        }
    }
    Ok(())
}

pub fn validate_tags(tags: &[i64]) -> Result<(), RequestError> {
    if tags.is_empty() {
        return Err(RequestError::validation("At least one tag is required"));
    }
    let mut seen = HashSet::with_capacity(tags.len());
    for tag in tags {
        if !seen.insert(*tag) {
            return Err(RequestError::validation(format!("Duplicate tag: {}", tag)));
        }
    }
    Ok(())
}

/// Checks a create/update payload without touching storage.
pub fn validate_recipe_request(
    RecipeRequest {
        ingredients,
        tags,
        image,
        name,
        text,
        cooking_time,
    }: RecipeRequest,
    write: RecipeWrite,
) -> Result<RecipeFields, RequestError> {
    let required = |field: &str| RequestError::validation(format!("{} is required", field));
    if write == RecipeWrite::Create {
        if name.is_none() {
            return Err(required("name"));
        }
        if text.is_none() {
            return Err(required("text"));
        }
        if cooking_time.is_none() {
            return Err(required("cooking_time"));
        }
        if image.is_none() {
            return Err(required("image"));
        }
    }

    validate_ingredients(&ingredients)?;
    validate_tags(&tags)?;

    if let Some(cooking_time) = cooking_time {
        if !(1..=POSITIVE_INTEGER_MAX).contains(&cooking_time) {
            return Err(RequestError::validation(format!(
                "Cooking time must be between 1 and {} minutes",
                POSITIVE_INTEGER_MAX
            )));
        }
    }
    let name = match name.map(|name| name.trim().to_owned()) {
        Some(name) if name.is_empty() || name.chars().count() > RECIPE_NAME_MAX_LENGTH => {
            return Err(RequestError::validation(format!(
                "name must be between 1 and {} characters",
                RECIPE_NAME_MAX_LENGTH
            )))
        }
        name => name,
    };
    if matches!(&text, Some(text) if text.trim().is_empty()) {
        return Err(RequestError::validation("text must not be empty"));
    }
    let image = image.as_deref().map(decode_data_url).transpose()?;

    Ok(RecipeFields {
        name,
        text,
        cooking_time,
        image,
        tags,
        ingredients,
    })
}

/// Every referenced tag and ingredient must exist.
pub(crate) async fn check_recipe_references(
    conn: &mut SqliteConnection,
    fields: &RecipeFields,
) -> Result<(), RequestError> {
    for tag_id in &fields.tags {
        let found = sqlx::query_scalar::<_, i64>("SELECT id FROM tags WHERE id = $1")
            .bind(*tag_id)
            .fetch_optional(&mut *conn)
            .await?;
        if found.is_none() {
            return Err(RequestError::validation(format!(
                "Tag {} does not exist",
                tag_id
            )));
        }
    }
    for ingredient in &fields.ingredients {
        let found = sqlx::query_scalar::<_, i64>("SELECT id FROM ingredients WHERE id = $1")
            .bind(ingredient.id)
            .fetch_optional(&mut *conn)
            .await?;
        if found.is_none() {
            return Err(RequestError::validation(format!(
                "Ingredient {} does not exist",
                ingredient.id
            )));
        }
    }
    Ok(())
}

pub async fn check_recipe_references_in_db(
    pool: &SqlitePool,
    fields: &RecipeFields,
) -> Result<(), RequestError> {
    let mut conn = pool.acquire().await?;
    check_recipe_references(&mut conn, fields).await
}

// ----------------- Loading -----------------

async fn load_recipe(
    conn: &mut SqliteConnection,
    viewer: Option<i64>,
    recipe_id: i64,
) -> Result<Option<Recipe>, RequestError> {
    let query = format!("{} WHERE recipes.id = ?", RECIPE_QUERY);
    let recipe = sqlx::query_as::<Sqlite, Recipe>(&query)
        .bind(viewer)
        .bind(viewer)
        .bind(recipe_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(recipe)
}

async fn load_tags(conn: &mut SqliteConnection, recipe_id: i64) -> Result<Vec<Tag>, RequestError> {
    let tags = sqlx::query_as::<Sqlite, Tag>(
        r#"
        SELECT tags.id, tags.name, tags.color, tags.slug
        FROM   tags
               JOIN recipe_tags
                 ON recipe_tags.tag_id = tags.id
        WHERE  recipe_tags.recipe_id = $1
        ORDER  BY tags.name
        "#,
    )
    .bind(recipe_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(tags)
}

async fn load_ingredients(
    conn: &mut SqliteConnection,
    recipe_id: i64,
) -> Result<Vec<RecipeIngredient>, RequestError> {
    let ingredients = sqlx::query_as::<Sqlite, RecipeIngredient>(
        r#"
        SELECT ingredients.id,
               ingredients.name,
               ingredients.measurement_unit,
               recipe_ingredients.amount
        FROM   recipe_ingredients
               JOIN ingredients
                 ON ingredients.id = recipe_ingredients.ingredient_id
        WHERE  recipe_ingredients.recipe_id = $1
        ORDER  BY recipe_ingredients.id
        "#,
    )
    .bind(recipe_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(ingredients)
}

async fn load_detail(
    conn: &mut SqliteConnection,
    viewer: Option<i64>,
    recipe: Recipe,
) -> Result<RecipeDetail, RequestError> {
    let author = load_profile(&mut *conn, viewer, recipe.author_id)
        .await?
        .ok_or(RequestError::NotFound("User not found"))?;
    let tags = load_tags(&mut *conn, recipe.id).await?;
    let ingredients = load_ingredients(&mut *conn, recipe.id).await?;
    Ok(RecipeDetail {
        recipe,
        author,
        tags,
        ingredients,
    })
}

pub(crate) async fn load_recipe_detail(
    conn: &mut SqliteConnection,
    viewer: Option<i64>,
    recipe_id: i64,
) -> Result<RecipeDetail, RequestError> {
    let recipe = load_recipe(&mut *conn, viewer, recipe_id)
        .await?
        .ok_or(RequestError::NotFound("Recipe not found"))?;
    load_detail(conn, viewer, recipe).await
}

pub async fn get_recipe_in_db(
    pool: &SqlitePool,
    viewer: Option<i64>,
    recipe_id: i64,
) -> Result<RecipeDetail, RequestError> {
    let mut conn = pool.acquire().await?;
    load_recipe_detail(&mut conn, viewer, recipe_id).await
}

/// Newest first. The favorite and cart filters only apply to a known viewer.
pub async fn list_recipes_in_db(
    pool: &SqlitePool,
    viewer: Option<i64>,
    RecipeQueryParams {
        tags,
        author,
        is_favorited,
        is_in_shopping_cart,
        pagination,
    }: RecipeQueryParams,
) -> Result<(Vec<RecipeDetail>, i64), RequestError> {
    let favorited_by = viewer.filter(|_| is_favorited);
    let in_cart_of = viewer.filter(|_| is_in_shopping_cart);

    let (conditions, params) = QueryBuilder::new()
        .add_param("recipes.author_id = ?", author.map(Bind::Int))
        .add_params(
            r#"EXISTS (SELECT 1
                       FROM   recipe_tags
                              JOIN tags
                                ON tags.id = recipe_tags.tag_id
                       WHERE  recipe_tags.recipe_id = recipes.id
                              AND tags.slug IN ({}))"#,
            tags.into_iter().map(Bind::Text).collect(),
        )
        .add_param(
            "EXISTS (SELECT 1 FROM favorites WHERE favorites.recipe_id = recipes.id AND favorites.user_id = ?)",
            favorited_by.map(Bind::Int),
        )
        .add_param(
            "EXISTS (SELECT 1 FROM shopping_cart WHERE shopping_cart.recipe_id = recipes.id AND shopping_cart.user_id = ?)",
            in_cart_of.map(Bind::Int),
        )
        .build();

    let mut conn = pool.acquire().await?;

    let count_query = format!("SELECT COUNT(*) FROM recipes WHERE {}", conditions);
    let count = bind_query_scalar(sqlx::query_scalar::<Sqlite, i64>(&count_query), &params)
        .fetch_one(&mut *conn)
        .await?;

    let list_query = format!(
        "{} WHERE {} ORDER BY recipes.created_at DESC, recipes.id DESC LIMIT ? OFFSET ?",
        RECIPE_QUERY, conditions
    );
    let recipes = bind_query_as(
        sqlx::query_as::<Sqlite, Recipe>(&list_query)
            .bind(viewer)
            .bind(viewer),
        &params,
    )
    .bind(i64::from(pagination.limit))
    .bind(pagination.offset())
    .fetch_all(&mut *conn)
    .await?;

    let mut details = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        details.push(load_detail(&mut conn, viewer, recipe).await?);
    }
    Ok((details, count))
}

// ----------------- Writing -----------------

async fn insert_associations(
    conn: &mut SqliteConnection,
    recipe_id: i64,
    tags: &[i64],
    ingredients: &[IngredientAmount],
) -> Result<(), RequestError> {
    for tag_id in tags {
        sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) VALUES ($1, $2)")
            .bind(recipe_id)
            .bind(*tag_id)
            .execute(&mut *conn)
            .await?;
    }
    for ingredient in ingredients {
        sqlx::query(
            "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) VALUES ($1, $2, $3)",
        )
        .bind(recipe_id)
        .bind(ingredient.id)
        .bind(ingredient.amount)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// `image` is the stored path of the already saved image.
///
/// Every write transaction here opens with a write statement, so SQLite hands out
/// the write lock first and concurrent writers queue on the busy timeout.
pub async fn create_recipe_in_db(
    pool: &SqlitePool,
    author_id: i64,
    fields: RecipeFields,
    image: String,
) -> Result<RecipeDetail, RequestError> {
    let (Some(name), Some(text), Some(cooking_time)) =
        (fields.name.as_ref(), fields.text.as_ref(), fields.cooking_time)
    else {
        return Err(RequestError::validation(
            "name, text and cooking_time are required",
        ));
    };

    let mut tx = pool.begin().await?;
    let recipe_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO recipes (author_id, name, text, cooking_time, image)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(author_id)
    .bind(name)
    .bind(text)
    .bind(cooking_time)
    .bind(&image)
    .fetch_one(&mut tx)
    .await?;

    check_recipe_references(&mut tx, &fields).await?;
    insert_associations(&mut tx, recipe_id, &fields.tags, &fields.ingredients).await?;
    let detail = load_recipe_detail(&mut tx, Some(author_id), recipe_id).await?;
    tx.commit().await?;
    tracing::info!("User {} created recipe {}", author_id, recipe_id);
    Ok(detail)
}

/// Fails with `NotFound` for a missing recipe and `Forbidden` when `user_id` is not its author.
pub(crate) async fn ensure_recipe_author(
    conn: &mut SqliteConnection,
    user_id: i64,
    recipe_id: i64,
) -> Result<(), RequestError> {
    let author_id = sqlx::query_scalar::<_, i64>("SELECT author_id FROM recipes WHERE id = $1")
        .bind(recipe_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(RequestError::NotFound("Recipe not found"))?;
    if author_id != user_id {
        return Err(RequestError::Forbidden);
    }
    Ok(())
}

pub async fn ensure_recipe_author_in_db(
    pool: &SqlitePool,
    user_id: i64,
    recipe_id: i64,
) -> Result<(), RequestError> {
    let mut conn = pool.acquire().await?;
    ensure_recipe_author(&mut conn, user_id, recipe_id).await
}

/// Explains why a write scoped to `author_id` touched no row.
async fn author_write_failure(
    conn: &mut SqliteConnection,
    user_id: i64,
    recipe_id: i64,
) -> RequestError {
    match ensure_recipe_author(conn, user_id, recipe_id).await {
        Err(error) => error,
        Ok(()) => RequestError::NotFound("Recipe not found"),
    }
}

#[derive(Debug)]
pub struct RecipeUpdate {
    pub detail: RecipeDetail,
    /// Stored path of the image the update replaced, if any.
    pub replaced_image: Option<String>,
}

/// Applies the given fields and replaces the tag and ingredient sets wholesale.
pub async fn update_recipe_in_db(
    pool: &SqlitePool,
    user_id: i64,
    recipe_id: i64,
    fields: RecipeFields,
    image: Option<String>,
) -> Result<RecipeUpdate, RequestError> {
    let mut tx = pool.begin().await?;
    let updated = sqlx::query(
        r#"
        UPDATE recipes
        SET    name = COALESCE($1, name),
               text = COALESCE($2, text),
               cooking_time = COALESCE($3, cooking_time)
        WHERE  id = $4
               AND author_id = $5
        "#,
    )
    .bind(fields.name.as_deref())
    .bind(fields.text.as_deref())
    .bind(fields.cooking_time)
    .bind(recipe_id)
    .bind(user_id)
    .execute(&mut tx)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(author_write_failure(&mut tx, user_id, recipe_id).await);
    }

    check_recipe_references(&mut tx, &fields).await?;

    let replaced_image = match image.as_deref() {
        Some(image) => {
            let previous =
                sqlx::query_scalar::<_, String>("SELECT image FROM recipes WHERE id = $1")
                    .bind(recipe_id)
                    .fetch_one(&mut tx)
                    .await?;
            sqlx::query("UPDATE recipes SET image = $1 WHERE id = $2")
                .bind(image)
                .bind(recipe_id)
                .execute(&mut tx)
                .await?;
            Some(previous).filter(|previous| previous != image)
        }
        None => None,
    };

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut tx)
        .await?;
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut tx)
        .await?;
    insert_associations(&mut tx, recipe_id, &fields.tags, &fields.ingredients).await?;

    let detail = load_recipe_detail(&mut tx, Some(user_id), recipe_id).await?;
    tx.commit().await?;
    tracing::info!("User {} updated recipe {}", user_id, recipe_id);
    Ok(RecipeUpdate {
        detail,
        replaced_image,
    })
}

/// Deleting a recipe cascades to its ingredient lines, tags, favorites and cart entries.
/// Returns the stored path of the recipe image.
pub async fn delete_recipe_in_db(
    pool: &SqlitePool,
    user_id: i64,
    recipe_id: i64,
) -> Result<String, RequestError> {
    let mut tx = pool.begin().await?;
    let image = sqlx::query_scalar::<_, String>(
        "DELETE FROM recipes WHERE id = $1 AND author_id = $2 RETURNING image",
    )
    .bind(recipe_id)
    .bind(user_id)
    .fetch_optional(&mut tx)
    .await?;
    let Some(image) = image else {
        return Err(author_write_failure(&mut tx, user_id, recipe_id).await);
    };
    tx.commit().await?;
    tracing::info!("User {} deleted recipe {}", user_id, recipe_id);
    Ok(image)
}
