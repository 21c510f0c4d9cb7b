use chrono::NaiveDateTime;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub created_at: NaiveDateTime,
}

/// A user as seen by a particular requester.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Profile {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Recipe {
    pub id: i64,
    pub author_id: i64,
    pub name: String,
    pub text: String,
    pub cooking_time: i64,
    pub image: String,
    pub created_at: NaiveDateTime,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

/// An ingredient line of a recipe, joined with its ingredient.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RecipeIngredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RecipeShort {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub cooking_time: i64,
}

/// A recipe with everything needed to render it.
#[derive(Debug, Clone)]
pub struct RecipeDetail {
    pub recipe: Recipe,
    pub author: Profile,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<RecipeIngredient>,
}
