use serde::{Deserialize, Serialize};

use crate::media::image_url;
use crate::models::{Ingredient, Profile, RecipeDetail, RecipeIngredient, RecipeShort, Tag, User};

#[derive(Deserialize, Serialize, Debug)]
pub struct TokenResponse {
    pub auth_token: String,
}

/// Returned by registration; carries no viewer-dependent fields.
#[derive(Deserialize, Serialize, Debug)]
pub struct CreatedUserResponse {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct UserResponse {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TagResponse {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct IngredientResponse {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RecipeIngredientResponse {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct RecipeResponse {
    pub id: i64,
    pub tags: Vec<TagResponse>,
    pub author: UserResponse,
    pub ingredients: Vec<RecipeIngredientResponse>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RecipeShortResponse {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub cooking_time: i64,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct SubscriptionResponse {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub recipes: Vec<RecipeShortResponse>,
    pub recipes_count: i64,
}

impl CreatedUserResponse {
    pub fn new(
        User {
            email,
            id,
            username,
            first_name,
            last_name,
            ..
        }: User,
    ) -> Self {
        CreatedUserResponse {
            email,
            id,
            username,
            first_name,
            last_name,
        }
    }
}

impl From<Profile> for UserResponse {
    fn from(
        Profile {
            id,
            email,
            username,
            first_name,
            last_name,
            is_subscribed,
        }: Profile,
    ) -> Self {
        UserResponse {
            email,
            id,
            username,
            first_name,
            last_name,
            is_subscribed,
        }
    }
}

impl From<Tag> for TagResponse {
    fn from(Tag { id, name, color, slug }: Tag) -> Self {
        TagResponse {
            id,
            name,
            color,
            slug,
        }
    }
}

impl From<Ingredient> for IngredientResponse {
    fn from(
        Ingredient {
            id,
            name,
            measurement_unit,
        }: Ingredient,
    ) -> Self {
        IngredientResponse {
            id,
            name,
            measurement_unit,
        }
    }
}

impl From<RecipeIngredient> for RecipeIngredientResponse {
    fn from(
        RecipeIngredient {
            id,
            name,
            measurement_unit,
            amount,
        }: RecipeIngredient,
    ) -> Self {
        RecipeIngredientResponse {
            id,
            name,
            measurement_unit,
            amount,
        }
    }
}

impl RecipeResponse {
    pub fn new(
        RecipeDetail {
            recipe,
            author,
            tags,
            ingredients,
        }: RecipeDetail,
        media_url: &str,
    ) -> Self {
        RecipeResponse {
            id: recipe.id,
            tags: tags.into_iter().map(TagResponse::from).collect(),
            author: author.into(),
            ingredients: ingredients
                .into_iter()
                .map(RecipeIngredientResponse::from)
                .collect(),
            is_favorited: recipe.is_favorited,
            is_in_shopping_cart: recipe.is_in_shopping_cart,
            name: recipe.name,
            image: image_url(media_url, &recipe.image),
            text: recipe.text,
            cooking_time: recipe.cooking_time,
        }
    }
}

impl RecipeShortResponse {
    pub fn new(
        RecipeShort {
            id,
            name,
            image,
            cooking_time,
        }: RecipeShort,
        media_url: &str,
    ) -> Self {
        RecipeShortResponse {
            id,
            name,
            image: image_url(media_url, &image),
            cooking_time,
        }
    }
}

impl SubscriptionResponse {
    pub fn new(
        profile: Profile,
        recipes: Vec<RecipeShort>,
        recipes_count: i64,
        media_url: &str,
    ) -> Self {
        SubscriptionResponse {
            email: profile.email,
            id: profile.id,
            username: profile.username,
            first_name: profile.first_name,
            last_name: profile.last_name,
            is_subscribed: profile.is_subscribed,
            recipes: recipes
                .into_iter()
                .map(|recipe| RecipeShortResponse::new(recipe, media_url))
                .collect(),
            recipes_count,
        }
    }
}
