use serde::{Deserialize, Serialize};

// ----------------- User Request -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct SetPasswordRequest {
    pub new_password: String,
    pub current_password: String,
}

// ----------------- Recipe Request -----------------
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientAmount {
    pub id: i64,
    pub amount: i64,
}

/// Body of recipe create (POST) and update (PATCH) requests.
///
/// Every field is optional at the serde level so that missing fields are
/// reported through recipe validation instead of a body rejection.
#[derive(Deserialize, Serialize, Debug, Default, Clone)]
#[serde(default)]
pub struct RecipeRequest {
    pub ingredients: Vec<IngredientAmount>,
    pub tags: Vec<i64>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i64>,
}
