use sqlx::{Sqlite, SqlitePool};

use crate::errors::RequestError;
use crate::models::RecipeShort;
use crate::shopping_list::{aggregate, render, CartIngredientRow};

use super::{conflict_on_constraint, recipe_exists};

/// Per-user recipe collections keyed by `(user, recipe)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeList {
    Favorites,
    ShoppingCart,
}

impl RecipeList {
    fn table(self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites",
            RecipeList::ShoppingCart => "shopping_cart",
        }
    }

    fn duplicate_message(self) -> &'static str {
        match self {
            RecipeList::Favorites => "Recipe is already in favorites",
            RecipeList::ShoppingCart => "Recipe is already in the shopping cart",
        }
    }

    fn missing_message(self) -> &'static str {
        match self {
            RecipeList::Favorites => "Recipe is not in favorites",
            RecipeList::ShoppingCart => "Recipe is not in the shopping cart",
        }
    }
}

/// The insert runs first, so SQLite takes the write lock before anything is read
/// and a concurrent duplicate fails on the unique constraint.
pub async fn add_recipe_to_list_in_db(
    pool: &SqlitePool,
    user_id: i64,
    recipe_id: i64,
    list: RecipeList,
) -> Result<RecipeShort, RequestError> {
    let mut tx = pool.begin().await?;
    let inserted = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) SELECT $1, id FROM recipes WHERE id = $2",
        list.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(&mut tx)
    .await
    .map_err(|e| conflict_on_constraint(e.into(), list.duplicate_message()))?;
    if inserted.rows_affected() == 0 {
        return Err(RequestError::NotFound("Recipe not found"));
    }

    let recipe = sqlx::query_as::<Sqlite, RecipeShort>(
        "SELECT id, name, image, cooking_time FROM recipes WHERE id = $1",
    )
    .bind(recipe_id)
    .fetch_one(&mut tx)
    .await?;

    tx.commit().await?;
    tracing::info!("User {} added recipe {} to {}", user_id, recipe_id, list.table());
    Ok(recipe)
}

pub async fn remove_recipe_from_list_in_db(
    pool: &SqlitePool,
    user_id: i64,
    recipe_id: i64,
    list: RecipeList,
) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        list.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(&mut tx)
    .await?;
    if result.rows_affected() == 0 {
        if !recipe_exists(&mut tx, recipe_id).await? {
            return Err(RequestError::NotFound("Recipe not found"));
        }
        return Err(RequestError::NotFound(list.missing_message()));
    }

    tx.commit().await?;
    tracing::info!(
        "User {} removed recipe {} from {}",
        user_id,
        recipe_id,
        list.table()
    );
    Ok(())
}

/// Ingredient lines of every recipe in the cart, in cart order then recipe order.
pub async fn get_cart_ingredients_in_db(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<CartIngredientRow>, RequestError> {
    let rows = sqlx::query_as::<Sqlite, CartIngredientRow>(
        r#"
        SELECT ingredients.name,
               recipe_ingredients.amount,
               ingredients.measurement_unit
        FROM   shopping_cart
               JOIN recipe_ingredients
                 ON recipe_ingredients.recipe_id = shopping_cart.recipe_id
               JOIN ingredients
                 ON ingredients.id = recipe_ingredients.ingredient_id
        WHERE  shopping_cart.user_id = $1
        ORDER  BY shopping_cart.id, recipe_ingredients.id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// The rendered shopping list for the user's cart.
pub async fn generate_shopping_list_in_db(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<String, RequestError> {
    let rows = get_cart_ingredients_in_db(pool, user_id).await?;
    let items = aggregate(rows);
    tracing::debug!("Shopping list for user {} has {} items", user_id, items.len());
    Ok(render(&items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_helpers::test_support::{file_pool, ingredient, recipe, tag, test_pool, user};

    #[tokio::test]
    async fn favorite_twice_is_a_conflict() {
        let pool = test_pool().await;
        let ann = user(&pool, "ann").await;
        let lunch = tag(&pool, "Lunch").await;
        let salt = ingredient(&pool, "Salt", "g").await;
        let soup = recipe(&pool, ann.id, "Soup", &[lunch.id], &[(salt.id, 1)]).await;

        let short = add_recipe_to_list_in_db(&pool, ann.id, soup, RecipeList::Favorites)
            .await
            .unwrap();
        assert_eq!(short.name, "Soup");

        assert!(matches!(
            add_recipe_to_list_in_db(&pool, ann.id, soup, RecipeList::Favorites).await,
            Err(RequestError::Conflict(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicates_yield_one_entry_and_conflicts() {
        let (_dir, pool) = file_pool().await;
        let ann = user(&pool, "ann").await;
        let lunch = tag(&pool, "Lunch").await;
        let salt = ingredient(&pool, "Salt", "g").await;
        let soup = recipe(&pool, ann.id, "Soup", &[lunch.id], &[(salt.id, 1)]).await;
        let user_id = ann.id;

        for list in [RecipeList::Favorites, RecipeList::ShoppingCart] {
            let attempts: Vec<_> = (0..8)
                .map(|_| {
                    let pool = pool.clone();
                    tokio::spawn(async move {
                        add_recipe_to_list_in_db(&pool, user_id, soup, list).await
                    })
                })
                .collect();

            let mut added = 0;
            for attempt in attempts {
                match attempt.await.unwrap() {
                    Ok(_) => added += 1,
                    Err(RequestError::Conflict(message)) => {
                        assert_eq!(message, list.duplicate_message())
                    }
                    Err(other) => panic!("unexpected error: {:?}", other),
                }
            }
            assert_eq!(added, 1, "{:?}", list);
        }
    }

    #[tokio::test]
    async fn removing_missing_entry_is_not_found() {
        let pool = test_pool().await;
        let ann = user(&pool, "ann").await;
        let lunch = tag(&pool, "Lunch").await;
        let salt = ingredient(&pool, "Salt", "g").await;
        let soup = recipe(&pool, ann.id, "Soup", &[lunch.id], &[(salt.id, 1)]).await;

        assert!(matches!(
            remove_recipe_from_list_in_db(&pool, ann.id, soup, RecipeList::Favorites).await,
            Err(RequestError::NotFound("Recipe is not in favorites"))
        ));
        assert!(matches!(
            remove_recipe_from_list_in_db(&pool, ann.id, 999, RecipeList::ShoppingCart).await,
            Err(RequestError::NotFound("Recipe not found"))
        ));
    }

    #[tokio::test]
    async fn favorites_and_cart_are_independent() {
        let pool = test_pool().await;
        let ann = user(&pool, "ann").await;
        let lunch = tag(&pool, "Lunch").await;
        let salt = ingredient(&pool, "Salt", "g").await;
        let soup = recipe(&pool, ann.id, "Soup", &[lunch.id], &[(salt.id, 1)]).await;

        add_recipe_to_list_in_db(&pool, ann.id, soup, RecipeList::Favorites)
            .await
            .unwrap();
        add_recipe_to_list_in_db(&pool, ann.id, soup, RecipeList::ShoppingCart)
            .await
            .unwrap();
        remove_recipe_from_list_in_db(&pool, ann.id, soup, RecipeList::ShoppingCart)
            .await
            .unwrap();
        assert!(matches!(
            add_recipe_to_list_in_db(&pool, ann.id, soup, RecipeList::Favorites).await,
            Err(RequestError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn adding_missing_recipe_is_not_found() {
        let pool = test_pool().await;
        let ann = user(&pool, "ann").await;
        assert!(matches!(
            add_recipe_to_list_in_db(&pool, ann.id, 42, RecipeList::ShoppingCart).await,
            Err(RequestError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn empty_cart_renders_header_only() {
        let pool = test_pool().await;
        let ann = user(&pool, "ann").await;
        assert_eq!(
            generate_shopping_list_in_db(&pool, ann.id).await.unwrap(),
            "Shopping list"
        );
    }

    #[tokio::test]
    async fn cart_ingredients_are_summed_in_first_seen_order() {
        let pool = test_pool().await;
        let ann = user(&pool, "ann").await;
        let bob = user(&pool, "bob").await;
        let baking = tag(&pool, "Baking").await;
        let flour = ingredient(&pool, "Flour", "g").await;
        let sugar = ingredient(&pool, "Sugar", "g").await;
        let egg = ingredient(&pool, "Egg", "pcs").await;
        let first = recipe(
            &pool,
            bob.id,
            "Cake",
            &[baking.id],
            &[(flour.id, 200), (sugar.id, 50)],
        )
        .await;
        let second = recipe(
            &pool,
            bob.id,
            "Bread",
            &[baking.id],
            &[(flour.id, 100), (egg.id, 2)],
        )
        .await;
        add_recipe_to_list_in_db(&pool, ann.id, first, RecipeList::ShoppingCart)
            .await
            .unwrap();
        add_recipe_to_list_in_db(&pool, ann.id, second, RecipeList::ShoppingCart)
            .await
            .unwrap();

        let list = generate_shopping_list_in_db(&pool, ann.id).await.unwrap();
        assert_eq!(
            list,
            "Shopping list\n1. Flour – 300 g\n2. Sugar – 50 g\n3. Egg – 2 pcs"
        );
        // Stable across calls.
        assert_eq!(generate_shopping_list_in_db(&pool, ann.id).await.unwrap(), list);

        // Other users' carts are not included.
        assert_eq!(
            generate_shopping_list_in_db(&pool, bob.id).await.unwrap(),
            "Shopping list"
        );
    }
}
