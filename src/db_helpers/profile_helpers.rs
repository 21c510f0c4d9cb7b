use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::{
    data_formats::SubscriptionQueryParams,
    errors::RequestError,
    models::{Profile, RecipeShort},
};

use super::{conflict_on_constraint, load_profile, user_exists};

const ALREADY_SUBSCRIBED: &str = "You are already subscribed to this user";
const SELF_SUBSCRIPTION: &str = "You can not subscribe to yourself";

/// A followed author together with a preview of their recipes.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub profile: Profile,
    pub recipes: Vec<RecipeShort>,
    pub recipes_count: i64,
}

/// Follows `following_id` and returns it as a subscription entry.
pub async fn follow_user_in_db(
    pool: &SqlitePool,
    follower_id: i64,
    following_id: i64,
    recipes_limit: Option<u32>,
) -> Result<Subscription, RequestError> {
    if follower_id == following_id {
        return Err(RequestError::conflict(SELF_SUBSCRIPTION));
    }

    // Inserting before any read takes the write lock up front; a concurrent
    // duplicate then fails on the unique constraint.
    let mut tx = pool.begin().await?;
    let inserted = sqlx::query(
        "INSERT INTO follows (follower_id, following_id) SELECT $1, id FROM users WHERE id = $2",
    )
    .bind(follower_id)
    .bind(following_id)
    .execute(&mut tx)
    .await
    .map_err(|e| conflict_on_constraint(e.into(), ALREADY_SUBSCRIBED))?;
    if inserted.rows_affected() == 0 {
        return Err(RequestError::NotFound("User not found"));
    }

    let subscription =
        load_subscription(&mut tx, Some(follower_id), following_id, recipes_limit).await?;
    tx.commit().await?;
    tracing::info!("User {} followed user {}", follower_id, following_id);
    Ok(subscription)
}

pub async fn unfollow_user_in_db(
    pool: &SqlitePool,
    follower_id: i64,
    following_id: i64,
) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
        .bind(follower_id)
        .bind(following_id)
        .execute(&mut tx)
        .await?;
    if result.rows_affected() == 0 {
        if !user_exists(&mut tx, following_id).await? {
            return Err(RequestError::NotFound("User not found"));
        }
        return Err(RequestError::NotFound("You are not subscribed to this user"));
    }
    tx.commit().await?;
    tracing::info!("User {} unfollowed user {}", follower_id, following_id);
    Ok(())
}

/// Newest recipes of `author_id`, at most `limit` of them when given.
pub(crate) async fn load_author_recipes(
    conn: &mut SqliteConnection,
    author_id: i64,
    limit: Option<u32>,
) -> Result<Vec<RecipeShort>, RequestError> {
    let recipes = sqlx::query_as::<Sqlite, RecipeShort>(
        r#"
        SELECT id, name, image, cooking_time
        FROM   recipes
        WHERE  author_id = $1
        ORDER  BY created_at DESC, id DESC
        LIMIT  $2
        "#,
    )
    .bind(author_id)
    // SQLite treats a negative LIMIT as no limit.
    .bind(limit.map(i64::from).unwrap_or(-1))
    .fetch_all(&mut *conn)
    .await?;
    Ok(recipes)
}

pub(crate) async fn count_author_recipes(
    conn: &mut SqliteConnection,
    author_id: i64,
) -> Result<i64, RequestError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
        .bind(author_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

pub async fn load_subscription(
    conn: &mut SqliteConnection,
    viewer: Option<i64>,
    author_id: i64,
    recipes_limit: Option<u32>,
) -> Result<Subscription, RequestError> {
    let profile = load_profile(&mut *conn, viewer, author_id)
        .await?
        .ok_or(RequestError::NotFound("User not found"))?;
    let recipes = load_author_recipes(&mut *conn, author_id, recipes_limit).await?;
    let recipes_count = count_author_recipes(&mut *conn, author_id).await?;
    Ok(Subscription {
        profile,
        recipes,
        recipes_count,
    })
}

/// Authors followed by `user_id`, in the order they were followed.
pub async fn list_subscriptions_in_db(
    pool: &SqlitePool,
    user_id: i64,
    SubscriptionQueryParams {
        recipes_limit,
        pagination,
    }: SubscriptionQueryParams,
) -> Result<(Vec<Subscription>, i64), RequestError> {
    let mut conn = pool.acquire().await?;
    let count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM follows WHERE follower_id = $1")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;

    let author_ids = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT following_id
        FROM   follows
        WHERE  follower_id = $1
        ORDER  BY id
        LIMIT  $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(i64::from(pagination.limit))
    .bind(pagination.offset())
    .fetch_all(&mut *conn)
    .await?;

    let mut subscriptions = Vec::with_capacity(author_ids.len());
    for author_id in author_ids {
        let subscription =
            load_subscription(&mut conn, Some(user_id), author_id, recipes_limit).await?;
        subscriptions.push(subscription);
    }
    Ok((subscriptions, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_formats::Pagination;
    use crate::db_helpers::test_support::{file_pool, ingredient, recipe, tag, test_pool, user};

    #[tokio::test]
    async fn self_follow_always_fails() {
        let pool = test_pool().await;
        let ann = user(&pool, "ann").await;

        assert!(matches!(
            follow_user_in_db(&pool, ann.id, ann.id, None).await,
            Err(RequestError::Conflict(_))
        ));
        // Even for an id that has no user behind it.
        assert!(matches!(
            follow_user_in_db(&pool, 999, 999, None).await,
            Err(RequestError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn follow_twice_is_a_conflict() {
        let pool = test_pool().await;
        let ann = user(&pool, "ann").await;
        let bob = user(&pool, "bob").await;

        let subscription = follow_user_in_db(&pool, ann.id, bob.id, None).await.unwrap();
        assert!(subscription.profile.is_subscribed);
        assert_eq!(subscription.profile.username, "bob");
        assert_eq!(subscription.recipes_count, 0);

        assert!(matches!(
            follow_user_in_db(&pool, ann.id, bob.id, None).await,
            Err(RequestError::Conflict(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_follows_yield_one_subscription() {
        let (_dir, pool) = file_pool().await;
        let ann = user(&pool, "ann").await;
        let bob = user(&pool, "bob").await;
        let (follower, following) = (ann.id, bob.id);

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    follow_user_in_db(&pool, follower, following, None).await
                })
            })
            .collect();

        let mut followed = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(subscription) => {
                    followed += 1;
                    assert!(subscription.profile.is_subscribed);
                }
                Err(RequestError::Conflict(message)) => assert_eq!(message, ALREADY_SUBSCRIBED),
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }
        assert_eq!(followed, 1);

        let rows = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM follows")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn storage_rejects_duplicate_follow() {
        let pool = test_pool().await;
        let ann = user(&pool, "ann").await;
        let bob = user(&pool, "bob").await;
        follow_user_in_db(&pool, ann.id, bob.id, None).await.unwrap();

        let result = sqlx::query("INSERT INTO follows (follower_id, following_id) VALUES ($1, $2)")
            .bind(ann.id)
            .bind(bob.id)
            .execute(&pool)
            .await
            .map_err(RequestError::from);
        let mapped = conflict_on_constraint(result.unwrap_err(), ALREADY_SUBSCRIBED);
        assert!(matches!(mapped, RequestError::Conflict(_)));
    }

    #[tokio::test]
    async fn follow_missing_user_is_not_found() {
        let pool = test_pool().await;
        let ann = user(&pool, "ann").await;
        assert!(matches!(
            follow_user_in_db(&pool, ann.id, 404, None).await,
            Err(RequestError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unfollow_without_follow_is_not_found() {
        let pool = test_pool().await;
        let ann = user(&pool, "ann").await;
        let bob = user(&pool, "bob").await;

        assert!(matches!(
            unfollow_user_in_db(&pool, ann.id, bob.id).await,
            Err(RequestError::NotFound(_))
        ));

        follow_user_in_db(&pool, ann.id, bob.id, None).await.unwrap();
        unfollow_user_in_db(&pool, ann.id, bob.id).await.unwrap();
        assert!(matches!(
            unfollow_user_in_db(&pool, ann.id, bob.id).await,
            Err(RequestError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn subscriptions_limit_recipes_but_count_all() {
        let pool = test_pool().await;
        let ann = user(&pool, "ann").await;
        let bob = user(&pool, "bob").await;
        let lunch = tag(&pool, "Lunch").await;
        let salt = ingredient(&pool, "Salt", "g").await;
        for name in ["Soup", "Stew", "Salad"] {
            recipe(&pool, bob.id, name, &[lunch.id], &[(salt.id, 1)]).await;
        }
        follow_user_in_db(&pool, ann.id, bob.id, None).await.unwrap();

        let (subscriptions, count) = list_subscriptions_in_db(
            &pool,
            ann.id,
            SubscriptionQueryParams {
                recipes_limit: Some(2),
                pagination: Pagination { page: 1, limit: 6 },
            },
        )
        .await
        .unwrap();

        assert_eq!(count, 1);
        let bob_entry = &subscriptions[0];
        assert!(bob_entry.profile.is_subscribed);
        assert_eq!(bob_entry.recipes.len(), 2);
        assert_eq!(bob_entry.recipes_count, 3);
        assert_eq!(bob_entry.recipes[0].name, "Salad");
    }
}
