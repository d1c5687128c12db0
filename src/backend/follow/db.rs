//! Database operations for follow edges
//!
//! Both mutations are idempotent: following twice or unfollowing a user you
//! do not follow succeeds and reports that nothing changed. Every function
//! takes any SQLite executor so handlers can run them inside a transaction.

use chrono::Utc;
use sqlx::{Executor, Sqlite};
use uuid::Uuid;

use crate::shared::FollowCounts;

/// Create the edge. Returns whether a row was inserted.
pub async fn follow<'e, E>(executor: E, follower_id: Uuid, following_id: Uuid) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO follow_edges (follower_id, following_id, created_at)
        VALUES (?, ?, ?)
        ON CONFLICT (follower_id, following_id) DO NOTHING
        "#,
    )
    .bind(follower_id)
    .bind(following_id)
    .bind(Utc::now().timestamp_millis())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Delete the edge. Returns whether a row was deleted.
pub async fn unfollow<'e, E>(executor: E, follower_id: Uuid, following_id: Uuid) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM follow_edges WHERE follower_id = ? AND following_id = ?")
        .bind(follower_id)
        .bind(following_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn is_following<'e, E>(executor: E, follower_id: Uuid, following_id: Uuid) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM follow_edges WHERE follower_id = ? AND following_id = ?",
    )
    .bind(follower_id)
    .bind(following_id)
    .fetch_optional(executor)
    .await?;
    Ok(found.is_some())
}

/// Follower and following totals of `user_id`
pub async fn counts<'e, E>(executor: E, user_id: Uuid) -> Result<FollowCounts, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let (followers, following): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM follow_edges WHERE following_id = ?1),
            (SELECT COUNT(*) FROM follow_edges WHERE follower_id = ?1)
        "#,
    )
    .bind(user_id)
    .fetch_one(executor)
    .await?;

    Ok(FollowCounts { followers, following })
}
