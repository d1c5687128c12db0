//! Listing view totals

use chrono::Utc;
use sqlx::SqlitePool;

pub async fn create_listing(pool: &SqlitePool, title: &str) -> Result<i64, sqlx::Error> {
    let result = sqlx::query("INSERT INTO listings (title, view_count, created_at) VALUES (?, 0, ?)")
        .bind(title)
        .bind(Utc::now().timestamp_millis())
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

/// Current total, or `None` when the listing does not exist
pub async fn view_count(pool: &SqlitePool, listing_id: i64) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar("SELECT view_count FROM listings WHERE id = ?")
        .bind(listing_id)
        .fetch_optional(pool)
        .await
}

/// Add one view and return the new total
pub async fn increment_views(pool: &SqlitePool, listing_id: i64) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar("UPDATE listings SET view_count = view_count + 1 WHERE id = ? RETURNING view_count")
        .bind(listing_id)
        .fetch_optional(pool)
        .await
}
