//! Idempotent Rate-Limited Counter
//!
//! Decides whether an action from one actor on one target should count,
//! allowing at most one count per cooldown window per
//! `(actor_id, target_type, target_id)`, even when duplicate requests race.
//!
//! # Algorithm
//!
//! 1. Look up the throttle record for the key.
//! 2. Absent: insert it. If the insert hits the primary key because a
//!    concurrent duplicate got there first, fall through to step 3.
//! 3. Present: `UPDATE ... WHERE last_action_at <= now - cooldown`. The action
//!    counts only if that statement changed a row.
//!
//! No lock is taken; the race is settled by the primary key and the
//! compare-and-swap style update.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Identity of a throttled action
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThrottleKey {
    pub actor_id: String,
    pub target_type: String,
    pub target_id: String,
}

impl ThrottleKey {
    pub fn new(
        actor_id: impl Into<String>,
        target_type: impl Into<String>,
        target_id: impl ToString,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            target_type: target_type.into(),
            target_id: target_id.to_string(),
        }
    }
}

/// `should_count_at` with the current time
pub async fn should_count(
    pool: &SqlitePool,
    key: &ThrottleKey,
    cooldown: Duration,
) -> Result<bool, sqlx::Error> {
    should_count_at(pool, key, cooldown, Utc::now()).await
}

/// Whether the action identified by `key`, observed at `now`, should count
pub async fn should_count_at(
    pool: &SqlitePool,
    key: &ThrottleKey,
    cooldown: Duration,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let now_ms = now.timestamp_millis();

    let existing: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT last_action_at FROM throttle_records
        WHERE actor_id = ? AND target_type = ? AND target_id = ?
        "#,
    )
    .bind(&key.actor_id)
    .bind(&key.target_type)
    .bind(&key.target_id)
    .fetch_optional(pool)
    .await?;

    if existing.is_none() {
        let inserted = sqlx::query(
            r#"
            INSERT INTO throttle_records (actor_id, target_type, target_id, last_action_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&key.actor_id)
        .bind(&key.target_type)
        .bind(&key.target_id)
        .bind(now_ms)
        .execute(pool)
        .await;

        match inserted {
            Ok(_) => {
                tracing::debug!("[Throttle] First action for {:?}", key);
                return Ok(true);
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tracing::debug!("[Throttle] Lost insert race for {:?}, trying update", key);
            }
            Err(e) => return Err(e),
        }
    }

    let cooldown_ms = i64::try_from(cooldown.as_millis()).unwrap_or(i64::MAX);
    let cutoff = now_ms.saturating_sub(cooldown_ms);

    let updated = sqlx::query(
        r#"
        UPDATE throttle_records
        SET last_action_at = ?
        WHERE actor_id = ? AND target_type = ? AND target_id = ?
          AND last_action_at <= ?
        "#,
    )
    .bind(now_ms)
    .bind(&key.actor_id)
    .bind(&key.target_type)
    .bind(&key.target_id)
    .bind(cutoff)
    .execute(pool)
    .await?;

    let counted = updated.rows_affected() == 1;
    tracing::debug!("[Throttle] {:?} counted={}", key, counted);
    Ok(counted)
}
