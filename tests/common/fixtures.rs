//! Message builders

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use bazaar_sync::shared::{Message, SenderSnapshot};

/// A persisted-looking message in room 1
pub fn message(id: i64, sender: Uuid, offset_secs: i64) -> Message {
    Message {
        id,
        room_id: 1,
        payload: format!("message {}", id),
        created_at: Utc
            .timestamp_opt(1_700_000_000 + offset_secs, 0)
            .single()
            .expect("valid timestamp"),
        is_read: false,
        sender: SenderSnapshot {
            id: sender,
            username: format!("user-{}", &sender.to_string()[..8]),
            avatar: None,
        },
    }
}

/// Poll `condition` until it holds or a second passes
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(1);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    condition()
}
