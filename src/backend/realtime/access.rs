//! Topic access rules
//!
//! | Topic                        | Subscribe                          | Publish        |
//! |------------------------------|------------------------------------|----------------|
//! | `room-<id>`                  | room member                        | room member    |
//! | `presence:<kind>:<id>`       | anyone while live, owner always    | same, signed in|
//! | `follow:<user>` and others   | anyone                             | signed in      |

use sqlx::SqlitePool;

use super::live::LiveDirectory;
use crate::backend::auth::Viewer;
use crate::backend::chat::db as chat_db;
use crate::backend::error::BackendError;
use crate::shared::Topic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Subscribe,
    Publish,
}

/// Check whether `viewer` may subscribe or publish to `topic`
pub async fn authorize(
    pool: &SqlitePool,
    live: &dyn LiveDirectory,
    viewer: Viewer,
    topic: &str,
    access: Access,
) -> Result<(), BackendError> {
    match Topic::parse(topic) {
        Topic::Room(room_id) => {
            let user_id = viewer.require()?;
            if !chat_db::room_exists(pool, room_id).await? {
                return Err(BackendError::not_found(format!("Room {} not found", room_id)));
            }
            if !chat_db::is_member(pool, room_id, user_id).await? {
                tracing::warn!("[Realtime] {} denied on {}", user_id, topic);
                return Err(BackendError::forbidden("Not a member of this room"));
            }
        }
        Topic::Presence { kind, id } => {
            let status = live
                .status(&kind, &id)
                .ok_or_else(|| BackendError::not_found(format!("Unknown {} {}", kind, id)))?;
            let is_owner = viewer.id() == Some(status.owner_id);
            if !status.is_live && !is_owner {
                return Err(BackendError::forbidden(format!("{} {} is not live", kind, id)));
            }
            if access == Access::Publish {
                viewer.require()?;
            }
        }
        Topic::Follow(_) | Topic::Other(_) => {
            if access == Access::Publish {
                viewer.require()?;
            }
        }
    }
    Ok(())
}
