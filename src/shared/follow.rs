//! Follow graph types
//!
//! Shapes exchanged by the follow toggle endpoints and the `follow_delta`
//! reconciliation event.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Follower/following totals for one user
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FollowCounts {
    pub followers: i64,
    pub following: i64,
}

/// Response of `POST /follow/{target}` and `DELETE /follow/{target}`
///
/// `delta` is `+1` or `-1` when the edge actually changed and `0` when the
/// requested state already held.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FollowToggleResponse {
    pub delta: i64,
    pub is_following: bool,
    /// Counts of the target user after the mutation
    pub counts: Option<FollowCounts>,
    /// Server-side ordering stamp (microseconds since epoch)
    pub version: i64,
}

/// Response of `GET /follow/{target}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FollowStatus {
    pub target_id: Uuid,
    pub is_following: bool,
    pub counts: FollowCounts,
}

/// Payload of the `follow_delta` event on `follow:<targetId>`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FollowDelta {
    pub target_id: Uuid,
    pub follower_id: Option<Uuid>,
    pub delta: i64,
    pub is_following: bool,
    pub counts: Option<FollowCounts>,
    pub version: i64,
}
