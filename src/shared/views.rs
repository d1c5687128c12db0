//! View counter response types

use serde::{Deserialize, Serialize};

/// Response of `POST /listings/{id}/view` and `GET /listings/{id}/views`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewCount {
    pub listing_id: i64,
    /// Whether this request advanced the counter
    #[serde(default)]
    pub counted: bool,
    pub views: i64,
}
