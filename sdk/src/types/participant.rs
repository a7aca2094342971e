//! Auction participant types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user present in the auction room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// User ID. Unique within the roster.
    pub id: String,

    /// Display name.
    pub display_name: String,

    /// Time the server reported the join.
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    /// Creates a new participant.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        joined_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            joined_at,
        }
    }
}
