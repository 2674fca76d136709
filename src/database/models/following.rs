use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `follower_id` explicitly watches `following_id`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FollowingUser {
    pub id: i64,
    pub follower_id: i64,
    pub following_id: i64,
    pub add_date: DateTime<Utc>,
}

/// `observer_id` does not want to see `observable_id`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlacklistedUser {
    pub id: i64,
    pub observer_id: i64,
    pub observable_id: i64,
    pub add_date: DateTime<Utc>,
}
