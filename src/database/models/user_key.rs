use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const KEY_LENGTH: usize = 10;

/// Opaque token behind a user's ICS subscription URL.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserKey {
    pub id: i64,
    pub user_id: i64,
    pub key: String,
    pub add_date: DateTime<Utc>,
}

pub fn generate_random_key() -> String {
    Uuid::new_v4().simple().to_string()[..KEY_LENGTH].to_string()
}
