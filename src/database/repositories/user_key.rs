use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::database::models::{UserKey, generate_random_key};

#[derive(Clone)]
pub struct UserKeyRepository {
    pool: SqlitePool,
}

impl UserKeyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_key(&self, key: &str) -> Result<Option<UserKey>> {
        let user_key = sqlx::query_as::<_, UserKey>(
            "SELECT id, user_id, key, add_date FROM user_keys WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user_key)
    }

    pub async fn get_or_create(&self, user_id: i64) -> Result<UserKey> {
        let existing = sqlx::query_as::<_, UserKey>(
            "SELECT id, user_id, key, add_date FROM user_keys WHERE user_id = ? ORDER BY id LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(user_key) = existing {
            return Ok(user_key);
        }

        loop {
            let key = generate_random_key();
            if self.find_by_key(&key).await?.is_some() {
                log::debug!("Generated user key collided, retrying");
                continue;
            }

            let user_key = sqlx::query_as::<_, UserKey>(
                r#"
                INSERT INTO user_keys (user_id, key, add_date)
                VALUES (?, ?, ?)
                RETURNING id, user_id, key, add_date
                "#,
            )
            .bind(user_id)
            .bind(&key)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

            return Ok(user_key);
        }
    }

    pub async fn delete_for_user(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM user_keys WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
