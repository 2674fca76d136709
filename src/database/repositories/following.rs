use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::database::models::{BlacklistedUser, FollowingUser};
use crate::error::IntegrityError;

/// Follow and blacklist edges. For a given ordered pair at most one of the
/// two exists; writing one removes the other in the same transaction.
#[derive(Clone)]
pub struct FollowingRepository {
    pool: SqlitePool,
}

impl FollowingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn follow(&self, follower_id: i64, following_id: i64) -> Result<FollowingUser> {
        if follower_id == following_id {
            return Err(IntegrityError::CannotFollowSelf.into());
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM blacklisted_users WHERE observer_id = ? AND observable_id = ?")
            .bind(follower_id)
            .bind(following_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO following_users (follower_id, following_id, add_date)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(follower_id)
        .bind(following_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let edge = sqlx::query_as::<_, FollowingUser>(
            r#"
            SELECT id, follower_id, following_id, add_date
            FROM following_users
            WHERE follower_id = ? AND following_id = ?
            "#,
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(edge)
    }

    pub async fn unfollow(&self, follower_id: i64, following_id: i64) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM following_users WHERE follower_id = ? AND following_id = ?")
                .bind(follower_id)
                .bind(following_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    pub async fn blacklist(&self, observer_id: i64, observable_id: i64) -> Result<BlacklistedUser> {
        if observer_id == observable_id {
            return Err(IntegrityError::CannotBlacklistSelf.into());
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM following_users WHERE follower_id = ? AND following_id = ?")
            .bind(observer_id)
            .bind(observable_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO blacklisted_users (observer_id, observable_id, add_date)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(observer_id)
        .bind(observable_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let edge = sqlx::query_as::<_, BlacklistedUser>(
            r#"
            SELECT id, observer_id, observable_id, add_date
            FROM blacklisted_users
            WHERE observer_id = ? AND observable_id = ?
            "#,
        )
        .bind(observer_id)
        .bind(observable_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(edge)
    }

    /// All follow edges as `(follower, following)`, in insertion order.
    pub async fn follow_edges(&self) -> Result<Vec<(i64, i64)>> {
        let edges = sqlx::query_as::<_, (i64, i64)>(
            "SELECT follower_id, following_id FROM following_users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(edges)
    }

    /// All blacklist edges as `(observer, observable)`.
    pub async fn blacklist_edges(&self) -> Result<Vec<(i64, i64)>> {
        let edges = sqlx::query_as::<_, (i64, i64)>(
            "SELECT observer_id, observable_id FROM blacklisted_users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(edges)
    }

    pub async fn is_following(&self, follower_id: i64, following_id: i64) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM following_users WHERE follower_id = ? AND following_id = ?",
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    pub async fn is_blacklisted(&self, observer_id: i64, observable_id: i64) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM blacklisted_users WHERE observer_id = ? AND observable_id = ?",
        )
        .bind(observer_id)
        .bind(observable_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Ids the observer has blacklisted, ordered by first name.
    pub async fn blacklisted_by(&self, observer_id: i64) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT b.observable_id
            FROM blacklisted_users b
                INNER JOIN users u ON u.id = b.observable_id
            WHERE b.observer_id = ?
            ORDER BY u.first_name COLLATE NOCASE, b.id
            "#,
        )
        .bind(observer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
