use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::database::{
    models::{NewUser, User},
    utils::placeholders,
};

const USER_COLUMNS: &str = r#"
    id,
    username,
    email,
    first_name,
    last_name,
    password_hash,
    is_staff,
    is_superuser,
    date_joined,
    last_login
"#;

#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_user(&self, input: &NewUser) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO
                users (
                    username,
                    email,
                    first_name,
                    last_name,
                    password_hash,
                    date_joined
                )
            VALUES
                (?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&input.username)
        .bind(&input.email)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = ?",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Emails compare case-insensitively.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = ? COLLATE NOCASE ORDER BY id LIMIT 1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = ?",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM users WHERE id IN ({})",
            USER_COLUMNS,
            placeholders(ids.len())
        );
        let mut query = sqlx::query_as::<_, User>(&sql);
        for id in ids {
            query = query.bind(id);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Users whose email is one of `emails`, case-insensitively.
    pub async fn find_by_emails(&self, emails: &[String]) -> Result<Vec<User>> {
        if emails.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM users WHERE lower(email) IN ({}) ORDER BY id",
            USER_COLUMNS,
            placeholders(emails.len())
        );
        let mut query = sqlx::query_as::<_, User>(&sql);
        for email in emails {
            query = query.bind(email.to_lowercase());
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    /// First-name prefix or last-name suffix, as the list filter does it.
    pub async fn search_by_name(&self, name: &str) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {}
            FROM users
            WHERE first_name LIKE ? || '%'
               OR last_name LIKE '%' || ?
            ORDER BY id
            "#,
            USER_COLUMNS
        ))
        .bind(name)
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    pub async fn hr_managers(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {}
            FROM users
            WHERE id IN (SELECT user_id FROM user_profiles WHERE hr_manager = 1)
            ORDER BY id
            "#,
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Refresh name and email from the directory.
    pub async fn update_identity(
        &self,
        id: i64,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET
                email = ?,
                first_name = ?,
                last_name = ?
            WHERE
                id = ?
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(email)
        .bind(first_name)
        .bind(last_name)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn touch_last_login(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn set_roles(&self, id: i64, is_staff: bool, is_superuser: bool) -> Result<()> {
        sqlx::query("UPDATE users SET is_staff = ?, is_superuser = ? WHERE id = ?")
            .bind(is_staff)
            .bind(is_superuser)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
