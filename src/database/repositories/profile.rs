use anyhow::Result;
use sqlx::SqlitePool;

use crate::database::{models::UserProfile, utils::is_valid_email};

const PROFILE_COLUMNS: &str = r#"
    user_id,
    manager,
    manager_user_id,
    start_date,
    office,
    country,
    city,
    notes,
    hr_manager
"#;

#[derive(Clone)]
pub struct ProfileRepository {
    pool: SqlitePool,
}

impl ProfileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_user(&self, user_id: i64) -> Result<Option<UserProfile>> {
        let profile = sqlx::query_as::<_, UserProfile>(&format!(
            "SELECT {} FROM user_profiles WHERE user_id = ?",
            PROFILE_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    /// Profiles are created lazily the first time they are needed.
    pub async fn get_or_create(&self, user_id: i64) -> Result<UserProfile> {
        sqlx::query("INSERT OR IGNORE INTO user_profiles (user_id) VALUES (?)")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        let profile = sqlx::query_as::<_, UserProfile>(&format!(
            "SELECT {} FROM user_profiles WHERE user_id = ?",
            PROFILE_COLUMNS
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(profile)
    }

    /// Persist a profile, exploding `City:::Country` offices and resolving
    /// an email `manager` to a local user.
    pub async fn save(&self, profile: &UserProfile) -> Result<UserProfile> {
        let mut profile = profile.clone();
        profile.explode_office();

        profile.manager_user_id = if is_valid_email(&profile.manager) {
            sqlx::query_scalar::<_, i64>(
                "SELECT id FROM users WHERE email = ? COLLATE NOCASE ORDER BY id LIMIT 1",
            )
            .bind(&profile.manager)
            .fetch_optional(&self.pool)
            .await?
        } else {
            None
        };

        let saved = sqlx::query_as::<_, UserProfile>(&format!(
            r#"
            INSERT INTO
                user_profiles (
                    user_id,
                    manager,
                    manager_user_id,
                    start_date,
                    office,
                    country,
                    city,
                    notes,
                    hr_manager
                )
            VALUES
                (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id) DO UPDATE SET
                manager = excluded.manager,
                manager_user_id = excluded.manager_user_id,
                start_date = excluded.start_date,
                office = excluded.office,
                country = excluded.country,
                city = excluded.city,
                notes = excluded.notes,
                hr_manager = excluded.hr_manager
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        ))
        .bind(profile.user_id)
        .bind(&profile.manager)
        .bind(profile.manager_user_id)
        .bind(profile.start_date)
        .bind(&profile.office)
        .bind(&profile.country)
        .bind(&profile.city)
        .bind(&profile.notes)
        .bind(profile.hr_manager)
        .fetch_one(&self.pool)
        .await?;

        Ok(saved)
    }

    pub async fn all(&self) -> Result<Vec<UserProfile>> {
        let profiles = sqlx::query_as::<_, UserProfile>(&format!(
            "SELECT {} FROM user_profiles ORDER BY user_id",
            PROFILE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(profiles)
    }

    /// `(user_id, manager_user_id)` for every profile with a resolved manager.
    pub async fn manager_pointers(&self) -> Result<Vec<(i64, i64)>> {
        let rows = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT user_id, manager_user_id
            FROM user_profiles
            WHERE manager_user_id IS NOT NULL
            ORDER BY user_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn cities_starting_with(&self, prefix: &str) -> Result<Vec<String>> {
        let cities = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT city
            FROM user_profiles
            WHERE city != '' AND city LIKE ? || '%'
            ORDER BY city
            "#,
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;

        Ok(cities)
    }

    pub async fn countries(&self) -> Result<Vec<String>> {
        let countries = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT country FROM user_profiles WHERE country != '' ORDER BY country",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(countries)
    }

    pub async fn users_in_country(&self, country: &str) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM user_profiles WHERE country = ? ORDER BY user_id",
        )
        .bind(country)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
