use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    pub user_id: i64,
    pub manager: String,
    pub manager_user_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub office: String,
    pub country: String,
    pub city: String,
    pub notes: String,
    pub hr_manager: bool,
}

impl UserProfile {
    pub fn empty(user_id: i64) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    /// Offices come from the directory as `City:::Country`.
    pub fn explode_office(&mut self) {
        if let Some((city, country)) = self.office.split_once(":::") {
            self.city = city.to_string();
            self.country = country.to_string();
        }
    }
}

/// Fields a user may edit about themselves.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileInput {
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}
