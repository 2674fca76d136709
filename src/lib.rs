pub mod config;
pub mod database;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::SqlitePool;

pub use config::Config;
pub use database::repositories::{
    EntryRepository, FollowingRepository, ProfileRepository, UserKeyRepository, UserRepository,
};
pub use services::{AuthService, FollowingService, Notifier};

use crate::database::models::User;
use crate::directory::{Directory, DirectoryLookup};
use crate::error::AppError;
use crate::services::auth::Claims;
use crate::services::notifier::Mailer;
use crate::services::org_chart::OrgChart;

/// How long a freshly saved entry is announced on the dashboard.
const RECENTLY_CREATED_TTL: Duration = Duration::from_secs(60);

pub struct AppState {
    pub config: Config,
    pub users: UserRepository,
    pub profiles: ProfileRepository,
    pub entries: EntryRepository,
    pub following: FollowingRepository,
    pub user_keys: UserKeyRepository,
    pub lookup: DirectoryLookup,
    pub notifier: Notifier,
    pub auth_service: AuthService,
    pub following_service: FollowingService,
    /// user id -> title of the entry they just saved
    pub recently_created: Cache<i64, String>,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        config: Config,
        directory: Arc<dyn Directory>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let users = UserRepository::new(pool.clone());
        let profiles = ProfileRepository::new(pool.clone());
        let entries = EntryRepository::new(pool.clone());
        let following = FollowingRepository::new(pool.clone());
        let user_keys = UserKeyRepository::new(pool);

        let lookup = DirectoryLookup::new(
            directory,
            Duration::from_secs(config.directory_cache_ttl_secs),
            Duration::from_secs(config.directory_miss_ttl_secs),
        );
        let notifier = Notifier::new(
            mailer,
            users.clone(),
            profiles.clone(),
            lookup.clone(),
            config.email.clone(),
            config.work_day,
        );
        let auth_service = AuthService::new(
            users.clone(),
            profiles.clone(),
            lookup.clone(),
            config.clone(),
        );
        let following_service = FollowingService::new(
            users.clone(),
            profiles.clone(),
            following.clone(),
            lookup.clone(),
        );

        Self {
            config,
            users,
            profiles,
            entries,
            following,
            user_keys,
            lookup,
            notifier,
            auth_service,
            following_service,
            recently_created: Cache::builder()
                .max_capacity(1_000)
                .time_to_live(RECENTLY_CREATED_TTL)
                .build(),
        }
    }

    pub async fn chart(&self) -> Result<OrgChart, AppError> {
        Ok(OrgChart::load(&self.profiles, &self.following).await?)
    }

    /// The account behind a token; a token for a deleted account is
    /// unauthorized.
    pub async fn current_user(&self, claims: &Claims) -> Result<User, AppError> {
        self.users
            .find_by_id(claims.user_id())
            .await?
            .ok_or(AppError::Unauthorized)
    }
}
