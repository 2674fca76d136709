use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::database::models::User;
use crate::database::repositories::{FollowingRepository, ProfileRepository, UserRepository};
use crate::directory::DirectoryLookup;
use crate::error::AppError;
use crate::services::org_chart::{ObservationReason, OrgChart};

/// How far down the org chart the following page looks.
pub const FOLLOWING_DEPTH: usize = 2;

const AUTOCOMPLETE_LIMIT: usize = 30;

static NAME_EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>@\s]+@[^>\s]+)>").expect("name email regex"));

/// What a follow search box can hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowSearch {
    Email(String),
    UserId(i64),
    Query(String),
}

pub fn parse_follow_search(search: &str) -> Option<FollowSearch> {
    let search = search.trim();
    if search.is_empty() {
        return None;
    }
    if let Some(captures) = NAME_EMAIL_RE.captures(search) {
        return Some(FollowSearch::Email(captures[1].trim().to_string()));
    }
    if search.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(id) = search.parse() {
            return Some(FollowSearch::UserId(id));
        }
    }
    Some(FollowSearch::Query(search.to_string()))
}

#[derive(Debug, Clone, Serialize)]
pub struct ObservedPerson {
    pub id: i64,
    pub name: String,
    pub reason: ObservationReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnobservedPerson {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FollowingOverview {
    pub observed: Vec<ObservedPerson>,
    pub not_observed: Vec<UnobservedPerson>,
}

#[derive(Clone)]
pub struct FollowingService {
    users: UserRepository,
    profiles: ProfileRepository,
    following: FollowingRepository,
    lookup: DirectoryLookup,
}

impl FollowingService {
    pub fn new(
        users: UserRepository,
        profiles: ProfileRepository,
        following: FollowingRepository,
        lookup: DirectoryLookup,
    ) -> Self {
        Self {
            users,
            profiles,
            following,
            lookup,
        }
    }

    pub async fn chart(&self) -> Result<OrgChart, AppError> {
        Ok(OrgChart::load(&self.profiles, &self.following).await?)
    }

    pub async fn overview(&self, me: &User) -> Result<FollowingOverview, AppError> {
        let chart = self.chart().await?;

        let mut observed_users = self
            .users
            .find_by_ids(&chart.observed_users(me.id, FOLLOWING_DEPTH))
            .await?;
        observed_users.sort_by_key(|user| user.first_name.to_lowercase());
        let observed = observed_users
            .into_iter()
            .map(|user| ObservedPerson {
                id: user.id,
                reason: chart.observation_reason(me.id, user.id),
                name: user.full_name_form(false),
            })
            .collect();

        let blacklisted_ids = self.following.blacklisted_by(me.id).await?;
        let mut blacklisted = self.users.find_by_ids(&blacklisted_ids).await?;
        blacklisted.sort_by_key(|user| {
            blacklisted_ids
                .iter()
                .position(|id| *id == user.id)
                .unwrap_or(usize::MAX)
        });
        let not_observed = blacklisted
            .into_iter()
            .map(|user| UnobservedPerson {
                id: user.id,
                name: user.full_name_form(false),
            })
            .collect();

        Ok(FollowingOverview {
            observed,
            not_observed,
        })
    }

    async fn resolve(&self, search: &str) -> Result<User, AppError> {
        let email = match parse_follow_search(search) {
            None => return Err(AppError::BadRequest("Missing search".to_string())),
            Some(FollowSearch::UserId(id)) => {
                return self
                    .users
                    .find_by_id(id)
                    .await?
                    .ok_or_else(|| AppError::BadRequest("No user found".to_string()));
            }
            Some(FollowSearch::Email(email)) => email,
            Some(FollowSearch::Query(query)) => {
                let records = self
                    .lookup
                    .search_users(&query, AUTOCOMPLETE_LIMIT, true)
                    .await;
                let emails: Vec<String> = records
                    .into_iter()
                    .map(|record| record.mail)
                    .filter(|mail| !mail.is_empty())
                    .collect();
                let mut known = self.users.find_by_emails(&emails).await?;
                match known.len() {
                    0 => return Err(AppError::BadRequest("No user found".to_string())),
                    1 => known.remove(0).email,
                    _ => {
                        return Err(AppError::BadRequest(
                            "More than one user found".to_string(),
                        ));
                    }
                }
            }
        };

        if email.is_empty() {
            return Err(AppError::BadRequest("No email found".to_string()));
        }
        self.users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::BadRequest("No user by that email found".to_string()))
    }

    pub async fn follow(&self, me: &User, search: &str) -> Result<ObservedPerson, AppError> {
        let user = self.resolve(search).await?;
        self.following.follow(me.id, user.id).await?;
        log::info!("User {} now follows {}", me.id, user.id);

        let chart = self.chart().await?;
        Ok(ObservedPerson {
            id: user.id,
            reason: chart.observation_reason(me.id, user.id),
            name: user.full_name_form(false),
        })
    }

    /// Drop the follow edge; a user still observed through the org chart gets
    /// blacklisted instead and is returned.
    pub async fn unfollow(&self, me: &User, remove: &str) -> Result<Option<UnobservedPerson>, AppError> {
        let invalid = || AppError::BadRequest("Invalid user ID".to_string());
        let user_id: i64 = remove.trim().parse().map_err(|_| invalid())?;
        let user = self.users.find_by_id(user_id).await?.ok_or_else(invalid)?;

        self.following.unfollow(me.id, user.id).await?;

        let chart = self.chart().await?;
        if !chart.observed_users(me.id, FOLLOWING_DEPTH).contains(&user.id) {
            log::info!("User {} stopped following {}", me.id, user.id);
            return Ok(None);
        }

        self.following.blacklist(me.id, user.id).await?;
        log::info!("User {} blacklisted {}", me.id, user.id);
        Ok(Some(UnobservedPerson {
            id: user.id,
            name: user.full_name_form(false),
        }))
    }
}
