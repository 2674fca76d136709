use actix_web::{
    Error as ActixError, FromRequest, HttpRequest, dev::Payload, error::ErrorUnauthorized,
    web::Data,
};
use anyhow::{Result, anyhow};
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::future::{Ready, ready};

use crate::config::Config;
use crate::database::models::{NewUser, User};
use crate::database::repositories::{ProfileRepository, UserRepository};
use crate::directory::{DirectoryAccount, DirectoryLookup};

pub const SESSION_COOKIE: &str = "pto_session";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64, // user id
    pub username: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub exp: usize, // expiration time
}

impl Claims {
    pub fn user_id(&self) -> i64 {
        self.sub
    }
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    let header = req.headers().get("Authorization")?.to_str().ok()?;
    header.strip_prefix("Bearer ").map(|token| token.trim().to_string())
}

fn session_token(req: &HttpRequest) -> Option<String> {
    bearer_token(req).or_else(|| req.cookie(SESSION_COOKIE).map(|c| c.value().to_string()))
}

pub fn decode_claims(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(token_data.claims)
}

impl FromRequest for Claims {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let Some(token) = session_token(req) else {
            return ready(Err(ErrorUnauthorized(
                "Missing or invalid authorization header",
            )));
        };

        match req.app_data::<Data<Config>>() {
            Some(config) => match decode_claims(&token, &config.jwt_secret) {
                Ok(claims) => ready(Ok(claims)),
                Err(_) => ready(Err(ErrorUnauthorized("Invalid token"))),
            },
            None => {
                log::error!("Config missing from app data, cannot verify tokens");
                ready(Err(ErrorUnauthorized("Invalid token")))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub expires: DateTime<Utc>,
    pub user: User,
}

#[derive(Clone)]
pub struct AuthService {
    users: UserRepository,
    profiles: ProfileRepository,
    lookup: DirectoryLookup,
    config: Config,
}

impl AuthService {
    pub fn new(
        users: UserRepository,
        profiles: ProfileRepository,
        lookup: DirectoryLookup,
        config: Config,
    ) -> Self {
        Self {
            users,
            profiles,
            lookup,
            config,
        }
    }

    /// Directory bind first, local password second. `None` when neither
    /// accepts the credentials.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<Option<Session>> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Ok(None);
        }

        let user = match self.lookup.authenticate(username, password).await {
            Some(account) => Some(self.sync_directory_account(&account).await?),
            None => self.local_login(username, password).await?,
        };

        let Some(user) = user else {
            log::info!("Rejected login for {}", username);
            return Ok(None);
        };

        self.users.touch_last_login(user.id).await?;
        let (token, expires) = self.generate_token(&user, remember_me)?;
        log::info!("User {} logged in", user.username);

        Ok(Some(Session {
            token,
            expires,
            user,
        }))
    }

    async fn local_login(&self, username: &str, password: &str) -> Result<Option<User>> {
        let user = match self.users.find_by_username(username).await? {
            Some(user) => Some(user),
            None => self.users.find_by_email(username).await?,
        };

        let Some(user) = user else {
            return Ok(None);
        };
        let Some(password_hash) = user.password_hash.as_deref() else {
            return Ok(None);
        };

        if verify(password, password_hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    /// Get or create the user behind a directory login and copy over names,
    /// manager and office.
    async fn sync_directory_account(&self, account: &DirectoryAccount) -> Result<User> {
        let record = &account.record;
        if record.mail.is_empty() {
            return Err(anyhow!("Directory account has no mail attribute"));
        }

        let user = match self.users.find_by_email(&record.mail).await? {
            Some(user) => user,
            None => {
                let username = self.unused_username(&record.mail).await?;
                log::info!("Creating user {} for {}", username, record.mail);
                self.users
                    .create_user(
                        &NewUser::new(&username, &record.mail)
                            .with_name(&record.given_name, &record.sn),
                    )
                    .await?
            }
        };

        self.users
            .update_identity(user.id, &record.mail, &record.given_name, &record.sn)
            .await?;

        let mut profile = self.profiles.get_or_create(user.id).await?;
        if let Some(manager) = &account.manager {
            profile.manager = manager.clone();
        }
        if let Some(office) = &account.office {
            profile.office = office.clone();
        }
        self.profiles.save(&profile).await?;

        self.users
            .find_by_id(user.id)
            .await?
            .ok_or_else(|| anyhow!("User {} vanished during login", user.id))
    }

    async fn unused_username(&self, email: &str) -> Result<String> {
        let base = email.split('@').next().unwrap_or(email).to_string();
        let mut candidate = base.clone();
        let mut suffix = 1;
        while self.users.find_by_username(&candidate).await?.is_some() {
            suffix += 1;
            candidate = format!("{}{}", base, suffix);
        }
        Ok(candidate)
    }

    pub fn generate_token(&self, user: &User, remember_me: bool) -> Result<(String, DateTime<Utc>)> {
        let lifetime = if remember_me {
            Duration::days(self.config.remember_me_days)
        } else {
            Duration::hours(self.config.session_hours)
        };
        let expires = Utc::now()
            .checked_add_signed(lifetime)
            .ok_or_else(|| anyhow!("Session lifetime overflows"))?;

        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            exp: expires.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_ref()),
        )?;

        Ok((token, expires))
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    Ok(hash(password, DEFAULT_COST)?)
}
