use actix_web::{
    HttpResponse, Result,
    cookie::{Cookie, SameSite, time::Duration as CookieDuration},
    web,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::database::models::{ProfileInput, UserInfo, UserProfile};
use crate::error::{AppError, FieldErrors};
use crate::handlers::shared::ApiResponse;
use crate::services::auth::{Claims, SESSION_COOKIE, Session};

pub const INVALID_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields are case-sensitive.";

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires: chrono::DateTime<Utc>,
    pub user: UserInfo,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserInfo,
    pub profile: UserProfile,
}

pub(crate) fn session_cookie(session: &Session, secure: bool) -> Cookie<'static> {
    let max_age = (session.expires - Utc::now()).num_seconds().max(0);
    Cookie::build(SESSION_COOKIE, session.token.clone())
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(max_age))
        .finish()
}

pub(crate) fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    cookie.make_removal();
    cookie
}

pub(crate) async fn attempt_login(
    state: &AppState,
    input: &LoginInput,
) -> Result<Session, AppError> {
    let session = state
        .auth_service
        .login(&input.username, &input.password, input.remember_me)
        .await?;

    session.ok_or_else(|| {
        let mut errors = FieldErrors::new();
        errors.add_non_field(INVALID_LOGIN);
        AppError::Validation(errors)
    })
}

pub async fn login(
    state: web::Data<AppState>,
    input: web::Json<LoginInput>,
) -> Result<HttpResponse, AppError> {
    let session = attempt_login(&state, &input).await?;
    let cookie = session_cookie(&session, state.config.is_production());

    let response = LoginResponse {
        token: session.token,
        expires: session.expires,
        user: UserInfo::from(session.user),
    };

    Ok(HttpResponse::Ok()
        .cookie(cookie)
        .json(ApiResponse::success(response)))
}

pub async fn logout() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok()
        .cookie(removal_cookie())
        .json(ApiResponse::<()>::success_with_message(None, "Logged out")))
}

pub async fn me(claims: Claims, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let user = state.current_user(&claims).await?;
    let profile = state.profiles.get_or_create(user.id).await?;

    Ok(ApiResponse::ok(MeResponse {
        user: UserInfo::from(user),
        profile,
    }))
}

pub async fn update_profile(
    claims: Claims,
    state: web::Data<AppState>,
    input: web::Json<ProfileInput>,
) -> Result<HttpResponse, AppError> {
    let user = state.current_user(&claims).await?;
    let profile = save_profile(&state, user.id, &input).await?;
    log::info!("User {} updated their profile", user.id);

    Ok(ApiResponse::ok(profile))
}

pub(crate) async fn save_profile(
    state: &AppState,
    user_id: i64,
    input: &ProfileInput,
) -> Result<UserProfile, AppError> {
    let mut errors = FieldErrors::new();
    let country = input.country.trim().to_uppercase();
    if !country.is_empty() && (country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic())) {
        errors.add("country", "Enter a two letter country code.");
    }
    errors.into_result(())?;

    let mut profile = state.profiles.get_or_create(user_id).await?;
    profile.city = input.city.trim().to_string();
    profile.country = country;
    if input.start_date.is_some() {
        profile.start_date = input.start_date;
    }

    Ok(state.profiles.save(&profile).await?)
}
