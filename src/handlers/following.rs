use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::error::AppError;
use crate::handlers::shared::ApiResponse;
use crate::services::auth::Claims;

#[derive(Debug, Deserialize)]
pub struct FollowInput {
    #[serde(default)]
    pub search: String,
}

#[derive(Debug, Deserialize)]
pub struct UnfollowInput {
    #[serde(default)]
    pub remove: String,
}

pub async fn following(claims: Claims, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let me = state.current_user(&claims).await?;
    let overview = state.following_service.overview(&me).await?;
    Ok(ApiResponse::ok(overview))
}

pub async fn save_following(
    claims: Claims,
    state: web::Data<AppState>,
    input: web::Json<FollowInput>,
) -> Result<HttpResponse, AppError> {
    let me = state.current_user(&claims).await?;
    let person = state.following_service.follow(&me, &input.search).await?;
    Ok(ApiResponse::ok(person))
}

pub async fn save_unfollowing(
    claims: Claims,
    state: web::Data<AppState>,
    input: web::Json<UnfollowInput>,
) -> Result<HttpResponse, AppError> {
    let me = state.current_user(&claims).await?;
    match state.following_service.unfollow(&me, &input.remove).await? {
        Some(person) => Ok(ApiResponse::ok(json!(person))),
        None => Ok(ApiResponse::ok(json!({}))),
    }
}
