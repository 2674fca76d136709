//! JSON endpoints for the mobile client. The client treats every 200 as a
//! parseable answer, so a missing session and form errors are reported in
//! the body rather than the status.

use std::collections::HashMap;

use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::AppState;
use crate::database::models::{EntryWithUser, ProfileInput, User};
use crate::error::AppError;
use crate::handlers::auth::{
    LoginInput, attempt_login, removal_cookie, save_profile, session_cookie,
};
use crate::handlers::dates::{create_entry, finish_entry, hours_overview};
use crate::handlers::shared::today;
use crate::services::auth::Claims;
use crate::services::calendar::CALENDAR_DEPTH;
use crate::services::dashboard::{self, PersonAbsences, ends_description, starts_description};
use crate::services::forms::{AddForm, HoursForm};

pub const MOBILE_DATE_FORMAT: &str = "%Y-%m-%d";
const UPCOMING_DAYS: u64 = 14;

#[derive(Debug, Serialize)]
pub struct AbsenceRow {
    pub name: String,
    pub email: String,
    pub descriptions: Vec<String>,
}

fn not_logged_in() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "error": "Not logged in" }))
}

fn ok() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "ok": true }))
}

/// Field errors go back as `{"form_errors": ...}` with a 200.
fn respond(result: Result<HttpResponse, AppError>) -> Result<HttpResponse, AppError> {
    match result {
        Err(AppError::Validation(errors)) => {
            Ok(HttpResponse::Ok().json(json!({ "form_errors": errors })))
        }
        other => other,
    }
}

async fn session_user(state: &AppState, claims: Option<Claims>) -> Result<Option<User>, AppError> {
    match claims {
        Some(claims) => Ok(state.users.find_by_id(claims.user_id()).await?),
        None => Ok(None),
    }
}

fn absence_rows(
    people: Vec<PersonAbsences>,
    visible: &[i64],
    describe: fn(i64, &EntryWithUser) -> String,
) -> Vec<AbsenceRow> {
    people
        .into_iter()
        .filter(|person| visible.contains(&person.user_id))
        .filter_map(|person| {
            let (_, first) = person.entries.first()?;
            Some(AbsenceRow {
                name: first.display_name(),
                email: first.email.clone(),
                descriptions: person
                    .entries
                    .iter()
                    .map(|(days, entry)| describe(*days, entry))
                    .collect(),
            })
        })
        .collect()
}

pub async fn right_now(
    claims: Option<Claims>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let Some(user) = session_user(&state, claims).await? else {
        return Ok(not_logged_in());
    };

    let chart = state.chart().await?;
    let mut visible = vec![user.id];
    visible.extend(chart.observed_users(user.id, CALENDAR_DEPTH));

    let today = today();
    let now = dashboard::right_now(&state.entries, today).await?;
    let upcoming = dashboard::upcoming(&state.entries, today, UPCOMING_DAYS).await?;

    Ok(HttpResponse::Ok().json(json!({
        "now": absence_rows(now, &visible, |days, entry| {
            ends_description(days, entry.end_date)
        }),
        "upcoming": absence_rows(upcoming, &visible, |days, entry| {
            starts_description(days, entry.start_date)
        }),
    })))
}

pub async fn taken(
    claims: Option<Claims>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let Some(user) = session_user(&state, claims).await? else {
        return Ok(not_logged_in());
    };

    let info = dashboard::taken_info(
        &state.entries,
        &state.profiles,
        &user,
        today(),
        state.config.work_day,
    )
    .await?;
    Ok(HttpResponse::Ok().json(info))
}

pub async fn notify(
    claims: Option<Claims>,
    state: web::Data<AppState>,
    form: web::Form<AddForm>,
) -> Result<HttpResponse, AppError> {
    let Some(user) = session_user(&state, claims).await? else {
        return Ok(not_logged_in());
    };

    respond(async {
        let clean = form.validate(&state.config.email.blacklist)?;
        let notify = clean.notify.clone();
        let entry = create_entry(&state, &user, clean).await?;
        Ok::<_, AppError>(HttpResponse::Ok().json(json!({ "entry": entry.id, "notify": notify })))
    }
    .await)
}

pub async fn save_hours(
    claims: Option<Claims>,
    state: web::Data<AppState>,
    form: web::Form<HashMap<String, String>>,
) -> Result<HttpResponse, AppError> {
    let Some(user) = session_user(&state, claims).await? else {
        return Ok(not_logged_in());
    };

    let mut pairs = form.into_inner();
    let Some(entry_id) = pairs.remove("entry") else {
        return Err(AppError::BadRequest("No entry parameter provided".to_string()));
    };
    let entry_id: i64 = entry_id
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid entry parameter".to_string()))?;

    let entry = state
        .entries
        .find_by_id(entry_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Not found".to_string()))?;
    if entry.user_id != user.id {
        return Err(AppError::Forbidden("Not your entry".to_string()));
    }

    let hours_form = HoursForm::from_pairs(pairs);
    respond(async {
        finish_entry(&state, &entry, &hours_form).await?;
        Ok::<_, AppError>(ok())
    }
    .await)
}

#[derive(Debug, Deserialize)]
pub struct EntryQuery {
    pub entry: Option<i64>,
}

pub async fn hours_json(
    claims: Option<Claims>,
    state: web::Data<AppState>,
    query: web::Query<EntryQuery>,
) -> Result<HttpResponse, AppError> {
    let Some(user) = session_user(&state, claims).await? else {
        return Ok(not_logged_in());
    };
    let Some(entry_id) = query.entry else {
        return Ok(HttpResponse::Ok().json(json!({ "error": "No entry pre-loaded" })));
    };

    let entry = state
        .entries
        .find_by_id(entry_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Not found".to_string()))?;
    if entry.user_id != user.id {
        return Err(AppError::Forbidden("Not your entry".to_string()));
    }

    let overview = hours_overview(&state, entry).await?;
    let days: Vec<Value> = overview
        .days
        .into_iter()
        .map(|day| json!({ "key": day.key, "value": day.value, "full_day": day.full_day }))
        .collect();
    Ok(HttpResponse::Ok().json(days))
}

pub async fn settings_json(
    claims: Option<Claims>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let Some(user) = session_user(&state, claims).await? else {
        return Ok(not_logged_in());
    };

    let profile = state.profiles.get_or_create(user.id).await?;
    let mut data = serde_json::Map::new();
    data.insert("username".to_string(), json!(user.username));
    data.insert("email".to_string(), json!(user.email));
    data.insert("full_name".to_string(), json!(user.full_name_form(false)));
    if let Some(start_date) = profile.start_date {
        data.insert(
            "start_date".to_string(),
            json!(start_date.format(MOBILE_DATE_FORMAT).to_string()),
        );
    }
    if !profile.country.is_empty() {
        data.insert("country".to_string(), json!(profile.country));
    }
    if !profile.city.is_empty() {
        data.insert("city".to_string(), json!(profile.city));
    }

    Ok(HttpResponse::Ok().json(Value::Object(data)))
}

pub async fn save_settings(
    claims: Option<Claims>,
    state: web::Data<AppState>,
    form: web::Form<ProfileInput>,
) -> Result<HttpResponse, AppError> {
    let Some(user) = session_user(&state, claims).await? else {
        return Ok(not_logged_in());
    };

    respond(async {
        save_profile(&state, user.id, &form).await?;
        Ok::<_, AppError>(ok())
    }
    .await)
}

pub async fn login_status(
    claims: Option<Claims>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let logged_in = session_user(&state, claims).await?.is_some();
    Ok(HttpResponse::Ok().json(json!({ "logged_in": logged_in })))
}

pub async fn login(
    state: web::Data<AppState>,
    form: web::Form<LoginInput>,
) -> Result<HttpResponse, AppError> {
    respond(async {
        let session = attempt_login(&state, &form).await?;
        Ok::<_, AppError>(HttpResponse::Ok()
            .cookie(session_cookie(&session, state.config.is_production()))
            .json(json!({ "ok": true, "token": session.token })))
    }
    .await)
}

pub async fn logout() -> HttpResponse {
    HttpResponse::Ok().cookie(removal_cookie()).json(json!({ "ok": true }))
}
