use std::collections::HashMap;

use actix_web::{HttpRequest, HttpResponse, http::header, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::AppState;
use crate::database::models::{Entry, EntryWithUser, NewEntry, User, UserInfo};
use crate::error::{AppError, FieldErrors};
use crate::handlers::shared::{ApiResponse, base_url, can_manage_entries_of, today};
use crate::services::auth::Claims;
use crate::services::calendar::{self, make_entry_title};
use crate::services::dashboard::{self, TakenInfo};
use crate::services::export::{self, ListFilterForm};
use crate::services::forms::{
    AddForm, CleanAddForm, HoursForm, INVALID_DATE, REQUIRED, parse_datetime, parse_form_date,
};
use crate::services::hours::{self, HoursDay, estimated_days, weekday_dates};

#[derive(Debug, Serialize)]
pub struct Person {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct NotifyInfo {
    pub manager: Option<Person>,
    pub hr_managers: Vec<Person>,
}

#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    pub entry: i64,
    pub notify: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HoursOverview {
    pub entry: Entry,
    pub days: Vec<HoursDay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_hours: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_days: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct HoursSaved {
    pub entry: i64,
    pub total_hours: i32,
    pub is_edit: bool,
    pub recipients: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub taken: TakenInfo,
    pub first_day: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recently_created: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailsSentQuery {
    #[serde(default)]
    pub emails: String,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DuplicateQuery {
    pub user: Option<i64>,
    pub since: Option<String>,
}

pub(crate) async fn create_entry(
    state: &AppState,
    user: &User,
    form: CleanAddForm,
) -> Result<Entry, AppError> {
    let entry = state
        .entries
        .create(&NewEntry {
            user_id: user.id,
            start_date: form.start,
            end_date: form.end,
            details: form.details,
            total_hours: None,
        })
        .await?;

    let dropped = state.entries.delete_unfinished(user.id, Some(entry.id)).await?;
    if dropped > 0 {
        log::debug!("Dropped {} unfinished entries of user {}", dropped, user.id);
    }
    log::info!("User {} started entry {}", user.id, entry.id);

    Ok(entry)
}

/// The entry behind `entry_id`, if the caller may manage it.
pub(crate) async fn managed_entry(
    state: &AppState,
    claims: &Claims,
    entry_id: i64,
) -> Result<Entry, AppError> {
    let entry = state
        .entries
        .find_by_id(entry_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Entry not found".to_string()))?;

    if !can_manage_entries_of(claims, entry.user_id) {
        return Err(AppError::Forbidden("Not your entry".to_string()));
    }
    Ok(entry)
}

pub(crate) async fn hours_overview(state: &AppState, entry: Entry) -> Result<HoursOverview, AppError> {
    let work_day = state.config.work_day;
    let dates = weekday_dates(entry.start_date, entry.end_date);
    let prior = state.entries.prior_days(entry.user_id, &dates).await?;
    let days = hours::hours_days(&dates, &prior, work_day);

    let (total_hours, total_days) = match entry.total_hours {
        Some(total) => (Some(total), None),
        None => {
            let logged: HashMap<_, _> = prior
                .iter()
                .map(|(date, day)| (*date, day.net_hours))
                .collect();
            (None, Some(estimated_days(&dates, &logged, work_day)))
        }
    };

    Ok(HoursOverview {
        entry,
        days,
        total_hours,
        total_days,
    })
}

/// Apply an hours submission, notify and remember the entry for the next
/// dashboard load.
pub(crate) async fn finish_entry(
    state: &AppState,
    entry: &Entry,
    form: &HoursForm,
) -> Result<HoursSaved, AppError> {
    let work_day = state.config.work_day;
    let saved = hours::save_entry_hours(&state.entries, entry, form, work_day).await?;

    let owner = state
        .users
        .find_by_id(saved.entry.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Entry owner not found".to_string()))?;

    let recipients = state
        .notifier
        .send_entry_notification(&saved.entry, &owner, &form.notify, saved.is_edit)
        .await?;

    let rows = state.entries.hours_for_entry(saved.entry.id).await?;
    let with_owner = EntryWithUser::from_entry(saved.entry.clone(), &owner);
    let title = make_entry_title(&with_owner, &rows, owner.id, true, work_day);
    state.recently_created.insert(owner.id, title).await;

    Ok(HoursSaved {
        entry: saved.entry.id,
        total_hours: saved.total_hours,
        is_edit: saved.is_edit,
        recipients,
    })
}

pub async fn dashboard(claims: Claims, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let user = state.current_user(&claims).await?;
    let taken = dashboard::taken_info(
        &state.entries,
        &state.profiles,
        &user,
        today(),
        state.config.work_day,
    )
    .await?;
    let first_day = dashboard::first_day(taken.country.as_deref().unwrap_or(""));

    Ok(ApiResponse::ok(DashboardResponse {
        taken,
        first_day,
        recently_created: state.recently_created.remove(&user.id).await,
    }))
}

pub async fn notify_info(claims: Claims, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let user = state.current_user(&claims).await?;

    let mut manager = None;
    if let Some(profile) = state.profiles.find_by_user(user.id).await? {
        if !profile.manager.is_empty() {
            manager = state
                .lookup
                .fetch_user_details(&profile.manager, false)
                .await
                .map(|record| Person {
                    name: format!("{} {}", record.given_name, record.sn).trim().to_string(),
                    email: record.mail,
                });
        }
    }

    let hr_managers = state
        .users
        .hr_managers()
        .await?
        .into_iter()
        .map(|hr| Person {
            name: hr.full_name_form(true),
            email: hr.email,
        })
        .collect();

    Ok(ApiResponse::ok(NotifyInfo {
        manager,
        hr_managers,
    }))
}

pub async fn notify(
    claims: Claims,
    state: web::Data<AppState>,
    input: web::Json<AddForm>,
) -> Result<HttpResponse, AppError> {
    let user = state.current_user(&claims).await?;
    let form = input.validate(&state.config.email.blacklist)?;
    let notify = form.notify.clone();
    let entry = create_entry(&state, &user, form).await?;

    Ok(ApiResponse::created(NotifyResponse {
        entry: entry.id,
        notify,
    }))
}

pub async fn cancel_notify(claims: Claims, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let deleted = state.entries.delete_unfinished(claims.user_id(), None).await?;
    log::info!("User {} cancelled {} unfinished entries", claims.user_id(), deleted);

    Ok(ApiResponse::ok(json!({ "deleted": deleted })))
}

pub async fn hours_form(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let entry = managed_entry(&state, &claims, path.into_inner()).await?;
    Ok(ApiResponse::ok(hours_overview(&state, entry).await?))
}

pub async fn save_hours(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<serde_json::Map<String, serde_json::Value>>,
) -> Result<HttpResponse, AppError> {
    let entry = managed_entry(&state, &claims, path.into_inner()).await?;
    let form = HoursForm::from_json(body.into_inner());

    Ok(ApiResponse::ok(finish_entry(&state, &entry, &form).await?))
}

pub async fn emails_sent(
    _claims: Claims,
    state: web::Data<AppState>,
    query: web::Query<EmailsSentQuery>,
) -> Result<HttpResponse, AppError> {
    let mut recipients = Vec::new();
    for email in query.emails.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let label = match state.lookup.fetch_user_details(email, false).await {
            Some(record) if !record.given_name.is_empty() => record.label(),
            _ => email.to_string(),
        };
        recipients.push(label);
    }

    Ok(ApiResponse::ok(json!({ "recipients": recipients })))
}

fn window_bound(errors: &mut FieldErrors, field: &str, value: Option<&str>) -> Option<NaiveDate> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => {
            errors.add(field, REQUIRED);
            None
        }
        Some(raw) => match parse_datetime(raw) {
            Ok(date) => Some(date),
            Err(e) => {
                errors.add(field, e.to_string());
                None
            }
        },
    }
}

pub async fn calendar_events(
    claims: Claims,
    state: web::Data<AppState>,
    query: web::Query<CalendarQuery>,
) -> Result<HttpResponse, AppError> {
    let mut errors = FieldErrors::new();
    let start = window_bound(&mut errors, "start", query.start.as_deref());
    let end = window_bound(&mut errors, "end", query.end.as_deref());
    let (Some(start), Some(end)) = (start, end) else {
        return Err(AppError::Validation(errors));
    };

    let user = state.current_user(&claims).await?;
    let chart = state.chart().await?;
    let events = calendar::calendar_events(
        &state.entries,
        &chart,
        &user,
        start,
        end,
        state.config.work_day,
    )
    .await?;

    Ok(HttpResponse::Ok().json(events))
}

fn feed_url(req: &HttpRequest, key: &str) -> String {
    format!("{}/dates/{}/ptocalendar.ics", base_url(req), key)
}

pub async fn calendar_url(
    claims: Claims,
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let key = state.user_keys.get_or_create(claims.user_id()).await?;
    Ok(ApiResponse::ok(json!({ "url": feed_url(&req, &key.key) })))
}

pub async fn reset_calendar_url(
    claims: Claims,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let deleted = state.user_keys.delete_for_user(claims.user_id()).await?;
    log::info!("User {} reset {} calendar keys", claims.user_id(), deleted);

    Ok(HttpResponse::Ok().json(ApiResponse::<()>::success_with_message(
        None,
        "Calendar URL reset",
    )))
}

pub async fn calendar_feed(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let key = path.into_inner();
    let base = base_url(&req);
    let calendar_name = &state.config.calendar_name;

    let owner = match state.user_keys.find_by_key(&key).await? {
        Some(user_key) => state.users.find_by_id(user_key.user_id).await?,
        None => None,
    };

    let body = match owner {
        Some(owner) => {
            let chart = state.chart().await?;
            calendar::render_ics(
                &state.entries,
                &chart,
                &owner,
                today(),
                calendar_name,
                &base,
                state.config.work_day,
            )
            .await?
        }
        None => {
            log::info!("Serving expired calendar for unknown key {}", key);
            calendar::render_expired_ics(calendar_name, &base, today())
        }
    };

    Ok(HttpResponse::Ok()
        .content_type("text/calendar;charset=utf-8")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}.ics\"", key),
        ))
        .body(body))
}

pub async fn list(_claims: Claims, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let metadata = export::list_metadata(&state.entries, &state.profiles).await?;
    Ok(ApiResponse::ok(metadata))
}

async fn filtered_rows(
    state: &AppState,
    claims: &Claims,
    form: &ListFilterForm,
) -> Result<Vec<export::ListRow>, AppError> {
    let filter = form.resolve(&state.users, &state.profiles).await?;
    let viewer = state.current_user(claims).await?;
    let chart = state.chart().await?;

    Ok(export::list_rows(&state.entries, &state.profiles, &filter, &viewer, &chart).await?)
}

pub async fn list_json(
    claims: Claims,
    state: web::Data<AppState>,
    query: web::Query<ListFilterForm>,
) -> Result<HttpResponse, AppError> {
    let rows = filtered_rows(&state, &claims, &query).await?;
    Ok(HttpResponse::Ok().json(export::list_json(&rows)))
}

pub async fn list_csv(
    claims: Claims,
    state: web::Data<AppState>,
    query: web::Query<ListFilterForm>,
) -> Result<HttpResponse, AppError> {
    let rows = filtered_rows(&state, &claims, &query).await?;
    let body = export::list_csv(&rows, state.config.work_day)?;
    log::info!("User {} exported {} entries", claims.user_id(), rows.len());

    Ok(HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"pto-{}.csv\"", today().format("%Y-%m-%d")),
        ))
        .body(body))
}

pub async fn duplicate_report(
    claims: Claims,
    state: web::Data<AppState>,
    query: web::Query<DuplicateQuery>,
) -> Result<HttpResponse, AppError> {
    let user_id = query.user.unwrap_or(claims.user_id());
    if user_id != claims.user_id() && !(claims.is_staff || claims.is_superuser) {
        return Err(AppError::Forbidden("Only available for admins".to_string()));
    }

    let since = match query.since.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => match parse_form_date(raw) {
            Some(date) => Some(date),
            None => {
                let mut errors = FieldErrors::new();
                errors.add("since", INVALID_DATE);
                return Err(AppError::Validation(errors));
            }
        },
    };

    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    let groups = export::duplicate_report(&state.entries, user.id, since).await?;

    Ok(ApiResponse::ok(json!({
        "user": UserInfo::from(user),
        "groups": groups,
    })))
}
