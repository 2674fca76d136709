use std::collections::HashSet;

use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::directory::DirectoryRecord;
use crate::error::AppError;
use crate::services::auth::Claims;

const MIN_TERM_LENGTH: usize = 2;
const LIMIT: usize = 30;

#[derive(Debug, Deserialize)]
pub struct TermQuery {
    #[serde(default)]
    pub term: String,
}

/// One row of a jQuery UI style autocomplete.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Suggestion {
    pub id: String,
    pub label: String,
    pub value: String,
}

fn suggestions(records: Vec<DirectoryRecord>) -> Vec<Suggestion> {
    records
        .into_iter()
        .filter_map(|record| {
            if record.given_name.is_empty() {
                log::warn!("Skipping directory record without givenName: {:?}", record.uid);
                return None;
            }
            let label = record.label();
            Some(Suggestion {
                id: record.uid,
                value: label.clone(),
                label,
            })
        })
        .collect()
}

async fn directory_matches(state: &AppState, term: &str) -> Vec<DirectoryRecord> {
    let term = term.trim();
    if term.chars().count() < MIN_TERM_LENGTH {
        return Vec::new();
    }
    state.lookup.search_users(term, LIMIT, true).await
}

pub async fn users(
    _claims: Claims,
    state: web::Data<AppState>,
    query: web::Query<TermQuery>,
) -> Result<HttpResponse, AppError> {
    let records = directory_matches(&state, &query.term).await;
    Ok(HttpResponse::Ok().json(suggestions(records)))
}

/// Like [`users`] but only people who have used the app.
pub async fn known_users(
    _claims: Claims,
    state: web::Data<AppState>,
    query: web::Query<TermQuery>,
) -> Result<HttpResponse, AppError> {
    let records = directory_matches(&state, &query.term).await;
    let emails: Vec<String> = records
        .iter()
        .map(|record| record.mail.clone())
        .filter(|mail| !mail.is_empty())
        .collect();
    let known: HashSet<String> = state
        .users
        .find_by_emails(&emails)
        .await?
        .into_iter()
        .map(|user| user.email.to_lowercase())
        .collect();

    let records = records
        .into_iter()
        .filter(|record| known.contains(&record.mail.to_lowercase()))
        .collect();
    Ok(HttpResponse::Ok().json(suggestions(records)))
}

pub async fn cities(
    _claims: Claims,
    state: web::Data<AppState>,
    query: web::Query<TermQuery>,
) -> Result<HttpResponse, AppError> {
    let term = query.term.trim();
    if term.is_empty() {
        return Ok(HttpResponse::Ok().json(Vec::<String>::new()));
    }
    let cities = state.profiles.cities_starting_with(term).await?;
    Ok(HttpResponse::Ok().json(cities))
}
