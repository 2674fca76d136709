use std::collections::{HashMap, HashSet};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::database::models::{Entry, EntryFilter, EntryWithUser, User, UserProfile};
use crate::database::repositories::{EntryRepository, ProfileRepository, UserRepository};
use crate::database::utils::is_valid_email;
use crate::error::{AppError, FieldErrors};
use crate::services::calendar::can_see_details;
use crate::services::forms::{INVALID_DATE, parse_form_date};
use crate::services::org_chart::OrgChart;

pub const AUTOMATIC_EDIT: &str = "*automatic edit*";

pub const CSV_HEADER: [&str; 12] = [
    "ID",
    "EMAIL",
    "FIRST NAME",
    "LAST NAME",
    "ADDED",
    "START",
    "END",
    "DAYS",
    "DETAILS",
    "CITY",
    "COUNTRY",
    "START DATE",
];

const ISO_DATE: &str = "%Y-%m-%d";

/// Query string of the list, JSON and CSV views.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ListFilterForm {
    #[serde(default)]
    pub date_from: Option<String>,
    #[serde(default)]
    pub date_to: Option<String>,
    #[serde(default)]
    pub date_filed_from: Option<String>,
    #[serde(default)]
    pub date_filed_to: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

fn optional_date(errors: &mut FieldErrors, field: &str, value: Option<&str>) -> Option<NaiveDate> {
    let raw = value.map(str::trim).filter(|v| !v.is_empty())?;
    let parsed = parse_form_date(raw);
    if parsed.is_none() {
        errors.add(field, INVALID_DATE);
    }
    parsed
}

fn narrow(current: Option<Vec<i64>>, allowed: Vec<i64>) -> Vec<i64> {
    match current {
        None => allowed,
        Some(ids) => {
            let allowed: HashSet<i64> = allowed.into_iter().collect();
            ids.into_iter().filter(|id| allowed.contains(id)).collect()
        }
    }
}

impl ListFilterForm {
    /// Resolve dates, the name and the country into an [`EntryFilter`].
    pub async fn resolve(
        &self,
        users: &UserRepository,
        profiles: &ProfileRepository,
    ) -> Result<EntryFilter, AppError> {
        let mut errors = FieldErrors::new();
        let mut filter = EntryFilter {
            date_from: optional_date(&mut errors, "date_from", self.date_from.as_deref()),
            date_to: optional_date(&mut errors, "date_to", self.date_to.as_deref()),
            date_filed_from: optional_date(
                &mut errors,
                "date_filed_from",
                self.date_filed_from.as_deref(),
            ),
            date_filed_to: optional_date(
                &mut errors,
                "date_filed_to",
                self.date_filed_to.as_deref(),
            ),
            user_ids: None,
        };
        errors.into_result(())?;

        if let Some(name) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            let ids = if is_valid_email(name) {
                users
                    .find_by_email(name)
                    .await?
                    .map(|user| vec![user.id])
                    .unwrap_or_default()
            } else {
                users
                    .search_by_name(name)
                    .await?
                    .into_iter()
                    .map(|user| user.id)
                    .collect()
            };
            filter.user_ids = Some(ids);
        }

        if let Some(country) = self.country.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            let in_country = profiles.users_in_country(country).await?;
            filter.user_ids = Some(narrow(filter.user_ids.take(), in_country));
        }

        Ok(filter)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListMetadata {
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub first_filed_date: Option<DateTime<Utc>>,
    pub countries: Vec<String>,
}

pub async fn list_metadata(
    entries: &EntryRepository,
    profiles: &ProfileRepository,
) -> Result<ListMetadata> {
    let (first_date, last_date, first_filed_date) = entries.bounds().await?;
    Ok(ListMetadata {
        first_date,
        last_date,
        first_filed_date,
        countries: profiles.countries().await?,
    })
}

/// One listed entry with the owner's profile fields and the details the
/// viewer is allowed to read.
#[derive(Debug, Clone)]
pub struct ListRow {
    pub entry: EntryWithUser,
    pub details: String,
    pub city: String,
    pub country: String,
    pub start_date: Option<NaiveDate>,
}

impl ListRow {
    pub fn to_json(&self) -> Value {
        json!([
            self.entry.email,
            self.entry.first_name,
            self.entry.last_name,
            self.entry.add_date.format(ISO_DATE).to_string(),
            self.entry.total_hours.unwrap_or(0),
            self.entry.start_date.format(ISO_DATE).to_string(),
            self.entry.end_date.format(ISO_DATE).to_string(),
            self.city,
            self.country,
            self.details,
        ])
    }

    fn to_record(&self, work_day: i32) -> Vec<String> {
        vec![
            self.entry.id.to_string(),
            self.entry.email.clone(),
            self.entry.first_name.clone(),
            self.entry.last_name.clone(),
            self.entry.add_date.format(ISO_DATE).to_string(),
            self.entry.start_date.format(ISO_DATE).to_string(),
            self.entry.end_date.format(ISO_DATE).to_string(),
            self.entry.entry().total_days(work_day).to_string(),
            self.details.clone(),
            self.city.clone(),
            self.country.clone(),
            self.start_date
                .map(|d| d.format(ISO_DATE).to_string())
                .unwrap_or_default(),
        ]
    }
}

fn visible_details(entry: &EntryWithUser, viewer: &User, chart: &OrgChart) -> String {
    if entry.total_hours.is_some_and(|hours| hours < 0) {
        AUTOMATIC_EDIT.to_string()
    } else if can_see_details(viewer, entry.user_id, chart) {
        entry.details.clone()
    } else {
        String::new()
    }
}

pub async fn list_rows(
    entries: &EntryRepository,
    profiles: &ProfileRepository,
    filter: &EntryFilter,
    viewer: &User,
    chart: &OrgChart,
) -> Result<Vec<ListRow>> {
    let found = entries.filtered(filter).await?;
    let by_user: HashMap<i64, UserProfile> = profiles
        .all()
        .await?
        .into_iter()
        .map(|profile| (profile.user_id, profile))
        .collect();

    Ok(found
        .into_iter()
        .map(|entry| {
            let profile = by_user.get(&entry.user_id);
            ListRow {
                details: visible_details(&entry, viewer, chart),
                city: profile.map(|p| p.city.clone()).unwrap_or_default(),
                country: profile.map(|p| p.country.clone()).unwrap_or_default(),
                start_date: profile.and_then(|p| p.start_date),
                entry,
            }
        })
        .collect())
}

pub fn list_json(rows: &[ListRow]) -> Value {
    json!({ "aaData": rows.iter().map(ListRow::to_json).collect::<Vec<_>>() })
}

pub fn list_csv(rows: &[ListRow], work_day: i32) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for row in rows {
        writer.write_record(row.to_record(work_day))?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV: {}", e))
}

pub const PROBABLY_DUPLICATE: &str = "Probably a duplicate! The details are the same for each entry";
pub const POSSIBLY_NOT_DUPLICATE: &str = "Possibly not a duplicate since the details different";

/// Entries of one user that share a start date.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    pub start_date: NaiveDate,
    pub count: i64,
    pub entries: Vec<Entry>,
    pub note: &'static str,
}

pub fn duplicate_note(entries: &[Entry]) -> &'static str {
    let details: HashSet<&str> = entries.iter().map(|e| e.details.as_str()).collect();
    if details.len() <= 1 {
        PROBABLY_DUPLICATE
    } else {
        POSSIBLY_NOT_DUPLICATE
    }
}

pub async fn duplicate_report(
    entries: &EntryRepository,
    user_id: i64,
    since: Option<NaiveDate>,
) -> Result<Vec<DuplicateGroup>> {
    let mut groups = Vec::new();
    for (start_date, count) in entries.repeated_start_dates(user_id, since).await? {
        let same_start = entries.starting_on(user_id, start_date).await?;
        groups.push(DuplicateGroup {
            start_date,
            count,
            note: duplicate_note(&same_start),
            entries: same_start,
        });
    }
    Ok(groups)
}
