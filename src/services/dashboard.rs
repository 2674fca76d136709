use anyhow::Result;
use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

use crate::config::{CountryTotals, country_totals};
use crate::database::models::{EntryWithUser, User};
use crate::database::repositories::{EntryRepository, ProfileRepository};
use crate::services::forms::DEFAULT_DATE_FORMAT;

/// Hours as a person would say them: `0 days`, `4 hours`, `1 day`, `2.5 days`.
pub fn friendly_format(hours: i64, work_day: i32) -> String {
    let work_day = i64::from(work_day.max(1));
    if hours == 0 {
        "0 days".to_string()
    } else if hours < work_day {
        format!("{} hours", hours)
    } else if hours == work_day {
        "1 day".to_string()
    } else if hours % work_day == 0 {
        format!("{} days", hours / work_day)
    } else {
        format!("{:.1} days", hours as f64 / work_day as f64)
    }
}

/// Week start for the calendar widget: Monday for these countries, else Sunday.
pub fn first_day(country: &str) -> u8 {
    match country {
        "GB" | "FR" | "DE" => 1,
        _ => 0,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TakenInfo {
    pub taken: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_total: Option<CountryTotals>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub unrecognized_country: bool,
}

fn year_bounds(today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(today.year(), 1, 1)?;
    let next = NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)?;
    Some((start, next))
}

/// Time taken this calendar year and the allowance of the user's country.
pub async fn taken_info(
    entries: &EntryRepository,
    profiles: &ProfileRepository,
    user: &User,
    today: NaiveDate,
    work_day: i32,
) -> Result<TakenInfo> {
    let hours = match year_bounds(today) {
        Some((start, next)) => entries.taken_hours(user.id, start, next).await?,
        None => 0,
    };

    let mut info = TakenInfo {
        taken: friendly_format(hours, work_day),
        country: None,
        country_total: None,
        unrecognized_country: false,
    };

    if let Some(profile) = profiles.find_by_user(user.id).await? {
        if !profile.country.is_empty() {
            info.country_total = country_totals(&profile.country);
            info.unrecognized_country = info.country_total.is_none();
            info.country = Some(profile.country);
        }
    }

    Ok(info)
}

/// "Name <email>" for an entry's owner.
pub fn owner_label(entry: &EntryWithUser) -> String {
    let name = entry.display_name();
    if entry.email.is_empty() {
        name
    } else {
        format!("{} <{}>", name, entry.email)
    }
}

/// Entries of one person with the distance in days from today.
#[derive(Debug, Clone)]
pub struct PersonAbsences {
    pub user_id: i64,
    pub name: String,
    pub entries: Vec<(i64, EntryWithUser)>,
}

fn group_by_owner(rows: Vec<(i64, EntryWithUser)>) -> Vec<PersonAbsences> {
    let mut grouped: Vec<PersonAbsences> = Vec::new();
    for (days, entry) in rows {
        match grouped.iter_mut().find(|p| p.user_id == entry.user_id) {
            Some(person) => person.entries.push((days, entry)),
            None => grouped.push(PersonAbsences {
                user_id: entry.user_id,
                name: owner_label(&entry),
                entries: vec![(days, entry)],
            }),
        }
    }
    grouped
}

/// Who is away today and how many days remain of each absence.
pub async fn right_now(entries: &EntryRepository, today: NaiveDate) -> Result<Vec<PersonAbsences>> {
    let rows = entries
        .spanning(today)
        .await?
        .into_iter()
        .map(|entry| ((entry.end_date - today).num_days(), entry))
        .collect();
    Ok(group_by_owner(rows))
}

/// Absences starting within the next `days` days.
pub async fn upcoming(
    entries: &EntryRepository,
    today: NaiveDate,
    days: u64,
) -> Result<Vec<PersonAbsences>> {
    let Some(before) = today.checked_add_days(Days::new(days + 1)) else {
        return Ok(Vec::new());
    };
    let rows = entries
        .starting_between(today, before)
        .await?
        .into_iter()
        .map(|entry| ((entry.start_date - today).num_days(), entry))
        .collect();
    Ok(group_by_owner(rows))
}

fn distance(days: i64) -> String {
    match days {
        1 => "1 day".to_string(),
        7 => "1 week".to_string(),
        14 => "2 weeks".to_string(),
        n => format!("{} days", n),
    }
}

pub fn ends_description(days_left: i64, end: NaiveDate) -> String {
    format!("ends in {} on {}", distance(days_left), end.format(DEFAULT_DATE_FORMAT))
}

pub fn starts_description(days: i64, start: NaiveDate) -> String {
    format!("starts in {} on {}", distance(days), start.format(DEFAULT_DATE_FORMAT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_friendly_format() {
        assert_eq!(friendly_format(0, 8), "0 days");
        assert_eq!(friendly_format(4, 8), "4 hours");
        assert_eq!(friendly_format(8, 8), "1 day");
        assert_eq!(friendly_format(16, 8), "2 days");
        assert_eq!(friendly_format(20, 8), "2.5 days");
    }

    #[test]
    fn test_first_day() {
        assert_eq!(first_day("GB"), 1);
        assert_eq!(first_day("DE"), 1);
        assert_eq!(first_day("US"), 0);
        assert_eq!(first_day(""), 0);
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(
            ends_description(1, date(2024, 1, 9)),
            "ends in 1 day on Tuesday, January 09, 2024"
        );
        assert_eq!(
            starts_description(14, date(2024, 1, 22)),
            "starts in 2 weeks on Monday, January 22, 2024"
        );
        assert_eq!(
            starts_description(3, date(2024, 1, 11)),
            "starts in 3 days on Thursday, January 11, 2024"
        );
    }

    #[test]
    fn test_taken_info_serializes_only_known_fields() {
        let info = TakenInfo {
            taken: "0 days".to_string(),
            country: None,
            country_total: None,
            unrecognized_country: false,
        };
        assert_eq!(serde_json::to_value(&info).unwrap(), serde_json::json!({"taken": "0 days"}));
    }
}
