//! Request parsing and validation shared by the desktop and mobile endpoints.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, Weekday};
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::database::utils::is_valid_email;
use crate::error::FieldErrors;

pub const DEFAULT_DATE_FORMAT: &str = "%A, %B %d, %Y";
pub const LIST_DATE_FORMAT: &str = "%d %B %Y";
pub const REQUIRED: &str = "This field is required.";
pub const INVALID_DATE: &str = "Enter a valid date.";

static TIMESTAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{13}|\d{10}\.\d{0,4}|\d{10}").expect("timestamp regex"));

static BRACKETED_EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([\w.\-]+@[\w.\-]+)>").expect("bracketed email regex"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unable to parse {0:?} as a date")]
pub struct DatetimeParseError(pub String);

/// Calendar widgets send epoch seconds or milliseconds; ISO dates are
/// accepted too.
pub fn parse_datetime(value: &str) -> Result<NaiveDate, DatetimeParseError> {
    if let Some(found) = TIMESTAMP_RE.find(value) {
        let digits = found.as_str();
        let seconds = if digits.len() >= 13 {
            digits
                .parse::<f64>()
                .map(|ms| ms / 1000.0)
                .map_err(|_| DatetimeParseError(value.to_string()))?
        } else {
            digits
                .parse::<f64>()
                .map_err(|_| DatetimeParseError(value.to_string()))?
        };
        return DateTime::from_timestamp(seconds.trunc() as i64, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| DatetimeParseError(value.to_string()));
    }

    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| DatetimeParseError(value.to_string()))
}

/// Dates typed into forms: ISO, `01 January 2024` or the long display format.
pub fn parse_form_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    [
        "%Y-%m-%d",
        LIST_DATE_FORMAT,
        DEFAULT_DATE_FORMAT,
        "%m/%d/%Y",
    ]
    .iter()
    .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Split the free-text notify field on `,` and `;`, unwrapping
/// `Name <email>` forms and dropping anything that isn't an address.
pub fn clean_notify(value: &str, blacklist: &[String]) -> Result<Vec<String>, String> {
    let mut valid = Vec::new();

    for item in value.replace(',', ";").split(';') {
        let mut email = item.trim().to_string();
        if email.is_empty() {
            continue;
        }

        let lt = email.rfind('<');
        let at = email.rfind('@');
        let gt = email.rfind('>');
        if let (Some(lt), Some(at), Some(gt)) = (lt, at, gt) {
            if lt < at && at < gt {
                match BRACKETED_EMAIL_RE.captures(&email) {
                    Some(captures) => email = captures[1].trim().to_string(),
                    None => continue,
                }
            }
        }

        if !is_valid_email(&email) {
            continue;
        }
        if blacklist.contains(&email.to_lowercase()) {
            return Err(format!("Can't send email to {}", email));
        }
        valid.push(email);
    }

    Ok(valid)
}

/// Body of a notify submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddForm {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub notify: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanAddForm {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub details: String,
    pub notify: Vec<String>,
}

fn required_date(errors: &mut FieldErrors, field: &str, value: Option<&str>) -> Option<NaiveDate> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => {
            errors.add(field, REQUIRED);
            None
        }
        Some(raw) => {
            let parsed = parse_form_date(raw);
            if parsed.is_none() {
                errors.add(field, INVALID_DATE);
            }
            parsed
        }
    }
}

impl AddForm {
    pub fn validate(&self, email_blacklist: &[String]) -> Result<CleanAddForm, FieldErrors> {
        let mut errors = FieldErrors::new();

        let start = required_date(&mut errors, "start", self.start.as_deref());
        let end = required_date(&mut errors, "end", self.end.as_deref());

        let notify = match clean_notify(self.notify.as_deref().unwrap_or(""), email_blacklist) {
            Ok(notify) => notify,
            Err(message) => {
                errors.add("notify", message);
                Vec::new()
            }
        };

        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                errors.add_non_field("Start can't be after end");
            } else if is_weekend(start) && is_weekend(end) {
                errors.add_non_field("Days are only weekend days");
            }
        }

        let details = self
            .details
            .as_deref()
            .unwrap_or("")
            .replace("\r\n", "\n")
            .trim()
            .to_string();

        match (start, end) {
            (Some(start), Some(end)) if errors.is_empty() => Ok(CleanAddForm {
                start,
                end,
                details,
                notify,
            }),
            _ => Err(errors),
        }
    }
}

/// Body of an hours submission: `d-YYYYMMDD` fields plus the notify list
/// the notify step handed back.
#[derive(Debug, Clone, Default)]
pub struct HoursForm {
    pub fields: HashMap<String, String>,
    pub notify: Vec<String>,
}

impl HoursForm {
    /// Accepts numbers or strings as field values; `notify` may be a list or
    /// a `;`-separated string.
    pub fn from_json(body: serde_json::Map<String, serde_json::Value>) -> Self {
        let mut form = HoursForm::default();
        for (key, value) in body {
            if key == "notify" {
                form.notify = match value {
                    serde_json::Value::Array(items) => items
                        .into_iter()
                        .filter_map(|item| item.as_str().map(|s| s.trim().to_string()))
                        .filter(|s| !s.is_empty())
                        .collect(),
                    serde_json::Value::String(s) => split_notify(&s),
                    _ => Vec::new(),
                };
                continue;
            }
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                _ => continue,
            };
            form.fields.insert(key, value);
        }
        form
    }

    pub fn from_pairs(pairs: HashMap<String, String>) -> Self {
        let mut fields = pairs;
        let notify = fields
            .remove("notify")
            .map(|s| split_notify(&s))
            .unwrap_or_default();
        HoursForm { fields, notify }
    }
}

fn split_notify(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
