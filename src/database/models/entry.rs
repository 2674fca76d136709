use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One PTO request over an inclusive date range.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Entry {
    pub id: i64,
    pub user_id: i64,
    pub total_hours: Option<i32>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub details: String,
    pub add_date: DateTime<Utc>,
    pub modify_date: DateTime<Utc>,
}

impl Entry {
    pub fn total_days(&self, work_day: i32) -> f64 {
        match self.total_hours {
            Some(hours) if work_day > 0 => f64::from(hours) / f64::from(work_day),
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Hours {
    pub id: i64,
    pub entry_id: i64,
    pub hours: i32,
    pub date: NaiveDate,
    pub birthday: bool,
}

#[derive(Debug, Clone)]
pub struct NewEntry {
    pub user_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub details: String,
    pub total_hours: Option<i32>,
}

/// Net recorded hours for one date, with the details of the latest
/// entry that touched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorDay {
    pub net_hours: i32,
    pub details: String,
}

/// An entry joined with its owner, as listed and exported.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EntryWithUser {
    pub id: i64,
    pub user_id: i64,
    pub total_hours: Option<i32>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub details: String,
    pub add_date: DateTime<Utc>,
    pub modify_date: DateTime<Utc>,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl EntryWithUser {
    pub fn from_entry(entry: Entry, owner: &super::User) -> Self {
        Self {
            id: entry.id,
            user_id: entry.user_id,
            total_hours: entry.total_hours,
            start_date: entry.start_date,
            end_date: entry.end_date,
            details: entry.details,
            add_date: entry.add_date,
            modify_date: entry.modify_date,
            username: owner.username.clone(),
            email: owner.email.clone(),
            first_name: owner.first_name.clone(),
            last_name: owner.last_name.clone(),
        }
    }

    pub fn entry(&self) -> Entry {
        Entry {
            id: self.id,
            user_id: self.user_id,
            total_hours: self.total_hours,
            start_date: self.start_date,
            end_date: self.end_date,
            details: self.details.clone(),
            add_date: self.add_date,
            modify_date: self.modify_date,
        }
    }

    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string();
        if name.is_empty() {
            self.username.clone()
        } else {
            name
        }
    }
}

/// Hours written onto the edited entry for one weekday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayAllocation {
    pub date: NaiveDate,
    pub hours: i32,
    pub birthday: bool,
}

/// A single-day negative entry that cancels previously recorded hours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compensation {
    pub date: NaiveDate,
    pub hours: i32,
    pub details: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub compensations: Vec<Compensation>,
    pub allocations: Vec<DayAllocation>,
    pub total_hours: i32,
}

/// Finished-entry filters for listing and export. `user_ids = None`
/// means everyone.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub date_filed_from: Option<NaiveDate>,
    pub date_filed_to: Option<NaiveDate>,
    pub user_ids: Option<Vec<i64>>,
}
