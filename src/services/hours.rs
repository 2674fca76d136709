use std::collections::HashMap;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::Serialize;

use crate::database::models::{
    Compensation, DayAllocation, Entry, PriorDay, ReconciliationPlan,
};
use crate::database::repositories::EntryRepository;
use crate::error::{AppError, FieldErrors};
use crate::services::forms::{DEFAULT_DATE_FORMAT, HoursForm, REQUIRED};

/// Submitted value that records a birthday instead of hours.
pub const BIRTHDAY: i32 = -1;

/// Monday..Friday in the inclusive range.
pub fn weekday_dates(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = start;
    while current <= end {
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            dates.push(current);
        }
        match current.checked_add_days(Days::new(1)) {
            Some(next) => current = next,
            None => break,
        }
    }
    dates
}

pub fn field_name(date: NaiveDate) -> String {
    date.format("d-%Y%m%d").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayValue {
    Hours(i32),
    Birthday,
}

impl DayValue {
    pub fn hours(&self) -> i32 {
        match self {
            DayValue::Hours(hours) => *hours,
            DayValue::Birthday => 0,
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, DayValue::Hours(0))
    }
}

/// Read one value per weekday; anything other than a full day, half day or
/// the birthday sentinel is a field error. Zero cancels hours, so it is only
/// a choice on dates that already have some.
pub fn parse_day_values(
    dates: &[NaiveDate],
    fields: &HashMap<String, String>,
    prior: &HashMap<NaiveDate, PriorDay>,
    work_day: i32,
) -> Result<Vec<(NaiveDate, DayValue)>, FieldErrors> {
    let mut errors = FieldErrors::new();
    let mut values = Vec::with_capacity(dates.len());

    for &date in dates {
        let name = field_name(date);
        let raw = fields.get(&name).map(|value| value.trim()).filter(|v| !v.is_empty());
        let Some(raw) = raw else {
            errors.add(name, REQUIRED);
            continue;
        };

        match raw.parse::<i32>() {
            Ok(BIRTHDAY) => values.push((date, DayValue::Birthday)),
            Ok(0) if prior.contains_key(&date) => values.push((date, DayValue::Hours(0))),
            Ok(hours) if hours != 0 && (hours == work_day || hours == work_day / 2) => {
                values.push((date, DayValue::Hours(hours)))
            }
            _ => errors.add(
                name,
                format!(
                    "Select a valid choice. {} is not one of the available choices.",
                    raw
                ),
            ),
        }
    }

    errors.into_result(values)
}

/// One negative entry per date that already nets non-zero hours, and one
/// allocation per submitted value. The total covers the allocations only.
pub fn plan_reconciliation(
    days: &[(NaiveDate, DayValue)],
    prior: &HashMap<NaiveDate, PriorDay>,
) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan::default();

    for &(date, value) in days {
        if let Some(prior_day) = prior.get(&date) {
            if prior_day.net_hours != 0 {
                plan.compensations.push(Compensation {
                    date,
                    hours: -prior_day.net_hours,
                    details: prior_day.details.clone(),
                });
            }
        }

        plan.allocations.push(DayAllocation {
            date,
            hours: value.hours(),
            birthday: matches!(value, DayValue::Birthday),
        });
        plan.total_hours += value.hours();
    }

    plan
}

#[derive(Debug, Clone)]
pub struct SavedHours {
    pub entry: Entry,
    pub total_hours: i32,
    pub is_edit: bool,
}

/// Validate an hours submission against `entry` and apply it.
pub async fn save_entry_hours(
    entries: &EntryRepository,
    entry: &Entry,
    form: &HoursForm,
    work_day: i32,
) -> Result<SavedHours, AppError> {
    let dates = weekday_dates(entry.start_date, entry.end_date);
    let prior = entries.prior_days(entry.user_id, &dates).await?;
    let values = parse_day_values(&dates, &form.fields, &prior, work_day)?;

    let mut errors = FieldErrors::new();
    if let (Some(&(first, first_value)), Some(&(last, last_value))) =
        (values.first(), values.last())
    {
        if first_value.is_zero()
            && !entries
                .date_covered_by_other_finished(entry.user_id, first, entry.id)
                .await?
        {
            errors.add_non_field("First date can't be 0 hours");
        } else if last != first
            && last_value.is_zero()
            && !entries
                .date_covered_by_other_finished(entry.user_id, last, entry.id)
                .await?
        {
            errors.add_non_field("Last date can't be 0 hours");
        }
    }
    errors.into_result(())?;

    let plan = plan_reconciliation(&values, &prior);
    let is_edit = entry.total_hours.is_some();

    let updated = entries.apply_reconciliation(entry, &plan).await?;
    log::info!(
        "Logged {} hours on entry {} for user {} ({} compensations)",
        plan.total_hours,
        entry.id,
        entry.user_id,
        plan.compensations.len()
    );

    Ok(SavedHours {
        entry: updated,
        total_hours: plan.total_hours,
        is_edit,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct HoursChoice {
    pub value: i32,
    pub label: &'static str,
}

/// What the hours form shows for one weekday.
#[derive(Debug, Clone, Serialize)]
pub struct HoursDay {
    pub key: String,
    pub date: NaiveDate,
    pub full_day: String,
    pub value: i32,
    pub help_text: String,
    pub choices: Vec<HoursChoice>,
}

pub fn hours_days(
    dates: &[NaiveDate],
    prior: &HashMap<NaiveDate, PriorDay>,
    work_day: i32,
) -> Vec<HoursDay> {
    dates
        .iter()
        .map(|&date| {
            let logged = prior.get(&date).map(|p| p.net_hours);
            let mut choices = vec![
                HoursChoice {
                    value: work_day,
                    label: "Full day",
                },
                HoursChoice {
                    value: work_day / 2,
                    label: "Half day",
                },
                HoursChoice {
                    value: BIRTHDAY,
                    label: "Birthday",
                },
            ];
            if logged.is_some() {
                choices.push(HoursChoice {
                    value: 0,
                    label: "Cancel (0 hours)",
                });
            }

            HoursDay {
                key: field_name(date),
                date,
                full_day: date.format(DEFAULT_DATE_FORMAT).to_string(),
                value: logged.unwrap_or(work_day),
                help_text: logged
                    .map(|hours| format!("Already logged {} hours on this day", hours))
                    .unwrap_or_default(),
                choices,
            }
        })
        .collect()
}

/// Days a not-yet-finished entry will probably take: full days count one,
/// partial days a half, unknown days one.
pub fn estimated_days(dates: &[NaiveDate], logged: &HashMap<NaiveDate, i32>, work_day: i32) -> f64 {
    dates
        .iter()
        .map(|date| match logged.get(date) {
            Some(&hours) if hours == work_day => 1.0,
            Some(&hours) if hours != 0 => 0.5,
            Some(_) => 0.0,
            None => 1.0,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fields(pairs: &[(NaiveDate, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(d, v)| (field_name(*d), v.to_string()))
            .collect()
    }

    #[test]
    fn test_weekday_dates_skip_weekends() {
        // Friday 2024-01-05 to Tuesday 2024-01-09
        let dates = weekday_dates(date(2024, 1, 5), date(2024, 1, 9));
        assert_eq!(dates, vec![date(2024, 1, 5), date(2024, 1, 8), date(2024, 1, 9)]);
        assert!(weekday_dates(date(2024, 1, 6), date(2024, 1, 7)).is_empty());
    }

    #[test]
    fn test_field_name() {
        assert_eq!(field_name(date(2024, 1, 5)), "d-20240105");
    }

    fn logged(dates: &[NaiveDate], hours: i32) -> HashMap<NaiveDate, PriorDay> {
        dates
            .iter()
            .map(|&d| {
                (
                    d,
                    PriorDay {
                        net_hours: hours,
                        details: String::new(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_parse_day_values() {
        let dates = weekday_dates(date(2024, 1, 8), date(2024, 1, 11));
        let values = parse_day_values(
            &dates,
            &fields(&[
                (date(2024, 1, 8), "8"),
                (date(2024, 1, 9), "4"),
                (date(2024, 1, 10), "0"),
                (date(2024, 1, 11), "-1"),
            ]),
            &logged(&[date(2024, 1, 10)], 8),
            8,
        )
        .unwrap();
        assert_eq!(
            values.iter().map(|(_, v)| *v).collect::<Vec<_>>(),
            vec![
                DayValue::Hours(8),
                DayValue::Hours(4),
                DayValue::Hours(0),
                DayValue::Birthday
            ]
        );
    }

    #[test]
    fn test_parse_day_values_rejects_missing_and_invalid() {
        let dates = vec![date(2024, 1, 8), date(2024, 1, 9)];
        let errors = parse_day_values(
            &dates,
            &fields(&[(date(2024, 1, 8), "5")]),
            &HashMap::new(),
            8,
        )
        .unwrap_err();
        assert_eq!(errors.get("d-20240109").unwrap(), &[REQUIRED]);
        assert!(errors.get("d-20240108").is_some());
    }

    #[test]
    fn test_zero_is_only_a_choice_over_logged_hours() {
        let dates = weekday_dates(date(2024, 1, 8), date(2024, 1, 10));
        let submitted = fields(&[
            (date(2024, 1, 8), "8"),
            (date(2024, 1, 9), "0"),
            (date(2024, 1, 10), "8"),
        ]);

        let errors = parse_day_values(&dates, &submitted, &HashMap::new(), 8).unwrap_err();
        assert_eq!(
            errors.get("d-20240109").unwrap(),
            &["Select a valid choice. 0 is not one of the available choices."]
        );
        assert!(errors.get("d-20240108").is_none());

        let values = parse_day_values(&dates, &submitted, &logged(&[date(2024, 1, 9)], 4), 8).unwrap();
        assert_eq!(values[1], (date(2024, 1, 9), DayValue::Hours(0)));
    }

    #[test]
    fn test_plan_without_prior_hours() {
        let days = vec![
            (date(2024, 1, 8), DayValue::Hours(8)),
            (date(2024, 1, 9), DayValue::Birthday),
        ];
        let plan = plan_reconciliation(&days, &HashMap::new());
        assert!(plan.compensations.is_empty());
        assert_eq!(plan.total_hours, 8);
        assert_eq!(
            plan.allocations[1],
            DayAllocation {
                date: date(2024, 1, 9),
                hours: 0,
                birthday: true
            }
        );
    }

    #[test]
    fn test_plan_compensates_prior_hours_once() {
        let days = vec![
            (date(2024, 1, 8), DayValue::Hours(4)),
            (date(2024, 1, 9), DayValue::Hours(8)),
        ];
        let mut prior = HashMap::new();
        prior.insert(
            date(2024, 1, 8),
            PriorDay {
                net_hours: 8,
                details: "Ski trip".to_string(),
            },
        );
        prior.insert(
            date(2024, 1, 9),
            PriorDay {
                net_hours: 0,
                details: String::new(),
            },
        );

        let plan = plan_reconciliation(&days, &prior);
        assert_eq!(
            plan.compensations,
            vec![Compensation {
                date: date(2024, 1, 8),
                hours: -8,
                details: "Ski trip".to_string(),
            }]
        );
        assert_eq!(plan.total_hours, 12);

        // net recorded after applying equals what was submitted
        let net: i32 = 8 + plan.compensations[0].hours + plan.allocations[0].hours;
        assert_eq!(net, 4);
    }

    #[test]
    fn test_hours_days_defaults_and_help_text() {
        let dates = vec![date(2024, 1, 8), date(2024, 1, 9)];
        let mut prior = HashMap::new();
        prior.insert(
            date(2024, 1, 9),
            PriorDay {
                net_hours: 4,
                details: String::new(),
            },
        );
        let days = hours_days(&dates, &prior, 8);
        assert_eq!(days[0].value, 8);
        assert_eq!(days[0].help_text, "");
        assert_eq!(days[0].choices.len(), 3);
        assert_eq!(days[1].value, 4);
        assert_eq!(days[1].help_text, "Already logged 4 hours on this day");
        assert_eq!(days[1].choices.len(), 4);
        assert_eq!(days[0].full_day, "Monday, January 08, 2024");
    }

    #[test]
    fn test_estimated_days() {
        let dates = vec![date(2024, 1, 8), date(2024, 1, 9), date(2024, 1, 10)];
        let mut logged = HashMap::new();
        logged.insert(date(2024, 1, 9), 4);
        assert_eq!(estimated_days(&dates, &logged, 8), 2.5);
    }
}
