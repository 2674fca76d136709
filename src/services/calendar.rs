use std::collections::HashMap;

use anyhow::Result;
use chrono::NaiveDate;
use icalendar::{Calendar, Component, EventLike, Property, ValueType};
use serde::Serialize;

use crate::database::models::{EntryWithUser, Hours, User};
use crate::database::repositories::EntryRepository;
use crate::services::forms::LIST_DATE_FORMAT;
use crate::services::org_chart::OrgChart;

pub const COLORS: [&str; 15] = [
    "#EAA228", "#c5b47f", "#579575", "#839557", "#958c12", "#953579", "#4b5de4", "#d8b83f",
    "#ff5800", "#0085cc", "#c747a3", "#cddf54", "#FBD178", "#26B4E3", "#bd70c7",
];

pub const ME_COLOR: &str = "#3366CC";
pub const ME_LABEL: &str = "Me myself and I";
pub const HIDDEN_DETAILS: &str = "Log in to see the details";

/// How deep the viewer's minions reach on the calendar.
pub const CALENDAR_DEPTH: usize = 2;

/// Cut to `length` characters, the last three of which become `...`.
pub fn truncate_details(details: &str, length: usize) -> String {
    if details.chars().count() > length {
        let kept: String = details.chars().take(length.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        details.to_string()
    }
}

fn format_days(days: f64) -> String {
    if days.fract() == 0.0 {
        format!("{} days", days as i64)
    } else {
        format!("{:.1} days", days)
    }
}

/// Short label for an entry such as `Umpa Lumpa - 2.5 days, Skiing`.
pub fn make_entry_title(
    entry: &EntryWithUser,
    hours: &[Hours],
    viewer_id: i64,
    include_details: bool,
    work_day: i32,
) -> String {
    let mut days = 0.0;
    let mut birthday = false;
    for row in hours {
        if row.birthday {
            birthday = true;
        }
        if row.hours == work_day {
            days += 1.0;
        } else if row.hours > 0 {
            days += 0.5;
        }
    }
    let total_hours = entry.total_hours.unwrap_or(0);

    let mut title = String::new();
    if entry.user_id != viewer_id {
        title.push_str(&entry.display_name());
        title.push_str(" - ");
    }

    if days > 1.0 {
        title.push_str(&format_days(days));
        if birthday {
            title.push_str(" (includes birthday)");
        }
    } else if total_hours == 0 && birthday {
        title.push_str("Birthday!");
    } else if days == 1.0 && total_hours == work_day {
        title.push_str("1 day");
    } else {
        title.push_str(&format!("{} hours", total_hours));
    }

    if include_details && !entry.details.is_empty() {
        let limit = if days == 1.0 { 20 } else { 40 };
        title.push_str(", ");
        title.push_str(&truncate_details(&entry.details, limit));
    }

    title
}

/// Superusers, the owner and the owner's manager see an entry's details.
pub fn can_see_details(viewer: &User, owner_id: i64, chart: &OrgChart) -> bool {
    viewer.is_superuser || viewer.id == owner_id || chart.manager(owner_id) == Some(viewer.id)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CalendarEvent {
    pub id: i64,
    pub title: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub color: String,
    pub mine: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LegendItem {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct CalendarEvents {
    pub events: Vec<CalendarEvent>,
    pub colors: Vec<LegendItem>,
}

/// Palette colour per observed user, in observation order.
pub fn user_colors(observed: &[i64]) -> HashMap<i64, &'static str> {
    observed
        .iter()
        .enumerate()
        .map(|(index, &user)| (user, COLORS[index % COLORS.len()]))
        .collect()
}

/// Events of the viewer and everyone they observe overlapping `[start, end]`.
pub async fn calendar_events(
    entries: &EntryRepository,
    chart: &OrgChart,
    viewer: &User,
    start: NaiveDate,
    end: NaiveDate,
    work_day: i32,
) -> Result<CalendarEvents> {
    let observed = chart.observed_users(viewer.id, CALENDAR_DEPTH);
    let colors = user_colors(&observed);

    let mut user_ids = vec![viewer.id];
    user_ids.extend(observed.iter().copied());

    let found = entries.overlapping(&user_ids, start, end).await?;
    let ids: Vec<i64> = found.iter().map(|e| e.id).collect();
    let hours = entries.hours_for_entries(&ids).await?;

    let mut events = Vec::with_capacity(found.len());
    let mut legend_names: HashMap<i64, String> = HashMap::new();
    for entry in &found {
        let mine = entry.user_id == viewer.id;
        let color = if mine {
            ME_COLOR
        } else {
            colors.get(&entry.user_id).copied().unwrap_or(COLORS[0])
        };
        let include_details = can_see_details(viewer, entry.user_id, chart);
        let rows = hours.get(&entry.id).map(Vec::as_slice).unwrap_or(&[]);

        events.push(CalendarEvent {
            id: entry.id,
            title: make_entry_title(entry, rows, viewer.id, include_details, work_day),
            start: entry.start_date,
            end: entry.end_date,
            color: color.to_string(),
            mine,
        });
        legend_names
            .entry(entry.user_id)
            .or_insert_with(|| entry.display_name());
    }

    let mut legend = Vec::new();
    if legend_names.contains_key(&viewer.id) {
        legend.push(LegendItem {
            name: ME_LABEL.to_string(),
            color: ME_COLOR.to_string(),
        });
    }
    for user in &observed {
        if let Some(name) = legend_names.get(user) {
            legend.push(LegendItem {
                name: name.clone(),
                color: colors[user].to_string(),
            });
        }
    }

    Ok(CalendarEvents {
        events,
        colors: legend,
    })
}

/// Link to the list view narrowed to one entry.
pub fn entry_list_url(base_url: &str, entry: &EntryWithUser) -> String {
    format!(
        "{}/dates/list?name={}&date_from={}&date_to={}",
        base_url,
        urlencoding::encode(&entry.email),
        urlencoding::encode(&entry.start_date.format(LIST_DATE_FORMAT).to_string()),
        urlencoding::encode(&entry.end_date.format(LIST_DATE_FORMAT).to_string()),
    )
}

fn date_property(name: &str, date: NaiveDate) -> Property {
    let mut prop = Property::new(name, date.format("%Y%m%d").to_string());
    prop.append_parameter(ValueType::Date);
    prop
}

fn new_calendar(name: &str) -> Calendar {
    let mut cal = Calendar::new();
    cal.append_property(Property::new("X-WR-CALNAME", name));
    cal
}

/// Feed for the key owner: their and their observed users' entries that
/// have not ended before `today`.
pub async fn render_ics(
    entries: &EntryRepository,
    chart: &OrgChart,
    owner: &User,
    today: NaiveDate,
    calendar_name: &str,
    base_url: &str,
    work_day: i32,
) -> Result<String> {
    let mut user_ids = vec![owner.id];
    user_ids.extend(chart.observed_users(owner.id, CALENDAR_DEPTH));

    let found = entries.ending_on_or_after(&user_ids, today).await?;
    let ids: Vec<i64> = found.iter().map(|e| e.id).collect();
    let hours = entries.hours_for_entries(&ids).await?;

    let mut cal = new_calendar(calendar_name);
    for entry in &found {
        let rows = hours.get(&entry.id).map(Vec::as_slice).unwrap_or(&[]);
        let title = make_entry_title(entry, rows, owner.id, false, work_day);
        let description = if can_see_details(owner, entry.user_id, chart) {
            entry.details.clone()
        } else {
            HIDDEN_DETAILS.to_string()
        };

        let mut ics_event = icalendar::Event::new();
        ics_event.uid(&format!("pto-entry-{}", entry.id));
        ics_event.summary(&format!("{} Vacation", title));
        ics_event.description(&description);
        ics_event.append_property(date_property("DTSTART", entry.start_date));
        ics_event.append_property(date_property("DTEND", entry.end_date));
        ics_event.add_property("URL", entry_list_url(base_url, entry));
        cal.push(ics_event.done());
    }

    Ok(cal.done().to_string())
}

/// What an unknown or deleted key gets instead of a 404.
pub fn render_expired_ics(calendar_name: &str, base_url: &str, today: NaiveDate) -> String {
    let mut cal = new_calendar(calendar_name);

    let mut ics_event = icalendar::Event::new();
    ics_event.uid("pto-calendar-expired");
    ics_event.summary("Calendar expired");
    ics_event.description(
        "The calendar you used has expired and is no longer associated with any user",
    );
    ics_event.append_property(date_property("DTSTART", today));
    ics_event.append_property(date_property("DTEND", today));
    ics_event.add_property("URL", format!("{}/", base_url));
    cal.push(ics_event.done());

    cal.done().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(user_id: i64, total_hours: i32, details: &str) -> EntryWithUser {
        EntryWithUser {
            id: 10,
            user_id,
            total_hours: Some(total_hours),
            start_date: date(2011, 7, 14),
            end_date: date(2011, 7, 19),
            details: details.to_string(),
            add_date: Utc::now(),
            modify_date: Utc::now(),
            username: "umpa".to_string(),
            email: "umpa@mozilla.com".to_string(),
            first_name: "Umpa".to_string(),
            last_name: "Lumpa".to_string(),
        }
    }

    fn rows(values: &[i32]) -> Vec<Hours> {
        values
            .iter()
            .enumerate()
            .map(|(i, &hours)| Hours {
                id: i as i64,
                entry_id: 10,
                hours,
                date: date(2011, 7, 14 + i as u32),
                birthday: false,
            })
            .collect()
    }

    #[test]
    fn test_title_counts_half_days() {
        let title = make_entry_title(&entry(1, 20, ""), &rows(&[8, 4, 8]), 1, true, 8);
        assert_eq!(title, "2.5 days");
    }

    #[test]
    fn test_title_single_day_and_hours() {
        assert_eq!(make_entry_title(&entry(1, 8, ""), &rows(&[8]), 1, true, 8), "1 day");
        assert_eq!(make_entry_title(&entry(1, 4, ""), &rows(&[4]), 1, true, 8), "4 hours");
        assert_eq!(make_entry_title(&entry(1, 16, ""), &[], 1, true, 8), "16 hours");
    }

    #[test]
    fn test_title_prefixes_other_people() {
        let title = make_entry_title(&entry(2, 48, "Short"), &rows(&[8; 6]), 1, true, 8);
        assert_eq!(title, "Umpa Lumpa - 6 days, Short");

        let mut nameless = entry(2, 48, "");
        nameless.first_name.clear();
        nameless.last_name.clear();
        assert_eq!(make_entry_title(&nameless, &rows(&[8; 6]), 1, true, 8), "umpa - 6 days");
    }

    #[test]
    fn test_title_truncates_details() {
        let long = "This time it's going to be a really long one to test";
        let title = make_entry_title(&entry(2, 48, long), &rows(&[8; 6]), 1, true, 8);
        assert!(title.starts_with("Umpa Lumpa - 6 days, This time"));
        assert!(title.ends_with("..."));
        assert_eq!(truncate_details(long, 40).chars().count(), 40);

        let hidden = make_entry_title(&entry(2, 48, long), &rows(&[8; 6]), 1, false, 8);
        assert_eq!(hidden, "Umpa Lumpa - 6 days");
    }

    #[test]
    fn test_title_birthdays() {
        let mut with_birthday = rows(&[8; 3]);
        with_birthday.push(Hours {
            id: 99,
            entry_id: 10,
            hours: 0,
            date: date(2011, 7, 19),
            birthday: true,
        });
        let title = make_entry_title(&entry(1, 24, ""), &with_birthday, 1, true, 8);
        assert_eq!(title, "3 days (includes birthday)");

        let only_birthday = vec![Hours {
            id: 1,
            entry_id: 10,
            hours: 0,
            date: date(2011, 7, 14),
            birthday: true,
        }];
        assert_eq!(
            make_entry_title(&entry(1, 0, ""), &only_birthday, 1, true, 8),
            "Birthday!"
        );
    }

    #[test]
    fn test_user_colors_cycle() {
        let observed: Vec<i64> = (1..=16).collect();
        let colors = user_colors(&observed);
        assert_eq!(colors[&1], COLORS[0]);
        assert_eq!(colors[&15], COLORS[14]);
        assert_eq!(colors[&16], COLORS[0]);
    }

    #[test]
    fn test_entry_list_url() {
        let url = entry_list_url("http://pto.example", &entry(2, 8, ""));
        assert_eq!(
            url,
            "http://pto.example/dates/list?name=umpa%40mozilla.com&date_from=14%20July%202011&date_to=19%20July%202011"
        );
    }

    #[test]
    fn test_expired_calendar() {
        let ics = render_expired_ics("Vacation", "http://pto.example", date(2024, 1, 8));
        assert!(ics.starts_with("BEGIN:VCALENDAR"));
        assert!(ics.trim_end().ends_with("END:VCALENDAR"));
        assert!(ics.contains("SUMMARY:Calendar expired"));
        assert!(ics.contains("DTSTART;VALUE=DATE:20240108"));
    }
}
