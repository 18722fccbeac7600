use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use icalendar::{Calendar, CalendarDateTime, Component, Event, EventLike};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::ScheduledClass;
use crate::presentation::weekday_from_name;

static HOUR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(\d{1,2})(?:[:.](\d{2}))?\s*(am|pm|a\.m\.|p\.m\.)?")
        .expect("regex compiles")
});

static MINUTES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("regex compiles"));

const DEFAULT_DURATION_MIN: i64 = 60;

/// Reads the start time out of display strings such as `08:00`, `8.30`,
/// `18:00 hs` or `7:15 pm`.
pub fn parse_hour(hour: &str) -> Option<NaiveTime> {
    let caps = HOUR_RE.captures(hour)?;
    let mut h: u32 = caps.get(1)?.as_str().parse().ok()?;
    let m: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    if let Some(meridiem) = caps.get(3) {
        let pm = meridiem.as_str().to_lowercase().starts_with('p');
        if h == 0 || h > 12 {
            return None;
        }
        h = match (pm, h) {
            (false, 12) => 0,
            (true, 12) => 12,
            (true, h) => h + 12,
            (false, h) => h,
        };
    }
    NaiveTime::from_hms_opt(h, m, 0)
}

fn duration_minutes(class: &ScheduledClass) -> i64 {
    class
        .duration
        .as_deref()
        .and_then(|d| MINUTES_RE.find(d))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .filter(|m| *m > 0)
        .unwrap_or(DEFAULT_DURATION_MIN)
}

/// First date on or after `today` falling on the class's weekday, combined
/// with its start time.
pub fn next_occurrence(class: &ScheduledClass, today: NaiveDate) -> Option<NaiveDateTime> {
    let weekday = weekday_from_name(&class.day)?;
    let time = parse_hour(&class.hour)?;
    let offset = (7 + weekday.num_days_from_monday() - today.weekday().num_days_from_monday()) % 7;
    let date = today + Duration::days(i64::from(offset));
    Some(NaiveDateTime::new(date, time))
}

#[derive(Clone)]
pub struct ICalExporter {
    studio_name: String,
    timezone: Tz,
}

impl ICalExporter {
    pub fn new(studio_name: impl Into<String>, timezone: Tz) -> Self {
        Self {
            studio_name: studio_name.into(),
            timezone,
        }
    }

    pub fn generate(&self, classes: &[ScheduledClass], today: NaiveDate) -> Vec<u8> {
        if classes.is_empty() {
            return Vec::new();
        }

        let mut calendar = Calendar::new();
        calendar.name(&format!("{} - My classes", self.studio_name));
        calendar.timezone(self.timezone.name());

        for class in classes {
            let Some(start) = next_occurrence(class, today) else {
                tracing::debug!(
                    class_id = %class.id,
                    day = %class.day,
                    hour = %class.hour,
                    "skipping class without a parseable slot"
                );
                continue;
            };
            let end = start + Duration::minutes(duration_minutes(class));

            let mut event = Event::new();
            event.summary(&format!("{}: {}", self.studio_name, class.title));
            event.starts(CalendarDateTime::WithTimezone {
                date_time: start,
                tzid: self.timezone.name().to_string(),
            });
            event.ends(CalendarDateTime::WithTimezone {
                date_time: end,
                tzid: self.timezone.name().to_string(),
            });
            event.add_property("RRULE", "FREQ=WEEKLY");
            event.location(&self.studio_name);
            event.description(&format!(
                "{} class\nTeacher: {}",
                class.class_type, class.teacher
            ));
            event.uid(&format!("{}-studio-booking", class.id));
            calendar.push(event);
        }

        calendar.to_string().into_bytes()
    }
}
