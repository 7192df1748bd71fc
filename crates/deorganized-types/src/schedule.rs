//! Recurring schedules shared by shows and events.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{EventStatus, RecurrenceType};
use crate::validation::FieldErrors;

const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Name of a day given as 0 = Monday .. 6 = Sunday.
pub fn day_name(day_of_week: u8) -> Option<&'static str> {
    DAY_NAMES.get(day_of_week as usize).copied()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub is_recurring: bool,
    pub recurrence_type: Option<RecurrenceType>,
    /// 0 = Monday .. 6 = Sunday, only meaningful for `SPECIFIC_DAY`.
    pub day_of_week: Option<u8>,
    pub scheduled_time: Option<NaiveTime>,
    /// ISO `YYYY-MM-DD` dates on which an occurrence was cancelled.
    #[serde(default)]
    pub cancelled_instances: Vec<String>,
}

/// One dated occurrence of a recurring schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub datetime: NaiveDateTime,
}

/// Wording for [`Schedule::display`]. Shows and events phrase a few
/// patterns differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayStyle {
    pub not_recurring: &'static str,
    pub weekdays: &'static str,
    pub weekends: &'static str,
    /// Recurring with a time, but no usable pattern.
    pub unknown: &'static str,
}

impl DisplayStyle {
    pub const SHOW: Self = Self {
        not_recurring: "No recurring schedule",
        weekdays: "Weekdays",
        weekends: "Weekends",
        unknown: "No recurring schedule",
    };

    pub const EVENT: Self = Self {
        not_recurring: "One-time event",
        weekdays: "Weekdays (Mon-Fri)",
        weekends: "Weekends (Sat-Sun)",
        unknown: "Custom schedule",
    };
}

impl Schedule {
    /// Whether an occurrence falls on `date`. Cancelled dates never air.
    pub fn should_air_on_date(&self, date: NaiveDate) -> bool {
        if !self.is_recurring {
            return false;
        }

        if self.is_cancelled(date) {
            return false;
        }

        let weekday = date.weekday().num_days_from_monday() as u8;
        match self.recurrence_type {
            Some(RecurrenceType::Daily) => true,
            Some(RecurrenceType::Weekdays) => weekday < 5,
            Some(RecurrenceType::Weekends) => weekday >= 5,
            Some(RecurrenceType::SpecificDay) => self.day_of_week == Some(weekday),
            None => false,
        }
    }

    pub fn is_cancelled(&self, date: NaiveDate) -> bool {
        let iso = date.format("%Y-%m-%d").to_string();
        self.cancelled_instances.iter().any(|d| *d == iso)
    }

    /// Record a cancelled occurrence. Returns false if it was already cancelled.
    pub fn cancel_instance(&mut self, date: NaiveDate) -> bool {
        if self.is_cancelled(date) {
            return false;
        }
        self.cancelled_instances.push(date.format("%Y-%m-%d").to_string());
        true
    }

    /// Occurrences in the `days`-long window starting at `from`.
    /// Empty when the schedule has no time of day.
    pub fn upcoming_instances(&self, from: NaiveDate, days: u32) -> Vec<Occurrence> {
        let Some(time) = self.scheduled_time else {
            return Vec::new();
        };

        (0..days as i64)
            .map(|offset| from + Duration::days(offset))
            .filter(|date| self.should_air_on_date(*date))
            .map(|date| Occurrence {
                date,
                time,
                datetime: date.and_time(time),
            })
            .collect()
    }

    /// Human readable description in the wording of `style`.
    pub fn display(&self, style: DisplayStyle) -> String {
        let time = match (self.is_recurring, self.scheduled_time) {
            (true, Some(time)) => time.format("%I:%M %p").to_string(),
            _ => return style.not_recurring.to_string(),
        };

        let pattern = match self.recurrence_type {
            Some(RecurrenceType::Daily) => "Daily".to_string(),
            Some(RecurrenceType::Weekdays) => style.weekdays.to_string(),
            Some(RecurrenceType::Weekends) => style.weekends.to_string(),
            Some(RecurrenceType::SpecificDay) => match self.day_of_week.and_then(day_name) {
                Some(day) => format!("Every {day}"),
                None => return style.unknown.to_string(),
            },
            None => return style.unknown.to_string(),
        };
        format!("{pattern} at {time}")
    }

    /// Field-level checks applied on create and update.
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();

        if let Some(day) = self.day_of_week {
            if day > 6 {
                errors.add("day_of_week", "Must be between 0 (Monday) and 6 (Sunday).");
            }
        }

        if self.is_recurring {
            match self.recurrence_type {
                None => errors.add("recurrence_type", "Recurring schedules must have a 'recurrence_type'."),
                Some(RecurrenceType::SpecificDay) if self.day_of_week.is_none() => errors.add(
                    "day_of_week",
                    "SPECIFIC_DAY recurrence requires 'day_of_week' to be set.",
                ),
                Some(_) => {}
            }
            if self.scheduled_time.is_none() {
                errors.add("scheduled_time", "Recurring schedules must have a 'scheduled_time'.");
            }
        }

        errors
    }
}

/// Where an event sits relative to `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventTiming {
    pub status: EventStatus,
    pub is_upcoming: bool,
    pub is_ongoing: bool,
    pub is_past: bool,
}

impl EventTiming {
    /// Recurring events without a fixed start are always upcoming.
    pub fn at(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        is_recurring: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let is_upcoming = match start {
            Some(start) => start > now,
            None => is_recurring,
        };
        let is_ongoing = match (start, end) {
            (Some(start), Some(end)) => start <= now && now <= end,
            _ => false,
        };
        let is_past = end.is_some_and(|end| end < now);

        let status = if is_recurring && start.is_none() {
            EventStatus::Upcoming
        } else if is_ongoing {
            EventStatus::Ongoing
        } else if is_upcoming {
            EventStatus::Upcoming
        } else {
            EventStatus::Past
        };

        Self {
            status,
            is_upcoming,
            is_ongoing,
            is_past,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn recurring(kind: RecurrenceType) -> Schedule {
        Schedule {
            is_recurring: true,
            recurrence_type: Some(kind),
            day_of_week: None,
            scheduled_time: NaiveTime::from_hms_opt(17, 0, 0),
            cancelled_instances: vec![],
        }
    }

    #[test]
    fn weekends_air_on_saturday_not_wednesday() {
        let schedule = recurring(RecurrenceType::Weekends);
        // 2024-06-15 is a Saturday, 2024-06-12 a Wednesday
        assert!(schedule.should_air_on_date(date("2024-06-15")));
        assert!(schedule.should_air_on_date(date("2024-06-16")));
        assert!(!schedule.should_air_on_date(date("2024-06-12")));
    }

    #[test]
    fn weekdays_cover_monday_through_friday() {
        let schedule = recurring(RecurrenceType::Weekdays);
        assert!(schedule.should_air_on_date(date("2024-06-10")));
        assert!(schedule.should_air_on_date(date("2024-06-14")));
        assert!(!schedule.should_air_on_date(date("2024-06-15")));
    }

    #[test]
    fn specific_day_matches_only_that_weekday() {
        let mut schedule = recurring(RecurrenceType::SpecificDay);
        schedule.day_of_week = Some(2);
        assert!(schedule.should_air_on_date(date("2024-06-12")));
        assert!(!schedule.should_air_on_date(date("2024-06-13")));
    }

    #[test]
    fn cancelled_dates_never_air() {
        for kind in RecurrenceType::ALL {
            let mut schedule = recurring(*kind);
            schedule.day_of_week = Some(5);
            schedule.cancelled_instances = vec!["2024-06-15".into()];
            assert!(!schedule.should_air_on_date(date("2024-06-15")), "{kind}");
        }
    }

    #[test]
    fn non_recurring_never_airs() {
        let mut schedule = recurring(RecurrenceType::Daily);
        schedule.is_recurring = false;
        assert!(!schedule.should_air_on_date(date("2024-06-15")));
    }

    #[test]
    fn cancel_instance_is_idempotent() {
        let mut schedule = recurring(RecurrenceType::Daily);
        assert!(schedule.cancel_instance(date("2024-06-15")));
        assert!(!schedule.cancel_instance(date("2024-06-15")));
        assert_eq!(schedule.cancelled_instances, vec!["2024-06-15".to_string()]);
    }

    #[test]
    fn upcoming_instances_skip_cancellations() {
        let mut schedule = recurring(RecurrenceType::Weekends);
        schedule.cancelled_instances = vec!["2024-06-16".into()];
        let instances = schedule.upcoming_instances(date("2024-06-10"), 14);
        let dates: Vec<String> = instances.iter().map(|o| o.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-06-15", "2024-06-22", "2024-06-23"]);
        assert_eq!(instances[0].datetime.to_string(), "2024-06-15 17:00:00");
    }

    #[test]
    fn display_formats_each_pattern() {
        assert_eq!(recurring(RecurrenceType::Daily).display(DisplayStyle::SHOW), "Daily at 05:00 PM");
        let mut weekly = recurring(RecurrenceType::SpecificDay);
        weekly.day_of_week = Some(0);
        assert_eq!(weekly.display(DisplayStyle::EVENT), "Every Monday at 05:00 PM");
        assert_eq!(Schedule::default().display(DisplayStyle::EVENT), "One-time event");
        assert_eq!(Schedule::default().display(DisplayStyle::SHOW), "No recurring schedule");
    }

    #[test]
    fn events_spell_out_weekday_ranges() {
        let weekdays = recurring(RecurrenceType::Weekdays);
        assert_eq!(weekdays.display(DisplayStyle::SHOW), "Weekdays at 05:00 PM");
        assert_eq!(weekdays.display(DisplayStyle::EVENT), "Weekdays (Mon-Fri) at 05:00 PM");

        let weekends = recurring(RecurrenceType::Weekends);
        assert_eq!(weekends.display(DisplayStyle::SHOW), "Weekends at 05:00 PM");
        assert_eq!(weekends.display(DisplayStyle::EVENT), "Weekends (Sat-Sun) at 05:00 PM");
    }

    #[test]
    fn recurring_without_a_pattern_uses_the_fallback() {
        let mut untyped = recurring(RecurrenceType::Daily);
        untyped.recurrence_type = None;
        assert_eq!(untyped.display(DisplayStyle::EVENT), "Custom schedule");
        assert_eq!(untyped.display(DisplayStyle::SHOW), "No recurring schedule");

        let no_day = recurring(RecurrenceType::SpecificDay);
        assert_eq!(no_day.display(DisplayStyle::EVENT), "Custom schedule");
    }

    #[test]
    fn validate_requires_type_time_and_day() {
        let schedule = Schedule {
            is_recurring: true,
            ..Schedule::default()
        };
        let errors = schedule.validate();
        assert!(errors.contains("recurrence_type"));
        assert!(errors.contains("scheduled_time"));

        let mut weekly = recurring(RecurrenceType::SpecificDay);
        assert!(weekly.validate().contains("day_of_week"));
        weekly.day_of_week = Some(9);
        assert!(weekly.validate().contains("day_of_week"));
        weekly.day_of_week = Some(3);
        assert!(weekly.validate().is_empty());
    }

    #[test]
    fn event_timing_tracks_the_window() {
        let now = "2024-06-15T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let hour = Duration::hours(1);

        let ongoing = EventTiming::at(Some(now - hour), Some(now + hour), false, now);
        assert_eq!(ongoing.status, EventStatus::Ongoing);
        assert!(ongoing.is_ongoing && !ongoing.is_past);

        let ahead = EventTiming::at(Some(now + hour), Some(now + hour * 2), false, now);
        assert_eq!(ahead.status, EventStatus::Upcoming);

        let done = EventTiming::at(Some(now - hour * 2), Some(now - hour), false, now);
        assert_eq!(done.status, EventStatus::Past);
        assert!(done.is_past);

        let weekly = EventTiming::at(None, None, true, now);
        assert_eq!(weekly.status, EventStatus::Upcoming);
        assert!(weekly.is_upcoming);
    }
}
