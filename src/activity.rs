use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::theme::Rgb;

pub const CALENDAR_DAYS: i64 = 90;

pub const LEVEL_COLORS: [Rgb; 5] = [
    Rgb::new(0xeb, 0xed, 0xf0),
    Rgb::new(0x9b, 0xe9, 0xa8),
    Rgb::new(0x40, 0xc4, 0x63),
    Rgb::new(0x30, 0xa1, 0x4e),
    Rgb::new(0x21, 0x6e, 0x39),
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyActivity {
    pub date: String,
    pub count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DayCell {
    pub date: NaiveDate,
    pub count: u32,
    pub level: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Week {
    /// Sunday-first; leading days before the window are `None`.
    pub days: Vec<Option<DayCell>>,
    pub month_label: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivityCalendar {
    pub weeks: Vec<Week>,
    pub max_count: u32,
    pub total: u32,
}

/// Intensity bucket 0..=4 relative to the busiest day.
pub fn level(count: u32, max_count: u32) -> usize {
    if count == 0 {
        return 0;
    }
    let intensity = f64::from(count) / f64::from(max_count.max(1));
    if intensity < 0.25 {
        1
    } else if intensity < 0.5 {
        2
    } else if intensity < 0.75 {
        3
    } else {
        4
    }
}

/// Lay out the 90 days ending at `today` into Sunday-first weeks.
///
/// Entries with unparseable dates are ignored; the scale uses every entry.
pub fn build_calendar(activity: &[DailyActivity], today: NaiveDate) -> ActivityCalendar {
    let counts = activity
        .iter()
        .filter_map(|entry| {
            NaiveDate::parse_from_str(&entry.date, "%Y-%m-%d")
                .ok()
                .map(|date| (date, entry.count))
        })
        .fold(HashMap::new(), |mut counts: HashMap<NaiveDate, u32>, (date, count)| {
            *counts.entry(date).or_default() += count;
            counts
        });
    let max_count = counts.values().copied().max().unwrap_or_default().max(1);

    let start = today - Duration::days(CALENDAR_DAYS - 1);
    let padding = start.weekday().num_days_from_sunday() as usize;

    let mut weeks = Vec::new();
    let mut current: Vec<Option<DayCell>> = vec![None; padding];
    let mut total = 0;

    for offset in 0..CALENDAR_DAYS {
        let date = start + Duration::days(offset);
        let count = counts.get(&date).copied().unwrap_or_default();
        total += count;
        current.push(Some(DayCell {
            date,
            count,
            level: level(count, max_count),
        }));

        if date.weekday().num_days_from_sunday() == 6 || offset == CALENDAR_DAYS - 1 {
            let month_label = current
                .iter()
                .flatten()
                .next()
                .filter(|first| first.date.day() <= 7)
                .map(|first| first.date.format("%b").to_string());
            weeks.push(Week {
                days: std::mem::take(&mut current),
                month_label,
            });
        }
    }

    ActivityCalendar {
        weeks,
        max_count,
        total,
    }
}
