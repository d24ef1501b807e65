//! Clock-time parsing for the strings the schedule grid renders
//!
//! The grid mixes spellings: "5:00 PM" on Reserve buttons, "4:00 p.m. - 5:00 p.m."
//! inside booked cells, and whatever the user typed on the command line.

use std::sync::LazyLock;

use chrono::{NaiveTime, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize};

static CLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2}):(\d{2})\s*(a\.?\s?m\.?|p\.?\s?m\.?)?").expect("static regex")
});

static RANGE_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*(?:-|–|—|\bto\b)\s*").expect("static regex"));

/// Parse the first clock time found in `text`
///
/// Accepts 12-hour times with `AM`/`PM` in any of the spellings the site uses
/// (`5:00 PM`, `5:00PM`, `5:00 p.m.`) and plain 24-hour times (`17:00`).
/// Text around the time is ignored, so `"Reserve 5:00 PM"` parses as 17:00.
pub fn parse_clock(text: &str) -> Option<NaiveTime> {
    let caps = CLOCK_RE.captures(text)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;

    let hour = match caps.get(3).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(meridiem) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            let pm = meridiem.starts_with('p');
            match (hour, pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, true) => h + 12,
                (h, false) => h,
            }
        }
        None => hour,
    };

    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Parse a range such as `"4:00 p.m. - 5:00 p.m."`
///
/// A meridiem given only on the end (`"4:00 - 5:00 PM"`) is applied to the start
/// too when that keeps the range ordered.
pub fn parse_range(text: &str) -> Option<(NaiveTime, NaiveTime)> {
    let text = text.trim();
    let mut parts = RANGE_SPLIT_RE
        .split(text)
        .filter(|part| CLOCK_RE.is_match(part));
    let start_text = parts.next()?;
    let end_text = parts.next()?;

    let mut end = parse_clock(end_text)?;
    let mut start = parse_clock(start_text)?;
    if end == NaiveTime::MIN && start > end {
        end = END_OF_DAY;
    }

    let start_has_meridiem = CLOCK_RE
        .captures(start_text)
        .and_then(|c| c.get(3))
        .is_some();
    if !start_has_meridiem && end.hour() >= 12 && start.hour() < 12 {
        let shifted = start + chrono::Duration::hours(12);
        if shifted < end {
            start = shifted;
        }
    }

    (start < end).then_some((start, end))
}

/// Last representable instant of the day; slots running to midnight end here
pub const END_OF_DAY: NaiveTime = match NaiveTime::from_hms_opt(23, 59, 59) {
    Some(t) => t,
    None => NaiveTime::MIN,
};

/// Minutes between two times on the same day, rounded up
///
/// Rounding up makes a slot clamped to `END_OF_DAY` count its full length.
pub fn minutes_between(start: NaiveTime, end: NaiveTime) -> i64 {
    ((end - start).num_seconds() + 59).div_euclid(60)
}

/// `start + minutes`, clamped to `END_OF_DAY` instead of wrapping past midnight
pub fn add_minutes(start: NaiveTime, minutes: u32) -> NaiveTime {
    let (end, wrapped) = start.overflowing_add_signed(chrono::Duration::minutes(i64::from(minutes)));
    if wrapped != 0 || end < start { END_OF_DAY } else { end }
}

/// Human spellings of a time, lower-case, as they may appear in page text
pub fn format_variants(time: NaiveTime) -> Vec<String> {
    let hour12 = match time.hour() % 12 {
        0 => 12,
        h => h,
    };
    let (short, dotted) = if time.hour() < 12 {
        ("am", "a.m.")
    } else {
        ("pm", "p.m.")
    };
    let minute = time.minute();

    let mut variants = vec![
        format!("{hour12}:{minute:02} {short}"),
        format!("{hour12}:{minute:02}{short}"),
        format!("{hour12}:{minute:02} {dotted}"),
    ];
    if minute == 0 {
        variants.push(format!("{hour12} {short}"));
    }
    variants
}

/// Display a time the way the site does, e.g. `5:00 PM`
pub fn display(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

/// Half-open window of the day, `start <= t < end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn from_hm(start: (u32, u32), end: (u32, u32)) -> Self {
        Self {
            start: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap_or(NaiveTime::MIN),
        }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn parses_site_spellings() {
        assert_eq!(parse_clock("5:00 PM"), Some(t(17, 0)));
        assert_eq!(parse_clock("5:00PM"), Some(t(17, 0)));
        assert_eq!(parse_clock("5:00 p.m."), Some(t(17, 0)));
        assert_eq!(parse_clock("  10:30   am "), Some(t(10, 30)));
        assert_eq!(parse_clock("17:45"), Some(t(17, 45)));
    }

    #[test]
    fn noon_and_midnight() {
        assert_eq!(parse_clock("12:00 PM"), Some(t(12, 0)));
        assert_eq!(parse_clock("12:30 a.m."), Some(t(0, 30)));
    }

    #[test]
    fn tolerates_surrounding_text() {
        assert_eq!(parse_clock("Reserve 6:30 PM"), Some(t(18, 30)));
        assert_eq!(parse_clock("Reserve\n7:00 a.m."), Some(t(7, 0)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_clock("Reserve"), None);
        assert_eq!(parse_clock(""), None);
        assert_eq!(parse_clock("13:00 PM"), None);
        assert_eq!(parse_clock("25:00"), None);
    }

    #[test]
    fn parses_ranges() {
        assert_eq!(
            parse_range("4:00 p.m. - 5:00 p.m."),
            Some((t(16, 0), t(17, 0)))
        );
        assert_eq!(parse_range("11:30 AM – 12:15 PM"), Some((t(11, 30), t(12, 15))));
        assert_eq!(parse_range("6:00 PM to 7:30 PM"), Some((t(18, 0), t(19, 30))));
    }

    #[test]
    fn range_borrows_end_meridiem() {
        assert_eq!(parse_range("4:00 - 5:00 PM"), Some((t(16, 0), t(17, 0))));
        assert_eq!(parse_range("11:00 - 12:30 PM"), Some((t(11, 0), t(12, 30))));
    }

    #[test]
    fn range_rejects_single_or_reversed_times() {
        assert_eq!(parse_range("5:00 PM"), None);
        assert_eq!(parse_range("5:00 PM - 4:00 PM"), None);
    }

    #[test]
    fn variants_cover_verification_spellings() {
        let v = format_variants(t(17, 0));
        assert!(v.contains(&"5:00 pm".to_string()));
        assert!(v.contains(&"5:00pm".to_string()));
        assert!(v.contains(&"5:00 p.m.".to_string()));
        assert!(v.contains(&"5 pm".to_string()));

        let half = format_variants(t(0, 30));
        assert!(half.contains(&"12:30 am".to_string()));
        assert_eq!(half.len(), 3);
    }

    #[test]
    fn display_matches_site_format() {
        assert_eq!(display(t(17, 0)), "5:00 PM");
        assert_eq!(display(t(9, 5)), "9:05 AM");
    }

    #[test]
    fn window_is_half_open() {
        let w = TimeWindow::from_hm((16, 30), (21, 0));
        assert!(w.contains(t(16, 30)));
        assert!(w.contains(t(20, 59)));
        assert!(!w.contains(t(21, 0)));
        assert!(!w.contains(t(16, 0)));
    }

    #[test]
    fn minutes_between_same_day() {
        assert_eq!(minutes_between(t(17, 0), t(18, 15)), 75);
        assert_eq!(minutes_between(t(18, 0), t(17, 0)), -60);
    }

    #[test]
    fn late_slots_stop_at_end_of_day() {
        assert_eq!(add_minutes(t(17, 0), 30), t(17, 30));
        assert_eq!(add_minutes(t(23, 30), 30), END_OF_DAY);
        assert_eq!(add_minutes(t(23, 45), 45), END_OF_DAY);
        assert_eq!(minutes_between(t(23, 30), END_OF_DAY), 30);
    }

    #[test]
    fn range_ending_at_midnight() {
        assert_eq!(parse_range("11:00 PM - 12:00 AM"), Some((t(23, 0), END_OF_DAY)));
    }
}
