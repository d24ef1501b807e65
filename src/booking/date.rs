use chrono::NaiveDate;

use crate::utils::{BookingError, BookingResult};

/// Day to book, as given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetDate {
    DaysAhead(u32),
    On(NaiveDate),
}

impl TargetDate {
    /// Accepts `today`, `tomorrow`, a day offset such as `14`, or `YYYY-MM-DD`
    pub fn parse(text: &str) -> BookingResult<Self> {
        let text = text.trim();
        match text.to_ascii_lowercase().as_str() {
            "today" => return Ok(TargetDate::DaysAhead(0)),
            "tomorrow" => return Ok(TargetDate::DaysAhead(1)),
            _ => {}
        }

        if let Ok(days) = text.parse::<u32>() {
            return Ok(TargetDate::DaysAhead(days));
        }

        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(TargetDate::On)
            .map_err(|_| {
                BookingError::Config(format!(
                    "Unrecognised date '{text}': use today, tomorrow, a number of days or YYYY-MM-DD"
                ))
            })
    }

    pub fn resolve(&self, today: NaiveDate) -> NaiveDate {
        match *self {
            TargetDate::DaysAhead(days) => today + chrono::Days::new(u64::from(days)),
            TargetDate::On(date) => date,
        }
    }

    /// Number of "next day" steps from `today`; dates in the past are rejected
    pub fn days_from(&self, today: NaiveDate) -> BookingResult<u32> {
        let date = self.resolve(today);
        let days = (date - today).num_days();
        u32::try_from(days)
            .map_err(|_| BookingError::Config(format!("{date} is in the past (today is {today})")))
    }
}

impl std::fmt::Display for TargetDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetDate::DaysAhead(0) => write!(f, "today"),
            TargetDate::DaysAhead(1) => write!(f, "tomorrow"),
            TargetDate::DaysAhead(days) => write!(f, "{days} days ahead"),
            TargetDate::On(date) => write!(f, "{date}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn parses_keywords_offsets_and_dates() {
        assert_eq!(TargetDate::parse("today").unwrap(), TargetDate::DaysAhead(0));
        assert_eq!(TargetDate::parse(" Tomorrow ").unwrap(), TargetDate::DaysAhead(1));
        assert_eq!(TargetDate::parse("14").unwrap(), TargetDate::DaysAhead(14));
        assert_eq!(
            TargetDate::parse("2026-11-02").unwrap(),
            TargetDate::On(d(2026, 11, 2))
        );
    }

    #[test]
    fn rejects_unknown_input() {
        assert!(TargetDate::parse("next friday").is_err());
        assert!(TargetDate::parse("-3").is_err());
        assert!(TargetDate::parse("2026-13-01").is_err());
    }

    #[test]
    fn resolves_across_month_end() {
        let today = d(2026, 10, 25);
        assert_eq!(TargetDate::DaysAhead(14).resolve(today), d(2026, 11, 8));
        assert_eq!(TargetDate::DaysAhead(14).days_from(today).unwrap(), 14);
    }

    #[test]
    fn explicit_dates_count_days_and_reject_past() {
        let today = d(2026, 10, 19);
        assert_eq!(TargetDate::On(d(2026, 10, 22)).days_from(today).unwrap(), 3);
        assert_eq!(TargetDate::On(today).days_from(today).unwrap(), 0);
        assert!(TargetDate::On(d(2026, 10, 18)).days_from(today).is_err());
    }
}
