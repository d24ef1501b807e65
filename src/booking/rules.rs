//! Reservation type, duration and request validation

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::PeakWindows;
use crate::schedule::time;
use crate::utils::{BookingError, BookingResult};

/// Value picked in the modal's reservation type dropdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ReservationType {
    Singles,
    SoloPractice,
}

impl ReservationType {
    pub fn display_name(&self) -> &'static str {
        match self {
            ReservationType::Singles => "Singles",
            ReservationType::SoloPractice => "Solo Practice",
        }
    }

    /// Lower-case text matched against dropdown options
    pub fn needle(&self) -> &'static str {
        match self {
            ReservationType::Singles => "singles",
            ReservationType::SoloPractice => "solo practice",
        }
    }

    pub fn requires_guest(&self) -> bool {
        matches!(self, ReservationType::Singles)
    }

    /// An explicit choice wins; otherwise Singles inside the day's peak window
    /// and Solo Practice outside it
    pub fn resolve(
        explicit: Option<ReservationType>,
        date: NaiveDate,
        time: NaiveTime,
        peak: &PeakWindows,
    ) -> Self {
        if let Some(kind) = explicit {
            return kind;
        }

        let window = match date.weekday() {
            Weekday::Sat | Weekday::Sun => &peak.weekend,
            _ => &peak.weekday,
        };

        if window.contains(time) {
            ReservationType::Singles
        } else {
            ReservationType::SoloPractice
        }
    }
}

impl std::fmt::Display for ReservationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Lengths offered by the modal's duration dropdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingDuration {
    ThirtyMinutes,
    FortyFiveMinutes,
    OneHour,
}

impl BookingDuration {
    /// Largest offered duration that fits in `minutes`, never shorter than 30
    pub fn from_minutes(minutes: u32) -> Self {
        match minutes {
            60..=u32::MAX => BookingDuration::OneHour,
            45..=59 => BookingDuration::FortyFiveMinutes,
            _ => BookingDuration::ThirtyMinutes,
        }
    }

    pub fn minutes(&self) -> u32 {
        match self {
            BookingDuration::ThirtyMinutes => 30,
            BookingDuration::FortyFiveMinutes => 45,
            BookingDuration::OneHour => 60,
        }
    }

    /// Lower-case option texts to look for, most specific first
    pub fn option_needles(&self) -> &'static [&'static str] {
        match self {
            BookingDuration::ThirtyMinutes => &["30 minutes", "30 min", "0:30", "30"],
            BookingDuration::FortyFiveMinutes => &["45 minutes", "45 min", "0:45", "45"],
            BookingDuration::OneHour => &["1 hour", "60 minutes", "60 min", "1:00", "hour"],
        }
    }
}

impl std::fmt::Display for BookingDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingDuration::OneHour => write!(f, "1 hour"),
            other => write!(f, "{} minutes", other.minutes()),
        }
    }
}

/// Everything needed to book one slot
#[derive(Debug, Clone, Serialize)]
pub struct BookingRequest {
    pub date: NaiveDate,
    /// Day offset from today, used by the Next-button fallback
    pub days_ahead: u32,
    pub time: NaiveTime,
    /// Preferred length; the booked length is capped by what is free
    pub duration_minutes: u32,
    pub guest_player: Option<String>,
    pub reservation_type: ReservationType,
    pub singles_only: bool,
    pub dry_run: bool,
}

impl BookingRequest {
    /// Check the request is bookable as typed
    ///
    /// Singles needs a second player. Solo Practice has no player field, so any
    /// guest is dropped.
    pub fn validate(mut self) -> BookingResult<Self> {
        if self.duration_minutes < 30 {
            return Err(BookingError::Config(format!(
                "Duration of {} minutes is shorter than the 30 minute minimum",
                self.duration_minutes
            )));
        }

        match self.reservation_type {
            ReservationType::Singles if self.guest().is_none() => Err(BookingError::Config(
                "Singles reservations need a guest player (--player or ESC_ADDITIONAL_PLAYER)"
                    .to_string(),
            )),
            ReservationType::SoloPractice if self.guest_player.is_some() => {
                warn!(
                    "Ignoring guest player {:?} for a Solo Practice reservation",
                    self.guest_player.as_deref().unwrap_or_default()
                );
                self.guest_player = None;
                Ok(self)
            }
            _ => Ok(self),
        }
    }

    /// Guest player name, if one is set and not blank
    pub fn guest(&self) -> Option<&str> {
        self.guest_player
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Duration to select once the free minutes at the chosen court are known
    pub fn duration_for(&self, available_minutes: u32) -> BookingDuration {
        BookingDuration::from_minutes(self.duration_minutes.min(available_minutes))
    }

    pub fn time_display(&self) -> String {
        time::display(self.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::tests::t;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn request(kind: ReservationType, guest: Option<&str>) -> BookingRequest {
        BookingRequest {
            date: d(2026, 11, 2),
            days_ahead: 14,
            time: t(17, 0),
            duration_minutes: 45,
            guest_player: guest.map(str::to_string),
            reservation_type: kind,
            singles_only: true,
            dry_run: false,
        }
    }

    #[test]
    fn peak_windows_pick_singles() {
        let peak = PeakWindows::default();
        // 2026-11-02 is a Monday, 2026-11-07 a Saturday
        let monday = d(2026, 11, 2);
        let saturday = d(2026, 11, 7);

        assert_eq!(
            ReservationType::resolve(None, monday, t(17, 0), &peak),
            ReservationType::Singles
        );
        assert_eq!(
            ReservationType::resolve(None, monday, t(12, 0), &peak),
            ReservationType::SoloPractice
        );
        assert_eq!(
            ReservationType::resolve(None, saturday, t(12, 0), &peak),
            ReservationType::Singles
        );
        assert_eq!(
            ReservationType::resolve(None, saturday, t(17, 0), &peak),
            ReservationType::SoloPractice
        );
    }

    #[test]
    fn explicit_type_wins() {
        let peak = PeakWindows::default();
        assert_eq!(
            ReservationType::resolve(
                Some(ReservationType::SoloPractice),
                d(2026, 11, 2),
                t(17, 0),
                &peak
            ),
            ReservationType::SoloPractice
        );
    }

    #[test]
    fn duration_rounds_down_to_offered_lengths() {
        assert_eq!(BookingDuration::from_minutes(90), BookingDuration::OneHour);
        assert_eq!(BookingDuration::from_minutes(60), BookingDuration::OneHour);
        assert_eq!(BookingDuration::from_minutes(59), BookingDuration::FortyFiveMinutes);
        assert_eq!(BookingDuration::from_minutes(45), BookingDuration::FortyFiveMinutes);
        assert_eq!(BookingDuration::from_minutes(44), BookingDuration::ThirtyMinutes);
        assert_eq!(BookingDuration::from_minutes(10), BookingDuration::ThirtyMinutes);
    }

    #[test]
    fn duration_is_capped_by_availability() {
        let req = request(ReservationType::Singles, Some("Jamie"));
        assert_eq!(req.duration_for(30), BookingDuration::ThirtyMinutes);
        assert_eq!(req.duration_for(120), BookingDuration::FortyFiveMinutes);
    }

    #[test]
    fn needles_start_with_the_most_specific_text() {
        assert_eq!(BookingDuration::OneHour.option_needles()[0], "1 hour");
        assert_eq!(BookingDuration::FortyFiveMinutes.option_needles()[0], "45 minutes");
        assert_eq!(BookingDuration::OneHour.to_string(), "1 hour");
        assert_eq!(BookingDuration::ThirtyMinutes.to_string(), "30 minutes");
    }

    #[test]
    fn singles_requires_a_guest() {
        assert!(request(ReservationType::Singles, None).validate().is_err());
        assert!(request(ReservationType::Singles, Some("  ")).validate().is_err());
        let ok = request(ReservationType::Singles, Some("Jamie Rivera")).validate().unwrap();
        assert_eq!(ok.guest(), Some("Jamie Rivera"));
    }

    #[test]
    fn solo_practice_drops_the_guest() {
        let req = request(ReservationType::SoloPractice, Some("Jamie Rivera"))
            .validate()
            .unwrap();
        assert!(req.guest_player.is_none());
    }

    #[test]
    fn too_short_duration_is_rejected() {
        let mut req = request(ReservationType::SoloPractice, None);
        req.duration_minutes = 15;
        assert!(req.validate().is_err());
    }
}
