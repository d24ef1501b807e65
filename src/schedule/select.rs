//! Picking the court with the longest free run at a target time

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Court, CourtKind, Schedule, SlotStatus, time};

/// The court chosen for a booking and the Reserve button to click
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourtChoice {
    pub court_name: String,
    pub column_index: usize,
    /// Contiguous free minutes starting at the target time
    pub available_minutes: u32,
    /// Id of the Reserve button whose slot contains the target time
    pub slot_id: u32,
}

struct Entry {
    start: NaiveTime,
    end: NaiveTime,
    available: bool,
    slot_id: Option<u32>,
}

fn timeline(court: &Court) -> Vec<Entry> {
    let mut entries: Vec<Entry> = court
        .slots
        .iter()
        .filter_map(|slot| {
            let (start, end) = slot.interval?;
            let (available, slot_id) = match slot.status {
                SlotStatus::Available { slot_id } => (true, Some(slot_id)),
                SlotStatus::Booked { .. } => (false, None),
            };
            Some(Entry {
                start,
                end,
                available,
                slot_id,
            })
        })
        .collect();
    entries.sort_by_key(|e| (e.start, e.end));
    entries
}

/// Free minutes on `court` from `target` to the end of the unbroken available run
///
/// Returns the minutes together with the Reserve slot that contains `target`, or
/// `None` when the target falls inside a booking or no available slot covers it.
/// Walking forward from the covering slot, an available slot starting at or before
/// the current end extends the run; a gap ends it; a booking starting before the
/// current end truncates it.
pub fn contiguous_run(court: &Court, target: NaiveTime) -> Option<(u32, u32)> {
    let entries = timeline(court);

    let covers = |e: &Entry| e.start <= target && target < e.end;
    if entries.iter().any(|e| !e.available && covers(e)) {
        return None;
    }

    let hit = entries.iter().position(|e| e.available && covers(e))?;
    let slot_id = entries[hit].slot_id?;
    let mut end = entries[hit].end;

    for entry in &entries[hit + 1..] {
        if entry.start > end {
            break;
        }
        if !entry.available {
            if entry.end > target {
                end = end.min(entry.start.max(target));
                break;
            }
            continue;
        }
        end = end.max(entry.end);
    }

    let minutes = time::minutes_between(target, end);
    u32::try_from(minutes).ok().filter(|m| *m > 0).map(|m| (m, slot_id))
}

/// Free minutes on `court` starting at `target`
pub fn contiguous_minutes(court: &Court, target: NaiveTime) -> Option<u32> {
    contiguous_run(court, target).map(|(minutes, _)| minutes)
}

/// Court with the longest contiguous availability at `target`
///
/// With `singles_only`, courts whose header is not a singles court are skipped.
/// Ties keep the left-most column.
pub fn find_best_court(schedule: &Schedule, target: NaiveTime, singles_only: bool) -> Option<CourtChoice> {
    let mut best: Option<CourtChoice> = None;

    for court in &schedule.courts {
        if singles_only && court.kind != CourtKind::Singles {
            continue;
        }

        let Some((minutes, slot_id)) = contiguous_run(court, target) else {
            debug!("{}: not available at {}", court.display_name(), time::display(target));
            continue;
        };
        debug!("{}: {} minutes available", court.display_name(), minutes);

        if best.as_ref().is_none_or(|b| minutes > b.available_minutes) {
            best = Some(CourtChoice {
                court_name: court.display_name().to_string(),
                column_index: court.column_index,
                available_minutes: minutes,
                slot_id,
            });
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Slot;
    use crate::schedule::tests::t;

    fn available(slot_id: u32, h: u32, m: u32) -> Slot {
        let start = t(h, m);
        Slot {
            status: SlotStatus::Available { slot_id },
            time_text: time::display(start),
            interval: Some((start, start + chrono::Duration::minutes(30))),
        }
    }

    fn booked(start: NaiveTime, end: NaiveTime) -> Slot {
        Slot {
            status: SlotStatus::Booked {
                label: "Singles".into(),
            },
            time_text: String::new(),
            interval: Some((start, end)),
        }
    }

    fn court(index: usize, name: &str, slots: Vec<Slot>) -> Court {
        Court {
            name: name.into(),
            column_index: index,
            kind: CourtKind::from_header(name),
            x_start: index as f64 * 100.0,
            x_end: index as f64 * 100.0 + 100.0,
            slots,
        }
    }

    #[test]
    fn merges_consecutive_available_slots() {
        let c = court(
            1,
            "Court 1 Singles",
            vec![available(2, 18, 0), available(0, 17, 0), available(1, 17, 30)],
        );
        assert_eq!(contiguous_run(&c, t(17, 0)), Some((90, 0)));
        assert_eq!(contiguous_minutes(&c, t(17, 30)), Some(60));
    }

    #[test]
    fn gap_ends_the_run() {
        let c = court(1, "Court 1 Singles", vec![available(0, 17, 0), available(1, 18, 0)]);
        assert_eq!(contiguous_minutes(&c, t(17, 0)), Some(30));
    }

    #[test]
    fn booking_right_after_stops_the_run() {
        let c = court(
            1,
            "Court 1 Singles",
            vec![available(0, 17, 0), booked(t(17, 30), t(18, 30)), available(1, 18, 30)],
        );
        assert_eq!(contiguous_minutes(&c, t(17, 0)), Some(30));
    }

    #[test]
    fn overlapping_booking_truncates_the_run() {
        let c = court(
            1,
            "Court 1 Singles",
            vec![available(0, 17, 0), available(1, 17, 30), booked(t(17, 45), t(18, 30))],
        );
        assert_eq!(contiguous_minutes(&c, t(17, 0)), Some(45));
    }

    #[test]
    fn target_inside_booking_is_unavailable() {
        let c = court(
            1,
            "Court 1 Singles",
            vec![booked(t(16, 30), t(17, 30)), available(0, 17, 0)],
        );
        assert_eq!(contiguous_run(&c, t(17, 0)), None);
    }

    #[test]
    fn target_mid_slot_counts_remaining_minutes() {
        let c = court(1, "Court 1 Singles", vec![available(0, 17, 0), available(1, 17, 30)]);
        assert_eq!(contiguous_minutes(&c, t(17, 15)), Some(45));
    }

    #[test]
    fn no_covering_slot_means_none() {
        let c = court(1, "Court 1 Singles", vec![available(0, 17, 0)]);
        assert_eq!(contiguous_run(&c, t(16, 0)), None);
        assert_eq!(contiguous_run(&court(2, "Court 2 Singles", vec![]), t(16, 0)), None);
    }

    #[test]
    fn earlier_bookings_do_not_interfere() {
        let c = court(
            1,
            "Court 1 Singles",
            vec![booked(t(15, 0), t(17, 0)), available(0, 17, 0), available(1, 17, 30)],
        );
        assert_eq!(contiguous_minutes(&c, t(17, 0)), Some(60));
    }

    #[test]
    fn picks_longest_run_across_courts() {
        let schedule = Schedule {
            courts: vec![
                court(1, "Court 1 Singles", vec![available(0, 17, 0)]),
                court(
                    2,
                    "Court 2 Singles",
                    vec![available(1, 17, 0), available(2, 17, 30), available(3, 18, 0)],
                ),
                court(3, "Court 3 Singles", vec![available(4, 17, 0), available(5, 17, 30)]),
            ],
        };
        let choice = find_best_court(&schedule, t(17, 0), true).unwrap();
        assert_eq!(choice.court_name, "Court 2 Singles");
        assert_eq!(choice.available_minutes, 90);
        assert_eq!(choice.slot_id, 1);
    }

    #[test]
    fn ties_keep_leftmost_court() {
        let schedule = Schedule {
            courts: vec![
                court(1, "Court 1 Singles", vec![available(0, 17, 0)]),
                court(2, "Court 2 Singles", vec![available(1, 17, 0)]),
            ],
        };
        assert_eq!(find_best_court(&schedule, t(17, 0), true).unwrap().column_index, 1);
    }

    #[test]
    fn singles_filter_skips_doubles_courts() {
        let schedule = Schedule {
            courts: vec![
                court(1, "Court 1 Doubles", vec![available(0, 17, 0), available(1, 17, 30)]),
                court(2, "Court 2 Singles", vec![available(2, 17, 0)]),
                court(3, "Court 3", vec![available(3, 17, 0), available(4, 17, 30)]),
            ],
        };
        let singles = find_best_court(&schedule, t(17, 0), true).unwrap();
        assert_eq!(singles.column_index, 2);

        let any = find_best_court(&schedule, t(17, 0), false).unwrap();
        assert_eq!(any.column_index, 1);
        assert_eq!(any.available_minutes, 60);
    }

    #[test]
    fn nothing_free_yields_none() {
        let schedule = Schedule {
            courts: vec![court(1, "Court 1 Singles", vec![booked(t(17, 0), t(18, 0))])],
        };
        assert!(find_best_court(&schedule, t(17, 0), true).is_none());
    }
}
