//! Schedule grid model and extraction
//!
//! The bookings page renders one `th` per court and absolutely-positioned cells
//! for reservations and "Reserve" buttons. Cells carry no court id, so each one
//! is assigned to the court whose header spans the cell's horizontal centre.

mod script;
pub mod select;
pub mod time;

use chrono::NaiveTime;
use chromiumoxide::Page;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::utils::BookingResult;
use crate::utils::constants::{COURT_HEADER_KEYWORD, RESERVE_BUTTON_TEXT, SLOT_ATTRIBUTE};

pub use script::CURRENT_DATE_LABEL;
pub use select::{CourtChoice, contiguous_minutes, find_best_court};

/// Grid as returned by the collection script
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawGrid {
    #[serde(default)]
    pub headers: Vec<RawHeader>,
    #[serde(default)]
    pub booked: Vec<RawCell>,
    #[serde(default)]
    pub available: Vec<RawReserveButton>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawHeader {
    pub index: usize,
    pub text: String,
    pub left: f64,
    pub width: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCell {
    pub text: String,
    pub left: f64,
    pub width: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReserveButton {
    pub slot_id: u32,
    pub text: String,
    pub left: f64,
    pub width: f64,
}

trait Positioned {
    fn left(&self) -> f64;
    fn width(&self) -> f64;

    fn x_center(&self) -> f64 {
        self.left() + self.width() / 2.0
    }
}

impl Positioned for RawCell {
    fn left(&self) -> f64 {
        self.left
    }
    fn width(&self) -> f64 {
        self.width
    }
}

impl Positioned for RawReserveButton {
    fn left(&self) -> f64 {
        self.left
    }
    fn width(&self) -> f64 {
        self.width
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourtKind {
    Singles,
    Doubles,
    Other,
}

impl CourtKind {
    /// Classify a court from its header text
    pub fn from_header(header: &str) -> Self {
        let lower = header.to_lowercase();
        if lower.contains("doubles") {
            CourtKind::Doubles
        } else if lower.contains("singles") {
            CourtKind::Singles
        } else {
            CourtKind::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SlotStatus {
    Booked { label: String },
    Available { slot_id: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    #[serde(flatten)]
    pub status: SlotStatus,
    pub time_text: String,
    /// `None` when the time text could not be parsed
    pub interval: Option<(NaiveTime, NaiveTime)>,
}

impl Slot {
    pub fn is_available(&self) -> bool {
        matches!(self.status, SlotStatus::Available { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Court {
    /// Full header text, may span several lines
    pub name: String,
    pub column_index: usize,
    pub kind: CourtKind,
    pub x_start: f64,
    pub x_end: f64,
    pub slots: Vec<Slot>,
}

impl Court {
    /// First line of the header, e.g. "Court 3"
    pub fn display_name(&self) -> &str {
        self.name.lines().next().unwrap_or(&self.name).trim()
    }

    fn spans(&self, x: f64) -> bool {
        self.x_start <= x && x <= self.x_end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub courts: Vec<Court>,
}

impl Schedule {
    pub fn is_empty(&self) -> bool {
        self.courts.is_empty()
    }

    pub fn court(&self, column_index: usize) -> Option<&Court> {
        self.courts.iter().find(|c| c.column_index == column_index)
    }

    /// Plain-text summary, one block per court with slots in time order
    pub fn render_table(&self) -> String {
        if self.courts.is_empty() {
            return "No courts found on the schedule grid.".to_string();
        }

        let mut out = String::new();
        for court in &self.courts {
            let kind = match court.kind {
                CourtKind::Singles => "singles",
                CourtKind::Doubles => "doubles",
                CourtKind::Other => "other",
            };
            out.push_str(&format!("{} ({kind})\n", court.display_name()));

            let mut slots: Vec<&Slot> = court.slots.iter().collect();
            slots.sort_by_key(|s| s.interval.map(|(start, _)| start));
            if slots.is_empty() {
                out.push_str("  (no slots)\n");
            }
            for slot in slots {
                let when = match slot.interval {
                    Some((start, end)) => format!("{} - {}", time::display(start), time::display(end)),
                    None => format!("? ({})", slot.time_text),
                };
                match &slot.status {
                    SlotStatus::Available { .. } => out.push_str(&format!("  {when:<22} available\n")),
                    SlotStatus::Booked { label } => {
                        out.push_str(&format!("  {when:<22} booked: {label}\n"))
                    }
                }
            }
        }
        out
    }
}

/// Selector that matches the Reserve button tagged by the collection script
pub fn slot_selector(slot_id: u32) -> String {
    format!("[{SLOT_ATTRIBUTE}='{slot_id}']")
}

/// Turn the raw grid into per-court timelines
///
/// Column 0 is the time column. Only headers containing "Court" become courts.
/// Each booked cell and Reserve button goes to the court whose header x-range
/// contains the cell's horizontal centre; cells outside every range are dropped.
pub fn build_schedule(raw: &RawGrid, slot_minutes: u32) -> Schedule {
    let slot_minutes = slot_minutes.max(1);

    let mut courts: Vec<Court> = raw
        .headers
        .iter()
        .filter(|h| h.index > 0 && h.text.contains(COURT_HEADER_KEYWORD) && h.width > 0.0)
        .map(|h| Court {
            name: h.text.clone(),
            column_index: h.index,
            kind: CourtKind::from_header(&h.text),
            x_start: h.left,
            x_end: h.left + h.width,
            slots: Vec::new(),
        })
        .collect();

    for cell in &raw.booked {
        if cell.text.is_empty() {
            continue;
        }
        let Some(court) = courts.iter_mut().find(|c| c.spans(cell.x_center())) else {
            debug!("Booked cell outside every court column: {:?}", cell.text);
            continue;
        };
        let mut lines = cell.text.lines().map(str::trim).filter(|l| !l.is_empty());
        let label = lines.next().unwrap_or_default().to_string();
        let time_text = lines.next().unwrap_or_default().to_string();
        // Some cells put the range on the first line with no label
        let interval = time::parse_range(&time_text).or_else(|| time::parse_range(&label));

        court.slots.push(Slot {
            status: SlotStatus::Booked { label },
            time_text,
            interval,
        });
    }

    for button in &raw.available {
        let Some(court) = courts.iter_mut().find(|c| c.spans(button.x_center())) else {
            debug!("Reserve button outside every court column: {:?}", button.text);
            continue;
        };
        let time_text = button.text.replace(RESERVE_BUTTON_TEXT, "").trim().to_string();
        let interval = time::parse_clock(&time_text).map(|start| (start, time::add_minutes(start, slot_minutes)));

        court.slots.push(Slot {
            status: SlotStatus::Available {
                slot_id: button.slot_id,
            },
            time_text,
            interval,
        });
    }

    Schedule { courts }
}

/// Read the schedule grid currently rendered on `page`
pub async fn extract_schedule(page: &Page, slot_minutes: u32) -> BookingResult<Schedule> {
    let raw: RawGrid = page.evaluate_expression(script::COLLECT_GRID).await?.into_value()?;
    let schedule = build_schedule(&raw, slot_minutes);

    let available = schedule
        .courts
        .iter()
        .flat_map(|c| &c.slots)
        .filter(|s| s.is_available())
        .count();
    info!(
        "Schedule: {} courts, {} booked cells, {} available slots",
        schedule.courts.len(),
        raw.booked.len(),
        available
    );

    Ok(schedule)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn header(index: usize, text: &str, left: f64) -> RawHeader {
        RawHeader {
            index,
            text: text.into(),
            left,
            width: 100.0,
        }
    }

    fn booked(text: &str, left: f64) -> RawCell {
        RawCell {
            text: text.into(),
            left,
            width: 90.0,
        }
    }

    fn reserve(slot_id: u32, text: &str, left: f64) -> RawReserveButton {
        RawReserveButton {
            slot_id,
            text: text.into(),
            left,
            width: 80.0,
        }
    }

    fn grid() -> RawGrid {
        RawGrid {
            headers: vec![
                header(0, "", 0.0),
                header(1, "Court 1\nSingles", 100.0),
                header(2, "Court 2\nDoubles", 200.0),
                header(3, "Lobby", 300.0),
            ],
            booked: vec![
                booked("Singles\n4:00 p.m. - 5:00 p.m.", 105.0),
                booked("Open Play\n5:00 p.m. - 6:30 p.m.", 205.0),
                booked("", 105.0),
            ],
            available: vec![
                reserve(0, "Reserve 5:00 PM", 110.0),
                reserve(1, "Reserve\n5:30 PM", 110.0),
                reserve(2, "Reserve 4:00 PM", 210.0),
                reserve(3, "Reserve 9:00 PM", 900.0),
                reserve(4, "Reserve", 110.0),
            ],
        }
    }

    #[test]
    fn keeps_only_court_columns_after_the_time_column() {
        let schedule = build_schedule(&grid(), 30);
        let names: Vec<&str> = schedule.courts.iter().map(|c| c.display_name()).collect();
        assert_eq!(names, ["Court 1", "Court 2"]);
        assert_eq!(schedule.courts[0].kind, CourtKind::Singles);
        assert_eq!(schedule.courts[1].kind, CourtKind::Doubles);
    }

    #[test]
    fn assigns_cells_by_horizontal_centre() {
        let schedule = build_schedule(&grid(), 30);
        let court1 = schedule.court(1).unwrap();
        let court2 = schedule.court(2).unwrap();

        // one booking + three reserve buttons (one with an unparseable time)
        assert_eq!(court1.slots.len(), 4);
        assert_eq!(court2.slots.len(), 2);
        // the 9 PM button sits outside every column
        assert!(schedule
            .courts
            .iter()
            .flat_map(|c| &c.slots)
            .all(|s| s.status != SlotStatus::Available { slot_id: 3 }));
    }

    #[test]
    fn parses_booked_ranges_and_reserve_starts() {
        let schedule = build_schedule(&grid(), 30);
        let court1 = schedule.court(1).unwrap();

        let booking = &court1.slots[0];
        assert_eq!(
            booking.status,
            SlotStatus::Booked {
                label: "Singles".into()
            }
        );
        assert_eq!(booking.interval, Some((t(16, 0), t(17, 0))));

        let five = court1
            .slots
            .iter()
            .find(|s| s.status == SlotStatus::Available { slot_id: 0 })
            .unwrap();
        assert_eq!(five.time_text, "5:00 PM");
        assert_eq!(five.interval, Some((t(17, 0), t(17, 30))));

        let broken = court1
            .slots
            .iter()
            .find(|s| s.status == SlotStatus::Available { slot_id: 4 })
            .unwrap();
        assert_eq!(broken.interval, None);
    }

    #[test]
    fn slot_length_follows_configuration() {
        let schedule = build_schedule(&grid(), 45);
        let slot = schedule.court(1).unwrap().slots.iter().find(|s| s.is_available()).unwrap();
        assert_eq!(slot.interval, Some((t(17, 0), t(17, 45))));
    }

    #[test]
    fn last_slot_of_the_day_does_not_wrap() {
        let raw = RawGrid {
            headers: vec![header(0, "", 0.0), header(1, "Court 1 Singles", 100.0)],
            booked: vec![],
            available: vec![reserve(0, "Reserve 11:30 PM", 110.0)],
        };
        let schedule = build_schedule(&raw, 30);
        let court = &schedule.courts[0];
        assert_eq!(court.slots[0].interval, Some((t(23, 30), time::END_OF_DAY)));
        assert_eq!(contiguous_minutes(court, t(23, 30)), Some(30));
    }

    #[test]
    fn booked_cell_with_range_on_first_line() {
        let raw = RawGrid {
            headers: vec![header(0, "", 0.0), header(1, "Court 4 - Singles", 100.0)],
            booked: vec![booked("7:00 PM - 8:00 PM", 110.0)],
            available: vec![],
        };
        let schedule = build_schedule(&raw, 30);
        assert_eq!(schedule.courts[0].slots[0].interval, Some((t(19, 0), t(20, 0))));
    }

    #[test]
    fn empty_grid_yields_empty_schedule() {
        let schedule = build_schedule(&RawGrid::default(), 30);
        assert!(schedule.is_empty());
        assert!(schedule.render_table().contains("No courts"));
    }

    #[test]
    fn raw_grid_deserializes_script_output() {
        let json = serde_json::json!({
            "headers": [{ "index": 1, "text": "Court 1", "left": 10.5, "width": 99.0 }],
            "booked": [],
            "available": [{ "slot_id": 0, "text": "Reserve 6:00 PM", "left": 20.0, "width": 50.0 }]
        });
        let raw: RawGrid = serde_json::from_value(json).unwrap();
        assert_eq!(raw.headers.len(), 1);
        assert_eq!(raw.available[0].slot_id, 0);
    }

    #[test]
    fn table_lists_slots_in_time_order() {
        let table = build_schedule(&grid(), 30).render_table();
        let court1 = table.split("Court 2").next().unwrap();
        let four = court1.find("4:00 PM").unwrap();
        let five_thirty = court1.find("5:30 PM - 6:00 PM").unwrap();
        assert!(four < five_thirty);
        assert!(table.contains("booked: Open Play"));
    }

    #[test]
    fn slot_selector_targets_tagged_button() {
        assert_eq!(slot_selector(7), "[data-courtbook-slot='7']");
    }
}
