//! Booking modal: Kendo dropdowns, guest autocomplete and submission
//!
//! Kendo renders its dropdowns as spans and its option lists in a detached popup,
//! so native `<select>` handling does not apply. A selection opens the widget, lets
//! the popup animate in, lists the visible options and clicks the one chosen here.

use std::time::Duration;

use chromiumoxide::Page;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::rules::{BookingDuration, BookingRequest, ReservationType};
use crate::Timeouts;
use crate::utils::constants::{
    AUTOCOMPLETE_ITEMS, DURATION_DROPDOWN_NEEDLES, DURATION_LABEL_TEXT, ERROR_INDICATORS,
    GUEST_PLAYER_INPUT, KENDO_DROPDOWN, KENDO_DROPDOWN_TEXT, KENDO_OPTIONS, MODAL,
    RESERVATION_TYPE_PLACEHOLDER, SAVE_BUTTON, SUCCESS_INDICATORS,
};
use crate::utils::{
    BookingError, BookingResult, body_text, click_selector, type_into, wait_for_element,
    wait_for_text,
};

/// Body text checks after clicking Save
const SUBMIT_POLLS: usize = 5;

const VISIBLE_FN: &str =
    "const visible = (el) => !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);";

const OPEN_DROPDOWN: &str = r#"
(() => {
  __VISIBLE__
  const needles = __NEEDLES__;
  const seen = [];
  for (const dropdown of document.querySelectorAll(__DROPDOWN__)) {
    if (!visible(dropdown)) continue;
    const inner = dropdown.querySelector(__TEXT__);
    const text = ((inner && (inner.textContent || inner.value)) || dropdown.textContent || '').trim();
    seen.push(text);
    const lower = text.toLowerCase();
    if (needles.some((needle) => lower.includes(needle))) {
      dropdown.click();
      return { opened: true, text, seen };
    }
  }
  return { opened: false, text: '', seen };
})()
"#;

const LIST_OPTIONS: &str = r#"
(() => {
  __VISIBLE__
  const options = Array.from(document.querySelectorAll(__OPTIONS__)).filter(visible);
  return { texts: options.map((o) => (o.textContent || '').trim()) };
})()
"#;

const CLICK_OPTION: &str = r#"
(() => {
  __VISIBLE__
  const options = Array.from(document.querySelectorAll(__OPTIONS__)).filter(visible);
  const hit = options[__INDEX__];
  if (!hit) return { clicked: false, text: '' };
  hit.click();
  return { clicked: true, text: (hit.textContent || '').trim() };
})()
"#;

const DROPDOWN_TEXTS: &str = r#"
(() => {
  __VISIBLE__
  const texts = Array.from(document.querySelectorAll(__DROPDOWN__))
    .filter(visible)
    .map((dropdown) => {
      const inner = dropdown.querySelector(__TEXT__);
      return ((inner && (inner.textContent || inner.value)) || dropdown.textContent || '').trim();
    });
  return { texts };
})()
"#;

const BUTTON_STATE: &str = r#"
(() => {
  __VISIBLE__
  const button = document.querySelector(__SELECTOR__);
  if (!button) return { present: false, enabled: false };
  return { present: true, enabled: visible(button) && !button.disabled };
})()
"#;

const MODAL_STATE: &str = r#"
(() => {
  __VISIBLE__
  const open = Array.from(document.querySelectorAll(__SELECTOR__)).filter(visible);
  return { open: open.length > 0, text: open.map((m) => m.innerText || '').join('\n') };
})()
"#;

#[derive(Debug, Deserialize)]
struct DropdownOpened {
    opened: bool,
    text: String,
    #[serde(default)]
    seen: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OptionTexts {
    #[serde(default)]
    texts: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OptionClicked {
    clicked: bool,
    #[serde(default)]
    text: String,
}

/// Outcome of looking for an option in an open list
#[derive(Debug)]
enum OptionPick {
    Clicked(String),
    Missing { seen: Vec<String> },
}

#[derive(Debug, Deserialize)]
struct DropdownTexts {
    #[serde(default)]
    texts: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ButtonState {
    present: bool,
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct ModalState {
    open: bool,
    #[serde(default)]
    text: String,
}

/// Substitute `__NAME__` placeholders with JSON literals
fn render(template: &str, vars: &[(&str, Value)]) -> String {
    let mut script = template.replace("__VISIBLE__", VISIBLE_FN);
    for (name, value) in vars {
        script = script.replace(&format!("__{name}__"), &value.to_string());
    }
    script
}

fn lowered(needles: &[&str]) -> Value {
    json!(needles.iter().map(|n| n.to_lowercase()).collect::<Vec<_>>())
}

/// Index of the option to click
///
/// Needles are tried in priority order against the whole option text first, so
/// "30 minutes" never lands on "1 hour 30 minutes" when both are listed. Only
/// when no option matches exactly does a substring match count.
fn choose_option(options: &[String], needles: &[&str]) -> Option<usize> {
    let texts: Vec<String> = options.iter().map(|o| o.trim().to_lowercase()).collect();
    let needles: Vec<String> = needles.iter().map(|n| n.to_lowercase()).collect();

    needles
        .iter()
        .find_map(|needle| texts.iter().position(|o| o == needle))
        .or_else(|| {
            needles
                .iter()
                .find_map(|needle| texts.iter().position(|o| o.contains(needle.as_str())))
        })
}

async fn pick_option(page: &Page, options_selector: &str, needles: &[&str]) -> BookingResult<OptionPick> {
    let listed: OptionTexts = page
        .evaluate_expression(render(LIST_OPTIONS, &[("OPTIONS", json!(options_selector))]))
        .await?
        .into_value()?;
    let Some(index) = choose_option(&listed.texts, needles) else {
        return Ok(OptionPick::Missing { seen: listed.texts });
    };

    let script = render(
        CLICK_OPTION,
        &[("OPTIONS", json!(options_selector)), ("INDEX", json!(index))],
    );
    let clicked: OptionClicked = page.evaluate_expression(script).await?.into_value()?;
    if clicked.clicked {
        Ok(OptionPick::Clicked(clicked.text))
    } else {
        Ok(OptionPick::Missing { seen: listed.texts })
    }
}

/// Open the first visible Kendo dropdown whose text contains one of
/// `dropdown_needles` and click the option matching the earliest of
/// `option_needles`
///
/// Returns the text of the option that was clicked.
pub async fn select_dropdown_option(
    page: &Page,
    dropdown_needles: &[&str],
    option_needles: &[&str],
    settle: Duration,
) -> BookingResult<String> {
    let script = render(
        OPEN_DROPDOWN,
        &[
            ("NEEDLES", lowered(dropdown_needles)),
            ("DROPDOWN", json!(KENDO_DROPDOWN)),
            ("TEXT", json!(KENDO_DROPDOWN_TEXT)),
        ],
    );
    let opened: DropdownOpened = page.evaluate_expression(script).await?.into_value()?;
    if !opened.opened {
        return Err(BookingError::Form(format!(
            "No dropdown showing any of {:?} (visible dropdowns: {:?})",
            dropdown_needles, opened.seen
        )));
    }
    debug!("Opened dropdown currently showing '{}'", opened.text);

    tokio::time::sleep(settle).await;

    match pick_option(page, KENDO_OPTIONS, option_needles).await? {
        OptionPick::Clicked(text) => {
            debug!("Clicked option '{}'", text);
            Ok(text)
        }
        OptionPick::Missing { seen } => Err(BookingError::Form(format!(
            "No option matching {:?} (options seen: {:?})",
            option_needles, seen
        ))),
    }
}

/// Whether some visible Kendo dropdown now displays `needle`
pub async fn verify_dropdown_text(page: &Page, needle: &str) -> BookingResult<bool> {
    let script = render(
        DROPDOWN_TEXTS,
        &[("DROPDOWN", json!(KENDO_DROPDOWN)), ("TEXT", json!(KENDO_DROPDOWN_TEXT))],
    );
    let found: DropdownTexts = page.evaluate_expression(script).await?.into_value()?;
    let needle = needle.to_lowercase();
    Ok(found.texts.iter().any(|t| t.to_lowercase().contains(&needle)))
}

/// What ended up in the form
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct FilledForm {
    pub reservation_type: String,
    pub duration: Option<String>,
    pub guest: Option<String>,
}

/// Fill the booking modal opened by a Reserve click
///
/// The reservation type is mandatory and verified after selection. A duration
/// that cannot be set leaves the site default in place. The guest player is
/// typed into the autocomplete and the entry matching the first name is picked
/// when one shows up.
pub async fn fill_booking_form(
    page: &Page,
    request: &BookingRequest,
    duration: BookingDuration,
    timeouts: &Timeouts,
) -> BookingResult<FilledForm> {
    wait_for_element(page, MODAL, timeouts.element)
        .await
        .map_err(|e| BookingError::Form(format!("Booking modal did not open: {e}")))?;
    wait_for_text(page, DURATION_LABEL_TEXT, timeouts.element)
        .await
        .map_err(|e| BookingError::Form(format!("Booking form did not finish loading: {e}")))?;
    tokio::time::sleep(timeouts.settle).await;

    let kind = request.reservation_type;
    info!("Selecting reservation type '{}'", kind);
    let type_text = select_dropdown_option(
        page,
        &[
            RESERVATION_TYPE_PLACEHOLDER,
            ReservationType::Singles.needle(),
            ReservationType::SoloPractice.needle(),
        ],
        &[kind.needle()],
        timeouts.settle,
    )
    .await?;
    tokio::time::sleep(timeouts.settle).await;
    if !verify_dropdown_text(page, kind.needle()).await? {
        return Err(BookingError::Form(format!(
            "Reservation type dropdown does not show '{}' after selection",
            kind
        )));
    }

    info!("Selecting duration '{}'", duration);
    let duration_text = match select_dropdown_option(
        page,
        DURATION_DROPDOWN_NEEDLES,
        duration.option_needles(),
        timeouts.settle,
    )
    .await
    {
        Ok(text) => {
            tokio::time::sleep(timeouts.settle).await;
            Some(text)
        }
        Err(e) => {
            warn!("Could not set duration, keeping the form default: {}", e);
            None
        }
    };

    let guest = match request.guest() {
        Some(name) => Some(add_guest_player(page, name, timeouts).await?),
        None => {
            debug!("No guest player for {}", kind);
            None
        }
    };

    Ok(FilledForm {
        reservation_type: type_text,
        duration: duration_text,
        guest,
    })
}

async fn add_guest_player(page: &Page, name: &str, timeouts: &Timeouts) -> BookingResult<String> {
    info!("Adding guest player '{}'", name);
    type_into(page, GUEST_PLAYER_INPUT, name, timeouts.element)
        .await
        .map_err(|e| BookingError::Form(format!("Guest player field unavailable: {e}")))?;
    tokio::time::sleep(timeouts.settle).await;

    let first_name = name.split_whitespace().next().unwrap_or(name);
    match pick_option(page, AUTOCOMPLETE_ITEMS, &[first_name]).await {
        Ok(OptionPick::Clicked(text)) => {
            info!("Selected '{}' from autocomplete", text);
            tokio::time::sleep(timeouts.settle).await;
            Ok(text)
        }
        Ok(OptionPick::Missing { seen }) => {
            warn!(
                "No autocomplete entry for '{}' (entries: {:?}), continuing with typed name",
                first_name, seen
            );
            Ok(name.to_string())
        }
        Err(e) => {
            warn!("Autocomplete lookup failed ({}), continuing with typed name", e);
            Ok(name.to_string())
        }
    }
}

/// Signal found in rendered page text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSignal {
    Success(&'static str),
    Error(&'static str),
    Silent,
}

fn indicators_in(lower: &str, words: &'static [&'static str]) -> impl Iterator<Item = &'static str> {
    words.iter().copied().filter(move |word| lower.contains(word))
}

/// First indicator in `after` that was not already in `before`; errors take precedence
///
/// The grid behind the modal can carry words such as "not available" before Save
/// is clicked. Only wording that appeared since then says anything about the
/// submission.
pub fn new_signal(before: &str, after: &str) -> TextSignal {
    let before = before.to_lowercase();
    let after = after.to_lowercase();
    let is_new = |word: &&str| !before.contains(*word);

    if let Some(word) = indicators_in(&after, ERROR_INDICATORS).find(is_new) {
        return TextSignal::Error(word);
    }
    if let Some(word) = indicators_in(&after, SUCCESS_INDICATORS).find(is_new) {
        return TextSignal::Success(word);
    }
    TextSignal::Silent
}

/// Look for success or error wording; errors take precedence
pub fn classify_page_text(text: &str) -> TextSignal {
    new_signal("", text)
}

/// How the site reacted to Save
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Success wording appeared on the page
    Confirmed(String),
    /// The modal closed without any wording either way
    ModalClosed,
    /// The modal is still open but shows no error
    Pending,
    Rejected(String),
}

impl SubmitOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, SubmitOutcome::Rejected(_))
    }
}

fn snippet(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    flat.chars().take(200).collect()
}

/// Click Save and read the site's reaction
///
/// Indicator words already on the page before the click are ignored, so text
/// from the grid behind the modal does not count as a result.
pub async fn submit_booking_form(page: &Page, timeouts: &Timeouts) -> BookingResult<SubmitOutcome> {
    let state: ButtonState = page
        .evaluate_expression(render(BUTTON_STATE, &[("SELECTOR", json!(SAVE_BUTTON))]))
        .await?
        .into_value()?;
    if !state.present {
        return Err(BookingError::Submission(format!("Save button '{SAVE_BUTTON}' not found")));
    }
    if !state.enabled {
        return Err(BookingError::Submission("Save button is disabled".to_string()));
    }

    let baseline = body_text(page).await.unwrap_or_default();

    info!("Submitting booking form");
    click_selector(page, SAVE_BUTTON, timeouts.element).await?;

    for poll in 1..=SUBMIT_POLLS {
        tokio::time::sleep(timeouts.settle).await;
        let text = match body_text(page).await {
            Ok(text) => text,
            Err(e) => {
                debug!("Reading page text failed on poll {}: {}", poll, e);
                continue;
            }
        };
        match new_signal(&baseline, &text) {
            TextSignal::Success(indicator) => {
                info!("Success indicator found: '{}'", indicator);
                return Ok(SubmitOutcome::Confirmed(indicator.to_string()));
            }
            TextSignal::Error(indicator) => {
                warn!("Error indicator found: '{}'", indicator);
                return Ok(SubmitOutcome::Rejected(format!("page reports '{indicator}'")));
            }
            TextSignal::Silent => {}
        }
    }

    let modal: ModalState = page
        .evaluate_expression(render(MODAL_STATE, &[("SELECTOR", json!(MODAL))]))
        .await?
        .into_value()?;
    Ok(modal_outcome(&modal))
}

fn modal_outcome(modal: &ModalState) -> SubmitOutcome {
    if !modal.open {
        return SubmitOutcome::ModalClosed;
    }
    let lower = modal.text.to_lowercase();
    if lower.contains("error") || lower.contains("required") {
        SubmitOutcome::Rejected(snippet(&modal.text))
    } else {
        SubmitOutcome::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_success_and_error_text() {
        assert_eq!(
            classify_page_text("Your Reservation Created for Court 2"),
            TextSignal::Success("reservation created")
        );
        assert_eq!(
            classify_page_text("Sorry, this slot is Already Booked"),
            TextSignal::Error("already booked")
        );
        assert_eq!(classify_page_text("Bookings  Court 1  Court 2"), TextSignal::Silent);
    }

    #[test]
    fn errors_win_over_success_words() {
        assert_eq!(
            classify_page_text("Booking confirmed? No: Guest player is required"),
            TextSignal::Error("is required")
        );
    }

    #[test]
    fn words_already_on_the_grid_are_ignored() {
        let before = "Court 3 Not Available  Court 1 Reserve 5:00 PM";
        let after = "Court 3 Not Available  Reservation created for Court 1";
        assert_eq!(new_signal(before, after), TextSignal::Success("reservation created"));
        assert_eq!(new_signal(before, before), TextSignal::Silent);
    }

    #[test]
    fn new_error_still_beats_new_success() {
        let before = "Court 3 Not Available";
        let after = "Court 3 Not Available  Booking confirmed? Guest player is required";
        assert_eq!(new_signal(before, after), TextSignal::Error("is required"));
    }

    #[test]
    fn exact_option_text_wins_over_substring() {
        let options: Vec<String> = ["1 hour 30 minutes", "30 minutes", "1 hour"]
            .map(String::from)
            .to_vec();
        assert_eq!(choose_option(&options, BookingDuration::ThirtyMinutes.option_needles()), Some(1));
        assert_eq!(choose_option(&options, BookingDuration::OneHour.option_needles()), Some(2));
    }

    #[test]
    fn option_falls_back_to_substring_in_needle_order() {
        let options: Vec<String> = ["Court Reservation", "Solo Practice (1 player)", "Singles Match"]
            .map(String::from)
            .to_vec();
        assert_eq!(choose_option(&options, &["singles"]), Some(2));
        assert_eq!(choose_option(&options, &["solo practice", "singles"]), Some(1));
        assert_eq!(choose_option(&options, &["doubles"]), None);
        assert_eq!(choose_option(&[], &["singles"]), None);
    }

    #[test]
    fn render_embeds_needles_as_json() {
        let script = render(
            OPEN_DROPDOWN,
            &[
                ("NEEDLES", lowered(&["Reservation Type", "it's"])),
                ("DROPDOWN", json!(KENDO_DROPDOWN)),
                ("TEXT", json!(KENDO_DROPDOWN_TEXT)),
            ],
        );
        assert!(script.contains(r#"["reservation type","it's"]"#));
        assert!(script.contains("const visible"));
        assert!(!script.contains("__"));
    }

    #[test]
    fn every_template_placeholder_is_filled() {
        let list = render(LIST_OPTIONS, &[("OPTIONS", json!(KENDO_OPTIONS))]);
        let click = render(CLICK_OPTION, &[("OPTIONS", json!(KENDO_OPTIONS)), ("INDEX", json!(2))]);
        let texts = render(
            DROPDOWN_TEXTS,
            &[("DROPDOWN", json!(KENDO_DROPDOWN)), ("TEXT", json!(KENDO_DROPDOWN_TEXT))],
        );
        let button = render(BUTTON_STATE, &[("SELECTOR", json!(SAVE_BUTTON))]);
        let modal = render(MODAL_STATE, &[("SELECTOR", json!(MODAL))]);
        assert!(click.contains("options[2]"));
        for script in [list, click, texts, button, modal] {
            assert!(!script.contains("__"), "unfilled placeholder in {script}");
        }
    }

    #[test]
    fn modal_state_maps_to_outcome() {
        let closed = ModalState {
            open: false,
            text: String::new(),
        };
        assert_eq!(modal_outcome(&closed), SubmitOutcome::ModalClosed);

        let rejected = ModalState {
            open: true,
            text: "Additional Player\n   is required".into(),
        };
        assert_eq!(
            modal_outcome(&rejected),
            SubmitOutcome::Rejected("Additional Player is required".into())
        );
        assert!(modal_outcome(&rejected).is_rejected());

        let busy = ModalState {
            open: true,
            text: "Saving...".into(),
        };
        assert_eq!(modal_outcome(&busy), SubmitOutcome::Pending);
    }
}
