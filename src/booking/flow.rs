//! End-to-end booking run against the live site

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate, NaiveTime};
use chromiumoxide::Page;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::form::{FilledForm, SubmitOutcome, fill_booking_form, submit_booking_form};
use super::rules::{BookingDuration, BookingRequest, ReservationType};
use crate::manager::BrowserManager;
use crate::schedule::{
    CURRENT_DATE_LABEL, Court, CourtChoice, Schedule, Slot, SlotStatus, extract_schedule,
    find_best_court, slot_selector, time,
};
use crate::utils::constants::{
    CALENDAR_NEXT_MONTH, CALENDAR_POPUP, CALENDAR_TRIGGERS, COURT_HEADER_KEYWORD, LOGIN_SUBMIT,
    NEXT_DAY_BUTTON, PASSWORD_INPUT, USERNAME_INPUT,
};
use crate::utils::{
    BookingError, BookingResult, Screenshots, click_selector, retry_with_backoff,
    type_into, wait_for_element, wait_for_text, wait_for_url_contains,
};
use crate::{Config, Credentials, Timeouts};

/// Pause between consecutive Next-day clicks
const NEXT_CLICK_PAUSE: Duration = Duration::from_millis(500);

/// Months the calendar picker may have to page forward
const MAX_MONTH_STEPS: usize = 2;

/// How a submitted booking was confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "evidence", rename_all = "snake_case")]
pub enum Verification {
    /// The chosen court shows a reservation covering the booked time
    Confirmed,
    /// Only indirect evidence was found
    Probable(Vec<String>),
    NotFound,
}

impl Verification {
    pub fn is_success(&self) -> bool {
        !matches!(self, Verification::NotFound)
    }
}

/// Result of a `book` run
#[derive(Debug, Clone, Serialize)]
pub struct BookingReport {
    pub date: NaiveDate,
    pub time: String,
    pub court: CourtChoice,
    pub reservation_type: ReservationType,
    pub duration: BookingDuration,
    pub form: FilledForm,
    pub dry_run: bool,
    pub submit: Option<SubmitOutcome>,
    pub verification: Option<Verification>,
}

impl BookingReport {
    pub fn succeeded(&self) -> bool {
        self.dry_run || self.verification.as_ref().is_some_and(Verification::is_success)
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Date:        {}", self.date.format("%A %Y-%m-%d")),
            format!("Time:        {}", self.time),
            format!(
                "Court:       {} ({} minutes free)",
                self.court.court_name, self.court.available_minutes
            ),
            format!("Type:        {}", self.reservation_type),
            format!(
                "Duration:    {}",
                self.form
                    .duration
                    .clone()
                    .unwrap_or_else(|| format!("{} (not set, site default kept)", self.duration))
            ),
        ];
        if let Some(guest) = &self.form.guest {
            lines.push(format!("Guest:       {guest}"));
        }
        let status = match (&self.verification, self.dry_run) {
            (_, true) => "dry run, form filled but not submitted".to_string(),
            (Some(Verification::Confirmed), _) => "booked and confirmed on the schedule".to_string(),
            (Some(Verification::Probable(evidence)), _) => {
                format!("probably booked ({})", evidence.join("; "))
            }
            (Some(Verification::NotFound), _) => "submitted but not found on the schedule".to_string(),
            (None, false) => "not submitted".to_string(),
        };
        lines.push(format!("Status:      {status}"));
        lines.join("\n")
    }
}

#[derive(Debug, Deserialize)]
struct DateLabel {
    #[serde(default)]
    texts: Vec<String>,
}

/// Drives one browser tab through login, navigation and booking
pub struct Booker {
    config: Config,
    credentials: Credentials,
    browser: Arc<BrowserManager>,
    timeouts: Timeouts,
    screenshots: Screenshots,
}

impl Booker {
    pub fn new(config: Config, credentials: Credentials, browser: Arc<BrowserManager>) -> BookingResult<Self> {
        let timeouts = config.timeouts.validated()?;
        let screenshots = Screenshots::new(&config.artifacts);
        Ok(Self {
            config,
            credentials,
            browser,
            timeouts,
            screenshots,
        })
    }

    async fn page(&self) -> BookingResult<Page> {
        Ok(self.browser.page().await?)
    }

    async fn goto(&self, page: &Page, url: &url::Url) -> BookingResult<()> {
        debug!("Navigating to {}", url);
        tokio::time::timeout(self.timeouts.navigation, page.goto(url.as_str()))
            .await
            .map_err(|_| {
                BookingError::Navigation(format!(
                    "{} did not load within {}ms",
                    url,
                    self.timeouts.navigation.as_millis()
                ))
            })?
            .map_err(|e| BookingError::Navigation(format!("{url}: {e}")))?;
        Ok(())
    }

    /// Log in, retrying the whole form with backoff
    pub async fn login(&self) -> BookingResult<()> {
        let page = self.page().await?;
        let page = &page;
        retry_with_backoff(&self.config.retry, "login", || self.login_once(page)).await
    }

    async fn login_once(&self, page: &Page) -> BookingResult<()> {
        info!("Logging in as {}", self.credentials.username);
        self.goto(page, &self.config.login_url()?).await?;
        self.screenshots.capture(page, "login_page").await;

        let element = self.timeouts.element;
        let login_err = |e: BookingError| BookingError::Login(e.to_string());
        type_into(page, USERNAME_INPUT, &self.credentials.username, element)
            .await
            .map_err(login_err)?;
        type_into(page, PASSWORD_INPUT, &self.credentials.password, element)
            .await
            .map_err(login_err)?;
        click_selector(page, LOGIN_SUBMIT, element).await.map_err(login_err)?;

        wait_for_url_contains(page, &self.config.site.portal_marker, self.timeouts.navigation)
            .await
            .map_err(|e| BookingError::Login(format!("no redirect to the member portal: {e}")))?;

        self.screenshots.capture(page, "after_login").await;
        info!("Logged in");
        Ok(())
    }

    /// Open the bookings grid and wait until it has rendered
    pub async fn open_bookings(&self) -> BookingResult<()> {
        let page = self.page().await?;
        self.open_bookings_on(&page).await
    }

    async fn open_bookings_on(&self, page: &Page) -> BookingResult<()> {
        info!("Opening bookings page");
        self.goto(page, &self.config.bookings_url()?).await?;
        wait_for_text(page, COURT_HEADER_KEYWORD, self.timeouts.navigation)
            .await
            .map_err(|e| BookingError::Navigation(format!("schedule grid did not render: {e}")))?;
        tokio::time::sleep(self.timeouts.page_load).await;
        self.screenshots.capture(page, "booking_page").await;
        Ok(())
    }

    /// Move the grid from today to `date`
    ///
    /// Uses the Kendo calendar when it can be found, otherwise clicks Next
    /// `days_ahead` times.
    pub async fn navigate_to_date(&self, days_ahead: u32, date: NaiveDate) -> BookingResult<()> {
        let page = self.page().await?;
        self.navigate_on(&page, days_ahead, date).await
    }

    async fn navigate_on(&self, page: &Page, days_ahead: u32, date: NaiveDate) -> BookingResult<()> {
        if days_ahead == 0 {
            info!("Staying on today ({})", date);
            return Ok(());
        }

        info!("Navigating to {} ({} days ahead)", date, days_ahead);
        match self.pick_calendar_date(page, date).await {
            Ok(()) => debug!("Picked {} from the calendar", date),
            Err(e) => {
                warn!("Calendar picker unavailable ({}), clicking Next {} times", e, days_ahead);
                self.click_next_days(page, days_ahead).await?;
            }
        }

        tokio::time::sleep(self.timeouts.settle).await;
        self.check_date_label(page, date).await;
        self.screenshots.capture(page, "target_date").await;
        Ok(())
    }

    async fn pick_calendar_date(&self, page: &Page, date: NaiveDate) -> BookingResult<()> {
        let short = self.timeouts.settle * 2;
        click_selector(page, CALENDAR_TRIGGERS, short).await?;
        wait_for_element(page, CALENDAR_POPUP, short).await?;

        let cell = calendar_cell_selector(date);
        for step in 0..=MAX_MONTH_STEPS {
            if page.find_element(cell.as_str()).await.is_ok() {
                click_selector(page, &cell, short).await?;
                return Ok(());
            }
            if step < MAX_MONTH_STEPS {
                click_selector(page, CALENDAR_NEXT_MONTH, short).await?;
                tokio::time::sleep(self.timeouts.settle / 2).await;
            }
        }

        Err(BookingError::Navigation(format!("calendar has no cell {cell}")))
    }

    async fn click_next_days(&self, page: &Page, days_ahead: u32) -> BookingResult<()> {
        for day in 1..=days_ahead {
            click_selector(page, NEXT_DAY_BUTTON, self.timeouts.element)
                .await
                .map_err(|e| BookingError::Navigation(format!("Next click {day}/{days_ahead}: {e}")))?;
            tokio::time::sleep(NEXT_CLICK_PAUSE).await;
        }
        Ok(())
    }

    /// Compare the grid's date label with `date`; a mismatch is only logged
    async fn check_date_label(&self, page: &Page, date: NaiveDate) {
        match read_date_label(page).await {
            Ok(label) if date_label_matches(&label.texts, date) => {
                info!("Grid shows {}", date.format("%A %B %-d"));
            }
            Ok(label) => warn!(
                "Could not confirm the grid shows {} (labels: {:?})",
                date, label.texts
            ),
            Err(e) => debug!("Date label unreadable: {}", e),
        }
    }

    async fn extract_with_retry(&self, page: &Page) -> BookingResult<Schedule> {
        let slot_minutes = self.config.booking.slot_minutes;
        retry_with_backoff(&self.config.retry, "schedule extraction", || async move {
            let schedule = extract_schedule(page, slot_minutes).await?;
            if schedule.is_empty() {
                Err(BookingError::Schedule("no court columns found on the grid".into()))
            } else {
                Ok(schedule)
            }
        })
        .await
    }

    /// Log in, open the target day and read its schedule
    pub async fn run_schedule(&self, request: &BookingRequest) -> BookingResult<Schedule> {
        let page = self.page().await?;
        self.login().await?;
        self.open_bookings_on(&page).await?;
        self.navigate_on(&page, request.days_ahead, request.date).await?;
        self.extract_with_retry(&page).await
    }

    /// Book the court with the longest free run at the requested time
    pub async fn book(&self, request: &BookingRequest) -> BookingResult<BookingReport> {
        let page = self.page().await?;
        let result = self.book_on(&page, request).await;
        if let Err(e) = &result {
            warn!("Booking failed: {}", e);
            self.screenshots.capture(&page, "booking_failed").await;
        }
        result
    }

    async fn book_on(&self, page: &Page, request: &BookingRequest) -> BookingResult<BookingReport> {
        let before = self.run_schedule(request).await?;
        let target = request.time_display();

        let choice = find_best_court(&before, request.time, request.singles_only).ok_or_else(|| {
            BookingError::NoAvailability {
                time: target.clone(),
            }
        })?;
        let duration = request.duration_for(choice.available_minutes);
        info!(
            "Best option: {} with {} minutes free, booking {}",
            choice.court_name, choice.available_minutes, duration
        );

        click_selector(page, &slot_selector(choice.slot_id), self.timeouts.element)
            .await
            .map_err(|e| BookingError::Form(format!("could not open the booking form: {e}")))?;
        tokio::time::sleep(self.timeouts.settle).await;
        self.screenshots.capture(page, "booking_form").await;

        let form = fill_booking_form(page, request, duration, &self.timeouts).await?;
        self.screenshots.capture(page, "form_filled").await;

        let mut report = BookingReport {
            date: request.date,
            time: target,
            court: choice,
            reservation_type: request.reservation_type,
            duration,
            form,
            dry_run: request.dry_run,
            submit: None,
            verification: None,
        };

        if request.dry_run {
            info!("Dry run: leaving the form unsubmitted");
            return Ok(report);
        }

        let outcome = submit_booking_form(page, &self.timeouts).await?;
        self.screenshots.capture(page, "after_submit").await;
        if let SubmitOutcome::Rejected(reason) = &outcome {
            return Err(BookingError::Submission(reason.clone()));
        }
        report.submit = Some(outcome);

        report.verification = Some(self.verify_on(page, &before, &report.court, request).await?);
        Ok(report)
    }

    /// Reload the target day and look for the new reservation
    ///
    /// `before` is the schedule read before the form was submitted; only bookings
    /// that are not in it count as evidence.
    pub async fn verify_booking(
        &self,
        before: &Schedule,
        choice: &CourtChoice,
        request: &BookingRequest,
    ) -> BookingResult<Verification> {
        let page = self.page().await?;
        self.verify_on(&page, before, choice, request).await
    }

    async fn verify_on(
        &self,
        page: &Page,
        before: &Schedule,
        choice: &CourtChoice,
        request: &BookingRequest,
    ) -> BookingResult<Verification> {
        info!("Verifying reservation on {}", choice.court_name);
        // Reopening resets the grid to today, so walk back to the booked day
        self.open_bookings_on(page).await?;
        self.navigate_on(page, request.days_ahead, request.date).await?;

        let after = self.extract_with_retry(page).await;
        self.screenshots.capture(page, "verification").await;
        let after = after.map_err(|e| {
            BookingError::Verification(format!("schedule could not be re-read after submitting: {e}"))
        })?;

        let verification = verdict(before, &after, choice, request);
        match &verification {
            Verification::Confirmed => info!("Reservation confirmed on {}", choice.court_name),
            Verification::Probable(evidence) => {
                info!("Reservation probably made: {}", evidence.join("; "))
            }
            Verification::NotFound => warn!("No new reservation on the schedule after reload"),
        }
        Ok(verification)
    }
}

async fn read_date_label(page: &Page) -> BookingResult<DateLabel> {
    Ok(page.evaluate_expression(CURRENT_DATE_LABEL).await?.into_value()?)
}

/// `a[data-value='YYYY/M-1/D']`; Kendo months are zero-based
fn calendar_cell_selector(date: NaiveDate) -> String {
    format!(
        "a[data-value='{}/{}/{}']",
        date.year(),
        date.month0(),
        date.day()
    )
}

fn date_label_matches(texts: &[String], date: NaiveDate) -> bool {
    let spellings = [
        date.format("%B %-d").to_string(),
        date.format("%b %-d").to_string(),
        date.format("%-m/%-d/%Y").to_string(),
        date.format("%m/%d/%Y").to_string(),
        date.format("%Y-%m-%d").to_string(),
    ]
    .map(|s| s.to_lowercase());

    texts.iter().any(|text| {
        let text = text.to_lowercase();
        spellings.iter().any(|s| text.contains(s.as_str()))
    })
}

fn covers(slot: &Slot, at: NaiveTime) -> bool {
    slot.interval.is_some_and(|(start, end)| start <= at && at < end)
}

/// Booked slots on the `after` grid that were not on the `before` grid
fn new_bookings<'a>(before: &Schedule, after: &'a Schedule) -> Vec<(&'a Court, &'a Slot)> {
    after
        .courts
        .iter()
        .flat_map(|court| court.slots.iter().map(move |slot| (court, slot)))
        .filter(|(court, slot)| {
            matches!(slot.status, SlotStatus::Booked { .. })
                && !before
                    .court(court.column_index)
                    .is_some_and(|old| old.slots.contains(slot))
        })
        .collect()
}

/// Decide whether the reservation shows up on the reloaded grid
///
/// Confirmed when a new booking covers the target time on the chosen court.
/// Probable when a new booking covers the target time elsewhere and carries the
/// reservation type or the guest's name, which happens when the grid columns
/// shift between reads. Bookings already present before submitting never count.
fn verdict(before: &Schedule, after: &Schedule, choice: &CourtChoice, request: &BookingRequest) -> Verification {
    let fresh: Vec<(&Court, &Slot)> = new_bookings(before, after)
        .into_iter()
        .filter(|(_, slot)| covers(slot, request.time))
        .collect();

    if fresh.iter().any(|(court, _)| court.column_index == choice.column_index) {
        return Verification::Confirmed;
    }

    let type_name = request.reservation_type.display_name().to_lowercase();
    let guest = request.guest().map(str::to_lowercase);
    let evidence: Vec<String> = fresh
        .iter()
        .filter_map(|(court, slot)| {
            let SlotStatus::Booked { label } = &slot.status else {
                return None;
            };
            let cell = format!("{label}\n{}", slot.time_text).to_lowercase();
            let reason = if guest.as_deref().is_some_and(|g| cell.contains(g)) {
                "guest"
            } else if cell.contains(&type_name) {
                "type"
            } else {
                return None;
            };
            Some(format!(
                "new {} booking at {} on {} ({reason} match)",
                request.reservation_type,
                time::display(request.time),
                court.display_name()
            ))
        })
        .collect();

    if evidence.is_empty() {
        Verification::NotFound
    } else {
        Verification::Probable(evidence)
    }
}
