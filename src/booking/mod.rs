//! Turning a booking request into a reservation on the site
//!
//! `rules` and `date` are pure; `form` and `flow` drive the browser.

pub mod date;
pub mod form;
mod flow;
pub mod rules;

pub use date::TargetDate;
pub use flow::{Booker, BookingReport, Verification};
pub use form::{FilledForm, SubmitOutcome, TextSignal, classify_page_text, new_signal};
pub use rules::{BookingDuration, BookingRequest, ReservationType};
