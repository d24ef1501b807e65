use thiserror::Error;

use crate::browser::BrowserError;

/// Errors that can occur while driving a booking
#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Login failed: {0}")]
    Login(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Element not found (timeout after {timeout_ms}ms): '{selector}'")]
    ElementNotFound { selector: String, timeout_ms: u128 },

    #[error("Schedule extraction failed: {0}")]
    Schedule(String),

    #[error("No court available at {time}")]
    NoAvailability { time: String },

    #[error("Booking form error: {0}")]
    Form(String),

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("Verification failed: {0}")]
    Verification(String),

    #[error("Browser error: {0}")]
    Browser(String),
}

pub type BookingResult<T> = Result<T, BookingError>;

impl From<BrowserError> for BookingError {
    fn from(err: BrowserError) -> Self {
        BookingError::Browser(err.to_string())
    }
}

impl From<chromiumoxide::error::CdpError> for BookingError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BookingError::Browser(err.to_string())
    }
}

impl From<serde_json::Error> for BookingError {
    fn from(err: serde_json::Error) -> Self {
        BookingError::Schedule(format!("Unexpected script result: {err}"))
    }
}

impl From<anyhow::Error> for BookingError {
    fn from(err: anyhow::Error) -> Self {
        BookingError::Browser(format!("{err:#}"))
    }
}
