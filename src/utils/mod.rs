// Browser interaction utilities shared by the booking flow
pub mod constants;
mod errors;
mod retry;
mod screenshots;
mod timeout;
mod wait_for_element;

pub use errors::{BookingError, BookingResult};
pub use retry::{RetrySettings, retry_with_backoff};
pub use screenshots::Screenshots;
pub use timeout::{validate_interaction_timeout, validate_navigation_timeout};
pub use wait_for_element::{
    body_text, click_selector, type_into, wait_for_element, wait_for_text, wait_for_url_contains,
};
