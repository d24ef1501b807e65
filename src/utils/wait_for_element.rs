//! Polling utilities for a page that renders its grid and modals via JavaScript
//!
//! The booking site draws the schedule, the Kendo dropdowns and the booking modal
//! after the load event fires, so every lookup goes through a poll with
//! exponential backoff instead of a single query.

use std::future::Future;
use std::time::Duration;

use chromiumoxide::Page;
use chromiumoxide::element::Element;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::utils::errors::BookingError;

const INITIAL_POLL: Duration = Duration::from_millis(100);
const MAX_POLL: Duration = Duration::from_secs(1);

/// Poll `probe` until it yields `Some`, doubling the interval up to one second
async fn poll_until<T, F, Fut>(timeout: Duration, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let start = Instant::now();
    let mut poll_interval = INITIAL_POLL;

    loop {
        if let Some(found) = probe().await {
            return Some(found);
        }

        if start.elapsed() >= timeout {
            return None;
        }

        tokio::time::sleep(poll_interval).await;
        poll_interval = (poll_interval * 2).min(MAX_POLL);
    }
}

/// Wait for an element to appear in the DOM using exponential backoff polling
///
/// # Arguments
/// * `page` - The chromiumoxide Page to search in
/// * `selector` - CSS selector for the element
/// * `timeout` - Maximum time to wait for the element
///
/// # Polling Strategy
/// - Starts at 100ms intervals
/// - Doubles each retry, capped at 1 second
/// - Total duration limited by timeout parameter
pub async fn wait_for_element(
    page: &Page,
    selector: &str,
    timeout: Duration,
) -> Result<Element, BookingError> {
    poll_until(timeout, || async move { page.find_element(selector).await.ok() })
        .await
        .ok_or_else(|| BookingError::ElementNotFound {
            selector: selector.to_string(),
            timeout_ms: timeout.as_millis(),
        })
}

/// Wait until the page URL contains `needle` (used for post-login redirects)
pub async fn wait_for_url_contains(
    page: &Page,
    needle: &str,
    timeout: Duration,
) -> Result<String, BookingError> {
    poll_until(timeout, || async move {
        match page.url().await {
            Ok(Some(url)) if url.contains(needle) => Some(url),
            _ => None,
        }
    })
    .await
    .ok_or_else(|| {
        BookingError::Navigation(format!(
            "URL did not contain '{}' within {}ms",
            needle,
            timeout.as_millis()
        ))
    })
}

/// Wait until the rendered body text contains `needle` (case-insensitive)
pub async fn wait_for_text(page: &Page, needle: &str, timeout: Duration) -> Result<(), BookingError> {
    let lowered = needle.to_lowercase();
    let needle = lowered.as_str();
    poll_until(timeout, || async move {
        match body_text(page).await {
            Ok(text) if text.to_lowercase().contains(needle) => Some(()),
            _ => None,
        }
    })
    .await
    .ok_or_else(|| BookingError::ElementNotFound {
        selector: format!("text={needle}"),
        timeout_ms: timeout.as_millis(),
    })
}

/// Rendered text of the document body
pub async fn body_text(page: &Page) -> Result<String, BookingError> {
    let text: String = page
        .evaluate_expression("document.body ? document.body.innerText : ''")
        .await?
        .into_value()?;
    Ok(text)
}

/// Click the element matching `selector`
///
/// Scrolls the element into view and dispatches a native click. When the native
/// click fails (element obscured by an overlay, zero-size hit box) it falls back
/// to calling `element.click()` inside the page.
pub async fn click_selector(
    page: &Page,
    selector: &str,
    timeout: Duration,
) -> Result<(), BookingError> {
    let element = wait_for_element(page, selector, timeout).await?;

    if let Err(e) = element.scroll_into_view().await {
        debug!("scroll_into_view failed for '{}': {}", selector, e);
    }

    match element.click().await {
        Ok(_) => Ok(()),
        Err(e) => {
            warn!("Native click failed for '{}' ({}), retrying with JS click", selector, e);
            element
                .call_js_fn("function() { this.click(); }", false)
                .await
                .map(|_| ())
                .map_err(|e| {
                    BookingError::Browser(format!("JS click failed for '{}': {}", selector, e))
                })
        }
    }
}

/// Clear an input field and type `text` into it
pub async fn type_into(
    page: &Page,
    selector: &str,
    text: &str,
    timeout: Duration,
) -> Result<(), BookingError> {
    let element = wait_for_element(page, selector, timeout).await?;

    element.click().await.map_err(|e| {
        BookingError::Browser(format!("Click to focus failed for '{}': {}", selector, e))
    })?;

    element
        .call_js_fn("function() { this.value = ''; }", false)
        .await
        .map_err(|e| BookingError::Browser(format!("Failed to clear '{}': {}", selector, e)))?;

    element
        .type_str(text)
        .await
        .map_err(|e| BookingError::Browser(format!("Typing into '{}' failed: {}", selector, e)))?;

    Ok(())
}
