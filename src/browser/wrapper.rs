//! Browser lifecycle: the launched Chrome, its CDP handler task and profile dir

use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{BrowserError, BrowserResult};
use crate::utils::constants::HIDE_WEBDRIVER_SCRIPT;

/// Wrapper for Browser and its event handler task
///
/// The handler task is aborted on drop; otherwise it keeps running after the
/// browser is gone.
pub struct BrowserWrapper {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserWrapper {
    pub(crate) fn new(browser: Browser, handler: JoinHandle<()>, user_data_dir: PathBuf) -> Self {
        Self {
            browser,
            handler,
            user_data_dir: Some(user_data_dir),
        }
    }

    pub(crate) fn browser(&self) -> &Browser {
        &self.browser
    }

    pub(crate) fn browser_mut(&mut self) -> &mut Browser {
        &mut self.browser
    }

    /// Remove the profile directory
    ///
    /// Call only after `browser.wait()` has returned; Chrome holds file locks
    /// in the profile until it exits.
    pub fn cleanup_temp_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take() {
            debug!("Cleaning up temp directory: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to clean up temp directory {}: {}. Manual cleanup may be required.",
                    path.display(),
                    e
                );
            }
        }
    }

    /// Open a blank tab with the webdriver flag hidden
    ///
    /// The mask is registered before any navigation so that it runs ahead of the
    /// site's own scripts on every document the tab loads.
    pub async fn open_page(&self) -> BrowserResult<Page> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::PageCreationFailed(e.to_string()))?;

        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
            HIDE_WEBDRIVER_SCRIPT.to_string(),
        ))
        .await
        .map_err(|e| BrowserError::PageCreationFailed(format!("webdriver mask: {e}")))?;

        info!("Opened browser tab");
        Ok(page)
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        self.handler.abort();

        if let Some(dir) = &self.user_data_dir {
            warn!(
                "BrowserWrapper dropped without shutdown; profile left at {}",
                dir.display()
            );
        }
    }
}
