//! Owner of the single Chrome instance and the tab the booking flow drives
//!
//! Uses `Arc<Mutex<Option<BrowserWrapper>>>`: the browser is launched lazily on
//! first use, health-checked on every access and relaunched after a crash.
//! `tokio::sync::Mutex` is required because the guard is held across `.await`.
//! Lock order is `browser`, then `current_page`.

use chromiumoxide::page::Page;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::BrowserConfig;
use crate::browser::{BrowserError, BrowserResult, BrowserWrapper};

pub struct BrowserManager {
    config: BrowserConfig,
    browser: Arc<Mutex<Option<BrowserWrapper>>>,
    current_page: Arc<Mutex<Option<Page>>>,
}

impl BrowserManager {
    /// Browser is launched on the first `get_or_launch()` / `page()` call
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            browser: Arc::new(Mutex::new(None)),
            current_page: Arc::new(Mutex::new(None)),
        }
    }

    fn profile_dir() -> PathBuf {
        std::env::temp_dir().join(format!("courtbook_profile_{}", std::process::id()))
    }

    /// Get or launch the browser, replacing it if the health check fails
    ///
    /// Health is probed with the CDP `version()` command. A crashed browser is
    /// closed best-effort, its profile removed and a fresh one launched.
    pub async fn get_or_launch(&self) -> BrowserResult<Arc<Mutex<Option<BrowserWrapper>>>> {
        let mut guard = self.browser.lock().await;

        if let Some(wrapper) = guard.as_ref() {
            match wrapper.browser().version().await {
                Ok(_) => {
                    debug!("Browser health check passed");
                    drop(guard);
                    return Ok(self.browser.clone());
                }
                Err(e) => {
                    warn!("Browser health check failed: {}. Relaunching", e);
                    if let Some(mut crashed) = guard.take() {
                        let _ = crashed.browser_mut().close().await;
                        let _ = crashed.browser_mut().wait().await;
                        crashed.cleanup_temp_dir();
                    }
                    // The old tab belongs to the dead browser
                    self.current_page.lock().await.take();
                }
            }
        }

        let (browser, handler, user_data_dir) =
            crate::browser_setup::launch_browser(&self.config, Some(Self::profile_dir()))
                .await
                .map_err(|e| BrowserError::LaunchFailed(format!("{e:#}")))?;
        *guard = Some(BrowserWrapper::new(browser, handler, user_data_dir));
        drop(guard);

        Ok(self.browser.clone())
    }

    /// The working tab, opened on first use
    pub async fn page(&self) -> BrowserResult<Page> {
        let browser_arc = self.get_or_launch().await?;

        let browser_guard = browser_arc.lock().await;
        let mut current = self.current_page.lock().await;
        if let Some(page) = current.as_ref() {
            return Ok(page.clone());
        }

        let wrapper = browser_guard
            .as_ref()
            .ok_or_else(|| BrowserError::PageCreationFailed("Browser not available".into()))?;
        let page = wrapper.open_page().await?;
        *current = Some(page.clone());
        Ok(page)
    }

    /// Close the browser, wait for the process to exit and remove the profile
    ///
    /// Safe to call more than once. `close()` alone leaves a zombie process, so
    /// `wait()` is always called before the profile is removed.
    pub async fn shutdown(&self) {
        let mut guard = self.browser.lock().await;
        self.current_page.lock().await.take();
        if let Some(mut wrapper) = guard.take() {
            info!("Shutting down browser");

            if let Err(e) = wrapper.browser_mut().close().await {
                warn!("Failed to close browser cleanly: {}", e);
            }
            if let Err(e) = wrapper.browser_mut().wait().await {
                warn!("Failed to wait for browser exit: {}", e);
            }

            wrapper.cleanup_temp_dir();
        }
    }

    pub async fn is_browser_running(&self) -> bool {
        self.browser.lock().await.is_some()
    }
}
