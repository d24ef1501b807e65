//! Court booking automation for CourtReserve schedules
//!
//! Drives a Chrome instance via chromiumoxide: logs in, moves the schedule grid to
//! the target day, reconstructs each court's timeline from the rendered grid, picks
//! the court with the longest contiguous availability at the requested time, fills
//! the Kendo booking modal and verifies the reservation after a reload.

pub mod booking;
mod browser;
pub mod browser_setup;
mod manager;
pub mod schedule;
pub mod utils;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::schedule::time::TimeWindow;
use crate::utils::{BookingError, BookingResult, RetrySettings};

/// Config file looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "courtbook.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub booking: BookingDefaults,

    #[serde(default)]
    pub artifacts: ArtifactConfig,

    #[serde(default)]
    pub retry: RetrySettings,
}

/// Where the booking site lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Organization id in the CourtReserve URL path
    #[serde(default = "default_organization_id")]
    pub organization_id: u32,

    /// Scheduler (`sId`) shown on the bookings page
    #[serde(default = "default_scheduler_id")]
    pub scheduler_id: u32,

    /// Fragment of the post-login URL that proves the login went through
    #[serde(default = "default_portal_marker")]
    pub portal_marker: String,
}

/// Browser security and launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Disable web security features (Same-Origin Policy, etc.)
    /// WARNING: Only enable for trusted content
    #[serde(default)]
    pub disable_security: bool,

    /// Window dimensions
    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

/// Timeouts in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Waiting for a single element to render
    #[serde(default = "default_element_ms")]
    pub element_ms: u64,

    /// Page loads and redirects
    #[serde(default = "default_navigation_ms")]
    pub navigation_ms: u64,

    /// Pause after opening a dropdown or clicking a day button
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Pause after the bookings page loads, before the grid is read
    #[serde(default = "default_page_load_ms")]
    pub page_load_ms: u64,
}

/// Validated timeouts ready for use
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub element: std::time::Duration,
    pub navigation: std::time::Duration,
    pub settle: std::time::Duration,
    pub page_load: std::time::Duration,
}

/// Defaults for a booking request; CLI flags override each of them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingDefaults {
    #[serde(default = "default_days_ahead")]
    pub days_ahead: u32,

    #[serde(default = "default_time")]
    pub time: String,

    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: u32,

    #[serde(default)]
    pub guest_player: Option<String>,

    /// Only consider courts whose header says Singles
    #[serde(default = "default_singles_only")]
    pub singles_only: bool,

    /// Length of one "Reserve" cell in the grid
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: u32,

    #[serde(default)]
    pub peak_windows: PeakWindows,
}

/// Hours during which the club only accepts Singles reservations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeakWindows {
    #[serde(default = "default_weekday_window")]
    pub weekday: TimeWindow,

    #[serde(default = "default_weekend_window")]
    pub weekend: TimeWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    #[serde(default = "default_screenshots")]
    pub screenshots: bool,

    #[serde(default = "default_artifact_dir")]
    pub dir: PathBuf,
}

fn default_base_url() -> String {
    "https://app.courtreserve.com".to_string()
}
fn default_organization_id() -> u32 {
    11122
}
fn default_scheduler_id() -> u32 {
    15491
}
fn default_portal_marker() -> String {
    "Portal".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

fn default_element_ms() -> u64 {
    20_000
}
fn default_navigation_ms() -> u64 {
    30_000
}
fn default_settle_ms() -> u64 {
    2_000
}
fn default_page_load_ms() -> u64 {
    5_000
}

fn default_days_ahead() -> u32 {
    14
}
fn default_time() -> String {
    "5:00 PM".to_string()
}
fn default_duration_minutes() -> u32 {
    45
}
fn default_singles_only() -> bool {
    true
}
fn default_slot_minutes() -> u32 {
    30
}

fn default_weekday_window() -> TimeWindow {
    TimeWindow::from_hm((16, 30), (21, 0))
}
fn default_weekend_window() -> TimeWindow {
    TimeWindow::from_hm((10, 30), (15, 0))
}

fn default_screenshots() -> bool {
    true
}
fn default_artifact_dir() -> PathBuf {
    PathBuf::from("screenshots")
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            organization_id: default_organization_id(),
            scheduler_id: default_scheduler_id(),
            portal_marker: default_portal_marker(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            disable_security: false,
            window: WindowConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            element_ms: default_element_ms(),
            navigation_ms: default_navigation_ms(),
            settle_ms: default_settle_ms(),
            page_load_ms: default_page_load_ms(),
        }
    }
}

impl Default for BookingDefaults {
    fn default() -> Self {
        Self {
            days_ahead: default_days_ahead(),
            time: default_time(),
            duration_minutes: default_duration_minutes(),
            guest_player: None,
            singles_only: default_singles_only(),
            slot_minutes: default_slot_minutes(),
            peak_windows: PeakWindows::default(),
        }
    }
}

impl Default for PeakWindows {
    fn default() -> Self {
        Self {
            weekday: default_weekday_window(),
            weekend: default_weekend_window(),
        }
    }
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            screenshots: default_screenshots(),
            dir: default_artifact_dir(),
        }
    }
}

impl TimeoutConfig {
    /// Check every timeout against its cap
    pub fn validated(&self) -> BookingResult<Timeouts> {
        use crate::utils::{validate_interaction_timeout, validate_navigation_timeout};

        Ok(Timeouts {
            element: validate_interaction_timeout(Some(self.element_ms), default_element_ms())?,
            navigation: validate_navigation_timeout(Some(self.navigation_ms), default_navigation_ms())?,
            settle: validate_interaction_timeout(Some(self.settle_ms), default_settle_ms())?,
            page_load: validate_navigation_timeout(Some(self.page_load_ms), default_page_load_ms())?,
        })
    }
}

impl Config {
    /// Apply environment overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides using `lookup` as the environment
    ///
    /// - `INPUT_DAYS_AHEAD`: days ahead (ignored with a warning if not a number)
    /// - `ESC_ADDITIONAL_PLAYER`: guest player, empty value clears it
    /// - `HEADLESS`: `true`/`false`
    /// - `GITHUB_ACTIONS=true`: forces headless
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("INPUT_DAYS_AHEAD") {
            match raw.trim().parse::<u32>() {
                Ok(days) => self.booking.days_ahead = days,
                Err(_) => tracing::warn!("Ignoring non-numeric INPUT_DAYS_AHEAD={:?}", raw),
            }
        }

        if let Some(player) = lookup("ESC_ADDITIONAL_PLAYER") {
            let player = player.trim();
            self.booking.guest_player = (!player.is_empty()).then(|| player.to_string());
        }

        if let Some(raw) = lookup("HEADLESS") {
            match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => self.browser.headless = true,
                "false" | "0" | "no" => self.browser.headless = false,
                other => tracing::warn!("Ignoring unrecognised HEADLESS={:?}", other),
            }
        }

        if is_ci(&lookup) {
            self.browser.headless = true;
        }
    }

    /// `{base}/Online/Account/LogIn/{org}`
    pub fn login_url(&self) -> BookingResult<url::Url> {
        self.site_url(&format!("Online/Account/LogIn/{}", self.site.organization_id))
    }

    /// `{base}/Online/Reservations/Bookings/{org}?sId={scheduler}`
    pub fn bookings_url(&self) -> BookingResult<url::Url> {
        let mut url = self.site_url(&format!(
            "Online/Reservations/Bookings/{}",
            self.site.organization_id
        ))?;
        url.query_pairs_mut()
            .append_pair("sId", &self.site.scheduler_id.to_string());
        Ok(url)
    }

    fn site_url(&self, path: &str) -> BookingResult<url::Url> {
        let mut base = url::Url::parse(&self.site.base_url)
            .map_err(|e| BookingError::Config(format!("Invalid base_url '{}': {e}", self.site.base_url)))?;
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path)
            .map_err(|e| BookingError::Config(format!("Cannot build URL for '{path}': {e}")))
    }
}

/// Whether this process runs under GitHub Actions
pub fn running_on_ci() -> bool {
    is_ci(&|key: &str| std::env::var(key).ok())
}

/// Running under GitHub Actions
fn is_ci<F>(lookup: &F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup("GITHUB_ACTIONS").is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

/// Load config from a YAML file
///
/// With no explicit path, `courtbook.yaml` in the working directory is used if
/// it exists; otherwise the built-in defaults apply. An explicit path that does
/// not exist is an error.
pub fn load_yaml_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let (config_path, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };

    if config_path.exists() {
        let contents = fs::read_to_string(&config_path)?;
        let config: Config = if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&contents)?
        };
        tracing::debug!("Loaded config from {}", config_path.display());
        Ok(config)
    } else if required {
        Err(anyhow::anyhow!("Config file not found: {}", config_path.display()))
    } else {
        Ok(Config::default())
    }
}

/// Login credentials read from `ESC_USERNAME` / `ESC_PASSWORD`
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read credentials from the environment, loading `.env` first
    pub fn from_env() -> BookingResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> BookingResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| BookingError::Config(format!("{key} must be set in the environment")))
        };

        Ok(Self {
            username: read("ESC_USERNAME")?,
            password: read("ESC_PASSWORD")?,
        })
    }
}

pub use booking::{Booker, BookingReport};
pub use browser::{BrowserError, BrowserResult, BrowserWrapper};
pub use browser_setup::{download_managed_browser, find_browser_executable, launch_browser};
pub use manager::BrowserManager;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_yaml_yields_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.site.organization_id, 11122);
        assert_eq!(config.site.scheduler_id, 15491);
        assert_eq!(config.booking.days_ahead, 14);
        assert_eq!(config.booking.time, "5:00 PM");
        assert_eq!(config.booking.slot_minutes, 30);
        assert!(config.booking.singles_only);
        assert!(config.browser.headless);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = r#"
booking:
  time: "6:30 PM"
  peak_windows:
    weekday:
      start: "17:00"
      end: "20:00"
browser:
  headless: false
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.booking.time, "6:30 PM");
        assert_eq!(config.booking.duration_minutes, 45);
        assert!(!config.browser.headless);
        assert_eq!(config.browser.window.width, 1920);
        assert_eq!(
            config.booking.peak_windows.weekday,
            TimeWindow::from_hm((17, 0), (20, 0))
        );
        assert_eq!(
            config.booking.peak_windows.weekend,
            TimeWindow::from_hm((10, 30), (15, 0))
        );
    }

    #[test]
    fn env_overrides_days_player_and_headless() {
        let mut config = Config::default();
        config.browser.headless = true;
        config.apply_env_from(env(&[
            ("INPUT_DAYS_AHEAD", "7"),
            ("ESC_ADDITIONAL_PLAYER", "  Jamie Rivera "),
            ("HEADLESS", "false"),
        ]));
        assert_eq!(config.booking.days_ahead, 7);
        assert_eq!(config.booking.guest_player.as_deref(), Some("Jamie Rivera"));
        assert!(!config.browser.headless);
    }

    #[test]
    fn empty_player_env_clears_guest() {
        let mut config = Config::default();
        config.booking.guest_player = Some("Someone".into());
        config.apply_env_from(env(&[("ESC_ADDITIONAL_PLAYER", "")]));
        assert!(config.booking.guest_player.is_none());
    }

    #[test]
    fn ci_forces_headless_and_bad_numbers_are_ignored() {
        let mut config = Config::default();
        config.apply_env_from(env(&[
            ("HEADLESS", "false"),
            ("GITHUB_ACTIONS", "true"),
            ("INPUT_DAYS_AHEAD", "two weeks"),
        ]));
        assert!(config.browser.headless);
        assert_eq!(config.booking.days_ahead, 14);
    }

    #[test]
    fn site_urls_follow_courtreserve_layout() {
        let config = Config::default();
        assert_eq!(
            config.login_url().unwrap().as_str(),
            "https://app.courtreserve.com/Online/Account/LogIn/11122"
        );
        assert_eq!(
            config.bookings_url().unwrap().as_str(),
            "https://app.courtreserve.com/Online/Reservations/Bookings/11122?sId=15491"
        );
    }

    #[test]
    fn base_url_with_path_prefix_is_preserved() {
        let mut config = Config::default();
        config.site.base_url = "http://localhost:8080/mirror".into();
        assert_eq!(
            config.login_url().unwrap().as_str(),
            "http://localhost:8080/mirror/Online/Account/LogIn/11122"
        );
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let mut config = Config::default();
        config.site.base_url = "not a url".into();
        assert!(matches!(config.login_url(), Err(BookingError::Config(_))));
    }

    #[test]
    fn oversized_timeouts_fail_validation() {
        let mut timeouts = TimeoutConfig::default();
        assert!(timeouts.validated().is_ok());
        timeouts.element_ms = 120_000;
        assert!(timeouts.validated().is_err());
    }

    #[test]
    fn credentials_require_both_values() {
        let creds = Credentials::from_lookup(env(&[
            ("ESC_USERNAME", "player@example.com"),
            ("ESC_PASSWORD", "hunter2"),
        ]))
        .unwrap();
        assert_eq!(creds.username, "player@example.com");
        assert!(!format!("{creds:?}").contains("hunter2"));

        let missing = Credentials::from_lookup(env(&[("ESC_USERNAME", "player@example.com")]));
        assert!(matches!(missing, Err(BookingError::Config(msg)) if msg.contains("ESC_PASSWORD")));

        let blank = Credentials::from_lookup(env(&[("ESC_USERNAME", " "), ("ESC_PASSWORD", "x")]));
        assert!(blank.is_err());
    }

    #[test]
    fn missing_default_config_file_is_not_an_error() {
        let config = load_yaml_config(None);
        assert!(config.is_ok());
    }

    #[test]
    fn missing_explicit_config_file_is_an_error() {
        assert!(load_yaml_config(Some(Path::new("/nonexistent/courtbook.yaml"))).is_err());
    }
}
