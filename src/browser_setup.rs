use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

use crate::BrowserConfig;
use crate::utils::constants::CHROME_USER_AGENT;

/// RAII guard for the temporary profile directory
///
/// Removes the directory on drop unless consumed by `into_path()`, so every
/// early return during launch cleans up after itself.
struct TempDirGuard {
    path: PathBuf,
    keep: bool,
}

impl TempDirGuard {
    fn new(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path).context("Failed to create user data directory")?;
        Ok(Self { path, keep: false })
    }

    /// Hand the directory over to the caller
    fn into_path(mut self) -> PathBuf {
        self.keep = true;
        self.path.clone()
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        if !self.keep {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!("Failed to clean up temp dir {}: {}", self.path.display(), e);
            } else {
                info!("Cleaned up temp dir after launch failure: {}", self.path.display());
            }
        }
    }
}

/// Flags added to every launch
///
/// Keeps Chrome quiet (no first-run UI, no background work) and drops the
/// obvious automation markers the booking site could key on.
const LAUNCH_FLAGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-notifications",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-extensions",
    "--disable-popup-blocking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-features=TranslateUI",
    "--disable-hang-monitor",
    "--password-store=basic",
    "--use-mock-keychain",
    "--mute-audio",
];

const INSECURE_FLAGS: &[&str] = &[
    "--disable-web-security",
    "--disable-features=IsolateOrigins,site-per-process",
    "--ignore-certificate-errors",
];

const NO_SANDBOX_FLAGS: &[&str] = &["--no-sandbox", "--disable-setuid-sandbox"];

/// Install locations checked before falling back to `which`
fn candidate_paths() -> &'static [&'static str] {
    if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"%LOCALAPPDATA%\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "~/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    }
}

/// Expand `~/` and, on Windows, `%VAR%` in a candidate path
fn expand_candidate(raw: &str) -> Option<PathBuf> {
    if let Some(rest) = raw.strip_prefix("~/") {
        return dirs::home_dir().map(|home| home.join(rest));
    }
    if raw.contains('%') && cfg!(target_os = "windows") {
        return Some(PathBuf::from(expand_windows_env_vars(raw, |name| {
            std::env::var(name).ok()
        })));
    }
    Some(PathBuf::from(raw))
}

fn which(command: &str) -> Option<PathBuf> {
    let output = Command::new("which").arg(command).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!found.is_empty()).then(|| PathBuf::from(found))
}

/// Locate Chrome: `CHROMIUM_PATH`, then the usual install paths, then `which`
pub async fn find_browser_executable() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Using browser from CHROMIUM_PATH: {}", path.display());
            return Ok(path);
        }
        warn!("CHROMIUM_PATH points to non-existent file: {}", path.display());
    }

    if let Some(path) = candidate_paths()
        .iter()
        .filter_map(|raw| expand_candidate(raw))
        .find(|path| path.exists())
    {
        info!("Found browser at: {}", path.display());
        return Ok(path);
    }

    if !cfg!(target_os = "windows")
        && let Some(path) = ["chromium", "chromium-browser", "google-chrome", "chrome"]
            .into_iter()
            .find_map(which)
    {
        info!("Found browser using 'which': {}", path.display());
        return Ok(path);
    }

    warn!("No Chrome/Chromium executable found, falling back to the managed download");
    Err(anyhow::anyhow!("Chrome/Chromium executable not found"))
}

/// Download Chromium into the user cache directory and return its executable
pub async fn download_managed_browser() -> Result<PathBuf> {
    info!("Downloading managed Chromium browser...");

    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(|| {
            let fallback = std::env::temp_dir().join(".cache");
            warn!(
                "Could not determine system cache directory, using {}",
                fallback.display()
            );
            fallback
        })
        .join("courtbook/chromium");

    std::fs::create_dir_all(&cache_dir).context("Failed to create cache directory")?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .context("Failed to build fetcher options")?,
    );

    let revision_info = fetcher.fetch().await.context("Failed to fetch browser")?;
    info!("Downloaded Chromium to: {}", revision_info.folder_path.display());

    Ok(revision_info.executable_path)
}

/// Launch Chrome for the booking site
///
/// Finds a local Chrome (or downloads one), creates the profile directory and
/// starts the CDP handler task. Returns the browser, the handler task and the
/// profile directory, which the caller must remove after the browser exits.
pub async fn launch_browser(
    config: &BrowserConfig,
    user_data_dir: Option<PathBuf>,
) -> Result<(Browser, JoinHandle<()>, PathBuf)> {
    let chrome_path = match find_browser_executable().await {
        Ok(path) => path,
        Err(_) => download_managed_browser().await?,
    };

    let user_data_dir_path = user_data_dir.unwrap_or_else(|| {
        std::env::temp_dir().join(format!("courtbook_chrome_{}", std::process::id()))
    });

    let temp_guard = TempDirGuard::new(user_data_dir_path)?;

    let mut config_builder = BrowserConfigBuilder::default()
        .request_timeout(Duration::from_secs(30))
        .window_size(config.window.width, config.window.height)
        .user_data_dir(temp_guard.path.clone())
        .chrome_executable(chrome_path);

    if config.headless {
        config_builder = config_builder.headless_mode(HeadlessMode::New);
    } else {
        config_builder = config_builder.with_head();
    }

    let mut flags: Vec<&str> = LAUNCH_FLAGS.to_vec();
    if config.disable_security {
        warn!("Disabling browser security features (disable_security=true)");
        flags.extend_from_slice(INSECURE_FLAGS);
    }
    if config.disable_security || should_disable_sandbox(|key| std::env::var(key).ok()) {
        info!("Disabling Chrome sandbox (container or CI detected)");
        flags.extend_from_slice(NO_SANDBOX_FLAGS);
    }

    config_builder = config_builder.arg(format!("--user-agent={CHROME_USER_AGENT}"));
    for flag in flags {
        config_builder = config_builder.arg(flag);
    }

    let browser_config = config_builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

    debug!("Launching browser with config: {:?}", browser_config);
    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .context("Failed to launch browser")?;

    let handler_task = task::spawn(async move {
        while let Some(h) = handler.next().await {
            if let Err(e) = h {
                let error_msg = e.to_string();
                if is_benign_handler_error(&error_msg) {
                    trace!("Suppressed benign CDP serialization error: {}", error_msg);
                } else {
                    error!("Browser handler error: {:?}", e);
                }
            }
        }
        debug!("Browser handler task completed");
    });

    let user_data_dir = temp_guard.into_path();
    info!(
        "Browser launched ({})",
        if config.headless { "headless" } else { "headed" }
    );

    Ok((browser, handler_task, user_data_dir))
}

/// Expand `%NAME%` references; unknown names stay as written and `%%` is a literal `%`
fn expand_windows_env_vars<F>(path: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('%') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        if name.is_empty() {
            out.push('%');
        } else if let Some(value) = lookup(name) {
            out.push_str(&value);
        } else {
            out.push('%');
            out.push_str(name);
            out.push('%');
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

/// CDP events chromiumoxide has no type for
///
/// See https://github.com/mattsse/chromiumoxide/issues/167
fn is_benign_handler_error(message: &str) -> bool {
    message.contains("data did not match any variant of untagged enum Message")
        || message.contains("Failed to deserialize WS response")
}

/// Containers and CI runners cannot use Chrome's setuid sandbox
fn should_disable_sandbox<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    std::path::Path::new("/.dockerenv").exists()
        || lookup("container").is_some()
        || lookup("KUBERNETES_SERVICE_HOST").is_some()
        || lookup("GITHUB_ACTIONS").is_some_and(|v| v.eq_ignore_ascii_case("true"))
        || lookup("CI").is_some_and(|v| v.eq_ignore_ascii_case("true"))
}
