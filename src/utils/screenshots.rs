//! Best-effort screenshots of each booking milestone
//!
//! Headless runs on CI leave nothing to look at when the site changes its markup,
//! so every step saves a PNG. A failed capture is logged and never aborts a run.

use std::path::PathBuf;

use chromiumoxide::Page;
use chromiumoxide::page::ScreenshotParams;
use tracing::{debug, warn};

use crate::ArtifactConfig;

#[derive(Debug, Clone)]
pub struct Screenshots {
    dir: Option<PathBuf>,
}

impl Screenshots {
    pub fn new(config: &ArtifactConfig) -> Self {
        let dir = config.screenshots.then(|| config.dir.clone());
        Self { dir }
    }

    /// Screenshots switched off
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    /// Target path for a milestone name, if capturing is enabled
    pub fn path_for(&self, name: &str) -> Option<PathBuf> {
        let file = format!("{}.png", sanitize(name));
        self.dir.as_ref().map(|dir| dir.join(file))
    }

    pub async fn capture(&self, page: &Page, name: &str) {
        let Some(path) = self.path_for(name) else {
            return;
        };

        if let Some(parent) = path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!("Cannot create screenshot dir {}: {}", parent.display(), e);
            return;
        }

        let params = ScreenshotParams::builder().full_page(true).build();
        match page.save_screenshot(params, &path).await {
            Ok(_) => debug!("Screenshot saved: {}", path.display()),
            Err(e) => warn!("Screenshot '{}' failed: {}", name, e),
        }
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_has_no_paths() {
        assert!(Screenshots::disabled().path_for("login_page").is_none());
    }

    #[test]
    fn names_are_sanitized_into_png_files() {
        let shots = Screenshots::new(&ArtifactConfig {
            screenshots: true,
            dir: PathBuf::from("artifacts"),
        });
        assert_eq!(
            shots.path_for("after submit/2"),
            Some(PathBuf::from("artifacts/after_submit_2.png"))
        );
    }
}
