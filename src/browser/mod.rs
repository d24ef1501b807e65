//! Browser infrastructure for launching and managing Chrome instances

mod wrapper;

pub use wrapper::BrowserWrapper;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),
}

pub type BrowserResult<T> = Result<T, BrowserError>;
