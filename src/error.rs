// Error module
// Failure taxonomy shared by the resolver, fetcher, pipeline and downloader

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by xkcdlock components.
///
/// Most variants are fatal and end the process with a non-zero status.
/// `Fetch` and `Parse` are recoverable while resolving the latest comic:
/// the resolver swaps in the bundled default image instead.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("image directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("image file does not exist: {}", .0.display())]
    MissingAsset(PathBuf),

    #[error("no image found in {}", .0.display())]
    NoImageFound(PathBuf),

    #[error("request to {url} failed: {reason}")]
    Fetch { url: String, reason: String },

    #[error("could not find {what} in page from {url}")]
    Parse { what: &'static str, url: String },

    #[error("could not determine the number of published comics: {0}")]
    CatalogSize(String),

    #[error("screen {width}x{height} is too small for {padding}px padding")]
    InvalidGeometry { width: u32, height: u32, padding: u32 },

    #[error("no connected display reported a resolution")]
    NoDisplay,

    #[error("{stage} stage did not produce {}", .path.display())]
    TransformIntegrity { stage: &'static str, path: PathBuf },

    #[error("lock program '{0}' was not found in PATH")]
    LockProgramMissing(String),

    #[error("lock program '{program}' exited with {status}")]
    LockFailed { program: String, status: String },
}

impl LockError {
    /// True for failures the latest-comic path downgrades to the default image.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LockError::Fetch { .. } | LockError::Parse { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_and_scrape_failures_are_recoverable() {
        let fetch = LockError::Fetch {
            url: "https://xkcd.com/".into(),
            reason: "timed out".into(),
        };
        let parse = LockError::Parse {
            what: "hotlink URL",
            url: "https://xkcd.com/".into(),
        };
        assert!(fetch.is_recoverable());
        assert!(parse.is_recoverable());
        assert!(!LockError::MissingAsset(PathBuf::from("/nope.png")).is_recoverable());
        assert!(!LockError::NoDisplay.is_recoverable());
    }

    #[test]
    fn diagnostics_fit_on_one_line() {
        let err = LockError::TransformIntegrity {
            stage: "resize",
            path: PathBuf::from("/tmp/x/resized.png"),
        };
        let text = err.to_string();
        assert_eq!(text, "resize stage did not produce /tmp/x/resized.png");
        assert!(!text.contains('\n'));
    }
}
