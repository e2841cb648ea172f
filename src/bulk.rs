// Bulk download module
// Mirrors every published comic into the image directory as canonical files

use crate::comic::file_stem;
use crate::error::LockError;
use crate::fetcher::RemoteComicFetcher;
use crate::image_loader::{extension_for, load_image, AssetFormat};
use anyhow::{Context, Result};
use image::ImageFormat;
use log::{debug, info, warn};
use std::fs;
use std::io::{ErrorKind, Write};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use tempfile::NamedTempFile;

/// Extensions that count as "already downloaded" for a comic number
const KNOWN_EXTENSIONS: &[&str] = &["png", "gif", "jpg", "jpeg", "webp", "bmp", "tif", "tiff"];

/// How often and how patiently a failed request is retried
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Delay before the first retry, doubled for each further one
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// What happened to one comic number
#[derive(Debug)]
enum Outcome {
    Downloaded(PathBuf),
    Skipped,
    Failed,
}

/// Totals for one bulk run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct BulkDownloader {
    fetcher: RemoteComicFetcher,
    dir: PathBuf,
    jobs: usize,
    retry: RetryPolicy,
}

impl BulkDownloader {
    pub fn new(fetcher: RemoteComicFetcher, dir: &Path, jobs: usize) -> Self {
        Self {
            fetcher,
            dir: dir.to_path_buf(),
            jobs: jobs.max(1),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Download every comic from 1 up to the current catalog size.
    /// An unreadable catalog size aborts before anything is downloaded.
    pub fn run(&self) -> Result<Summary> {
        let total = self.fetcher.catalog_size()?;
        info!("Catalog has {} comics, mirroring into {}", total, self.dir.display());
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let summary = self.download_range(1..=total);
        info!(
            "Bulk download finished: {} downloaded, {} already present, {} failed",
            summary.downloaded, summary.skipped, summary.failed
        );
        Ok(summary)
    }

    /// Work through `numbers` with at most `jobs` concurrent downloads
    pub fn download_range(&self, numbers: RangeInclusive<u32>) -> Summary {
        let (queue_tx, queue_rx) = mpsc::channel();
        for number in numbers {
            // The receiver is alive until the end of this function
            let _ = queue_tx.send(number);
        }
        drop(queue_tx);
        let queue = Mutex::new(queue_rx);
        let (result_tx, result_rx) = mpsc::channel();

        thread::scope(|scope| {
            for worker in 0..self.jobs {
                let queue = &queue;
                let result_tx = result_tx.clone();
                scope.spawn(move || loop {
                    let next = match queue.lock() {
                        Ok(rx) => rx.recv(),
                        Err(_) => break,
                    };
                    let Ok(number) = next else { break };
                    debug!("Worker {} takes comic {}", worker, number);
                    let _ = result_tx.send(self.process(number));
                });
            }
        });
        drop(result_tx);

        let mut summary = Summary::default();
        for outcome in result_rx {
            match outcome {
                Outcome::Downloaded(_) => summary.downloaded += 1,
                Outcome::Skipped => summary.skipped += 1,
                Outcome::Failed => summary.failed += 1,
            }
        }
        summary
    }

    fn process(&self, number: u32) -> Outcome {
        if let Some(existing) = existing_file(&self.dir, number) {
            debug!("Comic {} already at {}", number, existing.display());
            return Outcome::Skipped;
        }

        let mut delay = self.retry.base_delay;
        let mut attempt = 1;
        loop {
            match self.download(number) {
                Ok(path) => {
                    info!("Saved comic {} to {}", number, path.display());
                    return Outcome::Downloaded(path);
                }
                Err(e) if attempt < self.retry.attempts && is_transient(&e) => {
                    debug!("Comic {} attempt {} failed ({:#}), retrying in {:?}", number, attempt, e, delay);
                    thread::sleep(delay);
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => {
                    warn!("Skipping comic {}: {:#}", number, e);
                    return Outcome::Failed;
                }
            }
        }
    }

    /// Fetch one comic and move it into place under its canonical name
    fn download(&self, number: u32) -> Result<PathBuf> {
        let comic = self.fetcher.by_number(number)?;
        let bytes = self.fetcher.download(&comic.hotlink_url)?;
        let format = image::guess_format(&bytes)
            .with_context(|| format!("{} is not an image", comic.hotlink_url))?;

        let mut original = NamedTempFile::new_in(&self.dir)?;
        original.write_all(&bytes)?;
        original.flush()?;

        // Lossy originals are re-encoded; the temporary original goes away on drop
        let (staged, format) = if AssetFormat::from_image_format(format).is_lossy() {
            let img = load_image(original.path())?;
            let converted = NamedTempFile::new_in(&self.dir)?;
            img.save_with_format(converted.path(), ImageFormat::Png)
                .with_context(|| format!("Failed to convert comic {} to png", number))?;
            debug!("Converted comic {} from {:?} to png", number, format);
            (converted, ImageFormat::Png)
        } else {
            (original, format)
        };

        let target = self
            .dir
            .join(format!("{}.{}", file_stem(number), extension_for(format)));
        match staged.persist_noclobber(&target) {
            Ok(_) => Ok(target),
            // Another writer got there first with a complete file
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(target),
            Err(e) => Err(e.error).with_context(|| format!("Failed to store {}", target.display())),
        }
    }
}

/// Network failures are worth retrying; scrape and decode failures are not
fn is_transient(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<LockError>(), Some(LockError::Fetch { .. }))
}

/// Canonical file for `number` in any known format, if present
fn existing_file(dir: &Path, number: u32) -> Option<PathBuf> {
    let stem = file_stem(number);
    KNOWN_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", stem, ext)))
        .find(|path| path.is_file())
}
