// Application module
// Wires resolver, pipeline, downloader and locker together for one invocation

use crate::bulk::{BulkDownloader, Summary};
use crate::config::Config;
use crate::display::{self, DisplayServer, DisplaySource, FirstAvailable, FixedDisplay};
use crate::fetcher::{HttpSource, PageSource, RemoteComicFetcher};
use crate::lock;
use crate::pipeline::{Composite, ImageTransformPipeline};
use crate::resolver::{ImageSourceResolver, ResolvedImage};
use crate::wayland::WaylandDisplays;
use crate::x11::X11Displays;
use anyhow::{Context, Result};
use log::{debug, info};
use std::env;
use std::sync::Arc;

/// Outcome of preparing a lock screen
#[derive(Debug)]
pub struct Prepared {
    /// The raw image that went into the pipeline
    pub resolved: ResolvedImage,
    pub composite: Composite,
}

pub struct App {
    config: Config,
    fetcher: RemoteComicFetcher,
}

impl App {
    /// Application talking to the real site over HTTP
    pub fn new(config: Config) -> Result<Self> {
        let source = HttpSource::new().context("Failed to build HTTP client")?;
        Ok(Self::with_source(config, Arc::new(source)))
    }

    pub fn with_source(config: Config, source: Arc<dyn PageSource>) -> Self {
        let fetcher = RemoteComicFetcher::new(source, &config.base_url);
        Self { config, fetcher }
    }

    /// `--screen` if given, otherwise whatever the session's display server reports
    fn displays(&self) -> Box<dyn DisplaySource> {
        match self.config.screen {
            Some(screen) => Box::new(FixedDisplay(vec![screen])),
            None => {
                let order = display::server_order(env::var_os("WAYLAND_DISPLAY").as_deref());
                debug!("Display servers to query: {:?}", order);
                Box::new(FirstAvailable(order.into_iter().map(server_source).collect()))
            }
        }
    }

    /// Resolve the raw image and build the composite at the configured output
    pub fn prepare(&self, displays: &dyn DisplaySource) -> Result<Prepared> {
        // Per-invocation scratch space; removed with everything in it on return
        let scratch = tempfile::Builder::new()
            .prefix("xkcdlock-")
            .tempdir()
            .context("Failed to create scratch directory")?;
        let default_image = self.config.default_image();

        let resolver = ImageSourceResolver::new(
            &self.fetcher,
            &self.config.image_dir,
            &default_image,
            scratch.path(),
        );
        let resolved = resolver.resolve(&self.config.mode)?;
        info!(
            "Using {} ({:?})",
            resolved.asset.path.display(),
            resolved.asset.format
        );

        let screen = display::max_area(displays)?;
        let mut pipeline = ImageTransformPipeline::new(&self.config.render, screen, scratch.path());
        let composite = pipeline.run(
            &resolved.asset,
            resolved.comic.as_ref(),
            &self.config.output,
        )?;

        Ok(Prepared { resolved, composite })
    }

    /// Prepare the composite and hand it to the lock program
    pub fn lock(&self) -> Result<()> {
        lock::check_available(self.config.lock)?;
        let prepared = self.prepare(self.displays().as_ref())?;
        lock::lock_screen(self.config.lock, &prepared.composite.asset.path)
    }

    /// Mirror the whole catalog into the image directory
    pub fn download_all(&self) -> Result<Summary> {
        BulkDownloader::new(self.fetcher.clone(), &self.config.image_dir, self.config.jobs).run()
    }
}

fn server_source(server: DisplayServer) -> Box<dyn DisplaySource> {
    match server {
        DisplayServer::Wayland => Box::new(WaylandDisplays),
        DisplayServer::X11 => Box::new(X11Displays),
    }
}
