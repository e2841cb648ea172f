// xkcdlock - Lock the screen with an xkcd comic
// Picks a comic, composites it for the screen and hands it to the locker

mod app;
mod bulk;
mod cli;
mod comic;
mod config;
mod display;
mod error;
mod fetcher;
mod image_loader;
mod lock;
mod logging;
mod pipeline;
mod resolver;
mod scrape;
mod text;
mod wayland;
mod x11;

use anyhow::Result;
use log::info;
use std::process;

fn main() {
    if let Err(err) = run() {
        eprintln!("xkcdlock: {:#}", err);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse command line arguments
    let args = cli::parse_args()?;

    // Console shows logs only with -v; warnings always go to syslog
    logging::init(args.verbose);

    info!("Starting xkcdlock: {:?}", args.config.mode);

    let app = app::App::new(args.config)?;
    match args.command {
        cli::Command::Lock => app.lock(),
        cli::Command::DownloadAll => app.download_all().map(|summary| {
            println!(
                "{} downloaded, {} already present, {} failed",
                summary.downloaded, summary.skipped, summary.failed
            );
        }),
    }
}
