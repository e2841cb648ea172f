// Command line interface module
// Parses arguments into the immutable run configuration

use crate::config::{self, Colour, Config, FontRef, RenderConfig, SelectionMode};
use crate::display::ScreenGeometry;
use crate::lock::LockProgram;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// How to pick the comic when no image path is given
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Random,
    Latest,
}

/// xkcdlock - Lock the screen with an xkcd comic
#[derive(Parser, Debug)]
#[command(name = "xkcdlock")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Image to show instead of picking one (overrides --mode)
    #[arg(value_name = "IMAGE")]
    pub image_path: Option<PathBuf>,

    /// Pick a random local comic or fetch the newest one
    #[arg(short, long, value_enum, default_value = "random")]
    pub mode: Mode,

    /// Print progress and degradations to the console
    #[arg(short, long)]
    pub verbose: bool,

    /// Screen locker to run with the composite
    #[arg(short, long, value_enum, default_value = "i3lock")]
    pub lock: LockProgram,

    /// Directory of comics for random mode and bulk downloads
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Pixels kept free between the comic and the screen edges
    #[arg(long, default_value = "100")]
    pub padding: u32,

    /// Canvas colour (#rrggbb, #rrggbbaa, white, black)
    #[arg(long, default_value = "white")]
    pub background: Colour,

    /// Colour of the comic number
    #[arg(long, default_value = "black")]
    pub text_colour: Colour,

    /// Font family name or path to a .ttf/.otf file
    #[arg(long, default_value = "xkcd Script")]
    pub font: FontRef,

    /// Caption column limit
    #[arg(long, default_value = "100", value_parser = clap::value_parser!(u16).range(10..))]
    pub wrap: u16,

    /// Composite for this resolution instead of querying the displays
    #[arg(long, value_name = "WIDTHxHEIGHT")]
    pub screen: Option<ScreenGeometry>,

    /// Where to write the composite
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Download every published comic into the image directory and exit
    #[arg(long)]
    pub download_all: bool,

    /// Concurrent downloads for --download-all
    #[arg(short, long, default_value_t = config::DEFAULT_JOBS, value_parser = parse_jobs)]
    pub jobs: usize,

    /// Site to scrape
    #[arg(long, default_value = config::DEFAULT_BASE_URL, hide = true)]
    pub base_url: String,
}

/// What `main` should do with the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Lock,
    DownloadAll,
}

/// Parsed arguments with defaults resolved
#[derive(Debug)]
pub struct ParsedArgs {
    pub config: Config,
    pub verbose: bool,
    pub command: Command,
}

fn parse_jobs(s: &str) -> Result<usize, String> {
    let jobs: usize = s.parse().map_err(|_| "Invalid job count")?;
    if !(1..=32).contains(&jobs) {
        return Err("Jobs must be between 1 and 32".to_string());
    }
    Ok(jobs)
}

impl Args {
    /// Turn raw arguments into a configuration, filling in per-user defaults
    pub fn into_parsed(self) -> Result<ParsedArgs> {
        // An explicit image wins over the mode flag
        let mode = match self.image_path {
            Some(path) => SelectionMode::Explicit(path),
            None => match self.mode {
                Mode::Random => SelectionMode::Random,
                Mode::Latest => SelectionMode::Latest,
            },
        };

        let image_dir = match self.dir {
            Some(dir) => dir,
            None => config::default_image_dir()?,
        };
        let output = match self.output {
            Some(output) => output,
            None => config::default_output()?,
        };

        let render = RenderConfig {
            background: self.background,
            text_colour: self.text_colour,
            padding: self.padding,
            font: self.font,
            wrap_width: self.wrap as usize,
            ..RenderConfig::default()
        };

        let command = if self.download_all {
            Command::DownloadAll
        } else {
            Command::Lock
        };

        Ok(ParsedArgs {
            config: Config {
                mode,
                image_dir,
                data_dir: config::default_data_dir()?,
                output,
                base_url: self.base_url,
                lock: self.lock,
                screen: self.screen,
                jobs: self.jobs,
                render,
            },
            verbose: self.verbose,
            command,
        })
    }
}

/// Parse command line arguments
pub fn parse_args() -> Result<ParsedArgs> {
    Args::parse().into_parsed()
}
