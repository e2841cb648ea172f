// Configuration module
// Immutable settings built once at startup and passed to every component

use crate::display::ScreenGeometry;
use crate::lock::LockProgram;
use anyhow::{anyhow, Result};
use directories::{ProjectDirs, UserDirs};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Landing page of the comic site; permalinks are `<base>/<number>/`
pub const DEFAULT_BASE_URL: &str = "https://xkcd.com";

/// Default worker count for bulk downloads
pub const DEFAULT_JOBS: usize = 4;

/// Which image the resolver should hand to the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionMode {
    /// Uniform pick from the local image directory
    Random,
    /// Newest comic from the site, default image on failure
    Latest,
    /// A file given on the command line
    Explicit(PathBuf),
}

/// An RGBA colour parsed from `#rrggbb`, `#rrggbbaa` or a few names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Colour(pub [u8; 4]);

impl Colour {
    pub const WHITE: Colour = Colour([255, 255, 255, 255]);
    pub const BLACK: Colour = Colour([0, 0, 0, 255]);

    pub fn rgba(self) -> image::Rgba<u8> {
        image::Rgba(self.0)
    }
}

impl FromStr for Colour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "white" => return Ok(Colour::WHITE),
            "black" => return Ok(Colour::BLACK),
            "gray" | "grey" => return Ok(Colour([128, 128, 128, 255])),
            _ => {}
        }

        let hex = s.trim_start_matches('#');
        if !matches!(hex.len(), 6 | 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("invalid colour '{}', expected #rrggbb or #rrggbbaa", s));
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| e.to_string());
        let alpha = if hex.len() == 8 { byte(6)? } else { 255 };
        Ok(Colour([byte(0)?, byte(2)?, byte(4)?, alpha]))
    }
}

/// Font used for annotations: a family name known to fontconfig or a font file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontRef {
    Family(String),
    File(PathBuf),
}

impl FromStr for FontRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err("font must not be empty".to_string());
        }
        let path = Path::new(s);
        let is_font_file = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc"))
            .unwrap_or(false);
        if is_font_file {
            Ok(FontRef::File(path.to_path_buf()))
        } else {
            Ok(FontRef::Family(s.to_string()))
        }
    }
}

/// Fixed parameters of the compositing stages
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Canvas fill behind the comic
    pub background: Colour,
    /// Colour of the comic number
    pub text_colour: Colour,
    /// Space kept free on each axis between the comic and the screen edge
    pub padding: u32,
    pub font: FontRef,
    /// Caption column limit
    pub wrap_width: usize,
    pub number_size: f32,
    pub caption_size: f32,
    /// Semi-transparent box drawn under the caption
    pub caption_box: Colour,
    pub caption_colour: Colour,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            background: Colour::WHITE,
            text_colour: Colour::BLACK,
            padding: 100,
            font: FontRef::Family("xkcd Script".to_string()),
            wrap_width: 100,
            number_size: 48.0,
            caption_size: 20.0,
            caption_box: Colour([0, 0, 0, 160]),
            caption_colour: Colour::WHITE,
        }
    }
}

/// Everything one invocation needs, resolved from the command line
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: SelectionMode,
    /// Pool for random picks and target of bulk downloads
    pub image_dir: PathBuf,
    /// Where the bundled default image is written out
    pub data_dir: PathBuf,
    /// Final composite location
    pub output: PathBuf,
    pub base_url: String,
    pub lock: LockProgram,
    /// Skip display probing and composite for this size
    pub screen: Option<ScreenGeometry>,
    /// Bulk download worker count
    pub jobs: usize,
    pub render: RenderConfig,
}

impl Config {
    /// Path of the default image inside the data directory
    pub fn default_image(&self) -> PathBuf {
        self.data_dir.join("default.png")
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("com", "xkcd", "xkcdlock")
        .ok_or_else(|| anyhow!("cannot determine home directory"))
}

/// `~/Pictures/xkcd`, or `~/xkcd` when the platform has no pictures folder
pub fn default_image_dir() -> Result<PathBuf> {
    let user = UserDirs::new().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(match user.picture_dir() {
        Some(pictures) => pictures.join("xkcd"),
        None => user.home_dir().join("xkcd"),
    })
}

pub fn default_data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

pub fn default_output() -> Result<PathBuf> {
    Ok(project_dirs()?.cache_dir().join("lockscreen.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colours() {
        assert_eq!("#ff8000".parse::<Colour>().unwrap(), Colour([255, 128, 0, 255]));
        assert_eq!("000000a0".parse::<Colour>().unwrap(), Colour([0, 0, 0, 160]));
        assert_eq!("White".parse::<Colour>().unwrap(), Colour::WHITE);
    }

    #[test]
    fn rejects_malformed_colours() {
        assert!("#fff".parse::<Colour>().is_err());
        assert!("#gggggg".parse::<Colour>().is_err());
        assert!("".parse::<Colour>().is_err());
    }

    #[test]
    fn font_files_are_told_apart_from_families() {
        assert_eq!(
            "/usr/share/fonts/xkcd.otf".parse::<FontRef>().unwrap(),
            FontRef::File(PathBuf::from("/usr/share/fonts/xkcd.otf"))
        );
        assert_eq!(
            "DejaVu Sans".parse::<FontRef>().unwrap(),
            FontRef::Family("DejaVu Sans".to_string())
        );
    }

    #[test]
    fn render_defaults() {
        let render = RenderConfig::default();
        assert_eq!(render.padding, 100);
        assert_eq!(render.wrap_width, 100);
        assert!(render.caption_box.0[3] < 255);
    }
}
