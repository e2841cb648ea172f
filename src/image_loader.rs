// Image loading module
// On-disk image assets: format detection, decoding and the local image pool

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Coarse format of an asset; only the lossy/lossless split matters downstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetFormat {
    Png,
    Jpg,
    Other,
}

impl AssetFormat {
    pub fn from_image_format(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Png => AssetFormat::Png,
            ImageFormat::Jpeg => AssetFormat::Jpg,
            _ => AssetFormat::Other,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(OsStr::to_str)
            .and_then(format_from_extension)
            .map(Self::from_image_format)
            .unwrap_or(AssetFormat::Other)
    }

    /// Formats that lose detail on save and get normalised to PNG
    pub fn is_lossy(self) -> bool {
        self == AssetFormat::Jpg
    }
}

/// An image file produced or consumed by a pipeline stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub path: PathBuf,
    pub format: AssetFormat,
}

impl ImageAsset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = AssetFormat::from_path(&path);
        Self { path, format }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<DynamicImage> {
        load_image(&self.path)
    }
}

/// Read and decode an image file, trusting its content over its extension
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let data = fs::read(path)
        .with_context(|| format!("Failed to read image file: {}", path.display()))?;
    load_from_bytes(&data).with_context(|| format!("Failed to decode {}", path.display()))
}

/// Decode an in-memory image; the format is sniffed from its magic bytes
pub fn load_from_bytes(data: &[u8]) -> Result<DynamicImage> {
    let format = image::guess_format(data).context("Unrecognised image data")?;
    image::load_from_memory_with_format(data, format)
        .with_context(|| format!("Corrupt {:?} data", format))
}

/// Formats a pool file may be stored in, keyed by its extension (any case)
pub fn format_from_extension(ext: &str) -> Option<ImageFormat> {
    use ImageFormat::*;

    ImageFormat::from_extension(ext)
        .filter(|format| matches!(format, Png | Jpeg | Gif | WebP | Bmp | Tiff))
}

/// File extension used when storing bytes of the given format
pub fn extension_for(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("img")
}

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .and_then(format_from_extension)
        .is_some()
}

/// Regular image files directly inside `dir`, sorted
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        if entry.file_type().is_file() && is_supported_image(entry.path()) {
            images.push(entry.path().to_path_buf());
        }
    }
    images.sort();
    Ok(images)
}
