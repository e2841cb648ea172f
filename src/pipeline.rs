// Image transform pipeline module
// Turns a raw comic into the lock-screen composite, one verified file per stage

use crate::comic::ComicReference;
use crate::config::RenderConfig;
use crate::display::ScreenGeometry;
use crate::error::LockError;
use crate::image_loader::ImageAsset;
use crate::text::{fill_rect, wrap_caption, TextRenderer};
use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, RgbaImage};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Space between the caption text and the edge of its backing box
const CAPTION_BOX_MARGIN: u32 = 8;

/// A stage's output file; intermediates delete themselves when dropped
struct StageFile {
    asset: ImageAsset,
    owned: bool,
}

impl StageFile {
    /// The caller's raw image, never deleted
    fn borrowed(asset: &ImageAsset) -> Self {
        Self {
            asset: asset.clone(),
            owned: false,
        }
    }
}

impl Drop for StageFile {
    fn drop(&mut self) {
        if self.owned {
            if let Err(e) = fs::remove_file(&self.asset.path) {
                debug!("Could not remove {}: {}", self.asset.path.display(), e);
            }
        }
    }
}

/// Result of a successful pipeline run
#[derive(Debug, Clone)]
pub struct Composite {
    pub asset: ImageAsset,
    pub screen: ScreenGeometry,
    /// Box the comic was resized into
    pub target: (u32, u32),
}

/// Resize, center and annotate a raw comic for one screen
pub struct ImageTransformPipeline<'a> {
    render: &'a RenderConfig,
    screen: ScreenGeometry,
    /// Per-invocation directory holding intermediate stage files
    scratch: &'a Path,
    text: Option<TextRenderer>,
}

impl<'a> ImageTransformPipeline<'a> {
    pub fn new(render: &'a RenderConfig, screen: ScreenGeometry, scratch: &'a Path) -> Self {
        Self {
            render,
            screen,
            scratch,
            text: None,
        }
    }

    /// Run every stage and publish the composite at `output`
    pub fn run(
        &mut self,
        raw: &ImageAsset,
        comic: Option<&ComicReference>,
        output: &Path,
    ) -> Result<Composite> {
        if !raw.exists() {
            return Err(LockError::MissingAsset(raw.path.clone()).into());
        }

        let target = self.screen.target_size(self.render.padding)?;
        info!(
            "Compositing {} for {} (target {}x{})",
            raw.path.display(),
            self.screen,
            target.0,
            target.1
        );

        let mut current = StageFile::borrowed(raw);
        current = self.stage("resize", current, |_, img| Ok(resize(img, target)))?;
        current = self.stage("center", current, |this, img| {
            Ok(center(img, this.screen, this.render))
        })?;
        if let Some(comic) = comic {
            current = self.stage("number", current, |this, img| {
                Ok(this.annotate_number(img, comic.number))
            })?;
            if !comic.caption.trim().is_empty() {
                current = self.stage("caption", current, |this, img| {
                    Ok(this.annotate_caption(img, &comic.caption))
                })?;
            }
        }

        let asset = publish(&current.asset.path, output)?;
        Ok(Composite {
            asset,
            screen: self.screen,
            target,
        })
    }

    /// Load the input, transform it, write a fresh PNG and check it landed.
    /// The input file is released once the output exists.
    fn stage<F>(&mut self, name: &'static str, input: StageFile, transform: F) -> Result<StageFile>
    where
        F: FnOnce(&mut Self, DynamicImage) -> Result<DynamicImage>,
    {
        let img = input.asset.load()?;
        let out = transform(&mut *self, img)?;

        let path = self.scratch.join(format!("{}.png", name));
        out.save_with_format(&path, ImageFormat::Png)
            .with_context(|| format!("{} stage failed to write {}", name, path.display()))?;
        let output = StageFile {
            asset: ImageAsset::new(&path),
            owned: true,
        };
        verify(name, &output.asset.path)?;
        debug!("{} stage wrote {}x{} to {}", name, out.width(), out.height(), path.display());

        drop(input);
        Ok(output)
    }

    fn renderer(&mut self) -> &mut TextRenderer {
        let render = self.render;
        self.text.get_or_insert_with(|| TextRenderer::new(&render.font))
    }

    /// `#<number>` in the upper-right corner
    fn annotate_number(&mut self, img: DynamicImage, number: u32) -> DynamicImage {
        let inset = (self.render.padding / 2) as i32;
        let size = self.render.number_size;
        let colour = self.render.text_colour;

        let mut canvas = img.to_rgba8();
        let text = self.renderer();
        let mut block = text.layout(&format!("#{}", number), size);
        let x = canvas.width() as i32 - inset - block.width as i32;
        text.draw(&mut canvas, &mut block, x, inset, colour);
        DynamicImage::ImageRgba8(canvas)
    }

    /// Wrapped caption over a translucent box in the lower-left corner
    fn annotate_caption(&mut self, img: DynamicImage, caption: &str) -> DynamicImage {
        let inset = (self.render.padding / 2) as i32;
        let margin = CAPTION_BOX_MARGIN as i32;
        let render = self.render;

        let lines: Vec<String> = wrap_caption(caption, render.wrap_width)
            .into_iter()
            .map(|line| line.text.replace('\n', " "))
            .collect();

        let mut canvas = img.to_rgba8();
        let text = self.renderer();
        let mut block = text.layout(&lines.join("\n"), render.caption_size);
        if block.width == 0 || block.height == 0 {
            debug!("Caption shaped to nothing, skipping");
            return DynamicImage::ImageRgba8(canvas);
        }

        let box_w = block.width + 2 * CAPTION_BOX_MARGIN;
        let box_h = block.height + 2 * CAPTION_BOX_MARGIN;
        let box_y = canvas.height() as i32 - inset - box_h as i32;
        fill_rect(&mut canvas, inset, box_y, box_w, box_h, render.caption_box);
        text.draw(
            &mut canvas,
            &mut block,
            inset + margin,
            box_y + margin,
            render.caption_colour,
        );
        DynamicImage::ImageRgba8(canvas)
    }
}

/// Scale into the target box, keeping the aspect ratio
fn resize(img: DynamicImage, (width, height): (u32, u32)) -> DynamicImage {
    img.resize(width, height, FilterType::Lanczos3)
}

/// Place the image in the middle of a screen-sized canvas
fn center(img: DynamicImage, screen: ScreenGeometry, render: &RenderConfig) -> DynamicImage {
    let mut canvas = RgbaImage::from_pixel(screen.width, screen.height, render.background.rgba());
    let x = (screen.width as i64 - img.width() as i64) / 2;
    let y = (screen.height as i64 - img.height() as i64) / 2;
    imageops::overlay(&mut canvas, &img.to_rgba8(), x, y);
    DynamicImage::ImageRgba8(canvas)
}

fn verify(stage: &'static str, path: &Path) -> Result<(), LockError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(LockError::TransformIntegrity {
            stage,
            path: path.to_path_buf(),
        })
    }
}

/// Move the final stage file into place atomically.
///
/// The bytes are copied to a temporary file next to `output` and renamed over
/// it, so a concurrently running lock program never sees a partial image.
fn publish(finished: &Path, output: &Path) -> Result<ImageAsset> {
    let dir = match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let staged = NamedTempFile::new_in(&dir)
        .with_context(|| format!("Failed to create a temporary file in {}", dir.display()))?;
    fs::copy(finished, staged.path())
        .with_context(|| format!("Failed to copy composite to {}", staged.path().display()))?;
    staged
        .persist(output)
        .with_context(|| format!("Failed to move composite to {}", output.display()))?;

    verify("publish", output)?;
    info!("Composite written to {}", output.display());
    Ok(ImageAsset::new(output))
}
