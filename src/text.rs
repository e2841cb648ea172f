// Text module
// Caption wrapping and annotation rendering with cosmic-text

use crate::config::{Colour, FontRef};
use cosmic_text::{Attrs, Buffer, Color, Family, FontSystem, Metrics, Shaping, SwashCache, Wrap};
use image::RgbaImage;
use log::{debug, warn};
use textwrap::core::Fragment;
use textwrap::wrap_algorithms::wrap_first_fit;
use textwrap::WordSeparator;

/// One wrapped caption line.
///
/// `text` is what gets drawn; `trailing` is the whitespace consumed by the
/// break, so `text + trailing` over all lines gives back the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedLine {
    pub text: String,
    pub trailing: String,
}

/// A word and the spaces after it, measured in characters.
///
/// Tabs, control characters and combining marks each count as one, so a
/// line's length is its `chars().count()` whatever the terminal would show.
#[derive(Debug)]
struct Piece<'a> {
    word: &'a str,
    whitespace: &'a str,
}

impl Fragment for Piece<'_> {
    fn width(&self) -> f64 {
        self.word.chars().count() as f64
    }

    fn whitespace_width(&self) -> f64 {
        self.whitespace.chars().count() as f64
    }

    fn penalty_width(&self) -> f64 {
        0.0
    }
}

/// Space-separated pieces of `body`, with words longer than `width` cut into
/// `width`-character chunks. Only the last chunk keeps the whitespace.
fn pieces(body: &str, width: usize) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    for word in WordSeparator::AsciiSpace.find_words(body) {
        let mut rest = word.word;
        while let Some((cut, _)) = rest.char_indices().nth(width) {
            pieces.push(Piece {
                word: &rest[..cut],
                whitespace: "",
            });
            rest = &rest[cut..];
        }
        pieces.push(Piece {
            word: rest,
            whitespace: word.whitespace,
        });
    }
    pieces
}

/// Greedy word wrap at `width` characters; words longer than a line are split
pub fn wrap_caption(caption: &str, width: usize) -> Vec<WrappedLine> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in caption.split_inclusive('\n') {
        let (body, newline) = match paragraph.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (paragraph, ""),
        };
        let pieces = pieces(body, width);
        let wrapped = wrap_first_fit(&pieces, &[width as f64]);
        let count = wrapped.len();

        for (i, line) in wrapped.into_iter().enumerate() {
            let mut text = String::new();
            let mut trailing = String::new();
            if let Some((last, rest)) = line.split_last() {
                for piece in rest {
                    text.push_str(piece.word);
                    text.push_str(piece.whitespace);
                }
                text.push_str(last.word);
                trailing.push_str(last.whitespace);
            }
            if i + 1 == count {
                trailing.push_str(newline);
            }
            lines.push(WrappedLine { text, trailing });
        }
    }
    lines
}

/// Shaped text ready to be drawn, with its pixel extent
pub struct TextBlock {
    buffer: Buffer,
    pub width: u32,
    pub height: u32,
}

/// Owns the font database and glyph cache for all annotations of a run
pub struct TextRenderer {
    font_system: FontSystem,
    swash_cache: SwashCache,
    /// None means the configured font is unavailable and sans-serif is used
    family: Option<String>,
}

impl TextRenderer {
    pub fn new(font: &FontRef) -> Self {
        let mut font_system = FontSystem::new();
        let family = match font {
            FontRef::File(path) => {
                let db = font_system.db_mut();
                let before = db.len();
                match db.load_font_file(path) {
                    Ok(()) => db
                        .faces()
                        .nth(before)
                        .and_then(|face| face.families.first())
                        .map(|(name, _)| name.clone()),
                    Err(e) => {
                        warn!("Failed to load font {}: {}", path.display(), e);
                        None
                    }
                }
            }
            FontRef::Family(name) => {
                let installed = font_system
                    .db()
                    .faces()
                    .any(|face| face.families.iter().any(|(f, _)| f.eq_ignore_ascii_case(name)));
                if !installed {
                    warn!("Font '{}' is not installed, using the default sans-serif", name);
                }
                installed.then(|| name.clone())
            }
        };
        debug!("Annotation font: {:?}", family);

        Self {
            font_system,
            swash_cache: SwashCache::new(),
            family,
        }
    }

    /// Shape `text` (lines separated by `\n`) at `size` pixels without wrapping
    pub fn layout(&mut self, text: &str, size: f32) -> TextBlock {
        let metrics = Metrics::new(size, (size * 1.25).ceil());
        let mut buffer = Buffer::new(&mut self.font_system, metrics);
        buffer.set_wrap(&mut self.font_system, Wrap::None);
        buffer.set_size(&mut self.font_system, None, None);

        let family = match &self.family {
            Some(name) => Family::Name(name),
            None => Family::SansSerif,
        };
        buffer.set_text(&mut self.font_system, text, Attrs::new().family(family), Shaping::Advanced);
        buffer.shape_until_scroll(&mut self.font_system, false);

        let mut width = 0.0f32;
        let mut lines = 0u32;
        for run in buffer.layout_runs() {
            width = width.max(run.line_w);
            lines += 1;
        }
        let height = lines as f32 * metrics.line_height;

        TextBlock {
            buffer,
            width: width.ceil() as u32,
            height: height.ceil() as u32,
        }
    }

    /// Draw a shaped block with its top-left corner at (`x`, `y`)
    pub fn draw(&mut self, canvas: &mut RgbaImage, block: &mut TextBlock, x: i32, y: i32, colour: Colour) {
        let [r, g, b, a] = colour.0;
        block.buffer.draw(
            &mut self.font_system,
            &mut self.swash_cache,
            Color::rgba(r, g, b, a),
            |gx, gy, w, h, color| {
                for dy in 0..h as i32 {
                    for dx in 0..w as i32 {
                        blend_pixel(
                            canvas,
                            x + gx + dx,
                            y + gy + dy,
                            [color.r(), color.g(), color.b(), color.a()],
                        );
                    }
                }
            },
        );
    }
}

/// Alpha-blend a rectangle onto the canvas, clipped to its bounds
pub fn fill_rect(canvas: &mut RgbaImage, x: i32, y: i32, width: u32, height: u32, colour: Colour) {
    for py in y..y + height as i32 {
        for px in x..x + width as i32 {
            blend_pixel(canvas, px, py, colour.0);
        }
    }
}

/// Source-over blend of one pixel; out-of-bounds writes are dropped
fn blend_pixel(canvas: &mut RgbaImage, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 || x as u32 >= canvas.width() || y as u32 >= canvas.height() {
        return;
    }
    let alpha = color[3] as u32;
    if alpha == 0 {
        return;
    }
    let dst = canvas.get_pixel_mut(x as u32, y as u32);
    for i in 0..3 {
        dst.0[i] = ((color[i] as u32 * alpha + dst.0[i] as u32 * (255 - alpha)) / 255) as u8;
    }
    dst.0[3] = (alpha + dst.0[3] as u32 * (255 - alpha) / 255).min(255) as u8;
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn reassemble(lines: &[WrappedLine]) -> String {
        lines
            .iter()
            .map(|l| format!("{}{}", l.text, l.trailing))
            .collect()
    }

    const SAMPLES: &[&str] = &[
        "",
        "short",
        "I wrote 20 short programs in Python yesterday.  It was wonderful.  Perl, I'm leaving you.",
        "   leading spaces and trailing ones   ",
        "first paragraph\nsecond paragraph\n\nafter a blank line\n",
        "Nobody expects the Spanish Inquisition! Our chief weapon is surprise, surprise and fear, \
         fear and surprise. Our two weapons are fear and surprise, and ruthless efficiency. \
         Our three weapons are fear, surprise, ruthless efficiency, and an almost fanatical devotion to the Pope.",
    ];

    #[test]
    fn wrapped_lines_fit_and_reassemble() {
        let long_word = "a".repeat(250);
        let wide_gap = format!("left{}right", " ".repeat(180));
        let accented = "déjà vu ".repeat(40);
        let tabbed = "x\t".repeat(80);
        let combining = "e\u{301}".repeat(80);
        let mut inputs: Vec<&str> = SAMPLES.to_vec();
        inputs.extend([
            long_word.as_str(),
            wide_gap.as_str(),
            accented.as_str(),
            tabbed.as_str(),
            combining.as_str(),
        ]);

        for input in inputs {
            for width in [1, 10, 100] {
                let lines = wrap_caption(input, width);
                for line in &lines {
                    assert!(
                        line.text.chars().count() <= width,
                        "line {:?} exceeds {} characters",
                        line.text,
                        width
                    );
                }
                assert_eq!(reassemble(&lines), input, "width {}", width);
            }
        }
    }

    #[test]
    fn breaks_on_spaces_at_one_hundred_characters() {
        let caption = SAMPLES[5];
        let lines = wrap_caption(caption, 100);
        assert!(lines.len() >= 3);
        assert!(lines.iter().all(|l| !l.text.starts_with(' ')));
        assert!(lines[..lines.len() - 1].iter().all(|l| l.trailing == " "));
    }

    #[test]
    fn over_long_words_are_split() {
        let lines = wrap_caption(&"x".repeat(250), 100);
        let lengths: Vec<_> = lines.iter().map(|l| l.text.len()).collect();
        assert_eq!(lengths, vec![100, 100, 50]);
    }

    #[test]
    fn zero_width_characters_still_count() {
        for input in ["x\t".repeat(80), "e\u{301}".repeat(80)] {
            let lines = wrap_caption(&input, 100);
            let lengths: Vec<_> = lines.iter().map(|l| l.text.chars().count()).collect();
            assert_eq!(lengths, vec![100, 60], "{:?}", input);
        }
    }

    #[test]
    fn blending_respects_alpha_and_bounds() {
        let mut canvas = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        fill_rect(&mut canvas, -2, -2, 4, 4, Colour([0, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(2, 2), &Rgba([255, 255, 255, 255]));

        fill_rect(&mut canvas, 3, 3, 10, 10, Colour([0, 0, 0, 128]));
        let half = canvas.get_pixel(3, 3);
        assert!(half.0[0] > 100 && half.0[0] < 150);
        assert_eq!(half.0[3], 255);
    }
}
