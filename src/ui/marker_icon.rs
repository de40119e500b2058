//! Marker icon synthesis
//!
//! Produces the bitmaps handed to the map SDK's marker icon capability.
//! Two sources are supported: a caller-supplied encoded image, rescaled
//! smoothly, or a pin drawn from a three-color palette and an icon-font
//! glyph. Layout calculation is kept apart from rasterization so the pin
//! geometry can be checked without drawing.
//!
//! The synthesizer performs no SDK calls.

use ab_glyph::{point, Font, FontArc, Glyph, PxScale, ScaleFont};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::imageops::FilterType;
use tiny_skia::{
    Color, ColorU8, FillRule, Paint, PathBuilder, Pixmap, PremultipliedColorU8, Transform,
};
use tracing::{debug, warn};

/// Icon synthesis errors
#[derive(Debug, thiserror::Error)]
pub enum MarkerIconError {
    #[error("Failed to create pixmap for rendering")]
    PixmapCreationFailed,

    #[error("Failed to decode marker image: {0}")]
    Decode(String),

    #[error("Invalid palette: {0}")]
    InvalidPalette(String),

    #[error("Invalid icon font data")]
    InvalidFont,
}

/// What to build a marker icon from
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerIconSpec {
    /// Encoded PNG/JPEG, either a `data:image/...;base64,` URL or bare base64
    FromImage { encoded: String },
    /// Outer/tail color, inner disc color, glyph color plus the glyph text
    FromPalette { colors: Vec<String>, glyph: String },
}

/// Rasterized marker icon
#[derive(Clone, PartialEq)]
pub struct MarkerBitmap {
    pixmap: Pixmap,
}

impl MarkerBitmap {
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Premultiplied pixel at the given position
    pub fn pixel(&self, x: u32, y: u32) -> Option<PremultipliedColorU8> {
        self.pixmap.pixel(x, y)
    }

    /// Straight-alpha RGBA bytes, row-major
    pub fn to_rgba(&self) -> Vec<u8> {
        self.pixmap
            .pixels()
            .iter()
            .flat_map(|pixel| {
                let color = pixel.demultiply();
                [color.red(), color.green(), color.blue(), color.alpha()]
            })
            .collect()
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, MarkerIconError> {
        self.pixmap
            .encode_png()
            .map_err(|err| MarkerIconError::Decode(err.to_string()))
    }
}

impl std::fmt::Debug for MarkerBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkerBitmap")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// Pre-calculated pin geometry in canvas units
#[derive(Debug, Clone, PartialEq)]
pub struct PinLayout {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub center_x: f32,
    pub center_y: f32,
    pub outer_radius: f32,
    pub inner_radius: f32,
    /// Triangle tail: apex at the canvas bottom, base spanning `tail_half_width`
    pub tail_apex: (f32, f32),
    pub tail_base_y: f32,
    pub tail_half_width: f32,
    pub glyph_size: f32,
}

impl PinLayout {
    pub const CANVAS_WIDTH: u32 = 100;
    pub const CANVAS_HEIGHT: u32 = 125;
    pub const OUTER_RADIUS: f32 = 50.0;
    pub const INNER_RADIUS: f32 = 36.0;
    pub const TAIL_BASE_RATIO: f32 = 0.77;
    pub const TAIL_HALF_WIDTH: f32 = 30.0;
    pub const GLYPH_SIZE: f32 = 54.0;

    pub fn standard() -> Self {
        let center_x = (Self::CANVAS_WIDTH / 2) as f32;
        // The disc sits in the top square of the canvas
        let center_y = (Self::CANVAS_WIDTH / 2) as f32;

        Self {
            canvas_width: Self::CANVAS_WIDTH,
            canvas_height: Self::CANVAS_HEIGHT,
            center_x,
            center_y,
            outer_radius: Self::OUTER_RADIUS,
            inner_radius: Self::INNER_RADIUS,
            tail_apex: (center_x, Self::CANVAS_HEIGHT as f32),
            tail_base_y: center_y + (Self::OUTER_RADIUS * Self::TAIL_BASE_RATIO).trunc(),
            tail_half_width: Self::TAIL_HALF_WIDTH,
            glyph_size: Self::GLYPH_SIZE,
        }
    }
}

/// Marker icon renderer using tiny-skia for shapes and ab_glyph for glyphs
#[derive(Debug, Clone)]
pub struct MarkerIconSynthesizer {
    /// Icon font used for palette glyphs
    font: Option<FontArc>,
    /// Scale applied to decoded images
    image_scale: f32,
}

impl MarkerIconSynthesizer {
    pub const DEFAULT_IMAGE_SCALE: f32 = 1.5;

    /// Create a synthesizer without an icon font; palette pins render without glyphs
    pub fn new() -> Self {
        Self {
            font: None,
            image_scale: Self::DEFAULT_IMAGE_SCALE,
        }
    }

    /// Create a synthesizer that draws glyphs with the given TrueType/OpenType font
    pub fn with_font_bytes(font_data: Vec<u8>) -> Result<Self, MarkerIconError> {
        let font = FontArc::try_from_vec(font_data).map_err(|_| MarkerIconError::InvalidFont)?;
        Ok(Self {
            font: Some(font),
            image_scale: Self::DEFAULT_IMAGE_SCALE,
        })
    }

    pub fn with_image_scale(mut self, scale: f32) -> Self {
        if scale.is_finite() && scale > 0.0 {
            self.image_scale = scale;
        }
        self
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn synthesize(&self, spec: &MarkerIconSpec) -> Result<MarkerBitmap, MarkerIconError> {
        match spec {
            MarkerIconSpec::FromImage { encoded } => self.decode_image(encoded),
            MarkerIconSpec::FromPalette { colors, glyph } => self.render_palette(colors, glyph),
        }
    }

    /// Decode a supplied image and rescale it with bilinear filtering
    fn decode_image(&self, encoded: &str) -> Result<MarkerBitmap, MarkerIconError> {
        let body = match encoded.split_once(',') {
            Some((header, body)) if header.starts_with("data:image") => body,
            _ => encoded,
        };
        let cleaned: String = body.chars().filter(|c| !c.is_whitespace()).collect();

        let bytes = STANDARD
            .decode(cleaned)
            .map_err(|err| MarkerIconError::Decode(err.to_string()))?;
        let decoded =
            image::load_from_memory(&bytes).map_err(|err| MarkerIconError::Decode(err.to_string()))?;

        let width = ((decoded.width() as f32) * self.image_scale) as u32;
        let height = ((decoded.height() as f32) * self.image_scale) as u32;
        let resized = decoded
            .resize_exact(width.max(1), height.max(1), FilterType::Triangle)
            .to_rgba8();

        let mut pixmap = Pixmap::new(resized.width(), resized.height())
            .ok_or(MarkerIconError::PixmapCreationFailed)?;
        for (dst, src) in pixmap.pixels_mut().iter_mut().zip(resized.pixels()) {
            let [r, g, b, a] = src.0;
            *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
        }

        debug!(width = pixmap.width(), height = pixmap.height(), "decoded marker image");
        Ok(MarkerBitmap { pixmap })
    }

    /// Render the palette pin: outer disc, inner disc, tail, glyph
    fn render_palette(&self, colors: &[String], glyph: &str) -> Result<MarkerBitmap, MarkerIconError> {
        if colors.len() < 3 {
            return Err(MarkerIconError::InvalidPalette(format!(
                "expected 3 colors, got {}",
                colors.len()
            )));
        }
        let outer = parse_color(&colors[0])?;
        let inner = parse_color(&colors[1])?;
        let glyph_color = parse_color(&colors[2])?;

        let layout = PinLayout::standard();
        let mut pixmap = Pixmap::new(layout.canvas_width, layout.canvas_height)
            .ok_or(MarkerIconError::PixmapCreationFailed)?;
        pixmap.fill(Color::TRANSPARENT);

        fill_circle(&mut pixmap, layout.center_x, layout.center_y, layout.outer_radius, outer);
        fill_circle(&mut pixmap, layout.center_x, layout.center_y, layout.inner_radius, inner);
        fill_tail(&mut pixmap, &layout, outer);
        self.draw_glyph(&mut pixmap, &layout, glyph, glyph_color);

        Ok(MarkerBitmap { pixmap })
    }

    /// Draw the glyph centered on the disc, baseline derived from ascent/descent
    fn draw_glyph(&self, pixmap: &mut Pixmap, layout: &PinLayout, text: &str, color: [u8; 4]) {
        if text.is_empty() {
            return;
        }
        let Some(font) = &self.font else {
            warn!("no icon font loaded, marker glyph skipped");
            return;
        };

        let scaled = font.as_scaled(PxScale::from(layout.glyph_size));
        let text_height = scaled.ascent() - scaled.descent();
        let baseline = layout.center_y + text_height / 2.0 + scaled.descent();

        let mut caret = 0.0;
        let mut glyphs: Vec<Glyph> = Vec::new();
        for ch in text.chars() {
            let mut glyph = scaled.scaled_glyph(ch);
            glyph.position = point(caret, 0.0);
            caret += scaled.h_advance(glyph.id);
            glyphs.push(glyph);
        }

        let start_x = layout.center_x - caret / 2.0;
        let width = pixmap.width() as i32;
        let height = pixmap.height() as i32;
        let pixels = pixmap.pixels_mut();

        for mut glyph in glyphs {
            glyph.position = point(start_x + glyph.position.x, baseline);
            let Some(outlined) = font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|x, y, coverage| {
                let px = bounds.min.x as i32 + x as i32;
                let py = bounds.min.y as i32 + y as i32;
                if px < 0 || py < 0 || px >= width || py >= height {
                    return;
                }
                let index = (py * width + px) as usize;
                pixels[index] = blend_over(pixels[index], color, coverage);
            });
        }
    }
}

impl Default for MarkerIconSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_color(value: &str) -> Result<[u8; 4], MarkerIconError> {
    csscolorparser::parse(value.trim())
        .map(|color| color.to_rgba8())
        .map_err(|err| MarkerIconError::InvalidPalette(format!("{value}: {err}")))
}

fn paint_for(color: [u8; 4]) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color[0], color[1], color[2], color[3]);
    paint.anti_alias = true;
    paint
}

fn fill_circle(pixmap: &mut Pixmap, cx: f32, cy: f32, radius: f32, color: [u8; 4]) {
    if let Some(path) = PathBuilder::from_circle(cx, cy, radius) {
        pixmap.fill_path(&path, &paint_for(color), FillRule::Winding, Transform::identity(), None);
    }
}

fn fill_tail(pixmap: &mut Pixmap, layout: &PinLayout, color: [u8; 4]) {
    let mut builder = PathBuilder::new();
    builder.move_to(layout.tail_apex.0, layout.tail_apex.1);
    builder.line_to(layout.center_x - layout.tail_half_width, layout.tail_base_y);
    builder.line_to(layout.center_x + layout.tail_half_width, layout.tail_base_y);
    builder.close();

    if let Some(path) = builder.finish() {
        pixmap.fill_path(&path, &paint_for(color), FillRule::Winding, Transform::identity(), None);
    }
}

/// Source-over blend of a straight-alpha color scaled by glyph coverage
fn blend_over(dst: PremultipliedColorU8, color: [u8; 4], coverage: f32) -> PremultipliedColorU8 {
    let src_alpha = (color[3] as f32 / 255.0) * coverage.clamp(0.0, 1.0);
    let keep = 1.0 - src_alpha;

    let channel = |src: u8, dst: u8| -> f32 { src as f32 * src_alpha + dst as f32 * keep };
    let alpha = (src_alpha * 255.0 + dst.alpha() as f32 * keep).round().clamp(0.0, 255.0) as u8;
    let clamp = |value: f32| value.round().clamp(0.0, alpha as f32) as u8;

    PremultipliedColorU8::from_rgba(
        clamp(channel(color[0], dst.red())),
        clamp(channel(color[1], dst.green())),
        clamp(channel(color[2], dst.blue())),
        alpha,
    )
    .unwrap_or(dst)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette(colors: &[&str], glyph: &str) -> MarkerIconSpec {
        MarkerIconSpec::FromPalette {
            colors: colors.iter().map(|c| c.to_string()).collect(),
            glyph: glyph.to_string(),
        }
    }

    #[test]
    fn pin_layout_geometry() {
        let layout = PinLayout::standard();
        assert_eq!((layout.canvas_width, layout.canvas_height), (100, 125));
        assert_eq!((layout.center_x, layout.center_y), (50.0, 50.0));
        assert_eq!(layout.tail_base_y, 88.0);
        assert_eq!(layout.tail_apex, (50.0, 125.0));
    }

    #[test]
    fn palette_pin_has_fixed_size_and_opaque_center() {
        let synthesizer = MarkerIconSynthesizer::new();
        assert!(!synthesizer.has_font());
        let bitmap = synthesizer
            .synthesize(&palette(&["#FF0000", "#00FF00", "#0000FF"], "A"))
            .unwrap();

        assert_eq!((bitmap.width(), bitmap.height()), (100, 125));
        let center = bitmap.pixel(50, 50).unwrap();
        assert_eq!(center.alpha(), 255);
        // Inner disc color shows through when no glyph font is loaded
        assert_eq!(center.green(), 255);
    }

    #[test]
    fn palette_pin_regions() {
        let synthesizer = MarkerIconSynthesizer::new();
        let bitmap = synthesizer
            .synthesize(&palette(&["#FF0000", "#00FF00", "#0000FF"], ""))
            .unwrap();

        // Outer ring between the two radii is color 1
        let ring = bitmap.pixel(50, 5).unwrap();
        assert_eq!((ring.red(), ring.alpha()), (255, 255));

        // The tail continues below the disc in color 1
        let tail = bitmap.pixel(50, 110).unwrap();
        assert_eq!((tail.red(), tail.alpha()), (255, 255));

        // Corners stay transparent
        assert_eq!(bitmap.pixel(0, 124).unwrap().alpha(), 0);
        assert_eq!(bitmap.pixel(99, 0).unwrap().alpha(), 0);
    }

    #[test]
    fn too_few_colors_rejected() {
        let synthesizer = MarkerIconSynthesizer::new();
        let result = synthesizer.synthesize(&palette(&["#FF0000", "#00FF00"], "A"));
        assert!(matches!(result, Err(MarkerIconError::InvalidPalette(_))));
    }

    #[test]
    fn unparsable_color_rejected() {
        let synthesizer = MarkerIconSynthesizer::new();
        let result = synthesizer.synthesize(&palette(&["#FF0000", "not-a-color", "#0000FF"], "A"));
        assert!(matches!(result, Err(MarkerIconError::InvalidPalette(_))));
    }

    #[test]
    fn image_is_rescaled() {
        let mut source = Pixmap::new(20, 10).unwrap();
        source.fill(Color::from_rgba8(10, 20, 200, 255));
        let png = source.encode_png().unwrap();
        let url = format!("data:image/png;base64,{}", STANDARD.encode(png));

        let synthesizer = MarkerIconSynthesizer::new();
        let bitmap = synthesizer
            .synthesize(&MarkerIconSpec::FromImage { encoded: url })
            .unwrap();

        assert_eq!((bitmap.width(), bitmap.height()), (30, 15));
        let rgba = bitmap.to_rgba();
        assert_eq!(rgba.len(), 30 * 15 * 4);
        assert_eq!(rgba[3], 255);
        assert!((rgba[2] as i32 - 200).abs() <= 1);
    }

    #[test]
    fn malformed_image_rejected() {
        let synthesizer = MarkerIconSynthesizer::new();
        let bad_base64 = MarkerIconSpec::FromImage {
            encoded: "data:image/png;base64,@@@".to_string(),
        };
        assert!(matches!(synthesizer.synthesize(&bad_base64), Err(MarkerIconError::Decode(_))));

        let not_an_image = MarkerIconSpec::FromImage {
            encoded: format!("data:image/png;base64,{}", STANDARD.encode(b"hello")),
        };
        assert!(matches!(synthesizer.synthesize(&not_an_image), Err(MarkerIconError::Decode(_))));
    }

    const FIXTURE_FONT: &[u8] = include_bytes!("../../tests/fixtures/DejaVuSansMono.ttf");

    #[test]
    fn glyph_is_drawn_centered_on_the_disc() {
        let colors = ["#FF0000", "#00FF00", "#0000FF"];
        let synthesizer = MarkerIconSynthesizer::with_font_bytes(FIXTURE_FONT.to_vec()).unwrap();
        assert!(synthesizer.has_font());

        let bare = MarkerIconSynthesizer::new().synthesize(&palette(&colors, "H")).unwrap();
        let drawn = synthesizer.synthesize(&palette(&colors, "H")).unwrap();

        let mut changed_near_center = false;
        for y in 45..=55 {
            for x in 45..=55 {
                changed_near_center |= drawn.pixel(x, y) != bare.pixel(x, y);
            }
        }
        assert!(changed_near_center);

        // Bounding box of pixels where glyph color 3 dominates the inner disc
        let (mut top, mut bottom, mut left, mut right) = (u32::MAX, 0, u32::MAX, 0);
        for y in 0..drawn.height() {
            for x in 0..drawn.width() {
                let pixel = drawn.pixel(x, y).unwrap();
                if pixel.blue() >= 128 && pixel.blue() > pixel.green() {
                    top = top.min(y);
                    bottom = bottom.max(y);
                    left = left.min(x);
                    right = right.max(x);
                }
            }
        }
        assert!(top < bottom && left < right, "glyph left no ink");

        let vertical_center = (top + bottom) as f32 / 2.0;
        let horizontal_center = (left + right) as f32 / 2.0;
        assert!((vertical_center - 50.0).abs() <= 3.0, "ink centered at y={vertical_center}");
        assert!((horizontal_center - 50.0).abs() <= 3.0, "ink centered at x={horizontal_center}");

        // The glyph stays inside the inner disc
        assert!(top >= 50 - 36 && bottom <= 50 + 36);
    }

    #[test]
    fn invalid_font_bytes_rejected() {
        let result = MarkerIconSynthesizer::with_font_bytes(vec![0, 1, 2, 3]);
        assert!(matches!(result, Err(MarkerIconError::InvalidFont)));
    }

    #[test]
    fn glyph_blend_respects_coverage() {
        let dst = ColorU8::from_rgba(0, 255, 0, 255).premultiply();
        let full = blend_over(dst, [0, 0, 255, 255], 1.0);
        assert_eq!((full.blue(), full.green(), full.alpha()), (255, 0, 255));

        let none = blend_over(dst, [0, 0, 255, 255], 0.0);
        assert_eq!(none, dst);
    }
}
