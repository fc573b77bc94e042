//! Text measurement and rasterisation for text entities.
//!
//! Glyphs come from the proportional font bundled with egui's default fonts.

use crate::scribble::model::{Color, TextContent};
use crate::scribble::raster::{blend_pixel, fill_rect};
use crate::scribble::transform::{Point, Size};
use ab_glyph::{point, Font, FontArc, ScaleFont};
use image::RgbaImage;
use once_cell::sync::Lazy;

const FALLBACK_ADVANCE_FACTOR: f32 = 0.55;
const FALLBACK_LINE_HEIGHT_FACTOR: f32 = 1.2;
const MIN_WIDTH_FACTOR: f32 = 0.5;
const MAX_RASTER_DIMENSION: f32 = 4096.0;

struct LoadedFont {
    font: FontArc,
    scale: f32,
    y_offset: f32,
}

static DEFAULT_FONT: Lazy<Option<LoadedFont>> = Lazy::new(|| {
    let font = default_font();
    if font.is_none() {
        tracing::debug!("no bundled font available, text entities render without glyphs");
    }
    font
});

fn default_font() -> Option<LoadedFont> {
    let definitions = egui::FontDefinitions::default();
    let family = definitions.families.get(&egui::FontFamily::Proportional)?;
    let font_name = family.first()?;
    let data = definitions.font_data.get(font_name)?;
    let font = match &data.font {
        std::borrow::Cow::Borrowed(bytes) => {
            ab_glyph::FontRef::try_from_slice_and_index(*bytes, data.index)
                .map(FontArc::from)
                .ok()
        }
        std::borrow::Cow::Owned(bytes) => {
            ab_glyph::FontVec::try_from_vec_and_index(bytes.clone(), data.index)
                .map(FontArc::from)
                .ok()
        }
    }?;
    Some(LoadedFont {
        font,
        scale: data.tweak.scale,
        y_offset: data.tweak.y_offset,
    })
}

struct LineMetrics {
    widths: Vec<f32>,
    line_height: f32,
    ascent: f32,
}

fn line_metrics(content: &TextContent) -> LineMetrics {
    let size = content.style.size.max(1.0);
    let lines: Vec<&str> = content.text.split('\n').collect();

    match DEFAULT_FONT.as_ref() {
        Some(loaded) => {
            let scaled = loaded.font.as_scaled(size * loaded.scale);
            let widths = lines
                .iter()
                .map(|line| {
                    let mut width = 0.0;
                    let mut previous = None;
                    for ch in line.chars() {
                        let id = scaled.glyph_id(ch);
                        if let Some(prev) = previous {
                            width += scaled.kern(prev, id);
                        }
                        width += scaled.h_advance(id);
                        previous = Some(id);
                    }
                    width
                })
                .collect();
            LineMetrics {
                widths,
                line_height: scaled.height() + scaled.line_gap(),
                ascent: scaled.ascent(),
            }
        }
        None => LineMetrics {
            widths: lines
                .iter()
                .map(|line| line.chars().count() as f32 * size * FALLBACK_ADVANCE_FACTOR)
                .collect(),
            line_height: size * FALLBACK_LINE_HEIGHT_FACTOR,
            ascent: size,
        },
    }
}

/// Unscaled size of a text entity, padding included.
pub fn measure(content: &TextContent) -> Size {
    let metrics = line_metrics(content);
    let size = content.style.size.max(1.0);
    let padding = content.style.padding.max(0.0);
    let widest = metrics
        .widths
        .iter()
        .copied()
        .fold(0.0f32, f32::max)
        .max(size * MIN_WIDTH_FACTOR);
    Size::new(
        widest + padding * 2.0,
        metrics.line_height * metrics.widths.len() as f32 + padding * 2.0,
    )
}

/// Renders the text entity's content into a bitmap of its measured size.
pub fn rasterize(content: &TextContent) -> RgbaImage {
    let bounds = measure(content);
    let width = bounds.width.ceil().max(1.0) as u32;
    let height = bounds.height.ceil().max(1.0) as u32;
    let mut img = RgbaImage::new(width, height);

    if let Some(background) = content.style.background {
        fill_rect(
            &mut img,
            Point::new(0.0, 0.0),
            Point::new(width as f32, height as f32),
            background,
        );
    }

    let Some(loaded) = DEFAULT_FONT.as_ref() else {
        return img;
    };

    let metrics = line_metrics(content);
    let padding = content.style.padding.max(0.0);
    let size = content.style.size.max(1.0);
    let scaled = loaded.font.as_scaled(size * loaded.scale);

    for (row, line) in content.text.split('\n').enumerate() {
        let baseline = padding
            + row as f32 * metrics.line_height
            + metrics.ascent
            + loaded.y_offset * size;
        let mut caret = point(padding, baseline);
        let mut previous = None;
        for ch in line.chars() {
            let mut glyph = scaled.scaled_glyph(ch);
            if let Some(prev) = previous {
                caret.x += scaled.kern(prev, glyph.id);
            }
            glyph.position = caret;
            caret.x += scaled.h_advance(glyph.id);
            previous = Some(glyph.id);
            if let Some(outlined) = scaled.outline_glyph(glyph) {
                draw_outlined(&mut img, &outlined, content.style.color);
            }
        }
    }

    img
}

/// Renders the content at `density` output pixels per unscaled unit. Glyphs
/// are outlined at the target size instead of being resampled afterwards.
/// The largest bitmap side is kept within `MAX_RASTER_DIMENSION`.
pub fn rasterize_scaled(content: &TextContent, density: f32) -> RgbaImage {
    let bounds = measure(content);
    let largest = bounds.width.max(bounds.height).max(1.0);
    let density = if density.is_finite() && density > 0.0 {
        density.min(MAX_RASTER_DIMENSION / largest)
    } else {
        1.0
    };
    if (density - 1.0).abs() < f32::EPSILON {
        return rasterize(content);
    }
    let mut scaled = content.clone();
    scaled.style.size = content.style.size.max(1.0) * density;
    scaled.style.padding = content.style.padding.max(0.0) * density;
    rasterize(&scaled)
}

fn draw_outlined(img: &mut RgbaImage, outlined: &ab_glyph::OutlinedGlyph, color: Color) {
    let bounds = outlined.px_bounds();
    outlined.draw(|x, y, coverage| {
        let px = x as i32 + bounds.min.x as i32;
        let py = y as i32 + bounds.min.y as i32;
        if px < 0 || py < 0 {
            return;
        }
        let alpha = (color.a as f32 * coverage).round().clamp(0.0, 255.0) as u8;
        blend_pixel(img, px as u32, py as u32, [color.r, color.g, color.b, alpha]);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scribble::model::TextStyle;

    #[test]
    fn measure_grows_with_text_and_lines() {
        let style = TextStyle::default();
        let short = measure(&TextContent::new("ab", style));
        let long = measure(&TextContent::new("abcdefgh", style));
        let two_lines = measure(&TextContent::new("ab\nab", style));

        assert!(long.width > short.width);
        assert!(two_lines.height > short.height);
        assert!((two_lines.width - short.width).abs() < 1e-3);
    }

    #[test]
    fn empty_text_keeps_a_hittable_box() {
        let style = TextStyle {
            padding: 0.0,
            ..TextStyle::default()
        };
        let size = measure(&TextContent::new("", style));
        assert!(size.width > 0.0);
        assert!(size.height > 0.0);
    }

    #[test]
    fn rasterized_bitmap_matches_measured_size_and_background() {
        let style = TextStyle {
            background: Some(Color::rgba(0, 0, 0, 255)),
            ..TextStyle::default()
        };
        let content = TextContent::new("Hello", style);
        let bounds = measure(&content);
        let img = rasterize(&content);

        assert_eq!(img.width(), bounds.width.ceil() as u32);
        assert_eq!(img.height(), bounds.height.ceil() as u32);
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn scaled_raster_grows_with_density_and_stays_bounded() {
        let content = TextContent::new("Hello", TextStyle::default());
        let bounds = measure(&content);

        let sharp = rasterize_scaled(&content, 3.0);
        assert!((sharp.width() as f32 - bounds.width * 3.0).abs() <= 2.0);
        assert!((sharp.height() as f32 - bounds.height * 3.0).abs() <= 2.0);

        let capped = rasterize_scaled(&content, 1.0e6);
        assert!(capped.width() <= MAX_RASTER_DIMENSION as u32 + 2);
        assert!(capped.height() <= MAX_RASTER_DIMENSION as u32 + 2);

        assert_eq!(rasterize_scaled(&content, f32::NAN), rasterize(&content));
    }
}
