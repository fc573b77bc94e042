//! Flattens entities and ink onto a fetched base bitmap.

use crate::scribble::entities::EntityModel;
use crate::scribble::model::{Entity, EntityContent, Stroke};
use crate::scribble::raster::{draw_transformed, fill_polygon, stroke_polyline};
use crate::scribble::text;
use crate::scribble::transform::{Point, Size};
use image::RgbaImage;

/// Uniform factor mapping view coordinates onto a bitmap of `bitmap_width`.
/// An unmeasured view maps 1:1.
pub fn view_to_bitmap_factor(bitmap_width: u32, view: Option<Size>) -> f32 {
    match view {
        Some(view) if view.width > 0.0 && bitmap_width > 0 => bitmap_width as f32 / view.width,
        _ => 1.0,
    }
}

/// Draws every entity in paint order, then every stroke in commit order.
pub fn compose(base: &mut RgbaImage, entities: &EntityModel, strokes: &[Stroke], factor: f32) {
    let factor = if factor.is_finite() && factor > 0.0 {
        factor
    } else {
        1.0
    };
    for entity in entities.iter() {
        render_entity(base, entity, factor);
    }
    for stroke in strokes {
        render_stroke(base, stroke, factor);
    }
}

/// Text is rasterised at its output density; image stickers are resampled
/// from their own bitmap.
pub fn render_entity(base: &mut RgbaImage, entity: &Entity, factor: f32) {
    let transform = entity.transform.scaled_space(factor);
    match &entity.content {
        EntityContent::Text(content) => {
            let bitmap = text::rasterize_scaled(content, transform.scale());
            draw_transformed(base, &bitmap, entity.bounds(), &transform);
        }
        EntityContent::Image(content) => {
            draw_transformed(base, &content.bitmap, entity.bounds(), &transform);
        }
    }
}

pub fn render_stroke(base: &mut RgbaImage, stroke: &Stroke, factor: f32) {
    let points: Vec<Point> = stroke
        .points
        .iter()
        .map(|p| Point::new(p.x * factor, p.y * factor))
        .collect();
    let style = stroke.style;
    if style.mode.fills() && points.len() >= 3 {
        fill_polygon(base, &points, style.fill_color);
    }
    if style.mode.strokes() {
        stroke_polyline(base, &points, style.width * factor, style.stroke_color);
    }
}
