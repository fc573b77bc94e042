//! Software rasterisation onto `RgbaImage` surfaces.
//!
//! All drawing is source-over blending of straight (non-premultiplied) RGBA.
//! Strokes and fills are first accumulated into a coverage mask; each pixel
//! is blended at most once per shape.

use crate::scribble::model::Color;
use crate::scribble::transform::{Point, Size, Transform};
use image::RgbaImage;

pub fn blend_rgba(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);

    if out_a <= f32::EPSILON {
        return [0, 0, 0, 0];
    }

    let blend = |s: u8, d: u8| -> u8 {
        (((s as f32 * sa) + (d as f32 * da * (1.0 - sa))) / out_a)
            .round()
            .clamp(0.0, 255.0) as u8
    };

    [
        blend(src[0], dst[0]),
        blend(src[1], dst[1]),
        blend(src[2], dst[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ]
}

pub fn blend_pixel(img: &mut RgbaImage, x: u32, y: u32, color: [u8; 4]) {
    if color[3] == 0 || x >= img.width() || y >= img.height() {
        return;
    }
    let pixel = img.get_pixel_mut(x, y);
    pixel.0 = blend_rgba(pixel.0, color);
}

pub fn fill_rect(img: &mut RgbaImage, min: Point, max: Point, color: Color) {
    let Some((x0, y0, x1, y1)) = clip_span(img, min, max) else {
        return;
    };
    let rgba = color.to_rgba_array();
    for y in y0..y1 {
        for x in x0..x1 {
            blend_pixel(img, x, y, rgba);
        }
    }
}

/// Coverage mask over a clipped region of a target surface.
struct Mask {
    x0: u32,
    y0: u32,
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Mask {
    fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        let width = x1 - x0;
        let height = y1 - y0;
        Self {
            x0,
            y0,
            width,
            height,
            bits: vec![false; (width as usize) * (height as usize)],
        }
    }

    fn set(&mut self, x: u32, y: u32) {
        if x < self.x0 || y < self.y0 {
            return;
        }
        let lx = x - self.x0;
        let ly = y - self.y0;
        if lx >= self.width || ly >= self.height {
            return;
        }
        self.bits[(ly * self.width + lx) as usize] = true;
    }

    fn apply(&self, img: &mut RgbaImage, color: Color) {
        let rgba = color.to_rgba_array();
        for ly in 0..self.height {
            for lx in 0..self.width {
                if self.bits[(ly * self.width + lx) as usize] {
                    blend_pixel(img, self.x0 + lx, self.y0 + ly, rgba);
                }
            }
        }
    }
}

fn clip_span(img: &RgbaImage, min: Point, max: Point) -> Option<(u32, u32, u32, u32)> {
    let x0 = min.x.floor().max(0.0);
    let y0 = min.y.floor().max(0.0);
    let x1 = max.x.ceil().min(img.width() as f32);
    let y1 = max.y.ceil().min(img.height() as f32);
    if !(x0 < x1 && y0 < y1) {
        return None;
    }
    Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
}

fn points_bounds(points: &[Point], pad: f32) -> Option<(Point, Point)> {
    let first = points.first()?;
    let mut min = *first;
    let mut max = *first;
    for p in &points[1..] {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    Some((
        Point::new(min.x - pad, min.y - pad),
        Point::new(max.x + pad, max.y + pad),
    ))
}

fn point_segment_distance_sq(p: Point, a: Point, b: Point) -> f32 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len_sq = abx * abx + aby * aby;
    if len_sq <= f32::EPSILON {
        return p.distance_sq(a);
    }
    let t = (((p.x - a.x) * abx + (p.y - a.y) * aby) / len_sq).clamp(0.0, 1.0);
    p.distance_sq(Point::new(a.x + abx * t, a.y + aby * t))
}

/// Strokes a polyline with round caps and joins.
pub fn stroke_polyline(img: &mut RgbaImage, points: &[Point], width: f32, color: Color) {
    let radius = (width / 2.0).max(0.5);
    let Some((min, max)) = points_bounds(points, radius) else {
        return;
    };
    let Some((x0, y0, x1, y1)) = clip_span(img, min, max) else {
        return;
    };
    let mut mask = Mask::new(x0, y0, x1, y1);
    let radius_sq = radius * radius;

    let segments: Vec<(Point, Point)> = if points.len() == 1 {
        vec![(points[0], points[0])]
    } else {
        points.windows(2).map(|w| (w[0], w[1])).collect()
    };

    for (a, b) in segments {
        let (seg_min, seg_max) = (
            Point::new(a.x.min(b.x) - radius, a.y.min(b.y) - radius),
            Point::new(a.x.max(b.x) + radius, a.y.max(b.y) + radius),
        );
        let Some((sx0, sy0, sx1, sy1)) = clip_span(img, seg_min, seg_max) else {
            continue;
        };
        for y in sy0..sy1 {
            for x in sx0..sx1 {
                let center = Point::new(x as f32 + 0.5, y as f32 + 0.5);
                if point_segment_distance_sq(center, a, b) <= radius_sq {
                    mask.set(x, y);
                }
            }
        }
    }

    mask.apply(img, color);
}

/// Fills the polygon described by `points` (implicitly closed) using the
/// even-odd rule.
pub fn fill_polygon(img: &mut RgbaImage, points: &[Point], color: Color) {
    if points.len() < 3 {
        return;
    }
    let Some((min, max)) = points_bounds(points, 0.0) else {
        return;
    };
    let Some((x0, y0, x1, y1)) = clip_span(img, min, max) else {
        return;
    };
    let mut mask = Mask::new(x0, y0, x1, y1);
    let mut crossings = Vec::new();

    for y in y0..y1 {
        let scan_y = y as f32 + 0.5;
        crossings.clear();
        for i in 0..points.len() {
            let a = points[i];
            let b = points[(i + 1) % points.len()];
            if (a.y <= scan_y) != (b.y <= scan_y) {
                let t = (scan_y - a.y) / (b.y - a.y);
                crossings.push(a.x + t * (b.x - a.x));
            }
        }
        crossings.sort_by(|l, r| l.total_cmp(r));
        for pair in crossings.chunks_exact(2) {
            let start = (pair[0] - 0.5).ceil().max(x0 as f32) as u32;
            let end = (pair[1] - 0.5).floor().min(x1 as f32 - 1.0);
            if end < start as f32 {
                continue;
            }
            for x in start..=(end as u32) {
                mask.set(x, y);
            }
        }
    }

    mask.apply(img, color);
}

fn sample_bilinear(src: &RgbaImage, x: f32, y: f32) -> [u8; 4] {
    let fx = x - 0.5;
    let fy = y - 0.5;
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = fx - x0;
    let ty = fy - y0;

    let fetch = |px: f32, py: f32| -> [f32; 4] {
        if px < 0.0 || py < 0.0 || px >= src.width() as f32 || py >= src.height() as f32 {
            return [0.0; 4];
        }
        let p = src.get_pixel(px as u32, py as u32).0;
        let a = p[3] as f32 / 255.0;
        [p[0] as f32 * a, p[1] as f32 * a, p[2] as f32 * a, p[3] as f32]
    };

    let taps = [
        (fetch(x0, y0), (1.0 - tx) * (1.0 - ty)),
        (fetch(x0 + 1.0, y0), tx * (1.0 - ty)),
        (fetch(x0, y0 + 1.0), (1.0 - tx) * ty),
        (fetch(x0 + 1.0, y0 + 1.0), tx * ty),
    ];

    let mut acc = [0.0f32; 4];
    for (texel, weight) in taps {
        for c in 0..4 {
            acc[c] += texel[c] * weight;
        }
    }

    let alpha = acc[3];
    if alpha <= f32::EPSILON {
        return [0, 0, 0, 0];
    }
    let unpremultiply = |c: f32| (c / (alpha / 255.0)).round().clamp(0.0, 255.0) as u8;
    [
        unpremultiply(acc[0]),
        unpremultiply(acc[1]),
        unpremultiply(acc[2]),
        alpha.round().clamp(0.0, 255.0) as u8,
    ]
}

/// Draws `src`, whose content-local rectangle is `bounds` centred on the
/// origin, onto `dst` through `transform`. Each destination pixel inside the
/// transformed quad is inverse-mapped and bilinearly sampled.
pub fn draw_transformed(dst: &mut RgbaImage, src: &RgbaImage, bounds: Size, transform: &Transform) {
    if src.width() == 0 || src.height() == 0 || bounds.width <= 0.0 || bounds.height <= 0.0 {
        return;
    }
    let (min, max) = transform.bounding_box(bounds);
    let Some((x0, y0, x1, y1)) = clip_span(dst, min, max) else {
        return;
    };
    let to_src_x = src.width() as f32 / bounds.width;
    let to_src_y = src.height() as f32 / bounds.height;
    let half_w = bounds.width / 2.0;
    let half_h = bounds.height / 2.0;

    for y in y0..y1 {
        for x in x0..x1 {
            let Ok(local) = transform.invert(Point::new(x as f32 + 0.5, y as f32 + 0.5)) else {
                return;
            };
            if local.x < -half_w || local.x > half_w || local.y < -half_h || local.y > half_h {
                continue;
            }
            let sample = sample_bilinear(
                src,
                (local.x + half_w) * to_src_x,
                (local.y + half_h) * to_src_y,
            );
            blend_pixel(dst, x, y, sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn canvas(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([100, 100, 100, 255]))
    }

    #[test]
    fn half_alpha_blends_towards_source() {
        assert_eq!(
            blend_rgba([100, 100, 100, 255], [200, 0, 0, 128]),
            [150, 50, 50, 255]
        );
    }

    #[test]
    fn transparent_source_leaves_destination() {
        let mut img = canvas(1, 1);
        blend_pixel(&mut img, 0, 0, [255, 0, 0, 0]);
        assert_eq!(img.get_pixel(0, 0).0, [100, 100, 100, 255]);
    }

    #[test]
    fn single_point_stroke_paints_a_dot() {
        let mut img = canvas(10, 10);
        stroke_polyline(&mut img, &[Point::new(5.0, 5.0)], 4.0, Color::rgba(255, 0, 0, 255));
        assert_eq!(img.get_pixel(5, 5).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(0, 0).0, [100, 100, 100, 255]);
    }

    #[test]
    fn overlapping_translucent_segments_blend_once() {
        let mut img = canvas(20, 20);
        let ink = Color::rgba(200, 0, 0, 128);
        stroke_polyline(
            &mut img,
            &[
                Point::new(2.0, 10.0),
                Point::new(18.0, 10.0),
                Point::new(2.0, 10.5),
            ],
            4.0,
            ink,
        );
        assert_eq!(img.get_pixel(10, 10).0, [150, 50, 50, 255]);
    }

    #[test]
    fn polygon_fill_covers_interior_only() {
        let mut img = canvas(10, 10);
        fill_polygon(
            &mut img,
            &[
                Point::new(2.0, 2.0),
                Point::new(8.0, 2.0),
                Point::new(8.0, 8.0),
                Point::new(2.0, 8.0),
            ],
            Color::rgba(0, 255, 0, 255),
        );
        assert_eq!(img.get_pixel(5, 5).0, [0, 255, 0, 255]);
        assert_eq!(img.get_pixel(1, 1).0, [100, 100, 100, 255]);
        assert_eq!(img.get_pixel(8, 8).0, [100, 100, 100, 255]);
    }

    #[test]
    fn identity_like_transform_copies_source_pixels() {
        let mut dst = canvas(8, 8);
        let src = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]));
        let transform = Transform::identity().with_translation(Point::new(4.0, 4.0));

        draw_transformed(&mut dst, &src, Size::new(4.0, 4.0), &transform);

        assert_eq!(dst.get_pixel(3, 3).0, [0, 0, 255, 255]);
        assert_eq!(dst.get_pixel(0, 0).0, [100, 100, 100, 255]);
        assert_eq!(dst.get_pixel(7, 7).0, [100, 100, 100, 255]);
    }
}
