use crate::scribble::gesture::PointerId;
use crate::scribble::history::StrokeHistory;
use crate::scribble::model::{Color, PaintMode, PaintStyle, Stroke};
use crate::scribble::transform::Point;

const DEFAULT_TOUCH_TOLERANCE: f32 = 4.0;

/// Freehand ink layer. Pointer events are ignored unless the layer is active;
/// paint changes only affect strokes started afterwards. A stroke belongs to
/// the pointer that started it and other pointers are ignored until it ends.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawingLayer {
    active: bool,
    style: PaintStyle,
    touch_tolerance: f32,
    active_stroke: Option<Stroke>,
    active_pointer: Option<PointerId>,
    history: StrokeHistory,
    revision: u64,
}

impl Default for DrawingLayer {
    fn default() -> Self {
        Self::new(PaintStyle::default())
    }
}

impl DrawingLayer {
    pub fn new(style: PaintStyle) -> Self {
        Self {
            active: false,
            style,
            touch_tolerance: DEFAULT_TOUCH_TOLERANCE,
            active_stroke: None,
            active_pointer: None,
            history: StrokeHistory::default(),
            revision: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Deactivating drops any stroke still in progress.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        if !active {
            self.active_pointer = None;
            if self.active_stroke.take().is_some() {
                self.revision += 1;
            }
        }
    }

    pub fn paint_style(&self) -> PaintStyle {
        self.style
    }

    pub fn set_paint_fill_color(&mut self, color: Color) {
        self.style.fill_color = color;
    }

    pub fn set_paint_stroke_color(&mut self, color: Color) {
        self.style.stroke_color = color;
    }

    pub fn set_paint_width(&mut self, width: f32) {
        if width.is_finite() && width > 0.0 {
            self.style.width = width;
        }
    }

    pub fn set_paint_mode(&mut self, mode: PaintMode) {
        self.style.mode = mode;
    }

    pub fn set_touch_tolerance(&mut self, tolerance: f32) {
        self.touch_tolerance = tolerance.max(0.0);
    }

    pub fn history(&self) -> &StrokeHistory {
        &self.history
    }

    pub fn strokes(&self) -> &[Stroke] {
        self.history.strokes()
    }

    pub fn active_stroke(&self) -> Option<&Stroke> {
        self.active_stroke.as_ref()
    }

    /// Bumped whenever the visible ink changes; hosts redraw when it moves.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn handle_pointer_down(&mut self, pointer: PointerId, point: Point) -> bool {
        if !self.active || self.active_pointer.is_some() {
            return false;
        }
        self.active_pointer = Some(pointer);
        self.active_stroke = Some(Stroke {
            points: vec![point],
            style: self.style,
        });
        self.revision += 1;
        true
    }

    pub fn handle_pointer_move(&mut self, pointer: PointerId, point: Point) -> bool {
        if self.active_pointer != Some(pointer) {
            return false;
        }
        let tolerance = self.touch_tolerance;
        let Some(stroke) = self.active_stroke.as_mut() else {
            return false;
        };
        if !should_append_point(stroke.points.last().copied(), point, tolerance) {
            return false;
        }
        stroke.points.push(point);
        self.revision += 1;
        true
    }

    /// Appends the final point and commits the stroke onto the undo stack.
    pub fn handle_pointer_up(&mut self, pointer: PointerId, point: Point) -> bool {
        if self.active_pointer != Some(pointer) {
            return false;
        }
        self.active_pointer = None;
        let Some(mut stroke) = self.active_stroke.take() else {
            return false;
        };
        if stroke.points.last().copied() != Some(point) {
            stroke.points.push(point);
        }
        tracing::debug!(points = stroke.points.len(), "stroke committed");
        self.history.commit(stroke);
        self.revision += 1;
        true
    }

    pub fn undo(&mut self) -> Option<Stroke> {
        let stroke = self.history.undo()?;
        self.revision += 1;
        Some(stroke)
    }

    pub fn clear(&mut self) {
        self.active_stroke = None;
        self.active_pointer = None;
        self.history.clear();
        self.revision += 1;
    }
}

fn should_append_point(last: Option<Point>, point: Point, tolerance: f32) -> bool {
    let Some(last) = last else {
        return true;
    };
    last.distance_sq(point) >= tolerance * tolerance
}
