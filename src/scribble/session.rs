use crate::scribble::canvas::DrawingLayer;
use crate::scribble::composite::{compose, view_to_bitmap_factor};
use crate::scribble::entities::EntityModel;
use crate::scribble::gesture::GestureController;
use crate::scribble::loader::{ImageLoader, ImageRef};
use crate::scribble::model::EntityId;
use crate::scribble::settings::OverlaySettings;
use crate::scribble::transform::Size;
use image::RgbaImage;
use std::sync::Arc;

#[derive(Clone)]
pub struct AttachedImage {
    pub image: ImageRef,
    pub loader: Arc<dyn ImageLoader>,
}

impl std::fmt::Debug for AttachedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachedImage")
            .field("image", &self.image)
            .finish_non_exhaustive()
    }
}

/// Everything one editing interaction owns, from attach to teardown.
/// Lives on the interactive thread only.
#[derive(Debug)]
pub struct Session {
    generation: u64,
    attached: Option<AttachedImage>,
    view: Option<Size>,
    pub entities: EntityModel,
    pub selection: Option<EntityId>,
    pub drawing: DrawingLayer,
    pub gestures: GestureController,
}

impl Session {
    pub fn new(generation: u64, attached: Option<AttachedImage>, settings: &OverlaySettings) -> Self {
        let mut drawing = DrawingLayer::new(settings.paint_style());
        drawing.set_touch_tolerance(settings.touch_tolerance);
        Self {
            generation,
            attached,
            view: None,
            entities: EntityModel::default(),
            selection: None,
            drawing,
            gestures: GestureController::new(settings.gesture_config()),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn attached(&self) -> Option<&AttachedImage> {
        self.attached.as_ref()
    }

    pub fn view_size(&self) -> Option<Size> {
        self.view
    }

    pub fn set_view_size(&mut self, view: Size) {
        self.view = Some(view);
    }

    /// Drops the selection unless the gesture controller is mid-edit.
    pub fn clear_selection(&mut self) {
        self.selection = None;
        if !self.gestures.state().is_editing() {
            self.gestures.reset();
        }
    }

    /// Draws the session's current entities and ink onto `bitmap`.
    pub fn composite_onto(&self, bitmap: &mut RgbaImage) {
        let factor = view_to_bitmap_factor(bitmap.width(), self.view);
        compose(bitmap, &self.entities, self.drawing.strokes(), factor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scribble::gesture::PointerId;
    use crate::scribble::model::{Color, PaintStyle};
    use crate::scribble::transform::Point;

    #[test]
    fn new_session_carries_settings_into_layers() {
        let settings = OverlaySettings {
            brush_color: Color::rgba(9, 9, 9, 255),
            min_entity_scale: 0.3,
            ..OverlaySettings::default()
        };
        let session = Session::new(4, None, &settings);

        assert_eq!(session.generation(), 4);
        assert!(session.attached().is_none());
        assert_eq!(session.drawing.paint_style().stroke_color, Color::rgba(9, 9, 9, 255));
        assert_eq!(session.gestures.config().min_scale, 0.3);
    }

    #[test]
    fn composite_scales_ink_to_bitmap_width() {
        let mut session = Session::new(1, None, &OverlaySettings::default());
        session.set_view_size(Size::new(200.0, 100.0));
        session.drawing.set_active(true);
        session.drawing.set_paint_width(4.0);
        let finger = PointerId(0);
        session.drawing.handle_pointer_down(finger, Point::new(20.0, 50.0));
        session.drawing.handle_pointer_up(finger, Point::new(180.0, 50.0));

        let mut bitmap = RgbaImage::new(100, 50);
        session.composite_onto(&mut bitmap);

        let white = PaintStyle::default().stroke_color.to_rgba_array();
        assert_eq!(bitmap.get_pixel(50, 25).0, white);
        assert_eq!(bitmap.get_pixel(50, 10).0[3], 0);
    }
}
