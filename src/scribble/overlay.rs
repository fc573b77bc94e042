//! Public container over the image view, the entity layer and the ink layer.

use crate::scribble::canvas::DrawingLayer;
use crate::scribble::entities::EntityModel;
use crate::scribble::future::RenderFuture;
use crate::scribble::gesture::{GestureEvent, GestureOutcome};
use crate::scribble::jobs::{self, SettingsJob, SettingsToggle};
use crate::scribble::loader::{ImageLoader, ImageRef, MemoryPressure};
use crate::scribble::model::{Color, Entity, EntityContent, EntityId, PaintMode, Stroke, TextContent};
use crate::scribble::pipeline::{FetchRequest, RenderPipeline};
use crate::scribble::session::{AttachedImage, Session};
use crate::scribble::settings::OverlaySettings;
use crate::scribble::settings_store::SettingsStore;
use crate::scribble::state::GestureState;
use crate::scribble::transform::{Point, Size, Transform};
use std::sync::Arc;
use std::time::Duration;

/// Receives edit requests for text entities. The host shows its editor and
/// reports back through [`ScribbleOverlay::commit_text_edit`] or
/// [`ScribbleOverlay::cancel_text_edit`].
pub trait TextEditingHost {
    fn open_editor(&mut self, id: EntityId, content: &TextContent);

    fn close_editor(&mut self, _id: EntityId) {}
}

/// Measured sizes of the container and its two overlay surfaces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayLayout {
    pub container: Size,
    pub entity_surface: Size,
    pub drawing_surface: Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerOutcome {
    /// Routed to the ink layer; true when the visible ink changed.
    Ink(bool),
    Gesture(GestureOutcome),
}

pub struct ScribbleOverlay {
    settings: OverlaySettings,
    memory: Arc<dyn MemoryPressure>,
    editor: Option<Box<dyn TextEditingHost>>,
    session: Session,
    last_generation: u64,
    pipeline: RenderPipeline,
}

impl ScribbleOverlay {
    pub fn new(settings: OverlaySettings, memory: Arc<dyn MemoryPressure>) -> Self {
        let mut settings = settings;
        settings.sanitize();
        let session = Session::new(1, None, &settings);
        Self {
            settings,
            memory,
            editor: None,
            session,
            last_generation: 1,
            pipeline: RenderPipeline::new(),
        }
    }

    pub fn set_text_editor(&mut self, editor: Option<Box<dyn TextEditingHost>>) {
        self.editor = editor;
    }

    /// Starts from whatever `store` holds; an unusable file is logged and
    /// the defaults apply.
    pub fn from_store(store: &SettingsStore, memory: Arc<dyn MemoryPressure>) -> Self {
        Self::new(store.load_or_default(), memory)
    }

    pub fn save_settings(&self, store: &SettingsStore) -> anyhow::Result<()> {
        store.write(&self.settings)
    }

    pub fn settings(&self) -> &OverlaySettings {
        &self.settings
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn generation(&self) -> u64 {
        self.session.generation()
    }

    pub fn is_attached(&self) -> bool {
        self.session.attached().is_some()
    }

    fn replace_session(&mut self, attached: Option<AttachedImage>) {
        let view = self.session.view_size();
        self.last_generation += 1;
        self.session = Session::new(self.last_generation, attached, &self.settings);
        if let Some(view) = view {
            self.session.set_view_size(view);
        }
    }

    /// Starts a fresh session over `image`. Renders requested for earlier
    /// sessions resolve with `None`.
    pub fn attach(&mut self, image: ImageRef, loader: Arc<dyn ImageLoader>) {
        tracing::debug!(image = image.as_str(), "attaching base image");
        self.replace_session(Some(AttachedImage { image, loader }));
    }

    pub fn detach(&mut self) {
        if let GestureState::Editing(id) = self.session.gestures.state() {
            self.close_editor(id);
        }
        tracing::debug!(generation = self.session.generation(), "detaching session");
        self.replace_session(None);
    }

    /// The container and both overlay surfaces take exactly the image view's
    /// measured size.
    pub fn measure(&mut self, image_view_width: f32, image_view_height: f32) -> OverlayLayout {
        let size = Size::new(image_view_width.max(0.0), image_view_height.max(0.0));
        self.session.set_view_size(size);
        OverlayLayout {
            container: size,
            entity_surface: size,
            drawing_surface: size,
        }
    }

    pub fn set_drawing_mode(&mut self, enabled: bool) {
        if enabled {
            if let GestureState::Editing(id) = self.session.gestures.state() {
                self.session.gestures.finish_editing();
                self.close_editor(id);
            }
            self.session.clear_selection();
        }
        self.session.drawing.set_active(enabled);
    }

    pub fn is_drawing_mode(&self) -> bool {
        self.session.drawing.is_active()
    }

    /// Sets both fill and stroke colour for subsequent strokes.
    pub fn set_brush_color(&mut self, color: Color) {
        self.session.drawing.set_paint_fill_color(color);
        self.session.drawing.set_paint_stroke_color(color);
    }

    pub fn set_brush_width(&mut self, width: f32) {
        self.session.drawing.set_paint_width(width);
    }

    pub fn set_paint_mode(&mut self, mode: PaintMode) {
        self.session.drawing.set_paint_mode(mode);
    }

    /// Adds `content` centred in the view and selects it. Stickers start
    /// scaled down to fit within the configured fraction of the view.
    pub fn add_entity_and_position(&mut self, content: EntityContent) -> EntityId {
        let view = self.session.view_size();
        let centre = view
            .map(|v| Point::new(v.width / 2.0, v.height / 2.0))
            .unwrap_or_default();
        let scale = match (&content, view) {
            (EntityContent::Image(_), Some(view)) => {
                let size = content.measure();
                initial_sticker_scale(size, view, &self.settings)
            }
            _ => 1.0,
        };
        let transform = Transform::identity()
            .with_translation(centre)
            .with_scale(scale)
            .unwrap_or_else(|_| Transform::identity().with_translation(centre));

        let id = self.session.entities.add(content, transform);
        self.session.selection = Some(id);
        tracing::debug!(entity_id = id.0, "entity added");
        id
    }

    /// Adds a text entity styled from the current settings.
    pub fn add_text(&mut self, text: impl Into<String>) -> EntityId {
        let content = TextContent::new(text, self.settings.text_style());
        self.add_entity_and_position(EntityContent::Text(content))
    }

    pub fn entities(&self) -> &EntityModel {
        &self.session.entities
    }

    pub fn strokes(&self) -> &[Stroke] {
        self.session.drawing.strokes()
    }

    pub fn drawing_layer(&self) -> &DrawingLayer {
        &self.session.drawing
    }

    pub fn gesture_state(&self) -> GestureState {
        self.session.gestures.state()
    }

    pub fn selected_entity(&self) -> Option<&Entity> {
        let id = self.session.selection?;
        self.session.entities.find(id)
    }

    pub fn selected_entity_id(&self) -> Option<EntityId> {
        self.session.selection
    }

    /// Removes the selected entity; a no-op when nothing is selected.
    pub fn delete_selected(&mut self) -> Option<EntityId> {
        let id = self.session.selection.take()?;
        if self.session.gestures.state() == GestureState::Editing(id) {
            self.session.gestures.finish_editing();
            self.close_editor(id);
        }
        self.session.gestures.reset();
        self.session.entities.remove(id)?;
        tracing::debug!(entity_id = id.0, "entity deleted");
        Some(id)
    }

    pub fn clear_selection(&mut self) {
        self.session.clear_selection();
    }

    /// Undoes the most recent stroke. Returns false when there was nothing to
    /// undo.
    pub fn undo(&mut self) -> bool {
        self.session.drawing.undo().is_some()
    }

    /// Enters editing for a text entity and asks the host to open its editor.
    pub fn start_editing(&mut self, id: EntityId) -> bool {
        let session = &mut self.session;
        if !session
            .gestures
            .begin_editing(id, &session.entities, &mut session.selection)
        {
            return false;
        }
        self.open_editor(id);
        true
    }

    /// Replaces the edited entity's text in place and returns to `Idle`.
    pub fn commit_text_edit(&mut self, text: impl Into<String>) -> bool {
        let Some(id) = self.session.gestures.finish_editing() else {
            return false;
        };
        self.close_editor(id);
        let updated = self
            .session
            .entities
            .find_mut(id)
            .is_some_and(|entity| entity.set_text(text));
        tracing::debug!(entity_id = id.0, updated, "text edit committed");
        updated
    }

    pub fn cancel_text_edit(&mut self) {
        if let Some(id) = self.session.gestures.finish_editing() {
            self.close_editor(id);
            tracing::debug!(entity_id = id.0, "text edit cancelled");
        }
    }

    fn open_editor(&mut self, id: EntityId) {
        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        if let Some(content) = self.session.entities.find(id).and_then(Entity::as_text) {
            editor.open_editor(id, content);
        }
    }

    fn close_editor(&mut self, id: EntityId) {
        if let Some(editor) = self.editor.as_mut() {
            editor.close_editor(id);
        }
    }

    /// Routes pointer input to the ink layer in drawing mode and to the
    /// gesture controller otherwise.
    pub fn handle_pointer(&mut self, event: GestureEvent) -> PointerOutcome {
        if self.session.drawing.is_active() {
            let drawing = &mut self.session.drawing;
            let changed = match event {
                GestureEvent::PointerDown { id, position } => drawing.handle_pointer_down(id, position),
                GestureEvent::PointerMove { id, position } => drawing.handle_pointer_move(id, position),
                GestureEvent::PointerUp { id, position } => drawing.handle_pointer_up(id, position),
                GestureEvent::MultiTouchDelta { .. } | GestureEvent::DoubleTap { .. } => false,
            };
            return PointerOutcome::Ink(changed);
        }

        let session = &mut self.session;
        let outcome = session
            .gestures
            .handle(event, &mut session.entities, &mut session.selection);
        if let GestureOutcome::EditRequested(id) = outcome {
            self.open_editor(id);
        }
        PointerOutcome::Gesture(outcome)
    }

    /// Requests the flattened image. The base image is fetched off-thread;
    /// the future resolves when a later [`Self::pump_render_results`] or
    /// [`Self::wait_for_renders`] composites it.
    pub fn render_final(&mut self) -> RenderFuture {
        let low_memory = self.memory.is_low_memory();
        let Some(attached) = self.session.attached() else {
            tracing::debug!("render requested without a base image");
            return RenderFuture::resolved(None);
        };
        let target = self.settings.target_size(low_memory);
        tracing::debug!(low_memory, ?target, "render_final");
        self.pipeline.submit(FetchRequest {
            loader: Arc::clone(&attached.loader),
            image: attached.image.clone(),
            target,
            skip_cache: self.settings.skip_loader_cache,
            generation: self.session.generation(),
        })
    }

    /// Composites every render result that has already arrived.
    pub fn pump_render_results(&mut self) -> usize {
        let session = &self.session;
        self.pipeline
            .pump(Some(session.generation()), |bitmap| session.composite_onto(bitmap))
    }

    /// Blocks until all outstanding renders resolve or `timeout` elapses.
    pub fn wait_for_renders(&mut self, timeout: Duration) -> usize {
        let session = &self.session;
        self.pipeline.wait(timeout, Some(session.generation()), |bitmap| {
            session.composite_onto(bitmap)
        })
    }

    pub fn pending_renders(&self) -> usize {
        self.pipeline.pending_len()
    }

    /// Applies new settings to the live session and notifies the job hook
    /// about toggles that changed.
    pub fn apply_settings(&mut self, settings: OverlaySettings) {
        let mut settings = settings;
        settings.sanitize();
        let previous = std::mem::replace(&mut self.settings, settings);

        let toggles = [
            (
                SettingsToggle::SkipLoaderCache,
                previous.skip_loader_cache,
                self.settings.skip_loader_cache,
            ),
            (
                SettingsToggle::DebugLogging,
                previous.debug_logging,
                self.settings.debug_logging,
            ),
        ];
        for (toggle, before, after) in toggles {
            if before != after {
                jobs::submit(SettingsJob {
                    toggle,
                    enabled: after,
                });
            }
        }

        let style = self.settings.paint_style();
        let drawing = &mut self.session.drawing;
        drawing.set_paint_stroke_color(style.stroke_color);
        drawing.set_paint_fill_color(style.fill_color);
        drawing.set_paint_width(style.width);
        drawing.set_paint_mode(style.mode);
        drawing.set_touch_tolerance(self.settings.touch_tolerance);
        self.session
            .gestures
            .set_config(self.settings.gesture_config());
    }
}

fn initial_sticker_scale(size: Size, view: Size, settings: &OverlaySettings) -> f32 {
    if size.width <= 0.0 || size.height <= 0.0 || view.width <= 0.0 || view.height <= 0.0 {
        return 1.0;
    }
    let fraction = settings.sticker_max_fraction;
    let fit = (view.width * fraction / size.width).min(view.height * fraction / size.height);
    fit.min(1.0)
        .clamp(settings.min_entity_scale, settings.max_entity_scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scribble::gesture::PointerId;
    use crate::scribble::loader::FixedMemoryPressure;
    use crate::scribble::model::ImageContent;
    use image::RgbaImage;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn overlay() -> ScribbleOverlay {
        let mut overlay = ScribbleOverlay::new(
            OverlaySettings::default(),
            Arc::new(FixedMemoryPressure(false)),
        );
        overlay.measure(800.0, 600.0);
        overlay
    }

    #[derive(Default)]
    struct RecordingEditor {
        opened: Rc<RefCell<Vec<(EntityId, String)>>>,
        closed: Rc<RefCell<Vec<EntityId>>>,
    }

    impl TextEditingHost for RecordingEditor {
        fn open_editor(&mut self, id: EntityId, content: &TextContent) {
            self.opened.borrow_mut().push((id, content.text.clone()));
        }

        fn close_editor(&mut self, id: EntityId) {
            self.closed.borrow_mut().push(id);
        }
    }

    #[test]
    fn measure_propagates_exact_size() {
        let mut overlay = overlay();
        let layout = overlay.measure(320.0, 240.0);
        assert_eq!(layout.container, Size::new(320.0, 240.0));
        assert_eq!(layout.entity_surface, layout.container);
        assert_eq!(layout.drawing_surface, layout.container);
    }

    #[test]
    fn added_entity_is_centred_and_selected() {
        let mut overlay = overlay();
        let id = overlay.add_text("hello");
        let entity = overlay.selected_entity().expect("selected");
        assert_eq!(entity.id(), id);
        assert_eq!(entity.transform.translation(), Point::new(400.0, 300.0));
    }

    #[test]
    fn large_sticker_starts_scaled_into_view() {
        let mut overlay = overlay();
        let id = overlay.add_entity_and_position(EntityContent::Image(ImageContent::new(
            RgbaImage::new(1600, 600),
        )));
        let entity = overlay.entities().find(id).expect("entity");
        assert!((entity.transform.scale() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn drawing_mode_clears_selection_and_routes_to_ink() {
        let mut overlay = overlay();
        overlay.add_text("sel");
        overlay.set_drawing_mode(true);
        assert!(overlay.selected_entity().is_none());

        let outcome = overlay.handle_pointer(GestureEvent::PointerDown {
            id: PointerId(0),
            position: Point::new(400.0, 300.0),
        });
        assert_eq!(outcome, PointerOutcome::Ink(true));
        overlay.handle_pointer(GestureEvent::PointerUp {
            id: PointerId(0),
            position: Point::new(420.0, 300.0),
        });
        assert_eq!(overlay.strokes().len(), 1);
        assert!(overlay.selected_entity().is_none());
    }

    #[test]
    fn drawing_keeps_one_stroke_when_second_finger_lands() {
        let mut overlay = overlay();
        overlay.set_drawing_mode(true);
        let events = [
            GestureEvent::PointerDown { id: PointerId(0), position: Point::new(100.0, 100.0) },
            GestureEvent::PointerMove { id: PointerId(0), position: Point::new(200.0, 100.0) },
            GestureEvent::PointerDown { id: PointerId(1), position: Point::new(500.0, 500.0) },
            GestureEvent::PointerMove { id: PointerId(0), position: Point::new(300.0, 100.0) },
            GestureEvent::PointerMove { id: PointerId(1), position: Point::new(520.0, 500.0) },
            GestureEvent::PointerUp { id: PointerId(1), position: Point::new(520.0, 500.0) },
            GestureEvent::PointerMove { id: PointerId(0), position: Point::new(400.0, 100.0) },
            GestureEvent::PointerUp { id: PointerId(0), position: Point::new(400.0, 100.0) },
        ];
        for event in events {
            overlay.handle_pointer(event);
        }

        assert_eq!(overlay.strokes().len(), 1);
        let points = &overlay.strokes()[0].points;
        assert_eq!(points.first(), Some(&Point::new(100.0, 100.0)));
        assert_eq!(points.last(), Some(&Point::new(400.0, 100.0)));
        assert!(points.iter().all(|point| point.y == 100.0));
    }

    #[test]
    fn overlay_round_trips_settings_through_store() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = SettingsStore::at(dir.path().join("overlay.json"));
        std::fs::write(store.path(), "[1, 2").expect("write");

        let mut overlay = ScribbleOverlay::from_store(&store, Arc::new(FixedMemoryPressure(false)));
        assert_eq!(overlay.settings(), &OverlaySettings::default());

        let mut next = overlay.settings().clone();
        next.brush_width = 21.0;
        overlay.apply_settings(next);
        overlay.save_settings(&store).expect("save");
        let reopened = ScribbleOverlay::from_store(&store, Arc::new(FixedMemoryPressure(false)));
        assert_eq!(reopened.settings().brush_width, 21.0);
    }

    #[test]
    fn delete_selected_without_selection_is_noop() {
        let mut overlay = overlay();
        assert_eq!(overlay.delete_selected(), None);

        let id = overlay.add_text("gone");
        assert_eq!(overlay.delete_selected(), Some(id));
        assert!(overlay.selected_entity().is_none());
        assert!(overlay.entities().is_empty());
    }

    #[test]
    fn text_edit_commit_keeps_transform() {
        let mut overlay = overlay();
        let editor = RecordingEditor::default();
        let opened = Rc::clone(&editor.opened);
        let closed = Rc::clone(&editor.closed);
        overlay.set_text_editor(Some(Box::new(editor)));

        let id = overlay.add_text("draft");
        let before = overlay.entities().find(id).expect("entity").transform;

        assert!(overlay.start_editing(id));
        assert_eq!(overlay.gesture_state(), GestureState::Editing(id));
        assert_eq!(*opened.borrow(), vec![(id, "draft".to_string())]);

        assert!(overlay.commit_text_edit("final caption"));
        let entity = overlay.entities().find(id).expect("entity");
        assert_eq!(entity.transform, before);
        assert_eq!(entity.as_text().map(|t| t.text.as_str()), Some("final caption"));
        assert_eq!(overlay.gesture_state(), GestureState::Idle);
        assert_eq!(*closed.borrow(), vec![id]);
    }

    #[test]
    fn cancel_text_edit_leaves_text_untouched() {
        let mut overlay = overlay();
        let id = overlay.add_text("keep");
        assert!(overlay.start_editing(id));
        overlay.cancel_text_edit();
        assert_eq!(overlay.gesture_state(), GestureState::Idle);
        assert_eq!(
            overlay
                .entities()
                .find(id)
                .and_then(Entity::as_text)
                .map(|t| t.text.as_str()),
            Some("keep")
        );
        assert!(!overlay.commit_text_edit("late"));
    }

    #[test]
    fn undo_with_no_strokes_reports_false() {
        let mut overlay = overlay();
        assert!(!overlay.undo());
    }

    #[test]
    fn render_without_image_resolves_none_immediately() {
        let mut overlay = overlay();
        let future = overlay.render_final();
        assert_eq!(future.try_get(), Some(None));
        assert_eq!(overlay.pending_renders(), 0);
    }

    #[test]
    #[serial_test::serial]
    fn apply_settings_submits_jobs_for_changed_toggles_only() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        jobs::set_job_hook(Some(Box::new(move |job: SettingsJob| {
            sink.lock().expect("sink").push(job);
        })));

        let mut overlay = overlay();
        let mut next = overlay.settings().clone();
        next.debug_logging = true;
        next.brush_width = 20.0;
        overlay.apply_settings(next);
        jobs::set_job_hook(None);

        assert_eq!(
            *seen.lock().expect("seen"),
            vec![SettingsJob {
                toggle: SettingsToggle::DebugLogging,
                enabled: true
            }]
        );
        assert_eq!(overlay.drawing_layer().paint_style().width, 20.0);
    }

    #[test]
    fn initial_sticker_scale_never_upscales() {
        let settings = OverlaySettings::default();
        let scale = initial_sticker_scale(Size::new(10.0, 10.0), Size::new(800.0, 600.0), &settings);
        assert_eq!(scale, 1.0);
    }
}
