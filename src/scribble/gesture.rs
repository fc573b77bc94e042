//! Selection and gesture state machine.
//!
//! Multi-touch deltas are always computed against the previous frame's
//! pointer positions. Adding or lifting a finger mid-gesture therefore never
//! produces a jump: the next delta starts from wherever the remaining pointers
//! currently are.

use crate::scribble::entities::EntityModel;
use crate::scribble::model::{EntityId, EntityKind};
use crate::scribble::state::{can_transition, GestureState};
use crate::scribble::transform::Point;
use std::f32::consts::PI;

const MIN_PINCH_DISTANCE: f32 = 1.0;
const MAX_TRACKED_POINTERS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointerId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    PointerDown { id: PointerId, position: Point },
    PointerMove { id: PointerId, position: Point },
    PointerUp { id: PointerId, position: Point },
    /// Pre-decomposed pinch/rotate delta for hosts with their own detectors.
    MultiTouchDelta { scale_ratio: f32, rotation_delta: f32 },
    DoubleTap { position: Point },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureOutcome {
    Ignored,
    Selected(EntityId),
    SelectionCleared,
    Moved(EntityId),
    Transformed(EntityId),
    EditRequested(EntityId),
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    pub min_scale: f32,
    pub max_scale: f32,
    /// Ratios within this distance of 1.0 do not count as scaling.
    pub scale_epsilon: f32,
    /// Rotation deltas below this many radians do not count as rotating.
    pub rotation_epsilon: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.1,
            max_scale: 10.0,
            scale_epsilon: 0.002,
            rotation_epsilon: 0.002,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GestureController {
    state: GestureState,
    pointers: Vec<(PointerId, Point)>,
    config: GestureConfig,
}

impl Default for GestureController {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

impl GestureController {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            state: GestureState::Idle,
            pointers: Vec::with_capacity(MAX_TRACKED_POINTERS),
            config,
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn config(&self) -> GestureConfig {
        self.config
    }

    pub fn set_config(&mut self, config: GestureConfig) {
        self.config = config;
    }

    pub fn handle(
        &mut self,
        event: GestureEvent,
        entities: &mut EntityModel,
        selection: &mut Option<EntityId>,
    ) -> GestureOutcome {
        if self.state.is_editing() {
            return GestureOutcome::Ignored;
        }

        match event {
            GestureEvent::PointerDown { id, position } => {
                self.pointer_down(id, position, entities, selection)
            }
            GestureEvent::PointerMove { id, position } => {
                self.pointer_move(id, position, entities, *selection)
            }
            GestureEvent::PointerUp { id, .. } => self.pointer_up(id, *selection),
            GestureEvent::MultiTouchDelta {
                scale_ratio,
                rotation_delta,
            } => self.apply_multi_touch(scale_ratio, rotation_delta, entities, *selection),
            GestureEvent::DoubleTap { position } => self.double_tap(position, entities, selection),
        }
    }

    /// Enters `Editing` for a text entity and selects it.
    pub fn begin_editing(
        &mut self,
        id: EntityId,
        entities: &EntityModel,
        selection: &mut Option<EntityId>,
    ) -> bool {
        let is_text = entities
            .find(id)
            .is_some_and(|entity| entity.kind() == EntityKind::Text);
        if !is_text {
            return false;
        }
        self.pointers.clear();
        if self.state.is_editing() {
            self.transition(GestureState::Idle);
        }
        if !self.transition(GestureState::Editing(id)) {
            return false;
        }
        *selection = Some(id);
        true
    }

    /// Leaves `Editing`; returns the entity that was being edited.
    pub fn finish_editing(&mut self) -> Option<EntityId> {
        let GestureState::Editing(id) = self.state else {
            return None;
        };
        self.transition(GestureState::Idle);
        Some(id)
    }

    /// Drops tracked pointers and returns to `Idle`.
    pub fn reset(&mut self) {
        self.pointers.clear();
        self.state = GestureState::Idle;
    }

    fn transition(&mut self, to: GestureState) -> bool {
        if !can_transition(self.state, to) {
            tracing::debug!(from = ?self.state, ?to, "rejected gesture transition");
            return false;
        }
        if self.state != to {
            tracing::trace!(from = ?self.state, ?to, "gesture transition");
        }
        self.state = to;
        true
    }

    fn pointer_down(
        &mut self,
        id: PointerId,
        position: Point,
        entities: &EntityModel,
        selection: &mut Option<EntityId>,
    ) -> GestureOutcome {
        if let Some(tracked) = self.pointers.iter_mut().find(|(p, _)| *p == id) {
            tracked.1 = position;
            return GestureOutcome::Ignored;
        }

        if !self.pointers.is_empty() {
            if self.pointers.len() < MAX_TRACKED_POINTERS {
                self.pointers.push((id, position));
            }
            return GestureOutcome::Ignored;
        }

        self.pointers.push((id, position));
        match entities.hit_test(position) {
            Some(hit) => {
                *selection = Some(hit);
                self.transition(GestureState::Dragging);
                GestureOutcome::Selected(hit)
            }
            None => {
                let had_selection = selection.take().is_some();
                self.transition(GestureState::Idle);
                if had_selection {
                    GestureOutcome::SelectionCleared
                } else {
                    GestureOutcome::Ignored
                }
            }
        }
    }

    fn pointer_move(
        &mut self,
        id: PointerId,
        position: Point,
        entities: &mut EntityModel,
        selection: Option<EntityId>,
    ) -> GestureOutcome {
        let previous: Vec<Point> = self.pointers.iter().map(|(_, p)| *p).collect();
        let Some(index) = self.pointers.iter().position(|(p, _)| *p == id) else {
            return GestureOutcome::Ignored;
        };
        self.pointers[index].1 = position;

        let Some(selected) = selection else {
            return GestureOutcome::Ignored;
        };

        if self.pointers.len() >= 2 {
            let (prev_a, prev_b) = (previous[0], previous[1]);
            let (cur_a, cur_b) = (self.pointers[0].1, self.pointers[1].1);
            let prev_distance = prev_a.distance(prev_b);
            let cur_distance = cur_a.distance(cur_b);
            if prev_distance < MIN_PINCH_DISTANCE || cur_distance < MIN_PINCH_DISTANCE {
                return GestureOutcome::Ignored;
            }
            let ratio = cur_distance / prev_distance;
            let rotation = normalize_angle(cur_a.angle_to(cur_b) - prev_a.angle_to(prev_b));
            return self.apply_multi_touch(ratio, rotation, entities, selection);
        }

        if self.state != GestureState::Dragging {
            return GestureOutcome::Ignored;
        }
        let Some(entity) = entities.find_mut(selected) else {
            return GestureOutcome::Ignored;
        };
        let last = previous[index];
        entity
            .transform
            .translate_by(position.x - last.x, position.y - last.y);
        GestureOutcome::Moved(selected)
    }

    fn pointer_up(&mut self, id: PointerId, selection: Option<EntityId>) -> GestureOutcome {
        self.pointers.retain(|(p, _)| *p != id);
        if self.pointers.is_empty() {
            self.transition(GestureState::Idle);
            return GestureOutcome::Released;
        }
        if selection.is_some() && self.state.is_multi_touch() {
            self.transition(GestureState::Dragging);
        }
        GestureOutcome::Ignored
    }

    fn apply_multi_touch(
        &mut self,
        scale_ratio: f32,
        rotation_delta: f32,
        entities: &mut EntityModel,
        selection: Option<EntityId>,
    ) -> GestureOutcome {
        let Some(selected) = selection else {
            return GestureOutcome::Ignored;
        };
        let Some(entity) = entities.find_mut(selected) else {
            return GestureOutcome::Ignored;
        };

        entity.transform.scale_by_clamped(
            scale_ratio,
            self.config.min_scale,
            self.config.max_scale,
        );
        entity.transform.rotate_by(rotation_delta);

        let scaling = (scale_ratio - 1.0).abs() > self.config.scale_epsilon;
        let rotating = rotation_delta.abs() > self.config.rotation_epsilon;
        let next = match (scaling, rotating) {
            (true, true) => Some(GestureState::ScalingRotating),
            (true, false) => Some(GestureState::Scaling),
            (false, true) => Some(GestureState::Rotating),
            (false, false) => None,
        };
        if let Some(next) = next {
            self.transition(next);
        }
        GestureOutcome::Transformed(selected)
    }

    fn double_tap(
        &mut self,
        position: Point,
        entities: &EntityModel,
        selection: &mut Option<EntityId>,
    ) -> GestureOutcome {
        let Some(hit) = entities.hit_test(position) else {
            return GestureOutcome::Ignored;
        };
        *selection = Some(hit);
        if self.begin_editing(hit, entities, selection) {
            GestureOutcome::EditRequested(hit)
        } else {
            GestureOutcome::Selected(hit)
        }
    }
}

fn normalize_angle(mut angle: f32) -> f32 {
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle <= -PI {
        angle += 2.0 * PI;
    }
    angle
}
