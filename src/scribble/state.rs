use crate::scribble::model::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureState {
    Idle,
    Dragging,
    Scaling,
    Rotating,
    ScalingRotating,
    Editing(EntityId),
}

impl GestureState {
    pub fn is_multi_touch(self) -> bool {
        matches!(
            self,
            Self::Scaling | Self::Rotating | Self::ScalingRotating
        )
    }

    pub fn is_editing(self) -> bool {
        matches!(self, Self::Editing(_))
    }
}

pub fn can_transition(from: GestureState, to: GestureState) -> bool {
    use GestureState::*;
    if from == to {
        return true;
    }
    if to.is_multi_touch() {
        return !from.is_editing();
    }
    matches!(
        (from, to),
        (Idle, Dragging)
            | (Idle, Editing(_))
            | (Dragging, Idle)
            | (Dragging, Editing(_))
            | (Editing(_), Idle)
            | (Scaling | Rotating | ScalingRotating, Idle | Dragging)
    )
}
