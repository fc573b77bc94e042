use crate::scribble::model::Stroke;

/// Committed strokes, most recent last.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StrokeHistory {
    undo_stack: Vec<Stroke>,
}

impl StrokeHistory {
    pub fn commit(&mut self, stroke: Stroke) {
        self.undo_stack.push(stroke);
    }

    /// Pops the most recent stroke. Empty history is a no-op.
    pub fn undo(&mut self) -> Option<Stroke> {
        self.undo_stack.pop()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo_stack.is_empty()
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.undo_stack
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scribble::model::PaintStyle;
    use crate::scribble::transform::Point;

    fn sample_stroke(id: i32) -> Stroke {
        Stroke {
            points: vec![
                Point::new(id as f32, id as f32),
                Point::new(id as f32 + 1.0, id as f32 + 1.0),
            ],
            style: PaintStyle::default(),
        }
    }

    #[test]
    fn undo_on_empty_history_changes_nothing() {
        let mut history = StrokeHistory::default();
        assert_eq!(history.undo(), None);
        assert_eq!(history.undo(), None);
        assert_eq!(history, StrokeHistory::default());
    }

    #[test]
    fn undo_removes_only_latest_commit() {
        let mut history = StrokeHistory::default();
        let first = sample_stroke(1);
        let second = sample_stroke(2);
        let third = sample_stroke(3);

        history.commit(first.clone());
        history.commit(second.clone());
        history.commit(third.clone());

        assert_eq!(history.undo(), Some(third));
        assert_eq!(history.strokes(), &[first, second]);
    }
}
