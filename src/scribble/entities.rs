use crate::scribble::model::{Entity, EntityContent, EntityId};
use crate::scribble::transform::{Point, Transform};

/// Insertion-ordered entity collection. Iteration order is paint order; the
/// last entity is drawn topmost and wins hit-tests.
#[derive(Debug, Clone, Default)]
pub struct EntityModel {
    entities: Vec<Entity>,
    next_id: u64,
}

impl EntityModel {
    pub fn add(&mut self, content: EntityContent, transform: Transform) -> EntityId {
        self.next_id += 1;
        let id = EntityId(self.next_id);
        self.entities.push(Entity::new(id, content, transform));
        id
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let index = self.entities.iter().position(|e| e.id() == id)?;
        Some(self.entities.remove(index))
    }

    pub fn find(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id() == id)
    }

    pub fn find_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Topmost entity containing `point`.
    pub fn hit_test(&self, point: Point) -> Option<EntityId> {
        self.entities
            .iter()
            .rev()
            .find(|e| e.contains_point(point))
            .map(Entity::id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Drops every entity. Ids keep counting up so none is ever reused.
    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scribble::model::{ImageContent, TextContent, TextStyle};
    use image::RgbaImage;

    fn sticker(width: u32, height: u32) -> EntityContent {
        EntityContent::Image(ImageContent::new(RgbaImage::new(width, height)))
    }

    fn at(x: f32, y: f32) -> Transform {
        Transform::identity().with_translation(Point::new(x, y))
    }

    fn ids(model: &EntityModel) -> Vec<EntityId> {
        model.iter().map(Entity::id).collect()
    }

    #[test]
    fn iteration_follows_insertion_minus_removed() {
        let mut model = EntityModel::default();
        let a = model.add(sticker(10, 10), at(0.0, 0.0));
        let b = model.add(sticker(10, 10), at(0.0, 0.0));
        let c = model.add(
            EntityContent::Text(TextContent::new("c", TextStyle::default())),
            at(0.0, 0.0),
        );
        let d = model.add(sticker(10, 10), at(0.0, 0.0));

        assert!(model.remove(b).is_some());
        let e = model.add(sticker(10, 10), at(0.0, 0.0));
        assert!(model.remove(a).is_some());

        assert_eq!(ids(&model), vec![c, d, e]);
        assert_eq!(model.len(), 3);
    }

    #[test]
    fn ids_are_never_reused() {
        let mut model = EntityModel::default();
        let first = model.add(sticker(4, 4), at(0.0, 0.0));
        model.remove(first);
        model.clear();
        let second = model.add(sticker(4, 4), at(0.0, 0.0));
        assert_ne!(first, second);
    }

    #[test]
    fn remove_unknown_id_is_none() {
        let mut model = EntityModel::default();
        model.add(sticker(4, 4), at(0.0, 0.0));
        assert!(model.remove(EntityId(999)).is_none());
        assert_eq!(model.len(), 1);
    }

    #[test]
    fn hit_test_prefers_topmost() {
        let mut model = EntityModel::default();
        let below = model.add(sticker(40, 40), at(50.0, 50.0));
        let above = model.add(sticker(20, 20), at(55.0, 55.0));

        assert_eq!(model.hit_test(Point::new(56.0, 56.0)), Some(above));
        assert_eq!(model.hit_test(Point::new(35.0, 35.0)), Some(below));
        assert_eq!(model.hit_test(Point::new(200.0, 200.0)), None);
    }
}
