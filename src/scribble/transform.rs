//! Similarity transforms for overlay entities.
//!
//! Content-local coordinates are centred on the entity's content centre, so a
//! transform's translation is the on-screen centre of the entity. Points are
//! mapped scale first, then rotation, then translation.

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn distance_sq(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }

    /// Angle of the vector from `self` to `other`, in radians.
    pub fn angle_to(self, other: Point) -> f32 {
        (other.y - self.y).atan2(other.x - self.x)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformError {
    Degenerate,
}

impl std::fmt::Display for TransformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformError::Degenerate => write!(f, "transform scale must be positive"),
        }
    }
}

impl std::error::Error for TransformError {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation_x: f32,
    pub translation_y: f32,
    scale: f32,
    pub rotation_radians: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub const fn identity() -> Self {
        Self {
            translation_x: 0.0,
            translation_y: 0.0,
            scale: 1.0,
            rotation_radians: 0.0,
        }
    }

    pub fn new(
        translation: Point,
        scale: f32,
        rotation_radians: f32,
    ) -> Result<Self, TransformError> {
        Self::identity()
            .with_translation(translation)
            .with_scale(scale)
            .map(|t| t.with_rotation(rotation_radians))
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn translation(&self) -> Point {
        Point::new(self.translation_x, self.translation_y)
    }

    pub fn with_translation(mut self, translation: Point) -> Self {
        self.translation_x = translation.x;
        self.translation_y = translation.y;
        self
    }

    pub fn with_rotation(mut self, rotation_radians: f32) -> Self {
        self.rotation_radians = rotation_radians;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Result<Self, TransformError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(TransformError::Degenerate);
        }
        self.scale = scale;
        Ok(self)
    }

    pub fn translate_by(&mut self, dx: f32, dy: f32) {
        self.translation_x += dx;
        self.translation_y += dy;
    }

    /// Multiplies the current scale by `ratio`, keeping the result inside
    /// `[min, max]`. Non-finite or non-positive ratios leave the scale alone.
    pub fn scale_by_clamped(&mut self, ratio: f32, min: f32, max: f32) {
        if !(ratio.is_finite() && ratio > 0.0) {
            return;
        }
        let floor = min.max(f32::MIN_POSITIVE);
        self.scale = (self.scale * ratio).clamp(floor, max.max(floor));
    }

    pub fn rotate_by(&mut self, delta_radians: f32) {
        if delta_radians.is_finite() {
            self.rotation_radians += delta_radians;
        }
    }

    /// Maps a content-local point to screen space.
    pub fn apply(&self, point: Point) -> Point {
        let (sin, cos) = self.rotation_radians.sin_cos();
        let sx = point.x * self.scale;
        let sy = point.y * self.scale;
        Point::new(
            sx * cos - sy * sin + self.translation_x,
            sx * sin + sy * cos + self.translation_y,
        )
    }

    /// Maps a screen point back into content-local space.
    pub fn invert(&self, point: Point) -> Result<Point, TransformError> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(TransformError::Degenerate);
        }
        let (sin, cos) = self.rotation_radians.sin_cos();
        let dx = point.x - self.translation_x;
        let dy = point.y - self.translation_y;
        Ok(Point::new(
            (dx * cos + dy * sin) / self.scale,
            (-dx * sin + dy * cos) / self.scale,
        ))
    }

    /// On-screen corners of a content rectangle of `size`, clockwise from the
    /// local top-left.
    pub fn corners(&self, size: Size) -> [Point; 4] {
        let hw = size.width / 2.0;
        let hh = size.height / 2.0;
        [
            self.apply(Point::new(-hw, -hh)),
            self.apply(Point::new(hw, -hh)),
            self.apply(Point::new(hw, hh)),
            self.apply(Point::new(-hw, hh)),
        ]
    }

    /// Axis-aligned `(min, max)` bounds of the transformed content rectangle.
    pub fn bounding_box(&self, size: Size) -> (Point, Point) {
        let corners = self.corners(size);
        let mut min = corners[0];
        let mut max = corners[0];
        for corner in &corners[1..] {
            min.x = min.x.min(corner.x);
            min.y = min.y.min(corner.y);
            max.x = max.x.max(corner.x);
            max.y = max.y.max(corner.y);
        }
        (min, max)
    }

    /// Returns the transform expressed in a space uniformly scaled by
    /// `factor` (used to move view-space transforms onto a bitmap).
    pub fn scaled_space(&self, factor: f32) -> Transform {
        Transform {
            translation_x: self.translation_x * factor,
            translation_y: self.translation_y * factor,
            scale: self.scale * factor,
            rotation_radians: self.rotation_radians,
        }
    }
}

/// Tests whether a content-local point lies inside a rectangle of `size`
/// centred on the origin. Edges count as inside.
pub fn local_contains(size: Size, local: Point) -> bool {
    let hw = size.width / 2.0;
    let hh = size.height / 2.0;
    local.x >= -hw && local.x <= hw && local.y >= -hh && local.y <= hh
}

/// Hit-test primitive: inverse-maps `point` through `transform` and tests it
/// against the unscaled `size`.
pub fn contains_point(transform: &Transform, size: Size, point: Point) -> bool {
    match transform.invert(point) {
        Ok(local) => local_contains(size, local),
        Err(_) => false,
    }
}
