use crate::scribble::text;
use crate::scribble::transform::{contains_point, Point, Size, Transform};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);
    pub const WHITE: Self = Self::rgba(255, 255, 255, 255);
    pub const BLACK: Self = Self::rgba(0, 0, 0, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_rgba_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaintMode {
    #[default]
    Stroke,
    Fill,
    FillAndStroke,
}

impl PaintMode {
    pub fn strokes(self) -> bool {
        matches!(self, Self::Stroke | Self::FillAndStroke)
    }

    pub fn fills(self) -> bool {
        matches!(self, Self::Fill | Self::FillAndStroke)
    }
}

/// Paint captured by value when a stroke starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaintStyle {
    pub stroke_color: Color,
    pub fill_color: Color,
    pub mode: PaintMode,
    pub width: f32,
}

impl Default for PaintStyle {
    fn default() -> Self {
        Self {
            stroke_color: Color::WHITE,
            fill_color: Color::WHITE,
            mode: PaintMode::Stroke,
            width: 8.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub points: Vec<Point>,
    pub style: PaintStyle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub color: Color,
    pub size: f32,
    pub background: Option<Color>,
    pub padding: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            size: 48.0,
            background: None,
            padding: 8.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextContent {
    pub text: String,
    pub style: TextStyle,
}

impl TextContent {
    pub fn new(text: impl Into<String>, style: TextStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageContent {
    pub bitmap: Arc<RgbaImage>,
}

impl ImageContent {
    pub fn new(bitmap: RgbaImage) -> Self {
        Self {
            bitmap: Arc::new(bitmap),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Text,
    Image,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityContent {
    Text(TextContent),
    Image(ImageContent),
}

impl EntityContent {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityContent::Text(_) => EntityKind::Text,
            EntityContent::Image(_) => EntityKind::Image,
        }
    }

    /// Unscaled content size in view units.
    pub fn measure(&self) -> Size {
        match self {
            EntityContent::Text(content) => text::measure(content),
            EntityContent::Image(content) => Size::new(
                content.bitmap.width() as f32,
                content.bitmap.height() as f32,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: EntityId,
    pub content: EntityContent,
    pub transform: Transform,
    bounds: Size,
}

impl Entity {
    pub(crate) fn new(id: EntityId, content: EntityContent, transform: Transform) -> Self {
        let bounds = content.measure();
        Self {
            id,
            content,
            transform,
            bounds,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.content.kind()
    }

    pub fn bounds(&self) -> Size {
        self.bounds
    }

    pub fn as_text(&self) -> Option<&TextContent> {
        match &self.content {
            EntityContent::Text(content) => Some(content),
            EntityContent::Image(_) => None,
        }
    }

    /// Replaces text in place and re-measures; the transform is untouched.
    /// Returns false for image entities.
    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        let EntityContent::Text(content) = &mut self.content else {
            return false;
        };
        content.text = text.into();
        self.bounds = self.content.measure();
        true
    }

    pub fn contains_point(&self, point: Point) -> bool {
        contains_point(&self.transform, self.bounds, point)
    }

    pub fn corners(&self) -> [Point; 4] {
        self.transform.corners(self.bounds)
    }
}
