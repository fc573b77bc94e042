use serde::{Deserialize, Serialize};

use crate::scribble::gesture::GestureConfig;
use crate::scribble::loader::TargetSize;
use crate::scribble::model::{Color, PaintMode, PaintStyle, TextStyle};

const MIN_BRUSH_WIDTH: f32 = 0.5;
const MAX_BRUSH_WIDTH: f32 = 256.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverlaySettings {
    #[serde(default = "default_brush_color")]
    pub brush_color: Color,
    #[serde(default = "default_brush_width")]
    pub brush_width: f32,
    #[serde(default)]
    pub paint_mode: PaintMode,
    #[serde(default = "default_touch_tolerance")]
    pub touch_tolerance: f32,
    #[serde(default = "default_min_entity_scale")]
    pub min_entity_scale: f32,
    #[serde(default = "default_max_entity_scale")]
    pub max_entity_scale: f32,
    #[serde(default = "default_low_memory_max_dimension")]
    pub low_memory_max_dimension: u32,
    #[serde(default = "default_text_color")]
    pub default_text_color: Color,
    #[serde(default = "default_text_size")]
    pub default_text_size: f32,
    #[serde(default = "default_text_padding")]
    pub text_padding: f32,
    #[serde(default = "default_sticker_max_fraction")]
    pub sticker_max_fraction: f32,
    #[serde(default = "default_skip_loader_cache")]
    pub skip_loader_cache: bool,
    /// Not applied by the overlay. Hosts pass it to `logging::init` at start
    /// up, and changes reach them as a `SettingsToggle::DebugLogging` job.
    #[serde(default)]
    pub debug_logging: bool,
}

fn default_brush_color() -> Color {
    Color::WHITE
}

fn default_brush_width() -> f32 {
    8.0
}

fn default_touch_tolerance() -> f32 {
    4.0
}

fn default_min_entity_scale() -> f32 {
    0.1
}

fn default_max_entity_scale() -> f32 {
    10.0
}

fn default_low_memory_max_dimension() -> u32 {
    768
}

fn default_text_color() -> Color {
    Color::WHITE
}

fn default_text_size() -> f32 {
    48.0
}

fn default_text_padding() -> f32 {
    8.0
}

fn default_sticker_max_fraction() -> f32 {
    0.5
}

fn default_skip_loader_cache() -> bool {
    true
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            brush_color: default_brush_color(),
            brush_width: default_brush_width(),
            paint_mode: PaintMode::default(),
            touch_tolerance: default_touch_tolerance(),
            min_entity_scale: default_min_entity_scale(),
            max_entity_scale: default_max_entity_scale(),
            low_memory_max_dimension: default_low_memory_max_dimension(),
            default_text_color: default_text_color(),
            default_text_size: default_text_size(),
            text_padding: default_text_padding(),
            sticker_max_fraction: default_sticker_max_fraction(),
            skip_loader_cache: default_skip_loader_cache(),
            debug_logging: false,
        }
    }
}

fn positive_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

impl OverlaySettings {
    /// Replaces values that would break rendering or gestures with defaults.
    pub fn sanitize(&mut self) {
        self.brush_width =
            positive_or(self.brush_width, default_brush_width()).clamp(MIN_BRUSH_WIDTH, MAX_BRUSH_WIDTH);
        self.touch_tolerance = if self.touch_tolerance.is_finite() {
            self.touch_tolerance.max(0.0)
        } else {
            default_touch_tolerance()
        };
        self.min_entity_scale = positive_or(self.min_entity_scale, default_min_entity_scale());
        self.max_entity_scale = positive_or(self.max_entity_scale, default_max_entity_scale());
        if self.min_entity_scale > self.max_entity_scale {
            std::mem::swap(&mut self.min_entity_scale, &mut self.max_entity_scale);
        }
        if self.low_memory_max_dimension == 0 {
            self.low_memory_max_dimension = default_low_memory_max_dimension();
        }
        self.default_text_size = positive_or(self.default_text_size, default_text_size());
        self.text_padding = if self.text_padding.is_finite() {
            self.text_padding.max(0.0)
        } else {
            default_text_padding()
        };
        self.sticker_max_fraction =
            positive_or(self.sticker_max_fraction, default_sticker_max_fraction()).min(1.0);
    }

    pub fn paint_style(&self) -> PaintStyle {
        PaintStyle {
            stroke_color: self.brush_color,
            fill_color: self.brush_color,
            mode: self.paint_mode,
            width: self.brush_width,
        }
    }

    pub fn text_style(&self) -> TextStyle {
        TextStyle {
            color: self.default_text_color,
            size: self.default_text_size,
            background: None,
            padding: self.text_padding,
        }
    }

    pub fn gesture_config(&self) -> GestureConfig {
        GestureConfig {
            min_scale: self.min_entity_scale,
            max_scale: self.max_entity_scale,
            ..GestureConfig::default()
        }
    }

    pub fn target_size(&self, low_memory: bool) -> TargetSize {
        if low_memory {
            TargetSize::Bounded {
                width: self.low_memory_max_dimension,
                height: self.low_memory_max_dimension,
            }
        } else {
            TargetSize::Original
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let settings: OverlaySettings =
            serde_json::from_str(r#"{"brush_width": 3.0}"#).expect("deserialize");
        assert_eq!(settings.brush_width, 3.0);
        assert_eq!(settings.low_memory_max_dimension, 768);
        assert_eq!(settings.paint_mode, PaintMode::Stroke);
        assert!(settings.skip_loader_cache);
    }

    #[test]
    fn paint_mode_uses_snake_case_names() {
        let settings: OverlaySettings =
            serde_json::from_str(r#"{"paint_mode": "fill_and_stroke"}"#).expect("deserialize");
        assert_eq!(settings.paint_mode, PaintMode::FillAndStroke);
    }

    #[test]
    fn sanitize_repairs_invalid_values() {
        let mut settings = OverlaySettings {
            brush_width: -2.0,
            touch_tolerance: f32::NAN,
            min_entity_scale: 4.0,
            max_entity_scale: 0.5,
            low_memory_max_dimension: 0,
            sticker_max_fraction: 3.0,
            ..OverlaySettings::default()
        };
        settings.sanitize();

        assert_eq!(settings.brush_width, 8.0);
        assert_eq!(settings.touch_tolerance, 4.0);
        assert_eq!(settings.min_entity_scale, 0.5);
        assert_eq!(settings.max_entity_scale, 4.0);
        assert_eq!(settings.low_memory_max_dimension, 768);
        assert_eq!(settings.sticker_max_fraction, 1.0);
    }

    #[test]
    fn low_memory_target_is_bounded() {
        let settings = OverlaySettings::default();
        assert_eq!(settings.target_size(false), TargetSize::Original);
        assert_eq!(
            settings.target_size(true),
            TargetSize::Bounded {
                width: 768,
                height: 768
            }
        );
    }
}
