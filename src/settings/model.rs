use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::foundation::core::{Point, Vec2};
use crate::foundation::error::{FiligraneError, FiligraneResult};
use crate::settings::color::Color;

/// Which watermark content is rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// A text run.
    #[default]
    Text,
    /// A decoded image (raster or SVG).
    Image,
}

/// Named single-instance positions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    /// `(margin, margin)`.
    TopLeft,
    /// `(W - cw - margin, margin)`.
    TopRight,
    /// `(margin, H - ch - margin)`.
    BottomLeft,
    /// `(W - cw - margin, H - ch - margin)`.
    #[default]
    BottomRight,
    /// `((W - cw) / 2, (H - ch) / 2)`.
    MiddleCenter,
}

/// Spatial arrangement of watermark instances.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pattern {
    /// One instance at an anchor or custom position.
    #[default]
    Single,
    /// Row-major `ceil(sqrt(q))` columns.
    Grid,
    /// Top-left to bottom-right line, rotated by an extra 45 degrees.
    Diagonal,
    /// Sine wave across the canvas width.
    Wave,
    /// Ring around the canvas center, instances radiating outward.
    Circular,
    /// Seeded pseudo-random scatter.
    Random,
}

impl Pattern {
    /// Return `true` for patterns that emit `quantity` instances.
    pub fn is_multi(self) -> bool {
        !matches!(self, Self::Single)
    }
}

/// Compositing mode for image watermarks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    /// Source-over.
    #[default]
    Normal,
    /// `s * d`.
    Multiply,
    /// `s + d - s * d`.
    Screen,
    /// Hard light with layers swapped.
    Overlay,
    /// `min(s, d)`.
    Darken,
    /// `max(s, d)`.
    Lighten,
    /// Brightens the backdrop.
    ColorDodge,
    /// Darkens the backdrop.
    ColorBurn,
    /// Multiply or screen, keyed on the source.
    HardLight,
    /// Softer hard light.
    SoftLight,
    /// `|d - s|`.
    Difference,
    /// `d + s - 2 * d * s`.
    Exclusion,
    /// Source hue, backdrop saturation and luminosity.
    Hue,
    /// Source saturation, backdrop hue and luminosity.
    Saturation,
    /// Source hue and saturation, backdrop luminosity.
    Color,
    /// Source luminosity, backdrop hue and saturation.
    Luminosity,
}

impl BlendMode {
    /// All sixteen modes, in declaration order.
    pub const ALL: [Self; 16] = [
        Self::Normal,
        Self::Multiply,
        Self::Screen,
        Self::Overlay,
        Self::Darken,
        Self::Lighten,
        Self::ColorDodge,
        Self::ColorBurn,
        Self::HardLight,
        Self::SoftLight,
        Self::Difference,
        Self::Exclusion,
        Self::Hue,
        Self::Saturation,
        Self::Color,
        Self::Luminosity,
    ];
}

/// Offset in original-image pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Offset {
    /// Horizontal offset.
    pub x: f64,
    /// Vertical offset.
    pub y: f64,
}

impl Offset {
    /// As a kurbo vector.
    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Visual effects. Pixel quantities are in original-image space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Effects {
    /// Gaussian blur applied to each instance, in px.
    pub blur: f64,
    /// Drop shadow toggle.
    pub shadow: bool,
    /// Drop shadow color.
    pub shadow_color: Color,
    /// Drop shadow blur, in px (canvas `shadowBlur` semantics: twice the gaussian sigma).
    pub shadow_blur: f64,
    /// Drop shadow offset, in px.
    pub shadow_offset: Offset,
    /// Outline toggle (text only).
    pub stroke: bool,
    /// Outline color.
    pub stroke_color: Color,
    /// Outline width, in px.
    pub stroke_width: f64,
    /// Grain strength, 0-100.
    pub noise: f64,
    /// Glow toggle.
    pub glow: bool,
    /// Glow color.
    pub glow_color: Color,
    /// Glow strength, 0-100.
    pub glow_intensity: f64,
    /// Glow reach, in px.
    pub glow_spread: f64,
    /// Wave pattern amplitude, in px.
    pub wave_amplitude: f64,
    /// Wave pattern frequency, in radians per px.
    pub wave_frequency: f64,
}

impl Default for Effects {
    fn default() -> Self {
        Self {
            blur: 0.0,
            shadow: false,
            shadow_color: Color::BLACK,
            shadow_blur: 5.0,
            shadow_offset: Offset::default(),
            stroke: false,
            stroke_color: Color::BLACK,
            stroke_width: 1.0,
            noise: 0.0,
            glow: false,
            glow_color: Color::WHITE,
            glow_intensity: 50.0,
            glow_spread: 10.0,
            wave_amplitude: 20.0,
            wave_frequency: 0.02,
        }
    }
}

/// Immutable-per-render watermark configuration.
///
/// Field names serialize in camelCase so persisted snapshots stay readable by other tools that
/// share the same settings shape. Unknown fields are ignored on load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatermarkSettings {
    /// Text or image content.
    pub content_kind: ContentKind,
    /// Image content size, percent of the base image's shorter side.
    pub size: f64,
    /// Per-instance rotation in degrees.
    pub rotation: f64,
    /// Global opacity, 0-100.
    pub opacity: f64,
    /// Named anchor for the single pattern.
    pub position: Anchor,
    /// Explicit top-left in original-image space, overrides `position`.
    pub custom_position: Option<Point>,
    /// Margin from the image edges, original-image px.
    pub edge_margin: f64,
    /// Placement pattern.
    pub pattern: Pattern,
    /// Instance count for multi-instance patterns.
    pub quantity: u32,
    /// Instance spacing, original-image px. Persisted for the controls; layouts derive their
    /// step from the canvas and content size.
    pub spacing: f64,
    /// Text content.
    pub text: String,
    /// Registered font family for text content.
    pub font_family: String,
    /// Font size, original-image px.
    pub font_size: f64,
    /// Text fill color.
    pub font_color: Color,
    /// Compositing mode, image content only.
    pub blend_mode: BlendMode,
    /// Visual effects.
    pub effects: Effects,
}

impl Default for WatermarkSettings {
    fn default() -> Self {
        Self {
            content_kind: ContentKind::Text,
            size: 25.0,
            rotation: 0.0,
            opacity: 70.0,
            position: Anchor::BottomRight,
            custom_position: None,
            edge_margin: 20.0,
            pattern: Pattern::Single,
            quantity: 1,
            spacing: 20.0,
            text: String::new(),
            font_family: "Arial".to_owned(),
            font_size: 24.0,
            font_color: Color::WHITE,
            blend_mode: BlendMode::Normal,
            effects: Effects::default(),
        }
    }
}

impl WatermarkSettings {
    /// Parse settings JSON and apply [`WatermarkSettings::clamped`].
    pub fn from_json_str(s: &str) -> FiligraneResult<Self> {
        let settings: Self =
            serde_json::from_str(s).map_err(|e| FiligraneError::serde(e.to_string()))?;
        Ok(settings.clamped())
    }

    /// Load settings JSON from a file.
    pub fn from_path(path: impl AsRef<Path>) -> FiligraneResult<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read settings '{}'", path.display()))?;
        Self::from_json_str(&s)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_string(&self) -> FiligraneResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| FiligraneError::serde(e.to_string()))
    }

    /// Producer-side normalization: percentages into `[0, 100]`, pixel quantities non-negative,
    /// `quantity >= 1`. Renderers trust settings that went through here.
    pub fn clamped(mut self) -> Self {
        fn finite_or(v: f64, default: f64) -> f64 {
            if v.is_finite() { v } else { default }
        }
        fn pct(v: f64) -> f64 {
            finite_or(v, 0.0).clamp(0.0, 100.0)
        }
        fn px(v: f64) -> f64 {
            finite_or(v, 0.0).max(0.0)
        }

        self.size = pct(self.size);
        self.opacity = pct(self.opacity);
        self.rotation = finite_or(self.rotation, 0.0);
        self.quantity = self.quantity.max(1);
        self.edge_margin = px(self.edge_margin);
        self.spacing = px(self.spacing);
        self.font_size = px(self.font_size);
        if let Some(p) = self.custom_position
            && !(p.x.is_finite() && p.y.is_finite())
        {
            self.custom_position = None;
        }

        let fx = &mut self.effects;
        fx.blur = px(fx.blur);
        fx.shadow_blur = px(fx.shadow_blur);
        fx.shadow_offset.x = finite_or(fx.shadow_offset.x, 0.0);
        fx.shadow_offset.y = finite_or(fx.shadow_offset.y, 0.0);
        fx.stroke_width = px(fx.stroke_width);
        fx.noise = pct(fx.noise);
        fx.glow_intensity = pct(fx.glow_intensity);
        fx.glow_spread = px(fx.glow_spread);
        fx.wave_amplitude = finite_or(fx.wave_amplitude, 0.0);
        fx.wave_frequency = finite_or(fx.wave_frequency, 0.0);
        self
    }

    /// Check the render-time contract: active content is present and multi-instance patterns
    /// have a positive quantity.
    pub fn validate(&self) -> FiligraneResult<()> {
        if self.pattern.is_multi() && self.quantity == 0 {
            return Err(FiligraneError::validation(
                "quantity must be >= 1 for multi-instance patterns",
            ));
        }
        if self.content_kind == ContentKind::Text {
            if self.text.is_empty() {
                return Err(FiligraneError::validation(
                    "text watermark requires non-empty text",
                ));
            }
            if !(self.font_size.is_finite() && self.font_size > 0.0) {
                return Err(FiligraneError::validation(
                    "text watermark font_size must be finite and > 0",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/settings/model.rs"]
mod tests;
