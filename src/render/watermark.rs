//! Watermark renderer: measures content once per pass and issues one draw per placement.

use crate::assets::decode::PreparedImage;
use crate::assets::fonts::{FontRegistry, PreparedText};
use crate::assets::image_file::ImageFile;
use crate::foundation::core::{Affine, PixelSize, Rect, Size, Vec2};
use crate::foundation::error::{FiligraneError, FiligraneResult};
use crate::geometry::scale::RenderScale;
use crate::layout::pattern::Placement;
use crate::render::surface::{InstanceContent, InstanceDraw, ShadowParams, StrokeParams, Surface};
use crate::settings::model::{BlendMode, ContentKind, WatermarkSettings};

/// The active watermark content for a render.
#[derive(Clone, Copy, Debug)]
pub enum Watermark<'a> {
    /// A text run in the settings' font.
    Text(&'a str),
    /// An image watermark.
    Image(&'a ImageFile),
}

impl<'a> Watermark<'a> {
    /// Pick the content `settings` asks for. Exactly one kind is active.
    pub fn select(
        settings: &'a WatermarkSettings,
        image: Option<&'a ImageFile>,
    ) -> FiligraneResult<Self> {
        match settings.content_kind {
            ContentKind::Text if settings.text.is_empty() => Err(FiligraneError::validation(
                "text watermark requires non-empty text",
            )),
            ContentKind::Text => Ok(Self::Text(&settings.text)),
            ContentKind::Image => image.map(Self::Image).ok_or_else(|| {
                FiligraneError::validation("image watermark selected but no image supplied")
            }),
        }
    }
}

/// Render-space effect parameters, derived from settings through one [`RenderScale`].
#[derive(Clone, Debug, PartialEq)]
pub struct ScaledEffects {
    /// Font size in surface px.
    pub font_size: f64,
    /// Opacity in `[0, 1]`.
    pub opacity: f32,
    /// Compositing mode; text always uses `Normal`.
    pub blend: BlendMode,
    /// Drop shadow.
    pub shadow: Option<ShadowParams>,
    /// Glow.
    pub glow: Option<ShadowParams>,
    /// Text outline.
    pub stroke: Option<StrokeParams>,
    /// Gaussian blur sigma.
    pub blur: f64,
    /// Grain amount in `[0, 1]`.
    pub noise: f32,
}

impl ScaledEffects {
    /// Scale every pixel quantity in `settings` into render space.
    pub fn from_settings(settings: &WatermarkSettings, scale: RenderScale) -> Self {
        let fx = &settings.effects;
        let shadow = fx.shadow.then(|| ShadowParams {
            color: fx.shadow_color,
            blur: scale.len(fx.shadow_blur),
            offset: Vec2::new(scale.len(fx.shadow_offset.x), scale.len(fx.shadow_offset.y)),
            strength: 1.0,
        });
        let glow = (fx.glow && fx.glow_intensity > 0.0).then(|| ShadowParams {
            color: fx.glow_color,
            blur: scale.len(fx.glow_spread),
            offset: Vec2::ZERO,
            strength: (fx.glow_intensity / 100.0) as f32,
        });
        let text = settings.content_kind == ContentKind::Text;
        let stroke = (text && fx.stroke && fx.stroke_width > 0.0).then(|| StrokeParams {
            color: fx.stroke_color,
            width: scale.len(fx.stroke_width),
        });
        Self {
            font_size: scale.len(settings.font_size),
            opacity: (settings.opacity / 100.0).clamp(0.0, 1.0) as f32,
            blend: if text {
                BlendMode::Normal
            } else {
                settings.blend_mode
            },
            shadow,
            glow,
            stroke,
            blur: scale.len(fx.blur),
            noise: (fx.noise / 100.0).clamp(0.0, 1.0) as f32,
        }
    }
}

#[derive(Debug)]
enum MeasuredContent {
    Text(PreparedText),
    Image { image: PreparedImage, size: Size },
}

/// Watermark content measured for one render pass.
#[derive(Debug)]
pub struct PreparedWatermark {
    content: MeasuredContent,
    effects: ScaledEffects,
}

impl PreparedWatermark {
    /// Render-space bounding box shared by every instance.
    pub fn size(&self) -> Size {
        match &self.content {
            MeasuredContent::Text(t) => t.size(),
            MeasuredContent::Image { size, .. } => *size,
        }
    }

    /// Effects resolved for this pass.
    pub fn effects(&self) -> &ScaledEffects {
        &self.effects
    }
}

/// Image watermark size in original-image px: the longer side is `size_pct` percent of the
/// base image's shorter side, aspect preserved.
pub fn image_target_size(natural: PixelSize, base: PixelSize, size_pct: f64) -> Size {
    if natural.is_empty() {
        return Size::ZERO;
    }
    let target = f64::from(base.width.min(base.height)) * size_pct / 100.0;
    let (nw, nh) = (f64::from(natural.width), f64::from(natural.height));
    let k = target / nw.max(nh);
    Size::new(nw * k, nh * k)
}

/// Local-to-surface transform for one instance: move to the instance center, rotate, then
/// offset so the content's own box is centered on that point.
pub fn instance_transform(placement: &Placement, content: Size) -> Affine {
    let cx = placement.x + content.width / 2.0;
    let cy = placement.y + content.height / 2.0;
    Affine::translate((cx, cy))
        * Affine::rotate(placement.rotation.to_radians())
        * Affine::translate((-content.width / 2.0, -content.height / 2.0))
}

/// Axis-aligned bounds of a placed, rotated instance.
pub fn instance_bounds(placement: &Placement, content: Size) -> Rect {
    instance_transform(placement, content).transform_rect_bbox(content.to_rect())
}

/// Draws watermark instances for one settings snapshot at one scale.
#[derive(Clone, Copy, Debug)]
pub struct WatermarkRenderer<'s> {
    settings: &'s WatermarkSettings,
    scale: RenderScale,
}

impl<'s> WatermarkRenderer<'s> {
    /// Renderer for `settings` drawn at `scale`.
    pub fn new(settings: &'s WatermarkSettings, scale: RenderScale) -> Self {
        Self { settings, scale }
    }

    /// Scale in use.
    pub fn scale(&self) -> RenderScale {
        self.scale
    }

    /// Measure and decode the content once for the whole pass.
    ///
    /// `base` is the base image's original size; image watermarks are sized against it.
    #[tracing::instrument(level = "debug", skip(self, watermark, fonts), fields(scale = self.scale.factor()))]
    pub fn prepare(
        &self,
        watermark: Watermark<'_>,
        base: PixelSize,
        fonts: &mut FontRegistry,
    ) -> FiligraneResult<PreparedWatermark> {
        let effects = ScaledEffects::from_settings(self.settings, self.scale);
        let content = match watermark {
            Watermark::Text(text) => {
                let prepared =
                    fonts.layout_text(&self.settings.font_family, text, effects.font_size as f32)?;
                MeasuredContent::Text(prepared)
            }
            Watermark::Image(file) => {
                let original = image_target_size(file.size(), base, self.settings.size);
                let size = self.scale.to_render_size(original);
                let raster = PixelSize::new(
                    size.width.round().max(1.0) as u32,
                    size.height.round().max(1.0) as u32,
                );
                let image = file.decode_for(raster)?;
                MeasuredContent::Image { image, size }
            }
        };
        Ok(PreparedWatermark { content, effects })
    }

    /// The fully-resolved draw for one placement.
    pub fn instance<'p>(
        &self,
        prepared: &'p PreparedWatermark,
        placement: &Placement,
        noise_seed: u64,
    ) -> InstanceDraw<'p> {
        let fx = &prepared.effects;
        let content = match &prepared.content {
            MeasuredContent::Text(text) => InstanceContent::Text {
                text,
                fill: self.settings.font_color,
                stroke: fx.stroke,
            },
            MeasuredContent::Image { image, size } => InstanceContent::Image {
                image,
                size: *size,
            },
        };
        InstanceDraw {
            content,
            transform: instance_transform(placement, prepared.size()),
            opacity: fx.opacity,
            blend: fx.blend,
            shadow: fx.shadow,
            glow: fx.glow,
            blur: fx.blur,
            noise: fx.noise,
            noise_seed,
        }
    }

    /// Draw every placement in order.
    pub fn draw_all<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        prepared: &PreparedWatermark,
        placements: &[Placement],
        noise_seed: u64,
    ) -> FiligraneResult<()> {
        for placement in placements {
            surface.draw_instance(&self.instance(prepared, placement, noise_seed))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/watermark.rs"]
mod tests;
