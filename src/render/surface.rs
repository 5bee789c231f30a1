use std::io::Cursor;

use crate::assets::decode::PreparedImage;
use crate::assets::fonts::PreparedText;
use crate::foundation::core::{Affine, PixelSize, Rect, Size, Vec2};
use crate::foundation::error::{FiligraneError, FiligraneResult};
use crate::foundation::math::unpremultiply_rgba8_in_place;
use crate::settings::color::Color;
use crate::settings::model::BlendMode;

/// A rendered raster as RGBA8 pixels.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Pixel size.
    pub fn size(&self) -> PixelSize {
        PixelSize::new(self.width, self.height)
    }

    /// The pixel at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let p = self.data.get(i..i + 4)?;
        Some([p[0], p[1], p[2], p[3]])
    }

    /// Convert to straight alpha.
    pub fn into_straight(mut self) -> Self {
        if self.premultiplied {
            unpremultiply_rgba8_in_place(&mut self.data);
            self.premultiplied = false;
        }
        self
    }

    /// Lossless PNG encoding.
    pub fn encode_png(&self) -> FiligraneResult<Vec<u8>> {
        let mut rgba = self.data.clone();
        if self.premultiplied {
            unpremultiply_rgba8_in_place(&mut rgba);
        }
        let img = image::RgbaImage::from_raw(self.width, self.height, rgba).ok_or_else(|| {
            FiligraneError::validation(format!(
                "frame buffer does not match {}x{}",
                self.width, self.height
            ))
        })?;
        let mut out = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .map_err(|e| FiligraneError::Other(anyhow::anyhow!("encode png: {e}")))?;
        Ok(out)
    }
}

/// Outline drawn under a text fill.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeParams {
    /// Stroke color.
    pub color: Color,
    /// Line width in surface px.
    pub width: f64,
}

/// Offset, blurred copy of the instance's coverage drawn beneath it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowParams {
    /// Shadow color (alpha included).
    pub color: Color,
    /// Canvas-style blur amount in surface px (gaussian sigma is half of it).
    pub blur: f64,
    /// Offset in surface px.
    pub offset: Vec2,
    /// Alpha multiplier in `[0, 1]`.
    pub strength: f32,
}

/// What one instance draws, in its local box `(0, 0)..content size`.
#[derive(Clone, Copy, Debug)]
pub enum InstanceContent<'a> {
    /// Shaped text with fill and optional outline.
    Text {
        /// Measured layout.
        text: &'a PreparedText,
        /// Fill color.
        fill: Color,
        /// Outline drawn before the fill.
        stroke: Option<StrokeParams>,
    },
    /// An image stretched to `size`.
    Image {
        /// Decoded pixels.
        image: &'a PreparedImage,
        /// Destination size.
        size: Size,
    },
}

impl InstanceContent<'_> {
    /// Size of the local box.
    pub fn size(&self) -> Size {
        match self {
            Self::Text { text, .. } => text.size(),
            Self::Image { size, .. } => *size,
        }
    }
}

/// One fully-resolved watermark instance. All lengths are in surface px.
#[derive(Clone, Copy, Debug)]
pub struct InstanceDraw<'a> {
    /// Content.
    pub content: InstanceContent<'a>,
    /// Maps the local box onto the surface.
    pub transform: Affine,
    /// Global opacity in `[0, 1]`.
    pub opacity: f32,
    /// Compositing mode against the surface.
    pub blend: BlendMode,
    /// Drop shadow.
    pub shadow: Option<ShadowParams>,
    /// Glow, drawn as an unshifted colored shadow.
    pub glow: Option<ShadowParams>,
    /// Gaussian blur sigma applied to the content.
    pub blur: f64,
    /// Grain amount in `[0, 1]`.
    pub noise: f32,
    /// Grain seed.
    pub noise_seed: u64,
}

impl InstanceDraw<'_> {
    /// Axis-aligned bounds of the transformed content box, before effects.
    pub fn content_bounds(&self) -> Rect {
        self.transform
            .transform_rect_bbox(self.content.size().to_rect())
    }
}

/// A 2D raster target.
///
/// Implementations own their pixels and are reset to a fresh, cleared buffer before each image.
pub trait Surface {
    /// Current size.
    fn size(&self) -> PixelSize;

    /// Clear and resize. Fails with `SurfaceUnavailable` when the size cannot be allocated.
    fn reset(&mut self, size: PixelSize) -> FiligraneResult<()>;

    /// Draw `image` stretched into `dest`, source-over.
    fn draw_image(&mut self, image: &PreparedImage, dest: Rect) -> FiligraneResult<()>;

    /// Draw one watermark instance with its effects.
    fn draw_instance(&mut self, draw: &InstanceDraw<'_>) -> FiligraneResult<()>;

    /// Copy out the current pixels.
    fn snapshot(&self) -> FrameRGBA;

    /// Lossless encoding of the current pixels.
    fn encode_png(&self) -> FiligraneResult<Vec<u8>> {
        self.snapshot().encode_png()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface.rs"]
mod tests;
