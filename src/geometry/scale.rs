use crate::foundation::core::{PixelSize, Point, Size, Vec2};

/// Uniform ratio between a render surface and the original image it stands in for.
///
/// Settings are expressed in original-image pixels. Every pixel quantity handed to a renderer
/// passes through one of these so a downscaled preview and a full-resolution export agree in
/// proportion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderScale {
    factor: f64,
}

impl RenderScale {
    /// The 1:1 scale used for exports.
    pub const IDENTITY: Self = Self { factor: 1.0 };

    /// Scale from an original width to the width actually rendered.
    ///
    /// Derived from integer widths so the factor matches the surface that was allocated.
    pub fn from_widths(original_width: u32, render_width: u32) -> Self {
        if original_width == 0 {
            return Self::IDENTITY;
        }
        Self {
            factor: f64::from(render_width) / f64::from(original_width),
        }
    }

    /// Scale between an original and a render size.
    pub fn between(original: PixelSize, render: PixelSize) -> Self {
        Self::from_widths(original.width, render.width)
    }

    /// Render pixels per original pixel.
    pub fn factor(self) -> f64 {
        self.factor
    }

    /// Scale a linear quantity (length, offset, blur radius) into render space.
    pub fn len(self, original: f64) -> f64 {
        original * self.factor
    }

    /// Convert a render-space length back into original-image units.
    pub fn to_original_len(self, render: f64) -> f64 {
        if self.factor > 0.0 {
            render / self.factor
        } else {
            render
        }
    }

    /// Scale a per-pixel rate (such as a wave frequency) into render space.
    pub fn rate(self, original: f64) -> f64 {
        if self.factor > 0.0 {
            original / self.factor
        } else {
            original
        }
    }

    /// Map an original-image point onto the render surface.
    pub fn to_render_point(self, p: Point) -> Point {
        Point::new(p.x * self.factor, p.y * self.factor)
    }

    /// Map a render-surface point back into original-image space.
    pub fn to_original_point(self, p: Point) -> Point {
        if self.factor > 0.0 {
            Point::new(p.x / self.factor, p.y / self.factor)
        } else {
            p
        }
    }

    /// Scale a size into render space.
    pub fn to_render_size(self, s: Size) -> Size {
        Size::new(s.width * self.factor, s.height * self.factor)
    }
}

/// Largest size with the same aspect ratio as `original` that fits inside `max_w x max_h`.
///
/// Never upscales. Each side is at least one pixel.
pub fn fit_within(original: PixelSize, max_w: u32, max_h: u32) -> PixelSize {
    if original.is_empty() || max_w == 0 || max_h == 0 {
        return original;
    }
    let sx = f64::from(max_w) / f64::from(original.width);
    let sy = f64::from(max_h) / f64::from(original.height);
    let s = sx.min(sy).min(1.0);
    if s >= 1.0 {
        return original;
    }
    let w = (f64::from(original.width) * s).round().max(1.0) as u32;
    let h = (f64::from(original.height) * s).round().max(1.0) as u32;
    PixelSize::new(w.min(max_w), h.min(max_h))
}

/// Keep a `content`-sized box whose top-left is `p` inside `canvas`, honoring `margin`.
///
/// When the content is larger than the available span the box is pinned to the margin.
pub fn constrain_position(p: Point, content: Size, canvas: Size, margin: f64) -> Point {
    fn clamp_axis(v: f64, extent: f64, span: f64, margin: f64) -> f64 {
        let hi = span - extent - margin;
        if hi < margin {
            margin
        } else {
            v.clamp(margin, hi)
        }
    }
    Point::new(
        clamp_axis(p.x, content.width, canvas.width, margin),
        clamp_axis(p.y, content.height, canvas.height, margin),
    )
}

/// Move an original-space custom position by a render-space step (an arrow-key press on the
/// preview), keeping the watermark inside the original canvas.
pub fn nudge(
    p: Point,
    step: Vec2,
    scale: RenderScale,
    content: Size,
    canvas: Size,
    margin: f64,
) -> Point {
    let moved = Point::new(
        p.x + scale.to_original_len(step.x),
        p.y + scale.to_original_len(step.y),
    );
    constrain_position(moved, content, canvas, margin)
}

#[cfg(test)]
#[path = "../../tests/unit/geometry/scale.rs"]
mod tests;
