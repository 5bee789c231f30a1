//! Placement math for every watermark pattern.
//!
//! One pure, enum-dispatched function serves preview and export. Inputs are already in render
//! space; [`LayoutRequest::from_settings`] performs the conversion from original-image units.

use std::f64::consts::TAU;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::foundation::core::{Point, Size};
use crate::foundation::error::{FiligraneError, FiligraneResult};
use crate::foundation::math::frac_sin;
use crate::geometry::scale::RenderScale;
use crate::settings::model::{Anchor, Pattern, WatermarkSettings};

/// Extra rotation applied to every diagonal instance, in degrees.
pub const DIAGONAL_ROTATION_DEG: f64 = 45.0;
/// Circle radius as a fraction of the canvas's shorter side.
pub const CIRCULAR_RADIUS_FRACTION: f64 = 0.35;

/// One emitted instance: top-left anchor and rotation, in render space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Left edge before rotation.
    pub x: f64,
    /// Top edge before rotation.
    pub y: f64,
    /// Rotation about the instance's own center, in degrees.
    pub rotation: f64,
}

impl Placement {
    /// Top-left corner as a point.
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Everything the layout engine reads. All lengths share the canvas's coordinate space.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutRequest {
    /// Arrangement rule.
    pub pattern: Pattern,
    /// Instance count for multi-instance patterns.
    pub quantity: u32,
    /// Surface size.
    pub canvas: Size,
    /// Measured watermark bounding box.
    pub content: Size,
    /// Base rotation in degrees.
    pub rotation_deg: f64,
    /// Distance kept from the edges.
    pub edge_margin: f64,
    /// Explicit top-left for the single pattern.
    pub custom_position: Option<Point>,
    /// Named anchor for the single pattern.
    pub anchor: Anchor,
    /// Wave amplitude.
    pub wave_amplitude: f64,
    /// Wave frequency, radians per unit length.
    pub wave_frequency: f64,
    /// Seed for the random pattern.
    pub seed: u64,
}

impl LayoutRequest {
    /// Build a render-space request from original-image settings.
    ///
    /// `canvas` and `content` are render-space sizes; `scale` converts the margin, custom
    /// position and wave parameters.
    pub fn from_settings(
        settings: &WatermarkSettings,
        canvas: Size,
        content: Size,
        scale: RenderScale,
        seed: u64,
    ) -> Self {
        Self {
            pattern: settings.pattern,
            quantity: settings.quantity,
            canvas,
            content,
            rotation_deg: settings.rotation,
            edge_margin: scale.len(settings.edge_margin),
            custom_position: settings.custom_position.map(|p| scale.to_render_point(p)),
            anchor: settings.position,
            wave_amplitude: scale.len(settings.effects.wave_amplitude),
            wave_frequency: scale.rate(settings.effects.wave_frequency),
            seed,
        }
    }
}

/// A seed drawn from the wall clock, in milliseconds.
pub fn fresh_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

static PER_RENDER_DRAWS: AtomicU64 = AtomicU64::new(0);

/// How a render obtains its random-pattern seed.
///
/// The caller owns this choice; nothing below it remembers a previous seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeedPolicy {
    /// Reuse one seed for every render, so preview and export agree.
    Fixed(u64),
    /// Draw a fresh clock seed on every render. Two draws in one process never repeat.
    PerRender,
}

impl SeedPolicy {
    /// A fixed policy seeded from the clock now.
    pub fn fixed_now() -> Self {
        Self::Fixed(fresh_seed())
    }

    /// The seed for one render.
    pub fn resolve(self) -> u64 {
        match self {
            Self::Fixed(seed) => seed,
            Self::PerRender => {
                fresh_seed().wrapping_add(PER_RENDER_DRAWS.fetch_add(1, Ordering::Relaxed))
            }
        }
    }
}

/// Compute the ordered placements for `req`.
#[tracing::instrument(level = "trace", skip(req), fields(pattern = ?req.pattern, quantity = req.quantity))]
pub fn layout_placements(req: &LayoutRequest) -> FiligraneResult<Vec<Placement>> {
    if req.pattern.is_multi() && req.quantity == 0 {
        return Err(FiligraneError::validation(format!(
            "pattern {:?} requires quantity >= 1",
            req.pattern
        )));
    }

    let out = match req.pattern {
        Pattern::Single => vec![single(req)],
        Pattern::Grid => grid(req),
        Pattern::Diagonal => diagonal(req),
        Pattern::Wave => wave(req),
        Pattern::Circular => circular(req),
        Pattern::Random => random(req),
    };
    Ok(out)
}

fn free_width(req: &LayoutRequest) -> f64 {
    req.canvas.width - req.content.width
}

fn free_height(req: &LayoutRequest) -> f64 {
    req.canvas.height - req.content.height
}

// `max(n - 1, 1)` as a divisor.
fn steps(n: u32) -> f64 {
    f64::from(n.saturating_sub(1).max(1))
}

fn single(req: &LayoutRequest) -> Placement {
    let origin = req
        .custom_position
        .unwrap_or_else(|| anchor_origin(req.anchor, req.canvas, req.content, req.edge_margin));
    Placement {
        x: origin.x,
        y: origin.y,
        rotation: req.rotation_deg,
    }
}

/// Top-left of a `content` box at a named anchor.
pub fn anchor_origin(anchor: Anchor, canvas: Size, content: Size, margin: f64) -> Point {
    let right = canvas.width - content.width - margin;
    let bottom = canvas.height - content.height - margin;
    match anchor {
        Anchor::TopLeft => Point::new(margin, margin),
        Anchor::TopRight => Point::new(right, margin),
        Anchor::BottomLeft => Point::new(margin, bottom),
        Anchor::BottomRight => Point::new(right, bottom),
        Anchor::MiddleCenter => Point::new(
            (canvas.width - content.width) / 2.0,
            (canvas.height - content.height) / 2.0,
        ),
    }
}

fn grid(req: &LayoutRequest) -> Vec<Placement> {
    let q = req.quantity;
    let cols = (f64::from(q).sqrt().ceil() as u32).max(1);
    let rows = q.div_ceil(cols);
    let x_step = free_width(req) / steps(cols);
    let y_step = free_height(req) / steps(rows);

    let mut out = Vec::with_capacity(q as usize);
    'rows: for row in 0..rows {
        for col in 0..cols {
            if out.len() == q as usize {
                break 'rows;
            }
            out.push(Placement {
                x: f64::from(col) * x_step,
                y: f64::from(row) * y_step,
                rotation: req.rotation_deg,
            });
        }
    }
    out
}

fn diagonal(req: &LayoutRequest) -> Vec<Placement> {
    let denom = steps(req.quantity);
    (0..req.quantity)
        .map(|i| {
            let progress = f64::from(i) / denom;
            Placement {
                x: progress * free_width(req),
                y: progress * free_height(req),
                rotation: req.rotation_deg + DIAGONAL_ROTATION_DEG,
            }
        })
        .collect()
}

fn wave(req: &LayoutRequest) -> Vec<Placement> {
    // Spans the full canvas width; the last instance starts at the right edge.
    let step = req.canvas.width / steps(req.quantity);
    let mid = req.canvas.height / 2.0;
    (0..req.quantity)
        .map(|i| {
            let x = f64::from(i) * step;
            let y =
                mid + (x * req.wave_frequency).sin() * req.wave_amplitude - req.content.height / 2.0;
            Placement {
                x,
                y,
                rotation: req.rotation_deg,
            }
        })
        .collect()
}

fn circular(req: &LayoutRequest) -> Vec<Placement> {
    let radius = req.canvas.width.min(req.canvas.height) * CIRCULAR_RADIUS_FRACTION;
    let cx = req.canvas.width / 2.0;
    let cy = req.canvas.height / 2.0;
    let q = f64::from(req.quantity);
    (0..req.quantity)
        .map(|i| {
            let angle = f64::from(i) / q * TAU;
            Placement {
                x: cx + angle.cos() * radius - req.content.width / 2.0,
                y: cy + angle.sin() * radius - req.content.height / 2.0,
                rotation: req.rotation_deg + angle.to_degrees(),
            }
        })
        .collect()
}

fn random(req: &LayoutRequest) -> Vec<Placement> {
    let seed = req.seed as f64;
    let m = req.edge_margin;
    let span_x = (free_width(req) - 2.0 * m).max(0.0);
    let span_y = (free_height(req) - 2.0 * m).max(0.0);
    (0..req.quantity)
        .map(|i| {
            let n = f64::from(i);
            Placement {
                x: m + frac_sin(seed, n) * span_x,
                y: m + frac_sin(seed, n + 1000.0) * span_y,
                rotation: frac_sin(seed, n + 2000.0) * 360.0 + req.rotation_deg,
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/layout/pattern.rs"]
mod tests;
