//! Software pixel kernels over premultiplied RGBA8 buffers.

use crate::foundation::core::Rgba8Premul;
use crate::foundation::error::{FiligraneError, FiligraneResult};
use crate::foundation::math::{hash_u32, mul_div255_u8};
use crate::settings::model::BlendMode;

/// Upper bound on a gaussian kernel radius, in px.
const MAX_BLUR_RADIUS: u32 = 256;

/// Gaussian sigma for a canvas-style `shadowBlur` value.
pub(crate) fn shadow_sigma(shadow_blur: f64) -> f64 {
    shadow_blur / 2.0
}

/// Pixels of padding a blur of `sigma` needs to fade out.
pub(crate) fn blur_extent(sigma: f64) -> f64 {
    if sigma > 0.0 { (sigma * 3.0).ceil() } else { 0.0 }
}

pub(crate) fn gaussian_kernel_q16(radius: u32, sigma: f32) -> FiligraneResult<Vec<u32>> {
    if radius == 0 {
        return Ok(vec![1 << 16]);
    }
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(FiligraneError::validation(
            "blur sigma must be finite and > 0",
        ));
    }

    let r = radius as i32;
    let mut weights_f = Vec::<f64>::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0f64;
    let denom = 2.0 * f64::from(sigma) * f64::from(sigma);
    for i in -r..=r {
        let x = f64::from(i);
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }

    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = ((wf / sum) * 65536.0).round() as i64;
        let q = q.clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    // Put the rounding residue on the center tap so the kernel sums to exactly 1.0.
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, 65536) as u32;
    }

    Ok(weights)
}

/// Separable gaussian blur. Samples outside the buffer are transparent.
pub(crate) fn blur_premul_in_place(
    buf: &mut [u8],
    width: u32,
    height: u32,
    sigma: f64,
) -> FiligraneResult<()> {
    if sigma <= 0.0 || width == 0 || height == 0 {
        return Ok(());
    }
    let radius = (blur_extent(sigma) as u32).min(MAX_BLUR_RADIUS);
    let kernel = gaussian_kernel_q16(radius, sigma as f32)?;
    if kernel.len() == 1 {
        return Ok(());
    }
    let mut tmp = vec![0u8; buf.len()];
    blur_pass(buf, &mut tmp, width, height, &kernel, Axis::X);
    blur_pass(&tmp, buf, width, height, &kernel, Axis::Y);
    Ok(())
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
}

fn blur_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32], axis: Axis) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let d = ki as i32 - radius;
                let (sx, sy) = match axis {
                    Axis::X => (x + d, y),
                    Axis::Y => (x, y + d),
                };
                if sx < 0 || sy < 0 || sx >= w || sy >= h {
                    continue;
                }
                let idx = ((sy * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    let v = (acc + 32768) >> 16;
    (v.min(255)) as u8
}

/// Replace color with `color`, keeping coverage: `out = color * src.a * strength`.
pub(crate) fn tint_by_alpha(src: &[u8], color: Rgba8Premul, strength: f32) -> Vec<u8> {
    let k = ((strength.clamp(0.0, 1.0) * 255.0).round()) as u16;
    let c = color.to_array();
    let mut out = vec![0u8; src.len()];
    for (o, s) in out.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let cov = mul_div255_u8(u16::from(s[3]), k);
        if cov == 0 {
            continue;
        }
        for i in 0..4 {
            o[i] = mul_div255_u8(u16::from(c[i]), u16::from(cov));
        }
    }
    out
}

/// Translate a buffer by whole pixels; uncovered pixels become transparent.
pub(crate) fn shift(src: &[u8], width: u32, height: u32, dx: i32, dy: i32) -> Vec<u8> {
    if dx == 0 && dy == 0 {
        return src.to_vec();
    }
    let w = width as i32;
    let h = height as i32;
    let mut out = vec![0u8; src.len()];
    for y in 0..h {
        let sy = y - dy;
        if sy < 0 || sy >= h {
            continue;
        }
        for x in 0..w {
            let sx = x - dx;
            if sx < 0 || sx >= w {
                continue;
            }
            let si = ((sy * w + sx) as usize) * 4;
            let di = ((y * w + x) as usize) * 4;
            out[di..di + 4].copy_from_slice(&src[si..si + 4]);
        }
    }
    out
}

/// Deterministic luminance grain on covered pixels.
///
/// `origin` is the buffer's offset on the surface, negative when the layer starts off-surface,
/// so grain does not depend on layer bounds.
pub(crate) fn apply_noise(
    buf: &mut [u8],
    width: u32,
    origin: (i32, i32),
    amount: f32,
    seed: u64,
) {
    let amount = amount.clamp(0.0, 1.0);
    if amount <= 0.0 || width == 0 {
        return;
    }
    for (i, px) in buf.chunks_exact_mut(4).enumerate() {
        let a = px[3];
        if a == 0 {
            continue;
        }
        let x = origin.0.wrapping_add((i as u32 % width) as i32);
        let y = origin.1.wrapping_add((i as u32 / width) as i32);
        let n = (hash_u32(seed, x as u32, y as u32) & 0xFF) as f32 / 255.0 - 0.5;
        let delta = n * amount * f32::from(a);
        for c in &mut px[..3] {
            *c = (f32::from(*c) + delta).round().clamp(0.0, f32::from(a)) as u8;
        }
    }
}

/// Source-over of equal-length premultiplied buffers.
pub(crate) fn premul_over_in_place(dst: &mut [u8], src: &[u8]) -> FiligraneResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(FiligraneError::validation(
            "premul_over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = u16::from(s[3]);
        if sa == 0 {
            continue;
        }
        let inv = 255u16 - sa;
        d[3] = s[3].saturating_add(mul_div255_u8(u16::from(d[3]), inv));
        for c in 0..3 {
            let dc = mul_div255_u8(u16::from(d[c]), inv);
            d[c] = s[c].saturating_add(dc);
        }
    }
    Ok(())
}

/// Composite `src` over `dst` with `mode`, scaling the source by `opacity`.
pub(crate) fn composite_blend(
    dst: &mut [u8],
    src: &[u8],
    opacity: f32,
    mode: BlendMode,
) -> FiligraneResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(FiligraneError::validation(
            "composite_blend expects equal-length rgba8 buffers",
        ));
    }
    match mode {
        BlendMode::Normal => {
            premul_over_opacity(dst, src, opacity);
            Ok(())
        }
        BlendMode::Multiply => separable(dst, src, opacity, |s, d| s * d),
        BlendMode::Screen => separable(dst, src, opacity, screen),
        BlendMode::Overlay => separable(dst, src, opacity, |s, d| hard_light(d, s)),
        BlendMode::Darken => separable(dst, src, opacity, f32::min),
        BlendMode::Lighten => separable(dst, src, opacity, f32::max),
        BlendMode::ColorDodge => separable(dst, src, opacity, color_dodge),
        BlendMode::ColorBurn => separable(dst, src, opacity, color_burn),
        BlendMode::HardLight => separable(dst, src, opacity, hard_light),
        BlendMode::SoftLight => separable(dst, src, opacity, soft_light),
        BlendMode::Difference => separable(dst, src, opacity, |s, d| (d - s).abs()),
        BlendMode::Exclusion => separable(dst, src, opacity, |s, d| s + d - 2.0 * s * d),
        BlendMode::Hue => blend_over(dst, src, opacity, |s, d| {
            set_lum(set_sat(s, sat(d)), lum(d))
        }),
        BlendMode::Saturation => blend_over(dst, src, opacity, |s, d| {
            set_lum(set_sat(d, sat(s)), lum(d))
        }),
        BlendMode::Color => blend_over(dst, src, opacity, |s, d| set_lum(s, lum(d))),
        BlendMode::Luminosity => blend_over(dst, src, opacity, |s, d| set_lum(d, lum(s))),
    }
}

fn premul_over_opacity(dst: &mut [u8], src: &[u8], opacity: f32) {
    let op = ((opacity.clamp(0.0, 1.0) * 255.0).round() as i32).clamp(0, 255) as u16;
    if op == 0 {
        return;
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = mul_div255_u8(u16::from(s[3]), op);
        if sa == 0 {
            continue;
        }
        let inv = 255u16 - u16::from(sa);
        d[3] = sa.saturating_add(mul_div255_u8(u16::from(d[3]), inv));
        for c in 0..3 {
            let sc = mul_div255_u8(u16::from(s[c]), op);
            let dc = mul_div255_u8(u16::from(d[c]), inv);
            d[c] = sc.saturating_add(dc);
        }
    }
}

fn separable<F>(dst: &mut [u8], src: &[u8], opacity: f32, f: F) -> FiligraneResult<()>
where
    F: Fn(f32, f32) -> f32,
{
    blend_over(dst, src, opacity, |s, d| {
        [f(s[0], d[0]), f(s[1], d[1]), f(s[2], d[2])]
    })
}

// out_a = sa + da * (1 - sa)
// out_p = sp * (1 - da) + dp * (1 - sa) + B(sc, dc) * sa * da
fn blend_over<F>(dst: &mut [u8], src: &[u8], opacity: f32, blend_fn: F) -> FiligraneResult<()>
where
    F: Fn([f32; 3], [f32; 3]) -> [f32; 3],
{
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 {
        return Ok(());
    }

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        if s[3] == 0 {
            continue;
        }
        let sa = f32::from(s[3]) / 255.0 * opacity;
        let sp = [0, 1, 2].map(|c| f32::from(s[c]) / 255.0 * opacity);
        let da = f32::from(d[3]) / 255.0;
        let dp = [0, 1, 2].map(|c| f32::from(d[c]) / 255.0);

        let sc = sp.map(|v| if sa > 0.0 { (v / sa).clamp(0.0, 1.0) } else { 0.0 });
        let dc = dp.map(|v| if da > 0.0 { (v / da).clamp(0.0, 1.0) } else { 0.0 });
        let b = blend_fn(sc, dc).map(|v| v.clamp(0.0, 1.0));

        let out_a = (sa + da * (1.0 - sa)).clamp(0.0, 1.0);
        for c in 0..3 {
            let out = (sp[c] * (1.0 - da) + dp[c] * (1.0 - sa) + b[c] * sa * da).clamp(0.0, 1.0);
            d[c] = (out * 255.0).round() as u8;
        }
        d[3] = (out_a * 255.0).round() as u8;
    }
    Ok(())
}

fn screen(s: f32, d: f32) -> f32 {
    s + d - s * d
}

fn hard_light(s: f32, d: f32) -> f32 {
    if s <= 0.5 {
        d * 2.0 * s
    } else {
        screen(d, 2.0 * s - 1.0)
    }
}

fn color_dodge(s: f32, d: f32) -> f32 {
    if d <= 0.0 {
        0.0
    } else if s >= 1.0 {
        1.0
    } else {
        (d / (1.0 - s)).min(1.0)
    }
}

fn color_burn(s: f32, d: f32) -> f32 {
    if d >= 1.0 {
        1.0
    } else if s <= 0.0 {
        0.0
    } else {
        1.0 - ((1.0 - d) / s).min(1.0)
    }
}

fn soft_light(s: f32, d: f32) -> f32 {
    if s <= 0.5 {
        d - (1.0 - 2.0 * s) * d * (1.0 - d)
    } else {
        let dd = if d <= 0.25 {
            ((16.0 * d - 12.0) * d + 4.0) * d
        } else {
            d.sqrt()
        };
        d + (2.0 * s - 1.0) * (dd - d)
    }
}

fn lum(c: [f32; 3]) -> f32 {
    0.3 * c[0] + 0.59 * c[1] + 0.11 * c[2]
}

fn clip_color(c: [f32; 3]) -> [f32; 3] {
    let l = lum(c);
    let n = c[0].min(c[1]).min(c[2]);
    let x = c[0].max(c[1]).max(c[2]);
    let mut out = c;
    if n < 0.0 && l - n > f32::EPSILON {
        out = out.map(|v| l + (v - l) * l / (l - n));
    }
    if x > 1.0 && x - l > f32::EPSILON {
        out = out.map(|v| l + (v - l) * (1.0 - l) / (x - l));
    }
    out
}

fn set_lum(c: [f32; 3], l: f32) -> [f32; 3] {
    let d = l - lum(c);
    clip_color(c.map(|v| v + d))
}

fn sat(c: [f32; 3]) -> f32 {
    c[0].max(c[1]).max(c[2]) - c[0].min(c[1]).min(c[2])
}

fn set_sat(c: [f32; 3], s: f32) -> [f32; 3] {
    let max = c[0].max(c[1]).max(c[2]);
    let min = c[0].min(c[1]).min(c[2]);
    if max - min <= 0.0 {
        return [0.0; 3];
    }
    c.map(|v| (v - min) * s / (max - min))
}

#[cfg(test)]
#[path = "../../tests/unit/render/effects.rs"]
mod tests;
