use std::sync::Arc;

use crate::assets::decode::PreparedImage;
use crate::assets::fonts::PreparedText;
use crate::foundation::core::{Affine, PixelSize, Rect};
use crate::foundation::error::{FiligraneError, FiligraneResult};
use crate::render::effects::{
    apply_noise, blur_extent, blur_premul_in_place, composite_blend, premul_over_in_place,
    shadow_sigma, shift, tint_by_alpha,
};
use crate::render::surface::{
    FrameRGBA, InstanceContent, InstanceDraw, ShadowParams, Surface,
};
use crate::settings::color::Color;
use crate::settings::model::BlendMode;

/// Decoded images kept as ready-to-draw paints.
const IMAGE_PAINT_CACHE: usize = 2;

/// Options for [`CpuSurface`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuSurfaceOpts {
    pub(crate) clear_rgba: Option<[u8; 4]>,
}

impl CpuSurfaceOpts {
    /// Return options with a straight-alpha color the surface is cleared to on reset.
    pub fn with_clear_rgba(mut self, clear: Option<[u8; 4]>) -> Self {
        self.clear_rgba = clear;
        self
    }
}

#[derive(Clone)]
struct ImagePaint {
    pixels: Arc<Vec<u8>>,
    paint: vello_cpu::Image,
}

/// Integer, possibly off-surface rectangle in surface pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PxRect {
    x: i32,
    y: i32,
    w: u32,
    h: u32,
}

impl PxRect {
    fn covering(r: Rect) -> Option<Self> {
        if !(r.x0.is_finite() && r.y0.is_finite() && r.x1.is_finite() && r.y1.is_finite()) {
            return None;
        }
        let x0 = r.x0.floor();
        let y0 = r.y0.floor();
        let x1 = r.x1.ceil();
        let y1 = r.y1.ceil();
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self {
            x: x0 as i32,
            y: y0 as i32,
            w: (x1 - x0) as u32,
            h: (y1 - y0) as u32,
        })
    }

    fn origin_affine(self) -> Affine {
        Affine::translate((-f64::from(self.x), -f64::from(self.y)))
    }
}

/// Software raster surface: `vello_cpu` rasterizes, CPU kernels composite.
pub struct CpuSurface {
    opts: CpuSurfaceOpts,
    size: PixelSize,
    data: Vec<u8>,
    ctx: Option<vello_cpu::RenderContext>,
    image_paints: Vec<ImagePaint>,
}

impl Default for CpuSurface {
    fn default() -> Self {
        Self::new(CpuSurfaceOpts::default())
    }
}

impl CpuSurface {
    /// An empty surface; call [`Surface::reset`] before drawing.
    pub fn new(opts: CpuSurfaceOpts) -> Self {
        Self {
            opts,
            size: PixelSize::new(0, 0),
            data: Vec::new(),
            ctx: None,
            image_paints: Vec::new(),
        }
    }

    fn surface_rect(&self) -> Rect {
        Rect::from_origin_size((0.0, 0.0), self.size.to_size())
    }

    fn image_paint(&mut self, image: &PreparedImage) -> FiligraneResult<vello_cpu::Image> {
        if let Some(p) = self
            .image_paints
            .iter()
            .find(|p| Arc::ptr_eq(&p.pixels, &image.rgba8_premul))
        {
            return Ok(p.paint.clone());
        }
        let pixmap = pixmap_from_premul_bytes(&image.rgba8_premul, image.width, image.height)?;
        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };
        if self.image_paints.len() == IMAGE_PAINT_CACHE {
            self.image_paints.remove(0);
        }
        self.image_paints.push(ImagePaint {
            pixels: Arc::clone(&image.rgba8_premul),
            paint: paint.clone(),
        });
        Ok(paint)
    }

    /// Rasterize into a fresh transparent `region`-sized buffer.
    fn render_layer(
        &mut self,
        region: PxRect,
        f: impl FnOnce(&mut vello_cpu::RenderContext),
    ) -> FiligraneResult<Vec<u8>> {
        let (w, h) = u16_dims(region.w, region.h)?;
        let mut ctx = match self.ctx.take() {
            Some(ctx) if ctx.width() == w && ctx.height() == h => ctx,
            _ => vello_cpu::RenderContext::new(w, h),
        };
        ctx.reset();
        ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        f(&mut ctx);
        ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(w, h);
        ctx.render_to_pixmap(&mut pixmap);
        self.ctx = Some(ctx);
        Ok(pixmap.data_as_u8_slice().to_vec())
    }

    /// Composite a `region`-sized buffer onto the overlapping part of the surface.
    fn composite_region(
        &mut self,
        src: &[u8],
        region: PxRect,
        opacity: f32,
        blend: BlendMode,
    ) -> FiligraneResult<()> {
        let sw = self.size.width as i32;
        let sh = self.size.height as i32;
        let x0 = region.x.max(0);
        let x1 = (region.x + region.w as i32).min(sw);
        let y0 = region.y.max(0);
        let y1 = (region.y + region.h as i32).min(sh);
        if x0 >= x1 || y0 >= y1 {
            return Ok(());
        }
        let row_len = ((x1 - x0) as usize) * 4;
        for y in y0..y1 {
            let d = ((y as usize) * (sw as usize) + (x0 as usize)) * 4;
            let s = (((y - region.y) as usize) * (region.w as usize) + ((x0 - region.x) as usize))
                * 4;
            composite_blend(
                &mut self.data[d..d + row_len],
                &src[s..s + row_len],
                opacity,
                blend,
            )?;
        }
        Ok(())
    }

    fn effect_layer(layer: &[u8], region: PxRect, fx: ShadowParams) -> FiligraneResult<Vec<u8>> {
        let mut out = tint_by_alpha(layer, fx.color.to_premul(), fx.strength);
        blur_premul_in_place(&mut out, region.w, region.h, shadow_sigma(fx.blur))?;
        let dx = fx.offset.x.round() as i32;
        let dy = fx.offset.y.round() as i32;
        Ok(shift(&out, region.w, region.h, dx, dy))
    }
}

impl Surface for CpuSurface {
    fn size(&self) -> PixelSize {
        self.size
    }

    fn reset(&mut self, size: PixelSize) -> FiligraneResult<()> {
        if size.is_empty() {
            return Err(FiligraneError::surface(format!(
                "cannot allocate a {}x{} surface",
                size.width, size.height
            )));
        }
        u16_dims(size.width, size.height)?;

        let len = size.rgba8_len();
        self.data.clear();
        self.data
            .try_reserve_exact(len)
            .map_err(|e| FiligraneError::surface(format!("allocate {len} bytes: {e}")))?;
        self.data.resize(len, 0);
        if let Some(rgba) = self.opts.clear_rgba {
            let px = Color::rgba(rgba[0], rgba[1], rgba[2], rgba[3])
                .to_premul()
                .to_array();
            for p in self.data.chunks_exact_mut(4) {
                p.copy_from_slice(&px);
            }
        }
        self.size = size;
        tracing::trace!(width = size.width, height = size.height, "surface reset");
        Ok(())
    }

    fn draw_image(&mut self, image: &PreparedImage, dest: Rect) -> FiligraneResult<()> {
        let Some(target) = PxRect::covering(dest.intersect(self.surface_rect())) else {
            return Ok(());
        };

        // Whole-pixel placement at natural size needs no resampling.
        let natural = dest.x0.fract() == 0.0
            && dest.y0.fract() == 0.0
            && dest.width() == f64::from(image.width)
            && dest.height() == f64::from(image.height);
        if natural {
            let region = PxRect {
                x: dest.x0 as i32,
                y: dest.y0 as i32,
                w: image.width,
                h: image.height,
            };
            return self.composite_region(&image.rgba8_premul, region, 1.0, BlendMode::Normal);
        }

        let paint = self.image_paint(image)?;
        let tr = target.origin_affine()
            * Affine::translate((dest.x0, dest.y0))
            * Affine::scale_non_uniform(
                dest.width() / f64::from(image.width),
                dest.height() / f64::from(image.height),
            );
        let (iw, ih) = (f64::from(image.width), f64::from(image.height));
        let layer = self.render_layer(target, |ctx| {
            ctx.set_transform(affine_to_cpu(tr));
            ctx.set_paint(paint);
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, iw, ih));
        })?;
        self.composite_region(&layer, target, 1.0, BlendMode::Normal)
    }

    fn draw_instance(&mut self, draw: &InstanceDraw<'_>) -> FiligraneResult<()> {
        if draw.opacity <= 0.0 {
            return Ok(());
        }

        let content_pad = blur_extent(draw.blur) + 1.0;
        let mut reach = 0.0f64;
        for fx in [draw.shadow, draw.glow].into_iter().flatten() {
            let r = blur_extent(shadow_sigma(fx.blur)) + fx.offset.x.abs().max(fx.offset.y.abs());
            reach = reach.max(r);
        }
        // Content just outside the surface can still cast a shadow onto it.
        let wanted = draw
            .content_bounds()
            .inflate(content_pad + reach, content_pad + reach);
        let window = self.surface_rect().inflate(reach + 1.0, reach + 1.0);
        let Some(region) = PxRect::covering(wanted.intersect(window)) else {
            return Ok(());
        };

        let tr = region.origin_affine() * draw.transform;
        let mut layer = match draw.content {
            InstanceContent::Text { text, fill, stroke } => self.render_layer(region, |ctx| {
                ctx.set_transform(affine_to_cpu(tr));
                if let Some(stroke) = stroke {
                    ctx.set_stroke(vello_cpu::kurbo::Stroke::new(stroke.width));
                    ctx.set_paint(color_to_cpu(stroke.color));
                    draw_glyphs(ctx, text, GlyphPass::Stroke);
                }
                ctx.set_paint(color_to_cpu(fill));
                draw_glyphs(ctx, text, GlyphPass::Fill);
            })?,
            InstanceContent::Image { image, size } => {
                let paint = self.image_paint(image)?;
                let (iw, ih) = (f64::from(image.width), f64::from(image.height));
                let tr = tr * Affine::scale_non_uniform(size.width / iw, size.height / ih);
                self.render_layer(region, |ctx| {
                    ctx.set_transform(affine_to_cpu(tr));
                    ctx.set_paint(paint);
                    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, iw, ih));
                })?
            }
        };

        blur_premul_in_place(&mut layer, region.w, region.h, draw.blur)?;
        apply_noise(&mut layer, region.w, (region.x, region.y), draw.noise, draw.noise_seed);

        let group = if draw.shadow.is_none() && draw.glow.is_none() {
            layer
        } else {
            let mut group = vec![0u8; layer.len()];
            for fx in [draw.shadow, draw.glow].into_iter().flatten() {
                let fx_layer = Self::effect_layer(&layer, region, fx)?;
                premul_over_in_place(&mut group, &fx_layer)?;
            }
            premul_over_in_place(&mut group, &layer)?;
            group
        };

        tracing::trace!(?region, blend = ?draw.blend, "instance composited");
        self.composite_region(&group, region, draw.opacity, draw.blend)
    }

    fn snapshot(&self) -> FrameRGBA {
        FrameRGBA {
            width: self.size.width,
            height: self.size.height,
            data: self.data.clone(),
            premultiplied: true,
        }
    }
}

#[derive(Clone, Copy)]
enum GlyphPass {
    Fill,
    Stroke,
}

fn draw_glyphs(ctx: &mut vello_cpu::RenderContext, text: &PreparedText, pass: GlyphPass) {
    for line in text.layout.lines() {
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };
            let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                id: g.id,
                x: g.x,
                y: g.y,
            });
            let builder = ctx.glyph_run(&text.font).font_size(run.run().font_size());
            match pass {
                GlyphPass::Fill => builder.fill_glyphs(glyphs),
                GlyphPass::Stroke => builder.stroke_glyphs(glyphs),
            }
        }
    }
}

fn u16_dims(width: u32, height: u32) -> FiligraneResult<(u16, u16)> {
    let w: u16 = width.try_into().map_err(|_| {
        FiligraneError::surface(format!("surface width {width} exceeds {}", u16::MAX))
    })?;
    let h: u16 = height.try_into().map_err(|_| {
        FiligraneError::surface(format!("surface height {height} exceeds {}", u16::MAX))
    })?;
    Ok((w, h))
}

fn color_to_cpu(c: Color) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> FiligraneResult<vello_cpu::Pixmap> {
    let (w, h) = u16_dims(width, height)?;
    if bytes.len() != PixelSize::new(width, height).rgba8_len() {
        return Err(FiligraneError::validation("pixmap byte len mismatch"));
    }
    let pixels = bytes
        .chunks_exact(4)
        .map(|px| {
            vello_cpu::peniko::color::PremulRgba8::from_u8_array([px[0], px[1], px[2], px[3]])
        })
        .collect::<Vec<_>>();
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, true))
}

#[cfg(test)]
#[path = "../../tests/unit/render/cpu.rs"]
mod tests;
