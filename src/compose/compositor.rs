use crate::assets::fonts::FontRegistry;
use crate::assets::image_file::ImageFile;
use crate::batch::package::output_name;
use crate::foundation::core::{PixelSize, Rect};
use crate::foundation::error::FiligraneResult;
use crate::geometry::scale::{RenderScale, fit_within};
use crate::layout::pattern::{LayoutRequest, layout_placements};
use crate::render::cpu::{CpuSurface, CpuSurfaceOpts};
use crate::render::surface::{FrameRGBA, Surface};
use crate::render::watermark::{Watermark, WatermarkRenderer};
use crate::settings::model::WatermarkSettings;

/// Default longest preview edge, in px.
pub const DEFAULT_PREVIEW_MAX: u32 = 1200;

/// Per-image progress of a compositor pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompositorState {
    /// Ready for the next image.
    Idle,
    /// Surface reset and base image drawn.
    BaseDrawn,
    /// Every placement drawn.
    WatermarkApplied,
    /// Surface encoded.
    Encoded,
}

/// Options for [`Compositor`].
#[derive(Debug, Clone, Copy)]
pub struct CompositorOpts {
    pub(crate) preview_max: u32,
    pub(crate) clear_rgba: Option<[u8; 4]>,
}

impl Default for CompositorOpts {
    fn default() -> Self {
        let preview_max = std::env::var("FILIGRANE_PREVIEW_MAX")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_PREVIEW_MAX);
        Self {
            preview_max,
            clear_rgba: None,
        }
    }
}

impl CompositorOpts {
    /// Return options with a different longest preview edge.
    pub fn with_preview_max(mut self, max_px: u32) -> Self {
        self.preview_max = max_px.max(1);
        self
    }

    /// Return options with a clear color painted under the base image.
    pub fn with_clear_rgba(mut self, clear: Option<[u8; 4]>) -> Self {
        self.clear_rgba = clear;
        self
    }

    /// Longest preview edge.
    pub fn preview_max(&self) -> u32 {
        self.preview_max
    }
}

/// One exported image.
#[derive(Clone, Debug)]
pub struct EncodedImage {
    /// Name of the base image this came from.
    pub source_name: String,
    /// Width in pixels (the base image's natural width).
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Random-pattern seed it was rendered with.
    pub seed: u64,
    /// PNG bytes.
    pub png: Vec<u8>,
}

impl EncodedImage {
    /// Archive entry name, `watermarked_<base>.png`.
    pub fn output_name(&self) -> String {
        output_name(&self.source_name)
    }
}

/// Draws a base image plus every watermark instance onto one reusable surface.
pub struct Compositor<S: Surface = CpuSurface> {
    surface: S,
    fonts: FontRegistry,
    opts: CompositorOpts,
    state: CompositorState,
    failed_in: Option<CompositorState>,
}

impl Compositor<CpuSurface> {
    /// A compositor over a CPU surface.
    pub fn new(opts: CompositorOpts) -> Self {
        let surface = CpuSurface::new(CpuSurfaceOpts::default().with_clear_rgba(opts.clear_rgba));
        Self::with_surface(surface, opts)
    }
}

impl Default for Compositor<CpuSurface> {
    fn default() -> Self {
        Self::new(CompositorOpts::default())
    }
}

impl<S: Surface> Compositor<S> {
    /// A compositor over any surface implementation.
    pub fn with_surface(surface: S, opts: CompositorOpts) -> Self {
        Self {
            surface,
            fonts: FontRegistry::new(),
            opts,
            state: CompositorState::Idle,
            failed_in: None,
        }
    }

    /// State reached by the last pass. A new pass starts from `Idle`; a failed pass ends there.
    pub fn state(&self) -> CompositorState {
        self.state
    }

    /// State the last pass had reached when it failed, or `None` if it succeeded.
    pub fn failed_in(&self) -> Option<CompositorState> {
        self.failed_in
    }

    /// Options in use.
    pub fn opts(&self) -> &CompositorOpts {
        &self.opts
    }

    /// Registered fonts.
    pub fn fonts(&self) -> &FontRegistry {
        &self.fonts
    }

    /// Registered fonts, for registration.
    pub fn fonts_mut(&mut self) -> &mut FontRegistry {
        &mut self.fonts
    }

    /// Register a font family before rendering text in it.
    pub fn register_font(&mut self, family: &str, bytes: Vec<u8>) -> FiligraneResult<()> {
        self.fonts.register(family, bytes)
    }

    /// The surface after the last pass.
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Preview pass: render at a size that fits the preview bounds.
    #[tracing::instrument(skip(self, base, settings, watermark), fields(base = base.name()))]
    pub fn render_preview(
        &mut self,
        base: &ImageFile,
        settings: &WatermarkSettings,
        watermark: Watermark<'_>,
        seed: u64,
    ) -> FiligraneResult<FrameRGBA> {
        let max = self.opts.preview_max;
        let render = fit_within(base.size(), max, max);
        self.run_pass(base, render, settings, watermark, seed)?;
        Ok(self.surface.snapshot())
    }

    /// Export pass: render at full resolution and encode losslessly.
    #[tracing::instrument(skip(self, base, settings, watermark), fields(base = base.name()))]
    pub fn render_export(
        &mut self,
        base: &ImageFile,
        settings: &WatermarkSettings,
        watermark: Watermark<'_>,
        seed: u64,
    ) -> FiligraneResult<EncodedImage> {
        self.run_pass(base, base.size(), settings, watermark, seed)?;
        let png = match self.surface.encode_png() {
            Ok(png) => png,
            Err(e) => {
                self.failed_in = Some(self.state);
                self.state = CompositorState::Idle;
                return Err(e);
            }
        };
        self.state = CompositorState::Encoded;
        tracing::debug!(bytes = png.len(), "encoded");
        Ok(EncodedImage {
            source_name: base.name().to_owned(),
            width: base.width(),
            height: base.height(),
            seed,
            png,
        })
    }

    fn run_pass(
        &mut self,
        base: &ImageFile,
        render: PixelSize,
        settings: &WatermarkSettings,
        watermark: Watermark<'_>,
        seed: u64,
    ) -> FiligraneResult<()> {
        self.state = CompositorState::Idle;
        self.failed_in = None;
        let result = self.draw_pass(base, render, settings, watermark, seed);
        if result.is_err() {
            self.failed_in = Some(self.state);
            self.state = CompositorState::Idle;
        }
        result
    }

    fn draw_pass(
        &mut self,
        base: &ImageFile,
        render: PixelSize,
        settings: &WatermarkSettings,
        watermark: Watermark<'_>,
        seed: u64,
    ) -> FiligraneResult<()> {
        let scale = RenderScale::between(base.size(), render);

        self.surface.reset(render)?;
        let pixels = base.decode()?;
        self.surface
            .draw_image(&pixels, Rect::from_origin_size((0.0, 0.0), render.to_size()))?;
        self.state = CompositorState::BaseDrawn;

        let renderer = WatermarkRenderer::new(settings, scale);
        let prepared = renderer.prepare(watermark, base.size(), &mut self.fonts)?;
        let request =
            LayoutRequest::from_settings(settings, render.to_size(), prepared.size(), scale, seed);
        let placements = layout_placements(&request)?;
        renderer.draw_all(&mut self.surface, &prepared, &placements, seed)?;
        self.state = CompositorState::WatermarkApplied;
        tracing::debug!(
            width = render.width,
            height = render.height,
            instances = placements.len(),
            "watermark applied"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compose/compositor.rs"]
mod tests;
