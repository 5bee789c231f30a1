use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::foundation::core::Size;
use crate::foundation::error::{FiligraneError, FiligraneResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// RGBA8 brush color used by Parley text layout.
pub(crate) struct TextBrushRgba8 {
    /// Red channel.
    pub(crate) r: u8,
    /// Green channel.
    pub(crate) g: u8,
    /// Blue channel.
    pub(crate) b: u8,
    /// Alpha channel.
    pub(crate) a: u8,
}

/// Shaped text, measured once and drawn for every placement.
#[derive(Clone)]
pub struct PreparedText {
    pub(crate) layout: Arc<parley::Layout<TextBrushRgba8>>,
    pub(crate) font: vello_cpu::peniko::FontData,
    size: Size,
}

impl PreparedText {
    /// Bounding box of the laid-out text.
    pub fn size(&self) -> Size {
        self.size
    }
}

impl std::fmt::Debug for PreparedText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedText")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

struct RegisteredFont {
    parley_family: String,
    font: vello_cpu::peniko::FontData,
}

/// Explicit font registration for text watermarks.
///
/// Families must be registered before rendering. Asking for an unknown family is an error; there
/// is no silent fallback to another face.
pub struct FontRegistry {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    families: HashMap<String, RegisteredFont>,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    /// Empty registry with fresh Parley contexts.
    pub fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
            families: HashMap::new(),
        }
    }

    fn key(family: &str) -> String {
        family.trim().to_lowercase()
    }

    /// Register `bytes` (TTF/OTF) under `family`. Re-registering replaces the previous face.
    pub fn register(&mut self, family: &str, bytes: Vec<u8>) -> FiligraneResult<()> {
        if family.trim().is_empty() {
            return Err(FiligraneError::validation("font family must be non-empty"));
        }
        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(bytes.clone()), None);
        let family_id = families
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| FiligraneError::decode(family, "no font faces found in font bytes"))?;
        let parley_family = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| FiligraneError::decode(family, "registered font family has no name"))?
            .to_string();

        let font = vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(bytes), 0);
        tracing::debug!(family, parley_family = %parley_family, "font registered");
        self.families.insert(
            Self::key(family),
            RegisteredFont {
                parley_family,
                font,
            },
        );
        Ok(())
    }

    /// Register a font file under `family`.
    pub fn register_path(&mut self, family: &str, path: impl AsRef<Path>) -> FiligraneResult<()> {
        let path = path.as_ref();
        let bytes =
            std::fs::read(path).with_context(|| format!("read font '{}'", path.display()))?;
        self.register(family, bytes)
    }

    /// Return `true` when `family` has been registered.
    pub fn is_registered(&self, family: &str) -> bool {
        self.families.contains_key(&Self::key(family))
    }

    /// Registered family names (normalized), sorted.
    pub fn families(&self) -> Vec<String> {
        let mut out: Vec<String> = self.families.keys().cloned().collect();
        out.sort();
        out
    }

    /// Shape and measure a single-line text run.
    pub fn layout_text(
        &mut self,
        family: &str,
        text: &str,
        size_px: f32,
    ) -> FiligraneResult<PreparedText> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(FiligraneError::validation(
                "text size_px must be finite and > 0",
            ));
        }
        let registered = self
            .families
            .get(&Self::key(family))
            .ok_or_else(|| FiligraneError::font_not_registered(family))?;

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(
                registered.parley_family.clone(),
            )),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(
            TextBrushRgba8::default(),
        ));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);

        let size = Size::new(f64::from(layout.width()), f64::from(layout.height()));
        Ok(PreparedText {
            layout: Arc::new(layout),
            font: registered.font.clone(),
            size,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/fonts.rs"]
mod tests;
