use std::io::Cursor;
use std::sync::Arc;

use crate::foundation::core::PixelSize;
use crate::foundation::error::{FiligraneError, FiligraneResult};
use crate::foundation::math::premultiply_rgba8_in_place;

/// Largest side accepted for an SVG raster.
const MAX_SVG_DIM: u32 = 16_384;

#[derive(Clone, Debug)]
/// Decoded raster in premultiplied RGBA8 form.
pub struct PreparedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl PreparedImage {
    /// Wrap premultiplied bytes, checking their length.
    pub fn from_premul(width: u32, height: u32, rgba8_premul: Vec<u8>) -> FiligraneResult<Self> {
        if rgba8_premul.len() != PixelSize::new(width, height).rgba8_len() {
            return Err(FiligraneError::validation(format!(
                "rgba8 buffer length {} does not match {width}x{height}",
                rgba8_premul.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgba8_premul: Arc::new(rgba8_premul),
        })
    }

    /// A `width x height` image filled with one straight-alpha color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut px = rgba;
        premultiply_rgba8_in_place(&mut px);
        let n = (width as usize) * (height as usize);
        let mut bytes = Vec::with_capacity(n * 4);
        for _ in 0..n {
            bytes.extend_from_slice(&px);
        }
        Self {
            width,
            height,
            rgba8_premul: Arc::new(bytes),
        }
    }

    /// Pixel size.
    pub fn size(&self) -> PixelSize {
        PixelSize::new(self.width, self.height)
    }
}

/// Decode a raster (PNG, JPEG, GIF, WebP, BMP, ...) into premultiplied RGBA8.
pub fn decode_image(name: &str, bytes: &[u8]) -> FiligraneResult<PreparedImage> {
    let dyn_img =
        image::load_from_memory(bytes).map_err(|e| FiligraneError::decode(name, e.to_string()))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(FiligraneError::decode(name, "image has zero width or height"));
    }

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

/// Read natural dimensions from the image header without decoding pixels.
pub fn probe_dimensions(name: &str, bytes: &[u8]) -> FiligraneResult<PixelSize> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| FiligraneError::decode(name, e.to_string()))?;
    let (w, h) = reader
        .into_dimensions()
        .map_err(|e| FiligraneError::decode(name, e.to_string()))?;
    if w == 0 || h == 0 {
        return Err(FiligraneError::decode(name, "image has zero width or height"));
    }
    Ok(PixelSize::new(w, h))
}

/// Parse an SVG document.
pub fn parse_svg(name: &str, bytes: &[u8]) -> FiligraneResult<Arc<usvg::Tree>> {
    let opts = usvg::Options::default();
    let tree = usvg::Tree::from_data(bytes, &opts)
        .map_err(|e| FiligraneError::decode(name, format!("parse svg: {e}")))?;
    Ok(Arc::new(tree))
}

/// Intrinsic SVG size, rounded up to whole pixels.
pub fn svg_natural_size(name: &str, tree: &usvg::Tree) -> FiligraneResult<PixelSize> {
    fn to_px(v: f32) -> Option<u32> {
        (v.is_finite() && v > 0.0).then(|| (v.ceil() as u32).max(1))
    }
    let size = tree.size();
    match (to_px(size.width()), to_px(size.height())) {
        (Some(w), Some(h)) => Ok(PixelSize::new(w, h)),
        _ => Err(FiligraneError::decode(name, "svg has invalid width/height")),
    }
}

/// Rasterize an SVG tree at exactly `width x height`.
pub fn rasterize_svg(
    name: &str,
    tree: &usvg::Tree,
    width: u32,
    height: u32,
) -> FiligraneResult<PreparedImage> {
    if width == 0 || height == 0 || width > MAX_SVG_DIM || height > MAX_SVG_DIM {
        return Err(FiligraneError::decode(
            name,
            format!("svg raster size out of range: {width}x{height} (max {MAX_SVG_DIM})"),
        ));
    }
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| FiligraneError::decode(name, "failed to allocate svg pixmap"))?;

    let sx = (width as f32) / tree.size().width();
    let sy = (height as f32) / tree.size().height();
    let xform = resvg::tiny_skia::Transform::from_scale(sx, sy);

    resvg::render(tree, xform, &mut pixmap.as_mut());
    // tiny-skia pixmaps are already premultiplied RGBA8.
    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(pixmap.data().to_vec()),
    })
}

/// Heuristic SVG detection from the file name and leading bytes.
pub fn looks_like_svg(name: &str, bytes: &[u8]) -> bool {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".svg") || lower.ends_with(".svgz") {
        return true;
    }
    let head = &bytes[..bytes.len().min(256)];
    let head = String::from_utf8_lossy(head);
    let head = head.trim_start_matches('\u{feff}').trim_start();
    head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg"))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
