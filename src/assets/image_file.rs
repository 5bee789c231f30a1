use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;

use crate::assets::decode::{
    PreparedImage, decode_image, looks_like_svg, parse_svg, probe_dimensions, rasterize_svg,
    svg_natural_size,
};
use crate::foundation::core::PixelSize;
use crate::foundation::error::FiligraneResult;

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Loadable pixel source behind an [`ImageFile`].
#[derive(Clone, Debug)]
pub enum ImageSource {
    /// Encoded raster bytes, decoded on demand.
    Encoded(Arc<Vec<u8>>),
    /// Parsed vector document, rasterized at the requested size.
    Svg(Arc<usvg::Tree>),
    /// Pixels that are already decoded.
    Decoded(PreparedImage),
}

/// A base or watermark image as supplied by ingestion.
///
/// Immutable after construction. Cloning shares the pixel source.
#[derive(Clone, Debug)]
pub struct ImageFile {
    id: u64,
    name: String,
    size: PixelSize,
    source: ImageSource,
}

impl ImageFile {
    /// Build from encoded bytes, reading the natural size from the header.
    ///
    /// Pixel decoding is deferred to [`ImageFile::decode`].
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> FiligraneResult<Self> {
        let name = name.into();
        if looks_like_svg(&name, &bytes) {
            let tree = parse_svg(&name, &bytes)?;
            let size = svg_natural_size(&name, &tree)?;
            return Ok(Self::with_source(name, size, ImageSource::Svg(tree)));
        }
        let size = probe_dimensions(&name, &bytes)?;
        Ok(Self::with_source(
            name,
            size,
            ImageSource::Encoded(Arc::new(bytes)),
        ))
    }

    /// Read a file from disk. The file name becomes the image name.
    pub fn from_path(path: impl AsRef<Path>) -> FiligraneResult<Self> {
        let path = path.as_ref();
        let bytes =
            std::fs::read(path).with_context(|| format!("read image '{}'", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_bytes(name, bytes)
    }

    /// Wrap pixels that were decoded elsewhere.
    pub fn from_decoded(name: impl Into<String>, image: PreparedImage) -> Self {
        let size = image.size();
        Self::with_source(name.into(), size, ImageSource::Decoded(image))
    }

    fn with_source(name: String, size: PixelSize, source: ImageSource) -> Self {
        Self {
            id: NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed),
            name,
            size,
            source,
        }
    }

    /// Process-unique identity, stable across clones.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Originating input name, used for output naming.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Natural dimensions in original-image space.
    pub fn size(&self) -> PixelSize {
        self.size
    }

    /// Natural width.
    pub fn width(&self) -> u32 {
        self.size.width
    }

    /// Natural height.
    pub fn height(&self) -> u32 {
        self.size.height
    }

    /// Return `true` for vector sources that rasterize losslessly at any size.
    pub fn is_vector(&self) -> bool {
        matches!(self.source, ImageSource::Svg(_))
    }

    /// Underlying source.
    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    /// Decode at natural size.
    #[tracing::instrument(level = "debug", skip(self), fields(name = %self.name))]
    pub fn decode(&self) -> FiligraneResult<PreparedImage> {
        match &self.source {
            ImageSource::Encoded(bytes) => decode_image(&self.name, bytes),
            ImageSource::Svg(tree) => {
                rasterize_svg(&self.name, tree, self.size.width, self.size.height)
            }
            ImageSource::Decoded(img) => Ok(img.clone()),
        }
    }

    /// Decode for drawing at `target`. Vector sources rasterize at that size; rasters decode at
    /// natural size and are scaled by the surface.
    pub fn decode_for(&self, target: PixelSize) -> FiligraneResult<PreparedImage> {
        match &self.source {
            ImageSource::Svg(tree) if !target.is_empty() => {
                rasterize_svg(&self.name, tree, target.width, target.height)
            }
            _ => self.decode(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/image_file.rs"]
mod tests;
