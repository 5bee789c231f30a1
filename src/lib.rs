//! Filigrane stamps watermarks onto batches of images.
//!
//! One settings snapshot drives every stage:
//!
//! - The pattern layout engine turns settings plus canvas and content sizes into placements.
//! - The watermark renderer draws text or image content at each placement, with effects.
//! - The [`Compositor`] runs a preview pass (downscaled) or an export pass (full resolution)
//!   through one [`RenderScale`], so both look the same.
//! - The [`BatchDriver`] processes images one at a time and hands the outputs to a
//!   [`Packager`], then records a session.
//!
//! Fonts are registered explicitly; asking for an unregistered family is an error.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Font, image and SVG ingestion.
pub mod assets;
/// Batch driver and packaging.
pub mod batch;
/// Per-image compositing.
pub mod compose;
/// Coordinate scaling between original-image and render space.
pub mod geometry;
/// Pattern layout engine.
pub mod layout;
/// Rendering targets and the watermark renderer.
pub mod render;
/// User-facing settings.
pub mod settings;
/// Persistence of settings, sessions and presets.
pub mod store;

pub use crate::foundation::core::{Affine, PixelSize, Point, Rect, Rgba8Premul, Size, Vec2};
pub use crate::foundation::error::{FiligraneError, FiligraneResult};

pub use crate::assets::decode::PreparedImage;
pub use crate::assets::fonts::{FontRegistry, PreparedText};
pub use crate::assets::image_file::{ImageFile, ImageSource};
pub use crate::batch::driver::{
    BatchDriver, BatchOutput, BatchProgress, BatchReport, CancelFlag, FailureStep, ImageFailure,
    PackageOutcome, SessionLog,
};
pub use crate::batch::package::{
    ARCHIVE_NAME, DirectoryPackager, InMemoryPackager, PackageEntry, PackageReceipt, Packager,
    ZipPackager, output_name,
};
pub use crate::compose::compositor::{
    Compositor, CompositorOpts, CompositorState, DEFAULT_PREVIEW_MAX, EncodedImage,
};
pub use crate::geometry::scale::{RenderScale, constrain_position, fit_within, nudge};
pub use crate::layout::pattern::{LayoutRequest, Placement, SeedPolicy, layout_placements};
pub use crate::render::cpu::{CpuSurface, CpuSurfaceOpts};
pub use crate::render::surface::{FrameRGBA, Surface};
pub use crate::render::watermark::{Watermark, WatermarkRenderer};
pub use crate::settings::color::Color;
pub use crate::settings::model::{
    Anchor, BlendMode, ContentKind, Effects, Offset, Pattern, WatermarkSettings,
};
pub use crate::store::persist::{JsonStore, Preset, RecentSession};
