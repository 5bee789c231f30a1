/// CPU raster surface.
pub mod cpu;
/// Pixel kernels: blur, tint, noise and blend modes.
pub(crate) mod effects;
/// Rendering-target contract.
pub mod surface;
/// Watermark renderer.
pub mod watermark;
