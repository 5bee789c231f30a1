/// Image and SVG decoding.
pub mod decode;
/// Explicit font registration and text shaping.
pub mod fonts;
/// Ingested base and watermark images.
pub mod image_file;
