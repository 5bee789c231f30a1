/// Color values and parsing.
pub mod color;
/// Watermark settings model and defaults.
pub mod model;
