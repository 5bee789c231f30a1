/// Sequential batch processing.
pub mod driver;
/// Output naming and archive packaging.
pub mod package;
