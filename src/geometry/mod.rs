/// Original-image to render-surface scaling.
pub mod scale;
