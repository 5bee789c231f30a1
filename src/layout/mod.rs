/// Pattern layout engine.
pub mod pattern;
