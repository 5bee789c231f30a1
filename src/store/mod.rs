/// JSON key-value persistence for settings, sessions and presets.
pub mod persist;
