/// Per-image compositing passes.
pub mod compositor;
