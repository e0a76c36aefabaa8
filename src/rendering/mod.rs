//! Pixel output: the canvas renderer, lamina painting and overlays.

pub mod overlay;
pub mod paint;
pub mod renderer;

pub use overlay::BoxOverlay;
pub use paint::{LayerPainter, RenderGroup, RenderStyle};
pub use renderer::{CanvasRenderer, Renderer};
