//! Dabble Render Library
//!
//! Renderer abstraction and implementations for Dabble.
//! The default implementation uses Vello for GPU-accelerated rendering.

mod renderer;

#[cfg(feature = "vello-renderer")]
mod vello_impl;

pub use renderer::{BrushCursor, RenderContext, Renderer, RendererError, RenderResult};

#[cfg(feature = "vello-renderer")]
pub use vello_impl::VelloRenderer;
