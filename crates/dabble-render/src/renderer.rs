//! Renderer trait abstraction.

use dabble_core::brush::Brush;
use dabble_core::pad::DrawingPad;
use kurbo::{Point, Size};
use peniko::Color;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Initialization failed: {0}")]
    InitFailed(String),
    #[error("Render failed: {0}")]
    RenderFailed(String),
    #[error("Surface error: {0}")]
    Surface(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Outline of the brush drawn under the pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushCursor {
    /// Pointer position in canvas coordinates.
    pub position: Point,
    /// Brush radius.
    pub radius: f64,
    /// Outline color.
    pub color: Color,
}

impl BrushCursor {
    pub fn new(position: Point, brush: &Brush) -> Self {
        Self {
            position,
            radius: brush.size(),
            color: brush.color.into(),
        }
    }
}

/// Context for a single render frame.
pub struct RenderContext<'a> {
    /// The pad to render.
    pub pad: &'a DrawingPad,
    /// Viewport size in physical pixels.
    pub viewport_size: Size,
    /// Device pixel ratio (for HiDPI).
    pub scale_factor: f64,
    /// Background color.
    pub background_color: Color,
    /// Brush outline under the pointer, if hovering the canvas.
    pub brush_cursor: Option<BrushCursor>,
}

impl<'a> RenderContext<'a> {
    /// Create a new render context.
    pub fn new(pad: &'a DrawingPad, viewport_size: Size) -> Self {
        Self {
            pad,
            viewport_size,
            scale_factor: 1.0,
            background_color: Color::WHITE,
            brush_cursor: None,
        }
    }

    /// Set the scale factor for HiDPI.
    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    /// Set the background color.
    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    /// Set the brush outline.
    pub fn with_brush_cursor(mut self, cursor: Option<BrushCursor>) -> Self {
        self.brush_cursor = cursor;
        self
    }
}

/// Trait for rendering backends.
///
/// Implementations can use Vello, wgpu directly, or other rendering engines.
pub trait Renderer: Send + Sync {
    /// Build the scene/command buffer for a frame.
    ///
    /// This method is called once per frame and should prepare all drawing commands.
    fn build_scene(&mut self, ctx: &RenderContext);
}
