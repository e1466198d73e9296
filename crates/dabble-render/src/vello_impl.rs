//! Vello-based renderer implementation.

use crate::renderer::{BrushCursor, RenderContext, Renderer};
use dabble_core::raster::PixelCanvas;
use kurbo::{Affine, Circle, Rect, Stroke};
use peniko::{Blob, Color, Fill, ImageAlphaType, ImageData, ImageFormat};
use std::sync::Arc;
use vello::Scene;

/// Stroke width of the brush outline, in logical pixels.
const CURSOR_STROKE_WIDTH: f64 = 1.0;

/// Canvas pixels uploaded for a given canvas generation.
struct CachedImage {
    generation: u64,
    width: u32,
    height: u32,
    image: ImageData,
}

/// Vello-based renderer for GPU-accelerated 2D graphics.
pub struct VelloRenderer {
    /// The Vello scene being built.
    scene: Scene,
    /// Last uploaded canvas image; rebuilt only when the canvas changes.
    canvas_image: Option<CachedImage>,
}

impl Default for VelloRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl VelloRenderer {
    /// Create a new Vello renderer.
    pub fn new() -> Self {
        Self {
            scene: Scene::new(),
            canvas_image: None,
        }
    }

    /// Get the built scene for rendering.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Take ownership of the scene (resets internal scene).
    pub fn take_scene(&mut self) -> Scene {
        std::mem::take(&mut self.scene)
    }

    /// Generation of the canvas currently uploaded, if any.
    pub fn cached_generation(&self) -> Option<u64> {
        self.canvas_image.as_ref().map(|c| c.generation)
    }

    fn canvas_image(&mut self, canvas: &PixelCanvas) -> ImageData {
        if let Some(cached) = &self.canvas_image {
            if cached.generation == canvas.generation()
                && cached.width == canvas.width()
                && cached.height == canvas.height()
            {
                return cached.image.clone();
            }
        }

        log::trace!(
            "Uploading canvas {}x{} (generation {})",
            canvas.width(),
            canvas.height(),
            canvas.generation()
        );
        let image = ImageData {
            data: Blob::new(Arc::new(canvas.data().to_vec())),
            format: ImageFormat::Rgba8,
            width: canvas.width(),
            height: canvas.height(),
            alpha_type: ImageAlphaType::Alpha,
        };
        self.canvas_image = Some(CachedImage {
            generation: canvas.generation(),
            width: canvas.width(),
            height: canvas.height(),
            image: image.clone(),
        });
        image
    }

    fn render_canvas(&mut self, canvas: &PixelCanvas, transform: Affine) {
        if canvas.is_blank() {
            return;
        }
        let image = self.canvas_image(canvas);
        self.scene.draw_image(&image.into(), transform);
    }

    /// Draw the brush outline: a thin ring in the brush color over a white
    /// halo so it stays visible on any paint.
    fn render_brush_cursor(&mut self, cursor: &BrushCursor, transform: Affine) {
        if cursor.radius <= 0.0 {
            return;
        }
        let circle = Circle::new(cursor.position, cursor.radius);
        let halo = Stroke::new(CURSOR_STROKE_WIDTH * 3.0);
        let ring = Stroke::new(CURSOR_STROKE_WIDTH);
        self.scene
            .stroke(&halo, transform, Color::WHITE.with_alpha(0.6), None, &circle);
        self.scene.stroke(&ring, transform, cursor.color, None, &circle);
    }
}

impl Renderer for VelloRenderer {
    fn build_scene(&mut self, ctx: &RenderContext) {
        self.scene.reset();

        let transform = Affine::scale(ctx.scale_factor);

        // Background fill covers the whole viewport (physical pixels).
        let viewport = Rect::new(0.0, 0.0, ctx.viewport_size.width, ctx.viewport_size.height);
        self.scene.fill(
            Fill::NonZero,
            Affine::IDENTITY,
            ctx.background_color,
            None,
            &viewport,
        );

        self.render_canvas(ctx.pad.canvas(), transform);

        if let Some(cursor) = &ctx.brush_cursor {
            self.render_brush_cursor(cursor, transform);
        }
    }
}
