//! Drawing pad: stroke state on top of a raster canvas.

use crate::brush::{Brush, BrushColor};
use crate::event::DrawEvent;
use crate::input::{InputState, PointerEvent};
use crate::raster::PixelCanvas;
use kurbo::{Point, Size};

/// Default canvas size before the window reports its real size.
pub const DEFAULT_CANVAS_SIZE: Size = Size::new(600.0, 400.0);

/// Local drawing state.
///
/// Every local paint call returns the [`DrawEvent`] it painted so the
/// caller can forward it to other participants.
#[derive(Debug, Clone)]
pub struct DrawingPad {
    canvas: PixelCanvas,
    brush: Brush,
    mouse_down: bool,
    last: Point,
    input: InputState,
}

impl Default for DrawingPad {
    fn default() -> Self {
        Self::new(
            DEFAULT_CANVAS_SIZE.width as u32,
            DEFAULT_CANVAS_SIZE.height as u32,
        )
    }
}

impl DrawingPad {
    /// Create a pad with a blank canvas of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: PixelCanvas::new(width, height),
            brush: Brush::default(),
            mouse_down: false,
            last: Point::ZERO,
            input: InputState::new(),
        }
    }

    pub fn canvas(&self) -> &PixelCanvas {
        &self.canvas
    }

    pub fn brush(&self) -> &Brush {
        &self.brush
    }

    /// Whether a stroke is in progress.
    pub fn is_drawing(&self) -> bool {
        self.mouse_down
    }

    /// Last position painted by the local stroke.
    pub fn last_position(&self) -> Point {
        self.last
    }

    /// Latest pointer position, pressed or hovering.
    pub fn pointer_position(&self) -> Point {
        self.input.pointer_position
    }

    /// Begin a stroke with a single dab.
    pub fn start_drawing(&mut self, at: Point) -> DrawEvent {
        self.mouse_down = true;
        let event = DrawEvent::dot(&self.brush, at);
        self.canvas.apply(&event);
        self.last = at;
        event
    }

    /// Continue the stroke to `to`. Does nothing unless a stroke is in
    /// progress.
    pub fn keep_drawing(&mut self, to: Point) -> Option<DrawEvent> {
        if !self.mouse_down {
            return None;
        }
        let event = DrawEvent::segment(&self.brush, self.last, to);
        self.canvas.apply(&event);
        self.last = to;
        Some(event)
    }

    /// End the current stroke.
    pub fn stop_drawing(&mut self) {
        self.mouse_down = false;
    }

    /// Route a pointer event to the stroke operations.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> Option<DrawEvent> {
        if !self.input.handle_pointer_event(event) {
            return None;
        }
        match event {
            PointerEvent::Down { position, .. } => Some(self.start_drawing(position)),
            PointerEvent::Move { position, .. } => self.keep_drawing(position),
            PointerEvent::Up { .. } => {
                self.stop_drawing();
                None
            }
        }
    }

    pub fn change_color(&mut self, color: BrushColor) {
        self.brush.set_color(color);
    }

    /// Set the brush radius (clamped to the slider range).
    pub fn set_brush_size(&mut self, size: f64) {
        self.brush.set_size(size);
    }

    /// Paint an event received from another participant.
    ///
    /// Local stroke state is left alone, so a remote event arriving in the
    /// middle of a local stroke does not break it.
    pub fn apply_remote(&mut self, event: &DrawEvent) -> bool {
        self.canvas.apply(event)
    }

    /// Follow a viewport resize, keeping existing paint.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.canvas.resize(width, height);
    }

    /// Replace the canvas content with a snapshot, cropped or padded to the
    /// current size.
    pub fn restore(&mut self, snapshot: &PixelCanvas) {
        self.canvas.clear();
        self.canvas.blit(snapshot);
    }

    pub fn clear(&mut self) {
        self.canvas.clear();
    }
}
