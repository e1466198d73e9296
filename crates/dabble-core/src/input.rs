//! Pointer input for mouse and touch.
//!
//! Mouse and touch are folded into one [`PointerEvent`] stream so the pad
//! only has to understand press, move and release.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Where a pointer event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PointerSource {
    #[default]
    Mouse,
    /// A finger, identified by the platform's touch id.
    Touch(u64),
}

/// Pointer event in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down { position: Point, source: PointerSource },
    Move { position: Point, source: PointerSource },
    Up { position: Point, source: PointerSource },
}

impl PointerEvent {
    pub fn position(&self) -> Point {
        match *self {
            PointerEvent::Down { position, .. }
            | PointerEvent::Move { position, .. }
            | PointerEvent::Up { position, .. } => position,
        }
    }

    pub fn source(&self) -> PointerSource {
        match *self {
            PointerEvent::Down { source, .. }
            | PointerEvent::Move { source, .. }
            | PointerEvent::Up { source, .. } => source,
        }
    }
}

/// Convert a client (window) position to canvas coordinates given the
/// top-left corner of the canvas' bounding box.
pub fn canvas_position(client: Point, canvas_origin: Point) -> Point {
    Point::new(client.x - canvas_origin.x, client.y - canvas_origin.y)
}

/// Tracks the primary pointer across events.
///
/// Only one pointer draws at a time: while a touch or the mouse is held,
/// events from other sources are ignored.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    /// Current pointer position in canvas coordinates.
    pub pointer_position: Point,
    /// Position before the last move.
    pub previous_pointer_position: Point,
    /// Source currently holding the pointer down.
    active: Option<PointerSource>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed an event; returns `false` if it was ignored because another
    /// pointer is active.
    pub fn handle_pointer_event(&mut self, event: PointerEvent) -> bool {
        let source = event.source();
        if let Some(active) = self.active {
            if active != source {
                return false;
            }
        }

        self.previous_pointer_position = self.pointer_position;
        self.pointer_position = event.position();

        match event {
            PointerEvent::Down { .. } => self.active = Some(source),
            PointerEvent::Up { .. } => self.active = None,
            PointerEvent::Move { .. } => {}
        }
        true
    }

    /// Whether a pointer is currently held down.
    pub fn is_pressed(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_source(&self) -> Option<PointerSource> {
        self.active
    }

    pub fn pointer_delta(&self) -> Vec2 {
        self.pointer_position - self.previous_pointer_position
    }
}
