//! Draw events: the unit of work shared between participants.
//!
//! The JSON form matches what browser peers send on the `data` channel:
//!
//! ```json
//! { "name": "keepDrawingDot",
//!   "args": { "color": "#f9989f", "brushSize": 20, "old_x": 1, "old_y": 2, "x": 3, "y": 4 } }
//! ```

use crate::brush::{Brush, BrushColor};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Arguments of the first dab of a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DotArgs {
    pub color: BrushColor,
    #[serde(rename = "brushSize")]
    pub brush_size: f64,
    pub x: f64,
    pub y: f64,
}

/// Arguments of a stroke continuation: a segment from the previous pointer
/// position plus a dab at the new one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentArgs {
    pub color: BrushColor,
    #[serde(rename = "brushSize")]
    pub brush_size: f64,
    pub old_x: f64,
    pub old_y: f64,
    pub x: f64,
    pub y: f64,
}

/// A single paint operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "args")]
pub enum DrawEvent {
    #[serde(rename = "drawDot")]
    Dot(DotArgs),
    #[serde(rename = "keepDrawingDot")]
    Segment(SegmentArgs),
}

impl DrawEvent {
    pub fn dot(brush: &Brush, at: Point) -> Self {
        DrawEvent::Dot(DotArgs {
            color: brush.color,
            brush_size: brush.size(),
            x: at.x,
            y: at.y,
        })
    }

    pub fn segment(brush: &Brush, from: Point, to: Point) -> Self {
        DrawEvent::Segment(SegmentArgs {
            color: brush.color,
            brush_size: brush.size(),
            old_x: from.x,
            old_y: from.y,
            x: to.x,
            y: to.y,
        })
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            DrawEvent::Dot(_) => "drawDot",
            DrawEvent::Segment(_) => "keepDrawingDot",
        }
    }

    pub fn color(&self) -> BrushColor {
        match self {
            DrawEvent::Dot(args) => args.color,
            DrawEvent::Segment(args) => args.color,
        }
    }

    /// Dab radius carried by the event.
    ///
    /// Remote peers are not trusted to stay inside the slider range, so
    /// negative or non-finite sizes read as zero.
    pub fn radius(&self) -> f64 {
        let size = match self {
            DrawEvent::Dot(args) => args.brush_size,
            DrawEvent::Segment(args) => args.brush_size,
        };
        if size.is_finite() { size.max(0.0) } else { 0.0 }
    }

    /// Segment start, if this event continues a stroke.
    pub fn start(&self) -> Option<Point> {
        match self {
            DrawEvent::Dot(_) => None,
            DrawEvent::Segment(args) => Some(Point::new(args.old_x, args.old_y)),
        }
    }

    /// Position of the final dab.
    pub fn end(&self) -> Point {
        match self {
            DrawEvent::Dot(args) => Point::new(args.x, args.y),
            DrawEvent::Segment(args) => Point::new(args.x, args.y),
        }
    }

    /// Whether all coordinates are finite numbers.
    pub fn is_finite(&self) -> bool {
        let end = self.end();
        let start_ok = self.start().is_none_or(|p| p.x.is_finite() && p.y.is_finite());
        start_ok && end.x.is_finite() && end.y.is_finite()
    }

    /// Area touched by the event, including the brush radius.
    pub fn bounds(&self) -> Rect {
        let end = self.end();
        let rect = match self.start() {
            Some(start) => Rect::from_points(start, end),
            None => Rect::from_points(end, end),
        };
        rect.inflate(self.radius(), self.radius())
    }
}
