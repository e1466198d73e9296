//! Dabble Core Library
//!
//! Platform-agnostic drawing, codec and session logic for the Dabble shared
//! canvas. Nothing in here touches a window or a GPU.

pub mod brush;
pub mod collaboration;
pub mod compression;
pub mod event;
pub mod input;
pub mod pad;
pub mod raster;
pub mod session;
pub mod sync;

pub use brush::{Brush, BrushColor, PALETTE};
pub use collaboration::CollaborationManager;
pub use event::DrawEvent;
pub use input::{InputState, PointerEvent, PointerSource};
pub use pad::DrawingPad;
pub use raster::PixelCanvas;
pub use session::SessionId;
pub use sync::{CanvasSnapshot, ClientMessage, ConnectionState, NativeWebSocket, ServerMessage, SocketEvent, SyncEvent};
