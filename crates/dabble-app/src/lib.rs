//! Dabble desktop application
//!
//! Window, input handling and the share/export panels around a
//! [`dabble_core::DrawingPad`].

mod app;
mod config;
mod error;
mod export;
mod ui;

pub use app::App;
pub use config::{parse_session_target, AppConfig, Args, DEFAULT_SERVER_URL};
pub use error::AppError;
pub use export::{encode_png, export_png};
pub use ui::{render_ui, UiAction, UiState};
