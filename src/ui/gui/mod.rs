//! GUI Module
//!
//! The eframe watch window, its tree surface and theme.

mod app;
mod status_bar;
pub mod theme;
mod tree;

pub use app::{run_gui, WatchApp};
pub use tree::{EguiSurface, TreeState};
