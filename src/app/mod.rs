//! App module - watch session and commands
//!
//! Shared by the CLI and the GUI.

mod commands;
mod session;

pub use commands::*;
pub use session::*;
