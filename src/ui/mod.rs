//! UI module - front-ends over a [`crate::app::WatchSession`]
//!
//! `cli` is the headless reedline REPL, `gui` the eframe watch window.

pub mod cli;
pub mod gui;
