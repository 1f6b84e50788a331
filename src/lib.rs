//! memwatch - live memory inspection with per-field change tracking
//!
//! A schema describes the target's types and globals. Each render tick
//! walks that schema against a paged snapshot cache of the target's memory,
//! keeping one history record per visited path so every field knows when it
//! last changed.

pub mod app;
pub mod config;
pub mod core;
pub mod history;
pub mod present;
pub mod schema;
pub mod trace;
pub mod traversal;
pub mod ui;
