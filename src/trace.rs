//! Tracer - Explicit diagnostics handle
//!
//! Every engine component receives a `Tracer` instead of reaching for a
//! process-wide logger instance. A tracer is just a named target over the
//! `log` facade, so `RUST_LOG=memwatch::cache=trace` narrows output to one
//! component.

use std::fmt;

/// Named diagnostics handle passed into engine components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tracer {
    target: &'static str,
}

impl Tracer {
    pub const CACHE: Self = Self::new("memwatch::cache");
    pub const HISTORY: Self = Self::new("memwatch::history");
    pub const TRAVERSAL: Self = Self::new("memwatch::traversal");
    pub const SESSION: Self = Self::new("memwatch::session");
    pub const SCHEMA: Self = Self::new("memwatch::schema");

    pub const fn new(target: &'static str) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &'static str {
        self.target
    }

    pub fn trace(&self, args: fmt::Arguments<'_>) {
        log::trace!(target: self.target, "{}", args);
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        log::debug!(target: self.target, "{}", args);
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        log::info!(target: self.target, "{}", args);
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        log::warn!(target: self.target, "{}", args);
    }
}
