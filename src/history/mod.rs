//! History module - Per-field change tracking
//!
//! Every visited field owns a [`History`] keyed by its path. The store keeps
//! records alive across refresh cycles and evicts the ones that stop being
//! visited.

pub mod path;
pub mod record;
pub mod store;

pub use path::{join, resolve_relative};
pub use record::{Directive, History, HistoryState, MemberSlot};
pub use store::HistoryStore;
