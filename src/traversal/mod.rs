//! Traversal engine - Type-driven, diff-aware walk over target memory
//!
//! Every schema type maps to one [`Traversal`] variant. A traversal knows
//! three things about its type:
//! - its wire size for a given history record
//! - how to build a fresh history record (including child paths)
//! - how to interpret a byte window against the previous snapshot, report
//!   the node to the presentation surface and recurse into children
//!
//! Dispatch is a closed `match`, so a new type variant does not compile
//! until every operation handles it.

mod alias;
mod array;
mod enumeration;
mod global;
mod graphics;
mod namespace;
mod pointer;
mod primitive;
mod registry;
mod string;
mod structure;
mod union;

use std::rc::Rc;

use thiserror::Error;

pub use alias::{AliasTraversal, PlaceholderTraversal};
pub use array::ArrayTraversal;
pub use enumeration::EnumTraversal;
pub use global::GlobalTraversal;
pub use graphics::GraphicsTraversal;
pub use namespace::NamespaceTraversal;
pub use pointer::{FunctionPointerTraversal, PointerTraversal};
pub use primitive::PrimitiveTraversal;
pub use registry::{Builder, TraversalRegistry};
pub use string::StringTraversal;
pub use structure::{StructMember, StructTraversal};
pub use union::UnionTraversal;

use crate::config::{EngineConfig, BIG_VALUE_THRESHOLD};
use crate::core::PagedMemoryCache;
use crate::history::{Directive, History, HistoryStore};
use crate::present::{Node, Payload, Surface};
use crate::schema::{Schema, TypeId};
use crate::trace::Tracer;

/// Traversal construction and resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraversalError {
    #[error("Unknown type #{0}")]
    UnknownType(u32),

    #[error("Type '{0}' contains itself by value")]
    RecursiveType(String),

    #[error("Unresolved path {0}")]
    Unresolved(String),
}

/// Identity shared by every traversal variant
#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub id: TypeId,
    pub name: String,
}

/// Per-variant traversal implementation
#[derive(Debug)]
pub enum Traversal {
    Primitive(PrimitiveTraversal),
    Array(ArrayTraversal),
    Pointer(PointerTraversal),
    FunctionPointer(FunctionPointerTraversal),
    String(StringTraversal),
    Enum(EnumTraversal),
    Struct(StructTraversal),
    Union(UnionTraversal),
    Global(GlobalTraversal),
    Namespace(NamespaceTraversal),
    Alias(AliasTraversal),
    Graphics(GraphicsTraversal),
    Placeholder(PlaceholderTraversal),
}

impl Traversal {
    pub fn info(&self) -> &TypeInfo {
        match self {
            Traversal::Primitive(t) => &t.info,
            Traversal::Array(t) => &t.info,
            Traversal::Pointer(t) => &t.info,
            Traversal::FunctionPointer(t) => &t.info,
            Traversal::String(t) => &t.info,
            Traversal::Enum(t) => &t.info,
            Traversal::Struct(t) => &t.info,
            Traversal::Union(t) => &t.info,
            Traversal::Global(t) => &t.info,
            Traversal::Namespace(t) => &t.info,
            Traversal::Alias(t) => &t.info,
            Traversal::Graphics(t) => &t.info,
            Traversal::Placeholder(t) => &t.info,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.info().id
    }

    pub fn type_name(&self) -> &str {
        &self.info().name
    }

    /// Wire size in bytes given the record's current state
    pub fn size(&self, history: &History, store: &HistoryStore) -> usize {
        match self {
            Traversal::Primitive(t) => t.size(),
            Traversal::Array(t) => t.size(history, store),
            Traversal::Pointer(t) => t.size(),
            Traversal::FunctionPointer(t) => t.size(),
            Traversal::String(t) => t.size(history),
            Traversal::Enum(t) => t.size(),
            Traversal::Struct(t) => t.size(history, store),
            Traversal::Union(t) => t.size(),
            Traversal::Global(t) => t.size(history, store),
            Traversal::Namespace(_) => 0,
            Traversal::Alias(t) => t.size(history, store),
            Traversal::Graphics(t) => t.size(),
            Traversal::Placeholder(_) => 0,
        }
    }

    /// Size before any history exists
    pub fn static_size(&self) -> usize {
        match self {
            Traversal::Primitive(t) => t.size(),
            Traversal::Array(t) => t.static_size(),
            Traversal::Pointer(t) => t.size(),
            Traversal::FunctionPointer(t) => t.size(),
            Traversal::String(t) => t.static_size(),
            Traversal::Enum(t) => t.size(),
            Traversal::Struct(t) => t.static_size(),
            Traversal::Union(t) => t.size(),
            Traversal::Global(t) => t.static_size(),
            Traversal::Namespace(_) => 0,
            Traversal::Alias(t) => t.static_size(),
            Traversal::Graphics(t) => t.size(),
            Traversal::Placeholder(_) => 0,
        }
    }

    /// Size of the value recorded at `path`, or the static size if unseen
    pub fn size_at(&self, path: &str, store: &HistoryStore) -> usize {
        match store.peek(path) {
            Some(history) if history.type_id() == self.type_id() => self.size(history, store),
            _ => self.static_size(),
        }
    }

    /// Build the record for `path`
    pub fn construct_history(
        &self,
        path: &str,
        directives: Vec<Directive>,
        builder: &mut Builder<'_>,
    ) -> Result<History, TraversalError> {
        Ok(match self {
            Traversal::Primitive(t) => t.construct_history(path, directives),
            Traversal::Array(t) => t.construct_history(path, directives),
            Traversal::Pointer(t) => t.construct_history(path, directives),
            Traversal::FunctionPointer(t) => t.construct_history(path, directives),
            Traversal::String(t) => t.construct_history(path, directives),
            Traversal::Enum(t) => t.construct_history(path, directives),
            Traversal::Struct(t) => t.construct_history(path, directives, builder)?,
            Traversal::Union(t) => t.construct_history(path, directives),
            Traversal::Global(t) => t.construct_history(path, directives, builder)?,
            Traversal::Namespace(t) => t.construct_history(path, directives),
            Traversal::Alias(t) => t.construct_history(path, directives, builder)?,
            Traversal::Graphics(t) => t.construct_history(path, directives),
            Traversal::Placeholder(t) => t.construct_history(path, directives),
        })
    }

    /// Interpret `current` against `previous`, report to the surface and
    /// recurse. Returns whether this value (or a visited child) changed.
    pub fn visit(
        &self,
        history: &mut History,
        label: &str,
        address: u64,
        current: &[u8],
        previous: &[u8],
        cx: &mut VisitContext<'_>,
    ) -> bool {
        match self {
            Traversal::Primitive(t) => t.visit(history, label, current, previous, cx),
            Traversal::Array(t) => t.visit(history, label, address, current, previous, cx),
            Traversal::Pointer(t) => t.visit(history, label, current, previous, cx),
            Traversal::FunctionPointer(t) => t.visit(history, label, current, previous, cx),
            Traversal::String(t) => t.visit(history, label, current, previous, cx),
            Traversal::Enum(t) => t.visit(history, label, current, previous, cx),
            Traversal::Struct(t) => t.visit(history, label, address, current, previous, cx),
            Traversal::Union(t) => t.visit(history, label, current, previous, cx),
            Traversal::Global(t) => t.visit(history, label, cx),
            Traversal::Namespace(t) => t.visit(history, label, cx),
            Traversal::Alias(t) => t.visit(history, label, address, current, previous, cx),
            Traversal::Graphics(t) => t.visit(history, label, current, previous, cx),
            Traversal::Placeholder(t) => t.visit(history, label, cx),
        }
    }
}

/// Everything a visit needs besides the record being visited
pub struct VisitContext<'a> {
    pub cache: &'a mut PagedMemoryCache,
    pub history: &'a mut HistoryStore,
    pub registry: &'a mut TraversalRegistry,
    pub schema: &'a Schema,
    pub config: &'a EngineConfig,
    pub surface: &'a mut dyn Surface,
    /// Logical time of this render tick
    pub now: u64,
    /// Visit collapsed containers as if they were expanded
    pub expand_all: bool,
    pub tracer: Tracer,
    /// Depth of collapsed containers being walked for `expand_all`
    pub(crate) muted: usize,
    /// Global addresses and pointer targets from the root to the current node
    pub(crate) targets: Vec<u64>,
}

/// How a container's children are walked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    /// Children are shown
    Shown,
    /// Collapsed on the surface but walked silently; this container muted it
    Muted,
    /// Inside a muted subtree
    Inherited,
    /// Children are skipped
    Collapsed,
}

impl Expansion {
    pub fn walks_children(self) -> bool {
        self != Expansion::Collapsed
    }
}

impl VisitContext<'_> {
    pub(crate) fn leaf(&mut self, node: &Node<'_>, payload: Payload<'_>) {
        if self.muted == 0 {
            self.surface.leaf(node, payload);
        }
    }

    /// Report a container header and decide whether to walk its children
    ///
    /// Expand-all never walks an on-demand container the surface left closed.
    pub(crate) fn open(&mut self, node: &Node<'_>, payload: Payload<'_>) -> Expansion {
        if self.muted > 0 {
            return if node.on_demand {
                Expansion::Collapsed
            } else {
                Expansion::Inherited
            };
        }
        if self.surface.open(node, payload) {
            Expansion::Shown
        } else if self.expand_all && !node.on_demand {
            self.muted += 1;
            Expansion::Muted
        } else {
            Expansion::Collapsed
        }
    }

    pub(crate) fn close(&mut self, expansion: Expansion) {
        match expansion {
            Expansion::Shown => self.surface.close(),
            Expansion::Muted => self.muted -= 1,
            Expansion::Inherited | Expansion::Collapsed => {}
        }
    }

    /// Namespace filter, lowercased
    pub(crate) fn filter(&self, path: &str) -> Option<String> {
        if self.muted > 0 {
            return None;
        }
        self.surface.filter(path).map(str::to_lowercase)
    }

    /// Check out (or build) the record at `path`, visit it, check it back in
    #[allow(clippy::too_many_arguments)]
    pub fn visit_child(
        &mut self,
        path: &str,
        label: &str,
        traversal: &Rc<Traversal>,
        address: u64,
        current: &[u8],
        previous: &[u8],
        forwarded: &[Directive],
    ) -> bool {
        let mut builder = Builder {
            schema: self.schema,
            registry: &mut *self.registry,
            config: self.config,
            tracer: self.tracer,
        };
        let mut history =
            match self
                .history
                .checkout_or_create(path, traversal, forwarded, &mut builder)
            {
                Ok(history) => history,
                Err(e) => {
                    self.tracer.debug(format_args!("{}: {}", path, e));
                    return false;
                }
            };

        history.set_address(address);
        let changed = traversal.visit(&mut history, label, address, current, previous, self);
        self.history.checkin(history);
        changed
    }

    /// Run `f` with a zeroed current/previous scratch pair of `size` bytes
    ///
    /// Small values live on the stack; anything at or above
    /// [`BIG_VALUE_THRESHOLD`] is borrowed from the cache's pool and handed
    /// back before this returns.
    pub fn with_scratch<R>(
        &mut self,
        size: usize,
        f: impl FnOnce(&mut Self, &mut [u8], &mut [u8]) -> R,
    ) -> R {
        if size < BIG_VALUE_THRESHOLD {
            let mut current = [0u8; BIG_VALUE_THRESHOLD];
            let mut previous = [0u8; BIG_VALUE_THRESHOLD];
            return f(self, &mut current[..size], &mut previous[..size]);
        }

        let mut current = self.cache.borrow_scratch(size);
        let mut previous = self.cache.borrow_scratch(size);
        let result = f(self, &mut current, &mut previous);
        self.cache.return_scratch(current);
        self.cache.return_scratch(previous);
        result
    }

    /// Synchronously read `size` bytes at `address` from both generations
    /// and hand the windows to `f`; a non-resident side is passed as empty.
    pub fn with_snapshot<R>(
        &mut self,
        address: u64,
        size: usize,
        f: impl FnOnce(&mut Self, &[u8], &[u8]) -> R,
    ) -> R {
        self.with_scratch(size, |cx, current, previous| {
            let have_current = cx.cache.read_into(address, current);
            let have_previous = cx.cache.read_previous_into(address, previous);
            let current: &[u8] = if have_current { current } else { &[] };
            let previous: &[u8] = if have_previous { previous } else { &[] };
            f(cx, current, previous)
        })
    }
}

/// Presentation node for a record
pub(crate) fn node<'n>(history: &'n History, label: &'n str, type_name: &'n str, now: u64) -> Node<'n> {
    Node {
        path: history.path(),
        label,
        type_name,
        address: history.address(),
        age: history.age_secs(now),
        fresh: history.is_fresh(now),
        on_demand: false,
    }
}

/// Stamp `history` if `previous` exists and differs from `current`
pub(crate) fn detect_change(history: &mut History, current: &[u8], previous: &[u8], now: u64) -> bool {
    if current.is_empty() || previous.is_empty() || current == previous {
        return false;
    }
    history.mark_modified(now);
    true
}

/// Address of a child `offset` bytes into a value at `base`, with its byte
/// windows; a child past the top of the address space gets no bytes
pub(crate) fn child_window<'b>(
    base: u64,
    offset: usize,
    len: usize,
    current: &'b [u8],
    previous: &'b [u8],
) -> (u64, &'b [u8], &'b [u8]) {
    match base.checked_add(offset as u64) {
        Some(address) => {
            let window = offset..offset.saturating_add(len);
            (
                address,
                current.get(window.clone()).unwrap_or(&[]),
                previous.get(window).unwrap_or(&[]),
            )
        }
        None => (base, &[], &[]),
    }
}

/// Little-endian unsigned integer of up to eight bytes
pub(crate) fn read_uint(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .take(8)
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Fixed single-byte text decoding (Latin-1)
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_change_rules() {
        let mut h = History::new("root/x", TypeId(0), Vec::new());
        assert!(!detect_change(&mut h, &[1, 2], &[], 10));
        assert!(!detect_change(&mut h, &[], &[1, 2], 10));
        assert!(!detect_change(&mut h, &[1, 2], &[1, 2], 10));
        assert_eq!(h.last_modified(), None);

        assert!(detect_change(&mut h, &[1, 3], &[1, 2], 10));
        assert_eq!(h.last_modified(), Some(10));
        assert!(h.is_fresh(10));
    }

    #[test]
    fn test_read_uint_little_endian() {
        assert_eq!(read_uint(&[0x78, 0x56, 0x34, 0x12]), 0x1234_5678);
        assert_eq!(read_uint(&[0xFF]), 0xFF);
        assert_eq!(read_uint(&[]), 0);
    }

    #[test]
    fn test_decode_text_latin1() {
        assert_eq!(decode_text(b"AB"), "AB");
        assert_eq!(decode_text(&[0xE9]), "\u{e9}");
    }
}
