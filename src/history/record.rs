//! History records - per-path change bookkeeping

use std::rc::Rc;

use crate::schema::TypeId;
use crate::traversal::Traversal;

/// External override attached to a path before its subtree is built
///
/// `target` is relative to the record the directive is attached to: a
/// single segment names a direct member, longer targets are handed down to
/// that member's own construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub target: String,
    /// Type to use instead of the member's declared type
    pub retype: TypeId,
}

impl Directive {
    pub fn retype(target: impl Into<String>, retype: TypeId) -> Self {
        Self {
            target: target.into(),
            retype,
        }
    }

    /// First target segment and, if there are more, the directive to forward
    pub fn split_first(&self) -> (&str, Option<Directive>) {
        match self.target.split_once('/') {
            Some((head, tail)) if !tail.is_empty() => (
                head,
                Some(Directive {
                    target: tail.to_string(),
                    retype: self.retype,
                }),
            ),
            Some((head, _)) => (head, None),
            None => (self.target.as_str(), None),
        }
    }
}

/// A struct member as laid out for one record
#[derive(Debug, Clone)]
pub struct MemberSlot {
    pub name: String,
    pub path: String,
    pub offset: Option<usize>,
    /// Declared type, or the directive's replacement
    pub traversal: Rc<Traversal>,
    /// Directives forwarded to the member's own construction
    pub directives: Vec<Directive>,
}

/// Variant-specific bookkeeping
#[derive(Debug, Clone, Default)]
pub enum HistoryState {
    #[default]
    Leaf,
    /// Last decoded integer of a primitive or enum
    Scalar { last_value: Option<u64> },
    /// Current read window of a NUL-terminated string
    String { size: usize },
    Array { count: usize, elements: Vec<String> },
    Struct { members: Vec<MemberSlot> },
    Pointer { target_path: String, last_target: Option<u64> },
    /// `(name, path)` for each child
    Namespace { children: Vec<(String, String)> },
    /// Pixel checksum and how many times the texture was regenerated
    Graphics { checksum: u64, generation: u32 },
}

/// Persistent per-path record used for change detection
#[derive(Debug, Clone)]
pub struct History {
    path: String,
    type_id: TypeId,
    last_modified: Option<u64>,
    address: u64,
    directives: Vec<Directive>,
    pub(crate) state: HistoryState,
}

impl History {
    pub fn new(path: impl Into<String>, type_id: TypeId, directives: Vec<Directive>) -> Self {
        Self {
            path: path.into(),
            type_id,
            last_modified: None,
            address: 0,
            directives,
            state: HistoryState::Leaf,
        }
    }

    pub(crate) fn with_state(mut self, state: HistoryState) -> Self {
        self.state = state;
        self
    }

    /// Re-own a record built by a proxied type (globals, aliases)
    pub(crate) fn owned_by(mut self, type_id: TypeId) -> Self {
        self.type_id = type_id;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub(crate) fn set_address(&mut self, address: u64) {
        self.address = address;
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    pub fn state(&self) -> &HistoryState {
        &self.state
    }

    /// Logical time of the last observed change
    pub fn last_modified(&self) -> Option<u64> {
        self.last_modified
    }

    pub(crate) fn mark_modified(&mut self, now: u64) {
        self.last_modified = Some(now);
    }

    /// Changed during the tick stamped `now`
    pub fn is_fresh(&self, now: u64) -> bool {
        self.last_modified == Some(now)
    }

    /// Seconds since the last change, if it ever changed
    pub fn age_secs(&self, now: u64) -> Option<f32> {
        self.last_modified
            .map(|t| now.saturating_sub(t) as f32 / 1000.0)
    }

    /// Last integer seen by a scalar record
    pub fn integer_value(&self) -> Option<u64> {
        match self.state {
            HistoryState::Scalar { last_value } => last_value,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_split() {
        let d = Directive::retype("foo/bar/baz", TypeId(3));
        let (head, rest) = d.split_first();
        assert_eq!(head, "foo");
        assert_eq!(rest, Some(Directive::retype("bar/baz", TypeId(3))));

        let d = Directive::retype("bar", TypeId(3));
        assert_eq!(d.split_first(), ("bar", None));
    }

    #[test]
    fn test_freshness_and_age() {
        let mut h = History::new("root/x", TypeId(0), Vec::new());
        assert!(!h.is_fresh(100));
        assert_eq!(h.age_secs(100), None);

        h.mark_modified(1000);
        assert!(h.is_fresh(1000));
        assert!(!h.is_fresh(1500));
        assert_eq!(h.age_secs(2500), Some(1.5));
    }
}
