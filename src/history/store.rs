//! History Store - Path-addressed records with generational eviction
//!
//! Records live in two buckets. A lookup that hits `old` moves the record
//! into `current`; a periodic cycle throws `old` away and demotes `current`.
//! A path nobody visits for two cycles is therefore dropped without any
//! per-access timestamps.

use std::collections::HashMap;

use super::path::is_within;
use super::record::{Directive, History};
use crate::traversal::{Builder, Traversal, TraversalError};
use crate::trace::Tracer;

/// Two-generation map from path to [`History`]
#[derive(Debug)]
pub struct HistoryStore {
    current: HashMap<String, History>,
    old: HashMap<String, History>,
    /// Externally attached directives by path
    attached: HashMap<String, Vec<Directive>>,
    cycle_interval_ms: u64,
    last_cycle_ms: u64,
    tracer: Tracer,
}

impl HistoryStore {
    pub fn new(cycle_interval_ms: u64, tracer: Tracer) -> Self {
        Self {
            current: HashMap::new(),
            old: HashMap::new(),
            attached: HashMap::new(),
            cycle_interval_ms,
            last_cycle_ms: 0,
            tracer,
        }
    }

    /// Record for `path`, migrating it out of the old bucket if needed
    pub fn try_get(&mut self, path: &str) -> Option<&mut History> {
        if !self.current.contains_key(path) {
            let history = self.old.remove(path)?;
            self.current.insert(path.to_string(), history);
        }
        self.current.get_mut(path)
    }

    /// Look at a record without touching its generation
    pub fn peek(&self, path: &str) -> Option<&History> {
        self.current.get(path).or_else(|| self.old.get(path))
    }

    /// Record for `path`, constructing it through `traversal` on a miss
    pub fn get_or_create(
        &mut self,
        path: &str,
        traversal: &Traversal,
        builder: &mut Builder<'_>,
    ) -> Result<&mut History, TraversalError> {
        let history = self.checkout_or_create(path, traversal, &[], builder)?;
        self.checkin(history);
        self.current
            .get_mut(path)
            .ok_or_else(|| TraversalError::Unresolved(path.to_string()))
    }

    /// Take a record out of the store for the duration of a visit
    ///
    /// A record whose owning type no longer matches `traversal` (the member
    /// was retyped) is rebuilt.
    pub(crate) fn checkout_or_create(
        &mut self,
        path: &str,
        traversal: &Traversal,
        forwarded: &[Directive],
        builder: &mut Builder<'_>,
    ) -> Result<History, TraversalError> {
        let existing = self
            .current
            .remove(path)
            .or_else(|| self.old.remove(path));
        if let Some(history) = existing {
            if history.type_id() == traversal.type_id() {
                return Ok(history);
            }
            self.tracer.debug(format_args!(
                "{}: type changed, rebuilding history",
                path
            ));
        }

        let mut directives = forwarded.to_vec();
        if let Some(attached) = self.attached.get(path) {
            directives.extend(attached.iter().cloned());
        }
        self.tracer
            .trace(format_args!("constructing history for {}", path));
        traversal.construct_history(path, directives, builder)
    }

    /// Return a checked-out record to the current bucket
    pub(crate) fn checkin(&mut self, history: History) {
        self.current.insert(history.path().to_string(), history);
    }

    /// Attach an external directive to `path` and drop the stale subtree
    pub fn attach_directive(&mut self, path: &str, directive: Directive) {
        self.tracer.info(format_args!(
            "directive on {}: {} -> type #{}",
            path, directive.target, directive.retype.0
        ));
        self.attached
            .entry(path.to_string())
            .or_default()
            .push(directive);
        self.invalidate(path);
    }

    /// Remove every attached directive for `path`
    pub fn clear_directives(&mut self, path: &str) {
        if self.attached.remove(path).is_some() {
            self.invalidate(path);
        }
    }

    /// Forget the record at `path` and everything beneath it
    pub fn invalidate(&mut self, path: &str) {
        self.current.retain(|p, _| !is_within(p, path));
        self.old.retain(|p, _| !is_within(p, path));
    }

    /// Rotate generations if the cycle interval has elapsed
    pub fn cycle(&mut self, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_cycle_ms) < self.cycle_interval_ms {
            return false;
        }
        self.last_cycle_ms = now_ms;
        let dropped = self.old.len();
        self.old = std::mem::take(&mut self.current);
        if dropped > 0 {
            self.tracer
                .debug(format_args!("cycle evicted {} records", dropped));
        }
        true
    }

    /// Drop every record (directives are kept)
    pub fn clear(&mut self) {
        self.current.clear();
        self.old.clear();
    }

    /// Drop records and directives
    pub fn reset(&mut self) {
        self.clear();
        self.attached.clear();
    }

    pub fn len(&self) -> usize {
        self.current.len() + self.old.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.old.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TypeId;

    fn store() -> HistoryStore {
        HistoryStore::new(5_000, Tracer::HISTORY)
    }

    fn record(path: &str) -> History {
        History::new(path, TypeId(0), Vec::new())
    }

    #[test]
    fn test_try_get_migrates_from_old() {
        let mut store = store();
        store.checkin(record("root/a"));
        assert!(store.cycle(5_000));
        assert!(store.peek("root/a").is_some());

        assert!(store.try_get("root/a").is_some());
        // Touched after the cycle, so it survives the next one
        assert!(store.cycle(10_000));
        assert!(store.try_get("root/a").is_some());
    }

    #[test]
    fn test_unvisited_path_evicted_after_two_cycles() {
        let mut store = store();
        store.checkin(record("root/a"));
        store.checkin(record("root/b"));

        store.cycle(5_000);
        store.try_get("root/b");
        store.cycle(10_000);

        assert!(store.try_get("root/a").is_none());
        assert!(store.try_get("root/b").is_some());
    }

    #[test]
    fn test_cycle_is_time_gated() {
        let mut store = store();
        store.checkin(record("root/a"));
        assert!(!store.cycle(1_000));
        assert!(!store.cycle(4_999));
        assert!(store.cycle(5_000));
        assert!(!store.cycle(9_000));
        assert!(store.cycle(10_000));
        assert!(store.is_empty());
    }

    #[test]
    fn test_invalidate_subtree() {
        let mut store = store();
        store.checkin(record("root/a"));
        store.checkin(record("root/a/x"));
        store.checkin(record("root/ab"));
        store.invalidate("root/a");
        assert!(store.peek("root/a").is_none());
        assert!(store.peek("root/a/x").is_none());
        assert!(store.peek("root/ab").is_some());
    }

    #[test]
    fn test_attach_directive_invalidates() {
        let mut store = store();
        store.checkin(record("root/s"));
        store.checkin(record("root/s/bar"));
        store.attach_directive("root/s", Directive::retype("bar", TypeId(7)));
        assert_eq!(store.len(), 0);

        store.clear_directives("root/s");
        assert!(store.attached.is_empty());
    }
}
