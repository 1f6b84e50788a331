//! Watch session - ties schema, cache, history and traversal together
//!
//! An update tick means "the target changed": the cache is flagged for a
//! swap. A render tick walks the schema root against the cache, reporting
//! into a surface, then gives the history store a chance to cycle.

use anyhow::{anyhow, Result};

use crate::config::EngineConfig;
use crate::core::{CacheStats, MemoryReader, PagedMemoryCache};
use crate::history::{Directive, HistoryStore};
use crate::present::Surface;
use crate::schema::Schema;
use crate::trace::Tracer;
use crate::traversal::{TraversalRegistry, VisitContext};

/// Path of the schema root's history record
pub const ROOT_PATH: &str = "root";

/// One watched target
pub struct WatchSession {
    config: EngineConfig,
    schema: Option<Schema>,
    cache: PagedMemoryCache,
    history: HistoryStore,
    registry: TraversalRegistry,
    expand_all: bool,
    stale: bool,
    tracer: Tracer,
}

impl WatchSession {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            cache: PagedMemoryCache::new(&config, Tracer::CACHE),
            history: HistoryStore::new(config.history_cycle_ms, Tracer::HISTORY),
            registry: TraversalRegistry::new(Tracer::TRAVERSAL),
            schema: None,
            expand_all: false,
            stale: true,
            tracer: Tracer::SESSION,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    /// Replace the schema; every derived structure is rebuilt from scratch
    pub fn load_schema(&mut self, schema: Schema) {
        self.tracer.info(format_args!(
            "schema loaded: {} types, {} symbols",
            schema.len(),
            schema.symbols().len()
        ));
        self.registry.clear();
        self.history.reset();
        self.cache.clear();
        self.schema = Some(schema);
        self.update_tick();
    }

    pub fn unload_schema(&mut self) -> Option<Schema> {
        self.registry.clear();
        self.history.reset();
        self.schema.take()
    }

    /// Read target memory through `reader` from now on
    pub fn attach_reader(&mut self, reader: Box<dyn MemoryReader>) {
        self.cache.clear();
        self.cache.attach_reader(reader);
        self.update_tick();
    }

    pub fn detach_reader(&mut self) -> Option<Box<dyn MemoryReader>> {
        self.cache.clear();
        self.cache.detach_reader()
    }

    pub fn has_reader(&self) -> bool {
        self.cache.has_reader()
    }

    /// The target changed (paused, stepped, polled)
    pub fn update_tick(&mut self) {
        self.cache.mark_dirty();
        self.stale = true;
    }

    /// Walk the schema root into `surface`; returns whether anything changed
    pub fn render_tick(&mut self, now: u64, surface: &mut dyn Surface) -> bool {
        let Some(schema) = self.schema.as_ref() else {
            return false;
        };
        self.cache.update(now);

        let root = match self.registry.get(schema, schema.root(), &self.config) {
            Ok(root) => root,
            Err(e) => {
                self.tracer.warn(format_args!("cannot walk schema root: {}", e));
                return false;
            }
        };

        let mut cx = VisitContext {
            cache: &mut self.cache,
            history: &mut self.history,
            registry: &mut self.registry,
            schema,
            config: &self.config,
            surface,
            now,
            expand_all: self.expand_all,
            tracer: Tracer::TRAVERSAL,
            muted: 0,
            targets: Vec::new(),
        };
        let changed = cx.visit_child(ROOT_PATH, ROOT_PATH, &root, 0, &[], &[], &[]);

        self.history.cycle(now);
        self.stale = false;
        changed
    }

    /// Attach a directive to the record at `path` before it is rebuilt
    pub fn attach_directive(&mut self, path: &str, directive: Directive) {
        self.history.attach_directive(path, directive);
        self.stale = true;
    }

    /// Retype `member` of the struct at `path` to the schema type `type_name`
    pub fn retype(&mut self, path: &str, member: &str, type_name: &str) -> Result<()> {
        let schema = self.schema.as_ref().ok_or_else(|| anyhow!("no schema loaded"))?;
        let ty = schema
            .find(type_name)
            .ok_or_else(|| anyhow!("unknown type '{}'", type_name))?;
        self.attach_directive(path, Directive::retype(member, ty));
        Ok(())
    }

    pub fn clear_directives(&mut self, path: &str) {
        self.history.clear_directives(path);
        self.stale = true;
    }

    pub fn set_expand_all(&mut self, expand_all: bool) {
        self.expand_all = expand_all;
    }

    pub fn expand_all(&self) -> bool {
        self.expand_all
    }

    /// An update tick happened since the last render
    pub fn stale(&self) -> bool {
        self.stale
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn resident_pages(&self) -> usize {
        self.cache.resident_pages()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

impl Default for WatchSession {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ImageMemory;
    use crate::present::RecordingSurface;
    use crate::schema::{PrimitiveKind, SchemaBuilder, TypeKind};

    fn schema() -> Schema {
        let mut b = SchemaBuilder::new(8);
        let int = b.primitive(PrimitiveKind::U32);
        let g = b.add("g", TypeKind::Global { ty: int, address: 0x10 });
        let root = b.add("root", TypeKind::Namespace { children: vec![("g".into(), g)] });
        b.build(root).unwrap()
    }

    #[test]
    fn test_render_without_schema_is_noop() {
        let mut session = WatchSession::default();
        let mut surface = RecordingSurface::new();
        assert!(!session.render_tick(0, &mut surface));
        assert!(surface.rows().is_empty());
    }

    #[test]
    fn test_stale_cleared_by_render() {
        let mut session = WatchSession::default();
        session.load_schema(schema());
        session.attach_reader(Box::new(ImageMemory::new(0x10, vec![1, 0, 0, 0])));
        assert!(session.stale());

        let mut surface = RecordingSurface::new();
        session.render_tick(0, &mut surface);
        assert!(!session.stale());
        session.update_tick();
        assert!(session.stale());
    }

    #[test]
    fn test_load_schema_resets_history() {
        let mut session = WatchSession::default();
        session.load_schema(schema());
        session.attach_reader(Box::new(ImageMemory::new(0x10, vec![1, 0, 0, 0])));
        let mut surface = RecordingSurface::new();
        session.render_tick(0, &mut surface);
        assert!(session.history_len() > 0);

        session.load_schema(schema());
        assert_eq!(session.history_len(), 0);
    }

    #[test]
    fn test_retype_unknown_type_fails() {
        let mut session = WatchSession::default();
        assert!(session.retype("root/g", "x", "uint32").is_err());
        session.load_schema(schema());
        assert!(session.retype("root/g", "x", "nope").is_err());
        assert!(session.retype("root/g", "x", "uint32").is_ok());
    }
}
