//! Shared fixture for traversal tests

use std::cell::RefCell;
use std::rc::Rc;

use super::{TraversalRegistry, VisitContext};
use crate::config::EngineConfig;
use crate::core::{ImageMemory, MemoryError, MemoryReader, PagedMemoryCache};
use crate::history::HistoryStore;
use crate::present::{RecordingSurface, Row};
use crate::schema::Schema;
use crate::trace::Tracer;

/// Image the test can keep writing to after the cache owns a reader
pub(crate) struct SharedImage(pub Rc<RefCell<ImageMemory>>);

impl MemoryReader for SharedImage {
    fn read(&mut self, address: u64, buffer: &mut [u8]) -> Result<usize, MemoryError> {
        self.0.borrow_mut().read(address, buffer)
    }
}

pub(crate) struct Fixture {
    pub schema: Schema,
    pub memory: Rc<RefCell<ImageMemory>>,
    pub cache: PagedMemoryCache,
    pub store: HistoryStore,
    pub registry: TraversalRegistry,
    pub config: EngineConfig,
    pub surface: RecordingSurface,
    pub expand_all: bool,
}

impl Fixture {
    pub fn new(schema: Schema, base: u64, bytes: Vec<u8>) -> Self {
        Self::with_config(schema, base, bytes, EngineConfig::default())
    }

    pub fn with_config(schema: Schema, base: u64, bytes: Vec<u8>, config: EngineConfig) -> Self {
        let memory = Rc::new(RefCell::new(ImageMemory::new(base, bytes)));
        let mut cache = PagedMemoryCache::new(&config, Tracer::CACHE);
        cache.attach_reader(Box::new(SharedImage(memory.clone())));
        Self {
            schema,
            memory,
            cache,
            store: HistoryStore::new(config.history_cycle_ms, Tracer::HISTORY),
            registry: TraversalRegistry::default(),
            config,
            surface: RecordingSurface::new(),
            expand_all: false,
        }
    }

    /// Change target memory and flag the cache for a swap
    pub fn write(&mut self, address: u64, bytes: &[u8]) {
        self.memory.borrow_mut().write(address, bytes);
        self.cache.mark_dirty();
    }

    /// One render tick over the schema root
    pub fn render(&mut self, now: u64) -> Vec<Row> {
        self.cache.update(now);
        let root = self
            .registry
            .get(&self.schema, self.schema.root(), &self.config)
            .unwrap();
        let mut cx = VisitContext {
            cache: &mut self.cache,
            history: &mut self.store,
            registry: &mut self.registry,
            schema: &self.schema,
            config: &self.config,
            surface: &mut self.surface,
            now,
            expand_all: self.expand_all,
            tracer: Tracer::TRAVERSAL,
            muted: 0,
            targets: Vec::new(),
        };
        cx.visit_child("root", "root", &root, 0, &[], &[], &[]);
        self.surface.take_rows()
    }

    /// Render twice so the first pass's page requests are resident
    pub fn prime(&mut self, now: u64) -> Vec<Row> {
        self.render(now);
        self.render(now + 1)
    }
}

pub(crate) fn row<'a>(rows: &'a [Row], path: &str) -> &'a Row {
    rows.iter()
        .find(|r| r.path == path)
        .unwrap_or_else(|| panic!("no row for {}: {:#?}", path, rows))
}
