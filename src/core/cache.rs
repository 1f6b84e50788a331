//! Paged Memory Cache - Double-buffered snapshots of target memory
//!
//! The address space is split into fixed-size pages. Reads never block: they
//! record which pages were asked for and answer from whatever is resident.
//! A fill pass then fetches the requested pages, merging adjacent page
//! numbers into one reader call per contiguous run.
//!
//! Two generations are kept. `current` holds pages fetched since the last
//! swap and `previous` holds the pages of the interval before it, which is
//! what change detection diffs against.

use std::collections::{BTreeSet, HashMap};

use super::memory::MemoryReader;
use super::pool::BufferPool;
use crate::config::EngineConfig;
use crate::trace::Tracer;

/// One buffer covering a run of consecutive pages
#[derive(Debug)]
struct Span {
    first_page: u64,
    data: Vec<u8>,
}

/// Set of resident pages for one refresh interval
#[derive(Debug, Default)]
struct Generation {
    spans: Vec<Span>,
    /// Page number -> index into `spans`
    pages: HashMap<u64, usize>,
}

impl Generation {
    fn is_resident(&self, page: u64) -> bool {
        self.pages.contains_key(&page)
    }

    fn insert(&mut self, span: Span, page_size: usize) {
        let index = self.spans.len();
        let count = (span.data.len() / page_size) as u64;
        for page in span.first_page..span.first_page + count {
            self.pages.insert(page, index);
        }
        self.spans.push(span);
    }

    /// Borrow `[offset, offset + size)` if a single span holds all of it
    fn slice(&self, offset: u64, size: usize, page_size: usize) -> Option<&[u8]> {
        let first = offset / page_size as u64;
        let span = &self.spans[*self.pages.get(&first)?];
        let start = (offset - span.first_page * page_size as u64) as usize;
        span.data.get(start..start.checked_add(size)?)
    }

    /// Copy `[offset, offset + dst.len())` out of however many spans hold it
    fn copy_into(&self, offset: u64, dst: &mut [u8], page_size: usize) -> bool {
        // A range running past the top of the address space is never resident
        if offset.checked_add(dst.len().saturating_sub(1) as u64).is_none() {
            return false;
        }
        let page_bytes = page_size as u64;
        let mut written = 0usize;
        while written < dst.len() {
            let address = offset + written as u64;
            let page = address / page_bytes;
            let Some(&index) = self.pages.get(&page) else {
                return false;
            };
            let span = &self.spans[index];
            let start = (address - span.first_page * page_bytes) as usize;
            let take = (span.data.len() - start).min(dst.len() - written);
            dst[written..written + take].copy_from_slice(&span.data[start..start + take]);
            written += take;
        }
        true
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn drain_into(&mut self, pool: &mut BufferPool) {
        self.pages.clear();
        for span in self.spans.drain(..) {
            pool.give_back(span.data);
        }
    }
}

/// Counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Calls made into the underlying reader
    pub reader_calls: u64,
    /// Pages fetched across all fill passes
    pub pages_fetched: u64,
    /// Generation swaps performed
    pub swaps: u64,
    /// Reader calls that reported an error
    pub read_errors: u64,
}

/// Paged, double-buffered cache over a [`MemoryReader`]
pub struct PagedMemoryCache {
    page_size: usize,
    reader: Option<Box<dyn MemoryReader>>,
    current: Generation,
    previous: Generation,
    /// Pages asked for since the last swap
    requested: BTreeSet<u64>,
    dirty: bool,
    pool: BufferPool,
    stats: CacheStats,
    tracer: Tracer,
}

impl PagedMemoryCache {
    pub fn new(config: &EngineConfig, tracer: Tracer) -> Self {
        debug_assert!(config.page_size.is_power_of_two());
        Self {
            page_size: config.page_size,
            reader: None,
            current: Generation::default(),
            previous: Generation::default(),
            requested: BTreeSet::new(),
            dirty: false,
            pool: BufferPool::new(config.pool_flush_ms),
            stats: CacheStats::default(),
            tracer,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Attach the reader that fill passes pull from
    pub fn attach_reader(&mut self, reader: Box<dyn MemoryReader>) {
        self.reader = Some(reader);
    }

    pub fn detach_reader(&mut self) -> Option<Box<dyn MemoryReader>> {
        self.reader.take()
    }

    pub fn has_reader(&self) -> bool {
        self.reader.is_some()
    }

    /// Page numbers overlapping `[offset, offset + size)`
    fn page_range(&self, offset: u64, size: usize) -> std::ops::RangeInclusive<u64> {
        let page_bytes = self.page_size as u64;
        let last = offset.saturating_add(size as u64 - 1);
        (offset / page_bytes)..=(last / page_bytes)
    }

    fn request(&mut self, offset: u64, size: usize) {
        for page in self.page_range(offset, size) {
            self.requested.insert(page);
        }
    }

    /// Current bytes for a range, or empty if not yet resident
    ///
    /// Every overlapping page is requested for the next fill pass whether or
    /// not it is resident, so pages stay in use across swaps.
    pub fn read(&mut self, offset: u64, size: usize) -> &[u8] {
        if size == 0 {
            return &[];
        }
        self.request(offset, size);
        self.current
            .slice(offset, size, self.page_size)
            .unwrap_or(&[])
    }

    /// Previous-generation bytes for a range, or empty; never requests
    pub fn read_previous(&self, offset: u64, size: usize) -> &[u8] {
        if size == 0 {
            return &[];
        }
        self.previous
            .slice(offset, size, self.page_size)
            .unwrap_or(&[])
    }

    /// Copy current bytes into `dst`, crossing span boundaries if needed
    pub fn read_into(&mut self, offset: u64, dst: &mut [u8]) -> bool {
        if dst.is_empty() {
            return true;
        }
        self.request(offset, dst.len());
        self.current.copy_into(offset, dst, self.page_size)
    }

    /// Copy previous bytes into `dst`; never requests
    pub fn read_previous_into(&self, offset: u64, dst: &mut [u8]) -> bool {
        if dst.is_empty() {
            return true;
        }
        self.previous.copy_into(offset, dst, self.page_size)
    }

    pub fn is_resident(&self, offset: u64) -> bool {
        self.current.is_resident(offset / self.page_size as u64)
    }

    /// Flag that target memory changed; the next `update` swaps
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Per-frame entry: swap and refill when dirty, else top up
    pub fn update(&mut self, now_ms: u64) {
        if self.dirty {
            self.refresh(now_ms);
        } else {
            self.fill_pending();
        }
    }

    /// Swap generations and fetch every requested page
    pub fn refresh(&mut self, now_ms: u64) {
        self.previous.drain_into(&mut self.pool);
        std::mem::swap(&mut self.current, &mut self.previous);
        self.pool.maybe_flush(now_ms);
        self.stats.swaps += 1;
        self.dirty = false;

        let pages: Vec<u64> = std::mem::take(&mut self.requested).into_iter().collect();
        self.tracer.debug(format_args!(
            "swap #{}: refetching {} pages",
            self.stats.swaps,
            pages.len()
        ));
        self.fetch(&pages);
    }

    /// Fetch requested pages missing from `current` without swapping
    pub fn fill_pending(&mut self) {
        let missing: Vec<u64> = self
            .requested
            .iter()
            .copied()
            .filter(|page| !self.current.is_resident(*page))
            .collect();
        if !missing.is_empty() {
            self.fetch(&missing);
        }
    }

    /// Fetch sorted page numbers, one reader call per contiguous run
    fn fetch(&mut self, pages: &[u64]) {
        let Some(reader) = self.reader.as_mut() else {
            return;
        };
        let page_bytes = self.page_size as u64;

        for (first, count) in contiguous_runs(pages) {
            let mut data = self.pool.borrow(count as usize * self.page_size);
            let address = first * page_bytes;
            self.stats.reader_calls += 1;
            match reader.read(address, &mut data) {
                Ok(n) if n < data.len() => {
                    self.tracer.trace(format_args!(
                        "short read at {:#x}: {} of {} bytes",
                        address,
                        n,
                        data.len()
                    ));
                }
                Ok(_) => {}
                Err(e) => {
                    data.fill(0);
                    self.stats.read_errors += 1;
                    self.tracer.debug(format_args!("{}", e));
                }
            }
            self.stats.pages_fetched += count;
            self.current.insert(
                Span {
                    first_page: first,
                    data,
                },
                self.page_size,
            );
        }
    }

    /// Drop both generations and any pending requests
    pub fn clear(&mut self) {
        self.current.drain_into(&mut self.pool);
        self.previous.drain_into(&mut self.pool);
        self.requested.clear();
        self.dirty = false;
    }

    /// Borrow a scratch buffer from the cache's pool
    pub fn borrow_scratch(&mut self, size: usize) -> Vec<u8> {
        self.pool.borrow(size)
    }

    pub fn return_scratch(&mut self, buffer: Vec<u8>) {
        self.pool.give_back(buffer);
    }

    pub fn resident_pages(&self) -> usize {
        self.current.page_count()
    }

    pub fn previous_pages(&self) -> usize {
        self.previous.page_count()
    }

    pub fn requested_pages(&self) -> usize {
        self.requested.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }
}

/// Group sorted page numbers into `(first, count)` runs
fn contiguous_runs(pages: &[u64]) -> Vec<(u64, u64)> {
    let mut runs: Vec<(u64, u64)> = Vec::new();
    for &page in pages {
        match runs.last_mut() {
            Some((first, count)) if *first + *count == page => *count += 1,
            _ => runs.push((page, 1)),
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory::{ImageMemory, MemoryError};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Image reader that logs each call's address and length
    struct LoggingReader {
        image: ImageMemory,
        calls: Rc<RefCell<Vec<(u64, usize)>>>,
    }

    impl MemoryReader for LoggingReader {
        fn read(&mut self, address: u64, buffer: &mut [u8]) -> Result<usize, MemoryError> {
            self.calls.borrow_mut().push((address, buffer.len()));
            self.image.read(address, buffer)
        }
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn setup() -> (PagedMemoryCache, Rc<RefCell<Vec<(u64, usize)>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut cache = PagedMemoryCache::new(&EngineConfig::default(), Tracer::CACHE);
        cache.attach_reader(Box::new(LoggingReader {
            image: ImageMemory::new(0, pattern(64 * 4096)),
            calls: calls.clone(),
        }));
        (cache, calls)
    }

    #[test]
    fn test_contiguous_runs() {
        assert_eq!(contiguous_runs(&[]), vec![]);
        assert_eq!(
            contiguous_runs(&[1, 2, 3, 7, 9, 10]),
            vec![(1, 3), (7, 1), (9, 2)]
        );
    }

    #[test]
    fn test_read_miss_then_resident_after_refresh() {
        let (mut cache, _) = setup();
        assert!(cache.read(0x1010, 8).is_empty());
        assert_eq!(cache.requested_pages(), 1);

        cache.refresh(0);
        assert!(cache.is_resident(0x1010));
        assert_eq!(cache.read(0x1010, 8), &pattern(0x1018)[0x1010..0x1018]);
    }

    #[test]
    fn test_resident_read_is_zero_copy() {
        let (mut cache, _) = setup();
        cache.read(0x2000, 4096);
        cache.refresh(0);

        let whole = cache.read(0x2000, 4096).as_ptr();
        let inner = cache.read(0x2040, 16);
        assert_eq!(inner.as_ptr(), whole.wrapping_add(0x40));
        assert_eq!(inner, &pattern(0x2050)[0x2040..0x2050]);
    }

    #[test]
    fn test_adjacent_pages_coalesce_into_one_call() {
        let (mut cache, calls) = setup();
        cache.read(0x3000, 4);
        cache.read(0x1000, 4);
        cache.read(0x2000, 4);
        cache.read(0x8000, 4);
        cache.refresh(0);

        assert_eq!(*calls.borrow(), vec![(0x1000, 3 * 4096), (0x8000, 4096)]);
        assert_eq!(cache.stats().reader_calls, 2);
        assert_eq!(cache.stats().pages_fetched, 4);

        // A range across the coalesced pages is one contiguous slice
        assert_eq!(cache.read(0x1ff0, 0x20).len(), 0x20);
    }

    #[test]
    fn test_double_refresh_leaves_current_empty() {
        let (mut cache, calls) = setup();
        cache.read(0x1000, 4);
        cache.refresh(0);
        assert_eq!(cache.resident_pages(), 1);

        cache.refresh(0);
        assert_eq!(cache.resident_pages(), 0);
        assert_eq!(cache.previous_pages(), 1);
        assert_eq!(calls.borrow().len(), 1);
        assert_eq!(cache.read_previous(0x1000, 4), &pattern(0x1004)[0x1000..]);
    }

    #[test]
    fn test_read_previous_never_requests() {
        let (mut cache, _) = setup();
        assert!(cache.read_previous(0x5000, 4).is_empty());
        assert_eq!(cache.requested_pages(), 0);
        cache.refresh(0);
        assert_eq!(cache.resident_pages(), 0);
    }

    #[test]
    fn test_fill_pending_tops_up_without_swap() {
        let (mut cache, calls) = setup();
        cache.read(0x1000, 4);
        cache.update(0);
        assert_eq!(cache.stats().swaps, 0);
        assert_eq!(cache.resident_pages(), 1);

        // Resident pages are not fetched again
        cache.read(0x1000, 4);
        cache.read(0x4000, 4);
        cache.update(0);
        assert_eq!(*calls.borrow(), vec![(0x1000, 4096), (0x4000, 4096)]);

        cache.mark_dirty();
        cache.update(0);
        assert_eq!(cache.stats().swaps, 1);
        assert_eq!(cache.previous_pages(), 2);
        assert_eq!(cache.resident_pages(), 2);
    }

    #[test]
    fn test_read_into_crosses_spans() {
        let (mut cache, _) = setup();
        cache.read(0x1000, 4);
        cache.update(0);
        cache.read(0x2000, 4);
        cache.update(0);

        let mut out = [0u8; 32];
        assert!(cache.read_into(0x1ff0, &mut out));
        assert_eq!(&out[..], &pattern(0x2010)[0x1ff0..]);
        // Two separate spans cannot be borrowed as one slice
        assert!(cache.read(0x1ff0, 32).is_empty());
    }

    #[test]
    fn test_swap_returns_buffers_to_pool() {
        let (mut cache, _) = setup();
        cache.read(0x1000, 4);
        cache.refresh(0);
        cache.refresh(0);
        cache.refresh(0);
        assert_eq!(cache.pool().free_count(), 1);

        cache.read(0x7000, 4);
        cache.refresh(0);
        assert_eq!(cache.pool().reused(), 1);
    }

    #[test]
    fn test_no_reader_stays_empty() {
        let mut cache = PagedMemoryCache::new(&EngineConfig::default(), Tracer::CACHE);
        assert!(cache.read(0x1000, 4).is_empty());
        cache.refresh(0);
        assert!(cache.read(0x1000, 4).is_empty());
        assert_eq!(cache.stats().reader_calls, 0);
    }

    #[test]
    fn test_reader_failure_leaves_zeroes() {
        let mut cache = PagedMemoryCache::new(&EngineConfig::default(), Tracer::CACHE);
        cache.attach_reader(Box::new(ImageMemory::new(0x100000, vec![1; 16])));
        cache.read(0x1000, 4);
        cache.refresh(0);
        assert_eq!(cache.read(0x1000, 4), &[0, 0, 0, 0]);
        assert_eq!(cache.stats().read_errors, 1);
    }

    #[test]
    fn test_read_into_past_address_space_end() {
        let (mut cache, _) = setup();
        let top = 0xFFFF_FFFF_FFFF_FFF8u64;
        let mut wide = [0u8; 16];
        assert!(!cache.read_into(top, &mut wide));
        cache.refresh(0);

        // The top page is resident (as zeros) but the range wraps
        assert!(cache.is_resident(top));
        assert!(!cache.read_into(top, &mut wide));
        let mut last = [0xffu8; 8];
        assert!(cache.read_into(top, &mut last));
        assert_eq!(last, [0; 8]);
    }
}
