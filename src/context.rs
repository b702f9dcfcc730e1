//! Execution context: one mutator's heap, stack, and collector, plus the
//! thread-local "current context" slot generated code calls through.
//!
//! There is no separate mutator handle distinct from the context that owns
//! its heap and stack, so one full execution context stands in per thread.
//! The per-thread "current" slot is built on the stable `thread_local!`
//! macro over a `RefCell` rather than the unstable `#[thread_local]`
//! attribute, so no nightly toolchain is required (see `DESIGN.md`).

use crate::collect::Collector;
use crate::error::FatalError;
use crate::globals::{DEFAULT_GC_LATENCY_MS, MAX_BIG_OBJECT_SIZE, MIN_HEAP_SIZE};
use crate::heap::Heap;
use crate::stack::Stack;
use crate::statistics::HeapStatistics;
use crate::value::Value;
use std::cell::RefCell;
use std::time::{Duration, Instant};

thread_local! {
    static CURRENT: RefCell<Option<Context>> = RefCell::new(None);
}

/// Measured once at [`initialize`] and treated as read-only afterward.
pub struct GlobalInfo {
    pub argv: Vec<String>,
    pub ticks_per_ms: f64,
}

thread_local! {
    static GLOBAL: RefCell<Option<GlobalInfo>> = RefCell::new(None);
}

/// Runs a 1ms busy-calibration loop to estimate how many `Instant::now()`
/// polls (our stand-in "cycle") fit in a millisecond, using a portable clock
/// instead of a raw cycle counter (see `DESIGN.md`).
fn calibrate_ticks_per_ms() -> f64 {
    let start = Instant::now();
    let mut ticks: u64 = 0;
    while start.elapsed() < Duration::from_millis(1) {
        ticks += 1;
    }
    (ticks as f64).max(1.0)
}

/// Captures `argv` and performs the one-time clock calibration. Must be
/// called exactly once before any context is created.
///
/// # Panics
/// Panics if called more than once per process.
pub fn initialize(argv: Vec<String>) {
    GLOBAL.with(|cell| {
        let mut slot = cell.borrow_mut();
        assert!(slot.is_none(), "ome runtime is already initialized");
        *slot = Some(GlobalInfo {
            argv,
            ticks_per_ms: calibrate_ticks_per_ms(),
        });
    });
}

/// Installs a minimal `GlobalInfo` for this thread if one isn't already
/// present. Used by test modules in this crate that need a `Context`
/// without going through the full `initialize` entry point.
#[cfg(test)]
pub(crate) fn init_for_tests() {
    GLOBAL.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            *slot = Some(GlobalInfo { argv: vec![], ticks_per_ms: 1.0 });
        }
    });
}

pub struct Context {
    pub heap: Heap,
    pub stack: Stack,
    pub traceback_entries: Vec<u32>,
    collector: Collector,
    latency_ms: f64,
    pub collections_run: usize,
}

impl Context {
    pub fn new(
        initial_heap_size: usize,
        reserved_heap_size: usize,
        stack_capacity: usize,
        traceback_capacity: usize,
    ) -> Result<Context, FatalError> {
        let heap = Heap::new(initial_heap_size, reserved_heap_size)
            .map_err(|_| FatalError::HeapTooSmall { requested: initial_heap_size, minimum: MIN_HEAP_SIZE })?;
        Ok(Context {
            heap,
            stack: Stack::new(stack_capacity, traceback_capacity),
            traceback_entries: Vec::new(),
            collector: Collector::new(),
            latency_ms: DEFAULT_GC_LATENCY_MS,
            collections_run: 0,
        })
    }

    pub fn set_latency_target_ms(&mut self, ms: f64) {
        self.latency_ms = ms;
    }

    fn deadline(&self) -> Instant {
        Instant::now() + Duration::from_secs_f64(self.latency_ms / 1000.0)
    }

    /// Runs one collection cycle against `deadline` (`None` for a full,
    /// deadline-free collect). Exposed for callers that want to drive a
    /// cycle directly rather than through the allocation escalation ladder.
    pub fn run_collection(&mut self, deadline: Option<Instant>) -> crate::collect::CollectOutcome {
        self.collections_run += 1;
        self.collector.collect(&mut self.heap, &mut self.stack, deadline)
    }

    /// Runs one collection cycle bounded by this context's configured
    /// latency target.
    pub fn run_collection_bounded(&mut self) -> crate::collect::CollectOutcome {
        let deadline = self.deadline();
        self.run_collection(Some(deadline))
    }

    /// Runs the allocation-failure escalation ladder until `attempt`
    /// succeeds or every rung is exhausted: retry, incremental collect,
    /// retry, grow the heap if free space is under half, retry, full
    /// collect, retry, then give up.
    fn escalate<T>(
        &mut self,
        mut attempt: impl FnMut(&mut Heap) -> Result<Option<T>, String>,
    ) -> Result<T, FatalError> {
        if let Some(v) = attempt(&mut self.heap).map_err(FatalError::Oversized)? {
            return Ok(v);
        }

        self.collections_run += 1;
        let deadline = self.deadline();
        self.collector.collect(&mut self.heap, &mut self.stack, Some(deadline));
        if let Some(v) = attempt(&mut self.heap).map_err(FatalError::Oversized)? {
            return Ok(v);
        }

        if self.heap.free_bytes() * 2 < self.heap.size() {
            let grown = self.heap.size() * 2;
            if self.heap.resize(grown) {
                if let Some(v) = attempt(&mut self.heap).map_err(FatalError::Oversized)? {
                    return Ok(v);
                }
            }
        }

        self.collections_run += 1;
        self.collector.collect(&mut self.heap, &mut self.stack, None);
        if let Some(v) = attempt(&mut self.heap).map_err(FatalError::Oversized)? {
            return Ok(v);
        }

        Err(FatalError::MemoryExhausted)
    }

    pub fn allocate(&mut self, size: usize, scan_offset: u16, scan_size: u16) -> Result<usize, FatalError> {
        self.escalate(|heap| Ok(heap.try_allocate_inline(size, scan_offset, scan_size)))
    }

    pub fn allocate_big(&mut self, size: usize, scan_offset: u32, scan_size: u32) -> Result<usize, FatalError> {
        if size / crate::globals::WORD_SIZE > MAX_BIG_OBJECT_SIZE {
            return Err(FatalError::BigObjectTooLarge { requested_words: size / crate::globals::WORD_SIZE });
        }
        self.escalate(|heap| heap.try_allocate_big(size, scan_offset, scan_size))
    }

    pub fn push(&mut self, v: Value) -> bool {
        self.stack.push(v)
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    pub fn append_traceback(&mut self, entry_id: u32) {
        let mut entries = std::mem::take(&mut self.traceback_entries);
        self.stack.append_traceback(&mut entries, entry_id);
        self.traceback_entries = entries;
    }

    pub fn traceback(&self) -> &[u32] {
        &self.traceback_entries
    }

    pub fn statistics(&self) -> HeapStatistics {
        HeapStatistics {
            used_bytes: self.heap.used_bytes() as u64,
            free_bytes: self.heap.free_bytes() as u64,
            heap_size: self.heap.size() as u64,
            big_object_bytes: self.heap.big_objects.total_bytes() as u64,
            big_object_count: self.heap.big_objects.len(),
            collections_run: self.collections_run,
        }
    }
}

/// Installs `ctx` as this thread's current context, running `f` with
/// exclusive access to it.
///
/// # Safety
/// Must not be called re-entrantly for the same thread while another call is
/// already on the stack; the caller is trusted to respect single ownership
/// of the installed context.
pub unsafe fn with_context<R>(ctx: Context, f: impl FnOnce(&mut Context) -> R) -> R {
    CURRENT.with(|cell| *cell.borrow_mut() = Some(ctx));
    let result = f(current());
    CURRENT.with(|cell| *cell.borrow_mut() = None);
    result
}

/// Borrows the current thread's context.
///
/// # Safety
/// The caller must ensure a context has been installed via
/// [`with_context`] and is still live on this thread. The returned
/// reference must not outlive that installation.
pub unsafe fn current() -> &'static mut Context {
    CURRENT.with(|cell| {
        let ptr: *mut Option<Context> = cell.as_ptr();
        (*ptr).as_mut().unwrap_unchecked()
    })
}

pub fn current_argv() -> Vec<String> {
    GLOBAL.with(|cell| {
        cell.borrow()
            .as_ref()
            .expect("ome runtime not initialized")
            .argv
            .clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use super::init_for_tests as fresh_global;

    #[test]
    fn allocate_then_collect_reclaims_dead_objects() {
        fresh_global();
        let mut ctx = Context::new(256 * 1024, 1024 * 1024, 16, 16).unwrap();
        for _ in 0..4000 {
            ctx.allocate(16, 0, 2).unwrap();
        }
        let used_before = ctx.heap.used_bytes();
        ctx.collector.collect(&mut ctx.heap, &mut ctx.stack, None);
        assert!(ctx.heap.used_bytes() < used_before);
    }

    #[test]
    fn escalation_grows_heap_within_reservation() {
        fresh_global();
        let mut ctx = Context::new(MIN_HEAP_SIZE, MIN_HEAP_SIZE * 4, 4, 4).unwrap();
        let initial_size = ctx.heap.size();
        for _ in 0..(MIN_HEAP_SIZE / 16) {
            ctx.allocate(16, 0, 0).unwrap();
        }
        assert!(ctx.heap.size() >= initial_size);
    }

    #[test]
    fn oversized_big_object_is_fatal() {
        fresh_global();
        let mut ctx = Context::new(MIN_HEAP_SIZE, MIN_HEAP_SIZE, 4, 4).unwrap();
        let words_over_limit = (MAX_BIG_OBJECT_SIZE + 1) * crate::globals::WORD_SIZE;
        let err = ctx.allocate_big(words_over_limit, 0, 0).unwrap_err();
        assert!(matches!(err, FatalError::BigObjectTooLarge { .. }));
    }
}
