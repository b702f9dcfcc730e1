//! Tunable constants shared across the heap, allocator and collector.

pub const WORD_SIZE: usize = core::mem::size_of::<usize>();
pub const HEADER_SIZE: usize = core::mem::size_of::<crate::header::Header>();
/// Every object body starts on a 16-byte boundary; a "slot" is one such unit.
pub const HEAP_ALIGNMENT: usize = 16;
pub const SLOT_SIZE: usize = HEAP_ALIGNMENT;

/// Objects whose requested body size, in words, is at or above this
/// threshold are routed to the big-object table instead of the inline heap.
pub const MAX_HEAP_OBJECT_SIZE: usize = 1024;

/// A big-object request above this many words is a fatal, unrecoverable
/// condition (distinct from ordinary allocation failure).
pub const MAX_BIG_OBJECT_SIZE: usize = 1 << 28;

/// Heap reservations smaller than this are rejected at startup.
pub const MIN_HEAP_SIZE: usize = 64 * 1024;

/// One [`crate::relocation::Relocation`] is budgeted per this many bytes of
/// usable heap.
pub const RELOCATION_GRANULARITY: usize = 32;

/// Default collector latency target, in milliseconds, used to derive the
/// per-cycle tick deadline.
pub const DEFAULT_GC_LATENCY_MS: f64 = 50.0;

/// Maximum aggregate byte size (e.g. for `concat`) before a `SizeError` is
/// raised instead of performing the operation.
pub const MAX_AGGREGATE_BYTES: u64 = u32::MAX as u64;
