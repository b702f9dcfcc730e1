//! The runtime ABI surface consumed by generated code: a flat set of free
//! functions called directly rather than through a trait object or vtable.

use crate::context::{self, Context};
use crate::error::FatalError;
use crate::globals::{MAX_AGGREGATE_BYTES, MAX_HEAP_OBJECT_SIZE, WORD_SIZE};
use crate::traceback::TracebackTable;
use crate::value::{self, ErrorKind, Tag, Value};
use std::io::Write;

fn fatal(err: FatalError) -> ! {
    eprintln!("{}", err);
    std::process::exit(1);
}

fn ctx() -> &'static mut Context {
    unsafe { context::current() }
}

/// Primary allocator: `size` bytes for the body, `scan_offset`/`scan_size`
/// in words describing the reference region. Requests at or above
/// `MAX_HEAP_OBJECT_SIZE` words are routed to the big-object table instead of
/// the inline heap, transparently to the caller. Exits the process on
/// unrecoverable exhaustion rather than returning an error value, since
/// out-of-memory here is a fatal condition, not a recoverable error value.
pub fn allocate(size: usize, scan_offset: u16, scan_size: u16) -> Value {
    if size / WORD_SIZE > MAX_HEAP_OBJECT_SIZE {
        return match ctx().allocate_big(size, scan_offset as u32, scan_size as u32) {
            Ok(body) => value::tag_pointer(Tag::Big, body),
            Err(e) => fatal(e),
        };
    }
    match ctx().allocate(size, scan_offset, scan_size) {
        Ok(body) => value::tag_pointer(Tag::Heap, body),
        Err(e) => fatal(e),
    }
}

fn round_up_words(bytes: usize) -> usize {
    (bytes + WORD_SIZE - 1) / WORD_SIZE * WORD_SIZE
}

/// Allocates `size` bytes with no reference region (raw payload data).
pub fn allocate_data(size: usize) -> Value {
    allocate(round_up_words(size), 0, 0)
}

/// Allocates `n` consecutive reference slots, all scannable.
pub fn allocate_slots(n: usize) -> Value {
    allocate(n * WORD_SIZE, 0, n as u16)
}

/// Allocates an array of `n` reference slots prefixed by a length word.
pub fn allocate_array(n: usize) -> Value {
    let v = allocate((n + 1) * WORD_SIZE, 1, n as u16);
    let body = value::untag_pointer(v);
    unsafe {
        *(body as *mut Value) = value::tag_integer(n as i64);
    }
    v
}

pub fn array_length(v: Value) -> usize {
    let body = value::untag_pointer(v);
    let len = unsafe { *(body as *const Value) };
    value::untag_signed(len) as usize
}

pub fn array_get(v: Value, index: usize) -> Value {
    let body = value::untag_pointer(v);
    unsafe { *((body + (1 + index) * WORD_SIZE) as *const Value) }
}

pub fn array_set(v: Value, index: usize, element: Value) {
    let body = value::untag_pointer(v);
    unsafe {
        *((body + (1 + index) * WORD_SIZE) as *mut Value) = element;
    }
}

/// Allocates a byte string of `n` bytes, prefixed by a length word. Strings
/// hold no references and are never scanned.
pub fn allocate_string(bytes: &[u8]) -> Value {
    let n = bytes.len();
    let v = allocate_data(WORD_SIZE + n);
    let body = value::untag_pointer(v);
    unsafe {
        *(body as *mut usize) = n;
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), (body + WORD_SIZE) as *mut u8, n);
    }
    v
}

pub fn string_bytes(v: Value) -> &'static [u8] {
    let body = value::untag_pointer(v);
    unsafe {
        let len = *(body as *const usize);
        std::slice::from_raw_parts((body + WORD_SIZE) as *const u8, len)
    }
}

pub fn push_frame(slot_count: usize) -> bool {
    ctx().stack.push_frame(slot_count)
}

pub fn pop_frame(slot_count: usize) {
    ctx().stack.pop_frame(slot_count)
}

pub fn append_traceback(entry_id: u32) {
    ctx().append_traceback(entry_id);
}

pub fn reset_traceback() {
    let c = ctx();
    let mut entries = std::mem::take(&mut c.traceback_entries);
    c.stack.reset_traceback(&mut entries);
    c.traceback_entries = entries;
}

pub use crate::value::{boolean, error, is_error, strip_error, tag_integer, untag_signed};

#[inline(always)]
pub fn tag_pointer(addr: usize) -> Value {
    value::tag_pointer(Tag::Heap, addr)
}

#[inline(always)]
pub fn untag_pointer(v: Value) -> usize {
    value::untag_pointer(v)
}

#[inline(always)]
pub fn get_tag(v: Value) -> u8 {
    value::tag(v) as u8
}

#[derive(Clone, Copy)]
pub enum Stream {
    Stdout,
    Stderr,
}

fn format_value(v: Value) -> String {
    match value::tag(v) {
        Tag::SmallInteger => value::untag_signed(v).to_string(),
        Tag::Constant => {
            if value::is_true(v) {
                "true".to_string()
            } else if value::is_empty(v) {
                "()".to_string()
            } else if value::is_error(v) {
                format!("#<error {}>", value::error_kind(v).unwrap())
            } else {
                "false".to_string()
            }
        }
        Tag::Heap | Tag::Big => format!("#<object 0x{:x}>", value::untag_pointer(v)),
    }
}

pub fn print(stream: Stream, v: Value) {
    let text = format_value(v);
    match stream {
        Stream::Stdout => {
            let _ = writeln!(std::io::stdout(), "{}", text);
        }
        Stream::Stderr => {
            let _ = writeln!(std::io::stderr(), "{}", text);
        }
    }
}

pub fn print_traceback(stream: Stream, table: &TracebackTable, error_value: Value) {
    let entries = ctx().traceback().to_vec();
    let result = match stream {
        Stream::Stdout => {
            crate::traceback::print_traceback_auto(&mut std::io::stdout(), table, &entries, error_value)
        }
        Stream::Stderr => {
            crate::traceback::print_traceback_auto(&mut std::io::stderr(), table, &entries, error_value)
        }
    };
    let _ = result;
}

/// Concatenates the byte strings in `values`, raising `SizeError` rather
/// than allocating if the combined length would exceed
/// [`crate::globals::MAX_AGGREGATE_BYTES`].
pub fn concat(values: &[Value]) -> Value {
    let mut total: u64 = 0;
    for &v in values {
        total += string_bytes(v).len() as u64;
        if total > MAX_AGGREGATE_BYTES {
            return value::error(ErrorKind::SizeError);
        }
    }
    let mut combined = Vec::with_capacity(total as usize);
    for &v in values {
        combined.extend_from_slice(string_bytes(v));
    }
    allocate_string(&combined)
}

fn as_small_integer(v: Value) -> Result<i64, Value> {
    if value::tag(v) == Tag::SmallInteger {
        Ok(value::untag_signed(v))
    } else {
        Err(value::error(ErrorKind::TypeError))
    }
}

fn checked_integer(n: i64) -> Value {
    if n < value::MIN_SMALL_INTEGER || n > value::MAX_SMALL_INTEGER {
        value::error(ErrorKind::Overflow)
    } else {
        value::tag_integer(n)
    }
}

pub fn add(a: Value, b: Value) -> Value {
    match (as_small_integer(a), as_small_integer(b)) {
        (Ok(a), Ok(b)) => match a.checked_add(b) {
            Some(n) => checked_integer(n),
            None => value::error(ErrorKind::Overflow),
        },
        _ => value::error(ErrorKind::TypeError),
    }
}

pub fn sub(a: Value, b: Value) -> Value {
    match (as_small_integer(a), as_small_integer(b)) {
        (Ok(a), Ok(b)) => match a.checked_sub(b) {
            Some(n) => checked_integer(n),
            None => value::error(ErrorKind::Overflow),
        },
        _ => value::error(ErrorKind::TypeError),
    }
}

pub fn mul(a: Value, b: Value) -> Value {
    match (as_small_integer(a), as_small_integer(b)) {
        (Ok(a), Ok(b)) => match a.checked_mul(b) {
            Some(n) => checked_integer(n),
            None => value::error(ErrorKind::Overflow),
        },
        _ => value::error(ErrorKind::TypeError),
    }
}

pub fn div(a: Value, b: Value) -> Value {
    match (as_small_integer(a), as_small_integer(b)) {
        (Ok(_), Ok(0)) => value::error(ErrorKind::DivideByZero),
        (Ok(a), Ok(b)) => match a.checked_div(b) {
            Some(n) => checked_integer(n),
            None => value::error(ErrorKind::Overflow),
        },
        _ => value::error(ErrorKind::TypeError),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_ctx(f: impl FnOnce()) {
        context::init_for_tests();
        let c = Context::new(256 * 1024, 1024 * 1024, 64, 64).unwrap();
        unsafe {
            context::with_context(c, |_| f());
        }
    }

    #[test]
    fn arithmetic_overflow_divide_by_zero_and_type_error() {
        let max = tag_integer(value::MAX_SMALL_INTEGER);
        let one = tag_integer(1);
        assert!(is_error(add(max, one)));
        assert_eq!(value::error_kind(add(max, one)), Some(ErrorKind::Overflow));

        assert!(is_error(div(one, tag_integer(0))));
        assert_eq!(value::error_kind(div(one, tag_integer(0))), Some(ErrorKind::DivideByZero));

        assert!(is_error(add(one, boolean(true))));
        assert_eq!(value::error_kind(add(one, boolean(true))), Some(ErrorKind::TypeError));

        assert_eq!(add(tag_integer(2), tag_integer(3)), tag_integer(5));
    }

    #[test]
    fn array_roundtrip() {
        with_ctx(|| {
            let arr = allocate_array(4);
            for i in 0..4 {
                array_set(arr, i, tag_integer(i as i64 * 10));
            }
            assert_eq!(array_length(arr), 4);
            for i in 0..4 {
                assert_eq!(untag_signed(array_get(arr, i)), i as i64 * 10);
            }
        });
    }

    #[test]
    fn oversized_request_is_routed_to_the_big_object_table() {
        with_ctx(|| {
            let huge = allocate((MAX_HEAP_OBJECT_SIZE + 1) * WORD_SIZE, 0, 0);
            assert_eq!(get_tag(huge), Tag::Big as u8);
        });
    }

    #[test]
    fn string_concat_respects_size_limit() {
        with_ctx(|| {
            let a = allocate_string(b"hello ");
            let b = allocate_string(b"world");
            let combined = concat(&[a, b]);
            assert_eq!(string_bytes(combined), b"hello world");
        });
    }
}
