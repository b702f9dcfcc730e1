//! Traceback table and printing.
//!
//! The table itself is produced by code generation and handed to the runtime
//! as a flat, immutable array indexed by the 32-bit IDs
//! [`crate::stack::Stack::append_traceback`] records. Printing walks the
//! context's traceback entries newest-first, the way a stack unwind reads.

use crate::value::{self, Value};
use is_terminal::IsTerminal;
use std::io::Write;

#[derive(Clone, Debug)]
pub struct TracebackEntry {
    pub stream_name: &'static str,
    pub line_number: u32,
    pub method_name: &'static str,
    pub source_line: &'static str,
    pub column: u32,
    pub underline: u32,
}

/// Immutable, codegen-provided array indexed by the IDs recorded via
/// `append_traceback`.
pub struct TracebackTable {
    entries: Vec<TracebackEntry>,
}

impl TracebackTable {
    pub fn new(entries: Vec<TracebackEntry>) -> Self {
        TracebackTable { entries }
    }

    pub fn get(&self, id: u32) -> Option<&TracebackEntry> {
        self.entries.get(id as usize)
    }
}

const RED: &str = "\x1b[31m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Walks `recorded` newest-first, emitting one line per entry, then the
/// stripped error value. ANSI coloring is applied only when `out` is a
/// terminal.
pub fn print_traceback(
    out: &mut impl Write,
    is_tty: bool,
    table: &TracebackTable,
    recorded: &[u32],
    error: Value,
) -> std::io::Result<()> {
    for &id in recorded.iter().rev() {
        let Some(entry) = table.get(id) else { continue };
        if is_tty {
            writeln!(
                out,
                "  {}at{} {}:{}:{} in {}{}{}",
                DIM, RESET, entry.stream_name, entry.line_number, entry.column, RED, entry.method_name, RESET
            )?;
        } else {
            writeln!(
                out,
                "  at {}:{}:{} in {}",
                entry.stream_name, entry.line_number, entry.column, entry.method_name
            )?;
        }
        writeln!(out, "    {}", entry.source_line)?;
    }

    let stripped = value::strip_error(error);
    let kind = value::error_kind(error);
    match kind {
        Some(kind) => {
            if is_tty {
                writeln!(out, "{}error: {}{}", RED, kind, RESET)
            } else {
                writeln!(out, "error: {}", kind)
            }
        }
        None => writeln!(out, "error: {:?}", stripped),
    }
}

/// Convenience wrapper that detects terminal output for the caller.
pub fn print_traceback_auto(
    out: &mut (impl Write + IsTerminal),
    table: &TracebackTable,
    recorded: &[u32],
    error: Value,
) -> std::io::Result<()> {
    let is_tty = out.is_terminal();
    print_traceback(out, is_tty, table, recorded, error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ErrorKind;

    fn sample_table() -> TracebackTable {
        TracebackTable::new(vec![
            TracebackEntry {
                stream_name: "main.ome",
                line_number: 10,
                method_name: "foo",
                source_line: "    1 / 0",
                column: 4,
                underline: 3,
            },
            TracebackEntry {
                stream_name: "main.ome",
                line_number: 20,
                method_name: "bar",
                source_line: "    foo()",
                column: 4,
                underline: 5,
            },
        ])
    }

    #[test]
    fn prints_entries_newest_first_without_color() {
        let table = TracebackTable::new(vec![
            TracebackEntry { stream_name: "a.ome", line_number: 1, method_name: "one", source_line: "x", column: 0, underline: 0 },
            TracebackEntry { stream_name: "a.ome", line_number: 2, method_name: "two", source_line: "y", column: 0, underline: 0 },
        ]);
        let recorded = [0u32, 1u32];
        let mut out = Vec::new();
        print_traceback(&mut out, false, &table, &recorded, value::error(ErrorKind::DivideByZero)).unwrap();
        let text = String::from_utf8(out).unwrap();
        let two_pos = text.find("two").unwrap();
        let one_pos = text.find("one").unwrap();
        assert!(two_pos < one_pos, "newest entry (id 1) must print first");
        assert!(text.contains("divide-by-zero"));
    }

    #[test]
    fn missing_entry_id_is_skipped() {
        let table = sample_table();
        let mut out = Vec::new();
        print_traceback(&mut out, false, &table, &[42], value::error(ErrorKind::TypeError)).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("type-error"));
    }
}
