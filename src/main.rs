//! Process entry point: `initialize`/`thread_main`, demonstrated against a
//! small hand-built cons-list program rather than codegen output, which is
//! out of scope here. Builds a small rooted structure, forces a collection,
//! and prints the result — the smallest program that exercises allocation,
//! rooting, and collection end to end.

use ome_heap::{abi, context, globals, traceback::TracebackTable, value};

const INITIAL_HEAP_SIZE: usize = 1024 * 1024;
const RESERVED_HEAP_SIZE: usize = 16 * 1024 * 1024;
const STACK_CAPACITY: usize = 4096;
const TRACEBACK_CAPACITY: usize = 256;

/// Builds a 10-element list of small integers, sums it by walking the chain,
/// and returns the sum tagged as a small integer, or an error value if
/// anything along the way produced one. Stands in for the generated `main`
/// method `thread_main` would otherwise invoke.
fn run_toplevel() -> value::Value {
    let mut head = value::empty();
    for i in (1..=10i64).rev() {
        let cell = abi::allocate(2 * globals::WORD_SIZE, 0, 2);
        let body = abi::untag_pointer(cell);
        unsafe {
            *(body as *mut value::Value) = value::tag_integer(i);
            *((body + globals::WORD_SIZE) as *mut value::Value) = head;
        }
        head = cell;
    }

    let ctx = unsafe { context::current() };
    ctx.push(head);
    ctx.run_collection_bounded();
    let head = ctx.pop().unwrap();

    let mut node = head;
    let mut sum = value::tag_integer(0);
    while !value::is_empty(node) {
        let body = abi::untag_pointer(node);
        let car = unsafe { *(body as *const value::Value) };
        let cdr = unsafe { *((body + globals::WORD_SIZE) as *const value::Value) };
        sum = abi::add(sum, car);
        if value::is_error(sum) {
            return sum;
        }
        node = cdr;
    }
    sum
}

/// Runs the toplevel inside a fresh context, reporting a traceback and
/// optionally statistics the way a generated program's entry point would.
fn thread_main(print_stats: bool) -> i32 {
    let ctx = match context::Context::new(
        INITIAL_HEAP_SIZE,
        RESERVED_HEAP_SIZE,
        STACK_CAPACITY,
        TRACEBACK_CAPACITY,
    ) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("{}", err);
            return 1;
        }
    };

    let (result, stats) = unsafe {
        context::with_context(ctx, |ctx| {
            let result = run_toplevel();
            if value::is_error(result) {
                let table = TracebackTable::new(Vec::new());
                abi::print_traceback(abi::Stream::Stderr, &table, result);
            }
            (result, ctx.statistics())
        })
    };

    if value::is_error(result) {
        return 1;
    }

    abi::print(abi::Stream::Stdout, result);
    if print_stats {
        println!("{}", stats);
    }
    0
}

fn main() {
    context::initialize(std::env::args().collect());
    let print_stats = context::current_argv().iter().any(|a| a == "--stats");
    std::process::exit(thread_main(print_stats));
}
