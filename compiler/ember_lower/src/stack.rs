//! Stack growth for deep source trees.
//!
//! - **Red zone**: 100KB. If less than this remains, the stack grows.
//! - **Growth size**: 1MB per segment.
//!
//! The node budget bounds total work; this only keeps deeply nested (but
//! legal) input from overflowing the thread stack.

#[cfg(not(target_arch = "wasm32"))]
const RED_ZONE: usize = 100 * 1024;

#[cfg(not(target_arch = "wasm32"))]
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, growing the stack first if the red zone has been reached.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// WASM manages its own stack.
#[inline]
#[cfg(target_arch = "wasm32")]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
