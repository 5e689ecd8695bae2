//! Fail-fast checks for internal invariants.
//!
//! A `Fault` means the function handed to the interpreter was not well
//! formed, or the interpreter itself is broken. It is never a program
//! outcome: the invocation is aborted by panicking, and the fault is never
//! turned into a [`Trap`](crate::Trap).
//!
//! Checks on the hot path only run when `ENABLED` is true (debug builds, or
//! release builds with the `invariant-checks` feature). Checks that protect
//! stack structure run unconditionally.

use thiserror::Error;

use crate::value::{LOW_32, ValType};

/// Whether the optional hot-path checks are compiled in.
pub(crate) const ENABLED: bool = cfg!(any(debug_assertions, feature = "invariant-checks"));

/// Internal invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("operand stack underflow at depth {depth}")]
    StackUnderflow { depth: usize },

    #[error("operand stack overflow: depth {depth} exceeds static maximum {max}")]
    StackOverflow { depth: usize, max: usize },

    #[error("expected {ty} value, popped slot {slot:#018x} is wider than 32 bits")]
    WideNarrowSlot { ty: ValType, slot: u64 },

    #[error("unwind to height {height} keeping {arity} values, but only {depth} slots present")]
    UnwindBelowEntry {
        height: usize,
        arity: usize,
        depth: usize,
    },

    #[error("branch escaped the function body with {depth} scopes left")]
    UnresolvedBranch { depth: u32 },

    #[error("branch resolved to label {found}, expected label {expected}")]
    LabelMismatch { expected: u32, found: u32 },

    #[error("local index {index} out of range for {count} locals")]
    LocalOutOfRange { index: u32, count: usize },

    #[error("function left {depth} slots on exit, declared result arity is {arity}")]
    ResultArity { depth: usize, arity: usize },

    #[error("function {func} has no body")]
    MissingFunction { func: u32 },
}

/// Abort the current invocation.
#[cold]
#[inline(never)]
#[track_caller]
pub(crate) fn fault(fault: Fault) -> ! {
    tracing::error!(%fault, "internal invariant violated");
    panic!("internal invariant violated: {fault}");
}

/// A narrow slot must have a clean high half when it is consumed.
#[inline(always)]
#[track_caller]
pub(crate) fn check_narrow(slot: u64, ty: ValType) {
    if ENABLED && ty.is_narrow() && slot & !LOW_32 != 0 {
        fault(Fault::WideNarrowSlot { ty, slot });
    }
}
