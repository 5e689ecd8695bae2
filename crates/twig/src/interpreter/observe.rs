//! Instrumentation hooks called by the interpreter.

use std::collections::HashMap;

use crate::code::{FuncIdx, LabelIdx};

/// Receives execution events. Every method defaults to doing nothing, and
/// the interpreter is generic over the observer, so [`NoopObserver`] costs
/// nothing at run time.
pub trait Observer {
    /// A function body is about to run.
    fn call_entered(&mut self, _func: FuncIdx) {}

    /// A loop body is about to run, on first entry and on every back-edge.
    fn loop_entered(&mut self, _func: FuncIdx, _label: LabelIdx) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Counts calls and loop-body entries.
#[derive(Debug, Default, Clone)]
pub struct LoopCounter {
    loops: HashMap<(FuncIdx, LabelIdx), u64>,
    calls: HashMap<FuncIdx, u64>,
}

impl LoopCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loop_entries(&self, func: FuncIdx, label: LabelIdx) -> u64 {
        self.loops.get(&(func, label)).copied().unwrap_or(0)
    }

    pub fn total_loop_entries(&self) -> u64 {
        self.loops.values().sum()
    }

    pub fn calls(&self, func: FuncIdx) -> u64 {
        self.calls.get(&func).copied().unwrap_or(0)
    }

    /// Per-loop counts, ordered by function then label.
    pub fn loops(&self) -> Vec<(FuncIdx, LabelIdx, u64)> {
        let mut loops: Vec<_> = self
            .loops
            .iter()
            .map(|(&(func, label), &count)| (func, label, count))
            .collect();
        loops.sort();
        loops
    }
}

impl Observer for LoopCounter {
    fn call_entered(&mut self, func: FuncIdx) {
        *self.calls.entry(func).or_default() += 1;
    }

    fn loop_entered(&mut self, func: FuncIdx, label: LabelIdx) {
        *self.loops.entry((func, label)).or_default() += 1;
    }
}
