use crate::diag::{self, Fault};
use crate::value::ValType;

/// Per-invocation storage: an operand stack and the local slots.
///
/// Every entry is one 64-bit slot regardless of the logical type it holds.
/// The operand stack is allocated once at the function's static maximum
/// depth and never grows past it; exceeding that depth means the depth
/// computed ahead of execution was wrong, which is a fault.
///
/// A frame is owned by exactly one invocation and dropped when it returns,
/// so nothing else can observe it mid-flight.
pub(crate) struct Frame {
    stack: Vec<u64>,
    max_depth: usize,
    locals: Box<[u64]>,
}

impl Frame {
    /// Create a frame with `local_count` zeroed locals, the first of which
    /// are seeded from `params`.
    pub(crate) fn new(params: &[u64], local_count: usize, max_depth: usize) -> Self {
        let mut locals = vec![0u64; local_count].into_boxed_slice();
        locals[..params.len()].copy_from_slice(params);
        Frame {
            stack: Vec::with_capacity(max_depth),
            max_depth,
            locals,
        }
    }

    /// Current operand stack depth, in slots.
    #[inline(always)]
    pub(crate) fn depth(&self) -> usize {
        self.stack.len()
    }

    // --- Push/pop: raw slots ---

    #[inline(always)]
    pub(crate) fn push(&mut self, slot: u64) {
        if diag::ENABLED && self.stack.len() >= self.max_depth {
            diag::fault(Fault::StackOverflow {
                depth: self.stack.len() + 1,
                max: self.max_depth,
            });
        }
        self.stack.push(slot);
    }

    #[inline(always)]
    pub(crate) fn pop(&mut self) -> u64 {
        match self.stack.pop() {
            Some(slot) => slot,
            None => diag::fault(Fault::StackUnderflow { depth: 0 }),
        }
    }

    /// Pop a slot that must hold a value of type `ty`.
    #[inline(always)]
    pub(crate) fn pop_typed(&mut self, ty: ValType) -> u64 {
        let slot = self.pop();
        diag::check_narrow(slot, ty);
        slot
    }

    /// Top slot without popping.
    #[inline(always)]
    pub(crate) fn peek(&self) -> u64 {
        match self.stack.last() {
            Some(slot) => *slot,
            None => diag::fault(Fault::StackUnderflow { depth: 0 }),
        }
    }

    // --- Typed helpers ---

    #[inline(always)]
    pub(crate) fn pop_i32(&mut self) -> i32 {
        self.pop_typed(ValType::I32) as u32 as i32
    }

    #[inline(always)]
    pub(crate) fn pop_i64(&mut self) -> i64 {
        self.pop() as i64
    }

    #[inline(always)]
    pub(crate) fn pop_f32(&mut self) -> f32 {
        f32::from_bits(self.pop_typed(ValType::F32) as u32)
    }

    #[inline(always)]
    pub(crate) fn pop_f64(&mut self) -> f64 {
        f64::from_bits(self.pop())
    }

    #[inline(always)]
    pub(crate) fn push_i32(&mut self, val: i32) {
        self.push(val as u32 as u64);
    }

    #[inline(always)]
    pub(crate) fn push_i64(&mut self, val: i64) {
        self.push(val as u64);
    }

    #[inline(always)]
    pub(crate) fn push_f32(&mut self, val: f32) {
        self.push(val.to_bits() as u64);
    }

    #[inline(always)]
    pub(crate) fn push_f64(&mut self, val: f64) {
        self.push(val.to_bits());
    }

    #[inline(always)]
    pub(crate) fn push_bool(&mut self, val: bool) {
        self.push(val as u64);
    }

    // --- Locals ---

    #[inline(always)]
    pub(crate) fn local_get(&self, index: u32) -> u64 {
        match self.locals.get(index as usize) {
            Some(slot) => *slot,
            None => diag::fault(Fault::LocalOutOfRange {
                index,
                count: self.locals.len(),
            }),
        }
    }

    #[inline(always)]
    pub(crate) fn local_set(&mut self, index: u32, slot: u64) {
        let count = self.locals.len();
        match self.locals.get_mut(index as usize) {
            Some(dst) => *dst = slot,
            None => diag::fault(Fault::LocalOutOfRange { index, count }),
        }
    }

    /// Move the top `arity` slots down to `height` and drop everything
    /// above them.
    ///
    /// Used when a branch or return leaves a scope: values the scope
    /// pushed below its results are discarded, the results keep their
    /// order.
    pub(crate) fn unwind(&mut self, height: usize, arity: usize) {
        let depth = self.stack.len();
        if depth < height + arity {
            diag::fault(Fault::UnwindBelowEntry {
                height,
                arity,
                depth,
            });
        }
        let results = depth - arity;
        if results > height {
            self.stack.copy_within(results..depth, height);
        }
        self.stack.truncate(height + arity);
    }

    /// Pop `count` slots, returning them bottom-first.
    pub(crate) fn pop_n(&mut self, count: usize) -> Vec<u64> {
        let depth = self.stack.len();
        if depth < count {
            diag::fault(Fault::StackUnderflow { depth });
        }
        self.stack.split_off(depth - count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locals_are_seeded_then_zeroed() {
        let frame = Frame::new(&[7, 9], 4, 4);
        assert_eq!(frame.local_get(0), 7);
        assert_eq!(frame.local_get(1), 9);
        assert_eq!(frame.local_get(2), 0);
        assert_eq!(frame.local_get(3), 0);
    }

    #[test]
    fn unwind_keeps_topmost_results() {
        let mut frame = Frame::new(&[], 0, 8);
        frame.push(100);
        for slot in [1, 2, 3, 4] {
            frame.push(slot);
        }
        frame.unwind(1, 1);
        assert_eq!(frame.depth(), 2);
        assert_eq!(frame.pop(), 4);
        assert_eq!(frame.pop(), 100);
    }

    #[test]
    fn unwind_without_results_truncates() {
        let mut frame = Frame::new(&[], 0, 8);
        frame.push(1);
        frame.push(2);
        frame.unwind(0, 0);
        assert_eq!(frame.depth(), 0);
    }

    #[test]
    fn pop_n_is_bottom_first() {
        let mut frame = Frame::new(&[], 0, 8);
        frame.push(1);
        frame.push(2);
        frame.push(3);
        assert_eq!(frame.pop_n(2), vec![2, 3]);
        assert_eq!(frame.depth(), 1);
    }

    #[test]
    #[should_panic(expected = "operand stack underflow")]
    fn pop_on_empty_stack_faults() {
        let mut frame = Frame::new(&[], 0, 1);
        frame.pop();
    }

    #[test]
    #[cfg(any(debug_assertions, feature = "invariant-checks"))]
    #[should_panic(expected = "operand stack overflow")]
    fn push_past_static_depth_faults() {
        let mut frame = Frame::new(&[], 0, 1);
        frame.push(1);
        frame.push(2);
    }

    #[test]
    #[cfg(any(debug_assertions, feature = "invariant-checks"))]
    #[should_panic(expected = "wider than 32 bits")]
    fn wide_slot_popped_as_i32_faults() {
        let mut frame = Frame::new(&[], 0, 1);
        frame.push(1 << 32);
        frame.pop_i32();
    }

    #[test]
    #[should_panic(expected = "local index 3 out of range")]
    fn local_out_of_range_faults() {
        let mut frame = Frame::new(&[], 2, 1);
        frame.local_set(3, 0);
    }
}
