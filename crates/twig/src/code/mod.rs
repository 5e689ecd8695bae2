//! Static, invocation-independent metadata for a function body.

use std::fmt;

use crate::value::ValType;

/// Index into the module's function list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncIdx(pub(crate) u32);

impl FuncIdx {
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FuncIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "func#{}", self.0)
    }
}

/// Index into a function's label table.
///
/// Label 0 is always the function body itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelIdx(pub(crate) u32);

impl LabelIdx {
    pub const FUNCTION: LabelIdx = LabelIdx(0);

    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for LabelIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "label#{}", self.0)
    }
}

/// A function signature: parameters and at most one result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncType {
    params: Box<[ValType]>,
    result: Option<ValType>,
}

impl FuncType {
    pub fn new(params: impl Into<Box<[ValType]>>, result: Option<ValType>) -> Self {
        FuncType {
            params: params.into(),
            result,
        }
    }

    pub fn params(&self) -> &[ValType] {
        &self.params
    }

    pub fn result(&self) -> Option<ValType> {
        self.result
    }

    /// Number of result slots (0 or 1).
    pub fn result_arity(&self) -> usize {
        self.result.is_some() as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    /// Implicit function-level block. Branching here returns.
    Function,
    Block,
    Loop,
    If,
}

/// A branch target, resolved when the body is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label {
    pub kind: LabelKind,
    /// Type produced when the scope completes normally.
    pub result: Option<ValType>,
}

impl Label {
    /// Slots carried by a branch to this label.
    ///
    /// A loop's label sits at its start, and loops take no parameters,
    /// so branching back carries nothing.
    #[inline(always)]
    pub fn branch_arity(&self) -> usize {
        match self.kind {
            LabelKind::Loop => 0,
            _ => self.result.is_some() as usize,
        }
    }
}

/// Immutable per-function layout shared by every invocation.
#[derive(Debug, Clone)]
pub struct CodeEntry {
    pub(crate) func: FuncIdx,
    pub(crate) ty: FuncType,
    /// Parameters followed by declared locals.
    pub(crate) locals: Box<[ValType]>,
    pub(crate) labels: Box<[Label]>,
    /// Deepest operand stack the body can reach, in slots.
    pub(crate) max_stack_depth: usize,
    /// Deepest block/loop/if nesting in the body.
    pub(crate) max_nesting: u32,
}

impl CodeEntry {
    pub fn func(&self) -> FuncIdx {
        self.func
    }

    pub fn ty(&self) -> &FuncType {
        &self.ty
    }

    pub fn result(&self) -> Option<ValType> {
        self.ty.result
    }

    pub fn param_count(&self) -> usize {
        self.ty.params.len()
    }

    pub fn locals(&self) -> &[ValType] {
        &self.locals
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    #[inline(always)]
    pub fn label(&self, idx: LabelIdx) -> &Label {
        &self.labels[idx.0 as usize]
    }

    pub fn max_stack_depth(&self) -> usize {
        self.max_stack_depth
    }

    pub fn max_nesting(&self) -> u32 {
        self.max_nesting
    }
}
