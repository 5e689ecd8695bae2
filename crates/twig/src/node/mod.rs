//! The control-flow tree a function body is executed as.
//!
//! A body is a `Node::Block` with the function label. Scopes own their
//! children; branch targets are relative nesting depths counted outward
//! from the branch site, with 0 naming the innermost enclosing scope.

pub(crate) mod numeric;

use crate::code::{FuncIdx, LabelIdx};
use crate::value::ValType;

/// One node of a function's control-flow tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Nop,
    Unreachable,

    // --- Structured control ---
    Block {
        label: LabelIdx,
        body: Box<[Node]>,
    },
    Loop {
        label: LabelIdx,
        body: Box<[Node]>,
    },
    /// Pops an i32 condition. A missing `else` is an empty sequence.
    If {
        label: LabelIdx,
        then: Box<[Node]>,
        otherwise: Box<[Node]>,
    },

    // --- Branches ---
    Br(BrTarget),
    /// Pops an i32 predicate; branches when it is nonzero.
    BrIf(BrTarget),
    /// Pops an i32 index into `targets`; out of range takes `default`.
    BrTable {
        targets: Box<[BrTarget]>,
        default: BrTarget,
    },
    Return,

    Call(FuncIdx),

    // --- Parametric ---
    Drop,
    /// Pops an i32 condition, then two operands of the same type.
    Select,

    // --- Locals ---
    LocalGet(u32),
    LocalSet(u32),
    LocalTee(u32),

    // --- Constants, stored pre-encoded ---
    Const { ty: ValType, slot: u64 },

    /// Arithmetic, comparison and conversion leaves.
    Num(NumOp),
}

/// A branch destination: a relative nesting depth plus the label it was
/// resolved to when the body was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrTarget {
    pub depth: u32,
    pub label: LabelIdx,
}

impl Node {
    pub fn i32_const(v: i32) -> Node {
        Node::Const {
            ty: ValType::I32,
            slot: v as u32 as u64,
        }
    }

    pub fn i64_const(v: i64) -> Node {
        Node::Const {
            ty: ValType::I64,
            slot: v as u64,
        }
    }

    pub fn f32_const(v: f32) -> Node {
        Node::Const {
            ty: ValType::F32,
            slot: v.to_bits() as u64,
        }
    }

    pub fn f64_const(v: f64) -> Node {
        Node::Const {
            ty: ValType::F64,
            slot: v.to_bits(),
        }
    }
}

/// Numeric leaf instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumOp {
    // --- i32 ---
    I32Eqz,
    I32Eq,
    I32Ne,
    I32LtS,
    I32LtU,
    I32GtS,
    I32GtU,
    I32LeS,
    I32LeU,
    I32GeS,
    I32GeU,
    I32Clz,
    I32Ctz,
    I32Popcnt,
    I32Add,
    I32Sub,
    I32Mul,
    I32DivS,
    I32DivU,
    I32RemS,
    I32RemU,
    I32And,
    I32Or,
    I32Xor,
    I32Shl,
    I32ShrS,
    I32ShrU,
    I32Rotl,
    I32Rotr,

    // --- i64 ---
    I64Eqz,
    I64Eq,
    I64Ne,
    I64LtS,
    I64LtU,
    I64GtS,
    I64GtU,
    I64LeS,
    I64LeU,
    I64GeS,
    I64GeU,
    I64Clz,
    I64Ctz,
    I64Popcnt,
    I64Add,
    I64Sub,
    I64Mul,
    I64DivS,
    I64DivU,
    I64RemS,
    I64RemU,
    I64And,
    I64Or,
    I64Xor,
    I64Shl,
    I64ShrS,
    I64ShrU,
    I64Rotl,
    I64Rotr,

    // --- f32 ---
    F32Eq,
    F32Ne,
    F32Lt,
    F32Gt,
    F32Le,
    F32Ge,
    F32Abs,
    F32Neg,
    F32Ceil,
    F32Floor,
    F32Trunc,
    F32Nearest,
    F32Sqrt,
    F32Add,
    F32Sub,
    F32Mul,
    F32Div,
    F32Min,
    F32Max,
    F32Copysign,

    // --- f64 ---
    F64Eq,
    F64Ne,
    F64Lt,
    F64Gt,
    F64Le,
    F64Ge,
    F64Abs,
    F64Neg,
    F64Ceil,
    F64Floor,
    F64Trunc,
    F64Nearest,
    F64Sqrt,
    F64Add,
    F64Sub,
    F64Mul,
    F64Div,
    F64Min,
    F64Max,
    F64Copysign,

    // --- Conversions ---
    I32WrapI64,
    I32TruncF32S,
    I32TruncF32U,
    I32TruncF64S,
    I32TruncF64U,
    I64ExtendI32S,
    I64ExtendI32U,
    I64TruncF32S,
    I64TruncF32U,
    I64TruncF64S,
    I64TruncF64U,
    F32ConvertI32S,
    F32ConvertI32U,
    F32ConvertI64S,
    F32ConvertI64U,
    F32DemoteF64,
    F64ConvertI32S,
    F64ConvertI32U,
    F64ConvertI64S,
    F64ConvertI64U,
    F64PromoteF32,
    I32ReinterpretF32,
    I64ReinterpretF64,
    F32ReinterpretI32,
    F64ReinterpretI64,

    // --- Sign extension ---
    I32Extend8S,
    I32Extend16S,
    I64Extend8S,
    I64Extend16S,
    I64Extend32S,

    // --- Saturating truncation ---
    I32TruncSatF32S,
    I32TruncSatF32U,
    I32TruncSatF64S,
    I32TruncSatF64U,
    I64TruncSatF32S,
    I64TruncSatF32U,
    I64TruncSatF64S,
    I64TruncSatF64U,
}

/// Operand types (bottom first) and result type of a numeric leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumSig {
    pub operands: &'static [ValType],
    pub result: ValType,
}

const fn sig(operands: &'static [ValType], result: ValType) -> NumSig {
    NumSig { operands, result }
}

impl NumOp {
    pub fn signature(self) -> NumSig {
        use NumOp::*;
        use ValType::{F32, F64, I32, I64};
        match self {
            I32Eqz => sig(&[I32], I32),
            I32Eq | I32Ne | I32LtS | I32LtU | I32GtS | I32GtU | I32LeS | I32LeU | I32GeS
            | I32GeU => sig(&[I32, I32], I32),
            I32Clz | I32Ctz | I32Popcnt | I32Extend8S | I32Extend16S => sig(&[I32], I32),
            I32Add | I32Sub | I32Mul | I32DivS | I32DivU | I32RemS | I32RemU | I32And | I32Or
            | I32Xor | I32Shl | I32ShrS | I32ShrU | I32Rotl | I32Rotr => sig(&[I32, I32], I32),

            I64Eqz => sig(&[I64], I32),
            I64Eq | I64Ne | I64LtS | I64LtU | I64GtS | I64GtU | I64LeS | I64LeU | I64GeS
            | I64GeU => sig(&[I64, I64], I32),
            I64Clz | I64Ctz | I64Popcnt | I64Extend8S | I64Extend16S | I64Extend32S => {
                sig(&[I64], I64)
            }
            I64Add | I64Sub | I64Mul | I64DivS | I64DivU | I64RemS | I64RemU | I64And | I64Or
            | I64Xor | I64Shl | I64ShrS | I64ShrU | I64Rotl | I64Rotr => sig(&[I64, I64], I64),

            F32Eq | F32Ne | F32Lt | F32Gt | F32Le | F32Ge => sig(&[F32, F32], I32),
            F32Abs | F32Neg | F32Ceil | F32Floor | F32Trunc | F32Nearest | F32Sqrt => {
                sig(&[F32], F32)
            }
            F32Add | F32Sub | F32Mul | F32Div | F32Min | F32Max | F32Copysign => {
                sig(&[F32, F32], F32)
            }

            F64Eq | F64Ne | F64Lt | F64Gt | F64Le | F64Ge => sig(&[F64, F64], I32),
            F64Abs | F64Neg | F64Ceil | F64Floor | F64Trunc | F64Nearest | F64Sqrt => {
                sig(&[F64], F64)
            }
            F64Add | F64Sub | F64Mul | F64Div | F64Min | F64Max | F64Copysign => {
                sig(&[F64, F64], F64)
            }

            I32WrapI64 => sig(&[I64], I32),
            I32TruncF32S | I32TruncF32U | I32TruncSatF32S | I32TruncSatF32U => sig(&[F32], I32),
            I32TruncF64S | I32TruncF64U | I32TruncSatF64S | I32TruncSatF64U => sig(&[F64], I32),
            I64ExtendI32S | I64ExtendI32U => sig(&[I32], I64),
            I64TruncF32S | I64TruncF32U | I64TruncSatF32S | I64TruncSatF32U => sig(&[F32], I64),
            I64TruncF64S | I64TruncF64U | I64TruncSatF64S | I64TruncSatF64U => sig(&[F64], I64),
            F32ConvertI32S | F32ConvertI32U => sig(&[I32], F32),
            F32ConvertI64S | F32ConvertI64U => sig(&[I64], F32),
            F32DemoteF64 => sig(&[F64], F32),
            F64ConvertI32S | F64ConvertI32U => sig(&[I32], F64),
            F64ConvertI64S | F64ConvertI64U => sig(&[I64], F64),
            F64PromoteF32 => sig(&[F32], F64),
            I32ReinterpretF32 => sig(&[F32], I32),
            I64ReinterpretF64 => sig(&[F64], I64),
            F32ReinterpretI32 => sig(&[I32], F32),
            F64ReinterpretI64 => sig(&[I64], F64),
        }
    }
}
