//! Value tags and the 64-bit slot encoding shared by the operand stack
//! and local storage.
//!
//! Every slot is a raw `u64`. The type of the value it holds is never
//! stored next to it; it is carried statically by the node that produced
//! or consumes the slot. Narrow types (`I32`, `F32`) live in the low 32
//! bits with the high half zero.

use std::fmt;

#[cfg(test)]
mod tests;

/// Mask selecting the low half of a slot.
pub(crate) const LOW_32: u64 = 0xFFFF_FFFF;

/// Primitive value kinds supported by the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValType {
    I32,
    I64,
    F32,
    F64,
}

impl ValType {
    /// True for types that occupy only the low 32 bits of a slot.
    #[inline(always)]
    pub fn is_narrow(self) -> bool {
        matches!(self, ValType::I32 | ValType::F32)
    }
}

impl fmt::Display for ValType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValType::I32 => "i32",
            ValType::I64 => "i64",
            ValType::F32 => "f32",
            ValType::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// A typed value as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Val {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Val {
    pub fn ty(&self) -> ValType {
        match self {
            Val::I32(_) => ValType::I32,
            Val::I64(_) => ValType::I64,
            Val::F32(_) => ValType::F32,
            Val::F64(_) => ValType::F64,
        }
    }

    /// Encode into a slot. Shorthand for [`encode`].
    #[inline(always)]
    pub fn to_slot(self) -> u64 {
        encode(self)
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::I32(v) => write!(f, "{v}:i32"),
            Val::I64(v) => write!(f, "{v}:i64"),
            Val::F32(v) => write!(f, "{v}:f32"),
            Val::F64(v) => write!(f, "{v}:f64"),
        }
    }
}

/// Encode a typed value into its canonical slot form.
///
/// Narrow values are zero-extended, never sign-extended, so the high half
/// of the slot is clean at the moment of production.
#[inline(always)]
pub fn encode(val: Val) -> u64 {
    match val {
        Val::I32(v) => v as u32 as u64,
        Val::I64(v) => v as u64,
        Val::F32(v) => v.to_bits() as u64,
        Val::F64(v) => v.to_bits(),
    }
}

/// Decode a slot as a value of type `ty`.
///
/// Narrow slots are masked to the low half before reinterpretation even
/// though producers already zero the high half. Floats are rebuilt from
/// their raw bits, never converted by value.
#[inline(always)]
pub fn decode(slot: u64, ty: ValType) -> Val {
    match ty {
        ValType::I32 => Val::I32((slot & LOW_32) as u32 as i32),
        ValType::I64 => Val::I64(slot as i64),
        ValType::F32 => Val::F32(f32::from_bits((slot & LOW_32) as u32)),
        ValType::F64 => Val::F64(f64::from_bits(slot)),
    }
}

/// Convert a single Rust value to/from a `Val`.
pub trait WasmVal: Sized {
    const TYPE: ValType;
    fn to_val(&self) -> Val;
    fn from_val(val: &Val) -> Result<Self, anyhow::Error>;
}

macro_rules! impl_wasm_val {
    ($($rust:ty => $variant:ident),* $(,)?) => {
        $(
            impl WasmVal for $rust {
                const TYPE: ValType = ValType::$variant;

                fn to_val(&self) -> Val {
                    Val::$variant(*self)
                }

                fn from_val(val: &Val) -> Result<Self, anyhow::Error> {
                    match val {
                        Val::$variant(v) => Ok(*v),
                        other => anyhow::bail!(
                            "expected {}, got {}",
                            ValType::$variant,
                            other.ty()
                        ),
                    }
                }
            }
        )*
    };
}

impl_wasm_val!(i32 => I32, i64 => I64, f32 => F32, f64 => F64);

/// Convert Rust types into call arguments.
pub trait WasmArgs {
    fn to_vals(&self) -> Vec<Val>;
}

/// Convert an invocation result back into a Rust type.
///
/// Functions in this interpreter return at most one value, so the
/// implementations cover `()` (no result), a bare value and a 1-tuple.
pub trait WasmResults: Sized {
    fn from_result(result: Option<Val>) -> Result<Self, anyhow::Error>;
}

impl WasmArgs for () {
    fn to_vals(&self) -> Vec<Val> {
        Vec::new()
    }
}

impl WasmResults for () {
    fn from_result(result: Option<Val>) -> Result<Self, anyhow::Error> {
        match result {
            None => Ok(()),
            Some(val) => anyhow::bail!("expected no result, got {val}"),
        }
    }
}

impl<T: WasmVal> WasmResults for T {
    fn from_result(result: Option<Val>) -> Result<Self, anyhow::Error> {
        let val = result.ok_or_else(|| anyhow::anyhow!("expected a {} result, got none", T::TYPE))?;
        T::from_val(&val)
    }
}

impl<T: WasmVal> WasmResults for (T,) {
    fn from_result(result: Option<Val>) -> Result<Self, anyhow::Error> {
        T::from_result(result).map(|v| (v,))
    }
}

macro_rules! impl_wasm_args {
    ($(($($T:ident),+)),* $(,)?) => {
        $(
            impl<$($T: WasmVal),+> WasmArgs for ($($T,)+) {
                #[allow(non_snake_case)]
                fn to_vals(&self) -> Vec<Val> {
                    let ($($T,)+) = self;
                    vec![$($T.to_val()),+]
                }
            }
        )*
    };
}

impl_wasm_args!(
    (A),
    (A, B),
    (A, B, C),
    (A, B, C, D),
    (A, B, C, D, E),
    (A, B, C, D, E, F),
    (A, B, C, D, E, F, G),
    (A, B, C, D, E, F, G, H),
);
