//! Semantics of the numeric leaf instructions.
//!
//! Integers wrap in two's complement. Floats follow IEEE-754 with the
//! host's NaN propagation, except `min`/`max`, which return a NaN whenever
//! either operand is one and order `-0.0` below `+0.0`.

use crate::interpreter::Trap;
use crate::node::NumOp;
use crate::stack::Frame;

macro_rules! binop {
    ($frame:expr, $pop:ident, $push:ident, $op:expr) => {{
        let b = $frame.$pop();
        let a = $frame.$pop();
        $frame.$push($op(a, b));
    }};
}

macro_rules! unop {
    ($frame:expr, $pop:ident, $push:ident, $op:expr) => {{
        let a = $frame.$pop();
        $frame.$push($op(a));
    }};
}

macro_rules! cmpop {
    ($frame:expr, $pop:ident, $op:expr) => {{
        let b = $frame.$pop();
        let a = $frame.$pop();
        $frame.push_bool($op(a, b));
    }};
}

/// Trapping float-to-int truncation. `$lo` and `$hi` are the exclusive
/// bounds of the representable range after truncation.
macro_rules! trunc {
    ($frame:expr, $pop:ident, $push:ident, $int:ty, $lo:expr, $hi:expr) => {{
        let a = $frame.$pop();
        if a.is_nan() {
            return Err(Trap::InvalidConversionToInteger);
        }
        let t = a.trunc();
        if !(t > $lo && t < $hi) {
            return Err(Trap::IntegerOverflow);
        }
        $frame.$push(t as $int as _);
    }};
}

/// Saturating truncation. Rust's float-to-int `as` already saturates and
/// maps NaN to zero.
macro_rules! trunc_sat {
    ($frame:expr, $pop:ident, $push:ident, $int:ty) => {{
        let a = $frame.$pop();
        $frame.$push(a as $int as _);
    }};
}

/// Execute one numeric leaf against the frame's operand stack.
pub(crate) fn apply(op: NumOp, frame: &mut Frame) -> Result<(), Trap> {
    use NumOp::*;

    match op {
        // --- i32 ---
        I32Eqz => {
            let a = frame.pop_i32();
            frame.push_bool(a == 0);
        }
        I32Eq => cmpop!(frame, pop_i32, |a, b| a == b),
        I32Ne => cmpop!(frame, pop_i32, |a, b| a != b),
        I32LtS => cmpop!(frame, pop_i32, |a: i32, b: i32| a < b),
        I32LtU => cmpop!(frame, pop_i32, |a: i32, b: i32| (a as u32) < (b as u32)),
        I32GtS => cmpop!(frame, pop_i32, |a: i32, b: i32| a > b),
        I32GtU => cmpop!(frame, pop_i32, |a: i32, b: i32| (a as u32) > (b as u32)),
        I32LeS => cmpop!(frame, pop_i32, |a: i32, b: i32| a <= b),
        I32LeU => cmpop!(frame, pop_i32, |a: i32, b: i32| (a as u32) <= (b as u32)),
        I32GeS => cmpop!(frame, pop_i32, |a: i32, b: i32| a >= b),
        I32GeU => cmpop!(frame, pop_i32, |a: i32, b: i32| (a as u32) >= (b as u32)),
        I32Clz => unop!(frame, pop_i32, push_i32, |a: i32| a.leading_zeros() as i32),
        I32Ctz => unop!(frame, pop_i32, push_i32, |a: i32| a.trailing_zeros() as i32),
        I32Popcnt => unop!(frame, pop_i32, push_i32, |a: i32| a.count_ones() as i32),
        I32Add => binop!(frame, pop_i32, push_i32, i32::wrapping_add),
        I32Sub => binop!(frame, pop_i32, push_i32, i32::wrapping_sub),
        I32Mul => binop!(frame, pop_i32, push_i32, i32::wrapping_mul),
        I32DivS => {
            let b = frame.pop_i32();
            let a = frame.pop_i32();
            frame.push_i32(div_s32(a, b)?);
        }
        I32DivU => {
            let b = frame.pop_i32() as u32;
            let a = frame.pop_i32() as u32;
            let q = a.checked_div(b).ok_or(Trap::IntegerDivideByZero)?;
            frame.push_i32(q as i32);
        }
        I32RemS => {
            let b = frame.pop_i32();
            let a = frame.pop_i32();
            if b == 0 {
                return Err(Trap::IntegerDivideByZero);
            }
            // i32::MIN % -1 is 0, not a trap.
            frame.push_i32(a.wrapping_rem(b));
        }
        I32RemU => {
            let b = frame.pop_i32() as u32;
            let a = frame.pop_i32() as u32;
            let r = a.checked_rem(b).ok_or(Trap::IntegerDivideByZero)?;
            frame.push_i32(r as i32);
        }
        I32And => binop!(frame, pop_i32, push_i32, |a, b| a & b),
        I32Or => binop!(frame, pop_i32, push_i32, |a, b| a | b),
        I32Xor => binop!(frame, pop_i32, push_i32, |a, b| a ^ b),
        I32Shl => binop!(frame, pop_i32, push_i32, |a: i32, b: i32| a.wrapping_shl(b as u32)),
        I32ShrS => binop!(frame, pop_i32, push_i32, |a: i32, b: i32| a.wrapping_shr(b as u32)),
        I32ShrU => binop!(frame, pop_i32, push_i32, |a: i32, b: i32| {
            (a as u32).wrapping_shr(b as u32) as i32
        }),
        I32Rotl => binop!(frame, pop_i32, push_i32, |a: i32, b: i32| a.rotate_left(b as u32 & 31)),
        I32Rotr => binop!(frame, pop_i32, push_i32, |a: i32, b: i32| a.rotate_right(b as u32 & 31)),

        // --- i64 ---
        I64Eqz => {
            let a = frame.pop_i64();
            frame.push_bool(a == 0);
        }
        I64Eq => cmpop!(frame, pop_i64, |a, b| a == b),
        I64Ne => cmpop!(frame, pop_i64, |a, b| a != b),
        I64LtS => cmpop!(frame, pop_i64, |a: i64, b: i64| a < b),
        I64LtU => cmpop!(frame, pop_i64, |a: i64, b: i64| (a as u64) < (b as u64)),
        I64GtS => cmpop!(frame, pop_i64, |a: i64, b: i64| a > b),
        I64GtU => cmpop!(frame, pop_i64, |a: i64, b: i64| (a as u64) > (b as u64)),
        I64LeS => cmpop!(frame, pop_i64, |a: i64, b: i64| a <= b),
        I64LeU => cmpop!(frame, pop_i64, |a: i64, b: i64| (a as u64) <= (b as u64)),
        I64GeS => cmpop!(frame, pop_i64, |a: i64, b: i64| a >= b),
        I64GeU => cmpop!(frame, pop_i64, |a: i64, b: i64| (a as u64) >= (b as u64)),
        I64Clz => unop!(frame, pop_i64, push_i64, |a: i64| a.leading_zeros() as i64),
        I64Ctz => unop!(frame, pop_i64, push_i64, |a: i64| a.trailing_zeros() as i64),
        I64Popcnt => unop!(frame, pop_i64, push_i64, |a: i64| a.count_ones() as i64),
        I64Add => binop!(frame, pop_i64, push_i64, i64::wrapping_add),
        I64Sub => binop!(frame, pop_i64, push_i64, i64::wrapping_sub),
        I64Mul => binop!(frame, pop_i64, push_i64, i64::wrapping_mul),
        I64DivS => {
            let b = frame.pop_i64();
            let a = frame.pop_i64();
            frame.push_i64(div_s64(a, b)?);
        }
        I64DivU => {
            let b = frame.pop_i64() as u64;
            let a = frame.pop_i64() as u64;
            let q = a.checked_div(b).ok_or(Trap::IntegerDivideByZero)?;
            frame.push_i64(q as i64);
        }
        I64RemS => {
            let b = frame.pop_i64();
            let a = frame.pop_i64();
            if b == 0 {
                return Err(Trap::IntegerDivideByZero);
            }
            frame.push_i64(a.wrapping_rem(b));
        }
        I64RemU => {
            let b = frame.pop_i64() as u64;
            let a = frame.pop_i64() as u64;
            let r = a.checked_rem(b).ok_or(Trap::IntegerDivideByZero)?;
            frame.push_i64(r as i64);
        }
        I64And => binop!(frame, pop_i64, push_i64, |a, b| a & b),
        I64Or => binop!(frame, pop_i64, push_i64, |a, b| a | b),
        I64Xor => binop!(frame, pop_i64, push_i64, |a, b| a ^ b),
        I64Shl => binop!(frame, pop_i64, push_i64, |a: i64, b: i64| a.wrapping_shl(b as u32)),
        I64ShrS => binop!(frame, pop_i64, push_i64, |a: i64, b: i64| a.wrapping_shr(b as u32)),
        I64ShrU => binop!(frame, pop_i64, push_i64, |a: i64, b: i64| {
            (a as u64).wrapping_shr(b as u32) as i64
        }),
        I64Rotl => binop!(frame, pop_i64, push_i64, |a: i64, b: i64| {
            a.rotate_left((b & 63) as u32)
        }),
        I64Rotr => binop!(frame, pop_i64, push_i64, |a: i64, b: i64| {
            a.rotate_right((b & 63) as u32)
        }),

        // --- f32 ---
        F32Eq => cmpop!(frame, pop_f32, |a, b| a == b),
        F32Ne => cmpop!(frame, pop_f32, |a, b| a != b),
        F32Lt => cmpop!(frame, pop_f32, |a: f32, b: f32| a < b),
        F32Gt => cmpop!(frame, pop_f32, |a: f32, b: f32| a > b),
        F32Le => cmpop!(frame, pop_f32, |a: f32, b: f32| a <= b),
        F32Ge => cmpop!(frame, pop_f32, |a: f32, b: f32| a >= b),
        F32Abs => unop!(frame, pop_f32, push_f32, f32::abs),
        F32Neg => unop!(frame, pop_f32, push_f32, |a: f32| -a),
        F32Ceil => unop!(frame, pop_f32, push_f32, f32::ceil),
        F32Floor => unop!(frame, pop_f32, push_f32, f32::floor),
        F32Trunc => unop!(frame, pop_f32, push_f32, f32::trunc),
        F32Nearest => unop!(frame, pop_f32, push_f32, f32::round_ties_even),
        F32Sqrt => unop!(frame, pop_f32, push_f32, f32::sqrt),
        F32Add => binop!(frame, pop_f32, push_f32, |a, b| a + b),
        F32Sub => binop!(frame, pop_f32, push_f32, |a, b| a - b),
        F32Mul => binop!(frame, pop_f32, push_f32, |a, b| a * b),
        F32Div => binop!(frame, pop_f32, push_f32, |a, b| a / b),
        F32Min => binop!(frame, pop_f32, push_f32, wasm_min),
        F32Max => binop!(frame, pop_f32, push_f32, wasm_max),
        F32Copysign => binop!(frame, pop_f32, push_f32, f32::copysign),

        // --- f64 ---
        F64Eq => cmpop!(frame, pop_f64, |a, b| a == b),
        F64Ne => cmpop!(frame, pop_f64, |a, b| a != b),
        F64Lt => cmpop!(frame, pop_f64, |a: f64, b: f64| a < b),
        F64Gt => cmpop!(frame, pop_f64, |a: f64, b: f64| a > b),
        F64Le => cmpop!(frame, pop_f64, |a: f64, b: f64| a <= b),
        F64Ge => cmpop!(frame, pop_f64, |a: f64, b: f64| a >= b),
        F64Abs => unop!(frame, pop_f64, push_f64, f64::abs),
        F64Neg => unop!(frame, pop_f64, push_f64, |a: f64| -a),
        F64Ceil => unop!(frame, pop_f64, push_f64, f64::ceil),
        F64Floor => unop!(frame, pop_f64, push_f64, f64::floor),
        F64Trunc => unop!(frame, pop_f64, push_f64, f64::trunc),
        F64Nearest => unop!(frame, pop_f64, push_f64, f64::round_ties_even),
        F64Sqrt => unop!(frame, pop_f64, push_f64, f64::sqrt),
        F64Add => binop!(frame, pop_f64, push_f64, |a, b| a + b),
        F64Sub => binop!(frame, pop_f64, push_f64, |a, b| a - b),
        F64Mul => binop!(frame, pop_f64, push_f64, |a, b| a * b),
        F64Div => binop!(frame, pop_f64, push_f64, |a, b| a / b),
        F64Min => binop!(frame, pop_f64, push_f64, wasm_min),
        F64Max => binop!(frame, pop_f64, push_f64, wasm_max),
        F64Copysign => binop!(frame, pop_f64, push_f64, f64::copysign),

        // --- Conversions ---
        I32WrapI64 => unop!(frame, pop_i64, push_i32, |a: i64| a as i32),
        I32TruncF32S => trunc!(frame, pop_f32, push_i32, i32, -2147483904.0_f32, 2147483648.0_f32),
        I32TruncF32U => trunc!(frame, pop_f32, push_i32, u32, -1.0_f32, 4294967296.0_f32),
        I32TruncF64S => trunc!(frame, pop_f64, push_i32, i32, -2147483649.0_f64, 2147483648.0_f64),
        I32TruncF64U => trunc!(frame, pop_f64, push_i32, u32, -1.0_f64, 4294967296.0_f64),
        I64ExtendI32S => unop!(frame, pop_i32, push_i64, |a: i32| a as i64),
        I64ExtendI32U => unop!(frame, pop_i32, push_i64, |a: i32| a as u32 as i64),
        I64TruncF32S => trunc!(
            frame,
            pop_f32,
            push_i64,
            i64,
            -9223373136366403584.0_f32,
            9223372036854775808.0_f32
        ),
        I64TruncF32U => trunc!(frame, pop_f32, push_i64, u64, -1.0_f32, 18446744073709551616.0_f32),
        I64TruncF64S => trunc!(
            frame,
            pop_f64,
            push_i64,
            i64,
            -9223372036854777856.0_f64,
            9223372036854775808.0_f64
        ),
        I64TruncF64U => trunc!(frame, pop_f64, push_i64, u64, -1.0_f64, 18446744073709551616.0_f64),
        F32ConvertI32S => unop!(frame, pop_i32, push_f32, |a: i32| a as f32),
        F32ConvertI32U => unop!(frame, pop_i32, push_f32, |a: i32| a as u32 as f32),
        F32ConvertI64S => unop!(frame, pop_i64, push_f32, |a: i64| a as f32),
        F32ConvertI64U => unop!(frame, pop_i64, push_f32, |a: i64| a as u64 as f32),
        F32DemoteF64 => unop!(frame, pop_f64, push_f32, |a: f64| a as f32),
        F64ConvertI32S => unop!(frame, pop_i32, push_f64, |a: i32| a as f64),
        F64ConvertI32U => unop!(frame, pop_i32, push_f64, |a: i32| a as u32 as f64),
        F64ConvertI64S => unop!(frame, pop_i64, push_f64, |a: i64| a as f64),
        F64ConvertI64U => unop!(frame, pop_i64, push_f64, |a: i64| a as u64 as f64),
        F64PromoteF32 => unop!(frame, pop_f32, push_f64, |a: f32| a as f64),
        I32ReinterpretF32 => unop!(frame, pop_f32, push_i32, |a: f32| a.to_bits() as i32),
        I64ReinterpretF64 => unop!(frame, pop_f64, push_i64, |a: f64| a.to_bits() as i64),
        F32ReinterpretI32 => unop!(frame, pop_i32, push_f32, |a: i32| f32::from_bits(a as u32)),
        F64ReinterpretI64 => unop!(frame, pop_i64, push_f64, |a: i64| f64::from_bits(a as u64)),

        // --- Sign extension ---
        I32Extend8S => unop!(frame, pop_i32, push_i32, |a: i32| a as i8 as i32),
        I32Extend16S => unop!(frame, pop_i32, push_i32, |a: i32| a as i16 as i32),
        I64Extend8S => unop!(frame, pop_i64, push_i64, |a: i64| a as i8 as i64),
        I64Extend16S => unop!(frame, pop_i64, push_i64, |a: i64| a as i16 as i64),
        I64Extend32S => unop!(frame, pop_i64, push_i64, |a: i64| a as i32 as i64),

        // --- Saturating truncation ---
        I32TruncSatF32S => trunc_sat!(frame, pop_f32, push_i32, i32),
        I32TruncSatF32U => trunc_sat!(frame, pop_f32, push_i32, u32),
        I32TruncSatF64S => trunc_sat!(frame, pop_f64, push_i32, i32),
        I32TruncSatF64U => trunc_sat!(frame, pop_f64, push_i32, u32),
        I64TruncSatF32S => trunc_sat!(frame, pop_f32, push_i64, i64),
        I64TruncSatF32U => trunc_sat!(frame, pop_f32, push_i64, u64),
        I64TruncSatF64S => trunc_sat!(frame, pop_f64, push_i64, i64),
        I64TruncSatF64U => trunc_sat!(frame, pop_f64, push_i64, u64),
    }

    Ok(())
}

#[inline(always)]
fn div_s32(a: i32, b: i32) -> Result<i32, Trap> {
    if b == 0 {
        return Err(Trap::IntegerDivideByZero);
    }
    a.checked_div(b).ok_or(Trap::IntegerOverflow)
}

#[inline(always)]
fn div_s64(a: i64, b: i64) -> Result<i64, Trap> {
    if b == 0 {
        return Err(Trap::IntegerDivideByZero);
    }
    a.checked_div(b).ok_or(Trap::IntegerOverflow)
}

trait Float: Copy + PartialEq {
    const NAN: Self;
    const ZERO: Self;
    fn is_nan(self) -> bool;
    fn is_sign_negative(self) -> bool;
    fn min(self, other: Self) -> Self;
    fn max(self, other: Self) -> Self;
}

macro_rules! impl_float {
    ($($ty:ident),*) => {
        $(
            impl Float for $ty {
                const NAN: Self = $ty::NAN;
                const ZERO: Self = 0.0;
                fn is_nan(self) -> bool { $ty::is_nan(self) }
                fn is_sign_negative(self) -> bool { $ty::is_sign_negative(self) }
                fn min(self, other: Self) -> Self { $ty::min(self, other) }
                fn max(self, other: Self) -> Self { $ty::max(self, other) }
            }
        )*
    };
}

impl_float!(f32, f64);

fn wasm_min<F: Float>(a: F, b: F) -> F {
    if a.is_nan() || b.is_nan() {
        F::NAN
    } else if a == F::ZERO && b == F::ZERO {
        if a.is_sign_negative() { a } else { b }
    } else {
        a.min(b)
    }
}

fn wasm_max<F: Float>(a: F, b: F) -> F {
    if a.is_nan() || b.is_nan() {
        F::NAN
    } else if a == F::ZERO && b == F::ZERO {
        if a.is_sign_negative() { b } else { a }
    } else {
        a.max(b)
    }
}
