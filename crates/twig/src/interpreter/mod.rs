//! Invocation root: the boundary between typed host calls and untyped
//! slot execution.

mod exec;
pub mod observe;

use thiserror::Error;

use crate::code::FuncIdx;
use crate::diag::{self, Fault};
use crate::engine::Config;
use crate::module::{Function, Module};
use crate::stack::Frame;
use crate::value::{self, Val};
use observe::Observer;

/// Guest-visible failures. These unwind every enclosing scope to the
/// invocation root and are returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Trap {
    #[error("unreachable executed")]
    Unreachable,
    #[error("integer divide by zero")]
    IntegerDivideByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("invalid conversion to integer")]
    InvalidConversionToInteger,
    #[error("call stack exhausted")]
    CallStackExhausted,
    #[error("out of fuel")]
    OutOfFuel,
}

/// Native stack that must still be free before another call or scope is
/// entered. Below this, the invocation traps with `CallStackExhausted`.
pub(crate) const STACK_RED_ZONE: usize = 128 * 1024;

/// State shared by every frame of one top-level invocation.
pub(crate) struct Context<'a, O: Observer> {
    module: &'a Module,
    observer: &'a mut O,
    fuel: Option<u64>,
    depth: u32,
    max_depth: u32,
}

impl<'a, O: Observer> Context<'a, O> {
    pub(crate) fn new(module: &'a Module, config: &Config, observer: &'a mut O) -> Self {
        Context {
            module,
            observer,
            fuel: config.fuel,
            depth: 0,
            max_depth: config.max_call_depth,
        }
    }

    #[inline(always)]
    fn consume_fuel(&mut self) -> Result<(), Trap> {
        if let Some(fuel) = &mut self.fuel {
            if *fuel == 0 {
                return Err(Trap::OutOfFuel);
            }
            *fuel -= 1;
        }
        Ok(())
    }

    /// Every open call and scope holds native frames, so the call count
    /// alone does not bound native stack use.
    #[inline(always)]
    fn check_native_stack(&self) -> Result<(), Trap> {
        match stacker::remaining_stack() {
            Some(remaining) if remaining < STACK_RED_ZONE => {
                tracing::debug!(remaining, depth = self.depth, "native stack exhausted");
                Err(Trap::CallStackExhausted)
            }
            _ => Ok(()),
        }
    }
}

/// Invoke `func` with typed arguments and return its typed result.
///
/// Arguments must already match the function's parameter types; the
/// host-facing checks live in [`Instance`](crate::Instance).
pub(crate) fn invoke<O: Observer>(
    ctx: &mut Context<'_, O>,
    func: FuncIdx,
    args: &[Val],
) -> Result<Option<Val>, Trap> {
    let params: Vec<u64> = args.iter().map(|arg| value::encode(*arg)).collect();
    let result = call(ctx, func, &params);
    if let Err(trap) = &result {
        tracing::debug!(%func, %trap, "invocation trapped");
    }
    result
}

/// Run one function to completion over a fresh frame seeded with
/// `params`, then decode the popped result by the declared result type.
///
/// Used for host calls and for the `call` node alike.
pub(crate) fn call<O: Observer>(
    ctx: &mut Context<'_, O>,
    func: FuncIdx,
    params: &[u64],
) -> Result<Option<Val>, Trap> {
    if ctx.depth >= ctx.max_depth {
        return Err(Trap::CallStackExhausted);
    }
    ctx.check_native_stack()?;
    ctx.depth += 1;

    let module = ctx.module;
    let function = match module.get_func(func) {
        Some(function) => function,
        None => diag::fault(Fault::MissingFunction { func: func.index() }),
    };
    ctx.observer.call_entered(func);
    tracing::trace!(%func, depth = ctx.depth, "enter");

    let result = run(ctx, function, params);
    ctx.depth -= 1;
    result
}

fn run<O: Observer>(
    ctx: &mut Context<'_, O>,
    function: &Function,
    params: &[u64],
) -> Result<Option<Val>, Trap> {
    let code = &function.code;
    let mut frame = Frame::new(params, code.locals.len(), code.max_stack_depth);

    exec::run_body(ctx, code, &mut frame, &function.body)?;

    let Some(ty) = code.result() else {
        tracing::trace!(func = %code.func, "exit");
        return Ok(None);
    };
    let slot = frame.pop();
    diag::check_narrow(slot, ty);
    let val = value::decode(slot, ty);
    tracing::trace!(func = %code.func, %val, "exit");
    Ok(Some(val))
}
