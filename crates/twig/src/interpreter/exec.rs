//! Recursive execution of the control-flow tree.
//!
//! Each scope returns a [`Flow`] to its parent. A branch travels outward
//! one scope per level with its depth decremented, and the scope it
//! reaches at depth 0 unwinds the operand stack to its entry height,
//! keeping the label's result slots. Native recursion grows with both call
//! depth and scope nesting; entering a call or scope traps with
//! `CallStackExhausted` once the remaining native stack drops below
//! `STACK_RED_ZONE`.

use super::observe::Observer;
use super::{Context, Trap};
use crate::code::{CodeEntry, LabelIdx};
use crate::diag::{self, Fault};
use crate::node::{BrTarget, Node, numeric};
use crate::stack::Frame;

/// How a node or sequence finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// Fell through; continue with the next sibling.
    Next,
    /// Unwinding towards an enclosing label.
    Branch(BrTarget),
    /// Unwinding straight to the invocation root.
    Return,
}

/// Execute a function body (a block carrying the function label).
///
/// On exit the frame holds exactly the declared result slots. Values left
/// beneath a `return`, or by a body with no result, are discarded here.
pub(super) fn run_body<O: Observer>(
    ctx: &mut Context<'_, O>,
    code: &CodeEntry,
    frame: &mut Frame,
    body: &Node,
) -> Result<(), Trap> {
    let arity = code.ty().result_arity();
    match exec_node(ctx, code, frame, body)? {
        Flow::Next if arity == 0 => frame.unwind(0, 0),
        Flow::Next => {}
        Flow::Return => frame.unwind(0, arity),
        Flow::Branch(target) => diag::fault(Fault::UnresolvedBranch {
            depth: target.depth,
        }),
    }
    if diag::ENABLED && frame.depth() != arity {
        diag::fault(Fault::ResultArity {
            depth: frame.depth(),
            arity,
        });
    }
    Ok(())
}

fn exec_seq<O: Observer>(
    ctx: &mut Context<'_, O>,
    code: &CodeEntry,
    frame: &mut Frame,
    nodes: &[Node],
) -> Result<Flow, Trap> {
    for node in nodes {
        match exec_node(ctx, code, frame, node)? {
            Flow::Next => {}
            flow => return Ok(flow),
        }
    }
    Ok(Flow::Next)
}

fn exec_node<O: Observer>(
    ctx: &mut Context<'_, O>,
    code: &CodeEntry,
    frame: &mut Frame,
    node: &Node,
) -> Result<Flow, Trap> {
    ctx.consume_fuel()?;

    match node {
        Node::Nop => {}

        Node::Unreachable => return Err(Trap::Unreachable),

        // --- Structured control ---
        Node::Block { label, body } => {
            ctx.check_native_stack()?;
            let height = frame.depth();
            let flow = exec_seq(ctx, code, frame, body)?;
            return Ok(leave_scope(code, frame, *label, height, flow));
        }

        Node::Loop { label, body } => {
            ctx.check_native_stack()?;
            let height = frame.depth();
            loop {
                ctx.observer.loop_entered(code.func, *label);
                match exec_seq(ctx, code, frame, body)? {
                    Flow::Branch(target) if target.depth == 0 => {
                        check_label(*label, target);
                        frame.unwind(height, 0);
                    }
                    flow => return Ok(leave_scope(code, frame, *label, height, flow)),
                }
            }
        }

        Node::If {
            label,
            then,
            otherwise,
        } => {
            let condition = frame.pop_i32();
            ctx.check_native_stack()?;
            let height = frame.depth();
            let arm = if condition != 0 { then } else { otherwise };
            let flow = exec_seq(ctx, code, frame, arm)?;
            return Ok(leave_scope(code, frame, *label, height, flow));
        }

        // --- Branches ---
        Node::Br(target) => return Ok(Flow::Branch(*target)),

        Node::BrIf(target) => {
            if frame.pop_i32() != 0 {
                return Ok(Flow::Branch(*target));
            }
        }

        Node::BrTable { targets, default } => {
            let index = frame.pop_i32() as u32 as usize;
            let target = targets.get(index).unwrap_or(default);
            return Ok(Flow::Branch(*target));
        }

        Node::Return => return Ok(Flow::Return),

        Node::Call(callee) => {
            let param_count = match ctx.module.get_func(*callee) {
                Some(function) => function.code.param_count(),
                None => diag::fault(Fault::MissingFunction {
                    func: callee.index(),
                }),
            };
            let params = frame.pop_n(param_count);
            if let Some(result) = super::call(ctx, *callee, &params)? {
                frame.push(result.to_slot());
            }
        }

        // --- Parametric ---
        Node::Drop => {
            frame.pop();
        }

        Node::Select => {
            let condition = frame.pop_i32();
            let b = frame.pop();
            let a = frame.pop();
            frame.push(if condition != 0 { a } else { b });
        }

        // --- Locals ---
        Node::LocalGet(index) => {
            let slot = frame.local_get(*index);
            frame.push(slot);
        }

        Node::LocalSet(index) => {
            let slot = frame.pop();
            frame.local_set(*index, slot);
        }

        Node::LocalTee(index) => {
            let slot = frame.peek();
            frame.local_set(*index, slot);
        }

        Node::Const { slot, .. } => frame.push(*slot),

        Node::Num(op) => numeric::apply(*op, frame)?,
    }

    Ok(Flow::Next)
}

/// Close a scope entered at stack `height`.
///
/// On normal completion the body has already left exactly its results.
/// A branch aimed at this scope discards whatever sits between the entry
/// height and the label's result slots.
#[inline(always)]
fn leave_scope(
    code: &CodeEntry,
    frame: &mut Frame,
    label: LabelIdx,
    height: usize,
    flow: Flow,
) -> Flow {
    match flow {
        Flow::Branch(target) if target.depth == 0 => {
            check_label(label, target);
            frame.unwind(height, code.label(label).branch_arity());
            Flow::Next
        }
        Flow::Branch(target) => Flow::Branch(BrTarget {
            depth: target.depth - 1,
            label: target.label,
        }),
        flow => flow,
    }
}

#[inline(always)]
fn check_label(label: LabelIdx, target: BrTarget) {
    if diag::ENABLED && target.label != label {
        diag::fault(Fault::LabelMismatch {
            expected: target.label.index(),
            found: label.index(),
        });
    }
}
