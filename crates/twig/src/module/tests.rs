use super::*;
use crate::code::{FuncType, LabelIdx, LabelKind};
use crate::node::{BrTarget, NumOp};
use crate::value::ValType;

fn build_one(ty: FuncType, body: impl FnOnce(&mut FuncBuilder<'_>)) -> Result<Module, BuildError> {
    let mut b = Module::builder();
    b.function("f", ty, body)?;
    b.finish()
}

fn only_func(module: &Module) -> &Function {
    module.get_func(FuncIdx(0)).expect("function 0")
}

#[test]
fn body_is_block_with_function_label() {
    let module = build_one(FuncType::new([], Some(ValType::I32)), |f| {
        f.i32_const(7);
    })
    .unwrap();
    let func = only_func(&module);
    match func.body() {
        Node::Block { label, body } => {
            assert_eq!(*label, LabelIdx::FUNCTION);
            assert_eq!(body.len(), 1);
        }
        other => panic!("unexpected body {other:?}"),
    }
    assert_eq!(func.code().labels()[0].kind, LabelKind::Function);
    assert_eq!(func.code().max_stack_depth(), 1);
}

#[test]
fn params_prefix_locals() {
    let module = build_one(FuncType::new([ValType::I64, ValType::F32], None), |f| {
        let x = f.local(ValType::F64);
        assert_eq!(x, 2);
    })
    .unwrap();
    assert_eq!(
        only_func(&module).code().locals(),
        &[ValType::I64, ValType::F32, ValType::F64]
    );
}

#[test]
fn max_stack_depth_spans_nested_scopes() {
    let module = build_one(FuncType::new([], Some(ValType::I32)), |f| {
        f.i32_const(1);
        f.block(Some(ValType::I32), |f| {
            f.i32_const(2).i32_const(3).num(NumOp::I32Add);
        });
        f.num(NumOp::I32Add);
    })
    .unwrap();
    let code = only_func(&module).code();
    assert_eq!(code.max_stack_depth(), 3);
    assert_eq!(code.max_nesting(), 1);
}

#[test]
fn branches_resolve_to_enclosing_labels() {
    let module = build_one(FuncType::new([], None), |f| {
        f.block(None, |f| {
            f.loop_(None, |f| {
                f.br(1);
            });
        });
    })
    .unwrap();
    let func = only_func(&module);
    let Node::Block { body, .. } = func.body() else {
        panic!("body is not a block");
    };
    let Node::Block { label: outer, body } = &body[0] else {
        panic!("expected block");
    };
    let Node::Loop { body, .. } = &body[0] else {
        panic!("expected loop");
    };
    assert_eq!(
        body[0],
        Node::Br(BrTarget {
            depth: 1,
            label: *outer
        })
    );
    assert_eq!(func.code().label(*outer).kind, LabelKind::Block);
}

#[test]
fn dead_code_after_branch_is_not_tracked() {
    // Operands after `br` never run, so popping past them is fine.
    let module = build_one(FuncType::new([], Some(ValType::I32)), |f| {
        f.i32_const(1).br(0);
        f.num(NumOp::I32Add);
    });
    assert!(module.is_ok());
}

#[test]
fn branch_too_deep_is_rejected() {
    let err = build_one(FuncType::new([], None), |f| {
        f.block(None, |f| {
            f.br(2);
        });
    })
    .unwrap_err();
    assert_eq!(err, BuildError::BranchDepth { depth: 2, nesting: 2 });
}

#[test]
fn type_mismatch_is_rejected() {
    let err = build_one(FuncType::new([], Some(ValType::I32)), |f| {
        f.i64_const(1).i32_const(2).num(NumOp::I32Add);
    })
    .unwrap_err();
    assert_eq!(
        err,
        BuildError::TypeMismatch {
            expected: ValType::I32,
            found: ValType::I64
        }
    );
}

#[test]
fn leftover_operands_are_rejected() {
    let err = build_one(FuncType::new([], Some(ValType::I32)), |f| {
        f.block(None, |f| {
            f.i32_const(1);
        });
        f.i32_const(2);
    })
    .unwrap_err();
    assert_eq!(err, BuildError::ScopeArity { expected: 0, found: 1 });
}

#[test]
fn underflow_is_rejected() {
    let err = build_one(FuncType::new([], None), |f| {
        f.drop();
    })
    .unwrap_err();
    assert_eq!(err, BuildError::StackUnderflow);
}

#[test]
fn unknown_local_is_rejected() {
    let err = build_one(FuncType::new([ValType::I32], None), |f| {
        f.local_get(3).drop();
    })
    .unwrap_err();
    assert_eq!(err, BuildError::UnknownLocal { index: 3, count: 1 });
}

#[test]
fn if_with_result_needs_else() {
    let mut b = Module::builder();
    let err = b
        .function("f", FuncType::new([], Some(ValType::I32)), |f| {
            f.i32_const(1);
            f.if_(Some(ValType::I32), |f| {
                f.i32_const(2);
            });
        })
        .unwrap_err();
    assert_eq!(err, BuildError::MissingElse);
}

#[test]
fn br_table_targets_must_agree() {
    let err = build_one(FuncType::new([], Some(ValType::I32)), |f| {
        f.block(None, |f| {
            f.i32_const(1).i32_const(0).br_table(&[0], 1);
        });
        f.i32_const(0);
    })
    .unwrap_err();
    assert_eq!(err, BuildError::BrTableArity);
}

#[test]
fn nesting_is_capped() {
    fn nest(f: &mut FuncBuilder<'_>, depth: u32) {
        if depth > 0 {
            f.block(None, |f| nest(f, depth - 1));
        }
    }
    assert!(build_one(FuncType::new([], None), |f| nest(f, MAX_NESTING)).is_ok());
    let err = build_one(FuncType::new([], None), |f| nest(f, MAX_NESTING + 1)).unwrap_err();
    assert_eq!(err, BuildError::NestingTooDeep);
}

#[test]
fn undefined_declaration_fails_finish() {
    let mut b = Module::builder();
    b.declare(FuncType::new([], None));
    assert_eq!(b.finish().unwrap_err(), BuildError::Undefined(0));
}

#[test]
fn define_twice_fails() {
    let mut b = Module::builder();
    let f = b.declare(FuncType::new([], None));
    b.define(f, |_| {}).unwrap();
    assert_eq!(b.define(f, |_| {}).unwrap_err(), BuildError::AlreadyDefined(0));
}

#[test]
fn duplicate_export_fails() {
    let mut b = Module::builder();
    b.function("f", FuncType::new([], None), |_| {}).unwrap();
    let err = b.function("f", FuncType::new([], None), |_| {}).unwrap_err();
    assert_eq!(err, BuildError::DuplicateExport("f".into()));
}

#[test]
fn call_checks_callee_signature() {
    let mut b = Module::builder();
    let callee = b.declare(FuncType::new([ValType::I32], Some(ValType::I64)));
    b.define(callee, |f| {
        f.local_get(0).num(NumOp::I64ExtendI32S);
    })
    .unwrap();
    let err = b
        .function("caller", FuncType::new([], Some(ValType::I64)), |f| {
            f.f32_const(1.0).call(callee);
        })
        .unwrap_err();
    assert_eq!(
        err,
        BuildError::TypeMismatch {
            expected: ValType::I32,
            found: ValType::F32
        }
    );
}

#[test]
fn dump_lists_labels_and_tree() {
    let module = build_one(FuncType::new([], None), |f| {
        f.loop_(None, |f| {
            f.nop();
        });
    })
    .unwrap();
    let text = module.dump_func(FuncIdx(0)).unwrap();
    assert!(text.contains("loop label#1"));
    assert!(text.contains("Nop"));
    assert!(module.dump_func(FuncIdx(9)).is_none());
    assert_eq!(module.func_indices().collect::<Vec<_>>(), vec![FuncIdx(0)]);
}
