use std::sync::Arc;

use twig::{Engine, FuncIdx, FuncType, Instance, LabelIdx, LoopCounter, Module, NumOp, Val, ValType};

fn instantiate(module: Module) -> Instance {
    Instance::new(&Engine::default(), Arc::new(module))
}

#[test]
fn branch_keeps_topmost_result() -> Result<(), anyhow::Error> {
    let mut b = Module::builder();
    b.function("truncate", FuncType::new([], Some(ValType::I32)), |f| {
        f.i32_const(100);
        f.block(Some(ValType::I32), |f| {
            // Three values above the block's entry height; only the top survives.
            f.i32_const(1).i32_const(2).i32_const(3).br(0);
        });
        f.num(NumOp::I32Add);
    })?;
    let instance = instantiate(b.finish()?);
    assert_eq!(instance.call::<_, i32>("truncate", ())?, 103);
    Ok(())
}

#[test]
fn branch_out_of_nested_scopes() -> Result<(), anyhow::Error> {
    let mut b = Module::builder();
    b.function("escape", FuncType::new([], Some(ValType::I64)), |f| {
        f.block(Some(ValType::I64), |f| {
            f.i32_const(5);
            f.block(None, |f| {
                f.loop_(None, |f| {
                    f.i64_const(8).br(2);
                });
            });
            f.drop().i64_const(-1);
        });
    })?;
    let instance = instantiate(b.finish()?);
    assert_eq!(instance.call::<_, i64>("escape", ())?, 8);
    Ok(())
}

#[test]
fn br_if_falls_through_when_zero() -> Result<(), anyhow::Error> {
    let mut b = Module::builder();
    b.function("gate", FuncType::new([ValType::I32], Some(ValType::I32)), |f| {
        f.block(Some(ValType::I32), |f| {
            f.i32_const(10).local_get(0).br_if(0);
            f.drop().i32_const(20);
        });
    })?;
    let instance = instantiate(b.finish()?);
    assert_eq!(instance.call::<_, i32>("gate", (1,))?, 10);
    assert_eq!(instance.call::<_, i32>("gate", (0,))?, 20);
    Ok(())
}

#[test]
fn loop_reenters_until_predicate_is_false() -> Result<(), anyhow::Error> {
    let mut b = Module::builder();
    let func = b.function("count", FuncType::new([], Some(ValType::I32)), |f| {
        let n = f.local(ValType::I32);
        let body = f.local(ValType::I32);
        f.i32_const(5).local_set(n);
        f.loop_(None, |f| {
            f.local_get(body).i32_const(1).num(NumOp::I32Add).local_set(body);
            f.local_get(n).i32_const(1).num(NumOp::I32Sub).local_tee(n);
            f.br_if(0);
        });
        f.local_get(body);
    })?;
    let instance = instantiate(b.finish()?);

    let mut counter = LoopCounter::new();
    let result = instance.call_observed("count", &[], &mut counter)?;
    assert_eq!(result, Some(Val::I32(5)));
    let loops = counter.loops();
    assert_eq!(loops.len(), 1);
    let (looped, label, entries) = loops[0];
    assert_eq!((looped, entries), (func, 5));
    assert_eq!(counter.loop_entries(func, label), 5);
    assert_eq!(counter.total_loop_entries(), 5);
    Ok(())
}

#[test]
fn loop_then_return_constant() -> Result<(), anyhow::Error> {
    let mut b = Module::builder();
    let func = b.function("scenario", FuncType::new([], Some(ValType::I64)), |f| {
        let x = f.local(ValType::I32);
        f.i32_const(10).local_set(x);
        f.loop_(None, |f| {
            f.local_get(x).i32_const(1).num(NumOp::I32Sub).local_tee(x);
            f.br_if(0);
        });
        f.i64_const(42).ret();
    })?;
    let instance = instantiate(b.finish()?);

    let mut counter = LoopCounter::new();
    let result = instance.call_observed("scenario", &[], &mut counter)?;
    assert_eq!(result, Some(Val::I64(42)));
    assert_eq!(counter.loops(), vec![(func, loop_label(&instance, func), 10)]);
    assert_eq!(counter.calls(func), 1);
    Ok(())
}

#[test]
fn return_discards_values_beneath_result() -> Result<(), anyhow::Error> {
    let mut b = Module::builder();
    b.function("early", FuncType::new([], Some(ValType::F32)), |f| {
        f.block(None, |f| {
            f.i32_const(1).i64_const(2).f32_const(0.25).ret();
        });
        f.f32_const(9.0);
    })?;
    let instance = instantiate(b.finish()?);
    assert_eq!(instance.call::<_, f32>("early", ())?, 0.25);
    Ok(())
}

#[test]
fn branch_to_function_label_returns() -> Result<(), anyhow::Error> {
    let mut b = Module::builder();
    b.function("out", FuncType::new([], Some(ValType::I32)), |f| {
        f.block(None, |f| {
            f.i32_const(3).i32_const(4).br(1);
        });
        f.i32_const(0);
    })?;
    let instance = instantiate(b.finish()?);
    assert_eq!(instance.call::<_, i32>("out", ())?, 4);
    Ok(())
}

#[test]
fn if_else_selects_arm() -> Result<(), anyhow::Error> {
    let mut b = Module::builder();
    b.function("sign", FuncType::new([ValType::F64], Some(ValType::I32)), |f| {
        f.local_get(0).f64_const(0.0).num(NumOp::F64Lt);
        f.if_else(
            Some(ValType::I32),
            |f| {
                f.i32_const(-1);
            },
            |f| {
                f.i32_const(1);
            },
        );
    })?;
    let instance = instantiate(b.finish()?);
    assert_eq!(instance.call::<_, i32>("sign", (-0.5f64,))?, -1);
    assert_eq!(instance.call::<_, i32>("sign", (2.0f64,))?, 1);
    Ok(())
}

#[test]
fn if_without_else_skips_on_zero() -> Result<(), anyhow::Error> {
    let mut b = Module::builder();
    b.function("bump", FuncType::new([ValType::I32], Some(ValType::I32)), |f| {
        let acc = f.local(ValType::I32);
        f.local_get(0).if_(None, |f| {
            f.i32_const(7).local_set(acc);
        });
        f.local_get(acc);
    })?;
    let instance = instantiate(b.finish()?);
    assert_eq!(instance.call::<_, i32>("bump", (1,))?, 7);
    assert_eq!(instance.call::<_, i32>("bump", (0,))?, 0);
    Ok(())
}

#[test]
fn br_table_dispatches_by_index() -> Result<(), anyhow::Error> {
    let mut b = Module::builder();
    b.function("classify", FuncType::new([ValType::I32], Some(ValType::I32)), |f| {
        f.block(None, |f| {
            f.block(None, |f| {
                f.block(None, |f| {
                    f.local_get(0).br_table(&[0, 1], 2);
                });
                f.i32_const(100).ret();
            });
            f.i32_const(200).ret();
        });
        f.i32_const(300);
    })?;
    let instance = instantiate(b.finish()?);
    assert_eq!(instance.call::<_, i32>("classify", (0,))?, 100);
    assert_eq!(instance.call::<_, i32>("classify", (1,))?, 200);
    assert_eq!(instance.call::<_, i32>("classify", (2,))?, 300);
    assert_eq!(instance.call::<_, i32>("classify", (-1,))?, 300);
    Ok(())
}

#[test]
fn br_table_carries_a_value() -> Result<(), anyhow::Error> {
    let mut b = Module::builder();
    b.function("pick", FuncType::new([ValType::I32], Some(ValType::I64)), |f| {
        f.block(Some(ValType::I64), |f| {
            f.i64_const(11).local_get(0).br_table(&[0], 0);
        });
    })?;
    let instance = instantiate(b.finish()?);
    assert_eq!(instance.call::<_, i64>("pick", (0,))?, 11);
    assert_eq!(instance.call::<_, i64>("pick", (5,))?, 11);
    Ok(())
}

/// The only loop label in `func`.
fn loop_label(instance: &Instance, func: FuncIdx) -> LabelIdx {
    let mut counter = LoopCounter::new();
    instance
        .call_func(func, &[], &mut counter)
        .expect("call succeeds");
    let loops = counter.loops();
    assert_eq!(loops.len(), 1);
    loops[0].1
}
