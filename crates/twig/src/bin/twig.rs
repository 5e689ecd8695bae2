use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use twig::{Config, Engine, FuncType, Instance, LoopCounter, Module, NumOp, Val, ValType};

#[derive(Parser)]
#[command(name = "twig", about = "Tree-walking interpreter over 64-bit slots")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a built-in program and print its result.
    Run {
        program: Program,
        /// Arguments, parsed by the program's parameter types.
        args: Vec<String>,
        /// Nodes the invocation may execute before trapping.
        #[arg(long)]
        fuel: Option<u64>,
        #[arg(long, default_value_t = twig::DEFAULT_MAX_CALL_DEPTH)]
        max_call_depth: u32,
        /// Print per-loop entry counts after the run.
        #[arg(long)]
        count_loops: bool,
    },
    /// Print a built-in program's layout and control tree.
    Dump { program: Program },
}

#[derive(Clone, Copy, ValueEnum)]
enum Program {
    /// Recursive fibonacci over i64.
    Fib,
    /// Count an i32 down to zero in a loop.
    Countdown,
    /// Sum 0.5 * i for i in 0..n as f64.
    SumF64,
}

impl Program {
    fn name(self) -> &'static str {
        match self {
            Program::Fib => "fib",
            Program::Countdown => "countdown",
            Program::SumF64 => "sum_f64",
        }
    }

    fn build(self) -> anyhow::Result<Module> {
        let mut b = Module::builder();
        match self {
            Program::Fib => {
                let fib = b.declare(FuncType::new([ValType::I64], Some(ValType::I64)));
                b.export("fib", fib)?;
                b.define(fib, |f| {
                    f.local_get(0).i64_const(2).num(NumOp::I64LtS);
                    f.if_else(
                        Some(ValType::I64),
                        |f| {
                            f.local_get(0);
                        },
                        |f| {
                            f.local_get(0).i64_const(1).num(NumOp::I64Sub).call(fib);
                            f.local_get(0).i64_const(2).num(NumOp::I64Sub).call(fib);
                            f.num(NumOp::I64Add);
                        },
                    );
                })?;
            }
            Program::Countdown => {
                b.function(
                    "countdown",
                    FuncType::new([ValType::I32], Some(ValType::I32)),
                    |f| {
                        let steps = f.local(ValType::I32);
                        f.block(None, |f| {
                            f.loop_(None, |f| {
                                f.local_get(0).num(NumOp::I32Eqz).br_if(1);
                                f.local_get(0).i32_const(1).num(NumOp::I32Sub).local_set(0);
                                f.local_get(steps).i32_const(1).num(NumOp::I32Add);
                                f.local_set(steps).br(0);
                            });
                        });
                        f.local_get(steps);
                    },
                )?;
            }
            Program::SumF64 => {
                b.function(
                    "sum_f64",
                    FuncType::new([ValType::I32], Some(ValType::F64)),
                    |f| {
                        let i = f.local(ValType::I32);
                        let acc = f.local(ValType::F64);
                        f.block(None, |f| {
                            f.loop_(None, |f| {
                                f.local_get(i).local_get(0).num(NumOp::I32GeS).br_if(1);
                                f.local_get(acc);
                                f.local_get(i).num(NumOp::F64ConvertI32S);
                                f.f64_const(0.5).num(NumOp::F64Mul).num(NumOp::F64Add);
                                f.local_set(acc);
                                f.local_get(i).i32_const(1).num(NumOp::I32Add).local_set(i);
                                f.br(0);
                            });
                        });
                        f.local_get(acc);
                    },
                )?;
            }
        }
        Ok(b.finish()?)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            program,
            args,
            fuel,
            max_call_depth,
            count_loops,
        } => run(program, &args, fuel, max_call_depth, count_loops),
        Command::Dump { program } => dump(program),
    }
}

fn run(
    program: Program,
    args: &[String],
    fuel: Option<u64>,
    max_call_depth: u32,
    count_loops: bool,
) -> anyhow::Result<()> {
    let module = Arc::new(program.build()?);
    let config = Config::new().fuel(fuel).max_call_depth(max_call_depth);
    let instance = Instance::new(&Engine::new(config), module.clone());

    let name = program.name();
    let func = module
        .export(name)
        .ok_or_else(|| anyhow::anyhow!("export {name} not found"))?;
    let params = module
        .get_func(func)
        .map(|f| f.code().ty().params().to_vec())
        .unwrap_or_default();
    if params.len() != args.len() {
        anyhow::bail!("{name} takes {} arguments, got {}", params.len(), args.len());
    }
    let args = params
        .iter()
        .zip(args)
        .map(|(ty, arg)| parse_arg(*ty, arg))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut counter = LoopCounter::new();
    let result = instance.call_observed(name, &args, &mut counter)?;
    match result {
        Some(val) => println!("{val}"),
        None => println!("()"),
    }

    if count_loops {
        for (func, label, count) in counter.loops() {
            println!("{func} {label}: {count}");
        }
    }
    Ok(())
}

fn parse_arg(ty: ValType, arg: &str) -> anyhow::Result<Val> {
    let val = match ty {
        ValType::I32 => Val::I32(arg.parse()?),
        ValType::I64 => Val::I64(arg.parse()?),
        ValType::F32 => Val::F32(arg.parse()?),
        ValType::F64 => Val::F64(arg.parse()?),
    };
    Ok(val)
}

fn dump(program: Program) -> anyhow::Result<()> {
    let module = program.build()?;
    for func in module.func_indices() {
        if let Some(text) = module.dump_func(func) {
            print!("{text}");
        }
    }
    Ok(())
}
