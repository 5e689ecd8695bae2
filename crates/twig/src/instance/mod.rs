use std::sync::Arc;

use crate::code::FuncIdx;
use crate::engine::{Config, Engine};
use crate::interpreter::observe::{NoopObserver, Observer};
use crate::interpreter::{self, Context};
use crate::module::Module;
use crate::value::{Val, WasmArgs, WasmResults};

/// A module bound to an engine's limits.
///
/// Every invocation runs over its own frames, so one instance can be
/// called from many threads at once.
#[derive(Debug, Clone)]
pub struct Instance {
    module: Arc<Module>,
    config: Config,
}

impl Instance {
    pub fn new(engine: &Engine, module: Arc<Module>) -> Self {
        Instance {
            module,
            config: engine.config().clone(),
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Call an exported function by name (typed API).
    pub fn call<A: WasmArgs, R: WasmResults>(&self, name: &str, args: A) -> anyhow::Result<R> {
        let result = self.call_dynamic(name, &args.to_vals())?;
        R::from_result(result)
    }

    /// Call an exported function by name (dynamic API).
    pub fn call_dynamic(&self, name: &str, args: &[Val]) -> anyhow::Result<Option<Val>> {
        self.call_observed(name, args, &mut NoopObserver)
    }

    /// Call an exported function, reporting execution events to `observer`.
    pub fn call_observed<O: Observer>(
        &self,
        name: &str,
        args: &[Val],
        observer: &mut O,
    ) -> anyhow::Result<Option<Val>> {
        let func = self.resolve_export(name)?;
        self.call_func(func, args, observer)
    }

    /// Call any function by index, exported or not.
    pub fn call_func<O: Observer>(
        &self,
        func: FuncIdx,
        args: &[Val],
        observer: &mut O,
    ) -> anyhow::Result<Option<Val>> {
        self.check_args(func, args)?;
        let mut ctx = Context::new(&self.module, &self.config, observer);
        Ok(interpreter::invoke(&mut ctx, func, args)?)
    }

    fn resolve_export(&self, name: &str) -> anyhow::Result<FuncIdx> {
        self.module
            .export(name)
            .ok_or_else(|| anyhow::anyhow!("export {name} not found"))
    }

    fn check_args(&self, func: FuncIdx, args: &[Val]) -> anyhow::Result<()> {
        let Some(function) = self.module.get_func(func) else {
            anyhow::bail!("unknown function {func}");
        };
        let params = function.code.ty().params();
        if params.len() != args.len() {
            anyhow::bail!(
                "{func} takes {} arguments, got {}",
                params.len(),
                args.len()
            );
        }
        for (i, (param, arg)) in params.iter().zip(args).enumerate() {
            if *param != arg.ty() {
                anyhow::bail!("argument {i} of {func}: expected {param}, got {}", arg.ty());
            }
        }
        Ok(())
    }
}
