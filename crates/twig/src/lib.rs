mod code;
mod diag;
mod engine;
mod instance;
mod interpreter;
mod module;
mod node;
mod stack;
mod value;

pub use code::{CodeEntry, FuncIdx, FuncType, Label, LabelIdx, LabelKind};
pub use diag::Fault;
pub use engine::{Config, DEFAULT_MAX_CALL_DEPTH, Engine};
pub use instance::Instance;
pub use interpreter::Trap;
pub use interpreter::observe::{LoopCounter, NoopObserver, Observer};
pub use module::{BuildError, FuncBuilder, Function, MAX_NESTING, Module, ModuleBuilder};
pub use node::{BrTarget, Node, NumOp, NumSig};
pub use value::{Val, ValType, WasmArgs, WasmResults, WasmVal, decode, encode};
