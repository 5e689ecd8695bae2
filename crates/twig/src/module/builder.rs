use std::collections::HashMap;

use thiserror::Error;

use super::{Function, Module};
use crate::code::{CodeEntry, FuncIdx, FuncType, Label, LabelIdx, LabelKind};
use crate::node::{BrTarget, Node, NumOp};
use crate::value::ValType;

/// Deepest block/loop/if nesting accepted in a body.
///
/// Scopes are executed by native recursion, so this bounds the native
/// stack used per guest call.
pub const MAX_NESTING: u32 = 256;

/// A body could not be built into a well-formed control tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("unknown function {0}")]
    UnknownFunction(u32),

    #[error("function {0} is already defined")]
    AlreadyDefined(u32),

    #[error("function {0} was declared but never defined")]
    Undefined(u32),

    #[error("duplicate export {0:?}")]
    DuplicateExport(String),

    #[error("unknown local {index} ({count} locals)")]
    UnknownLocal { index: u32, count: usize },

    #[error("branch depth {depth} exceeds enclosing nesting {nesting}")]
    BranchDepth { depth: u32, nesting: u32 },

    #[error("br_table targets carry different arities")]
    BrTableArity,

    #[error("nesting deeper than {MAX_NESTING} scopes")]
    NestingTooDeep,

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: ValType, found: ValType },

    #[error("operand stack underflow")]
    StackUnderflow,

    #[error("scope ends with {found} values, expected {expected}")]
    ScopeArity { expected: usize, found: usize },

    #[error("`if` with a result needs an `else` arm")]
    MissingElse,
}

/// Collects function declarations and bodies into a [`Module`].
///
/// Functions are declared first so bodies can call any function,
/// including themselves, by index.
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    types: Vec<FuncType>,
    bodies: Vec<Option<Function>>,
    exports: HashMap<String, FuncIdx>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, ty: FuncType) -> FuncIdx {
        let idx = FuncIdx(self.types.len() as u32);
        self.types.push(ty);
        self.bodies.push(None);
        idx
    }

    pub fn export(&mut self, name: impl Into<String>, func: FuncIdx) -> Result<(), BuildError> {
        if func.0 as usize >= self.types.len() {
            return Err(BuildError::UnknownFunction(func.0));
        }
        let name = name.into();
        if self.exports.contains_key(&name) {
            return Err(BuildError::DuplicateExport(name));
        }
        self.exports.insert(name, func);
        Ok(())
    }

    /// Build the body of a declared function.
    pub fn define(
        &mut self,
        func: FuncIdx,
        build: impl FnOnce(&mut FuncBuilder<'_>),
    ) -> Result<(), BuildError> {
        let slot = func.0 as usize;
        match self.bodies.get(slot) {
            None => return Err(BuildError::UnknownFunction(func.0)),
            Some(Some(_)) => return Err(BuildError::AlreadyDefined(func.0)),
            Some(None) => {}
        }
        let mut builder = FuncBuilder::new(func, &self.types);
        build(&mut builder);
        let function = builder.finish()?;
        self.bodies[slot] = Some(function);
        Ok(())
    }

    /// Declare, export and define a function in one step.
    pub fn function(
        &mut self,
        name: impl Into<String>,
        ty: FuncType,
        build: impl FnOnce(&mut FuncBuilder<'_>),
    ) -> Result<FuncIdx, BuildError> {
        let func = self.declare(ty);
        self.export(name, func)?;
        self.define(func, build)?;
        Ok(func)
    }

    pub fn finish(self) -> Result<Module, BuildError> {
        let funcs = self
            .bodies
            .into_iter()
            .enumerate()
            .map(|(i, body)| body.ok_or(BuildError::Undefined(i as u32)))
            .collect::<Result<Box<[Function]>, _>>()?;
        tracing::debug!(funcs = funcs.len(), exports = self.exports.len(), "module built");
        Ok(Module {
            funcs,
            exports: self.exports,
        })
    }
}

/// An open scope while its body is being built.
#[derive(Debug)]
struct Scope {
    label: LabelIdx,
    nodes: Vec<Node>,
    /// Operand types pushed inside this scope, bottom first.
    operands: Vec<ValType>,
    /// Set after an unconditional transfer. Later nodes in the scope never
    /// run, so their operands are not tracked.
    unreachable: bool,
}

/// Builds one function body, tracking operand types to compute the
/// static stack bound and to reject ill-typed trees.
///
/// The first error is kept and reported by `define`; later calls are
/// ignored.
pub struct FuncBuilder<'m> {
    func: FuncIdx,
    types: &'m [FuncType],
    locals: Vec<ValType>,
    labels: Vec<Label>,
    scopes: Vec<Scope>,
    max_stack_depth: usize,
    max_nesting: u32,
    error: Option<BuildError>,
}

impl<'m> FuncBuilder<'m> {
    fn new(func: FuncIdx, types: &'m [FuncType]) -> Self {
        let ty = &types[func.0 as usize];
        let mut builder = FuncBuilder {
            func,
            types,
            locals: ty.params().to_vec(),
            labels: Vec::new(),
            scopes: Vec::new(),
            max_stack_depth: 0,
            max_nesting: 0,
            error: None,
        };
        let label = builder.new_label(LabelKind::Function, ty.result());
        builder.open(label);
        builder
    }

    fn ty(&self) -> &'m FuncType {
        &self.types[self.func.0 as usize]
    }

    /// Declare a local of type `ty`, returning its index.
    pub fn local(&mut self, ty: ValType) -> u32 {
        self.locals.push(ty);
        (self.locals.len() - 1) as u32
    }

    // --- Constants and leaves ---

    pub fn i32_const(&mut self, v: i32) -> &mut Self {
        self.leaf(Node::i32_const(v), &[], Some(ValType::I32))
    }

    pub fn i64_const(&mut self, v: i64) -> &mut Self {
        self.leaf(Node::i64_const(v), &[], Some(ValType::I64))
    }

    pub fn f32_const(&mut self, v: f32) -> &mut Self {
        self.leaf(Node::f32_const(v), &[], Some(ValType::F32))
    }

    pub fn f64_const(&mut self, v: f64) -> &mut Self {
        self.leaf(Node::f64_const(v), &[], Some(ValType::F64))
    }

    pub fn num(&mut self, op: NumOp) -> &mut Self {
        let sig = op.signature();
        self.leaf(Node::Num(op), sig.operands, Some(sig.result))
    }

    pub fn nop(&mut self) -> &mut Self {
        self.leaf(Node::Nop, &[], None)
    }

    pub fn unreachable(&mut self) -> &mut Self {
        if self.error.is_none() {
            self.emit(Node::Unreachable);
            self.mark_unreachable();
        }
        self
    }

    pub fn drop(&mut self) -> &mut Self {
        if self.error.is_none() {
            self.pop_any();
            self.emit(Node::Drop);
        }
        self
    }

    pub fn select(&mut self) -> &mut Self {
        if self.error.is_none() {
            self.pop(ValType::I32);
            let ty = self.pop_any();
            if let Some(ty) = ty {
                self.pop(ty);
            }
            self.emit(Node::Select);
            if let Some(ty) = ty {
                self.push(ty);
            }
        }
        self
    }

    // --- Locals ---

    pub fn local_get(&mut self, index: u32) -> &mut Self {
        if let Some(ty) = self.local_type(index) {
            self.leaf(Node::LocalGet(index), &[], Some(ty));
        }
        self
    }

    pub fn local_set(&mut self, index: u32) -> &mut Self {
        if let Some(ty) = self.local_type(index) {
            self.leaf(Node::LocalSet(index), &[ty], None);
        }
        self
    }

    pub fn local_tee(&mut self, index: u32) -> &mut Self {
        if let Some(ty) = self.local_type(index) {
            self.leaf(Node::LocalTee(index), &[ty], Some(ty));
        }
        self
    }

    // --- Calls ---

    pub fn call(&mut self, callee: FuncIdx) -> &mut Self {
        let types = self.types;
        match types.get(callee.0 as usize) {
            Some(ty) => self.leaf(Node::Call(callee), ty.params(), ty.result()),
            None => self.fail(BuildError::UnknownFunction(callee.0)),
        }
    }

    // --- Structured control ---

    pub fn block(&mut self, result: Option<ValType>, body: impl FnOnce(&mut Self)) -> &mut Self {
        if self.error.is_some() {
            return self;
        }
        let label = self.new_label(LabelKind::Block, result);
        self.open(label);
        body(self);
        if let Some(body) = self.close() {
            self.emit(Node::Block { label, body });
            self.push_result(result);
        }
        self
    }

    /// A loop. Branching to its label re-enters the body from the top.
    pub fn loop_(&mut self, result: Option<ValType>, body: impl FnOnce(&mut Self)) -> &mut Self {
        if self.error.is_some() {
            return self;
        }
        let label = self.new_label(LabelKind::Loop, result);
        self.open(label);
        body(self);
        if let Some(body) = self.close() {
            self.emit(Node::Loop { label, body });
            self.push_result(result);
        }
        self
    }

    /// An `if` with no `else` arm. Building fails if `result` is set,
    /// since the missing arm could not produce it.
    pub fn if_(&mut self, result: Option<ValType>, then: impl FnOnce(&mut Self)) -> &mut Self {
        self.if_arms(result, then, None::<fn(&mut Self)>)
    }

    pub fn if_else(
        &mut self,
        result: Option<ValType>,
        then: impl FnOnce(&mut Self),
        otherwise: impl FnOnce(&mut Self),
    ) -> &mut Self {
        self.if_arms(result, then, Some(otherwise))
    }

    fn if_arms(
        &mut self,
        result: Option<ValType>,
        then: impl FnOnce(&mut Self),
        otherwise: Option<impl FnOnce(&mut Self)>,
    ) -> &mut Self {
        if self.error.is_some() {
            return self;
        }
        if result.is_some() && otherwise.is_none() {
            return self.fail(BuildError::MissingElse);
        }
        self.pop(ValType::I32);
        let label = self.new_label(LabelKind::If, result);

        self.open(label);
        then(self);
        let Some(then) = self.close() else {
            return self;
        };

        self.open(label);
        if let Some(otherwise) = otherwise {
            otherwise(self);
        }
        let Some(otherwise) = self.close() else {
            return self;
        };

        self.emit(Node::If {
            label,
            then,
            otherwise,
        });
        self.push_result(result);
        self
    }

    // --- Branches ---

    pub fn br(&mut self, depth: u32) -> &mut Self {
        if let Some(target) = self.resolve(depth) {
            if let Some(ty) = self.branch_type(target) {
                self.pop(ty);
            }
            self.emit(Node::Br(target));
            self.mark_unreachable();
        }
        self
    }

    pub fn br_if(&mut self, depth: u32) -> &mut Self {
        if let Some(target) = self.resolve(depth) {
            self.pop(ValType::I32);
            let ty = self.branch_type(target);
            if let Some(ty) = ty {
                self.pop(ty);
            }
            self.emit(Node::BrIf(target));
            if let Some(ty) = ty {
                self.push(ty);
            }
        }
        self
    }

    pub fn br_table(&mut self, depths: &[u32], default: u32) -> &mut Self {
        let Some(default) = self.resolve(default) else {
            return self;
        };
        let ty = self.branch_type(default);
        let mut targets = Vec::with_capacity(depths.len());
        for &depth in depths {
            let Some(target) = self.resolve(depth) else {
                return self;
            };
            if self.branch_type(target) != ty {
                return self.fail(BuildError::BrTableArity);
            }
            targets.push(target);
        }
        self.pop(ValType::I32);
        if let Some(ty) = ty {
            self.pop(ty);
        }
        self.emit(Node::BrTable {
            targets: targets.into(),
            default,
        });
        self.mark_unreachable();
        self
    }

    pub fn ret(&mut self) -> &mut Self {
        if self.error.is_none() {
            if let Some(ty) = self.ty().result() {
                self.pop(ty);
            }
            self.emit(Node::Return);
            self.mark_unreachable();
        }
        self
    }

    // --- Internals ---

    fn fail(&mut self, error: BuildError) -> &mut Self {
        if self.error.is_none() {
            self.error = Some(error);
        }
        self
    }

    /// Emit a node that pops `operands` (bottom first) and pushes `result`.
    fn leaf(&mut self, node: Node, operands: &[ValType], result: Option<ValType>) -> &mut Self {
        if self.error.is_some() {
            return self;
        }
        for ty in operands.iter().rev() {
            self.pop(*ty);
        }
        self.emit(node);
        self.push_result(result);
        self
    }

    fn emit(&mut self, node: Node) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.nodes.push(node);
        }
    }

    fn new_label(&mut self, kind: LabelKind, result: Option<ValType>) -> LabelIdx {
        self.labels.push(Label { kind, result });
        LabelIdx((self.labels.len() - 1) as u32)
    }

    fn open(&mut self, label: LabelIdx) {
        let nesting = self.scopes.len() as u32;
        if nesting > MAX_NESTING {
            self.fail(BuildError::NestingTooDeep);
        }
        self.max_nesting = self.max_nesting.max(nesting);
        self.scopes.push(Scope {
            label,
            nodes: Vec::new(),
            operands: Vec::new(),
            unreachable: false,
        });
    }

    /// Pop the innermost scope, checking it left exactly its result.
    fn close(&mut self) -> Option<Box<[Node]>> {
        let scope = self.scopes.pop()?;
        if self.error.is_some() {
            return None;
        }
        let label = self.labels[scope.label.0 as usize];
        let result = label.result;
        // A body with no result may leave values behind; they die with the frame.
        let discards = label.kind == LabelKind::Function && result.is_none();
        if !scope.unreachable && !discards {
            let expected = result.is_some() as usize;
            if scope.operands.len() != expected {
                self.fail(BuildError::ScopeArity {
                    expected,
                    found: scope.operands.len(),
                });
                return None;
            }
            if let (Some(expected), Some(&found)) = (result, scope.operands.last()) {
                if expected != found {
                    self.fail(BuildError::TypeMismatch { expected, found });
                    return None;
                }
            }
        }
        Some(scope.nodes.into())
    }

    fn resolve(&mut self, depth: u32) -> Option<BrTarget> {
        if self.error.is_some() {
            return None;
        }
        let nesting = self.scopes.len() as u32;
        if depth >= nesting {
            self.fail(BuildError::BranchDepth { depth, nesting });
            return None;
        }
        let label = self.scopes[(nesting - 1 - depth) as usize].label;
        Some(BrTarget { depth, label })
    }

    /// Type carried by a branch to `target`, if any.
    fn branch_type(&self, target: BrTarget) -> Option<ValType> {
        let label = &self.labels[target.label.0 as usize];
        if label.branch_arity() == 0 {
            None
        } else {
            label.result
        }
    }

    fn local_type(&mut self, index: u32) -> Option<ValType> {
        if self.error.is_some() {
            return None;
        }
        match self.locals.get(index as usize) {
            Some(ty) => Some(*ty),
            None => {
                self.fail(BuildError::UnknownLocal {
                    index,
                    count: self.locals.len(),
                });
                None
            }
        }
    }

    fn mark_unreachable(&mut self) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.unreachable = true;
            scope.operands.clear();
        }
    }

    fn push_result(&mut self, result: Option<ValType>) {
        if let Some(ty) = result {
            self.push(ty);
        }
    }

    fn push(&mut self, ty: ValType) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        if scope.unreachable {
            return;
        }
        scope.operands.push(ty);
        let depth: usize = self.scopes.iter().map(|s| s.operands.len()).sum();
        self.max_stack_depth = self.max_stack_depth.max(depth);
    }

    fn pop(&mut self, expected: ValType) {
        if let Some(found) = self.pop_any() {
            if found != expected {
                self.fail(BuildError::TypeMismatch { expected, found });
            }
        }
    }

    /// Pop an operand of any type. `None` in unreachable code or on error.
    fn pop_any(&mut self) -> Option<ValType> {
        let scope = self.scopes.last_mut()?;
        if scope.unreachable {
            return None;
        }
        match scope.operands.pop() {
            Some(ty) => Some(ty),
            None => {
                self.fail(BuildError::StackUnderflow);
                None
            }
        }
    }

    fn finish(mut self) -> Result<Function, BuildError> {
        let body = self.close();
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        let body = body.ok_or(BuildError::StackUnderflow)?;
        let ty = self.ty().clone();
        let code = CodeEntry {
            func: self.func,
            ty,
            locals: self.locals.into(),
            labels: self.labels.into(),
            max_stack_depth: self.max_stack_depth,
            max_nesting: self.max_nesting,
        };
        Ok(Function {
            code,
            body: Node::Block {
                label: LabelIdx::FUNCTION,
                body,
            },
        })
    }
}
