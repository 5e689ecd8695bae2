mod builder;
#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::fmt::Write;

pub use builder::{BuildError, FuncBuilder, MAX_NESTING, ModuleBuilder};

use crate::code::{CodeEntry, FuncIdx};
use crate::node::Node;

/// A function ready to run: its static layout and its control tree.
#[derive(Debug, Clone)]
pub struct Function {
    pub(crate) code: CodeEntry,
    /// A `Node::Block` carrying the function label.
    pub(crate) body: Node,
}

impl Function {
    pub fn code(&self) -> &CodeEntry {
        &self.code
    }

    pub fn body(&self) -> &Node {
        &self.body
    }
}

/// A set of built functions (immutable, shareable across threads).
#[derive(Debug, Clone)]
pub struct Module {
    pub(crate) funcs: Box<[Function]>,
    pub(crate) exports: HashMap<String, FuncIdx>,
}

impl Module {
    pub fn builder() -> ModuleBuilder {
        ModuleBuilder::new()
    }

    #[inline(always)]
    pub fn get_func(&self, func: FuncIdx) -> Option<&Function> {
        self.funcs.get(func.0 as usize)
    }

    pub fn export(&self, name: &str) -> Option<FuncIdx> {
        self.exports.get(name).copied()
    }

    pub fn func_indices(&self) -> impl Iterator<Item = FuncIdx> {
        (0..self.funcs.len() as u32).map(FuncIdx)
    }

    /// Render a function's layout and control tree (for debugging).
    pub fn dump_func(&self, func: FuncIdx) -> Option<String> {
        let function = self.get_func(func)?;
        let code = &function.code;
        let mut out = String::new();
        let _ = writeln!(out, "=== {func} ===");
        let _ = writeln!(
            out,
            "params: {:?}, result: {:?}, locals: {:?}",
            code.ty().params(),
            code.result(),
            code.locals()
        );
        let _ = writeln!(
            out,
            "max stack depth: {}, max nesting: {}",
            code.max_stack_depth, code.max_nesting
        );
        let _ = writeln!(out, "\n--- labels ({}) ---", code.labels.len());
        for (i, label) in code.labels.iter().enumerate() {
            let _ = writeln!(out, "  [{i}] {label:?}");
        }
        let _ = writeln!(out, "\n--- body ---");
        dump_node(&mut out, &function.body, 1);
        Some(out)
    }
}

fn dump_node(out: &mut String, node: &Node, indent: usize) {
    let pad = "  ".repeat(indent);
    match node {
        Node::Block { label, body } => {
            let _ = writeln!(out, "{pad}block {label}");
            dump_seq(out, body, indent + 1);
        }
        Node::Loop { label, body } => {
            let _ = writeln!(out, "{pad}loop {label}");
            dump_seq(out, body, indent + 1);
        }
        Node::If {
            label,
            then,
            otherwise,
        } => {
            let _ = writeln!(out, "{pad}if {label}");
            dump_seq(out, then, indent + 1);
            if !otherwise.is_empty() {
                let _ = writeln!(out, "{pad}else");
                dump_seq(out, otherwise, indent + 1);
            }
        }
        other => {
            let _ = writeln!(out, "{pad}{other:?}");
        }
    }
}

fn dump_seq(out: &mut String, nodes: &[Node], indent: usize) {
    for node in nodes {
        dump_node(out, node, indent);
    }
}
