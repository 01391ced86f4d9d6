//! Textual formatting for backend modules.
//!
//! This module provides a Wadler-style pretty printer for modules. The format
//! is not intended to be consumed programmatically; it exists so a module can
//! be read by a human at any point between the passes. It holds no backwards
//! compatibility guarantees.

use crate::cfg::{BasicBlock, Procedure};
use crate::{Module, Symbol};
use cinder_diagnostics::ice;
use pretty::{Arena, DocAllocator, DocBuilder};

#[derive(Default)]
pub struct ModuleTextualPass<'a> {
    arena: Arena<'a>,
}

pub type Document<'a> = DocBuilder<'a, Arena<'a>>;

impl<'a> ModuleTextualPass<'a> {
    /// Render a whole module to a string.
    pub fn format_module_to_string(module: &Module) -> String {
        let pass = ModuleTextualPass::default();
        let doc = pass.visit_module(module);
        let mut w = Vec::new();
        doc.render(80, &mut w)
            .unwrap_or_else(|_| ice!("failed to render module"));
        String::from_utf8(w).unwrap()
    }

    pub fn visit_module(&'a self, module: &Module) -> Document<'a> {
        let symbols = module.globals.values().map(|symbol| self.visit_symbol(symbol));
        self.arena
            .text(format!("module {}", module.name))
            .append(self.arena.space())
            .append(self.arena.text("{"))
            .append(
                self.arena
                    .hardline()
                    .append(self.arena.intersperse(symbols, self.arena.hardline()))
                    .nest(2),
            )
            .append(self.arena.hardline())
            .append(self.arena.text("}"))
    }

    fn visit_symbol(&'a self, symbol: &Symbol) -> Document<'a> {
        match symbol {
            Symbol::Procedure(proc) => self.visit_procedure(proc),
            Symbol::Data(data) => self.arena.text(format!("data {}[{}]", data.name, data.size)),
        }
    }

    fn visit_procedure(&'a self, proc: &Procedure) -> Document<'a> {
        let args = proc
            .args
            .iter()
            .map(|param| format!("{}: {}", param.name, param.ty))
            .collect::<Vec<_>>()
            .join(", ");
        let mut header = format!("proc {}({})", proc.name, args);
        if !proc.rets.is_empty() {
            let rets = proc
                .rets
                .iter()
                .map(|ty| ty.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            header.push_str(&format!(" -> ({})", rets));
        }
        let blocks = proc.blocks.iter().map(|block| self.visit_block(block));
        self.arena
            .text(header)
            .append(self.arena.space())
            .append(self.arena.text("{"))
            .append(
                self.arena
                    .hardline()
                    .append(self.arena.intersperse(blocks, self.arena.hardline()))
                    .nest(2),
            )
            .append(self.arena.hardline())
            .append(self.arena.text("}"))
    }

    fn visit_block(&'a self, block: &BasicBlock) -> Document<'a> {
        let mut lines = block
            .code
            .iter()
            .map(|instr| self.arena.text(instr.to_string()))
            .collect::<Vec<_>>();
        lines.push(self.arena.text(block.terminator.to_string()));
        self.arena
            .text(format!("{}:", block.label))
            .append(
                self.arena
                    .hardline()
                    .append(self.arena.intersperse(lines, self.arena.hardline()))
                    .nest(2),
            )
    }
}
