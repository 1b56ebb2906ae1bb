use log::warn;

use super::reindex::Reindex;
use crate::{
    binary::{
        instruction::{self, Visitor},
        leb128::write_u32,
        module::Module,
        types::{ElementInit, ElementMode, ElementSegment, ExportDesc, FuncBody},
    },
    error::Result,
};

impl Reindex {
    /// Maps `old`, keeping it unchanged if it has no new index.
    pub(crate) fn resolve(&self, old: u32) -> u32 {
        self.get(old).unwrap_or_else(|| {
            warn!("function {old} has no new index, keeping it");
            old
        })
    }
}

struct Relocate<'r> {
    reindex: &'r Reindex,
    out: Vec<u8>,
}

impl Visitor for Relocate<'_> {
    fn copy(&mut self, bytes: &[u8]) {
        self.out.extend_from_slice(bytes);
    }

    fn func_index(&mut self, _opcode: u8, idx: u32) {
        write_u32(&mut self.out, self.reindex.resolve(idx));
    }
}

/// Re-encodes a body with every function-index operand renumbered. All other
/// bytes are copied as they are.
pub fn rewrite_body(body: &[u8], reindex: &Reindex) -> Result<Vec<u8>> {
    let mut relocate = Relocate {
        reindex,
        out: Vec::with_capacity(body.len()),
    };
    instruction::walk_body(body, &mut relocate)?;
    Ok(relocate.out)
}

/// Drops dead functions and renumbers every function reference left in the
/// module: call operands, function exports, the start function and element
/// segments.
pub fn rewrite(module: &mut Module, reindex: &Reindex) -> Result<()> {
    let func_types = std::mem::take(&mut module.func_types);
    let bodies = std::mem::take(&mut module.bodies);

    for (local, (type_idx, body)) in func_types.into_iter().zip(bodies).enumerate() {
        if reindex.is_dead(local) {
            continue;
        }
        let raw = rewrite_body(&body.raw, reindex)
            .map_err(|e| e.context(&format!("function {}", module.num_imported_funcs as usize + local)))?;
        module.func_types.push(type_idx);
        module.bodies.push(FuncBody { raw });
    }

    for export in &mut module.exports {
        if let ExportDesc::Func(idx) = &mut export.desc {
            *idx = reindex.resolve(*idx);
        }
    }

    if let Some(idx) = &mut module.start {
        *idx = reindex.resolve(*idx);
    }

    for (i, segment) in module.elements.iter_mut().enumerate() {
        rewrite_segment(segment, reindex).map_err(|e| e.context(&format!("element segment {i}")))?;
    }

    Ok(())
}

fn rewrite_expr(expr: &[u8], reindex: &Reindex) -> Result<Vec<u8>> {
    let mut relocate = Relocate {
        reindex,
        out: Vec::with_capacity(expr.len()),
    };
    instruction::walk_expr(expr, &mut relocate)?;
    Ok(relocate.out)
}

fn rewrite_segment(segment: &mut ElementSegment, reindex: &Reindex) -> Result<()> {
    if let ElementMode::Active { offset, .. } = &mut segment.mode {
        *offset = rewrite_expr(offset, reindex)?;
    }
    match &mut segment.init {
        ElementInit::FuncIdxs(idxs) => {
            for idx in idxs {
                *idx = reindex.resolve(*idx);
            }
        }
        ElementInit::Exprs(exprs) => {
            for expr in exprs {
                *expr = rewrite_expr(expr, reindex)?;
            }
        }
    }
    Ok(())
}
