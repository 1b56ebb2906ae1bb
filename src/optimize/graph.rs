use std::collections::{BTreeSet, HashSet, VecDeque};

use crate::{
    binary::{
        instruction::{self, Visitor},
        module::Module,
        types::ExportDesc,
    },
    error::{Error, Result},
};

/// Functions that must survive regardless of the call graph: function
/// exports, the start function and every function an element segment
/// refers to, whether active, passive or declarative.
///
/// Element entries are kept because `call_indirect` targets cannot be
/// resolved statically. Two cases are not covered and need their functions
/// passed as extra roots: a table filled at runtime by the host, and a
/// `ref.func` in a global initializer, since the global section is copied
/// without being decoded.
pub fn root_set(module: &Module) -> Result<BTreeSet<u32>> {
    let mut roots = BTreeSet::new();

    for export in &module.exports {
        if let ExportDesc::Func(idx) = export.desc {
            roots.insert(idx);
        }
    }

    roots.extend(module.start);

    for (i, segment) in module.elements.iter().enumerate() {
        let refs = segment
            .func_refs()
            .map_err(|e| e.context(&format!("element segment {i}")))?;
        roots.extend(refs);
    }

    Ok(roots)
}

#[derive(Default)]
struct CallTargets(BTreeSet<u32>);

impl Visitor for CallTargets {
    fn func_index(&mut self, _opcode: u8, idx: u32) {
        self.0.insert(idx);
    }
}

/// Functions referenced directly from a body. `call_indirect` adds nothing.
pub fn scan_calls(body: &[u8]) -> Result<BTreeSet<u32>> {
    let mut targets = CallTargets::default();
    instruction::walk_body(body, &mut targets)?;
    Ok(targets.0)
}

/// Breadth-first walk of the call graph from `roots`.
pub fn mark_reachable(module: &Module, roots: &BTreeSet<u32>) -> Result<HashSet<u32>> {
    let count = module.func_count();
    let mut reachable = HashSet::with_capacity(roots.len());
    let mut worklist = VecDeque::with_capacity(roots.len());

    for &root in roots {
        if root >= count {
            return Err(Error::invalid(format!(
                "root function {root} is outside the {count} functions of the module"
            )));
        }
        if reachable.insert(root) {
            worklist.push_back(root);
        }
    }

    while let Some(idx) = worklist.pop_front() {
        // imports have no body
        let Some(body) = module.local_body(idx) else {
            continue;
        };

        let targets = scan_calls(&body.raw).map_err(|e| e.context(&format!("function {idx}")))?;
        for target in targets {
            if target >= count {
                return Err(Error::invalid(format!(
                    "function {idx} calls function {target}, but only {count} exist"
                )));
            }
            if reachable.insert(target) {
                worklist.push_back(target);
            }
        }
    }

    Ok(reachable)
}
