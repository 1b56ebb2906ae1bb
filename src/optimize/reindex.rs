use std::collections::{BTreeSet, HashMap, HashSet};

use crate::binary::module::Module;

/// Old function index to new function index after dead local functions are
/// dropped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reindex {
    map: HashMap<u32, u32>,
    /// Positions in `Module::bodies` of the functions being removed.
    dead: BTreeSet<usize>,
}

impl Reindex {
    /// Imports keep their index. Reachable local functions are renumbered
    /// densely in their original order; the others get no entry.
    pub fn build(module: &Module, reachable: &HashSet<u32>) -> Self {
        let mut reindex = Reindex::default();

        for idx in 0..module.num_imported_funcs {
            reindex.map.insert(idx, idx);
        }

        let mut next = module.num_imported_funcs;
        for local in 0..module.bodies.len() {
            let old = module.num_imported_funcs + local as u32;
            if reachable.contains(&old) {
                reindex.map.insert(old, next);
                next += 1;
            } else {
                reindex.dead.insert(local);
            }
        }

        reindex
    }

    pub fn get(&self, old: u32) -> Option<u32> {
        self.map.get(&old).copied()
    }

    pub fn dead(&self) -> &BTreeSet<usize> {
        &self.dead
    }

    pub fn is_dead(&self, local: usize) -> bool {
        self.dead.contains(&local)
    }

    pub fn removed(&self) -> usize {
        self.dead.len()
    }
}
