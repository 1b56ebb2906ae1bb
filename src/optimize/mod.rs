//! Dead function elimination.
//!
//! A function survives if it is reachable through direct calls from the
//! root set: exported functions, the start function, and everything placed
//! in a table by an element segment. Imported functions are never removed.

pub mod graph;
pub mod reindex;
pub mod rewrite;

use std::{borrow::Cow, fmt};

use log::{debug, trace};

use crate::{binary::module::Module, error::Result};
use reindex::Reindex;

#[derive(Debug, Default, Clone)]
pub struct Options {
    /// Functions to keep in addition to the module's own roots, e.g. ones the
    /// host places in a table at runtime.
    pub extra_roots: Vec<u32>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Imported and local functions of the input module.
    pub total_functions: usize,
    pub removed_functions: usize,
    pub original_size: usize,
    pub optimized_size: usize,
}

impl Stats {
    pub fn saved_bytes(&self) -> usize {
        self.original_size.saturating_sub(self.optimized_size)
    }

    pub fn saved_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        self.saved_bytes() as f64 / self.original_size as f64 * 100.0
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total functions:    {}", self.total_functions)?;
        writeln!(f, "Removed functions:  {}", self.removed_functions)?;
        writeln!(f, "Original size:      {} bytes", self.original_size)?;
        write!(f, "Optimized size:     {} bytes", self.optimized_size)?;
        if self.original_size > 0 {
            write!(
                f,
                "\nSaved:              {} bytes ({:.1}%)",
                self.saved_bytes(),
                self.saved_percent()
            )?;
        }
        Ok(())
    }
}

/// Removes every local function unreachable from the module's roots.
///
/// When nothing is removed the input is returned as is.
pub fn eliminate(wasm: &[u8]) -> Result<(Cow<'_, [u8]>, Stats)> {
    eliminate_with(wasm, &Options::default())
}

pub fn eliminate_with<'a>(wasm: &'a [u8], options: &Options) -> Result<(Cow<'a, [u8]>, Stats)> {
    let mut module = Module::new(wasm)?;
    let total_functions = module.func_count() as usize;

    let mut roots = graph::root_set(&module)?;
    roots.extend(options.extra_roots.iter().copied());
    let reachable = graph::mark_reachable(&module, &roots)?;
    debug!(
        "{} roots, {} of {} functions reachable",
        roots.len(),
        reachable.len(),
        total_functions
    );

    let reindex = Reindex::build(&module, &reachable);
    if reindex.removed() == 0 {
        let stats = Stats {
            total_functions,
            removed_functions: 0,
            original_size: wasm.len(),
            optimized_size: wasm.len(),
        };
        return Ok((Cow::Borrowed(wasm), stats));
    }

    for &local in reindex.dead() {
        trace!(
            "removing function {}",
            module.num_imported_funcs as usize + local
        );
    }

    rewrite::rewrite(&mut module, &reindex).map_err(|e| e.context("rewriting module"))?;
    let out = module
        .encode()
        .map_err(|e| e.context("reassembling module"))?;

    let stats = Stats {
        total_functions,
        removed_functions: reindex.removed(),
        original_size: wasm.len(),
        optimized_size: out.len(),
    };
    debug!(
        "removed {} functions, {} -> {} bytes",
        stats.removed_functions, stats.original_size, stats.optimized_size
    );

    Ok((Cow::Owned(out), stats))
}
