use super::{
    instruction,
    section::{ExternalKind, SectionCode},
};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportDesc {
    Func(u32),
    /// Table, memory and global descriptors are kept as their encoded bytes.
    Table(Vec<u8>),
    Memory(Vec<u8>),
    Global(Vec<u8>),
}

impl ImportDesc {
    pub fn kind(&self) -> ExternalKind {
        match self {
            ImportDesc::Func(_) => ExternalKind::Func,
            ImportDesc::Table(_) => ExternalKind::Table,
            ImportDesc::Memory(_) => ExternalKind::Memory,
            ImportDesc::Global(_) => ExternalKind::Global,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub module: String,
    pub field: String,
    pub desc: ImportDesc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportDesc {
    Func(u32),
    Table(u32),
    Memory(u32),
    Global(u32),
}

impl ExportDesc {
    pub fn new(kind: ExternalKind, idx: u32) -> Self {
        match kind {
            ExternalKind::Func => ExportDesc::Func(idx),
            ExternalKind::Table => ExportDesc::Table(idx),
            ExternalKind::Memory => ExportDesc::Memory(idx),
            ExternalKind::Global => ExportDesc::Global(idx),
        }
    }

    pub fn kind(&self) -> ExternalKind {
        match self {
            ExportDesc::Func(_) => ExternalKind::Func,
            ExportDesc::Table(_) => ExternalKind::Table,
            ExportDesc::Memory(_) => ExternalKind::Memory,
            ExportDesc::Global(_) => ExternalKind::Global,
        }
    }

    pub fn index(&self) -> u32 {
        match *self {
            ExportDesc::Func(idx)
            | ExportDesc::Table(idx)
            | ExportDesc::Memory(idx)
            | ExportDesc::Global(idx) => idx,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub name: String,
    pub desc: ExportDesc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementMode {
    /// Copied into a table at instantiation. `table_idx` is `None` when the
    /// segment uses the implicit table 0 encoding.
    Active {
        table_idx: Option<u32>,
        /// Offset expression, including its terminating `end`.
        offset: Vec<u8>,
    },
    Passive,
    Declarative,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementInit {
    FuncIdxs(Vec<u32>),
    /// Constant expressions such as `ref.func` or `ref.null`, each ending
    /// with `end`.
    Exprs(Vec<Vec<u8>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSegment {
    pub mode: ElementMode,
    /// The element kind byte for index vectors, the reference type for
    /// expressions. Not encoded for active segments on the implicit table.
    pub kind: u8,
    pub init: ElementInit,
}

impl ElementSegment {
    pub const FUNCREF: u8 = 0x70;
    pub const ELEM_KIND_FUNC: u8 = 0x00;

    /// The segment flags this segment encodes as, 0 through 7.
    pub fn flags(&self) -> u32 {
        let mode = match self.mode {
            ElementMode::Active {
                table_idx: None, ..
            } => 0,
            ElementMode::Passive => 1,
            ElementMode::Active {
                table_idx: Some(_), ..
            } => 2,
            ElementMode::Declarative => 3,
        };
        match self.init {
            ElementInit::FuncIdxs(_) => mode,
            ElementInit::Exprs(_) => mode | 0x04,
        }
    }

    /// Every function this segment refers to, in the offset expression and
    /// the initializers.
    pub fn func_refs(&self) -> Result<Vec<u32>> {
        let mut refs = vec![];
        if let ElementMode::Active { offset, .. } = &self.mode {
            refs.extend(instruction::expr_func_refs(offset)?);
        }
        match &self.init {
            ElementInit::FuncIdxs(idxs) => refs.extend(idxs.iter().copied()),
            ElementInit::Exprs(exprs) => {
                for expr in exprs {
                    refs.extend(instruction::expr_func_refs(expr)?);
                }
            }
        }
        Ok(refs)
    }
}

/// A code entry: local declarations, instructions and the trailing `end`.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct FuncBody {
    pub raw: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSection {
    pub code: SectionCode,
    pub payload: Vec<u8>,
    /// The last non-custom section read before this one. Only meaningful for
    /// custom sections, which may appear anywhere.
    pub after: Option<SectionCode>,
}
