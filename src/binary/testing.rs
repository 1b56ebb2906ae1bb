//! Byte-level module construction for tests that need inputs the text
//! format cannot express.

use super::{
    leb128::write_u32,
    module::{WASM_MAGIC, WASM_VERSION},
    section::{ExternalKind, SectionCode},
};

enum Slot {
    Known(SectionCode),
    Raw(SectionCode, Vec<u8>),
}

#[derive(Default)]
pub struct ModuleBuilder {
    layout: Vec<Slot>,
    types: Vec<Vec<u8>>,
    imports: Vec<Vec<u8>>,
    functions: Vec<u32>,
    exports: Vec<Vec<u8>>,
    start: Option<u32>,
    elements: Vec<Vec<u8>>,
    bodies: Vec<Vec<u8>>,
}

fn name(out: &mut Vec<u8>, name: &str) {
    write_u32(out, name.len() as u32);
    out.extend_from_slice(name.as_bytes());
}

fn vector(out: &mut Vec<u8>, entries: &[Vec<u8>]) {
    write_u32(out, entries.len() as u32);
    for entry in entries {
        out.extend_from_slice(entry);
    }
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn touch(&mut self, code: SectionCode) {
        let known = self
            .layout
            .iter()
            .any(|slot| matches!(slot, Slot::Known(c) if *c == code));
        if !known {
            self.layout.push(Slot::Known(code));
        }
    }

    /// Adds a `[] -> []` function type.
    pub fn func_type(mut self) -> Self {
        self.touch(SectionCode::Type);
        self.types.push(vec![0x60, 0x00, 0x00]);
        self
    }

    pub fn func_import(mut self, module: &str, field: &str, type_idx: u32) -> Self {
        self.touch(SectionCode::Import);
        let mut entry = vec![];
        name(&mut entry, module);
        name(&mut entry, field);
        entry.push(ExternalKind::Func as u8);
        write_u32(&mut entry, type_idx);
        self.imports.push(entry);
        self
    }

    /// Imports a memory with a minimum of one page.
    pub fn memory_import(mut self, module: &str, field: &str) -> Self {
        self.touch(SectionCode::Import);
        let mut entry = vec![];
        name(&mut entry, module);
        name(&mut entry, field);
        entry.extend_from_slice(&[ExternalKind::Memory as u8, 0x00, 0x01]);
        self.imports.push(entry);
        self
    }

    /// Adds a local function without locals; `code` excludes the final `end`.
    pub fn function(mut self, type_idx: u32, code: &[u8]) -> Self {
        self.touch(SectionCode::Function);
        self.touch(SectionCode::Code);
        self.functions.push(type_idx);
        let mut body = vec![0x00];
        body.extend_from_slice(code);
        body.push(0x0b);
        self.bodies.push(body);
        self
    }

    pub fn export(mut self, field: &str, func_idx: u32) -> Self {
        self.touch(SectionCode::Export);
        let mut entry = vec![];
        name(&mut entry, field);
        entry.push(ExternalKind::Func as u8);
        write_u32(&mut entry, func_idx);
        self.exports.push(entry);
        self
    }

    pub fn memory_export(mut self, field: &str, memory_idx: u32) -> Self {
        self.touch(SectionCode::Export);
        let mut entry = vec![];
        name(&mut entry, field);
        entry.push(ExternalKind::Memory as u8);
        write_u32(&mut entry, memory_idx);
        self.exports.push(entry);
        self
    }

    pub fn start(mut self, func_idx: u32) -> Self {
        self.touch(SectionCode::Start);
        self.start = Some(func_idx);
        self
    }

    /// Adds an active segment for table 0 at `i32.const offset`.
    pub fn element(mut self, offset: i32, func_idxs: &[u32]) -> Self {
        self.touch(SectionCode::Element);
        let mut entry = vec![0x00, 0x41];
        super::leb128::write_i32(&mut entry, offset);
        entry.push(0x0b);
        write_u32(&mut entry, func_idxs.len() as u32);
        for idx in func_idxs {
            write_u32(&mut entry, *idx);
        }
        self.elements.push(entry);
        self
    }

    pub fn custom(mut self, section_name: &str, data: &[u8]) -> Self {
        let mut payload = vec![];
        name(&mut payload, section_name);
        payload.extend_from_slice(data);
        self.layout.push(Slot::Raw(SectionCode::Custom, payload));
        self
    }

    pub fn raw_section(mut self, code: SectionCode, payload: &[u8]) -> Self {
        self.layout.push(Slot::Raw(code, payload.to_vec()));
        self
    }

    fn payload(&self, code: SectionCode) -> Vec<u8> {
        let mut out = vec![];
        match code {
            SectionCode::Type => vector(&mut out, &self.types),
            SectionCode::Import => vector(&mut out, &self.imports),
            SectionCode::Export => vector(&mut out, &self.exports),
            SectionCode::Element => vector(&mut out, &self.elements),
            SectionCode::Function => {
                write_u32(&mut out, self.functions.len() as u32);
                for idx in &self.functions {
                    write_u32(&mut out, *idx);
                }
            }
            SectionCode::Start => {
                if let Some(idx) = self.start {
                    write_u32(&mut out, idx);
                }
            }
            SectionCode::Code => {
                write_u32(&mut out, self.bodies.len() as u32);
                for body in &self.bodies {
                    write_u32(&mut out, body.len() as u32);
                    out.extend_from_slice(body);
                }
            }
            _ => {}
        }
        out
    }

    /// Emits non-custom sections in canonical order; custom sections follow
    /// whichever section was added just before them.
    pub fn build(self) -> Vec<u8> {
        let mut sections: Vec<(SectionCode, Vec<u8>)> = vec![];
        let mut customs: Vec<(Option<SectionCode>, Vec<u8>)> = vec![];
        let mut anchor = None;
        for slot in &self.layout {
            match slot {
                Slot::Raw(SectionCode::Custom, payload) => customs.push((anchor, payload.clone())),
                Slot::Raw(code, payload) => {
                    sections.push((*code, payload.clone()));
                    anchor = Some(*code);
                }
                Slot::Known(code) => {
                    sections.push((*code, self.payload(*code)));
                    anchor = Some(*code);
                }
            }
        }

        let mut out = WASM_MAGIC.to_vec();
        out.extend_from_slice(&WASM_VERSION.to_le_bytes());
        let mut emit = |code: SectionCode, payload: &[u8]| {
            out.push(code as u8);
            write_u32(&mut out, payload.len() as u32);
            out.extend_from_slice(payload);
        };

        let emit_customs = |after: Option<SectionCode>, emit: &mut dyn FnMut(SectionCode, &[u8])| {
            for (_, payload) in customs.iter().filter(|(a, _)| *a == after) {
                emit(SectionCode::Custom, payload.as_slice());
            }
        };

        emit_customs(None, &mut emit);
        for code in SectionCode::CANONICAL_ORDER {
            for (_, payload) in sections.iter().filter(|(c, _)| *c == code) {
                emit(code, payload.as_slice());
            }
            emit_customs(Some(code), &mut emit);
        }
        out
    }
}
