use super::{
    leb128::write_u32,
    module::{Module, WASM_MAGIC, WASM_VERSION},
    section::SectionCode,
    types::{ElementInit, ElementMode, ElementSegment, ExportDesc, ImportDesc},
};
use crate::error::{Error, Result};

fn write_len(out: &mut Vec<u8>, len: usize) -> Result<()> {
    let len = u32::try_from(len).map_err(|_| Error::invalid(format!("length {len} exceeds u32")))?;
    write_u32(out, len);
    Ok(())
}

fn write_name(out: &mut Vec<u8>, name: &str) -> Result<()> {
    write_len(out, name.len())?;
    out.extend_from_slice(name.as_bytes());
    Ok(())
}

fn write_section(out: &mut Vec<u8>, code: SectionCode, payload: &[u8]) -> Result<()> {
    out.push(code as u8);
    write_len(out, payload.len())?;
    out.extend_from_slice(payload);
    Ok(())
}

fn encode_element(out: &mut Vec<u8>, segment: &ElementSegment) -> Result<()> {
    write_u32(out, segment.flags());
    match &segment.mode {
        ElementMode::Active { table_idx, offset } => {
            if let Some(table_idx) = table_idx {
                write_u32(out, *table_idx);
                out.extend_from_slice(offset);
                out.push(segment.kind);
            } else {
                out.extend_from_slice(offset);
            }
        }
        ElementMode::Passive | ElementMode::Declarative => out.push(segment.kind),
    }
    match &segment.init {
        ElementInit::FuncIdxs(idxs) => {
            write_len(out, idxs.len())?;
            for idx in idxs {
                write_u32(out, *idx);
            }
        }
        ElementInit::Exprs(exprs) => {
            write_len(out, exprs.len())?;
            for expr in exprs {
                out.extend_from_slice(expr);
            }
        }
    }
    Ok(())
}

impl Module {
    /// Serializes the module. Known sections are re-encoded in canonical
    /// order and omitted when empty; passthrough sections are copied as read,
    /// with custom sections following the section they followed originally.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.check_func_indices()?;

        let mut out = Vec::with_capacity(1024);
        out.extend_from_slice(WASM_MAGIC);
        out.extend_from_slice(&WASM_VERSION.to_le_bytes());

        self.encode_customs(&mut out, None)?;
        for code in SectionCode::CANONICAL_ORDER {
            if code.is_passthrough() {
                for section in self.passthrough.iter().filter(|s| s.code == code) {
                    write_section(&mut out, code, &section.payload)?;
                }
            } else if let Some(payload) = self.encode_known(code)? {
                write_section(&mut out, code, &payload)?;
            }
            self.encode_customs(&mut out, Some(code))?;
        }

        Ok(out)
    }

    fn encode_customs(&self, out: &mut Vec<u8>, after: Option<SectionCode>) -> Result<()> {
        for section in self
            .passthrough
            .iter()
            .filter(|s| s.code == SectionCode::Custom && s.after == after)
        {
            write_section(out, SectionCode::Custom, &section.payload)?;
        }
        Ok(())
    }

    /// Payload of an interpreted section, `None` if it has no entries.
    fn encode_known(&self, code: SectionCode) -> Result<Option<Vec<u8>>> {
        let mut payload = vec![];
        match code {
            SectionCode::Type => {
                if self.types.is_empty() {
                    return Ok(None);
                }
                write_len(&mut payload, self.types.len())?;
                for ty in &self.types {
                    payload.extend_from_slice(ty);
                }
            }
            SectionCode::Import => {
                if self.imports.is_empty() {
                    return Ok(None);
                }
                write_len(&mut payload, self.imports.len())?;
                for import in &self.imports {
                    write_name(&mut payload, &import.module)?;
                    write_name(&mut payload, &import.field)?;
                    payload.push(import.desc.kind() as u8);
                    match &import.desc {
                        ImportDesc::Func(type_idx) => write_u32(&mut payload, *type_idx),
                        ImportDesc::Table(raw) | ImportDesc::Memory(raw) | ImportDesc::Global(raw) => {
                            payload.extend_from_slice(raw)
                        }
                    }
                }
            }
            SectionCode::Function => {
                if self.func_types.is_empty() {
                    return Ok(None);
                }
                write_len(&mut payload, self.func_types.len())?;
                for type_idx in &self.func_types {
                    write_u32(&mut payload, *type_idx);
                }
            }
            SectionCode::Export => {
                if self.exports.is_empty() {
                    return Ok(None);
                }
                write_len(&mut payload, self.exports.len())?;
                for export in &self.exports {
                    write_name(&mut payload, &export.name)?;
                    payload.push(export.desc.kind() as u8);
                    write_u32(&mut payload, export.desc.index());
                }
            }
            SectionCode::Start => match self.start {
                Some(idx) => write_u32(&mut payload, idx),
                None => return Ok(None),
            },
            SectionCode::Element => {
                if self.elements.is_empty() {
                    return Ok(None);
                }
                write_len(&mut payload, self.elements.len())?;
                for segment in &self.elements {
                    encode_element(&mut payload, segment)?;
                }
            }
            SectionCode::Code => {
                if self.bodies.is_empty() {
                    return Ok(None);
                }
                write_len(&mut payload, self.bodies.len())?;
                for body in &self.bodies {
                    write_len(&mut payload, body.raw.len())?;
                    payload.extend_from_slice(&body.raw);
                }
            }
            SectionCode::Custom
            | SectionCode::Table
            | SectionCode::Memory
            | SectionCode::Global
            | SectionCode::Data
            | SectionCode::DataCount => return Ok(None),
        }
        Ok(Some(payload))
    }

    fn check_func_indices(&self) -> Result<()> {
        if self.func_types.len() != self.bodies.len() {
            return Err(Error::invalid(format!(
                "{} function types for {} bodies",
                self.func_types.len(),
                self.bodies.len()
            )));
        }

        let count = self.func_count();
        let check = |idx: u32, what: &str| {
            if idx < count {
                Ok(())
            } else {
                Err(Error::invalid(format!(
                    "{what} references function {idx}, but only {count} exist"
                )))
            }
        };

        for export in &self.exports {
            if let ExportDesc::Func(idx) = export.desc {
                check(idx, &format!("export {:?}", export.name))?;
            }
        }
        if let Some(idx) = self.start {
            check(idx, "start section")?;
        }
        for segment in &self.elements {
            for idx in segment.func_refs()? {
                check(idx, "element segment")?;
            }
        }
        Ok(())
    }
}
