use super::{
    instruction,
    leb128::leb128_u32,
    section::{ExternalKind, SectionCode},
    types::{
        ElementInit, ElementMode, ElementSegment, Export, ExportDesc, FuncBody, Import,
        ImportDesc, RawSection,
    },
};
use crate::error::{Error, Result};
use nom::{
    bytes::complete::{tag, take},
    number::complete::{le_u32, le_u8},
    sequence::pair,
    IResult,
};
use num_traits::FromPrimitive as _;

pub const WASM_MAGIC: &[u8; 4] = b"\0asm";
pub const WASM_VERSION: u32 = 1;

const FUNC_TYPE: u8 = 0x60;
const EXTERNREF: u8 = 0x6f;

type ParseResult<'a, T> = IResult<&'a [u8], T, Error>;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Module {
    /// Encoded function types, each starting with `0x60`.
    pub types: Vec<Vec<u8>>,
    pub imports: Vec<Import>,
    /// Type index of every local function, parallel to `bodies`.
    pub func_types: Vec<u32>,
    pub exports: Vec<Export>,
    pub start: Option<u32>,
    pub elements: Vec<ElementSegment>,
    pub bodies: Vec<FuncBody>,
    pub passthrough: Vec<RawSection>,
    pub num_imported_funcs: u32,
}

impl Module {
    pub fn new(input: &[u8]) -> Result<Module> {
        if input.len() < 8 {
            return Err(Error::invalid("file too short"));
        }
        let (mut remaining, version) =
            decode_header(input).map_err(|_| Error::invalid("bad magic bytes"))?;
        if version != WASM_VERSION {
            return Err(Error::invalid(format!("unsupported version {version}")));
        }

        let mut module = Module::default();
        let mut last_known: Option<SectionCode> = None;

        while !remaining.is_empty() {
            let (rest, (id, size)) = decode_section_header(remaining)
                .map_err(|e| Error::from(e).context("section header"))?;
            let size = size as usize;
            if size > rest.len() {
                return Err(Error::invalid("section extends past end of file"));
            }
            let (payload, rest) = rest.split_at(size);

            let code = SectionCode::from_u8(id)
                .ok_or_else(|| Error::invalid(format!("unknown section id {id:#04x}")))?;

            if let (Some(rank), Some(last)) = (code.canonical_position(), last_known) {
                if Some(rank) <= last.canonical_position() {
                    let reason = if code == last {
                        format!("duplicate {code:?} section")
                    } else {
                        format!("{code:?} section out of order after {last:?} section")
                    };
                    return Err(Error::invalid(reason));
                }
            }

            module.decode_section(code, payload, last_known)?;

            if code != SectionCode::Custom {
                last_known = Some(code);
            }
            remaining = rest;
        }

        if module.func_types.len() != module.bodies.len() {
            return Err(Error::invalid(format!(
                "function and code section counts differ: {} vs {}",
                module.func_types.len(),
                module.bodies.len()
            )));
        }

        Ok(module)
    }

    fn decode_section(
        &mut self,
        code: SectionCode,
        payload: &[u8],
        after: Option<SectionCode>,
    ) -> Result<()> {
        let context = format!("{code:?} section").to_lowercase();
        match code {
            SectionCode::Type => {
                self.types = finish(decode_type_section(payload), &context)?;
            }
            SectionCode::Import => {
                self.imports = finish(decode_import_section(payload), &context)?;
                self.num_imported_funcs = self
                    .imports
                    .iter()
                    .filter(|import| matches!(import.desc, ImportDesc::Func(_)))
                    .count() as u32;
            }
            SectionCode::Function => {
                self.func_types = finish(decode_function_section(payload), &context)?;
            }
            SectionCode::Export => {
                self.exports = finish(decode_export_section(payload), &context)?;
            }
            SectionCode::Start => {
                if payload.is_empty() {
                    return Err(Error::invalid("empty start section"));
                }
                self.start = Some(finish(leb128_u32(payload), &context)?);
            }
            SectionCode::Element => {
                self.elements = finish(decode_element_section(payload), &context)?;
            }
            SectionCode::Code => {
                self.bodies = finish(decode_code_section(payload), &context)?;
            }
            SectionCode::Custom
            | SectionCode::Table
            | SectionCode::Memory
            | SectionCode::Global
            | SectionCode::Data
            | SectionCode::DataCount => {
                self.passthrough.push(RawSection {
                    code,
                    payload: payload.to_vec(),
                    after,
                });
            }
        }
        Ok(())
    }

    /// Size of the function index space: imports first, then local functions.
    pub fn func_count(&self) -> u32 {
        self.num_imported_funcs
            .saturating_add(self.bodies.len() as u32)
    }

    pub fn is_imported_func(&self, idx: u32) -> bool {
        idx < self.num_imported_funcs
    }

    /// Body of the function at `idx` in the function index space.
    pub fn local_body(&self, idx: u32) -> Option<&FuncBody> {
        let local = idx.checked_sub(self.num_imported_funcs)?;
        self.bodies.get(local as usize)
    }
}

/// Requires a section decoder to have consumed its whole payload.
fn finish<T>(result: ParseResult<'_, T>, context: &str) -> Result<T> {
    let (rest, value) = result.map_err(|e| Error::from(e).context(context))?;
    if !rest.is_empty() {
        return Err(Error::invalid(format!(
            "{context}: section size mismatch, {} trailing bytes",
            rest.len()
        )));
    }
    Ok(value)
}

fn fail<'a, T>(reason: impl Into<String>) -> ParseResult<'a, T> {
    Err(nom::Err::Failure(Error::invalid(reason)))
}

fn decode_header(input: &[u8]) -> ParseResult<'_, u32> {
    let (input, _) = tag(&WASM_MAGIC[..])(input)?;
    le_u32(input)
}

fn decode_section_header(input: &[u8]) -> ParseResult<'_, (u8, u32)> {
    pair(le_u8, leb128_u32)(input)
}

/// Runs `item` `count` times, where `count` is read from the input.
fn decode_vec<'a, T>(
    input: &'a [u8],
    mut item: impl FnMut(&'a [u8]) -> ParseResult<'a, T>,
) -> ParseResult<'a, Vec<T>> {
    let (mut input, count) = leb128_u32(input)?;
    let mut items = vec![];
    for _ in 0..count {
        let (rest, value) = item(input)?;
        items.push(value);
        input = rest;
    }
    Ok((input, items))
}

fn decode_type_section(input: &[u8]) -> ParseResult<'_, Vec<Vec<u8>>> {
    decode_vec(input, decode_func_type)
}

fn decode_func_type(input: &[u8]) -> ParseResult<'_, Vec<u8>> {
    let start = input;
    let (rest, form) = le_u8(input)?;
    if form != FUNC_TYPE {
        return fail(format!("expected func type marker 0x60, found {form:#04x}"));
    }

    let (rest, params) = leb128_u32(rest)?;
    let (rest, _) = take(params)(rest)?;
    let (rest, results) = leb128_u32(rest)?;
    let (rest, _) = take(results)(rest)?;

    let len = start.len() - rest.len();
    Ok((rest, start[..len].to_vec()))
}

fn decode_function_section(input: &[u8]) -> ParseResult<'_, Vec<u32>> {
    decode_vec(input, leb128_u32)
}

fn decode_import_section(input: &[u8]) -> ParseResult<'_, Vec<Import>> {
    decode_vec(input, decode_import)
}

fn decode_import(input: &[u8]) -> ParseResult<'_, Import> {
    let (rest, module) = decode_name(input)?;
    let (rest, field) = decode_name(rest)?;
    let (rest, kind) = decode_external_kind(rest)?;

    let (rest, desc) = match kind {
        ExternalKind::Func => {
            let (rest, idx) = leb128_u32(rest)?;
            (rest, ImportDesc::Func(idx))
        }
        ExternalKind::Table => {
            let (after, ref_type) = le_u8(rest)?;
            if !is_ref_type(ref_type) {
                return fail(format!("invalid table reference type {ref_type:#04x}"));
            }
            let (after, _) = decode_limits(after)?;
            let (rest, raw) = take(rest.len() - after.len())(rest)?;
            (rest, ImportDesc::Table(raw.to_vec()))
        }
        ExternalKind::Memory => {
            let (after, _) = decode_limits(rest)?;
            let (rest, raw) = take(rest.len() - after.len())(rest)?;
            (rest, ImportDesc::Memory(raw.to_vec()))
        }
        ExternalKind::Global => {
            // value type and mutability
            let (rest, raw) = take(2usize)(rest)?;
            (rest, ImportDesc::Global(raw.to_vec()))
        }
    };

    Ok((
        rest,
        Import {
            module,
            field,
            desc,
        },
    ))
}

fn decode_limits(input: &[u8]) -> ParseResult<'_, (u32, Option<u32>)> {
    let (rest, flags) = le_u8(input)?;
    if flags > 0x03 {
        return fail(format!("invalid limits flags {flags:#04x}"));
    }
    let (rest, min) = leb128_u32(rest)?;
    if flags & 0x01 == 0 {
        return Ok((rest, (min, None)));
    }
    let (rest, max) = leb128_u32(rest)?;
    Ok((rest, (min, Some(max))))
}

fn decode_export_section(input: &[u8]) -> ParseResult<'_, Vec<Export>> {
    decode_vec(input, |input| {
        let (rest, name) = decode_name(input)?;
        let (rest, kind) = decode_external_kind(rest)?;
        let (rest, idx) = leb128_u32(rest)?;
        Ok((
            rest,
            Export {
                name,
                desc: ExportDesc::new(kind, idx),
            },
        ))
    })
}

fn decode_element_section(input: &[u8]) -> ParseResult<'_, Vec<ElementSegment>> {
    decode_vec(input, decode_element_segment)
}

/// Decodes one segment in any of the eight forms selected by its flags:
/// bit 0 marks passive or declarative, bit 1 an explicit table index (or
/// declarative), bit 2 expressions instead of function indices.
fn decode_element_segment(input: &[u8]) -> ParseResult<'_, ElementSegment> {
    let (rest, flags) = leb128_u32(input)?;
    if flags > 7 {
        return fail(format!("unsupported element flags {flags}"));
    }

    let (rest, mode) = match flags & 0x03 {
        0 => {
            let (rest, offset) = decode_const_expr(rest)?;
            (
                rest,
                ElementMode::Active {
                    table_idx: None,
                    offset,
                },
            )
        }
        1 => (rest, ElementMode::Passive),
        2 => {
            let (rest, table_idx) = leb128_u32(rest)?;
            let (rest, offset) = decode_const_expr(rest)?;
            (
                rest,
                ElementMode::Active {
                    table_idx: Some(table_idx),
                    offset,
                },
            )
        }
        _ => (rest, ElementMode::Declarative),
    };

    let exprs = flags & 0x04 != 0;
    let (rest, kind) = match (flags & 0x03, exprs) {
        (0, false) => (rest, ElementSegment::ELEM_KIND_FUNC),
        (0, true) => (rest, ElementSegment::FUNCREF),
        _ => le_u8(rest)?,
    };
    if exprs && !is_ref_type(kind) {
        return fail(format!("invalid element reference type {kind:#04x}"));
    }
    if !exprs && kind != ElementSegment::ELEM_KIND_FUNC {
        return fail(format!("unsupported element kind {kind:#04x}"));
    }

    let (rest, init) = if exprs {
        let (rest, exprs) = decode_vec(rest, decode_const_expr)?;
        (rest, ElementInit::Exprs(exprs))
    } else {
        let (rest, idxs) = decode_vec(rest, leb128_u32)?;
        (rest, ElementInit::FuncIdxs(idxs))
    };

    Ok((rest, ElementSegment { mode, kind, init }))
}

fn decode_const_expr(input: &[u8]) -> ParseResult<'_, Vec<u8>> {
    let len = match instruction::const_expr_len(input) {
        Ok(len) => len,
        Err(e) => return Err(nom::Err::Failure(e.context("constant expression"))),
    };
    let (rest, expr) = take(len)(input)?;
    Ok((rest, expr.to_vec()))
}

fn is_ref_type(byte: u8) -> bool {
    byte == ElementSegment::FUNCREF || byte == EXTERNREF
}

fn decode_code_section(input: &[u8]) -> ParseResult<'_, Vec<FuncBody>> {
    decode_vec(input, |input| {
        let (rest, size) = leb128_u32(input)?;
        if size as usize > rest.len() {
            return fail("code body extends past section");
        }
        let (rest, body) = take(size)(rest)?;
        Ok((rest, FuncBody { raw: body.to_vec() }))
    })
}

fn decode_external_kind(input: &[u8]) -> ParseResult<'_, ExternalKind> {
    let (rest, byte) = le_u8(input)?;
    match ExternalKind::from_u8(byte) {
        Some(kind) => Ok((rest, kind)),
        None => fail(format!("unknown external kind {byte:#04x}")),
    }
}

fn decode_name(input: &[u8]) -> ParseResult<'_, String> {
    let (rest, size) = leb128_u32(input)?;
    let (rest, name) = take(size)(rest)?;
    match String::from_utf8(name.to_vec()) {
        Ok(name) => Ok((rest, name)),
        Err(_) => fail("invalid utf-8 name"),
    }
}
