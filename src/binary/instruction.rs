//! Instruction-stream decoding shared by call-graph scanning and rewriting.
//!
//! The decoder only knows the shape of each instruction's operands. Callers
//! observe the stream through a [`Visitor`]: function-index operands are
//! reported decoded, everything else is handed over as the original bytes.

use super::{
    leb128::{leb128_i32, leb128_i64, leb128_u32},
    opcode::{self, Operands, OPERANDS},
};
use crate::error::{Error, Result};

pub trait Visitor {
    /// Bytes that are not a function-index operand, in stream order.
    fn copy(&mut self, _bytes: &[u8]) {}

    /// The operand of `call`, `return_call` or `ref.func`.
    fn func_index(&mut self, opcode: u8, idx: u32);
}

pub struct Reader<'a> {
    code: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(code: &'a [u8]) -> Self {
        Self { code, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.code.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn rest(&self) -> &'a [u8] {
        self.code.get(self.pos..).unwrap_or_default()
    }

    fn byte(&mut self) -> Result<u8> {
        let byte = *self
            .code
            .get(self.pos)
            .ok_or_else(|| Error::invalid("unexpected end of code"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        if len > self.rest().len() {
            return Err(Error::invalid("unexpected end of code"));
        }
        self.pos += len;
        Ok(())
    }

    fn u32(&mut self) -> Result<u32> {
        let rest = self.rest();
        let (remaining, value) = leb128_u32(rest)?;
        self.pos += rest.len() - remaining.len();
        Ok(value)
    }

    fn i32(&mut self) -> Result<()> {
        let rest = self.rest();
        let (remaining, _) = leb128_i32(rest)?;
        self.pos += rest.len() - remaining.len();
        Ok(())
    }

    fn i64(&mut self) -> Result<()> {
        let rest = self.rest();
        let (remaining, _) = leb128_i64(rest)?;
        self.pos += rest.len() - remaining.len();
        Ok(())
    }

    /// Decodes one instruction and returns its opcode.
    pub fn step<V: Visitor>(&mut self, visitor: &mut V) -> Result<u8> {
        let start = self.pos;
        let op = self.byte()?;

        match OPERANDS[op as usize] {
            Operands::Unsupported => {
                return Err(Error::invalid(format!(
                    "unsupported opcode {op:#04x} at offset {start}"
                )));
            }
            Operands::None => {}
            Operands::BlockType => {
                let ty = *self
                    .code
                    .get(self.pos)
                    .ok_or_else(|| Error::invalid("unexpected end of code"))?;
                if opcode::is_short_block_type(ty) {
                    self.pos += 1;
                } else {
                    // a type index, encoded as a signed 33-bit integer
                    self.i64()?;
                }
            }
            Operands::Index => {
                self.u32()?;
            }
            Operands::IndexPair => {
                self.u32()?;
                self.u32()?;
            }
            Operands::FuncIndex => {
                visitor.copy(&self.code[start..self.pos]);
                let idx = self.u32()?;
                visitor.func_index(op, idx);
                return Ok(op);
            }
            Operands::BrTable => {
                let count = self.u32()?;
                // the label vector plus the default label
                for _ in 0..=count {
                    self.u32()?;
                }
            }
            Operands::I32 => self.i32()?,
            Operands::I64 => self.i64()?,
            Operands::F32 => self.skip(4)?,
            Operands::F64 => self.skip(8)?,
            Operands::ValTypes => {
                let count = self.u32()?;
                self.skip(count as usize)?;
            }
            Operands::RefType => self.skip(1)?,
            Operands::Misc => {
                let sub = self.u32()?;
                let operands = opcode::misc_operands(sub).ok_or_else(|| {
                    Error::invalid(format!("unsupported opcode 0xfc {sub} at offset {start}"))
                })?;
                for _ in 0..operands {
                    self.u32()?;
                }
            }
        }

        visitor.copy(&self.code[start..self.pos]);
        Ok(op)
    }
}

/// Length of the local declarations at the start of a function body.
pub fn locals_len(body: &[u8]) -> Result<usize> {
    let (mut input, count) = leb128_u32(body)?;
    for _ in 0..count {
        let (rest, _) = leb128_u32(input)?;
        let Some((_, rest)) = rest.split_first() else {
            return Err(Error::invalid("local declaration truncated"));
        };
        input = rest;
    }
    Ok(body.len() - input.len())
}

/// Walks a whole function body: the local declarations are passed to
/// `copy` untouched, then every instruction is decoded.
pub fn walk_body<V: Visitor>(body: &[u8], visitor: &mut V) -> Result<()> {
    let locals = locals_len(body)?;
    visitor.copy(&body[..locals]);

    let mut reader = Reader::new(&body[locals..]);
    while !reader.is_empty() {
        reader.step(visitor)?;
    }
    Ok(())
}

/// Walks a constant expression up to and including its `end` and returns
/// its length. Anything after the `end` is left alone.
pub fn walk_expr<V: Visitor>(input: &[u8], visitor: &mut V) -> Result<usize> {
    let mut reader = Reader::new(input);
    loop {
        if reader.step(visitor)? == opcode::END {
            return Ok(reader.position());
        }
    }
}

struct Skip;

impl Visitor for Skip {
    fn func_index(&mut self, _opcode: u8, _idx: u32) {}
}

/// Length of a constant expression, up to and including its `end`.
pub fn const_expr_len(input: &[u8]) -> Result<usize> {
    walk_expr(input, &mut Skip)
}

#[derive(Default)]
struct FuncRefs(Vec<u32>);

impl Visitor for FuncRefs {
    fn func_index(&mut self, _opcode: u8, idx: u32) {
        self.0.push(idx);
    }
}

/// Functions named by `ref.func` in a constant expression.
pub fn expr_func_refs(expr: &[u8]) -> Result<Vec<u32>> {
    let mut refs = FuncRefs::default();
    walk_expr(expr, &mut refs)?;
    Ok(refs.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Record {
        copied: Vec<u8>,
        calls: Vec<(u8, u32)>,
    }

    impl Visitor for Record {
        fn copy(&mut self, bytes: &[u8]) {
            self.copied.extend_from_slice(bytes);
        }

        fn func_index(&mut self, opcode: u8, idx: u32) {
            self.calls.push((opcode, idx));
        }
    }

    #[test]
    fn reports_direct_calls_only() -> Result<()> {
        let body = [
            0x00, // no locals
            0x10, 0x03, // call 3
            0x41, 0x00, // i32.const 0
            0x11, 0x00, 0x00, // call_indirect type 0 table 0
            0x12, 0x85, 0x01, // return_call 133
            0xd2, 0x07, // ref.func 7
            0x1a, // drop
            0x0b,
        ];
        let mut record = Record::default();
        walk_body(&body, &mut record)?;
        assert_eq!(
            record.calls,
            vec![(opcode::CALL, 3), (opcode::RETURN_CALL, 133), (opcode::REF_FUNC, 7)]
        );
        Ok(())
    }

    #[test]
    fn immediates_are_not_mistaken_for_opcodes() -> Result<()> {
        let body = [
            0x01, 0x02, 0x7f, // two i32 locals
            0x44, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, // f64.const
            0x43, 0x10, 0x10, 0x10, 0x10, // f32.const
            0x42, 0x90, 0x20, // i64.const
            0x28, 0x02, 0x10, // i32.load align=2 offset=16
            0x02, 0x40, // block
            0x0e, 0x02, 0x00, 0x00, 0x10, // br_table 0 0 16
            0x0b, 0x1a, 0x1a, 0x1a, 0x0b,
        ];
        let mut record = Record::default();
        walk_body(&body, &mut record)?;
        assert!(record.calls.is_empty());
        Ok(())
    }

    #[test]
    fn everything_but_function_indices_is_copied() -> Result<()> {
        let body = [
            0x01, 0x01, 0x7e, // one i64 local
            0x02, 0x40, // block
            0x20, 0x00, // local.get 0
            0x10, 0x80, 0x01, // call 128
            0x0b, 0x0b,
        ];
        let mut record = Record::default();
        walk_body(&body, &mut record)?;
        assert_eq!(
            record.copied,
            vec![0x01, 0x01, 0x7e, 0x02, 0x40, 0x20, 0x00, 0x10, 0x0b, 0x0b]
        );
        assert_eq!(record.calls, vec![(opcode::CALL, 128)]);
        Ok(())
    }

    #[test]
    fn misc_prefix() -> Result<()> {
        let body = [
            0x00, //
            0xfc, 0x0a, 0x00, 0x00, // memory.copy
            0xfc, 0x00, // i32.trunc_sat_f32_s
            0x0b,
        ];
        walk_body(&body, &mut Record::default())?;

        let unknown = [0x00, 0xfc, 0x40, 0x0b];
        assert!(walk_body(&unknown, &mut Record::default()).is_err());
        Ok(())
    }

    #[test]
    fn rejects_unsupported_and_truncated() {
        let simd = [0x00, 0xfd, 0x0c, 0x0b];
        let err = walk_body(&simd, &mut Record::default()).unwrap_err();
        assert!(err.reason().contains("unsupported opcode 0xfd"), "{err}");

        let truncated = [
            [0x00, 0x44, 0x00, 0x00].as_slice(),
            &[0x00, 0x10],
            &[0x00, 0x10, 0x80],
            &[0x00, 0x02],
            &[0x00, 0x0e, 0x05, 0x00],
            &[0x01, 0x01],
            &[],
        ];
        for body in truncated {
            assert!(walk_body(body, &mut Record::default()).is_err(), "{body:x?}");
        }
    }

    #[test]
    fn const_expr_ends_at_end_opcode() -> Result<()> {
        // i32.const 11 encodes its immediate as 0x0b
        let input = [0x41, 0x0b, 0x0b, 0x01, 0x02];
        assert_eq!(const_expr_len(&input)?, 3);

        let global = [0x23, 0x00, 0x0b];
        assert_eq!(const_expr_len(&global)?, 3);

        assert!(const_expr_len(&[0x41, 0x00]).is_err());
        Ok(())
    }

    #[test]
    fn ref_func_in_const_expr() -> Result<()> {
        assert_eq!(expr_func_refs(&[0xd2, 0x84, 0x01, 0x0b])?, vec![132]);
        assert!(expr_func_refs(&[0xd0, 0x70, 0x0b])?.is_empty());

        let mut record = Record::default();
        assert_eq!(walk_expr(&[0xd2, 0x02, 0x0b, 0xd2], &mut record)?, 3);
        assert_eq!(record.copied, vec![0xd2, 0x0b]);
        assert_eq!(record.calls, vec![(opcode::REF_FUNC, 2)]);
        Ok(())
    }
}
