//! LEB128 variable-length integers.
//!
//! The raw decoders never look past the maximum encoded width of their type
//! (5 bytes for 32-bit values, 10 for 64-bit) and never fail; they report how
//! many bytes they consumed. The `leb128_*` parsers wrap them for use with
//! nom and reject empty or unterminated input.

use crate::error::Error;
use nom::IResult;

const MAX_BYTES_32: usize = 5;
const MAX_BYTES_64: usize = 10;

const CONTINUATION: u8 = 0x80;
const PAYLOAD: u8 = 0x7f;
const SIGN: u8 = 0x40;

pub fn decode_u32(bytes: &[u8]) -> (u32, usize) {
    let mut result = 0u32;
    let mut shift = 0u32;
    for (i, &byte) in bytes.iter().take(MAX_BYTES_32).enumerate() {
        result |= u32::from(byte & PAYLOAD) << shift;
        if byte & CONTINUATION == 0 {
            return (result, i + 1);
        }
        shift += 7;
    }
    (result, bytes.len().min(MAX_BYTES_32))
}

pub fn decode_i32(bytes: &[u8]) -> (i32, usize) {
    let (value, consumed) = decode_signed(bytes, MAX_BYTES_32, 32);
    (value as i32, consumed)
}

pub fn decode_i64(bytes: &[u8]) -> (i64, usize) {
    decode_signed(bytes, MAX_BYTES_64, 64)
}

fn decode_signed(bytes: &[u8], max_bytes: usize, bits: u32) -> (i64, usize) {
    let mut result = 0i64;
    let mut shift = 0u32;
    let mut consumed = 0;
    for &byte in bytes.iter().take(max_bytes) {
        consumed += 1;
        if shift < 64 {
            result |= i64::from(byte & PAYLOAD) << shift;
        }
        shift += 7;
        if byte & CONTINUATION == 0 {
            if shift < bits && byte & SIGN != 0 {
                result |= -1i64 << shift;
            }
            break;
        }
    }
    (result, consumed)
}

pub fn write_u32(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & u32::from(PAYLOAD)) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | CONTINUATION);
    }
}

pub fn write_i32(out: &mut Vec<u8>, value: i32) {
    write_i64(out, i64::from(value));
}

pub fn write_i64(out: &mut Vec<u8>, mut value: i64) {
    loop {
        let byte = (value & i64::from(PAYLOAD)) as u8;
        value >>= 7;
        let done = (value == 0 && byte & SIGN == 0) || (value == -1 && byte & SIGN != 0);
        if done {
            out.push(byte);
            return;
        }
        out.push(byte | CONTINUATION);
    }
}

pub fn encode_u32(value: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAX_BYTES_32);
    write_u32(&mut out, value);
    out
}

pub fn encode_i32(value: i32) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAX_BYTES_32);
    write_i32(&mut out, value);
    out
}

pub fn encode_i64(value: i64) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAX_BYTES_64);
    write_i64(&mut out, value);
    out
}

fn terminated(input: &[u8], consumed: usize) -> bool {
    consumed > 0 && input[consumed - 1] & CONTINUATION == 0
}

fn malformed(input: &[u8]) -> nom::Err<Error> {
    if input.len() < MAX_BYTES_32 {
        nom::Err::Error(Error::invalid("unexpected end of input"))
    } else {
        nom::Err::Error(Error::invalid("integer representation too long"))
    }
}

pub fn leb128_u32(input: &[u8]) -> IResult<&[u8], u32, Error> {
    let (value, consumed) = decode_u32(input);
    if !terminated(input, consumed) {
        return Err(malformed(input));
    }
    Ok((&input[consumed..], value))
}

pub fn leb128_i32(input: &[u8]) -> IResult<&[u8], i32, Error> {
    let (value, consumed) = decode_i32(input);
    if !terminated(input, consumed) {
        return Err(malformed(input));
    }
    Ok((&input[consumed..], value))
}

pub fn leb128_i64(input: &[u8]) -> IResult<&[u8], i64, Error> {
    let (value, consumed) = decode_i64(input);
    if !terminated(input, consumed) {
        return Err(malformed(input));
    }
    Ok((&input[consumed..], value))
}
