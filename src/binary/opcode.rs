/// What follows an opcode byte in the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
    /// Not an opcode this decoder understands.
    Unsupported,
    None,
    BlockType,
    /// One u32, e.g. a branch depth or a local index.
    Index,
    /// Two u32s: memory `align`/`offset`, or `call_indirect` type/table.
    IndexPair,
    /// A function index (`call`, `return_call`, `ref.func`).
    FuncIndex,
    BrTable,
    I32,
    I64,
    F32,
    F64,
    /// Typed `select`: a vector of value types.
    ValTypes,
    /// A single reference type byte.
    RefType,
    /// `0xfc` followed by a u32 sub-opcode.
    Misc,
}

pub const END: u8 = 0x0b;
pub const CALL: u8 = 0x10;
pub const CALL_INDIRECT: u8 = 0x11;
pub const RETURN_CALL: u8 = 0x12;
pub const REF_FUNC: u8 = 0xd2;
pub const MISC_PREFIX: u8 = 0xfc;

/// Block types that fit in a single byte: the empty type and the value types.
pub fn is_short_block_type(byte: u8) -> bool {
    matches!(byte, 0x40 | 0x7f | 0x7e | 0x7d | 0x7c | 0x7b | 0x70 | 0x6f)
}

/// Operands taken by each `0xfc` sub-opcode, `None` if unknown.
pub fn misc_operands(sub: u32) -> Option<usize> {
    match sub {
        // saturating truncation
        0..=7 => Some(0),
        // data.drop, memory.fill, elem.drop, table.grow, table.size, table.fill
        9 | 11 | 13 | 15 | 16 | 17 => Some(1),
        // memory.init, memory.copy, table.init, table.copy
        8 | 10 | 12 | 14 => Some(2),
        _ => None,
    }
}

pub static OPERANDS: [Operands; 256] = operand_table();

const fn operand_table() -> [Operands; 256] {
    let mut table = [Operands::Unsupported; 256];

    // unreachable, nop, else, end, return, drop, select
    table[0x00] = Operands::None;
    table[0x01] = Operands::None;
    table[0x05] = Operands::None;
    table[0x0b] = Operands::None;
    table[0x0f] = Operands::None;
    table[0x1a] = Operands::None;
    table[0x1b] = Operands::None;

    // block, loop, if
    table[0x02] = Operands::BlockType;
    table[0x03] = Operands::BlockType;
    table[0x04] = Operands::BlockType;

    // br, br_if
    table[0x0c] = Operands::Index;
    table[0x0d] = Operands::Index;
    table[0x0e] = Operands::BrTable;

    table[CALL as usize] = Operands::FuncIndex;
    table[CALL_INDIRECT as usize] = Operands::IndexPair;
    table[RETURN_CALL as usize] = Operands::FuncIndex;
    table[0x13] = Operands::IndexPair;

    table[0x1c] = Operands::ValTypes;

    // local.get/set/tee, global.get/set, table.get/set
    let mut op = 0x20;
    while op <= 0x26 {
        table[op] = Operands::Index;
        op += 1;
    }

    // loads and stores
    let mut op = 0x28;
    while op <= 0x3e {
        table[op] = Operands::IndexPair;
        op += 1;
    }

    // memory.size, memory.grow
    table[0x3f] = Operands::Index;
    table[0x40] = Operands::Index;

    table[0x41] = Operands::I32;
    table[0x42] = Operands::I64;
    table[0x43] = Operands::F32;
    table[0x44] = Operands::F64;

    // comparison, arithmetic, conversion and sign extension
    let mut op = 0x45;
    while op <= 0xc4 {
        table[op] = Operands::None;
        op += 1;
    }

    table[0xd0] = Operands::RefType;
    table[0xd1] = Operands::None;
    table[REF_FUNC as usize] = Operands::FuncIndex;

    table[MISC_PREFIX as usize] = Operands::Misc;

    table
}
