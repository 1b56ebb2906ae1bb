pub mod encoder;
pub mod instruction;
pub mod leb128;
pub mod module;
pub mod opcode;
pub mod section;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
