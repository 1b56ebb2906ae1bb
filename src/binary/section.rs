use num_derive::FromPrimitive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive)]
#[repr(u8)]
pub enum SectionCode {
    Custom = 0x00,
    Type = 0x01,
    Import = 0x02,
    Function = 0x03,
    Table = 0x04,
    Memory = 0x05,
    Global = 0x06,
    Export = 0x07,
    Start = 0x08,
    Element = 0x09,
    Code = 0x0a,
    Data = 0x0b,
    DataCount = 0x0c,
}

impl SectionCode {
    /// Non-custom sections in the order they must appear in a module.
    pub const CANONICAL_ORDER: [SectionCode; 12] = [
        SectionCode::Type,
        SectionCode::Import,
        SectionCode::Function,
        SectionCode::Table,
        SectionCode::Memory,
        SectionCode::Global,
        SectionCode::Export,
        SectionCode::Start,
        SectionCode::Element,
        SectionCode::DataCount,
        SectionCode::Code,
        SectionCode::Data,
    ];

    /// Where this section sits in `CANONICAL_ORDER`, `None` for custom
    /// sections.
    pub fn canonical_position(self) -> Option<usize> {
        Self::CANONICAL_ORDER.iter().position(|code| *code == self)
    }

    /// Sections copied through without being interpreted.
    pub fn is_passthrough(self) -> bool {
        matches!(
            self,
            SectionCode::Custom
                | SectionCode::Table
                | SectionCode::Memory
                | SectionCode::Global
                | SectionCode::Data
                | SectionCode::DataCount
        )
    }
}

/// Kind byte shared by import and export entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum ExternalKind {
    Func = 0x00,
    Table = 0x01,
    Memory = 0x02,
    Global = 0x03,
}
