use nom::error::{ErrorKind, ParseError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid wasm module: {0}")]
    WasmInvalid(String),
}

impl Error {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::WasmInvalid(reason.into())
    }

    /// Prefixes the reason with where the failure happened.
    pub fn context(self, ctx: &str) -> Self {
        match self {
            Self::WasmInvalid(reason) => Self::WasmInvalid(format!("{ctx}: {reason}")),
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::WasmInvalid(reason) => reason,
        }
    }
}

impl<'a> ParseError<&'a [u8]> for Error {
    fn from_error_kind(_input: &'a [u8], kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Eof => Self::invalid("unexpected end of input"),
            kind => Self::invalid(kind.description().to_lowercase()),
        }
    }

    fn append(_input: &'a [u8], _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

impl From<nom::Err<Error>> for Error {
    fn from(err: nom::Err<Error>) -> Self {
        match err {
            nom::Err::Incomplete(_) => Self::invalid("unexpected end of input"),
            nom::Err::Error(e) | nom::Err::Failure(e) => e,
        }
    }
}
