use thiserror::Error;

use crate::template::DirectiveKind;

pub type Result<A, E = Error> = std::result::Result<A, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unexpected end of buffer at byte {offset}")]
    Eof { offset: usize },
    #[error("no template matches at byte {offset}")]
    NoTemplate { offset: usize },
    #[error("templates `{first}` and `{second}` both claim header `{magic}`")]
    DuplicateHeader {
        first: String,
        second: String,
        magic: String,
    },
    #[error("template `{type_name}` has no header")]
    NoHeader { type_name: String },
    #[error("template `{type_name}` declares an empty start magic")]
    EmptyMagic { type_name: String },
    #[error("template `{type_name}`, field `{field}`: {reason}")]
    BadType {
        type_name: String,
        field: String,
        reason: String,
    },
    #[error("no codec registered for directive kind {kind:?}")]
    UnknownDirective { kind: DirectiveKind },
    #[error("template `{type_name}` declares more than one checksum field")]
    MultipleChecksums { type_name: String },
    #[error("syntax error in `{expr}`: {reason}")]
    ExprSyntax { expr: String, reason: String },
    #[error("cannot resolve `{name}`")]
    ExprResolve { name: String },
    #[error("expression type error: {reason}")]
    ExprType { reason: String },
    #[error("field `{field}` rejected by validator at byte {offset}")]
    Validation { field: String, offset: usize },
    #[error("checksum mismatch at byte {offset}: computed {computed:#06x}, read {read:#06x}")]
    ChecksumMismatch {
        offset: usize,
        computed: u32,
        read: u32,
    },
    #[error("unknown charset `{label}`")]
    InvalidCharset { label: String },
    #[error("size out of range at byte {offset}: {reason}")]
    OutOfRange { offset: usize, reason: String },
}

impl Error {
    pub fn offset(&self) -> Option<usize> {
        match self {
            Error::Eof { offset }
            | Error::NoTemplate { offset }
            | Error::Validation { offset, .. }
            | Error::ChecksumMismatch { offset, .. }
            | Error::OutOfRange { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}
