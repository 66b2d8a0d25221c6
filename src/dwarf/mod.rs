//! Bridges from the DWARF parser into the Module.
//!
//! gimli owns all DWARF decoding; these modules are glue that plugs section
//! bytes, endianness, and address size into it and translate what it yields
//! into Module functions, lines, and unwind rules.

pub mod cfi;
pub mod cu;
pub mod registers;

use thiserror::Error;

use crate::module::Architecture;

/// The reader type handed to gimli: borrowed section bytes with run-time
/// endianness.
pub type Reader<'d> = gimli::EndianSlice<'d, gimli::RunTimeEndian>;

/// DWARF bridge errors
#[derive(Debug, Error)]
pub enum DwarfError {
    #[error("parse error: {0}")]
    Parse(#[from] gimli::Error),

    #[error("no register names for architecture {0}; cannot convert call frame information")]
    UnsupportedArchitecture(Architecture),
}

pub type Result<T> = std::result::Result<T, DwarfError>;

/// Run-time endianness for a file.
pub fn endianness(big_endian: bool) -> gimli::RunTimeEndian {
    if big_endian {
        gimli::RunTimeEndian::Big
    } else {
        gimli::RunTimeEndian::Little
    }
}
