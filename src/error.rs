//! Error types for symbol extraction.
//!
//! Format readers carry their own error enums (`ElfError`, `PeError`,
//! `DwarfError`); everything funnels into `DumpError` at the orchestration
//! layer.

use std::path::PathBuf;
use thiserror::Error;

use crate::formats::elf::ElfError;
use crate::formats::pe::PeError;

/// Main error type for symbol dumping operations.
#[derive(Debug, Error)]
pub enum DumpError {
    /// File could not be opened or mapped
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is empty or too small to classify
    #[error("file too small to be an object file ({0} bytes)")]
    FileTooSmall(usize),

    /// Leading bytes match no supported object format
    #[error("unrecognized object file format")]
    UnrecognizedFormat,

    /// Machine field maps to no supported architecture
    #[error("unrecognized machine architecture: {0:#x}")]
    UnrecognizedArchitecture(u32),

    /// ELF reader errors
    #[error("ELF: {0}")]
    Elf(#[from] ElfError),

    /// PE/COFF reader errors
    #[error("PE: {0}")]
    Pe(#[from] PeError),

    /// DWARF bridge errors
    #[error("DWARF: {0}")]
    Dwarf(#[from] crate::dwarf::DwarfError),

    /// Companion debug file disagrees with the primary file
    #[error("debug file {} does not match {}: {field} differs", .debug_file.display(), .object_file.display())]
    CrossValidation {
        object_file: PathBuf,
        debug_file: PathBuf,
        field: &'static str,
    },

    /// A .gnu_debuglink name was present but no candidate directory held it
    #[error("failed to find debug file {name} for {}", .object_file.display())]
    DebugLinkNotFound { object_file: PathBuf, name: String },

    /// Neither DWARF, CFI, nor export data was found anywhere
    #[error("{}: no usable debugging information found", .0.display())]
    NoUsableInfo(PathBuf),
}

/// Result type alias for symbol dumping operations
pub type Result<T> = std::result::Result<T, DumpError>;
