//! Object-file format readers.
//!
//! One reader per format family (ELF covering ELF32/ELF64, PE covering
//! PE32/PE32+), each exposing the same capability set through
//! [`ObjectReader`]. `ObjectFile` classifies a mapped file by magic and
//! dispatches to the right reader.

pub mod elf;
pub mod pe;

use crate::error::{DumpError, Result};
use crate::module::{Architecture, BuildId, Module};

use elf::ElfFile;
use pe::PeFile;

/// One named section, resolved to an in-bounds slice of the mapping.
///
/// `address` is the section's virtual address in the module's address space
/// (for PE this is image base + RVA), so it is directly comparable with
/// addresses found in DWARF data.
#[derive(Debug, Clone)]
pub struct SectionInfo<'d> {
    pub name: String,
    pub address: u64,
    pub size: u64,
    pub data: &'d [u8],
}

/// A `.gnu_debuglink` reference to a companion debug-info file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugLink {
    pub filename: String,
    pub crc: u32,
}

/// Capabilities every object-format reader provides.
pub trait ObjectReader<'d> {
    /// Map the format's machine field to a symbol-file architecture.
    fn architecture(&self) -> Result<Architecture>;

    /// Byte order of multi-byte fields in the file.
    fn big_endian(&self) -> bool;

    /// Preferred loading address (first PT_LOAD vaddr for ELF, image base
    /// for PE). Zero when the format has no meaningful base.
    fn loading_address(&self) -> u64;

    fn section_count(&self) -> usize;

    fn section_by_index(&self, index: usize) -> Option<SectionInfo<'d>>;

    fn section_by_name(&self, name: &str) -> Option<SectionInfo<'d>>;

    /// Size in bytes of an address on the target (4 or 8).
    fn address_size(&self) -> u8;

    /// Embedded build identity (CodeView record or build-id note), if any.
    fn build_id(&self) -> Option<BuildId>;

    /// The `.gnu_debuglink` companion file reference, if any.
    fn debug_link(&self) -> Option<DebugLink>;

    /// Populate externs from the format's exported-symbol data. Returns the
    /// number of externs added; absence of export data is zero, not an
    /// error.
    fn exported_symbols(&self, module: &mut Module) -> Result<usize>;
}

/// A classified object file borrowing the mapped bytes.
pub enum ObjectFile<'d> {
    Elf(ElfFile<'d>),
    Pe(PeFile<'d>),
}

impl<'d> ObjectFile<'d> {
    /// Classify `data` by magic and parse the matching format's headers.
    pub fn parse(data: &'d [u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(DumpError::FileTooSmall(data.len()));
        }

        if ElfFile::is_valid(data) {
            return Ok(ObjectFile::Elf(ElfFile::parse(data)?));
        }
        if PeFile::is_valid(data) {
            return Ok(ObjectFile::Pe(PeFile::parse(data)?));
        }

        Err(DumpError::UnrecognizedFormat)
    }

    /// Format name for diagnostics.
    pub fn format_name(&self) -> &'static str {
        match self {
            ObjectFile::Elf(_) => "ELF",
            ObjectFile::Pe(_) => "PE",
        }
    }

    /// Target operating system recorded on the MODULE line.
    pub fn os_name(&self) -> &'static str {
        match self {
            ObjectFile::Elf(_) => "Linux",
            ObjectFile::Pe(_) => "windows",
        }
    }
}

impl<'d> ObjectReader<'d> for ObjectFile<'d> {
    fn architecture(&self) -> Result<Architecture> {
        match self {
            ObjectFile::Elf(f) => f.architecture(),
            ObjectFile::Pe(f) => f.architecture(),
        }
    }

    fn big_endian(&self) -> bool {
        match self {
            ObjectFile::Elf(f) => f.big_endian(),
            ObjectFile::Pe(f) => f.big_endian(),
        }
    }

    fn loading_address(&self) -> u64 {
        match self {
            ObjectFile::Elf(f) => f.loading_address(),
            ObjectFile::Pe(f) => f.loading_address(),
        }
    }

    fn section_count(&self) -> usize {
        match self {
            ObjectFile::Elf(f) => f.section_count(),
            ObjectFile::Pe(f) => f.section_count(),
        }
    }

    fn section_by_index(&self, index: usize) -> Option<SectionInfo<'d>> {
        match self {
            ObjectFile::Elf(f) => f.section_by_index(index),
            ObjectFile::Pe(f) => f.section_by_index(index),
        }
    }

    fn section_by_name(&self, name: &str) -> Option<SectionInfo<'d>> {
        match self {
            ObjectFile::Elf(f) => f.section_by_name(name),
            ObjectFile::Pe(f) => f.section_by_name(name),
        }
    }

    fn address_size(&self) -> u8 {
        match self {
            ObjectFile::Elf(f) => f.address_size(),
            ObjectFile::Pe(f) => f.address_size(),
        }
    }

    fn build_id(&self) -> Option<BuildId> {
        match self {
            ObjectFile::Elf(f) => f.build_id(),
            ObjectFile::Pe(f) => f.build_id(),
        }
    }

    fn debug_link(&self) -> Option<DebugLink> {
        match self {
            ObjectFile::Elf(f) => f.debug_link(),
            ObjectFile::Pe(f) => f.debug_link(),
        }
    }

    fn exported_symbols(&self, module: &mut Module) -> Result<usize> {
        match self {
            ObjectFile::Elf(f) => f.exported_symbols(module),
            ObjectFile::Pe(f) => f.exported_symbols(module),
        }
    }
}
