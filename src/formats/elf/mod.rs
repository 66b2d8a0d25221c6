//! ELF reader
//!
//! One parameterized implementation covers ELF32 and ELF64; class and
//! endianness are carried in the parsed header and consulted at each field
//! read rather than duplicated per word size.

pub mod headers;
pub mod notes;
pub mod sections;
pub mod segments;
pub mod symbols;
pub mod types;
pub mod utils;

use tracing::{debug, warn};

use crate::demangle::demangle;
use crate::error::{DumpError, Result};
use crate::formats::{DebugLink, SectionInfo};
use crate::module::{Architecture, BuildId, Extern, Module};

use headers::parse_header;
use sections::SectionTable;
use segments::parse_program_headers;
pub use types::ElfError;
use types::*;
use utils::{align_up, read_cstring, EndianRead};

/// A parsed ELF image borrowing the mapped bytes.
pub struct ElfFile<'d> {
    data: &'d [u8],
    header: ElfHeader,
    sections: SectionTable<'d>,
    segments: Vec<ProgramHeader>,
}

impl<'d> ElfFile<'d> {
    /// True iff the leading bytes carry the ELF magic and a valid class
    /// byte.
    pub fn is_valid(data: &[u8]) -> bool {
        data.len() >= 5 && &data[0..4] == ELF_MAGIC && ElfClass::from_u8(data[4]).is_ok()
    }

    pub fn parse(data: &'d [u8]) -> Result<Self> {
        let header = parse_header(data)?;
        let sections = SectionTable::parse(data, &header)?;
        let segments = parse_program_headers(data, &header)?;

        Ok(Self {
            data,
            header,
            sections,
            segments,
        })
    }

    pub fn header(&self) -> &ElfHeader {
        &self.header
    }

    pub fn architecture(&self) -> Result<Architecture> {
        match self.header.e_machine {
            EM_386 => Ok(Architecture::X86),
            EM_X86_64 => Ok(Architecture::X86_64),
            EM_ARM => Ok(Architecture::Arm),
            EM_MIPS => Ok(Architecture::Mips),
            EM_PPC => Ok(Architecture::Ppc),
            EM_PPC64 => Ok(Architecture::Ppc64),
            EM_S390 => Ok(Architecture::S390),
            EM_SPARC => Ok(Architecture::Sparc),
            EM_SPARCV9 => Ok(Architecture::Sparcv9),
            other => Err(DumpError::UnrecognizedArchitecture(other as u32)),
        }
    }

    pub fn big_endian(&self) -> bool {
        self.header.ident.data.is_big_endian()
    }

    pub fn loading_address(&self) -> u64 {
        segments::loading_address(&self.segments)
    }

    pub fn address_size(&self) -> u8 {
        self.header.ident.class.address_size()
    }

    pub fn section_count(&self) -> usize {
        self.sections.count()
    }

    pub fn section_by_index(&self, index: usize) -> Option<SectionInfo<'d>> {
        self.sections.by_index(index).map(section_info)
    }

    pub fn section_by_name(&self, name: &str) -> Option<SectionInfo<'d>> {
        self.sections.by_name(name).map(section_info)
    }

    /// GNU build id from the note sections, if present.
    pub fn build_id(&self) -> Option<BuildId> {
        let endian = self.header.ident.data;
        self.sections
            .sections()
            .filter(|s| s.header.sh_type == SHT_NOTE)
            .find_map(|s| {
                notes::NoteSection::parse(s.data, endian)
                    .ok()
                    .and_then(|n| n.build_id().map(BuildId::from_bytes))
            })
    }

    /// The `.gnu_debuglink` companion reference: a NUL-terminated file name
    /// followed by a CRC32, 4-byte aligned.
    pub fn debug_link(&self) -> Option<DebugLink> {
        let section = self.sections.by_name(".gnu_debuglink")?;
        let filename = read_cstring(section.data, 0).ok()?;
        if filename.is_empty() {
            return None;
        }

        let crc_offset = align_up(filename.len() + 1, 4);
        let crc = section
            .data
            .read_u32(crc_offset, self.header.ident.data)
            .unwrap_or(0);

        Some(DebugLink {
            filename: filename.to_string(),
            crc,
        })
    }

    /// Populate externs from .symtab, falling back to .dynsym.
    pub fn exported_symbols(&self, module: &mut Module) -> Result<usize> {
        let (table, name) = match self.sections.by_name(".symtab") {
            Some(s) if s.header.sh_type == SHT_SYMTAB => (s, ".symtab"),
            _ => match self.sections.by_name(".dynsym") {
                Some(s) if s.header.sh_type == SHT_DYNSYM => (s, ".dynsym"),
                _ => {
                    debug!("no symbol table section");
                    return Ok(0);
                }
            },
        };

        let strings = self.sections.linked_strings(&table);
        let parsed = symbols::parse_symbols(
            table.data,
            strings,
            self.header.ident.class,
            self.header.ident.data,
        )?;

        let mut added = 0;
        for symbol in &parsed {
            if !symbol.is_function() || symbol.value == 0 || symbol.shndx == 0 {
                continue;
            }
            if symbol.name.is_empty() {
                warn!(value = symbol.value, "skipping unnamed function symbol");
                continue;
            }
            module.add_extern(Extern {
                address: symbol.value,
                name: demangle(symbol.name),
            });
            added += 1;
        }

        debug!(section = name, count = added, "loaded extern symbols");
        Ok(added)
    }

    /// Raw file bytes (for identifier hashing).
    pub fn data(&self) -> &'d [u8] {
        self.data
    }
}

fn section_info(section: sections::Section<'_>) -> SectionInfo<'_> {
    SectionInfo {
        name: section.name.to_string(),
        address: section.header.sh_addr,
        size: section.header.sh_size,
        data: section.data,
    }
}
