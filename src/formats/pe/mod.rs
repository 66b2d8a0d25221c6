//! PE/COFF reader
//!
//! One implementation covers PE32 and PE32+; the optional-header magic
//! selects the layout and the parsed `OptionalHeader` normalizes the
//! differences. All field reads are little-endian; big-endian PE images
//! are not supported.

pub mod directories;
pub mod headers;
pub mod sections;
pub mod types;
pub mod utils;

use crate::error::{DumpError, Result};
use crate::formats::{DebugLink, SectionInfo};
use crate::module::{Architecture, BuildId, Module};

use headers::{parse_coff_header, parse_data_directories, parse_optional_header, pe_signature_offset};
use sections::{SectionTable, StringTable};
pub use types::PeError;
use types::*;
use utils::{read_cstring, ReadExt};

/// A parsed PE image borrowing the mapped bytes.
pub struct PeFile<'d> {
    data: &'d [u8],
    coff: CoffHeader,
    optional: OptionalHeader,
    directories: Vec<DataDirectory>,
    sections: SectionTable,
}

impl<'d> PeFile<'d> {
    /// True iff the MS-DOS stub's e_lfanew field leads to a PE signature.
    pub fn is_valid(data: &[u8]) -> bool {
        pe_signature_offset(data).is_ok()
    }

    pub fn parse(data: &'d [u8]) -> Result<Self> {
        let sig_offset = pe_signature_offset(data)?;
        let coff = parse_coff_header(data, sig_offset + 4)?;

        let opt_offset = sig_offset + 4 + 20;
        let optional = parse_optional_header(data, opt_offset, coff.size_of_optional_header)?;

        // The data directory array sits at the end of the optional header.
        let dir_bytes = optional.number_of_rva_and_sizes.min(16) as usize * 8;
        let opt_end = opt_offset + coff.size_of_optional_header as usize;
        let dir_offset = opt_end.saturating_sub(dir_bytes).max(opt_offset);
        let directories =
            parse_data_directories(data, dir_offset, optional.number_of_rva_and_sizes);

        // The section table follows the declared optional-header size,
        // which differs between PE32 and PE32+.
        let strings = StringTable::locate(data, &coff);
        let section_offset = opt_offset + coff.size_of_optional_header as usize;
        let sections =
            SectionTable::parse(data, section_offset, coff.number_of_sections, &strings)?;

        Ok(Self {
            data,
            coff,
            optional,
            directories,
            sections,
        })
    }

    pub fn class(&self) -> PeClass {
        self.optional.class
    }

    pub fn architecture(&self) -> Result<Architecture> {
        match self.coff.machine {
            IMAGE_FILE_MACHINE_I386 => Ok(Architecture::X86),
            IMAGE_FILE_MACHINE_AMD64 => Ok(Architecture::X86_64),
            IMAGE_FILE_MACHINE_ARM => Ok(Architecture::Arm),
            IMAGE_FILE_MACHINE_MIPS16
            | IMAGE_FILE_MACHINE_MIPSFPU
            | IMAGE_FILE_MACHINE_MIPSFPU16
            | IMAGE_FILE_MACHINE_WCEMIPSV2 => Ok(Architecture::Mips),
            IMAGE_FILE_MACHINE_POWERPC | IMAGE_FILE_MACHINE_POWERPCFP => Ok(Architecture::Ppc),
            other => Err(DumpError::UnrecognizedArchitecture(other as u32)),
        }
    }

    pub fn big_endian(&self) -> bool {
        false
    }

    pub fn loading_address(&self) -> u64 {
        self.optional.image_base
    }

    pub fn address_size(&self) -> u8 {
        self.optional.class.address_size()
    }

    pub fn section_count(&self) -> usize {
        self.sections.count()
    }

    pub fn section_by_index(&self, index: usize) -> Option<SectionInfo<'d>> {
        let (header, name) = self.sections.by_index(index)?;
        Some(self.section_info(header, name))
    }

    pub fn section_by_name(&self, name: &str) -> Option<SectionInfo<'d>> {
        let (header, resolved) = self.sections.by_name(name)?;
        Some(self.section_info(header, resolved))
    }

    fn section_info(&self, header: &SectionHeader, name: &str) -> SectionInfo<'d> {
        // Data on disk is SizeOfRawData bytes; VirtualSize trims trailing
        // file-alignment padding when smaller.
        let raw_len = if header.virtual_size > 0 {
            header.size_of_raw_data.min(header.virtual_size)
        } else {
            header.size_of_raw_data
        };
        let offset = header.pointer_to_raw_data as usize;
        let data = offset
            .checked_add(raw_len as usize)
            .and_then(|end| self.data.get(offset..end))
            .unwrap_or(&[]);

        SectionInfo {
            name: name.to_string(),
            address: self.optional.image_base + header.virtual_address as u64,
            size: header.virtual_size.max(header.size_of_raw_data) as u64,
            data,
        }
    }

    /// Build identity from the CodeView record in the debug directory.
    pub fn build_id(&self) -> Option<BuildId> {
        let dir = self.directories.get(PE_DEBUG_DATA)?;
        directories::debug::codeview_build_id(self.data, &self.sections, dir)
    }

    /// The `.gnu_debuglink` section MinGW emits when splitting debug info.
    pub fn debug_link(&self) -> Option<DebugLink> {
        let (header, _) = self.sections.by_name(".gnu_debuglink")?;
        let offset = header.pointer_to_raw_data as usize;
        let size = header.size_of_raw_data as usize;
        let data = self.data.get(offset..offset.checked_add(size)?)?;

        let filename = read_cstring(data, 0, size).ok()?;
        if filename.is_empty() {
            return None;
        }
        let crc_offset = (filename.len() + 1 + 3) & !3;
        let crc = data.read_u32_le_at(crc_offset).unwrap_or(0);

        Some(DebugLink {
            filename: filename.to_string(),
            crc,
        })
    }

    /// Populate externs from the export directory.
    pub fn exported_symbols(&self, module: &mut Module) -> Result<usize> {
        let Some(dir) = self.directories.get(PE_EXPORT_TABLE) else {
            return Ok(0);
        };
        let added = directories::export::exports_to_module(
            self.data,
            &self.sections,
            dir,
            self.optional.image_base,
            module,
        )?;
        Ok(added)
    }

    /// Raw file bytes (for identifier hashing).
    pub fn data(&self) -> &'d [u8] {
        self.data
    }
}
