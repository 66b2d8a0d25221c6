//! Section table and COFF string table
//!
//! Section names longer than 8 bytes are stored in the string table that
//! immediately follows the COFF symbol table; the 8-byte name field then
//! holds `/` followed by a decimal byte offset into that table.

use tracing::warn;

use crate::formats::pe::types::*;
use crate::formats::pe::utils::{read_cstring, ReadExt};

/// The COFF string table: a u32 total length (including itself) followed by
/// NUL-terminated strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringTable<'a> {
    data: &'a [u8],
    length: usize,
}

impl<'a> StringTable<'a> {
    /// Locate the table from the COFF header fields. Images without a
    /// symbol table have no string table.
    pub fn locate(data: &'a [u8], coff: &CoffHeader) -> Self {
        if coff.pointer_to_symbol_table == 0 {
            return Self::default();
        }
        let offset = coff.pointer_to_symbol_table as usize
            + coff.number_of_symbols as usize * COFF_SYMBOL_SIZE;
        let Some(length) = data.read_u32_le_at(offset) else {
            return Self::default();
        };
        Self {
            data: &data[offset..],
            length: length as usize,
        }
    }

    /// Look up the string at `offset`, bounds-checked against the declared
    /// table length.
    pub fn get(&self, offset: usize) -> Result<&'a str> {
        if self.data.is_empty() || offset >= self.length {
            return Err(PeError::StringTableOverrun {
                offset,
                length: self.length,
            });
        }
        read_cstring(self.data, offset, self.length - offset)
    }
}

/// Resolve a section header's name, following `/<decimal>` indirection.
///
/// An unresolvable long name (overrun or malformed offset) keeps the raw
/// slash form so the rest of the extraction can continue.
pub fn resolve_section_name(header: &SectionHeader, strings: &StringTable<'_>) -> String {
    let raw = header.raw_name();
    let Some(digits) = raw.strip_prefix('/') else {
        return raw.to_string();
    };

    let Ok(offset) = digits.parse::<usize>() else {
        warn!(name = raw, "malformed long section name offset");
        return raw.to_string();
    };

    match strings.get(offset) {
        Ok(name) => name.to_string(),
        Err(err) => {
            warn!(name = raw, %err, "long section name lookup failed");
            raw.to_string()
        }
    }
}

/// Section table with RVA translation.
#[derive(Debug, Clone)]
pub struct SectionTable {
    sections: Vec<SectionHeader>,
    names: Vec<String>,
}

impl SectionTable {
    /// Parse `count` section headers at `offset`, resolving names through
    /// the string table.
    pub fn parse(
        data: &[u8],
        offset: usize,
        count: u16,
        strings: &StringTable<'_>,
    ) -> Result<Self> {
        let mut sections = Vec::with_capacity(count as usize);
        let mut names = Vec::with_capacity(count as usize);

        for i in 0..count as usize {
            let s = offset + i * 40;
            if s + 40 > data.len() {
                return Err(PeError::TruncatedHeader {
                    expected: s + 40,
                    actual: data.len(),
                });
            }

            let mut name = [0u8; 8];
            name.copy_from_slice(&data[s..s + 8]);

            let header = SectionHeader {
                name,
                virtual_size: data.read_u32_le_at(s + 8).unwrap(),
                virtual_address: data.read_u32_le_at(s + 12).unwrap(),
                size_of_raw_data: data.read_u32_le_at(s + 16).unwrap(),
                pointer_to_raw_data: data.read_u32_le_at(s + 20).unwrap(),
                characteristics: data.read_u32_le_at(s + 36).unwrap(),
            };
            names.push(resolve_section_name(&header, strings));
            sections.push(header);
        }

        Ok(Self { sections, names })
    }

    pub fn count(&self) -> usize {
        self.sections.len()
    }

    pub fn by_index(&self, index: usize) -> Option<(&SectionHeader, &str)> {
        Some((self.sections.get(index)?, self.names.get(index)?.as_str()))
    }

    pub fn by_name(&self, name: &str) -> Option<(&SectionHeader, &str)> {
        let index = self.names.iter().position(|n| n == name)?;
        self.by_index(index)
    }

    /// Translate an RVA to a file offset by scanning for the containing
    /// section.
    pub fn rva_to_offset(&self, rva: u32) -> Option<usize> {
        for section in &self.sections {
            let size = section.virtual_size.max(section.size_of_raw_data);
            if rva >= section.virtual_address
                && rva < section.virtual_address.checked_add(size)?
            {
                let delta = rva - section.virtual_address;
                return Some(section.pointer_to_raw_data as usize + delta as usize);
            }
        }
        None
    }
}
