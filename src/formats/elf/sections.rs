//! Section table parsing and lookup

use std::collections::HashMap;

use crate::formats::elf::types::*;
use crate::formats::elf::utils::{read_addr, read_cstring, EndianRead};

/// Section table with name lookup via the section-name string table.
pub struct SectionTable<'a> {
    headers: Vec<SectionHeader>,
    strings: &'a [u8],
    data: &'a [u8],
    by_name: HashMap<String, usize>,
}

/// A resolved section: header plus name and an in-bounds data slice.
pub struct Section<'a> {
    pub header: SectionHeader,
    pub name: &'a str,
    pub data: &'a [u8],
}

impl<'a> SectionTable<'a> {
    /// Parse the section table of `data`.
    pub fn parse(data: &'a [u8], header: &ElfHeader) -> Result<Self> {
        let sh_offset = header.e_shoff as usize;
        let sh_entsize = header.e_shentsize as usize;
        let sh_num = header.e_shnum as usize;

        if sh_num == 0 || sh_offset == 0 {
            return Ok(Self {
                headers: Vec::new(),
                strings: &[],
                data,
                by_name: HashMap::new(),
            });
        }

        let total = sh_num
            .checked_mul(sh_entsize)
            .ok_or(ElfError::InvalidOffset { offset: sh_offset })?;
        if sh_offset + total > data.len() {
            return Err(ElfError::Truncated {
                offset: sh_offset,
                needed: total,
            });
        }

        let mut headers = Vec::with_capacity(sh_num);
        for i in 0..sh_num {
            let offset = sh_offset + i * sh_entsize;
            headers.push(parse_section_header(
                data,
                offset,
                header.ident.class,
                header.ident.data,
            )?);
        }

        // Section names live in the e_shstrndx string table.
        let shstrndx = header.e_shstrndx as usize;
        let strings = headers
            .get(shstrndx)
            .and_then(|sh| {
                let offset = sh.sh_offset as usize;
                let size = sh.sh_size as usize;
                data.get(offset..offset.checked_add(size)?)
            })
            .unwrap_or(&[]);

        let mut by_name = HashMap::new();
        for (i, sh) in headers.iter().enumerate() {
            if let Ok(name) = read_cstring(strings, sh.sh_name as usize) {
                by_name.entry(name.to_string()).or_insert(i);
            }
        }

        Ok(Self {
            headers,
            strings,
            data,
            by_name,
        })
    }

    pub fn count(&self) -> usize {
        self.headers.len()
    }

    /// Get section by index. SHT_NOBITS sections resolve to an empty slice.
    pub fn by_index(&self, index: usize) -> Option<Section<'a>> {
        let header = *self.headers.get(index)?;
        let name = read_cstring(self.strings, header.sh_name as usize).unwrap_or("");

        let data = if header.sh_type == SHT_NOBITS {
            &[]
        } else {
            let offset = header.sh_offset as usize;
            let size = header.sh_size as usize;
            offset
                .checked_add(size)
                .and_then(|end| self.data.get(offset..end))
                .unwrap_or(&[])
        };

        Some(Section { header, name, data })
    }

    pub fn by_name(&self, name: &str) -> Option<Section<'a>> {
        self.by_name.get(name).and_then(|&idx| self.by_index(idx))
    }

    pub fn sections(&self) -> impl Iterator<Item = Section<'a>> + '_ {
        (0..self.headers.len()).filter_map(move |i| self.by_index(i))
    }

    /// The string table a symbol table links to via sh_link.
    pub fn linked_strings(&self, section: &Section<'a>) -> &'a [u8] {
        self.by_index(section.header.sh_link as usize)
            .map(|s| s.data)
            .unwrap_or(&[])
    }
}

fn parse_section_header(
    data: &[u8],
    offset: usize,
    class: ElfClass,
    endian: ElfData,
) -> Result<SectionHeader> {
    let sh_name = data.read_u32(offset, endian)?;
    let sh_type = data.read_u32(offset + 4, endian)?;

    Ok(match class {
        ElfClass::Elf32 => SectionHeader {
            sh_name,
            sh_type,
            sh_flags: data.read_u32(offset + 8, endian)? as u64,
            sh_addr: data.read_u32(offset + 12, endian)? as u64,
            sh_offset: data.read_u32(offset + 16, endian)? as u64,
            sh_size: data.read_u32(offset + 20, endian)? as u64,
            sh_link: data.read_u32(offset + 24, endian)?,
            sh_entsize: data.read_u32(offset + 36, endian)? as u64,
        },
        ElfClass::Elf64 => SectionHeader {
            sh_name,
            sh_type,
            sh_flags: read_addr(data, offset + 8, class, endian)?,
            sh_addr: read_addr(data, offset + 16, class, endian)?,
            sh_offset: read_addr(data, offset + 24, class, endian)?,
            sh_size: read_addr(data, offset + 32, class, endian)?,
            sh_link: data.read_u32(offset + 40, endian)?,
            sh_entsize: read_addr(data, offset + 56, class, endian)?,
        },
    })
}
