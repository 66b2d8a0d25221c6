//! Program header (segment) parsing

use crate::formats::elf::types::*;
use crate::formats::elf::utils::{read_addr, EndianRead};

/// Parse the program header table.
pub fn parse_program_headers(data: &[u8], header: &ElfHeader) -> Result<Vec<ProgramHeader>> {
    let ph_offset = header.e_phoff as usize;
    let ph_entsize = header.e_phentsize as usize;
    let ph_num = header.e_phnum as usize;

    if ph_num == 0 || ph_offset == 0 {
        return Ok(Vec::new());
    }

    let total = ph_num
        .checked_mul(ph_entsize)
        .ok_or(ElfError::InvalidOffset { offset: ph_offset })?;
    if ph_offset + total > data.len() {
        return Err(ElfError::Truncated {
            offset: ph_offset,
            needed: total,
        });
    }

    let class = header.ident.class;
    let endian = header.ident.data;
    let mut headers = Vec::with_capacity(ph_num);

    for i in 0..ph_num {
        let offset = ph_offset + i * ph_entsize;
        let p_type = data.read_u32(offset, endian)?;

        // The 32- and 64-bit layouts interleave fields differently: the
        // 64-bit form moves p_flags up next to p_type.
        let ph = match class {
            ElfClass::Elf32 => ProgramHeader {
                p_type,
                p_offset: data.read_u32(offset + 4, endian)? as u64,
                p_vaddr: data.read_u32(offset + 8, endian)? as u64,
                p_filesz: data.read_u32(offset + 16, endian)? as u64,
                p_memsz: data.read_u32(offset + 20, endian)? as u64,
            },
            ElfClass::Elf64 => ProgramHeader {
                p_type,
                p_offset: read_addr(data, offset + 8, class, endian)?,
                p_vaddr: read_addr(data, offset + 16, class, endian)?,
                p_filesz: read_addr(data, offset + 32, class, endian)?,
                p_memsz: read_addr(data, offset + 40, class, endian)?,
            },
        };
        headers.push(ph);
    }

    Ok(headers)
}

/// Preferred loading address: the `p_vaddr` of the first PT_LOAD segment.
///
/// ELF requires load segments to be sorted by vaddr; for ET_DYN objects
/// this is normally zero. Returns 0 when no PT_LOAD segment exists.
pub fn loading_address(segments: &[ProgramHeader]) -> u64 {
    segments
        .iter()
        .find(|ph| ph.p_type == PT_LOAD)
        .map(|ph| ph.p_vaddr)
        .unwrap_or(0)
}
