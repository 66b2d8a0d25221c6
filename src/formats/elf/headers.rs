//! ELF header parsing

use crate::formats::elf::types::*;
use crate::formats::elf::utils::{read_addr, EndianRead};

/// Parse ELF identification bytes
pub fn parse_ident(data: &[u8]) -> Result<ElfIdent> {
    if data.len() < 16 {
        return Err(ElfError::Truncated {
            offset: 0,
            needed: 16,
        });
    }

    if &data[0..4] != ELF_MAGIC {
        return Err(ElfError::InvalidMagic);
    }

    Ok(ElfIdent {
        class: ElfClass::from_u8(data[4])?,
        data: ElfData::from_u8(data[5])?,
        version: data[6],
    })
}

/// Parse the ELF header, reading 32- or 64-bit layouts into one widened
/// representation.
pub fn parse_header(data: &[u8]) -> Result<ElfHeader> {
    let ident = parse_ident(data)?;
    let endian = ident.data;
    let class = ident.class;

    let header_size = match class {
        ElfClass::Elf32 => 52,
        ElfClass::Elf64 => 64,
    };
    if data.len() < header_size {
        return Err(ElfError::Truncated {
            offset: 0,
            needed: header_size,
        });
    }

    let e_type = data.read_u16(16, endian)?;
    let e_machine = data.read_u16(18, endian)?;
    let e_entry = read_addr(data, 24, class, endian)?;

    let (e_phoff, e_shoff, tail) = match class {
        ElfClass::Elf32 => (
            data.read_u32(28, endian)? as u64,
            data.read_u32(32, endian)? as u64,
            42,
        ),
        ElfClass::Elf64 => (data.read_u64(32, endian)?, data.read_u64(40, endian)?, 54),
    };

    let e_phentsize = data.read_u16(tail, endian)?;
    let e_phnum = data.read_u16(tail + 2, endian)?;
    let e_shentsize = data.read_u16(tail + 4, endian)?;
    let e_shnum = data.read_u16(tail + 6, endian)?;
    let e_shstrndx = data.read_u16(tail + 8, endian)?;

    let expected_shentsize = match class {
        ElfClass::Elf32 => 40,
        ElfClass::Elf64 => 64,
    };
    if e_shnum > 0 && e_shentsize as usize != expected_shentsize {
        return Err(ElfError::MalformedHeader(format!(
            "invalid e_shentsize: expected {}, got {}",
            expected_shentsize, e_shentsize
        )));
    }

    let expected_phentsize = match class {
        ElfClass::Elf32 => 32,
        ElfClass::Elf64 => 56,
    };
    if e_phnum > 0 && e_phentsize as usize != expected_phentsize {
        return Err(ElfError::MalformedHeader(format!(
            "invalid e_phentsize: expected {}, got {}",
            expected_phentsize, e_phentsize
        )));
    }

    Ok(ElfHeader {
        ident,
        e_type,
        e_machine,
        e_entry,
        e_phoff,
        e_shoff,
        e_phentsize,
        e_phnum,
        e_shentsize,
        e_shnum,
        e_shstrndx,
    })
}
