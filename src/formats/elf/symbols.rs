//! Symbol table parsing
//!
//! Used as the extern fallback when a binary carries no DWARF data: STT_FUNC
//! entries become PUBLIC records.

use crate::formats::elf::types::*;
use crate::formats::elf::utils::{read_addr, read_cstring, EndianRead};

/// Parse a .symtab/.dynsym section against its linked string table.
pub fn parse_symbols<'a>(
    symtab: &'a [u8],
    strings: &'a [u8],
    class: ElfClass,
    endian: ElfData,
) -> Result<Vec<ElfSymbol<'a>>> {
    let entsize = match class {
        ElfClass::Elf32 => 16,
        ElfClass::Elf64 => 24,
    };

    let mut symbols = Vec::with_capacity(symtab.len() / entsize);
    let mut offset = 0;

    while offset + entsize <= symtab.len() {
        // The 64-bit layout moves st_info/st_shndx before the value.
        let symbol = match class {
            ElfClass::Elf32 => ElfSymbol {
                name: symbol_name(strings, symtab.read_u32(offset, endian)? as usize),
                value: symtab.read_u32(offset + 4, endian)? as u64,
                size: symtab.read_u32(offset + 8, endian)? as u64,
                info: symtab[offset + 12],
                shndx: symtab.read_u16(offset + 14, endian)?,
            },
            ElfClass::Elf64 => ElfSymbol {
                name: symbol_name(strings, symtab.read_u32(offset, endian)? as usize),
                info: symtab[offset + 4],
                shndx: symtab.read_u16(offset + 6, endian)?,
                value: read_addr(symtab, offset + 8, class, endian)?,
                size: read_addr(symtab, offset + 16, class, endian)?,
            },
        };
        symbols.push(symbol);
        offset += entsize;
    }

    Ok(symbols)
}

fn symbol_name(strings: &[u8], offset: usize) -> &str {
    read_cstring(strings, offset).unwrap_or("")
}
