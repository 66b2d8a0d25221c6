//! Synthetic object-image builders for integration tests.
//!
//! Everything is assembled byte-by-byte so tests exercise the real parsing
//! paths without fixture files.

#![allow(dead_code)]

/// ULEB128 encoding
pub fn uleb(value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    let mut v = value;
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
    out
}

fn align_to(data: &mut Vec<u8>, alignment: usize) {
    while data.len() % alignment != 0 {
        data.push(0);
    }
}

// ---------------------------------------------------------------------------
// DWARF blobs
// ---------------------------------------------------------------------------

/// `.debug_abbrev` for one compile unit holding plain subprograms.
pub fn dwarf_abbrev() -> Vec<u8> {
    let mut out = Vec::new();
    // Abbrev 1: DW_TAG_compile_unit, has children
    out.extend(uleb(1));
    out.extend(uleb(0x11));
    out.push(1);
    out.extend([0x03, 0x08]); // DW_AT_name, DW_FORM_string
    out.extend([0x11, 0x01]); // DW_AT_low_pc, DW_FORM_addr
    out.extend([0x12, 0x01]); // DW_AT_high_pc, DW_FORM_addr
    out.extend([0x10, 0x17]); // DW_AT_stmt_list, DW_FORM_sec_offset
    out.extend([0x00, 0x00]);
    // Abbrev 2: DW_TAG_subprogram, no children
    out.extend(uleb(2));
    out.extend(uleb(0x2e));
    out.push(0);
    out.extend([0x03, 0x08]); // DW_AT_name, DW_FORM_string
    out.extend([0x11, 0x01]); // DW_AT_low_pc, DW_FORM_addr
    out.extend([0x12, 0x01]); // DW_AT_high_pc, DW_FORM_addr
    out.extend([0x00, 0x00]);
    // End of abbreviations
    out.push(0);
    out
}

/// DWARF32 v4 `.debug_info` with one compile unit describing `functions`
/// as `(name, low_pc, high_pc)` triples. Addresses are 8 bytes.
pub fn dwarf_info(unit_name: &str, functions: &[(&str, u64, u64)]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&4u16.to_le_bytes()); // version
    body.extend_from_slice(&0u32.to_le_bytes()); // abbrev offset
    body.push(8); // address size

    // Compile unit DIE
    body.extend(uleb(1));
    body.extend_from_slice(unit_name.as_bytes());
    body.push(0);
    let low = functions.iter().map(|f| f.1).min().unwrap_or(0);
    let high = functions.iter().map(|f| f.2).max().unwrap_or(0);
    body.extend_from_slice(&low.to_le_bytes());
    body.extend_from_slice(&high.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes()); // stmt_list

    for &(name, low_pc, high_pc) in functions {
        body.extend(uleb(2));
        body.extend_from_slice(name.as_bytes());
        body.push(0);
        body.extend_from_slice(&low_pc.to_le_bytes());
        body.extend_from_slice(&high_pc.to_le_bytes());
    }
    body.push(0); // end of compile unit children

    let mut out = Vec::new();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

/// DWARF v4 `.debug_line` with one sequence mapping `[low, high)` to
/// `(file_name, line)`.
pub fn dwarf_line(file_name: &str, low: u64, high: u64, line: i64) -> Vec<u8> {
    let mut prologue = Vec::new();
    prologue.push(1); // minimum_instruction_length
    prologue.push(1); // maximum_operations_per_instruction
    prologue.push(1); // default_is_stmt
    prologue.push(0xfb); // line_base = -5
    prologue.push(14); // line_range
    prologue.push(13); // opcode_base
    prologue.extend([0, 1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1]); // std opcode lengths
    prologue.push(0); // no include directories
    prologue.extend_from_slice(file_name.as_bytes()); // file 1
    prologue.push(0);
    prologue.extend(uleb(0)); // directory index
    prologue.extend(uleb(0)); // mtime
    prologue.extend(uleb(0)); // length
    prologue.push(0); // end of file table

    let mut program = Vec::new();
    // DW_LNE_set_address low
    program.extend([0x00, 0x09, 0x02]);
    program.extend_from_slice(&low.to_le_bytes());
    // DW_LNS_advance_line to `line`
    program.push(0x03);
    program.extend(sleb(line - 1));
    // DW_LNS_copy
    program.push(0x01);
    // DW_LNE_set_address high
    program.extend([0x00, 0x09, 0x02]);
    program.extend_from_slice(&high.to_le_bytes());
    // DW_LNE_end_sequence
    program.extend([0x00, 0x01, 0x01]);

    let mut out = Vec::new();
    let unit_length = 2 + 4 + prologue.len() + program.len();
    out.extend_from_slice(&(unit_length as u32).to_le_bytes());
    out.extend_from_slice(&4u16.to_le_bytes()); // version
    out.extend_from_slice(&(prologue.len() as u32).to_le_bytes()); // header_length
    out.extend_from_slice(&prologue);
    out.extend_from_slice(&program);
    out
}

/// SLEB128 encoding
pub fn sleb(value: i64) -> Vec<u8> {
    let mut out = Vec::new();
    let mut v = value;
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        let sign = byte & 0x40 != 0;
        if (v == 0 && !sign) || (v == -1 && sign) {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
    out
}

/// x86_64 `.debug_frame`: one CIE (cfa = rsp+8, ra at cfa-8) and one FDE
/// covering `[low, low+len)`.
pub fn dwarf_frame_x86_64(low: u64, len: u64) -> Vec<u8> {
    let mut cie = Vec::new();
    cie.extend_from_slice(&0xffff_ffffu32.to_le_bytes());
    cie.push(1); // version
    cie.push(0); // augmentation ""
    cie.extend(uleb(1)); // code alignment
    cie.extend(sleb(-8)); // data alignment
    cie.push(16); // return address register ($rip)
    cie.push(0x0c); // DW_CFA_def_cfa
    cie.extend(uleb(7)); // rsp
    cie.extend(uleb(8));
    cie.push(0x80 | 16); // DW_CFA_offset r16
    cie.extend(uleb(1)); // cfa + 1 * -8

    let mut fde = Vec::new();
    fde.extend_from_slice(&0u32.to_le_bytes()); // CIE offset
    fde.extend_from_slice(&low.to_le_bytes());
    fde.extend_from_slice(&len.to_le_bytes());

    let mut out = Vec::new();
    out.extend_from_slice(&(cie.len() as u32).to_le_bytes());
    out.extend_from_slice(&cie);
    out.extend_from_slice(&(fde.len() as u32).to_le_bytes());
    out.extend_from_slice(&fde);
    out
}

// ---------------------------------------------------------------------------
// ELF builder
// ---------------------------------------------------------------------------

pub struct ElfSectionSpec {
    pub name: String,
    pub sh_type: u32,
    pub sh_addr: u64,
    pub sh_link: u32,
    pub data: Vec<u8>,
}

/// Builds little-endian ELF64 images section by section.
pub struct ElfBuilder {
    machine: u16,
    sections: Vec<ElfSectionSpec>,
    load_segments: Vec<u64>,
}

impl ElfBuilder {
    pub fn new() -> Self {
        Self {
            machine: 62, // EM_X86_64
            sections: Vec::new(),
            load_segments: Vec::new(),
        }
    }

    pub fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    pub fn load_segment(mut self, vaddr: u64) -> Self {
        self.load_segments.push(vaddr);
        self
    }

    pub fn section(mut self, name: &str, sh_type: u32, sh_addr: u64, data: Vec<u8>) -> Self {
        self.sections.push(ElfSectionSpec {
            name: name.to_string(),
            sh_type,
            sh_addr,
            sh_link: 0,
            data,
        });
        self
    }

    /// Section with sh_link pointing at another section by table index
    /// (user sections start at index 1).
    pub fn section_linked(
        mut self,
        name: &str,
        sh_type: u32,
        sh_addr: u64,
        data: Vec<u8>,
        sh_link: u32,
    ) -> Self {
        self.sections.push(ElfSectionSpec {
            name: name.to_string(),
            sh_type,
            sh_addr,
            sh_link,
            data,
        });
        self
    }

    pub fn build(self) -> Vec<u8> {
        let phnum = self.load_segments.len();
        let phoff = if phnum > 0 { 64 } else { 0 };
        let data_start = 64 + phnum * 56;

        // Section-name string table
        let mut shstr = vec![0u8];
        let mut name_offsets = Vec::new();
        for s in &self.sections {
            name_offsets.push(shstr.len() as u32);
            shstr.extend_from_slice(s.name.as_bytes());
            shstr.push(0);
        }
        let shstrtab_name = shstr.len() as u32;
        shstr.extend_from_slice(b".shstrtab");
        shstr.push(0);

        // Lay out section data
        let mut blob = Vec::new();
        let mut offsets = Vec::new();
        for s in &self.sections {
            align_to(&mut blob, 8);
            offsets.push((data_start + blob.len()) as u64);
            blob.extend_from_slice(&s.data);
        }
        align_to(&mut blob, 8);
        let shstrtab_offset = (data_start + blob.len()) as u64;
        blob.extend_from_slice(&shstr);
        align_to(&mut blob, 8);
        let shoff = (data_start + blob.len()) as u64;

        let shnum = self.sections.len() + 2; // null + users + shstrtab
        let shstrndx = (shnum - 1) as u16;

        let mut out = vec![0u8; 64];
        out[0..4].copy_from_slice(b"\x7fELF");
        out[4] = 2; // ELFCLASS64
        out[5] = 1; // ELFDATA2LSB
        out[6] = 1;
        out[16..18].copy_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        out[18..20].copy_from_slice(&self.machine.to_le_bytes());
        out[20..24].copy_from_slice(&1u32.to_le_bytes());
        out[32..40].copy_from_slice(&(phoff as u64).to_le_bytes());
        out[40..48].copy_from_slice(&shoff.to_le_bytes());
        out[52..54].copy_from_slice(&64u16.to_le_bytes()); // e_ehsize
        out[54..56].copy_from_slice(&56u16.to_le_bytes()); // e_phentsize
        out[56..58].copy_from_slice(&(phnum as u16).to_le_bytes());
        out[58..60].copy_from_slice(&64u16.to_le_bytes()); // e_shentsize
        out[60..62].copy_from_slice(&(shnum as u16).to_le_bytes());
        out[62..64].copy_from_slice(&shstrndx.to_le_bytes());

        // Program headers
        for vaddr in &self.load_segments {
            let mut ph = vec![0u8; 56];
            ph[0..4].copy_from_slice(&1u32.to_le_bytes()); // PT_LOAD
            ph[16..24].copy_from_slice(&vaddr.to_le_bytes());
            ph[32..40].copy_from_slice(&0x1000u64.to_le_bytes()); // filesz
            ph[40..48].copy_from_slice(&0x1000u64.to_le_bytes()); // memsz
            out.extend_from_slice(&ph);
        }

        out.extend_from_slice(&blob);

        // Section table: null entry first
        out.extend_from_slice(&[0u8; 64]);
        for (i, s) in self.sections.iter().enumerate() {
            let mut sh = vec![0u8; 64];
            sh[0..4].copy_from_slice(&name_offsets[i].to_le_bytes());
            sh[4..8].copy_from_slice(&s.sh_type.to_le_bytes());
            sh[16..24].copy_from_slice(&s.sh_addr.to_le_bytes());
            sh[24..32].copy_from_slice(&offsets[i].to_le_bytes());
            sh[32..40].copy_from_slice(&(s.data.len() as u64).to_le_bytes());
            sh[40..44].copy_from_slice(&s.sh_link.to_le_bytes());
            out.extend_from_slice(&sh);
        }
        // .shstrtab entry
        let mut sh = vec![0u8; 64];
        sh[0..4].copy_from_slice(&shstrtab_name.to_le_bytes());
        sh[4..8].copy_from_slice(&3u32.to_le_bytes()); // SHT_STRTAB
        sh[24..32].copy_from_slice(&shstrtab_offset.to_le_bytes());
        sh[32..40].copy_from_slice(&(shstr.len() as u64).to_le_bytes());
        out.extend_from_slice(&sh);

        out
    }
}

/// An ELF64 symbol table entry (for .symtab test images).
pub fn elf64_symbol(name_offset: u32, info: u8, shndx: u16, value: u64, size: u64) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&name_offset.to_le_bytes());
    out.push(info);
    out.push(0);
    out.extend_from_slice(&shndx.to_le_bytes());
    out.extend_from_slice(&value.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out
}

/// A GNU build-id note section body.
pub fn build_id_note(id: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&4u32.to_le_bytes());
    out.extend_from_slice(&(id.len() as u32).to_le_bytes());
    out.extend_from_slice(&3u32.to_le_bytes()); // NT_GNU_BUILD_ID
    out.extend_from_slice(b"GNU\0");
    out.extend_from_slice(id);
    align_to(&mut out, 4);
    out
}

/// A .gnu_debuglink section body: NUL-terminated name, 4-aligned, CRC32.
pub fn debuglink_section(filename: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(filename.as_bytes());
    out.push(0);
    align_to(&mut out, 4);
    out.extend_from_slice(&0u32.to_le_bytes()); // CRC (not validated)
    out
}

// ---------------------------------------------------------------------------
// PE builder
// ---------------------------------------------------------------------------

pub struct PeSectionSpec {
    pub name: String,
    pub virtual_address: u32,
    pub virtual_size: u32,
    pub data: Vec<u8>,
}

/// Builds PE32/PE32+ images, storing long section names through a COFF
/// string table the way MinGW does.
pub struct PeBuilder {
    machine: u16,
    pe32plus: bool,
    image_base: u64,
    sections: Vec<PeSectionSpec>,
    export_dir: (u32, u32),
    debug_dir: (u32, u32),
}

impl PeBuilder {
    pub fn new() -> Self {
        Self {
            machine: 0x8664, // AMD64
            pe32plus: true,
            image_base: 0x140000000,
            sections: Vec::new(),
            export_dir: (0, 0),
            debug_dir: (0, 0),
        }
    }

    pub fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    pub fn pe32(mut self, image_base: u32) -> Self {
        self.pe32plus = false;
        self.image_base = image_base as u64;
        self
    }

    pub fn image_base(mut self, base: u64) -> Self {
        self.image_base = base;
        self
    }

    pub fn section(mut self, name: &str, virtual_address: u32, data: Vec<u8>) -> Self {
        self.sections.push(PeSectionSpec {
            name: name.to_string(),
            virtual_address,
            virtual_size: data.len() as u32,
            data,
        });
        self
    }

    pub fn export_directory(mut self, rva: u32, size: u32) -> Self {
        self.export_dir = (rva, size);
        self
    }

    pub fn debug_directory(mut self, rva: u32, size: u32) -> Self {
        self.debug_dir = (rva, size);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let opt_fixed = if self.pe32plus { 112 } else { 96 };
        let opt_size = opt_fixed + 16 * 8;
        let coff_offset = 0x44;
        let opt_offset = coff_offset + 20;
        let table_offset = opt_offset + opt_size;
        let header_end = table_offset + self.sections.len() * 40;

        // String table for long names
        let mut strtab = vec![0u8; 4];
        let mut raw_names = Vec::new();
        for s in &self.sections {
            if s.name.len() <= 8 {
                raw_names.push(s.name.clone());
            } else {
                raw_names.push(format!("/{}", strtab.len()));
                strtab.extend_from_slice(s.name.as_bytes());
                strtab.push(0);
            }
        }
        let strtab_len = strtab.len() as u32;
        strtab[0..4].copy_from_slice(&strtab_len.to_le_bytes());

        // Section raw data offsets
        let mut file_offsets = Vec::new();
        let mut cursor = (header_end + 0x1ff) & !0x1ff;
        for s in &self.sections {
            file_offsets.push(cursor);
            cursor = (cursor + s.data.len() + 0x1ff) & !0x1ff;
        }
        let strtab_offset = cursor;
        let total = strtab_offset + strtab.len();

        let mut out = vec![0u8; total];

        // MS-DOS stub
        out[0] = b'M';
        out[1] = b'Z';
        out[0x3c..0x40].copy_from_slice(&0x40u32.to_le_bytes());
        out[0x40..0x44].copy_from_slice(b"PE\0\0");

        // COFF header
        out[coff_offset..coff_offset + 2].copy_from_slice(&self.machine.to_le_bytes());
        out[coff_offset + 2..coff_offset + 4]
            .copy_from_slice(&(self.sections.len() as u16).to_le_bytes());
        out[coff_offset + 8..coff_offset + 12]
            .copy_from_slice(&(strtab_offset as u32).to_le_bytes());
        // NumberOfSymbols stays 0: the string table sits right at
        // PointerToSymbolTable.
        out[coff_offset + 16..coff_offset + 18].copy_from_slice(&(opt_size as u16).to_le_bytes());

        // Optional header
        if self.pe32plus {
            out[opt_offset..opt_offset + 2].copy_from_slice(&0x020bu16.to_le_bytes());
            out[opt_offset + 24..opt_offset + 32].copy_from_slice(&self.image_base.to_le_bytes());
            out[opt_offset + 108..opt_offset + 112].copy_from_slice(&16u32.to_le_bytes());
        } else {
            out[opt_offset..opt_offset + 2].copy_from_slice(&0x010bu16.to_le_bytes());
            out[opt_offset + 28..opt_offset + 32]
                .copy_from_slice(&(self.image_base as u32).to_le_bytes());
            out[opt_offset + 92..opt_offset + 96].copy_from_slice(&16u32.to_le_bytes());
        }

        // Data directories
        let dirs = opt_offset + opt_fixed;
        out[dirs..dirs + 4].copy_from_slice(&self.export_dir.0.to_le_bytes());
        out[dirs + 4..dirs + 8].copy_from_slice(&self.export_dir.1.to_le_bytes());
        let debug_entry = dirs + 6 * 8;
        out[debug_entry..debug_entry + 4].copy_from_slice(&self.debug_dir.0.to_le_bytes());
        out[debug_entry + 4..debug_entry + 8].copy_from_slice(&self.debug_dir.1.to_le_bytes());

        // Section table and raw data
        for (i, s) in self.sections.iter().enumerate() {
            let entry = table_offset + i * 40;
            let name_bytes = raw_names[i].as_bytes();
            out[entry..entry + name_bytes.len().min(8)]
                .copy_from_slice(&name_bytes[..name_bytes.len().min(8)]);
            out[entry + 8..entry + 12].copy_from_slice(&s.virtual_size.to_le_bytes());
            out[entry + 12..entry + 16].copy_from_slice(&s.virtual_address.to_le_bytes());
            out[entry + 16..entry + 20].copy_from_slice(&(s.data.len() as u32).to_le_bytes());
            out[entry + 20..entry + 24].copy_from_slice(&(file_offsets[i] as u32).to_le_bytes());

            out[file_offsets[i]..file_offsets[i] + s.data.len()].copy_from_slice(&s.data);
        }

        out[strtab_offset..].copy_from_slice(&strtab);
        out
    }
}
