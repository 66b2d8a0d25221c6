//! In-memory, format-agnostic symbol module.
//!
//! A `Module` aggregates everything extracted from one binary: functions
//! with source-line records, externs from symbol/export tables, and
//! call-frame unwind rules. All addresses are stored absolute (in the same
//! space as the load address); the writer emits them load-relative.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write;

use tracing::debug;
use uuid::Uuid;

/// Target architectures recognized in symbol files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    X86,
    X86_64,
    Arm,
    Mips,
    Ppc,
    Ppc64,
    S390,
    Sparc,
    Sparcv9,
}

impl Architecture {
    /// Name used on the MODULE line of a symbol file.
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::X86 => "x86",
            Architecture::X86_64 => "x86_64",
            Architecture::Arm => "arm",
            Architecture::Mips => "mips",
            Architecture::Ppc => "ppc",
            Architecture::Ppc64 => "ppc64",
            Architecture::S390 => "s390",
            Architecture::Sparc => "sparc",
            Architecture::Sparcv9 => "sparcv9",
        }
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A 16-byte build identifier plus a CodeView age field.
///
/// The identifier comes from a CodeView record, a GNU build-id note, or a
/// fallback content hash; `NIL` means no reliable identity was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildId {
    pub bytes: [u8; 16],
    pub age: u32,
}

impl BuildId {
    /// Placeholder identity: all zeroes, age zero.
    pub const NIL: BuildId = BuildId {
        bytes: [0u8; 16],
        age: 0,
    };

    /// Identifier from a CodeView PDB 7.0 record (GUID stored little-endian).
    pub fn from_guid(bytes: [u8; 16], age: u32) -> Self {
        Self { bytes, age }
    }

    /// Identifier from raw hash or note bytes; truncated or zero-padded to
    /// 16 bytes.
    pub fn from_bytes(raw: &[u8]) -> Self {
        let mut bytes = [0u8; 16];
        let n = raw.len().min(16);
        bytes[..n].copy_from_slice(&raw[..n]);
        Self { bytes, age: 0 }
    }

    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }

    /// The 33-character identifier used on the MODULE line: the GUID fields
    /// rendered big-endian in uppercase hex, followed by the age in
    /// lowercase hex.
    pub fn breakpad_id(&self) -> String {
        let uuid = Uuid::from_bytes_le(self.bytes);
        format!("{:X}{:x}", uuid.simple(), self.age)
    }
}

/// One source-line record within a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub address: u64,
    pub size: u64,
    pub file: String,
    pub number: u64,
}

/// A function with its address range and line records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub address: u64,
    pub size: u64,
    pub parameter_size: u64,
    pub name: String,
    pub lines: Vec<Line>,
}

/// A symbol known only by name and address (export or symbol table entry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extern {
    pub address: u64,
    pub name: String,
}

/// Register-recovery rules for one range of instructions.
///
/// `initial_rules` hold at `address`; each entry in `rule_changes` gives the
/// rules that change at that instruction address within the range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackFrameEntry {
    pub address: u64,
    pub size: u64,
    pub initial_rules: BTreeMap<String, String>,
    pub rule_changes: BTreeMap<u64, BTreeMap<String, String>>,
}

/// Which record categories to extract and emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SymbolData {
    #[default]
    All,
    OnlyCfi,
    NoCfi,
}

/// The aggregated symbol data for one binary.
#[derive(Debug)]
pub struct Module {
    name: String,
    os: String,
    architecture: Architecture,
    id: BuildId,
    load_address: u64,
    functions: BTreeMap<u64, Function>,
    externs: BTreeMap<u64, Extern>,
    stack_frame_entries: BTreeMap<u64, StackFrameEntry>,
}

impl Module {
    pub fn new(name: &str, os: &str, architecture: Architecture, id: BuildId) -> Self {
        Self {
            name: name.to_string(),
            os: os.to_string(),
            architecture,
            id,
            load_address: 0,
            functions: BTreeMap::new(),
            externs: BTreeMap::new(),
            stack_frame_entries: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    pub fn id(&self) -> BuildId {
        self.id
    }

    pub fn set_id(&mut self, id: BuildId) {
        self.id = id;
    }

    pub fn load_address(&self) -> u64 {
        self.load_address
    }

    pub fn set_load_address(&mut self, address: u64) {
        self.load_address = address;
    }

    /// Add a function. The first function recorded at an address wins;
    /// duplicates are dropped.
    pub fn add_function(&mut self, function: Function) {
        if self.functions.contains_key(&function.address) {
            debug!(address = function.address, name = %function.name,
                   "duplicate function address, keeping first");
            return;
        }
        self.functions.insert(function.address, function);
    }

    /// Add an extern. First record at an address wins.
    pub fn add_extern(&mut self, ext: Extern) {
        self.externs.entry(ext.address).or_insert(ext);
    }

    /// Add call-frame unwind rules for one range. First record at an
    /// address wins.
    pub fn add_stack_frame_entry(&mut self, entry: StackFrameEntry) {
        self.stack_frame_entries.entry(entry.address).or_insert(entry);
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    pub fn externs(&self) -> impl Iterator<Item = &Extern> {
        self.externs.values()
    }

    pub fn stack_frame_entries(&self) -> impl Iterator<Item = &StackFrameEntry> {
        self.stack_frame_entries.values()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn extern_count(&self) -> usize {
        self.externs.len()
    }

    pub fn stack_frame_entry_count(&self) -> usize {
        self.stack_frame_entries.len()
    }

    /// Serialize as a text symbol file.
    ///
    /// Addresses are written relative to the load address. `symbol_data`
    /// selects which categories appear; a failed write may leave partial
    /// output behind, which the caller must discard.
    pub fn write<W: Write>(&self, w: &mut W, symbol_data: SymbolData) -> std::io::Result<()> {
        writeln!(
            w,
            "MODULE {} {} {} {}",
            self.os,
            self.architecture.as_str(),
            self.id.breakpad_id(),
            self.name
        )?;

        if symbol_data != SymbolData::OnlyCfi {
            // Assign source file ids in name order.
            let mut files: BTreeMap<&str, usize> = BTreeMap::new();
            for function in self.functions.values() {
                for line in &function.lines {
                    let next = files.len();
                    files.entry(line.file.as_str()).or_insert(next);
                }
            }
            // Re-number after sorting so ids follow name order.
            for (index, (_, id)) in files.iter_mut().enumerate() {
                *id = index;
            }

            for (name, id) in &files {
                writeln!(w, "FILE {} {}", id, name)?;
            }

            for function in self.functions.values() {
                writeln!(
                    w,
                    "FUNC {:x} {:x} {:x} {}",
                    function.address.wrapping_sub(self.load_address),
                    function.size,
                    function.parameter_size,
                    function.name
                )?;
                for line in &function.lines {
                    let file_id = files.get(line.file.as_str()).copied().unwrap_or(0);
                    writeln!(
                        w,
                        "{:x} {:x} {} {}",
                        line.address.wrapping_sub(self.load_address),
                        line.size,
                        line.number,
                        file_id
                    )?;
                }
            }

            for ext in self.externs.values() {
                writeln!(
                    w,
                    "PUBLIC {:x} 0 {}",
                    ext.address.wrapping_sub(self.load_address),
                    ext.name
                )?;
            }
        }

        if symbol_data != SymbolData::NoCfi {
            for entry in self.stack_frame_entries.values() {
                writeln!(
                    w,
                    "STACK CFI INIT {:x} {:x} {}",
                    entry.address.wrapping_sub(self.load_address),
                    entry.size,
                    format_rules(&entry.initial_rules)
                )?;
                for (address, rules) in &entry.rule_changes {
                    writeln!(
                        w,
                        "STACK CFI {:x} {}",
                        address.wrapping_sub(self.load_address),
                        format_rules(rules)
                    )?;
                }
            }
        }

        Ok(())
    }
}

fn format_rules(rules: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (name, expr) in rules {
        if !out.is_empty() {
            out.push(' ');
        }
        let _ = write!(out, "{}: {}", name, expr);
    }
    out
}
