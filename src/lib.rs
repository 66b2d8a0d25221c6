//! symdump: extract debugging metadata from compiled binaries into text
//! symbol files.
//!
//! Reads ELF (32/64-bit) and PE/COFF (PE32/PE32+) images, pulls out
//! functions and source-line mappings from DWARF data, call-frame unwind
//! rules from `.debug_frame`/`.eh_frame`, exported or symbol-table names
//! when no DWARF is present, and a stable per-binary identifier, then
//! serializes everything as a format-agnostic symbol file a crash analyzer
//! can consume without the original binary.

pub mod demangle;
pub mod dump;
pub mod dwarf;
pub mod error;
pub mod file_id;
pub mod formats;
pub mod io;
pub mod logging;
pub mod module;

pub use dump::{read_symbol_data, write_symbol_file, DumpOptions};
pub use error::{DumpError, Result};
pub use module::{Architecture, BuildId, Extern, Function, Line, Module, SymbolData};
