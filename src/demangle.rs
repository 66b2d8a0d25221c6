//! Demangler helpers for extern names.
//!
//! Names found in ELF symbol tables and PE export tables are linker-level
//! and may be mangled; DWARF `DW_AT_name` values are already source-level
//! and bypass this. Unrecognized names pass through unchanged.

/// Demangle a single symbol name, best effort.
pub fn demangle(name: &str) -> String {
    // Rust (v0 + legacy) demangler
    if let Ok(dm) = rustc_demangle::try_demangle(name) {
        return format!("{:#}", dm);
    }

    // C++ (Itanium) demangler
    if name.starts_with("_Z") || name.starts_with("__Z") {
        if let Ok(sym) = cpp_demangle::Symbol::new(name) {
            if let Ok(out) = sym.demangle(&cpp_demangle::DemangleOptions::default()) {
                return out;
            }
        }
    }

    name.to_string()
}
