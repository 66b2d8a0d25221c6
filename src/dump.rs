//! Orchestration: find all debugging info in an object file and produce a
//! populated Module, or write it straight out as a text symbol file.
//!
//! A file is processed in one pass unless it carries no embedded debug info
//! and names a companion via `.gnu_debuglink`; then a second pass loads the
//! companion into the same Module after cross-validating that both files
//! describe the same build.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::dwarf::cfi::{self, CfiSection};
use crate::dwarf::cu;
use crate::error::{DumpError, Result};
use crate::file_id;
use crate::formats::{ObjectFile, ObjectReader};
use crate::io::FileMap;
use crate::module::{Architecture, Module, SymbolData};

/// Options controlling extraction.
#[derive(Debug, Clone)]
pub struct DumpOptions {
    /// Which record categories to extract and emit.
    pub symbol_data: SymbolData,
    /// Follow DW_FORM_ref_addr references into other compilation units.
    pub handle_inter_cu_refs: bool,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            symbol_data: SymbolData::All,
            handle_inter_cu_refs: true,
        }
    }
}

/// State spanning the two passes of debug-link resolution.
struct LoadSymbolsInfo {
    debug_dirs: Vec<PathBuf>,
    loaded_sections: HashSet<String>,
    debuglink_file: Option<PathBuf>,
    loading_address: Option<(u64, PathBuf)>,
}

impl LoadSymbolsInfo {
    fn new(debug_dirs: &[PathBuf]) -> Self {
        Self {
            debug_dirs: debug_dirs.to_vec(),
            loaded_sections: HashSet::new(),
            debuglink_file: None,
            loading_address: None,
        }
    }

    /// Record that a named section is being consumed. Returns false when it
    /// was already loaded from an earlier pass, so it must not be processed
    /// again.
    fn loaded_section(&mut self, name: &str) -> bool {
        if self.loaded_sections.insert(name.to_string()) {
            true
        } else {
            warn!(section = name, "section has already been loaded");
            false
        }
    }

    /// The primary file and its companion must claim the same preferred
    /// loading address.
    fn set_loading_address(&mut self, address: u64, file: &Path) -> Result<()> {
        match &self.loading_address {
            None => {
                self.loading_address = Some((address, file.to_path_buf()));
                Ok(())
            }
            Some((existing, first_file)) if *existing != address => {
                Err(DumpError::CrossValidation {
                    object_file: first_file.clone(),
                    debug_file: file.to_path_buf(),
                    field: "load address",
                })
            }
            Some(_) => Ok(()),
        }
    }
}

struct LoadOutcome {
    found_debug_info: bool,
    found_usable_info: bool,
}

/// One extraction pass over one object file.
fn load_symbols(
    path: &Path,
    object: &ObjectFile<'_>,
    architecture: Architecture,
    read_debug_link: bool,
    info: &mut LoadSymbolsInfo,
    options: &DumpOptions,
    module: &mut Module,
) -> Result<LoadOutcome> {
    let loading_address = object.loading_address();
    module.set_load_address(loading_address);
    info.set_loading_address(loading_address, path)?;

    let mut found_debug_info = false;
    let mut found_usable_info = false;

    // STABS data is recognized but not translated.
    if object.section_by_name(".stab").is_some() {
        warn!(file = %path.display(), "\".stab\" section found, but ignored");
    }

    if object.section_by_name(".debug_info").is_some() {
        found_debug_info = true;
        found_usable_info = true;

        if options.symbol_data == SymbolData::OnlyCfi {
            debug!("skipping DWARF functions and lines (only-CFI mode)");
        } else if info.loaded_section(".debug_info") {
            match cu::populate_functions(object, options.handle_inter_cu_refs, module) {
                Ok(count) => debug!(count, "loaded DWARF functions"),
                Err(err) => warn!(
                    file = %path.display(),
                    %err,
                    "\".debug_info\" section found, but failed to load DWARF debugging information"
                ),
            }
        }
    }

    // Call frame information is independent of the other DWARF data and
    // can be used alone; failures here never poison the rest.
    if options.symbol_data == SymbolData::NoCfi {
        debug!("skipping call frame information (no-CFI mode)");
    } else {
        for kind in [CfiSection::DebugFrame, CfiSection::EhFrame] {
            let Some(section) = object.section_by_name(kind.section_name()) else {
                continue;
            };
            if !info.loaded_section(kind.section_name()) {
                continue;
            }
            match cfi::populate_cfi(object, &section, kind, architecture, module) {
                Ok(count) => {
                    debug!(section = kind.section_name(), count, "loaded unwind rules");
                    found_usable_info = found_usable_info || count > 0;
                }
                Err(err) => warn!(
                    file = %path.display(),
                    section = kind.section_name(),
                    %err,
                    "failed to load call frame information"
                ),
            }
        }
    }

    if !found_debug_info {
        warn!(
            file = %path.display(),
            "file contains no debugging information (no \".debug_info\" section)"
        );

        if read_debug_link {
            if let Some(link) = object.debug_link() {
                match resolve_debug_link(&link.filename, &info.debug_dirs) {
                    Some(companion) => info.debuglink_file = Some(companion),
                    None => {
                        return Err(DumpError::DebugLinkNotFound {
                            object_file: path.to_path_buf(),
                            name: link.filename,
                        })
                    }
                }
            }
        } else if object.debug_link().is_some() {
            warn!(
                file = %path.display(),
                ".gnu_debuglink section found, but no debug path specified"
            );
        }
    }

    Ok(LoadOutcome {
        found_debug_info,
        found_usable_info,
    })
}

/// Probe each search directory (and its .debug subdirectory) for the named
/// companion file.
fn resolve_debug_link(filename: &str, debug_dirs: &[PathBuf]) -> Option<PathBuf> {
    for dir in debug_dirs {
        for candidate in [dir.join(filename), dir.join(".debug").join(filename)] {
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    warn!(name = filename, "failed to find debug file");
    None
}

/// Extract all symbol data for `object_path` into a Module.
pub fn read_symbol_data(
    object_path: &Path,
    debug_dirs: &[PathBuf],
    options: &DumpOptions,
) -> Result<Module> {
    let map = FileMap::open(object_path)?;
    let object = ObjectFile::parse(map.data())?;

    let architecture = object.architecture()?;
    let big_endian = object.big_endian();
    let id = file_id::file_identifier(&object);

    debug!(
        file = %object_path.display(),
        format = object.format_name(),
        architecture = %architecture,
        id = %hex::encode(id.bytes),
        "classified object file"
    );

    let name = base_file_name(object_path);
    let mut module = Module::new(&name, object.os_name(), architecture, id);

    let mut info = LoadSymbolsInfo::new(debug_dirs);
    let outcome = load_symbols(
        object_path,
        &object,
        architecture,
        !debug_dirs.is_empty(),
        &mut info,
        options,
        &mut module,
    )?;

    let mut found_debug_info = outcome.found_debug_info;
    let mut found_usable_info = outcome.found_usable_info;

    if !found_debug_info {
        if let Some(companion_path) = info.debuglink_file.clone() {
            info!(file = %companion_path.display(), "found debugging info in companion file");

            let companion_map = FileMap::open(&companion_path)?;
            let companion = ObjectFile::parse(companion_map.data())?;

            // These are supposed to be split halves of one build; any
            // divergence means the wrong companion was supplied.
            if companion.architecture()? != architecture {
                return Err(DumpError::CrossValidation {
                    object_file: object_path.to_path_buf(),
                    debug_file: companion_path,
                    field: "architecture",
                });
            }
            if companion.big_endian() != big_endian {
                return Err(DumpError::CrossValidation {
                    object_file: object_path.to_path_buf(),
                    debug_file: companion_path,
                    field: "endianness",
                });
            }

            let outcome = load_symbols(
                &companion_path,
                &companion,
                architecture,
                false,
                &mut info,
                options,
                &mut module,
            )?;
            found_debug_info = found_debug_info || outcome.found_debug_info;
            found_usable_info = found_usable_info || outcome.found_usable_info;
        }
    }

    // With no DWARF anywhere, exported/symbol-table names still give the
    // consumer something to resolve addresses against.
    if !found_debug_info && options.symbol_data != SymbolData::OnlyCfi {
        match object.exported_symbols(&mut module) {
            Ok(count) if count > 0 => {
                debug!(count, "loaded exported symbols");
                found_usable_info = true;
            }
            Ok(_) => debug!("no additional symbols found"),
            Err(err) => warn!(%err, "failed to read exported symbols"),
        }
    }

    if !found_usable_info {
        return Err(DumpError::NoUsableInfo(object_path.to_path_buf()));
    }

    Ok(module)
}

/// Extract symbol data for `object_path` and write a text symbol file.
///
/// On failure partial output may have been written; the caller must treat
/// it as invalid.
pub fn write_symbol_file<W: Write>(
    object_path: &Path,
    debug_dirs: &[PathBuf],
    options: &DumpOptions,
    out: &mut W,
) -> Result<()> {
    let module = read_symbol_data(object_path, debug_dirs, options)?;
    module.write(out, options.symbol_data)?;
    Ok(())
}

/// The non-directory portion of a path.
fn base_file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
