//! Compilation-unit bridge: DWARF debug info into Module functions and
//! lines.
//!
//! Walks every compilation unit in `.debug_info`, collecting subprogram
//! ranges and names, runs each unit's line-number program, and assigns the
//! resulting line records to functions by address containment.

use std::collections::BTreeMap;

use gimli::AttributeValue;
use tracing::{debug, warn};

use super::{endianness, Reader, Result};
use crate::demangle::demangle;
use crate::formats::{ObjectFile, ObjectReader};
use crate::module::{Function, Line, Module};

const MAX_REFERENCE_DEPTH: usize = 16;

/// Parse `.debug_info` and populate `module` with functions and lines.
///
/// Returns the number of functions added. Zero with no error means the
/// sections were present but described no code.
pub fn populate_functions(
    object: &ObjectFile<'_>,
    handle_inter_cu_refs: bool,
    module: &mut Module,
) -> Result<usize> {
    let endian = endianness(object.big_endian());
    let dwarf = gimli::Dwarf::load(|id| {
        let data = object
            .section_by_name(id.name())
            .map(|s| s.data)
            .unwrap_or(&[]);
        Ok::<_, gimli::Error>(gimli::EndianSlice::new(data, endian))
    })?;

    let mut added = 0;
    let mut units = dwarf.units();
    while let Some(header) = units.next()? {
        let unit = dwarf.unit(header)?;
        added += populate_unit(&dwarf, &unit, handle_inter_cu_refs, module)?;
    }

    Ok(added)
}

fn populate_unit(
    dwarf: &gimli::Dwarf<Reader<'_>>,
    unit: &gimli::Unit<Reader<'_>>,
    handle_inter_cu_refs: bool,
    module: &mut Module,
) -> Result<usize> {
    let mut functions = collect_functions(dwarf, unit, handle_inter_cu_refs)?;
    let lines = collect_lines(dwarf, unit)?;
    assign_lines(&mut functions, lines);

    let added = functions.len();
    for function in functions {
        module.add_function(function);
    }
    Ok(added)
}

/// Walk the DIE tree collecting concrete subprograms with code ranges.
fn collect_functions(
    dwarf: &gimli::Dwarf<Reader<'_>>,
    unit: &gimli::Unit<Reader<'_>>,
    handle_inter_cu_refs: bool,
) -> Result<Vec<Function>> {
    let mut functions = Vec::new();
    let mut entries = unit.entries();

    while let Some(entry) = entries.next_dfs()? {
        if entry.tag() != gimli::DW_TAG_subprogram {
            continue;
        }
        if matches!(
            entry.attr_value(gimli::DW_AT_declaration),
            Some(AttributeValue::Flag(true))
        ) {
            continue;
        }

        let Some(low_pc) = entry
            .attr_value(gimli::DW_AT_low_pc)
            .and_then(|v| dwarf.attr_address(unit, v).ok().flatten())
        else {
            continue;
        };
        // Compilers emit low_pc 0 for functions removed by the linker.
        if low_pc == 0 {
            continue;
        }

        let high_pc = match entry.attr_value(gimli::DW_AT_high_pc) {
            Some(AttributeValue::Addr(addr)) => addr,
            Some(AttributeValue::Udata(size)) => low_pc + size,
            Some(AttributeValue::Data4(size)) => low_pc + size as u64,
            Some(AttributeValue::Data8(size)) => low_pc + size,
            _ => {
                debug!(low_pc, "subprogram without usable high_pc, skipping");
                continue;
            }
        };
        if high_pc <= low_pc {
            continue;
        }

        let name = entry_name(dwarf, unit, entry, handle_inter_cu_refs, 0)
            .unwrap_or_else(|| "<name omitted>".to_string());

        functions.push(Function {
            address: low_pc,
            size: high_pc - low_pc,
            parameter_size: 0,
            name,
            lines: Vec::new(),
        });
    }

    Ok(functions)
}

/// Resolve a subprogram's name: direct name, linkage name, or through
/// specification/abstract-origin references.
fn entry_name(
    dwarf: &gimli::Dwarf<Reader<'_>>,
    unit: &gimli::Unit<Reader<'_>>,
    entry: &gimli::DebuggingInformationEntry<Reader<'_>>,
    handle_inter_cu_refs: bool,
    depth: usize,
) -> Option<String> {
    if depth > MAX_REFERENCE_DEPTH {
        warn!("reference chain too deep while resolving a function name");
        return None;
    }

    if let Some(value) = entry.attr_value(gimli::DW_AT_name) {
        if let Ok(s) = dwarf.attr_string(unit, value) {
            return Some(reader_str(&s));
        }
    }

    for attr in [gimli::DW_AT_linkage_name, gimli::DW_AT_MIPS_linkage_name] {
        if let Some(value) = entry.attr_value(attr) {
            if let Ok(s) = dwarf.attr_string(unit, value) {
                return Some(demangle(&reader_str(&s)));
            }
        }
    }

    for attr in [gimli::DW_AT_specification, gimli::DW_AT_abstract_origin] {
        match entry.attr_value(attr) {
            Some(AttributeValue::UnitRef(offset)) => {
                if let Ok(target) = unit.entry(offset) {
                    if let Some(name) =
                        entry_name(dwarf, unit, &target, handle_inter_cu_refs, depth + 1)
                    {
                        return Some(name);
                    }
                }
            }
            Some(AttributeValue::DebugInfoRef(offset)) => {
                if !handle_inter_cu_refs {
                    debug!("inter-CU reference present but resolution is disabled");
                    continue;
                }
                if let Some(name) =
                    cross_unit_name(dwarf, offset, handle_inter_cu_refs, depth + 1)
                {
                    return Some(name);
                }
            }
            _ => {}
        }
    }

    None
}

/// Resolve a DW_FORM_ref_addr reference by locating the compilation unit
/// containing `offset`.
fn cross_unit_name(
    dwarf: &gimli::Dwarf<Reader<'_>>,
    offset: gimli::DebugInfoOffset<usize>,
    handle_inter_cu_refs: bool,
    depth: usize,
) -> Option<String> {
    let mut units = dwarf.units();
    while let Ok(Some(header)) = units.next() {
        let Some(start) = header.offset().to_debug_info_offset(&header) else {
            continue;
        };
        let end = start.0 + header.length_including_self();
        if offset.0 < start.0 || offset.0 >= end {
            continue;
        }

        let unit = dwarf.unit(header).ok()?;
        let local = offset.to_unit_offset(&unit.header)?;
        let target = unit.entry(local).ok()?;
        return entry_name(dwarf, &unit, &target, handle_inter_cu_refs, depth);
    }
    None
}

/// Run the unit's line-number program into [address, next-address) records.
fn collect_lines(
    dwarf: &gimli::Dwarf<Reader<'_>>,
    unit: &gimli::Unit<Reader<'_>>,
) -> Result<Vec<Line>> {
    let Some(program) = unit.line_program.clone() else {
        return Ok(Vec::new());
    };

    let mut lines = Vec::new();
    let mut pending: Option<(u64, String, u64)> = None;
    let mut rows = program.rows();

    while let Some((header, row)) = rows.next_row()? {
        let address = row.address();

        if let Some((start, file, number)) = pending.take() {
            if address > start {
                lines.push(Line {
                    address: start,
                    size: address - start,
                    file,
                    number,
                });
            }
        }

        if row.end_sequence() {
            continue;
        }
        if let Some(number) = row.line() {
            let file = render_file(dwarf, unit, header, row.file_index());
            pending = Some((address, file, number.get()));
        }
    }

    Ok(lines)
}

/// Render a line-table file entry as a path, joining relative entries with
/// the compilation directory.
fn render_file(
    dwarf: &gimli::Dwarf<Reader<'_>>,
    unit: &gimli::Unit<Reader<'_>>,
    header: &gimli::LineProgramHeader<Reader<'_>>,
    index: u64,
) -> String {
    let Some(file) = header.file(index) else {
        return "<unknown>".to_string();
    };

    let name = dwarf
        .attr_string(unit, file.path_name())
        .map(|s| reader_str(&s))
        .unwrap_or_else(|_| "<unknown>".to_string());
    if name.starts_with('/') {
        return name;
    }

    let directory = file
        .directory(header)
        .and_then(|d| dwarf.attr_string(unit, d).ok())
        .map(|s| reader_str(&s))
        .unwrap_or_default();

    let mut path = String::new();
    if !directory.starts_with('/') {
        if let Some(comp_dir) = &unit.comp_dir {
            path.push_str(&reader_str(comp_dir));
            if !path.is_empty() && !path.ends_with('/') {
                path.push('/');
            }
        }
    }
    if !directory.is_empty() {
        path.push_str(&directory);
        if !path.ends_with('/') {
            path.push('/');
        }
    }
    path.push_str(&name);
    path
}

/// Assign line records to functions by address containment; records
/// covering no known function are dropped.
fn assign_lines(functions: &mut [Function], lines: Vec<Line>) {
    let by_address: BTreeMap<u64, usize> = functions
        .iter()
        .enumerate()
        .map(|(i, f)| (f.address, i))
        .collect();

    let mut dropped = 0usize;
    for mut line in lines {
        let owner = by_address
            .range(..=line.address)
            .next_back()
            .map(|(_, &i)| i)
            .filter(|&i| {
                let f = &functions[i];
                line.address < f.address + f.size
            });

        match owner {
            Some(i) => {
                let end = functions[i].address + functions[i].size;
                if line.address + line.size > end {
                    line.size = end - line.address;
                }
                functions[i].lines.push(line);
            }
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(count = dropped, "line records outside any function dropped");
    }

    for function in functions {
        function.lines.sort_by_key(|l| l.address);
    }
}

fn reader_str(reader: &Reader<'_>) -> String {
    String::from_utf8_lossy(reader.slice()).into_owned()
}
