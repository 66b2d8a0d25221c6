//! Call-frame-information bridge: DWARF CFI into Module unwind rules.
//!
//! `.debug_frame` and `.eh_frame` follow the same conversion; `.eh_frame`
//! additionally needs section base addresses for its encoded-pointer modes.
//! Register recovery is rendered as postfix expressions over register names
//! and the `.cfa`/`.ra` pseudo-registers.

use std::collections::BTreeMap;

use gimli::{BaseAddresses, CfaRule, CieOrFde, Register, RegisterRule, UnwindSection};
use tracing::{debug, warn};

use super::registers::register_names;
use super::{endianness, DwarfError, Reader, Result};
use crate::formats::{ObjectFile, ObjectReader, SectionInfo};
use crate::module::{Architecture, Module, StackFrameEntry};

/// Which unwind section is being converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfiSection {
    DebugFrame,
    EhFrame,
}

impl CfiSection {
    pub fn section_name(&self) -> &'static str {
        match self {
            CfiSection::DebugFrame => ".debug_frame",
            CfiSection::EhFrame => ".eh_frame",
        }
    }
}

/// Convert one unwind section into stack frame entries on `module`.
///
/// Returns the number of entries added. A parse failure here is expected to
/// be treated as non-fatal by the caller; other debug info may still be
/// usable.
pub fn populate_cfi(
    object: &ObjectFile<'_>,
    section: &SectionInfo<'_>,
    kind: CfiSection,
    architecture: Architecture,
    module: &mut Module,
) -> Result<usize> {
    let names =
        register_names(architecture).ok_or(DwarfError::UnsupportedArchitecture(architecture))?;
    let endian = endianness(object.big_endian());

    // Pointers in .eh_frame may be encoded relative to these bases.
    let mut bases = BaseAddresses::default().set_eh_frame(section.address);
    if let Some(text) = object.section_by_name(".text") {
        bases = bases.set_text(text.address);
    }
    if let Some(got) = object.section_by_name(".got") {
        bases = bases.set_got(got.address);
    }

    match kind {
        CfiSection::DebugFrame => {
            let mut frame = gimli::DebugFrame::new(section.data, endian);
            frame.set_address_size(object.address_size());
            convert_frames(frame, &bases, names, module)
        }
        CfiSection::EhFrame => {
            let mut frame = gimli::EhFrame::new(section.data, endian);
            frame.set_address_size(object.address_size());
            convert_frames(frame, &bases, names, module)
        }
    }
}

fn convert_frames<'d, S>(
    section: S,
    bases: &BaseAddresses,
    names: &[&str],
    module: &mut Module,
) -> Result<usize>
where
    S: UnwindSection<Reader<'d>>,
{
    let mut ctx = Box::new(gimli::UnwindContext::new());
    let mut entries = section.entries(bases);
    let mut added = 0;

    while let Some(entry) = entries.next()? {
        let partial = match entry {
            CieOrFde::Cie(_) => continue,
            CieOrFde::Fde(partial) => partial,
        };

        let fde = match partial.parse(|sec, bases, offset| sec.cie_from_offset(bases, offset)) {
            Ok(fde) => fde,
            Err(err) => {
                warn!(%err, "skipping FDE with unreadable CIE");
                continue;
            }
        };

        match convert_fde(&section, bases, &mut ctx, &fde, names) {
            Ok(Some(frame_entry)) => {
                module.add_stack_frame_entry(frame_entry);
                added += 1;
            }
            Ok(None) => {}
            Err(err) => {
                warn!(%err, address = fde.initial_address(), "skipping malformed FDE");
            }
        }
    }

    Ok(added)
}

fn convert_fde<'d, S>(
    section: &S,
    bases: &BaseAddresses,
    ctx: &mut gimli::UnwindContext<usize>,
    fde: &gimli::FrameDescriptionEntry<Reader<'d>>,
    names: &[&str],
) -> std::result::Result<Option<StackFrameEntry>, gimli::Error>
where
    S: UnwindSection<Reader<'d>>,
{
    let return_address = fde.cie().return_address_register();
    let mut entry = StackFrameEntry {
        address: fde.initial_address(),
        size: fde.len(),
        ..Default::default()
    };

    let mut previous: Option<BTreeMap<String, String>> = None;
    let mut table = fde.rows(section, bases, ctx)?;

    while let Some(row) = table.next_row()? {
        let mut rules = BTreeMap::new();

        match row.cfa() {
            CfaRule::RegisterAndOffset { register, offset } => {
                if let Some(name) = rule_register_name(*register, names, return_address) {
                    rules.insert(".cfa".to_string(), format!("{} {} +", name, offset));
                }
            }
            _ => {
                debug!(
                    address = row.start_address(),
                    "expression-valued CFA rule is not representable"
                );
            }
        }

        for &(register, ref rule) in row.registers() {
            let Some(name) = rule_register_name(register, names, return_address) else {
                continue;
            };
            if let Some(expr) = render_rule(rule, &name, names, return_address) {
                rules.insert(name, expr);
            }
        }

        match &previous {
            None => {
                // The rules in effect at the entry's start address.
                if rules.is_empty() {
                    return Ok(None);
                }
                entry.initial_rules = rules.clone();
            }
            Some(previous) => {
                let mut changed = BTreeMap::new();
                for (name, expr) in &rules {
                    if previous.get(name) != Some(expr) {
                        changed.insert(name.clone(), expr.clone());
                    }
                }
                if !changed.is_empty() {
                    entry.rule_changes.insert(row.start_address(), changed);
                }
            }
        }
        previous = Some(rules);
    }

    if entry.initial_rules.is_empty() {
        return Ok(None);
    }
    Ok(Some(entry))
}

/// Symbol-file name for a CFI register number: `.ra` for the CIE's return
/// address register, otherwise the architecture's name table.
fn rule_register_name(register: Register, names: &[&str], return_address: Register) -> Option<String> {
    if register == return_address {
        return Some(".ra".to_string());
    }
    match names.get(register.0 as usize) {
        Some(name) if !name.is_empty() => Some((*name).to_string()),
        _ => {
            debug!(register = register.0, "register number has no name, rule dropped");
            None
        }
    }
}

/// Render one register-recovery rule as a postfix expression.
fn render_rule(
    rule: &RegisterRule<usize>,
    own_name: &str,
    names: &[&str],
    return_address: Register,
) -> Option<String> {
    match rule {
        RegisterRule::Offset(offset) => Some(format!(".cfa {} + ^", offset)),
        RegisterRule::ValOffset(offset) => Some(format!(".cfa {} +", offset)),
        RegisterRule::Register(other) => rule_register_name(*other, names, return_address),
        RegisterRule::SameValue => Some(own_name.to_string()),
        RegisterRule::Undefined => None,
        other => {
            debug!(?other, "unsupported register rule, dropped");
            None
        }
    }
}
