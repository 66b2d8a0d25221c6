//! Export directory walking
//!
//! The extern fallback for PE images without DWARF data: every named export
//! becomes a PUBLIC record, except forwarders (entries whose resolved RVA
//! points back inside the export directory itself).

use tracing::{debug, warn};

use crate::demangle::demangle;
use crate::formats::pe::sections::SectionTable;
use crate::formats::pe::types::*;
use crate::formats::pe::utils::{read_cstring, ReadExt};
use crate::module::{Extern, Module};

const MAX_NAME_LEN: usize = 512;

/// Walk the export name-pointer table and add externs to `module`.
///
/// Returns the number of externs added. An absent or empty export
/// directory yields zero.
pub fn exports_to_module(
    data: &[u8],
    sections: &SectionTable,
    dir: &DataDirectory,
    image_base: u64,
    module: &mut Module,
) -> Result<usize> {
    if dir.virtual_address == 0 || dir.size == 0 {
        debug!("no export directory");
        return Ok(0);
    }

    let offset = sections
        .rva_to_offset(dir.virtual_address)
        .ok_or(PeError::InvalidRva {
            rva: dir.virtual_address,
        })?;

    // IMAGE_EXPORT_DIRECTORY is 40 bytes.
    let read = |field: usize| {
        data.read_u32_le_at(offset + field)
            .ok_or(PeError::InvalidOffset {
                offset: offset + field,
            })
    };
    let _ordinal_base = read(16)?;
    let number_of_functions = read(20)?;
    let number_of_names = read(24)?;
    let address_table_rva = read(28)?;
    let name_table_rva = read(32)?;
    let ordinal_table_rva = read(36)?;

    if number_of_names == 0 || name_table_rva == 0 || ordinal_table_rva == 0 {
        debug!("export directory has no named exports");
        return Ok(0);
    }

    let name_table = sections
        .rva_to_offset(name_table_rva)
        .ok_or(PeError::InvalidRva { rva: name_table_rva })?;
    let ordinal_table = sections
        .rva_to_offset(ordinal_table_rva)
        .ok_or(PeError::InvalidRva {
            rva: ordinal_table_rva,
        })?;
    let address_table = sections
        .rva_to_offset(address_table_rva)
        .ok_or(PeError::InvalidRva {
            rva: address_table_rva,
        })?;

    let dir_start = dir.virtual_address;
    let dir_end = dir.virtual_address.saturating_add(dir.size);
    let mut added = 0;

    for i in 0..number_of_names as usize {
        let (Some(name_rva), Some(ordinal)) = (
            data.read_u32_le_at(name_table + i * 4),
            data.read_u16_le_at(ordinal_table + i * 2),
        ) else {
            warn!(entry = i, "export tables truncated");
            break;
        };

        // The ordinal table holds unbiased indices into the address table.
        let ordinal = ordinal as u32;
        if ordinal >= number_of_functions {
            warn!(
                entry = i,
                ordinal,
                count = number_of_functions,
                "export ordinal out of range, skipping"
            );
            continue;
        }

        let Some(rva) = data.read_u32_le_at(address_table + ordinal as usize * 4) else {
            warn!(entry = i, "export address table truncated");
            break;
        };
        if rva == 0 {
            continue;
        }

        // An RVA inside the export directory is a forwarder string, not
        // code in this image.
        if rva >= dir_start && rva < dir_end {
            debug!(entry = i, rva, "skipping forwarded export");
            continue;
        }

        let name = match sections
            .rva_to_offset(name_rva)
            .and_then(|o| read_cstring(data, o, MAX_NAME_LEN).ok())
        {
            Some(n) if !n.is_empty() => n,
            _ => {
                warn!(entry = i, name_rva, "unresolvable export name, skipping");
                continue;
            }
        };

        module.add_extern(Extern {
            address: image_base + rva as u64,
            name: demangle(name),
        });
        added += 1;
    }

    debug!(count = added, "loaded export symbols");
    Ok(added)
}
