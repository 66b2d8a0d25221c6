//! Debug directory walking and CodeView record extraction

use tracing::{debug, warn};

use crate::formats::pe::sections::SectionTable;
use crate::formats::pe::types::*;
use crate::formats::pe::utils::ReadExt;
use crate::module::BuildId;

const DEBUG_DIRECTORY_ENTRY_SIZE: usize = 28;

/// Parse the debug directory entries named by data directory 6.
pub fn parse_debug_directory(
    data: &[u8],
    sections: &SectionTable,
    dir: &DataDirectory,
) -> Vec<DebugDirectoryEntry> {
    if dir.virtual_address == 0 || dir.size == 0 {
        return Vec::new();
    }

    let Some(offset) = sections.rva_to_offset(dir.virtual_address) else {
        warn!(rva = dir.virtual_address, "debug directory RVA maps to no section");
        return Vec::new();
    };

    let count = dir.size as usize / DEBUG_DIRECTORY_ENTRY_SIZE;
    let mut entries = Vec::with_capacity(count);

    for i in 0..count {
        let e = offset + i * DEBUG_DIRECTORY_ENTRY_SIZE;
        let (Some(typ), Some(size_of_data), Some(address_of_raw_data), Some(pointer_to_raw_data)) = (
            data.read_u32_le_at(e + 12),
            data.read_u32_le_at(e + 16),
            data.read_u32_le_at(e + 20),
            data.read_u32_le_at(e + 24),
        ) else {
            break;
        };
        entries.push(DebugDirectoryEntry {
            typ,
            size_of_data,
            address_of_raw_data,
            pointer_to_raw_data,
        });
    }

    entries
}

/// Extract the build identity from a CodeView PDB 7.0 record, if one is
/// present in the debug directory.
pub fn codeview_build_id(
    data: &[u8],
    sections: &SectionTable,
    dir: &DataDirectory,
) -> Option<BuildId> {
    for entry in parse_debug_directory(data, sections, dir) {
        if entry.typ != IMAGE_DEBUG_TYPE_CODEVIEW {
            continue;
        }

        // PointerToRawData is a file offset; fall back to the RVA when the
        // linker left it zero.
        let offset = if entry.pointer_to_raw_data != 0 {
            entry.pointer_to_raw_data as usize
        } else {
            match sections.rva_to_offset(entry.address_of_raw_data) {
                Some(o) => o,
                None => continue,
            }
        };

        // CV_INFO_PDB70: signature u32, GUID 16 bytes, age u32
        if entry.size_of_data < 24 {
            warn!(size = entry.size_of_data, "CodeView record too small");
            continue;
        }
        let Some(signature) = data.read_u32_le_at(offset) else {
            continue;
        };
        if signature != CODEVIEW_PDB70_CVSIGNATURE {
            debug!(signature, "CodeView record is not PDB 7.0, ignoring");
            continue;
        }

        let guid = data.read_slice_at(offset + 4, 16)?;
        let age = data.read_u32_le_at(offset + 20)?;

        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(guid);
        return Some(BuildId::from_guid(bytes, age));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::pe::sections::StringTable;

    // One section covering RVA 0x1000..0x2000 at file offset 0x400.
    fn section_table() -> SectionTable {
        let mut data = vec![0u8; 40];
        data[0..5].copy_from_slice(b".rdat");
        data[8..12].copy_from_slice(&0x1000u32.to_le_bytes());
        data[12..16].copy_from_slice(&0x1000u32.to_le_bytes());
        data[16..20].copy_from_slice(&0x1000u32.to_le_bytes());
        data[20..24].copy_from_slice(&0x400u32.to_le_bytes());
        SectionTable::parse(&data, 0, 1, &StringTable::default()).unwrap()
    }

    fn image_with_codeview(guid: [u8; 16], age: u32) -> Vec<u8> {
        let mut data = vec![0u8; 0x800];
        // Debug directory at file offset 0x400 (RVA 0x1000)
        let dd = 0x400;
        data[dd + 12..dd + 16].copy_from_slice(&IMAGE_DEBUG_TYPE_CODEVIEW.to_le_bytes());
        data[dd + 16..dd + 20].copy_from_slice(&0x30u32.to_le_bytes()); // SizeOfData
        data[dd + 24..dd + 28].copy_from_slice(&0x500u32.to_le_bytes()); // PointerToRawData
        // CV record at 0x500
        let cv = 0x500;
        data[cv..cv + 4].copy_from_slice(&CODEVIEW_PDB70_CVSIGNATURE.to_le_bytes());
        data[cv + 4..cv + 20].copy_from_slice(&guid);
        data[cv + 20..cv + 24].copy_from_slice(&age.to_le_bytes());
        data
    }

    #[test]
    fn test_codeview_guid_extraction() {
        let guid = [
            1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16,
        ];
        let data = image_with_codeview(guid, 3);
        let dir = DataDirectory {
            virtual_address: 0x1000,
            size: 28,
        };

        let id = codeview_build_id(&data, &section_table(), &dir).unwrap();
        assert_eq!(id.bytes, guid);
        assert_eq!(id.age, 3);
    }

    #[test]
    fn test_non_rsds_signature_ignored() {
        let mut data = image_with_codeview([0; 16], 1);
        data[0x500..0x504].copy_from_slice(&0x3031424eu32.to_le_bytes()); // "NB10"
        let dir = DataDirectory {
            virtual_address: 0x1000,
            size: 28,
        };
        assert!(codeview_build_id(&data, &section_table(), &dir).is_none());
    }

    #[test]
    fn test_missing_directory() {
        let data = vec![0u8; 0x800];
        let dir = DataDirectory::default();
        assert!(codeview_build_id(&data, &section_table(), &dir).is_none());
    }
}
