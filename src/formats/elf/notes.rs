//! Note section parsing (build id)

use crate::formats::elf::types::*;
use crate::formats::elf::utils::{align_up, EndianRead};

/// One note entry
pub struct Note<'a> {
    pub n_type: u32,
    pub name: &'a str,
    pub desc: &'a [u8],
}

/// Parsed contents of one SHT_NOTE section.
pub struct NoteSection<'a> {
    notes: Vec<Note<'a>>,
}

impl<'a> NoteSection<'a> {
    /// Parse note entries until the data runs out; a truncated trailing
    /// entry ends parsing without error.
    pub fn parse(data: &'a [u8], endian: ElfData) -> Result<Self> {
        let mut notes = Vec::new();
        let mut offset = 0;

        while offset + 12 <= data.len() {
            let n_namesz = data.read_u32(offset, endian)? as usize;
            let n_descsz = data.read_u32(offset + 4, endian)? as usize;
            let n_type = data.read_u32(offset + 8, endian)?;
            offset += 12;

            let name_end = match offset.checked_add(n_namesz) {
                Some(end) if end <= data.len() => end,
                _ => break,
            };
            let name_bytes = &data[offset..name_end];
            let len = name_bytes
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(name_bytes.len());
            let name = std::str::from_utf8(&name_bytes[..len]).unwrap_or("");
            offset = align_up(name_end, 4);

            let desc_end = match offset.checked_add(n_descsz) {
                Some(end) if end <= data.len() => end,
                _ => break,
            };
            let desc = &data[offset..desc_end];
            offset = align_up(desc_end, 4);

            notes.push(Note { n_type, name, desc });
        }

        Ok(Self { notes })
    }

    /// GNU build id bytes, if this section carries one.
    pub fn build_id(&self) -> Option<&'a [u8]> {
        self.notes
            .iter()
            .find(|n| n.name == "GNU" && n.n_type == NT_GNU_BUILD_ID)
            .map(|n| n.desc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_id_note(desc: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(&(desc.len() as u32).to_le_bytes());
        data.extend_from_slice(&NT_GNU_BUILD_ID.to_le_bytes());
        data.extend_from_slice(b"GNU\0");
        data.extend_from_slice(desc);
        while data.len() % 4 != 0 {
            data.push(0);
        }
        data
    }

    #[test]
    fn test_parse_build_id() {
        let id = [
            0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66,
            0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc,
        ];
        let data = build_id_note(&id);
        let notes = NoteSection::parse(&data, ElfData::Little).unwrap();
        assert_eq!(notes.build_id().unwrap(), &id[..]);
    }

    #[test]
    fn test_non_gnu_note_ignored() {
        let mut data = Vec::new();
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(&NT_GNU_BUILD_ID.to_le_bytes());
        data.extend_from_slice(b"XYZ\0");
        data.extend_from_slice(&[1, 2, 3, 4]);

        let notes = NoteSection::parse(&data, ElfData::Little).unwrap();
        assert!(notes.build_id().is_none());
    }

    #[test]
    fn test_truncated_note_stops_cleanly() {
        let mut data = build_id_note(&[1; 20]);
        data.truncate(14);
        let notes = NoteSection::parse(&data, ElfData::Little).unwrap();
        assert!(notes.build_id().is_none());
    }
}
