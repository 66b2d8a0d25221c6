//! PE header parsing

use crate::formats::pe::types::*;
use crate::formats::pe::utils::ReadExt;

/// Follow the MS-DOS stub's e_lfanew field to the PE signature offset.
pub fn pe_signature_offset(data: &[u8]) -> Result<usize> {
    let e_magic = data.read_u16_le_at(0).ok_or(PeError::TruncatedHeader {
        expected: 2,
        actual: data.len(),
    })?;
    if e_magic != DOS_SIGNATURE {
        return Err(PeError::InvalidDosSignature);
    }

    let e_lfanew = data
        .read_u32_le_at(DOS_PE_OFFSET_FIELD)
        .ok_or(PeError::TruncatedHeader {
            expected: DOS_PE_OFFSET_FIELD + 4,
            actual: data.len(),
        })? as usize;

    let signature = data
        .read_slice_at(e_lfanew, 4)
        .ok_or(PeError::InvalidOffset { offset: e_lfanew })?;
    if signature != PE_SIGNATURE {
        return Err(PeError::InvalidPeSignature);
    }

    Ok(e_lfanew)
}

/// Parse the COFF header at `offset` (just past the PE signature).
pub fn parse_coff_header(data: &[u8], offset: usize) -> Result<CoffHeader> {
    if offset.checked_add(20).map_or(true, |end| end > data.len()) {
        return Err(PeError::TruncatedHeader {
            expected: offset + 20,
            actual: data.len(),
        });
    }

    Ok(CoffHeader {
        machine: data.read_u16_le_at(offset).unwrap(),
        number_of_sections: data.read_u16_le_at(offset + 2).unwrap(),
        time_date_stamp: data.read_u32_le_at(offset + 4).unwrap(),
        pointer_to_symbol_table: data.read_u32_le_at(offset + 8).unwrap(),
        number_of_symbols: data.read_u32_le_at(offset + 12).unwrap(),
        size_of_optional_header: data.read_u16_le_at(offset + 16).unwrap(),
        characteristics: data.read_u16_le_at(offset + 18).unwrap(),
    })
}

/// Parse the optional header at `offset`, normalizing the PE32 and PE32+
/// layouts (ImageBase is a u32 at +28 in PE32, a u64 at +24 in PE32+).
pub fn parse_optional_header(data: &[u8], offset: usize, size: u16) -> Result<OptionalHeader> {
    let size = size as usize;
    if size < 2 || offset.checked_add(size).map_or(true, |end| end > data.len()) {
        return Err(PeError::TruncatedHeader {
            expected: offset + size.max(2),
            actual: data.len(),
        });
    }

    let magic = data.read_u16_le_at(offset).unwrap();
    let class = PeClass::from_magic(magic)?;

    let (min_size, image_base, rva_count_offset) = match class {
        PeClass::Pe32 => (
            96,
            data.read_u32_le_at(offset + 28).map(|v| v as u64),
            offset + 92,
        ),
        PeClass::Pe32Plus => (112, data.read_u64_le_at(offset + 24), offset + 108),
    };

    if size < min_size {
        return Err(PeError::TruncatedHeader {
            expected: offset + min_size,
            actual: offset + size,
        });
    }

    Ok(OptionalHeader {
        class,
        image_base: image_base.unwrap(),
        number_of_rva_and_sizes: data.read_u32_le_at(rva_count_offset).unwrap(),
    })
}

/// Parse the data directory array that trails the optional header.
pub fn parse_data_directories(data: &[u8], offset: usize, count: u32) -> Vec<DataDirectory> {
    let count = count.min(16);
    let mut directories = Vec::with_capacity(16);

    for i in 0..count as usize {
        let dir_offset = offset + i * 8;
        let (Some(virtual_address), Some(size)) = (
            data.read_u32_le_at(dir_offset),
            data.read_u32_le_at(dir_offset + 4),
        ) else {
            break;
        };
        directories.push(DataDirectory {
            virtual_address,
            size,
        });
    }

    while directories.len() < 16 {
        directories.push(DataDirectory::default());
    }

    directories
}
