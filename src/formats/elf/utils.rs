//! Utility functions for ELF parsing

use crate::formats::elf::types::{ElfClass, ElfData, ElfError, Result};

/// Trait for reading values with endianness support
pub trait EndianRead {
    fn read_u16(&self, offset: usize, data: ElfData) -> Result<u16>;
    fn read_u32(&self, offset: usize, data: ElfData) -> Result<u32>;
    fn read_u64(&self, offset: usize, data: ElfData) -> Result<u64>;
}

impl EndianRead for [u8] {
    fn read_u16(&self, offset: usize, data: ElfData) -> Result<u16> {
        let bytes: [u8; 2] = self
            .get(offset..offset + 2)
            .and_then(|b| b.try_into().ok())
            .ok_or(ElfError::Truncated { offset, needed: 2 })?;
        Ok(match data {
            ElfData::Little => u16::from_le_bytes(bytes),
            ElfData::Big => u16::from_be_bytes(bytes),
        })
    }

    fn read_u32(&self, offset: usize, data: ElfData) -> Result<u32> {
        let bytes: [u8; 4] = self
            .get(offset..offset + 4)
            .and_then(|b| b.try_into().ok())
            .ok_or(ElfError::Truncated { offset, needed: 4 })?;
        Ok(match data {
            ElfData::Little => u32::from_le_bytes(bytes),
            ElfData::Big => u32::from_be_bytes(bytes),
        })
    }

    fn read_u64(&self, offset: usize, data: ElfData) -> Result<u64> {
        let bytes: [u8; 8] = self
            .get(offset..offset + 8)
            .and_then(|b| b.try_into().ok())
            .ok_or(ElfError::Truncated { offset, needed: 8 })?;
        Ok(match data {
            ElfData::Little => u64::from_le_bytes(bytes),
            ElfData::Big => u64::from_be_bytes(bytes),
        })
    }
}

/// Read an address-width value based on ELF class
pub fn read_addr(data: &[u8], offset: usize, class: ElfClass, endian: ElfData) -> Result<u64> {
    match class {
        ElfClass::Elf32 => data.read_u32(offset, endian).map(|v| v as u64),
        ElfClass::Elf64 => data.read_u64(offset, endian),
    }
}

/// Read a null-terminated string starting at `offset`
pub fn read_cstring(data: &[u8], offset: usize) -> Result<&str> {
    if offset >= data.len() {
        return Err(ElfError::InvalidOffset { offset });
    }

    let slice = &data[offset..];
    let end = slice.iter().position(|&b| b == 0).unwrap_or(slice.len());

    std::str::from_utf8(&slice[..end]).map_err(|_| ElfError::InvalidString)
}

/// Align a value up to the specified alignment
pub fn align_up(value: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        value
    } else {
        (value + alignment - 1) & !(alignment - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endian_read() {
        let data = vec![0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0];

        assert_eq!(data.read_u16(0, ElfData::Little).unwrap(), 0x3412);
        assert_eq!(data.read_u32(0, ElfData::Little).unwrap(), 0x78563412);
        assert_eq!(
            data.read_u64(0, ElfData::Little).unwrap(),
            0xf0debc9a78563412
        );

        assert_eq!(data.read_u16(0, ElfData::Big).unwrap(), 0x1234);
        assert_eq!(data.read_u32(0, ElfData::Big).unwrap(), 0x12345678);
        assert_eq!(data.read_u64(0, ElfData::Big).unwrap(), 0x123456789abcdef0);
    }

    #[test]
    fn test_endian_read_truncated() {
        let data = vec![0x12, 0x34];
        assert!(matches!(
            data.read_u32(0, ElfData::Little),
            Err(ElfError::Truncated { .. })
        ));
        assert!(matches!(
            data.read_u16(1, ElfData::Little),
            Err(ElfError::Truncated { .. })
        ));
    }

    #[test]
    fn test_read_addr() {
        let data = vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(
            read_addr(&data, 0, ElfClass::Elf32, ElfData::Little).unwrap(),
            0x04030201
        );
        assert_eq!(
            read_addr(&data, 0, ElfClass::Elf64, ElfData::Little).unwrap(),
            0x0807060504030201
        );
    }

    #[test]
    fn test_read_cstring() {
        let data = b"hello\0world\0";
        assert_eq!(read_cstring(data, 0).unwrap(), "hello");
        assert_eq!(read_cstring(data, 6).unwrap(), "world");

        let data = b"no_null_terminator";
        assert_eq!(read_cstring(data, 0).unwrap(), "no_null_terminator");
        assert!(read_cstring(data, 100).is_err());
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 4), 0);
        assert_eq!(align_up(1, 4), 4);
        assert_eq!(align_up(4, 4), 4);
        assert_eq!(align_up(5, 4), 8);
        assert_eq!(align_up(7, 0), 7);
    }
}
