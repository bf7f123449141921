use std::fmt::Debug;

use crate::{
    config::ram_config,
    mem::{MemError, PhysicalMemory},
    utils::concat_le_bytes,
};

/// Flat little-endian RAM mapped at `[base, base + size)`.
pub struct Ram {
    base: u64,
    data: Vec<u8>,
}

impl Debug for Ram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ram")
            .field("base", &format_args!("{:#x}", self.base))
            .field("size", &format_args!("{:#x}", self.data.len()))
            .finish()
    }
}

impl Default for Ram {
    fn default() -> Self {
        Self::new(ram_config::BASE_ADDR, ram_config::SIZE)
    }
}

impl Ram {
    pub fn new(base: u64, size: usize) -> Self {
        Self {
            base,
            data: vec![0; size],
        }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    fn offset(&self, addr: u64, size: usize) -> Result<usize, MemError> {
        let err = MemError::OutOfRange { addr, size };
        let offset = addr.checked_sub(self.base).ok_or(err)?;
        let end = offset.checked_add(size as u64).ok_or(err)?;
        if end > self.data.len() as u64 {
            return Err(err);
        }
        Ok(offset as usize)
    }

    pub fn insert_section(&mut self, section: &[u8], addr: u64) -> Result<(), MemError> {
        let offset = self.offset(addr, section.len())?;
        self.data[offset..offset + section.len()]
            .copy_from_slice(section);
        Ok(())
    }

    /// Read `size` bytes (at most 8) as a little-endian integer.
    pub fn read_uint(&self, addr: u64, size: usize) -> Result<u64, MemError> {
        let offset = self.offset(addr, size)?;
        Ok(concat_le_bytes(&self.data[offset..offset + size]))
    }

    /// Write the low `size` bytes of `value` little-endian.
    pub fn write_uint(&mut self, addr: u64, size: usize, value: u64) -> Result<(), MemError> {
        let offset = self.offset(addr, size)?;
        self.data[offset..offset + size]
            .copy_from_slice(&value.to_le_bytes()[..size]);
        Ok(())
    }

    /// Store a sequence of 32-bit instruction words starting at `addr`.
    pub fn write_program(&mut self, addr: u64, words: &[u32]) -> Result<(), MemError> {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        self.insert_section(&bytes, addr)
    }
}

impl PhysicalMemory for Ram {
    fn try_read(&mut self, paddr: u64, buf: &mut [u8]) -> Result<(), MemError> {
        let offset = self.offset(paddr, buf.len())?;
        buf.copy_from_slice(&self.data[offset..offset + buf.len()]);
        Ok(())
    }

    fn try_write(&mut self, paddr: u64, data: &[u8]) -> Result<(), MemError> {
        self.insert_section(data, paddr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ram_new() {
        let r = Ram::new(0, 0x100);
        assert!(r.data.iter().all(|&b| b == 0));
        assert_eq!(r.size(), 0x100);
    }

    #[test]
    fn test_insert_section_and_read() {
        let mut r = Ram::new(0x1000, 0x100);
        let section = [0x12u8, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0];
        r.insert_section(&section, 0x1000).unwrap();

        assert_eq!(r.read_uint(0x1000, 1).unwrap(), 0x12);
        assert_eq!(r.read_uint(0x1000, 2).unwrap(), 0x3412);
        assert_eq!(r.read_uint(0x1000, 4).unwrap(), 0x78563412);
        assert_eq!(r.read_uint(0x1000, 8).unwrap(), 0xF0DEBC9A78563412);
    }

    #[test]
    fn test_write_little_endian() {
        let mut ram = Ram::new(0, 0x10);
        ram.write_uint(0, 8, 0x1122334455667788).unwrap();
        assert_eq!(
            &ram.data[..8],
            &[0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]
        );

        ram.write_uint(0, 2, 0xabcd).unwrap();
        assert_eq!(&ram.data[..3], &[0xcd, 0xab, 0x66]);
    }

    #[test]
    fn test_out_of_range() {
        let mut ram = Ram::new(0x8000_0000, 0x10);
        let mut buf = [0u8; 4];
        assert_eq!(
            ram.try_read(0x7fff_fffe, &mut buf),
            Err(MemError::OutOfRange {
                addr: 0x7fff_fffe,
                size: 4
            })
        );
        assert!(ram.try_read(0x8000_000e, &mut buf).is_err());
        assert!(ram.try_write(0x8000_000c, &[1, 2, 3, 4]).is_ok());
        assert!(ram.try_write(u64::MAX, &[1]).is_err());
    }
}
