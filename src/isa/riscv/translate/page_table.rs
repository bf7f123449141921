use bitflags::bitflags;

use crate::isa::riscv::translate::MmuMode;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PTEFlags: u8 {
        const V = 1 << 0; // valid
        const R = 1 << 1; // read
        const W = 1 << 2; // write
        const X = 1 << 3; // execute
        const U = 1 << 4; // U-Mode
        const G = 1 << 5; // global mapping
        const A = 1 << 6; // accessed
        const D = 1 << 7; // dirty
    }
}

pub const PAGE_OFFSET_BITS: u32 = 12;
pub const PAGE_SIZE: u64 = 1 << PAGE_OFFSET_BITS;

/// Page table entry of the given mode. Sv32 entries are 4 bytes with a 22-bit
/// PPN, Sv39/48/57 entries are 8 bytes with a 44-bit PPN.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PageTableEntry {
    pub bits: u64,
    mode: MmuMode,
}

impl PageTableEntry {
    pub fn new(bits: u64, mode: MmuMode) -> Self {
        PageTableEntry { bits, mode }
    }

    fn ppn_bits(&self) -> u32 {
        match self.mode {
            MmuMode::Sv32 => 22,
            _ => 44,
        }
    }

    pub fn ppn(&self) -> u64 {
        (self.bits >> 10) & ((1u64 << self.ppn_bits()) - 1)
    }

    pub fn flags(&self) -> PTEFlags {
        PTEFlags::from_bits_truncate(self.bits as u8)
    }

    pub fn rsw(&self) -> u8 {
        ((self.bits >> 8) & 0x3) as u8
    }

    fn check_flag(&self, flag: PTEFlags) -> bool {
        self.flags().contains(flag)
    }

    /// `V` set and not the reserved `W && !R` encoding.
    pub fn is_valid(&self) -> bool {
        self.check_flag(PTEFlags::V) && !(self.is_writable() && !self.is_readable())
    }

    pub fn is_leaf(&self) -> bool {
        self.is_readable() || self.is_executable()
    }

    pub fn is_readable(&self) -> bool {
        self.check_flag(PTEFlags::R)
    }
    pub fn is_writable(&self) -> bool {
        self.check_flag(PTEFlags::W)
    }
    pub fn is_executable(&self) -> bool {
        self.check_flag(PTEFlags::X)
    }
    pub fn is_user(&self) -> bool {
        self.check_flag(PTEFlags::U)
    }
    pub fn is_global(&self) -> bool {
        self.check_flag(PTEFlags::G)
    }
    pub fn is_accessed(&self) -> bool {
        self.check_flag(PTEFlags::A)
    }
    pub fn is_dirty(&self) -> bool {
        self.check_flag(PTEFlags::D)
    }

    pub fn set_flag(&mut self, flag: PTEFlags) {
        self.bits |= flag.bits() as u64;
    }

    /// Build an entry pointing at `ppn`.
    pub fn from_ppn(ppn: u64, flags: PTEFlags, mode: MmuMode) -> Self {
        PageTableEntry {
            bits: (ppn << 10) | flags.bits() as u64,
            mode,
        }
    }
}
