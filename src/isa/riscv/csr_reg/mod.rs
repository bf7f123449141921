pub mod csr_table;

use std::collections::HashMap;

use lazy_static::lazy_static;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{
    config::arch_config::Xlen,
    isa::riscv::{
        csr_reg::csr_table::{CsrAlias, CsrDesc, Field, FieldDesc},
        error::HartError,
    },
};

#[rustfmt::skip]
#[allow(non_upper_case_globals)]
pub mod csr_index {
    pub const fflags    : u16 = 0x001;
    pub const frm       : u16 = 0x002;
    pub const fcsr      : u16 = 0x003;
    pub const cycle     : u16 = 0xc00;
    pub const instret   : u16 = 0xc02;
    pub const sstatus   : u16 = 0x100;
    pub const sie       : u16 = 0x104;
    pub const stvec     : u16 = 0x105;
    pub const sepc      : u16 = 0x141;
    pub const scause    : u16 = 0x142;
    pub const stval     : u16 = 0x143;
    pub const sip       : u16 = 0x144;
    pub const satp      : u16 = 0x180;
    pub const mstatus   : u16 = 0x300;    // status, interrupt enables, privilege stack
    pub const misa      : u16 = 0x301;    // XLEN and enabled extensions
    pub const medeleg   : u16 = 0x302;
    pub const mideleg   : u16 = 0x303;
    pub const mie       : u16 = 0x304;
    pub const mtvec     : u16 = 0x305;
    pub const mstatush  : u16 = 0x310;    // RV32 only
    pub const mscratch  : u16 = 0x340;
    pub const mepc      : u16 = 0x341;
    pub const mcause    : u16 = 0x342;
    pub const mtval     : u16 = 0x343;
    pub const mip       : u16 = 0x344;
    pub const mcycle    : u16 = 0xb00;
    pub const minstret  : u16 = 0xb02;
    pub const mhartid   : u16 = 0xf14;
}

#[repr(u8)]
#[derive(Debug, PartialEq, PartialOrd, Ord, Eq, Clone, Copy, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum PrivMode {
    User = 0,
    Supervisor = 1,
    Machine = 3,
}

impl PrivMode {
    /// Decode an `xPP` field; the reserved encoding 2 falls back to User.
    pub fn from_field(value: u64) -> PrivMode {
        PrivMode::try_from(value as u8).unwrap_or_else(|_| {
            log::warn!("reserved privilege encoding {value}, using U-mode");
            PrivMode::User
        })
    }
}

/// CSRs in `0xc00..=0xfff` are read-only.
#[inline]
pub fn is_csr_writable(csr: u16) -> bool {
    (csr & 0xc00) != 0xc00
}

/// Lowest privilege allowed to access `csr`.
#[inline]
pub fn csr_min_privilege(csr: u16) -> u8 {
    ((csr & 0x300) >> 8) as u8
}

lazy_static! {
    static ref CSR_BY_NAME: HashMap<&'static str, u16> = csr_table::rv32::CSRS
        .iter()
        .chain(csr_table::rv64::CSRS.iter())
        .map(|desc| (desc.name, desc.addr))
        .collect();
}

/// Write `value` to the bits specified by `mask`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CsrWriteOp {
    mask: u64,
}

impl CsrWriteOp {
    #[inline]
    fn new(mask: u64) -> CsrWriteOp {
        CsrWriteOp { mask }
    }

    #[inline]
    fn get_new_value(&self, old_value: u64, value: u64) -> u64 {
        (old_value & !self.mask) | (value & self.mask)
    }
}

#[derive(Debug)]
struct CsrReg {
    desc: &'static CsrDesc,
    value: u64,
    /// Bits of the writable fields.
    write_op: CsrWriteOp,
    /// Bits of every declared field; the rest is reserved-zero.
    defined: u64,
    /// Whether `write_op` covers the full register.
    write_all: bool,
}

impl CsrReg {
    fn new(desc: &'static CsrDesc, xlen: Xlen) -> Self {
        let (mut writable, mut defined) = (0u64, 0u64);
        for field in desc.fields {
            defined |= field.mask();
            if field.is_writable() {
                writable |= field.mask();
            }
        }
        Self {
            desc,
            value: 0,
            write_op: CsrWriteOp::new(writable),
            defined,
            write_all: writable == xlen.mask(),
        }
    }
}

/// The CSR file of one hart.
///
/// `write` honours the per-field access rules, `poke` only strips reserved bits.
/// Aliased CSRs (`sstatus`, `sie`, `sip`, `fflags`, `frm`, `vxsat`, `vxrm`) are views
/// into their target register.
#[derive(Debug)]
pub struct CsrRegFile {
    xlen: Xlen,
    table: HashMap<u16, CsrReg>,
}

impl CsrRegFile {
    pub fn new(xlen: Xlen) -> Self {
        let descs = match xlen {
            Xlen::Rv32 => csr_table::rv32::CSRS,
            Xlen::Rv64 => csr_table::rv64::CSRS,
        };
        let table = descs
            .iter()
            .map(|desc| (desc.addr, CsrReg::new(desc, xlen)))
            .collect();
        Self { xlen, table }
    }

    pub fn xlen(&self) -> Xlen {
        self.xlen
    }

    pub fn contains(&self, addr: u16) -> bool {
        self.table.contains_key(&addr)
    }

    pub fn find_by_name(&self, name: &str) -> Option<u16> {
        CSR_BY_NAME
            .get(name)
            .copied()
            .filter(|addr| self.contains(*addr))
    }

    pub fn name(&self, addr: u16) -> Option<&'static str> {
        self.table.get(&addr).map(|reg| reg.desc.name)
    }

    /// All implemented CSR addresses, sorted.
    pub fn addresses(&self) -> Vec<u16> {
        let mut addrs: Vec<u16> = self.table.keys().copied().collect();
        addrs.sort_unstable();
        addrs
    }

    fn reg(&self, addr: u16) -> Result<&CsrReg, HartError> {
        self.table.get(&addr).ok_or(HartError::UnknownCsr(addr))
    }

    fn alias(&self, addr: u16) -> Result<Option<CsrAlias>, HartError> {
        Ok(self.reg(addr)?.desc.alias)
    }

    pub fn read(&self, addr: u16) -> Result<u64, HartError> {
        let reg = self.reg(addr)?;
        match reg.desc.alias {
            Some(CsrAlias { target, shift }) => {
                Ok((self.reg(target)?.value >> shift) & reg.defined)
            }
            None => Ok(reg.value),
        }
    }

    /// Reads have no side effects at this layer.
    #[inline]
    pub fn peek(&self, addr: u16) -> Result<u64, HartError> {
        self.read(addr)
    }

    /// `new = (old & !mask) | (value & mask)` over the writable fields.
    pub fn write(&mut self, addr: u16, value: u64) -> Result<(), HartError> {
        let reg = self.reg(addr)?;
        let (op, write_all) = (reg.write_op, reg.write_all);
        self.store(addr, value, op, write_all)
    }

    /// Store `value` ignoring read-only protection. Reserved bits still read zero.
    pub fn poke(&mut self, addr: u16, value: u64) -> Result<(), HartError> {
        let reg = self.reg(addr)?;
        let op = CsrWriteOp::new(reg.defined);
        let write_all = reg.defined == self.xlen.mask();
        self.store(addr, value, op, write_all)
    }

    fn store(
        &mut self,
        addr: u16,
        value: u64,
        op: CsrWriteOp,
        write_all: bool,
    ) -> Result<(), HartError> {
        let (addr, op, value) = match self.alias(addr)? {
            Some(CsrAlias { target, shift }) => (
                target,
                CsrWriteOp::new(op.mask << shift),
                value << shift,
            ),
            None if write_all => {
                if let Some(reg) = self.table.get_mut(&addr) {
                    reg.value = value & self.xlen.mask();
                }
                return Ok(());
            }
            None => (addr, op, value),
        };

        let reg = self
            .table
            .get_mut(&addr)
            .ok_or(HartError::UnknownCsr(addr))?;
        reg.value = op.get_new_value(reg.value, value);
        Ok(())
    }

    pub fn field(&self, addr: u16, field: Field) -> Result<FieldDesc, HartError> {
        self.reg(addr)?
            .desc
            .fields
            .iter()
            .find(|f| f.field == field)
            .copied()
            .ok_or(HartError::UnknownCsrField {
                csr: addr,
                field: field.name(),
            })
    }

    pub fn read_field(&self, addr: u16, field: Field) -> Result<u64, HartError> {
        let desc = self.field(addr, field)?;
        let value = self.read(addr)?;
        if desc.lsb == 0 && desc.msb as u32 == self.xlen.bits() - 1 {
            return Ok(value);
        }
        Ok((value & desc.mask()) >> desc.lsb)
    }

    /// Write one field through the access rules: read-only fields stay untouched.
    pub fn write_field(&mut self, addr: u16, field: Field, value: u64) -> Result<(), HartError> {
        let desc = self.field(addr, field)?;
        if !desc.is_writable() {
            return Ok(());
        }
        self.modify_field(addr, desc, value)
    }

    pub fn poke_field(&mut self, addr: u16, field: Field, value: u64) -> Result<(), HartError> {
        let desc = self.field(addr, field)?;
        self.modify_field(addr, desc, value)
    }

    fn modify_field(&mut self, addr: u16, desc: FieldDesc, value: u64) -> Result<(), HartError> {
        let old = self.read(addr)?;
        let new = (old & !desc.mask()) | ((value << desc.lsb) & desc.mask());
        self.poke(addr, new)
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::isa::riscv::csr_reg::csr_table::FieldAccess;

    #[test]
    fn test_csr_legality_helpers() {
        assert!(is_csr_writable(csr_index::mstatus));
        assert!(!is_csr_writable(csr_index::mhartid));
        assert!(!is_csr_writable(csr_index::cycle));
        assert_eq!(csr_min_privilege(csr_index::fcsr), 0);
        assert_eq!(csr_min_privilege(csr_index::sstatus), 1);
        assert_eq!(csr_min_privilege(csr_index::mepc), 3);
    }

    #[test]
    fn test_priv_mode_from_field() {
        assert_eq!(PrivMode::from_field(3), PrivMode::Machine);
        assert_eq!(PrivMode::from_field(1), PrivMode::Supervisor);
        assert_eq!(PrivMode::from_field(2), PrivMode::User);
        assert_eq!(u8::from(PrivMode::Machine), 3);
    }

    #[test]
    fn test_read_only_fields_are_preserved() {
        for xlen in [Xlen::Rv32, Xlen::Rv64] {
            let mut rng = ChaCha8Rng::seed_from_u64(0xc5a);
            let mut csrs = CsrRegFile::new(xlen);
            for addr in csrs.addresses() {
                let fields = csrs.reg(addr).unwrap().desc.fields;
                if !fields.iter().any(|f| f.access == FieldAccess::ReadOnly) {
                    continue;
                }
                csrs.poke(addr, rng.random()).unwrap();

                for _ in 0..64 {
                    let before: Vec<u64> = fields
                        .iter()
                        .map(|f| csrs.read_field(addr, f.field).unwrap())
                        .collect();
                    let value: u64 = rng.random();
                    csrs.write(addr, value).unwrap();

                    for (f, old) in fields.iter().zip(before) {
                        let now = csrs.read_field(addr, f.field).unwrap();
                        match f.access {
                            FieldAccess::ReadOnly => assert_eq!(now, old),
                            FieldAccess::ReadWrite => {
                                assert_eq!(now, (value & f.mask()) >> f.lsb)
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_reserved_bits_read_zero() {
        let mut csrs = CsrRegFile::new(Xlen::Rv64);
        csrs.poke(csr_index::medeleg, u64::MAX).unwrap();
        assert_eq!(csrs.read(csr_index::medeleg).unwrap(), 0xf7ff);

        csrs.write(csr_index::mie, u64::MAX).unwrap();
        assert_eq!(csrs.read(csr_index::mie).unwrap(), 0xaaa);
    }

    #[test]
    fn test_full_width_register() {
        let mut csrs = CsrRegFile::new(Xlen::Rv32);
        csrs.write(csr_index::mscratch, 0x1_dead_beef).unwrap();
        assert_eq!(csrs.read(csr_index::mscratch).unwrap(), 0xdead_beef);
        assert_eq!(
            csrs.read_field(csr_index::mscratch, Field::Value).unwrap(),
            0xdead_beef
        );
    }

    #[test]
    fn test_field_access() {
        let mut csrs = CsrRegFile::new(Xlen::Rv64);
        csrs.write_field(csr_index::mstatus, Field::Mpp, 1).unwrap();
        assert_eq!(csrs.read_field(csr_index::mstatus, Field::Mpp).unwrap(), 1);
        assert_eq!(csrs.read(csr_index::mstatus).unwrap(), 1 << 11);

        // read-only through write, writable through poke
        csrs.write_field(csr_index::misa, Field::Mxl, 2).unwrap();
        assert_eq!(csrs.read_field(csr_index::misa, Field::Mxl).unwrap(), 0);
        csrs.poke_field(csr_index::misa, Field::Mxl, 2).unwrap();
        assert_eq!(csrs.read_field(csr_index::misa, Field::Mxl).unwrap(), 2);

        assert!(matches!(
            csrs.read_field(csr_index::mepc, Field::Mpp),
            Err(HartError::UnknownCsrField { csr: 0x341, .. })
        ));
        assert!(matches!(csrs.read(0x7c0), Err(HartError::UnknownCsr(0x7c0))));
    }

    #[test]
    fn test_sstatus_is_view_of_mstatus() {
        let mut csrs = CsrRegFile::new(Xlen::Rv64);
        csrs.write(csr_index::mstatus, (1 << 3) | (1 << 1) | (3 << 11))
            .unwrap();
        // MIE and MPP are not visible through sstatus
        assert_eq!(csrs.read(csr_index::sstatus).unwrap(), 1 << 1);

        csrs.write_field(csr_index::sstatus, Field::Spp, 1).unwrap();
        assert_eq!(csrs.read_field(csr_index::mstatus, Field::Spp).unwrap(), 1);
        assert_eq!(csrs.read_field(csr_index::mstatus, Field::Mpp).unwrap(), 3);

        csrs.write(csr_index::sstatus, 0).unwrap();
        assert_eq!(csrs.read(csr_index::mstatus).unwrap(), (1 << 3) | (3 << 11));
    }

    #[test]
    fn test_fcsr_views() {
        let mut csrs = CsrRegFile::new(Xlen::Rv64);
        csrs.write(csr_index::fcsr, 0xff).unwrap();
        assert_eq!(csrs.read(csr_index::fflags).unwrap(), 0x1f);
        assert_eq!(csrs.read(csr_index::frm).unwrap(), 0x7);

        csrs.write(csr_index::frm, 0x2).unwrap();
        assert_eq!(csrs.read(csr_index::fcsr).unwrap(), 0x5f);
        csrs.write(csr_index::fflags, 0).unwrap();
        assert_eq!(csrs.read(csr_index::fcsr).unwrap(), 0x40);
    }

    #[test]
    fn test_find_by_name_respects_xlen() {
        let rv32 = CsrRegFile::new(Xlen::Rv32);
        let rv64 = CsrRegFile::new(Xlen::Rv64);
        assert_eq!(rv32.find_by_name("mstatush"), Some(csr_index::mstatush));
        assert_eq!(rv64.find_by_name("mstatush"), None);
        assert_eq!(rv64.find_by_name("satp"), Some(csr_index::satp));
        assert_eq!(rv64.name(csr_index::mtvec), Some("mtvec"));
    }
}
