use std::fmt::Debug;

use phf::phf_map;

use crate::{
    config::arch_config::{
        ABI_REG_NAME, FP_REG_CNT, FP_REG_NAME, INT_REG_CNT, INT_REG_NAME, VEC_REG_CNT,
        VEC_REG_NAME, VLENB, Xlen,
    },
    isa::riscv::{csr_reg::CsrRegFile, error::HartError},
    utils::concat_le_bytes,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegFileKind {
    Int,
    Fp,
    Vec,
    Csr,
}

/// Architectural register handle: `(file, index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegId {
    pub file: RegFileKind,
    pub index: u16,
}

impl RegId {
    pub const fn int(index: u16) -> Self {
        Self {
            file: RegFileKind::Int,
            index,
        }
    }

    pub const fn fp(index: u16) -> Self {
        Self {
            file: RegFileKind::Fp,
            index,
        }
    }

    pub const fn vec(index: u16) -> Self {
        Self {
            file: RegFileKind::Vec,
            index,
        }
    }

    pub const fn csr(addr: u16) -> Self {
        Self {
            file: RegFileKind::Csr,
            index: addr,
        }
    }
}

static ABI_ALIASES: phf::Map<&'static str, u16> = phf_map! {
    "zero" => 0, "ra" => 1, "sp" => 2, "gp" => 3, "tp" => 4,
    "t0" => 5, "t1" => 6, "t2" => 7, "s0" => 8, "fp" => 8, "s1" => 9,
    "a0" => 10, "a1" => 11, "a2" => 12, "a3" => 13, "a4" => 14, "a5" => 15,
    "a6" => 16, "a7" => 17, "s2" => 18, "s3" => 19, "s4" => 20, "s5" => 21,
    "s6" => 22, "s7" => 23, "s8" => 24, "s9" => 25, "s10" => 26, "s11" => 27,
    "t3" => 28, "t4" => 29, "t5" => 30, "t6" => 31,
};

/// Resolve `x5`, `t0`, `f3`, `v8`, or a CSR name to a register handle.
pub fn find_register(name: &str, csrs: &CsrRegFile) -> Option<RegId> {
    if let Some(&index) = ABI_ALIASES.get(name) {
        return Some(RegId::int(index));
    }

    let indexed = |list: &[&str]| list.iter().position(|&n| n == name).map(|i| i as u16);
    if let Some(index) = indexed(&INT_REG_NAME) {
        return Some(RegId::int(index));
    }
    if let Some(index) = indexed(&FP_REG_NAME) {
        return Some(RegId::fp(index));
    }
    if let Some(index) = indexed(&VEC_REG_NAME) {
        return Some(RegId::vec(index));
    }

    csrs.find_by_name(name).map(RegId::csr)
}

fn check_index(file: RegFileKind, index: usize, count: usize) -> Result<usize, HartError> {
    if index < count {
        Ok(index)
    } else {
        Err(HartError::InvalidRegister {
            file,
            index: index as u16,
        })
    }
}

/// Integer register file. `x0` is hard-wired to zero; values are kept
/// narrowed to XLEN.
pub struct IntRegFile {
    data: [u64; INT_REG_CNT],
    xlen_mask: u64,
}

impl Debug for IntRegFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hex_width = if self.xlen_mask == u64::MAX { 16 } else { 8 };

        writeln!(f, "reg_file {{")?;
        for (i, val) in self.data.iter().enumerate() {
            if i % 4 == 0 {
                write!(f, "  ")?;
            }
            write!(
                f,
                "{:>5}: 0x{:0width$x}  ",
                ABI_REG_NAME[i],
                val,
                width = hex_width
            )?;
            if i % 4 == 3 {
                writeln!(f)?;
            }
        }
        write!(f, "}}")
    }
}

impl IntRegFile {
    pub fn new(xlen: Xlen) -> Self {
        Self {
            data: [0; INT_REG_CNT],
            xlen_mask: xlen.mask(),
        }
    }

    #[inline]
    pub fn read(&self, index: usize) -> Result<u64, HartError> {
        let index = check_index(RegFileKind::Int, index, INT_REG_CNT)?;
        Ok(self.data[index])
    }

    /// Writes to `x0` are dropped.
    #[inline]
    pub fn write(&mut self, index: usize, value: u64) -> Result<(), HartError> {
        let index = check_index(RegFileKind::Int, index, INT_REG_CNT)?;
        if index != 0 {
            self.data[index] = value & self.xlen_mask;
        }
        Ok(())
    }
}

/// Floating-point register file, 64-bit (FLEN of the D extension).
#[derive(Debug)]
pub struct FpRegFile {
    data: [u64; FP_REG_CNT],
}

impl FpRegFile {
    pub fn new() -> Self {
        Self {
            data: [0; FP_REG_CNT],
        }
    }

    pub fn read(&self, index: usize) -> Result<u64, HartError> {
        let index = check_index(RegFileKind::Fp, index, FP_REG_CNT)?;
        Ok(self.data[index])
    }

    pub fn write(&mut self, index: usize, value: u64) -> Result<(), HartError> {
        let index = check_index(RegFileKind::Fp, index, FP_REG_CNT)?;
        self.data[index] = value;
        Ok(())
    }
}

/// Vector register file, `VLEN` bits per register.
#[derive(Debug)]
pub struct VecRegFile {
    data: [[u8; VLENB]; VEC_REG_CNT],
}

impl VecRegFile {
    pub fn new() -> Self {
        Self {
            data: [[0; VLENB]; VEC_REG_CNT],
        }
    }

    pub fn bytes(&self, index: usize) -> Result<&[u8; VLENB], HartError> {
        let index = check_index(RegFileKind::Vec, index, VEC_REG_CNT)?;
        Ok(&self.data[index])
    }

    pub fn bytes_mut(&mut self, index: usize) -> Result<&mut [u8; VLENB], HartError> {
        let index = check_index(RegFileKind::Vec, index, VEC_REG_CNT)?;
        Ok(&mut self.data[index])
    }

    /// Read element `elem` of `width` bytes.
    pub fn read_elem(&self, index: usize, elem: usize, width: usize) -> Result<u64, HartError> {
        let reg = self.bytes(index)?;
        let start = elem * width;
        match reg.get(start..start + width) {
            Some(bytes) => Ok(concat_le_bytes(bytes)),
            None => Err(HartError::InvalidRegister {
                file: RegFileKind::Vec,
                index: index as u16,
            }),
        }
    }

    pub fn write_elem(
        &mut self,
        index: usize,
        elem: usize,
        width: usize,
        value: u64,
    ) -> Result<(), HartError> {
        let reg = self.bytes_mut(index)?;
        let start = elem * width;
        match reg.get_mut(start..start + width) {
            Some(bytes) => {
                bytes.copy_from_slice(&value.to_le_bytes()[..width]);
                Ok(())
            }
            None => Err(HartError::InvalidRegister {
                file: RegFileKind::Vec,
                index: index as u16,
            }),
        }
    }
}
