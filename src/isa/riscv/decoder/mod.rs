//! Instruction decoding.
//!
//! The hart only depends on the [`Decoder`] trait. [`MaskDecoder`] is the
//! reference implementation: a key/mask table per extension, filtered down to
//! the currently enabled extension set.

mod compressed;
mod mask_decoder;
mod table;

use std::fmt::Display;

pub use mask_decoder::MaskDecoder;

use crate::{isa::riscv::extension::Extensions, utils::sign_extend};

/// Turns raw instruction bits into a [`DecodedInst`] under the current
/// extension context.
pub trait Decoder {
    /// Invalidate everything derived from the previous extension set.
    fn change_context(&mut self, extensions: Extensions);

    /// `opcode` holds 16 significant bits for compressed encodings.
    fn decode(&mut self, opcode: u32) -> Option<DecodedInst>;
}

/// A decoded instruction: mnemonic plus extracted operands.
///
/// Immediates are sign extended and already scaled (`B`/`J` offsets in bytes,
/// `U` immediates shifted into place).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedInst {
    pub mnemonic: &'static str,
    pub opcode: u32,
    /// Encoded length in bytes, 2 or 4.
    pub len: u8,
    pub rd: Option<u8>,
    pub rs1: Option<u8>,
    pub rs2: Option<u8>,
    pub imm: Option<i64>,
    pub csr: Option<u16>,
}

impl DecodedInst {
    pub(crate) fn new(mnemonic: &'static str, opcode: u32, len: u8) -> Self {
        Self {
            mnemonic,
            opcode,
            len,
            rd: None,
            rs1: None,
            rs2: None,
            imm: None,
            csr: None,
        }
    }

    pub(crate) fn rd(mut self, rd: u32) -> Self {
        self.rd = Some(rd as u8);
        self
    }

    pub(crate) fn rs1(mut self, rs1: u32) -> Self {
        self.rs1 = Some(rs1 as u8);
        self
    }

    pub(crate) fn rs2(mut self, rs2: u32) -> Self {
        self.rs2 = Some(rs2 as u8);
        self
    }

    pub(crate) fn imm(mut self, imm: i64) -> Self {
        self.imm = Some(imm);
        self
    }

    pub(crate) fn csr(mut self, csr: u32) -> Self {
        self.csr = Some(csr as u16);
        self
    }
}

impl Display for DecodedInst {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic)?;
        let regs = [("rd", self.rd), ("rs1", self.rs1), ("rs2", self.rs2)];
        for (name, reg) in regs {
            if let Some(reg) = reg {
                write!(f, " {name}=x{reg}")?;
            }
        }
        if let Some(csr) = self.csr {
            write!(f, " csr={csr:#x}")?;
        }
        if let Some(imm) = self.imm {
            write!(f, " imm={imm}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeMask {
    pub key: u32,
    pub mask: u32,
}

impl DecodeMask {
    #[inline]
    pub fn matches(&self, instr: u32) -> bool {
        (instr & self.mask) == self.key
    }
}

/// Build a mask from a pattern such as `"0000000_?????_?????_000_?????_0110011"`.
/// `0`/`1` are fixed bits, `?` is don't-care, anything else is ignored.
pub const fn create_decode_mask(pattern: &str) -> DecodeMask {
    let bytes = pattern.as_bytes();
    let mut i = 0;
    let mut len = 0;
    let mut key = 0u32;
    let mut mask = 0u32;

    while i < bytes.len() {
        let ch = bytes[i];
        if ch == b'0' || ch == b'1' || ch == b'?' {
            len += 1;
            key = (key << 1) | (ch == b'1') as u32;
            mask = (mask << 1) | (ch != b'?') as u32;
        }
        i += 1;
    }

    assert!(len == 32, "pattern must describe 32 bits");
    DecodeMask { key, mask }
}

/// Operand layout of a 32-bit encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InstFormat {
    None,
    R,
    /// `rd`, `rs1` only (`fclass`).
    Unary,
    I,
    /// Shift immediates; the pattern fixes the legal shamt width.
    Shamt,
    S,
    B,
    U,
    J,
    Csr,
    CsrImm,
}

#[inline]
fn field(raw: u32, lsb: u32, width: u32) -> u32 {
    (raw >> lsb) & ((1 << width) - 1)
}

pub(crate) fn extract_operands(
    mnemonic: &'static str,
    raw: u32,
    format: InstFormat,
) -> DecodedInst {
    let rd = field(raw, 7, 5);
    let rs1 = field(raw, 15, 5);
    let rs2 = field(raw, 20, 5);
    let inst = DecodedInst::new(mnemonic, raw, 4);

    match format {
        InstFormat::None => inst,
        InstFormat::R => inst.rd(rd).rs1(rs1).rs2(rs2),
        InstFormat::Unary => inst.rd(rd).rs1(rs1),
        InstFormat::I => inst
            .rd(rd)
            .rs1(rs1)
            .imm(sign_extend(field(raw, 20, 12) as u64, 12) as i64),
        InstFormat::Shamt => inst.rd(rd).rs1(rs1).imm(field(raw, 20, 6) as i64),
        InstFormat::S => {
            let imm = (field(raw, 25, 7) << 5) | field(raw, 7, 5);
            inst.rs1(rs1)
                .rs2(rs2)
                .imm(sign_extend(imm as u64, 12) as i64)
        }
        InstFormat::B => {
            let imm = (field(raw, 31, 1) << 12)
                | (field(raw, 7, 1) << 11)
                | (field(raw, 25, 6) << 5)
                | (field(raw, 8, 4) << 1);
            inst.rs1(rs1)
                .rs2(rs2)
                .imm(sign_extend(imm as u64, 13) as i64)
        }
        InstFormat::U => inst
            .rd(rd)
            .imm(sign_extend((raw & 0xffff_f000) as u64, 32) as i64),
        InstFormat::J => {
            let imm = (field(raw, 31, 1) << 20)
                | (field(raw, 12, 8) << 12)
                | (field(raw, 20, 1) << 11)
                | (field(raw, 21, 10) << 1);
            inst.rd(rd).imm(sign_extend(imm as u64, 21) as i64)
        }
        InstFormat::Csr => inst.rd(rd).rs1(rs1).csr(field(raw, 20, 12)),
        InstFormat::CsrImm => inst.rd(rd).imm(rs1 as i64).csr(field(raw, 20, 12)),
    }
}
