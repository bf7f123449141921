//! RVC expansion: each compressed encoding is decoded as the base instruction
//! it stands for, with `len == 2`.

use crate::{config::arch_config::Xlen, isa::riscv::decoder::DecodedInst, utils::sign_extend};

#[inline]
fn bits(raw: u32, hi: u32, lo: u32) -> u32 {
    (raw >> lo) & ((1 << (hi - lo + 1)) - 1)
}

/// `rd'`/`rs1'`/`rs2'` name x8..x15.
#[inline]
fn creg(raw: u32, lo: u32) -> u32 {
    8 + bits(raw, lo + 2, lo)
}

fn simm(value: u32, width: u32) -> i64 {
    sign_extend(value as u64, width) as i64
}

/// Immediate of `c.addi`/`c.li`/`c.andi`/`c.addiw`.
fn ci_imm(raw: u32) -> i64 {
    simm((bits(raw, 12, 12) << 5) | bits(raw, 6, 2), 6)
}

fn shamt(raw: u32) -> i64 {
    ((bits(raw, 12, 12) << 5) | bits(raw, 6, 2)) as i64
}

fn cj_offset(raw: u32) -> i64 {
    let offset = (bits(raw, 12, 12) << 11)
        | (bits(raw, 11, 11) << 4)
        | (bits(raw, 10, 9) << 8)
        | (bits(raw, 8, 8) << 10)
        | (bits(raw, 7, 7) << 6)
        | (bits(raw, 6, 6) << 7)
        | (bits(raw, 5, 3) << 1)
        | (bits(raw, 2, 2) << 5);
    simm(offset, 12)
}

fn cb_offset(raw: u32) -> i64 {
    let offset = (bits(raw, 12, 12) << 8)
        | (bits(raw, 11, 10) << 3)
        | (bits(raw, 6, 5) << 6)
        | (bits(raw, 4, 3) << 1)
        | (bits(raw, 2, 2) << 5);
    simm(offset, 9)
}

/// Expand a 16-bit encoding. Reserved and unsupported (floating-point) forms
/// yield `None`.
pub(super) fn expand(raw: u32, xlen: Xlen) -> Option<DecodedInst> {
    let raw = raw & 0xffff;
    let inst = |mnemonic: &'static str| DecodedInst::new(mnemonic, raw, 2);
    let rv64 = xlen == Xlen::Rv64;
    let rd = bits(raw, 11, 7);
    let rs2 = bits(raw, 6, 2);

    let decoded = match (bits(raw, 1, 0), bits(raw, 15, 13)) {
        // c.addi4spn
        (0b00, 0b000) => {
            let imm = (bits(raw, 12, 11) << 4)
                | (bits(raw, 10, 7) << 6)
                | (bits(raw, 6, 6) << 2)
                | (bits(raw, 5, 5) << 3);
            if imm == 0 {
                return None;
            }
            inst("addi").rd(creg(raw, 2)).rs1(2).imm(imm as i64)
        }
        // c.lw
        (0b00, 0b010) => {
            let imm = (bits(raw, 12, 10) << 3) | (bits(raw, 6, 6) << 2) | (bits(raw, 5, 5) << 6);
            inst("lw").rd(creg(raw, 2)).rs1(creg(raw, 7)).imm(imm as i64)
        }
        // c.ld
        (0b00, 0b011) if rv64 => {
            let imm = (bits(raw, 12, 10) << 3) | (bits(raw, 6, 5) << 6);
            inst("ld").rd(creg(raw, 2)).rs1(creg(raw, 7)).imm(imm as i64)
        }
        // c.sw
        (0b00, 0b110) => {
            let imm = (bits(raw, 12, 10) << 3) | (bits(raw, 6, 6) << 2) | (bits(raw, 5, 5) << 6);
            inst("sw").rs1(creg(raw, 7)).rs2(creg(raw, 2)).imm(imm as i64)
        }
        // c.sd
        (0b00, 0b111) if rv64 => {
            let imm = (bits(raw, 12, 10) << 3) | (bits(raw, 6, 5) << 6);
            inst("sd").rs1(creg(raw, 7)).rs2(creg(raw, 2)).imm(imm as i64)
        }

        // c.addi, c.nop
        (0b01, 0b000) => inst("addi").rd(rd).rs1(rd).imm(ci_imm(raw)),
        // c.jal
        (0b01, 0b001) if !rv64 => inst("jal").rd(1).imm(cj_offset(raw)),
        // c.addiw
        (0b01, 0b001) if rd != 0 => inst("addiw").rd(rd).rs1(rd).imm(ci_imm(raw)),
        // c.li
        (0b01, 0b010) => inst("addi").rd(rd).rs1(0).imm(ci_imm(raw)),
        // c.addi16sp
        (0b01, 0b011) if rd == 2 => {
            let imm = (bits(raw, 12, 12) << 9)
                | (bits(raw, 6, 6) << 4)
                | (bits(raw, 5, 5) << 6)
                | (bits(raw, 4, 3) << 7)
                | (bits(raw, 2, 2) << 5);
            if imm == 0 {
                return None;
            }
            inst("addi").rd(2).rs1(2).imm(simm(imm, 10))
        }
        // c.lui
        (0b01, 0b011) => {
            let imm = (bits(raw, 12, 12) << 17) | (bits(raw, 6, 2) << 12);
            if imm == 0 {
                return None;
            }
            inst("lui").rd(rd).imm(simm(imm, 18))
        }
        (0b01, 0b100) => {
            let rd = creg(raw, 7);
            let rs2 = creg(raw, 2);
            match (bits(raw, 11, 10), bits(raw, 12, 12), bits(raw, 6, 5)) {
                (0b00, _, _) => inst("srli").rd(rd).rs1(rd).imm(shamt(raw)),
                (0b01, _, _) => inst("srai").rd(rd).rs1(rd).imm(shamt(raw)),
                (0b10, _, _) => inst("andi").rd(rd).rs1(rd).imm(ci_imm(raw)),
                (0b11, 0, op) => {
                    let mnemonic = ["sub", "xor", "or", "and"][op as usize];
                    inst(mnemonic).rd(rd).rs1(rd).rs2(rs2)
                }
                (0b11, 1, 0b00) if rv64 => inst("subw").rd(rd).rs1(rd).rs2(rs2),
                (0b11, 1, 0b01) if rv64 => inst("addw").rd(rd).rs1(rd).rs2(rs2),
                _ => return None,
            }
        }
        // c.j
        (0b01, 0b101) => inst("jal").rd(0).imm(cj_offset(raw)),
        // c.beqz, c.bnez
        (0b01, 0b110) => inst("beq").rs1(creg(raw, 7)).rs2(0).imm(cb_offset(raw)),
        (0b01, 0b111) => inst("bne").rs1(creg(raw, 7)).rs2(0).imm(cb_offset(raw)),

        // c.slli
        (0b10, 0b000) => inst("slli").rd(rd).rs1(rd).imm(shamt(raw)),
        // c.lwsp
        (0b10, 0b010) if rd != 0 => {
            let imm = (bits(raw, 12, 12) << 5) | (bits(raw, 6, 4) << 2) | (bits(raw, 3, 2) << 6);
            inst("lw").rd(rd).rs1(2).imm(imm as i64)
        }
        // c.ldsp
        (0b10, 0b011) if rv64 && rd != 0 => {
            let imm = (bits(raw, 12, 12) << 5) | (bits(raw, 6, 5) << 3) | (bits(raw, 4, 2) << 6);
            inst("ld").rd(rd).rs1(2).imm(imm as i64)
        }
        (0b10, 0b100) => match (bits(raw, 12, 12), rd, rs2) {
            (0, 0, _) => return None,
            // c.jr
            (0, _, 0) => inst("jalr").rd(0).rs1(rd).imm(0),
            // c.mv
            (0, _, _) => inst("add").rd(rd).rs1(0).rs2(rs2),
            (1, 0, 0) => inst("ebreak"),
            // c.jalr
            (1, _, 0) => inst("jalr").rd(1).rs1(rd).imm(0),
            // c.add
            _ => inst("add").rd(rd).rs1(rd).rs2(rs2),
        },
        // c.swsp
        (0b10, 0b110) => {
            let imm = (bits(raw, 12, 9) << 2) | (bits(raw, 8, 7) << 6);
            inst("sw").rs1(2).rs2(rs2).imm(imm as i64)
        }
        // c.sdsp
        (0b10, 0b111) if rv64 => {
            let imm = (bits(raw, 12, 10) << 3) | (bits(raw, 9, 7) << 6);
            inst("sd").rs1(2).rs2(rs2).imm(imm as i64)
        }
        _ => return None,
    };

    // RV32 shift amounts are 5 bits
    if !rv64
        && matches!(decoded.mnemonic, "slli" | "srli" | "srai")
        && decoded.imm.is_some_and(|s| s >= 32)
    {
        return None;
    }
    Some(decoded)
}
