use crate::{
    config::arch_config::Xlen,
    isa::riscv::{
        decoder::{DecodeMask, InstFormat, create_decode_mask},
        extension::Extensions,
    },
};

#[derive(Debug, Clone, Copy)]
pub(super) struct InstDesc {
    pub mnemonic: &'static str,
    pub mask: DecodeMask,
    pub format: InstFormat,
    /// Extension that must be enabled for the encoding to decode.
    pub extension: Extensions,
}

macro_rules! inst_table {
    ($ext:ident: $($mnemonic:literal => $pattern:literal, $format:ident;)*) => {
        &[$(
            InstDesc {
                mnemonic: $mnemonic,
                mask: create_decode_mask($pattern),
                format: InstFormat::$format,
                extension: Extensions::$ext,
            }
        ),*]
    };
}

#[rustfmt::skip]
static RV_I: &[InstDesc] = inst_table!(I:
    "lui"    => "???????_?????_?????_???_?????_0110111", U;
    "auipc"  => "???????_?????_?????_???_?????_0010111", U;
    "jal"    => "???????_?????_?????_???_?????_1101111", J;
    "jalr"   => "???????_?????_?????_000_?????_1100111", I;
    "beq"    => "???????_?????_?????_000_?????_1100011", B;
    "bne"    => "???????_?????_?????_001_?????_1100011", B;
    "blt"    => "???????_?????_?????_100_?????_1100011", B;
    "bge"    => "???????_?????_?????_101_?????_1100011", B;
    "bltu"   => "???????_?????_?????_110_?????_1100011", B;
    "bgeu"   => "???????_?????_?????_111_?????_1100011", B;
    "lb"     => "???????_?????_?????_000_?????_0000011", I;
    "lh"     => "???????_?????_?????_001_?????_0000011", I;
    "lw"     => "???????_?????_?????_010_?????_0000011", I;
    "lbu"    => "???????_?????_?????_100_?????_0000011", I;
    "lhu"    => "???????_?????_?????_101_?????_0000011", I;
    "sb"     => "???????_?????_?????_000_?????_0100011", S;
    "sh"     => "???????_?????_?????_001_?????_0100011", S;
    "sw"     => "???????_?????_?????_010_?????_0100011", S;
    "addi"   => "???????_?????_?????_000_?????_0010011", I;
    "slti"   => "???????_?????_?????_010_?????_0010011", I;
    "sltiu"  => "???????_?????_?????_011_?????_0010011", I;
    "xori"   => "???????_?????_?????_100_?????_0010011", I;
    "ori"    => "???????_?????_?????_110_?????_0010011", I;
    "andi"   => "???????_?????_?????_111_?????_0010011", I;
    "add"    => "0000000_?????_?????_000_?????_0110011", R;
    "sub"    => "0100000_?????_?????_000_?????_0110011", R;
    "sll"    => "0000000_?????_?????_001_?????_0110011", R;
    "slt"    => "0000000_?????_?????_010_?????_0110011", R;
    "sltu"   => "0000000_?????_?????_011_?????_0110011", R;
    "xor"    => "0000000_?????_?????_100_?????_0110011", R;
    "srl"    => "0000000_?????_?????_101_?????_0110011", R;
    "sra"    => "0100000_?????_?????_101_?????_0110011", R;
    "or"     => "0000000_?????_?????_110_?????_0110011", R;
    "and"    => "0000000_?????_?????_111_?????_0110011", R;
    "fence"  => "???????_?????_?????_000_?????_0001111", None;
    "ecall"  => "0000000_00000_00000_000_00000_1110011", None;
    "ebreak" => "0000000_00001_00000_000_00000_1110011", None;
    "mret"   => "0011000_00010_00000_000_00000_1110011", None;
    "wfi"    => "0001000_00101_00000_000_00000_1110011", None;
);

#[rustfmt::skip]
static RV32_SHIFT: &[InstDesc] = inst_table!(I:
    "slli"   => "0000000_?????_?????_001_?????_0010011", Shamt;
    "srli"   => "0000000_?????_?????_101_?????_0010011", Shamt;
    "srai"   => "0100000_?????_?????_101_?????_0010011", Shamt;
);

#[rustfmt::skip]
static RV64_SHIFT: &[InstDesc] = inst_table!(I:
    "slli"   => "000000_??????_?????_001_?????_0010011", Shamt;
    "srli"   => "000000_??????_?????_101_?????_0010011", Shamt;
    "srai"   => "010000_??????_?????_101_?????_0010011", Shamt;
);

#[rustfmt::skip]
static RV64_I: &[InstDesc] = inst_table!(I:
    "lwu"    => "???????_?????_?????_110_?????_0000011", I;
    "ld"     => "???????_?????_?????_011_?????_0000011", I;
    "sd"     => "???????_?????_?????_011_?????_0100011", S;
    "addiw"  => "???????_?????_?????_000_?????_0011011", I;
    "slliw"  => "0000000_?????_?????_001_?????_0011011", Shamt;
    "srliw"  => "0000000_?????_?????_101_?????_0011011", Shamt;
    "sraiw"  => "0100000_?????_?????_101_?????_0011011", Shamt;
    "addw"   => "0000000_?????_?????_000_?????_0111011", R;
    "subw"   => "0100000_?????_?????_000_?????_0111011", R;
    "sllw"   => "0000000_?????_?????_001_?????_0111011", R;
    "srlw"   => "0000000_?????_?????_101_?????_0111011", R;
    "sraw"   => "0100000_?????_?????_101_?????_0111011", R;
);

#[rustfmt::skip]
static RV_M: &[InstDesc] = inst_table!(M:
    "mul"    => "0000001_?????_?????_000_?????_0110011", R;
    "mulh"   => "0000001_?????_?????_001_?????_0110011", R;
    "mulhsu" => "0000001_?????_?????_010_?????_0110011", R;
    "mulhu"  => "0000001_?????_?????_011_?????_0110011", R;
    "div"    => "0000001_?????_?????_100_?????_0110011", R;
    "divu"   => "0000001_?????_?????_101_?????_0110011", R;
    "rem"    => "0000001_?????_?????_110_?????_0110011", R;
    "remu"   => "0000001_?????_?????_111_?????_0110011", R;
);

#[rustfmt::skip]
static RV64_M: &[InstDesc] = inst_table!(M:
    "mulw"   => "0000001_?????_?????_000_?????_0111011", R;
    "divw"   => "0000001_?????_?????_100_?????_0111011", R;
    "divuw"  => "0000001_?????_?????_101_?????_0111011", R;
    "remw"   => "0000001_?????_?????_110_?????_0111011", R;
    "remuw"  => "0000001_?????_?????_111_?????_0111011", R;
);

#[rustfmt::skip]
static RV_ZICSR: &[InstDesc] = inst_table!(ZICSR:
    "csrrw"  => "???????_?????_?????_001_?????_1110011", Csr;
    "csrrs"  => "???????_?????_?????_010_?????_1110011", Csr;
    "csrrc"  => "???????_?????_?????_011_?????_1110011", Csr;
    "csrrwi" => "???????_?????_?????_101_?????_1110011", CsrImm;
    "csrrsi" => "???????_?????_?????_110_?????_1110011", CsrImm;
    "csrrci" => "???????_?????_?????_111_?????_1110011", CsrImm;
);

#[rustfmt::skip]
static RV_ZIFENCEI: &[InstDesc] = inst_table!(ZIFENCEI:
    "fence.i" => "???????_?????_?????_001_?????_0001111", None;
);

#[rustfmt::skip]
static RV_S: &[InstDesc] = inst_table!(S:
    "sret"       => "0001000_00010_00000_000_00000_1110011", None;
    "sfence.vma" => "0001001_?????_?????_000_00000_1110011", R;
);

#[rustfmt::skip]
static RV_F: &[InstDesc] = inst_table!(F:
    "fclass.s" => "1110000_00000_?????_001_?????_1010011", Unary;
);

#[rustfmt::skip]
static RV_D: &[InstDesc] = inst_table!(D:
    "fclass.d" => "1110001_00000_?????_001_?????_1010011", Unary;
);

/// Every table available at `xlen`, before extension filtering.
pub(super) fn tables(xlen: Xlen) -> Vec<&'static [InstDesc]> {
    let mut tables = vec![RV_I, RV_M, RV_ZICSR, RV_ZIFENCEI, RV_S, RV_F, RV_D];
    match xlen {
        Xlen::Rv32 => tables.push(RV32_SHIFT),
        Xlen::Rv64 => tables.extend([RV64_SHIFT, RV64_I, RV64_M]),
    }
    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_ambiguous_encodings() {
        for xlen in [Xlen::Rv32, Xlen::Rv64] {
            let all: Vec<&InstDesc> = tables(xlen).into_iter().flatten().collect();
            for (i, a) in all.iter().enumerate() {
                for b in &all[i + 1..] {
                    // two entries overlap if their fixed bits agree wherever both are fixed
                    let common = a.mask.mask & b.mask.mask;
                    let overlap = (a.mask.key & common) == (b.mask.key & common);
                    assert!(!overlap, "{} overlaps {}", a.mnemonic, b.mnemonic);
                }
            }
        }
    }
}
