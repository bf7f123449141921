//! Architectural CSR layouts for RV32 and RV64.
//!
//! Bits that belong to no listed field are reserved and read as zero.

use crate::utils::make_mask;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAccess {
    ReadWrite,
    ReadOnly,
}

macro_rules! define_fields {
    ($($field:ident => $name:literal),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Field {
            $($field),*
        }

        impl Field {
            pub fn name(self) -> &'static str {
                match self {
                    $(Field::$field => $name),*
                }
            }
        }
    };
}

define_fields! {
    Value => "value",
    Upper => "upper",
    Sie => "sie",
    Mie => "mie",
    Spie => "spie",
    Ube => "ube",
    Mpie => "mpie",
    Spp => "spp",
    Vs => "vs",
    Mpp => "mpp",
    Fs => "fs",
    Xs => "xs",
    Mprv => "mprv",
    Sum => "sum",
    Mxr => "mxr",
    Tvm => "tvm",
    Tw => "tw",
    Tsr => "tsr",
    Uxl => "uxl",
    Sxl => "sxl",
    Sbe => "sbe",
    Mbe => "mbe",
    Gva => "gva",
    Mpv => "mpv",
    Sd => "sd",
    Extensions => "extensions",
    Mxl => "mxl",
    Mode => "mode",
    Base => "base",
    Asid => "asid",
    Ppn => "ppn",
    Code => "code",
    Interrupt => "interrupt",
    Fflags => "fflags",
    Frm => "frm",
    Nx => "nx",
    Uf => "uf",
    Of => "of",
    Dz => "dz",
    Nv => "nv",
    Vxsat => "vxsat",
    Vxrm => "vxrm",
    Ssi => "ssi",
    Msi => "msi",
    Sti => "sti",
    Mti => "mti",
    Sei => "sei",
    Mei => "mei",
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDesc {
    pub field: Field,
    pub lsb: u8,
    pub msb: u8,
    pub access: FieldAccess,
}

impl FieldDesc {
    pub const fn new(field: Field, lsb: u8, msb: u8, access: FieldAccess) -> Self {
        Self {
            field,
            lsb,
            msb,
            access,
        }
    }

    #[inline]
    pub const fn mask(&self) -> u64 {
        make_mask(self.lsb as u32, self.msb as u32)
    }

    pub const fn is_writable(&self) -> bool {
        matches!(self.access, FieldAccess::ReadWrite)
    }
}

/// A CSR whose storage lives inside another CSR, `shift` bits up.
#[derive(Debug, Clone, Copy)]
pub struct CsrAlias {
    pub target: u16,
    pub shift: u8,
}

#[derive(Debug)]
pub struct CsrDesc {
    pub name: &'static str,
    pub addr: u16,
    pub alias: Option<CsrAlias>,
    pub fields: &'static [FieldDesc],
}

macro_rules! access {
    (RW) => {
        FieldAccess::ReadWrite
    };
    (RO) => {
        FieldAccess::ReadOnly
    };
}

macro_rules! csr_alias {
    () => {
        None
    };
    ($target:literal, $shift:literal) => {
        Some(CsrAlias {
            target: $target,
            shift: $shift,
        })
    };
}

macro_rules! csr_rows {
    [$(
        $name:ident @ $addr:literal $(alias($target:literal, $shift:literal))? {
            $( $field:ident [$lsb:expr, $msb:expr] $acc:ident ),* $(,)?
        }
    ),* $(,)?] => {
        &[$(
            CsrDesc {
                name: stringify!($name),
                addr: $addr,
                alias: csr_alias!($($target, $shift)?),
                fields: &[$( FieldDesc::new(Field::$field, $lsb, $msb, access!($acc)) ),*],
            }
        ),*]
    };
}

/// Rows shared by both widths. `XMSB` is the top bit of the including table.
macro_rules! csr_table {
    ($($extra:tt)*) => {
        csr_rows![
            fflags @ 0x001 alias(0x003, 0) {
                Nx[0, 0] RW, Uf[1, 1] RW, Of[2, 2] RW, Dz[3, 3] RW, Nv[4, 4] RW
            },
            frm @ 0x002 alias(0x003, 5) { Frm[0, 2] RW },
            fcsr @ 0x003 { Fflags[0, 4] RW, Frm[5, 7] RW },
            vstart @ 0x008 { Value[0, XMSB] RW },
            vxsat @ 0x009 alias(0x00f, 0) { Vxsat[0, 0] RW },
            vxrm @ 0x00a alias(0x00f, 1) { Vxrm[0, 1] RW },
            vcsr @ 0x00f { Vxsat[0, 0] RW, Vxrm[1, 2] RW },
            cycle @ 0xc00 { Value[0, XMSB] RO },
            time @ 0xc01 { Value[0, XMSB] RO },
            instret @ 0xc02 { Value[0, XMSB] RO },
            vl @ 0xc20 { Value[0, XMSB] RO },
            vtype @ 0xc21 { Value[0, XMSB] RO },
            vlenb @ 0xc22 { Value[0, XMSB] RO },

            sie @ 0x104 alias(0x304, 0) { Ssi[1, 1] RW, Sti[5, 5] RW, Sei[9, 9] RW },
            stvec @ 0x105 { Mode[0, 1] RW, Base[2, XMSB] RW },
            scounteren @ 0x106 { Value[0, 31] RW },
            senvcfg @ 0x10a { Value[0, 0] RW },
            sscratch @ 0x140 { Value[0, XMSB] RW },
            sepc @ 0x141 { Value[1, XMSB] RW },
            scause @ 0x142 { Code[0, XMSB - 1] RW, Interrupt[XMSB, XMSB] RW },
            stval @ 0x143 { Value[0, XMSB] RW },
            sip @ 0x144 alias(0x344, 0) { Ssi[1, 1] RW, Sti[5, 5] RO, Sei[9, 9] RO },

            misa @ 0x301 { Extensions[0, 25] RW, Mxl[XMSB - 1, XMSB] RO },
            medeleg @ 0x302 { Value[0, 10] RW, Upper[12, 15] RW },
            mideleg @ 0x303 { Ssi[1, 1] RW, Sti[5, 5] RW, Sei[9, 9] RW },
            mie @ 0x304 {
                Ssi[1, 1] RW, Msi[3, 3] RW, Sti[5, 5] RW, Mti[7, 7] RW, Sei[9, 9] RW, Mei[11, 11] RW
            },
            mtvec @ 0x305 { Mode[0, 1] RW, Base[2, XMSB] RW },
            mcounteren @ 0x306 { Value[0, 31] RW },
            menvcfg @ 0x30a { Value[0, 0] RW },
            mscratch @ 0x340 { Value[0, XMSB] RW },
            mepc @ 0x341 { Value[1, XMSB] RW },
            mcause @ 0x342 { Code[0, XMSB - 1] RW, Interrupt[XMSB, XMSB] RW },
            mtval @ 0x343 { Value[0, XMSB] RW },
            mip @ 0x344 {
                Ssi[1, 1] RW, Msi[3, 3] RO, Sti[5, 5] RW, Mti[7, 7] RO, Sei[9, 9] RW, Mei[11, 11] RO
            },
            mtinst @ 0x34a { Value[0, XMSB] RW },
            mtval2 @ 0x34b { Value[0, XMSB] RW },
            pmpcfg0 @ 0x3a0 { Value[0, XMSB] RW },
            pmpaddr0 @ 0x3b0 { Value[0, XMSB] RW },
            mcycle @ 0xb00 { Value[0, XMSB] RW },
            minstret @ 0xb02 { Value[0, XMSB] RW },
            mvendorid @ 0xf11 { Value[0, 31] RO },
            marchid @ 0xf12 { Value[0, XMSB] RO },
            mimpid @ 0xf13 { Value[0, XMSB] RO },
            mhartid @ 0xf14 { Value[0, XMSB] RO },
            mconfigptr @ 0xf15 { Value[0, XMSB] RO },
            $($extra)*
        ]
    };
}

pub mod rv32 {
    use super::*;

    const XMSB: u8 = 31;

    #[rustfmt::skip]
    pub static CSRS: &[CsrDesc] = csr_table![
        sstatus @ 0x100 alias(0x300, 0) {
            Sie[1, 1] RW, Spie[5, 5] RW, Ube[6, 6] RW, Spp[8, 8] RW, Vs[9, 10] RW,
            Fs[13, 14] RW, Xs[15, 16] RO, Sum[18, 18] RW, Mxr[19, 19] RW, Sd[31, 31] RO,
        },
        satp @ 0x180 { Ppn[0, 21] RW, Asid[22, 30] RW, Mode[31, 31] RW },
        mstatus @ 0x300 {
            Sie[1, 1] RW, Mie[3, 3] RW, Spie[5, 5] RW, Ube[6, 6] RW, Mpie[7, 7] RW,
            Spp[8, 8] RW, Vs[9, 10] RW, Mpp[11, 12] RW, Fs[13, 14] RW, Xs[15, 16] RO,
            Mprv[17, 17] RW, Sum[18, 18] RW, Mxr[19, 19] RW, Tvm[20, 20] RW,
            Tw[21, 21] RW, Tsr[22, 22] RW, Sd[31, 31] RO,
        },
        mstatush @ 0x310 { Sbe[4, 4] RW, Mbe[5, 5] RW, Gva[6, 6] RW, Mpv[7, 7] RW },
    ];
}

pub mod rv64 {
    use super::*;

    const XMSB: u8 = 63;

    #[rustfmt::skip]
    pub static CSRS: &[CsrDesc] = csr_table![
        sstatus @ 0x100 alias(0x300, 0) {
            Sie[1, 1] RW, Spie[5, 5] RW, Ube[6, 6] RW, Spp[8, 8] RW, Vs[9, 10] RW,
            Fs[13, 14] RW, Xs[15, 16] RO, Sum[18, 18] RW, Mxr[19, 19] RW,
            Uxl[32, 33] RO, Sd[63, 63] RO,
        },
        satp @ 0x180 { Ppn[0, 43] RW, Asid[44, 59] RW, Mode[60, 63] RW },
        mstatus @ 0x300 {
            Sie[1, 1] RW, Mie[3, 3] RW, Spie[5, 5] RW, Ube[6, 6] RW, Mpie[7, 7] RW,
            Spp[8, 8] RW, Vs[9, 10] RW, Mpp[11, 12] RW, Fs[13, 14] RW, Xs[15, 16] RO,
            Mprv[17, 17] RW, Sum[18, 18] RW, Mxr[19, 19] RW, Tvm[20, 20] RW,
            Tw[21, 21] RW, Tsr[22, 22] RW, Uxl[32, 33] RO, Sxl[34, 35] RO,
            Sbe[36, 36] RW, Mbe[37, 37] RW, Gva[38, 38] RW, Mpv[39, 39] RW,
            Sd[63, 63] RO,
        },
    ];
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_addresses_unique() {
        for table in [rv32::CSRS, rv64::CSRS] {
            let mut seen = HashSet::new();
            for desc in table {
                assert!(seen.insert(desc.addr), "duplicate CSR {}", desc.name);
            }
        }
    }

    #[test]
    fn test_fields_do_not_overlap() {
        for table in [rv32::CSRS, rv64::CSRS] {
            for desc in table {
                let mut covered = 0u64;
                for f in desc.fields {
                    assert!(f.lsb <= f.msb, "{}.{}", desc.name, f.field.name());
                    assert_eq!(covered & f.mask(), 0, "{}.{}", desc.name, f.field.name());
                    covered |= f.mask();
                }
            }
        }
    }

    #[test]
    fn test_xlen_dependent_layout() {
        let find = |table: &'static [CsrDesc], name: &str| {
            table.iter().find(|d| d.name == name).unwrap()
        };
        let mode64 = find(rv64::CSRS, "satp")
            .fields
            .iter()
            .find(|f| f.field == Field::Mode);
        assert_eq!(mode64.map(|f| (f.lsb, f.msb)), Some((60, 63)));
        let mode32 = find(rv32::CSRS, "satp")
            .fields
            .iter()
            .find(|f| f.field == Field::Mode);
        assert_eq!(mode32.map(|f| (f.lsb, f.msb)), Some((31, 31)));
        assert!(rv64::CSRS.iter().all(|d| d.name != "mstatush"));
    }
}
