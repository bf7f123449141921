use crate::{
    config::arch_config::Xlen,
    isa::riscv::{
        csr_reg::{PrivMode, csr_index, csr_min_privilege, csr_table::Field, is_csr_writable},
        error::HartError,
        extension::Extensions,
        hart::Hart,
        inst_handlers::{InstFamily, InstHandlers},
        micro_op::{Flow, MicroOp, Tag},
        translate::change_mmu_mode,
        trap::FaultCause,
    },
};

/// CSR access instructions plus the side effects of writing to `misa`,
/// `mstatus`/`sstatus` and `satp`.
pub struct Zicsr;

fn is_fp_csr(csr: u16) -> bool {
    matches!(csr, csr_index::fflags | csr_index::frm | csr_index::fcsr)
}

/// Whether the current privilege may perform this access.
pub(crate) fn access_allowed(hart: &Hart, csr: u16, write: bool) -> Result<bool, HartError> {
    let csrs = hart.csrs();
    if !csrs.contains(csr) {
        return Ok(false);
    }
    let privilege = hart.priv_mode();
    if u8::from(privilege) < csr_min_privilege(csr) {
        return Ok(false);
    }
    if write && !is_csr_writable(csr) {
        return Ok(false);
    }
    if csr == csr_index::satp
        && privilege == PrivMode::Supervisor
        && csrs.read_field(csr_index::mstatus, Field::Tvm)? != 0
    {
        return Ok(false);
    }
    if is_fp_csr(csr) && csrs.read_field(csr_index::mstatus, Field::Fs)? == 0 {
        return Ok(false);
    }
    Ok(true)
}

fn read_csr(hart: &mut Hart, csr: u16) -> Result<u64, HartError> {
    if matches!(
        csr,
        csr_index::cycle | csr_index::instret | csr_index::mcycle | csr_index::minstret
    ) {
        hart.sync_counters()?;
    }
    hart.csrs().read(csr)
}

/// Write the CSR and remember it for the update op.
fn write_csr(hart: &mut Hart, csr: u16, value: u64) -> Result<(), HartError> {
    hart.csrs_mut().write(csr, value)?;
    hart.current_inst_mut()?.csr_written = Some(csr);
    Ok(())
}

fn source_operand<const UIMM: bool>(hart: &Hart) -> Result<(u64, bool), HartError> {
    let inst = hart.current_inst()?;
    if UIMM {
        let uimm = inst.imm()? as u64;
        Ok((uimm, uimm != 0))
    } else {
        let rs1 = inst.rs1()?;
        Ok((hart.read_int(rs1)?, rs1 != 0))
    }
}

/// `csrrw`/`csrrwi`: the CSR is only read when `rd != x0`.
fn csrrw<const UIMM: bool>(hart: &mut Hart) -> Result<Flow, HartError> {
    let inst = hart.current_inst()?;
    let (rd, csr) = (inst.rd()?, inst.csr()?);
    if !access_allowed(hart, csr, true)? {
        return Ok(hart.raise_fault(FaultCause::IllegalInstruction));
    }

    let (value, _) = source_operand::<UIMM>(hart)?;
    let old = if rd != 0 { Some(read_csr(hart, csr)?) } else { None };
    write_csr(hart, csr, value)?;
    if let Some(old) = old {
        hart.write_int(rd, old)?;
    }
    Ok(Flow::Continue)
}

/// `csrrs`/`csrrc` and immediate forms: the CSR is only written when the
/// source is not `x0` / zero.
fn csr_bit<const SET: bool, const UIMM: bool>(hart: &mut Hart) -> Result<Flow, HartError> {
    let inst = hart.current_inst()?;
    let (rd, csr) = (inst.rd()?, inst.csr()?);
    let (rhs, writes) = source_operand::<UIMM>(hart)?;
    if !access_allowed(hart, csr, writes)? {
        return Ok(hart.raise_fault(FaultCause::IllegalInstruction));
    }

    let old = read_csr(hart, csr)?;
    if writes {
        let value = if SET { old | rhs } else { old & !rhs };
        write_csr(hart, csr, value)?;
    }
    hart.write_int(rd, old)?;
    Ok(Flow::Continue)
}

fn update_misa(hart: &mut Hart) -> Result<(), HartError> {
    let supported = hart.supported_extensions();
    let next_pc = hart.next_pc();
    let csrs = hart.csrs_mut();
    let requested = Extensions::from_misa(csrs.read_field(csr_index::misa, Field::Extensions)?);

    let mut legal = (requested & supported) | Extensions::I;
    if !legal.contains(Extensions::F) {
        legal.remove(Extensions::D);
    }
    // c can only go away while the next instruction stays reachable
    if supported.contains(Extensions::C) && next_pc & 0b11 != 0 {
        legal.insert(Extensions::C);
    }
    csrs.poke_field(csr_index::misa, Field::Extensions, legal.misa_bits())?;
    if legal != requested {
        log::debug!("misa write {requested} legalized to {legal}");
    }
    hart.change_extension_context()
}

fn update_status(hart: &mut Hart) -> Result<(), HartError> {
    let csrs = hart.csrs_mut();
    let mut dirty = false;
    for field in [Field::Fs, Field::Vs, Field::Xs] {
        dirty |= csrs.read_field(csr_index::mstatus, field)? == 0b11;
    }
    csrs.poke_field(csr_index::mstatus, Field::Sd, dirty as u64)?;
    hart.change_extension_context()?;
    change_mmu_mode(hart)
}

fn csr_update(hart: &mut Hart) -> Result<Flow, HartError> {
    let Some(csr) = hart.current_inst_mut()?.csr_written.take() else {
        return Ok(Flow::Continue);
    };
    match csr {
        csr_index::misa => update_misa(hart)?,
        csr_index::mstatus | csr_index::sstatus => update_status(hart)?,
        csr_index::satp => change_mmu_mode(hart)?,
        _ => {}
    }
    Ok(Flow::Continue)
}

const CSR_UPDATE: MicroOp = MicroOp::tagged("csr_update", Tag::CsrUpdate, csr_update);

impl InstFamily for Zicsr {
    fn name(&self) -> &'static str {
        "zicsr"
    }

    fn register(&self, _xlen: Xlen, handlers: &mut InstHandlers) {
        let ops: [(&'static str, MicroOp); 6] = [
            ("csrrw", MicroOp::tagged("csrrw", Tag::Execute, csrrw::<false>)),
            ("csrrs", MicroOp::tagged("csrrs", Tag::Execute, csr_bit::<true, false>)),
            ("csrrc", MicroOp::tagged("csrrc", Tag::Execute, csr_bit::<false, false>)),
            ("csrrwi", MicroOp::tagged("csrrwi", Tag::Execute, csrrw::<true>)),
            ("csrrsi", MicroOp::tagged("csrrsi", Tag::Execute, csr_bit::<true, true>)),
            ("csrrci", MicroOp::tagged("csrrci", Tag::Execute, csr_bit::<false, true>)),
        ];
        for (mnemonic, execute) in ops {
            handlers.register(mnemonic, &[execute, CSR_UPDATE]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::HartConfig, ram::Ram};

    fn hart() -> Hart {
        let config = HartConfig::new().with_isa("rv64gc");
        let mut hart = Hart::new(config, Box::new(Ram::new(0x8000_0000, 0x1000))).unwrap();
        hart.boot().unwrap();
        hart
    }

    #[test]
    fn test_access_rules() {
        let mut hart = hart();
        assert!(access_allowed(&hart, csr_index::mscratch, true).unwrap());
        assert!(access_allowed(&hart, csr_index::cycle, false).unwrap());
        assert!(!access_allowed(&hart, csr_index::cycle, true).unwrap());
        assert!(!access_allowed(&hart, 0x7ff, false).unwrap());

        hart.set_priv_mode(PrivMode::Supervisor).unwrap();
        assert!(!access_allowed(&hart, csr_index::mscratch, false).unwrap());
        assert!(access_allowed(&hart, csr_index::satp, true).unwrap());
        hart.poke_csr_field(csr_index::mstatus, Field::Tvm, 1)
            .unwrap();
        assert!(!access_allowed(&hart, csr_index::satp, false).unwrap());

        hart.set_priv_mode(PrivMode::User).unwrap();
        assert!(!access_allowed(&hart, csr_index::sstatus, false).unwrap());
    }

    #[test]
    fn test_fp_csrs_need_fs() {
        let mut hart = hart();
        hart.poke_csr_field(csr_index::mstatus, Field::Fs, 0)
            .unwrap();
        assert!(!access_allowed(&hart, csr_index::fcsr, false).unwrap());
        hart.poke_csr_field(csr_index::mstatus, Field::Fs, 1)
            .unwrap();
        assert!(access_allowed(&hart, csr_index::frm, true).unwrap());
    }

    #[test]
    fn test_registered_with_update_op() {
        let mut handlers = InstHandlers::new(Xlen::Rv32);
        handlers.add_family(&Zicsr);
        assert_eq!(handlers.len(), 6);
        let chain = &handlers.get("csrrsi").chain;
        assert_eq!(chain.ops()[0].name(), "csrrsi");
        assert!(chain.contains(Tag::CsrUpdate));
    }

    #[test]
    fn test_counter_reads_follow_retired_count() {
        let mut ram = Ram::new(0x8000_0000, 0x1000);
        ram.write_program(
            0x8000_0000,
            &[
                0x0010_8093, // addi x1, x1, 1
                0x0010_8093, // addi x1, x1, 1
                0xb000_22f3, // csrrs x5, mcycle, x0
                0xb020_2373, // csrrs x6, minstret, x0
                0xc020_23f3, // csrrs x7, instret, x0
            ],
        )
        .unwrap();
        let config = HartConfig::new().with_isa("rv64gc");
        let mut hart = Hart::new(config, Box::new(ram)).unwrap();
        hart.boot().unwrap();
        for _ in 0..5 {
            hart.step().unwrap();
        }
        assert_eq!(hart.read_int(5).unwrap(), 2);
        assert_eq!(hart.read_int(6).unwrap(), 3);
        assert_eq!(hart.read_int(7).unwrap(), 4);
    }
}
