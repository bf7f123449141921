//! Trap entry and return.

use crate::{
    config::arch_config::Xlen,
    isa::riscv::{
        csr_reg::{PrivMode, csr_index, csr_table::Field},
        error::HartError,
        hart::Hart,
        micro_op::Flow,
        trap::{FaultCause, TrapCause},
    },
};

/// CSRs of one trap-handling privilege level.
struct TrapCsrs {
    tvec: u16,
    epc: u16,
    cause: u16,
    tval: u16,
    ie: Field,
    pie: Field,
    pp: Field,
}

impl TrapCsrs {
    fn of(level: PrivMode) -> TrapCsrs {
        match level {
            PrivMode::Machine => TrapCsrs {
                tvec: csr_index::mtvec,
                epc: csr_index::mepc,
                cause: csr_index::mcause,
                tval: csr_index::mtval,
                ie: Field::Mie,
                pie: Field::Mpie,
                pp: Field::Mpp,
            },
            PrivMode::Supervisor | PrivMode::User => TrapCsrs {
                tvec: csr_index::stvec,
                epc: csr_index::sepc,
                cause: csr_index::scause,
                tval: csr_index::stval,
                ie: Field::Sie,
                pie: Field::Spie,
                pp: Field::Spp,
            },
        }
    }
}

fn delegation_target(hart: &Hart, cause: TrapCause) -> Result<PrivMode, HartError> {
    let deleg = match cause {
        TrapCause::Fault(_) => hart.csrs().read(csr_index::medeleg)?,
        TrapCause::Interrupt(_) => hart.csrs().read(csr_index::mideleg)?,
    };
    Ok(if (deleg >> cause.code()) & 1 != 0 {
        PrivMode::Supervisor
    } else {
        PrivMode::Machine
    })
}

fn trap_value(hart: &Hart, cause: TrapCause) -> u64 {
    match cause {
        TrapCause::Fault(FaultCause::IllegalInstruction) => {
            hart.current_opcode().unwrap_or(0) as u64
        }
        TrapCause::Fault(fault) if fault.is_fetch_fault() || fault.is_data_fault() => {
            hart.exception_unit().fault_address()
        }
        _ => 0,
    }
}

/// Take the pending trap: pick the handling level from the delegation
/// registers, fill its `xepc`/`xcause`/`xtval`, stack the status bits and
/// point `next_pc` at the trap vector. The pending cause is cleared afterwards.
pub(crate) fn handle_exception(hart: &mut Hart) -> Result<Flow, HartError> {
    let cause = hart.exception_unit().pending()?;
    let target = delegation_target(hart, cause)?;
    let regs = TrapCsrs::of(target);
    let xlen = hart.xlen();
    let pc = hart.pc();
    let privilege = hart.priv_mode();
    let tval = trap_value(hart, cause);

    let csrs = hart.csrs_mut();
    let next_pc = csrs.read(regs.tvec)? & !1;

    csrs.write(regs.epc, pc)?;
    csrs.write(regs.cause, cause.xcause(xlen))?;
    csrs.write(regs.tval, tval)?;

    let ie = csrs.read_field(csr_index::mstatus, regs.ie)?;
    csrs.poke_field(csr_index::mstatus, regs.pie, ie)?;
    csrs.poke_field(csr_index::mstatus, regs.pp, u8::from(privilege) as u64)?;
    csrs.poke_field(csr_index::mstatus, regs.ie, 0)?;
    if target == PrivMode::Machine {
        let status = match xlen {
            Xlen::Rv32 => csr_index::mstatush,
            Xlen::Rv64 => csr_index::mstatus,
        };
        csrs.poke_field(status, Field::Mpv, 0)?;
        csrs.poke_field(status, Field::Gva, 0)?;
    }

    log::debug!(
        "trap {:?} at pc {:#x} from {:?} -> {:?}, vector {:#x}, tval {:#x}",
        cause,
        pc,
        privilege,
        target,
        next_pc,
        tval
    );

    hart.set_next_pc(next_pc);
    hart.set_next_priv_mode(target);
    hart.cosim_sync()?;
    hart.exception_unit_mut().clear();
    Ok(Flow::Continue)
}

/// `mret`: restore `mie` from `mpie`, return to `mpp` at `mepc`.
pub(crate) fn mret(hart: &mut Hart) -> Result<(), HartError> {
    let csrs = hart.csrs_mut();
    let mpie = csrs.read_field(csr_index::mstatus, Field::Mpie)?;
    let mpp = PrivMode::from_field(csrs.read_field(csr_index::mstatus, Field::Mpp)?);
    csrs.poke_field(csr_index::mstatus, Field::Mie, mpie)?;
    csrs.poke_field(csr_index::mstatus, Field::Mpie, 1)?;
    csrs.poke_field(csr_index::mstatus, Field::Mpp, u8::from(PrivMode::User) as u64)?;
    if mpp != PrivMode::Machine {
        csrs.poke_field(csr_index::mstatus, Field::Mprv, 0)?;
    }
    let mepc = csrs.read(csr_index::mepc)?;

    hart.set_next_pc(mepc);
    hart.set_next_priv_mode(mpp);
    Ok(())
}

/// `sret`: restore `sie` from `spie`, return to `spp` at `sepc`.
pub(crate) fn sret(hart: &mut Hart) -> Result<(), HartError> {
    let csrs = hart.csrs_mut();
    let spie = csrs.read_field(csr_index::mstatus, Field::Spie)?;
    let spp = match csrs.read_field(csr_index::mstatus, Field::Spp)? {
        0 => PrivMode::User,
        _ => PrivMode::Supervisor,
    };
    csrs.poke_field(csr_index::mstatus, Field::Sie, spie)?;
    csrs.poke_field(csr_index::mstatus, Field::Spie, 1)?;
    csrs.poke_field(csr_index::mstatus, Field::Spp, 0)?;
    csrs.poke_field(csr_index::mstatus, Field::Mprv, 0)?;
    let sepc = csrs.read(csr_index::sepc)?;

    hart.set_next_pc(sepc);
    hart.set_next_priv_mode(spp);
    Ok(())
}
