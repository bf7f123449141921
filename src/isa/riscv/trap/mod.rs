use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{
    config::arch_config::Xlen,
    isa::riscv::{
        csr_reg::{CsrRegFile, PrivMode, csr_index, csr_table::Field},
        error::HartError,
    },
};

pub mod dispatcher;

/// Synchronous exception causes, valued by their `xcause` code.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum FaultCause {
    InstAddrMisaligned = 0,
    InstAccessFault = 1,
    IllegalInstruction = 2,
    Breakpoint = 3,
    LoadAddrMisaligned = 4,
    LoadAccessFault = 5,
    StoreAmoAddrMisaligned = 6,
    StoreAmoAccessFault = 7,
    EcallFromU = 8,
    EcallFromS = 9,
    EcallFromM = 11,
    InstPageFault = 12,
    LoadPageFault = 13,
    StoreAmoPageFault = 15,
}

impl FaultCause {
    pub fn is_fetch_fault(self) -> bool {
        matches!(
            self,
            FaultCause::InstAddrMisaligned | FaultCause::InstAccessFault | FaultCause::InstPageFault
        )
    }

    pub fn is_data_fault(self) -> bool {
        matches!(
            self,
            FaultCause::LoadAddrMisaligned
                | FaultCause::LoadAccessFault
                | FaultCause::StoreAmoAddrMisaligned
                | FaultCause::StoreAmoAccessFault
                | FaultCause::LoadPageFault
                | FaultCause::StoreAmoPageFault
        )
    }

    pub fn ecall_from(privilege: PrivMode) -> FaultCause {
        match privilege {
            PrivMode::User => FaultCause::EcallFromU,
            PrivMode::Supervisor => FaultCause::EcallFromS,
            PrivMode::Machine => FaultCause::EcallFromM,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum InterruptCause {
    SupervisorSoft = 1,
    MachineSoft = 3,
    SupervisorTimer = 5,
    MachineTimer = 7,
    SupervisorExternal = 9,
    MachineExternal = 11,
}

impl InterruptCause {
    /// Highest priority first.
    pub const PRIORITY: [InterruptCause; 6] = [
        InterruptCause::MachineExternal,
        InterruptCause::MachineSoft,
        InterruptCause::MachineTimer,
        InterruptCause::SupervisorExternal,
        InterruptCause::SupervisorSoft,
        InterruptCause::SupervisorTimer,
    ];

    /// Bit of this interrupt in `mip`/`mie`/`mideleg`.
    pub fn bit(self) -> u64 {
        1 << u8::from(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrapCause {
    Fault(FaultCause),
    Interrupt(InterruptCause),
}

impl TrapCause {
    pub fn code(self) -> u64 {
        match self {
            TrapCause::Fault(cause) => u8::from(cause) as u64,
            TrapCause::Interrupt(cause) => u8::from(cause) as u64,
        }
    }

    pub fn is_interrupt(self) -> bool {
        matches!(self, TrapCause::Interrupt(_))
    }

    /// Value written to `xcause`: the code, with bit `XLEN-1` set for interrupts.
    pub fn xcause(self, xlen: Xlen) -> u64 {
        match self {
            TrapCause::Fault(_) => self.code(),
            TrapCause::Interrupt(_) => self.code() | (1 << (xlen.bits() - 1)),
        }
    }
}

/// Pending trap cause of a hart. At most one of fault and interrupt may be set
/// when the dispatcher runs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionUnit {
    fault: Option<FaultCause>,
    interrupt: Option<InterruptCause>,
    fault_address: u64,
}

impl ExceptionUnit {
    pub fn raise_fault(&mut self, cause: FaultCause) {
        self.fault = Some(cause);
    }

    pub fn raise_fault_at(&mut self, cause: FaultCause, addr: u64) {
        self.fault = Some(cause);
        self.fault_address = addr;
    }

    pub fn raise_interrupt(&mut self, cause: InterruptCause) {
        self.interrupt = Some(cause);
    }

    pub fn fault(&self) -> Option<FaultCause> {
        self.fault
    }

    pub fn interrupt(&self) -> Option<InterruptCause> {
        self.interrupt
    }

    pub fn fault_address(&self) -> u64 {
        self.fault_address
    }

    pub fn is_pending(&self) -> bool {
        self.fault.is_some() || self.interrupt.is_some()
    }

    /// The single pending cause.
    pub fn pending(&self) -> Result<TrapCause, HartError> {
        match (self.fault, self.interrupt) {
            (Some(fault), None) => Ok(TrapCause::Fault(fault)),
            (None, Some(interrupt)) => Ok(TrapCause::Interrupt(interrupt)),
            (Some(_), Some(_)) => Err(HartError::ConflictingTrapCauses),
            (None, None) => Err(HartError::MissingTrapCause),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Pick the highest-priority interrupt that is pending, enabled and not masked by
/// the privilege of its handling level.
pub fn pending_interrupt(
    csrs: &CsrRegFile,
    privilege: PrivMode,
) -> Result<Option<InterruptCause>, HartError> {
    let pending = csrs.read(csr_index::mip)? & csrs.read(csr_index::mie)?;
    if pending == 0 {
        return Ok(None);
    }

    let mideleg = csrs.read(csr_index::mideleg)?;
    let m_enabled = privilege < PrivMode::Machine
        || csrs.read_field(csr_index::mstatus, Field::Mie)? != 0;
    let s_enabled = privilege < PrivMode::Supervisor
        || (privilege == PrivMode::Supervisor
            && csrs.read_field(csr_index::mstatus, Field::Sie)? != 0);

    Ok(InterruptCause::PRIORITY.into_iter().find(|cause| {
        let bit = cause.bit();
        if pending & bit == 0 {
            return false;
        }
        if mideleg & bit != 0 { s_enabled } else { m_enabled }
    }))
}
