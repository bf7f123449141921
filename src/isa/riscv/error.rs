use thiserror::Error;

use crate::{
    config::{ConfigError, arch_config::Xlen},
    isa::riscv::{micro_op::Tag, reg_file::RegFileKind, translate::MmuMode},
    mem::MemError,
};

/// Host/modeling errors. Any of these means the simulated state can no longer be
/// trusted, so they abort the current step instead of being turned into traps.
#[derive(Error, Debug)]
pub enum HartError {
    #[error("memory read failed: {0}")]
    MemoryRead(MemError),
    #[error("memory write failed: {0}")]
    MemoryWrite(MemError),
    #[error("satp.mode {mode} is not a valid MMU mode for {xlen}")]
    InvalidMmuMode { mode: u64, xlen: Xlen },
    #[error("{mode:?} translation is not available on {xlen}")]
    UnsupportedMmuMode { mode: MmuMode, xlen: Xlen },
    #[error("translation request for {vaddr:#x} issued while another is outstanding")]
    TranslationPending { vaddr: u64 },
    #[error("no outstanding translation request")]
    NoTranslationRequest,
    #[error("translation result consumed before it was produced")]
    NoTranslationResult,
    #[error("a fault and an interrupt are pending at the same time")]
    ConflictingTrapCauses,
    #[error("exception dispatch entered without a pending cause")]
    MissingTrapCause,
    #[error("no instruction is in flight")]
    NoCurrentInstruction,
    #[error("instruction {mnemonic} is missing operand {operand}")]
    MissingOperand {
        mnemonic: &'static str,
        operand: &'static str,
    },
    #[error("unknown CSR {0:#x}")]
    UnknownCsr(u16),
    #[error("CSR {csr:#x} has no field {field}")]
    UnknownCsrField { csr: u16, field: &'static str },
    #[error("register index {index} out of range for {file:?} register file")]
    InvalidRegister { file: RegFileKind, index: u16 },
    #[error("chain {chain} has no op tagged {tag:?}")]
    MissingTag { chain: &'static str, tag: Tag },
    #[error(transparent)]
    Config(#[from] ConfigError),
}
