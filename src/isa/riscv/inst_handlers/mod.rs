//! Per-mnemonic micro-op chains.
//!
//! Every instruction family registers a chain template per mnemonic into one
//! [`InstHandlers`] map. The hart binds the template of a decoded instruction,
//! splicing in the data-translation ops and observer hooks.

mod rvfd;
mod rvi;
mod zicsr;

use std::collections::HashMap;

pub use rvfd::RvFd;
pub use rvi::RvI;
pub use zicsr::Zicsr;

use crate::{
    config::arch_config::Xlen,
    isa::riscv::{
        decoder::DecodedInst,
        error::HartError,
        hart::Hart,
        micro_op::{Flow, MicroOp, MicroOpChain, Tag},
        translate::{AccessKind, TranslationState},
    },
};

/// The instruction currently in flight.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub decoded: DecodedInst,
    /// Data-access translation queue of this instruction.
    pub translation: TranslationState,
    /// Set when the mnemonic has no semantics in this simulator.
    pub unimplemented: bool,
    /// CSR written by a Zicsr instruction, for the update hook.
    pub(crate) csr_written: Option<u16>,
}

impl Instruction {
    pub fn new(decoded: DecodedInst) -> Self {
        Self {
            decoded,
            translation: TranslationState::new(),
            unimplemented: false,
            csr_written: None,
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        self.decoded.mnemonic
    }

    pub fn opcode(&self) -> u32 {
        self.decoded.opcode
    }

    pub fn len(&self) -> u64 {
        self.decoded.len as u64
    }

    fn missing(&self, operand: &'static str) -> HartError {
        HartError::MissingOperand {
            mnemonic: self.decoded.mnemonic,
            operand,
        }
    }

    pub fn rd(&self) -> Result<usize, HartError> {
        self.decoded
            .rd
            .map(usize::from)
            .ok_or_else(|| self.missing("rd"))
    }

    pub fn rs1(&self) -> Result<usize, HartError> {
        self.decoded
            .rs1
            .map(usize::from)
            .ok_or_else(|| self.missing("rs1"))
    }

    pub fn rs2(&self) -> Result<usize, HartError> {
        self.decoded
            .rs2
            .map(usize::from)
            .ok_or_else(|| self.missing("rs2"))
    }

    pub fn imm(&self) -> Result<i64, HartError> {
        self.decoded.imm.ok_or_else(|| self.missing("imm"))
    }

    pub fn csr(&self) -> Result<u16, HartError> {
        self.decoded.csr.ok_or_else(|| self.missing("csr"))
    }
}

/// Chain template of one mnemonic.
#[derive(Debug, Clone)]
pub struct InstHandler {
    pub chain: MicroOpChain,
    /// Data access stream whose translate ops get spliced after `ComputeAddress`.
    pub access: Option<AccessKind>,
}

/// A group of mnemonics sharing an implementation module.
pub trait InstFamily {
    fn name(&self) -> &'static str;

    fn register(&self, xlen: Xlen, handlers: &mut InstHandlers);
}

/// Mnemonic -> chain template map for one XLEN.
#[derive(Debug, Clone)]
pub struct InstHandlers {
    xlen: Xlen,
    handlers: HashMap<&'static str, InstHandler>,
    unimplemented: InstHandler,
}

pub(crate) fn unimplemented_op(hart: &mut Hart) -> Result<Flow, HartError> {
    let inst = hart.current_inst_mut()?;
    inst.unimplemented = true;
    log::warn!("unimplemented instruction {} ({:#010x})", inst.decoded, inst.decoded.opcode);
    Ok(Flow::Continue)
}

pub const UNIMPLEMENTED: MicroOp = MicroOp::tagged("unimplemented", Tag::Execute, unimplemented_op);

impl InstHandlers {
    pub fn new(xlen: Xlen) -> Self {
        Self {
            xlen,
            handlers: HashMap::new(),
            unimplemented: InstHandler {
                chain: MicroOpChain::with_ops("unimplemented", &[UNIMPLEMENTED]),
                access: None,
            },
        }
    }

    /// Handlers of every built-in family.
    pub fn with_default_families(xlen: Xlen) -> Self {
        let mut handlers = Self::new(xlen);
        let families: [&dyn InstFamily; 3] = [&RvI, &Zicsr, &RvFd];
        for family in families {
            handlers.add_family(family);
        }
        handlers
    }

    pub fn xlen(&self) -> Xlen {
        self.xlen
    }

    pub fn add_family(&mut self, family: &dyn InstFamily) {
        let before = self.handlers.len();
        family.register(self.xlen, self);
        log::debug!(
            "registered {} {} handlers for {}",
            self.handlers.len() - before,
            family.name(),
            self.xlen
        );
    }

    pub fn register(&mut self, mnemonic: &'static str, ops: &[MicroOp]) {
        self.insert(mnemonic, ops, None);
    }

    /// Register a memory instruction; `ops` must contain a `ComputeAddress` op.
    pub fn register_memory(&mut self, mnemonic: &'static str, ops: &[MicroOp], access: AccessKind) {
        self.insert(mnemonic, ops, Some(access));
    }

    fn insert(&mut self, mnemonic: &'static str, ops: &[MicroOp], access: Option<AccessKind>) {
        let chain = MicroOpChain::with_ops(mnemonic, ops);
        self.handlers
            .insert(mnemonic, InstHandler { chain, access });
    }

    pub fn contains(&self, mnemonic: &str) -> bool {
        self.handlers.contains_key(mnemonic)
    }

    /// Template for `mnemonic`, or the unimplemented marker chain.
    pub fn get(&self, mnemonic: &str) -> &InstHandler {
        self.handlers.get(mnemonic).unwrap_or(&self.unimplemented)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
