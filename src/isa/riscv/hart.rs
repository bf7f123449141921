//! The hart: architectural state plus the micro-op pipeline that drives it.

use std::collections::HashMap;

use crate::{
    config::{
        CsrInitValue, HartConfig,
        arch_config::{INT_REG_CNT, Xlen},
    },
    isa::riscv::{
        cosim::{CoSimOracle, CoSimResult},
        csr_reg::{CsrRegFile, PrivMode, csr_index, csr_table::Field},
        decoder::{Decoder, MaskDecoder},
        error::HartError,
        extension::{Extensions, parse_isa},
        inst_handlers::{InstFamily, InstHandlers, Instruction},
        micro_op::{ChainArena, ChainId, Flow, MicroOp, MicroOpChain, Tag},
        observer::Observer,
        reg_file::{FpRegFile, IntRegFile, RegFileKind, RegId, VecRegFile, find_register},
        translate::{
            self, AccessKind, MmuMode, MmuState, TranslationResult, TranslationState, WalkOutcome,
            change_mmu_mode, page_table::PAGE_SIZE, translate_op,
        },
        trap::{ExceptionUnit, FaultCause, InterruptCause, TrapCause, dispatcher, pending_interrupt},
    },
    mem::PhysicalMemory,
    utils::concat_le_bytes,
};

type ObserverHook = fn(&mut Box<dyn Observer>, &Hart) -> Option<ChainId>;

pub struct Hart {
    hart_id: u64,
    xlen: Xlen,
    /// Extensions of the ISA string plus U and S.
    supported: Extensions,
    /// Currently enabled extensions (decoder context).
    extensions: Extensions,
    pc_alignment: u64,
    stop_on_wfi: bool,
    csr_values: Vec<CsrInitValue>,

    pc: u64,
    next_pc: u64,
    prev_pc: u64,
    priv_mode: PrivMode,
    next_priv_mode: PrivMode,
    inst_count: u64,
    exit_code: u64,
    stopped: bool,
    booted: bool,

    int_regs: IntRegFile,
    fp_regs: FpRegFile,
    vec_regs: VecRegFile,
    csrs: CsrRegFile,
    memory: Box<dyn PhysicalMemory>,

    chains: ChainArena,
    handlers: InstHandlers,
    /// Per-mnemonic chains with translate and observer ops already spliced in.
    bound_chains: HashMap<&'static str, MicroOpChain>,
    decoder: Box<dyn Decoder>,

    fetch_translation: TranslationState,
    fetched_opcode: Option<u32>,
    current_inst: Option<Instruction>,
    exception_unit: ExceptionUnit,
    mmu: MmuState,

    observers: Vec<Box<dyn Observer>>,
    cosim: Option<Box<dyn CoSimOracle>>,
}

// =============================================
//                  Pipeline ops
// =============================================

fn check_interrupts(hart: &mut Hart) -> Result<Flow, HartError> {
    let Some(cause) = pending_interrupt(&hart.csrs, hart.priv_mode)? else {
        return Ok(Flow::Continue);
    };
    log::trace!("interrupt {:?} pending at {:#x}", cause, hart.pc);
    hart.current_inst = None;
    hart.fetched_opcode = None;
    hart.next_priv_mode = hart.priv_mode;
    hart.exception_unit.raise_interrupt(cause);
    Ok(Flow::Redirect(ChainId::EXCEPTION))
}

fn fetch(hart: &mut Hart) -> Result<Flow, HartError> {
    hart.current_inst = None;
    hart.fetched_opcode = None;
    hart.next_priv_mode = hart.priv_mode;
    let pc = hart.pc;
    if pc % hart.pc_alignment != 0 {
        return Ok(hart.raise_fault_at(FaultCause::InstAddrMisaligned, pc));
    }
    hart.fetch_translation.make_request(pc, 4)?;
    Ok(Flow::Continue)
}

fn decode(hart: &mut Hart) -> Result<Flow, HartError> {
    let paddr = hart.fetch_translation.pop_result()?.paddr;
    let low = hart.read_memory(paddr, 2)? as u32;
    let opcode = if low & 0b11 == 0b11 {
        let upper = hart.xlen.mask() & hart.pc.wrapping_add(2);
        // the upper half of a page-crossing instruction needs its own translation
        let upper_paddr = if upper & (PAGE_SIZE - 1) == 0 {
            match translate::probe(hart, AccessKind::Fetch, upper)? {
                WalkOutcome::Resolved(upper_paddr) => upper_paddr,
                WalkOutcome::Fault(cause) => return Ok(hart.raise_fault_at(cause, upper)),
            }
        } else {
            paddr + 2
        };
        low | (hart.read_memory(upper_paddr, 2)? as u32) << 16
    } else {
        low
    };
    hart.fetched_opcode = Some(opcode);

    let Some(decoded) = hart.decoder.decode(opcode) else {
        log::debug!("illegal instruction {:#010x} at {:#x}", opcode, hart.pc);
        return Ok(hart.raise_fault(FaultCause::IllegalInstruction));
    };
    log::trace!("{:#x}: {}", hart.pc, decoded);

    hart.next_pc = hart.xlen.mask() & hart.pc.wrapping_add(decoded.len as u64);
    let chain = hart.bind_chain(decoded.mnemonic)?;
    hart.chains.install(ChainId::INSTRUCTION, chain);
    hart.current_inst = Some(Instruction::new(decoded));
    Ok(Flow::Redirect(ChainId::INSTRUCTION))
}

fn increment_pc(hart: &mut Hart) -> Result<Flow, HartError> {
    hart.prev_pc = hart.pc;
    hart.inst_count += 1;
    hart.commit_pc_and_priv()?;
    Ok(Flow::Continue)
}

fn stop_sim(hart: &mut Hart) -> Result<Flow, HartError> {
    log::debug!(
        "hart{} stopped at {:#x} after {} instructions",
        hart.hart_id,
        hart.pc,
        hart.inst_count
    );
    hart.stopped = true;
    hart.notify(|observer, hart| observer.stop_sim(hart));
    Ok(Flow::Continue)
}

fn run_hook(hart: &mut Hart, hook: ObserverHook) -> Result<Flow, HartError> {
    let mut observers = std::mem::take(&mut hart.observers);
    let mut redirect = None;
    for observer in observers.iter_mut() {
        if let Some(chain) = hook(observer, hart) {
            redirect.get_or_insert(chain);
        }
    }
    hart.observers = observers;
    Ok(redirect.map_or(Flow::Continue, Flow::Redirect))
}

fn pre_execute(hart: &mut Hart) -> Result<Flow, HartError> {
    run_hook(hart, |observer, hart| observer.pre_execute(hart))
}

fn post_execute(hart: &mut Hart) -> Result<Flow, HartError> {
    run_hook(hart, |observer, hart| observer.post_execute(hart))
}

fn pre_exception(hart: &mut Hart) -> Result<Flow, HartError> {
    run_hook(hart, |observer, hart| observer.pre_exception(hart))
}

const CHECK_INTERRUPTS: MicroOp =
    MicroOp::tagged("check_interrupts", Tag::CheckInterrupts, check_interrupts);
const FETCH: MicroOp = MicroOp::tagged("fetch", Tag::Fetch, fetch);
const DECODE: MicroOp = MicroOp::tagged("decode", Tag::Decode, decode);
const HANDLE_EXCEPTION: MicroOp = MicroOp::tagged(
    "handle_exception",
    Tag::Exception,
    dispatcher::handle_exception,
);
const INCREMENT_PC: MicroOp = MicroOp::tagged("increment_pc", Tag::IncrementPc, increment_pc);
const STOP_SIM: MicroOp = MicroOp::tagged("stop_sim", Tag::StopSim, stop_sim);
const PRE_EXECUTE: MicroOp = MicroOp::tagged("pre_execute", Tag::PreExecute, pre_execute);
const POST_EXECUTE: MicroOp = MicroOp::tagged("post_execute", Tag::PostExecute, post_execute);
const PRE_EXCEPTION: MicroOp = MicroOp::tagged("pre_exception", Tag::PreException, pre_exception);

fn build_chains(xlen: Xlen) -> Result<ChainArena, HartError> {
    let mut chains = ChainArena::new();
    let mut install = |id: ChainId, ops: &[MicroOp], next: Option<ChainId>| {
        let mut chain = MicroOpChain::with_ops(chains.get(id).name(), ops);
        chain.set_next(next);
        chains.install(id, chain);
    };

    let bare = |kind| translate_op(xlen, MmuMode::Baremetal, kind);
    install(ChainId::FETCH, &[CHECK_INTERRUPTS, FETCH], Some(ChainId::INST_TRANSLATE));
    install(ChainId::INST_TRANSLATE, &[bare(AccessKind::Fetch)?], Some(ChainId::DECODE));
    install(ChainId::DECODE, &[DECODE], None);
    install(ChainId::INSTRUCTION, &[], Some(ChainId::FINISH));
    install(ChainId::LOAD_TRANSLATE, &[bare(AccessKind::Load)?], None);
    install(ChainId::STORE_TRANSLATE, &[bare(AccessKind::Store)?], None);
    install(ChainId::EXCEPTION, &[HANDLE_EXCEPTION], Some(ChainId::FINISH));
    install(ChainId::FINISH, &[INCREMENT_PC], Some(ChainId::FETCH));
    install(ChainId::STOP, &[STOP_SIM], None);
    Ok(chains)
}

impl Hart {
    pub fn new(config: HartConfig, memory: Box<dyn PhysicalMemory>) -> Result<Self, HartError> {
        let (xlen, isa) = parse_isa(&config.isa)?;
        let supported = isa | Extensions::U | Extensions::S;
        let mut decoder = MaskDecoder::new(xlen);
        decoder.change_context(supported);

        Ok(Self {
            hart_id: config.hart_id,
            xlen,
            supported,
            extensions: supported,
            pc_alignment: if supported.contains(Extensions::C) { 2 } else { 4 },
            stop_on_wfi: config.stop_on_wfi,
            csr_values: config.csr_values,

            pc: config.reset_pc,
            next_pc: config.reset_pc,
            prev_pc: config.reset_pc,
            priv_mode: PrivMode::Machine,
            next_priv_mode: PrivMode::Machine,
            inst_count: 0,
            exit_code: 0,
            stopped: false,
            booted: false,

            int_regs: IntRegFile::new(xlen),
            fp_regs: FpRegFile::new(),
            vec_regs: VecRegFile::new(),
            csrs: CsrRegFile::new(xlen),
            memory,

            chains: build_chains(xlen)?,
            handlers: InstHandlers::with_default_families(xlen),
            bound_chains: HashMap::new(),
            decoder: Box::new(decoder),

            fetch_translation: TranslationState::new(),
            fetched_opcode: None,
            current_inst: None,
            exception_unit: ExceptionUnit::default(),
            mmu: MmuState::default(),

            observers: Vec::new(),
            cosim: None,
        })
    }

    /// One-time architectural reset.
    pub fn boot(&mut self) -> Result<(), HartError> {
        let xlen = self.xlen;
        self.csrs.poke(csr_index::mhartid, self.hart_id)?;
        self.csrs
            .poke_field(csr_index::misa, Field::Mxl, xlen.mxl())?;
        self.csrs
            .poke_field(csr_index::misa, Field::Extensions, self.supported.misa_bits())?;
        if xlen == Xlen::Rv64 {
            self.csrs
                .poke_field(csr_index::mstatus, Field::Uxl, xlen.mxl())?;
            self.csrs
                .poke_field(csr_index::mstatus, Field::Sxl, xlen.mxl())?;
        }

        let values = std::mem::take(&mut self.csr_values);
        let applied = self.apply_csr_values(&values);
        self.csr_values = values;
        applied?;

        self.change_extension_context()?;
        change_mmu_mode(self)?;
        self.booted = true;
        self.notify(|observer, hart| observer.post_init(hart));

        log::info!(
            "hart{} booted: {} {}, pc {:#x}",
            self.hart_id,
            self.xlen,
            self.extensions,
            self.pc
        );
        for addr in self.csrs.addresses() {
            if let (Some(name), Ok(value)) = (self.csrs.name(addr), self.csrs.peek(addr)) {
                log::info!("    {name:<10} ({addr:#05x}) = {value:#x}");
            }
        }
        Ok(())
    }

    /// Final observer notification.
    pub fn cleanup(&mut self) {
        log::info!("hart{} retired {} instructions", self.hart_id, self.inst_count);
        self.notify(|observer, hart| observer.on_simulation_finished(hart));
    }

    /// Run one instruction (or one trap) through the pipeline.
    pub fn step(&mut self) -> Result<(), HartError> {
        self.run_from(ChainId::FETCH)
    }

    /// Step until the hart stops.
    pub fn run(&mut self) -> Result<(), HartError> {
        while !self.stopped {
            self.step()?;
        }
        Ok(())
    }

    /// Follow the chain graph from `start` until control comes back to fetch
    /// or a chain ends without successor.
    fn run_from(&mut self, start: ChainId) -> Result<(), HartError> {
        let mut id = start;
        loop {
            let chain = self.chains.get(id).clone();
            let mut next = chain.next();
            for op in chain.ops() {
                if let Flow::Redirect(target) = op.call(self)? {
                    log::trace!(
                        "{}: {} -> {}",
                        chain.name(),
                        op.name(),
                        self.chains.get(target).name()
                    );
                    next = Some(target);
                    break;
                }
            }
            match next {
                Some(ChainId::FETCH) | None => return Ok(()),
                Some(target) => id = target,
            }
        }
    }

    fn bind_chain(&mut self, mnemonic: &'static str) -> Result<MicroOpChain, HartError> {
        if let Some(chain) = self.bound_chains.get(mnemonic) {
            return Ok(chain.clone());
        }

        let handler = self.handlers.get(mnemonic);
        let mut chain = handler.chain.clone();
        match handler.access {
            Some(AccessKind::Load) => {
                chain.splice_after(Tag::ComputeAddress, self.chains.get(ChainId::LOAD_TRANSLATE))?
            }
            Some(AccessKind::Store) => {
                chain.splice_after(Tag::ComputeAddress, self.chains.get(ChainId::STORE_TRANSLATE))?
            }
            Some(AccessKind::Fetch) | None => {}
        }
        if !self.observers.is_empty() {
            chain.insert_before(Tag::Execute, PRE_EXECUTE)?;
        }
        chain.set_next(Some(ChainId::FINISH));

        self.bound_chains.insert(mnemonic, chain.clone());
        Ok(chain)
    }

    fn commit_pc_and_priv(&mut self) -> Result<(), HartError> {
        self.pc = self.next_pc;
        if self.priv_mode != self.next_priv_mode {
            log::debug!("privilege {:?} -> {:?}", self.priv_mode, self.next_priv_mode);
            self.priv_mode = self.next_priv_mode;
            change_mmu_mode(self)?;
        }
        Ok(())
    }

    fn notify(&mut self, event: impl Fn(&mut Box<dyn Observer>, &Hart)) {
        let mut observers = std::mem::take(&mut self.observers);
        for observer in observers.iter_mut() {
            event(observer, self);
        }
        self.observers = observers;
    }

    /// Recompute the enabled extensions from `misa` and `mstatus.fs`, then
    /// reconfigure the decoder and PC alignment.
    pub fn change_extension_context(&mut self) -> Result<(), HartError> {
        let misa = Extensions::from_misa(self.csrs.read_field(csr_index::misa, Field::Extensions)?);
        let mut inclusions = (misa & self.supported) | self.supported.non_misa();
        if self.csrs.read_field(csr_index::mstatus, Field::Fs)? == 0 {
            inclusions.remove(Extensions::F | Extensions::D);
        }

        if inclusions != self.extensions {
            log::debug!("extension context {} -> {}", self.extensions, inclusions);
        }
        self.extensions = inclusions;
        self.pc_alignment = if inclusions.contains(Extensions::C) { 2 } else { 4 };
        self.decoder.change_context(inclusions);
        Ok(())
    }

    /// Poke the initial values; names resolve like [`Hart::find_register`].
    pub fn apply_csr_values(&mut self, values: &[CsrInitValue]) -> Result<(), HartError> {
        for value in values {
            match self.find_register(&value.name) {
                Some(reg) => {
                    log::debug!("initial value {} = {:#x}", value.name, value.value);
                    self.write_reg(reg, value.value)?;
                }
                None => log::warn!("unknown register {:?} in initial values, skipped", value.name),
            }
        }
        Ok(())
    }

    // =============================================
    //                  Extension points
    // =============================================

    pub fn add_observer(&mut self, mut observer: Box<dyn Observer>) -> Result<(), HartError> {
        if self.observers.is_empty() {
            self.chains
                .get_mut(ChainId::FINISH)
                .insert_after(Tag::IncrementPc, POST_EXECUTE)?;
            self.chains
                .get_mut(ChainId::EXCEPTION)
                .insert_before(Tag::Exception, PRE_EXCEPTION)?;
            self.bound_chains.clear();
        }
        if self.booted {
            observer.post_init(self);
        }
        log::debug!("hart{} observer {} added", self.hart_id, observer.name());
        self.observers.push(observer);
        Ok(())
    }

    pub fn set_cosim_oracle(&mut self, oracle: Box<dyn CoSimOracle>) {
        self.cosim = Some(oracle);
    }

    /// Sync with the co-simulation oracle, if any, and hand the result to the observers.
    pub fn cosim_sync(&mut self) -> Result<(), HartError> {
        let Some(mut oracle) = self.cosim.take() else {
            return Ok(());
        };
        let result: CoSimResult = oracle.sync(self);
        self.cosim = Some(oracle);
        log::trace!("co-sim sync at {:#x}: {}", self.pc, result);
        self.notify(|observer, hart| observer.on_cosim_result(hart, result));
        Ok(())
    }

    pub fn set_decoder(&mut self, mut decoder: Box<dyn Decoder>) {
        decoder.change_context(self.extensions);
        self.decoder = decoder;
    }

    pub fn add_inst_family(&mut self, family: &dyn InstFamily) {
        self.handlers.add_family(family);
        self.bound_chains.clear();
    }

    pub fn handlers(&self) -> &InstHandlers {
        &self.handlers
    }

    pub fn add_chain(&mut self, chain: MicroOpChain) -> ChainId {
        self.chains.add(chain)
    }

    pub fn chains(&self) -> &ChainArena {
        &self.chains
    }

    /// Mutable chain access; drops every bound instruction chain.
    pub fn chains_mut(&mut self) -> &mut ChainArena {
        self.bound_chains.clear();
        &mut self.chains
    }

    /// Raise a trap outside of the pipeline and enter its handler immediately.
    pub fn take_trap(&mut self, cause: TrapCause) -> Result<(), HartError> {
        match cause {
            TrapCause::Fault(fault) if fault.is_fetch_fault() => {
                self.exception_unit.raise_fault_at(fault, self.pc)
            }
            TrapCause::Fault(fault) => self.exception_unit.raise_fault(fault),
            TrapCause::Interrupt(interrupt) => self.exception_unit.raise_interrupt(interrupt),
        }
        self.next_pc = self.pc;
        self.next_priv_mode = self.priv_mode;
        dispatcher::handle_exception(self)?;
        self.commit_pc_and_priv()
    }

    pub fn set_interrupt_pending(
        &mut self,
        cause: InterruptCause,
        pending: bool,
    ) -> Result<(), HartError> {
        let mip = self.csrs.read(csr_index::mip)?;
        let mip = if pending { mip | cause.bit() } else { mip & !cause.bit() };
        self.csrs.poke(csr_index::mip, mip)
    }

    // =============================================
    //                  Accessors
    // =============================================

    pub fn hart_id(&self) -> u64 {
        self.hart_id
    }

    pub fn xlen(&self) -> Xlen {
        self.xlen
    }

    pub fn supported_extensions(&self) -> Extensions {
        self.supported
    }

    pub fn extensions(&self) -> Extensions {
        self.extensions
    }

    pub fn pc_alignment(&self) -> u64 {
        self.pc_alignment
    }

    pub fn stop_on_wfi(&self) -> bool {
        self.stop_on_wfi
    }

    pub fn pc(&self) -> u64 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u64) {
        self.pc = pc & self.xlen.mask();
        self.next_pc = self.pc;
    }

    pub fn next_pc(&self) -> u64 {
        self.next_pc
    }

    pub fn set_next_pc(&mut self, pc: u64) {
        self.next_pc = pc & self.xlen.mask();
    }

    pub fn prev_pc(&self) -> u64 {
        self.prev_pc
    }

    pub fn priv_mode(&self) -> PrivMode {
        self.priv_mode
    }

    /// Switch privilege immediately and re-select the MMU modes.
    pub fn set_priv_mode(&mut self, privilege: PrivMode) -> Result<(), HartError> {
        self.priv_mode = privilege;
        self.next_priv_mode = privilege;
        change_mmu_mode(self)
    }

    pub fn next_priv_mode(&self) -> PrivMode {
        self.next_priv_mode
    }

    pub fn set_next_priv_mode(&mut self, privilege: PrivMode) {
        self.next_priv_mode = privilege;
    }

    pub fn inst_count(&self) -> u64 {
        self.inst_count
    }

    pub fn exit_code(&self) -> u64 {
        self.exit_code
    }

    pub fn set_exit_code(&mut self, code: u64) {
        self.exit_code = code;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn current_inst(&self) -> Result<&Instruction, HartError> {
        self.current_inst.as_ref().ok_or(HartError::NoCurrentInstruction)
    }

    pub fn current_inst_mut(&mut self) -> Result<&mut Instruction, HartError> {
        self.current_inst.as_mut().ok_or(HartError::NoCurrentInstruction)
    }

    pub fn current_inst_opt(&self) -> Option<&Instruction> {
        self.current_inst.as_ref()
    }

    /// Raw bits of the instruction being processed, decodable or not.
    pub fn current_opcode(&self) -> Option<u32> {
        self.fetched_opcode
    }

    pub fn exception_unit(&self) -> &ExceptionUnit {
        &self.exception_unit
    }

    pub fn exception_unit_mut(&mut self) -> &mut ExceptionUnit {
        &mut self.exception_unit
    }

    /// Record a fault and divert to the exception chain.
    pub fn raise_fault(&mut self, cause: FaultCause) -> Flow {
        self.exception_unit.raise_fault(cause);
        Flow::Redirect(ChainId::EXCEPTION)
    }

    pub fn raise_fault_at(&mut self, cause: FaultCause, addr: u64) -> Flow {
        self.exception_unit.raise_fault_at(cause, addr);
        Flow::Redirect(ChainId::EXCEPTION)
    }

    pub fn mmu(&self) -> &MmuState {
        &self.mmu
    }

    pub fn mmu_mut(&mut self) -> &mut MmuState {
        &mut self.mmu
    }

    /// The fetch stream, or the data stream of the instruction in flight.
    pub fn translation_state(&self, kind: AccessKind) -> Result<&TranslationState, HartError> {
        match kind {
            AccessKind::Fetch => Ok(&self.fetch_translation),
            AccessKind::Load | AccessKind::Store => Ok(&self.current_inst()?.translation),
        }
    }

    pub fn translation_state_mut(
        &mut self,
        kind: AccessKind,
    ) -> Result<&mut TranslationState, HartError> {
        match kind {
            AccessKind::Fetch => Ok(&mut self.fetch_translation),
            AccessKind::Load | AccessKind::Store => Ok(&mut self.current_inst_mut()?.translation),
        }
    }

    /// Translate one access with the current MMU configuration, outside the
    /// pipeline. Page faults come back as the inner `Err`.
    pub fn translate(
        &mut self,
        kind: AccessKind,
        vaddr: u64,
        size: usize,
    ) -> Result<Result<TranslationResult, FaultCause>, HartError> {
        Ok(match translate::probe(self, kind, vaddr)? {
            WalkOutcome::Resolved(paddr) => Ok(TranslationResult { paddr, size }),
            WalkOutcome::Fault(cause) => Err(cause),
        })
    }

    // =============================================
    //                  Registers
    // =============================================

    pub fn read_int(&self, index: usize) -> Result<u64, HartError> {
        self.int_regs.read(index)
    }

    pub fn write_int(&mut self, index: usize, value: u64) -> Result<(), HartError> {
        self.int_regs.write(index, value)
    }

    /// Snapshot of `x0..x31`.
    pub fn int_regs(&self) -> [u64; INT_REG_CNT] {
        std::array::from_fn(|i| self.int_regs.read(i).unwrap_or_default())
    }

    pub fn read_fp(&self, index: usize) -> Result<u64, HartError> {
        self.fp_regs.read(index)
    }

    pub fn write_fp(&mut self, index: usize, value: u64) -> Result<(), HartError> {
        self.fp_regs.write(index, value)
    }

    pub fn vec_regs(&self) -> &VecRegFile {
        &self.vec_regs
    }

    pub fn vec_regs_mut(&mut self) -> &mut VecRegFile {
        &mut self.vec_regs
    }

    pub fn csrs(&self) -> &CsrRegFile {
        &self.csrs
    }

    pub fn csrs_mut(&mut self) -> &mut CsrRegFile {
        &mut self.csrs
    }

    pub fn find_register(&self, name: &str) -> Option<RegId> {
        find_register(name, &self.csrs)
    }

    /// Vector registers are accessed through their low 64 bits; CSRs through
    /// the poke path.
    pub fn read_reg(&self, reg: RegId) -> Result<u64, HartError> {
        let index = reg.index as usize;
        match reg.file {
            RegFileKind::Int => self.read_int(index),
            RegFileKind::Fp => self.read_fp(index),
            RegFileKind::Vec => self.vec_regs.read_elem(index, 0, 8),
            RegFileKind::Csr => self.csrs.peek(reg.index),
        }
    }

    pub fn write_reg(&mut self, reg: RegId, value: u64) -> Result<(), HartError> {
        let index = reg.index as usize;
        match reg.file {
            RegFileKind::Int => self.write_int(index, value),
            RegFileKind::Fp => self.write_fp(index, value),
            RegFileKind::Vec => self.vec_regs.write_elem(index, 0, 8, value),
            RegFileKind::Csr => self.csrs.poke(reg.index, value),
        }
    }

    pub fn peek_csr(&self, addr: u16) -> Result<u64, HartError> {
        self.csrs.peek(addr)
    }

    pub fn poke_csr(&mut self, addr: u16, value: u64) -> Result<(), HartError> {
        self.csrs.poke(addr, value)
    }

    pub fn peek_csr_field(&self, addr: u16, field: Field) -> Result<u64, HartError> {
        self.csrs.read_field(addr, field)
    }

    pub fn poke_csr_field(&mut self, addr: u16, field: Field, value: u64) -> Result<(), HartError> {
        self.csrs.poke_field(addr, field, value)
    }

    /// The user and machine cycle/instret counters mirror the retired instruction count.
    pub fn sync_counters(&mut self) -> Result<(), HartError> {
        for counter in [
            csr_index::cycle,
            csr_index::instret,
            csr_index::mcycle,
            csr_index::minstret,
        ] {
            self.csrs.poke(counter, self.inst_count)?;
        }
        Ok(())
    }

    // =============================================
    //                  Memory
    // =============================================

    /// Little-endian physical read of `size` bytes (at most 8).
    pub fn read_memory(&mut self, paddr: u64, size: usize) -> Result<u64, HartError> {
        let mut buf = [0u8; 8];
        self.memory
            .try_read(paddr, &mut buf[..size])
            .map_err(HartError::MemoryRead)?;
        Ok(concat_le_bytes(&buf[..size]))
    }

    pub fn write_memory(&mut self, paddr: u64, size: usize, value: u64) -> Result<(), HartError> {
        self.memory
            .try_write(paddr, &value.to_le_bytes()[..size])
            .map_err(HartError::MemoryWrite)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        config::ram_config::BASE_ADDR,
        isa::riscv::{cosim::CoSimStatus, observer::InstructionLimit},
        ram::Ram,
    };

    const HANDLER: u64 = BASE_ADDR + 0x800;

    fn hart_with(isa: &str, program: &[u32]) -> Hart {
        let mut ram = Ram::new(BASE_ADDR, 0x1_0000);
        ram.write_program(BASE_ADDR, program).unwrap();
        let config = HartConfig::new().with_isa(isa);
        let mut hart = Hart::new(config, Box::new(ram)).unwrap();
        hart.boot().unwrap();
        hart.poke_csr(csr_index::mtvec, HANDLER).unwrap();
        hart
    }

    #[test]
    fn test_boot_state() {
        let hart = hart_with("rv64imac_zicsr", &[]);
        assert_eq!(hart.peek_csr_field(csr_index::misa, Field::Mxl).unwrap(), 2);
        assert_eq!(
            hart.peek_csr_field(csr_index::mstatus, Field::Uxl).unwrap(),
            2
        );
        let misa = Extensions::from_misa(hart.peek_csr(csr_index::misa).unwrap());
        assert_eq!(
            misa,
            Extensions::I
                | Extensions::M
                | Extensions::A
                | Extensions::C
                | Extensions::U
                | Extensions::S
        );
        assert_eq!(hart.pc_alignment(), 2);
        assert_eq!(hart.priv_mode(), PrivMode::Machine);

        let hart = hart_with("rv32i_zicsr", &[]);
        assert_eq!(hart.peek_csr_field(csr_index::misa, Field::Mxl).unwrap(), 1);
        assert_eq!(hart.pc_alignment(), 4);
    }

    #[test]
    fn test_step_arithmetic() {
        let mut hart = hart_with(
            "rv64gc",
            &[
                0x0050_0093, // addi x1, x0, 5
                0xfff0_8113, // addi x2, x1, -1
                0x0020_81b3, // add x3, x1, x2
            ],
        );
        for _ in 0..3 {
            hart.step().unwrap();
        }
        assert_eq!(hart.read_int(3).unwrap(), 9);
        assert_eq!(hart.pc(), BASE_ADDR + 12);
        assert_eq!(hart.prev_pc(), BASE_ADDR + 8);
        assert_eq!(hart.inst_count(), 3);
    }

    #[test]
    fn test_illegal_instruction_traps() {
        let mut hart = hart_with("rv64gc", &[0xffff_ffff]);
        hart.step().unwrap();
        assert_eq!(hart.pc(), HANDLER);
        assert_eq!(hart.peek_csr(csr_index::mcause).unwrap(), 2);
        assert_eq!(hart.peek_csr(csr_index::mtval).unwrap(), 0xffff_ffff);
        assert_eq!(hart.peek_csr(csr_index::mepc).unwrap(), BASE_ADDR);
    }

    #[test]
    fn test_misaligned_fetch() {
        let mut hart = hart_with("rv32i_zicsr", &[]);
        hart.set_pc(BASE_ADDR + 2);
        hart.step().unwrap();
        assert_eq!(hart.pc(), HANDLER);
        assert_eq!(hart.peek_csr(csr_index::mcause).unwrap(), 0);
        assert_eq!(hart.peek_csr(csr_index::mtval).unwrap(), BASE_ADDR + 2);
    }

    #[test]
    fn test_wfi_stops() {
        let mut hart = hart_with("rv64gc", &[0x0050_0093, 0x1050_0073]);
        hart.run().unwrap();
        assert!(hart.is_stopped());
        assert_eq!(hart.inst_count(), 1);
        assert_eq!(hart.pc(), BASE_ADDR + 4);
    }

    #[test]
    fn test_pending_interrupt_is_taken_before_fetch() {
        let mut hart = hart_with("rv64gc", &[0x0050_0093]);
        hart.poke_csr_field(csr_index::mstatus, Field::Mie, 1)
            .unwrap();
        hart.poke_csr(csr_index::mie, InterruptCause::MachineTimer.bit())
            .unwrap();
        hart.set_interrupt_pending(InterruptCause::MachineTimer, true)
            .unwrap();
        hart.step().unwrap();
        assert_eq!(hart.pc(), HANDLER);
        assert_eq!(hart.peek_csr(csr_index::mcause).unwrap(), (1 << 63) | 7);
        assert_eq!(hart.read_int(1).unwrap(), 0);
    }

    #[test]
    fn test_bound_chains() {
        let mut hart = hart_with("rv64gc", &[]);
        let chain = hart.bind_chain("lw").unwrap();
        let names: Vec<_> = chain.ops().iter().map(|op| op.name()).collect();
        assert_eq!(names, ["compute_address", "translate_Bare_load", "lw"]);
        assert_eq!(chain.next(), Some(ChainId::FINISH));
        assert!(hart.bound_chains.contains_key("lw"));

        hart.add_observer(Box::new(InstructionLimit::new(10)))
            .unwrap();
        assert!(hart.bound_chains.is_empty());
        let chain = hart.bind_chain("add").unwrap();
        let names: Vec<_> = chain.ops().iter().map(|op| op.name()).collect();
        assert_eq!(names, ["pre_execute", "add"]);
        assert!(hart.chains().get(ChainId::FINISH).contains(Tag::PostExecute));
        assert!(hart.chains().get(ChainId::EXCEPTION).contains(Tag::PreException));
    }

    #[test]
    fn test_instruction_limit_stops() {
        // jal x0, 0
        let mut hart = hart_with("rv64gc", &[0x0000_006f]);
        hart.add_observer(Box::new(InstructionLimit::new(5)))
            .unwrap();
        hart.run().unwrap();
        assert_eq!(hart.inst_count(), 5);
        assert_eq!(hart.pc(), BASE_ADDR);
    }

    #[test]
    fn test_shared_memory() {
        let ram = Rc::new(RefCell::new(Ram::new(BASE_ADDR, 0x1000)));
        let mut a = Hart::new(HartConfig::new(), Box::new(ram.clone())).unwrap();
        let mut b = Hart::new(HartConfig::new().with_hart_id(1), Box::new(ram)).unwrap();
        a.write_memory(BASE_ADDR + 8, 8, 0x1122_3344_5566_7788)
            .unwrap();
        assert_eq!(b.read_memory(BASE_ADDR + 12, 4).unwrap(), 0x1122_3344);
        assert!(matches!(
            b.read_memory(0, 4),
            Err(HartError::MemoryRead(_))
        ));
    }

    #[test]
    fn test_csr_values_and_register_names() {
        let config = HartConfig::new().with_csr_values(vec![
            CsrInitValue::new("mscratch", 0x55),
            CsrInitValue::new("sp", BASE_ADDR + 0x1000),
            CsrInitValue::new("no_such_reg", 1),
        ]);
        let mut hart = Hart::new(config, Box::new(Ram::new(BASE_ADDR, 0x100))).unwrap();
        hart.boot().unwrap();
        assert_eq!(hart.peek_csr(csr_index::mscratch).unwrap(), 0x55);
        assert_eq!(hart.read_int(2).unwrap(), BASE_ADDR + 0x1000);

        let reg = hart.find_register("f3").unwrap();
        hart.write_reg(reg, 0x4000_0000_0000_0000).unwrap();
        assert_eq!(hart.read_fp(3).unwrap(), 0x4000_0000_0000_0000);
        assert_eq!(
            hart.read_reg(RegId::csr(csr_index::mscratch)).unwrap(),
            0x55
        );
    }

    #[test]
    fn test_cosim_result_reaches_observers() {
        struct Oracle;
        impl CoSimOracle for Oracle {
            fn sync(&mut self, hart: &Hart) -> CoSimResult {
                CoSimResult(0x10 | hart.exception_unit().pending().map_or(0, |c| c.code() as u8))
            }
        }
        struct Recorder(Rc<RefCell<Vec<CoSimStatus>>>);
        impl Observer for Recorder {
            fn name(&self) -> &'static str {
                "recorder"
            }
            fn on_cosim_result(&mut self, _hart: &Hart, result: CoSimResult) {
                self.0.borrow_mut().push(result.status());
            }
        }

        // ecall
        let mut hart = hart_with("rv64gc", &[0x0000_0073]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        hart.add_observer(Box::new(Recorder(seen.clone()))).unwrap();
        hart.set_cosim_oracle(Box::new(Oracle));
        hart.step().unwrap();
        assert_eq!(*seen.borrow(), [CoSimStatus::Exception(11)]);
        assert_eq!(hart.pc(), HANDLER);
    }
}
