//! Simulation observers.
//!
//! Hook ops are spliced into the pipeline when the first observer is added, so
//! a hart without observers pays nothing for them.

use crate::isa::riscv::{cosim::CoSimResult, hart::Hart, micro_op::ChainId};

/// Callbacks from the pipeline. The `pre_*`/`post_*` hooks may redirect the
/// pipeline by returning a chain; the first observer that does wins.
pub trait Observer {
    fn name(&self) -> &'static str;

    /// Before the execute op of every instruction.
    fn pre_execute(&mut self, _hart: &Hart) -> Option<ChainId> {
        None
    }

    /// After the instruction retired (`pc` already advanced).
    fn post_execute(&mut self, _hart: &Hart) -> Option<ChainId> {
        None
    }

    /// Before a trap is dispatched.
    fn pre_exception(&mut self, _hart: &Hart) -> Option<ChainId> {
        None
    }

    fn on_cosim_result(&mut self, _hart: &Hart, _result: CoSimResult) {}

    fn stop_sim(&mut self, _hart: &Hart) {}

    fn post_init(&mut self, _hart: &Hart) {}

    fn on_simulation_finished(&mut self, _hart: &Hart) {}
}

/// Instruction trace through `log` at info level, target `inst`.
#[derive(Debug, Default)]
pub struct InstructionLogger {
    regs_before: [u64; 32],
}

impl InstructionLogger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Observer for InstructionLogger {
    fn name(&self) -> &'static str {
        "instruction_logger"
    }

    fn pre_execute(&mut self, hart: &Hart) -> Option<ChainId> {
        self.regs_before = hart.int_regs();
        if let Some(inst) = hart.current_inst_opt() {
            log::info!(
                target: "inst",
                "hart{} {:?} {:#010x}: {} ({:#010x})",
                hart.hart_id(),
                hart.priv_mode(),
                hart.pc(),
                inst.decoded,
                inst.opcode()
            );
        }
        None
    }

    fn post_execute(&mut self, hart: &Hart) -> Option<ChainId> {
        let after = hart.int_regs();
        for (index, (before, after)) in self.regs_before.iter().zip(after).enumerate() {
            if *before != after {
                log::info!(target: "inst", "    x{index}: {before:#x} -> {after:#x}");
            }
        }
        None
    }

    fn pre_exception(&mut self, hart: &Hart) -> Option<ChainId> {
        if let Ok(cause) = hart.exception_unit().pending() {
            log::info!(
                target: "inst",
                "hart{} trap {:?} at {:#x}",
                hart.hart_id(),
                cause,
                hart.pc()
            );
        }
        None
    }

    fn on_cosim_result(&mut self, hart: &Hart, result: CoSimResult) {
        if !result.is_success() {
            log::warn!(target: "inst", "hart{} co-sim result {}", hart.hart_id(), result);
        }
    }

    fn stop_sim(&mut self, hart: &Hart) {
        log::info!(target: "inst", "hart{} stopped at {:#x}", hart.hart_id(), hart.pc());
    }
}

/// Stops the hart once `limit` instructions have retired.
#[derive(Debug)]
pub struct InstructionLimit {
    limit: u64,
    hit: bool,
}

impl InstructionLimit {
    pub fn new(limit: u64) -> Self {
        Self { limit, hit: false }
    }

    pub fn is_hit(&self) -> bool {
        self.hit
    }
}

impl Observer for InstructionLimit {
    fn name(&self) -> &'static str {
        "instruction_limit"
    }

    fn post_execute(&mut self, hart: &Hart) -> Option<ChainId> {
        if hart.inst_count() >= self.limit {
            if !self.hit {
                log::info!("hart{} reached the instruction limit {}", hart.hart_id(), self.limit);
            }
            self.hit = true;
            return Some(ChainId::STOP);
        }
        None
    }
}
