use std::{
    fmt,
    time::{Duration, Instant},
};

use crate::isa::riscv::{Hart, HartError};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SimStatus {
    Running,
    Halt,
}

/// Summary of a finished [`Simulation::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimReport {
    pub inst_count: u64,
    pub elapsed: Duration,
    /// `(hart_id, exit_code)` per hart, in insertion order.
    pub exit_codes: Vec<(u64, u64)>,
}

impl SimReport {
    pub fn mips(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.inst_count as f64 / secs / 1e6
    }
}

impl fmt::Display for SimReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} instructions in {:.3}s ({:.2} MIPS)",
            self.inst_count,
            self.elapsed.as_secs_f64(),
            self.mips()
        )
    }
}

/// Independent harts stepped round-robin, one instruction each per round.
#[derive(Default)]
pub struct Simulation {
    harts: Vec<Hart>,
    /// Per-hart cap on retired instructions.
    ilimit: Option<u64>,
    booted: bool,
}

impl Simulation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ilimit(mut self, limit: u64) -> Self {
        self.ilimit = Some(limit);
        self
    }

    pub fn add_hart(&mut self, hart: Hart) {
        self.harts.push(hart);
    }

    pub fn harts(&self) -> &[Hart] {
        &self.harts
    }

    pub fn harts_mut(&mut self) -> &mut [Hart] {
        &mut self.harts
    }

    fn hart_done(&self, hart: &Hart) -> bool {
        hart.is_stopped() || self.ilimit.is_some_and(|limit| hart.inst_count() >= limit)
    }

    pub fn status(&self) -> SimStatus {
        if self.harts.iter().all(|hart| self.hart_done(hart)) {
            SimStatus::Halt
        } else {
            SimStatus::Running
        }
    }

    pub fn boot(&mut self) -> Result<(), HartError> {
        if self.booted {
            return Ok(());
        }
        for hart in self.harts.iter_mut() {
            hart.boot()?;
        }
        self.booted = true;
        Ok(())
    }

    /// One round: every hart that is still running executes one step.
    pub fn step(&mut self) -> Result<(), HartError> {
        let ilimit = self.ilimit;
        for hart in self.harts.iter_mut() {
            let limited = ilimit.is_some_and(|limit| hart.inst_count() >= limit);
            if !hart.is_stopped() && !limited {
                hart.step()?;
            }
        }
        Ok(())
    }

    /// Boot, run until every hart stopped or hit the limit, then clean up.
    pub fn run(&mut self) -> Result<SimReport, HartError> {
        self.boot()?;
        let now = Instant::now();
        while self.status() != SimStatus::Halt {
            self.step()?;
        }
        let elapsed = now.elapsed();

        for hart in self.harts.iter_mut() {
            hart.cleanup();
        }
        let report = SimReport {
            inst_count: self.harts.iter().map(Hart::inst_count).sum(),
            elapsed,
            exit_codes: self
                .harts
                .iter()
                .map(|hart| (hart.hart_id(), hart.exit_code()))
                .collect(),
        };
        log::info!("simulation finished: {report}");
        Ok(report)
    }
}
