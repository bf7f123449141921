//! Co-simulation hook.
//!
//! An external reference model is consulted when a trap is taken. The hart only
//! forwards the raw result code to its observers.

use std::fmt;

use crate::isa::riscv::hart::Hart;

/// Reference model the hart synchronises with.
pub trait CoSimOracle {
    fn sync(&mut self, hart: &Hart) -> CoSimResult;
}

/// Raw one-byte result code of a co-simulation sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoSimResult(pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoSimStatus {
    Success,
    /// Both models took an exception; the low nibble is the cause.
    Exception(u8),
    PcMismatch,
    RegisterMismatch,
    Unimplemented,
    Unknown,
}

impl CoSimResult {
    pub const SUCCESS: CoSimResult = CoSimResult(0x00);

    pub fn status(self) -> CoSimStatus {
        match self.0 {
            0x00 => CoSimStatus::Success,
            0x10..=0x1f => CoSimStatus::Exception(self.0 & 0xf),
            0x20..=0x2f => CoSimStatus::PcMismatch,
            0x30..=0x3f => CoSimStatus::RegisterMismatch,
            0x40..=0x4f => CoSimStatus::Unimplemented,
            _ => CoSimStatus::Unknown,
        }
    }

    pub fn is_success(self) -> bool {
        self.status() == CoSimStatus::Success
    }
}

impl fmt::Display for CoSimResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x} ({:?})", self.0, self.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(CoSimResult(0x00).status(), CoSimStatus::Success);
        assert_eq!(CoSimResult(0x12).status(), CoSimStatus::Exception(2));
        assert_eq!(CoSimResult(0x1f).status(), CoSimStatus::Exception(0xf));
        assert_eq!(CoSimResult(0x21).status(), CoSimStatus::PcMismatch);
        assert_eq!(CoSimResult(0x3a).status(), CoSimStatus::RegisterMismatch);
        assert_eq!(CoSimResult(0x40).status(), CoSimStatus::Unimplemented);
        for code in [0x01, 0x0f, 0x50, 0xff] {
            assert_eq!(CoSimResult(code).status(), CoSimStatus::Unknown);
        }
        assert!(CoSimResult::SUCCESS.is_success());
        assert_eq!(CoSimResult(0x21).to_string(), "0x21 (PcMismatch)");
    }
}
