use crate::{
    config::arch_config::Xlen,
    isa::riscv::inst_handlers::{InstFamily, InstHandlers, UNIMPLEMENTED},
};

/// Floating-point classification. No floating-point semantics are modelled;
/// the mnemonics decode and are flagged as unimplemented when executed.
pub struct RvFd;

impl InstFamily for RvFd {
    fn name(&self) -> &'static str {
        "rv_fd"
    }

    fn register(&self, _xlen: Xlen, handlers: &mut InstHandlers) {
        for mnemonic in ["fclass.s", "fclass.d"] {
            handlers.register(mnemonic, &[UNIMPLEMENTED]);
        }
    }
}
