//! RISC-V hart core: registers, CSRs, translation, traps and the micro-op
//! pipeline tying them together.

pub mod cosim;
pub mod csr_reg;
pub mod decoder;
pub mod error;
pub mod extension;
pub mod hart;
pub mod inst_handlers;
pub mod micro_op;
pub mod observer;
pub mod reg_file;
pub mod translate;
pub mod trap;

pub use error::HartError;
pub use hart::Hart;
