#![cfg_attr(debug_assertions, allow(dead_code))]

pub mod config;
pub mod isa;
pub mod load;
pub mod mem;
pub mod ram;
pub mod sim;
pub mod utils;

pub use config::{CsrInitValue, HartConfig, ram_config};
pub use isa::riscv::{Hart, HartError};
pub use mem::{MemError, PhysicalMemory};
pub use ram::Ram;
pub use sim::{SimReport, Simulation};
