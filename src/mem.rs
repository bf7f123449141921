use std::{cell::RefCell, rc::Rc};

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MemError {
    #[error("physical address {addr:#x} (+{size}) is not backed by memory")]
    OutOfRange { addr: u64, size: usize },
}

/// Physical memory as seen by a hart.
///
/// A failed access is a configuration problem, never guest-visible: the hart turns
/// it into a fatal [`crate::isa::riscv::error::HartError`].
pub trait PhysicalMemory {
    fn try_read(&mut self, paddr: u64, buf: &mut [u8]) -> Result<(), MemError>;

    fn try_write(&mut self, paddr: u64, data: &[u8]) -> Result<(), MemError>;
}

/// Shared backing store for several independent harts.
impl<T: PhysicalMemory + ?Sized> PhysicalMemory for Rc<RefCell<T>> {
    fn try_read(&mut self, paddr: u64, buf: &mut [u8]) -> Result<(), MemError> {
        self.borrow_mut().try_read(paddr, buf)
    }

    fn try_write(&mut self, paddr: u64, data: &[u8]) -> Result<(), MemError> {
        self.borrow_mut().try_write(paddr, data)
    }
}
