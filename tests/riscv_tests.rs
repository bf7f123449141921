//! Runs the [`riscv-tests`] physical-memory ISA suites. Need feature `riscv-tests`.
//! You MUST compile the tests before using this, checkout the repo.
//!
//! [`riscv-tests`]: https://github.com/riscv-software-src/riscv-tests

#![cfg(feature = "riscv-tests")]

use std::{
    cell::RefCell,
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use riscv_hart::{
    Hart, HartConfig, Ram,
    load::load_elf,
    ram_config::{BASE_ADDR, SIZE},
};

const TOHOST: u64 = 0x8000_1000;
const MAX_INSTRUCTIONS: u64 = 1_000_000;

fn find_tests(prefix: &str) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let isa_dir = Path::new("riscv-tests/isa");
    if let Ok(entries) = fs::read_dir(isa_dir) {
        for e in entries.flatten() {
            if e.path().is_dir() || e.path().extension().is_some() {
                continue;
            }

            if let Ok(fname) = e.file_name().into_string() {
                if fname.starts_with(prefix) {
                    paths.push(e.path());
                }
            }
        }
    }
    paths.sort();
    paths
}

#[must_use]
fn run_test(elf: &Path, isa: &str) -> bool {
    let ram = Rc::new(RefCell::new(Ram::new(BASE_ADDR, SIZE)));
    let bytes = fs::read(elf).unwrap();
    let entry = load_elf(&mut ram.borrow_mut(), &bytes).unwrap();

    let config = HartConfig::new()
        .with_isa(isa)
        .with_reset_pc(entry)
        .with_stop_on_wfi(false);
    let mut hart = Hart::new(config, Box::new(ram.clone())).unwrap();
    hart.boot().unwrap();

    while hart.inst_count() < MAX_INSTRUCTIONS {
        if let Err(e) = hart.step() {
            eprintln!("Test {:?} aborted: {}", elf, e);
            return false;
        }
        if hart.inst_count() & 0xfff == 0 || hart.is_stopped() {
            let msg = ram.borrow().read_uint(TOHOST, 8).unwrap();
            if msg != 0 {
                if msg != 1 {
                    eprintln!("Test {:?} failed at case {}", elf, msg >> 1);
                }
                return msg == 1;
            }
        }
    }
    eprintln!("Test {:?} timed out", elf);
    false
}

fn run_suite(prefix: &str, isa: &str) {
    let tests = find_tests(prefix);
    assert!(!tests.is_empty(), "No {prefix} tests found in riscv-tests/isa");

    let total = tests.len();
    let failed = tests.iter().filter(|elf| !run_test(elf, isa)).count();
    println!("Totally {failed}/{total} tests failed in {prefix}.");
    assert_eq!(failed, 0);
}

#[test]
fn run_all_rv64ui_p_tests() {
    run_suite("rv64ui-p-", "rv64gc");
}

#[test]
fn run_all_rv64um_p_tests() {
    run_suite("rv64um-p-", "rv64gc");
}

#[test]
fn run_all_rv32ui_p_tests() {
    run_suite("rv32ui-p-", "rv32imac_zicsr_zifencei");
}
