//! Address translation: MMU mode selection and the page-table walker.
//!
//! The walker is monomorphized per `(XLEN, paging scheme, access kind)` and the
//! matching [`MicroOp`] is swapped into the translate chains whenever the
//! effective MMU mode changes, so the per-access path never branches on the mode.

pub mod page_table;
pub mod translation_state;

use std::marker::PhantomData;

use crate::{
    config::arch_config::Xlen,
    isa::riscv::{
        csr_reg::{PrivMode, csr_index, csr_table::Field},
        error::HartError,
        hart::Hart,
        micro_op::{ChainId, Flow, MicroOp, Tag},
        trap::FaultCause,
        translate::page_table::{PAGE_OFFSET_BITS, PAGE_SIZE, PTEFlags, PageTableEntry},
    },
    utils::{Word, sign_extend},
};

pub use translation_state::{TranslationRequest, TranslationResult, TranslationState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MmuMode {
    Baremetal,
    Sv32,
    Sv39,
    Sv48,
    Sv57,
    Invalid,
}

impl MmuMode {
    /// Decode `satp.mode`. RV32 only knows Bare/Sv32, RV64 only Bare/Sv39/Sv48/Sv57.
    pub fn from_satp(mode: u64, xlen: Xlen) -> MmuMode {
        match (xlen, mode) {
            (_, 0) => MmuMode::Baremetal,
            (Xlen::Rv32, 1) => MmuMode::Sv32,
            (Xlen::Rv64, 8) => MmuMode::Sv39,
            (Xlen::Rv64, 9) => MmuMode::Sv48,
            (Xlen::Rv64, 10) => MmuMode::Sv57,
            _ => MmuMode::Invalid,
        }
    }

    pub fn levels(self) -> u32 {
        match self {
            MmuMode::Baremetal | MmuMode::Invalid => 0,
            MmuMode::Sv32 => 2,
            MmuMode::Sv39 => 3,
            MmuMode::Sv48 => 4,
            MmuMode::Sv57 => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    Fetch,
    Load,
    Store,
}

impl AccessKind {
    pub fn page_fault(self) -> FaultCause {
        match self {
            AccessKind::Fetch => FaultCause::InstPageFault,
            AccessKind::Load => FaultCause::LoadPageFault,
            AccessKind::Store => FaultCause::StoreAmoPageFault,
        }
    }

    pub fn misaligned(self) -> FaultCause {
        match self {
            AccessKind::Fetch => FaultCause::InstAddrMisaligned,
            AccessKind::Load => FaultCause::LoadAddrMisaligned,
            AccessKind::Store => FaultCause::StoreAmoAddrMisaligned,
        }
    }
}

pub trait PagingScheme {
    const MODE: MmuMode;
    const LEVELS: u32;
    const VPN_BITS: u32;
    const PTE_SIZE: usize;
}

macro_rules! paging_scheme {
    ($name:ident, $mode:ident, $levels:literal, $vpn_bits:literal, $pte_size:literal) => {
        pub struct $name;

        impl PagingScheme for $name {
            const MODE: MmuMode = MmuMode::$mode;
            const LEVELS: u32 = $levels;
            const VPN_BITS: u32 = $vpn_bits;
            const PTE_SIZE: usize = $pte_size;
        }
    };
}

paging_scheme!(Bare, Baremetal, 0, 0, 0);
paging_scheme!(Sv32, Sv32, 2, 10, 4);
paging_scheme!(Sv39, Sv39, 3, 9, 8);
paging_scheme!(Sv48, Sv48, 4, 9, 8);
paging_scheme!(Sv57, Sv57, 5, 9, 8);

pub trait AccessMarker {
    const KIND: AccessKind;
}

pub struct FetchAccess;
pub struct LoadAccess;
pub struct StoreAccess;

impl AccessMarker for FetchAccess {
    const KIND: AccessKind = AccessKind::Fetch;
}
impl AccessMarker for LoadAccess {
    const KIND: AccessKind = AccessKind::Load;
}
impl AccessMarker for StoreAccess {
    const KIND: AccessKind = AccessKind::Store;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    Resolved(u64),
    Fault(FaultCause),
}

type WalkFn = fn(&mut Hart, u64) -> Result<WalkOutcome, HartError>;

/// Cached MMU configuration of a hart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmuState {
    pub inst_mode: MmuMode,
    pub ldst_mode: MmuMode,
    /// Privilege used for loads and stores (`mstatus.mpp` when `mprv` is set).
    pub ldst_priv: PrivMode,
}

impl Default for MmuState {
    fn default() -> Self {
        Self {
            inst_mode: MmuMode::Baremetal,
            ldst_mode: MmuMode::Baremetal,
            ldst_priv: PrivMode::Machine,
        }
    }
}

struct Walker<W, P, A>(PhantomData<(W, P, A)>);

impl<W: Word, P: PagingScheme, A: AccessMarker> Walker<W, P, A> {
    fn walk(hart: &mut Hart, vaddr: u64) -> Result<WalkOutcome, HartError> {
        let vaddr = W::narrow(vaddr);
        let privilege = match A::KIND {
            AccessKind::Fetch => hart.priv_mode(),
            AccessKind::Load | AccessKind::Store => hart.mmu().ldst_priv,
        };
        if P::LEVELS == 0 || privilege == PrivMode::Machine {
            return Ok(WalkOutcome::Resolved(vaddr));
        }

        let fault = WalkOutcome::Fault(A::KIND.page_fault());
        let va_bits = PAGE_OFFSET_BITS + P::LEVELS * P::VPN_BITS;
        if W::BITS == 64 && sign_extend(vaddr, va_bits) != vaddr {
            return Ok(fault);
        }

        let csrs = hart.csrs();
        let mxr = csrs.read_field(csr_index::mstatus, Field::Mxr)? != 0;
        let mut ppn = csrs.read_field(csr_index::satp, Field::Ppn)?;

        for level in (0..P::LEVELS).rev() {
            let vpn_shift = PAGE_OFFSET_BITS + level * P::VPN_BITS;
            let vpn = (vaddr >> vpn_shift) & ((1u64 << P::VPN_BITS) - 1);
            let pte_addr = (ppn << PAGE_OFFSET_BITS) + vpn * P::PTE_SIZE as u64;
            let mut pte = PageTableEntry::new(hart.read_memory(pte_addr, P::PTE_SIZE)?, P::MODE);

            if !pte.is_valid() {
                return Ok(fault);
            }
            if !pte.is_leaf() {
                ppn = pte.ppn();
                continue;
            }

            let permitted = match A::KIND {
                AccessKind::Fetch => pte.is_executable(),
                AccessKind::Load => pte.is_readable() || (mxr && pte.is_executable()),
                AccessKind::Store => pte.is_writable(),
            };
            let privilege_ok = match privilege {
                PrivMode::User => pte.is_user(),
                PrivMode::Supervisor => !(pte.is_user() && A::KIND == AccessKind::Fetch),
                PrivMode::Machine => true,
            };
            let low_mask = (1u64 << (level * P::VPN_BITS)) - 1;
            if !permitted || !privilege_ok || pte.ppn() & low_mask != 0 {
                return Ok(fault);
            }

            let mut update = PTEFlags::A;
            if A::KIND == AccessKind::Store {
                update |= PTEFlags::D;
            }
            if !pte.flags().contains(update) {
                pte.set_flag(update);
                hart.write_memory(pte_addr, P::PTE_SIZE, pte.bits)?;
            }

            let ppn = pte.ppn() | ((vaddr >> PAGE_OFFSET_BITS) & low_mask);
            return Ok(WalkOutcome::Resolved(
                (ppn << PAGE_OFFSET_BITS) | (vaddr & (PAGE_SIZE - 1)),
            ));
        }

        Ok(fault)
    }

    /// Drain the pending requests of the access stream, in order.
    fn translate(hart: &mut Hart) -> Result<Flow, HartError> {
        hart.translation_state(A::KIND)?.request()?;

        while let Ok(req) = hart.translation_state(A::KIND)?.request() {
            match Self::walk(hart, req.vaddr)? {
                WalkOutcome::Resolved(paddr) => {
                    hart.translation_state_mut(A::KIND)?
                        .set_result(paddr, req.size)?;
                }
                WalkOutcome::Fault(cause) => {
                    log::trace!("{:?} at {:#x} in {:?}", cause, req.vaddr, P::MODE);
                    hart.translation_state_mut(A::KIND)?.clear();
                    return Ok(hart.raise_fault_at(cause, req.vaddr));
                }
            }
        }
        Ok(Flow::Continue)
    }
}

struct TranslateVariant {
    op: MicroOp,
    walk: WalkFn,
}

macro_rules! variant {
    ($word:ty, $scheme:ident, $kind:expr) => {
        match $kind {
            AccessKind::Fetch => TranslateVariant {
                op: MicroOp::tagged(
                    concat!("translate_", stringify!($scheme), "_fetch"),
                    Tag::InstTranslate,
                    Walker::<$word, $scheme, FetchAccess>::translate,
                ),
                walk: Walker::<$word, $scheme, FetchAccess>::walk,
            },
            AccessKind::Load => TranslateVariant {
                op: MicroOp::tagged(
                    concat!("translate_", stringify!($scheme), "_load"),
                    Tag::DataTranslate,
                    Walker::<$word, $scheme, LoadAccess>::translate,
                ),
                walk: Walker::<$word, $scheme, LoadAccess>::walk,
            },
            AccessKind::Store => TranslateVariant {
                op: MicroOp::tagged(
                    concat!("translate_", stringify!($scheme), "_store"),
                    Tag::DataTranslate,
                    Walker::<$word, $scheme, StoreAccess>::translate,
                ),
                walk: Walker::<$word, $scheme, StoreAccess>::walk,
            },
        }
    };
}

fn variant(xlen: Xlen, mode: MmuMode, kind: AccessKind) -> Option<TranslateVariant> {
    Some(match (xlen, mode) {
        (Xlen::Rv32, MmuMode::Baremetal) => variant!(u32, Bare, kind),
        (Xlen::Rv32, MmuMode::Sv32) => variant!(u32, Sv32, kind),
        (Xlen::Rv64, MmuMode::Baremetal) => variant!(u64, Bare, kind),
        (Xlen::Rv64, MmuMode::Sv39) => variant!(u64, Sv39, kind),
        (Xlen::Rv64, MmuMode::Sv48) => variant!(u64, Sv48, kind),
        (Xlen::Rv64, MmuMode::Sv57) => variant!(u64, Sv57, kind),
        _ => return None,
    })
}

fn invalid_mode(xlen: Xlen, mode: MmuMode) -> HartError {
    HartError::UnsupportedMmuMode { mode, xlen }
}

/// The translate micro-op for an access stream in `mode`.
pub fn translate_op(xlen: Xlen, mode: MmuMode, kind: AccessKind) -> Result<MicroOp, HartError> {
    variant(xlen, mode, kind)
        .map(|v| v.op)
        .ok_or_else(|| invalid_mode(xlen, mode))
}

/// Run the walker of the currently selected mode for one access, outside of the
/// pipeline and without touching any translation queue.
pub(crate) fn probe(
    hart: &mut Hart,
    kind: AccessKind,
    vaddr: u64,
) -> Result<WalkOutcome, HartError> {
    let mode = match kind {
        AccessKind::Fetch => hart.mmu().inst_mode,
        AccessKind::Load | AccessKind::Store => hart.mmu().ldst_mode,
    };
    let walk = variant(hart.xlen(), mode, kind)
        .map(|v| v.walk)
        .ok_or_else(|| invalid_mode(hart.xlen(), mode))?;
    walk(hart, vaddr)
}

/// Re-derive the instruction and load/store MMU modes from `satp`, `mstatus`
/// and the current privilege, swapping the translate ops when they change.
pub(crate) fn change_mmu_mode(hart: &mut Hart) -> Result<(), HartError> {
    let xlen = hart.xlen();
    let csrs = hart.csrs();
    let satp_mode = csrs.read_field(csr_index::satp, Field::Mode)?;
    let mode = MmuMode::from_satp(satp_mode, xlen);
    if mode == MmuMode::Invalid {
        return Err(HartError::InvalidMmuMode {
            mode: satp_mode,
            xlen,
        });
    }

    let ldst_priv = if csrs.read_field(csr_index::mstatus, Field::Mprv)? != 0 {
        PrivMode::from_field(csrs.read_field(csr_index::mstatus, Field::Mpp)?)
    } else {
        hart.priv_mode()
    };
    let effective = |privilege: PrivMode| match privilege {
        PrivMode::Machine => MmuMode::Baremetal,
        _ => mode,
    };
    let next = MmuState {
        inst_mode: effective(hart.priv_mode()),
        ldst_mode: effective(ldst_priv),
        ldst_priv,
    };

    let prev = *hart.mmu();
    if next.inst_mode != prev.inst_mode {
        let op = translate_op(xlen, next.inst_mode, AccessKind::Fetch)?;
        hart.chains_mut()
            .get_mut(ChainId::INST_TRANSLATE)
            .replace(Tag::InstTranslate, op)?;
    }
    if next.ldst_mode != prev.ldst_mode {
        let load = translate_op(xlen, next.ldst_mode, AccessKind::Load)?;
        let store = translate_op(xlen, next.ldst_mode, AccessKind::Store)?;
        let chains = hart.chains_mut();
        chains
            .get_mut(ChainId::LOAD_TRANSLATE)
            .replace(Tag::DataTranslate, load)?;
        chains
            .get_mut(ChainId::STORE_TRANSLATE)
            .replace(Tag::DataTranslate, store)?;
    }
    if next != prev {
        log::debug!(
            "MMU mode: fetch {:?}, load/store {:?} ({:?})",
            next.inst_mode,
            next.ldst_mode,
            next.ldst_priv
        );
    }
    *hart.mmu_mut() = next;
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::{config::HartConfig, isa::riscv::trap::TrapCause, ram::Ram};

    const RAM_BASE: u64 = 0x8000_0000;
    const ROOT: u64 = 0x8000_1000;

    fn hart(isa: &str) -> Hart {
        let config = HartConfig::new().with_isa(isa).with_reset_pc(RAM_BASE);
        let mut hart = Hart::new(config, Box::new(Ram::new(RAM_BASE, 0x10_0000))).unwrap();
        hart.boot().unwrap();
        hart
    }

    fn write_pte(hart: &mut Hart, addr: u64, size: usize, pte: PageTableEntry) {
        hart.write_memory(addr, size, pte.bits).unwrap();
    }

    fn enable_paging(hart: &mut Hart, mode: u64) {
        hart.poke_csr_field(csr_index::satp, Field::Ppn, ROOT >> 12)
            .unwrap();
        hart.poke_csr_field(csr_index::satp, Field::Mode, mode)
            .unwrap();
        hart.set_priv_mode(PrivMode::Supervisor).unwrap();
    }

    #[test]
    fn test_satp_decoding() {
        assert_eq!(MmuMode::from_satp(0, Xlen::Rv64), MmuMode::Baremetal);
        assert_eq!(MmuMode::from_satp(1, Xlen::Rv32), MmuMode::Sv32);
        assert_eq!(MmuMode::from_satp(1, Xlen::Rv64), MmuMode::Invalid);
        assert_eq!(MmuMode::from_satp(8, Xlen::Rv64), MmuMode::Sv39);
        assert_eq!(MmuMode::from_satp(10, Xlen::Rv64), MmuMode::Sv57);
        for mode in (2..8).chain(11..16) {
            assert_eq!(MmuMode::from_satp(mode, Xlen::Rv64), MmuMode::Invalid);
        }
    }

    #[test]
    fn test_bare_translation_is_identity() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut hart = hart("rv64gc");
        for kind in [AccessKind::Fetch, AccessKind::Load, AccessKind::Store] {
            for _ in 0..256 {
                let vaddr: u64 = rng.random();
                let size = 1 << rng.random_range(0..4);
                let result = hart.translate(kind, vaddr, size).unwrap().unwrap();
                assert_eq!(result, TranslationResult { paddr: vaddr, size });
            }
        }
    }

    #[test]
    fn test_machine_mode_ignores_satp() {
        let mut hart = hart("rv64gc");
        hart.poke_csr_field(csr_index::satp, Field::Mode, 8)
            .unwrap();
        change_mmu_mode(&mut hart).unwrap();
        assert_eq!(hart.mmu().inst_mode, MmuMode::Baremetal);
        let result = hart.translate(AccessKind::Load, 0x1000, 4).unwrap();
        assert_eq!(result, Ok(TranslationResult { paddr: 0x1000, size: 4 }));
    }

    #[test]
    fn test_sv32_leaf_mapping() {
        let mut hart = hart("rv32imac_zicsr");
        let leaf_table = 0x8000_2000u64;
        let vpn1 = 0x123u64;
        let vpn0 = 0x045u64;
        let target_ppn = 0x8_0042u64;

        write_pte(
            &mut hart,
            ROOT + vpn1 * 4,
            4,
            PageTableEntry::from_ppn(leaf_table >> 12, PTEFlags::V, MmuMode::Sv32),
        );
        let rwx = PTEFlags::V | PTEFlags::R | PTEFlags::W | PTEFlags::X;
        write_pte(
            &mut hart,
            leaf_table + vpn0 * 4,
            4,
            PageTableEntry::from_ppn(target_ppn, rwx, MmuMode::Sv32),
        );
        enable_paging(&mut hart, 1);

        for offset in [0u64, 1, 0x7ff, 0xffc] {
            let va = (vpn1 << 22) | (vpn0 << 12) | offset;
            for kind in [AccessKind::Fetch, AccessKind::Load, AccessKind::Store] {
                let result = hart.translate(kind, va, 4).unwrap().unwrap();
                assert_eq!(result.paddr, (target_ppn << 12) | (va & 0xfff));
            }
        }

        // hardware A/D update
        let pte = hart.read_memory(leaf_table + vpn0 * 4, 4).unwrap();
        assert_ne!(pte & PTEFlags::A.bits() as u64, 0);
        assert_ne!(pte & PTEFlags::D.bits() as u64, 0);
    }

    #[test]
    fn test_invalid_pte_faults_by_access_kind() {
        let mut hart = hart("rv64gc");
        let next_table = 0x8000_3000u64;
        // level 2 valid pointer, level 1 entry left invalid
        write_pte(
            &mut hart,
            ROOT,
            8,
            PageTableEntry::from_ppn(next_table >> 12, PTEFlags::V, MmuMode::Sv39),
        );
        enable_paging(&mut hart, 8);

        for va in [0x0u64, 0x20_0000_0000] {
            for (kind, cause) in [
                (AccessKind::Fetch, FaultCause::InstPageFault),
                (AccessKind::Load, FaultCause::LoadPageFault),
                (AccessKind::Store, FaultCause::StoreAmoPageFault),
            ] {
                assert_eq!(hart.translate(kind, va, 8).unwrap(), Err(cause));
            }
        }
    }

    #[test]
    fn test_bad_leaf_below_valid_pointers() {
        let mut hart = hart("rv64gc");
        let l1 = 0x8000_3000u64;
        let l0 = 0x8000_4000u64;
        write_pte(
            &mut hart,
            ROOT,
            8,
            PageTableEntry::from_ppn(l1 >> 12, PTEFlags::V, MmuMode::Sv39),
        );
        write_pte(
            &mut hart,
            l1,
            8,
            PageTableEntry::from_ppn(l0 >> 12, PTEFlags::V, MmuMode::Sv39),
        );
        // vpn0 1: invalid, vpn0 2: W without R, vpn0 3: usable
        let ad = PTEFlags::A | PTEFlags::D;
        let write_only = PTEFlags::V | PTEFlags::W | ad;
        let rwx = PTEFlags::V | PTEFlags::R | PTEFlags::W | PTEFlags::X | ad;
        write_pte(
            &mut hart,
            l0 + 2 * 8,
            8,
            PageTableEntry::from_ppn(0x8_0010, write_only, MmuMode::Sv39),
        );
        write_pte(
            &mut hart,
            l0 + 3 * 8,
            8,
            PageTableEntry::from_ppn(0x8_0010, rwx, MmuMode::Sv39),
        );
        enable_paging(&mut hart, 8);

        for kind in [AccessKind::Fetch, AccessKind::Load, AccessKind::Store] {
            assert_eq!(
                hart.translate(kind, 0x1008, 4).unwrap(),
                Err(kind.page_fault())
            );
            assert_eq!(
                hart.translate(kind, 0x2008, 4).unwrap(),
                Err(kind.page_fault())
            );
            let result = hart.translate(kind, 0x3008, 4).unwrap();
            assert_eq!(result.map(|r| r.paddr), Ok(0x8001_0008));
        }
    }

    #[test]
    fn test_permission_and_superpage() {
        let mut hart = hart("rv64gc");
        // 1 GiB read-only superpage at VA 0 -> PA 0x8000_0000
        let ro = PTEFlags::V | PTEFlags::R | PTEFlags::A;
        write_pte(
            &mut hart,
            ROOT,
            8,
            PageTableEntry::from_ppn(0x8_0000, ro, MmuMode::Sv39),
        );
        // misaligned 1 GiB superpage at VA 1 GiB
        write_pte(
            &mut hart,
            ROOT + 8,
            8,
            PageTableEntry::from_ppn(0x8_0001, ro, MmuMode::Sv39),
        );
        enable_paging(&mut hart, 8);

        let load = hart.translate(AccessKind::Load, 0x1234_5678, 4).unwrap();
        assert_eq!(load.map(|r| r.paddr), Ok(0x9234_5678));
        assert_eq!(
            hart.translate(AccessKind::Store, 0x1234_5678, 4).unwrap(),
            Err(FaultCause::StoreAmoPageFault)
        );
        assert_eq!(
            hart.translate(AccessKind::Fetch, 0x1234_5678, 4).unwrap(),
            Err(FaultCause::InstPageFault)
        );
        assert_eq!(
            hart.translate(AccessKind::Load, 0x4000_0000, 4).unwrap(),
            Err(FaultCause::LoadPageFault)
        );
        // non-canonical address
        assert_eq!(
            hart.translate(AccessKind::Load, 0x8000_0000_0000_0000, 4).unwrap(),
            Err(FaultCause::LoadPageFault)
        );
    }

    #[test]
    fn test_mprv_selects_load_store_mode() {
        let mut hart = hart("rv64gc");
        hart.poke_csr_field(csr_index::satp, Field::Mode, 8)
            .unwrap();
        hart.poke_csr_field(csr_index::mstatus, Field::Mpp, 1)
            .unwrap();
        hart.poke_csr_field(csr_index::mstatus, Field::Mprv, 1)
            .unwrap();
        change_mmu_mode(&mut hart).unwrap();
        assert_eq!(hart.mmu().inst_mode, MmuMode::Baremetal);
        assert_eq!(hart.mmu().ldst_mode, MmuMode::Sv39);
        assert_eq!(hart.mmu().ldst_priv, PrivMode::Supervisor);

        let op = hart.chains().get(ChainId::LOAD_TRANSLATE).ops()[0];
        assert_eq!(op.name(), "translate_Sv39_load");
        let op = hart.chains().get(ChainId::INST_TRANSLATE).ops()[0];
        assert_eq!(op.name(), "translate_Bare_fetch");
    }

    #[test]
    fn test_invalid_satp_mode_is_fatal() {
        let mut hart = hart("rv64gc");
        hart.poke_csr_field(csr_index::satp, Field::Mode, 5)
            .unwrap();
        assert!(matches!(
            change_mmu_mode(&mut hart),
            Err(HartError::InvalidMmuMode { mode: 5, xlen: Xlen::Rv64 })
        ));
    }

    #[test]
    fn test_translate_op_needs_request() {
        let mut hart = hart("rv64gc");
        let op = translate_op(Xlen::Rv64, MmuMode::Baremetal, AccessKind::Fetch).unwrap();
        assert!(matches!(
            op.call(&mut hart),
            Err(HartError::NoTranslationRequest)
        ));

        hart.translation_state_mut(AccessKind::Fetch)
            .unwrap()
            .make_request(0x8000_0000, 4)
            .unwrap();
        assert_eq!(op.call(&mut hart).unwrap(), Flow::Continue);
        let result = hart
            .translation_state_mut(AccessKind::Fetch)
            .unwrap()
            .pop_result()
            .unwrap();
        assert_eq!(result.paddr, 0x8000_0000);
    }

    #[test]
    fn test_page_fault_redirects_to_exception() {
        let mut hart = hart("rv64gc");
        enable_paging(&mut hart, 8);
        let op = translate_op(Xlen::Rv64, MmuMode::Sv39, AccessKind::Fetch).unwrap();
        hart.translation_state_mut(AccessKind::Fetch)
            .unwrap()
            .make_request(0x5000, 4)
            .unwrap();
        assert_eq!(
            op.call(&mut hart).unwrap(),
            Flow::Redirect(ChainId::EXCEPTION)
        );
        assert_eq!(
            hart.exception_unit().pending().unwrap(),
            TrapCause::Fault(FaultCause::InstPageFault)
        );
        assert!(!hart.translation_state(AccessKind::Fetch).unwrap().has_request());
    }
}
