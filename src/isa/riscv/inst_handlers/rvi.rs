use std::marker::PhantomData;

use crate::{
    config::arch_config::Xlen,
    isa::riscv::{
        csr_reg::{PrivMode, csr_index, csr_table::Field},
        error::HartError,
        hart::Hart,
        inst_handlers::{InstFamily, InstHandlers},
        micro_op::{ChainId, Flow, MicroOp, MicroOpFn, Tag},
        translate::AccessKind,
        trap::{FaultCause, dispatcher},
    },
    utils::{Word, sign_extend},
};

/// RV32I/RV64I base integer instructions, the M extension and the privileged
/// instructions that live in the base opcode space.
pub struct RvI;

/// AluOp only computes. Operands arrive narrowed to XLEN, the result is
/// narrowed on writeback.
pub(super) trait AluOp {
    fn exec<W: Word>(a: u64, b: u64) -> u64;
}

#[inline]
fn signed<W: Word>(value: u64) -> i64 {
    W::sign_extend(value) as i64
}

#[inline]
fn shamt<W: Word>(value: u64) -> u32 {
    (value & (W::BITS as u64 - 1)) as u32
}

pub(super) struct Add;
impl AluOp for Add {
    fn exec<W: Word>(a: u64, b: u64) -> u64 {
        a.wrapping_add(b)
    }
}

pub(super) struct Sub;
impl AluOp for Sub {
    fn exec<W: Word>(a: u64, b: u64) -> u64 {
        a.wrapping_sub(b)
    }
}

pub(super) struct Sll;
impl AluOp for Sll {
    fn exec<W: Word>(a: u64, b: u64) -> u64 {
        a << shamt::<W>(b)
    }
}

pub(super) struct Srl;
impl AluOp for Srl {
    fn exec<W: Word>(a: u64, b: u64) -> u64 {
        W::narrow(a) >> shamt::<W>(b)
    }
}

pub(super) struct Sra;
impl AluOp for Sra {
    fn exec<W: Word>(a: u64, b: u64) -> u64 {
        (signed::<W>(a) >> shamt::<W>(b)) as u64
    }
}

pub(super) struct Slt;
impl AluOp for Slt {
    fn exec<W: Word>(a: u64, b: u64) -> u64 {
        (signed::<W>(a) < signed::<W>(b)) as u64
    }
}

pub(super) struct Sltu;
impl AluOp for Sltu {
    fn exec<W: Word>(a: u64, b: u64) -> u64 {
        (W::narrow(a) < W::narrow(b)) as u64
    }
}

pub(super) struct Xor;
impl AluOp for Xor {
    fn exec<W: Word>(a: u64, b: u64) -> u64 {
        a ^ b
    }
}

pub(super) struct Or;
impl AluOp for Or {
    fn exec<W: Word>(a: u64, b: u64) -> u64 {
        a | b
    }
}

pub(super) struct And;
impl AluOp for And {
    fn exec<W: Word>(a: u64, b: u64) -> u64 {
        a & b
    }
}

pub(super) struct Mul;
impl AluOp for Mul {
    fn exec<W: Word>(a: u64, b: u64) -> u64 {
        a.wrapping_mul(b)
    }
}

pub(super) struct Mulh;
impl AluOp for Mulh {
    fn exec<W: Word>(a: u64, b: u64) -> u64 {
        ((signed::<W>(a) as i128 * signed::<W>(b) as i128) >> W::BITS) as u64
    }
}

pub(super) struct Mulhsu;
impl AluOp for Mulhsu {
    fn exec<W: Word>(a: u64, b: u64) -> u64 {
        ((signed::<W>(a) as i128 * W::narrow(b) as i128) >> W::BITS) as u64
    }
}

pub(super) struct Mulhu;
impl AluOp for Mulhu {
    fn exec<W: Word>(a: u64, b: u64) -> u64 {
        ((W::narrow(a) as u128 * W::narrow(b) as u128) >> W::BITS) as u64
    }
}

pub(super) struct Div;
impl AluOp for Div {
    fn exec<W: Word>(a: u64, b: u64) -> u64 {
        let (a, b) = (signed::<W>(a), signed::<W>(b));
        if b == 0 {
            return u64::MAX;
        }
        // i64::MIN / -1 wraps to the dividend
        a.wrapping_div(b) as u64
    }
}

pub(super) struct Divu;
impl AluOp for Divu {
    fn exec<W: Word>(a: u64, b: u64) -> u64 {
        let (a, b) = (W::narrow(a), W::narrow(b));
        a.checked_div(b).unwrap_or(u64::MAX)
    }
}

pub(super) struct Rem;
impl AluOp for Rem {
    fn exec<W: Word>(a: u64, b: u64) -> u64 {
        let (a, b) = (signed::<W>(a), signed::<W>(b));
        if b == 0 {
            return a as u64;
        }
        a.wrapping_rem(b) as u64
    }
}

pub(super) struct Remu;
impl AluOp for Remu {
    fn exec<W: Word>(a: u64, b: u64) -> u64 {
        let (a, b) = (W::narrow(a), W::narrow(b));
        a.checked_rem(b).unwrap_or(a)
    }
}

/// RV64 `*w` form of `F`: compute on the low 32 bits, sign extend the result.
pub(super) struct W32<F>(PhantomData<F>);
impl<F: AluOp> AluOp for W32<F> {
    fn exec<W: Word>(a: u64, b: u64) -> u64 {
        u32::sign_extend(F::exec::<u32>(u32::narrow(a), u32::narrow(b)))
    }
}

pub(super) trait BranchCond {
    fn taken<W: Word>(a: u64, b: u64) -> bool;
}

pub(super) struct Equal;
impl BranchCond for Equal {
    fn taken<W: Word>(a: u64, b: u64) -> bool {
        a == b
    }
}

pub(super) struct NotEqual;
impl BranchCond for NotEqual {
    fn taken<W: Word>(a: u64, b: u64) -> bool {
        a != b
    }
}

pub(super) struct SignedLess;
impl BranchCond for SignedLess {
    fn taken<W: Word>(a: u64, b: u64) -> bool {
        signed::<W>(a) < signed::<W>(b)
    }
}

pub(super) struct SignedGreaterEqual;
impl BranchCond for SignedGreaterEqual {
    fn taken<W: Word>(a: u64, b: u64) -> bool {
        signed::<W>(a) >= signed::<W>(b)
    }
}

pub(super) struct UnsignedLess;
impl BranchCond for UnsignedLess {
    fn taken<W: Word>(a: u64, b: u64) -> bool {
        W::narrow(a) < W::narrow(b)
    }
}

pub(super) struct UnsignedGreaterEqual;
impl BranchCond for UnsignedGreaterEqual {
    fn taken<W: Word>(a: u64, b: u64) -> bool {
        W::narrow(a) >= W::narrow(b)
    }
}

// =============================================
//                  Execute ops
// =============================================

fn alu_rr<W: Word, F: AluOp>(hart: &mut Hart) -> Result<Flow, HartError> {
    let inst = hart.current_inst()?;
    let (rd, rs1, rs2) = (inst.rd()?, inst.rs1()?, inst.rs2()?);
    let result = F::exec::<W>(hart.read_int(rs1)?, hart.read_int(rs2)?);
    hart.write_int(rd, result)?;
    Ok(Flow::Continue)
}

/// Immediates are already sign extended by the decoder.
fn alu_ri<W: Word, F: AluOp>(hart: &mut Hart) -> Result<Flow, HartError> {
    let inst = hart.current_inst()?;
    let (rd, rs1, imm) = (inst.rd()?, inst.rs1()?, inst.imm()?);
    let result = F::exec::<W>(hart.read_int(rs1)?, W::narrow(imm as u64));
    hart.write_int(rd, result)?;
    Ok(Flow::Continue)
}

fn lui<W: Word>(hart: &mut Hart) -> Result<Flow, HartError> {
    let inst = hart.current_inst()?;
    let (rd, imm) = (inst.rd()?, inst.imm()?);
    hart.write_int(rd, W::narrow(imm as u64))?;
    Ok(Flow::Continue)
}

fn auipc<W: Word>(hart: &mut Hart) -> Result<Flow, HartError> {
    let inst = hart.current_inst()?;
    let (rd, imm) = (inst.rd()?, inst.imm()?);
    let value = hart.pc().wrapping_add(imm as u64);
    hart.write_int(rd, W::narrow(value))?;
    Ok(Flow::Continue)
}

fn jal<W: Word>(hart: &mut Hart) -> Result<Flow, HartError> {
    let inst = hart.current_inst()?;
    let (rd, imm, len) = (inst.rd()?, inst.imm()?, inst.len());
    let pc = hart.pc();
    hart.write_int(rd, W::narrow(pc.wrapping_add(len)))?;
    hart.set_next_pc(W::narrow(pc.wrapping_add(imm as u64)));
    Ok(Flow::Continue)
}

fn jalr<W: Word>(hart: &mut Hart) -> Result<Flow, HartError> {
    let inst = hart.current_inst()?;
    let (rd, rs1, imm, len) = (inst.rd()?, inst.rs1()?, inst.imm()?, inst.len());
    // rd may equal rs1
    let target = hart.read_int(rs1)?.wrapping_add(imm as u64) & !1;
    let pc = hart.pc();
    hart.write_int(rd, W::narrow(pc.wrapping_add(len)))?;
    hart.set_next_pc(W::narrow(target));
    Ok(Flow::Continue)
}

/// Misaligned targets are caught by the alignment check of the next fetch.
fn branch<W: Word, C: BranchCond>(hart: &mut Hart) -> Result<Flow, HartError> {
    let inst = hart.current_inst()?;
    let (rs1, rs2, imm) = (inst.rs1()?, inst.rs2()?, inst.imm()?);
    if C::taken::<W>(hart.read_int(rs1)?, hart.read_int(rs2)?) {
        let target = hart.pc().wrapping_add(imm as u64);
        hart.set_next_pc(W::narrow(target));
    }
    Ok(Flow::Continue)
}

fn access_kind<const STORE: bool>() -> AccessKind {
    if STORE { AccessKind::Store } else { AccessKind::Load }
}

/// Effective address plus alignment check, then the translation request.
fn compute_address<W: Word, const SIZE: usize, const STORE: bool>(
    hart: &mut Hart,
) -> Result<Flow, HartError> {
    let inst = hart.current_inst()?;
    let (rs1, imm) = (inst.rs1()?, inst.imm()?);
    let addr = W::narrow(hart.read_int(rs1)?.wrapping_add(imm as u64));
    let kind = access_kind::<STORE>();
    if addr % SIZE as u64 != 0 {
        return Ok(hart.raise_fault_at(kind.misaligned(), addr));
    }
    hart.translation_state_mut(kind)?.make_request(addr, SIZE)?;
    Ok(Flow::Continue)
}

fn load<const SIZE: usize, const SIGNED: bool>(hart: &mut Hart) -> Result<Flow, HartError> {
    let paddr = hart
        .translation_state_mut(AccessKind::Load)?
        .pop_result()?
        .paddr;
    let value = hart.read_memory(paddr, SIZE)?;
    let value = if SIGNED {
        sign_extend(value, SIZE as u32 * 8)
    } else {
        value
    };
    let rd = hart.current_inst()?.rd()?;
    hart.write_int(rd, value)?;
    Ok(Flow::Continue)
}

fn store<const SIZE: usize>(hart: &mut Hart) -> Result<Flow, HartError> {
    let paddr = hart
        .translation_state_mut(AccessKind::Store)?
        .pop_result()?
        .paddr;
    let rs2 = hart.current_inst()?.rs2()?;
    let value = hart.read_int(rs2)?;
    hart.write_memory(paddr, SIZE, value)?;
    Ok(Flow::Continue)
}

fn nop(_: &mut Hart) -> Result<Flow, HartError> {
    Ok(Flow::Continue)
}

fn ecall(hart: &mut Hart) -> Result<Flow, HartError> {
    let cause = FaultCause::ecall_from(hart.priv_mode());
    Ok(hart.raise_fault(cause))
}

fn ebreak(hart: &mut Hart) -> Result<Flow, HartError> {
    Ok(hart.raise_fault(FaultCause::Breakpoint))
}

fn status_bit(hart: &Hart, field: Field) -> Result<bool, HartError> {
    Ok(hart.csrs().read_field(csr_index::mstatus, field)? != 0)
}

fn mret(hart: &mut Hart) -> Result<Flow, HartError> {
    if hart.priv_mode() < PrivMode::Machine {
        return Ok(hart.raise_fault(FaultCause::IllegalInstruction));
    }
    dispatcher::mret(hart)?;
    Ok(Flow::Continue)
}

fn sret(hart: &mut Hart) -> Result<Flow, HartError> {
    let illegal = match hart.priv_mode() {
        PrivMode::User => true,
        PrivMode::Supervisor => status_bit(hart, Field::Tsr)?,
        PrivMode::Machine => false,
    };
    if illegal {
        return Ok(hart.raise_fault(FaultCause::IllegalInstruction));
    }
    dispatcher::sret(hart)?;
    Ok(Flow::Continue)
}

fn wfi(hart: &mut Hart) -> Result<Flow, HartError> {
    if hart.priv_mode() < PrivMode::Machine && status_bit(hart, Field::Tw)? {
        return Ok(hart.raise_fault(FaultCause::IllegalInstruction));
    }
    if hart.stop_on_wfi() {
        log::debug!("wfi at {:#x}, stopping", hart.pc());
        return Ok(Flow::Redirect(ChainId::STOP));
    }
    Ok(Flow::Continue)
}

fn sfence_vma(hart: &mut Hart) -> Result<Flow, HartError> {
    let illegal = match hart.priv_mode() {
        PrivMode::User => true,
        PrivMode::Supervisor => status_bit(hart, Field::Tvm)?,
        PrivMode::Machine => false,
    };
    if illegal {
        return Ok(hart.raise_fault(FaultCause::IllegalInstruction));
    }
    Ok(Flow::Continue)
}

// =============================================
//                  Registration
// =============================================

fn execute(name: &'static str, func: MicroOpFn) -> MicroOp {
    MicroOp::tagged(name, Tag::Execute, func)
}

macro_rules! register_exec {
    ($handlers:ident, $($mnemonic:literal => $func:expr),* $(,)?) => {
        $( $handlers.register($mnemonic, &[execute($mnemonic, $func)]); )*
    };
}

macro_rules! register_load {
    ($handlers:ident, $w:ty, $($mnemonic:literal => ($size:literal, $signed:literal)),* $(,)?) => {
        $(
            $handlers.register_memory(
                $mnemonic,
                &[
                    MicroOp::tagged(
                        "compute_address",
                        Tag::ComputeAddress,
                        compute_address::<$w, $size, false>,
                    ),
                    execute($mnemonic, load::<$size, $signed>),
                ],
                AccessKind::Load,
            );
        )*
    };
}

macro_rules! register_store {
    ($handlers:ident, $w:ty, $($mnemonic:literal => $size:literal),* $(,)?) => {
        $(
            $handlers.register_memory(
                $mnemonic,
                &[
                    MicroOp::tagged(
                        "compute_address",
                        Tag::ComputeAddress,
                        compute_address::<$w, $size, true>,
                    ),
                    execute($mnemonic, store::<$size>),
                ],
                AccessKind::Store,
            );
        )*
    };
}

fn register_base<W: Word>(handlers: &mut InstHandlers) {
    register_exec!(handlers,
        "lui" => lui::<W>,
        "auipc" => auipc::<W>,
        "jal" => jal::<W>,
        "jalr" => jalr::<W>,

        "beq" => branch::<W, Equal>,
        "bne" => branch::<W, NotEqual>,
        "blt" => branch::<W, SignedLess>,
        "bge" => branch::<W, SignedGreaterEqual>,
        "bltu" => branch::<W, UnsignedLess>,
        "bgeu" => branch::<W, UnsignedGreaterEqual>,

        "addi" => alu_ri::<W, Add>,
        "slti" => alu_ri::<W, Slt>,
        "sltiu" => alu_ri::<W, Sltu>,
        "xori" => alu_ri::<W, Xor>,
        "ori" => alu_ri::<W, Or>,
        "andi" => alu_ri::<W, And>,
        "slli" => alu_ri::<W, Sll>,
        "srli" => alu_ri::<W, Srl>,
        "srai" => alu_ri::<W, Sra>,

        "add" => alu_rr::<W, Add>,
        "sub" => alu_rr::<W, Sub>,
        "sll" => alu_rr::<W, Sll>,
        "slt" => alu_rr::<W, Slt>,
        "sltu" => alu_rr::<W, Sltu>,
        "xor" => alu_rr::<W, Xor>,
        "srl" => alu_rr::<W, Srl>,
        "sra" => alu_rr::<W, Sra>,
        "or" => alu_rr::<W, Or>,
        "and" => alu_rr::<W, And>,

        "mul" => alu_rr::<W, Mul>,
        "mulh" => alu_rr::<W, Mulh>,
        "mulhsu" => alu_rr::<W, Mulhsu>,
        "mulhu" => alu_rr::<W, Mulhu>,
        "div" => alu_rr::<W, Div>,
        "divu" => alu_rr::<W, Divu>,
        "rem" => alu_rr::<W, Rem>,
        "remu" => alu_rr::<W, Remu>,

        "fence" => nop,
        "fence.i" => nop,
        "ecall" => ecall,
        "ebreak" => ebreak,
        "mret" => mret,
        "sret" => sret,
        "wfi" => wfi,
        "sfence.vma" => sfence_vma,
    );

    register_load!(handlers, W,
        "lb" => (1, true),
        "lh" => (2, true),
        "lw" => (4, true),
        "lbu" => (1, false),
        "lhu" => (2, false),
    );
    register_store!(handlers, W,
        "sb" => 1,
        "sh" => 2,
        "sw" => 4,
    );
}

fn register_rv64(handlers: &mut InstHandlers) {
    register_exec!(handlers,
        "addiw" => alu_ri::<u64, W32<Add>>,
        "slliw" => alu_ri::<u64, W32<Sll>>,
        "srliw" => alu_ri::<u64, W32<Srl>>,
        "sraiw" => alu_ri::<u64, W32<Sra>>,
        "addw" => alu_rr::<u64, W32<Add>>,
        "subw" => alu_rr::<u64, W32<Sub>>,
        "sllw" => alu_rr::<u64, W32<Sll>>,
        "srlw" => alu_rr::<u64, W32<Srl>>,
        "sraw" => alu_rr::<u64, W32<Sra>>,
        "mulw" => alu_rr::<u64, W32<Mul>>,
        "divw" => alu_rr::<u64, W32<Div>>,
        "divuw" => alu_rr::<u64, W32<Divu>>,
        "remw" => alu_rr::<u64, W32<Rem>>,
        "remuw" => alu_rr::<u64, W32<Remu>>,
    );
    register_load!(handlers, u64,
        "lwu" => (4, false),
        "ld" => (8, false),
    );
    register_store!(handlers, u64,
        "sd" => 8,
    );
}

impl InstFamily for RvI {
    fn name(&self) -> &'static str {
        "rv_i"
    }

    fn register(&self, xlen: Xlen, handlers: &mut InstHandlers) {
        match xlen {
            Xlen::Rv32 => register_base::<u32>(handlers),
            Xlen::Rv64 => {
                register_base::<u64>(handlers);
                register_rv64(handlers);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEG1_32: u64 = 0xffff_ffff;

    #[test]
    fn test_shifts_follow_xlen() {
        assert_eq!(Sll::exec::<u32>(1, 33), 2);
        assert_eq!(Sll::exec::<u64>(1, 33), 1 << 33);
        assert_eq!(Srl::exec::<u32>(0x8000_0000, 31), 1);
        assert_eq!(Sra::exec::<u32>(0x8000_0000, 31), u64::MAX);
        assert_eq!(u32::narrow(Sra::exec::<u32>(0x8000_0000, 31)), NEG1_32);
        assert_eq!(Sra::exec::<u64>(1 << 63, 63), u64::MAX);
    }

    #[test]
    fn test_compare() {
        assert_eq!(Slt::exec::<u32>(NEG1_32, 0), 1);
        assert_eq!(Sltu::exec::<u32>(NEG1_32, 0), 0);
        // sltiu x, -1 compares against XLEN ones
        assert_eq!(Sltu::exec::<u32>(5, u32::narrow(-1i64 as u64)), 1);
        assert!(SignedLess::taken::<u64>(u64::MAX, 0));
        assert!(!UnsignedLess::taken::<u64>(u64::MAX, 0));
        assert!(UnsignedGreaterEqual::taken::<u32>(NEG1_32, 1));
    }

    #[test]
    fn test_division_corner_cases() {
        assert_eq!(Div::exec::<u64>(7, 0), u64::MAX);
        assert_eq!(Divu::exec::<u32>(7, 0), u64::MAX);
        assert_eq!(Rem::exec::<u64>(7, 0), 7);
        assert_eq!(Remu::exec::<u64>(7, 0), 7);
        // signed overflow
        let min = 1u64 << 63;
        assert_eq!(Div::exec::<u64>(min, u64::MAX), min);
        assert_eq!(Rem::exec::<u64>(min, u64::MAX), 0);
        assert_eq!(
            u32::narrow(Div::exec::<u32>(0x8000_0000, NEG1_32)),
            0x8000_0000
        );
        assert_eq!(Div::exec::<u64>(-7i64 as u64, 2), -3i64 as u64);
        assert_eq!(Rem::exec::<u64>(-7i64 as u64, 2), -1i64 as u64);
    }

    #[test]
    fn test_high_multiply() {
        assert_eq!(Mulhu::exec::<u64>(u64::MAX, u64::MAX), u64::MAX - 1);
        assert_eq!(Mulh::exec::<u64>(u64::MAX, u64::MAX), 0);
        assert_eq!(Mulhsu::exec::<u64>(u64::MAX, 2), u64::MAX);
        assert_eq!(u32::narrow(Mulhu::exec::<u32>(NEG1_32, 2)), 1);
        assert_eq!(u32::narrow(Mulh::exec::<u32>(NEG1_32, 2)), NEG1_32);
    }

    #[test]
    fn test_word_forms_sign_extend() {
        assert_eq!(
            W32::<Add>::exec::<u64>(0x7fff_ffff, 1),
            0xffff_ffff_8000_0000
        );
        assert_eq!(W32::<Add>::exec::<u64>(0x1_0000_0001, 1), 2);
        assert_eq!(
            W32::<Srl>::exec::<u64>(0xffff_ffff_8000_0000, 1),
            0x4000_0000
        );
        assert_eq!(
            W32::<Sra>::exec::<u64>(0x8000_0000, 4),
            0xffff_ffff_f800_0000
        );
        assert_eq!(W32::<Sll>::exec::<u64>(1, 31), 0xffff_ffff_8000_0000);
        assert_eq!(W32::<Divu>::exec::<u64>(5, 0), u64::MAX);
        assert_eq!(W32::<Rem>::exec::<u64>(0xffff_ffff_8000_0000, NEG1_32), 0);
    }
}
