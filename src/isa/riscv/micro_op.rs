//! Micro-op pipeline primitives.
//!
//! Every step of instruction processing (fetch, translation, execution, trap
//! dispatch, retirement) is a [`MicroOp`]: a plain function over the [`Hart`]
//! returning a [`Flow`]. Ops are grouped into tag-addressable [`MicroOpChain`]s
//! which link to each other through [`ChainId`]s held in a [`ChainArena`].

use std::fmt::Debug;

use smallvec::SmallVec;

use crate::isa::riscv::{error::HartError, hart::Hart};

pub type MicroOpFn = fn(&mut Hart) -> Result<Flow, HartError>;

/// Control transfer produced by a micro-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Run the next op of the current chain (or the chain's successor).
    Continue,
    /// Abandon the current chain and start the given one.
    Redirect(ChainId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Fetch,
    CheckInterrupts,
    InstTranslate,
    Decode,
    ComputeAddress,
    DataTranslate,
    PreExecute,
    Execute,
    CsrUpdate,
    PreException,
    Exception,
    IncrementPc,
    PostExecute,
    StopSim,
}

#[derive(Clone, Copy)]
pub struct MicroOp {
    name: &'static str,
    tag: Option<Tag>,
    func: MicroOpFn,
}

impl Debug for MicroOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.tag {
            Some(tag) => write!(f, "{}[{:?}]", self.name, tag),
            None => write!(f, "{}", self.name),
        }
    }
}

impl MicroOp {
    pub const fn new(name: &'static str, func: MicroOpFn) -> Self {
        Self {
            name,
            tag: None,
            func,
        }
    }

    pub const fn tagged(name: &'static str, tag: Tag, func: MicroOpFn) -> Self {
        Self {
            name,
            tag: Some(tag),
            func,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn tag(&self) -> Option<Tag> {
        self.tag
    }

    #[inline]
    pub fn call(&self, hart: &mut Hart) -> Result<Flow, HartError> {
        (self.func)(hart)
    }
}

/// Stable handle of a chain inside a [`ChainArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainId(u16);

impl ChainId {
    pub const FETCH: ChainId = ChainId(0);
    pub const INST_TRANSLATE: ChainId = ChainId(1);
    pub const DECODE: ChainId = ChainId(2);
    /// Slot holding the bound chain of the instruction in flight.
    pub const INSTRUCTION: ChainId = ChainId(3);
    /// Template spliced into load instructions; never run on its own.
    pub const LOAD_TRANSLATE: ChainId = ChainId(4);
    /// Template spliced into store instructions; never run on its own.
    pub const STORE_TRANSLATE: ChainId = ChainId(5);
    pub const EXCEPTION: ChainId = ChainId(6);
    pub const FINISH: ChainId = ChainId(7);
    pub const STOP: ChainId = ChainId(8);

    const RESERVED: [(ChainId, &'static str); 9] = [
        (Self::FETCH, "fetch"),
        (Self::INST_TRANSLATE, "inst_translate"),
        (Self::DECODE, "decode"),
        (Self::INSTRUCTION, "instruction"),
        (Self::LOAD_TRANSLATE, "load_translate"),
        (Self::STORE_TRANSLATE, "store_translate"),
        (Self::EXCEPTION, "exception"),
        (Self::FINISH, "finish"),
        (Self::STOP, "stop"),
    ];

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct MicroOpChain {
    name: &'static str,
    ops: SmallVec<[MicroOp; 6]>,
    next: Option<ChainId>,
}

impl MicroOpChain {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            ops: SmallVec::new(),
            next: None,
        }
    }

    pub fn with_ops(name: &'static str, ops: &[MicroOp]) -> Self {
        Self {
            name,
            ops: SmallVec::from_slice(ops),
            next: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ops(&self) -> &[MicroOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn next(&self) -> Option<ChainId> {
        self.next
    }

    pub fn set_next(&mut self, next: Option<ChainId>) -> &mut Self {
        self.next = next;
        self
    }

    pub fn append(&mut self, op: MicroOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.position(tag).is_some()
    }

    fn position(&self, tag: Tag) -> Option<usize> {
        self.ops.iter().position(|op| op.tag == Some(tag))
    }

    fn require(&self, tag: Tag) -> Result<usize, HartError> {
        self.position(tag).ok_or(HartError::MissingTag {
            chain: self.name,
            tag,
        })
    }

    pub fn insert_before(&mut self, tag: Tag, op: MicroOp) -> Result<(), HartError> {
        let pos = self.require(tag)?;
        self.ops.insert(pos, op);
        Ok(())
    }

    pub fn insert_after(&mut self, tag: Tag, op: MicroOp) -> Result<(), HartError> {
        let pos = self.require(tag)?;
        self.ops.insert(pos + 1, op);
        Ok(())
    }

    /// Splice all ops of `other` right after the op tagged `tag`, keeping their order.
    pub fn splice_after(&mut self, tag: Tag, other: &MicroOpChain) -> Result<(), HartError> {
        let pos = self.require(tag)? + 1;
        self.ops.insert_many(pos, other.ops.iter().copied());
        Ok(())
    }

    pub fn replace(&mut self, tag: Tag, op: MicroOp) -> Result<(), HartError> {
        let pos = self.require(tag)?;
        self.ops[pos] = op;
        Ok(())
    }
}

/// Owner of every chain of a hart. Links between chains are indices, so the
/// finish -> fetch cycle needs no shared ownership.
#[derive(Debug, Clone)]
pub struct ChainArena {
    chains: Vec<MicroOpChain>,
}

impl Default for ChainArena {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainArena {
    pub fn new() -> Self {
        Self {
            chains: ChainId::RESERVED
                .iter()
                .map(|&(_, name)| MicroOpChain::new(name))
                .collect(),
        }
    }

    pub fn get(&self, id: ChainId) -> &MicroOpChain {
        &self.chains[id.index()]
    }

    pub fn get_mut(&mut self, id: ChainId) -> &mut MicroOpChain {
        &mut self.chains[id.index()]
    }

    /// Replace the whole chain stored at `id`.
    pub fn install(&mut self, id: ChainId, chain: MicroOpChain) {
        self.chains[id.index()] = chain;
    }

    pub fn add(&mut self, chain: MicroOpChain) -> ChainId {
        self.chains.push(chain);
        ChainId((self.chains.len() - 1) as u16)
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}
