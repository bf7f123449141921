use std::{collections::HashMap, rc::Rc};

use crate::{
    config::arch_config::Xlen,
    isa::riscv::{
        decoder::{
            DecodedInst, Decoder, compressed,
            extract_operands,
            table::{self, InstDesc},
        },
        extension::Extensions,
    },
};

/// Direct-mapped cache of decode results, keyed by the raw encoding.
struct DecodeCache<const N: usize> {
    entries: Box<[Option<(u32, Option<DecodedInst>)>; N]>,
}

impl<const N: usize> DecodeCache<N> {
    fn new() -> Self {
        debug_assert!(N > 0 && (N & (N - 1)) == 0, "N must be a power of two");
        Self {
            entries: Box::new([None; N]),
        }
    }

    #[inline]
    fn slot(opcode: u32) -> usize {
        (opcode as usize ^ (opcode as usize >> 15)) & (N - 1)
    }

    #[inline]
    fn get(&self, opcode: u32) -> Option<Option<DecodedInst>> {
        match self.entries[Self::slot(opcode)] {
            Some((tag, decoded)) if tag == opcode => Some(decoded),
            _ => None,
        }
    }

    #[inline]
    fn put(&mut self, opcode: u32, decoded: Option<DecodedInst>) {
        self.entries[Self::slot(opcode)] = Some((opcode, decoded));
    }

    fn flush(&mut self) {
        self.entries.fill(None);
    }
}

/// Key/mask decoder over the RV-I, M, Zicsr, Zifencei, privileged and
/// floating-point classification tables, plus RVC expansion.
///
/// The table filtered for each extension set is built once and kept; switching
/// back to a previous set only swaps the active table.
pub struct MaskDecoder {
    xlen: Xlen,
    extensions: Extensions,
    active: Rc<[InstDesc]>,
    contexts: HashMap<Extensions, Rc<[InstDesc]>>,
    cache: DecodeCache<1024>,
}

impl MaskDecoder {
    pub fn new(xlen: Xlen) -> Self {
        let mut decoder = Self {
            xlen,
            extensions: Extensions::empty(),
            active: Rc::from(Vec::new()),
            contexts: HashMap::new(),
            cache: DecodeCache::new(),
        };
        decoder.change_context(Extensions::G | Extensions::C | Extensions::S);
        decoder
    }

    pub fn extensions(&self) -> Extensions {
        self.extensions
    }

    fn build_context(&self, extensions: Extensions) -> Rc<[InstDesc]> {
        table::tables(self.xlen)
            .into_iter()
            .flatten()
            .filter(|desc| extensions.contains(desc.extension))
            .copied()
            .collect()
    }

    fn decode_uncached(&self, opcode: u32) -> Option<DecodedInst> {
        if opcode & 0b11 != 0b11 {
            if !self.extensions.contains(Extensions::C) {
                return None;
            }
            return compressed::expand(opcode, self.xlen);
        }
        self.active
            .iter()
            .find(|desc| desc.mask.matches(opcode))
            .map(|desc| extract_operands(desc.mnemonic, opcode, desc.format))
    }
}

impl Decoder for MaskDecoder {
    fn change_context(&mut self, extensions: Extensions) {
        if extensions == self.extensions && !self.active.is_empty() {
            return;
        }
        let active = match self.contexts.get(&extensions) {
            Some(active) => active.clone(),
            None => {
                let active = self.build_context(extensions);
                self.contexts.insert(extensions, active.clone());
                active
            }
        };
        log::debug!(
            "decoder context {} ({} encodings)",
            extensions,
            active.len()
        );
        self.active = active;
        self.extensions = extensions;
        self.cache.flush();
    }

    fn decode(&mut self, opcode: u32) -> Option<DecodedInst> {
        let opcode = if opcode & 0b11 != 0b11 { opcode & 0xffff } else { opcode };
        if let Some(decoded) = self.cache.get(opcode) {
            return decoded;
        }
        let decoded = self.decode_uncached(opcode);
        self.cache.put(opcode, decoded);
        decoded
    }
}
