use std::collections::VecDeque;

use crate::isa::riscv::error::HartError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationRequest {
    pub vaddr: u64,
    pub size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationResult {
    pub paddr: u64,
    pub size: usize,
}

/// Request/result queue of one access stream (instruction fetch, or the data
/// accesses of one instruction). Results drain in request order.
#[derive(Debug, Default, Clone)]
pub struct TranslationState {
    requests: VecDeque<TranslationRequest>,
    results: VecDeque<TranslationResult>,
}

impl TranslationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scalar request: only legal when nothing is outstanding.
    pub fn make_request(&mut self, vaddr: u64, size: usize) -> Result<(), HartError> {
        if !self.requests.is_empty() || !self.results.is_empty() {
            return Err(HartError::TranslationPending { vaddr });
        }
        self.requests.push_back(TranslationRequest { vaddr, size });
        Ok(())
    }

    /// Vector element request, queued behind the others.
    pub fn queue_request(&mut self, vaddr: u64, size: usize) {
        self.requests.push_back(TranslationRequest { vaddr, size });
    }

    pub fn request(&self) -> Result<TranslationRequest, HartError> {
        self.requests
            .front()
            .copied()
            .ok_or(HartError::NoTranslationRequest)
    }

    pub fn has_request(&self) -> bool {
        !self.requests.is_empty()
    }

    /// Resolve the oldest request.
    pub fn set_result(&mut self, paddr: u64, size: usize) -> Result<(), HartError> {
        self.requests
            .pop_front()
            .ok_or(HartError::NoTranslationRequest)?;
        self.results.push_back(TranslationResult { paddr, size });
        Ok(())
    }

    pub fn pop_result(&mut self) -> Result<TranslationResult, HartError> {
        self.results
            .pop_front()
            .ok_or(HartError::NoTranslationResult)
    }

    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    pub fn clear(&mut self) {
        self.requests.clear();
        self.results.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_protocol() {
        let mut state = TranslationState::new();
        assert!(matches!(
            state.request(),
            Err(HartError::NoTranslationRequest)
        ));

        state.make_request(0x1000, 4).unwrap();
        assert!(matches!(
            state.make_request(0x1000, 4),
            Err(HartError::TranslationPending { vaddr: 0x1000 })
        ));
        assert!(matches!(
            state.pop_result(),
            Err(HartError::NoTranslationResult)
        ));

        state.set_result(0x8000_1000, 4).unwrap();
        // an unconsumed result still blocks the next scalar request
        assert!(state.make_request(0x2000, 8).is_err());
        assert_eq!(
            state.pop_result().unwrap(),
            TranslationResult {
                paddr: 0x8000_1000,
                size: 4
            }
        );
        state.make_request(0x2000, 8).unwrap();
    }

    #[test]
    fn test_vector_requests_drain_in_order() {
        let mut state = TranslationState::new();
        for i in 0..4u64 {
            state.queue_request(0x1000 + i * 8, 8);
        }
        while let Ok(req) = state.request() {
            state.set_result(req.vaddr | 0x8000_0000, req.size).unwrap();
        }
        for i in 0..4u64 {
            assert_eq!(state.pop_result().unwrap().paddr, 0x8000_1000 + i * 8);
        }
        assert!(state.pop_result().is_err());
    }
}
