//! Access decisions for card reads and exit requests.

use doorlink_core::FeedbackKind;
use std::collections::HashSet;

/// Decides the feedback a node shows for an access attempt.
pub trait AccessPolicy: Send {
    /// Decision for a credential read on `reader_id` of the node at `address`.
    fn on_card(&mut self, address: u8, reader_id: u8, code: u64, bits: u8) -> FeedbackKind;

    /// Decision for a request-to-exit press.
    fn on_rex(&mut self, address: u8, reader_id: u8) -> FeedbackKind {
        let _ = (address, reader_id);
        FeedbackKind::Grant
    }
}

/// Reference policy: every read and every exit request is granted.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrantAll;

impl AccessPolicy for GrantAll {
    fn on_card(&mut self, _address: u8, _reader_id: u8, _code: u64, _bits: u8) -> FeedbackKind {
        FeedbackKind::Grant
    }
}

/// Grants only credential codes on an allow list; exit requests always pass.
#[derive(Debug, Clone, Default)]
pub struct CardAllowList {
    codes: HashSet<u64>,
}

impl CardAllowList {
    pub fn new(codes: impl IntoIterator<Item = u64>) -> Self {
        Self {
            codes: codes.into_iter().collect(),
        }
    }

    pub fn allow(&mut self, code: u64) {
        self.codes.insert(code);
    }

    pub fn revoke(&mut self, code: u64) -> bool {
        self.codes.remove(&code)
    }

    #[must_use]
    pub fn is_allowed(&self, code: u64) -> bool {
        self.codes.contains(&code)
    }
}

impl AccessPolicy for CardAllowList {
    fn on_card(&mut self, _address: u8, _reader_id: u8, code: u64, _bits: u8) -> FeedbackKind {
        if self.is_allowed(code) {
            FeedbackKind::Grant
        } else {
            FeedbackKind::Deny
        }
    }
}
