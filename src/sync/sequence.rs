//! Request/response ordering.
//!
//! Every compile request (local or remote) is issued a sequence id. A
//! response may be applied only if it answers the most recently issued
//! request and nothing newer has been applied yet:
//!
//! ```text
//! issue() → 1        issue() → 2
//!    │                  │
//!    │   admit(2) ✓  ◄──┘   applied = 2
//!    └─► admit(1) ✗          stale: 1 < issued
//! ```
//!
//! Stale answers are not errors. They are dropped and logged.

/// Client-issued, per-session, strictly increasing request id.
pub type Seq = u64;

/// Outcome of offering a response to the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Answers the latest request; apply it.
    Apply,
    /// Superseded or already applied; drop it.
    Stale { seq: Seq, latest: Seq },
}

#[derive(Debug, Default, Clone)]
pub struct SequenceGate {
    issued: Seq,
    applied: Seq,
}

impl SequenceGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the id for a new request. Ids start at 1.
    pub fn issue(&mut self) -> Seq {
        self.issued += 1;
        self.issued
    }

    /// Decide whether the response to `seq` may be applied.
    pub fn admit(&mut self, seq: Seq) -> Admission {
        if seq == self.issued && seq > self.applied {
            self.applied = seq;
            Admission::Apply
        } else {
            crate::debug!("sync"; "discarded stale response seq={} latest={}", seq, self.issued);
            Admission::Stale {
                seq,
                latest: self.issued,
            }
        }
    }

    /// Abandon the in-flight request so its answer is treated as stale.
    pub fn supersede(&mut self) {
        self.applied = self.issued;
    }

    /// No request is awaiting an answer.
    pub fn is_idle(&self) -> bool {
        self.applied == self.issued
    }

    pub fn issued(&self) -> Seq {
        self.issued
    }

    pub fn applied(&self) -> Seq {
        self.applied
    }
}
