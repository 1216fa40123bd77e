//! Event payloads exchanged on the bus. Most carry a KIF term so a
//! pattern subscription can see into them; a few (rule and status events)
//! carry none.

use std::collections::HashMap;
use std::sync::Arc;

use reasoner_bus::Event;
use reasoner_context::Rule;
use reasoner_kb::{Assertion, AssertionId, PotentialAssertion};
use reasoner_term::Term;

/// Raw KIF text entering the system from a file, a socket, or an LLM
/// completion — not yet parsed or normalized. `source_note` names the
/// note this text is attributed to, if any; `None` targets the global
/// scope.
pub struct ExternalInput {
    pub text: String,
    pub source_note: Option<String>,
}

impl Event for ExternalInput {}

/// A normalized candidate, produced by [`crate::InputNormalizationPlugin`]
/// or a derivation plugin, on its way to the commit plugin.
pub struct ProposedAssertion {
    pub scope: Option<String>,
    pub candidate: PotentialAssertion,
}

impl Event for ProposedAssertion {
    fn kif(&self) -> Option<&Term> {
        Some(&self.candidate.kif)
    }
}

pub struct AssertionAdded {
    pub scope: Option<String>,
    pub assertion: Arc<Assertion>,
}

impl Event for AssertionAdded {
    fn kif(&self) -> Option<&Term> {
        Some(&self.assertion.kif)
    }
}

pub struct AssertionRetracted {
    pub scope: Option<String>,
    pub assertion: Arc<Assertion>,
}

impl Event for AssertionRetracted {
    fn kif(&self) -> Option<&Term> {
        Some(&self.assertion.kif)
    }
}

pub struct AssertionEvicted {
    pub scope: Option<String>,
    pub assertion: Arc<Assertion>,
}

impl Event for AssertionEvicted {
    fn kif(&self) -> Option<&Term> {
        Some(&self.assertion.kif)
    }
}

pub struct RuleAdded {
    pub rule: Arc<Rule>,
}

impl Event for RuleAdded {}

pub struct RuleRemoved {
    pub rule: Arc<Rule>,
}

impl Event for RuleRemoved {}

/// A request (from a user command or a contradiction handler) to remove
/// assertions or rules from the system.
pub enum RetractionRequest {
    /// Remove one assertion and its dependents from `scope`.
    ById { scope: Option<String>, id: AssertionId },
    /// Drop an entire note's knowledge base, dependents and all.
    ByNote { note: String },
    /// Parse `kif` as a rule form (`=>`/`<=>`) and remove the matching
    /// rule from the global rule set, if one exists.
    ByRuleForm { kif: String },
}

impl Event for RetractionRequest {}

/// Published after a note's knowledge base has been dropped in its
/// entirety by a [`RetractionRequest::ByNote`].
pub struct NoteRemoved {
    pub note: String,
}

impl Event for NoteRemoved {}

/// A snapshot of system size, published by the status-aggregation plugin
/// whenever the assertion or rule population changes.
pub struct SystemStatus {
    pub global_count: usize,
    pub note_counts: HashMap<String, usize>,
    pub rule_count: usize,
}

impl Event for SystemStatus {}
