//! Ties a global knowledge base together with one knowledge base per
//! note, a shared rule set, and the id/timestamp/skolem counters every
//! scope draws from. Nothing here holds a lock across a knowledge-base
//! call: each `KnowledgeBase` already serializes its own state, so the
//! context only needs to serialize the note-table and rule-table
//! mutations that create or remove a scope.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use reasoner_kb::{is_trivial, Assertion, AssertionId, KnowledgeBase};
use reasoner_term::{Term, SKOLEM_CONSTANT_PREFIX, SKOLEM_FUNCTION_PREFIX};
use rustc_hash::FxHashMap;

/// One clause of a rule's antecedent conjunction.
#[derive(Clone, Debug, PartialEq)]
pub enum Clause {
    Positive(Term),
    Negative(Term),
}

/// A standing forward-chaining rule. Two rules with the same canonical
/// `form` are the same rule regardless of id, so re-asserting an existing
/// rule is a no-op rather than a duplicate.
#[derive(Clone, Debug)]
pub struct Rule {
    pub id: u64,
    pub form: Term,
    pub antecedent: Vec<Clause>,
    pub consequent: Term,
    pub priority: f64,
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.form == other.form
    }
}

impl Eq for Rule {}

/// Split a rule's antecedent into clauses: a top-level `(and ...)` becomes
/// one clause per conjunct, anything else is a single clause, and `(not
/// X)` becomes a negative clause on `X`.
pub fn antecedent_clauses(antecedent: &Term) -> Vec<Clause> {
    match antecedent.operator() {
        Some("and") => antecedent.children().unwrap()[1..].iter().map(clause_of).collect(),
        _ => vec![clause_of(antecedent)],
    }
}

fn clause_of(term: &Term) -> Clause {
    if term.operator() == Some("not") {
        if let Some(children) = term.children() {
            if children.len() == 2 {
                return Clause::Negative(children[1].clone());
            }
        }
    }
    Clause::Positive(term.clone())
}

/// A hop away from its supports decays priority by this factor.
pub const DERIVATION_DECAY: f64 = 0.9;

/// The priority of a derived assertion: the weakest support's priority,
/// discounted by one hop of derivation. `1.0` if there are no supports
/// (an assertion with no support is input, not derived).
pub fn derived_priority(supports: &[Assertion]) -> f64 {
    let weakest = supports
        .iter()
        .map(|a| a.priority)
        .fold(f64::INFINITY, f64::min);
    if weakest.is_finite() {
        weakest * DERIVATION_DECAY
    } else {
        1.0
    }
}

/// One more than the deepest support's depth; `0` for unsupported input.
pub fn derived_depth(supports: &[Assertion]) -> u32 {
    supports.iter().map(|a| a.depth).max().map_or(0, |d| d + 1)
}

/// A rewrite by an oriented equality decays priority by this factor,
/// applied to the average of the rewritten assertion's and the equality
/// rule's own priority rather than `derived_priority`'s "weakest support"
/// rule — a rewrite is a substitution, not a join, so both sides
/// contribute equally to how much to trust the result.
pub const EQUALITY_REWRITE_DECAY: f64 = 0.95;

/// The priority of a term produced by rewriting `target` with `rule` (an
/// oriented equality): the mean of the two priorities, discounted by one
/// rewrite hop.
pub fn equality_rewrite_priority(target: &Assertion, rule: &Assertion) -> f64 {
    ((target.priority + rule.priority) / 2.0) * EQUALITY_REWRITE_DECAY
}

/// A derived candidate past this many derivation hops is no longer
/// published; chains this deep have decayed into noise.
pub const MAX_DERIVED_DEPTH: u32 = 4;

/// A derived candidate heavier than this is no longer published; a
/// derivation that needs a term this large has likely wandered off into
/// an unproductive expansion.
pub const MAX_DERIVED_WEIGHT: u64 = 150;

/// Whether a derivation plugin should publish `term` at `depth`: not
/// trivial, not past the depth bound, and not past the weight bound.
pub fn passes_derivation_guards(term: &Term, depth: u32) -> bool {
    depth <= MAX_DERIVED_DEPTH && term.weight() <= MAX_DERIVED_WEIGHT && !is_trivial(term)
}

/// `Some(note)` if every assertion in `supports` was attributed to the
/// same note; `None` if they disagree or any came from the global scope.
pub fn common_source_note(supports: &[Assertion]) -> Option<String> {
    let mut iter = supports.iter();
    let first = iter.next()?.source_note.clone()?;
    if iter.all(|a| a.source_note.as_deref() == Some(first.as_str())) {
        Some(first)
    } else {
        None
    }
}

/// Recursively simplify `term`: collapse double negation, flatten nested
/// `and`/`or`, and unwrap a single-conjunct/disjunct list to its lone
/// member.
pub fn simplify(term: &Term) -> Term {
    if !term.is_list() {
        return term.clone();
    }
    let children = term.children().unwrap();
    match term.operator() {
        Some("not") if children.len() == 2 => {
            let inner = simplify(&children[1]);
            if inner.operator() == Some("not") {
                let inner_children = inner.children().unwrap();
                return simplify(&inner_children[1]);
            }
            Term::list(vec![Term::atom("not"), inner])
        }
        Some(op @ ("and" | "or")) => {
            let mut flat = Vec::new();
            for c in &children[1..] {
                let simplified = simplify(c);
                if simplified.operator() == Some(op) {
                    flat.extend(simplified.children().unwrap()[1..].iter().cloned());
                } else {
                    flat.push(simplified);
                }
            }
            if flat.len() == 1 {
                flat.into_iter().next().unwrap()
            } else {
                let mut rebuilt = vec![Term::atom(op)];
                rebuilt.extend(flat);
                Term::list(rebuilt)
            }
        }
        _ => {
            let simplified: Vec<Term> = children.iter().map(simplify).collect();
            if simplified == *children {
                term.clone()
            } else {
                Term::list(simplified)
            }
        }
    }
}

/// The global and per-note knowledge bases, the rule set, and the
/// counters that hand out assertion ids, logical timestamps, rule ids,
/// and skolem symbols.
pub struct Context {
    global: Arc<KnowledgeBase>,
    notes: RwLock<FxHashMap<String, Arc<KnowledgeBase>>>,
    rules: RwLock<Vec<Rule>>,
    default_kb_capacity: usize,
    next_id: AtomicU64,
    next_rule_id: AtomicU64,
    skolem_counter: AtomicU64,
}

impl Context {
    pub fn new(kb_capacity: usize) -> Self {
        Context {
            global: Arc::new(KnowledgeBase::new(kb_capacity)),
            notes: RwLock::new(FxHashMap::default()),
            rules: RwLock::new(Vec::new()),
            default_kb_capacity: kb_capacity,
            next_id: AtomicU64::new(1),
            next_rule_id: AtomicU64::new(1),
            skolem_counter: AtomicU64::new(1),
        }
    }

    /// The global scope, or the named note's scope (created on first use).
    pub fn get_kb(&self, note: Option<&str>) -> Arc<KnowledgeBase> {
        match note {
            None => self.global.clone(),
            Some(name) => {
                if let Some(kb) = self.notes.read().get(name) {
                    return kb.clone();
                }
                self.notes
                    .write()
                    .entry(name.to_string())
                    .or_insert_with(|| Arc::new(KnowledgeBase::new(self.default_kb_capacity)))
                    .clone()
            }
        }
    }

    pub fn remove_kb(&self, note: &str) -> Option<Arc<KnowledgeBase>> {
        self.notes.write().remove(note)
    }

    pub fn note_names(&self) -> Vec<String> {
        self.notes.read().keys().cloned().collect()
    }

    /// Every unifiable candidate for `term` across the global scope and
    /// every note, tagged with the scope it came from (`None` = global).
    pub fn find_anywhere(&self, term: &Term) -> Vec<(Option<String>, Assertion)> {
        let mut out: Vec<(Option<String>, Assertion)> =
            self.global.find_unifiable(term).into_iter().map(|a| (None, a)).collect();
        for (name, kb) in self.notes.read().iter() {
            out.extend(kb.find_unifiable(term).into_iter().map(|a| (Some(name.clone()), a)));
        }
        out
    }

    /// A fresh `(assertion id, logical timestamp)` pair. The two share one
    /// counter: ids are already monotonic, so using the same sequence as
    /// the timestamp is enough to order assertions by age without a
    /// second clock.
    pub fn next_assertion_stamp(&self) -> (AssertionId, u64) {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        (n, n)
    }

    pub fn add_rule(&self, form: Term, consequent: Term, priority: f64) -> Rule {
        let antecedent = antecedent_clauses(&form);
        let rule = Rule {
            id: self.next_rule_id.fetch_add(1, Ordering::Relaxed),
            form,
            antecedent,
            consequent,
            priority,
        };
        let mut rules = self.rules.write();
        if let Some(existing) = rules.iter().find(|r| **r == rule) {
            return existing.clone();
        }
        rules.push(rule.clone());
        rule
    }

    pub fn remove_rule(&self, id: u64) -> Option<Rule> {
        let mut rules = self.rules.write();
        let pos = rules.iter().position(|r| r.id == id)?;
        Some(rules.remove(pos))
    }

    pub fn rules(&self) -> Vec<Rule> {
        self.rules.read().clone()
    }

    /// A fresh skolem constant, for eliminating an existential with no
    /// remaining universal dependencies.
    pub fn skolemize_constant(&self) -> Term {
        let n = self.skolem_counter.fetch_add(1, Ordering::Relaxed);
        Term::atom(&format!("{SKOLEM_CONSTANT_PREFIX}{n}"))
    }

    /// A fresh skolem function applied to `args`, for eliminating an
    /// existential that depends on the given universally-quantified
    /// variables.
    pub fn skolemize_function(&self, args: &[Term]) -> Term {
        let n = self.skolem_counter.fetch_add(1, Ordering::Relaxed);
        let mut children = vec![Term::atom(&format!("{SKOLEM_FUNCTION_PREFIX}{n}"))];
        children.extend(args.iter().cloned());
        Term::list(children)
    }
}
