//! A single scope's worth of assertions: ground facts, skolemized facts,
//! and universally-quantified facts, indexed for unifiable/instance/
//! generalization retrieval, with subsumption on commit, a dependency
//! graph driving cascade retraction, and priority/age-ordered eviction
//! once the scope is at capacity. One `KnowledgeBase` guards all of its
//! state behind a single read/write lock — callers either read a
//! consistent snapshot or perform one mutation at a time, never both.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use parking_lot::RwLock;
use reasoner_index::PathIndex;
use reasoner_term::{intern_atom, Symbol, Term};
use reasoner_unify::{match_term, Bindings};
use rustc_hash::{FxHashMap, FxHashSet};

pub type AssertionId = u64;

/// What role an assertion plays: a plain ground fact, a fact that required
/// skolemization to remove an existential, or a universally quantified
/// fact whose `quantified_vars` range over all of `kif`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssertionKind {
    Ground,
    Skolemized,
    Universal,
}

/// A committed fact. `support` names the assertions (in any scope) this
/// one was derived from; an empty support set means it came from input
/// rather than inference.
#[derive(Clone, Debug)]
pub struct Assertion {
    pub id: AssertionId,
    pub kif: Term,
    pub priority: f64,
    pub timestamp: u64,
    pub source_note: Option<String>,
    pub support: Vec<AssertionId>,
    pub kind: AssertionKind,
    pub is_equality: bool,
    pub is_oriented_equality: bool,
    pub is_negated: bool,
    pub quantified_vars: Vec<Symbol>,
    pub depth: u32,
}

/// A candidate for commit, before the knowledge base has assigned it an
/// identifier and a timestamp.
#[derive(Clone, Debug)]
pub struct PotentialAssertion {
    pub kif: Term,
    pub priority: f64,
    pub source_note: Option<String>,
    pub support: Vec<AssertionId>,
    pub kind: AssertionKind,
    pub is_equality: bool,
    pub is_oriented_equality: bool,
    pub is_negated: bool,
    pub quantified_vars: Vec<Symbol>,
    pub depth: u32,
}

/// One victim popped off the eviction queue, together with everything its
/// removal cascaded into. `victim_id` is the id that was actually polled
/// off the queue; `removed` lists it and every dependent retracted along
/// with it, in parent-before-dependents order.
#[derive(Debug)]
pub struct EvictionBatch {
    pub victim_id: AssertionId,
    pub removed: Vec<Assertion>,
}

/// Result of trying to commit a [`PotentialAssertion`].
#[derive(Debug)]
pub enum CommitOutcome {
    /// Accepted as `assertion`; `evicted` lists each eviction capacity
    /// pressure forced out as a side effect (possibly including `assertion`
    /// itself, if it turned out to be the lowest-priority/oldest entry).
    Accepted {
        assertion: Assertion,
        evicted: Vec<EvictionBatch>,
    },
    /// The KIF was trivially true (e.g. `(= a a)`) or not a list at all.
    RejectedTrivial,
    /// An existing assertion already generalizes this one.
    RejectedSubsumed { by: AssertionId },
}

#[derive(Debug, Clone, Copy)]
pub struct KbStats {
    pub count: usize,
    pub capacity: usize,
    pub universal_count: usize,
}

/// Order-preserving map from `f64` to `u64`, so priorities can live in a
/// `BinaryHeap` without `Ord`. Flip the sign bit for non-negative values,
/// invert everything for negative ones.
fn priority_key(priority: f64) -> u64 {
    let bits = priority.to_bits();
    if priority.is_sign_negative() {
        !bits
    } else {
        bits | (1 << 63)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct EvictionKey {
    priority: u64,
    timestamp: u64,
    id: AssertionId,
}

impl EvictionKey {
    fn new(priority: f64, timestamp: u64, id: AssertionId) -> Self {
        EvictionKey {
            priority: priority_key(priority),
            timestamp,
            id,
        }
    }
}

impl PartialOrd for EvictionKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EvictionKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then(self.timestamp.cmp(&other.timestamp))
            .then(self.id.cmp(&other.id))
    }
}

/// Predicates that are reflexive by definition: `(p X X)` carries no
/// information no matter what `X` is.
const REFLEXIVE_PREDICATES: &[&str] = &[
    "instance",
    "subclass",
    "subrelation",
    "equivalent",
    "same",
    "equal",
    "domain",
    "range",
];

/// Reject non-lists outright; reject `(p X X)` for `=` or any reflexive
/// predicate with structurally identical sides; reject `(not L)` whenever
/// `L` itself is trivial.
pub fn is_trivial(term: &Term) -> bool {
    if !term.is_list() {
        return true;
    }
    let children = term.children().unwrap();
    match term.operator() {
        Some("not") => children.len() == 2 && is_trivial(&children[1]),
        Some(op) if op == "=" || REFLEXIVE_PREDICATES.contains(&op) => {
            children.len() == 3 && children[1] == children[2]
        }
        _ => false,
    }
}

struct Inner {
    assertions: FxHashMap<AssertionId, Assertion>,
    index: PathIndex,
    universal_index: FxHashMap<Symbol, FxHashSet<AssertionId>>,
    dependents: FxHashMap<AssertionId, FxHashSet<AssertionId>>,
    eviction_queue: BinaryHeap<Reverse<EvictionKey>>,
}

impl Inner {
    fn new() -> Self {
        Inner {
            assertions: FxHashMap::default(),
            index: PathIndex::new(),
            universal_index: FxHashMap::default(),
            dependents: FxHashMap::default(),
            eviction_queue: BinaryHeap::new(),
        }
    }

    fn is_subsumed(&self, term: &Term) -> Option<AssertionId> {
        for id in self.index.find_generalizations(term) {
            if let Some(existing) = self.assertions.get(&id) {
                if match_term(&existing.kif, term, &Bindings::default()).is_some() {
                    return Some(id);
                }
            }
        }
        None
    }

    /// Remove `id` and everything transitively dependent on it, in
    /// parent-before-dependents order (breadth-first from `id`), so a
    /// caller publishing one event per removal keeps a parent's event
    /// ahead of its dependents'.
    fn retract_cascade(&mut self, id: AssertionId) -> Vec<Assertion> {
        let mut order = Vec::new();
        let mut visited = FxHashSet::default();
        let mut queue = VecDeque::from([id]);
        visited.insert(id);
        while let Some(current) = queue.pop_front() {
            order.push(current);
            if let Some(deps) = self.dependents.get(&current) {
                for dep in deps.iter().copied() {
                    if visited.insert(dep) {
                        queue.push_back(dep);
                    }
                }
            }
        }
        let mut removed = Vec::new();
        for victim in order {
            if let Some(assertion) = self.assertions.remove(&victim) {
                self.index.remove(&assertion.kif, victim);
                if assertion.kind == AssertionKind::Universal {
                    if let Some(pred) = assertion.kif.operator() {
                        if let Some(set) = self.universal_index.get_mut(&intern_atom(pred)) {
                            set.remove(&victim);
                        }
                    }
                }
                self.dependents.remove(&victim);
                for sup in &assertion.support {
                    if let Some(set) = self.dependents.get_mut(sup) {
                        set.remove(&victim);
                    }
                }
                removed.push(assertion);
            }
        }
        removed
    }

    /// Pops the next eviction candidate still present and still of
    /// ground/skolem kind (lazy deletion: ids that were since retracted,
    /// or entries the queue never should have held, are just skipped).
    fn pop_viable_victim(&mut self) -> Option<AssertionId> {
        while let Some(Reverse(key)) = self.eviction_queue.pop() {
            match self.assertions.get(&key.id) {
                Some(assertion) if assertion.kind != AssertionKind::Universal => {
                    return Some(key.id);
                }
                _ => continue,
            }
        }
        None
    }
}

/// Bounded, indexed store of assertions for one scope (the global context
/// or a single note).
pub struct KnowledgeBase {
    capacity: usize,
    inner: RwLock<Inner>,
}

impl KnowledgeBase {
    pub fn new(capacity: usize) -> Self {
        KnowledgeBase {
            capacity,
            inner: RwLock::new(Inner::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Try to admit `candidate` as assertion `id`, stamped with the given
    /// logical `timestamp`. Rejects trivial or subsumed KIF without
    /// touching any state; otherwise indexes the assertion, wires its
    /// dependency edges, and evicts from the bottom of the priority/age
    /// order until back at capacity.
    pub fn commit(&self, id: AssertionId, timestamp: u64, candidate: PotentialAssertion) -> CommitOutcome {
        if is_trivial(&candidate.kif) {
            return CommitOutcome::RejectedTrivial;
        }
        let mut inner = self.inner.write();
        if let Some(by) = inner.is_subsumed(&candidate.kif) {
            return CommitOutcome::RejectedSubsumed { by };
        }
        let assertion = Assertion {
            id,
            kif: candidate.kif,
            priority: candidate.priority,
            timestamp,
            source_note: candidate.source_note,
            support: candidate.support,
            kind: candidate.kind,
            is_equality: candidate.is_equality,
            is_oriented_equality: candidate.is_oriented_equality,
            is_negated: candidate.is_negated,
            quantified_vars: candidate.quantified_vars,
            depth: candidate.depth,
        };
        inner.index.insert(&assertion.kif, id);
        if assertion.kind == AssertionKind::Universal {
            if let Some(pred) = assertion.kif.operator() {
                inner.universal_index.entry(intern_atom(pred)).or_default().insert(id);
            }
        }
        for sup in &assertion.support {
            inner.dependents.entry(*sup).or_default().insert(id);
        }
        if assertion.kind != AssertionKind::Universal {
            inner
                .eviction_queue
                .push(Reverse(EvictionKey::new(assertion.priority, timestamp, id)));
        }
        inner.assertions.insert(id, assertion.clone());

        let mut evicted = Vec::new();
        while inner.assertions.len() > self.capacity {
            match inner.pop_viable_victim() {
                Some(victim) => {
                    let removed = inner.retract_cascade(victim);
                    if !removed.is_empty() {
                        evicted.push(EvictionBatch { victim_id: victim, removed });
                    }
                }
                None => break,
            }
        }
        CommitOutcome::Accepted { assertion, evicted }
    }

    /// Remove `id` and everything transitively derived from it. Returns
    /// every assertion actually removed (empty if `id` wasn't present).
    pub fn retract(&self, id: AssertionId) -> Vec<Assertion> {
        let mut inner = self.inner.write();
        inner.retract_cascade(id)
    }

    /// Remove everything, returning what was removed.
    pub fn clear(&self) -> Vec<Assertion> {
        let mut inner = self.inner.write();
        let removed: Vec<Assertion> = inner.assertions.drain().map(|(_, a)| a).collect();
        inner.index = PathIndex::new();
        inner.universal_index.clear();
        inner.dependents.clear();
        inner.eviction_queue.clear();
        removed
    }

    pub fn get(&self, id: AssertionId) -> Option<Assertion> {
        self.inner.read().assertions.get(&id).cloned()
    }

    pub fn ids(&self) -> Vec<AssertionId> {
        self.inner.read().assertions.keys().copied().collect()
    }

    pub fn count(&self) -> usize {
        self.inner.read().assertions.len()
    }

    pub fn find_unifiable(&self, term: &Term) -> Vec<Assertion> {
        let inner = self.inner.read();
        inner
            .index
            .find_unifiable(term)
            .into_iter()
            .filter_map(|id| inner.assertions.get(&id).cloned())
            .collect()
    }

    pub fn find_instances(&self, pattern: &Term) -> Vec<Assertion> {
        let inner = self.inner.read();
        inner
            .index
            .find_instances(pattern)
            .into_iter()
            .filter_map(|id| inner.assertions.get(&id).cloned())
            .collect()
    }

    pub fn find_generalizations(&self, term: &Term) -> Vec<Assertion> {
        let inner = self.inner.read();
        inner
            .index
            .find_generalizations(term)
            .into_iter()
            .filter_map(|id| inner.assertions.get(&id).cloned())
            .collect()
    }

    /// Every universally-quantified assertion whose body's operator is
    /// `predicate` — candidates for universal instantiation against a
    /// newly committed ground fact built on that predicate.
    pub fn find_universals_by_predicate(&self, predicate: &str) -> Vec<Assertion> {
        let inner = self.inner.read();
        let sym = intern_atom(predicate);
        inner
            .universal_index
            .get(&sym)
            .into_iter()
            .flatten()
            .filter_map(|id| inner.assertions.get(id).cloned())
            .collect()
    }

    pub fn stats(&self) -> KbStats {
        let inner = self.inner.read();
        KbStats {
            count: inner.assertions.len(),
            capacity: self.capacity,
            universal_count: inner.universal_index.values().map(|s| s.len()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ground_fact(kif: Term) -> PotentialAssertion {
        PotentialAssertion {
            kif,
            priority: 1.0,
            source_note: None,
            support: Vec::new(),
            kind: AssertionKind::Ground,
            is_equality: false,
            is_oriented_equality: false,
            is_negated: false,
            quantified_vars: Vec::new(),
            depth: 0,
        }
    }

    fn subclass(a: &str, b: &str) -> Term {
        Term::list(vec![Term::atom("subclass"), Term::atom(a), Term::atom(b)])
    }

    #[test]
    fn commit_accepts_a_fresh_ground_fact() {
        let kb = KnowledgeBase::new(10);
        let outcome = kb.commit(1, 1, ground_fact(subclass("Cat", "Mammal")));
        assert!(matches!(outcome, CommitOutcome::Accepted { .. }));
        assert_eq!(kb.count(), 1);
    }

    #[test]
    fn commit_rejects_reflexive_equality() {
        let kb = KnowledgeBase::new(10);
        let kif = Term::list(vec![Term::atom("="), Term::atom("a"), Term::atom("a")]);
        let outcome = kb.commit(1, 1, ground_fact(kif));
        assert!(matches!(outcome, CommitOutcome::RejectedTrivial));
        assert_eq!(kb.count(), 0);
    }

    #[test]
    fn commit_rejects_reflexive_predicate_forms() {
        let kb = KnowledgeBase::new(10);
        let kif = Term::list(vec![Term::atom("instance"), Term::atom("Cat"), Term::atom("Cat")]);
        let outcome = kb.commit(1, 1, ground_fact(kif));
        assert!(matches!(outcome, CommitOutcome::RejectedTrivial));
    }

    #[test]
    fn commit_rejects_negated_trivial_form() {
        let kb = KnowledgeBase::new(10);
        let kif = Term::list(vec![
            Term::atom("not"),
            Term::list(vec![Term::atom("="), Term::atom("a"), Term::atom("a")]),
        ]);
        let outcome = kb.commit(1, 1, ground_fact(kif));
        assert!(matches!(outcome, CommitOutcome::RejectedTrivial));
    }

    #[test]
    fn commit_rejects_exact_duplicate_as_subsumed() {
        let kb = KnowledgeBase::new(10);
        kb.commit(1, 1, ground_fact(subclass("Cat", "Mammal")));
        let outcome = kb.commit(2, 2, ground_fact(subclass("Cat", "Mammal")));
        assert!(matches!(outcome, CommitOutcome::RejectedSubsumed { by: 1 }));
    }

    #[test]
    fn commit_rejects_ground_fact_subsumed_by_stored_universal() {
        let kb = KnowledgeBase::new(10);
        let universal = PotentialAssertion {
            kind: AssertionKind::Universal,
            quantified_vars: vec![reasoner_term::intern_var("?x")],
            ..ground_fact(Term::list(vec![
                Term::atom("subclass"),
                Term::var("?x"),
                Term::atom("Mammal"),
            ]))
        };
        kb.commit(1, 1, universal);
        let outcome = kb.commit(2, 2, ground_fact(subclass("Cat", "Mammal")));
        assert!(matches!(outcome, CommitOutcome::RejectedSubsumed { by: 1 }));
    }

    #[test]
    fn retract_cascades_to_derived_assertions() {
        let kb = KnowledgeBase::new(10);
        kb.commit(1, 1, ground_fact(subclass("Cat", "Mammal")));
        let derived = PotentialAssertion {
            support: vec![1],
            ..ground_fact(subclass("Mammal", "Animal"))
        };
        kb.commit(2, 2, derived);
        let removed = kb.retract(1);
        let removed_ids: FxHashSet<AssertionId> = removed.iter().map(|a| a.id).collect();
        assert!(removed_ids.contains(&1));
        assert!(removed_ids.contains(&2));
        assert_eq!(kb.count(), 0);
    }

    #[test]
    fn capacity_evicts_lowest_priority_oldest_first() {
        let kb = KnowledgeBase::new(2);
        kb.commit(1, 1, PotentialAssertion { priority: 0.1, ..ground_fact(subclass("A", "X")) });
        kb.commit(2, 2, PotentialAssertion { priority: 0.9, ..ground_fact(subclass("B", "X")) });
        let outcome = kb.commit(3, 3, PotentialAssertion { priority: 0.5, ..ground_fact(subclass("C", "X")) });
        match outcome {
            CommitOutcome::Accepted { evicted, .. } => {
                assert_eq!(evicted.len(), 1);
                assert_eq!(evicted[0].victim_id, 1);
                assert_eq!(evicted[0].removed.len(), 1);
                assert_eq!(evicted[0].removed[0].id, 1);
            }
            _ => panic!("expected acceptance"),
        }
        assert_eq!(kb.count(), 2);
    }

    #[test]
    fn capacity_pressure_never_evicts_a_universal() {
        let kb = KnowledgeBase::new(2);
        let universal = PotentialAssertion {
            priority: 0.0,
            kind: AssertionKind::Universal,
            quantified_vars: vec![reasoner_term::intern_var("?x")],
            ..ground_fact(Term::list(vec![Term::atom("mortal"), Term::var("?x")]))
        };
        kb.commit(1, 1, universal);
        kb.commit(2, 2, PotentialAssertion { priority: 0.9, ..ground_fact(subclass("B", "X")) });
        // The universal (id 1) has the lowest priority of all three, but it
        // must never be the eviction victim: the ground fact with the next
        // lowest priority (id 3) is evicted in its place.
        let outcome = kb.commit(3, 3, PotentialAssertion { priority: 0.5, ..ground_fact(subclass("C", "X")) });
        match outcome {
            CommitOutcome::Accepted { evicted, .. } => {
                assert_eq!(evicted.len(), 1);
                assert_eq!(evicted[0].victim_id, 3);
            }
            _ => panic!("expected acceptance"),
        }
        assert_eq!(kb.count(), 2);
        assert!(kb.get(1).is_some(), "universal must survive capacity pressure");
    }

    #[test]
    fn retract_cascade_orders_parent_before_dependents() {
        let kb = KnowledgeBase::new(10);
        kb.commit(1, 1, ground_fact(subclass("Cat", "Mammal")));
        let derived = PotentialAssertion {
            support: vec![1],
            ..ground_fact(subclass("Mammal", "Animal"))
        };
        kb.commit(2, 2, derived);
        let removed = kb.retract(1);
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0].id, 1);
        assert_eq!(removed[1].id, 2);
    }

    #[test]
    fn clear_empties_everything() {
        let kb = KnowledgeBase::new(10);
        kb.commit(1, 1, ground_fact(subclass("Cat", "Mammal")));
        kb.commit(2, 2, ground_fact(subclass("Dog", "Mammal")));
        let removed = kb.clear();
        assert_eq!(removed.len(), 2);
        assert_eq!(kb.count(), 0);
        assert!(kb.find_unifiable(&Term::var("?x")).is_empty());
    }

    #[test]
    fn find_universals_by_predicate_returns_matching_rules_only() {
        let kb = KnowledgeBase::new(10);
        let universal = PotentialAssertion {
            kind: AssertionKind::Universal,
            quantified_vars: vec![reasoner_term::intern_var("?x")],
            ..ground_fact(Term::list(vec![
                Term::atom("subclass"),
                Term::var("?x"),
                Term::atom("Mammal"),
            ]))
        };
        kb.commit(1, 1, universal);
        let hits = kb.find_universals_by_predicate("subclass");
        assert_eq!(hits.len(), 1);
        assert!(kb.find_universals_by_predicate("instance").is_empty());
    }

    #[test]
    fn stats_reports_count_capacity_and_universal_count() {
        let kb = KnowledgeBase::new(5);
        kb.commit(1, 1, ground_fact(subclass("Cat", "Mammal")));
        let stats = kb.stats();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.capacity, 5);
        assert_eq!(stats.universal_count, 0);
    }
}
