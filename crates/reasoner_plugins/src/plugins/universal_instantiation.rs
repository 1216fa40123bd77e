use std::sync::Arc;

use reasoner_bus::EventBus;
use reasoner_context::{derived_depth, derived_priority, passes_derivation_guards, Context};
use reasoner_kb::{is_trivial, Assertion, AssertionId, AssertionKind, KnowledgeBase, PotentialAssertion};
use reasoner_term::Term;
use reasoner_unify::{match_term, subst, Bindings};

use crate::events::{AssertionAdded, ProposedAssertion};
use crate::lifecycle::Lifecycle;

use super::Plugin;

/// Instantiates `universal` against `fact`: matches the universal's body
/// as a pattern against `fact`, and only instantiates if every one of the
/// universal's quantified variables actually gets bound in the process.
/// Unlike a blind per-constant substitution, this respects the
/// universal's full structure (predicate, arity, shared variables) and
/// extends to any number of quantified variables.
fn instantiate(universal: &Assertion, fact: &Term) -> Option<Term> {
    let bindings = match_term(&universal.kif, fact, &Bindings::default())?;
    if !universal.quantified_vars.iter().all(|v| bindings.get(v).is_some()) {
        return None;
    }
    let instantiated = subst(&universal.kif, &bindings);
    instantiated.is_ground().then_some(instantiated)
}

fn universals_for(kb: &KnowledgeBase, predicate: &str) -> Vec<Assertion> {
    kb.find_universals_by_predicate(predicate)
}

/// Every ground/skolem assertion in `kb` built on `predicate` — the
/// candidates a newly-asserted universal can instantiate against.
fn facts_by_predicate(kb: &KnowledgeBase, predicate: &str) -> Vec<Assertion> {
    let ids: std::collections::HashSet<AssertionId> = kb.ids().into_iter().collect();
    ids.into_iter()
        .filter_map(|id| kb.get(id))
        .filter(|a| a.kind != AssertionKind::Universal && a.kif.operator() == Some(predicate))
        .collect()
}

fn candidate_from(universal: &Assertion, fact: &Assertion, scope: Option<String>) -> Option<ProposedAssertion> {
    let instantiated = instantiate(universal, &fact.kif)?;
    if is_trivial(&instantiated) {
        return None;
    }
    let supports = vec![universal.clone(), fact.clone()];
    let depth = derived_depth(&supports);
    if !passes_derivation_guards(&instantiated, depth) {
        return None;
    }
    let candidate = PotentialAssertion {
        kif: instantiated,
        priority: derived_priority(&supports),
        source_note: scope.clone(),
        support: supports.iter().map(|a| a.id).collect(),
        kind: AssertionKind::Ground,
        is_equality: false,
        is_oriented_equality: false,
        is_negated: false,
        quantified_vars: Vec::new(),
        depth,
    };
    Some(ProposedAssertion { scope, candidate })
}

/// Plays two roles: when a new ground/skolem fact lands, it's matched
/// against every universal sharing its predicate already in scope; when
/// a new universal lands, it's matched against every ground/skolem fact
/// already asserted on its own predicate. Either way the search stays in
/// the assertion's own scope and the global scope.
pub struct UniversalInstantiationPlugin;

impl Plugin for UniversalInstantiationPlugin {
    fn name(&self) -> &str {
        "universal-instantiation"
    }

    fn init(&self, bus: &Arc<EventBus>, ctx: &Arc<Context>, lifecycle: &Arc<Lifecycle>) {
        let ctx = ctx.clone();
        let bus_out = bus.clone();
        let lifecycle = lifecycle.clone();
        bus.subscribe::<AssertionAdded, _>(move |added| {
            lifecycle.gate();
            let own_kb = ctx.get_kb(added.scope.as_deref());
            let global_kb = ctx.get_kb(None);

            if added.assertion.kind == AssertionKind::Universal {
                let Some(predicate) = added.assertion.kif.operator() else {
                    return;
                };
                let mut facts = facts_by_predicate(&own_kb, predicate);
                if added.scope.is_some() {
                    facts.extend(facts_by_predicate(&global_kb, predicate));
                }
                for fact in facts {
                    if let Some(proposed) = candidate_from(&added.assertion, &fact, added.scope.clone()) {
                        bus_out.publish(proposed);
                    }
                }
                return;
            }

            let Some(predicate) = added.assertion.kif.operator() else {
                return;
            };
            let mut universals = universals_for(&own_kb, predicate);
            if added.scope.is_some() {
                universals.extend(universals_for(&global_kb, predicate));
            }
            for universal in universals {
                if let Some(proposed) = candidate_from(&universal, &added.assertion, added.scope.clone()) {
                    bus_out.publish(proposed);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn universal(body: Term, vars: &[&str]) -> Assertion {
        Assertion {
            id: 1,
            kif: body,
            priority: 1.0,
            timestamp: 1,
            source_note: None,
            support: Vec::new(),
            kind: AssertionKind::Universal,
            is_equality: false,
            is_oriented_equality: false,
            is_negated: false,
            quantified_vars: vars.iter().map(|v| reasoner_term::intern_var(v)).collect(),
            depth: 0,
        }
    }

    fn ground(kif: Term) -> Assertion {
        Assertion {
            id: 2,
            kif,
            priority: 1.0,
            timestamp: 2,
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

    #[test]
    fn instantiates_universal_against_matching_fact() {
        let u = universal(Term::list(vec![Term::atom("mortal"), Term::var("?x")]), &["?x"]);
        let fact = ground(Term::list(vec![Term::atom("mortal"), Term::atom("Socrates")]));
        let result = instantiate(&u, &fact.kif).unwrap();
        assert_eq!(result, Term::list(vec![Term::atom("mortal"), Term::atom("Socrates")]));
    }

    #[test]
    fn instantiates_multi_variable_universal_when_all_vars_bind() {
        let u = universal(
            Term::list(vec![Term::atom("likes"), Term::var("?x"), Term::var("?y")]),
            &["?x", "?y"],
        );
        let fact = ground(Term::list(vec![Term::atom("likes"), Term::atom("Alice"), Term::atom("Bob")]));
        let result = instantiate(&u, &fact.kif).unwrap();
        assert_eq!(
            result,
            Term::list(vec![Term::atom("likes"), Term::atom("Alice"), Term::atom("Bob")])
        );
    }

    #[test]
    fn rejects_when_shapes_do_not_match() {
        let u = universal(Term::list(vec![Term::atom("mortal"), Term::var("?x")]), &["?x"]);
        let fact = ground(Term::list(vec![
            Term::atom("mortal"),
            Term::atom("Socrates"),
            Term::atom("extra"),
        ]));
        assert!(instantiate(&u, &fact.kif).is_none());
    }

    #[test]
    fn rejects_when_a_quantified_variable_is_left_unbound() {
        let u = universal(
            Term::list(vec![Term::atom("likes"), Term::var("?x"), Term::atom("Everyone")]),
            &["?x", "?y"],
        );
        let fact = ground(Term::list(vec![Term::atom("likes"), Term::atom("Alice"), Term::atom("Everyone")]));
        assert!(instantiate(&u, &fact.kif).is_none());
    }
}
