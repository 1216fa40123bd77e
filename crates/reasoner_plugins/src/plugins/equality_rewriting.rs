use std::sync::Arc;

use reasoner_bus::EventBus;
use reasoner_context::{equality_rewrite_priority, passes_derivation_guards, Context};
use reasoner_kb::{is_trivial, Assertion, AssertionId, AssertionKind, PotentialAssertion};
use reasoner_unify::rewrite;

use crate::events::{AssertionAdded, ProposedAssertion};
use crate::lifecycle::Lifecycle;
use crate::normalize::classify;

use super::Plugin;

/// Tries rewriting `target` with `rule` (an oriented equality) as a
/// left-to-right rule. Returns `None` for every case that wouldn't yield
/// a useful new candidate: the rule applied to itself, no matching
/// subterm, a no-op rewrite, or a result that fails the shared trivial/
/// depth/weight derivation guards.
fn try_rewrite(rule_eq: &Assertion, target: &Assertion, scope: Option<String>) -> Option<ProposedAssertion> {
    if rule_eq.id == target.id {
        return None;
    }
    let children = rule_eq.kif.children()?;
    let (lhs, rhs) = (&children[1], &children[2]);
    let rewritten = rewrite(&target.kif, lhs, rhs)?;
    if rewritten == target.kif {
        return None;
    }
    if is_trivial(&rewritten) {
        return None;
    }
    let supports = vec![rule_eq.clone(), target.clone()];
    let depth = supports.iter().map(|a| a.depth).max().map_or(0, |d| d + 1);
    if !passes_derivation_guards(&rewritten, depth) {
        return None;
    }
    let (is_equality, is_oriented_equality, is_negated) = classify(&rewritten);
    let candidate = PotentialAssertion {
        kif: rewritten,
        priority: equality_rewrite_priority(target, rule_eq),
        source_note: scope.clone(),
        support: supports.iter().map(|a| a.id).collect(),
        kind: AssertionKind::Ground,
        is_equality,
        is_oriented_equality,
        is_negated,
        quantified_vars: Vec::new(),
        depth,
    };
    Some(ProposedAssertion { scope, candidate })
}

/// Rewrite every other assertion in `scope_assertions` using `equality`
/// as a left-to-right rule, skipping the equality itself. Returns one
/// derived candidate per assertion that actually changed into something
/// non-trivial and within the derivation guards.
fn rewrite_scope(equality: &Assertion, scope_assertions: Vec<Assertion>, scope: Option<String>) -> Vec<ProposedAssertion> {
    scope_assertions
        .into_iter()
        .filter_map(|existing| try_rewrite(equality, &existing, scope.clone()))
        .collect()
}

/// Rewrite `target` using every oriented equality present in
/// `scope_equalities`. Returns one derived candidate per equality that
/// actually changes `target` into something useful.
fn rewrite_target(target: &Assertion, scope_equalities: Vec<Assertion>, scope: Option<String>) -> Vec<ProposedAssertion> {
    scope_equalities
        .into_iter()
        .filter_map(|rule_eq| try_rewrite(&rule_eq, target, scope.clone()))
        .collect()
}

fn assertions_of(kb: &reasoner_kb::KnowledgeBase) -> Vec<Assertion> {
    let ids: std::collections::HashSet<AssertionId> = kb.ids().into_iter().collect();
    ids.into_iter().filter_map(|id| kb.get(id)).collect()
}

/// Plays two roles against the same equality-rewriting relationship:
/// when a new oriented equality lands, it's applied as a rule against
/// every other assertion already in scope; when any other new assertion
/// lands, every oriented equality already in scope is applied to it.
/// Either way the search stays within the assertion's own scope and the
/// global scope, never every note — a note-local equality shouldn't
/// silently alter unrelated notes.
pub struct EqualityRewritingPlugin;

impl Plugin for EqualityRewritingPlugin {
    fn name(&self) -> &str {
        "equality-rewriting"
    }

    fn init(&self, bus: &Arc<EventBus>, ctx: &Arc<Context>, lifecycle: &Arc<Lifecycle>) {
        let ctx = ctx.clone();
        let bus_out = bus.clone();
        let lifecycle = lifecycle.clone();
        bus.subscribe::<AssertionAdded, _>(move |added| {
            lifecycle.gate();
            let own_scope = ctx.get_kb(added.scope.as_deref());
            let global = ctx.get_kb(None);

            if added.assertion.is_oriented_equality {
                for proposed in rewrite_scope(&added.assertion, assertions_of(&own_scope), added.scope.clone()) {
                    bus_out.publish(proposed);
                }
                if added.scope.is_some() {
                    for proposed in rewrite_scope(&added.assertion, assertions_of(&global), None) {
                        bus_out.publish(proposed);
                    }
                }
                return;
            }

            let equalities_in = |assertions: Vec<Assertion>| {
                assertions.into_iter().filter(|a| a.is_oriented_equality).collect::<Vec<_>>()
            };
            for proposed in rewrite_target(&added.assertion, equalities_in(assertions_of(&own_scope)), added.scope.clone()) {
                bus_out.publish(proposed);
            }
            if added.scope.is_some() {
                for proposed in rewrite_target(&added.assertion, equalities_in(assertions_of(&global)), added.scope.clone()) {
                    bus_out.publish(proposed);
                }
            }
        });
    }
}
