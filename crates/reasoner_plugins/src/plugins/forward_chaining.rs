use std::sync::Arc;

use reasoner_bus::EventBus;
use reasoner_context::{
    common_source_note, derived_depth, derived_priority, passes_derivation_guards, Clause, Context, Rule,
};
use reasoner_kb::{Assertion, AssertionKind, PotentialAssertion};
use reasoner_unify::{subst, unify, Bindings};

use crate::events::{AssertionAdded, ProposedAssertion};
use crate::lifecycle::Lifecycle;

use super::Plugin;

/// One partial match of a rule's antecedent: the bindings accumulated so
/// far and the assertions that justify them.
struct PartialMatch {
    bindings: Bindings,
    supports: Vec<Assertion>,
}

/// Extend every state in `states` by joining against `clause`: a positive
/// clause looks the instantiated pattern up across every scope; a
/// negative clause survives only if nothing matches (negation as
/// failure).
fn extend(states: Vec<PartialMatch>, clause: &Clause, ctx: &Context) -> Vec<PartialMatch> {
    let mut out = Vec::new();
    for state in states {
        match clause {
            Clause::Positive(pattern) => {
                let instantiated = subst(pattern, &state.bindings);
                for (_, candidate) in ctx.find_anywhere(&instantiated) {
                    if let Some(bindings) = unify(pattern, &candidate.kif, &state.bindings) {
                        let mut supports = state.supports.clone();
                        supports.push(candidate);
                        out.push(PartialMatch { bindings, supports });
                    }
                }
            }
            Clause::Negative(pattern) => {
                let instantiated = subst(pattern, &state.bindings);
                if ctx.find_anywhere(&instantiated).is_empty() {
                    out.push(state);
                }
            }
        }
    }
    out
}

/// Every grounded consequent this rule fires, given that `trigger` just
/// arrived. Each antecedent clause gets a turn as the clause the trigger
/// satisfies; the rest of the antecedent is then joined in.
fn fire(rule: &Rule, trigger: &Assertion, ctx: &Context) -> Vec<(reasoner_term::Term, Vec<Assertion>)> {
    let mut results = Vec::new();
    for (i, clause) in rule.antecedent.iter().enumerate() {
        let Clause::Positive(pattern) = clause else { continue };
        let Some(seed) = unify(pattern, &trigger.kif, &Bindings::default()) else { continue };
        let mut states = vec![PartialMatch {
            bindings: seed,
            supports: vec![trigger.clone()],
        }];
        for (j, other) in rule.antecedent.iter().enumerate() {
            if i == j {
                continue;
            }
            states = extend(states, other, ctx);
            if states.is_empty() {
                break;
            }
        }
        for state in states {
            let consequent = subst(&rule.consequent, &state.bindings);
            if consequent.is_ground() {
                results.push((consequent, state.supports));
            }
        }
    }
    results
}

/// Fires every standing rule against each newly committed assertion and
/// republishes what fires as new [`ProposedAssertion`]s, attributed to
/// the common source note of their supports (or the global scope if
/// there isn't one).
pub struct ForwardChainingPlugin;

impl Plugin for ForwardChainingPlugin {
    fn name(&self) -> &str {
        "forward-chaining"
    }

    fn init(&self, bus: &Arc<EventBus>, ctx: &Arc<Context>, lifecycle: &Arc<Lifecycle>) {
        let ctx = ctx.clone();
        let bus_out = bus.clone();
        let lifecycle = lifecycle.clone();
        bus.subscribe::<AssertionAdded, _>(move |added| {
            if added.assertion.kind == AssertionKind::Universal {
                return;
            }
            for rule in ctx.rules() {
                lifecycle.gate();
                for (consequent, supports) in fire(&rule, &added.assertion, &ctx) {
                    let depth = derived_depth(&supports);
                    if !passes_derivation_guards(&consequent, depth) {
                        continue;
                    }
                    let scope = common_source_note(&supports);
                    let candidate = PotentialAssertion {
                        kif: consequent,
                        priority: derived_priority(&supports) * rule.priority,
                        source_note: scope.clone(),
                        support: supports.iter().map(|a| a.id).collect(),
                        kind: AssertionKind::Ground,
                        is_equality: false,
                        is_oriented_equality: false,
                        is_negated: false,
                        quantified_vars: Vec::new(),
                        depth,
                    };
                    bus_out.publish(ProposedAssertion { scope, candidate });
                }
            }
        });
    }
}
