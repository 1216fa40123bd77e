use std::sync::Arc;

use reasoner_bus::EventBus;
use reasoner_context::Context;
use reasoner_term::Term;

use crate::events::{ExternalInput, ProposedAssertion, RuleAdded};
use crate::lifecycle::Lifecycle;
use crate::normalize::{is_biconditional, normalize, rule_parts, BASE_PRIORITY};

use super::Plugin;

fn rule_priority(consequent: &Term) -> f64 {
    BASE_PRIORITY / (1.0 + consequent.weight() as f64)
}

/// Logs a warning (never rejects) when a rule's consequent mentions a
/// variable its antecedent never binds — such a rule will only ever fire
/// with that variable left dangling.
fn warn_if_consequent_introduces_free_vars(antecedent: &Term, consequent: &Term) {
    let bound = antecedent.free_vars();
    for var in consequent.free_vars().iter() {
        if !bound.contains(var) {
            log::warn!("rule consequent introduces unbound variable {var}: {consequent}");
        }
    }
}

fn install_rule(ctx: &Context, bus_out: &EventBus, antecedent: Term, consequent: Term, biconditional: bool) {
    warn_if_consequent_introduces_free_vars(&antecedent, &consequent);
    let priority = rule_priority(&consequent);
    let rule = ctx.add_rule(antecedent.clone(), consequent.clone(), priority);
    bus_out.publish(RuleAdded { rule: Arc::new(rule) });
    if biconditional {
        warn_if_consequent_introduces_free_vars(&consequent, &antecedent);
        let reverse_priority = rule_priority(&antecedent);
        let reverse = ctx.add_rule(consequent, antecedent, reverse_priority);
        bus_out.publish(RuleAdded { rule: Arc::new(reverse) });
    }
}

/// Installs `term` as a rule if it's a bare or `forall`-wrapped `=>`/`<=>`
/// form, otherwise normalizes it into a fact and publishes it as a
/// [`ProposedAssertion`]. A `<=>` installs both directions; `forall`
/// wrapping a rule body is just a binder around variables the rule's own
/// matching already scopes, so the quantifier itself is discarded.
fn dispatch(term: Term, ctx: &Context, bus_out: &EventBus, source_note: Option<String>) {
    if let Some((antecedent, consequent)) = rule_parts(&term) {
        install_rule(ctx, bus_out, antecedent, consequent, is_biconditional(&term));
        return;
    }
    if term.operator() == Some("forall") {
        if let Some(children) = term.children() {
            if children.len() == 3 {
                if let Some((antecedent, consequent)) = rule_parts(&children[2]) {
                    install_rule(ctx, bus_out, antecedent, consequent, is_biconditional(&children[2]));
                    return;
                }
            }
        }
    }
    if let Some(candidate) = normalize(&term, ctx, source_note.clone()) {
        bus_out.publish(ProposedAssertion { scope: source_note, candidate });
    }
}

/// Parses [`ExternalInput`] text into terms and routes each one to either
/// rule installation or fact normalization. A parse error is logged and
/// the rest of the input is dropped; it never reaches the bus as a
/// half-formed term.
pub struct InputNormalizationPlugin;

impl Plugin for InputNormalizationPlugin {
    fn name(&self) -> &str {
        "input-normalization"
    }

    fn init(&self, bus: &Arc<EventBus>, ctx: &Arc<Context>, lifecycle: &Arc<Lifecycle>) {
        let ctx = ctx.clone();
        let bus_out = bus.clone();
        let lifecycle = lifecycle.clone();
        bus.subscribe::<ExternalInput, _>(move |input| {
            lifecycle.gate();
            let terms = match reasoner_parser::parse(&input.text) {
                Ok(terms) => terms,
                Err(err) => {
                    log::warn!("dropping unparsable input: {err}");
                    return;
                }
            };
            for term in terms {
                dispatch(term, &ctx, &bus_out, input.source_note.clone());
            }
        });
    }
}
