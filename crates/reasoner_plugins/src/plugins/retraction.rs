use std::sync::Arc;

use reasoner_bus::EventBus;
use reasoner_context::Context;
use reasoner_kb::AssertionId;

use crate::events::{AssertionRetracted, NoteRemoved, RetractionRequest, RuleRemoved};
use crate::lifecycle::Lifecycle;
use crate::normalize::rule_parts;

use super::Plugin;

fn retract_by_id(ctx: &Context, bus_out: &EventBus, scope: Option<String>, id: AssertionId) {
    let kb = ctx.get_kb(scope.as_deref());
    for assertion in kb.retract(id) {
        bus_out.publish(AssertionRetracted {
            scope: scope.clone(),
            assertion: Arc::new(assertion),
        });
    }
}

fn retract_by_note(ctx: &Context, bus_out: &EventBus, note: String) {
    let Some(kb) = ctx.remove_kb(&note) else {
        return;
    };
    for assertion in kb.clear() {
        bus_out.publish(AssertionRetracted {
            scope: Some(note.clone()),
            assertion: Arc::new(assertion),
        });
    }
    bus_out.publish(NoteRemoved { note });
}

fn retract_by_rule_form(ctx: &Context, bus_out: &EventBus, kif: &str) {
    let terms = match reasoner_parser::parse(kif) {
        Ok(terms) => terms,
        Err(err) => {
            log::warn!("dropping unparsable rule retraction: {err}");
            return;
        }
    };
    for term in terms {
        let Some((antecedent, consequent)) = rule_parts(&term) else {
            log::warn!("ignoring non-rule form in rule retraction: {term}");
            continue;
        };
        let existing = ctx
            .rules()
            .into_iter()
            .find(|r| r.form == antecedent && r.consequent == consequent);
        let Some(rule) = existing else {
            continue;
        };
        if let Some(removed) = ctx.remove_rule(rule.id) {
            bus_out.publish(RuleRemoved { rule: Arc::new(removed) });
        }
    }
}

/// Carries out [`RetractionRequest`]s: an id removes one assertion and
/// its cascade of dependents from its scope; a note drops that note's
/// entire knowledge base; a rule form parses as KIF and removes the
/// matching standing rule, if any.
pub struct RetractionPlugin;

impl Plugin for RetractionPlugin {
    fn name(&self) -> &str {
        "retraction"
    }

    fn init(&self, bus: &Arc<EventBus>, ctx: &Arc<Context>, lifecycle: &Arc<Lifecycle>) {
        let ctx = ctx.clone();
        let bus_out = bus.clone();
        let lifecycle = lifecycle.clone();
        bus.subscribe::<RetractionRequest, _>(move |request| {
            lifecycle.gate();
            match &*request {
                RetractionRequest::ById { scope, id } => retract_by_id(&ctx, &bus_out, scope.clone(), *id),
                RetractionRequest::ByNote { note } => retract_by_note(&ctx, &bus_out, note.clone()),
                RetractionRequest::ByRuleForm { kif } => retract_by_rule_form(&ctx, &bus_out, kif),
            }
        });
    }
}
