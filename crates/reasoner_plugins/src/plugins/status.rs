use std::collections::HashMap;
use std::sync::Arc;

use reasoner_bus::EventBus;
use reasoner_context::Context;

use crate::events::{
    AssertionAdded, AssertionEvicted, AssertionRetracted, NoteRemoved, RuleAdded, RuleRemoved, SystemStatus,
};
use crate::lifecycle::Lifecycle;

use super::Plugin;

fn snapshot(ctx: &Context) -> SystemStatus {
    let global_count = ctx.get_kb(None).count();
    let note_counts: HashMap<String, usize> = ctx
        .note_names()
        .into_iter()
        .map(|name| {
            let count = ctx.get_kb(Some(&name)).count();
            (name, count)
        })
        .collect();
    SystemStatus {
        global_count,
        note_counts,
        rule_count: ctx.rules().len(),
    }
}

/// Republishes a fresh [`SystemStatus`] snapshot whenever the assertion
/// or rule population changes. Does no bookkeeping of its own — every
/// snapshot is recomputed from the context, so it can never drift out of
/// sync with what actually happened.
pub struct StatusAggregationPlugin;

impl Plugin for StatusAggregationPlugin {
    fn name(&self) -> &str {
        "status-aggregation"
    }

    fn init(&self, bus: &Arc<EventBus>, ctx: &Arc<Context>, _lifecycle: &Arc<Lifecycle>) {
        macro_rules! on_change {
            ($event:ty) => {
                let ctx = ctx.clone();
                let bus_out = bus.clone();
                bus.subscribe::<$event, _>(move |_event| {
                    bus_out.publish(snapshot(&ctx));
                });
            };
        }
        on_change!(AssertionAdded);
        on_change!(AssertionRetracted);
        on_change!(AssertionEvicted);
        on_change!(RuleAdded);
        on_change!(RuleRemoved);
        on_change!(NoteRemoved);
    }
}
