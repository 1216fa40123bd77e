use std::sync::Arc;

use reasoner_bus::EventBus;
use reasoner_context::Context;
use reasoner_kb::CommitOutcome;

use crate::events::{AssertionAdded, AssertionEvicted, AssertionRetracted, ProposedAssertion};
use crate::lifecycle::Lifecycle;

use super::Plugin;

/// Tries to admit every [`ProposedAssertion`] into its target scope.
/// Acceptance publishes [`AssertionAdded`]; each eviction batch then
/// publishes [`AssertionRetracted`] for everything the cascade removed,
/// followed by one [`AssertionEvicted`] for the assertion that was
/// actually polled off the eviction queue. Rejection (trivial or
/// subsumed) is logged and otherwise silent.
pub struct CommitPlugin;

impl Plugin for CommitPlugin {
    fn name(&self) -> &str {
        "commit"
    }

    fn init(&self, bus: &Arc<EventBus>, ctx: &Arc<Context>, lifecycle: &Arc<Lifecycle>) {
        let ctx = ctx.clone();
        let bus_out = bus.clone();
        let lifecycle = lifecycle.clone();
        bus.subscribe::<ProposedAssertion, _>(move |proposed| {
            lifecycle.gate();
            let kb = ctx.get_kb(proposed.scope.as_deref());
            let (id, timestamp) = ctx.next_assertion_stamp();
            match kb.commit(id, timestamp, proposed.candidate.clone()) {
                CommitOutcome::Accepted { assertion, evicted } => {
                    bus_out.publish(AssertionAdded {
                        scope: proposed.scope.clone(),
                        assertion: Arc::new(assertion),
                    });
                    for batch in evicted {
                        for removed in batch.removed {
                            let is_victim = removed.id == batch.victim_id;
                            let removed = Arc::new(removed);
                            bus_out.publish(AssertionRetracted {
                                scope: proposed.scope.clone(),
                                assertion: removed.clone(),
                            });
                            if is_victim {
                                bus_out.publish(AssertionEvicted {
                                    scope: proposed.scope.clone(),
                                    assertion: removed,
                                });
                            }
                        }
                    }
                }
                CommitOutcome::RejectedTrivial => {
                    log::debug!("rejected trivial KIF: {}", proposed.candidate.kif);
                }
                CommitOutcome::RejectedSubsumed { by } => {
                    log::debug!("rejected, subsumed by assertion {by}: {}", proposed.candidate.kif);
                }
            }
        });
    }
}
