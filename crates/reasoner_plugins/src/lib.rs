//! The event-driven half of the reasoner: a [`Plugin`] trait and one
//! implementation per pipeline stage (normalize, commit, forward chain,
//! rewrite equalities, instantiate universals, retract, report status),
//! plus the [`Lifecycle`] pause/shutdown gate every plugin cooperates
//! with.

mod events;
mod lifecycle;
mod normalize;
mod plugins;

pub use events::{
    AssertionAdded, AssertionEvicted, AssertionRetracted, ExternalInput, NoteRemoved,
    ProposedAssertion, RetractionRequest, RuleAdded, RuleRemoved, SystemStatus,
};
pub use lifecycle::Lifecycle;
pub use plugins::{
    CommitPlugin, EqualityRewritingPlugin, ForwardChainingPlugin, InputNormalizationPlugin, Plugin,
    RetractionPlugin, StatusAggregationPlugin, UniversalInstantiationPlugin,
};

use std::sync::Arc;

use reasoner_bus::EventBus;
use reasoner_context::Context;

/// The standard plugin pipeline, in the order a reader would expect to
/// see them fire: parse, commit, then the three derivation stages, then
/// retraction handling, then status reporting.
pub fn standard_plugins() -> Vec<Box<dyn Plugin>> {
    vec![
        Box::new(InputNormalizationPlugin),
        Box::new(CommitPlugin),
        Box::new(ForwardChainingPlugin),
        Box::new(EqualityRewritingPlugin),
        Box::new(UniversalInstantiationPlugin),
        Box::new(RetractionPlugin),
        Box::new(StatusAggregationPlugin),
    ]
}

/// Registers every plugin in `plugins` against `bus`/`ctx`/`lifecycle`.
/// Plugins only subscribe during `init`; nothing runs until an event
/// arrives on the bus.
pub fn install(plugins: &[Box<dyn Plugin>], bus: &Arc<EventBus>, ctx: &Arc<Context>, lifecycle: &Arc<Lifecycle>) {
    for plugin in plugins {
        log::info!("initializing plugin: {}", plugin.name());
        plugin.init(bus, ctx, lifecycle);
    }
}

/// Calls `shutdown` on every plugin, then gates the bus/lifecycle so no
/// further publishes are accepted. Already-queued deliveries still
/// drain.
pub fn shutdown(plugins: &[Box<dyn Plugin>], bus: &EventBus, lifecycle: &Lifecycle) {
    for plugin in plugins {
        plugin.shutdown();
    }
    lifecycle.shutdown(bus);
}
