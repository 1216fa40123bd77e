mod commit;
mod equality_rewriting;
mod forward_chaining;
mod input_normalization;
mod retraction;
mod status;
mod universal_instantiation;

pub use commit::CommitPlugin;
pub use equality_rewriting::EqualityRewritingPlugin;
pub use forward_chaining::ForwardChainingPlugin;
pub use input_normalization::InputNormalizationPlugin;
pub use retraction::RetractionPlugin;
pub use status::StatusAggregationPlugin;
pub use universal_instantiation::UniversalInstantiationPlugin;

use std::sync::Arc;

use reasoner_bus::EventBus;
use reasoner_context::Context;

use crate::lifecycle::Lifecycle;

/// A listener that wires itself to the bus on `init` and (optionally)
/// releases any resources it acquired on `shutdown`. Registering a plugin
/// does not start any work by itself — work starts only when a matching
/// event is published.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;
    fn init(&self, bus: &Arc<EventBus>, ctx: &Arc<Context>, lifecycle: &Arc<Lifecycle>);
    fn shutdown(&self) {}
}
