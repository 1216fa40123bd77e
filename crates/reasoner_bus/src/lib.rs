//! In-process event bus. Listeners register for a Rust type (`subscribe`)
//! or for a KIF pattern (`subscribe_pattern`); each registration gets its
//! own dedicated dispatch task and an unbounded queue, so delivery to a
//! single listener is strictly FIFO while distinct listeners run
//! concurrently with each other. A listener panic is caught and logged;
//! it never takes down the bus or a sibling listener.

use std::any::{Any, TypeId};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use reasoner_term::Term;
use reasoner_unify::{match_term, Bindings};
use tokio::sync::mpsc::{self, UnboundedSender};

/// Implemented by every event type published on the bus. Most events carry
/// no KIF and use the default; events that wrap an assertion or a proposed
/// one override `kif` so pattern subscriptions can see into them.
pub trait Event: Send + Sync + 'static {
    fn kif(&self) -> Option<&Term> {
        None
    }
}

type AnyArc = Arc<dyn Any + Send + Sync>;

struct PatternListener {
    pattern: Term,
    sender: UnboundedSender<AnyArc>,
}

/// A typed, pattern-capable publish/subscribe bus.
pub struct EventBus {
    listeners: DashMap<TypeId, Vec<UnboundedSender<AnyArc>>>,
    patterns: RwLock<Vec<PatternListener>>,
    running: AtomicBool,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        EventBus {
            listeners: DashMap::new(),
            patterns: RwLock::new(Vec::new()),
            running: AtomicBool::new(true),
        }
    }

    /// Register `handler` for every event of type `E`. Spawns a dedicated
    /// task that drains `E`-typed events in arrival order.
    pub fn subscribe<E, F>(&self, handler: F)
    where
        E: Event,
        F: Fn(Arc<E>) + Send + Sync + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<AnyArc>();
        tokio::spawn(async move {
            while let Some(any) = rx.recv().await {
                if let Ok(typed) = any.downcast::<E>() {
                    invoke(|| handler(typed));
                }
            }
        });
        self.listeners.entry(TypeId::of::<E>()).or_default().push(tx);
    }

    /// Register `handler` for every published event whose `kif()` unifies
    /// candidate-wise with `pattern` under one-way matching (`pattern` may
    /// bind variables; the published KIF may not).
    pub fn subscribe_pattern<F>(&self, pattern: Term, handler: F)
    where
        F: Fn(AnyArc, Term) + Send + Sync + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<AnyArc>();
        let pattern_for_task = pattern.clone();
        tokio::spawn(async move {
            while let Some(any) = rx.recv().await {
                let kif = pattern_for_task.clone();
                invoke(|| handler(any, kif));
            }
        });
        self.patterns.write().push(PatternListener { pattern, sender: tx });
    }

    /// Publish `event` to every matching listener. A no-op once `shutdown`
    /// has been called: already-queued deliveries still drain, but no new
    /// ones are accepted.
    pub fn publish<E: Event>(&self, event: E) {
        if !self.running.load(Ordering::Acquire) {
            return;
        }
        let kif = event.kif().cloned();
        let any: AnyArc = Arc::new(event);
        if let Some(senders) = self.listeners.get(&TypeId::of::<E>()) {
            for sender in senders.value() {
                let _ = sender.send(any.clone());
            }
        }
        if let Some(kif) = kif {
            let empty = Bindings::default();
            for listener in self.patterns.read().iter() {
                if match_term(&listener.pattern, &kif, &empty).is_some() {
                    let _ = listener.sender.send(any.clone());
                }
            }
        }
    }

    /// Stop accepting new publishes. Listener tasks are left running so
    /// whatever is already queued still gets delivered.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

fn invoke(f: impl FnOnce()) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        log::error!("event listener panicked: {msg}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct Ping(u32);
    impl Event for Ping {}

    struct Fact(Term);
    impl Event for Fact {
        fn kif(&self) -> Option<&Term> {
            Some(&self.0)
        }
    }

    #[tokio::test]
    async fn typed_listener_receives_event() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        bus.subscribe::<Ping, _>(move |p| {
            seen2.fetch_add(p.0 as usize, Ordering::SeqCst);
        });
        bus.publish(Ping(41));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 41);
    }

    #[tokio::test]
    async fn fifo_per_listener_preserves_order() {
        let bus = EventBus::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let order2 = order.clone();
        bus.subscribe::<Ping, _>(move |p| {
            order2.lock().push(p.0);
        });
        for i in 0..20 {
            bus.publish(Ping(i));
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        let got = order.lock().clone();
        assert_eq!(got, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn pattern_listener_fires_on_match_only() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        let pattern = Term::list(vec![
            Term::atom("subclass"),
            Term::var("?x"),
            Term::atom("Mammal"),
        ]);
        bus.subscribe_pattern(pattern, move |_event, _pattern| {
            hits2.fetch_add(1, Ordering::SeqCst);
        });
        bus.publish(Fact(Term::list(vec![
            Term::atom("subclass"),
            Term::atom("Cat"),
            Term::atom("Mammal"),
        ])));
        bus.publish(Fact(Term::list(vec![
            Term::atom("subclass"),
            Term::atom("Cat"),
            Term::atom("Reptile"),
        ])));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn listener_panic_does_not_break_bus() {
        let bus = EventBus::new();
        bus.subscribe::<Ping, _>(|_| panic!("boom"));
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        bus.subscribe::<Ping, _>(move |p| {
            seen2.fetch_add(p.0 as usize, Ordering::SeqCst);
        });
        bus.publish(Ping(1));
        bus.publish(Ping(2));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn shutdown_rejects_new_publishes() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        bus.subscribe::<Ping, _>(move |p| {
            seen2.fetch_add(p.0 as usize, Ordering::SeqCst);
        });
        bus.shutdown();
        bus.publish(Ping(7));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert!(!bus.is_running());
    }
}
