//! # Queue Events
//!
//! Publish/subscribe channel for job lifecycle notifications. Handlers run
//! synchronously on the task that caused the event and never while the queue
//! state is locked. A panicking handler is logged and skipped; the remaining
//! handlers still receive the event.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::error;

use super::job::JobSnapshot;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum QueueEvent {
    JobAdded(JobSnapshot),
    JobStarted(JobSnapshot),
    JobCompleted(JobSnapshot),
    /// Terminal failure; the snapshot carries the last recorded error
    JobFailed(JobSnapshot),
    JobCancelled(JobSnapshot),
    QueueEmpty,
    QueuePaused,
    QueueResumed,
}

impl QueueEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::JobAdded(_) => "job-added",
            Self::JobStarted(_) => "job-started",
            Self::JobCompleted(_) => "job-completed",
            Self::JobFailed(_) => "job-failed",
            Self::JobCancelled(_) => "job-cancelled",
            Self::QueueEmpty => "queue-empty",
            Self::QueuePaused => "queue-paused",
            Self::QueueResumed => "queue-resumed",
        }
    }

    pub fn job(&self) -> Option<&JobSnapshot> {
        match self {
            Self::JobAdded(job)
            | Self::JobStarted(job)
            | Self::JobCompleted(job)
            | Self::JobFailed(job)
            | Self::JobCancelled(job) => Some(job),
            Self::QueueEmpty | Self::QueuePaused | Self::QueueResumed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&QueueEvent) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    handlers: Mutex<Vec<(SubscriptionId, Handler)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn handlers(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Handler)>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers().push((id, Arc::new(handler)));
        id
    }

    /// Returns `false` if the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers();
        let before = handlers.len();
        handlers.retain(|(sub, _)| *sub != id);
        handlers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers().len()
    }

    pub fn emit(&self, event: &QueueEvent) {
        // Handlers may subscribe or unsubscribe, so call them on a copy.
        let handlers: Vec<Handler> = self.handlers().iter().map(|(_, h)| Arc::clone(h)).collect();
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| (handler.as_ref())(event))).is_err() {
                error!(event = event.name(), "event handler panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let id = bus.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(&QueueEvent::QueuePaused);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(&QueueEvent::QueueResumed);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_handler_does_not_block_others() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(|_| panic!("handler bug"));
        let seen = Arc::clone(&count);
        bus.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(&QueueEvent::QueueEmpty);
        bus.emit(&QueueEvent::QueueEmpty);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_event_names_match_serialized_tag() {
        let value = serde_json::to_value(QueueEvent::QueueEmpty).unwrap();
        assert_eq!(value["event"], "queue-empty");
        assert_eq!(QueueEvent::QueueEmpty.name(), "queue-empty");
        assert!(QueueEvent::QueuePaused.job().is_none());
    }
}
