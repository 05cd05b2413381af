//! Event channels.
//!
//! One subscription channel per event category. Consumers hold a `Receiver`
//! and poll it; dropping the receiver is the unsubscribe. Disconnected
//! senders are pruned on the next publish.

use std::sync::mpsc::{self, Receiver, Sender};

use sheetpilot_engine::events::WorkbookEvent;

use crate::apply::BatchReport;
use crate::chat::{MessageStatus, TurnId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    Job,
    Document,
    Persistence,
    Chat,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Planned { job_id: String, turn: TurnId },
    BatchApplied { job_id: String, turn: TurnId, report: BatchReport },
    /// A batch arrived for a job that already ended.
    BatchDropped { job_id: String, reason: String },
    Failed { job_id: Option<String>, message: String, code: String },
    Cancelled { job_id: String },
    TimedOut { job_id: String, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEvent {
    /// Grid engine changes, in publication order.
    Changed(Vec<WorkbookEvent>),
    Loaded { exists: bool, file_name: Option<String> },
    /// Content was replaced wholesale by a rollback.
    Replaced { document_version_id: String, lock_version: u64 },
    Renamed { file_name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PersistenceEvent {
    Saved { document_version_id: Option<String>, lock_version: Option<u64> },
    Failed { message: String },
    Conflict { server_lock_version: Option<u64> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    TurnStarted { turn: TurnId },
    TurnFinished { turn: TurnId, status: MessageStatus },
    Notice { text: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Job(JobEvent),
    Document(DocumentEvent),
    Persistence(PersistenceEvent),
    Chat(ChatEvent),
}

impl SyncEvent {
    pub fn category(&self) -> EventCategory {
        match self {
            SyncEvent::Job(_) => EventCategory::Job,
            SyncEvent::Document(_) => EventCategory::Document,
            SyncEvent::Persistence(_) => EventCategory::Persistence,
            SyncEvent::Chat(_) => EventCategory::Chat,
        }
    }
}

#[derive(Default)]
pub struct EventHub {
    subscribers: Vec<(EventCategory, Sender<SyncEvent>)>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, category: EventCategory) -> Receiver<SyncEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push((category, tx));
        rx
    }

    pub fn publish(&mut self, event: SyncEvent) {
        let category = event.category();
        self.subscribers
            .retain(|(c, tx)| *c != category || tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_route_by_category() {
        let mut hub = EventHub::new();
        let jobs = hub.subscribe(EventCategory::Job);
        let docs = hub.subscribe(EventCategory::Document);

        hub.publish(SyncEvent::Job(JobEvent::Cancelled { job_id: "j1".into() }));
        assert_eq!(jobs.try_recv().unwrap(), SyncEvent::Job(JobEvent::Cancelled { job_id: "j1".into() }));
        assert!(docs.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let mut hub = EventHub::new();
        let keep = hub.subscribe(EventCategory::Chat);
        drop(hub.subscribe(EventCategory::Chat));
        assert_eq!(hub.subscriber_count(), 2);

        hub.publish(SyncEvent::Chat(ChatEvent::Notice { text: "hi".into() }));
        assert_eq!(hub.subscriber_count(), 1);
        assert!(keep.try_recv().is_ok());
    }

    #[test]
    fn test_other_categories_keep_dead_subscribers_until_their_publish() {
        let mut hub = EventHub::new();
        drop(hub.subscribe(EventCategory::Persistence));
        hub.publish(SyncEvent::Chat(ChatEvent::Notice { text: "x".into() }));
        assert_eq!(hub.subscriber_count(), 1);
    }
}
