use std::sync::mpsc::{channel, Receiver, Sender};

use crate::clock::Millis;
use crate::sync::Rejection;

/// Notifications from the engine to whoever hosts it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Grid content or shape changed; re-render
    GridChanged,
    DocumentOpened { id: String },
    SaveStarted { silent: bool },
    Saved { id: String, server_timestamp: Millis },
    SaveFailed { message: String },
    RemoteApplied { server_timestamp: Millis },
    /// Diagnostics only; never shown as an error
    RemoteRejected { reason: Rejection },
    /// A committed edit could not be written because its column is gone
    EditDropped { row: usize, column: String, value: String },
    /// A local backup newer than what the store returned exists for this document
    RecoveryAvailable { saved_at: Millis },
}

/// Fan-out of engine events. Subscribers that hang up are dropped on the next emit.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<EngineEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<EngineEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn emit(&mut self, event: EngineEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
