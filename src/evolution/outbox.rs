// Optimistic overlay for locally-sent messages.
//
// A sent message shows up immediately with status Sending under a
// temporary id; the send response flips it to Sent or Error, and an
// entry disappears once the gateway's own copy of the message arrives
// in a later fetch. Normalized history itself is never mutated.

use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{Message, MessageStatus, PendingMessage, Sender};

#[derive(Debug, Default)]
pub struct Outbox {
    pending: HashMap<String, PendingMessage>,
}

impl Outbox {
    pub fn new() -> Self {
        Outbox::default()
    }

    /// Register a message the moment it is handed to the transport.
    /// Returns the temporary id used to reconcile later.
    pub fn register(&mut self, to: &str, text: &str) -> String {
        let id = Uuid::new_v4().to_string();
        self.pending.insert(
            id.clone(),
            PendingMessage {
                id: id.clone(),
                to: to.to_string(),
                text: text.to_string(),
                queued_at: Utc::now(),
                status: MessageStatus::Sending,
            },
        );
        id
    }

    /// The gateway accepted the send.
    pub fn mark_sent(&mut self, id: &str) -> bool {
        self.set_status(id, MessageStatus::Sent)
    }

    /// The send failed; the entry is kept so a caller can offer a retry.
    pub fn mark_failed(&mut self, id: &str) -> bool {
        self.set_status(id, MessageStatus::Error)
    }

    fn set_status(&mut self, id: &str, status: MessageStatus) -> bool {
        match self.pending.get_mut(id) {
            Some(pending) => {
                pending.status = status;
                true
            }
            None => false,
        }
    }

    /// Overlay the pending entries for one thread on top of freshly
    /// fetched history. Entries whose text already appears as an
    /// outbound message in the fetch are confirmed and dropped; the
    /// remainder comes back as Message values, oldest first, for the
    /// caller to append.
    pub fn overlay(&mut self, thread: &str, fetched: &[Message]) -> Vec<Message> {
        self.pending.retain(|_, pending| {
            !(pending.to == thread
                && fetched.iter().any(|message| {
                    message.sender == Sender::Me && message.text == pending.text
                }))
        });

        let mut extra: Vec<Message> = self
            .pending
            .values()
            .filter(|pending| pending.to == thread)
            .map(|pending| Message {
                id: pending.id.clone(),
                text: pending.text.clone(),
                sender: Sender::Me,
                timestamp: pending.queued_at,
                status: pending.status,
                from_jid: None,
            })
            .collect();
        extra.sort_by_key(|message| message.timestamp);
        extra
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
