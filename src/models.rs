use chrono::{DateTime, Utc};
use std::fmt;

/// A unified contact: one entry per real-world identity, regardless of
/// how many raw chat records the gateway reported for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    /// Canonical JID (phone-based for individuals, the group id for groups).
    pub id: String,
    pub name: String,
    /// Bare number, the digit portion of the canonical JID.
    pub number: String,
    pub avatar_url: Option<String>,
    pub last_message: String,
    pub last_message_time: String,
    pub unread_count: u32,
    /// Epoch seconds of the latest activity, used for recency and sort.
    pub timestamp_raw: i64,
    pub is_group: bool,
    /// Every raw identifier folded into this contact.
    pub merged_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    Me,
    Them,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::Me => write!(f, "me"),
            Sender::Them => write!(f, "them"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Sending, // Handed to the gateway, not yet confirmed
    Sent,    // Accepted by the gateway
    Error,   // The gateway rejected or lost it
    Read,    // Read by the recipient (or visible inbound)
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageStatus::Sending => write!(f, "sending"),
            MessageStatus::Sent => write!(f, "sent"),
            MessageStatus::Error => write!(f, "error"),
            MessageStatus::Read => write!(f, "read"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
    /// Raw remote JID the gateway reported for this message. Diagnostic
    /// only; thread identity comes from the unified contact.
    pub from_jid: Option<String>,
}

/// A locally-sent message waiting for gateway confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMessage {
    pub id: String,
    pub to: String,
    pub text: String,
    pub queued_at: DateTime<Utc>,
    pub status: MessageStatus,
}
