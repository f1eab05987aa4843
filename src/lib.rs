// Re-export needed modules for testing
pub mod evolution;
pub mod models;

// Re-export main types for convenience
pub use evolution::EvolutionClient;
pub use models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_contact_shape() {
        let contact = Contact {
            id: "5521987654321@s.whatsapp.net".to_string(),
            name: "Alice".to_string(),
            number: "5521987654321".to_string(),
            avatar_url: None,
            last_message: "oi".to_string(),
            last_message_time: "09:30".to_string(),
            unread_count: 2,
            timestamp_raw: 1700000000,
            is_group: false,
            merged_ids: vec!["5521987654321@s.whatsapp.net".to_string()],
        };

        assert_eq!(contact.number, "5521987654321");
        assert!(!contact.is_group);
        assert_eq!(contact.merged_ids.len(), 1);
    }

    #[test]
    fn test_message_status_display() {
        let msg = Message {
            id: "msg1".to_string(),
            text: "hello".to_string(),
            sender: Sender::Them,
            timestamp: Utc::now(),
            status: MessageStatus::Read,
            from_jid: Some("5521987654321@s.whatsapp.net".to_string()),
        };

        assert_eq!(msg.status.to_string(), "read");
        assert_eq!(msg.sender.to_string(), "them");
        assert_eq!(MessageStatus::Sending.to_string(), "sending");
        assert_eq!(MessageStatus::Error.to_string(), "error");
    }
}
