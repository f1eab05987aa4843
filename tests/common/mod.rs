// Common test utilities for integration tests
// Shared fixture builders for gateway-shaped JSON payloads.

use std::sync::Once;

use log::LevelFilter;
use serde_json::{json, Value};

static INIT_LOGGER: Once = Once::new();

/// Set up the logger for the tests
pub fn setup_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

/// A raw chat record the way Evolution returns it from findChats.
pub fn chat_record(remote_jid: &str, push_name: Option<&str>, timestamp: i64) -> Value {
    let mut record = json!({
        "remoteJid": remote_jid,
        "conversationTimestamp": timestamp,
        "lastMessage": { "message": { "conversation": format!("msg at {}", timestamp) } },
    });
    if let Some(name) = push_name {
        record["pushName"] = json!(name);
    }
    record
}

/// A raw text message the way Evolution returns it from findMessages.
pub fn text_message(id: &str, from_me: bool, timestamp_secs: i64, text: &str) -> Value {
    json!({
        "key": {
            "id": id,
            "fromMe": from_me,
            "remoteJid": "5521987654321@s.whatsapp.net",
        },
        "message": { "conversation": text },
        "messageTimestamp": timestamp_secs,
    })
}
