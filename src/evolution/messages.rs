// Message history and normalization for the Evolution gateway.
//
// Raw message payloads come in many content shapes (text, media,
// button replies, raw strings) and inconsistent timestamp encodings.
// normalize_messages maps them to uniform Message records.

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::identity::canonicalize_remote_jid;
use super::{ApiError, EvolutionClient};
use crate::models::{Message, MessageStatus, Sender};

const PHOTO_PLACEHOLDER: &str = "📷 [Foto]";
const AUDIO_PLACEHOLDER: &str = "🎤 [Áudio]";
const VIDEO_PLACEHOLDER: &str = "🎥 [Vídeo]";
const STICKER_PLACEHOLDER: &str = "👾 [Sticker]";
const DOCUMENT_PLACEHOLDER: &str = "📄 [Arquivo]";

/// Shown when no content shape is recognized.
pub const UNSUPPORTED_TEXT: &str = "Mensagem não suportada";

/// Timestamps below this value are epoch seconds and get promoted to
/// milliseconds.
const MILLIS_EPOCH_THRESHOLD: i64 = 10_000_000_000;

/// One raw message as the gateway returns it. Field coverage is
/// deliberately partial; unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawMessage {
    pub key: RawMessageKey,
    pub message: Option<RawMessageContent>,
    pub message_timestamp: Option<RawTimestamp>,
    pub status: Option<String>,
    #[serde(rename = "MessageUpdate")]
    pub message_update: Vec<RawMessageUpdate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawMessageKey {
    pub id: Option<String>,
    pub remote_jid: Option<String>,
    pub from_me: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawMessageUpdate {
    pub status: Option<String>,
}

/// The type-tagged content object nested in a raw message. Exactly one
/// sub-object is normally present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawMessageContent {
    pub conversation: Option<String>,
    pub extended_text_message: Option<RawExtendedText>,
    pub image_message: Option<RawImageMessage>,
    pub audio_message: Option<Value>,
    pub video_message: Option<Value>,
    pub sticker_message: Option<Value>,
    pub document_message: Option<RawDocumentMessage>,
    pub template_button_reply_message: Option<RawButtonReply>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawExtendedText {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawImageMessage {
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawDocumentMessage {
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawButtonReply {
    pub selected_display_text: Option<String>,
}

/// `messageTimestamp` arrives as a plain number, a numeric string, or a
/// wrapped 64-bit value exposing its low word.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Number(i64),
    Float(f64),
    Wrapped { low: i64 },
    Text(String),
}

impl RawTimestamp {
    fn raw_value(&self) -> Option<i64> {
        match self {
            RawTimestamp::Number(value) => Some(*value),
            RawTimestamp::Float(value) => Some(*value as i64),
            RawTimestamp::Wrapped { low } => Some(*low),
            RawTimestamp::Text(text) => text.trim().parse().ok(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|text| !text.is_empty()).cloned()
}

/// Derive display text from message content. First match wins: plain
/// conversation text, extended/quoted text, image caption, then a fixed
/// placeholder per media kind (documents keep their title), then the
/// selected button-reply text.
pub fn content_text(content: &RawMessageContent) -> Option<String> {
    if let Some(text) = non_empty(&content.conversation) {
        return Some(text);
    }
    if let Some(extended) = &content.extended_text_message {
        if let Some(text) = non_empty(&extended.text) {
            return Some(text);
        }
    }
    if let Some(image) = &content.image_message {
        return Some(non_empty(&image.caption).unwrap_or_else(|| PHOTO_PLACEHOLDER.to_string()));
    }
    if content.audio_message.is_some() {
        return Some(AUDIO_PLACEHOLDER.to_string());
    }
    if content.video_message.is_some() {
        return Some(VIDEO_PLACEHOLDER.to_string());
    }
    if content.sticker_message.is_some() {
        return Some(STICKER_PLACEHOLDER.to_string());
    }
    if let Some(document) = &content.document_message {
        return Some(match non_empty(&document.title) {
            Some(title) => format!("{} {}", DOCUMENT_PLACEHOLDER, title),
            None => DOCUMENT_PLACEHOLDER.to_string(),
        });
    }
    if let Some(reply) = &content.template_button_reply_message {
        if let Some(text) = non_empty(&reply.selected_display_text) {
            return Some(text);
        }
    }
    None
}

/// Normalize a raw timestamp to an absolute instant. Seconds are
/// promoted to milliseconds; a missing or unusable value becomes "now"
/// so the message still sorts reasonably among its peers.
fn normalize_timestamp(raw: Option<&RawTimestamp>) -> DateTime<Utc> {
    let millis = raw
        .and_then(RawTimestamp::raw_value)
        .filter(|&value| value != 0)
        .map(|value| {
            if value < MILLIS_EPOCH_THRESHOLD {
                value * 1000
            } else {
                value
            }
        });

    millis
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now)
}

/// Classify a gateway status string. Unrecognized values keep the
/// direction-based default: outbound messages are at least sent, inbound
/// ones are read the moment they are visible.
fn classify_status(raw_status: Option<&str>, from_me: bool) -> MessageStatus {
    let default = if from_me {
        MessageStatus::Sent
    } else {
        MessageStatus::Read
    };

    let Some(status) = raw_status else {
        return default;
    };

    let lower = status.to_lowercase();
    if lower == "error" {
        MessageStatus::Error
    } else if lower.contains("read") || lower == "played" {
        MessageStatus::Read
    } else if lower.contains("ack") || lower.contains("delivery") {
        MessageStatus::Sent
    } else if lower == "pending" {
        MessageStatus::Sending
    } else {
        default
    }
}

fn normalize_message(raw: RawMessage) -> Message {
    let content = raw.message.unwrap_or_default();
    let text = content_text(&content).unwrap_or_else(|| UNSUPPORTED_TEXT.to_string());

    let sender = if raw.key.from_me {
        Sender::Me
    } else {
        Sender::Them
    };

    // Prefer the message's own status field; fall back to the latest
    // entry of its update history.
    let status_str = raw
        .status
        .as_deref()
        .filter(|status| !status.is_empty())
        .or_else(|| {
            raw.message_update
                .last()
                .and_then(|update| update.status.as_deref())
        });
    let status = classify_status(status_str, raw.key.from_me);

    Message {
        id: raw
            .key
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        text,
        sender,
        timestamp: normalize_timestamp(raw.message_timestamp.as_ref()),
        status,
        from_jid: raw.key.remote_jid,
    }
}

/// Normalize raw gateway messages into uniform Message records, oldest
/// first. The gateway's pagination order is not chronological.
pub fn normalize_messages(raw_messages: Vec<RawMessage>) -> Vec<Message> {
    let mut messages: Vec<Message> = raw_messages.into_iter().map(normalize_message).collect();
    messages.sort_by_key(|message| message.timestamp);
    messages
}

/// Pull the message array out of the gateway response. Evolution has
/// shipped several envelope shapes over time: `messages.records`, a
/// plain `messages` array, a bare array, and `data`.
pub fn message_records_from_response(body: Value) -> Vec<RawMessage> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("messages") {
            Some(Value::Object(mut inner)) => match inner.remove("records") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            Some(Value::Array(items)) => items,
            _ => match map.remove("data") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RawMessage>(item) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Skipping undecodable message record: {}", e);
                None
            }
        })
        .collect()
}

impl EvolutionClient {
    /// Fetch one page of a thread's history, normalized and in
    /// chronological order.
    ///
    /// The thread id is canonicalized before the request so individual
    /// chats are always addressed by their phone JID, whatever shape the
    /// caller holds.
    pub async fn fetch_messages(
        &self,
        thread_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Message>> {
        let remote_jid = canonicalize_remote_jid(thread_id);
        let url = self.instance_url("/chat/findMessages");
        info!(
            "Fetching messages for {} (page {}, limit {})",
            remote_jid, page, limit
        );

        let body = serde_json::json!({
            "where": { "key": { "remoteJid": remote_jid } },
            "page": page,
            "offset": limit,
        });

        let response = self
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::from)?;
        let payload: Value = Self::check(response)?.json().await.map_err(ApiError::from)?;

        let raw = message_records_from_response(payload);
        debug!("Gateway returned {} raw message records", raw.len());
        Ok(normalize_messages(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawMessage {
        serde_json::from_value(value).expect("valid raw message")
    }

    #[test]
    fn test_seconds_timestamp_is_promoted_to_millis() {
        let msg = normalize_messages(vec![raw(json!({
            "key": { "id": "A1", "fromMe": true },
            "message": { "conversation": "oi" },
            "messageTimestamp": 1700000000i64,
        }))]);
        assert_eq!(msg[0].timestamp.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_millis_timestamp_is_kept() {
        let msg = normalize_messages(vec![raw(json!({
            "key": { "id": "A1", "fromMe": true },
            "message": { "conversation": "oi" },
            "messageTimestamp": 1_700_000_000_000i64,
        }))]);
        assert_eq!(msg[0].timestamp.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_wrapped_timestamp_uses_low_word() {
        let msg = normalize_messages(vec![raw(json!({
            "key": { "id": "A1", "fromMe": false },
            "message": { "conversation": "oi" },
            "messageTimestamp": { "low": 1700000000i64, "high": 0, "unsigned": false },
        }))]);
        assert_eq!(msg[0].timestamp.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_missing_timestamp_falls_back_to_now() {
        let before = Utc::now();
        let msg = normalize_messages(vec![raw(json!({
            "key": { "id": "A1", "fromMe": false },
            "message": { "conversation": "oi" },
        }))]);
        let after = Utc::now();
        assert!(msg[0].timestamp >= before && msg[0].timestamp <= after);
    }

    #[test]
    fn test_direction_based_status_defaults() {
        let inbound = normalize_messages(vec![raw(json!({
            "key": { "id": "A1", "fromMe": false },
            "message": { "conversation": "oi" },
            "messageTimestamp": 1700000000i64,
        }))]);
        assert_eq!(inbound[0].status, MessageStatus::Read);
        assert_eq!(inbound[0].sender, Sender::Them);

        let outbound = normalize_messages(vec![raw(json!({
            "key": { "id": "A2", "fromMe": true },
            "message": { "conversation": "oi" },
            "messageTimestamp": 1700000000i64,
        }))]);
        assert_eq!(outbound[0].status, MessageStatus::Sent);
        assert_eq!(outbound[0].sender, Sender::Me);
    }

    #[test]
    fn test_status_string_classification() {
        assert_eq!(classify_status(Some("error"), true), MessageStatus::Error);
        assert_eq!(classify_status(Some("READ"), true), MessageStatus::Read);
        assert_eq!(classify_status(Some("played"), true), MessageStatus::Read);
        assert_eq!(
            classify_status(Some("SERVER_ACK"), false),
            MessageStatus::Sent
        );
        assert_eq!(
            classify_status(Some("DELIVERY_ACK"), false),
            MessageStatus::Sent
        );
        assert_eq!(
            classify_status(Some("pending"), true),
            MessageStatus::Sending
        );
        // Unknown strings keep the direction default.
        assert_eq!(classify_status(Some("weird"), true), MessageStatus::Sent);
        assert_eq!(classify_status(Some("weird"), false), MessageStatus::Read);
    }

    #[test]
    fn test_update_history_supplies_missing_status() {
        let msg = normalize_messages(vec![raw(json!({
            "key": { "id": "A1", "fromMe": true },
            "message": { "conversation": "oi" },
            "messageTimestamp": 1700000000i64,
            "MessageUpdate": [
                { "status": "SERVER_ACK" },
                { "status": "READ" },
            ],
        }))]);
        assert_eq!(msg[0].status, MessageStatus::Read);
    }

    #[test]
    fn test_output_is_sorted_ascending() {
        let msgs = normalize_messages(vec![
            raw(json!({
                "key": { "id": "newer", "fromMe": false },
                "message": { "conversation": "second" },
                "messageTimestamp": 1700000100i64,
            })),
            raw(json!({
                "key": { "id": "older", "fromMe": false },
                "message": { "conversation": "first" },
                "messageTimestamp": 1700000000i64,
            })),
        ]);
        assert_eq!(msgs[0].id, "older");
        assert_eq!(msgs[1].id, "newer");
    }

    #[test]
    fn test_content_precedence() {
        let caption = raw(json!({
            "key": { "id": "A1", "fromMe": false },
            "message": { "imageMessage": { "caption": "look at this" } },
            "messageTimestamp": 1700000000i64,
        }));
        assert_eq!(normalize_messages(vec![caption])[0].text, "look at this");

        let photo = raw(json!({
            "key": { "id": "A2", "fromMe": false },
            "message": { "imageMessage": { "url": "https://cdn.example/img" } },
            "messageTimestamp": 1700000000i64,
        }));
        assert_eq!(normalize_messages(vec![photo])[0].text, PHOTO_PLACEHOLDER);

        let document = raw(json!({
            "key": { "id": "A3", "fromMe": false },
            "message": { "documentMessage": { "title": "contrato.pdf" } },
            "messageTimestamp": 1700000000i64,
        }));
        assert_eq!(
            normalize_messages(vec![document])[0].text,
            format!("{} contrato.pdf", DOCUMENT_PLACEHOLDER)
        );

        let reply = raw(json!({
            "key": { "id": "A4", "fromMe": false },
            "message": {
                "templateButtonReplyMessage": { "selectedDisplayText": "Sim, quero" }
            },
            "messageTimestamp": 1700000000i64,
        }));
        assert_eq!(normalize_messages(vec![reply])[0].text, "Sim, quero");
    }

    #[test]
    fn test_unrecognized_content_uses_fallback_text() {
        let msg = normalize_messages(vec![raw(json!({
            "key": { "id": "A1", "fromMe": false },
            "message": { "reactionMessage": { "text": "\u{1F44D}" } },
            "messageTimestamp": 1700000000i64,
        }))]);
        assert_eq!(msg[0].text, UNSUPPORTED_TEXT);
    }

    #[test]
    fn test_missing_id_gets_a_generated_token() {
        let msgs = normalize_messages(vec![raw(json!({
            "key": { "fromMe": false },
            "message": { "conversation": "oi" },
            "messageTimestamp": 1700000000i64,
        }))]);
        assert!(!msgs[0].id.is_empty());
    }

    #[test]
    fn test_envelope_variants() {
        let record = json!({
            "key": { "id": "A1", "fromMe": false },
            "message": { "conversation": "oi" },
            "messageTimestamp": 1700000000i64,
        });

        let nested = json!({ "messages": { "records": [record.clone()] } });
        assert_eq!(message_records_from_response(nested).len(), 1);

        let plain = json!({ "messages": [record.clone()] });
        assert_eq!(message_records_from_response(plain).len(), 1);

        let bare = json!([record.clone()]);
        assert_eq!(message_records_from_response(bare).len(), 1);

        let data = json!({ "data": [record] });
        assert_eq!(message_records_from_response(data).len(), 1);

        assert!(message_records_from_response(json!({ "status": 404 })).is_empty());
    }
}
