// Chat listing and contact unification for the Evolution gateway.
//
// The gateway reports the same person under several raw chat records
// (phone JID, LID, alternate remote JID). fetch_chats folds them into
// one Contact per canonical identity.

use anyhow::Result;
use chrono::{Local, TimeZone};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use super::identity::resolve_phone_jid;
use super::messages::{content_text, RawMessageContent};
use super::{jid, ApiError, EvolutionClient};
use crate::models::Contact;

/// Preview shown when a chat has no derivable last-message text.
const EMPTY_PREVIEW: &str = "...";

/// One raw chat record as the gateway returns it. Field coverage is
/// deliberately partial; unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawChat {
    pub id: Option<String>,
    pub remote_jid: Option<String>,
    pub remote_jid_alt: Option<String>,
    pub push_name: Option<String>,
    pub name: Option<String>,
    pub verified_name: Option<String>,
    pub profile_picture_url: Option<String>,
    pub last_message: Option<RawLastMessage>,
    pub conversation_timestamp: Option<Value>,
    pub last_message_timestamp: Option<Value>,
    pub unread_count: Option<Value>,
}

/// `lastMessage` is either a plain string or an object carrying the
/// content directly or nested under `message`. Anything else degrades
/// to the empty preview instead of failing the record.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawLastMessage {
    Text(String),
    Envelope(RawLastMessageEnvelope),
    Other(Value),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawLastMessageEnvelope {
    pub message: Option<RawMessageContent>,
    #[serde(flatten)]
    pub inline: RawMessageContent,
}

fn preview_text(last: Option<&RawLastMessage>) -> String {
    match last {
        Some(RawLastMessage::Text(text)) => text.clone(),
        Some(RawLastMessage::Envelope(envelope)) => {
            let content = envelope.message.as_ref().unwrap_or(&envelope.inline);
            content_text(content).unwrap_or_else(|| EMPTY_PREVIEW.to_string())
        }
        Some(RawLastMessage::Other(_)) | None => EMPTY_PREVIEW.to_string(),
    }
}

/// Loose numeric coercion for fields the gateway serializes as either a
/// number or a numeric string.
fn coerce_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float as i64)),
        Value::String(text) => text.trim().parse::<f64>().ok().map(|float| float as i64),
        _ => None,
    }
}

fn chat_timestamp(chat: &RawChat) -> i64 {
    coerce_i64(chat.conversation_timestamp.as_ref())
        .filter(|&ts| ts != 0)
        .or_else(|| coerce_i64(chat.last_message_timestamp.as_ref()))
        .unwrap_or(0)
}

fn chat_unread_count(chat: &RawChat) -> u32 {
    coerce_i64(chat.unread_count.as_ref()).unwrap_or(0).max(0) as u32
}

fn display_name(chat: &RawChat, number: &str) -> String {
    [&chat.push_name, &chat.name, &chat.verified_name]
        .into_iter()
        .flatten()
        .find(|name| !name.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| number.to_string())
}

fn format_message_time(timestamp: i64) -> String {
    if timestamp <= 0 {
        return String::new();
    }
    Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|instant| instant.format("%H:%M").to_string())
        .unwrap_or_default()
}

/// Fold raw chat records into unified contacts, one per canonical
/// identity, most recently active first.
///
/// Records whose identifiers cannot be resolved to a phone or group JID
/// (pure-LID chats, malformed ids) are dropped. That is noise filtering,
/// not an error.
pub fn unify_chats(raw_chats: Vec<RawChat>) -> Vec<Contact> {
    let mut contacts: Vec<Contact> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut dropped = 0usize;

    for chat in raw_chats {
        let candidates = [
            chat.remote_jid_alt.as_deref(),
            chat.remote_jid.as_deref(),
            chat.id.as_deref(),
        ];
        let canonical = match resolve_phone_jid(&candidates) {
            Some(canonical) => canonical,
            None => {
                dropped += 1;
                continue;
            }
        };

        let preview = preview_text(chat.last_message.as_ref());
        let timestamp_raw = chat_timestamp(&chat);
        let unread_count = chat_unread_count(&chat);

        match index.get(&canonical).copied() {
            None => {
                let number = canonical
                    .split('@')
                    .next()
                    .unwrap_or(canonical.as_str())
                    .to_string();
                let contact = Contact {
                    id: canonical.clone(),
                    name: display_name(&chat, &number),
                    number,
                    avatar_url: chat.profile_picture_url.clone(),
                    last_message: preview,
                    last_message_time: format_message_time(timestamp_raw),
                    unread_count,
                    timestamp_raw,
                    is_group: canonical.contains(jid::GROUP_SUFFIX),
                    merged_ids: vec![canonical.clone()],
                };
                index.insert(canonical, contacts.len());
                contacts.push(contact);
            }
            Some(slot) => {
                let existing = &mut contacts[slot];

                // Several raw threads about one person must not suppress
                // the unread signal.
                existing.unread_count = existing.unread_count.max(unread_count);

                if timestamp_raw > existing.timestamp_raw {
                    existing.last_message = preview;
                    if timestamp_raw > 0 {
                        existing.last_message_time = format_message_time(timestamp_raw);
                    }
                    existing.timestamp_raw = timestamp_raw;
                }

                // Avatar is first-wins, independent of recency.
                if existing.avatar_url.is_none() {
                    if let Some(url) = &chat.profile_picture_url {
                        existing.avatar_url = Some(url.clone());
                    }
                }

                // A name already captured is never replaced; only the
                // number placeholder yields to a push name.
                if existing.name.is_empty() || existing.name == existing.number {
                    if let Some(push_name) =
                        chat.push_name.as_ref().filter(|name| !name.trim().is_empty())
                    {
                        existing.name = push_name.clone();
                    }
                }

                for raw_id in candidates.iter().flatten() {
                    if !existing.merged_ids.iter().any(|known| known == raw_id) {
                        existing.merged_ids.push((*raw_id).to_string());
                    }
                }
            }
        }
    }

    if dropped > 0 {
        debug!("Dropped {} chat records with unresolvable identities", dropped);
    }

    contacts.sort_by(|a, b| b.timestamp_raw.cmp(&a.timestamp_raw));
    contacts
}

/// Pull the chat array out of the gateway response, which is either a
/// bare array or wrapped in `data`.
pub fn chat_records_from_response(body: Value) -> Vec<RawChat> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RawChat>(item) {
            Ok(chat) => Some(chat),
            Err(e) => {
                warn!("Skipping undecodable chat record: {}", e);
                None
            }
        })
        .collect()
}

impl EvolutionClient {
    /// Fetch every chat known to the instance and unify them into one
    /// contact per canonical identity, most recently active first.
    pub async fn fetch_chats(&self) -> Result<Vec<Contact>> {
        let url = self.instance_url("/chat/findChats");
        info!("Fetching chats from {}", url);

        let response = self
            .post(&url)
            .json(&serde_json::json!({ "where": {} }))
            .send()
            .await
            .map_err(ApiError::from)?;
        let body: Value = Self::check(response)?.json().await.map_err(ApiError::from)?;

        let raw = chat_records_from_response(body);
        debug!("Gateway returned {} raw chat records", raw.len());
        Ok(unify_chats(raw))
    }
}
