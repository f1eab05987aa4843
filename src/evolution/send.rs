// Outbound text messages.

use anyhow::{anyhow, Result};
use log::{error, info};
use serde_json::Value;
use std::time::Duration;

use super::{ApiError, EvolutionClient};

/// A text send request. `delay` simulates typing time at the gateway in
/// milliseconds; link previews default to on.
#[derive(Debug, Clone)]
pub struct SendText {
    pub number: String,
    pub text: String,
    pub delay: Option<u64>,
    pub link_preview: Option<bool>,
}

impl SendText {
    pub fn new(number: &str, text: &str) -> Self {
        SendText {
            number: number.to_string(),
            text: text.to_string(),
            delay: None,
            link_preview: None,
        }
    }
}

const DEFAULT_DELAY_MS: u64 = 1200;
const MAX_SEND_ATTEMPTS: usize = 2;
const BASE_BACKOFF_MS: u64 = 500;

impl EvolutionClient {
    /// Send a text message, retrying once with jittered backoff on
    /// transient failure. Returns the gateway's raw response payload.
    pub async fn send_text(&self, payload: &SendText) -> Result<Value> {
        let url = self.instance_url("/message/sendText");

        // The gateway wants a bare number; strip any JID suffix.
        let number = payload
            .number
            .split('@')
            .next()
            .unwrap_or(payload.number.as_str());

        let body = serde_json::json!({
            "number": number,
            "text": payload.text,
            "delay": payload.delay.unwrap_or(DEFAULT_DELAY_MS),
            "linkPreview": payload.link_preview.unwrap_or(true),
        });

        let mut last_error: Option<ApiError> = None;
        for attempt in 1..=MAX_SEND_ATTEMPTS {
            match self.try_send(&url, &body).await {
                Ok(response) => {
                    info!("Message to {} accepted on attempt {}", number, attempt);
                    return Ok(response);
                }
                // A bad api key will not get better on retry.
                Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
                Err(e) => {
                    error!(
                        "Send attempt {}/{} for {} failed: {}",
                        attempt, MAX_SEND_ATTEMPTS, number, e
                    );
                    last_error = Some(e);
                    if attempt < MAX_SEND_ATTEMPTS {
                        let backoff =
                            BASE_BACKOFF_MS * 2u64.pow(attempt as u32) + rand::random::<u64>() % 500;
                        info!("Retrying send in {}ms...", backoff);
                        tokio::time::sleep(Duration::from_millis(backoff)).await;
                    }
                }
            }
        }

        match last_error {
            Some(e) => Err(anyhow::Error::new(e)
                .context(format!("failed to send message after {} attempts", MAX_SEND_ATTEMPTS))),
            None => Err(anyhow!("failed to send message")),
        }
    }

    async fn try_send(&self, url: &str, body: &Value) -> Result<Value, ApiError> {
        let response = self.post(url).json(body).send().await?;
        let payload = Self::check(response)?.json().await?;
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_defaults() {
        let payload = SendText::new("5521987654321@s.whatsapp.net", "oi");
        assert_eq!(payload.delay, None);
        assert_eq!(payload.link_preview, None);
        // Defaults are applied at request-build time.
        assert_eq!(payload.delay.unwrap_or(DEFAULT_DELAY_MS), 1200);
        assert!(payload.link_preview.unwrap_or(true));
    }

    #[test]
    fn test_number_suffix_is_stripped() {
        let payload = SendText::new("5521987654321@s.whatsapp.net", "oi");
        let number = payload.number.split('@').next().unwrap_or(&payload.number);
        assert_eq!(number, "5521987654321");
    }
}
