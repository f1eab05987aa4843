// Evolution API gateway client for zapdesk
// This file serves as the entry point for all gateway-related functionality,
// organized by API concern.

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Import our submodules - making them public
pub mod chats;
pub mod connection;
pub mod identity;
pub mod messages;
pub mod outbox;
pub mod profile;
pub mod send;

// Re-export the core transformations for easy access
pub use chats::unify_chats;
pub use identity::{canonicalize_remote_jid, resolve_phone_jid};
pub use messages::normalize_messages;
pub use outbox::Outbox;

/// JID suffixes the gateway uses to tag identifier kinds.
pub mod jid {
    pub const USER_SUFFIX: &str = "@s.whatsapp.net";
    pub const GROUP_SUFFIX: &str = "@g.us";
    pub const LID_SUFFIX: &str = "@lid";
    pub const NEWSLETTER_SUFFIX: &str = "@newsletter";
}

/// Connection settings for one Evolution API instance.
///
/// Carried explicitly by whoever talks to the gateway; there is no
/// process-global auth state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub base_url: String,
    pub instance_name: String,
    pub api_key: String,
}

impl AuthConfig {
    /// Base URL without a trailing slash.
    pub fn clean_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Errors surfaced by the gateway transport.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid api key or unauthorized instance")]
    Unauthorized,
    #[error("gateway returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// HTTP client for one Evolution API instance.
pub struct EvolutionClient {
    config: AuthConfig,
    http: reqwest::Client,
}

impl EvolutionClient {
    pub fn new(config: AuthConfig) -> Self {
        EvolutionClient {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Endpoint that is not scoped to an instance.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.clean_base_url(), path)
    }

    /// Endpoint scoped to the configured instance name.
    fn instance_url(&self, path: &str) -> String {
        format!(
            "{}{}/{}",
            self.config.clean_base_url(),
            path,
            self.config.instance_name
        )
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http.get(url).header("apikey", &self.config.api_key)
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.http
            .post(url)
            .header("apikey", &self.config.api_key)
            .header("Content-Type", "application/json")
    }

    /// Map non-success statuses to ApiError, keeping auth failures
    /// distinguishable for the login flow.
    fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            debug!("Gateway request failed with status {}", status);
            return Err(ApiError::Status(status));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = AuthConfig {
            base_url: "https://api.example.com/".to_string(),
            instance_name: "sales".to_string(),
            api_key: "secret".to_string(),
        };
        assert_eq!(config.clean_base_url(), "https://api.example.com");

        let client = EvolutionClient::new(config);
        assert_eq!(
            client.instance_url("/chat/findChats"),
            "https://api.example.com/chat/findChats/sales"
        );
        assert_eq!(
            client.url("/instance/fetchInstances"),
            "https://api.example.com/instance/fetchInstances"
        );
    }
}
