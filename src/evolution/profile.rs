// Profile picture lookup.

use log::debug;
use serde_json::Value;

use super::EvolutionClient;

impl EvolutionClient {
    /// Look up the profile picture URL for a number or JID. Avatars are
    /// cosmetic, so any failure degrades to None instead of erroring.
    pub async fn fetch_profile_picture_url(&self, number_or_jid: &str) -> Option<String> {
        let url = self.instance_url("/chat/fetchProfilePictureUrl");
        let body = serde_json::json!({ "number": number_or_jid });

        let response = match self.post(&url).json(&body).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("Profile picture fetch failed for {}: {}", number_or_jid, e);
                return None;
            }
        };

        let payload: Value = match response.json().await {
            Ok(payload) => payload,
            Err(e) => {
                debug!("Profile picture response unreadable for {}: {}", number_or_jid, e);
                return None;
            }
        };

        payload
            .get("profilePictureUrl")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}
