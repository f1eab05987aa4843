// Instance connection management.

use anyhow::Result;
use log::info;
use serde_json::Value;

use super::{ApiError, EvolutionClient};

impl EvolutionClient {
    /// Verify the configured credentials by listing instances. A clean
    /// response means the gateway accepted the api key.
    pub async fn verify_credentials(&self) -> Result<()> {
        let url = self.url("/instance/fetchInstances");
        info!("Verifying credentials against {}", url);

        let response = self.get(&url).send().await.map_err(ApiError::from)?;
        Self::check(response)?;

        info!(
            "Credentials accepted for instance {}",
            self.config().instance_name
        );
        Ok(())
    }

    /// Ask the gateway to (re)connect the WhatsApp instance. The raw
    /// payload carries pairing state and QR data when the instance is
    /// not yet linked.
    pub async fn connect_instance(&self) -> Result<Value> {
        let url = self.instance_url("/instance/connect");
        info!("Requesting instance connect: {}", url);

        let response = self.get(&url).send().await.map_err(ApiError::from)?;
        let payload = Self::check(response)?.json().await.map_err(ApiError::from)?;
        Ok(payload)
    }
}
