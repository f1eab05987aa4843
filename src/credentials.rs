use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::info;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Read;
use std::path::PathBuf;

use zapdesk::evolution::AuthConfig;

/// Gateway credentials as stored on disk. The api key is base64-encoded
/// at rest; that is obfuscation, not encryption.
#[derive(Serialize, Deserialize, Clone)]
pub struct Credentials {
    pub base_url: String,
    pub instance_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Credentials {
    pub fn new(base_url: &str, instance_name: &str, api_key: &str) -> Self {
        Credentials {
            base_url: base_url.to_string(),
            instance_name: instance_name.to_string(),
            api_key: Some(BASE64.encode(api_key)),
        }
    }

    pub fn get_api_key(&self) -> Option<String> {
        self.api_key.as_ref().map(|encoded| {
            String::from_utf8(BASE64.decode(encoded).unwrap_or_default()).unwrap_or_default()
        })
    }

    /// Runtime config for the gateway client. None when no api key is
    /// stored.
    pub fn to_auth_config(&self) -> Option<AuthConfig> {
        Some(AuthConfig {
            base_url: self.base_url.clone(),
            instance_name: self.instance_name.clone(),
            api_key: self.get_api_key()?,
        })
    }
}

static CONFIG_DIR_OVERRIDE: OnceCell<PathBuf> = OnceCell::new();

/// Override the credentials directory for the rest of the process.
/// Used by --config-dir and by tests.
pub fn set_config_dir_override(dir: PathBuf) {
    let _ = CONFIG_DIR_OVERRIDE.set(dir);
}

pub fn get_config_dir() -> Result<PathBuf> {
    if let Some(dir) = CONFIG_DIR_OVERRIDE.get() {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        return Ok(dir.clone());
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow!("Could not determine config directory"))?
        .join("zapdesk");

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("credentials.json"))
}

pub fn save_credentials(credentials: &Credentials) -> Result<()> {
    let config_path = get_config_path()?;
    let file = File::create(config_path)?;
    serde_json::to_writer_pretty(file, credentials)?;

    info!("Credentials saved for instance {}", credentials.instance_name);
    Ok(())
}

pub fn load_credentials() -> Result<Option<Credentials>> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        return Ok(None);
    }

    let config_path_str = config_path.display().to_string();

    let mut file = File::open(config_path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    let credentials: Credentials = serde_json::from_str(&contents)?;
    info!(
        "Loaded credentials for instance {} from {}",
        credentials.instance_name, config_path_str
    );

    Ok(Some(credentials))
}
