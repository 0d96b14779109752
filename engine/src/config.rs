use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::{Result, eyre::eyre};
use log::debug;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::llm::{InputMessage, Request, lm_studio::ConfigError};

pub const DEFAULT_URL: &str = "http://localhost:1234/v1/chat/completions";

/// Everything a host exposes for tweaking the component.
///
/// Fields missing from a config file fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub url: String,
    /// must be set before a request can be sent
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub system_prompt: String,
    pub user_prompt: String,
    pub run_on_start: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.into(),
            model: String::new(),
            max_tokens: 128,
            temperature: 0.7,
            system_prompt: "Always answer in rhymes.".into(),
            user_prompt: "Introduce yourself.".into(),
            run_on_start: true,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            Err(ConfigError::MissingUrl)
        } else if self.model.trim().is_empty() {
            Err(ConfigError::MissingModel)
        } else {
            Ok(())
        }
    }

    /// The system + user prompt pair this config describes
    pub fn request(&self) -> Request {
        Request {
            system: Some(self.system_prompt.clone()),
            messages: vec![InputMessage::user(self.user_prompt.clone())],
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
        }
    }
}

pub fn load_ron_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let src = fs::read_to_string(path)?;
    Ok(ron::from_str(&src)?)
}

pub fn save_ron_file<T: Serialize>(path: &Path, x: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(fs::write(path, ron::ser::to_string_pretty(x, Default::default())?)?)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(dirs::config_local_dir()
        .ok_or(eyre!("Couldn't get config dir"))?
        .join("lm_studio_engine.ron"))
}

pub fn load_config_from(path: &Path) -> Result<Option<ClientConfig>> {
    if !path.exists() {
        debug!("no config at {}", path.display());
        Ok(None)
    } else {
        load_ron_file(path).map(Some)
    }
}

pub fn load_config() -> Result<Option<ClientConfig>> {
    load_config_from(&config_path()?)
}

pub fn save_config(cfg: &ClientConfig) -> Result<()> {
    save_ron_file(&config_path()?, cfg)
}
