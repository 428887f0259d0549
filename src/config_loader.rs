use config::builder::DefaultState;
use config::{Config, ConfigBuilder, File};
use reqwest::Url;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_UPSTREAM_URL: &str = "https://translate.google.com/translate_tts";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";
pub const DEFAULT_LOCAL_RELAY_URL: &str = "http://localhost:5001/tts";
pub const DEFAULT_DEPLOYED_RELAY_URL: &str = "https://gtts-proxy.onrender.com/tts";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    // Relay server
    pub relay_host: String,
    pub port: u16,
    pub upstream_url: String,
    pub user_agent: String,
    pub upstream_timeout_secs: u64,
    // Client: relay selection
    #[serde(default)]
    pub relay_url: Option<String>, // explicit override, skips the host heuristic
    pub local_relay_url: String,
    pub deployed_relay_url: String,
    pub client_host: String,
    pub download_timeout_secs: u64,
    pub output_dir: String,
    // Client: local state
    #[serde(default)]
    pub data_dir: Option<String>,
    pub share_base_url: String,
    pub prefers_dark: bool,
    // On-device speech
    pub speech_binary: String,
    pub speech_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            relay_host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            upstream_timeout_secs: 30,
            relay_url: None,
            local_relay_url: DEFAULT_LOCAL_RELAY_URL.to_string(),
            deployed_relay_url: DEFAULT_DEPLOYED_RELAY_URL.to_string(),
            client_host: "localhost".to_string(),
            download_timeout_secs: 60,
            output_dir: ".".to_string(),
            data_dir: None,
            share_base_url: "http://localhost:8080/".to_string(),
            prefers_dark: false,
            speech_binary: "espeak-ng".to_string(),
            speech_timeout_secs: 60,
        }
    }
}

impl Settings {
    /// Defaults, then `./Voco`, then `~/.config/voco/Voco`, then `VOCO_*`
    /// environment variables. A bare `PORT` variable wins for the relay port.
    pub fn new() -> Result<Self, config::ConfigError> {
        let builder = Self::defaults()?
            .add_source(File::with_name("Voco").required(false))
            .add_source(
                File::with_name(&format!(
                    "{}/.config/voco/Voco",
                    std::env::var("HOME").unwrap_or_default()
                ))
                .required(false),
            );
        Self::finish(builder)
    }

    /// Like [`Settings::new`] but reads one explicit config file instead of
    /// the default search locations.
    pub fn from_file(path: &Path) -> Result<Self, config::ConfigError> {
        let builder = Self::defaults()?.add_source(File::from(path).required(true));
        Self::finish(builder)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
        let d = Settings::default();
        Config::builder()
            .set_default("relay_host", d.relay_host)?
            .set_default("port", d.port as i64)?
            .set_default("upstream_url", d.upstream_url)?
            .set_default("user_agent", d.user_agent)?
            .set_default("upstream_timeout_secs", d.upstream_timeout_secs as i64)?
            .set_default("local_relay_url", d.local_relay_url)?
            .set_default("deployed_relay_url", d.deployed_relay_url)?
            .set_default("client_host", d.client_host)?
            .set_default("download_timeout_secs", d.download_timeout_secs as i64)?
            .set_default("output_dir", d.output_dir)?
            .set_default("share_base_url", d.share_base_url)?
            .set_default("prefers_dark", d.prefers_dark)?
            .set_default("speech_binary", d.speech_binary)?
            .set_default("speech_timeout_secs", d.speech_timeout_secs as i64)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self, config::ConfigError> {
        let builder = builder
            // e.g. VOCO_UPSTREAM_URL, VOCO_RELAY_URL
            .add_source(config::Environment::with_prefix("VOCO"))
            .set_override_option(
                "port",
                std::env::var("PORT").ok().filter(|port| !port.trim().is_empty()),
            )?;

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let mut urls = vec![
            ("upstream_url", self.upstream_url.as_str()),
            ("local_relay_url", self.local_relay_url.as_str()),
            ("deployed_relay_url", self.deployed_relay_url.as_str()),
            ("share_base_url", self.share_base_url.as_str()),
        ];
        if let Some(relay_url) = self.relay_url.as_deref() {
            urls.push(("relay_url", relay_url));
        }
        for (name, value) in urls {
            if let Err(e) = Url::parse(value) {
                return Err(config::ConfigError::Message(format!(
                    "Invalid {}: '{}' ({})",
                    name, value, e
                )));
            }
        }
        if self.upstream_timeout_secs == 0 || self.download_timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "timeouts must be greater than 0".to_string(),
            ));
        }
        if self.speech_binary.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "speech_binary must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory holding the client's key-value store.
    pub fn data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("voco"),
        }
    }
}
