//! Download path: ask the relay for an MP3 rendering of the current text and
//! save it locally.

use crate::config_loader::Settings;
use crate::error::DownloadError;
use crate::history::HistoryStore;
use crate::speech::Voice;
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};

pub const DOWNLOAD_FILE_NAME: &str = "vocal.mp3";
pub const DOWNLOAD_LABEL: &str = "⬇ Download MP3";
pub const BUSY_LABEL: &str = "Downloading...";
pub const DEFAULT_LANGUAGE: &str = "en";

/// Hosts treated as a local development context. The empty host is a
/// page opened straight from disk.
pub fn is_local_host(host: &str) -> bool {
    matches!(host, "" | "localhost" | "127.0.0.1" | "::1" | "[::1]")
}

/// Primary subtag of a BCP 47-ish tag (`es-MX` → `es`), or `en`.
pub fn language_code(tag: Option<&str>) -> String {
    tag.and_then(|t| t.split(['-', '_']).next())
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
}

/// `en`, `es-MX`, `pt_BR`, `zh-Hant-TW`: a 2-3 letter primary subtag and
/// optional alphanumeric subtags.
pub fn is_language_tag(tag: &str) -> bool {
    let mut parts = tag.split(['-', '_']);
    let primary = parts.next().unwrap_or_default();
    (2..=3).contains(&primary.len())
        && primary.chars().all(|c| c.is_ascii_alphabetic())
        && parts.all(|p| (1..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// Language tag for a voice chosen by id or name. An unknown choice is
/// only used when it is itself a language tag.
pub fn voice_language(voices: &[Voice], choice: &str) -> Option<String> {
    let choice = choice.trim();
    voices
        .iter()
        .find(|v| v.id == choice || v.name == choice)
        .map(|v| v.language.clone())
        .or_else(|| is_language_tag(choice).then(|| choice.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayTarget {
    pub explicit: Option<String>,
    pub local: String,
    pub deployed: String,
}

impl RelayTarget {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            explicit: settings.relay_url.clone(),
            local: settings.local_relay_url.clone(),
            deployed: settings.deployed_relay_url.clone(),
        }
    }

    /// A configured relay URL wins; otherwise the host decides.
    pub fn base_for(&self, host: &str) -> &str {
        if let Some(explicit) = self.explicit.as_deref() {
            return explicit;
        }
        if is_local_host(host) {
            &self.local
        } else {
            &self.deployed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
    pub language: String,
}

impl SpeechRequest {
    pub fn new(text: &str, voice_language: Option<&str>) -> Result<Self, DownloadError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DownloadError::EmptyText);
        }
        Ok(Self {
            text: text.to_string(),
            language: language_code(voice_language),
        })
    }

    /// `base?q=<text>&tl=<lang>`
    pub fn url(&self, base: &str) -> Result<Url, DownloadError> {
        Url::parse_with_params(base, &[("q", self.text.as_str()), ("tl", self.language.as_str())])
            .map_err(|e| DownloadError::InvalidUrl(format!("{}: {}", base, e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// One GET against the relay. Implementations report transport failures
/// only; status handling belongs to [`DownloadFlow`].
#[async_trait]
pub trait SpeechDownloader: Send + Sync {
    async fn get(&self, url: &Url) -> Result<RelayResponse, DownloadError>;
}

pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    pub fn new(timeout: Duration) -> Result<Self, DownloadError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SpeechDownloader for HttpDownloader {
    async fn get(&self, url: &Url) -> Result<RelayResponse, DownloadError> {
        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?.to_vec();
        Ok(RelayResponse { status, body })
    }
}

/// Blocking user-facing notification.
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlState {
    pub enabled: bool,
    pub label: String,
}

/// Interactive state of the download trigger.
pub struct DownloadControl {
    state: Mutex<ControlState>,
}

impl DownloadControl {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(ControlState {
                enabled: true,
                label: label.into(),
            }),
        }
    }

    pub fn snapshot(&self) -> ControlState {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Disables the control until the returned guard drops. `None` while
    /// another download holds it.
    pub fn acquire(&self) -> Option<BusyGuard<'_>> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if !state.enabled {
            return None;
        }
        let original = std::mem::replace(&mut state.label, BUSY_LABEL.to_string());
        state.enabled = false;
        Some(BusyGuard {
            control: self,
            original: Some(original),
        })
    }
}

pub struct BusyGuard<'a> {
    control: &'a DownloadControl,
    original: Option<String>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.control.state.lock().unwrap_or_else(|p| p.into_inner());
        state.enabled = true;
        if let Some(label) = self.original.take() {
            state.label = label;
        }
    }
}

/// Message shown to the user for each failure.
pub fn alert_message(err: &DownloadError) -> String {
    match err {
        DownloadError::EmptyText => {
            "No text detected in the input. Please type something before clicking Download."
                .to_string()
        }
        DownloadError::InProgress => "A download is already in progress.".to_string(),
        DownloadError::RelayStatus { status, .. } => format!(
            "Download failed: proxy returned an error (HTTP {}). Check the proxy logs.",
            status
        ),
        DownloadError::EmptyAudio => "Downloaded file is empty. Check proxy logs.".to_string(),
        DownloadError::Transport(e) | DownloadError::InvalidUrl(e) => format!(
            "Failed to download audio. Is the proxy running? ({})",
            e
        ),
        DownloadError::Save(e) => format!("Failed to save audio: {}", e),
    }
}

pub struct DownloadFlow {
    downloader: Arc<dyn SpeechDownloader>,
    target: RelayTarget,
    host: String,
    output_dir: PathBuf,
    control: DownloadControl,
    history: Option<HistoryStore>,
    notifier: Arc<dyn Notifier>,
}

impl DownloadFlow {
    pub fn new(
        downloader: Arc<dyn SpeechDownloader>,
        target: RelayTarget,
        host: impl Into<String>,
        output_dir: &Path,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            downloader,
            target,
            host: host.into(),
            output_dir: output_dir.to_path_buf(),
            control: DownloadControl::new(DOWNLOAD_LABEL),
            history: None,
            notifier,
        }
    }

    /// Successful downloads are also recorded in `history`.
    pub fn with_history(mut self, history: HistoryStore) -> Self {
        self.history = Some(history);
        self
    }

    pub fn control(&self) -> &DownloadControl {
        &self.control
    }

    /// Runs one download. Every failure is alerted and logged before it is
    /// returned; nothing is retried.
    pub async fn run(
        &self,
        text: &str,
        voice_language: Option<&str>,
    ) -> Result<PathBuf, DownloadError> {
        let result = self.attempt(text, voice_language).await;
        if let Err(e) = &result {
            error!("[download] {}", e);
            self.notifier.alert(&alert_message(e));
        }
        result
    }

    async fn attempt(
        &self,
        text: &str,
        voice_language: Option<&str>,
    ) -> Result<PathBuf, DownloadError> {
        let request = SpeechRequest::new(text, voice_language)?;
        let _busy = self.control.acquire().ok_or(DownloadError::InProgress)?;

        let base = self.target.base_for(&self.host);
        let url = request.url(base)?;
        info!("[download] host='{}' relay={} tl={}", self.host, base, request.language);

        let response = self.downloader.get(&url).await?;
        if !(200..300).contains(&response.status) {
            let body = String::from_utf8_lossy(&response.body);
            warn!("[download] relay error body: {}", body);
            return Err(DownloadError::RelayStatus {
                status: response.status,
                body: body.into_owned(),
            });
        }
        info!("[download] received {} bytes", response.body.len());
        if response.body.is_empty() {
            return Err(DownloadError::EmptyAudio);
        }

        let path = self.output_dir.join(DOWNLOAD_FILE_NAME);
        tokio::fs::write(&path, &response.body).await?;
        info!("[download] saved {}", path.display());

        if let Some(history) = &self.history {
            if let Err(e) = history.append(&request.text) {
                warn!("[download] could not record history: {}", e);
            }
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_hosts() {
        for host in ["", "localhost", "127.0.0.1", "::1"] {
            assert!(is_local_host(host), "{host:?} should be local");
        }
        for host in ["example.com", "10.0.0.2", "localhost.example"] {
            assert!(!is_local_host(host));
        }
    }

    #[test]
    fn test_relay_target_selection() {
        let mut target = RelayTarget::from_settings(&Settings::default());
        assert_eq!(target.base_for("localhost"), "http://localhost:5001/tts");
        assert_eq!(target.base_for(""), "http://localhost:5001/tts");
        assert_eq!(
            target.base_for("voco.example"),
            "https://gtts-proxy.onrender.com/tts"
        );

        target.explicit = Some("http://relay.lan/tts".to_string());
        assert_eq!(target.base_for("localhost"), "http://relay.lan/tts");
        assert_eq!(target.base_for("voco.example"), "http://relay.lan/tts");
    }

    #[test]
    fn test_language_code() {
        assert_eq!(language_code(Some("es-MX")), "es");
        assert_eq!(language_code(Some("pt_BR")), "pt");
        assert_eq!(language_code(Some("fr")), "fr");
        assert_eq!(language_code(Some("")), "en");
        assert_eq!(language_code(Some("-x")), "en");
        assert_eq!(language_code(None), "en");
    }

    #[test]
    fn test_voice_language_resolution() {
        let voices = vec![Voice {
            id: "gmw/af".to_string(),
            name: "Afrikaans".to_string(),
            language: "af".to_string(),
        }];
        assert_eq!(voice_language(&voices, "Afrikaans").as_deref(), Some("af"));
        assert_eq!(voice_language(&voices, "gmw/af").as_deref(), Some("af"));
        assert_eq!(voice_language(&voices, "es-MX").as_deref(), Some("es-MX"));
        assert_eq!(voice_language(&voices, "pt_BR").as_deref(), Some("pt_BR"));

        // not installed and not a tag: the download falls back to English
        assert_eq!(voice_language(&[], "Afrikaans"), None);
        assert_eq!(language_code(voice_language(&[], "Afrikaans").as_deref()), "en");
        assert_eq!(voice_language(&[], "roa/es-419"), None);
        assert_eq!(voice_language(&[], "e"), None);
        assert_eq!(voice_language(&[], "en-"), None);
    }

    #[test]
    fn test_request_encodes_query() {
        let request = SpeechRequest::new("  hola & adiós  ", Some("es-ES")).unwrap();
        assert_eq!(request.text, "hola & adiós");
        let url = request.url("http://localhost:5001/tts").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("q".to_string(), "hola & adiós".to_string()),
                ("tl".to_string(), "es".to_string())
            ]
        );
        assert!(matches!(
            SpeechRequest::new(" \t", None),
            Err(DownloadError::EmptyText)
        ));
    }

    #[test]
    fn test_busy_guard_restores_control() {
        let control = DownloadControl::new(DOWNLOAD_LABEL);
        {
            let _guard = control.acquire().expect("control free");
            let busy = control.snapshot();
            assert!(!busy.enabled);
            assert_eq!(busy.label, BUSY_LABEL);
            assert!(control.acquire().is_none());
        }
        assert_eq!(
            control.snapshot(),
            ControlState {
                enabled: true,
                label: DOWNLOAD_LABEL.to_string()
            }
        );
    }
}
