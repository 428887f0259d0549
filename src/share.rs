//! Share links: the current text travels in the `q` query parameter.

use crate::error::ShareError;
use arboard::Clipboard;
use reqwest::Url;
use tracing::{debug, warn};

pub const SHARE_PARAM: &str = "q";

/// `base` with `q` set to `text`, replacing any previous `q`.
pub fn share_url(base: &str, text: &str) -> Result<String, ShareError> {
    let mut url = Url::parse(base).map_err(|e| ShareError::InvalidUrl(e.to_string()))?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != SHARE_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(SHARE_PARAM, text);
    Ok(url.to_string())
}

/// The shared text carried by `url`, if any.
pub fn text_from_share_url(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == SHARE_PARAM)
        .map(|(_, v)| v.into_owned())
}

pub trait ClipboardSink {
    fn copy(&self, text: &str) -> Result<(), ShareError>;
}

/// The desktop clipboard.
pub struct SystemClipboard;

impl ClipboardSink for SystemClipboard {
    fn copy(&self, text: &str) -> Result<(), ShareError> {
        debug!("Copying {} chars to clipboard", text.len());
        let mut clipboard = Clipboard::new().map_err(|e| ShareError::Clipboard(e.to_string()))?;
        clipboard
            .set_text(text)
            .map_err(|e| ShareError::Clipboard(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareOutcome {
    /// The link is on the clipboard.
    Copied(String),
    /// The clipboard refused; the link must be copied by hand.
    Manual(String),
}

pub fn copy_link(clipboard: &dyn ClipboardSink, link: String) -> ShareOutcome {
    match clipboard.copy(&link) {
        Ok(()) => ShareOutcome::Copied(link),
        Err(e) => {
            warn!("Share: {}", e);
            ShareOutcome::Manual(link)
        }
    }
}
