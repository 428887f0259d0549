//! User actions as pure state transitions.
//!
//! [`dispatch`] never touches the outside world. It returns the next state
//! plus the [`Effect`]s a front end has to carry out (speech, network,
//! storage, clipboard, files, notifications).

use crate::downloader::alert_message;
use crate::error::{DownloadError, HistoryError};
use crate::history::{History, EXPORT_FILE_NAME};
use crate::phonetics::{approx_phonetic, split_syllables};
use crate::share::{share_url, text_from_share_url};
use crate::speech::SpeechParams;
use crate::theme::{Theme, ThemeState, ThemeStyles};

pub const IMPORTED: &str = "Imported!";
pub const INVALID_FILE: &str = "Invalid file";
pub const NO_SHARED_TEXT: &str = "No shared text in link";

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub text: String,
    pub params: SpeechParams,
    /// Language tag of the selected on-device voice.
    pub voice_language: Option<String>,
    pub theme: Theme,
    pub history: History,
    pub share_base: String,
}

impl AppState {
    pub fn new(history: History, theme: Theme, share_base: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            params: SpeechParams::default(),
            voice_language: None,
            theme,
            history,
            share_base: share_base.into(),
        }
    }

    pub fn hints(&self) -> Hints {
        Hints {
            phonetic: approx_phonetic(&self.text),
            syllables: split_syllables(&self.text),
        }
    }
}

/// Derived display for the current text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hints {
    pub phonetic: String,
    pub syllables: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetText(String),
    Speak,
    Stop,
    Download,
    Save,
    Delete(usize),
    /// Load a history entry into the input and speak it.
    Replay(usize),
    Clear,
    /// Raw contents of an import file.
    Import(String),
    Export,
    Share,
    /// Load the text carried by a share link.
    OpenLink(String),
    SetTheme(Theme),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Speak { text: String, params: SpeechParams },
    StopSpeech,
    /// Fetch audio from the relay. The executor records the text in the
    /// history once the file is saved.
    Download {
        text: String,
        voice_language: Option<String>,
    },
    PersistHistory(History),
    PersistTheme(Theme),
    ApplyStyles(ThemeStyles),
    CopyToClipboard(String),
    WriteFile { name: String, contents: String },
    Notify(String),
}

/// Applies `action` to `state`. `now_ms` timestamps new history entries.
pub fn dispatch(mut state: AppState, action: Action, now_ms: i64) -> (AppState, Vec<Effect>) {
    let mut effects = Vec::new();
    match action {
        Action::SetText(text) => state.text = text,
        Action::Speak => {
            if !state.text.is_empty() {
                effects.push(Effect::Speak {
                    text: state.text.clone(),
                    params: state.params.clone(),
                });
            }
        }
        Action::Stop => effects.push(Effect::StopSpeech),
        Action::Download => {
            let text = state.text.trim();
            if text.is_empty() {
                effects.push(Effect::Notify(alert_message(&DownloadError::EmptyText)));
            } else {
                effects.push(Effect::Download {
                    text: text.to_string(),
                    voice_language: state.voice_language.clone(),
                });
            }
        }
        Action::Save => {
            if state.history.append(&state.text, now_ms) {
                effects.push(Effect::PersistHistory(state.history.clone()));
            }
        }
        Action::Delete(index) => {
            if state.history.remove(index).is_some() {
                effects.push(Effect::PersistHistory(state.history.clone()));
            }
        }
        Action::Replay(index) => {
            if let Some(entry) = state.history.entries().get(index) {
                state.text = entry.text.clone();
                effects.push(Effect::Speak {
                    text: state.text.clone(),
                    params: state.params.clone(),
                });
            }
        }
        Action::Clear => {
            state.history.clear();
            effects.push(Effect::PersistHistory(state.history.clone()));
        }
        Action::Import(raw) => match import(&raw) {
            Ok(history) => {
                state.history = history;
                effects.push(Effect::PersistHistory(state.history.clone()));
                effects.push(Effect::Notify(IMPORTED.to_string()));
            }
            Err(message) => effects.push(Effect::Notify(message)),
        },
        Action::Export => effects.push(Effect::WriteFile {
            name: EXPORT_FILE_NAME.to_string(),
            contents: state.history.to_json(),
        }),
        Action::Share => match share_url(&state.share_base, &state.text) {
            Ok(link) => effects.push(Effect::CopyToClipboard(link)),
            Err(e) => effects.push(Effect::Notify(e.to_string())),
        },
        Action::OpenLink(link) => match text_from_share_url(link.trim()) {
            Some(text) => state.text = text,
            None => effects.push(Effect::Notify(NO_SHARED_TEXT.to_string())),
        },
        Action::SetTheme(theme) => {
            state.theme = theme;
            effects.push(Effect::PersistTheme(theme));
            effects.push(Effect::ApplyStyles(ThemeState::apply(theme)));
        }
    }
    (state, effects)
}

fn import(raw: &str) -> Result<History, String> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|_| INVALID_FILE.to_string())?;
    History::from_json(&value).map_err(|e| match e {
        HistoryError::Parse(_) => INVALID_FILE.to_string(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(text: &str) -> AppState {
        let mut s = AppState::new(History::new(), Theme::Dark, "http://localhost:8080/");
        s.text = text.to_string();
        s
    }

    #[test]
    fn test_set_text_updates_hints() {
        let (s, effects) = dispatch(state(""), Action::SetText("think".to_string()), 0);
        assert!(effects.is_empty());
        assert_eq!(
            s.hints(),
            Hints {
                phonetic: "θink".to_string(),
                syllables: "th-ink".to_string(),
            }
        );
        assert_eq!(state("").hints().phonetic, "—");
    }

    #[test]
    fn test_speak_skips_empty_text() {
        let (_, effects) = dispatch(state(""), Action::Speak, 0);
        assert!(effects.is_empty());

        let (_, effects) = dispatch(state("hola"), Action::Speak, 0);
        assert_eq!(
            effects,
            vec![Effect::Speak {
                text: "hola".to_string(),
                params: SpeechParams::default()
            }]
        );
    }

    #[test]
    fn test_download_requires_text() {
        let (_, effects) = dispatch(state("   "), Action::Download, 0);
        assert_eq!(
            effects,
            vec![Effect::Notify(
                "No text detected in the input. Please type something before clicking Download."
                    .to_string()
            )]
        );

        let mut s = state("  hola  ");
        s.voice_language = Some("es-ES".to_string());
        let (_, effects) = dispatch(s, Action::Download, 0);
        assert_eq!(
            effects,
            vec![Effect::Download {
                text: "hola".to_string(),
                voice_language: Some("es-ES".to_string())
            }]
        );
    }

    #[test]
    fn test_save_delete_clear_persist() {
        let (s, effects) = dispatch(state("uno"), Action::Save, 10);
        assert_eq!(s.history.entries()[0].ts, 10);
        assert_eq!(effects, vec![Effect::PersistHistory(s.history.clone())]);

        let (s, effects) = dispatch(s, Action::Delete(3), 11);
        assert!(effects.is_empty());
        assert_eq!(s.history.len(), 1);

        let (s, effects) = dispatch(s, Action::Delete(0), 12);
        assert!(s.history.is_empty());
        assert_eq!(effects.len(), 1);

        let (_, effects) = dispatch(state(" "), Action::Save, 13);
        assert!(effects.is_empty());

        let (s, _) = dispatch(state("dos"), Action::Save, 14);
        let (s, effects) = dispatch(s, Action::Clear, 15);
        assert!(s.history.is_empty());
        assert_eq!(effects, vec![Effect::PersistHistory(History::new())]);
    }

    #[test]
    fn test_replay_loads_entry() {
        let (s, _) = dispatch(state("again"), Action::Save, 1);
        let (s, _) = dispatch(s, Action::SetText(String::new()), 2);
        let (s, effects) = dispatch(s, Action::Replay(0), 3);
        assert_eq!(s.text, "again");
        assert!(matches!(&effects[..], [Effect::Speak { text, .. }] if text == "again"));

        let (_, effects) = dispatch(s, Action::Replay(9), 4);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_import_outcomes() {
        let (s, effects) = dispatch(
            state(""),
            Action::Import(r#"[{"text":"a","ts":1},{"text":"b"}]"#.to_string()),
            0,
        );
        assert_eq!(s.history.len(), 2);
        assert_eq!(effects.last(), Some(&Effect::Notify(IMPORTED.to_string())));

        let (s2, effects) = dispatch(s.clone(), Action::Import("{\"text\":\"x\"}".to_string()), 0);
        assert_eq!(s2.history, s.history);
        assert_eq!(
            effects,
            vec![Effect::Notify(
                "Invalid file: expected an array of history items".to_string()
            )]
        );

        let (s3, effects) = dispatch(s.clone(), Action::Import("not json".to_string()), 0);
        assert_eq!(s3.history, s.history);
        assert_eq!(effects, vec![Effect::Notify(INVALID_FILE.to_string())]);
    }

    #[test]
    fn test_export_writes_history_file() {
        let (s, _) = dispatch(state("x"), Action::Save, 5);
        let (_, effects) = dispatch(s, Action::Export, 6);
        assert_eq!(
            effects,
            vec![Effect::WriteFile {
                name: "pronounce-history.json".to_string(),
                contents: r#"[{"text":"x","ts":5}]"#.to_string()
            }]
        );
    }

    #[test]
    fn test_share_builds_link() {
        let (_, effects) = dispatch(state("a b"), Action::Share, 0);
        assert_eq!(
            effects,
            vec![Effect::CopyToClipboard(
                "http://localhost:8080/?q=a+b".to_string()
            )]
        );

        let mut s = state("x");
        s.share_base = "nope".to_string();
        let (_, effects) = dispatch(s, Action::Share, 0);
        assert!(matches!(&effects[..], [Effect::Notify(_)]));
    }

    #[test]
    fn test_open_link_sets_text() {
        let (s, effects) = dispatch(
            state("old"),
            Action::OpenLink(" http://localhost:8080/?q=%C2%BFqu%C3%A9+tal%3F ".to_string()),
            0,
        );
        assert!(effects.is_empty());
        assert_eq!(s.text, "¿qué tal?");
        assert_eq!(s.hints().syllables, split_syllables("¿qué tal?"));

        let (s, effects) = dispatch(
            state("old"),
            Action::OpenLink("http://localhost:8080/".to_string()),
            0,
        );
        assert_eq!(s.text, "old");
        assert_eq!(effects, vec![Effect::Notify(NO_SHARED_TEXT.to_string())]);
    }

    #[test]
    fn test_set_theme() {
        let (s, effects) = dispatch(state(""), Action::SetTheme(Theme::Light), 0);
        assert_eq!(s.theme, Theme::Light);
        assert_eq!(
            effects,
            vec![
                Effect::PersistTheme(Theme::Light),
                Effect::ApplyStyles(ThemeState::apply(Theme::Light))
            ]
        );
    }
}
