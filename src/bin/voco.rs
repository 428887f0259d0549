//! voco - command-line speech client
//!
//! Previews text with the on-device engine, downloads MP3 audio through the
//! relay and manages the local phrase history.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;
use tracing_subscriber::EnvFilter;
use voco::app::{dispatch, Action, AppState, Effect};
use voco::downloader::{voice_language, DownloadFlow, HttpDownloader, Notifier, RelayTarget};
use voco::error::{DownloadError, SpeechError};
use voco::history::HistoryStore;
use voco::share::{copy_link, ShareOutcome, SystemClipboard};
use voco::speech::{LocalSpeaker, PlaybackStatus, SpeechParams};
use voco::storage::FileStore;
use voco::theme::{load_theme, save_theme, Theme};
use voco::Settings;

/// Command-line client for the voco speech utility
#[derive(Parser)]
#[command(name = "voco")]
#[command(author = "StarTuz")]
#[command(version)]
#[command(about = "Speak, download and remember short phrases", long_about = None)]
struct Cli {
    /// Config file to read instead of the default search locations
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Speak text with the on-device engine
    Speak {
        text: String,
        /// Speaking rate (0.1-10, 1 is normal)
        #[arg(short, long)]
        rate: Option<f32>,
        /// Pitch (0-2, 1 is normal)
        #[arg(short, long)]
        pitch: Option<f32>,
        /// Installed voice to use (see `voco voices`)
        #[arg(short, long)]
        voice: Option<String>,
    },

    /// Download an MP3 rendering through the relay
    Download {
        text: String,
        /// Voice or language tag that picks the download language
        #[arg(short, long)]
        voice: Option<String>,
        /// Directory to save vocal.mp3 in (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Save a phrase to the history
    Save { text: String },

    /// Phrase history
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,
    },

    /// Show or switch the theme
    Theme {
        /// light or dark
        theme: Option<String>,
    },

    /// Copy a share link for a phrase
    Share { text: String },

    /// Load the phrase carried by a share link and show its hints
    Open { link: String },

    /// Show pronunciation hints for a phrase
    Hints { text: String },

    /// List installed on-device voices
    Voices,

    /// Interactive session
    Shell,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List saved phrases (default)
    List,
    /// Speak a saved phrase
    Play { index: usize },
    /// Delete a saved phrase
    Remove { index: usize },
    /// Delete every saved phrase
    Clear,
    /// Write the history to pronounce-history.json
    Export {
        /// Directory to write into (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace the history with a previously exported file
    Import { path: PathBuf },
}

/// Alerts go to stderr so stdout stays scriptable.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn alert(&self, message: &str) {
        eprintln!("{}", message);
    }
}

struct Client {
    settings: Settings,
    store: Arc<FileStore>,
    history: HistoryStore,
    speaker: LocalSpeaker,
    downloads: DownloadFlow,
    notifier: Arc<ConsoleNotifier>,
    output_dir: PathBuf,
}

impl Client {
    fn open(settings: Settings, output_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let data_dir = settings.data_dir();
        let store = Arc::new(
            FileStore::open(&data_dir)
                .with_context(|| format!("opening store in {}", data_dir.display()))?,
        );
        let history = HistoryStore::new(store.clone());
        let output_dir = output_dir.unwrap_or_else(|| PathBuf::from(&settings.output_dir));

        let notifier = Arc::new(ConsoleNotifier);
        let downloader = HttpDownloader::new(Duration::from_secs(settings.download_timeout_secs))?;
        let downloads = DownloadFlow::new(
            Arc::new(downloader),
            RelayTarget::from_settings(&settings),
            settings.client_host.clone(),
            &output_dir,
            notifier.clone(),
        )
        .with_history(history.clone());

        Ok(Self {
            speaker: LocalSpeaker::new(settings.speech_binary.clone()),
            settings,
            store,
            history,
            downloads,
            notifier,
            output_dir,
        })
    }

    fn state(&self) -> AppState {
        AppState::new(
            self.history.load(),
            load_theme(self.store.as_ref(), self.settings.prefers_dark),
            self.settings.share_base_url.clone(),
        )
    }

    /// Dispatches `action` and carries out the resulting effects.
    async fn run(&self, state: AppState, action: Action) -> anyhow::Result<AppState> {
        let (mut state, effects) = dispatch(state, action, chrono::Utc::now().timestamp_millis());
        let mut downloaded = false;
        for effect in effects {
            downloaded |= matches!(effect, Effect::Download { .. });
            self.execute(effect).await?;
        }
        if downloaded {
            state.history = self.history.load();
        }
        Ok(state)
    }

    async fn execute(&self, effect: Effect) -> anyhow::Result<()> {
        match effect {
            Effect::Speak { text, params } => match self.speaker.speak(&text, &params) {
                Ok(_) => {}
                Err(e @ SpeechError::Unavailable(_)) => self.notifier.alert(&e.to_string()),
                Err(e) => return Err(e.into()),
            },
            Effect::StopSpeech => {
                if self.speaker.stop() {
                    println!("Playback stopped");
                }
            }
            Effect::Download {
                text,
                voice_language,
            } => {
                let path = self.downloads.run(&text, voice_language.as_deref()).await?;
                println!("Saved {}", path.display());
            }
            Effect::PersistHistory(history) => self.history.save(&history)?,
            Effect::PersistTheme(theme) => save_theme(self.store.as_ref(), theme)?,
            Effect::ApplyStyles(styles) => {
                let path = self.settings.data_dir().join("theme.css");
                tokio::fs::write(&path, styles.to_css()).await?;
                println!("Theme: {} ({})", styles.theme, path.display());
            }
            Effect::CopyToClipboard(link) => match copy_link(&SystemClipboard, link) {
                ShareOutcome::Copied(link) => {
                    println!("{}", link);
                    self.notifier.alert("Share link copied to clipboard!");
                }
                ShareOutcome::Manual(link) => {
                    self.notifier
                        .alert("Copy failed — please copy the link below by hand");
                    println!("{}", link);
                }
            },
            Effect::WriteFile { name, contents } => {
                let path = self.output_dir.join(name);
                tokio::fs::write(&path, contents)
                    .await
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("Exported {}", path.display());
            }
            Effect::Notify(message) => self.notifier.alert(&message),
        }
        Ok(())
    }

    /// Waits for the current utterance so the process does not cut it off.
    fn finish_speech(&self) -> anyhow::Result<()> {
        self.speaker
            .wait(Duration::from_secs(self.settings.speech_timeout_secs))?;
        Ok(())
    }

    fn voice_language(&self, voice: Option<&str>) -> Option<String> {
        let voices = self.speaker.list_voices().unwrap_or_default();
        voice_language(&voices, voice?)
    }

    fn print_history(&self, state: &AppState) {
        if state.history.is_empty() {
            println!("History is empty");
            return;
        }
        println!("History");
        println!("───────");
        for (i, entry) in state.history.entries().iter().enumerate() {
            let when = chrono::DateTime::from_timestamp_millis(entry.ts)
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            println!("  {:>2}. {}  {}", i, entry.text, when);
        }
    }
}

fn print_hints(state: &AppState) {
    let hints = state.hints();
    println!("Phonetic:   {}", hints.phonetic);
    println!("Syllables:  {}", hints.syllables);
}

/// One line of interactive input.
#[derive(Debug, PartialEq)]
enum ShellInput {
    Action(Action),
    History,
    Help,
    Quit,
    Unknown(String),
}

fn parse_line(line: &str) -> ShellInput {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(command) = line.strip_prefix(':') else {
        return ShellInput::Action(Action::SetText(line.to_string()));
    };
    let mut words = command.split_whitespace();
    let name = words.next().unwrap_or_default();
    let arg = words.next();
    let index = || arg.and_then(|a| a.parse::<usize>().ok());

    match (name, arg) {
        ("speak" | "s", _) => ShellInput::Action(Action::Speak),
        ("stop", _) => ShellInput::Action(Action::Stop),
        ("download" | "d", _) => ShellInput::Action(Action::Download),
        ("save", _) => ShellInput::Action(Action::Save),
        ("clear", _) => ShellInput::Action(Action::Clear),
        ("export", _) => ShellInput::Action(Action::Export),
        ("share", _) => ShellInput::Action(Action::Share),
        ("open", Some(link)) => ShellInput::Action(Action::OpenLink(link.to_string())),
        ("history" | "h", _) => ShellInput::History,
        ("help" | "?", _) => ShellInput::Help,
        ("quit" | "q", _) => ShellInput::Quit,
        ("del" | "play", _) => match (name, index()) {
            ("del", Some(i)) => ShellInput::Action(Action::Delete(i)),
            ("play", Some(i)) => ShellInput::Action(Action::Replay(i)),
            _ => ShellInput::Unknown(line.to_string()),
        },
        ("theme", Some(theme)) => match theme.parse::<Theme>() {
            Ok(theme) => ShellInput::Action(Action::SetTheme(theme)),
            Err(_) => ShellInput::Unknown(line.to_string()),
        },
        _ => ShellInput::Unknown(line.to_string()),
    }
}

const SHELL_HELP: &str = "\
Type a phrase to make it current, then:
  :speak  :stop  :download  :save  :share  :open URL  :export
  :history  :play N  :del N  :clear
  :import PATH  :theme light|dark  :quit";

async fn shell(client: &Client) -> anyhow::Result<()> {
    let mut state = client.state();
    println!("{}", SHELL_HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(path) = line.trim().strip_prefix(":import ") {
            match tokio::fs::read_to_string(path.trim()).await {
                Ok(raw) => state = client.run(state, Action::Import(raw)).await?,
                Err(e) => client.notifier.alert(&format!("Invalid file: {}", e)),
            }
            continue;
        }
        match parse_line(&line) {
            ShellInput::Action(action) => {
                let show_hints = matches!(action, Action::SetText(_) | Action::OpenLink(_));
                let previous = state.clone();
                state = match client.run(state, action).await {
                    Ok(next) => next,
                    Err(e) => {
                        if !already_alerted(&e) {
                            error!("{:#}", e);
                        }
                        previous
                    }
                };
                if show_hints {
                    print_hints(&state);
                }
            }
            ShellInput::History => client.print_history(&state),
            ShellInput::Help => println!("{}", SHELL_HELP),
            ShellInput::Quit => break,
            ShellInput::Unknown(input) => eprintln!("Unknown command: {}", input),
        }
    }
    client.speaker.stop();
    Ok(())
}

/// Download failures reach the user through the notifier before they are
/// returned, so they must not be printed a second time.
fn already_alerted(err: &anyhow::Error) -> bool {
    err.downcast_ref::<DownloadError>().is_some()
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let settings = match path {
        Some(path) => Settings::from_file(path)?,
        None => Settings::new()?,
    };
    Ok(settings)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    let output = match &cli.command {
        Commands::Download { output, .. } => output.clone(),
        Commands::History {
            action: Some(HistoryAction::Export { output }),
        } => output.clone(),
        _ => None,
    };
    let client = Client::open(settings, output)?;
    let state = client.state();

    match cli.command {
        Commands::Speak {
            text,
            rate,
            pitch,
            voice,
        } => {
            let mut state = client.run(state, Action::SetText(text.clone())).await?;
            state.params = SpeechParams::new(rate, pitch, voice);
            println!("Speaking: {}", text);
            client.run(state, Action::Speak).await?;
            if client.speaker.status() == PlaybackStatus::Playing {
                client.finish_speech()?;
            }
        }

        Commands::Download {
            text, voice, ..
        } => {
            let mut state = client.run(state, Action::SetText(text)).await?;
            state.voice_language = client.voice_language(voice.as_deref());
            match client.run(state, Action::Download).await {
                Ok(_) => {}
                Err(e) if already_alerted(&e) => return Ok(ExitCode::FAILURE),
                Err(e) => return Err(e),
            }
        }

        Commands::Save { text } => {
            let state = client.run(state, Action::SetText(text)).await?;
            let state = client.run(state, Action::Save).await?;
            println!("Saved ({} in history)", state.history.len());
        }

        Commands::History { action } => match action.unwrap_or(HistoryAction::List) {
            HistoryAction::List => client.print_history(&state),
            HistoryAction::Play { index } => {
                if index >= state.history.len() {
                    bail!("No history entry at {}", index);
                }
                client.run(state, Action::Replay(index)).await?;
                client.finish_speech()?;
            }
            HistoryAction::Remove { index } => {
                let state = client.run(state, Action::Delete(index)).await?;
                client.print_history(&state);
            }
            HistoryAction::Clear => {
                client.run(state, Action::Clear).await?;
                println!("History cleared");
            }
            HistoryAction::Export { .. } => {
                client.run(state, Action::Export).await?;
            }
            HistoryAction::Import { path } => {
                let raw = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                let state = client.run(state, Action::Import(raw)).await?;
                client.print_history(&state);
            }
        },

        Commands::Theme { theme } => match theme {
            Some(name) => {
                let theme: Theme = name.parse().map_err(anyhow::Error::msg)?;
                client.run(state, Action::SetTheme(theme)).await?;
            }
            None => println!("Theme: {}", state.theme),
        },

        Commands::Share { text } => {
            let state = client.run(state, Action::SetText(text)).await?;
            client.run(state, Action::Share).await?;
        }

        Commands::Open { link } => {
            let state = client.run(state, Action::OpenLink(link)).await?;
            if state.text.is_empty() {
                return Ok(ExitCode::FAILURE);
            }
            println!("Text:       {}", state.text);
            print_hints(&state);
        }

        Commands::Hints { text } => {
            let state = client.run(state, Action::SetText(text)).await?;
            print_hints(&state);
        }

        Commands::Voices => {
            let voices = client.speaker.list_voices()?;
            if voices.is_empty() {
                println!("No voices installed");
            } else {
                println!("Installed Voices");
                println!("────────────────");
                for voice in voices {
                    println!("  {} — {} ({})", voice.name, voice.language, voice.id);
                }
            }
        }

        Commands::Shell => shell(&client).await?,
    }

    Ok(ExitCode::SUCCESS)
}
