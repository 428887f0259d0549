//! On-device speech preview through `espeak-ng`.
//!
//! At most one utterance plays at a time: starting a new one kills the
//! previous child process.

use crate::error::SpeechError;
use std::io::{ErrorKind, Write};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

pub const NEUTRAL: f32 = 1.0;
const RATE_RANGE: (f32, f32) = (0.1, 10.0);
const PITCH_RANGE: (f32, f32) = (0.0, 2.0);

// espeak-ng: words per minute at rate 1.0, and its accepted bounds
const BASE_WPM: f32 = 175.0;
const WPM_RANGE: (u32, u32) = (80, 450);
// espeak-ng pitch is 0..=99 with 50 as default
const BASE_PITCH: f32 = 50.0;

/// A voice installed for the on-device engine.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Voice {
    pub id: String,
    pub name: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechParams {
    pub rate: f32,
    pub pitch: f32,
    pub voice: Option<String>,
}

impl Default for SpeechParams {
    fn default() -> Self {
        Self {
            rate: NEUTRAL,
            pitch: NEUTRAL,
            voice: None,
        }
    }
}

impl SpeechParams {
    pub fn new(rate: Option<f32>, pitch: Option<f32>, voice: Option<String>) -> Self {
        Self {
            rate: bounded(rate, RATE_RANGE),
            pitch: bounded(pitch, PITCH_RANGE),
            voice: voice.filter(|v| !v.trim().is_empty()),
        }
    }

    fn words_per_minute(&self) -> u32 {
        ((BASE_WPM * self.rate).round() as u32).clamp(WPM_RANGE.0, WPM_RANGE.1)
    }

    fn espeak_pitch(&self) -> u32 {
        ((BASE_PITCH * self.pitch).round() as u32).min(99)
    }
}

/// Non-finite or absent values become [`NEUTRAL`]; the rest are clamped.
fn bounded(value: Option<f32>, (min, max): (f32, f32)) -> f32 {
    match value {
        Some(v) if v.is_finite() => v.clamp(min, max),
        _ => NEUTRAL,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Idle,
    Playing,
}

impl PlaybackStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PlaybackStatus::Idle => "🔊 Speak",
            PlaybackStatus::Playing => "🔊 Playing...",
        }
    }
}

pub struct LocalSpeaker {
    binary: String,
    current: Mutex<Option<Child>>,
}

impl LocalSpeaker {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            current: Mutex::new(None),
        }
    }

    /// Starts speaking `text`, cancelling whatever was playing. Returns
    /// false without doing anything for empty text.
    pub fn speak(&self, text: &str, params: &SpeechParams) -> Result<bool, SpeechError> {
        if text.is_empty() {
            return Ok(false);
        }
        // held from cancel to store so concurrent calls leave one utterance
        let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(previous) = current.take() {
            halt(previous);
        }

        let mut cmd = Command::new(&self.binary);
        cmd.arg("-s")
            .arg(params.words_per_minute().to_string())
            .arg("-p")
            .arg(params.espeak_pitch().to_string());
        if let Some(voice) = &params.voice {
            cmd.arg("-v").arg(voice);
        }
        let mut child = cmd
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        if let Some(mut stdin) = child.stdin.take() {
            let written = stdin
                .write_all(text.as_bytes())
                .and_then(|_| stdin.write_all(b"\n"));
            if let Err(e) = written {
                drop(stdin);
                halt(child);
                return Err(e.into());
            }
            // dropping stdin closes the pipe and lets espeak finish
        }

        info!("{} ({} chars)", PlaybackStatus::Playing.label(), text.chars().count());
        *current = Some(child);
        Ok(true)
    }

    /// Cancels the current utterance. Returns true if one was playing.
    pub fn stop(&self) -> bool {
        let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        match current.take() {
            Some(child) => halt(child),
            None => false,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        match current.as_mut().map(|c| c.try_wait()) {
            Some(Ok(None)) => PlaybackStatus::Playing,
            _ => PlaybackStatus::Idle,
        }
    }

    /// Blocks until the current utterance ends, killing it after `timeout`.
    pub fn wait(&self, timeout: Duration) -> Result<(), SpeechError> {
        let child = {
            let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
            current.take()
        };
        let Some(mut child) = child else {
            return Ok(());
        };

        match child.wait_timeout(timeout)? {
            Some(status) => {
                info!("{}", PlaybackStatus::Idle.label());
                if status.success() {
                    Ok(())
                } else {
                    let output = child.wait_with_output()?;
                    Err(SpeechError::Engine(
                        String::from_utf8_lossy(&output.stderr).trim().to_string(),
                    ))
                }
            }
            None => {
                warn!("Utterance exceeded {:?}, stopping", timeout);
                let _ = child.kill();
                let _ = child.wait();
                Err(SpeechError::Engine(format!("timed out after {:?}", timeout)))
            }
        }
    }

    pub fn list_voices(&self) -> Result<Vec<Voice>, SpeechError> {
        let output = Command::new(&self.binary)
            .arg("--voices")
            .output()
            .map_err(|e| self.spawn_error(e))?;
        if !output.status.success() {
            return Err(SpeechError::Engine(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        let mut voices = parse_voice_list(&String::from_utf8_lossy(&output.stdout));
        voices.sort_by(|a, b| a.language.cmp(&b.language).then(a.name.cmp(&b.name)));
        Ok(voices)
    }

    fn spawn_error(&self, e: std::io::Error) -> SpeechError {
        if e.kind() == ErrorKind::NotFound {
            SpeechError::Unavailable(format!("'{}' not found", self.binary))
        } else {
            SpeechError::Io(e)
        }
    }
}

impl Drop for LocalSpeaker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Kills and reaps `child`. Returns true if it was still running.
fn halt(mut child: Child) -> bool {
    let was_playing = matches!(child.try_wait(), Ok(None));
    let _ = child.kill();
    let _ = child.wait();
    if was_playing {
        debug!("Cancelled in-flight utterance");
    }
    was_playing
}

/// Parses the table printed by `espeak-ng --voices`:
/// `Pty Language Age/Gender VoiceName File Other Languages`.
pub fn parse_voice_list(table: &str) -> Vec<Voice> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 5 {
                return None;
            }
            Some(Voice {
                id: cols[4].to_string(),
                name: cols[3].to_string(),
                language: cols[1].to_string(),
            })
        })
        .collect()
}
