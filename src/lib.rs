//! voco: a small text-to-speech utility.
//!
//! The relay (`voco-relay`) forwards speech requests to an upstream
//! translation endpoint and streams MP3 audio back with open CORS headers.
//! The client (`voco`) previews text through the on-device engine,
//! downloads audio through the relay and keeps a short phrase history.

pub mod app;
pub mod config_loader;
pub mod downloader;
pub mod error;
pub mod history;
pub mod phonetics;
pub mod relay;
pub mod share;
pub mod speech;
pub mod storage;
pub mod theme;

pub use config_loader::Settings;
