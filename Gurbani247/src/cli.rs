//! Command line and the settings it resolves to

use std::path::PathBuf;

use clap::Parser;
use gbconfig::Config;
use gbradio::{AudioSessionOptions, RadioSettings};

/// Listen to Gurbani Kirtan live from the terminal.
///
/// Space or Enter toggles playback; q, Esc or Ctrl-C quits.
#[derive(Debug, Default, Parser)]
#[command(name = "Gurbani247", version, about)]
pub struct Args {
    /// Configuration directory (default: $GURBANI247_CONFIG, ./.gurbani247, ~/.gurbani247)
    #[arg(long, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Log file; the terminal belongs to the player
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Audio stream to play
    #[arg(long, value_name = "URL")]
    pub stream_url: Option<String>,

    /// Plain-text now-playing endpoint
    #[arg(long, value_name = "URL")]
    pub metadata_url: Option<String>,
}

impl Args {
    /// Station settings from the configuration, with command line overrides on top.
    pub fn radio_settings(&self, config: &Config) -> RadioSettings {
        RadioSettings {
            stream_url: self
                .stream_url
                .clone()
                .unwrap_or_else(|| config.get_stream_url()),
            metadata_url: self
                .metadata_url
                .clone()
                .unwrap_or_else(|| config.get_metadata_url()),
            poll_interval: config.get_poll_interval(),
            metadata_timeout: config.get_metadata_timeout(),
            initial_title: config.get_initial_title(),
            fallback_title: config.get_fallback_title(),
            audio_session: AudioSessionOptions {
                background_playback: config.get_background_playback(),
                duck_others: config.get_duck_others(),
                allow_recording: config.get_allow_recording(),
                play_through_earpiece: config.get_play_through_earpiece(),
            },
        }
    }

    pub fn log_file(&self, config: &Config) -> PathBuf {
        self.log_file.clone().unwrap_or_else(|| config.get_log_file())
    }
}
