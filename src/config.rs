use crate::recorder::RecorderOptions;
use crate::socket::SocketClientOptions;
use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub socket: SocketSettings,
    pub recorder: RecorderSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SocketSettings {
    pub url: String,
    pub auto_reconnect: bool,
    pub reconnect_attempts: u32,
    pub reconnect_interval_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct RecorderSettings {
    pub silence_threshold_db: f64,
    pub silence_duration_ms: u64,
    pub sample_interval_ms: u64,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

impl From<&SocketSettings> for SocketClientOptions {
    fn from(s: &SocketSettings) -> Self {
        Self {
            auto_reconnect: s.auto_reconnect,
            reconnect_attempts: s.reconnect_attempts,
            reconnect_interval: Duration::from_millis(s.reconnect_interval_ms),
        }
    }
}

impl From<&RecorderSettings> for RecorderOptions {
    fn from(s: &RecorderSettings) -> Self {
        Self {
            silence_threshold_db: s.silence_threshold_db,
            silence_duration: Duration::from_millis(s.silence_duration_ms),
            sample_interval: Duration::from_millis(s.sample_interval_ms),
        }
    }
}
