//! Logging setup.
//!
//! The library only emits `tracing` events; installing a subscriber is the binary's
//! job. This module builds one from [`AppConfig`] (or an explicit [`LoggingConfig`])
//! with three output formats:
//!
//! - `Pretty`: multi-line, colored, for an operator at a terminal
//! - `Compact`: one line per event, no colors
//! - `Json`: one JSON object per event, for log collection
//!
//! `RUST_LOG` overrides the configured level when set.
//!
//! # Example
//! ```no_run
//! use actuator_console::config::{AppConfig, PanelVariant};
//! use actuator_console::logging;
//!
//! let config = AppConfig::for_variant(PanelVariant::Volz);
//! logging::init_from_config(&config)?;
//! tracing::info!(variant = "volz", "console started");
//! # Ok::<(), actuator_console::error::PanelError>(())
//! ```

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

use crate::config::AppConfig;
use crate::error::{AppResult, PanelError};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Multi-line with colors
    #[default]
    Pretty,
    /// Single line, no colors
    Compact,
    /// JSON lines
    Json,
}

/// Subscriber options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Maximum level when `RUST_LOG` is unset
    pub level: Level,
    /// Output format
    pub format: OutputFormat,
}

impl LoggingConfig {
    /// Options at the application's configured log level.
    pub fn from_app_config(config: &AppConfig) -> AppResult<Self> {
        Ok(Self::new(parse_log_level(&config.application.log_level)?))
    }

    /// Pretty output at `level`.
    pub fn new(level: Level) -> Self {
        Self {
            level,
            format: OutputFormat::default(),
        }
    }

    /// Set output format
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }
}

/// Install the global subscriber using the application's log level.
pub fn init_from_config(config: &AppConfig) -> AppResult<()> {
    init(LoggingConfig::from_app_config(config)?)
}

/// Install the global subscriber.
///
/// Idempotent: if a subscriber is already installed (tests, embedding applications)
/// this returns `Ok(())` and leaves it in place.
pub fn init(config: LoggingConfig) -> AppResult<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.level).into())
        .from_env_lossy();

    let layer = match config.format {
        OutputFormat::Pretty => fmt::layer().pretty().with_thread_names(true).boxed(),
        OutputFormat::Compact => fmt::layer().compact().with_ansi(false).boxed(),
        OutputFormat::Json => fmt::layer().json().boxed(),
    };

    match tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
    {
        Ok(()) => Ok(()),
        Err(e) if e.to_string().contains("already") => Ok(()),
        Err(e) => Err(PanelError::Runtime(format!(
            "failed to initialize logging: {e}"
        ))),
    }
}

/// Parse a log level name, case-insensitively.
pub fn parse_log_level(level: &str) -> AppResult<Level> {
    level.parse().map_err(|_| {
        PanelError::Configuration(format!(
            "Invalid log level '{level}'. Must be one of: trace, debug, info, warn, error"
        ))
    })
}
