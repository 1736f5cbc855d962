//! CLI Entry Point for actuator-console
//!
//! Drives a panel session against a simulated loopback bus, so the broadcast loop,
//! telemetry routing and staleness sweeps can be watched without hardware.
//!
//! # Usage
//!
//! Broadcast three Volz channels at 30° for five seconds:
//! ```bash
//! actuator-console run --variant volz --channels 3 --setpoint 30 --duration 5s
//! ```
//!
//! Exercise the servos between min and max:
//! ```bash
//! actuator-console run --variant volz --movement --duration 10s
//! ```
//!
//! Print the effective configuration:
//! ```bash
//! actuator-console check-config --variant generic --config config/actuator_console.toml
//! ```

use actuator_console::config::{AppConfig, PanelVariant};
use actuator_console::logging::{self, LoggingConfig, OutputFormat};
use actuator_console::session::{PanelSession, PanelSnapshot};
use actuator_console::telemetry::{TelemetryField, VolzInfo};
use actuator_console::transport::{MessageKind, MockTransport};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use humantime_serde::re::humantime::parse_duration;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "actuator-console")]
#[command(about = "Multi-channel actuator command broadcaster", long_about = None)]
struct Cli {
    /// Panel variant preset
    #[arg(long, value_enum, default_value = "generic", global = true)]
    variant: PanelVariant,

    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "compact", global = true)]
    log_format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Broadcast against a simulated loopback bus
    Run {
        /// Number of channels
        #[arg(long, default_value = "1")]
        channels: usize,

        /// Setpoint applied to every channel
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        setpoint: i32,

        /// How long to run
        #[arg(long, default_value = "5s", value_parser = parse_duration)]
        duration: Duration,

        /// Broadcast period (overrides the configured default)
        #[arg(long, value_parser = parse_duration, conflicts_with = "rate_hz")]
        period: Option<Duration>,

        /// Broadcast rate in hertz
        #[arg(long)]
        rate_hz: Option<f64>,

        /// Run the movement exerciser
        #[arg(long)]
        movement: bool,

        /// Pause broadcasting halfway through, to watch telemetry go stale
        #[arg(long)]
        pause_halfway: bool,
    },

    /// Load, validate and print the effective configuration
    CheckConfig,
}

fn load_config(variant: PanelVariant, path: Option<&PathBuf>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_from(path, variant)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::load(variant)?,
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.variant, cli.config.as_ref())?;

    match cli.command {
        Commands::CheckConfig => {
            println!("✅ Configuration valid ({:?} variant)", cli.variant);
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Run {
            channels,
            setpoint,
            duration,
            period,
            rate_hz,
            movement,
            pause_halfway,
        } => {
            logging::init(LoggingConfig::from_app_config(&config)?.with_format(cli.log_format))?;
            let options = RunOptions {
                channels,
                setpoint,
                duration,
                period,
                rate_hz,
                movement,
                pause_halfway,
            };
            run(config, options).await
        }
    }
}

struct RunOptions {
    channels: usize,
    setpoint: i32,
    duration: Duration,
    period: Option<Duration>,
    rate_hz: Option<f64>,
    movement: bool,
    pause_halfway: bool,
}

async fn run(config: AppConfig, options: RunOptions) -> Result<()> {
    let panel = config.panel;
    let loopback = panel
        .telemetry_kinds
        .iter()
        .copied()
        .find(|kind| *kind != MessageKind::VolzActuatorInfo)
        .unwrap_or(MessageKind::ActuatorStatus);
    let bus = MockTransport::new().with_loopback(loopback);

    println!("🔧 {} ({} loopback)", config.application.name, loopback);
    let session = PanelSession::open(panel.clone(), Arc::new(bus.clone()))?;

    session.resize(options.channels)?;
    for index in 0..options.channels {
        session.set_setpoint(index, options.setpoint)?;
    }
    if let Some(period) = options.period {
        session.set_period(period)?;
    }
    if let Some(hz) = options.rate_hz {
        session.set_rate_hz(hz)?;
    }

    if panel.telemetry_kinds.contains(&MessageKind::VolzActuatorInfo) {
        for index in 0..options.channels {
            let node = session.device_id(index)?.saturating_add(panel.id_offset);
            bus.set_info_response(
                node,
                VolzInfo {
                    cpu_temperature: 85,
                    stall_counter: 0,
                    max_current: 75,
                    total_power_on_time: 4 * 3600 + 12 * 60,
                },
            );
            session.request_info(index)?;
        }
    }

    if options.movement {
        session.start_movement()?;
    }

    println!(
        "▶️  Broadcasting {} channel(s) every {:?} for {:?}",
        session.channel_count(),
        session.period(),
        options.duration
    );

    let deadline = tokio::time::Instant::now() + options.duration;
    let halfway = tokio::time::Instant::now() + options.duration / 2;
    let mut report = tokio::time::interval(Duration::from_secs(1));
    let mut paused = false;

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => break,
            _ = tokio::signal::ctrl_c() => {
                println!("\n⏹️  Interrupted");
                break;
            }
            _ = report.tick() => {
                if options.pause_halfway && !paused && tokio::time::Instant::now() >= halfway {
                    session.pause();
                    paused = true;
                }
                print_snapshot(&session.snapshot());
            }
        }
    }

    let last = session.snapshot();
    session.close();

    println!();
    println!(
        "📊 Ticks: {}  sent: {}  failed: {}",
        last.stats.ticks, last.stats.sends, last.stats.failures
    );
    println!("Generated message:\n{}", last.status.display_text());
    Ok(())
}

fn print_snapshot(snapshot: &PanelSnapshot) {
    let state = if snapshot.paused { "paused" } else { "broadcasting" };
    println!("— {} @ {:?}", state, snapshot.period);
    for channel in &snapshot.channels {
        let t = channel.telemetry();
        println!(
            "  [{}] id={:<3} sp={:>4}  pos={:>6} cur={:>5} volt={:>5} temp={:>3} pwm={:>4}  {:?}",
            channel.index(),
            channel.device_id(),
            channel.setpoint(),
            t.display(TelemetryField::Position),
            t.display(TelemetryField::Current),
            t.display(TelemetryField::Voltage),
            t.display(TelemetryField::Temperature),
            t.display(TelemetryField::Pwm),
            channel.liveness(),
        );
        if channel.info().power_on_time.is_some() {
            println!(
                "      cpu={}°C stalls={} max_current={}A power_on={}",
                channel.info().cpu_temperature_text(),
                channel.info().stalls_text(),
                channel.info().max_current_text(),
                channel.info().power_on_text(),
            );
        }
    }
}
