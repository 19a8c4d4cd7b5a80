use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{LevelFilter, info};

use heartrate_le_lib::commands::{run_info, run_watch, show_config};
use heartrate_le_lib::config::MonitorConfig;
use heartrate_le_lib::{BluestPlatform, HeartRateMonitor, logging};

/// Bluetooth LE heart rate monitor
#[derive(Parser, Debug)]
#[command(name = "heartrate-le", version, about)]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream heart rate readings of a device
    Watch {
        device_id: String,
        /// Connection attempts before giving up
        #[arg(long)]
        retries: Option<u32>,
        /// Reconnect when the device drops the connection
        #[arg(long)]
        reconnect: bool,
    },
    /// Print device information and battery level
    Info {
        device_id: String,
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config {
        /// Write the configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(MonitorConfig::default_config_path);
    // Started before the config is read so its load messages are not lost.
    logging::init(LevelFilter::Info);
    let mut config = MonitorConfig::load_config(&config_path).await?;
    logging::set_level(config.log_level());

    match cli.command {
        Command::Watch { device_id, retries, reconnect } => {
            if let Some(retries) = retries {
                config.connect_retries = retries;
            }
            let monitor = open_monitor(&config).await?;
            run_watch(&monitor, &device_id, &config, reconnect || config.reconnect_on_loss).await
        }
        Command::Info { device_id, json } => {
            let monitor = open_monitor(&config).await?;
            run_info(&monitor, &device_id, &config, json).await
        }
        Command::Config { save } => show_config(&config, &config_path, save).await,
    }
}

async fn open_monitor(config: &MonitorConfig) -> Result<HeartRateMonitor<BluestPlatform>> {
    let platform = BluestPlatform::new(config.scan_timeout()).await?;
    info!("Bluetooth platform ready");
    Ok(HeartRateMonitor::new(Arc::new(platform), config.operation_timeout()))
}
