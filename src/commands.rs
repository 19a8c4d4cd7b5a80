//! CLI commands
//! This module defines the commands the binary runs on top of [`HeartRateMonitor`].

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use log::{info, warn};
use tokio::sync::mpsc;

use crate::config::MonitorConfig;
use crate::core::bluetooth::{ConnectionResult, ConnectionStatus, GattPlatform, HandlerId, HeartRateMonitor};
use crate::core::heart_rate::HeartRateReading;

/// Monitor events forwarded from the observer callbacks to the command loop
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    Status(ConnectionStatus),
    Reading(HeartRateReading),
}

/// Connects to `device_id`, making up to `attempts` attempts with `retry_delay` in between.
pub async fn connect_with_retry<P: GattPlatform>(
    monitor: &HeartRateMonitor<P>,
    device_id: &str,
    attempts: u32,
    retry_delay: Duration,
) -> ConnectionResult {
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        let result = monitor.connect(device_id).await;
        let Some(message) = result.error_message() else {
            return result;
        };

        warn!("Connection attempt {} failed: {}", attempt, message);
        if attempt >= attempts {
            return result;
        }

        info!("Retrying connection in {} ms...", retry_delay.as_millis());
        tokio::time::sleep(retry_delay).await;
        attempt += 1;
    }
}

/// Forwards status and reading events of `monitor` into a channel.
/// The handlers stay registered until [`EventForwarder::detach`] is called.
pub struct EventForwarder<'a, P: GattPlatform> {
    monitor: &'a HeartRateMonitor<P>,
    status_handler: HandlerId,
    rate_handler: HandlerId,
}

impl<'a, P: GattPlatform> EventForwarder<'a, P> {
    pub fn attach(monitor: &'a HeartRateMonitor<P>) -> (Self, mpsc::UnboundedReceiver<MonitorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let status_tx = tx.clone();
        let status_handler = monitor.status_events().subscribe_fn(move |status: &ConnectionStatus| {
            let _ = status_tx.send(MonitorEvent::Status(status.clone()));
        });
        let rate_handler = monitor.rate_events().subscribe_fn(move |reading: &HeartRateReading| {
            let _ = tx.send(MonitorEvent::Reading(*reading));
        });

        let forwarder = Self { monitor, status_handler, rate_handler };
        (forwarder, rx)
    }

    pub fn detach(self) {
        self.monitor.status_events().unsubscribe(self.status_handler);
        self.monitor.rate_events().unsubscribe(self.rate_handler);
    }
}

/// Streams readings of `device_id` to stdout until Ctrl-C, or until the connection drops
/// and `reconnect` is off.
pub async fn run_watch<P: GattPlatform>(
    monitor: &HeartRateMonitor<P>,
    device_id: &str,
    config: &MonitorConfig,
    reconnect: bool,
) -> Result<()> {
    let (forwarder, mut events) = EventForwarder::attach(monitor);
    let outcome = watch_loop(monitor, device_id, config, reconnect, &mut events).await;
    forwarder.detach();
    outcome
}

async fn watch_loop<P: GattPlatform>(
    monitor: &HeartRateMonitor<P>,
    device_id: &str,
    config: &MonitorConfig,
    reconnect: bool,
    events: &mut mpsc::UnboundedReceiver<MonitorEvent>,
) -> Result<()> {
    loop {
        let name = connect_with_retry(monitor, device_id, config.connect_retries, config.retry_delay())
            .await
            .into_result()?;
        println!("Connected to {}", name);

        let info = monitor.get_device_info().await;
        println!("Battery: {}%", info.battery_percent);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, disconnecting");
                    monitor.disconnect().await;
                    return Ok(());
                }
                event = events.recv() => match event {
                    Some(MonitorEvent::Reading(reading)) => println!("{} bpm", reading.beats_per_minute),
                    Some(MonitorEvent::Status(status)) if status.is_connected => {
                        println!("Status: connected ({})", status.name.as_deref().unwrap_or_default());
                    }
                    Some(MonitorEvent::Status(_)) => {
                        println!("Status: disconnected");
                        break;
                    }
                    None => return Ok(()),
                },
            }
        }

        if !reconnect {
            return Ok(());
        }
        info!("Reconnecting to {}", device_id);
    }
}

/// Connects, prints the device information and disconnects again.
pub async fn run_info<P: GattPlatform>(
    monitor: &HeartRateMonitor<P>,
    device_id: &str,
    config: &MonitorConfig,
    json: bool,
) -> Result<()> {
    connect_with_retry(monitor, device_id, config.connect_retries, config.retry_delay())
        .await
        .into_result()?;

    let info = monitor.get_device_info().await;
    monitor.disconnect().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("Device:        {} ({})", info.name, info.device_id);
        println!("Manufacturer:  {}", info.manufacturer);
        println!("Model:         {}", info.model_number);
        println!("Serial number: {}", info.serial_number);
        println!("Hardware:      {}", info.hardware);
        println!("Firmware:      {}", info.firmware);
        println!("Battery:       {}%", info.battery_percent);
    }
    Ok(())
}

/// Prints the effective configuration, optionally writing it to `path`.
pub async fn show_config(config: &MonitorConfig, path: &Path, save: bool) -> Result<()> {
    println!("# {}", path.display());
    println!("{}", serde_json::to_string_pretty(config)?);

    if save {
        config.save_config(path).await?;
        println!("Saved configuration to {}", path.display());
    }
    Ok(())
}
