//! Notification handling for heart rate measurements
//! This module pumps value-changed payloads from the platform, decodes them and
//! dispatches readings to observers.

use std::sync::Arc;

use futures_util::StreamExt;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::events::EventChannel;
use crate::core::bluetooth::platform::NotificationStream;
use crate::core::heart_rate::{HeartRateReading, MeasurementFlags, parse_heart_rate_measurement};

/// Starts the reading pump for a freshly enabled subscription.
/// Cancelling the returned token stops the pump and drops the stream.
pub fn spawn_reading_pump(
    notifications: NotificationStream,
    readings: Arc<EventChannel<HeartRateReading>>,
) -> CancellationToken {
    let token = CancellationToken::new();
    let task_token = token.clone();

    tokio::spawn(async move {
        process_notifications(notifications, readings, task_token).await;
    });

    token
}

async fn process_notifications(
    mut notifications: NotificationStream,
    readings: Arc<EventChannel<HeartRateReading>>,
    cancel_token: CancellationToken,
) {
    info!("Listening for heart rate notifications...");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            value = notifications.next() => {
                let Some(value) = value else {
                    info!("Heart rate notification stream has ended.");
                    break;
                };
                if let Some(&bits) = value.first() {
                    let flags = MeasurementFlags::new(bits);
                    debug!(
                        "Received heart rate frame: {:02x?} (contact: {:?}, energy: {}, rr: {})",
                        value,
                        flags.sensor_contact(),
                        flags.has_energy_expended(),
                        flags.has_rr_intervals()
                    );
                }

                // A bad frame is dropped, the subscription stays alive.
                match parse_heart_rate_measurement(&value) {
                    Ok(reading) => readings.emit(&reading),
                    Err(e) => warn!("Dropping heart rate frame {:02x?}: {}", value, e),
                }
            }
        }
    }

    debug!("Heart rate notification pump stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::sync::mpsc;

    use crate::core::bluetooth::platform::receiver_stream;

    #[tokio::test]
    async fn malformed_frames_do_not_end_the_stream() {
        let readings = Arc::new(EventChannel::new());
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        readings.subscribe_fn(move |reading: &HeartRateReading| {
            let _ = seen_tx.send(reading.beats_per_minute);
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let token = spawn_reading_pump(receiver_stream(rx), readings);

        tx.send(vec![]).unwrap();
        tx.send(vec![0x01, 0x50]).unwrap();
        tx.send(vec![0x00, 0x4B]).unwrap();

        let bpm = tokio::time::timeout(Duration::from_secs(1), seen_rx.recv()).await.unwrap();
        assert_eq!(bpm, Some(75));
        token.cancel();
    }

    #[tokio::test]
    async fn cancelled_pump_stops_dispatching() {
        let readings = Arc::new(EventChannel::new());
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        readings.subscribe_fn(move |reading: &HeartRateReading| {
            let _ = seen_tx.send(reading.beats_per_minute);
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let token = spawn_reading_pump(receiver_stream(rx), readings.clone());
        token.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Once the pump is gone its stream is dropped.
        assert!(tx.send(vec![0x00, 0x40]).is_err());
        assert!(seen_rx.try_recv().is_err());
    }
}
