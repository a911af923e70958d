use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::device::Sensor;
use crate::error::SessionError;
use crate::mqtt::Session;

/// Decides, once per tick, whether a sample is due.
pub struct PublishScheduler {
    cadence: Duration,
    retry_delay: Duration,
    /// `None` until the first attempt: the first sample is due immediately.
    next_due: Option<Instant>,
}

impl PublishScheduler {
    pub fn new(cadence: Duration, retry_delay: Duration) -> Self {
        Self {
            cadence,
            retry_delay,
            next_due: None,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_due.is_none_or(|due| now >= due)
    }

    /// Sample and publish (retained) if due. Sensor faults are absorbed and
    /// retried after the short retry delay; only transport errors propagate.
    /// Returns whether a reading was published.
    pub async fn maybe_publish<S, K, P>(
        &mut self,
        now: Instant,
        sensor: &mut S,
        clock: &K,
        session: &mut P,
        topic: &str,
    ) -> Result<bool, SessionError>
    where
        S: Sensor,
        K: Clock,
        P: Session,
    {
        if !self.is_due(now) {
            return Ok(false);
        }

        let reading = match sensor.sample().await {
            Ok(sample) => sample.at(clock.now_secs()),
            Err(e) => {
                warn!("{}. Retrying in {:?}", e, self.retry_delay);
                self.next_due = Some(now + self.retry_delay);
                return Ok(false);
            }
        };

        let payload = match serde_json::to_vec(&reading) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode reading {:?}: {}", reading, e);
                self.next_due = Some(now + self.cadence);
                return Ok(false);
            }
        };
        session.publish(topic, &payload, true)?;
        self.next_due = Some(now + self.cadence);
        info!(
            temperature = reading.temperature,
            humidity = reading.humidity,
            ts = reading.timestamp,
            "Published reading to {}",
            topic
        );
        Ok(true)
    }
}
