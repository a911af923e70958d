use tracing::{debug, info, warn};

use crate::device::Output;
use crate::error::{OutputError, SessionError};
use crate::mqtt::{Inbound, Session};

/// A decoded command payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    TurnOn,
    TurnOff,
    Unrecognized,
}

impl Command {
    /// Case-insensitive, surrounding whitespace ignored. Anything that is not
    /// UTF-8 or not a known token is `Unrecognized`.
    pub fn parse(payload: &[u8]) -> Self {
        let Ok(text) = std::str::from_utf8(payload) else {
            return Command::Unrecognized;
        };
        match text.trim().to_ascii_uppercase().as_str() {
            "ON" | "1" | "TRUE" => Command::TurnOn,
            "OFF" | "0" | "FALSE" => Command::TurnOff,
            _ => Command::Unrecognized,
        }
    }
}

fn status_payload(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}

/// Sole owner of the actuator output.
pub struct CommandDispatcher<O> {
    output: O,
    command_topic: String,
    status_topic: String,
}

impl<O: Output> CommandDispatcher<O> {
    pub fn new(output: O, command_topic: &str, status_topic: &str) -> Self {
        Self {
            output,
            command_topic: command_topic.to_string(),
            status_topic: status_topic.to_string(),
        }
    }

    pub fn command_topic(&self) -> &str {
        &self.command_topic
    }

    /// Drive the output to a known OFF state before any session exists.
    pub async fn reset(&mut self) -> Result<(), OutputError> {
        self.output.set(false).await
    }

    /// Apply one inbound message. Decode and output faults are logged and
    /// absorbed; only a failed confirmation publish is returned.
    pub async fn dispatch<S: Session>(
        &mut self,
        msg: &Inbound,
        session: &mut S,
    ) -> Result<(), SessionError> {
        if msg.topic != self.command_topic {
            debug!("Ignoring message on {}", msg.topic);
            return Ok(());
        }

        let on = match Command::parse(&msg.payload) {
            Command::TurnOn => true,
            Command::TurnOff => false,
            Command::Unrecognized => {
                debug!(
                    "Unrecognized command {:?}",
                    String::from_utf8_lossy(&msg.payload)
                );
                return Ok(());
            }
        };

        if let Err(e) = self.output.set(on).await {
            warn!("Failed to drive output {}: {}", status_payload(on), e);
            return Ok(());
        }
        self.announce(session).await
    }

    /// Publish the current output value (retained). Never touches the output.
    pub async fn announce<S: Session>(&mut self, session: &mut S) -> Result<(), SessionError> {
        let on = match self.output.get().await {
            Ok(on) => on,
            Err(e) => {
                warn!("Cannot read output state, not announcing: {}", e);
                return Ok(());
            }
        };
        session.publish(&self.status_topic, status_payload(on).as_bytes(), true)?;
        info!("Output {}", status_payload(on));
        Ok(())
    }
}
