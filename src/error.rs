use std::time::Duration;

use thiserror::Error;

/// The network interface never became usable. Fatal at startup.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("network link not ready after {0:?}")]
    Timeout(Duration),
}

/// Anything that went wrong with the broker session. Always recoverable by
/// tearing the session down and opening a new one.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no CONNACK within {0:?}")]
    HandshakeTimeout(Duration),
    #[error("broker refused connection: {0}")]
    Refused(String),
    #[error("transport error: {0}")]
    Transport(#[from] rumqttc::ConnectionError),
    #[error("client request failed: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("broker closed the session")]
    Disconnected,
}

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("unparseable sensor value {0:?}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("output access failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected output value {0:?}")]
    Parse(String),
}
