pub mod client;

use std::time::Duration;

use crate::error::SessionError;
use crate::identity::DeviceIdentity;

pub const ONLINE: &str = "online";
pub const OFFLINE: &str = "offline";

/// An inbound PUBLISH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// One live broker session. All requests are at-most-once.
pub trait Session {
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), SessionError>;

    fn subscribe(&mut self, topic: &str) -> Result<(), SessionError>;

    /// Drive the connection for up to `wait`, returning the first inbound
    /// PUBLISH, or `None` if nothing arrived. Must be called at least once per
    /// keepalive interval.
    async fn poll(&mut self, wait: Duration) -> Result<Option<Inbound>, SessionError>;

    /// Best-effort teardown. Never fails.
    async fn close(&mut self);
}

/// Opens sessions. The presence last-will is registered before the
/// handshake and "online" is published once it completes.
pub trait Connector {
    type Session: Session;

    async fn open(&mut self, identity: &DeviceIdentity) -> Result<Self::Session, SessionError>;
}
