//! In-memory collaborators for controller tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::clock::Clock;
use crate::device::{Output, Sample, Sensor};
use crate::error::{OutputError, SensorError, SessionError};
use crate::identity::DeviceIdentity;
use crate::link::Link;
use crate::mqtt::{Connector, Inbound, ONLINE, Session};

pub const NOW: i64 = 1_700_000_000;

pub fn inbound(topic: &str, payload: &str) -> Inbound {
    Inbound {
        topic: topic.to_string(),
        payload: payload.as_bytes().to_vec(),
    }
}

/// What one session put on the wire.
#[derive(Debug, Default)]
pub struct Wire {
    pub published: Vec<(String, String, bool)>,
    pub subscribed: Vec<String>,
    pub closed: bool,
}

impl Wire {
    pub fn on(&self, topic: &str) -> Vec<(String, bool)> {
        self.published
            .iter()
            .filter(|(t, _, _)| t == topic)
            .map(|(_, payload, retain)| (payload.clone(), *retain))
            .collect()
    }
}

pub struct FakeSession {
    pub wire: Rc<RefCell<Wire>>,
    pub inbound: VecDeque<Result<Inbound, SessionError>>,
    /// `(topic, n)`: the n-th publish on `topic` (from zero) fails once and
    /// never reaches the wire.
    pub fail_publish: Option<(String, usize)>,
}

impl FakeSession {
    pub fn new(inbound: Vec<Result<Inbound, SessionError>>) -> Self {
        Self {
            wire: Rc::default(),
            inbound: inbound.into(),
            fail_publish: None,
        }
    }

    pub fn failing_publish(mut self, topic: &str, n: usize) -> Self {
        self.fail_publish = Some((topic.to_string(), n));
        self
    }
}

impl Session for FakeSession {
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), SessionError> {
        let fails = self.fail_publish.as_ref().is_some_and(|(failing, n)| {
            failing == topic && self.wire.borrow().on(topic).len() == *n
        });
        if fails {
            self.fail_publish = None;
            return Err(SessionError::Disconnected);
        }
        self.wire.borrow_mut().published.push((
            topic.to_string(),
            String::from_utf8_lossy(payload).into_owned(),
            retain,
        ));
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), SessionError> {
        self.wire.borrow_mut().subscribed.push(topic.to_string());
        Ok(())
    }

    async fn poll(&mut self, wait: Duration) -> Result<Option<Inbound>, SessionError> {
        match self.inbound.pop_front() {
            Some(Ok(msg)) => Ok(Some(msg)),
            Some(Err(e)) => Err(e),
            None => {
                tokio::time::sleep(wait).await;
                Ok(None)
            }
        }
    }

    async fn close(&mut self) {
        self.wire.borrow_mut().closed = true;
    }
}

/// Hands out scripted sessions in order; once the script runs out every open
/// yields an idle session. `publish_failures` is consumed the same way.
#[derive(Default)]
pub struct FakeConnector {
    pub script: VecDeque<Result<Vec<Result<Inbound, SessionError>>, SessionError>>,
    pub publish_failures: VecDeque<Option<(String, usize)>>,
    pub opened: Rc<RefCell<Vec<Rc<RefCell<Wire>>>>>,
    pub attempts: Rc<Cell<u32>>,
}

impl FakeConnector {
    pub fn new(script: Vec<Result<Vec<Result<Inbound, SessionError>>, SessionError>>) -> Self {
        Self {
            script: script.into(),
            ..Self::default()
        }
    }
}

impl Connector for FakeConnector {
    type Session = FakeSession;

    async fn open(&mut self, identity: &DeviceIdentity) -> Result<FakeSession, SessionError> {
        self.attempts.set(self.attempts.get() + 1);
        let inbound = self.script.pop_front().unwrap_or_else(|| Ok(Vec::new()))?;
        let mut session = FakeSession::new(inbound);
        session.fail_publish = self.publish_failures.pop_front().flatten();
        session.publish(identity.presence_topic(), ONLINE.as_bytes(), true)?;
        self.opened.borrow_mut().push(Rc::clone(&session.wire));
        Ok(session)
    }
}

/// Returns scripted readiness, then `fallback`.
pub struct FakeLink {
    pub script: VecDeque<bool>,
    pub fallback: bool,
}

impl FakeLink {
    pub fn ready() -> Self {
        Self {
            script: VecDeque::new(),
            fallback: true,
        }
    }
}

impl Link for FakeLink {
    async fn is_ready(&mut self) -> bool {
        self.script.pop_front().unwrap_or(self.fallback)
    }
}

/// Fails when scripted to, otherwise returns 23 °C / 55 %.
#[derive(Default)]
pub struct FakeSensor {
    pub failures: VecDeque<bool>,
    pub samples: Rc<Cell<u32>>,
}

impl Sensor for FakeSensor {
    async fn sample(&mut self) -> Result<Sample, SensorError> {
        self.samples.set(self.samples.get() + 1);
        if self.failures.pop_front().unwrap_or(false) {
            return Err(SensorError::Io(std::io::Error::other("checksum mismatch")));
        }
        Ok(Sample {
            temperature: 23,
            humidity: 55,
        })
    }
}

pub struct FakeClock;

impl Clock for FakeClock {
    fn now_secs(&self) -> i64 {
        NOW
    }
}

/// Output whose value and write count stay observable after it is moved.
#[derive(Default, Clone)]
pub struct FakeOutput {
    pub value: Rc<Cell<bool>>,
    pub writes: Rc<Cell<u32>>,
    pub broken: Rc<Cell<bool>>,
}

impl Output for FakeOutput {
    async fn set(&mut self, on: bool) -> Result<(), OutputError> {
        if self.broken.get() {
            return Err(OutputError::Io(std::io::Error::other("gpio gone")));
        }
        self.writes.set(self.writes.get() + 1);
        self.value.set(on);
        Ok(())
    }

    async fn get(&mut self) -> Result<bool, OutputError> {
        Ok(self.value.get())
    }
}
