use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::device::{Output, Sensor};
use crate::dispatch::CommandDispatcher;
use crate::error::{LinkError, SessionError};
use crate::identity::DeviceIdentity;
use crate::link::{self, Link};
use crate::mqtt::{Connector, Session};
use crate::scheduler::PublishScheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Down,
    NetworkUp,
    SessionUp,
}

#[derive(Debug, Clone, Copy)]
struct Timing {
    tick: Duration,
    reconnect_delay: Duration,
    link_timeout: Duration,
}

/// Everything the node mutates, owned in one place. Drives ticks and rebuilds
/// the link/session stack after any failure.
pub struct Controller<L, C: Connector, S, O, K> {
    identity: DeviceIdentity,
    link: L,
    connector: C,
    session: Option<C::Session>,
    sensor: S,
    clock: K,
    /// `None` when the node runs without an actuator.
    dispatcher: Option<CommandDispatcher<O>>,
    scheduler: PublishScheduler,
    data_topic: String,
    timing: Timing,
    state: ConnectionState,
}

impl<L, C, S, O, K> Controller<L, C, S, O, K>
where
    L: Link,
    C: Connector,
    S: Sensor,
    O: Output,
    K: Clock,
{
    pub fn new(
        config: &Config,
        identity: DeviceIdentity,
        link: L,
        connector: C,
        sensor: S,
        clock: K,
        dispatcher: Option<CommandDispatcher<O>>,
    ) -> Self {
        Self {
            identity,
            link,
            connector,
            session: None,
            sensor,
            clock,
            dispatcher,
            scheduler: PublishScheduler::new(config.publish_cadence(), config.sensor_retry_delay()),
            data_topic: config.topics.data.clone(),
            timing: Timing {
                tick: config.tick_interval(),
                reconnect_delay: config.reconnect_delay(),
                link_timeout: config.link_timeout(),
            },
            state: ConnectionState::Down,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Run forever. Returns only if the network never comes up at startup.
    pub async fn run(&mut self) -> Result<(), LinkError> {
        self.start().await?;
        if let Err(e) = self.establish().await {
            error!("Session setup failed: {}", e);
            self.recover().await;
        }
        loop {
            if let Err(e) = self.tick().await {
                error!(
                    "Session failure: {}. Reconnecting in {:?}",
                    e, self.timing.reconnect_delay
                );
                self.recover().await;
            }
        }
    }

    /// Bring the network link up. A timeout here is fatal.
    pub async fn start(&mut self) -> Result<(), LinkError> {
        link::connect(&mut self.link, self.timing.link_timeout).await?;
        self.state = ConnectionState::NetworkUp;
        Ok(())
    }

    /// Open a session, subscribe for commands and announce the actuator state.
    pub async fn establish(&mut self) -> Result<(), SessionError> {
        let session = self.connector.open(&self.identity).await?;
        let session = self.session.insert(session);
        self.state = ConnectionState::SessionUp;
        info!("Online as {}", self.identity.client_id());

        if let Some(dispatcher) = self.dispatcher.as_mut() {
            session.subscribe(dispatcher.command_topic())?;
            info!("Subscribed to {}", dispatcher.command_topic());
            dispatcher.announce(session).await?;
        }
        Ok(())
    }

    /// One control-loop iteration: wait up to one tick for a command, then
    /// publish a reading if one is due.
    pub async fn tick(&mut self) -> Result<(), SessionError> {
        let Some(session) = self.session.as_mut() else {
            return Err(SessionError::Disconnected);
        };

        if let Some(msg) = session.poll(self.timing.tick).await? {
            match self.dispatcher.as_mut() {
                Some(dispatcher) => dispatcher.dispatch(&msg, session).await?,
                None => debug!("No actuator; dropping message on {}", msg.topic),
            }
        }

        self.scheduler
            .maybe_publish(
                Instant::now(),
                &mut self.sensor,
                &self.clock,
                session,
                &self.data_topic,
            )
            .await?;
        Ok(())
    }

    /// Tear down and rebuild until a session is up again. Flat delay between
    /// attempts.
    pub async fn recover(&mut self) {
        loop {
            if let Some(mut session) = self.session.take() {
                session.close().await;
            }
            self.state = ConnectionState::Down;
            tokio::time::sleep(self.timing.reconnect_delay).await;

            if !self.link.is_ready().await {
                warn!("Network link down, reconnecting");
                if let Err(e) = link::connect(&mut self.link, self.timing.link_timeout).await {
                    error!("{}. Retrying in {:?}", e, self.timing.reconnect_delay);
                    continue;
                }
            }
            self.state = ConnectionState::NetworkUp;

            match self.establish().await {
                Ok(()) => return,
                Err(e) => error!(
                    "Reconnect failed: {}. Retrying in {:?}",
                    e, self.timing.reconnect_delay
                ),
            }
        }
    }

    /// Graceful close of the live session, if any.
    pub async fn shutdown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
        self.state = ConnectionState::Down;
    }
}
