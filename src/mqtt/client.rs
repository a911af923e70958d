use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnAck, ConnectReturnCode, ConnectionError, Event, EventLoop, LastWill,
    MqttOptions, Outgoing, Packet, QoS,
};
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, warn};

use super::{Connector, Inbound, OFFLINE, ONLINE, Session};
use crate::config::{Config, MqttConfig};
use crate::error::SessionError;
use crate::identity::DeviceIdentity;

const REQUEST_CAPACITY: usize = 32;
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const CLOSE_FLUSH: Duration = Duration::from_millis(500);

/// Build session options. The last-will is part of the CONNECT packet, so the
/// broker holds it even if we die mid-handshake.
pub(crate) fn session_options(config: &MqttConfig, identity: &DeviceIdentity) -> MqttOptions {
    let mut mqttopts = MqttOptions::new(
        identity.client_id(),
        &config.broker_host,
        config.broker_port,
    );
    mqttopts.set_keep_alive(Duration::from_secs(config.keepalive_secs));
    mqttopts.set_clean_session(true);

    if let (Some(user), Some(pass)) = (&config.username, &config.password) {
        mqttopts.set_credentials(user, pass);
    }

    mqttopts.set_last_will(LastWill::new(
        identity.presence_topic(),
        OFFLINE.as_bytes().to_vec(),
        QoS::AtMostOnce,
        true,
    ));
    mqttopts
}

pub struct MqttConnector {
    config: MqttConfig,
}

impl MqttConnector {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.mqtt.clone(),
        }
    }
}

impl Connector for MqttConnector {
    type Session = MqttSession;

    async fn open(&mut self, identity: &DeviceIdentity) -> Result<MqttSession, SessionError> {
        let options = session_options(&self.config, identity);
        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        info!(
            "Connecting to MQTT broker {}:{} as {}",
            self.config.broker_host,
            self.config.broker_port,
            identity.client_id()
        );
        let ack = timeout(HANDSHAKE_TIMEOUT, await_connack(&mut eventloop))
            .await
            .map_err(|_| SessionError::HandshakeTimeout(HANDSHAKE_TIMEOUT))??;
        if ack.code != ConnectReturnCode::Success {
            return Err(SessionError::Refused(format!("{:?}", ack.code)));
        }
        info!("Connected to MQTT broker");

        let mut session = MqttSession {
            client,
            eventloop,
            presence_topic: identity.presence_topic().to_string(),
            broken: false,
        };
        session.publish(identity.presence_topic(), ONLINE.as_bytes(), true)?;
        Ok(session)
    }
}

async fn await_connack(eventloop: &mut EventLoop) -> Result<ConnAck, SessionError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => return Ok(ack),
            Ok(_) => {}
            Err(ConnectionError::ConnectionRefused(code)) => {
                return Err(SessionError::Refused(format!("{code:?}")));
            }
            Err(e) => return Err(e.into()),
        }
    }
}

pub struct MqttSession {
    client: AsyncClient,
    eventloop: EventLoop,
    presence_topic: String,
    /// Set once the event loop reported an error. Polling a broken event loop
    /// would make rumqttc reconnect on its own.
    broken: bool,
}

impl MqttSession {
    fn fail(&mut self, err: ConnectionError) -> SessionError {
        self.broken = true;
        SessionError::Transport(err)
    }
}

impl Session for MqttSession {
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), SessionError> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, retain, payload.to_vec())?;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), SessionError> {
        self.client.try_subscribe(topic, QoS::AtMostOnce)?;
        Ok(())
    }

    async fn poll(&mut self, wait: Duration) -> Result<Option<Inbound>, SessionError> {
        if self.broken {
            return Err(SessionError::Disconnected);
        }
        let deadline = Instant::now() + wait;
        loop {
            match timeout_at(deadline, self.eventloop.poll()).await {
                Err(_) => return Ok(None),
                Ok(Err(e)) => return Err(self.fail(e)),
                Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                    return Ok(Some(Inbound {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    }));
                }
                Ok(Ok(Event::Incoming(Packet::Disconnect))) => {
                    self.broken = true;
                    return Err(SessionError::Disconnected);
                }
                Ok(Ok(event)) => debug!("MQTT event: {:?}", event),
            }
        }
    }

    async fn close(&mut self) {
        if self.broken {
            debug!("Dropping broken MQTT session");
            return;
        }
        if let Err(e) =
            self.client
                .try_publish(&self.presence_topic, QoS::AtMostOnce, true, OFFLINE)
        {
            warn!("Failed to queue offline status: {}", e);
        }
        if let Err(e) = self.client.try_disconnect() {
            warn!("Failed to queue disconnect: {}", e);
        }

        // Drive the event loop so the queued requests reach the socket
        let deadline = Instant::now() + CLOSE_FLUSH;
        loop {
            match timeout_at(deadline, self.eventloop.poll()).await {
                Ok(Ok(Event::Outgoing(Outgoing::Disconnect))) => break,
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    debug!("MQTT error while closing: {}", e);
                    break;
                }
                Err(_) => break,
            }
        }
        self.broken = true;
        info!("MQTT session closed");
    }
}
