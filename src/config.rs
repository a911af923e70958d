use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::device::dht::MIN_SAMPLE_INTERVAL;

#[derive(Debug, Clone)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub topics: Topics,
    pub network: NetworkConfig,
    pub node: NodeConfig,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keepalive_secs: u64,
    pub client_id_prefix: String,
    /// Raw hardware identity; `None` means the interface MAC, then
    /// `/etc/machine-id`.
    pub id_seed: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Topics {
    pub data: String,
    pub command: String,
    pub command_status: String,
    pub presence_prefix: String,
}

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Interface whose operstate must be `up`; `None` skips the check.
    pub interface: Option<String>,
    /// Wi-Fi credentials used to associate `interface` when it is down.
    pub ssid: Option<String>,
    pub passphrase: Option<String>,
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub publish_every_secs: u64,
    pub sensor_retry_secs: u64,
    pub reconnect_delay_secs: u64,
    pub tick_ms: u64,
    pub sensor_iio_dir: PathBuf,
    pub actuator_enabled: bool,
    pub actuator_gpio_value: PathBuf,
}

fn env_required(key: &str) -> Result<String, String> {
    env::var(key).map_err(|_| format!("{key} environment variable is required"))
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let config = Self {
            mqtt: MqttConfig {
                broker_host: env_required("MQTT_BROKER_HOST")?,
                broker_port: env_or_default("MQTT_BROKER_PORT", 1883),
                username: env_optional("MQTT_USERNAME"),
                password: env_optional("MQTT_PASSWORD"),
                keepalive_secs: env_or_default("MQTT_KEEPALIVE_SECS", 30),
                client_id_prefix: env_or_default("MQTT_CLIENT_ID_PREFIX", "node".to_string()),
                id_seed: env_optional("NODE_ID_SEED"),
            },
            topics: Topics {
                data: env_or_default("MQTT_TOPIC_DATA", "sensors/dht".to_string()),
                command: env_or_default("MQTT_TOPIC_COMMAND", "control/led".to_string()),
                command_status: env_or_default(
                    "MQTT_TOPIC_COMMAND_STATUS",
                    "control/led/status".to_string(),
                ),
                presence_prefix: env_or_default("MQTT_PRESENCE_PREFIX", "iot/status".to_string()),
            },
            network: NetworkConfig {
                interface: env_optional("NET_INTERFACE"),
                ssid: env_optional("NET_SSID"),
                passphrase: env_optional("NET_PASSPHRASE"),
                connect_timeout_ms: env_or_default("NET_CONNECT_TIMEOUT_MS", 15_000),
            },
            node: NodeConfig {
                publish_every_secs: env_or_default("PUBLISH_EVERY_SECS", 5),
                sensor_retry_secs: env_or_default("SENSOR_RETRY_SECS", 2),
                reconnect_delay_secs: env_or_default("RECONNECT_DELAY_SECS", 3),
                tick_ms: env_or_default("TICK_MS", 50),
                sensor_iio_dir: env_or_default(
                    "SENSOR_IIO_DIR",
                    PathBuf::from("/sys/bus/iio/devices/iio:device0"),
                ),
                actuator_enabled: env_flag("ACTUATOR_ENABLED"),
                actuator_gpio_value: env_or_default(
                    "ACTUATOR_GPIO_VALUE",
                    PathBuf::from("/sys/class/gpio/gpio4/value"),
                ),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.mqtt.broker_host.is_empty() {
            return Err("MQTT_BROKER_HOST must not be empty".into());
        }
        if self.mqtt.broker_port == 0 {
            return Err("MQTT_BROKER_PORT must be > 0".into());
        }
        if self.mqtt.keepalive_secs == 0 {
            return Err("MQTT_KEEPALIVE_SECS must be > 0".into());
        }
        for (key, topic) in [
            ("MQTT_TOPIC_DATA", &self.topics.data),
            ("MQTT_TOPIC_COMMAND", &self.topics.command),
            ("MQTT_TOPIC_COMMAND_STATUS", &self.topics.command_status),
            ("MQTT_PRESENCE_PREFIX", &self.topics.presence_prefix),
        ] {
            if topic.is_empty() {
                return Err(format!("{key} must not be empty"));
            }
        }
        if self.network.ssid.is_some() && self.network.interface.is_none() {
            return Err("NET_SSID requires NET_INTERFACE".into());
        }
        if self.network.passphrase.is_some() && self.network.ssid.is_none() {
            return Err("NET_PASSPHRASE requires NET_SSID".into());
        }
        if self.publish_cadence() < MIN_SAMPLE_INTERVAL {
            return Err(format!(
                "PUBLISH_EVERY_SECS must be >= {}",
                MIN_SAMPLE_INTERVAL.as_secs()
            ));
        }
        if self.sensor_retry_delay() < MIN_SAMPLE_INTERVAL {
            return Err(format!(
                "SENSOR_RETRY_SECS must be >= {}",
                MIN_SAMPLE_INTERVAL.as_secs()
            ));
        }
        if self.sensor_retry_delay() >= self.publish_cadence() {
            return Err("SENSOR_RETRY_SECS must be < PUBLISH_EVERY_SECS".into());
        }
        if self.node.tick_ms == 0 || self.tick_interval() >= self.keepalive() {
            return Err("TICK_MS must be > 0 and shorter than the keepalive".into());
        }
        Ok(())
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.mqtt.keepalive_secs)
    }

    pub fn link_timeout(&self) -> Duration {
        Duration::from_millis(self.network.connect_timeout_ms)
    }

    pub fn publish_cadence(&self) -> Duration {
        Duration::from_secs(self.node.publish_every_secs)
    }

    pub fn sensor_retry_delay(&self) -> Duration {
        Duration::from_secs(self.node.sensor_retry_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.node.reconnect_delay_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.node.tick_ms)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample() -> Config {
        Config {
            mqtt: MqttConfig {
                broker_host: "broker.local".into(),
                broker_port: 1883,
                username: None,
                password: None,
                keepalive_secs: 30,
                client_id_prefix: "node".into(),
                id_seed: Some("a1b2c3d4e5f6".into()),
            },
            topics: Topics {
                data: "sensors/dht".into(),
                command: "control/led".into(),
                command_status: "control/led/status".into(),
                presence_prefix: "iot/status".into(),
            },
            network: NetworkConfig {
                interface: None,
                ssid: None,
                passphrase: None,
                connect_timeout_ms: 15_000,
            },
            node: NodeConfig {
                publish_every_secs: 5,
                sensor_retry_secs: 2,
                reconnect_delay_secs: 3,
                tick_ms: 50,
                sensor_iio_dir: PathBuf::from("/nonexistent"),
                actuator_enabled: true,
                actuator_gpio_value: PathBuf::from("/nonexistent"),
            },
        }
    }

    #[test]
    fn defaults_validate() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn cadence_below_sensor_minimum_is_rejected() {
        let mut config = sample();
        config.node.publish_every_secs = 0;
        assert!(config.validate().unwrap_err().contains("PUBLISH_EVERY_SECS"));
    }

    #[test]
    fn retry_must_be_shorter_than_cadence() {
        let mut config = sample();
        config.node.sensor_retry_secs = 5;
        assert!(config.validate().unwrap_err().contains("SENSOR_RETRY_SECS"));
    }

    #[test]
    fn tick_must_fit_inside_keepalive() {
        let mut config = sample();
        config.node.tick_ms = 30_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn wifi_credentials_need_an_interface() {
        let mut config = sample();
        config.network.ssid = Some("greenhouse".into());
        assert_eq!(
            config.validate().unwrap_err(),
            "NET_SSID requires NET_INTERFACE"
        );

        config.network.interface = Some("wlan0".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_topic_is_rejected() {
        let mut config = sample();
        config.topics.command = String::new();
        assert_eq!(
            config.validate().unwrap_err(),
            "MQTT_TOPIC_COMMAND must not be empty"
        );
    }
}
