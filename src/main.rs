mod clock;
mod config;
mod controller;
mod device;
mod dispatch;
mod error;
mod identity;
mod link;
mod mqtt;
mod scheduler;
#[cfg(test)]
mod testing;

use tracing::{error, info, warn};

use crate::controller::Controller;
use crate::device::dht::IioDht11;
use crate::device::gpio::SysfsGpio;
use crate::dispatch::CommandDispatcher;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let identity = match identity::DeviceIdentity::from_config(&config) {
        Ok(id) => id,
        Err(e) => {
            error!("Identity error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Starting sensor-node {} (mqtt={}:{}, every {}s, actuator={})",
        identity.client_id(),
        config.mqtt.broker_host,
        config.mqtt.broker_port,
        config.node.publish_every_secs,
        if config.node.actuator_enabled { "on" } else { "off" },
    );

    let dispatcher = if config.node.actuator_enabled {
        let mut dispatcher = CommandDispatcher::new(
            SysfsGpio::new(&config.node.actuator_gpio_value),
            &config.topics.command,
            &config.topics.command_status,
        );
        if let Err(e) = dispatcher.reset().await {
            warn!("Could not reset output to OFF: {}", e);
        }
        Some(dispatcher)
    } else {
        None
    };

    let mut controller = Controller::new(
        &config,
        identity,
        link::HostLink::new(
            &config.network,
            &config.mqtt.broker_host,
            config.mqtt.broker_port,
        ),
        mqtt::client::MqttConnector::new(&config),
        IioDht11::new(&config.node.sensor_iio_dir),
        clock::SystemClock::new(),
        dispatcher,
    );

    let mut sigterm =
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to register SIGTERM handler: {}", e);
                std::process::exit(1);
            }
        };

    tokio::select! {
        result = controller.run() => {
            if let Err(e) = result {
                error!("Startup failed: {}", e);
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down");
        }
    }

    info!("Closing session (state {:?})", controller.state());
    controller.shutdown().await;
    info!("sensor-node stopped");
}
