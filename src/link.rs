use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::NetworkConfig;
use crate::error::LinkError;

const POLL_INTERVAL: Duration = Duration::from_millis(300);
const ASSOCIATE_TIMEOUT: Duration = Duration::from_secs(5);

/// The node's network path to the broker.
pub trait Link {
    /// Kick off whatever makes the link come up. Must not wait for it.
    async fn bring_up(&mut self) {}

    async fn is_ready(&mut self) -> bool;
}

/// Start the link once, then wait for it to come up. No retries: the caller
/// owns retry policy.
pub async fn connect<L: Link>(link: &mut L, timeout: Duration) -> Result<(), LinkError> {
    let deadline = Instant::now() + timeout;
    let mut started = false;
    loop {
        if link.is_ready().await {
            info!("Network link ready");
            return Ok(());
        }
        if !started {
            link.bring_up().await;
            started = true;
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(LinkError::Timeout(timeout));
        }
        tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
    }
}

/// Wi-Fi association through NetworkManager.
struct Association {
    program: PathBuf,
    interface: String,
    ssid: String,
    passphrase: Option<String>,
}

impl Association {
    fn args(&self) -> Vec<&str> {
        let mut args = vec!["--wait", "0", "device", "wifi", "connect", self.ssid.as_str()];
        if let Some(passphrase) = &self.passphrase {
            args.extend(["password", passphrase.as_str()]);
        }
        args.extend(["ifname", self.interface.as_str()]);
        args
    }

    async fn start(&self) {
        info!("Associating {} with {}", self.interface, self.ssid);
        let run = Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        match tokio::time::timeout(ASSOCIATE_TIMEOUT, run).await {
            Ok(Ok(out)) if out.status.success() => debug!("Association requested"),
            Ok(Ok(out)) => warn!(
                "{} exited with {}: {}",
                self.program.display(),
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            ),
            Ok(Err(e)) => warn!("Cannot run {}: {}", self.program.display(), e),
            Err(_) => warn!("{} did not return in {:?}", self.program.display(), ASSOCIATE_TIMEOUT),
        }
    }
}

/// Host link: the interface (if configured) reports `up` and the broker name
/// resolves to at least one address. With Wi-Fi credentials a down interface
/// is associated first.
pub struct HostLink {
    operstate: Option<PathBuf>,
    association: Option<Association>,
    broker: (String, u16),
}

impl HostLink {
    pub fn new(network: &NetworkConfig, broker_host: &str, broker_port: u16) -> Self {
        let association = match (&network.interface, &network.ssid) {
            (Some(interface), Some(ssid)) => Some(Association {
                program: PathBuf::from("nmcli"),
                interface: interface.clone(),
                ssid: ssid.clone(),
                passphrase: network.passphrase.clone(),
            }),
            _ => None,
        };
        Self {
            operstate: network
                .interface
                .as_ref()
                .map(|iface| PathBuf::from(format!("/sys/class/net/{iface}/operstate"))),
            association,
            broker: (broker_host.to_string(), broker_port),
        }
    }

    async fn interface_up(&self) -> bool {
        let Some(path) = &self.operstate else {
            return true;
        };
        match tokio::fs::read_to_string(path).await {
            Ok(state) => state.trim() == "up",
            Err(e) => {
                debug!("Cannot read {}: {}", path.display(), e);
                false
            }
        }
    }
}

impl Link for HostLink {
    async fn bring_up(&mut self) {
        if self.interface_up().await {
            return;
        }
        if let Some(association) = &self.association {
            association.start().await;
        }
    }

    async fn is_ready(&mut self) -> bool {
        if !self.interface_up().await {
            return false;
        }
        match tokio::net::lookup_host((self.broker.0.as_str(), self.broker.1)).await {
            Ok(mut addrs) => match addrs.next() {
                Some(addr) => {
                    debug!("Broker {} resolves to {}", self.broker.0, addr);
                    true
                }
                None => false,
            },
            Err(e) => {
                debug!("Broker {} does not resolve yet: {}", self.broker.0, e);
                false
            }
        }
    }
}
