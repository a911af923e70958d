use std::path::Path;

use tracing::debug;

use crate::config::Config;

const NET_CLASS_DIR: &str = "/sys/class/net";
const MACHINE_ID_PATH: &str = "/etc/machine-id";
const MAX_ID_LEN: usize = 16;

/// Stable identity of this node, derived once from hardware identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    client_id: String,
    presence_topic: String,
}

impl DeviceIdentity {
    pub fn new(prefix: &str, seed: &str, presence_prefix: &str) -> Result<Self, String> {
        let id = sanitize_id(seed);
        if id.is_empty() {
            return Err(format!("identity seed {seed:?} has no usable characters"));
        }
        let client_id = format!("{prefix}_{id}");
        let presence_topic = format!("{presence_prefix}/{client_id}");
        Ok(Self {
            client_id,
            presence_topic,
        })
    }

    /// Resolve the seed from config, falling back to the interface MAC and
    /// then the machine id.
    pub fn from_config(config: &Config) -> Result<Self, String> {
        let seed = match &config.mqtt.id_seed {
            Some(seed) => seed.clone(),
            None => hardware_seed(
                Path::new(NET_CLASS_DIR),
                config.network.interface.as_deref(),
                Path::new(MACHINE_ID_PATH),
            )?,
        };
        Self::new(
            &config.mqtt.client_id_prefix,
            &seed,
            &config.topics.presence_prefix,
        )
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn presence_topic(&self) -> &str {
        &self.presence_topic
    }
}

fn hardware_seed(
    net_dir: &Path,
    interface: Option<&str>,
    machine_id: &Path,
) -> Result<String, String> {
    if let Some(iface) = interface {
        let path = net_dir.join(iface).join("address");
        match std::fs::read_to_string(&path) {
            // virtual interfaces report all zeros
            Ok(mac) if sanitize_id(&mac).chars().any(|c| c != '0') => return Ok(mac),
            Ok(_) => debug!("{} has no hardware address", iface),
            Err(e) => debug!("Cannot read {}: {}", path.display(), e),
        }
    }
    std::fs::read_to_string(machine_id)
        .map_err(|e| format!("NODE_ID_SEED unset and {} unreadable: {e}", machine_id.display()))
}

/// "A1:B2:C3:D4:E5:F6" → "a1b2c3d4e5f6"
fn sanitize_id(seed: &str) -> String {
    seed.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .take(MAX_ID_LEN)
        .collect()
}
