use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The offset in `name = "БВС-<port-219>"`. Fixed per the original backend;
/// not exposed as a knob since no other value is ever observed there.
pub const UAV_NAME_PORT_OFFSET: u16 = 219;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GcsConfig {
    pub gcs_system_id: u8,
    pub gcs_component_id: u8,
    pub peer_host: String,
    pub discovery_ports: Vec<u16>,
    pub discovery_handshake_secs: u64,
    pub heartbeat_stale_secs: u64,
    pub heartbeat_sweep_interval_secs: u64,
    pub default_takeoff_altitude_m: f64,
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            gcs_system_id: 250,
            gcs_component_id: 1,
            peer_host: "localhost".to_string(),
            discovery_ports: vec![14550],
            discovery_handshake_secs: 5,
            heartbeat_stale_secs: 60,
            heartbeat_sweep_interval_secs: 5,
            default_takeoff_altitude_m: 10.0,
        }
    }
}

impl GcsConfig {
    pub fn discovery_handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_handshake_secs)
    }

    pub fn heartbeat_stale_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_stale_secs)
    }

    pub fn heartbeat_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_sweep_interval_secs)
    }
}
