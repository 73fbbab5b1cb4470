use crate::config::{GcsConfig, UAV_NAME_PORT_OFFSET};
use crate::error::CoreError;
use crate::link::Link;
use crate::registry::{Registry, UavRecord};
use crate::telemetry;
use mavlink::common;
use std::sync::Arc;
use tracing::{info, warn};

/// One-shot handshake over every configured port. A port already registered
/// with `connected=true` is left alone; the source this is grounded on
/// ignores repeated discovery on a live port rather than replacing it.
pub fn discover(config: &GcsConfig, registry: &Registry, ports: Option<&[u16]>) -> Vec<String> {
    let ports = ports.unwrap_or(&config.discovery_ports);
    let mut discovered = Vec::new();
    for &port in ports {
        let uav_id = format!("uav_{port}");
        if registry.contains_connected(&uav_id) {
            continue;
        }
        match discover_one(config, registry, port) {
            Ok(()) => discovered.push(uav_id),
            Err(err) => warn!(port, error = %err, "discovery handshake failed"),
        }
    }
    discovered
}

fn discover_one(config: &GcsConfig, registry: &Registry, port: u16) -> Result<(), CoreError> {
    let link = Link::connect(&config.peer_host, port, config.gcs_system_id, config.gcs_component_id)?;
    link.send_heartbeat(
        common::MavType::MAV_TYPE_GCS,
        common::MavAutopilot::MAV_AUTOPILOT_INVALID,
        common::MavModeFlag::empty(),
        0,
        common::MavState::MAV_STATE_ACTIVE,
    )?;

    let heartbeat = link.recv_match(config.discovery_handshake_timeout(), |message| {
        matches!(message, common::MavMessage::HEARTBEAT(_))
    })?;

    if heartbeat.is_none() {
        link.close();
        return Err(CoreError::ProtocolTimeout(format!("no heartbeat from port {port}")));
    }

    let uav_id = format!("uav_{port}");
    let name = format!("БВС-{}", port.saturating_sub(UAV_NAME_PORT_OFFSET));
    let record = UavRecord::new(uav_id.clone(), name, port);

    let link = Arc::new(link);
    registry.insert(record, link.clone());
    telemetry::spawn(uav_id.clone(), link, registry.clone());
    info!(uav_id, port, "uav discovered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::UavRecord;
    use crate::testutil::mock_link;
    use std::sync::Arc;

    #[test]
    fn already_connected_port_is_skipped() {
        let registry = Registry::new();
        registry.insert(
            UavRecord::new("uav_14550".into(), "a".into(), 14550),
            Arc::new(mock_link(vec![])),
        );
        let config = GcsConfig::default();
        let discovered = discover(&config, &registry, Some(&[14550]));
        assert!(discovered.is_empty());
    }

    #[test]
    fn name_offset_matches_scenario() {
        let name = format!("БВС-{}", 14550u16.saturating_sub(UAV_NAME_PORT_OFFSET));
        assert_eq!(name, "БВС-14331");
    }
}
