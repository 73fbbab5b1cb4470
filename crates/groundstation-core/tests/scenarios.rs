use groundstation_core::config::GcsConfig;
use groundstation_core::registry::Registry;
use mavlink::common;
use mavlink::{connect, MavConnection, MavHeader};
use std::net::UdpSocket;
use std::thread;
use std::time::Duration;

fn free_port() -> u16 {
    UdpSocket::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

/// S1 — discovery success: a mock UDP peer answers the GCS heartbeat with a
/// HEARTBEAT and discovery inserts a connected record for that port.
#[test]
fn s1_discovery_success_registers_uav() {
    let port = free_port();

    let peer = UdpSocket::bind(("127.0.0.1", port)).unwrap();
    peer.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    let mut config = GcsConfig::default();
    config.peer_host = "127.0.0.1".to_string();
    config.discovery_ports = vec![port];
    config.discovery_handshake_secs = 5;

    let responder = thread::spawn(move || {
        let mut buf = [0u8; 512];
        let (_, from) = peer.recv_from(&mut buf).expect("gcs heartbeat");
        let reply = connect::<common::MavMessage>(&format!("udpout:{}:{}", from.ip(), from.port())).unwrap();
        reply
            .send(
                &MavHeader {
                    system_id: 1,
                    component_id: 1,
                    sequence: 0,
                },
                &common::MavMessage::HEARTBEAT(common::HEARTBEAT_DATA {
                    custom_mode: 3,
                    mavtype: common::MavType::MAV_TYPE_QUADROTOR,
                    autopilot: common::MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA,
                    base_mode: common::MavModeFlag::from_bits_truncate(0x81),
                    system_status: common::MavState::MAV_STATE_ACTIVE,
                    mavlink_version: 3,
                }),
            )
            .unwrap();
    });

    let registry = Registry::new();
    let discovered = groundstation_core::discovery::discover(&config, &registry, None);
    responder.join().unwrap();

    assert_eq!(discovered, vec![format!("uav_{port}")]);
    let record = registry.get(&format!("uav_{port}")).unwrap();
    assert!(record.connected);
    assert_eq!(record.status, groundstation_core::registry::LinkStatus::Online);
    assert_eq!(record.name, format!("БВС-{}", port - 219));
}
