use crate::link::Link;
use crate::registry::{now_unix_secs, LinkStatus, MissionPhase, MissionStatus, Registry};
use mavlink::common;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const IDLE_SLEEP: Duration = Duration::from_millis(50);
const RECV_TIMEOUT: Duration = Duration::from_secs(1);
const ERROR_SLEEP: Duration = Duration::from_secs(1);

/// Per-UAV background loop. Runs until the record's `connected` flag goes
/// false. Yields instead of calling `recv` whenever the arbiter has set
/// `mission_comm_lock`, so Mission Transfer / Flight Director own the
/// socket exclusively while they run, or whenever `telemetry_enabled` is
/// false.
pub fn spawn(uav_id: String, link: Arc<Link>, registry: Registry) -> thread::JoinHandle<()> {
    thread::spawn(move || run(&uav_id, &link, &registry))
}

fn run(uav_id: &str, link: &Link, registry: &Registry) {
    loop {
        let record = match registry.get(uav_id) {
            Ok(record) => record,
            Err(_) => return,
        };
        if !record.connected {
            return;
        }
        if record.mission_comm_lock || !record.telemetry_enabled {
            thread::sleep(IDLE_SLEEP);
            continue;
        }

        match link.recv(RECV_TIMEOUT) {
            Ok(Some((_, message))) => apply_message(uav_id, registry, message),
            Ok(None) => continue,
            Err(_) => {
                let _ = registry.update(uav_id, |record| record.status = LinkStatus::Offline);
                thread::sleep(ERROR_SLEEP);
            }
        }
    }
}

fn apply_message(uav_id: &str, registry: &Registry, message: common::MavMessage) {
    let _ = registry.update(uav_id, |record| match &message {
        common::MavMessage::HEARTBEAT(data) => {
            record.last_heartbeat = Some(now_unix_secs());
            record.status = LinkStatus::Online;
            record.mavtype = data.mavtype as u8;
            record.autopilot = data.autopilot as u8;
        }
        common::MavMessage::GLOBAL_POSITION_INT(data) => {
            record.lat = data.lat as f64 / 1e7;
            record.lon = data.lon as f64 / 1e7;
            record.alt = data.relative_alt as f64 / 1000.0;
            record.heading = data.hdg as f64 / 100.0;
        }
        common::MavMessage::VFR_HUD(data) => {
            record.ground_speed = data.groundspeed as f64;
        }
        common::MavMessage::GPS_RAW_INT(data) => {
            record.gps_fix = data.fix_type as u8;
            record.satellites = data.satellites_visible;
        }
        common::MavMessage::SYS_STATUS(data) => {
            if data.battery_remaining >= 0 {
                record.battery_percent = Some(data.battery_remaining as u8);
            }
            if data.voltage_battery > 0 {
                record.battery_voltage = Some(data.voltage_battery as f64 / 1000.0);
            }
        }
        common::MavMessage::MISSION_CURRENT(data) => {
            if record.mission_status == MissionStatus::Stopped {
                return;
            }
            record.mission_current_seq = data.seq as i32;
            record.last_mission_update = Some(now_unix_secs());
            if record.mission_total > 0 {
                record.mission_progress = ((data.seq as f64 + 1.0) / record.mission_total as f64)
                    .clamp(0.0, 1.0);
                if data.seq as u16 >= record.mission_total - 1 {
                    record.mission_status = MissionStatus::Completed;
                    record.mission_phase = Some(MissionPhase::Completed);
                }
            }
        }
        common::MavMessage::STATUSTEXT(data) => {
            if record.mission_status == MissionStatus::Stopped {
                return;
            }
            let text: String = data.text.iter().map(|&b| b as char).collect();
            let lower = text.to_lowercase();
            if lower.contains("mission complete") || lower.contains("landed") {
                record.mission_status = MissionStatus::Completed;
            }
        }
        _ => {}
    });
}
