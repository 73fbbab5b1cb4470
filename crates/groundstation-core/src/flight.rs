use crate::error::CoreError;
use crate::link::Link;
use crate::modes;
use mavlink::common;
use num_traits::FromPrimitive;
use std::time::Duration;
use tracing::{info, warn};

const MODE_TIMEOUT: Duration = Duration::from_secs(10);
const ARM_TIMEOUT: Duration = Duration::from_secs(10);
const ARMED_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

fn safety_armed_bit() -> u8 {
    common::MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED.bits()
}

pub struct VehicleIdentity {
    pub target_system: u8,
    pub target_component: u8,
    pub autopilot: common::MavAutopilot,
    pub mavtype: common::MavType,
}

/// Reads heartbeats for up to `ARMED_CHECK_TIMEOUT`; returns the last
/// observed armed state, or `false` if nothing arrived.
pub fn is_armed(link: &Link) -> Result<bool, CoreError> {
    let mut armed = false;
    let deadline = std::time::Instant::now() + ARMED_CHECK_TIMEOUT;
    while std::time::Instant::now() < deadline {
        let remaining = deadline.saturating_duration_since(std::time::Instant::now());
        match link.recv_match(remaining, |msg| matches!(msg, common::MavMessage::HEARTBEAT(_)))? {
            Some(common::MavMessage::HEARTBEAT(data)) => {
                armed = data.base_mode.bits() & safety_armed_bit() != 0;
            }
            _ => break,
        }
    }
    Ok(armed)
}

/// Sends SET_MODE and waits for a heartbeat confirming `custom_mode`.
pub fn set_mode(link: &Link, identity: &VehicleIdentity, mode_name: &str) -> Result<(), CoreError> {
    let custom_mode = modes::mode_number(identity.autopilot, identity.mavtype, mode_name)
        .ok_or_else(|| CoreError::ProtocolViolation(format!("unknown mode '{mode_name}' for this vehicle")))?;

    link.send_mavlink(common::MavMessage::SET_MODE(common::SET_MODE_DATA {
        custom_mode,
        target_system: identity.target_system,
        base_mode: common::MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED,
    }))?;

    let confirmed = link.recv_match(MODE_TIMEOUT, |msg| {
        matches!(msg, common::MavMessage::HEARTBEAT(data) if data.custom_mode == custom_mode)
    })?;

    confirmed
        .map(|_| ())
        .ok_or_else(|| CoreError::ProtocolTimeout(format!("mode '{mode_name}' not confirmed by heartbeat")))
}

/// Sends MAV_CMD_COMPONENT_ARM_DISARM, waits for the heartbeat's armed flag
/// to match. COMMAND_ACK/STATUSTEXT are logged but not authoritative.
pub fn arm(link: &Link, identity: &VehicleIdentity, set_armed: bool) -> Result<(), CoreError> {
    link.send_mavlink(common::MavMessage::COMMAND_LONG(common::COMMAND_LONG_DATA {
        param1: if set_armed { 1.0 } else { 0.0 },
        param2: 0.0,
        param3: 0.0,
        param4: 0.0,
        param5: 0.0,
        param6: 0.0,
        param7: 0.0,
        command: common::MavCmd::MAV_CMD_COMPONENT_ARM_DISARM,
        target_system: identity.target_system,
        target_component: identity.target_component,
        confirmation: 0,
    }))?;

    let deadline = std::time::Instant::now() + ARM_TIMEOUT;
    while std::time::Instant::now() < deadline {
        let remaining = deadline.saturating_duration_since(std::time::Instant::now());
        match link.recv(remaining)? {
            Some((_, common::MavMessage::HEARTBEAT(data))) => {
                let armed = data.base_mode.bits() & safety_armed_bit() != 0;
                if armed == set_armed {
                    return Ok(());
                }
            }
            Some((_, common::MavMessage::COMMAND_ACK(ack))) => {
                info!(result = ?ack.result, "COMMAND_ACK for arm/disarm");
            }
            Some((_, common::MavMessage::STATUSTEXT(_))) => {}
            Some(_) | None => {}
        }
    }

    Err(CoreError::ProtocolTimeout(format!(
        "arm/disarm to {set_armed} not confirmed by heartbeat"
    )))
}

/// Clear -> verified arm -> verified AUTO -> MISSION_START. Run under the
/// arbiter; caller is responsible for setting/clearing `mission_comm_lock`.
pub fn start_sequence(link: &Link, identity: &VehicleIdentity) -> Result<(), CoreError> {
    if !is_armed(link)? {
        let pre_arm = modes::pre_arm_mode(identity.autopilot, identity.mavtype)
            .ok_or_else(|| CoreError::ProtocolViolation("no pre-arm mode available for this vehicle".into()))?;
        set_mode(link, identity, pre_arm)
            .map_err(|err| CoreError::ProtocolViolation(format!("mode_error: {err}")))?;
        arm(link, identity, true).map_err(|err| CoreError::ProtocolViolation(format!("arm_error: {err}")))?;
    }

    set_mode(link, identity, "AUTO")
        .map_err(|err| CoreError::ProtocolViolation(format!("mode_auto_error: {err}")))?;

    link.send_mavlink(common::MavMessage::COMMAND_LONG(common::COMMAND_LONG_DATA {
        param1: 0.0,
        param2: 0.0,
        param3: 0.0,
        param4: 0.0,
        param5: 0.0,
        param6: 0.0,
        param7: 0.0,
        command: common::MavCmd::MAV_CMD_MISSION_START,
        target_system: identity.target_system,
        target_component: identity.target_component,
        confirmation: 0,
    }))?;

    Ok(())
}

/// Best-effort stop: send-only mode change, never verified, so it cannot
/// contend with the Telemetry Reader for heartbeats (spec 4.8.3).
pub fn stop_mission(link: &Link, identity: &VehicleIdentity) -> Result<(), CoreError> {
    if let Some(mode_name) = modes::stop_mode(identity.autopilot, identity.mavtype) {
        let custom_mode = modes::mode_number(identity.autopilot, identity.mavtype, mode_name)
            .expect("stop_mode always returns a mode present in the table");
        link.send_mavlink(common::MavMessage::SET_MODE(common::SET_MODE_DATA {
            custom_mode,
            target_system: identity.target_system,
            base_mode: common::MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED,
        }))?;
        return Ok(());
    }

    warn!("no BRAKE/LOITER/ALT_HOLD mode available, falling back to NAV_LOITER_UNLIM");
    link.send_mavlink(common::MavMessage::COMMAND_LONG(common::COMMAND_LONG_DATA {
        param1: 0.0,
        param2: 0.0,
        param3: 0.0,
        param4: 0.0,
        param5: 0.0,
        param6: 0.0,
        param7: 0.0,
        command: common::MavCmd::MAV_CMD_NAV_LOITER_UNLIM,
        target_system: identity.target_system,
        target_component: identity.target_component,
        confirmation: 0,
    }))?;
    Ok(())
}

pub fn mavtype_from_raw(raw: u8) -> common::MavType {
    common::MavType::from_u8(raw).unwrap_or(common::MavType::MAV_TYPE_GENERIC)
}

pub fn autopilot_from_raw(raw: u8) -> common::MavAutopilot {
    common::MavAutopilot::from_u8(raw).unwrap_or(common::MavAutopilot::MAV_AUTOPILOT_GENERIC)
}
