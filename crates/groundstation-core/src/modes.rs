use mavlink::common::{MavAutopilot, MavType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VehicleClass {
    Copter,
    Plane,
    Rover,
    Unknown,
}

fn vehicle_class(mavtype: MavType) -> VehicleClass {
    match mavtype {
        MavType::MAV_TYPE_QUADROTOR
        | MavType::MAV_TYPE_HEXAROTOR
        | MavType::MAV_TYPE_OCTOROTOR
        | MavType::MAV_TYPE_TRICOPTER
        | MavType::MAV_TYPE_COAXIAL
        | MavType::MAV_TYPE_HELICOPTER => VehicleClass::Copter,
        MavType::MAV_TYPE_FIXED_WING => VehicleClass::Plane,
        MavType::MAV_TYPE_GROUND_ROVER => VehicleClass::Rover,
        _ => VehicleClass::Unknown,
    }
}

const COPTER_MODES: &[(u32, &str)] = &[
    (0, "STABILIZE"),
    (1, "ACRO"),
    (2, "ALT_HOLD"),
    (3, "AUTO"),
    (4, "GUIDED"),
    (5, "LOITER"),
    (6, "RTL"),
    (7, "CIRCLE"),
    (9, "LAND"),
    (11, "DRIFT"),
    (13, "SPORT"),
    (15, "AUTOTUNE"),
    (16, "POSHOLD"),
    (17, "BRAKE"),
    (18, "THROW"),
    (21, "SMART_RTL"),
];

const PLANE_MODES: &[(u32, &str)] = &[
    (0, "MANUAL"),
    (1, "CIRCLE"),
    (2, "STABILIZE"),
    (3, "TRAINING"),
    (4, "ACRO"),
    (5, "FLY_BY_WIRE_A"),
    (6, "FLY_BY_WIRE_B"),
    (7, "CRUISE"),
    (8, "AUTOTUNE"),
    (10, "AUTO"),
    (11, "RTL"),
    (12, "LOITER"),
    (15, "GUIDED"),
    (17, "QSTABILIZE"),
    (18, "QHOVER"),
    (19, "QLOITER"),
    (20, "QLAND"),
    (21, "QRTL"),
];

const ROVER_MODES: &[(u32, &str)] = &[
    (0, "MANUAL"),
    (1, "ACRO"),
    (3, "STEERING"),
    (4, "HOLD"),
    (5, "LOITER"),
    (6, "FOLLOW"),
    (7, "SIMPLE"),
    (10, "AUTO"),
    (11, "RTL"),
    (12, "SMART_RTL"),
    (15, "GUIDED"),
];

fn mode_table(autopilot: MavAutopilot, mavtype: MavType) -> &'static [(u32, &'static str)] {
    if autopilot != MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA {
        return &[];
    }
    match vehicle_class(mavtype) {
        VehicleClass::Copter | VehicleClass::Unknown => COPTER_MODES,
        VehicleClass::Plane => PLANE_MODES,
        VehicleClass::Rover => ROVER_MODES,
    }
}

pub fn mode_name(autopilot: MavAutopilot, mavtype: MavType, custom_mode: u32) -> String {
    if autopilot != MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA {
        return format!("MODE({custom_mode})");
    }
    for &(num, name) in mode_table(autopilot, mavtype) {
        if num == custom_mode {
            return name.to_string();
        }
    }
    format!("UNKNOWN({custom_mode})")
}

pub fn mode_number(autopilot: MavAutopilot, mavtype: MavType, name: &str) -> Option<u32> {
    let upper = name.to_uppercase();
    mode_table(autopilot, mavtype)
        .iter()
        .find(|&&(_, mode_name)| mode_name == upper)
        .map(|&(num, _)| num)
}

/// First of `[GUIDED, LOITER, STABILIZE, ALT_HOLD]` present in this vehicle's
/// mode table, falling back to whatever is first in the table.
pub fn pre_arm_mode(autopilot: MavAutopilot, mavtype: MavType) -> Option<&'static str> {
    let table = mode_table(autopilot, mavtype);
    for preferred in ["GUIDED", "LOITER", "STABILIZE", "ALT_HOLD"] {
        if table.iter().any(|&(_, name)| name == preferred) {
            return Some(preferred);
        }
    }
    table.first().map(|&(_, name)| name)
}

/// First of `[BRAKE, LOITER, ALT_HOLD]` present in this vehicle's mode table.
pub fn stop_mode(autopilot: MavAutopilot, mavtype: MavType) -> Option<&'static str> {
    let table = mode_table(autopilot, mavtype);
    ["BRAKE", "LOITER", "ALT_HOLD"]
        .into_iter()
        .find(|preferred| table.iter().any(|&(_, name)| name == *preferred))
}
