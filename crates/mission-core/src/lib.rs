use serde::{Deserialize, Serialize};

pub mod error;
pub mod plan;
pub mod transfer;

pub use error::MissionError;
pub use plan::{parse_plan, ParsedPlan};
pub use transfer::{
    MissionTransferMachine, TransferError, TransferPhase, TransferProgress, TIMEOUT_ACK_MS,
    TIMEOUT_REQUEST_MS,
};

/// MAV_CMD codes that do not consume a lat/lon (LAND, ROI, RTL, DO_JUMP).
pub const COORDLESS_COMMANDS: [u16; 4] = [20, 21, 82, 177];

pub const MAV_CMD_NAV_WAYPOINT: u16 = 16;
pub const MAV_FRAME_GLOBAL: u8 = 0;
pub const MAV_FRAME_GLOBAL_RELATIVE_ALT: u8 = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissionType {
    Mission,
    Fence,
    Rally,
}

/// A single mission item as it is held in the registry, prior to MAVLink wire
/// encoding. `params` mirrors `MISSION_ITEM_INT`'s seven float parameters;
/// `lat`/`lon`/`alt` are the values extracted from params 5-7 when present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MissionItem {
    pub seq: u16,
    pub command: u16,
    pub frame: u8,
    pub current: bool,
    pub auto_continue: bool,
    pub params: [f32; 7],
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt: Option<f32>,
}

impl MissionItem {
    pub fn is_coordless(&self) -> bool {
        COORDLESS_COMMANDS.contains(&self.command)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HomePosition {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f32,
}

impl HomePosition {
    /// The synthetic seq-0 item prepended during upload (spec 4.7 step 1).
    pub fn to_mission_item(self) -> MissionItem {
        MissionItem {
            seq: 0,
            command: MAV_CMD_NAV_WAYPOINT,
            frame: MAV_FRAME_GLOBAL,
            current: false,
            auto_continue: true,
            params: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, self.altitude_m],
            lat: Some(self.latitude_deg),
            lon: Some(self.longitude_deg),
            alt: Some(self.altitude_m),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MissionPlan {
    pub mission_type: MissionType,
    pub home: Option<HomePosition>,
    pub items: Vec<MissionItem>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MissionIssue {
    pub code: String,
    pub message: String,
    pub seq: Option<u16>,
    pub severity: IssueSeverity,
}

pub fn validate_plan(plan: &MissionPlan) -> Vec<MissionIssue> {
    let mut issues = Vec::new();

    if let Some(home) = plan.home {
        if !(-90.0..=90.0).contains(&home.latitude_deg) {
            issues.push(MissionIssue {
                code: "home.latitude_out_of_range".to_string(),
                message: format!("home latitude {} is outside [-90, 90]", home.latitude_deg),
                seq: None,
                severity: IssueSeverity::Error,
            });
        }
        if !(-180.0..=180.0).contains(&home.longitude_deg) {
            issues.push(MissionIssue {
                code: "home.longitude_out_of_range".to_string(),
                message: format!(
                    "home longitude {} is outside [-180, 180]",
                    home.longitude_deg
                ),
                seq: None,
                severity: IssueSeverity::Error,
            });
        }
    }

    if plan.items.len() > 4096 {
        issues.push(MissionIssue {
            code: "plan.too_many_items".to_string(),
            message: "mission exceeds maximum supported item count (4096)".to_string(),
            seq: None,
            severity: IssueSeverity::Error,
        });
    }

    for (expected, item) in plan.items.iter().enumerate() {
        let expected_seq = expected as u16;
        if item.seq != expected_seq {
            issues.push(MissionIssue {
                code: "plan.non_contiguous_sequence".to_string(),
                message: format!("expected sequence {expected_seq} but found {}", item.seq),
                seq: Some(item.seq),
                severity: IssueSeverity::Error,
            });
        }

        if item.params.iter().any(|p| !p.is_finite()) {
            issues.push(MissionIssue {
                code: "item.non_finite_value".to_string(),
                message: "params must be finite".to_string(),
                seq: Some(item.seq),
                severity: IssueSeverity::Error,
            });
        }

        if item.command == MAV_CMD_NAV_WAYPOINT && !item.is_coordless() && item.lat.is_none() {
            issues.push(MissionIssue {
                code: "item.missing_coordinates".to_string(),
                message: "NAV_WAYPOINT requires lat/lon".to_string(),
                seq: Some(item.seq),
                severity: IssueSeverity::Error,
            });
        }

        if let Some(lat) = item.lat {
            if !(-90.0..=90.0).contains(&lat) {
                issues.push(MissionIssue {
                    code: "item.latitude_out_of_range".to_string(),
                    message: format!("latitude {lat} is outside [-90, 90]"),
                    seq: Some(item.seq),
                    severity: IssueSeverity::Error,
                });
            }
        }
        if let Some(lon) = item.lon {
            if !(-180.0..=180.0).contains(&lon) {
                issues.push(MissionIssue {
                    code: "item.longitude_out_of_range".to_string(),
                    message: format!("longitude {lon} is outside [-180, 180]"),
                    seq: Some(item.seq),
                    severity: IssueSeverity::Error,
                });
            }
        }
    }

    issues
}

/// Build the wire item sequence for upload: home prefix per spec 4.7 step 1,
/// then the plan items re-sequenced to follow it. Mirrors the "home-prefix"
/// translation the original backend performs immediately before the MAVLink
/// handshake.
pub fn items_for_wire_upload(plan: &MissionPlan) -> Vec<MissionItem> {
    let mut wire = Vec::with_capacity(plan.items.len() + 1);
    let has_home = matches!(plan.home, Some(home) if home.latitude_deg.abs() > 1e-7 && home.longitude_deg.abs() > 1e-7);

    if has_home {
        wire.push(plan.home.expect("checked above").to_mission_item());
    }

    let start_seq = if has_home { 1 } else { 0 };
    for (i, item) in plan.items.iter().enumerate() {
        wire.push(MissionItem {
            seq: start_seq + i as u16,
            ..item.clone()
        });
    }
    wire
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item(seq: u16) -> MissionItem {
        MissionItem {
            seq,
            command: 16,
            frame: MAV_FRAME_GLOBAL_RELATIVE_ALT,
            current: seq == 0,
            auto_continue: true,
            params: [0.0, 0.0, 0.0, 0.0, 55.0, 37.0, 30.0],
            lat: Some(55.0),
            lon: Some(37.0),
            alt: Some(30.0),
        }
    }

    #[test]
    fn detects_non_contiguous_sequence() {
        let plan = MissionPlan {
            mission_type: MissionType::Mission,
            home: None,
            items: vec![sample_item(0), sample_item(2)],
        };
        let issues = validate_plan(&plan);
        assert!(issues
            .iter()
            .any(|issue| issue.code == "plan.non_contiguous_sequence"));
    }

    #[test]
    fn detects_out_of_range_and_nan() {
        let mut item = sample_item(0);
        item.lat = Some(999.0);
        item.params[0] = f32::NAN;
        let plan = MissionPlan {
            mission_type: MissionType::Mission,
            home: None,
            items: vec![item],
        };
        let issues = validate_plan(&plan);
        assert!(issues
            .iter()
            .any(|issue| issue.code == "item.latitude_out_of_range"));
        assert!(issues
            .iter()
            .any(|issue| issue.code == "item.non_finite_value"));
    }

    #[test]
    fn detects_missing_waypoint_coordinates() {
        let mut item = sample_item(0);
        item.lat = None;
        item.lon = None;
        let plan = MissionPlan {
            mission_type: MissionType::Mission,
            home: None,
            items: vec![item],
        };
        let issues = validate_plan(&plan);
        assert!(issues
            .iter()
            .any(|issue| issue.code == "item.missing_coordinates"));
    }

    #[test]
    fn wire_upload_prepends_home() {
        let plan = MissionPlan {
            mission_type: MissionType::Mission,
            home: Some(HomePosition {
                latitude_deg: 47.397742,
                longitude_deg: 8.545594,
                altitude_m: 100.0,
            }),
            items: vec![sample_item(0), sample_item(1)],
        };
        let wire = items_for_wire_upload(&plan);
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[0].seq, 0);
        assert_eq!(wire[0].command, MAV_CMD_NAV_WAYPOINT);
        assert_eq!(wire[1].seq, 1);
        assert_eq!(wire[2].seq, 2);
    }

    #[test]
    fn wire_upload_no_home_keeps_original_sequence() {
        let plan = MissionPlan {
            mission_type: MissionType::Mission,
            home: None,
            items: vec![sample_item(0)],
        };
        let wire = items_for_wire_upload(&plan);
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0].seq, 0);
    }

    #[test]
    fn wire_upload_zero_home_is_treated_as_absent() {
        let plan = MissionPlan {
            mission_type: MissionType::Mission,
            home: Some(HomePosition {
                latitude_deg: 0.0,
                longitude_deg: 0.0,
                altitude_m: 0.0,
            }),
            items: vec![sample_item(0)],
        };
        let wire = items_for_wire_upload(&plan);
        assert_eq!(wire.len(), 1);
    }
}
