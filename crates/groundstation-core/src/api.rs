use crate::config::GcsConfig;
use crate::error::CoreError;
use crate::flight::{self, VehicleIdentity};
use crate::mission_exec;
use crate::registry::{MissionPhase, MissionStatus, Registry, UavRecord};
use crate::{discovery, heartbeat, telemetry};
use mission_core::{parse_plan, HomePosition, MissionItem, MissionPlan, MissionType};
use std::thread;
use tracing::{error, info};

const COORD_EPSILON: f64 = 1e-7;

/// Transport-agnostic facade: the only surface an HTTP layer (out of scope
/// here) would call into.
pub struct GroundControl {
    config: GcsConfig,
    registry: Registry,
}

impl GroundControl {
    pub fn new(config: GcsConfig) -> Self {
        Self {
            registry: Registry::new(),
            config,
        }
    }

    /// Spawns the Heartbeat Monitor. Call once at startup.
    pub fn start_background_tasks(&self) {
        heartbeat::spawn(
            self.registry.clone(),
            self.config.heartbeat_sweep_interval(),
            self.config.heartbeat_stale_timeout(),
        );
    }

    pub fn discover(&self, ports: Option<&[u16]>) -> Vec<String> {
        discovery::discover(&self.config, &self.registry, ports)
    }

    pub fn list_uavs(&self) -> Vec<UavRecord> {
        self.registry.snapshot_all()
    }

    pub fn refresh(&self) -> Vec<UavRecord> {
        self.registry.snapshot_all()
    }

    pub fn get_mission(&self, uav_id: &str) -> Result<Vec<MissionItem>, CoreError> {
        Ok(self.registry.get(uav_id)?.mission)
    }

    pub fn set_mission(&self, uav_id: &str, items: Vec<MissionItem>) -> Result<(), CoreError> {
        self.registry.update(uav_id, |record| record.mission = items)
    }

    /// Parses a `.plan` document, caches it, and returns `(items, waypoints)`.
    /// Prepends the UAV's current position to `waypoints` when it is
    /// non-zero and distinct from the first parsed waypoint.
    pub fn upload_plan(
        &self,
        uav_id: &str,
        plan_json: &serde_json::Value,
    ) -> Result<(Vec<MissionItem>, Vec<[f64; 2]>), CoreError> {
        let record = self.registry.get(uav_id)?;
        let parsed = parse_plan(plan_json)?;

        let mut waypoints = parsed.waypoints.clone();
        let current = [record.lat, record.lon];
        let is_zero = current[0].abs() <= COORD_EPSILON && current[1].abs() <= COORD_EPSILON;
        let is_distinct = waypoints
            .first()
            .map(|first| (first[0] - current[0]).abs() > COORD_EPSILON || (first[1] - current[1]).abs() > COORD_EPSILON)
            .unwrap_or(true);
        if !is_zero && is_distinct {
            waypoints.insert(0, current);
        }

        self.registry.update(uav_id, |record| {
            record.mission = parsed.items.clone();
            record.plan_raw = Some(plan_json.clone());
            record.mission_total = parsed.items.len() as u16;
        })?;

        Ok((parsed.items, waypoints))
    }

    /// Rejects with `MissionInProgress` if a sequence is already running;
    /// otherwise runs Mission Transfer then the Flight Director sequence
    /// under the arbiter, in a background thread.
    pub fn start_mission(&self, uav_id: &str, takeoff_altitude: Option<f64>) -> Result<(), CoreError> {
        let record = self.registry.get(uav_id)?;
        if matches!(record.mission_status, MissionStatus::Starting | MissionStatus::Running) {
            return Err(CoreError::MissionInProgress);
        }
        if record.mission.is_empty() {
            return Err(CoreError::MissionEmpty);
        }

        let altitude = takeoff_altitude.unwrap_or(self.config.default_takeoff_altitude_m) as f32;
        let home = home_from_record(&record, altitude);
        let plan = MissionPlan {
            mission_type: MissionType::Mission,
            home,
            items: record.mission.clone(),
        };

        self.registry.update(uav_id, |record| {
            record.mission_status = MissionStatus::Starting;
            record.mission_phase = Some(MissionPhase::Uploading);
        })?;

        let registry = self.registry.clone();
        let uav_id = uav_id.to_string();
        thread::spawn(move || run_start_sequence(registry, uav_id, plan));
        Ok(())
    }

    pub fn stop_mission(&self, uav_id: &str) -> Result<(), CoreError> {
        let record = self.registry.get(uav_id)?;
        let target = self.registry.with_link(uav_id, |link| link.target())?;
        let identity = identity_from_record(&record, target);

        self.registry.update(uav_id, |record| record.mission_comm_lock = true)?;
        let result = self.registry.with_link(uav_id, |link| flight::stop_mission(link, &identity));
        self.registry.update(uav_id, |record| record.mission_comm_lock = false)?;

        result??;

        self.registry.update(uav_id, |record| {
            record.mission_status = MissionStatus::Stopped;
            record.mission_phase = Some(MissionPhase::Stopped);
        })
    }

    /// Pauses or resumes the Telemetry Reader for one UAV without touching
    /// the arbiter.
    pub fn set_telemetry_enabled(&self, uav_id: &str, enabled: bool) -> Result<(), CoreError> {
        self.registry.update(uav_id, |record| record.telemetry_enabled = enabled)
    }

    pub fn disconnect(&self, uav_id: &str) -> Result<(), CoreError> {
        self.registry.disconnect(uav_id)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

fn home_from_record(record: &UavRecord, altitude_m: f32) -> Option<HomePosition> {
    if record.lat.abs() <= COORD_EPSILON && record.lon.abs() <= COORD_EPSILON {
        return None;
    }
    Some(HomePosition {
        latitude_deg: record.lat,
        longitude_deg: record.lon,
        altitude_m,
    })
}

/// `target` is the `(system_id, component_id)` the link last saw on an
/// incoming frame (`Link::target`); falls back to the vehicle's own
/// system/component 1/1 before any frame has been received.
fn identity_from_record(record: &UavRecord, target: Option<(u8, u8)>) -> VehicleIdentity {
    let (target_system, target_component) = target.unwrap_or((1, 1));
    VehicleIdentity {
        target_system,
        target_component,
        autopilot: flight::autopilot_from_raw(record.autopilot),
        mavtype: flight::mavtype_from_raw(record.mavtype),
    }
}

/// Runs under the arbiter: sets `mission_comm_lock`, guarantees release on
/// every exit path, updates `mission_status`/`mission_phase` to reflect the
/// outcome.
fn run_start_sequence(registry: Registry, uav_id: String, plan: MissionPlan) {
    let outcome = (|| -> Result<(), CoreError> {
        let record = registry.get(&uav_id)?;
        let target = registry.with_link(&uav_id, |link| link.target())?;
        let identity = identity_from_record(&record, target);
        let wire_items = mission_core::items_for_wire_upload(&plan);

        registry.update(&uav_id, |record| record.mission_comm_lock = true)?;
        let result = registry.with_link(&uav_id, |link| -> Result<(), CoreError> {
            mission_exec::run_upload(link, identity.target_system, identity.target_component, plan.mission_type, &wire_items)
                .map_err(|err| CoreError::ProtocolViolation(format!("upload_error: {err}")))?;
            flight::start_sequence(link, &identity)?;
            Ok(())
        });
        registry.update(&uav_id, |record| record.mission_comm_lock = false)?;
        result?
    })();

    match outcome {
        Ok(()) => {
            info!(uav_id, "mission start sequence completed");
            let _ = registry.update(&uav_id, |record| {
                record.mission_status = MissionStatus::Running;
                record.mission_phase = Some(MissionPhase::InProgress);
            });
        }
        Err(err) => {
            error!(uav_id, error = %err, "mission start sequence failed");
            let _ = registry.update(&uav_id, |record| {
                record.mission_status = MissionStatus::Error;
                record.mission_phase = Some(phase_for_error(&err));
            });
        }
    }
}

/// `ProtocolTimeout` only reaches here unwrapped from `flight::start_sequence`
/// (`mission_exec::run_upload`'s timeout is wrapped into an `upload_error:`
/// `ProtocolViolation` at its call site above, matching `mode_error:`/
/// `arm_error:`/`mode_auto_error:`), so a bare timeout here is a
/// Flight-Director timeout, not an upload one.
fn phase_for_error(err: &CoreError) -> MissionPhase {
    match err {
        CoreError::ProtocolTimeout(_) => MissionPhase::Timeout,
        CoreError::ProtocolViolation(message) if message.starts_with("mode_error") => MissionPhase::ModeError,
        CoreError::ProtocolViolation(message) if message.starts_with("arm_error") => MissionPhase::ArmError,
        CoreError::ProtocolViolation(message) if message.starts_with("mode_auto_error") => MissionPhase::ModeAutoError,
        CoreError::ProtocolViolation(message) if message.starts_with("upload_error") => MissionPhase::UploadError,
        CoreError::ProtocolViolation(_) => MissionPhase::UploadError,
        _ => MissionPhase::Exception,
    }
}
