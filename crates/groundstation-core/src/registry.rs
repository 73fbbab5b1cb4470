use crate::error::CoreError;
use crate::link::Link;
use mission_core::MissionItem;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    Idle,
    Starting,
    Running,
    Completed,
    Stopped,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissionPhase {
    Uploading,
    InProgress,
    Completed,
    Stopped,
    UploadError,
    ModeError,
    ArmError,
    ModeAutoError,
    Exception,
    Timeout,
}

/// One connected vehicle. Fields here mirror spec 3 exactly; everything
/// that is not identity flows through `Registry::update`, never a direct
/// field write, so the registry mutex stays the single source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UavRecord {
    pub uav_id: String,
    pub name: String,
    pub port: u16,

    pub connected: bool,
    pub status: LinkStatus,
    pub last_heartbeat: Option<u64>,
    /// Raw `MAV_TYPE`/`MAV_AUTOPILOT` codes from the last heartbeat, used to
    /// pick a mode table in `modes.rs`. Kept as wire codes rather than the
    /// mavlink crate's enum types so the record stays plain-old-data.
    pub mavtype: u8,
    pub autopilot: u8,

    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    pub heading: f64,

    pub ground_speed: f64,

    pub gps_fix: u8,
    pub satellites: u8,

    pub battery_percent: Option<u8>,
    pub battery_voltage: Option<f64>,

    pub mission: Vec<MissionItem>,
    pub plan_raw: Option<serde_json::Value>,

    pub mission_status: MissionStatus,
    pub mission_phase: Option<MissionPhase>,
    pub mission_total: u16,
    pub mission_current_seq: i32,
    pub mission_progress: f64,
    pub last_mission_update: Option<u64>,

    pub mission_comm_lock: bool,

    /// Lets a caller pause background polling for this UAV without touching
    /// the arbiter. Defaults to true.
    pub telemetry_enabled: bool,
}

impl UavRecord {
    pub fn new(uav_id: String, name: String, port: u16) -> Self {
        Self {
            uav_id,
            name,
            port,
            connected: true,
            status: LinkStatus::Online,
            last_heartbeat: Some(now_unix_secs()),
            mavtype: 0,
            autopilot: 0,
            lat: 0.0,
            lon: 0.0,
            alt: 0.0,
            heading: 0.0,
            ground_speed: 0.0,
            gps_fix: 0,
            satellites: 0,
            battery_percent: None,
            battery_voltage: None,
            mission: Vec::new(),
            plan_raw: None,
            mission_status: MissionStatus::Idle,
            mission_phase: None,
            mission_total: 0,
            mission_current_seq: -1,
            mission_progress: 0.0,
            last_mission_update: None,
            mission_comm_lock: false,
            telemetry_enabled: true,
        }
    }
}

pub fn now_unix_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

struct RegistryInner {
    records: HashMap<String, UavRecord>,
    links: HashMap<String, Arc<Link>>,
}

/// Process-wide `uav_id -> record` / `uav_id -> Link` mapping behind one mutex.
/// Holding this lock across `recv`/send on a `Link` is forbidden; `with_link`
/// only hands out the `Arc<Link>` clone, it never calls into it.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                records: HashMap::new(),
                links: HashMap::new(),
            })),
        }
    }

    pub fn insert(&self, record: UavRecord, link: Arc<Link>) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        inner.links.insert(record.uav_id.clone(), link);
        inner.records.insert(record.uav_id.clone(), record);
    }

    pub fn remove(&self, uav_id: &str) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        inner.records.remove(uav_id);
        inner.links.remove(uav_id);
    }

    pub fn get(&self, uav_id: &str) -> Result<UavRecord, CoreError> {
        let inner = self.inner.lock().expect("registry lock poisoned");
        inner
            .records
            .get(uav_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(uav_id.to_string()))
    }

    pub fn contains_connected(&self, uav_id: &str) -> bool {
        let inner = self.inner.lock().expect("registry lock poisoned");
        inner
            .records
            .get(uav_id)
            .map(|record| record.connected)
            .unwrap_or(false)
    }

    pub fn link(&self, uav_id: &str) -> Result<Arc<Link>, CoreError> {
        let inner = self.inner.lock().expect("registry lock poisoned");
        inner
            .links
            .get(uav_id)
            .cloned()
            .ok_or_else(|| CoreError::LinkUnavailable(uav_id.to_string()))
    }

    /// Runs `f` against the `Arc<Link>` while the lock is released; only the
    /// clone of the handle happens under the mutex.
    pub fn with_link<F, T>(&self, uav_id: &str, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(&Link) -> T,
    {
        let link = self.link(uav_id)?;
        Ok(f(&link))
    }

    pub fn update<F>(&self, uav_id: &str, patch: F) -> Result<(), CoreError>
    where
        F: FnOnce(&mut UavRecord),
    {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        let record = inner
            .records
            .get_mut(uav_id)
            .ok_or_else(|| CoreError::NotFound(uav_id.to_string()))?;
        patch(record);
        Ok(())
    }

    pub fn snapshot_all(&self) -> Vec<UavRecord> {
        let inner = self.inner.lock().expect("registry lock poisoned");
        let mut records: Vec<UavRecord> = inner.records.values().cloned().collect();
        records.sort_by_key(|record| record.port);
        records
    }

    pub fn disconnect(&self, uav_id: &str) -> Result<(), CoreError> {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        let record = inner
            .records
            .get_mut(uav_id)
            .ok_or_else(|| CoreError::NotFound(uav_id.to_string()))?;
        record.connected = false;
        record.status = LinkStatus::Offline;
        if let Some(link) = inner.links.remove(uav_id) {
            link.close();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::mock_link;

    #[test]
    fn snapshot_all_is_sorted_by_port_and_independent_copy() {
        let registry = Registry::new();
        let link_a = Arc::new(mock_link(vec![]));
        let link_b = Arc::new(mock_link(vec![]));
        registry.insert(UavRecord::new("uav_14560".into(), "b".into(), 14560), link_a);
        registry.insert(UavRecord::new("uav_14550".into(), "a".into(), 14550), link_b);

        let snapshot = registry.snapshot_all();
        assert_eq!(snapshot[0].port, 14550);
        assert_eq!(snapshot[1].port, 14560);

        registry
            .update("uav_14550", |record| record.lat = 10.0)
            .unwrap();
        assert_eq!(snapshot[0].lat, 0.0, "snapshot must not see later mutations");
    }

    #[test]
    fn get_missing_uav_is_not_found() {
        let registry = Registry::new();
        assert!(matches!(registry.get("uav_99999"), Err(CoreError::NotFound(_))));
    }

    #[test]
    fn disconnect_marks_offline_and_drops_link() {
        let registry = Registry::new();
        let link = Arc::new(mock_link(vec![]));
        registry.insert(UavRecord::new("uav_14550".into(), "a".into(), 14550), link);
        registry.disconnect("uav_14550").unwrap();
        let record = registry.get("uav_14550").unwrap();
        assert!(!record.connected);
        assert_eq!(record.status, LinkStatus::Offline);
        assert!(matches!(registry.link("uav_14550"), Err(CoreError::LinkUnavailable(_))));
    }
}
