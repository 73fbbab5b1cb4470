use crate::{HomePosition, MissionError, MissionItem, MAV_FRAME_GLOBAL_RELATIVE_ALT};
use serde_json::Value;

/// Output of parsing a QGroundControl `.plan` document: the flat mission
/// items ready for the registry, the `[lat, lon]` pairs for map rendering,
/// and the home position if the document carried one.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPlan {
    pub items: Vec<MissionItem>,
    pub waypoints: Vec<[f64; 2]>,
    pub home: Option<HomePosition>,
}

const COORD_EPSILON: f64 = 1e-7;

fn is_zero_coord(lat: f64, lon: f64) -> bool {
    lat.abs() <= COORD_EPSILON && lon.abs() <= COORD_EPSILON
}

fn home_is_valid(home: &HomePosition) -> bool {
    home.latitude_deg.abs() > COORD_EPSILON && home.longitude_deg.abs() > COORD_EPSILON
}

fn parse_home(mission: &Value) -> Option<HomePosition> {
    let raw = mission.get("plannedHomePosition")?.as_array()?;
    if raw.len() < 2 {
        return None;
    }
    let lat = raw[0].as_f64()?;
    let lon = raw[1].as_f64()?;
    let alt = raw.get(2).and_then(Value::as_f64).unwrap_or(0.0) as f32;
    Some(HomePosition {
        latitude_deg: lat,
        longitude_deg: lon,
        altitude_m: alt,
    })
}

fn params_array(item: &Value) -> [f32; 7] {
    let mut params = [0.0f32; 7];
    if let Some(raw) = item.get("params").and_then(Value::as_array) {
        for (i, slot) in params.iter_mut().enumerate() {
            if let Some(value) = raw.get(i).and_then(Value::as_f64) {
                *slot = value as f32;
            }
        }
    }
    params
}

/// Parses a `.plan` JSON document into mission items and map waypoints
/// per the QGC SimpleItem translation rules.
pub fn parse_plan(doc: &Value) -> Result<ParsedPlan, MissionError> {
    let mission = doc
        .get("mission")
        .ok_or(MissionError::MissingField("mission"))?;
    let raw_items = mission
        .get("items")
        .and_then(Value::as_array)
        .ok_or(MissionError::MissingField("mission.items"))?;

    let home = parse_home(mission);

    let mut items = Vec::with_capacity(raw_items.len());
    let mut waypoints = Vec::new();
    let mut need_return_home = false;

    for (position, raw) in raw_items.iter().enumerate() {
        let item_type = raw.get("type").and_then(Value::as_str).unwrap_or("");
        if item_type != "SimpleItem" {
            continue;
        }

        let command = raw
            .get("command")
            .and_then(Value::as_u64)
            .ok_or(MissionError::MissingField("mission.items[].command"))? as u16;
        let frame = raw
            .get("frame")
            .and_then(Value::as_u64)
            .map(|f| f as u8)
            .unwrap_or(MAV_FRAME_GLOBAL_RELATIVE_ALT);
        let auto_continue = raw
            .get("autoContinue")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let seq = raw
            .get("doJumpId")
            .and_then(Value::as_u64)
            .map(|v| v as u16)
            .unwrap_or(position as u16);

        let params = params_array(raw);
        let lat_candidate = params[4] as f64;
        let lon_candidate = params[5] as f64;
        let alt_candidate = if params[6] != 0.0 {
            params[6]
        } else {
            raw.get("Altitude")
                .and_then(Value::as_f64)
                .map(|v| v as f32)
                .unwrap_or(params[6])
        };

        let coords_present = !is_zero_coord(lat_candidate, lon_candidate);

        let (lat, lon, alt) = if coords_present {
            waypoints.push([lat_candidate, lon_candidate]);
            (Some(lat_candidate), Some(lon_candidate), Some(alt_candidate))
        } else {
            if matches!(command, 20 | 82) {
                need_return_home = true;
            }
            (None, None, None)
        };

        items.push(MissionItem {
            seq,
            command,
            frame,
            current: false,
            auto_continue,
            params,
            lat,
            lon,
            alt,
        });
    }

    if need_return_home {
        if let Some(home) = home {
            if home_is_valid(&home) {
                let differs = match waypoints.last() {
                    Some(last) => {
                        (last[0] - home.latitude_deg).abs() > COORD_EPSILON
                            || (last[1] - home.longitude_deg).abs() > COORD_EPSILON
                    }
                    None => false,
                };
                if !waypoints.is_empty() && differs {
                    waypoints.push([home.latitude_deg, home.longitude_deg]);
                }
            }
        }
    }

    Ok(ParsedPlan {
        items,
        waypoints,
        home,
    })
}
