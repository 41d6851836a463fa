//! Normalization of raw fleet service payloads into the canonical model.
//!
//! The fleet service has shipped two layouts for `/fleet/status`:
//!
//! * an envelope carrying a `robots` array of per-robot objects (or the bare
//!   array itself), see [`RawFleet::ArrayForm`];
//! * an object keyed by robot name whose values hold `status`, `battery`,
//!   `coordinates` and `task` directly, see [`RawFleet::MapForm`].
//!
//! Adaptation never fails. Anything missing is defaulted, anything that
//! cannot be coerced is defaulted too, and each such fill is recorded as a
//! [`DataQualityNote`] next to the adapted value.

use crate::logic::types::{
    FleetStatus, MaintenanceRecord, Position, Robot, RobotDetails, RobotStatus, SensorSnapshot,
    Sensors, Tasks,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

/// Keys that mark an object as the array-form envelope rather than a name-keyed map
const ENVELOPE_KEYS: [&str; 6] = [
    "robots",
    "active_robots",
    "inactive_robots",
    "total_area_covered",
    "battery_levels",
    "constraints",
];

const SENSOR_KEYS: [&str; 4] = ["soil_moisture", "temperature", "crop_health", "soil_ph"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    MissingField,
    Uncoercible,
    UnknownStatus,
    BatteryOutOfRange,
    SynthesizedId,
    DuplicateId,
    SkippedEntry,
    IdMismatch,
    CountMismatch,
    BatteryLevelsMismatch,
    UnrecognizedShape,
}

impl NoteKind {
    /// Whether the note points at bad upstream data rather than a plain default fill
    pub fn is_anomaly(&self) -> bool {
        !matches!(self, NoteKind::MissingField | NoteKind::SynthesizedId)
    }
}

/// A default fill or inconsistency noticed while adapting a payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataQualityNote {
    pub kind: NoteKind,
    pub robot_id: Option<String>,
    pub detail: String,
}

impl fmt::Display for DataQualityNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.robot_id {
            Some(id) => write!(f, "[{}] {:?}: {}", id, self.kind, self.detail),
            None => write!(f, "{:?}: {}", self.kind, self.detail),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Adapted<T> {
    pub value: T,
    pub notes: Vec<DataQualityNote>,
}

/// The payload layouts the fleet endpoint is known to produce
#[derive(Debug, Clone, Copy)]
pub enum RawFleet<'a> {
    /// Per-robot objects, optionally wrapped in an envelope with aggregate fields
    ArrayForm {
        robots: &'a [Value],
        envelope: Option<&'a Map<String, Value>>,
    },
    /// Robot name -> flattened robot fields
    MapForm(&'a Map<String, Value>),
    Unrecognized,
}

impl<'a> RawFleet<'a> {
    pub fn detect(raw: &'a Value) -> Self {
        match raw {
            Value::Array(items) => RawFleet::ArrayForm {
                robots: items.as_slice(),
                envelope: None,
            },
            Value::Object(map) if ENVELOPE_KEYS.iter().any(|k| map.contains_key(*k)) => {
                let robots = match map.get("robots") {
                    Some(Value::Array(items)) => items.as_slice(),
                    _ => &[],
                };
                RawFleet::ArrayForm {
                    robots,
                    envelope: Some(map),
                }
            }
            Value::Object(map) => RawFleet::MapForm(map),
            _ => RawFleet::Unrecognized,
        }
    }
}

/// Where a robot object came from; decides id fallbacks and which gaps are worth noting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin<'k> {
    Listed(usize),
    Keyed(&'k str),
    Detail,
}

struct Notes {
    notes: Vec<DataQualityNote>,
}

impl Notes {
    fn new() -> Self {
        Self { notes: Vec::new() }
    }

    fn push(&mut self, kind: NoteKind, robot_id: Option<&str>, detail: impl Into<String>) {
        self.notes.push(DataQualityNote {
            kind,
            robot_id: robot_id.map(str::to_string),
            detail: detail.into(),
        });
    }

    fn finish<T>(self, value: T) -> Adapted<T> {
        for note in &self.notes {
            if note.kind.is_anomaly() {
                warn!(%note, "fleet payload data-quality issue");
            } else {
                debug!(%note, "filled missing field");
            }
        }
        Adapted {
            value,
            notes: self.notes,
        }
    }
}

/// Field reader bound to one robot for note attribution
struct Fields<'n> {
    notes: &'n mut Notes,
    robot: Option<String>,
}

impl<'n> Fields<'n> {
    fn note(&mut self, kind: NoteKind, detail: impl Into<String>) {
        self.notes.push(kind, self.robot.as_deref(), detail);
    }

    fn string(&mut self, obj: &Map<String, Value>, key: &str, note_missing: bool) -> String {
        match obj.get(key) {
            Some(value) => match coerce_string(value) {
                Some(s) => s,
                None => {
                    if !value.is_null() || note_missing {
                        self.note(NoteKind::Uncoercible, format!("`{}` is not a string: {}", key, value));
                    }
                    String::new()
                }
            },
            None => {
                if note_missing {
                    self.note(NoteKind::MissingField, format!("`{}` absent", key));
                }
                String::new()
            }
        }
    }

    fn number(&mut self, obj: &Map<String, Value>, key: &str, note_missing: bool) -> f64 {
        match obj.get(key) {
            Some(value) => match coerce_number(value) {
                Some(n) => n,
                None => {
                    self.note(NoteKind::Uncoercible, format!("`{}` is not numeric: {}", key, value));
                    0.0
                }
            },
            None => {
                if note_missing {
                    self.note(NoteKind::MissingField, format!("`{}` absent, using 0", key));
                }
                0.0
            }
        }
    }

    fn optional_number(&mut self, obj: &Map<String, Value>, key: &str) -> Option<f64> {
        match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => {
                let n = coerce_number(value);
                if n.is_none() {
                    self.note(NoteKind::Uncoercible, format!("`{}` is not numeric: {}", key, value));
                }
                n
            }
        }
    }

    fn string_list(&mut self, value: &Value, key: &str) -> Vec<String> {
        match value {
            Value::Array(items) => items
                .iter()
                .filter_map(|item| {
                    let s = coerce_string(item);
                    if s.is_none() {
                        self.note(NoteKind::SkippedEntry, format!("non-text entry in `{}`: {}", key, item));
                    }
                    s
                })
                .collect(),
            Value::Null => Vec::new(),
            other => {
                self.note(NoteKind::Uncoercible, format!("`{}` is not a list: {}", key, other));
                Vec::new()
            }
        }
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn timestamp(observed_at: DateTime<Utc>) -> String {
    observed_at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn resolve_id(obj: &Map<String, Value>, origin: Origin<'_>, notes: &mut Notes) -> String {
    let own = obj.get("id").and_then(coerce_string).filter(|s| !s.is_empty());
    if let Origin::Keyed(key) = origin {
        if let Some(own) = own.filter(|own| own != key) {
            notes.push(
                NoteKind::IdMismatch,
                Some(key),
                format!("entry carries id `{}`, keeping map key", own),
            );
        }
        return key.to_string();
    }
    if let Some(id) = own {
        return id;
    }
    match origin {
        Origin::Keyed(key) => key.to_string(),
        Origin::Detail => String::new(),
        Origin::Listed(index) => {
            let id = obj
                .get("name")
                .and_then(coerce_string)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("robot-{}", index));
            notes.push(NoteKind::SynthesizedId, Some(id.as_str()), format!("robot #{} has no id", index));
            id
        }
    }
}

fn adapt_robot(
    obj: &Map<String, Value>,
    origin: Origin<'_>,
    observed_at: DateTime<Utc>,
    notes: &mut Notes,
) -> Robot {
    let id = resolve_id(obj, origin, notes);
    let keyed = matches!(origin, Origin::Keyed(_));
    let mut f = Fields {
        notes,
        robot: Some(id.clone()).filter(|s| !s.is_empty()),
    };

    let name = match (obj.get("name"), origin) {
        (None, Origin::Keyed(key)) => key.to_string(),
        _ => f.string(obj, "name", false),
    };

    let status = match obj.get("status") {
        Some(value) => match value.as_str().and_then(RobotStatus::parse) {
            Some(status) => status,
            None => {
                f.note(NoteKind::UnknownStatus, format!("status {} treated as inactive", value));
                RobotStatus::Inactive
            }
        },
        None => {
            f.note(NoteKind::MissingField, "`status` absent, treated as inactive");
            RobotStatus::Inactive
        }
    };

    let battery = f.number(obj, "battery", true).round() as i64;
    if !(0..=100).contains(&battery) {
        f.note(NoteKind::BatteryOutOfRange, format!("battery reads {}", battery));
    }

    let position = adapt_position(obj, &mut f);
    let sensors = adapt_sensors(obj, !keyed, &mut f);
    let tasks = adapt_tasks(obj, !keyed, &mut f);

    let last_update = match obj.get("last_update").and_then(Value::as_str) {
        Some(ts) => ts.to_string(),
        None => {
            if !keyed {
                f.note(NoteKind::MissingField, "`last_update` absent, using observation time");
            }
            timestamp(observed_at)
        }
    };

    let error_logs = match obj.get("error_logs") {
        None | Some(Value::Null) => None,
        Some(value @ Value::Array(_)) => Some(f.string_list(value, "error_logs")),
        Some(other) => {
            f.note(NoteKind::Uncoercible, format!("`error_logs` is not a list: {}", other));
            None
        }
    };

    Robot {
        id,
        name,
        status,
        battery,
        position,
        sensors,
        tasks,
        last_update,
        error_logs,
    }
}

fn adapt_position(obj: &Map<String, Value>, f: &mut Fields<'_>) -> Position {
    match (obj.get("position"), obj.get("coordinates")) {
        (Some(Value::Object(pos)), _) => Position {
            x: f.number(pos, "x", true),
            y: f.number(pos, "y", true),
        },
        (_, Some(Value::Array(coords))) => {
            let x = coords.first().and_then(coerce_number);
            let y = coords.get(1).and_then(coerce_number);
            if x.is_none() || y.is_none() {
                f.note(NoteKind::Uncoercible, format!("coordinates {:?} are incomplete", coords));
            }
            Position {
                x: x.unwrap_or(0.0),
                y: y.unwrap_or(0.0),
            }
        }
        (Some(other), _) => {
            f.note(NoteKind::Uncoercible, format!("`position` is not an object: {}", other));
            Position::default()
        }
        (None, _) => {
            f.note(NoteKind::MissingField, "no position or coordinates, using origin");
            Position::default()
        }
    }
}

fn adapt_sensors(obj: &Map<String, Value>, note_missing: bool, f: &mut Fields<'_>) -> Sensors {
    // Sensor-data responses may carry the readings at top level.
    let source = match obj.get("sensors") {
        Some(Value::Object(sensors)) => Some(sensors),
        Some(other) => {
            f.note(NoteKind::Uncoercible, format!("`sensors` is not an object: {}", other));
            None
        }
        None if SENSOR_KEYS.iter().any(|k| obj.contains_key(*k)) => Some(obj),
        None => None,
    };

    let Some(src) = source else {
        if note_missing {
            f.note(NoteKind::MissingField, "`sensors` absent, zero-filled");
        }
        return Sensors::default();
    };

    let soil_ph = f.optional_number(src, "soil_ph");
    Sensors {
        soil_moisture: f.number(src, "soil_moisture", true),
        temperature: f.number(src, "temperature", true),
        // Older firmware reports soil_ph in place of crop_health.
        crop_health: f.number(src, "crop_health", soil_ph.is_none()),
        soil_ph,
    }
}

fn adapt_tasks(obj: &Map<String, Value>, note_missing: bool, f: &mut Fields<'_>) -> Tasks {
    match (obj.get("tasks"), obj.get("task")) {
        (Some(Value::Object(tasks)), _) => Tasks {
            current: f.string(tasks, "current", true),
            queue: match tasks.get("queue") {
                Some(queue) => f.string_list(queue, "tasks.queue"),
                None => {
                    f.note(NoteKind::MissingField, "`tasks.queue` absent");
                    Vec::new()
                }
            },
        },
        (_, Some(task)) => Tasks {
            current: coerce_string(task).unwrap_or_default(),
            queue: Vec::new(),
        },
        (Some(other), None) => {
            f.note(NoteKind::Uncoercible, format!("`tasks` is not an object: {}", other));
            Tasks::default()
        }
        (None, None) => {
            if note_missing {
                f.note(NoteKind::MissingField, "`tasks` absent");
            }
            Tasks::default()
        }
    }
}

/// Adapt a raw `/fleet/status` payload using the current time for missing timestamps
pub fn adapt_fleet_data(raw: &Value) -> FleetStatus {
    adapt_fleet_data_at(raw, Utc::now()).value
}

pub fn adapt_fleet_data_at(raw: &Value, observed_at: DateTime<Utc>) -> Adapted<FleetStatus> {
    let mut notes = Notes::new();
    let mut robots: Vec<Robot> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut keep = |robot: Robot, notes: &mut Notes| {
        if seen.insert(robot.id.clone()) {
            robots.push(robot);
        } else {
            notes.push(
                NoteKind::DuplicateId,
                Some(robot.id.as_str()),
                "repeated id dropped, first occurrence kept",
            );
        }
    };

    let shape = RawFleet::detect(raw);
    let envelope = match shape {
        RawFleet::ArrayForm { robots: items, envelope } => {
            if let Some(env) = envelope {
                if let Some(other) = env.get("robots").filter(|v| !v.is_array()) {
                    notes.push(NoteKind::Uncoercible, None, format!("`robots` is not a list: {}", other));
                }
            }
            for (index, item) in items.iter().enumerate() {
                match item {
                    Value::Object(obj) => {
                        let robot = adapt_robot(obj, Origin::Listed(index), observed_at, &mut notes);
                        keep(robot, &mut notes);
                    }
                    other => notes.push(
                        NoteKind::SkippedEntry,
                        None,
                        format!("robot #{} is not an object: {}", index, other),
                    ),
                }
            }
            envelope
        }
        RawFleet::MapForm(map) => {
            for (key, value) in map {
                match value {
                    Value::Object(obj) => {
                        let robot = adapt_robot(obj, Origin::Keyed(key), observed_at, &mut notes);
                        keep(robot, &mut notes);
                    }
                    other => notes.push(
                        NoteKind::SkippedEntry,
                        Some(key.as_str()),
                        format!("entry is not an object: {}", other),
                    ),
                }
            }
            None
        }
        RawFleet::Unrecognized => {
            notes.push(
                NoteKind::UnrecognizedShape,
                None,
                format!("fleet payload is neither a list nor an object: {}", raw),
            );
            None
        }
    };

    let active_robots = robots
        .iter()
        .filter(|r| r.status == RobotStatus::Active)
        .count();
    let inactive_robots = robots.len() - active_robots;
    let battery_levels: BTreeMap<String, i64> = robots
        .iter()
        .map(|r| (r.id.clone(), r.battery))
        .collect();

    let mut total_area_covered = None;
    let mut constraints: Vec<String> = Vec::new();

    if let Some(env) = envelope {
        let reported_active = env.get("active_robots").and_then(coerce_number);
        let reported_inactive = env.get("inactive_robots").and_then(coerce_number);
        let disagrees = |reported: Option<f64>, derived: usize| {
            reported.map_or(false, |n| n.round() as i64 != derived as i64)
        };
        if disagrees(reported_active, active_robots) || disagrees(reported_inactive, inactive_robots) {
            notes.push(
                NoteKind::CountMismatch,
                None,
                format!(
                    "reported {:?} active / {:?} inactive, derived {} / {} from {} robots",
                    reported_active,
                    reported_inactive,
                    active_robots,
                    inactive_robots,
                    robots.len()
                ),
            );
        }

        if let Some(Value::Object(reported)) = env.get("battery_levels") {
            let matches = reported.len() == battery_levels.len()
                && reported.iter().all(|(id, level)| {
                    let level = coerce_number(level).map(|n| n.round() as i64);
                    battery_levels.get(id).copied() == level
                });
            if !matches {
                notes.push(
                    NoteKind::BatteryLevelsMismatch,
                    None,
                    "reported battery_levels differ from per-robot battery, using per-robot values",
                );
            }
        }

        total_area_covered = match env.get("total_area_covered") {
            None | Some(Value::Null) => None,
            Some(value) => {
                let area = coerce_number(value);
                if area.is_none() {
                    notes.push(
                        NoteKind::Uncoercible,
                        None,
                        format!("`total_area_covered` is not numeric: {}", value),
                    );
                }
                area
            }
        };

        match env.get("constraints") {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                for item in items {
                    match item.as_str() {
                        Some(label) if !constraints.iter().any(|c| c == label) => {
                            constraints.push(label.to_string())
                        }
                        Some(_) => {}
                        None => notes.push(
                            NoteKind::SkippedEntry,
                            None,
                            format!("non-text constraint dropped: {}", item),
                        ),
                    }
                }
            }
            Some(other) => notes.push(
                NoteKind::Uncoercible,
                None,
                format!("`constraints` is not a list: {}", other),
            ),
        }
    }

    notes.finish(FleetStatus {
        active_robots,
        inactive_robots,
        total_area_covered,
        battery_levels,
        robots,
        constraints,
    })
}

/// Adapt a merged status + sensor-data payload using the current time for missing timestamps
pub fn adapt_robot_details(raw: &Value) -> RobotDetails {
    adapt_robot_details_at(raw, Utc::now()).value
}

pub fn adapt_robot_details_at(raw: &Value, observed_at: DateTime<Utc>) -> Adapted<RobotDetails> {
    let mut notes = Notes::new();
    let empty = Map::new();
    let obj = match raw {
        Value::Object(obj) => obj,
        other => {
            notes.push(
                NoteKind::UnrecognizedShape,
                None,
                format!("robot payload is not an object: {}", other),
            );
            &empty
        }
    };

    let robot = adapt_robot(obj, Origin::Detail, observed_at, &mut notes);
    let mut f = Fields {
        notes: &mut notes,
        robot: Some(robot.id.clone()).filter(|s| !s.is_empty()),
    };

    let coverage_area = f.number(obj, "coverage_area", true);
    let uptime = f.number(obj, "uptime", true);

    let maintenance_history = object_entries(obj, "maintenance_history", &mut f)
        .into_iter()
        .map(|entry| MaintenanceRecord {
            date: f.string(entry, "date", true),
            issue: f.string(entry, "issue", true),
            resolution: f.string(entry, "resolution", true),
        })
        .collect();

    let sensor_history = object_entries(obj, "sensor_history", &mut f)
        .into_iter()
        .map(|entry| {
            let soil_ph = f.optional_number(entry, "soil_ph");
            SensorSnapshot {
                timestamp: f.string(entry, "timestamp", true),
                soil_moisture: f.number(entry, "soil_moisture", true),
                temperature: f.number(entry, "temperature", true),
                crop_health: f.number(entry, "crop_health", soil_ph.is_none()),
                soil_ph,
            }
        })
        .collect();

    notes.finish(RobotDetails {
        robot,
        coverage_area,
        uptime,
        maintenance_history,
        sensor_history,
    })
}

/// Object entries of a list field, in source order; anything else is skipped
fn object_entries<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    f: &mut Fields<'_>,
) -> Vec<&'a Map<String, Value>> {
    match obj.get(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let entry = item.as_object();
                if entry.is_none() {
                    f.note(NoteKind::SkippedEntry, format!("non-object entry in `{}`: {}", key, item));
                }
                entry
            })
            .collect(),
        Some(other) => {
            f.note(NoteKind::Uncoercible, format!("`{}` is not a list: {}", key, other));
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn observed() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn kinds(notes: &[DataQualityNote]) -> Vec<NoteKind> {
        notes.iter().map(|n| n.kind).collect()
    }

    fn listed_payload() -> Value {
        json!({
            "active_robots": 1,
            "inactive_robots": 1,
            "total_area_covered": 1250,
            "battery_levels": {"SB001": 85, "SB002": 23},
            "robots": [
                {
                    "id": "SB001",
                    "name": "AgriBot 1",
                    "status": "active",
                    "battery": 85,
                    "position": {"x": 120, "y": 80},
                    "sensors": {"soil_moisture": 72, "temperature": 24.5, "crop_health": 89},
                    "tasks": {"current": "Soil moisture analysis in Zone B", "queue": ["Return to charging station"]},
                    "last_update": "2024-05-01T11:58:00.000Z"
                },
                {
                    "id": "SB002",
                    "name": "AgriBot 2",
                    "status": "maintenance",
                    "battery": 23,
                    "position": {"x": 220, "y": 160},
                    "sensors": {"soil_moisture": 68, "temperature": 25.2, "crop_health": 75},
                    "tasks": {"current": "Sensor calibration", "queue": []},
                    "last_update": "2024-05-01T11:00:00.000Z",
                    "error_logs": ["moisture probe drift"]
                }
            ],
            "constraints": ["Limited Communication", "Sensor Failures & Redundancy"]
        })
    }

    #[test]
    fn test_keyed_shape_synthesizes_robot() {
        let raw = json!({"SB1": {"status": "active", "battery": 50, "coordinates": [1, 2], "task": "scan"}});
        let adapted = adapt_fleet_data_at(&raw, observed());
        let fleet = adapted.value;

        assert_eq!(fleet.robots.len(), 1);
        let robot = &fleet.robots[0];
        assert_eq!(robot.id, "SB1");
        assert_eq!(robot.name, "SB1");
        assert_eq!(robot.status, RobotStatus::Active);
        assert_eq!(robot.battery, 50);
        assert_eq!(robot.position, Position { x: 1.0, y: 2.0 });
        assert_eq!(robot.tasks, Tasks { current: "scan".into(), queue: vec![] });
        assert_eq!(robot.sensors, Sensors::default());
        assert_eq!(robot.last_update, "2024-05-01T12:00:00.000Z");
        assert_eq!(fleet.active_robots, 1);
        assert_eq!(fleet.inactive_robots, 0);
        assert_eq!(fleet.total_area_covered, None);
        assert_eq!(fleet.battery_levels.get("SB1"), Some(&50));
        assert!(fleet.constraints.is_empty());
        assert!(adapted.notes.is_empty(), "unexpected notes: {:?}", adapted.notes);
    }

    #[test]
    fn test_keyed_shape_prefers_map_key_over_entry_id() {
        let raw = json!({
            "SB1": {"id": "SB9", "status": "active", "battery": 50},
            "SB2": {"id": "SB2", "status": "inactive", "battery": 40}
        });
        let adapted = adapt_fleet_data_at(&raw, observed());

        let ids: Vec<&str> = adapted.value.robots.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["SB1", "SB2"]);
        let mismatches: Vec<&DataQualityNote> = adapted
            .notes
            .iter()
            .filter(|n| n.kind == NoteKind::IdMismatch)
            .collect();
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].robot_id.as_deref(), Some("SB1"));
    }

    #[test]
    fn test_listed_shape_passes_fields_through() {
        let adapted = adapt_fleet_data_at(&listed_payload(), observed());
        let fleet = adapted.value;

        assert_eq!(fleet.robots.len(), 2);
        assert_eq!(fleet.active_robots, 1);
        assert_eq!(fleet.inactive_robots, 1);
        assert_eq!(fleet.total_area_covered, Some(1250.0));
        assert_eq!(fleet.constraints.len(), 2);
        assert_eq!(fleet.robots[1].error_logs, Some(vec!["moisture probe drift".to_string()]));
        assert_eq!(fleet.robots[0].error_logs, None);
        assert!(adapted.notes.is_empty(), "unexpected notes: {:?}", adapted.notes);
    }

    #[test]
    fn test_counts_are_derived_and_mismatch_is_reported() {
        let mut raw = listed_payload();
        raw["active_robots"] = json!(2);
        raw["inactive_robots"] = json!(3);
        let adapted = adapt_fleet_data_at(&raw, observed());

        assert_eq!(adapted.value.active_robots, 1);
        assert_eq!(adapted.value.inactive_robots, 1);
        assert!(kinds(&adapted.notes).contains(&NoteKind::CountMismatch));
    }

    #[test]
    fn test_battery_levels_follow_robots() {
        let mut raw = listed_payload();
        raw["battery_levels"] = json!({"SB001": 10, "GHOST": 99});
        let adapted = adapt_fleet_data_at(&raw, observed());

        let levels = &adapted.value.battery_levels;
        assert_eq!(levels.len(), 2);
        assert_eq!(levels["SB001"], 85);
        assert_eq!(levels["SB002"], 23);
        assert!(kinds(&adapted.notes).contains(&NoteKind::BatteryLevelsMismatch));
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let raw = json!({"robots": [
            {"id": "A", "status": "active", "battery": 10},
            {"id": "A", "status": "inactive", "battery": 90},
            {"id": "B", "status": "charging", "battery": 40}
        ]});
        let adapted = adapt_fleet_data_at(&raw, observed());
        let fleet = adapted.value;

        let ids: Vec<&str> = fleet.robots.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert_eq!(fleet.robots[0].battery, 10);
        assert_eq!(fleet.active_robots + fleet.inactive_robots, fleet.robots.len());
        assert!(kinds(&adapted.notes).contains(&NoteKind::DuplicateId));
    }

    #[test]
    fn test_missing_ids_are_synthesized_uniquely() {
        let raw = json!([{"name": "Tiller"}, {}, {}]);
        let fleet = adapt_fleet_data_at(&raw, observed()).value;

        let ids: Vec<&str> = fleet.robots.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["Tiller", "robot-1", "robot-2"]);
        assert_eq!(fleet.inactive_robots, 3);
    }

    #[test]
    fn test_coverage_zero_differs_from_unknown() {
        let reported = adapt_fleet_data(&json!({"robots": [], "total_area_covered": 0}));
        let missing = adapt_fleet_data(&json!({"robots": []}));
        assert_eq!(reported.total_area_covered, Some(0.0));
        assert_eq!(missing.total_area_covered, None);
    }

    #[test]
    fn test_unrecognized_payload_yields_empty_fleet() {
        for raw in [Value::Null, json!(42), json!("down for maintenance")] {
            let adapted = adapt_fleet_data_at(&raw, observed());
            assert_eq!(adapted.value, FleetStatus::default());
            assert_eq!(kinds(&adapted.notes), vec![NoteKind::UnrecognizedShape]);
        }
    }

    #[test]
    fn test_unknown_status_and_out_of_range_battery() {
        let raw = json!({"robots": [{"id": "X", "status": "exploded", "battery": 140}]});
        let adapted = adapt_fleet_data_at(&raw, observed());
        let robot = &adapted.value.robots[0];

        assert_eq!(robot.status, RobotStatus::Inactive);
        assert_eq!(robot.battery, 140);
        assert!(!robot.battery_in_range());
        let kinds = kinds(&adapted.notes);
        assert!(kinds.contains(&NoteKind::UnknownStatus));
        assert!(kinds.contains(&NoteKind::BatteryOutOfRange));
    }

    #[test]
    fn test_partial_nested_objects_are_deep_defaulted() {
        let raw = json!({"robots": [{
            "id": "P",
            "status": "active",
            "battery": "64.6",
            "position": {"x": 3},
            "sensors": {"temperature": "21.5"},
            "tasks": {"current": "weeding"}
        }]});
        let adapted = adapt_fleet_data_at(&raw, observed());
        let robot = &adapted.value.robots[0];

        assert_eq!(robot.battery, 65);
        assert_eq!(robot.position, Position { x: 3.0, y: 0.0 });
        assert_eq!(robot.sensors.temperature, 21.5);
        assert_eq!(robot.sensors.soil_moisture, 0.0);
        assert_eq!(robot.tasks.queue, Vec::<String>::new());
        assert!(adapted.notes.iter().all(|n| n.robot_id.as_deref() == Some("P")));
    }

    #[test]
    fn test_soil_ph_variant_is_kept() {
        let raw = json!({"robots": [{
            "id": "OLD",
            "status": "active",
            "sensors": {"soil_moisture": 60, "temperature": 20, "soil_ph": 6.4}
        }]});
        let adapted = adapt_fleet_data_at(&raw, observed());
        let sensors = &adapted.value.robots[0].sensors;

        assert_eq!(sensors.soil_ph, Some(6.4));
        assert_eq!(sensors.crop_health, 0.0);
        assert!(!adapted
            .notes
            .iter()
            .any(|n| n.detail.contains("crop_health")));
    }

    #[test]
    fn test_constraints_dedupe_and_drop_non_text() {
        let raw = json!({"robots": [], "constraints": ["Rain", 7, "Rain", "Low Signal"]});
        let adapted = adapt_fleet_data_at(&raw, observed());
        assert_eq!(adapted.value.constraints, vec!["Rain", "Low Signal"]);
        assert_eq!(kinds(&adapted.notes), vec![NoteKind::SkippedEntry]);
    }

    #[test]
    fn test_empty_details_are_fully_defaulted() {
        let adapted = adapt_robot_details_at(&json!({}), observed());
        let details = adapted.value;

        assert_eq!(details.robot.id, "");
        assert_eq!(details.robot.name, "");
        assert_eq!(details.robot.status, RobotStatus::Inactive);
        assert_eq!(details.robot.battery, 0);
        assert_eq!(details.robot.position, Position::default());
        assert_eq!(details.robot.sensors, Sensors::default());
        assert_eq!(details.robot.tasks, Tasks::default());
        assert_eq!(details.robot.last_update, "2024-05-01T12:00:00.000Z");
        assert_eq!(details.robot.error_logs, None);
        assert_eq!(details.coverage_area, 0.0);
        assert_eq!(details.uptime, 0.0);
        assert!(details.maintenance_history.is_empty());
        assert!(details.sensor_history.is_empty());
        assert!(!adapted.notes.iter().any(|n| n.kind.is_anomaly()));
    }

    #[test]
    fn test_details_keep_history_order_and_coerce_strings() {
        let raw = json!({
            "id": "SB003",
            "name": "AgriBot 3",
            "status": "active",
            "battery": 92,
            "coverage_area": 75,
            "uptime": 48,
            "error_logs": [],
            "maintenance_history": [
                {"date": "2024-04-24", "issue": "Calibration", "resolution": "Recalibrated"},
                "garbage"
            ],
            "sensor_history": [
                {"timestamp": "2024-05-01T11:00:00Z", "soil_moisture": 70, "temperature": "22.3", "crop_health": 80},
                {"timestamp": "2024-05-01T10:00:00Z", "soil_moisture": 65, "temperature": "21.9", "crop_health": 81}
            ]
        });
        let adapted = adapt_robot_details_at(&raw, observed());
        let details = adapted.value;

        assert_eq!(details.robot.error_logs, Some(vec![]));
        assert_eq!(details.maintenance_history.len(), 1);
        assert_eq!(details.sensor_history[0].timestamp, "2024-05-01T11:00:00Z");
        assert_eq!(details.sensor_history[0].temperature, 22.3);
        assert_eq!(details.sensor_history[1].temperature, 21.9);
        assert!(kinds(&adapted.notes).contains(&NoteKind::SkippedEntry));
    }

    #[test]
    fn test_details_accept_flat_sensor_readings() {
        let raw = json!({"id": "SB1", "status": "active", "coordinates": [4, 5], "task": "scan",
                         "soil_moisture": 55, "temperature": 19.5, "crop_health": 88});
        let details = adapt_robot_details_at(&raw, observed()).value;

        assert_eq!(details.robot.position, Position { x: 4.0, y: 5.0 });
        assert_eq!(details.robot.tasks.current, "scan");
        assert_eq!(details.robot.sensors.soil_moisture, 55.0);
        assert_eq!(details.robot.sensors.crop_health, 88.0);
    }

    #[test]
    fn test_fleet_adaptation_is_idempotent() {
        for raw in [
            listed_payload(),
            json!({"SB1": {"status": "charging", "battery": 50, "coordinates": [1, 2]}}),
            json!([{"name": "Tiller", "sensors": {"soil_ph": 6.1}}]),
        ] {
            let first = adapt_fleet_data_at(&raw, observed()).value;
            let again = adapt_fleet_data_at(&serde_json::to_value(&first).unwrap(), observed()).value;
            assert_eq!(first, again);
        }
    }

    #[test]
    fn test_details_adaptation_is_idempotent() {
        let raw = json!({
            "id": "SB005",
            "status": "inactive",
            "sensor_history": [{"timestamp": "t0", "soil_moisture": 1, "temperature": 2, "crop_health": 3}],
            "maintenance_history": [{"date": "d", "issue": "i", "resolution": "r"}]
        });
        let first = adapt_robot_details_at(&raw, observed()).value;
        let again = adapt_robot_details_at(&serde_json::to_value(&first).unwrap(), observed()).value;
        assert_eq!(first, again);
    }
}
