//! In-memory stand-in for the fleet service, served over HTTP.
//!
//! Mirrors the real service's routes under `/api` so the client, the stores
//! and the CLI can be exercised without a robot fleet.

use crate::logic::client::url_utils::build_base_url;
use crate::logic::types::{Position, RobotStatus, Sensors};
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};
use uuid::Uuid;
use warp::{
    http::StatusCode,
    reply::{json as warp_json, with_status, Json, WithStatus},
    Filter, Rejection,
};

/// Which `/fleet/status` layout the mock emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadShape {
    /// Envelope with a `robots` array and aggregate fields
    #[default]
    Array,
    /// Object keyed by robot id with flattened fields
    Map,
}

#[derive(Debug, Clone, Default)]
pub struct MockOptions {
    pub shape: PayloadShape,
    /// Delay added to every data endpoint (not to session start)
    pub latency: Duration,
}

#[derive(Debug, Clone)]
struct MockRobot {
    id: String,
    name: String,
    status: RobotStatus,
    battery: i64,
    position: Position,
    sensors: Sensors,
    current_task: String,
    queue: Vec<String>,
    seen_secs_ago: i64,
    coverage_area: f64,
    uptime: f64,
    error_logs: Option<Vec<String>>,
}

#[allow(clippy::too_many_arguments)]
fn robot(
    id: &str,
    status: RobotStatus,
    battery: i64,
    (x, y): (f64, f64),
    (soil_moisture, temperature, crop_health): (f64, f64, f64),
    current_task: &str,
    queue: &[&str],
    seen_secs_ago: i64,
) -> MockRobot {
    let n: usize = id.trim_start_matches("SB").parse().unwrap_or(0);
    MockRobot {
        id: id.to_string(),
        name: format!("AgriBot {}", n),
        status,
        battery,
        position: Position { x, y },
        sensors: Sensors {
            soil_moisture,
            temperature,
            crop_health,
            soil_ph: None,
        },
        current_task: current_task.to_string(),
        queue: queue.iter().map(|s| s.to_string()).collect(),
        seen_secs_ago,
        coverage_area: 50.0 + (n * 17 % 100) as f64,
        uptime: 10.0 + (n * 23 % 120) as f64,
        error_logs: None,
    }
}

/// Mutable fleet state behind the mock service
pub struct MockFleet {
    robots: Mutex<Vec<MockRobot>>,
    sessions: Mutex<HashSet<String>>,
}

impl MockFleet {
    /// The five-robot demo fleet
    pub fn seeded() -> Self {
        let mut robots = vec![
            robot("SB001", RobotStatus::Active, 85, (120.0, 80.0), (72.0, 24.5, 89.0),
                "Soil moisture analysis in Zone B",
                &["Return to charging station", "Scheduled maintenance"], 120),
            robot("SB002", RobotStatus::Maintenance, 23, (220.0, 160.0), (68.0, 25.2, 75.0),
                "Maintenance mode - Sensor calibration", &[], 3600),
            robot("SB003", RobotStatus::Active, 92, (50.0, 210.0), (81.0, 23.8, 93.0),
                "Crop health monitoring in Zone C", &["Temperature mapping in Zone D"], 45),
            robot("SB004", RobotStatus::Charging, 42, (180.0, 30.0), (75.0, 24.1, 84.0),
                "Charging at Station 2", &["Soil moisture analysis in Zone A"], 240),
            robot("SB005", RobotStatus::Inactive, 0, (300.0, 190.0), (0.0, 0.0, 0.0),
                "Offline - Power failure", &[], 86400),
        ];
        robots[1].error_logs = Some(vec!["Soil moisture probe drift detected".to_string()]);
        robots[4].error_logs = Some(vec![
            "Battery depleted".to_string(),
            "Lost contact with base station".to_string(),
        ]);
        Self {
            robots: Mutex::new(robots),
            sessions: Mutex::new(HashSet::new()),
        }
    }

    pub fn start_session(&self) -> String {
        let id = format!("mock-session-{}", Uuid::new_v4().simple());
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(id.clone());
        }
        info!(session_id = %id, "mock session started");
        id
    }

    pub fn has_session(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .map(|s| s.contains(session_id))
            .unwrap_or(false)
    }

    /// Invalidate every issued session, as a service restart would
    pub fn expire_sessions(&self) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.clear();
        }
    }

    fn robots(&self) -> Vec<MockRobot> {
        self.robots.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn fleet_payload(&self, shape: PayloadShape) -> Value {
        let robots = self.robots();
        match shape {
            PayloadShape::Array => {
                let active = robots
                    .iter()
                    .filter(|r| r.status == RobotStatus::Active)
                    .count();
                let battery_levels: Map<String, Value> = robots
                    .iter()
                    .map(|r| (r.id.clone(), json!(r.battery)))
                    .collect();
                json!({
                    "active_robots": active,
                    "inactive_robots": robots.len() - active,
                    "total_area_covered": 1250,
                    "battery_levels": battery_levels,
                    "robots": robots.iter().map(robot_json).collect::<Vec<_>>(),
                    "constraints": ["Limited Communication", "Sensor Failures & Redundancy"],
                })
            }
            PayloadShape::Map => {
                let entries: Map<String, Value> = robots
                    .iter()
                    .map(|r| {
                        (
                            r.id.clone(),
                            json!({
                                "status": r.status.as_str(),
                                "battery": r.battery,
                                "coordinates": [r.position.x, r.position.y],
                                "task": r.current_task,
                            }),
                        )
                    })
                    .collect();
                Value::Object(entries)
            }
        }
    }

    pub fn robot_status(&self, robot_id: &str) -> Option<Value> {
        let robot = self.robots().into_iter().find(|r| r.id == robot_id)?;
        let mut status = robot_json(&robot);
        let now = Utc::now();
        status["coverage_area"] = json!(robot.coverage_area);
        status["uptime"] = json!(robot.uptime);
        status["maintenance_history"] = json!([
            {
                "date": iso(now - ChronoDuration::days(7)),
                "issue": "Soil moisture sensor calibration",
                "resolution": "Recalibrated and tested",
            },
            {
                "date": iso(now - ChronoDuration::days(14)),
                "issue": "Battery replacement",
                "resolution": "Installed new battery pack",
            },
        ]);
        Some(status)
    }

    /// Current readings plus ten hourly snapshots, most recent first
    pub fn robot_sensor_data(&self, robot_id: &str) -> Option<Value> {
        let robot = self.robots().into_iter().find(|r| r.id == robot_id)?;
        let now = Utc::now();
        let history: Vec<Value> = (0..10i64)
            .map(|i| {
                let wobble = ((i * 7) % 11 - 5) as f64;
                json!({
                    "timestamp": iso(now - ChronoDuration::hours(i)),
                    "soil_moisture": (robot.sensors.soil_moisture + wobble).max(0.0),
                    // The service reports temperature as fixed-point text.
                    "temperature": format!("{:.1}", robot.sensors.temperature + wobble / 10.0),
                    "crop_health": (robot.sensors.crop_health - wobble).clamp(0.0, 100.0),
                })
            })
            .collect();
        Some(json!({
            "sensors": robot.sensors,
            "sensor_history": history,
        }))
    }

    pub fn assign_task(&self, robot_id: &str, task: &str) -> Option<Value> {
        let mut robots = self.robots.lock().ok()?;
        let robot = robots.iter_mut().find(|r| r.id == robot_id)?;
        robot.queue.push(task.to_string());
        Some(json!({
            "success": true,
            "message": format!("Task \"{}\" assigned to robot {}", task, robot_id),
        }))
    }
}

fn iso(t: chrono::DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn robot_json(robot: &MockRobot) -> Value {
    let mut value = json!({
        "id": robot.id,
        "name": robot.name,
        "status": robot.status.as_str(),
        "battery": robot.battery,
        "position": robot.position,
        "sensors": robot.sensors,
        "tasks": { "current": robot.current_task, "queue": robot.queue },
        "last_update": iso(Utc::now() - ChronoDuration::seconds(robot.seen_secs_ago)),
    });
    if let Some(logs) = &robot.error_logs {
        value["error_logs"] = json!(logs);
    }
    value
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskBody {
    task: String,
}

type Reply = WithStatus<Json>;

fn unauthorized() -> Reply {
    with_status(
        warp_json(&json!({ "error": "invalid or missing session_id" })),
        StatusCode::UNAUTHORIZED,
    )
}

fn not_found(robot_id: &str) -> Reply {
    with_status(
        warp_json(&json!({ "error": format!("Robot {} not found", robot_id) })),
        StatusCode::NOT_FOUND,
    )
}

fn ok(value: Value) -> Reply {
    with_status(warp_json(&value), StatusCode::OK)
}

/// Gate a data endpoint on latency and session validity
async fn admit(fleet: &MockFleet, options: &MockOptions, query: &SessionQuery) -> bool {
    if !options.latency.is_zero() {
        sleep(options.latency).await;
    }
    query
        .session_id
        .as_deref()
        .map_or(false, |id| fleet.has_session(id))
}

/// All mock service routes under `/api`
pub fn routes(
    fleet: Arc<MockFleet>,
    options: MockOptions,
) -> impl Filter<Extract = (Reply,), Error = Rejection> + Clone {
    let with_fleet = {
        let fleet = fleet.clone();
        warp::any().map(move || fleet.clone())
    };
    let with_options = warp::any().map(move || options.clone());

    let session = warp::path!("api" / "session" / "start")
        .and(warp::post())
        .and(with_fleet.clone())
        .map(|fleet: Arc<MockFleet>| {
            let id = fleet.start_session();
            ok(json!({ "session_id": id, "message": "Session started" }))
        });

    let fleet_status = warp::path!("api" / "fleet" / "status")
        .and(warp::get())
        .and(warp::query::<SessionQuery>())
        .and(with_fleet.clone())
        .and(with_options.clone())
        .and_then(
            |query: SessionQuery, fleet: Arc<MockFleet>, options: MockOptions| async move {
                if !admit(&fleet, &options, &query).await {
                    return Ok::<_, Rejection>(unauthorized());
                }
                Ok(ok(fleet.fleet_payload(options.shape)))
            },
        );

    let rover_status = warp::path!("api" / "rover" / String / "status")
        .and(warp::get())
        .and(warp::query::<SessionQuery>())
        .and(with_fleet.clone())
        .and(with_options.clone())
        .and_then(
            |robot_id: String, query: SessionQuery, fleet: Arc<MockFleet>, options: MockOptions| async move {
                if !admit(&fleet, &options, &query).await {
                    return Ok::<_, Rejection>(unauthorized());
                }
                Ok(match fleet.robot_status(&robot_id) {
                    Some(status) => ok(status),
                    None => not_found(&robot_id),
                })
            },
        );

    let rover_sensors = warp::path!("api" / "rover" / String / "sensor-data")
        .and(warp::get())
        .and(warp::query::<SessionQuery>())
        .and(with_fleet.clone())
        .and(with_options.clone())
        .and_then(
            |robot_id: String, query: SessionQuery, fleet: Arc<MockFleet>, options: MockOptions| async move {
                if !admit(&fleet, &options, &query).await {
                    return Ok::<_, Rejection>(unauthorized());
                }
                Ok(match fleet.robot_sensor_data(&robot_id) {
                    Some(data) => ok(data),
                    None => not_found(&robot_id),
                })
            },
        );

    let rover_task = warp::path!("api" / "rover" / String / "task")
        .and(warp::post())
        .and(warp::query::<SessionQuery>())
        .and(warp::body::content_length_limit(16 * 1024))
        .and(warp::body::json())
        .and(with_fleet)
        .and(with_options)
        .and_then(
            |robot_id: String,
             query: SessionQuery,
             body: TaskBody,
             fleet: Arc<MockFleet>,
             options: MockOptions| async move {
                if !admit(&fleet, &options, &query).await {
                    return Ok::<_, Rejection>(unauthorized());
                }
                debug!(robot = %robot_id, task = %body.task, "mock task assignment");
                Ok(match fleet.assign_task(&robot_id, &body.task) {
                    Some(reply) => ok(reply),
                    None => not_found(&robot_id),
                })
            },
        );

    session
        .or(fleet_status)
        .unify()
        .or(rover_status)
        .unify()
        .or(rover_sensors)
        .unify()
        .or(rover_task)
        .unify()
}

/// Serve the mock fleet until the process is stopped
pub async fn run(host: String, port: u16, options: MockOptions) -> anyhow::Result<()> {
    let fleet = Arc::new(MockFleet::seeded());
    let ip: IpAddr = host.parse()?;
    println!(
        "agrifleet mock service running on {} ({:?} payloads)",
        build_base_url(None, &host, port),
        options.shape
    );
    warp::serve(routes(fleet, options)).run((ip, port)).await;
    Ok(())
}

/// A mock service bound to a free local port; stopped on drop
pub struct MockServer {
    addr: SocketAddr,
    fleet: Arc<MockFleet>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn fleet(&self) -> &Arc<MockFleet> {
        &self.fleet
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub async fn spawn_ephemeral(options: MockOptions) -> MockServer {
    let fleet = Arc::new(MockFleet::seeded());
    let (addr, server) =
        warp::serve(routes(fleet.clone(), options)).bind_ephemeral(([127, 0, 0, 1], 0));
    let task = tokio::spawn(server);
    MockServer { addr, fleet, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::adapter::{adapt_fleet_data, adapt_robot_details};
    use crate::logic::client::transport::merge_objects;

    async fn session(filter: &(impl Filter<Extract = (Reply,), Error = Rejection> + Clone + 'static)) -> String {
        let resp = warp::test::request()
            .method("POST")
            .path("/api/session/start")
            .reply(filter)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(resp.body()).unwrap();
        body["session_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_data_routes_require_session() {
        let filter = routes(Arc::new(MockFleet::seeded()), MockOptions::default());
        let resp = warp::test::request()
            .path("/api/fleet/status?session_id=bogus")
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = warp::test::request()
            .path("/api/fleet/status")
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_map_shape_adapts_to_same_fleet() {
        let fleet = Arc::new(MockFleet::seeded());
        let filter = routes(
            fleet.clone(),
            MockOptions {
                shape: PayloadShape::Map,
                ..Default::default()
            },
        );
        let id = session(&filter).await;
        let resp = warp::test::request()
            .path(&format!("/api/fleet/status?session_id={}", id))
            .reply(&filter)
            .await;
        let raw: Value = serde_json::from_slice(resp.body()).unwrap();

        let keyed = adapt_fleet_data(&raw);
        let listed = adapt_fleet_data(&fleet.fleet_payload(PayloadShape::Array));
        assert_eq!(keyed.active_robots, listed.active_robots);
        assert_eq!(keyed.inactive_robots, listed.inactive_robots);
        assert_eq!(keyed.battery_levels, listed.battery_levels);
        assert_eq!(keyed.total_area_covered, None);
        assert_eq!(listed.total_area_covered, Some(1250.0));
    }

    #[tokio::test]
    async fn test_task_route_appends_to_queue() {
        let fleet = Arc::new(MockFleet::seeded());
        let filter = routes(fleet.clone(), MockOptions::default());
        let id = session(&filter).await;

        let resp = warp::test::request()
            .method("POST")
            .path(&format!("/api/rover/SB004/task?session_id={}", id))
            .json(&json!({ "task": "Mow Zone F" }))
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let queue = fleet.fleet_payload(PayloadShape::Array)["robots"][3]["tasks"]["queue"].clone();
        assert_eq!(queue, json!(["Soil moisture analysis in Zone A", "Mow Zone F"]));

        let resp = warp::test::request()
            .method("POST")
            .path(&format!("/api/rover/SB999/task?session_id={}", id))
            .json(&json!({ "task": "Mow Zone F" }))
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_details_payload_adapts_cleanly() {
        let fleet = MockFleet::seeded();
        let raw = merge_objects(
            fleet.robot_status("SB002").unwrap(),
            fleet.robot_sensor_data("SB002").unwrap(),
        );
        let details = adapt_robot_details(&raw);

        assert_eq!(details.robot.id, "SB002");
        assert_eq!(details.robot.status, RobotStatus::Maintenance);
        assert_eq!(details.sensor_history.len(), 10);
        assert_eq!(details.maintenance_history.len(), 2);
        assert!(details.robot.error_logs.is_some());
        assert!(fleet.robot_status("SB404").is_none());
    }
}
