use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Operational status of a robot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RobotStatus {
    Active,
    Inactive,
    Charging,
    Maintenance,
}

impl RobotStatus {
    /// Parse a backend status label. Unknown labels yield `None`.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "active" => Some(RobotStatus::Active),
            "inactive" => Some(RobotStatus::Inactive),
            "charging" => Some(RobotStatus::Charging),
            "maintenance" => Some(RobotStatus::Maintenance),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RobotStatus::Active => "active",
            RobotStatus::Inactive => "inactive",
            RobotStatus::Charging => "charging",
            RobotStatus::Maintenance => "maintenance",
        }
    }

    /// Only working or docked robots take new tasks.
    pub fn accepts_tasks(&self) -> bool {
        matches!(self, RobotStatus::Active | RobotStatus::Charging)
    }
}

impl Default for RobotStatus {
    fn default() -> Self {
        RobotStatus::Inactive
    }
}

impl fmt::Display for RobotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Latest sensor readings. Older backends report `soil_ph` instead of `crop_health`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sensors {
    pub soil_moisture: f64,
    pub temperature: f64,
    pub crop_health: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soil_ph: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tasks {
    pub current: String,
    pub queue: Vec<String>,
}

/// Canonical robot record, fully populated after adaptation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Robot {
    pub id: String,
    pub name: String,
    pub status: RobotStatus,
    pub battery: i64,
    pub position: Position,
    pub sensors: Sensors,
    pub tasks: Tasks,
    pub last_update: String,
    /// `None` means no logs were collected, which is not the same as no errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_logs: Option<Vec<String>>,
}

impl Robot {
    pub fn battery_in_range(&self) -> bool {
        (0..=100).contains(&self.battery)
    }

    pub fn last_update_time(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.last_update)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    pub date: String,
    pub issue: String,
    pub resolution: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub timestamp: String,
    pub soil_moisture: f64,
    pub temperature: f64,
    pub crop_health: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soil_ph: Option<f64>,
}

/// Extended record for a single robot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotDetails {
    #[serde(flatten)]
    pub robot: Robot,
    pub coverage_area: f64,
    /// Hours
    pub uptime: f64,
    pub maintenance_history: Vec<MaintenanceRecord>,
    /// Kept in source order.
    pub sensor_history: Vec<SensorSnapshot>,
}

/// One refresh cycle's view of the whole fleet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetStatus {
    pub active_robots: usize,
    pub inactive_robots: usize,
    /// `None` when the backend did not report coverage.
    pub total_area_covered: Option<f64>,
    pub battery_levels: BTreeMap<String, i64>,
    pub robots: Vec<Robot>,
    pub constraints: Vec<String>,
}

impl FleetStatus {
    pub fn robot(&self, id: &str) -> Option<&Robot> {
        self.robots.iter().find(|r| r.id == id)
    }

    /// Rounded mean battery level, 0 for an empty fleet
    pub fn average_battery(&self) -> i64 {
        if self.robots.is_empty() {
            return 0;
        }
        // Out-of-range levels are kept upstream, so the sum can exceed i64.
        let sum: i128 = self.robots.iter().map(|r| i128::from(r.battery)).sum();
        (sum as f64 / self.robots.len() as f64).round() as i64
    }
}

/// Backend reply to a task assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAssignment {
    #[serde(default = "assignment_default_success")]
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

fn assignment_default_success() -> bool {
    true
}

/// Coarse battery bucket used for list coloring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryBand {
    Low,
    Medium,
    High,
}

impl BatteryBand {
    pub fn from_level(level: i64) -> Self {
        if level < 20 {
            BatteryBand::Low
        } else if level < 50 {
            BatteryBand::Medium
        } else {
            BatteryBand::High
        }
    }
}

/// Battery condition label shown in the detail view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryHealth {
    Optimal,
    Good,
    Low,
    Critical,
}

impl BatteryHealth {
    pub fn from_level(level: i64) -> Self {
        if level > 70 {
            BatteryHealth::Optimal
        } else if level > 30 {
            BatteryHealth::Good
        } else if level > 10 {
            BatteryHealth::Low
        } else {
            BatteryHealth::Critical
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BatteryHealth::Optimal => "Optimal",
            BatteryHealth::Good => "Good",
            BatteryHealth::Low => "Low",
            BatteryHealth::Critical => "Critical",
        }
    }
}
