use crate::cli::{OutputFormat, SortBy, StatusFilter};
use crate::logic::adapter::DataQualityNote;
use crate::logic::types::{BatteryBand, BatteryHealth, FleetStatus, Robot, RobotDetails, RobotStatus};
use chrono::{DateTime, Utc};
use colored::*;

/// Get colored status indicator for robot status
fn status_indicator(status: RobotStatus) -> String {
    match status {
        RobotStatus::Active => "●".green().to_string(),
        RobotStatus::Charging => "●".yellow().to_string(),
        RobotStatus::Maintenance => "●".bright_red().to_string(),
        RobotStatus::Inactive => "●".red().to_string(),
    }
}

fn status_priority(status: RobotStatus) -> u8 {
    match status {
        RobotStatus::Active => 0,
        RobotStatus::Charging => 1,
        RobotStatus::Maintenance => 2,
        RobotStatus::Inactive => 3,
    }
}

/// Battery percentage colored by band
fn battery_text(level: i64) -> String {
    let text = format!("{}%", level);
    match BatteryBand::from_level(level) {
        BatteryBand::Low => text.red().to_string(),
        BatteryBand::Medium => text.yellow().to_string(),
        BatteryBand::High => text.green().to_string(),
    }
}

/// Human readable age of a timestamp, `Unknown` when it could not be parsed
pub fn format_age(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(at) = at else {
        return "Unknown".to_string();
    };
    let seconds = now.signed_duration_since(at).num_seconds().max(0);
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m", seconds / 60)
    } else if seconds < 86400 {
        format!("{}h", seconds / 3600)
    } else {
        format!("{}d", seconds / 86400)
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let head: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Sort robots based on the provided criteria
pub fn sort_robots(robots: &mut [Robot], sort_by: &SortBy) {
    match sort_by {
        SortBy::Name => robots.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id))),
        SortBy::Status => robots.sort_by_key(|r| status_priority(r.status)),
        // Lowest charge first, so robots that need attention lead.
        SortBy::Battery => robots.sort_by_key(|r| r.battery),
        // Newest first; unparsable timestamps go last.
        SortBy::LastUpdate => robots.sort_by(|a, b| b.last_update_time().cmp(&a.last_update_time())),
    }
}

/// Filter robots by status
pub fn filter_robots(robots: Vec<Robot>, status_filter: &Option<StatusFilter>) -> Vec<Robot> {
    match status_filter {
        Some(filter) => robots
            .into_iter()
            .filter(|robot| robot.status == filter.status())
            .collect(),
        None => robots,
    }
}

fn display_robots_table(robots: &[Robot], extended: bool) {
    let header = format!(
        "{:<3} {:<10} {:<18} {:<12} {:<8} {:<28} {:<8}",
        "ST".bright_white().bold(),
        "ID".bright_white().bold(),
        "NAME".bright_white().bold(),
        "STATUS".bright_white().bold(),
        "BATTERY".bright_white().bold(),
        "CURRENT TASK".bright_white().bold(),
        "UPDATED".bright_white().bold()
    );
    if extended {
        println!("{}", "┌──────────────────────────────────────────────────────────────────────────────────────────┐".bright_blue());
        println!("{}", "│                                        ROBOTS                                            │".bright_blue().bold());
        println!("{}", "├──────────────────────────────────────────────────────────────────────────────────────────┤".bright_blue());
        println!("{}", header);
        println!("{}", "├──────────────────────────────────────────────────────────────────────────────────────────┤".bright_blue());
    } else {
        println!("{}", header);
        println!("{}", "─".repeat(92).bright_blue());
    }

    let now = Utc::now();
    for robot in robots {
        let task = if robot.tasks.current.is_empty() {
            "-".to_string()
        } else {
            truncate(&robot.tasks.current, 26)
        };
        println!(
            "{:<3} {:<10} {:<18} {:<12} {:<8} {:<28} {:<8}",
            status_indicator(robot.status),
            truncate(&robot.id, 10),
            truncate(&robot.name, 18),
            robot.status.as_str(),
            battery_text(robot.battery),
            task,
            format_age(robot.last_update_time(), now)
        );
    }

    if extended {
        println!("{}", "└──────────────────────────────────────────────────────────────────────────────────────────┘".bright_blue());
    }
}

fn display_robots_compact(robots: &[Robot]) {
    println!("{} {}", "Robots:".bright_blue().bold(), robots.len());
    let now = Utc::now();
    for robot in robots {
        println!(
            "{} {} {} ({})",
            status_indicator(robot.status),
            robot.id,
            battery_text(robot.battery),
            format_age(robot.last_update_time(), now)
        );
    }
}

fn display_summary(fleet: &FleetStatus, notes: &[DataQualityNote]) {
    let area = fleet
        .total_area_covered
        .map(|a| format!("{:.1} ha", a))
        .unwrap_or_else(|| "Unknown".to_string());
    println!();
    println!(
        "{} {} active, {} inactive | {} covered | {} avg battery | {} total robots",
        "Summary:".bright_white().bold(),
        fleet.active_robots.to_string().green(),
        fleet.inactive_robots.to_string().red(),
        area.bright_blue(),
        battery_text(fleet.average_battery()),
        fleet.robots.len().to_string().bright_blue()
    );
    if !fleet.constraints.is_empty() {
        println!("{} {}", "Constraints:".bright_white().bold(), fleet.constraints.join(", ").yellow());
    }
    let anomalies: Vec<&DataQualityNote> = notes.iter().filter(|n| n.kind.is_anomaly()).collect();
    if !anomalies.is_empty() {
        println!("{} {}", "Data quality:".bright_white().bold(), format!("{} issue(s)", anomalies.len()).yellow());
        for note in anomalies {
            println!("  {} {}", "!".yellow(), note);
        }
    }
}

/// Print a fleet snapshot after filtering and sorting its robots
pub fn render_fleet(
    fleet: &FleetStatus,
    notes: &[DataQualityNote],
    format: &OutputFormat,
    sort: &SortBy,
    status: &Option<StatusFilter>,
    extended: bool,
) -> anyhow::Result<()> {
    let mut robots = filter_robots(fleet.robots.clone(), status);
    sort_robots(&mut robots, sort);

    match format {
        OutputFormat::Json => {
            if extended {
                let view = FleetStatus {
                    robots,
                    ..fleet.clone()
                };
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&robots)?);
            }
        }
        OutputFormat::Table => {
            if robots.is_empty() {
                println!("{}", "No robots found.".yellow());
            } else {
                display_robots_table(&robots, extended);
            }
            if extended {
                display_summary(fleet, notes);
            }
        }
        OutputFormat::Compact => {
            if robots.is_empty() {
                println!("{}", "No robots found.".yellow());
            } else {
                display_robots_compact(&robots);
            }
        }
    }
    Ok(())
}

/// Print the extended record of one robot
pub fn render_details(details: &RobotDetails, format: &OutputFormat) -> anyhow::Result<()> {
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(details)?);
        return Ok(());
    }

    let robot = &details.robot;
    let now = Utc::now();
    println!(
        "{} {} {}",
        status_indicator(robot.status),
        robot.name.bright_white().bold(),
        format!("({})", robot.id).dimmed()
    );
    if let OutputFormat::Compact = format {
        println!(
            "{} | {} | {}",
            robot.status,
            battery_text(robot.battery),
            if robot.tasks.current.is_empty() { "-" } else { robot.tasks.current.as_str() }
        );
        return Ok(());
    }

    let label = |text: &str| format!("{:<14}", text).bright_white().bold();
    println!("{} {}", label("Status:"), robot.status);
    println!(
        "{} {} ({})",
        label("Battery:"),
        battery_text(robot.battery),
        BatteryHealth::from_level(robot.battery).label()
    );
    println!("{} ({:.2}, {:.2})", label("Position:"), robot.position.x, robot.position.y);
    println!(
        "{} {}",
        label("Last update:"),
        format_age(robot.last_update_time(), now)
    );
    println!("{} {:.1} ha", label("Coverage:"), details.coverage_area);
    println!("{} {:.1} h", label("Uptime:"), details.uptime);

    println!();
    println!("{}", "Sensors".bright_green().bold());
    println!("  soil moisture  {:.1}%", robot.sensors.soil_moisture);
    println!("  temperature    {:.1}°C", robot.sensors.temperature);
    println!("  crop health    {:.1}%", robot.sensors.crop_health);
    if let Some(ph) = robot.sensors.soil_ph {
        println!("  soil pH        {:.1}", ph);
    }

    println!();
    println!("{}", "Tasks".bright_green().bold());
    if robot.tasks.current.is_empty() {
        println!("  current: {}", "none".dimmed());
    } else {
        println!("  current: {}", robot.tasks.current);
    }
    for (i, task) in robot.tasks.queue.iter().enumerate() {
        println!("  {:>2}. {}", i + 1, task);
    }

    if !details.maintenance_history.is_empty() {
        println!();
        println!("{}", "Maintenance history".bright_green().bold());
        for record in &details.maintenance_history {
            println!("  {:<12} {} -> {}", record.date, record.issue, record.resolution);
        }
    }

    if let Some(logs) = &robot.error_logs {
        println!();
        println!("{}", "Error logs".bright_red().bold());
        if logs.is_empty() {
            println!("  {}", "no errors recorded".dimmed());
        }
        for entry in logs {
            println!("  {} {}", "✗".red(), entry);
        }
    }

    if !details.sensor_history.is_empty() {
        println!();
        println!("{}", "Sensor history".bright_green().bold());
        println!(
            "  {:<26} {:>9} {:>7} {:>7}",
            "TIMESTAMP", "MOISTURE", "TEMP", "HEALTH"
        );
        for snapshot in &details.sensor_history {
            println!(
                "  {:<26} {:>9.1} {:>7.1} {:>7.1}",
                truncate(&snapshot.timestamp, 26),
                snapshot.soil_moisture,
                snapshot.temperature,
                snapshot.crop_health
            );
        }
    }
    Ok(())
}
