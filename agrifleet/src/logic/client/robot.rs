use crate::cli::OutputFormat;
use crate::logic::client::list::render_details;
use crate::logic::client::transport::{FleetTransport, HttpTransport};
use crate::logic::config::ClientConfig;
use crate::logic::store::{FleetStore, RobotDetailStore};
use colored::*;
use std::sync::Arc;
use tracing::warn;

fn fleet_store(config: &ClientConfig) -> anyhow::Result<FleetStore> {
    let transport: Arc<dyn FleetTransport> = Arc::new(HttpTransport::from_config(config)?);
    Ok(FleetStore::new(transport, config.request_timeout()))
}

/// Fetch and print one robot's extended record
pub async fn show(config: &ClientConfig, robot_id: String, format: OutputFormat) -> anyhow::Result<()> {
    let store = fleet_store(config)?;
    store.select_robot(Some(&robot_id));
    let details = RobotDetailStore::for_fleet(&store);
    details.refresh().await?;

    match details.state().details {
        Some(record) => render_details(&record, &format),
        None => anyhow::bail!("no details for robot {}", robot_id),
    }
}

/// Queue a task on a robot and print its refreshed task list
pub async fn assign(config: &ClientConfig, robot_id: String, task: String) -> anyhow::Result<()> {
    let store = fleet_store(config)?;
    // The snapshot lets the store refuse robots that cannot take tasks; without it
    // the service decides.
    if let Err(e) = store.refresh().await {
        warn!(error = %e, "could not load fleet before assigning");
    }

    match store.assign_task_to_robot(&robot_id, &task).await {
        Ok(reply) => {
            let message = if reply.message.is_empty() {
                format!("Task assigned to {}", robot_id)
            } else {
                reply.message
            };
            println!("✓ {}", message);
            if let Some(robot) = store.state().snapshot.robot(&robot_id) {
                println!("  {} {}", "current:".cyan(), robot.tasks.current);
                for (i, queued) in robot.tasks.queue.iter().enumerate() {
                    println!("  {:>2}. {}", i + 1, queued);
                }
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Failed to assign task: {}", e);
            Err(e.into())
        }
    }
}
