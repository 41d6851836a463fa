use agrifleet::cli::{Cli, Commands, ConfigAction, FleetAction, RobotAction, SessionAction};
use agrifleet::logic::client::{config, fleet, robot, session};
use agrifleet::logic::config::ClientConfig;
use agrifleet::logic::mock::{self, MockOptions};
use clap::Parser;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    // RUST_LOG wins over --verbose
    let default = if verbose { "agrifleet=debug" } else { "agrifleet=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command‐line arguments
    let args = Cli::parse();
    init_tracing(args.verbose);

    let config_path = args.config.as_deref();
    let load = || {
        ClientConfig::load(
            config_path,
            args.base_url.clone(),
            args.poll_interval,
            args.request_timeout,
        )
    };

    // Dispatch on subcommand
    match args.command {
        Commands::Session { action } => {
            let config = load()?;
            match action {
                SessionAction::Start => session::start(&config).await?,
                SessionAction::Show => session::show(&config)?,
                SessionAction::Clear => session::clear(&config).await?,
            }
        }

        Commands::Fleet { action } => match action {
            FleetAction::List {
                format,
                sort,
                status,
                watch,
                interval,
                extended,
                select,
            } => {
                let config = load()?;
                let options = fleet::ListOptions {
                    format,
                    sort,
                    status,
                    watch,
                    interval,
                    extended,
                    select,
                };
                fleet::list(&config, options).await?
            }
        },

        Commands::Robot { action } => {
            let config = load()?;
            match action {
                RobotAction::Show { robot_id, format } => robot::show(&config, robot_id, format).await?,
                RobotAction::Assign { robot_id, task } => robot::assign(&config, robot_id, task).await?,
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => config::show(config_path, &load()?)?,
            ConfigAction::Set {
                base_url,
                poll_interval,
                request_timeout,
                session_file,
            } => config::set(config_path, base_url, poll_interval, request_timeout, session_file)?,
        },

        Commands::Mock {
            host,
            port,
            shape,
            latency_ms,
        } => {
            let options = MockOptions {
                shape: shape.into(),
                latency: Duration::from_millis(latency_ms),
            };
            mock::run(host, port, options).await?
        }
    }

    Ok(())
}
