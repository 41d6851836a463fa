use crate::logic::mock::PayloadShape;
use crate::logic::types::RobotStatus;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Clone, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Compact,
}

#[derive(Clone, ValueEnum)]
pub enum SortBy {
    Name,
    Status,
    Battery,
    LastUpdate,
}

#[derive(Clone, ValueEnum)]
pub enum StatusFilter {
    Active,
    Inactive,
    Charging,
    Maintenance,
}

impl StatusFilter {
    pub fn status(&self) -> RobotStatus {
        match self {
            StatusFilter::Active => RobotStatus::Active,
            StatusFilter::Inactive => RobotStatus::Inactive,
            StatusFilter::Charging => RobotStatus::Charging,
            StatusFilter::Maintenance => RobotStatus::Maintenance,
        }
    }
}

#[derive(Clone, ValueEnum)]
pub enum ShapeArg {
    /// `{ "robots": [...] }` with per-robot objects
    Array,
    /// Robot name -> flattened fields
    Map,
}

impl From<ShapeArg> for PayloadShape {
    fn from(shape: ShapeArg) -> Self {
        match shape {
            ShapeArg::Array => PayloadShape::Array,
            ShapeArg::Map => PayloadShape::Map,
        }
    }
}

/// agricultural robot fleet monitoring and tasking
#[derive(Parser)]
#[command(name = "agrifleet", version)]
pub struct Cli {
    /// Fleet service root including `/api` (overrides config and AGRIFLEET_BASE_URL)
    #[arg(short = 'u', long)]
    pub base_url: Option<String>,

    /// Path to configuration file (supports `~`)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Fleet refresh period in seconds (overrides config and AGRIFLEET_POLL_INTERVAL)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval: Option<u64>,

    /// Per-request timeout in seconds (overrides config and AGRIFLEET_REQUEST_TIMEOUT)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub request_timeout: Option<u64>,

    /// Log debug output to stderr
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fleet service session (start, show, clear)
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Whole-fleet views
    Fleet {
        #[command(subcommand)]
        action: FleetAction,
    },

    /// Single robot details and task assignment
    Robot {
        #[command(subcommand)]
        action: RobotAction,
    },

    /// Configuration management (view, set)
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Serve an in-memory fleet that speaks the fleet service API
    Mock {
        /// Address to bind
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Port to bind
        #[arg(short, long, default_value_t = 5000)]
        port: u16,
        /// Layout of the fleet status payload
        #[arg(long, default_value = "array")]
        shape: ShapeArg,
        /// Artificial delay added to every data request, in milliseconds
        #[arg(long, default_value_t = 0)]
        latency_ms: u64,
    },
}

#[derive(Subcommand)]
pub enum SessionAction {
    /// Start a new session and store its id
    Start,
    /// Print the stored session id
    Show,
    /// Forget the stored session id
    Clear,
}

#[derive(Subcommand)]
pub enum FleetAction {
    /// Fetch the fleet and list its robots
    List {
        /// Output format: table (default), json, or compact
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
        /// Sort by: name (default), status, battery, last-update
        #[arg(short, long, default_value = "name")]
        sort: SortBy,
        /// Show only robots with specific status
        #[arg(long)]
        status: Option<StatusFilter>,
        /// Watch mode: keep polling and redraw on every refresh
        #[arg(short, long)]
        watch: bool,
        /// Watch interval in seconds (default: poll interval from config)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
        /// Show extended information (summary, constraints, data quality)
        #[arg(short = 'x', long)]
        extended: bool,
        /// Also show details for this robot
        #[arg(long, value_name = "ROBOT_ID")]
        select: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum RobotAction {
    /// Show the extended record of one robot
    Show {
        #[arg(value_name = "ROBOT_ID")]
        robot_id: String,
        /// Output format: table (default), json, or compact
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
    /// Queue a free-text task on a robot
    Assign {
        #[arg(value_name = "ROBOT_ID")]
        robot_id: String,
        #[arg(value_name = "TASK")]
        task: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Write settings to the config file
    Set {
        /// Fleet service root including `/api`
        #[arg(long)]
        base_url: Option<String>,
        /// Fleet refresh period in seconds
        #[arg(long)]
        poll_interval: Option<u64>,
        /// Per-request timeout in seconds
        #[arg(long)]
        request_timeout: Option<u64>,
        /// Where to keep the session id (supports `~`)
        #[arg(long)]
        session_file: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fleet_list() {
        let cli = Cli::parse_from([
            "agrifleet", "--base-url", "http://fleet.local/api", "fleet", "list", "--sort",
            "last-update", "--status", "charging", "-x", "--select", "SB002",
        ]);
        assert_eq!(cli.base_url.as_deref(), Some("http://fleet.local/api"));
        match cli.command {
            Commands::Fleet {
                action: FleetAction::List { sort, status, extended, select, watch, .. },
            } => {
                assert!(matches!(sort, SortBy::LastUpdate));
                assert!(matches!(status, Some(StatusFilter::Charging)));
                assert!(extended);
                assert!(!watch);
                assert_eq!(select.as_deref(), Some("SB002"));
            }
            _ => panic!("expected fleet list"),
        }
    }

    #[test]
    fn test_timing_flags_reject_zero() {
        let cli = Cli::parse_from([
            "agrifleet", "--poll-interval", "20", "--request-timeout", "5", "fleet", "list", "-w",
            "--interval", "3",
        ]);
        assert_eq!(cli.poll_interval, Some(20));
        assert_eq!(cli.request_timeout, Some(5));
        match cli.command {
            Commands::Fleet {
                action: FleetAction::List { interval, watch, .. },
            } => {
                assert!(watch);
                assert_eq!(interval, Some(3));
            }
            _ => panic!("expected fleet list"),
        }

        assert!(Cli::try_parse_from(["agrifleet", "fleet", "list", "-w", "--interval", "0"]).is_err());
        assert!(Cli::try_parse_from(["agrifleet", "--poll-interval", "0", "fleet", "list"]).is_err());
        assert!(Cli::try_parse_from(["agrifleet", "--request-timeout", "0", "fleet", "list"]).is_err());
    }

    #[test]
    fn test_parse_robot_assign() {
        let cli = Cli::parse_from(["agrifleet", "robot", "assign", "SB001", "Scan Zone B"]);
        match cli.command {
            Commands::Robot {
                action: RobotAction::Assign { robot_id, task },
            } => {
                assert_eq!(robot_id, "SB001");
                assert_eq!(task, "Scan Zone B");
            }
            _ => panic!("expected robot assign"),
        }
    }
}
