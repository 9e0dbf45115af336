use clap::{Parser, Subcommand};

#[derive(Debug, Subcommand)]
pub enum ProfileCommands {
    #[command(about = "List configured profiles and highlight the active profile")]
    List,
    #[command(about = "Show the active profile's resolved runtime settings")]
    Show,
}

#[derive(Debug, Subcommand)]
pub enum TelemetryCommands {
    #[command(about = "Summarize telemetry events from a JSONL stream")]
    Report {
        #[arg(long)]
        path: Option<String>,
        #[arg(long, default_value_t = 5000)]
        limit: usize,
    },
}

const CLI_EXAMPLES: &str = "Examples:\n\
  family-connect run\n\
  family-connect run --date 2025-03-15\n\
  family-connect --data-path data/birthdays.json today --date tomorrow\n\
  family-connect monitor --interval-secs 300\n\
  family-connect --profile demo serve --host 127.0.0.1 --port 8788\n\
  family-connect profiles show\n\
  family-connect telemetry report --limit 2000\n\
\n\
Requirements:\n\
  - OPENAI_API_KEY must be set for run, monitor and serve.\n\
  - today, doctor, profiles and telemetry never call the model.";

#[derive(Debug, Parser)]
#[command(name = "family-connect")]
#[command(about = "Birthday reminders routed through coordinated LLM agents")]
#[command(after_long_help = CLI_EXAMPLES)]
pub struct Cli {
    #[arg(long, env = "FAMILY_CONNECT_MODEL")]
    pub model: Option<String>,

    #[arg(long, env = "FAMILY_CONNECT_PROFILE", default_value = "default")]
    pub profile: String,

    #[arg(
        long,
        env = "FAMILY_CONNECT_CONFIG",
        default_value = ".family-connect/config.toml"
    )]
    pub config_path: String,

    #[arg(long, env = "FAMILY_CONNECT_API_BASE_URL")]
    pub api_base_url: Option<String>,

    #[arg(long, env = "FAMILY_CONNECT_DATA_PATH")]
    pub data_path: Option<String>,

    #[arg(long, env = "FAMILY_CONNECT_GENERATION_TIMEOUT_SECS")]
    pub generation_timeout_secs: Option<u64>,

    #[arg(long, env = "FAMILY_CONNECT_POLL_INTERVAL_SECS")]
    pub poll_interval_secs: Option<u64>,

    #[arg(long, env = "FAMILY_CONNECT_ANALYZE_MATCHES", action = clap::ArgAction::Set)]
    pub analyze_matches: Option<bool>,

    #[arg(long, env = "FAMILY_CONNECT_TELEMETRY_ENABLED", action = clap::ArgAction::Set)]
    pub telemetry_enabled: Option<bool>,

    #[arg(long, env = "FAMILY_CONNECT_TELEMETRY_PATH")]
    pub telemetry_path: Option<String>,

    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Check today's birthdays once, route reminders and print a report")]
    Run {
        /// YYYY-MM-DD, today, tomorrow or yesterday
        #[arg(long)]
        date: Option<String>,
    },
    #[command(about = "Re-check every interval until interrupted")]
    Monitor {
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    #[command(about = "List the birthdays that match a date without calling the model")]
    Today {
        #[arg(long)]
        date: Option<String>,
    },
    #[command(about = "Serve the dashboard and run trigger over HTTP")]
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8788)]
        port: u16,
    },
    #[command(about = "Validate credentials, data file and configuration")]
    Doctor,
    #[command(about = "Inspect profile configuration and active resolved profile state")]
    Profiles {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    #[command(about = "Telemetry utilities and reporting")]
    Telemetry {
        #[command(subcommand)]
        command: TelemetryCommands,
    },
}

pub fn command_label(command: &Commands) -> String {
    match command {
        Commands::Run { .. } => "run".to_string(),
        Commands::Monitor { .. } => "monitor".to_string(),
        Commands::Today { .. } => "today".to_string(),
        Commands::Serve { .. } => "serve".to_string(),
        Commands::Doctor => "doctor".to_string(),
        Commands::Profiles { command } => match command {
            ProfileCommands::List => "profiles.list".to_string(),
            ProfileCommands::Show => "profiles.show".to_string(),
        },
        Commands::Telemetry { command } => match command {
            TelemetryCommands::Report { .. } => "telemetry.report".to_string(),
        },
    }
}
