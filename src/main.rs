use anyhow::Result;
use clap::{Parser, Subcommand};

use snowdash::cli;

#[derive(Debug, Parser)]
#[command(name = "snowdash")]
#[command(about = "Warehouse query and usage dashboard for the terminal")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sign in to the helper backend
    Login {
        #[arg(long, short)]
        username: String,
        #[arg(long, short)]
        account: String,
        /// Password (falls back to SNOWDASH_PASSWORD, then a prompt)
        #[arg(long)]
        password: Option<String>,
        /// Page to return to after signing in, e.g. /queries
        #[arg(long)]
        return_to: Option<String>,
    },
    /// Sign out and clear the stored session
    Logout,
    /// Show the session and route access
    Status,
    /// List recent queries
    Queries {
        /// Look-back window in minutes: 15, 30, 60, 120, 240, 480, 720, 1440
        #[arg(long, short)]
        minutes: Option<u32>,
        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Stop a running query
    Stop {
        /// The QUERY_ID to stop
        id: String,
        /// Look-back window used to find the query
        #[arg(long, short)]
        minutes: Option<u32>,
    },
    /// Show credit usage
    Usage {
        /// Month as listed by the backend, e.g. "October, 2026"
        #[arg(long)]
        month: Option<String>,
        /// Day within the month to chart
        #[arg(long)]
        day: Option<String>,
        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Open a dashboard page through the route guard
    Open {
        /// Page path: /login, /queries, /usage
        path: String,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show recent activity log entries
    Log {
        #[arg(long, short, default_value = "20")]
        lines: usize,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default config to ~/.snowdash/config.toml
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Set a dotted key, e.g. backend.base_url
    Set { key: String, value: String },
    /// Restore the default config file
    Reset,
}

fn main() -> Result<()> {
    let app = App::parse();

    match app.command {
        Commands::Login {
            username,
            account,
            password,
            return_to,
        } => cli::run_login(&username, &account, password, return_to.as_deref()),
        Commands::Logout => cli::run_logout(),
        Commands::Status => cli::run_status(),
        Commands::Queries { minutes, format } => {
            let fmt = cli::OutputFormat::from_str_opt(Some(&format));
            cli::run_queries(minutes, fmt)
        }
        Commands::Stop { id, minutes } => cli::run_stop(&id, minutes),
        Commands::Usage { month, day, format } => {
            let fmt = cli::OutputFormat::from_str_opt(Some(&format));
            cli::run_usage(month.as_deref(), day.as_deref(), fmt)
        }
        Commands::Open { path } => cli::run_open(&path),
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Reset => cli::run_config_reset(),
        },
        Commands::Log { lines } => cli::run_log(lines),
    }
}
