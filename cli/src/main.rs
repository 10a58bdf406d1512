mod client;
mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::EnvFilter;

use crate::client::HttpHabitApi;
use crate::commands::{
    SyncArgs, cmd_browse, cmd_dashboard, cmd_heatmap, cmd_login, cmd_logout, cmd_toggle,
    cmd_whoami,
};
use crate::config::Config;
use ritualist_core::auth::AuthMode;
use ritualist_core::session::{JsonFileStore, SessionContext};

#[derive(Parser)]
#[command(
    name = "ritualist",
    version,
    about = "Track daily habits from the terminal",
    long_about = "Track daily habits from the terminal.\n\n\
        Habits and completions live on the API server. When the server cannot be \
        reached, demo habits are shown and changes are kept locally until the next refresh."
)]
struct Cli {
    /// API base URL (default: $RITUALIST_API_URL or http://localhost:8000)
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Log requests and reconciliation decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        /// Account email
        email: String,
        /// Password (prompted if omitted)
        #[arg(long)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create an account and sign in
    Register {
        /// Account email
        email: String,
        /// Password, at least 6 characters (prompted if omitted)
        #[arg(long)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Forget the stored session
    Logout,
    /// Show who is signed in
    Whoami {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show habits and completions for a day
    Dashboard {
        /// Date (YYYY-MM-DD, today, yesterday, tomorrow; default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        sync: SyncArgs,
    },
    /// Mark a habit done or not done
    Toggle {
        /// Habit ID
        habit_id: String,
        /// Date to toggle (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        sync: SyncArgs,
    },
    /// Show a habit's completion history as a calendar grid
    Heatmap {
        /// Habit ID
        habit_id: String,
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// Last day (YYYY-MM-DD, default: today)
        #[arg(long)]
        to: Option<String>,
        /// Number of days ending at --to, used when --from is not given
        #[arg(short, long, default_value = "7")]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Step through days and toggle habits interactively
    Browse {
        /// Starting date (default: today)
        date: Option<String>,
        #[command(flatten)]
        sync: SyncArgs,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "ritualist=debug,ritualist_core=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.api_url)?;
    let mut store = JsonFileStore::open(&config.session_path)?;
    let session = SessionContext::load(&store)?;
    let api = HttpHabitApi::new(&config.api_url, session.access_token.clone())?;

    match cli.command {
        Commands::Login {
            email,
            password,
            json,
        } => cmd_login(&api, &mut store, AuthMode::Login, &email, password, json).await,
        Commands::Register {
            email,
            password,
            json,
        } => cmd_login(&api, &mut store, AuthMode::Register, &email, password, json).await,
        Commands::Logout => cmd_logout(&mut store),
        Commands::Whoami { json } => cmd_whoami(&session, json),
        Commands::Dashboard { date, json, sync } => cmd_dashboard(api, date, &sync, json).await,
        Commands::Toggle {
            habit_id,
            date,
            json,
            sync,
        } => cmd_toggle(api, &habit_id, date, &sync, json).await,
        Commands::Heatmap {
            habit_id,
            from,
            to,
            days,
            json,
        } => cmd_heatmap(&api, &habit_id, from, to, days, json).await,
        Commands::Browse { date, sync } => cmd_browse(api, date, &sync).await,
    }
}
