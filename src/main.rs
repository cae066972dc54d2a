use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

mod cli;
mod client;
mod controller;
mod core;

use cli::Overrides;

#[derive(Parser)]
#[command(name = "sentiment-refresh")]
#[command(
    author,
    version,
    about = "Trigger and follow the crypto dashboard's news sentiment refresh"
)]
struct Cli {
    /// Config file (default: ~/.config/sentiment-refresh/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL, e.g. http://localhost:8080
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Where the refresh state survives between runs
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a news sentiment update and wait for it to finish
    Trigger {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Keep the controller running and print every state change
    Watch {
        /// Re-fetch headlines for this coin after each completed update
        #[arg(long)]
        symbol: Option<String>,

        /// Start an update right away
        #[arg(long)]
        trigger: bool,
    },

    /// Show backend job status and the locally stored refresh state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Forget any stored cooldown or in-flight update
    Reset,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

fn init_logging(json: bool) -> FilterHandle {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, handle) = reload::Layer::new(filter);

    let json_layer = json.then(|| fmt::layer().json().with_writer(io::stderr));
    let text_layer = (!json).then(|| fmt::layer().with_writer(io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();

    handle
}

/// Turns on debug output when the config asks for it and `RUST_LOG` is unset.
fn apply_debug(handle: &FilterHandle, overrides: &Overrides) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    if let Ok(settings) = cli::load_settings(overrides) {
        if settings.debug {
            if let Err(e) = handle.modify(|filter| *filter = EnvFilter::new("debug")) {
                tracing::warn!(error = %e, "Failed to enable debug logging");
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let overrides = Overrides {
        config: cli.config,
        api_url: cli.api_url,
        state_file: cli.state_file,
    };

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    let log_handle = init_logging(cli.log_json);
    apply_debug(&log_handle, &overrides);

    match cli.command {
        Commands::Trigger { json } => cli::trigger::run(&overrides, json).await,
        Commands::Watch { symbol, trigger } => cli::watch::run(&overrides, symbol, trigger).await,
        Commands::Status { json } => cli::status::run(&overrides, json).await,
        Commands::Reset => cli::reset::run(&overrides),
        Commands::Completions { .. } => Ok(()),
    }
}
