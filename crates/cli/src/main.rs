mod auth_commands;
mod connect;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "tether", about = "Tether: control-connection client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Only look for tether.{toml,yaml,yml,json} in this directory.
    #[arg(long, global = true, env = "TETHER_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Exchange a username and password for an auth token.
    Login(auth_commands::LoginArgs),
    /// List the access tokens issued for a user.
    Tokens(auth_commands::TokensArgs),
    /// Open a control session and print hub traffic until it ends.
    Connect(connect::ConnectArgs),
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "tether starting");

    if let Some(dir) = cli.config_dir.clone() {
        tether_config::set_config_dir(dir);
    }
    let config = tether_config::discover_and_load();

    match cli.command {
        Commands::Login(args) => auth_commands::login(&config, args).await,
        Commands::Tokens(args) => auth_commands::tokens(&config, args).await,
        Commands::Connect(args) => connect::run(&config, args).await,
    }
}
