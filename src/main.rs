//! Binary entrypoint for the worldcore CLI.
//!
//! Commands:
//! - `start [--bind <addr>]` - run the world server
//! - `init` - write a starter `config.toml` and seed the default zone
//! - `status [--json]` - print world and session counts
//!
//! See the library crate docs for module-level details: `worldcore::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use worldcore::config::Config;
use worldcore::server::WorldServer;

#[derive(Parser)]
#[command(name = "worldcore")]
#[command(about = "A multiplayer text world server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the world server
    Start {
        /// Listen address, overriding `server.bind` (e.g. 0.0.0.0:4000)
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Create a starter configuration and world database
    Init,
    /// Show world and session statistics
    Status {
        /// Print one JSON object instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { bind } => {
            let mut config = Config::load(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            info!("Starting worldcore v{}", env!("CARGO_PKG_VERSION"));
            let server = WorldServer::new(config)?;
            server.run().await?;
        }
        Commands::Init => {
            init_logging(&None, cli.verbose);
            info!("Initializing new world configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);

            let config = Config::load(&cli.config).await?;
            let server = WorldServer::new(config)?;
            let stats = server.context().store.stats();
            info!(
                "World database ready: {} zones, {} rooms",
                stats.zones, stats.rooms
            );
        }
        Commands::Status { json } => {
            let config = Config::load(&cli.config).await?;
            // Keep stdout clean for machine-readable output.
            if !json {
                init_logging(&Some(config.clone()), cli.verbose);
            }
            let server = WorldServer::new(config)?;
            server.show_status(json)?;
        }
    }

    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity wins over the configured level
    let level = match (verbosity, config) {
        (0, Some(cfg)) => cfg.logging.level_filter(),
        (0, None) => log::LevelFilter::Info,
        (1, _) => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(level);
    // sled is chatty at debug
    builder.filter_module("sled", log::LevelFilter::Warn);

    let log_file = config
        .as_ref()
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| eprintln!("Cannot open log file {}: {}", path, e))
                .ok()
        });

    match log_file {
        Some(file) => {
            let file = std::sync::Mutex::new(file);
            // Foreground runs also echo to the console
            let is_tty = atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = file.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(|fmt, record| {
                writeln!(
                    fmt,
                    "{} [{}] {}",
                    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                    record.level(),
                    record.args()
                )
            });
        }
    }
    let _ = builder.try_init();
}
