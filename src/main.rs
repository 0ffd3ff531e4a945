//! Binary entrypoint for the Herald CLI.
//!
//! Commands:
//! - `start` - run the operator console against the configured community directory
//! - `init` - create a starter `config.toml`, `data/admin/settings.json` and a sample
//!   `data/directory.json`
//! - `status` - print configuration and directory summary
//!
//! See the library crate docs for module‑level details: `herald::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use herald::admin::SettingsStore;
use herald::config::Config;
use herald::platform::DirectorySeed;
use herald::server::HeraldServer;

#[derive(Parser)]
#[command(name = "herald")]
#[command(about = "Announcement broadcaster and role administration for chat communities")]
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
    /// Start the operator console
    Start,
    /// Initialize a new configuration and data directory
    Init,
    /// Show configuration and directory summary
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start => {
            let config = Config::load(&cli.config).await?;
            init_logging(Some(&config), cli.verbose);
            info!("Starting Herald v{}", env!("CARGO_PKG_VERSION"));
            let mut server = HeraldServer::new(config).await?;
            server.run().await?;
        }
        Commands::Init => {
            init_logging(None, cli.verbose);
            info!("Initializing new Herald configuration");
            let cfg = Config::default();
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);

            let store = SettingsStore::open(&cfg.storage.data_dir).await?;
            info!("Admin settings at {}", store.path().display());

            let directory_path = cfg.storage.directory_path();
            if tokio::fs::metadata(&directory_path).await.is_err() {
                let seed = serde_json::to_string_pretty(&DirectorySeed::sample())?;
                tokio::fs::write(&directory_path, seed).await?;
                info!("Sample community directory written to {}", directory_path.display());
            }
        }
        Commands::Status => {
            let config = Config::load(&cli.config).await?;
            init_logging(Some(&config), cli.verbose);
            let server = HeraldServer::new(config).await?;
            server.show_status().await?;
        }
    }

    Ok(())
}

fn init_logging(config: Option<&Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity wins; otherwise use the configured level
    let base_level = match verbosity {
        0 => config
            .and_then(|c| c.logging.level.parse::<log::LevelFilter>().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });

    match log_file {
        Some(f) => {
            let file = std::sync::Arc::new(std::sync::Mutex::new(f));
            // The console is the operator's UI; only echo logs there when attached to a TTY
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
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
            });
        }
    }
    let _ = builder.try_init();
}
