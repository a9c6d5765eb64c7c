//! Crashreplay Command Line Interface
//!
//! Replays recorded filesystem operation logs for crash-consistency testing.

use std::io::Write;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, LevelFilter};

mod commands;

/// Crashreplay - deterministic filesystem operation replay with a mount cycle per operation
#[derive(Parser)]
#[command(
    name = "crashreplay",
    about = "Crash-consistency operation replayer",
    version = env!("CARGO_PKG_VERSION"),
    author = "Crashreplay Contributors"
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pre-populate, then replay an operation log
    Replay(commands::replay::ReplayArgs),

    /// Only create the pre-populated tree on the target filesystem
    Bootstrap(commands::bootstrap::BootstrapArgs),

    /// Parse an operation log without touching any filesystem
    Check(commands::check::CheckArgs),

    /// Unmount the target filesystem with busy-retry backoff
    Unmount(commands::unmount::UnmountArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let log_level = if cli.debug {
        LevelFilter::Debug
    } else if cli.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .init();

    info!("Crashreplay CLI v{} starting...", env!("CARGO_PKG_VERSION"));

    // Execute the appropriate command
    match cli.command {
        Commands::Replay(args) => commands::replay::run(args),
        Commands::Bootstrap(args) => commands::bootstrap::run(args),
        Commands::Check(args) => commands::check::run(args),
        Commands::Unmount(args) => commands::unmount::run(args),
    }
}
