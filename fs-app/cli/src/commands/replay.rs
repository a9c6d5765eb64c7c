//! Replay command implementation

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use crashreplay::{MountBackend, NullMount, ReplayConfig, ReplaySummary, Replayer, SysFs, SysMount};
use log::{info, warn};

use super::{audit_sink, TargetArgs};

/// Exit status after an operator interrupt
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Args, Debug)]
pub struct ReplayArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Operation log to replay (defaults to the configured sequence log)
    #[arg(short, long)]
    pub log: Option<PathBuf>,

    /// Write the audit trail to this file instead of stdout
    #[arg(long)]
    pub audit_log: Option<PathBuf>,
}

pub fn run(args: ReplayArgs) -> Result<()> {
    let mut config = args.target.load_config()?;
    if let Some(log) = args.log {
        config.sequence_log = log;
    }

    info!(
        "Replaying {} on {} ({} at {}, {} instance(s))",
        config.sequence_log.display(),
        config.device.display(),
        config.fs_type,
        config.mount_point.display(),
        config.instances
    );

    let stop = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        warn!("Interrupt received, stopping after the current operation");
        handler_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to install interrupt handler")?;

    let summary = if args.target.skip_mount {
        replay_with(&config, NullMount, stop, args.audit_log)?
    } else {
        replay_with(&config, SysMount, stop, args.audit_log)?
    };

    println!(
        "Replayed {} operations ({} failed, {} unrecognized) after pre-populating {} entries",
        summary.records, summary.failed_ops, summary.unrecognized, summary.prepopulated
    );

    if summary.interrupted {
        warn!("Replay interrupted");
        std::process::exit(INTERRUPTED_EXIT_CODE);
    }
    Ok(())
}

fn replay_with<B: MountBackend>(
    config: &ReplayConfig,
    backend: B,
    stop: Arc<AtomicBool>,
    audit_log: Option<PathBuf>,
) -> Result<ReplaySummary> {
    let mut audit = audit_sink(audit_log.as_ref())?;
    let mut replayer = Replayer::new(config, backend, SysFs::new()).with_stop_flag(stop);
    let summary = replayer
        .run_file(&config.sequence_log, &mut audit)
        .context("Replay failed")?;
    Ok(summary)
}
