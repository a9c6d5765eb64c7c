//! Bootstrap command implementation

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use crashreplay::{MountBackend, NullMount, ReplayConfig, Replayer, SysFs, SysMount};
use log::info;

use super::{audit_sink, TargetArgs};

#[derive(Args, Debug)]
pub struct BootstrapArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Write the pre-population trail to this file instead of stdout
    #[arg(long)]
    pub audit_log: Option<PathBuf>,
}

pub fn run(args: BootstrapArgs) -> Result<()> {
    let config = args.target.load_config()?;
    info!(
        "Pre-populating {} mounted at {}",
        config.device.display(),
        config.mount_point.display()
    );

    let created = if args.target.skip_mount {
        bootstrap_with(&config, NullMount, args.audit_log)?
    } else {
        bootstrap_with(&config, SysMount, args.audit_log)?
    };

    println!(
        "Pre-populated {} entries under {}",
        created,
        config.mount_point.display()
    );
    Ok(())
}

fn bootstrap_with<B: MountBackend>(
    config: &ReplayConfig,
    backend: B,
    audit_log: Option<PathBuf>,
) -> Result<usize> {
    let mut audit = audit_sink(audit_log.as_ref())?;
    let mut replayer = Replayer::new(config, backend, SysFs::new());
    replayer.bootstrap(&mut audit).context("Bootstrap failed")
}
