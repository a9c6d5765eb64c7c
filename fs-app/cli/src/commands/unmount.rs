//! Unmount command implementation

use anyhow::{Context, Result};
use clap::Args;
use crashreplay::{MountController, SysMount};
use log::info;

use super::TargetArgs;

#[derive(Args, Debug)]
pub struct UnmountArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Fail when the filesystem cannot be unmounted
    #[arg(long)]
    pub strict: bool,
}

pub fn run(args: UnmountArgs) -> Result<()> {
    let config = args.target.load_config()?;
    if args.target.skip_mount {
        info!("--skip-mount given, nothing to unmount");
        return Ok(());
    }

    let mut controller = MountController::new(SysMount, config.mount_target(), config.retry);
    let report = controller
        .unmount(args.strict)
        .with_context(|| format!("Failed to unmount {}", config.mount_point.display()))?;

    if report.unmounted {
        println!(
            "✓ Unmounted {} after {} attempt(s), waited {}ms",
            config.mount_point.display(),
            report.attempts,
            report.waited.as_millis()
        );
    } else {
        println!(
            "✗ {} still mounted after {} attempt(s)",
            config.mount_point.display(),
            report.attempts
        );
    }
    Ok(())
}
