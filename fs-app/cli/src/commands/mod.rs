//! Subcommands and the target options they share

pub mod bootstrap;
pub mod check;
pub mod replay;
pub mod unmount;

use std::fs::File;
use std::io::{self, LineWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use crashreplay::ReplayConfig;

/// Where and what to replay against
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// JSON config file; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Backing device of the target filesystem
    #[arg(long)]
    pub device: Option<PathBuf>,

    /// Mount point of the target filesystem
    #[arg(short, long)]
    pub mount_point: Option<PathBuf>,

    /// Filesystem type passed to mount(2)
    #[arg(short = 't', long = "fs-type")]
    pub fs_type: Option<String>,

    /// Filesystem-specific mount data
    #[arg(long)]
    pub mount_data: Option<String>,

    /// Number of filesystem instances replaying the same log in lockstep
    #[arg(short = 'n', long)]
    pub instances: Option<u32>,

    /// Prefix prepended to every path in the log
    #[arg(long)]
    pub path_prefix: Option<String>,

    /// Unmount attempts before giving up on a busy device
    #[arg(long)]
    pub retries: Option<u32>,

    /// Replay against an existing directory tree without mounting anything
    #[arg(long)]
    pub skip_mount: bool,
}

impl TargetArgs {
    /// Defaults, then the config file, then command-line overrides
    pub fn load_config(&self) -> Result<ReplayConfig> {
        let mut config = match &self.config {
            Some(path) => ReplayConfig::from_file(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => ReplayConfig::default(),
        };

        if let Some(device) = &self.device {
            config.device = device.clone();
        }
        if let Some(mount_point) = &self.mount_point {
            config.mount_point = mount_point.clone();
        }
        if let Some(fs_type) = &self.fs_type {
            config.fs_type = fs_type.clone();
        }
        if let Some(data) = &self.mount_data {
            config.mount_data = data.clone();
        }
        if let Some(instances) = self.instances {
            config.instances = instances;
        }
        if let Some(prefix) = &self.path_prefix {
            config.path_prefix = prefix.clone();
        }
        if let Some(retries) = self.retries {
            config.retry.max_attempts = retries;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Line-buffered audit sink: a file when given, stdout otherwise
pub fn audit_sink(path: Option<&PathBuf>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create audit log: {}", path.display()))?;
            Box::new(LineWriter::new(file))
        }
        None => Box::new(io::stdout()),
    })
}
