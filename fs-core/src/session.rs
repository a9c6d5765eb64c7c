//! Replay session state
//!
//! Owns the sequence counter and the mount session so the driver and the
//! dispatch table share them explicitly instead of through globals.

use crate::mount::{MountBackend, MountController};

/// Uniform fill byte for the write at sequence position `seq` when
/// `instances` filesystems replay the same log in lockstep.
///
/// All instances processing the same logical write compute the same value.
pub fn fill_value(seq: u64, instances: u32) -> u32 {
    (seq / u64::from(instances.max(1))) as u32
}

/// Sequence counter plus the single mount session of one replay
#[derive(Debug)]
pub struct ReplaySession<B: MountBackend> {
    mount: MountController<B>,
    seq: u64,
    instances: u32,
}

impl<B: MountBackend> ReplaySession<B> {
    /// Start a session at sequence position 0
    pub fn new(mount: MountController<B>, instances: u32) -> Self {
        Self {
            mount,
            seq: 0,
            instances: instances.max(1),
        }
    }

    /// Sequence position of the next record
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Number of lockstep filesystem instances
    pub fn instances(&self) -> u32 {
        self.instances
    }

    /// Fill byte for a write dispatched at the current position
    pub fn fill_value(&self) -> u32 {
        fill_value(self.seq, self.instances)
    }

    /// Move past the record just dispatched
    pub fn advance(&mut self) {
        self.seq += 1;
    }

    /// The mount session
    pub fn mount(&self) -> &MountController<B> {
        &self.mount
    }

    /// The mount session, mutably
    pub fn mount_mut(&mut self) -> &mut MountController<B> {
        &mut self.mount
    }
}
