//! Replay driver
//!
//! Mounts once to pre-populate the baseline tree, then brackets every log
//! record with its own mount/unmount cycle so an external checker can cut
//! power between any two operations and still find an independently
//! mountable filesystem. This is the only place that decides whether an
//! error ends the run.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::bootstrap::{self, PREPOPULATED_PATHS};
use crate::config::ReplayConfig;
use crate::dispatch::{dispatch, Dispatched, ResultLine};
use crate::error::{Error, Result};
use crate::fsops::FsOps;
use crate::mount::{MountBackend, MountController, MountState};
use crate::record::{Operation, ParseError};
use crate::session::ReplaySession;
use crate::tokenizer::{tokenize, LOG_DELIMITERS};

/// Totals of one replay run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Entries created by the bootstrap
    pub prepopulated: usize,
    /// Records dispatched (including unrecognized ones)
    pub records: u64,
    /// Records whose operation name was unknown
    pub unrecognized: u64,
    /// Dispatched operations whose primitive reported failure
    pub failed_ops: u64,
    /// The run stopped early on request
    pub interrupted: bool,
}

/// Replays an operation log against one filesystem instance
pub struct Replayer<B: MountBackend, F: FsOps> {
    session: ReplaySession<B>,
    fs: F,
    mount_point: PathBuf,
    path_prefix: String,
    stop: Option<Arc<AtomicBool>>,
}

impl<B: MountBackend, F: FsOps> Replayer<B, F> {
    /// Build a replayer for `config` on top of the given backends
    pub fn new(config: &ReplayConfig, backend: B, fs: F) -> Self {
        let mount = MountController::new(backend, config.mount_target(), config.retry);
        Self {
            session: ReplaySession::new(mount, config.instances),
            fs,
            mount_point: config.mount_point.clone(),
            path_prefix: config.path_prefix.clone(),
            stop: None,
        }
    }

    /// Stop between records once `flag` is set
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    /// The replay session
    pub fn session(&self) -> &ReplaySession<B> {
        &self.session
    }

    /// The filesystem primitives
    pub fn fs(&self) -> &F {
        &self.fs
    }

    fn stop_requested(&self) -> bool {
        self.stop.as_ref().is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Best-effort unmount after a fatal error, if a session is still open
    fn cleanup(&mut self) {
        if self.session.mount().state() == MountState::Mounted {
            // relaxed: a failure here is only logged
            let _ = self.session.mount_mut().unmount(false);
        }
    }

    /// Run `f` and clean up the mount session if it fails
    fn guarded<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let result = f(self);
        if let Err(e) = &result {
            error!("{}", e);
            self.cleanup();
        }
        result
    }

    /// Mount, create the pre-populated tree, and strictly unmount
    pub fn bootstrap<W: Write>(&mut self, audit: &mut W) -> Result<usize> {
        self.guarded(|this| {
            this.session.mount_mut().mount()?;
            let created = bootstrap::run(&mut this.fs, &this.mount_point, PREPOPULATED_PATHS, audit)?;
            this.session.mount_mut().unmount(true)?;
            Ok(created)
        })
    }

    /// Open the log at `path`, then [`run`](Self::run) it
    pub fn run_file<W: Write>(&mut self, path: &Path, audit: &mut W) -> Result<ReplaySummary> {
        let file = File::open(path).map_err(|source| Error::LogOpen {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Replaying {}", path.display());
        self.run(BufReader::new(file), audit)
    }

    /// Bootstrap, then replay every record of `log`
    pub fn run<R: BufRead, W: Write>(&mut self, log: R, audit: &mut W) -> Result<ReplaySummary> {
        let prepopulated = self.bootstrap(audit)?;
        let mut summary = self.replay(log, audit)?;
        summary.prepopulated = prepopulated;
        Ok(summary)
    }

    /// Replay every record of `log` without bootstrapping
    pub fn replay<R: BufRead, W: Write>(&mut self, mut log: R, audit: &mut W) -> Result<ReplaySummary> {
        let mut summary = ReplaySummary::default();
        let mut line = Vec::new();

        loop {
            if self.stop_requested() {
                warn!("Replay interrupted before seq={}", self.session.seq());
                self.cleanup();
                summary.interrupted = true;
                break;
            }

            line.clear();
            if log.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let outcome = self.guarded(|this| this.replay_record(&line, audit))?;
            summary.records += 1;
            match outcome {
                Dispatched::Executed(res) if res.is_err() => summary.failed_ops += 1,
                Dispatched::Executed(_) => {}
                Dispatched::Unrecognized(_) => summary.unrecognized += 1,
            }
        }

        info!(
            "Replayed {} records ({} failed, {} unrecognized)",
            summary.records, summary.failed_ops, summary.unrecognized
        );
        Ok(summary)
    }

    /// Parse, mount, dispatch, unmount and advance for one log line
    fn replay_record<W: Write>(&mut self, raw: &[u8], audit: &mut W) -> Result<Dispatched> {
        let seq = self.session.seq();
        writeln!(audit, "seq={} ", seq).map_err(Error::Audit)?;

        // paths reach the primitives as &str, so records must be UTF-8
        let text = std::str::from_utf8(raw)
            .map_err(|_| Error::Parse {
                seq,
                line: String::from_utf8_lossy(raw).trim_end().to_string(),
                source: ParseError::NotUtf8,
            })?
            .trim_end_matches(['\n', '\r']);

        let fields = tokenize(text, LOG_DELIMITERS)?;
        let op = Operation::parse(&fields)
            .map_err(|source| Error::Parse {
                seq,
                line: text.to_string(),
                source,
            })?
            .with_path_prefix(&self.path_prefix);
        drop(fields);
        debug!("seq={} decoded {:?}", seq, op);

        self.session.mount_mut().mount()?;
        let outcome = dispatch(&op, self.session.fill_value(), &mut self.fs)?;
        writeln!(audit, "{}", ResultLine { op: &op, outcome: &outcome }).map_err(Error::Audit)?;
        audit.flush().map_err(Error::Audit)?;
        self.session.mount_mut().unmount(true)?;

        self.session.advance();
        Ok(outcome)
    }
}
