use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use crashreplay::mount::MountTarget;
use crashreplay::{
    Error, MountBackend, MountError, MountState, NullMount, ParseError, ReplayConfig, Replayer,
    RetryPolicy, SysFs,
};
use crashreplay::store::StoreError;
use tempfile::TempDir;

/// Counts mount/unmount calls and can be told to fail either one
#[derive(Default)]
struct CountingMount {
    mounts: u32,
    unmounts: u32,
    fail_mount: bool,
    busy_after: Option<u32>,
    sleeps: Vec<Duration>,
}

impl MountBackend for CountingMount {
    fn mount(&mut self, _target: &MountTarget) -> io::Result<()> {
        if self.fail_mount {
            return Err(io::Error::from_raw_os_error(libc::ENODEV));
        }
        self.mounts += 1;
        Ok(())
    }

    fn unmount(&mut self, _target: &MountTarget) -> io::Result<()> {
        if let Some(limit) = self.busy_after {
            if self.unmounts >= limit {
                return Err(io::Error::from_raw_os_error(libc::EBUSY));
            }
        }
        self.unmounts += 1;
        Ok(())
    }

    fn sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
    }
}

fn config_for(dir: &Path, instances: u32) -> ReplayConfig {
    ReplayConfig {
        mount_point: dir.to_path_buf(),
        path_prefix: dir.to_string_lossy().into_owned(),
        instances,
        ..Default::default()
    }
}

fn output(audit: Vec<u8>) -> String {
    String::from_utf8(audit).unwrap()
}

#[test]
fn test_write_at_sequence_seven() {
    env_logger::builder().is_test(true).try_init().ok();

    let dir = TempDir::new().unwrap();
    let log = "\
mkdir, /d-02, 0755
rmdir, /d-02
create_file, /d-00/f-01, 0100, 0644
chmod, /d-00/f-01, 0600
truncate, /d-00/f-01, 10
unlink, /d-00/f-01
mkdir, /d-03, 0700
write_file, /d-01/f-00, 02, 0, 4096, 4096
";
    let mut replayer = Replayer::new(&config_for(dir.path(), 1), NullMount, SysFs::new());
    let mut audit = Vec::new();
    let summary = replayer.run(log.as_bytes(), &mut audit).unwrap();

    assert_eq!(summary.prepopulated, 4);
    assert_eq!(summary.records, 8);
    assert_eq!(summary.failed_ops, 0);
    assert_eq!(replayer.session().seq(), 8);

    let content = fs::read(dir.path().join("d-01/f-00")).unwrap();
    assert_eq!(content.len(), 4096);
    assert!(content.iter().all(|&b| b == 7));

    let audit = output(audit);
    assert!(audit.contains("seq=7 \n"));
    let write_line = audit
        .lines()
        .find(|l| l.starts_with("write_file("))
        .unwrap();
    assert!(write_line.contains("ret=4096"), "{}", write_line);
}

#[test]
fn test_lockstep_fill_values() {
    let dir = TempDir::new().unwrap();
    let log = "\
write_file, /d-01/f-00, 02, 0, 1
write_file, /d-01/f-00, 02, 1, 1
write_file, /d-01/f-00, 02, 2, 1
write_file, /d-01/f-00, 02, 3, 1
";
    let mut replayer = Replayer::new(&config_for(dir.path(), 2), NullMount, SysFs::new());
    replayer.run(log.as_bytes(), &mut io::sink()).unwrap();

    let content = fs::read(dir.path().join("d-01/f-00")).unwrap();
    assert_eq!(content, vec![0, 0, 1, 1]);
}

#[test]
fn test_operation_failures_are_recorded() {
    let dir = TempDir::new().unwrap();
    let log = "\
unlink, /does-not-exist
rename, /d-01, /d-02
rmdir, /d-01
";
    let mut replayer = Replayer::new(&config_for(dir.path(), 1), NullMount, SysFs::new());
    let mut audit = Vec::new();
    let summary = replayer.run(log.as_bytes(), &mut audit).unwrap();

    assert_eq!(summary.records, 3);
    assert_eq!(summary.failed_ops, 2);
    assert_eq!(summary.unrecognized, 1);

    let audit = output(audit);
    assert!(audit.contains("ret=-1, errno=No such file or directory"));
    assert!(audit.contains("Unrecognized op: rename"));
    assert!(audit.contains("rmdir("));
}

#[test]
fn test_every_record_gets_its_own_mount_cycle() {
    let dir = TempDir::new().unwrap();
    let log = "mkdir, /d-02, 0755\nrmdir, /d-02\nbogus\n";
    let mut replayer = Replayer::new(
        &config_for(dir.path(), 1),
        CountingMount::default(),
        SysFs::new(),
    );
    replayer.run(log.as_bytes(), &mut io::sink()).unwrap();

    let backend = replayer.session().mount().backend();
    // one cycle for the bootstrap, one per record
    assert_eq!(backend.mounts, 4);
    assert_eq!(backend.unmounts, 4);
    assert_eq!(replayer.session().mount().state(), MountState::Unmounted);
}

#[test]
fn test_malformed_record_is_fatal() {
    let dir = TempDir::new().unwrap();
    let log = "mkdir, /d-02, 0755\nchmod, /d-02, 0x9\nrmdir, /d-02\n";
    let mut replayer = Replayer::new(
        &config_for(dir.path(), 1),
        CountingMount::default(),
        SysFs::new(),
    );
    let err = replayer.run(log.as_bytes(), &mut io::sink()).unwrap_err();

    assert!(matches!(err, Error::Parse { seq: 1, .. }), "{}", err);
    // the record after the bad one never ran
    assert!(dir.path().join("d-02").is_dir());
    assert_eq!(replayer.session().mount().state(), MountState::Unmounted);
}

#[test]
fn test_mount_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let backend = CountingMount {
        fail_mount: true,
        ..Default::default()
    };
    let mut replayer = Replayer::new(&config_for(dir.path(), 1), backend, SysFs::new());
    let err = replayer.run("mkdir, /d-02, 0755\n".as_bytes(), &mut io::sink()).unwrap_err();

    assert!(matches!(err, Error::Mount(MountError::Mount { .. })));
    assert!(!dir.path().join("d-01").exists());
}

#[test]
fn test_strict_unmount_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut config = config_for(dir.path(), 1);
    config.retry = RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
    };
    // the bootstrap unmount succeeds, the first record's unmount stays busy
    let backend = CountingMount {
        busy_after: Some(1),
        ..Default::default()
    };
    let mut replayer = Replayer::new(&config, backend, SysFs::new());
    let err = replayer
        .run("mkdir, /d-02, 0755\nrmdir, /d-02\n".as_bytes(), &mut io::sink())
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Mount(MountError::RetriesExhausted { attempts: 3, .. })
    ));
    let backend = replayer.session().mount().backend();
    assert_eq!(
        backend.sleeps,
        vec![
            Duration::from_millis(1),
            Duration::from_millis(2),
            Duration::from_millis(4)
        ]
    );
    assert_eq!(replayer.session().mount().state(), MountState::Failed);
    assert_eq!(replayer.session().seq(), 0);
}

#[test]
fn test_bootstrap_twice() {
    let dir = TempDir::new().unwrap();
    let mut replayer = Replayer::new(&config_for(dir.path(), 1), NullMount, SysFs::new());
    assert_eq!(replayer.bootstrap(&mut io::sink()).unwrap(), 4);
    assert_eq!(replayer.bootstrap(&mut io::sink()).unwrap(), 4);
    assert!(dir.path().join("d-00/d-01").is_dir());
}

#[test]
fn test_write_with_create_flag_uses_fixed_mode() {
    let dir = TempDir::new().unwrap();
    let mut replayer = Replayer::new(&config_for(dir.path(), 1), NullMount, SysFs::new());
    let summary = replayer
        .run("write_file, /d-01/new, 0102, 0, 4\n".as_bytes(), &mut io::sink())
        .unwrap();
    assert_eq!(summary.failed_ops, 0);

    let meta = fs::metadata(dir.path().join("d-01/new")).unwrap();
    assert_eq!(meta.len(), 4);
    let mode = meta.permissions().mode() & 0o7777;
    // at most rw-r--r--, whatever the umask clears
    assert_eq!(mode & !0o644, 0, "mode {:o}", mode);
    assert_eq!(mode & 0o600, 0o600, "mode {:o}", mode);
}

#[test]
fn test_oversized_write_is_fatal_and_unmounts() {
    let dir = TempDir::new().unwrap();
    let log = format!("write_file, /d-01/f-00, 02, 0, {}\nrmdir, /d-01\n", usize::MAX / 2);
    let mut replayer = Replayer::new(
        &config_for(dir.path(), 1),
        CountingMount::default(),
        SysFs::new(),
    );
    let err = replayer.run(log.as_bytes(), &mut io::sink()).unwrap_err();

    assert!(matches!(err, Error::Store(StoreError::OutOfMemory { .. })), "{}", err);
    // the session opened for the write was closed again
    let backend = replayer.session().mount().backend();
    assert_eq!(backend.mounts, 2);
    assert_eq!(backend.unmounts, 2);
    assert_eq!(replayer.session().mount().state(), MountState::Unmounted);
    assert_eq!(replayer.session().seq(), 0);
}

#[test]
fn test_non_utf8_record_names_the_line() {
    let dir = TempDir::new().unwrap();
    let mut log = b"mkdir, /d-02, 0755\nunlink, /d-01/".to_vec();
    log.extend_from_slice(&[0xff, 0xfe]);
    log.push(b'\n');

    let mut replayer = Replayer::new(&config_for(dir.path(), 1), NullMount, SysFs::new());
    let err = replayer.run(log.as_slice(), &mut io::sink()).unwrap_err();

    match err {
        Error::Parse { seq, line, source } => {
            assert_eq!(seq, 1);
            assert!(line.starts_with("unlink, /d-01/"), "{}", line);
            assert_eq!(source, ParseError::NotUtf8);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(dir.path().join("d-02").is_dir());
}
