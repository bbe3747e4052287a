use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Name of the lock file at the vault root
pub const LOCK_FILE: &str = ".retag.lock";

const DEFAULT_WAIT: Duration = Duration::from_secs(5);
const RETRY_EVERY: Duration = Duration::from_millis(25);

/// Who holds the vault lock, as recorded in the lock file:
/// `<pid> <operation>` on one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolder {
    pub pid: u32,
    pub operation: String,
}

impl LockHolder {
    fn current(operation: &str) -> Self {
        LockHolder {
            pid: std::process::id(),
            operation: operation.to_string(),
        }
    }

    fn parse(text: &str) -> Option<Self> {
        let line = text.lines().next()?;
        let (pid, operation) = line.split_once(' ')?;
        Some(LockHolder {
            pid: pid.parse().ok()?,
            operation: operation.trim().to_string(),
        })
    }
}

impl fmt::Display for LockHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {} ({})", self.pid, self.operation)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("vault is busy: {path} is held by {}", describe_holder(.holder))]
    Busy {
        path: PathBuf,
        holder: Option<LockHolder>,
    },
    #[error("could not record lock owner in {path}: {source}")]
    Record {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn describe_holder(holder: &Option<LockHolder>) -> String {
    match holder {
        Some(holder) => holder.to_string(),
        None => "another retag process".to_string(),
    }
}

/// Exclusive flock on `.retag.lock`, held for the length of one writing
/// operation. The file names the holder so a blocked process can say who
/// it is waiting on; it is removed on drop.
pub struct VaultLock {
    _file: File,
    path: PathBuf,
    holder: LockHolder,
}

impl VaultLock {
    /// Lock the vault for `operation`, retrying for up to `wait`.
    pub fn acquire(root: &Path, operation: &str, wait: Duration) -> Result<Self, LockError> {
        let path = root.join(LOCK_FILE);
        let deadline = Instant::now() + wait;
        loop {
            let file = open_lock_file(&path)?;
            // the previous holder may unlink the file between our open and
            // flock; only a lock on the file still at `path` counts
            if try_flock(&file) && is_current_file(&file, &path) {
                let holder = LockHolder::current(operation);
                record_holder(&file, &holder).map_err(|source| LockError::Record {
                    path: path.clone(),
                    source,
                })?;
                tracing::debug!(path = %path.display(), operation, "lock acquired");
                return Ok(VaultLock {
                    _file: file,
                    path,
                    holder,
                });
            }
            if Instant::now() >= deadline {
                let holder = read_holder(root);
                tracing::debug!(path = %path.display(), holder = ?holder, "lock busy");
                return Err(LockError::Busy { path, holder });
            }
            std::thread::sleep(RETRY_EVERY);
        }
    }

    pub fn acquire_default(root: &Path, operation: &str) -> Result<Self, LockError> {
        Self::acquire(root, operation, DEFAULT_WAIT)
    }

    pub fn holder(&self) -> &LockHolder {
        &self.holder
    }
}

impl Drop for VaultLock {
    fn drop(&mut self) {
        // unlink while still holding the flock; waiters re-open and re-check
        let _ = fs::remove_file(&self.path);
    }
}

/// The holder recorded in a vault's lock file, if any.
pub fn read_holder(root: &Path) -> Option<LockHolder> {
    fs::read_to_string(root.join(LOCK_FILE))
        .ok()
        .and_then(|text| LockHolder::parse(&text))
}

fn open_lock_file(path: &Path) -> Result<File, LockError> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|source| LockError::Open {
            path: path.to_path_buf(),
            source,
        })
}

fn record_holder(mut file: &File, holder: &LockHolder) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{} {}", holder.pid, holder.operation)?;
    file.sync_data()
}

#[cfg(unix)]
fn try_flock(file: &File) -> bool {
    use std::os::unix::io::AsRawFd;
    unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) == 0 }
}

#[cfg(unix)]
fn is_current_file(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (file.metadata(), fs::metadata(path)) {
        (Ok(open), Ok(on_disk)) => open.dev() == on_disk.dev() && open.ino() == on_disk.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn try_flock(_file: &File) -> bool {
    true
}

#[cfg(not(unix))]
fn is_current_file(_file: &File, _path: &Path) -> bool {
    true
}
