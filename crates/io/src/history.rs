//! JSON-file history store.
//!
//! The log is one pretty-printed JSON array, newest run first. Writes go to
//! a sibling `.tmp` file which is fsynced and renamed over the target, so a
//! reader never observes a half-written log. Read-modify-write cycles hold a
//! `.lock` file so two recorders cannot interleave.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use chrono::Utc;
use reconbot_recon::history::HistoryStore;
use reconbot_recon::model::HistoryLog;
use reconbot_recon::ReconError;
use serde::{Deserialize, Serialize};

/// A lock older than this is considered abandoned.
pub const LOCK_STALE_SECONDS: i64 = 600;
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

pub struct JsonFileStore {
    path: PathBuf,
    lock_timeout: Duration,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock_timeout: DEFAULT_LOCK_TIMEOUT }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "history.json".into());
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn ensure_parent(&self) -> Result<(), String> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
                .map_err(|e| format!("cannot create {}: {e}", parent.display())),
            _ => Ok(()),
        }
    }

    fn write_atomic(&self, bytes: &[u8]) -> Result<(), String> {
        self.ensure_parent()?;
        let tmp = self.sibling(".tmp");
        {
            let mut file = fs::File::create(&tmp)
                .map_err(|e| format!("cannot create {}: {e}", tmp.display()))?;
            file.write_all(bytes)
                .and_then(|_| file.sync_all())
                .map_err(|e| format!("cannot write {}: {e}", tmp.display()))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            format!("cannot replace {}: {e}", self.path.display())
        })?;
        sync_parent_dir(&self.path);
        Ok(())
    }
}

impl HistoryStore for JsonFileStore {
    fn load(&self) -> HistoryLog {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HistoryLog::new(),
            Err(e) => {
                log::warn!("history {}: unreadable ({e}), starting empty", self.path.display());
                return HistoryLog::new();
            }
        };
        if text.trim().is_empty() {
            return HistoryLog::new();
        }
        match HistoryLog::from_json(&text) {
            Ok(log) => log,
            Err(e) => {
                log::warn!("history {}: corrupt ({e}), starting empty", self.path.display());
                HistoryLog::new()
            }
        }
    }

    fn save(&self, log: &HistoryLog) -> Result<(), ReconError> {
        let json = log.to_json_pretty().map_err(ReconError::HistoryStore)?;
        self.write_atomic(json.as_bytes()).map_err(ReconError::HistoryStore)?;
        log::debug!("history {}: {} run(s) written", self.path.display(), log.len());
        Ok(())
    }

    fn update(
        &self,
        apply: &mut dyn FnMut(HistoryLog) -> HistoryLog,
    ) -> Result<HistoryLog, ReconError> {
        self.ensure_parent().map_err(ReconError::HistoryStore)?;
        let _lock = HistoryLock::acquire(&self.sibling(".lock"), self.lock_timeout)
            .map_err(ReconError::HistoryStore)?;
        let next = apply(self.load());
        self.save(&next)?;
        Ok(next)
    }
}

// ---------------------------------------------------------------------------
// Lock
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    created_at_rfc3339: String,
}

/// Exclusive lock file. Removed on drop.
pub struct HistoryLock {
    path: PathBuf,
}

impl HistoryLock {
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, String> {
        let deadline = Instant::now() + timeout;
        loop {
            match try_create(path) {
                Ok(()) => return Ok(Self { path: path.to_path_buf() }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(format!("cannot create lock {}: {e}", path.display())),
            }

            if lock_is_stale(path) {
                log::warn!("removing stale history lock {}", path.display());
                let _ = fs::remove_file(path);
                continue;
            }

            if Instant::now() >= deadline {
                let holder = read_info(path)
                    .map(|i| format!(" by pid {} since {}", i.pid, i.created_at_rfc3339))
                    .unwrap_or_default();
                return Err(format!(
                    "history lock {} held{holder}; remove it if the process is dead",
                    path.display()
                ));
            }
            thread::sleep(LOCK_RETRY_INTERVAL);
        }
    }
}

impl Drop for HistoryLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn try_create(path: &Path) -> std::io::Result<()> {
    let info = LockInfo {
        pid: std::process::id(),
        created_at_rfc3339: Utc::now().to_rfc3339(),
    };
    let mut file = OpenOptions::new().create_new(true).write(true).open(path)?;
    let body = serde_json::to_string(&info).map_err(std::io::Error::other)?;
    file.write_all(body.as_bytes())?;
    file.sync_all()
}

fn read_info(path: &Path) -> Option<LockInfo> {
    let text = fs::read_to_string(path).ok()?;
    serde_json::from_str(&text).ok()
}

fn lock_is_stale(path: &Path) -> bool {
    match read_info(path) {
        Some(info) => {
            if !pid_is_alive(info.pid) {
                return true;
            }
            chrono::DateTime::parse_from_rfc3339(&info.created_at_rfc3339)
                .map(|created| {
                    Utc::now().signed_duration_since(created).num_seconds() > LOCK_STALE_SECONDS
                })
                .unwrap_or(true)
        }
        // Unparseable, possibly mid-write: judge by file age
        None => fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| SystemTime::now().duration_since(t).ok())
            .map(|age| age.as_secs() as i64 > LOCK_STALE_SECONDS)
            .unwrap_or(false),
    }
}

#[cfg(target_os = "linux")]
fn pid_is_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn pid_is_alive(_pid: u32) -> bool {
    true
}

fn sync_parent_dir(path: &Path) {
    #[cfg(unix)]
    {
        if let Some(parent) = path.parent() {
            if let Ok(dir) = fs::File::open(parent) {
                let _ = dir.sync_all();
            }
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}
