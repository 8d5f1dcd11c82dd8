//! Attachment sources: where the two raw extracts come from.
//!
//! The mailbox that originally delivered the files is replaced by a drop
//! directory. Newest files win; consumed files move to `seen/`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use reconbot_recon::model::SourceSide;

/// Raw bytes for both sides of a run.
#[derive(Debug, Clone)]
pub struct Attachments {
    pub source_a: Vec<u8>,
    pub source_b: Vec<u8>,
    pub source_a_name: String,
    pub source_b_name: String,
}

pub trait AttachmentSource {
    /// Both attachments, or `None` when either is missing.
    fn fetch(&mut self) -> Result<Option<Attachments>, String>;

    /// Mark the last fetched attachments as consumed.
    fn acknowledge(&mut self) -> Result<(), String> {
        Ok(())
    }
}

/// Which side a file name belongs to, by extension.
pub fn classify(path: &Path) -> Option<SourceSide> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "gz" | "csv" | "txt" => Some(SourceSide::A),
        "xls" | "xlsx" | "xlsb" | "ods" => Some(SourceSide::B),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Drop directory
// ---------------------------------------------------------------------------

pub struct DirectoryInbox {
    dir: PathBuf,
    picked: Option<(PathBuf, PathBuf)>,
}

impl DirectoryInbox {
    pub const SEEN_DIR: &'static str = "seen";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), picked: None }
    }

    /// Newest A and B candidates, if both exist.
    fn pick(&self) -> Result<Option<(PathBuf, PathBuf)>, String> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| format!("cannot read inbox {}: {e}", self.dir.display()))?;

        let mut files: Vec<(SystemTime, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| format!("cannot read inbox entry: {e}"))?;
            let path = entry.path();
            let meta = match entry.metadata() {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((modified, path));
        }

        // Newest first; ties broken by name so the choice is stable
        files.sort_by(|x, y| y.0.cmp(&x.0).then_with(|| y.1.cmp(&x.1)));

        let mut source_a = None;
        let mut source_b = None;
        for (_, path) in files {
            match classify(&path) {
                Some(SourceSide::A) if source_a.is_none() => source_a = Some(path),
                Some(SourceSide::B) if source_b.is_none() => source_b = Some(path),
                _ => {}
            }
            if source_a.is_some() && source_b.is_some() {
                break;
            }
        }

        Ok(source_a.zip(source_b))
    }
}

impl AttachmentSource for DirectoryInbox {
    fn fetch(&mut self) -> Result<Option<Attachments>, String> {
        let Some((path_a, path_b)) = self.pick()? else {
            log::info!("inbox {}: source files not found", self.dir.display());
            return Ok(None);
        };

        let attachments = Attachments {
            source_a: read_bytes(&path_a)?,
            source_b: read_bytes(&path_b)?,
            source_a_name: file_name(&path_a),
            source_b_name: file_name(&path_b),
        };
        log::info!(
            "inbox {}: picked {} and {}",
            self.dir.display(),
            attachments.source_a_name,
            attachments.source_b_name
        );
        self.picked = Some((path_a, path_b));
        Ok(Some(attachments))
    }

    fn acknowledge(&mut self) -> Result<(), String> {
        let Some((path_a, path_b)) = self.picked.take() else {
            return Ok(());
        };
        let seen = self.dir.join(Self::SEEN_DIR);
        fs::create_dir_all(&seen)
            .map_err(|e| format!("cannot create {}: {e}", seen.display()))?;
        for path in [path_a, path_b] {
            let target = seen.join(file_name(&path));
            fs::rename(&path, &target).map_err(|e| {
                format!("cannot move {} to {}: {e}", path.display(), target.display())
            })?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Explicit files
// ---------------------------------------------------------------------------

/// Two named files, for manual runs.
pub struct FilePair {
    pub source_a: PathBuf,
    pub source_b: PathBuf,
}

impl AttachmentSource for FilePair {
    fn fetch(&mut self) -> Result<Option<Attachments>, String> {
        for path in [&self.source_a, &self.source_b] {
            if !path.exists() {
                log::warn!("{} does not exist", path.display());
                return Ok(None);
            }
        }
        Ok(Some(Attachments {
            source_a: read_bytes(&self.source_a)?,
            source_b: read_bytes(&self.source_b)?,
            source_a_name: file_name(&self.source_a),
            source_b_name: file_name(&self.source_b),
        }))
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, String> {
    fs::read(path).map_err(|e| format!("cannot read {}: {e}", path.display()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn touch(dir: &Path, name: &str, body: &[u8], age_secs: u64) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        let mtime = SystemTime::now() - Duration::from_secs(age_secs);
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
        path
    }

    #[test]
    fn classify_by_extension() {
        assert_eq!(classify(Path::new("IPAI_20240115.csv.gz")), Some(SourceSide::A));
        assert_eq!(classify(Path::new("export.XLSX")), Some(SourceSide::B));
        assert_eq!(classify(Path::new("export.xls")), Some(SourceSide::B));
        assert_eq!(classify(Path::new("notes.pdf")), None);
        assert_eq!(classify(Path::new("README")), None);
    }

    #[test]
    fn picks_newest_of_each_kind() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "old.gz", b"old-a", 300);
        touch(dir.path(), "new.gz", b"new-a", 10);
        touch(dir.path(), "old.xlsx", b"old-b", 200);
        touch(dir.path(), "new.xls", b"new-b", 20);
        touch(dir.path(), "ignore.pdf", b"pdf", 1);

        let mut inbox = DirectoryInbox::new(dir.path());
        let got = inbox.fetch().unwrap().unwrap();
        assert_eq!(got.source_a_name, "new.gz");
        assert_eq!(got.source_a, b"new-a");
        assert_eq!(got.source_b_name, "new.xls");
        assert_eq!(got.source_b, b"new-b");
    }

    #[test]
    fn missing_side_is_none() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "only.gz", b"a", 10);
        let mut inbox = DirectoryInbox::new(dir.path());
        assert!(inbox.fetch().unwrap().is_none());
    }

    #[test]
    fn acknowledge_moves_files_to_seen() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.gz", b"a", 10);
        touch(dir.path(), "b.xlsx", b"b", 10);

        let mut inbox = DirectoryInbox::new(dir.path());
        assert!(inbox.fetch().unwrap().is_some());
        inbox.acknowledge().unwrap();

        assert!(dir.path().join("seen/a.gz").exists());
        assert!(dir.path().join("seen/b.xlsx").exists());
        assert!(inbox.fetch().unwrap().is_none());
    }

    #[test]
    fn missing_inbox_is_an_error() {
        let mut inbox = DirectoryInbox::new("/nonexistent/reconbot-inbox");
        assert!(inbox.fetch().is_err());
    }

    #[test]
    fn file_pair_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "a.gz", b"a", 0);
        let mut pair = FilePair { source_a: a, source_b: dir.path().join("b.xlsx") };
        assert!(pair.fetch().unwrap().is_none());
    }
}
