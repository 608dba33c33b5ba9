//! `CronAdapter` (spec.md §4.1): read/mutate the host's scheduled-job table
//! as an ordered list of text entries, with atomic replace, backup-before-
//! write, and advisory locking across processes.
//!
//! Every mutation: (i) snapshots current entries to a timestamped backup
//! file, (ii) writes a fresh entry list atomically (temp file + rename),
//! (iii) holds an advisory file lock for the duration of the mutation.
//! `remove_matching` and the internal rewrite helper never touch an entry
//! lacking the application's `HOTTUB:<job_id>` comment marker.

use crate::config::StorageLayout;
use crate::error::{CronError, Result};
use fs2::FileExt;
use std::fs::File;
use std::io::Write as _;
use std::path::PathBuf;

const MARKER_PREFIX: &str = "HOTTUB:";

/// One line of the cron table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronEntry {
    pub minute: u32,
    pub hour: u32,
    pub day_of_month: u32,
    pub month: u32,
    /// Day-of-week field, carried through verbatim (always `*` for entries
    /// this application writes).
    pub day_of_week: String,
    pub command: String,
    /// Trailing `# ...` comment, without the leading `#`.
    pub comment: Option<String>,
}

impl CronEntry {
    /// Build an entry tagged `HOTTUB:<job_id>` for targeted removal later
    /// (spec.md §4.1, §6 "Cron entry format").
    pub fn tagged(
        fields: crate::time::CronFields,
        command: impl Into<String>,
        job_id: &str,
    ) -> Self {
        Self {
            minute: fields.minute,
            hour: fields.hour,
            day_of_month: fields.day_of_month,
            month: fields.month,
            day_of_week: "*".to_string(),
            command: command.into(),
            comment: Some(format!("{MARKER_PREFIX}{job_id}")),
        }
    }

    /// The `HOTTUB:<id>` tag carried in this entry's comment, if any.
    pub fn tag(&self) -> Option<&str> {
        self.comment
            .as_deref()
            .and_then(|c| c.strip_prefix(MARKER_PREFIX))
    }

    fn render(&self) -> String {
        let base = format!(
            "{} {} {} {} {} {}",
            self.minute, self.hour, self.day_of_month, self.month, self.day_of_week, self.command
        );
        match &self.comment {
            Some(comment) => format!("{base} # {comment}"),
            None => base,
        }
    }

    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let (body, comment) = match line.split_once('#') {
            Some((body, comment)) => (body.trim(), Some(comment.trim().to_string())),
            None => (line, None),
        };

        let mut parts = body.splitn(6, char::is_whitespace);
        let minute: u32 = parts.next()?.parse().ok()?;
        let hour: u32 = parts.next()?.parse().ok()?;
        let day_of_month: u32 = parts.next()?.parse().ok()?;
        let month: u32 = parts.next()?.parse().ok()?;
        let day_of_week = parts.next()?.to_string();
        let command = parts.next().unwrap_or("").trim().to_string();

        Some(Self {
            minute,
            hour,
            day_of_month,
            month,
            day_of_week,
            command,
            comment,
        })
    }
}

/// Where the adapter reads/writes the "host cron table". `File` backs local
/// development and tests against a flat file; `live` would shell out to the
/// host `crontab` binary, selected the same way `WebhookClient` picks
/// `live`/`stub` (spec.md §4.1 implementation notes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CronBackend {
    File,
    Live,
}

#[derive(Debug, Clone)]
pub struct CronAdapter {
    backend: CronBackend,
    flat_file: PathBuf,
    lock_file: PathBuf,
    backups_dir: PathBuf,
}

impl CronAdapter {
    pub fn new(backend: CronBackend, storage: &StorageLayout) -> Self {
        Self {
            backend,
            flat_file: storage.crontab_flat_file(),
            lock_file: storage.crontab_lock_file(),
            backups_dir: storage.crontab_backups_dir(),
        }
    }

    fn open_lock(&self) -> Result<File> {
        File::create(&self.lock_file)
            .map_err(|error| CronError::Access(format!("cannot open lock file: {error}")).into())
    }

    fn read_raw(&self) -> Result<String> {
        match self.backend {
            CronBackend::File => match std::fs::read_to_string(&self.flat_file) {
                Ok(contents) => Ok(contents),
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
                Err(error) => Err(CronError::Access(error.to_string()).into()),
            },
            CronBackend::Live => {
                let output = std::process::Command::new("crontab")
                    .arg("-l")
                    .output()
                    .map_err(|error| CronError::Access(error.to_string()))?;
                // `crontab -l` exits 1 with no crontab installed yet; treat as empty.
                if !output.status.success() {
                    return Ok(String::new());
                }
                String::from_utf8(output.stdout)
                    .map_err(|error| CronError::Access(error.to_string()).into())
            }
        }
    }

    fn write_raw(&self, contents: &str) -> Result<()> {
        match self.backend {
            CronBackend::File => {
                let temp_path = self.flat_file.with_extension("tmp");
                let mut temp = std::fs::File::create(&temp_path).map_err(|error| CronError::Write {
                    backup_path: self.backups_dir.display().to_string(),
                    reason: error.to_string(),
                })?;
                temp.write_all(contents.as_bytes())
                    .map_err(|error| CronError::Write {
                        backup_path: self.backups_dir.display().to_string(),
                        reason: error.to_string(),
                    })?;
                temp.sync_all().ok();
                std::fs::rename(&temp_path, &self.flat_file).map_err(|error| CronError::Write {
                    backup_path: self.backups_dir.display().to_string(),
                    reason: error.to_string(),
                })?;
                Ok(())
            }
            CronBackend::Live => {
                use std::io::Write as _;
                use std::process::Stdio;
                let mut child = std::process::Command::new("crontab")
                    .arg("-")
                    .stdin(Stdio::piped())
                    .spawn()
                    .map_err(|error| CronError::Write {
                        backup_path: self.backups_dir.display().to_string(),
                        reason: error.to_string(),
                    })?;
                child
                    .stdin
                    .as_mut()
                    .expect("piped stdin")
                    .write_all(contents.as_bytes())
                    .map_err(|error| CronError::Write {
                        backup_path: self.backups_dir.display().to_string(),
                        reason: error.to_string(),
                    })?;
                let status = child.wait().map_err(|error| CronError::Write {
                    backup_path: self.backups_dir.display().to_string(),
                    reason: error.to_string(),
                })?;
                if !status.success() {
                    return Err(CronError::Write {
                        backup_path: self.backups_dir.display().to_string(),
                        reason: format!("crontab exited with {status}"),
                    }
                    .into());
                }
                Ok(())
            }
        }
    }

    fn backup(&self, contents: &str) -> Result<()> {
        std::fs::create_dir_all(&self.backups_dir)
            .map_err(|error| CronError::Access(error.to_string()))?;
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.9f");
        let backup_path = self.backups_dir.join(format!("crontab-{stamp}.bak"));
        std::fs::write(&backup_path, contents).map_err(|error| {
            CronError::Write {
                backup_path: backup_path.display().to_string(),
                reason: error.to_string(),
            }
            .into()
        })
    }

    /// List all entries currently in the table, application-owned or not.
    pub fn list(&self) -> Result<Vec<CronEntry>> {
        let lock = self.open_lock()?;
        lock.lock_shared()
            .map_err(|error| CronError::Access(error.to_string()))?;
        let raw = self.read_raw();
        fs2::FileExt::unlock(&lock).ok();
        Ok(raw?.lines().filter_map(CronEntry::parse).collect())
    }

    /// Append one entry, preserving everything already in the table.
    pub fn add(&self, entry: CronEntry) -> Result<()> {
        let lock = self.open_lock()?;
        lock.lock_exclusive()
            .map_err(|error| CronError::Access(error.to_string()))?;
        let result = (|| {
            let raw = self.read_raw()?;
            self.backup(&raw)?;
            let mut entries: Vec<CronEntry> = raw.lines().filter_map(CronEntry::parse).collect();
            entries.push(entry);
            self.write_raw(&render_all(&entries))
        })();
        fs2::FileExt::unlock(&lock).ok();
        result
    }

    /// Remove every entry whose comment tag exactly matches `comment_tag`
    /// (e.g. `HOTTUB:<job_id>`). Entries without the application marker, or
    /// with a different tag, are left untouched. Idempotent: removing a tag
    /// that isn't present is not an error.
    pub fn remove_matching(&self, comment_tag: &str) -> Result<()> {
        let lock = self.open_lock()?;
        lock.lock_exclusive()
            .map_err(|error| CronError::Access(error.to_string()))?;
        let result = (|| {
            let raw = self.read_raw()?;
            self.backup(&raw)?;
            let entries: Vec<CronEntry> = raw
                .lines()
                .filter_map(CronEntry::parse)
                .filter(|entry| entry.comment.as_deref() != Some(comment_tag))
                .collect();
            self.write_raw(&render_all(&entries))
        })();
        fs2::FileExt::unlock(&lock).ok();
        result
    }

    /// Atomically replace the application-managed subset of the table
    /// (every entry carrying a `HOTTUB:` marker) with `entries`, preserving
    /// any foreign, unmarked lines exactly as found.
    pub fn replace_all(&self, entries: &[CronEntry]) -> Result<()> {
        let lock = self.open_lock()?;
        lock.lock_exclusive()
            .map_err(|error| CronError::Access(error.to_string()))?;
        let result = (|| {
            let raw = self.read_raw()?;
            self.backup(&raw)?;
            let foreign: Vec<CronEntry> = raw
                .lines()
                .filter_map(CronEntry::parse)
                .filter(|entry| entry.tag().is_none())
                .collect();
            let mut combined = foreign;
            combined.extend(entries.iter().cloned());
            self.write_raw(&render_all(&combined))
        })();
        fs2::FileExt::unlock(&lock).ok();
        result
    }
}

fn render_all(entries: &[CronEntry]) -> String {
    let mut out = entries.iter().map(CronEntry::render).collect::<Vec<_>>().join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::CronFields;

    fn layout(dir: &tempfile::TempDir) -> StorageLayout {
        let storage = StorageLayout::new_for_test(dir.path().to_path_buf());
        storage
    }

    #[test]
    fn add_then_list_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = CronAdapter::new(CronBackend::File, &layout(&dir));
        let fields = CronFields {
            minute: 5,
            hour: 9,
            day_of_month: 1,
            month: 1,
        };
        let entry = CronEntry::tagged(fields, "/bin/cron-runner job-1", "job-1");
        adapter.add(entry.clone()).unwrap();

        let listed = adapter.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].tag(), Some("job-1"));
    }

    #[test]
    fn remove_matching_only_touches_tagged_entry() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = CronAdapter::new(CronBackend::File, &layout(&dir));
        let fields = CronFields {
            minute: 0,
            hour: 0,
            day_of_month: 1,
            month: 1,
        };
        adapter
            .add(CronEntry::tagged(fields, "/bin/cron-runner a", "a"))
            .unwrap();
        adapter
            .add(CronEntry::tagged(fields, "/bin/cron-runner b", "b"))
            .unwrap();
        // A foreign entry without our marker.
        let foreign = CronEntry {
            minute: 0,
            hour: 3,
            day_of_month: 1,
            month: 1,
            day_of_week: "*".into(),
            command: "/usr/bin/backup.sh".into(),
            comment: None,
        };
        adapter.add(foreign.clone()).unwrap();

        adapter.remove_matching("HOTTUB:a").unwrap();

        let listed = adapter.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|e| e.tag() == Some("b")));
        assert!(listed.iter().any(|e| e.comment.is_none()));
        assert!(!listed.iter().any(|e| e.tag() == Some("a")));
    }

    #[test]
    fn remove_matching_nonexistent_tag_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = CronAdapter::new(CronBackend::File, &layout(&dir));
        adapter.remove_matching("HOTTUB:ghost").unwrap();
        assert!(adapter.list().unwrap().is_empty());
    }

    #[test]
    fn every_mutation_leaves_a_newer_backup() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(&dir);
        let adapter = CronAdapter::new(CronBackend::File, &layout);
        let fields = CronFields {
            minute: 1,
            hour: 1,
            day_of_month: 1,
            month: 1,
        };
        adapter
            .add(CronEntry::tagged(fields, "/bin/cron-runner a", "a"))
            .unwrap();
        adapter.remove_matching("HOTTUB:a").unwrap();

        let backups = std::fs::read_dir(layout.crontab_backups_dir()).unwrap();
        assert_eq!(backups.count(), 2);
    }
}
