//! Persistence for `ScheduledJob` records: one JSON file per job under
//! `scheduled-jobs/`, atomic create/replace, tolerant directory scans
//! (spec.md §5, "directory scans tolerate ENOENT").

use super::job::ScheduledJob;
use crate::config::StorageLayout;
use crate::error::Result;
use std::io::Write as _;

#[derive(Clone)]
pub struct JobStore {
    storage: StorageLayout,
}

impl JobStore {
    pub fn new(storage: StorageLayout) -> Self {
        Self { storage }
    }

    pub fn save(&self, job: &ScheduledJob) -> Result<()> {
        let path = self.storage.job_file(&job.job_id);
        let temp_path = path.with_extension("tmp");
        {
            let mut temp = std::fs::File::create(&temp_path)?;
            temp.write_all(serde_json::to_string_pretty(job)?.as_bytes())?;
            temp.sync_all().ok();
        }
        std::fs::rename(&temp_path, &path)?;
        Ok(())
    }

    pub fn get(&self, job_id: &str) -> Result<Option<ScheduledJob>> {
        match std::fs::read_to_string(self.storage.job_file(job_id)) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    pub fn delete(&self, job_id: &str) -> Result<()> {
        match std::fs::remove_file(self.storage.job_file(job_id)) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    pub fn list(&self) -> Result<Vec<ScheduledJob>> {
        let dir = self.storage.scheduled_jobs_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };

        let mut jobs = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            let contents = match std::fs::read_to_string(entry.path()) {
                Ok(contents) => contents,
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => continue,
                Err(error) => return Err(error.into()),
            };
            if let Ok(job) = serde_json::from_str(&contents) {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::job::JobKind;
    use crate::config::StorageLayout;
    use chrono::Utc;

    fn sample_job(job_id: &str) -> ScheduledJob {
        ScheduledJob {
            schema_version: 1,
            job_id: job_id.to_string(),
            kind: JobKind::HeatOn,
            scheduled_time: Utc::now(),
            recurring: false,
            cron_expression: None,
            endpoint: JobKind::HeatOn.default_endpoint().to_string(),
            created_at: Utc::now(),
            owner: "test".to_string(),
            payload: serde_json::json!({}),
        }
    }

    #[test]
    fn save_get_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageLayout::new_for_test(dir.path().to_path_buf());
        let store = JobStore::new(storage);

        let job = sample_job("job-1");
        store.save(&job).unwrap();
        assert_eq!(store.get("job-1").unwrap().unwrap().job_id, "job-1");
        assert_eq!(store.list().unwrap().len(), 1);

        store.delete("job-1").unwrap();
        assert!(store.get("job-1").unwrap().is_none());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn delete_of_missing_job_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageLayout::new_for_test(dir.path().to_path_buf());
        let store = JobStore::new(storage);
        store.delete("ghost").unwrap();
    }

    #[test]
    fn list_tolerates_a_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageLayout::new_for_test(dir.path().to_path_buf());
        std::fs::remove_dir_all(storage.scheduled_jobs_dir()).unwrap();
        let store = JobStore::new(storage);
        assert!(store.list().unwrap().is_empty());
    }
}
