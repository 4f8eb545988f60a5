//! Job tracking for excavation runs.
//!
//! A job is the externally visible record of one run: its phase, the last
//! progress percentage and step label, and on success the finished report.
//! A failed run keeps its error message and never carries a report.
//!
//! [`JobStore`] is the persistence seam; [`InMemoryJobStore`] keeps records
//! in a `HashMap` behind `std::sync::RwLock` and is what the CLI and tests use.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::excavate::{Excavation, Phase};
use crate::models::ExcavationReport;
use crate::progress::ProgressReporter;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: String,
    pub repository: String,
    pub status: Phase,
    pub progress: u8,
    pub step: String,
    pub error: Option<String>,
    pub report: Option<ExcavationReport>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRecord {
    pub fn new(repository: &str) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            repository: repository.to_string(),
            status: Phase::Pending,
            progress: 0,
            step: "queued".to_string(),
            error: None,
            report: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Changes applied to a stored job. `None` fields are left untouched.
#[derive(Debug, Default)]
pub struct JobUpdate {
    pub status: Option<Phase>,
    pub progress: Option<u8>,
    pub step: Option<String>,
    pub error: Option<String>,
    pub report: Option<ExcavationReport>,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, repository: &str) -> Result<JobRecord>;
    async fn get(&self, id: &str) -> Result<Option<JobRecord>>;
    async fn update(&self, id: &str, update: JobUpdate) -> Result<JobRecord>;
    /// All jobs, oldest first.
    async fn list(&self) -> Result<Vec<JobRecord>>;
}

pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, JobRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    fn apply(&self, id: &str, update: JobUpdate) -> Result<JobRecord> {
        let mut jobs = self
            .jobs
            .write()
            .map_err(|_| anyhow!("job store lock poisoned"))?;
        let job = match jobs.get_mut(id) {
            Some(job) => job,
            None => bail!("unknown job: {}", id),
        };
        if job.status.is_terminal() {
            bail!("job {} already finished", id);
        }
        if let Some(status) = update.status {
            job.status = status;
        }
        if let Some(progress) = update.progress {
            // Progress never moves backwards.
            job.progress = job.progress.max(progress);
        }
        if let Some(step) = update.step {
            job.step = step;
        }
        if update.error.is_some() {
            job.error = update.error;
        }
        if update.report.is_some() {
            job.report = update.report;
        }
        job.updated_at = chrono::Utc::now().to_rfc3339();
        Ok(job.clone())
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, repository: &str) -> Result<JobRecord> {
        let job = JobRecord::new(repository);
        let mut jobs = self
            .jobs
            .write()
            .map_err(|_| anyhow!("job store lock poisoned"))?;
        jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn get(&self, id: &str) -> Result<Option<JobRecord>> {
        let jobs = self
            .jobs
            .read()
            .map_err(|_| anyhow!("job store lock poisoned"))?;
        Ok(jobs.get(id).cloned())
    }

    async fn update(&self, id: &str, update: JobUpdate) -> Result<JobRecord> {
        self.apply(id, update)
    }

    async fn list(&self) -> Result<Vec<JobRecord>> {
        let jobs = self
            .jobs
            .read()
            .map_err(|_| anyhow!("job store lock poisoned"))?;
        let mut all: Vec<JobRecord> = jobs.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }
}

/// Forwards progress to an outer reporter and mirrors it into the job
/// record. Store writes happen synchronously because reporters are sync;
/// only [`InMemoryJobStore`] is supported here.
struct JobProgress<'a> {
    store: &'a InMemoryJobStore,
    job_id: &'a str,
    inner: &'a dyn ProgressReporter,
}

impl ProgressReporter for JobProgress<'_> {
    fn report(&self, percent: u8, step: &str) {
        self.inner.report(percent, step);
        let update = JobUpdate {
            progress: Some(percent),
            step: Some(step.to_string()),
            ..JobUpdate::default()
        };
        if let Err(e) = self.store.apply(self.job_id, update) {
            tracing::debug!("progress for job {} not recorded: {}", self.job_id, e);
        }
    }

    fn phase(&self, phase: Phase) {
        self.inner.phase(phase);
        // Complete is written together with the report.
        if phase == Phase::Complete {
            return;
        }
        let update = JobUpdate {
            status: Some(phase),
            ..JobUpdate::default()
        };
        if let Err(e) = self.store.apply(self.job_id, update) {
            tracing::debug!("phase for job {} not recorded: {}", self.job_id, e);
        }
    }
}

/// Run an excavation as a tracked job and return its final record.
///
/// The run's own failure is not an `Err` here: it is recorded on the job
/// (status `failed`, error message set, no report). `Err` means the store
/// itself failed.
pub async fn run_job(
    store: &InMemoryJobStore,
    repository: &str,
    excavation: &Excavation<'_>,
    progress: &dyn ProgressReporter,
) -> Result<JobRecord> {
    let job = store.create(repository).await?;
    tracing::info!("job {} started for {}", job.id, repository);

    let reporter = JobProgress {
        store,
        job_id: &job.id,
        inner: progress,
    };
    let update = match excavation.run(&reporter).await {
        Ok(report) => JobUpdate {
            status: Some(Phase::Complete),
            progress: Some(100),
            step: Some("complete".to_string()),
            report: Some(report),
            ..JobUpdate::default()
        },
        Err(e) => {
            tracing::warn!("job {} failed: {}", job.id, e);
            JobUpdate {
                status: Some(Phase::Failed),
                step: Some("failed".to_string()),
                error: Some(e.to_string()),
                ..JobUpdate::default()
            }
        }
    };
    store.update(&job.id, update).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::excavate::ExcavationOptions;
    use crate::progress::NoProgress;
    use crate::vcs::MemoryVcs;
    use std::time::Duration;

    fn fixture() -> MemoryVcs {
        MemoryVcs::new("fixture")
            .with_file("src/app.ts", "export function main() {}\n")
            .with_commit("c1", "Ada", "ada@example.com", 1_700_000_000, "init", &["src/app.ts"])
    }

    fn options() -> ExcavationOptions {
        ExcavationOptions {
            skip_analysis: true,
            request_interval: Duration::ZERO,
            ..ExcavationOptions::default()
        }
    }

    #[tokio::test]
    async fn test_create_get_list() {
        let store = InMemoryJobStore::new();
        let a = store.create("repo-a").await.unwrap();
        let b = store.create("repo-b").await.unwrap();
        assert_eq!(a.status, Phase::Pending);
        assert_eq!(store.get(&a.id).await.unwrap().unwrap().repository, "repo-a");
        assert!(store.get("nope").await.unwrap().is_none());
        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|j| j.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&b.id));
    }

    #[tokio::test]
    async fn test_update_unknown_job_fails() {
        let store = InMemoryJobStore::new();
        assert!(store.update("missing", JobUpdate::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_progress_never_decreases() {
        let store = InMemoryJobStore::new();
        let job = store.create("r").await.unwrap();
        let up = |p| JobUpdate {
            progress: Some(p),
            ..JobUpdate::default()
        };
        store.update(&job.id, up(40)).await.unwrap();
        let after = store.update(&job.id, up(20)).await.unwrap();
        assert_eq!(after.progress, 40);
    }

    #[tokio::test]
    async fn test_successful_job_keeps_report() {
        let vcs = fixture();
        let store = InMemoryJobStore::new();
        let excavation = Excavation::new(&vcs, options());

        let job = run_job(&store, "fixture", &excavation, &NoProgress).await.unwrap();
        assert_eq!(job.status, Phase::Complete);
        assert_eq!(job.progress, 100);
        assert!(job.error.is_none());
        assert_eq!(job.report.unwrap().files.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_job_has_error_and_no_report() {
        let vcs = fixture();
        let store = InMemoryJobStore::new();
        let excavation = Excavation::new(&vcs, options());
        excavation.cancel_flag().cancel();

        let job = run_job(&store, "fixture", &excavation, &NoProgress).await.unwrap();
        assert_eq!(job.status, Phase::Failed);
        assert!(job.report.is_none());
        assert!(job.error.unwrap().contains("cancelled"));
    }

    #[tokio::test]
    async fn test_finished_job_is_frozen() {
        let vcs = fixture();
        let store = InMemoryJobStore::new();
        let excavation = Excavation::new(&vcs, options());
        let job = run_job(&store, "fixture", &excavation, &NoProgress).await.unwrap();

        let update = JobUpdate {
            status: Some(Phase::Analysis),
            ..JobUpdate::default()
        };
        assert!(store.update(&job.id, update).await.is_err());
    }
}
