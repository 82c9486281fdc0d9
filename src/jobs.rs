//! Render jobs as seen by a caller
//!
//! [`JobRegistry`] is the in-memory status map keyed by job id, plus the
//! output directory that holds one `poster-<id>.png` per job.
//! [`PosterService`] ties validation, rendering and the registry together
//! the way a request handler uses them.

use crate::async_api::AsyncRenderer;
use crate::orchestrator::RenderMetadata;
use crate::validate::normalize;
use crate::{BrowserLauncher, Error, RenderOptions, Result};
use base64::Engine as Base64Engine;
use log::{error, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Finished jobs older than this are swept
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Rendering,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    /// Milliseconds since the Unix epoch
    pub started_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<u64>,
    pub output_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RenderMetadata>,
}

impl Job {
    /// Timestamp the retention window counts from
    pub fn last_activity(&self) -> u64 {
        self.finished_at.unwrap_or(self.started_at)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Shared job-status map and output directory
#[derive(Debug, Clone)]
pub struct JobRegistry {
    jobs: Arc<Mutex<HashMap<String, Job>>>,
    output_dir: PathBuf,
    retention: Duration,
}

impl JobRegistry {
    pub fn new(output_dir: impl Into<PathBuf>, retention: Duration) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            output_dir,
            retention,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn output_path(&self, id: &str) -> PathBuf {
        self.output_dir.join(format!("poster-{}.png", id))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Job>> {
        // A panic while holding the lock cannot leave a half-written entry,
        // so a poisoned map is still usable.
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new job in the `rendering` state
    pub fn begin(&self) -> Job {
        let id = Uuid::new_v4().to_string();
        let job = Job {
            output_path: self.output_path(&id),
            id: id.clone(),
            status: JobStatus::Rendering,
            started_at: now_ms(),
            finished_at: None,
            error: None,
            metadata: None,
        };
        self.lock().insert(id, job.clone());
        job
    }

    pub fn complete(&self, id: &str, metadata: RenderMetadata) {
        if let Some(job) = self.lock().get_mut(id) {
            job.status = JobStatus::Completed;
            job.finished_at = Some(now_ms());
            job.metadata = Some(metadata);
        }
    }

    pub fn fail(&self, id: &str, message: impl Into<String>) {
        if let Some(job) = self.lock().get_mut(id) {
            job.status = JobStatus::Failed;
            job.finished_at = Some(now_ms());
            job.error = Some(message.into());
        }
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.lock().get(id).cloned()
    }

    /// All jobs, oldest first
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.lock().values().cloned().collect();
        jobs.sort_by_key(|j| j.started_at);
        jobs
    }

    /// Path of a completed job's poster. Failed jobs never expose one.
    pub fn result_path(&self, id: &str) -> Option<PathBuf> {
        self.get(id)
            .filter(|j| j.status == JobStatus::Completed)
            .map(|j| j.output_path)
            .filter(|p| p.exists())
    }

    /// Forget a job and delete its output file
    pub fn remove(&self, id: &str) -> Result<bool> {
        let removed = self.lock().remove(id);
        let path = self.output_path(id);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(removed.is_some())
    }

    /// Drop jobs whose last activity is older than the retention window,
    /// measured at `now_ms`. Jobs still rendering are kept. Returns the
    /// number of jobs removed.
    pub fn sweep_at(&self, now_ms: u64) -> usize {
        let retention_ms = self.retention.as_millis() as u64;
        let expired: Vec<String> = self
            .lock()
            .values()
            .filter(|j| j.status != JobStatus::Rendering)
            .filter(|j| now_ms.saturating_sub(j.last_activity()) > retention_ms)
            .map(|j| j.id.clone())
            .collect();

        let mut removed = 0;
        for id in expired {
            match self.remove(&id) {
                Ok(_) => {
                    info!("[CLEANUP] Deleted old job: {}", id);
                    removed += 1;
                }
                Err(e) => warn!("[CLEANUP] Failed to delete job {}: {}", id, e),
            }
        }
        removed
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(now_ms())
    }

    /// Sweep on a fixed interval until the runtime shuts down
    pub fn spawn_sweeper(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                registry.sweep();
            }
        })
    }
}

/// Encode a PNG file as a `data:` URL
pub fn png_data_url(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    ))
}

/// Result of a successful submission
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub job_id: String,
    pub output_path: PathBuf,
    pub metadata: RenderMetadata,
}

/// Why a submission did not produce a poster
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// Rejected before any job was created
    #[error("Invalid configuration")]
    Invalid { errors: Vec<String> },
    /// The job was created and failed
    #[error("[{job_id}] {message}")]
    Failed { job_id: String, message: String },
}

/// Validation + rendering + job bookkeeping
pub struct PosterService<L> {
    renderer: AsyncRenderer<L>,
    registry: JobRegistry,
    defaults: RenderOptions,
}

impl<L> PosterService<L>
where
    L: BrowserLauncher + Send + Sync + 'static,
{
    pub fn new(launcher: L, registry: JobRegistry, defaults: RenderOptions) -> Self {
        Self {
            renderer: AsyncRenderer::new(launcher),
            registry,
            defaults,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Validate `raw`, render it as a new job and record the outcome.
    ///
    /// `overrides` adjusts the service defaults for this job only; the job id
    /// and cancel token are always fresh.
    pub async fn submit(
        &self,
        raw: &serde_json::Value,
        overrides: impl FnOnce(&mut RenderOptions),
    ) -> std::result::Result<JobReport, SubmitError> {
        let config = normalize(raw).map_err(|e| {
            let errors = match e {
                Error::Validation(errors) => errors,
                other => vec![other.to_string()],
            };
            error!("Validation failed: {:?}", errors);
            SubmitError::Invalid { errors }
        })?;

        let job = self.registry.begin();
        let mut options = self.defaults.clone();
        overrides(&mut options);
        options.job_id = job.id.clone();
        options.cancel = crate::CancelToken::new();

        info!("[{}] Configuration validated successfully", job.id);
        match self.renderer.render(config, job.output_path.clone(), options).await {
            Ok(outcome) => {
                self.registry.complete(&job.id, outcome.metadata.clone());
                info!(
                    "[{}] POSTER GENERATION COMPLETED ({} MB, {}ms)",
                    job.id, outcome.metadata.size_in_mb, outcome.metadata.render_time_ms
                );
                Ok(JobReport {
                    job_id: job.id,
                    output_path: outcome.output_path,
                    metadata: outcome.metadata,
                })
            }
            Err(failure) => {
                let message = failure.source.to_string();
                self.registry.fail(&job.id, message.clone());
                Err(SubmitError::Failed {
                    job_id: job.id,
                    message,
                })
            }
        }
    }
}
