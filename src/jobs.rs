use crate::{models::ApiError, models::RunStatus, reconcile::Reconciler};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tracing::{info, warn};
use uuid::Uuid;

/// Body of `POST /jobs/sweep`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SweepRequest {
    #[serde(default)]
    pub start_offset: u64,
    #[serde(default)]
    pub max_products: Option<u64>,
}

/// Single worker walking the catalog offset by offset. Sweeps never publish
/// continuation messages; the worker itself is the cursor.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
    statuses: Arc<Mutex<HashMap<Uuid, JobState>>>,
}

#[derive(Clone)]
struct Job {
    id: Uuid,
    request: SweepRequest,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running {
        offset: u64,
        processed: u64,
    },
    Completed {
        processed: u64,
        next_offset: u64,
        end_of_catalog: bool,
    },
    Failed {
        error: String,
        stage: Option<String>,
        offset: u64,
        processed: u64,
    },
}

#[derive(Clone, Serialize)]
pub struct JobInfo {
    pub id: String,
    #[serde(flatten)]
    pub state: JobState,
}

impl JobQueue {
    pub fn spawn(reconciler: Reconciler) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Job>(queue_capacity_from_env());
        let statuses = Arc::new(Mutex::new(HashMap::new()));
        let statuses_bg = statuses.clone();

        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let state = sweep(&reconciler, &statuses_bg, &job).await;
                info!(target = "sync.jobs", job_id = %job.id, state = ?state, "sweep_finished");
                statuses_bg.lock().await.insert(job.id, state);
            }
        });

        (Self { tx, statuses }, handle)
    }

    pub async fn enqueue_sweep(&self, request: SweepRequest) -> Result<Uuid, ApiError> {
        let id = Uuid::new_v4();
        {
            let mut guard = self.statuses.lock().await;
            guard.insert(id, JobState::Queued);
        }
        self.tx.send(Job { id, request }).await.map_err(|_| ApiError {
            error: "queue_send_failed".into(),
            detail: Some("worker not available".into()),
        })?;
        Ok(id)
    }

    pub async fn get(&self, id: Uuid) -> Option<JobInfo> {
        let guard = self.statuses.lock().await;
        guard.get(&id).cloned().map(|state| JobInfo {
            id: id.to_string(),
            state,
        })
    }
}

async fn sweep(
    reconciler: &Reconciler,
    statuses: &Mutex<HashMap<Uuid, JobState>>,
    job: &Job,
) -> JobState {
    let mut offset = job.request.start_offset;
    let mut processed = 0;
    loop {
        if job.request.max_products.is_some_and(|max| processed >= max) {
            return JobState::Completed {
                processed,
                next_offset: offset,
                end_of_catalog: false,
            };
        }
        statuses
            .lock()
            .await
            .insert(job.id, JobState::Running { offset, processed });

        match reconciler.run(offset, false).await {
            Ok(report) if report.status == RunStatus::EndOfCatalog => {
                return JobState::Completed {
                    processed,
                    next_offset: offset,
                    end_of_catalog: true,
                };
            }
            Ok(_) => {
                processed += 1;
                offset += 1;
            }
            Err(err) => {
                warn!(target = "sync.jobs", job_id = %job.id, offset, error = %err, "sweep_failed");
                return JobState::Failed {
                    error: err.detail().to_string(),
                    stage: Some(err.stage().to_string()),
                    offset,
                    processed,
                };
            }
        }
    }
}

fn queue_capacity_from_env() -> usize {
    std::env::var("QUEUE_CAPACITY")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(16)
}
