//! Asynchronous job handoff.
//!
//! The synchronous half of the pipeline communicates with background
//! processing only through the durable identifiers carried by these jobs.
//! Delivery is at-least-once, so every handler must be idempotent.

use crate::error::SchedulerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Background jobs understood by the ingestion worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Job {
    /// Parse and process an uploaded publish payload.
    ProcessPackageFile {
        file_id: Uuid,
        user_id: Uuid,
        deprecate: bool,
    },
    /// Rebuild the cached registry document for one package name.
    RebuildMetadataCache {
        project_id: Uuid,
        package_name: String,
    },
}

/// Job scheduler seam between request handling and background workers.
#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// Enqueue a job for asynchronous execution.
    async fn enqueue(&self, job: Job) -> Result<(), SchedulerError>;
}

/// Channel-backed scheduler; a worker loop drains the receiving end.
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<Job>,
}

impl TokioScheduler {
    /// Create the scheduler and the receiver a worker loop will drain.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Job>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl JobScheduler for TokioScheduler {
    async fn enqueue(&self, job: Job) -> Result<(), SchedulerError> {
        self.tx.send(job).map_err(|_| SchedulerError::Closed)
    }
}

/// Recording scheduler for tests: remembers every job, runs nothing.
#[derive(Default)]
pub struct RecordingScheduler {
    jobs: Mutex<Vec<Job>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the enqueued jobs.
    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().clone()
    }

    /// Drain the enqueued jobs.
    pub fn take_jobs(&self) -> Vec<Job> {
        std::mem::take(&mut *self.jobs.lock().unwrap())
    }
}

#[async_trait]
impl JobScheduler for RecordingScheduler {
    async fn enqueue(&self, job: Job) -> Result<(), SchedulerError> {
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}
