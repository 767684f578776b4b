use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::boot::{BootRefreshScheduler, RefreshSummary};
use crate::broker::{GrantStore, PermissionBroker};
use crate::config::Config;
use crate::db::WatchList;
use crate::error::{QueueError, ToggleError};
use crate::media_index::MediaIndex;
use crate::models::{CachingPolicy, MediaFolder, Variant};
use crate::policy::MediaPolicySelector;
use crate::scanner::{DirectoryEnumerator, ScanOptions};
use crate::storage::{RemovableStorageAccess, SystemStorage};
use crate::visibility::{ToggleOutcome, VisibilityToggler};

const DEFAULT_CAPACITY: usize = 64;

/// A unit of background work and the channel its result goes back on.
pub enum Job {
    Scan {
        roots: Vec<PathBuf>,
        reply: oneshot::Sender<BTreeSet<MediaFolder>>,
    },
    Exclude {
        folder: PathBuf,
        reply: oneshot::Sender<Result<ToggleOutcome, ToggleError>>,
    },
    Include {
        folder: PathBuf,
        reply: oneshot::Sender<Result<ToggleOutcome, ToggleError>>,
    },
    Refresh {
        reply: oneshot::Sender<RefreshSummary>,
    },
    Select {
        path: PathBuf,
        reply: oneshot::Sender<Option<(Variant, CachingPolicy)>>,
    },
}

/// Every component, wired once and shared by all jobs.
pub struct Pipeline {
    pub enumerator: DirectoryEnumerator,
    pub toggler: VisibilityToggler,
    pub scheduler: BootRefreshScheduler,
    pub selector: MediaPolicySelector,
}

impl Pipeline {
    /// Builds the pipeline for a host, with its broker and media index.
    pub fn from_config(
        config: &Config,
        broker: Arc<dyn PermissionBroker>,
        index: Arc<dyn MediaIndex>,
    ) -> Result<Self> {
        let enumerator = DirectoryEnumerator::new(ScanOptions::from_config(config));
        let watch_list = WatchList::open(&PathBuf::from(&config.watch_list_path))?;
        let scheduler = BootRefreshScheduler::new(
            Arc::new(SystemStorage::from_config(config)),
            enumerator.clone(),
            Arc::new(Mutex::new(watch_list)),
        );
        let toggler = VisibilityToggler::new(
            Arc::new(RemovableStorageAccess::from_config(config)),
            broker,
            index,
            GrantStore::from_config(config),
        )
        .with_broker_timeout(config.broker_timeout());

        Ok(Self {
            enumerator,
            toggler,
            scheduler,
            selector: MediaPolicySelector::from_config(config),
        })
    }

    async fn run(&self, job: Job) {
        match job {
            Job::Scan { roots, reply } => {
                let enumerator = self.enumerator.clone();
                match tokio::task::spawn_blocking(move || enumerator.scan(roots)).await {
                    Ok(folders) => {
                        let _ = reply.send(folders);
                    }
                    Err(e) => error!("Scan task failed: {}", e),
                }
            }
            Job::Exclude { folder, reply } => {
                let _ = reply.send(self.toggler.exclude(&folder).await);
            }
            Job::Include { folder, reply } => {
                let _ = reply.send(self.toggler.include(&folder).await);
            }
            Job::Refresh { reply } => match self.scheduler.on_boot_completed().await {
                Ok(summary) => {
                    let _ = reply.send(summary);
                }
                Err(e) => error!("Refresh task failed: {}", e),
            },
            Job::Select { path, reply } => {
                let _ = reply.send(self.selector.select(&path));
            }
        }
    }
}

/// Front door for callers: submit a job, await its reply.
#[derive(Clone)]
pub struct WorkQueue {
    tx: mpsc::Sender<Job>,
}

impl WorkQueue {
    /// Spawns the worker loop on the current runtime.
    pub fn start(pipeline: Arc<Pipeline>) -> (Self, JoinHandle<()>) {
        Self::with_capacity(pipeline, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(pipeline: Arc<Pipeline>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        let worker = tokio::spawn(run_worker(pipeline, rx));
        (Self { tx }, worker)
    }

    pub async fn submit(&self, job: Job) -> Result<(), QueueError> {
        self.tx.send(job).await.map_err(|_| QueueError::Closed)
    }

    pub async fn scan(&self, roots: Vec<PathBuf>) -> Result<BTreeSet<MediaFolder>, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Scan { roots, reply }).await?;
        rx.await.map_err(|_| QueueError::Dropped)
    }

    pub async fn exclude(&self, folder: PathBuf) -> Result<ToggleOutcome, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Exclude { folder, reply }).await?;
        Ok(rx.await.map_err(|_| QueueError::Dropped)??)
    }

    pub async fn include(&self, folder: PathBuf) -> Result<ToggleOutcome, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Include { folder, reply }).await?;
        Ok(rx.await.map_err(|_| QueueError::Dropped)??)
    }

    pub async fn refresh(&self) -> Result<RefreshSummary, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Refresh { reply }).await?;
        rx.await.map_err(|_| QueueError::Dropped)
    }

    pub async fn select(&self, path: PathBuf) -> Result<Option<(Variant, CachingPolicy)>, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Select { path, reply }).await?;
        rx.await.map_err(|_| QueueError::Dropped)
    }
}

async fn run_worker(pipeline: Arc<Pipeline>, mut rx: mpsc::Receiver<Job>) {
    info!("Work queue started");

    // Jobs run side by side; toggles on one folder serialize on its lock.
    while let Some(job) = rx.recv().await {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            pipeline.run(job).await;
        });
        debug!("Job dispatched");
    }

    info!("Work queue stopped");
}
