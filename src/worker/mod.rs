//! Lease-free runtime: every worker consumes every shard of its stream.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use crate::{
    checkpoint::{Checkpoint, CheckpointStore},
    config::KclConfiguration,
    consumer::RecordProcessorFactory,
    error::{StreamError, WorkerError},
    interface::runtime::WorkerRuntime,
    stream::StreamReader,
    util::runnable::{run_with_fixed_delay, PeriodicRunnable},
};

use shard::ShardConsumer;

mod shard;

pub struct Worker {
    inner: Arc<WorkerInner>,
    started: AtomicBool,
    shard_sync: Mutex<Option<JoinHandle<()>>>,
}

struct WorkerInner {
    config: Arc<KclConfiguration>,
    reader: Arc<dyn StreamReader>,
    checkpoints: Arc<dyn CheckpointStore>,
    factory: Arc<dyn RecordProcessorFactory>,

    consumers: Mutex<HashMap<String, JoinHandle<()>>>,
    completed: Mutex<HashSet<String>>,

    shutdown: CancellationToken,
    span: Span,
}

impl Worker {
    pub fn new(
        config: KclConfiguration,
        reader: Arc<dyn StreamReader>,
        checkpoints: Arc<dyn CheckpointStore>,
        factory: Arc<dyn RecordProcessorFactory>,
    ) -> Self {
        let span = info_span!("worker", worker_id = %config.worker_id, stream = %config.stream_name);
        Self {
            inner: Arc::new(WorkerInner {
                config: Arc::new(config),
                reader,
                checkpoints,
                factory,
                consumers: Mutex::new(HashMap::new()),
                completed: Mutex::new(HashSet::new()),
                shutdown: CancellationToken::new(),
                span,
            }),
            started: AtomicBool::new(false),
            shard_sync: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &KclConfiguration {
        &self.inner.config
    }

    /// Ids of the shards currently being consumed.
    pub async fn active_shards(&self) -> Vec<String> {
        let mut shards: Vec<String> = self
            .inner
            .consumers
            .lock()
            .await
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(shard_id, _)| shard_id.clone())
            .collect();
        shards.sort();
        shards
    }

    async fn start_consuming(&self) -> Result<(), WorkerError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(WorkerError::ShutDown);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(WorkerError::AlreadyStarted);
        }
        if let Err(err) = self.inner.config.validate() {
            self.started.store(false, Ordering::SeqCst);
            return Err(err.into());
        }

        info!("initializing worker");
        if let Err(err) = self.inner.sync_shards().await {
            self.started.store(false, Ordering::SeqCst);
            return Err(err.into());
        }

        let sync = tokio::spawn(
            run_with_fixed_delay(
                self.inner.clone(),
                self.inner.config.shard_sync_interval,
                self.inner.shutdown.clone(),
            )
            .instrument(self.inner.span.clone()),
        );
        *self.shard_sync.lock().await = Some(sync);
        info!("worker started");
        Ok(())
    }

    async fn stop_consuming(&self) {
        info!("worker shutting down");
        self.inner.shutdown.cancel();

        if let Some(sync) = self.shard_sync.lock().await.take() {
            if let Err(err) = sync.await {
                warn!(error = %err, "shard sync task failed");
            }
        }

        let consumers: Vec<(String, JoinHandle<()>)> = self.inner.consumers.lock().await.drain().collect();
        if consumers.is_empty() {
            return;
        }
        let aborts: Vec<_> = consumers.iter().map(|(_, handle)| handle.abort_handle()).collect();
        let (shard_ids, handles): (Vec<String>, Vec<JoinHandle<()>>) = consumers.into_iter().unzip();

        let grace = self.inner.config.shutdown_grace;
        match tokio::time::timeout(grace, futures::future::join_all(handles)).await {
            Ok(results) => {
                for (shard_id, result) in shard_ids.iter().zip(results) {
                    if let Err(err) = result {
                        error!(shard_id = %shard_id, error = %err, "shard consumer failed");
                    }
                }
                info!("worker stopped");
            }
            Err(_) => {
                warn!(grace_ms = grace.as_millis() as u64, "shard consumers did not stop in time, aborting");
                aborts.iter().for_each(|abort| abort.abort());
            }
        }
    }
}

#[async_trait]
impl WorkerRuntime for Worker {
    async fn start(&self) -> Result<(), WorkerError> {
        let span = self.inner.span.clone();
        self.start_consuming().instrument(span).await
    }

    async fn shutdown(&self) {
        let span = self.inner.span.clone();
        self.stop_consuming().instrument(span).await
    }
}

impl WorkerInner {
    /// Starts a consumer for every listed shard that is neither running nor
    /// checkpointed at its end. Finished consumers are reaped, so a shard left
    /// unfinished by a failed consumer is picked up again. A child shard waits
    /// while its parent is listed and has not ended.
    async fn sync_shards(&self) -> Result<(), StreamError> {
        let shards = self.reader.list_shards().await?;

        let mut consumers = self.consumers.lock().await;
        let mut completed = self.completed.lock().await;

        let finished: Vec<String> = consumers
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(shard_id, _)| shard_id.clone())
            .collect();
        for shard_id in finished {
            if let Some(handle) = consumers.remove(&shard_id) {
                if let Err(err) = handle.await {
                    error!(shard_id = %shard_id, error = %err, "shard consumer failed");
                }
            }
        }

        // Only a stored shard end marks a shard as done.
        let mut unreadable = HashSet::new();
        for shard in &shards {
            if consumers.contains_key(&shard.shard_id) || completed.contains(&shard.shard_id) {
                continue;
            }
            match self.checkpoints.get_checkpoint(&shard.shard_id).await {
                Ok(Some(Checkpoint::ShardEnd)) => {
                    debug!(shard_id = %shard.shard_id, "shard already fully processed");
                    completed.insert(shard.shard_id.clone());
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(shard_id = %shard.shard_id, error = %err, "unable to read checkpoint");
                    unreadable.insert(shard.shard_id.clone());
                }
            }
        }

        let listed: HashSet<String> = shards.iter().map(|shard| shard.shard_id.clone()).collect();
        for shard in shards {
            if self.shutdown.is_cancelled() {
                break;
            }
            let shard_id = shard.shard_id.clone();
            if consumers.contains_key(&shard_id) || completed.contains(&shard_id) || unreadable.contains(&shard_id) {
                continue;
            }
            if let Some(parent) = &shard.parent_shard_id {
                if listed.contains(parent) && !completed.contains(parent) {
                    debug!(shard_id = %shard_id, parent = %parent, "waiting for parent shard");
                    continue;
                }
            }

            info!(shard_id = %shard_id, "starting shard consumer");
            let consumer = ShardConsumer::new(
                shard,
                self.config.clone(),
                self.reader.clone(),
                self.checkpoints.clone(),
                self.factory.clone(),
                self.shutdown.child_token(),
            );
            let handle = tokio::spawn(consumer.run().instrument(info_span!(
                parent: &self.span,
                "shard_consumer",
                shard_id = %shard_id
            )));
            consumers.insert(shard_id, handle);
        }
        Ok(())
    }
}

#[async_trait]
impl PeriodicRunnable for WorkerInner {
    async fn run_once(&self) {
        if let Err(err) = self.sync_shards().await {
            warn!(error = %err, "shard sync failed");
        }
    }

    async fn before_shutdown_complete(&self) {
        debug!("shard sync stopped");
    }
}
