use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    checkpoint::{Checkpoint, CheckpointStore, ShardCheckpointer},
    config::{InitialPosition, KclConfiguration},
    consumer::RecordProcessorFactory,
    interface::processor::{
        Checkpointer, InitializationInput, ProcessRecordsInput, RecordProcessor, ShutdownInput, ShutdownReason,
    },
    stream::{ShardInfo, ShardPosition, StreamReader},
};

/// Consumes one shard from its last checkpoint until the shard ends or the
/// worker shuts down.
pub(crate) struct ShardConsumer {
    shard_info: ShardInfo,
    config: Arc<KclConfiguration>,
    reader: Arc<dyn StreamReader>,
    checkpointer: Arc<ShardCheckpointer>,
    factory: Arc<dyn RecordProcessorFactory>,
    shutdown: CancellationToken,
}

impl ShardConsumer {
    pub(crate) fn new(
        shard_info: ShardInfo,
        config: Arc<KclConfiguration>,
        reader: Arc<dyn StreamReader>,
        store: Arc<dyn CheckpointStore>,
        factory: Arc<dyn RecordProcessorFactory>,
        shutdown: CancellationToken,
    ) -> Self {
        let checkpointer = Arc::new(ShardCheckpointer::new(
            shard_info.shard_id.clone(),
            store,
            config.validate_sequence_number_before_checkpointing,
        ));
        Self {
            shard_info,
            config,
            reader,
            checkpointer,
            factory,
            shutdown,
        }
    }

    pub(crate) async fn run(self) {
        let shard_id = self.shard_info.shard_id.clone();
        let checkpoint = match self.checkpointer.current().await {
            Ok(checkpoint) => checkpoint,
            Err(err) => {
                error!(shard_id = %shard_id, error = %err, "unable to read checkpoint");
                return;
            }
        };
        if checkpoint == Some(Checkpoint::ShardEnd) {
            debug!(shard_id = %shard_id, "shard already fully processed");
            return;
        }

        let mut processor = self.factory.create_processor();
        processor
            .initialize(InitializationInput {
                shard_id: shard_id.clone(),
                checkpoint: checkpoint.clone(),
            })
            .await;

        let position = match checkpoint {
            Some(Checkpoint::SequenceNumber(seq)) => ShardPosition::AfterSequenceNumber(seq.to_string()),
            _ => match self.config.initial_position {
                InitialPosition::Latest => ShardPosition::Latest,
                InitialPosition::TrimHorizon => ShardPosition::TrimHorizon,
            },
        };

        let reason = self.consume(processor.as_mut(), position).await;
        info!(shard_id = %shard_id, reason = %reason, "shard consumer stopping");
        processor
            .shutdown(ShutdownInput {
                reason,
                checkpointer: self.checkpointer.clone(),
            })
            .await;
    }

    async fn consume(&self, processor: &mut dyn RecordProcessor, position: ShardPosition) -> ShutdownReason {
        let shard_id = &self.shard_info.shard_id;
        let checkpointer: Arc<dyn Checkpointer> = self.checkpointer.clone();

        let mut iterator = loop {
            let attempt = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return ShutdownReason::Requested,
                attempt = self.reader.shard_iterator(shard_id, &position) => attempt,
            };
            match attempt {
                Ok(iterator) => break iterator,
                Err(err) => {
                    warn!(shard_id = %shard_id, error = %err, "unable to get shard iterator");
                    if !self.pause(self.config.task_backoff_time).await {
                        return ShutdownReason::Requested;
                    }
                }
            }
        };

        loop {
            let fetched = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return ShutdownReason::Requested,
                fetched = self.reader.get_records(&iterator, self.config.max_records) => fetched,
            };

            let batch = match fetched {
                Ok(batch) => batch,
                Err(err) => {
                    warn!(shard_id = %shard_id, error = %err, "unable to get records");
                    if !self.pause(self.config.task_backoff_time).await {
                        return ShutdownReason::Requested;
                    }
                    continue;
                }
            };

            let empty = batch.records.is_empty();
            if !empty || self.config.call_process_records_even_for_empty_record_list {
                // Runs to completion even if shutdown fires meanwhile.
                processor
                    .process_records(ProcessRecordsInput {
                        records: batch.records,
                        millis_behind_latest: batch.millis_behind_latest,
                        checkpointer: checkpointer.clone(),
                    })
                    .await;
            }

            iterator = match batch.next_shard_iterator {
                Some(next) => next,
                None => return ShutdownReason::Terminate,
            };

            if empty && !self.pause(self.config.idle_time_between_reads).await {
                return ShutdownReason::Requested;
            }
        }
    }

    /// Sleeps for `duration`. Returns false if shutdown fired first.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
