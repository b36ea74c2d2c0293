use std::{str::FromStr, time::Duration};

use rusoto_core::Region;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Upper bound Kinesis accepts for `GetRecords` limit.
pub const MAX_RECORDS_LIMIT: usize = 10_000;

/// Where a shard without a checkpoint starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InitialPosition {
    Latest,
    TrimHorizon,
}

impl Default for InitialPosition {
    fn default() -> Self {
        InitialPosition::Latest
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KclConfiguration {
    pub application_name: String,
    /// Name of the lease/checkpoint table. Falls back to the application name.
    pub table_name: String,
    pub stream_name: String,
    pub region_name: String,
    pub worker_id: String,
    pub kinesis_endpoint: Option<String>,
    pub dynamodb_endpoint: Option<String>,
    pub initial_position: InitialPosition,

    /// Max records to read per `GetRecords` call.
    pub max_records: usize,
    /// How long a shard consumer sleeps after a fetch returned nothing.
    #[serde(with = "millis")]
    pub idle_time_between_reads: Duration,
    pub call_process_records_even_for_empty_record_list: bool,
    /// Wait between shard discovery passes.
    #[serde(with = "millis")]
    pub shard_sync_interval: Duration,
    /// Backoff after a failed fetch.
    #[serde(with = "millis")]
    pub task_backoff_time: Duration,
    pub validate_sequence_number_before_checkpointing: bool,
    /// How long shutdown waits for shard consumers before aborting them.
    #[serde(with = "millis")]
    pub shutdown_grace: Duration,

    // Lease coordination options, honored by external runtimes.
    #[serde(with = "millis")]
    pub failover_time: Duration,
    #[serde(with = "millis")]
    pub lease_refresh_period: Duration,
    pub max_leases_for_worker: usize,
    pub max_leases_to_steal_at_one_time: usize,
    pub enable_lease_stealing: bool,
    #[serde(with = "millis")]
    pub lease_stealing_interval: Duration,
    #[serde(with = "millis")]
    pub lease_stealing_claim_timeout: Duration,
    #[serde(with = "millis")]
    pub lease_syncing_interval: Duration,
}

impl Default for KclConfiguration {
    fn default() -> Self {
        Self {
            application_name: String::new(),
            table_name: String::new(),
            stream_name: String::new(),
            region_name: "us-east-1".to_string(),
            worker_id: String::new(),
            kinesis_endpoint: None,
            dynamodb_endpoint: None,
            initial_position: InitialPosition::Latest,
            max_records: MAX_RECORDS_LIMIT,
            idle_time_between_reads: Duration::from_millis(1000),
            call_process_records_even_for_empty_record_list: false,
            shard_sync_interval: Duration::from_secs(60),
            task_backoff_time: Duration::from_millis(500),
            validate_sequence_number_before_checkpointing: true,
            shutdown_grace: Duration::from_secs(5),
            failover_time: Duration::from_secs(10),
            lease_refresh_period: Duration::from_secs(5),
            max_leases_for_worker: i32::MAX as usize,
            max_leases_to_steal_at_one_time: 1,
            enable_lease_stealing: false,
            lease_stealing_interval: Duration::from_secs(5),
            lease_stealing_claim_timeout: Duration::from_secs(120),
            lease_syncing_interval: Duration::from_secs(60),
        }
    }
}

impl KclConfiguration {
    pub fn new(
        application_name: impl Into<String>,
        stream_name: impl Into<String>,
        region_name: impl Into<String>,
        worker_id: impl Into<String>,
    ) -> Self {
        let application_name = application_name.into();
        Self {
            table_name: application_name.clone(),
            application_name,
            stream_name: stream_name.into(),
            region_name: region_name.into(),
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn with_kinesis_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.kinesis_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_dynamodb_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.dynamodb_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_initial_position(mut self, position: InitialPosition) -> Self {
        self.initial_position = position;
        self
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    pub fn with_idle_time_between_reads(mut self, idle: Duration) -> Self {
        self.idle_time_between_reads = idle;
        self
    }

    pub fn with_call_process_records_even_for_empty_record_list(mut self, call: bool) -> Self {
        self.call_process_records_even_for_empty_record_list = call;
        self
    }

    pub fn with_shard_sync_interval(mut self, interval: Duration) -> Self {
        self.shard_sync_interval = interval;
        self
    }

    pub fn with_task_backoff_time(mut self, backoff: Duration) -> Self {
        self.task_backoff_time = backoff;
        self
    }

    pub fn with_validate_sequence_number_before_checkpointing(mut self, validate: bool) -> Self {
        self.validate_sequence_number_before_checkpointing = validate;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_failover_time(mut self, failover: Duration) -> Self {
        self.failover_time = failover;
        self
    }

    pub fn with_lease_stealing(mut self, enabled: bool, interval: Duration) -> Self {
        self.enable_lease_stealing = enabled;
        self.lease_stealing_interval = interval;
        self
    }

    /// The lease table name, defaulting to the application name.
    pub fn lease_table(&self) -> &str {
        if self.table_name.is_empty() {
            &self.application_name
        } else {
            &self.table_name
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Missing("application_name"));
        }
        if self.stream_name.is_empty() {
            return Err(ConfigError::Missing("stream_name"));
        }
        if self.worker_id.is_empty() {
            return Err(ConfigError::Missing("worker_id"));
        }
        if self.max_records == 0 || self.max_records > MAX_RECORDS_LIMIT {
            return Err(ConfigError::OutOfRange {
                name: "max_records",
                reason: format!("{} not in 1..={}", self.max_records, MAX_RECORDS_LIMIT),
            });
        }
        if self.lease_refresh_period >= self.failover_time {
            return Err(ConfigError::OutOfRange {
                name: "lease_refresh_period",
                reason: "must be shorter than failover_time".to_string(),
            });
        }
        self.region()?;
        Ok(())
    }

    /// Resolves the region, pointing at the custom endpoint when one is set.
    pub fn region(&self) -> Result<Region, ConfigError> {
        match &self.kinesis_endpoint {
            Some(endpoint) => Ok(Region::Custom {
                name: self.region_name.clone(),
                endpoint: endpoint.clone(),
            }),
            None => Region::from_str(&self.region_name)
                .map_err(|_| ConfigError::UnknownRegion(self.region_name.clone())),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
