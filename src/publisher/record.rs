use bytes::Bytes;
use rand::{distributions::Alphanumeric, Rng};

/// Length of the generated partition key.
pub const PARTITION_KEY_LENGTH: usize = 10;

/// A record ready to be put on the stream. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    payload: Bytes,
    partition_key: String,
    ordering_key: Option<String>,
}

impl Record {
    /// Builds a record with a fresh random partition key.
    ///
    /// A non-empty `ordering_key` is carried as the explicit key that pins the
    /// record to one shard. An empty one leaves placement to the hash of the
    /// partition key.
    pub fn build(payload: impl Into<Bytes>, ordering_key: &str) -> Self {
        Self {
            payload: payload.into(),
            partition_key: random_partition_key(),
            ordering_key: if ordering_key.is_empty() {
                None
            } else {
                Some(ordering_key.to_string())
            },
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    pub fn ordering_key(&self) -> Option<&str> {
        self.ordering_key.as_deref()
    }
}

fn random_partition_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PARTITION_KEY_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ordering_key_generates_partition_key_only() {
        let record = Record::build(&b"{\"name\":\"fernando\"}"[..], "");

        assert_eq!(record.payload().as_ref(), b"{\"name\":\"fernando\"}");
        assert_eq!(record.partition_key().len(), PARTITION_KEY_LENGTH);
        assert!(record.partition_key().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(record.ordering_key(), None);
    }

    #[test]
    fn ordering_key_is_kept_verbatim() {
        let record = Record::build(&b"{\"name\":\"fernando\"}"[..], "ddfasdf2343sfsd434sfs");

        assert_eq!(record.ordering_key(), Some("ddfasdf2343sfsd434sfs"));
        assert!(!record.partition_key().is_empty());
        assert_ne!(record.partition_key(), "ddfasdf2343sfsd434sfs");
    }

    #[test]
    fn partition_keys_are_generated_per_record() {
        let first = Record::build(Bytes::from_static(b"a"), "");
        let second = Record::build(Bytes::from_static(b"a"), "");

        assert_ne!(first.partition_key(), second.partition_key());
    }
}
