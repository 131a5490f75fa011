use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs::File, io::BufReader, path::Path, time::Duration};

use crate::{
    message::{ContributorId, Destination},
    ClientError, ClientResult,
};

/// Client-side settings for one process.
///
/// Loaded from JSON; every field has a default so partial documents are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Destination this client receives responses on.
    #[serde(default = "default_receiver_destination")]
    pub receiver_destination: Destination,

    /// Destination shared by every contributor of the collection, used for identify broadcasts.
    #[serde(default = "default_collection_destination")]
    pub collection_destination: Destination,

    #[serde(default = "default_identification_timeout", with = "duration_ms")]
    pub identification_timeout: Duration,

    #[serde(default = "default_operation_timeout", with = "duration_ms")]
    pub operation_timeout: Duration,

    #[serde(default = "default_conversation_timeout", with = "duration_ms")]
    pub conversation_timeout: Duration,

    /// Extra attempts allowed after a retryable failure.
    #[serde(default)]
    pub operation_retry_count: u32,

    #[serde(default)]
    pub partial_put_allowed: bool,

    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,

    /// Collection id to the contributors expected to answer for it.
    #[serde(default)]
    pub collections: HashMap<String, Vec<ContributorId>>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
            receiver_destination: default_receiver_destination(),
            collection_destination: default_collection_destination(),
            identification_timeout: default_identification_timeout(),
            operation_timeout: default_operation_timeout(),
            conversation_timeout: default_conversation_timeout(),
            operation_retry_count: 0,
            partial_put_allowed: false,
            bus_capacity: default_bus_capacity(),
            collections: HashMap::new(),
        }
    }
}

impl ClientSettings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> ClientResult<Self> {
        from_file(path)
    }

    pub fn from_str(s: &str) -> ClientResult<Self> {
        from_str(s)
    }

    pub fn contributors(&self, collection_id: &str) -> ClientResult<&[ContributorId]> {
        self.collections
            .get(collection_id)
            .map(|ids| ids.as_slice())
            .ok_or_else(|| ClientError::UnknownCollection(collection_id.to_string()))
    }

    pub fn with_collection(
        mut self,
        collection_id: impl Into<String>,
        contributors: &[&str],
    ) -> Self {
        self.collections.insert(
            collection_id.into(),
            contributors.iter().map(|c| c.to_string()).collect(),
        );
        self
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> ClientResult<T> {
    let file = File::open(path)
        .map_err(|e| ClientError::Config(format!("Failed to open settings file: {}", e)))?;
    let reader = BufReader::new(file);
    let config = serde_json::from_reader(reader)
        .map_err(|e| ClientError::Config(format!("Failed to parse settings file: {}", e)))?;
    Ok(config)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> ClientResult<T> {
    let config = serde_json::from_str(s)
        .map_err(|e| ClientError::Config(format!("Failed to parse settings: {}", e)))?;
    Ok(config)
}

fn default_client_id() -> String {
    "bitmag-client".to_string()
}
fn default_receiver_destination() -> Destination {
    "client-topic".to_string()
}
fn default_collection_destination() -> Destination {
    "collection-topic".to_string()
}
fn default_identification_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_operation_timeout() -> Duration {
    Duration::from_secs(60 * 60)
}
fn default_conversation_timeout() -> Duration {
    Duration::from_secs(2 * 60 * 60)
}
fn default_bus_capacity() -> usize {
    1000
}

// Durations are stored as milliseconds in settings documents.
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
