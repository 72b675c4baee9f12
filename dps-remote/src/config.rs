use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::util::http::Uri;
use crate::util::json::{
    deserialize_duration_from_ms, deserialize_durations_from_ms, serialize_duration_to_ms,
    serialize_durations_to_ms,
};

pub const DEFAULT_ENDPOINT: &str = "https://global.azure-devices-provisioning.net";
pub const DEFAULT_API_VERSION: &str = "2019-01-15";

/// Provisioning service configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ProvisioningConfig {
    pub endpoint: Uri,
    pub id_scope: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default)]
    pub request: RequestConfig,
}

impl ProvisioningConfig {
    pub fn new(endpoint: Uri, id_scope: impl Into<String>) -> Self {
        Self {
            endpoint,
            id_scope: id_scope.into(),
            api_version: default_api_version(),
            request: RequestConfig::default(),
        }
    }
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_owned()
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RequestConfig {
    /// Timeout of a single HTTP exchange with the provisioning service.
    #[serde(
        deserialize_with = "deserialize_duration_from_ms",
        serialize_with = "serialize_duration_to_ms"
    )]
    pub timeout: Duration,

    /// Validity of the registration SAS token.
    #[serde(
        deserialize_with = "deserialize_duration_from_ms",
        serialize_with = "serialize_duration_to_ms"
    )]
    pub sas_ttl: Duration,

    /// Minimum time between two registration attempts for the same device.
    #[serde(
        deserialize_with = "deserialize_duration_from_ms",
        serialize_with = "serialize_duration_to_ms"
    )]
    pub min_register_interval: Duration,

    /// Waits after each operation status query. The schedule length is the
    /// maximum number of status queries.
    #[serde(
        deserialize_with = "deserialize_durations_from_ms",
        serialize_with = "serialize_durations_to_ms"
    )]
    pub poll_schedule: Vec<Duration>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(59_000),
            sas_ttl: Duration::from_secs(3600),
            min_register_interval: Duration::from_secs(60),
            poll_schedule: [500, 1000, 2000, 4000, 0]
                .into_iter()
                .map(Duration::from_millis)
                .collect(),
        }
    }
}

/// How long a resolved connection string stays valid in the cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Keep the first resolved connection string for the lifetime of the
    /// cache.
    #[default]
    Memoize,

    /// Provision again once the cached connection string is older than the
    /// given duration.
    Ttl(
        #[serde(
            deserialize_with = "deserialize_duration_from_ms",
            serialize_with = "serialize_duration_to_ms"
        )]
        Duration,
    ),
}
