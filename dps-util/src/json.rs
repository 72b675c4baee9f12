use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

pub fn deserialize_duration_from_ms<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let ms: u64 = Deserialize::deserialize(deserializer)?;
    Ok(Duration::from_millis(ms))
}

pub fn serialize_duration_to_ms<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

pub fn deserialize_durations_from_ms<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let ms: Vec<u64> = Deserialize::deserialize(deserializer)?;
    Ok(ms.into_iter().map(Duration::from_millis).collect())
}

pub fn serialize_durations_to_ms<S>(
    durations: &[Duration],
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(durations.iter().map(|d| d.as_millis() as u64))
}
