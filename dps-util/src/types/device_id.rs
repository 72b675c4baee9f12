use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::ops::Deref;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
#[error("device id must not be empty")]
pub struct InvalidDeviceIdError;

/// Stable, non-empty identifier of a device, also used as its
/// registration id with the provisioning service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl Deref for DeviceId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = InvalidDeviceIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(InvalidDeviceIdError);
        }
        Ok(Self(value))
    }
}

impl TryFrom<&str> for DeviceId {
    type Error = InvalidDeviceIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.to_owned().try_into()
    }
}

impl FromStr for DeviceId {
    type Err = InvalidDeviceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.try_into()
    }
}

impl From<DeviceId> for String {
    fn from(value: DeviceId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_id() {
        assert!(DeviceId::try_from("").is_err());
        assert!(serde_json::from_str::<DeviceId>(r#""""#).is_err());
        assert_eq!(&*DeviceId::try_from("sensor-01").unwrap(), "sensor-01");
    }
}
