use serde::{Deserialize, Serialize};

use crate::util::types::DeviceId;

/// Identity of the device to provision, as supplied by the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub device_id: DeviceId,

    /// Gateway the device is attached to, if any. The device itself is
    /// never registered as a gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_id: Option<String>,
}

impl DeviceIdentity {
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            gateway_id: None,
        }
    }

    pub fn with_gateway(self, gateway_id: impl Into<String>) -> Self {
        Self {
            gateway_id: Some(gateway_id.into()),
            ..self
        }
    }
}
