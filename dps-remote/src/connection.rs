use std::fmt::Display;

use crate::util::types::{DeviceId, SharedKey};

/// Connection descriptor for the hub a device was assigned to.
///
/// Renders as `HostName=<hub>;DeviceId=<id>;SharedAccessKey=<key>`, with a
/// trailing `;GatewayHostName=<host>` when the device connects through a
/// gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionString {
    pub host_name: String,
    pub device_id: DeviceId,
    pub shared_access_key: SharedKey,
    pub gateway_host_name: Option<String>,
}

impl ConnectionString {
    pub fn new(
        host_name: impl Into<String>,
        device_id: DeviceId,
        shared_access_key: SharedKey,
    ) -> Self {
        Self {
            host_name: host_name.into(),
            device_id,
            shared_access_key,
            gateway_host_name: None,
        }
    }

    pub fn with_gateway_host(self, gateway_host_name: impl Into<String>) -> Self {
        Self {
            gateway_host_name: Some(gateway_host_name.into()),
            ..self
        }
    }
}

impl Display for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "HostName={};DeviceId={};SharedAccessKey={}",
            self.host_name, self.device_id, self.shared_access_key
        )?;
        if let Some(gateway) = &self.gateway_host_name {
            write!(f, ";GatewayHostName={gateway}")?;
        }
        Ok(())
    }
}
