use tracing::{debug, instrument};

use crate::connection::ConnectionString;
use crate::device::DeviceIdentity;
use crate::provisioning::{ProvisioningError, Provisioner};
use crate::util::interrupt::Interrupt;

/// Resolves device connection strings, provisioning devices on demand.
pub struct ConnectionResolver {
    provisioner: Provisioner,
}

impl ConnectionResolver {
    pub fn new(provisioner: Provisioner) -> Self {
        Self { provisioner }
    }

    pub fn provisioner(&self) -> &Provisioner {
        &self.provisioner
    }

    /// Get the connection string for `device`.
    ///
    /// A connection string still valid in the cache is returned without
    /// contacting the provisioning service. Otherwise the device is
    /// registered and the result stored for the next lookup.
    #[instrument(skip_all, fields(device_id = %device.device_id), err)]
    pub async fn connection_string(
        &self,
        device: &DeviceIdentity,
        interrupt: Option<Interrupt>,
    ) -> Result<ConnectionString, ProvisioningError> {
        let device_id = &device.device_id;
        let cache = self.provisioner.cache();

        if let Some(conn) = cache.connection_string(device_id) {
            debug!("using cached connection string");
            return Ok(conn);
        }

        let host_name = self.provisioner.register(device, interrupt).await?;
        let key = self.provisioner.device_key(device_id).await?;

        let conn = ConnectionString::new(host_name, device_id.clone(), key);
        cache.set_connection_string(device_id, conn.clone());
        Ok(conn)
    }
}
