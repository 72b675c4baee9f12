/*
This crate is home to everything related to provisioning a device against
a device provisioning service (DPS).

Given a device identity and a group primary key it derives the device key,
registers the device with the provisioning service, waits for the service
to assign it to a hub and hands back a connection string for that hub.
Registration attempts are rate limited per device and results are kept in
a caller owned cache so repeated lookups don't go back to the network.
*/

mod cache;
mod config;
mod connection;
mod device;
mod key;
mod provisioning;
mod resolver;
mod secret;
mod timer;
mod token;

#[cfg(test)]
mod testing;

pub use cache::{CacheEntry, RegistrationCache};
pub use config::{
    CachePolicy, DEFAULT_API_VERSION, DEFAULT_ENDPOINT, ProvisioningConfig, RequestConfig,
};
pub use connection::ConnectionString;
pub use device::DeviceIdentity;
pub use key::derive_device_key;
pub use provisioning::{ProvisioningError, Provisioner, RegistrationAttempt, RegistrationStatus};
pub use resolver::ConnectionResolver;
pub use secret::{KeyFile, SecretError, SecretProvider};
pub use timer::{Timer, TokioTimer};
pub use token::{REGISTRATION_KEY_NAME, SasToken};

use dps_util as util;
