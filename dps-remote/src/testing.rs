use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mockito::{Matcher, Server};
use serde_json::{Value, json};

use crate::cache::RegistrationCache;
use crate::config::{DEFAULT_API_VERSION, ProvisioningConfig};
use crate::provisioning::Provisioner;
use crate::timer::Timer;
use crate::util::types::SharedKey;

/// base64 of `group-primary-key-for-tests-0123456789abcd`
pub const GROUP_KEY: &str = "Z3JvdXAtcHJpbWFyeS1rZXktZm9yLXRlc3RzLTAxMjM0NTY3ODlhYmNk";

/// Key derived from [GROUP_KEY] for `sensor-01`
pub const DEVICE_KEY: &str = "ClVO9JyY/jIHKk8/mLV6A50U+KqholOyDRsEGfz7pbI=";

pub const ID_SCOPE: &str = "0ne000ABCDE";

pub const API_VERSION: &str = DEFAULT_API_VERSION;

/// Timer that returns immediately, keeping track of the requested waits.
#[derive(Debug, Default)]
pub struct RecordingTimer(Mutex<Vec<Duration>>);

impl RecordingTimer {
    pub fn waits(&self) -> Vec<Duration> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait]
impl Timer for RecordingTimer {
    async fn sleep(&self, duration: Duration) {
        self.0.lock().unwrap().push(duration);
    }
}

pub fn test_config(server: &Server) -> ProvisioningConfig {
    ProvisioningConfig::new(server.url().try_into().unwrap(), ID_SCOPE)
}

/// Provisioner talking to `server` with a fresh cache and [GROUP_KEY] as
/// the group key.
pub fn test_provisioner(server: &Server) -> Provisioner {
    provisioner_with(test_config(server), RegistrationCache::default())
}

pub fn provisioner_with(config: ProvisioningConfig, cache: RegistrationCache) -> Provisioner {
    Provisioner::new(
        config,
        Arc::new(cache),
        Arc::new(SharedKey::from(GROUP_KEY)),
    )
}

/// Matches the registration token of `sensor-01`.
pub fn auth_header() -> Matcher {
    Matcher::Regex(format!(
        r"^SharedAccessSignature sr={ID_SCOPE}%2Fregistrations%2Fsensor-01&sig=[^&]+&skn=registration&se=\d+$"
    ))
}

pub fn assigning_body() -> Value {
    json!({
        "operationId": "op-1",
        "status": "assigning"
    })
}

pub fn assigned_body(hub: &str) -> Value {
    json!({
        "operationId": "op-1",
        "status": "assigned",
        "registrationState": {
            "registrationId": "sensor-01",
            "assignedHub": hub,
            "deviceId": "sensor-01",
            "status": "assigned"
        }
    })
}
