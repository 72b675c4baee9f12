use std::fmt::{Debug, Display};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::util::crypto::{InvalidKeyError, hmac_sha256_base64, uri_encode};
use crate::util::types::{DeviceId, SharedKey};

/// Key name identifying a token as a registration credential.
pub const REGISTRATION_KEY_NAME: &str = "registration";

/// Shared access signature authorizing calls to the registration endpoints
/// of a single device.
///
/// Tokens expire, so they are generated for a single registration exchange
/// and never stored.
#[derive(Clone, PartialEq, Eq)]
pub struct SasToken {
    resource: String,
    signature: String,
    expiry: u64,
}

impl SasToken {
    /// Generate a token valid for `ttl` from now.
    pub fn generate(
        id_scope: &str,
        device_id: &DeviceId,
        device_key: &SharedKey,
        ttl: Duration,
    ) -> Result<Self, InvalidKeyError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self::generate_at(id_scope, device_id, device_key, ttl, now)
    }

    /// Generate a token as if issued at `issued_at` (seconds since the Unix
    /// epoch).
    pub fn generate_at(
        id_scope: &str,
        device_id: &DeviceId,
        device_key: &SharedKey,
        ttl: Duration,
        issued_at: u64,
    ) -> Result<Self, InvalidKeyError> {
        let resource = uri_encode(&format!("{id_scope}/registrations/{device_id}"));
        let expiry = issued_at + ttl.as_secs();
        let signature = hmac_sha256_base64(device_key, format!("{resource}\n{expiry}"))?;

        Ok(Self {
            resource,
            signature: uri_encode(&signature),
            expiry,
        })
    }

    /// The URI encoded resource the token grants access to.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Expiry as seconds since the Unix epoch.
    pub fn expiry(&self) -> u64 {
        self.expiry
    }
}

impl Display for SasToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SharedAccessSignature sr={}&sig={}&skn={REGISTRATION_KEY_NAME}&se={}",
            self.resource, self.signature, self.expiry
        )
    }
}

impl Debug for SasToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SasToken")
            .field("resource", &self.resource)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}
