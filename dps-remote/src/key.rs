use crate::util::crypto::{InvalidKeyError, hmac_sha256_base64};
use crate::util::types::{DeviceId, SharedKey};

/// Compute the key of a single device from the group primary key.
///
/// The device key is the base64 encoded HMAC-SHA256 of the device id,
/// keyed with the decoded group key. The same inputs always give the same
/// key, so the provisioning service can compute it independently.
pub fn derive_device_key(
    group_key: &SharedKey,
    device_id: &DeviceId,
) -> Result<SharedKey, InvalidKeyError> {
    hmac_sha256_base64(group_key, device_id.as_bytes()).map(SharedKey::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{DEVICE_KEY, GROUP_KEY};

    #[test]
    fn test_derive_known_key() {
        let key = derive_device_key(&GROUP_KEY.into(), &"sensor-01".parse().unwrap()).unwrap();
        assert_eq!(&*key, DEVICE_KEY);
    }

    #[test]
    fn test_derive_is_deterministic_per_device() {
        let group = SharedKey::from(GROUP_KEY);
        let a1 = derive_device_key(&group, &"sensor-01".parse().unwrap()).unwrap();
        let a2 = derive_device_key(&group, &"sensor-01".parse().unwrap()).unwrap();
        let b = derive_device_key(&group, &"sensor-02".parse().unwrap()).unwrap();

        assert_eq!(a1, a2);
        assert_ne!(a1, b);
    }

    #[test]
    fn test_derive_rejects_malformed_group_key() {
        let res = derive_device_key(&"%%%".into(), &"sensor-01".parse().unwrap());
        assert!(matches!(res, Err(InvalidKeyError::Encoding(_))));
    }
}
