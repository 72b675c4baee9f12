use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::config::CachePolicy;
use crate::connection::ConnectionString;
use crate::util::types::{DeviceId, SharedKey};

/// Everything known about a device. Fields are filled in independently
/// as they are computed.
#[derive(Clone, Debug, Default)]
pub struct CacheEntry {
    pub device_key: Option<SharedKey>,
    pub last_register_attempt: Option<Instant>,
    pub connection: Option<(ConnectionString, Instant)>,
}

/// Per device registration state shared by concurrent lookups.
///
/// The cache is owned by the caller, which decides its lifetime and may
/// [reset](RegistrationCache::reset) it at any point.
#[derive(Debug, Default)]
pub struct RegistrationCache {
    policy: CachePolicy,
    entries: Mutex<HashMap<DeviceId, CacheEntry>>,
}

impl RegistrationCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Return a copy of the entry for `device_id`, if one exists.
    pub fn entry(&self, device_id: &DeviceId) -> Option<CacheEntry> {
        self.lock().get(device_id).cloned()
    }

    pub fn device_key(&self, device_id: &DeviceId) -> Option<SharedKey> {
        self.lock()
            .get(device_id)
            .and_then(|entry| entry.device_key.clone())
    }

    pub fn set_device_key(&self, device_id: &DeviceId, key: SharedKey) {
        self.with_entry(device_id, |entry| entry.device_key = Some(key));
    }

    /// Return the cached connection string for `device_id` if the cache
    /// policy still considers it valid.
    pub fn connection_string(&self, device_id: &DeviceId) -> Option<ConnectionString> {
        let entries = self.lock();
        let (conn, resolved_at) = entries.get(device_id)?.connection.as_ref()?;
        match self.policy {
            CachePolicy::Memoize => Some(conn.clone()),
            CachePolicy::Ttl(ttl) if resolved_at.elapsed() < ttl => Some(conn.clone()),
            CachePolicy::Ttl(_) => {
                trace!(device_id = %device_id, "cached connection string expired");
                None
            }
        }
    }

    pub fn set_connection_string(&self, device_id: &DeviceId, conn: ConnectionString) {
        self.with_entry(device_id, |entry| {
            entry.connection = Some((conn, Instant::now()))
        });
    }

    /// Record the start of a registration attempt for `device_id`.
    ///
    /// Fails with the time left until the next attempt is allowed if the
    /// previous attempt started less than `min_interval` ago. Checking and
    /// recording happen under the same lock, so of two concurrent callers
    /// for the same device only one gets through.
    pub fn begin_attempt(
        &self,
        device_id: &DeviceId,
        min_interval: Duration,
    ) -> Result<Instant, Duration> {
        self.with_entry(device_id, |entry| {
            let now = Instant::now();
            if let Some(last) = entry.last_register_attempt {
                let elapsed = now.saturating_duration_since(last);
                if elapsed < min_interval {
                    return Err(min_interval - elapsed);
                }
            }
            entry.last_register_attempt = Some(now);
            Ok(now)
        })
    }

    /// Forget the connection string of `device_id` so the next lookup
    /// provisions again. The derived key and attempt time are kept.
    pub fn invalidate(&self, device_id: &DeviceId) {
        if let Some(entry) = self.lock().get_mut(device_id) {
            entry.connection = None;
        }
    }

    /// Drop every entry.
    pub fn reset(&self) {
        self.lock().clear();
    }

    fn with_entry<R>(&self, device_id: &DeviceId, f: impl FnOnce(&mut CacheEntry) -> R) -> R {
        let mut entries = self.lock();
        let entry = entries.entry(device_id.clone()).or_default();
        f(entry)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DeviceId, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn device(id: &str) -> DeviceId {
        id.parse().unwrap()
    }

    fn conn(id: &str) -> ConnectionString {
        ConnectionString::new("hub", device(id), SharedKey::from("a2V5"))
    }

    #[test]
    fn test_fields_are_filled_independently() {
        let cache = RegistrationCache::default();
        let id = device("sensor-01");
        assert!(cache.entry(&id).is_none());

        cache.set_device_key(&id, SharedKey::from("a2V5"));
        let entry = cache.entry(&id).unwrap();
        assert!(entry.device_key.is_some());
        assert!(entry.last_register_attempt.is_none());
        assert!(entry.connection.is_none());
        assert!(cache.connection_string(&id).is_none());
    }

    #[test]
    fn test_second_attempt_within_interval_is_rejected() {
        let cache = RegistrationCache::default();
        let id = device("sensor-01");

        cache.begin_attempt(&id, Duration::from_secs(60)).unwrap();
        let remaining = cache
            .begin_attempt(&id, Duration::from_secs(60))
            .unwrap_err();
        assert!(remaining > Duration::ZERO && remaining <= Duration::from_secs(60));

        // other devices are not affected
        cache
            .begin_attempt(&device("sensor-02"), Duration::from_secs(60))
            .unwrap();
    }

    #[test]
    fn test_attempt_allowed_after_interval() {
        let cache = RegistrationCache::default();
        let id = device("sensor-01");

        cache.begin_attempt(&id, Duration::from_millis(5)).unwrap();
        std::thread::sleep(Duration::from_millis(10));
        cache.begin_attempt(&id, Duration::from_millis(5)).unwrap();
    }

    #[test]
    fn test_concurrent_attempts_only_one_wins() {
        let cache = Arc::new(RegistrationCache::default());
        let id = device("sensor-01");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let id = id.clone();
                std::thread::spawn(move || {
                    cache.begin_attempt(&id, Duration::from_secs(60)).is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_memoized_connection_string() {
        let cache = RegistrationCache::new(CachePolicy::Memoize);
        let id = device("sensor-01");

        cache.set_connection_string(&id, conn("sensor-01"));
        assert_eq!(cache.connection_string(&id), Some(conn("sensor-01")));

        cache.invalidate(&id);
        assert!(cache.connection_string(&id).is_none());
    }

    #[test]
    fn test_expired_connection_string() {
        let cache = RegistrationCache::new(CachePolicy::Ttl(Duration::ZERO));
        let id = device("sensor-01");

        cache.set_connection_string(&id, conn("sensor-01"));
        assert!(cache.connection_string(&id).is_none());
    }

    #[test]
    fn test_reset() {
        let cache = RegistrationCache::default();
        let id = device("sensor-01");
        cache.set_connection_string(&id, conn("sensor-01"));
        cache.begin_attempt(&id, Duration::from_secs(60)).unwrap();

        cache.reset();
        assert!(cache.entry(&id).is_none());
        cache.begin_attempt(&id, Duration::from_secs(60)).unwrap();
    }
}
