use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::util::types::SharedKey;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("failed to read group key from {0}: {1}")]
    Read(PathBuf, #[source] io::Error),

    #[error("group key at {0} is empty")]
    Empty(PathBuf),
}

/// Source of the group primary key used to derive device keys.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn group_key(&self) -> Result<SharedKey, SecretError>;
}

/// A key known up front, e.g. passed on the command line.
#[async_trait]
impl SecretProvider for SharedKey {
    async fn group_key(&self) -> Result<SharedKey, SecretError> {
        Ok(self.clone())
    }
}

/// A key read from a file whenever a device key has to be derived.
/// Surrounding whitespace is ignored.
///
/// Derived keys are kept in the [RegistrationCache](crate::RegistrationCache),
/// so a rotated group key only applies to devices already seen after the
/// cache is [reset](crate::RegistrationCache::reset).
#[derive(Clone, Debug)]
pub struct KeyFile {
    path: PathBuf,
}

impl KeyFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SecretProvider for KeyFile {
    async fn group_key(&self) -> Result<SharedKey, SecretError> {
        debug!("reading group key from {}", self.path.display());
        let contents = fs::read_to_string(&self.path)
            .await
            .map_err(|e| SecretError::Read(self.path.clone(), e))?;
        let key = contents.trim();
        if key.is_empty() {
            return Err(SecretError::Empty(self.path.clone()));
        }
        Ok(SharedKey::from(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn tmp_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("dps-remote-{}-{name}", std::process::id()))
    }

    #[tokio::test]
    async fn test_key_file_is_trimmed() {
        let path = tmp_path("key");
        fs::write(&path, "a2V5\n").await.unwrap();

        let key = KeyFile::new(&path).group_key().await.unwrap();
        assert_eq!(&*key, "a2V5");

        fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_key_file_errors() {
        let missing = tmp_path("missing");
        assert!(matches!(
            KeyFile::new(&missing).group_key().await,
            Err(SecretError::Read(..))
        ));

        let empty = tmp_path("empty");
        fs::write(&empty, "  \n").await.unwrap();
        assert!(matches!(
            KeyFile::new(&empty).group_key().await,
            Err(SecretError::Empty(_))
        ));
        fs::remove_file(&empty).await.unwrap();
    }
}
