//! Persistent client-side device identifier used for server-side view dedup.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DeviceIdError;

/// File name used inside the data directory.
pub const DEVICE_ID_FILE: &str = "device-id";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Load the identifier stored at `path`, creating and persisting one if absent.
    ///
    /// The identifier is generated once and then reused indefinitely.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self, DeviceIdError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(raw) => {
                let id = Self::parse(raw.trim(), path)?;
                debug!(path = %path.display(), device_id = %id, "Loaded device id");
                Ok(id)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let id = Self::generate();
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
                }
                std::fs::write(path, id.as_str()).map_err(|source| io_error(path, source))?;
                info!(path = %path.display(), device_id = %id, "Created device id");
                Ok(id)
            }
            Err(source) => Err(io_error(path, source)),
        }
    }

    fn parse(raw: &str, path: &Path) -> Result<Self, DeviceIdError> {
        Uuid::parse_str(raw)
            .map(|uuid| Self(uuid.to_string()))
            .map_err(|e| DeviceIdError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> DeviceIdError {
    DeviceIdError::Io {
        path: PathBuf::from(path),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_unique() {
        assert_ne!(DeviceId::generate(), DeviceId::generate());
    }

    #[test]
    fn test_load_or_create_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(DEVICE_ID_FILE);

        let first = DeviceId::load_or_create(&path).unwrap();
        let second = DeviceId::load_or_create(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), first.as_str());
    }

    #[test]
    fn test_load_tolerates_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEVICE_ID_FILE);
        let uuid = "7c9e6679-7425-40de-944b-e07fc1f90ae7";
        std::fs::write(&path, format!("{uuid}\n")).unwrap();

        let id = DeviceId::load_or_create(&path).unwrap();
        assert_eq!(id.as_str(), uuid);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEVICE_ID_FILE);
        std::fs::write(&path, "not-a-uuid").unwrap();

        let err = DeviceId::load_or_create(&path).unwrap_err();
        assert!(matches!(err, DeviceIdError::Corrupt { .. }));
    }
}
