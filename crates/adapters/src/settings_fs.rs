//! Filesystem settings store: one file per key under a directory

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use whiff_domain::{SettingsStore, StorageError};

pub struct FsSettingsStore {
    dir: PathBuf,
}

impl FsSettingsStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path holding the blob for `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

impl SettingsStore for FsSettingsStore {
    fn read_blob(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read settings");
                None
            }
        }
    }

    fn write_blob(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;

        // Write beside the target and rename so readers never see a partial file
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &path)?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Saved settings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_blob() {
        let dir = TempDir::new().unwrap();
        let store = FsSettingsStore::new(dir.path());
        assert!(store.read_blob("settings").is_none());
    }

    #[test]
    fn test_blob_roundtrip_creates_directory() {
        let dir = TempDir::new().unwrap();
        let store = FsSettingsStore::new(dir.path().join("nested").join("whiff"));

        store.write_blob("settings", b"{\"show_date\":false}".to_vec()).unwrap();

        assert_eq!(
            store.read_blob("settings").unwrap(),
            b"{\"show_date\":false}".to_vec()
        );
        assert!(store.dir().join("settings.json").exists());
        assert!(!store.dir().join("settings.json.tmp").exists());
    }

    #[test]
    fn test_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = FsSettingsStore::new(dir.path());

        store.write_blob("settings", b"one".to_vec()).unwrap();
        store.write_blob("settings", b"two".to_vec()).unwrap();

        assert_eq!(store.read_blob("settings").unwrap(), b"two".to_vec());
    }

    #[test]
    fn test_key_is_sanitized() {
        let store = FsSettingsStore::new("/tmp/whiff");
        assert_eq!(
            store.path_for("../etc/passwd"),
            PathBuf::from("/tmp/whiff/___etc_passwd.json")
        );
    }
}
