use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::draft::{DraftError, DraftResult, DraftStore};

/// File-backed [`DraftStore`] keeping one JSON file per key under a directory.
///
/// Writes go through a temporary file renamed into place so a crash mid-write
/// never leaves a truncated draft behind.
pub struct FileDraftStore {
    dir: PathBuf,
}

impl FileDraftStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> DraftResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| DraftError::Io {
            key: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }

    fn write_atomic(&self, key: &str, path: &Path, bytes: &[u8]) -> DraftResult<()> {
        let tmp = path.with_extension("json.tmp");
        let io_err = |source| DraftError::Io {
            key: key.into(),
            source,
        };
        fs::write(&tmp, bytes).map_err(io_err)?;
        match fs::rename(&tmp, path) {
            Ok(()) => Ok(()),
            Err(rename_err) => {
                if path.exists() {
                    fs::remove_file(path).map_err(io_err)?;
                    fs::rename(&tmp, path).map_err(io_err)
                } else {
                    Err(io_err(rename_err))
                }
            }
        }
    }
}

impl DraftStore for FileDraftStore {
    fn save(&self, key: &str, value: &serde_json::Value) -> DraftResult<()> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| DraftError::Codec {
            key: key.into(),
            source,
        })?;
        let path = self.path_for(key);
        self.write_atomic(key, &path, &bytes)
    }

    fn load(&self, key: &str) -> DraftResult<Option<serde_json::Value>> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(DraftError::Io {
                    key: key.into(),
                    source,
                });
            }
        };
        let value = serde_json::from_slice(&bytes).map_err(|source| DraftError::Codec {
            key: key.into(),
            source,
        })?;
        Ok(Some(value))
    }

    fn clear(&self, key: &str) -> DraftResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(DraftError::Io {
                key: key.into(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn scratch_store() -> FileDraftStore {
        let dir = std::env::temp_dir().join(format!("studydeck-drafts-{}", Uuid::new_v4()));
        FileDraftStore::new(dir).unwrap()
    }

    #[test]
    fn save_load_clear_round_trip() {
        let store = scratch_store();
        let value = json!({"topic": "integrals", "seconds_remaining": 900});

        store.save("timer.active", &value).unwrap();
        assert_eq!(store.load("timer.active").unwrap(), Some(value));

        store.clear("timer.active").unwrap();
        assert_eq!(store.load("timer.active").unwrap(), None);
    }

    #[test]
    fn save_overwrites_previous_value() {
        let store = scratch_store();
        store.save("k", &json!(1)).unwrap();
        store.save("k", &json!(2)).unwrap();
        assert_eq!(store.load("k").unwrap(), Some(json!(2)));
    }

    #[test]
    fn clearing_absent_key_is_noop() {
        let store = scratch_store();
        store.clear("never-saved").unwrap();
    }

    #[test]
    fn keys_are_sanitized_into_file_names() {
        let store = scratch_store();
        store.save("timer.active", &json!(true)).unwrap();
        store.save("timer/active", &json!(false)).unwrap();
        // Both keys collapse to the same sanitized name; the second write wins.
        assert_eq!(store.load("timer.active").unwrap(), Some(json!(false)));
    }
}
