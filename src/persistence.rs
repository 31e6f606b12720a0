//! Atomic JSON persistence helpers
//!
//! Every durable store in the brain (BM25 snapshot, chunk metadata, the
//! three memory files) is one JSON document written with the same
//! temp-file-then-rename sequence, so a crash mid-write never leaves a
//! half-written file in place of a good one.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::errors::{BrainError, Result};

/// Serialize `value` to `path` atomically: write to `<path>.tmp` in the
/// same directory, then rename over the destination.
pub fn save_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BrainError::io(parent, e))?;
    }

    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| BrainError::corrupt(path, format!("serialize failed: {e}")))?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &bytes).map_err(|e| BrainError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| BrainError::io(path, e))?;

    Ok(())
}

/// Load a JSON document from `path`.
///
/// Returns `Ok(None)` when the file does not exist. A file that exists but
/// fails to decode returns `CorruptSnapshot`; callers reset the affected
/// store to empty and keep booting.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(BrainError::io(path, e)),
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(Some(value)),
        Err(e) => Err(BrainError::corrupt(path, e.to_string())),
    }
}

/// Load a JSON document, degrading to `T::default()` with a warning on
/// any failure. This is the boot path: the engine must start even when
/// its persisted state is corrupt.
pub fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match load_json(path) {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load snapshot, starting empty");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let mut map = HashMap::new();
        map.insert("key".to_string(), 42u32);

        save_json_atomic(&path, &map).unwrap();
        let loaded: Option<HashMap<String, u32>> = load_json(&path).unwrap();
        assert_eq!(loaded, Some(map));
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded: Option<Vec<u32>> = load_json(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_corrupt_file_is_error_but_default_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, b"{not json").unwrap();

        let direct: Result<Option<Vec<u32>>> = load_json(&path);
        assert!(matches!(direct, Err(BrainError::CorruptSnapshot { .. })));

        let recovered: Vec<u32> = load_json_or_default(&path);
        assert!(recovered.is_empty());
    }

    #[test]
    fn test_no_tmp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        save_json_atomic(&path, &vec![1u32, 2, 3]).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|x| x == "tmp").unwrap_or(false))
            .collect();
        assert!(leftovers.is_empty(), "atomic save must not leave temp files");
    }
}
