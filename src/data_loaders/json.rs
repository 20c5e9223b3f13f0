// ~/lifegrid/src/data_loaders/json.rs

use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JsonFileError {
    #[error("file not found")]
    Missing,
    #[error("failed to read file: {0}")]
    Io(#[from] io::Error),
    #[error("invalid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Read and deserialize a JSON document, keeping "file absent" distinct from
/// "file present but unusable".
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, JsonFileError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(JsonFileError::Missing),
        Err(e) => return Err(JsonFileError::Io(e)),
    };

    Ok(serde_json::from_str(&text)?)
}

/// Serialize to a temporary sibling and rename-replace, so a concurrent
/// reader never observes a partial document.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let tmp = tmp_sibling(path);
    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");
        let value = Sample {
            name: "grid".to_string(),
            count: 52,
        };

        write_json_atomic(&path, &value).unwrap();
        let loaded: Sample = read_json(&path).unwrap();
        assert_eq!(loaded, value);
        assert!(!dir.path().join("sample.json.tmp").exists());
    }

    #[test]
    fn missing_file_is_distinct_from_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        assert!(matches!(
            read_json::<Sample>(&path),
            Err(JsonFileError::Missing)
        ));

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            read_json::<Sample>(&path),
            Err(JsonFileError::Malformed(_))
        ));
    }
}
