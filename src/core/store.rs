use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::CacheError;

/// One cached backend response.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResult {
    pub name: String,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub data: Value,
}

impl CachedResult {
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        let millis = (self.timestamp * 1000.0).round() as i64;
        Utc.timestamp_millis_opt(millis).single()
    }
}

/// On-disk document, one per name.
#[derive(Serialize, Deserialize)]
struct Entry {
    timestamp: f64,
    data: Value,
}

/// Result of reading one cache entry.
#[derive(Debug)]
pub enum CacheLookup {
    Hit(CachedResult),
    Miss,
    /// The entry exists but could not be read or parsed.
    Corrupt(String),
}

/// File-backed store keeping the last successful response per name.
///
/// Each name maps to `<dir>/<name>.json`. Writes go to a temporary file in
/// the same directory and are renamed into place.
pub struct ResultCache {
    dir: PathBuf,
}

impl ResultCache {
    /// Create a cache rooted at `dir`. The directory is created on first save.
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, name: &str) -> Result<PathBuf, CacheError> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{name}.json")))
    }

    /// Store `data` under `name`, replacing any previous entry.
    pub fn save(&self, name: &str, data: &Value) -> Result<CachedResult, CacheError> {
        let path = self.entry_path(name)?;
        fs::create_dir_all(&self.dir)?;

        let timestamp = Utc::now().timestamp_millis() as f64 / 1000.0;
        let entry = Entry {
            timestamp,
            data: data.clone(),
        };
        let json_str = serde_json::to_string_pretty(&entry)?;

        write_atomic(&path, json_str.as_bytes())?;

        debug!(name, path = %path.display(), "cached result");
        Ok(CachedResult {
            name: name.to_string(),
            timestamp,
            data: data.clone(),
        })
    }

    /// Read the entry for `name`, reporting why it is unusable if it is.
    pub fn lookup(&self, name: &str) -> CacheLookup {
        let path = match self.entry_path(name) {
            Ok(path) => path,
            Err(e) => return CacheLookup::Corrupt(e.to_string()),
        };

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return CacheLookup::Miss,
            Err(e) => return CacheLookup::Corrupt(e.to_string()),
        };

        match serde_json::from_str::<Entry>(&content) {
            Ok(entry) => CacheLookup::Hit(CachedResult {
                name: name.to_string(),
                timestamp: entry.timestamp,
                data: entry.data,
            }),
            Err(e) => CacheLookup::Corrupt(e.to_string()),
        }
    }

    /// Read the entry for `name`. Missing and corrupt entries are both absent.
    pub fn load(&self, name: &str) -> Option<CachedResult> {
        match self.lookup(name) {
            CacheLookup::Hit(result) => Some(result),
            CacheLookup::Miss => None,
            CacheLookup::Corrupt(reason) => {
                warn!(name, %reason, "ignoring unreadable cache entry");
                None
            }
        }
    }

    /// Delete the entry for `name`. A missing entry is not an error.
    pub fn clear(&self, name: &str) -> Result<(), CacheError> {
        let path = self.entry_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Names currently stored, sorted.
    pub fn names(&self) -> Result<Vec<String>, CacheError> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in read_dir {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_name(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Replace `path` with `contents` via a temporary sibling and a rename, so
/// readers see either the old file or the new one.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| std::io::Error::new(ErrorKind::InvalidInput, "path has no file name"))?;
    fs::create_dir_all(dir)?;

    let tmp_path = dir.join(format!(".{file_name}.{}.tmp", Uuid::new_v4()));
    if let Err(e) = fs::write(&tmp_path, contents) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), CacheError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidName(name.to_string()))
    }
}
