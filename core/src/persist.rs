use crate::index::IndexSnapshot;
use crate::profile::ProfileMap;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{create_dir_all, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Storage for the index snapshot.
pub trait SnapshotRepository: Send + Sync {
    /// `Ok(None)` when nothing usable is stored.
    fn load(&self) -> Result<Option<IndexSnapshot>>;
    fn save(&self, snapshot: &IndexSnapshot) -> Result<()>;
}

/// Storage for the user profile map.
pub trait ProfileRepository: Send + Sync {
    /// An empty map when nothing usable is stored.
    fn load(&self) -> Result<ProfileMap>;
    fn save(&self, profiles: &ProfileMap) -> Result<()>;
}

/// Read a JSON file. Missing and unparsable files both come back as `None`;
/// the latter is logged.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let mut f = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("opening {}", path.display())),
    };
    let mut buf = String::new();
    f.read_to_string(&mut buf).with_context(|| format!("reading {}", path.display()))?;
    match serde_json::from_str(&buf) {
        Ok(v) => Ok(Some(v)),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "ignoring corrupt file");
            Ok(None)
        }
    }
}

/// Write JSON to a sibling temp file, then rename it over the target.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    {
        let mut f = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        let json = serde_json::to_string_pretty(value)?;
        f.write_all(json.as_bytes())?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct JsonSnapshotRepository {
    path: PathBuf,
}

impl JsonSnapshotRepository {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotRepository for JsonSnapshotRepository {
    fn load(&self) -> Result<Option<IndexSnapshot>> {
        read_json(&self.path)
    }

    fn save(&self, snapshot: &IndexSnapshot) -> Result<()> {
        write_json_atomic(&self.path, snapshot)
    }
}

#[derive(Debug, Clone)]
pub struct JsonProfileRepository {
    path: PathBuf,
}

impl JsonProfileRepository {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }
}

impl ProfileRepository for JsonProfileRepository {
    fn load(&self) -> Result<ProfileMap> {
        Ok(read_json(&self.path)?.unwrap_or_default())
    }

    fn save(&self, profiles: &ProfileMap) -> Result<()> {
        write_json_atomic(&self.path, profiles)
    }
}

/// Keeps everything in memory; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    snapshot: Mutex<Option<IndexSnapshot>>,
    profiles: Mutex<ProfileMap>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotRepository for MemoryRepository {
    fn load(&self) -> Result<Option<IndexSnapshot>> {
        Ok(self.snapshot.lock().clone())
    }

    fn save(&self, snapshot: &IndexSnapshot) -> Result<()> {
        *self.snapshot.lock() = Some(snapshot.clone());
        Ok(())
    }
}

impl ProfileRepository for MemoryRepository {
    fn load(&self) -> Result<ProfileMap> {
        Ok(self.profiles.lock().clone())
    }

    fn save(&self, profiles: &ProfileMap) -> Result<()> {
        *self.profiles.lock() = profiles.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::index::IndexBuilder;
    use crate::profile::UserProfile;
    use std::fs;

    #[test]
    fn snapshot_round_trip_uses_documented_layout() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("a.md");
        fs::write(&doc, "# Alpha\nrust tokio").unwrap();
        let cfg = EngineConfig::default();
        let snap = IndexBuilder::new(&cfg).build(&[doc]);

        let repo = JsonSnapshotRepository::new(dir.path().join("store/index.json"));
        repo.save(&snap).unwrap();
        assert!(!dir.path().join("store/index.json.tmp").exists());

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(repo.path()).unwrap()).unwrap();
        assert!(raw["documents"].is_array());
        assert!(raw["terms"].is_object());
        assert_eq!(raw["invertedIndex"]["rust"][0]["docId"], 0);
        assert_eq!(raw["invertedIndex"]["rust"][0]["frequency"], 1);
        assert_eq!(raw["metadata"]["totalDocs"], 1);
        assert!(raw["metadata"]["lastUpdated"].is_u64());
        assert!(raw["timestamp"].is_string());

        assert_eq!(repo.load().unwrap(), Some(snap));
    }

    #[test]
    fn missing_or_corrupt_snapshot_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonSnapshotRepository::new(dir.path().join("index.json"));
        assert!(repo.load().unwrap().is_none());
        fs::write(dir.path().join("index.json"), "{ not json").unwrap();
        assert!(repo.load().unwrap().is_none());
    }

    #[test]
    fn profiles_fall_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        let repo = JsonProfileRepository::new(&path);
        assert!(repo.load().unwrap().is_empty());

        let mut map = ProfileMap::new();
        map.insert("ann".into(), UserProfile::new("ann"));
        repo.save(&map).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["ann"]["id"], "ann");
        assert!(raw["ann"]["searchHistory"].is_array());
        assert_eq!(repo.load().unwrap(), map);

        fs::write(&path, "garbage").unwrap();
        assert!(repo.load().unwrap().is_empty());
    }
}
