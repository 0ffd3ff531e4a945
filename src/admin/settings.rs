//! Persistent admin settings (`<data_dir>/admin/settings.json`).
//!
//! The file is a JSON object. Herald owns the `ROLES` key, a map of group id to
//! the role names members may assign to themselves; any other keys are kept
//! as-is on save. Writes take an exclusive fs2 lock and replace the file through
//! a temp file + rename.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::platform::GroupId;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AdminSettings {
    #[serde(rename = "ROLES", default)]
    pub roles: HashMap<GroupId, Vec<String>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: AdminSettings,
}

impl SettingsStore {
    /// Open (creating if needed) the settings file under `data_dir`.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let dir = data_dir.as_ref().join("admin");
        let path = dir.join("settings.json");
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| SettingsError::Io { path: dir.clone(), source })?;

        let settings = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => AdminSettings::default(),
            Ok(content) => serde_json::from_str(&content)
                .map_err(|source| SettingsError::Json { path: path.clone(), source })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Creating empty admin settings at {}", path.display());
                write_file_locked(&path, "{}")?;
                AdminSettings::default()
            }
            Err(source) => return Err(SettingsError::Io { path, source }),
        };

        Ok(Self { path, settings })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &AdminSettings {
        &self.settings
    }

    /// Role names members of `group` may assign themselves. `None` when never configured.
    pub fn self_roles(&self, group: &str) -> Option<&[String]> {
        self.settings.roles.get(group).map(Vec::as_slice)
    }

    pub fn set_self_roles(&mut self, group: &str, names: Vec<String>) -> Result<(), SettingsError> {
        debug!("self roles for {} set to {:?}", group, names);
        self.settings.roles.insert(group.to_string(), names);
        self.save()
    }

    fn save(&self) -> Result<(), SettingsError> {
        let content = serde_json::to_string_pretty(&self.settings).map_err(|source| {
            SettingsError::Json {
                path: self.path.clone(),
                source,
            }
        })?;
        write_file_locked(&self.path, &content)
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SettingsError {
    let path = path.to_path_buf();
    move |source| SettingsError::Io { path, source }
}

/// Replace `path` with `content`: write `<path>.tmp`, then rename over the
/// original. Writers serialize on an fs2 lock held on `<path>.lock`, a file
/// that is never replaced, so every writer contends for the same inode.
fn write_file_locked(path: &Path, content: &str) -> Result<(), SettingsError> {
    use std::fs::{self, File, OpenOptions};
    use std::io::Write;

    let lock_path = sidecar(path, "lock");
    let lock = OpenOptions::new()
        .create(true)
        .write(true)
        .open(&lock_path)
        .map_err(io_err(&lock_path))?;
    lock.lock_exclusive().map_err(io_err(&lock_path))?;

    let tmp_path = sidecar(path, "tmp");
    let written = File::create(&tmp_path).and_then(|mut tmp| {
        tmp.write_all(content.as_bytes())?;
        tmp.sync_all()
    });
    let result = written
        .map_err(io_err(&tmp_path))
        .and_then(|()| fs::rename(&tmp_path, path).map_err(io_err(path)));
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }

    let _ = FileExt::unlock(&lock);
    result
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_empty_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(tmp.path()).await.unwrap();
        assert!(store.path().exists());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "{}");
        assert!(store.self_roles("g").is_none());
    }

    #[tokio::test]
    async fn self_roles_persist_and_keep_unknown_keys() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("admin")).unwrap();
        std::fs::write(
            tmp.path().join("admin/settings.json"),
            r#"{"ROLES": {"g1": ["Old"]}, "LEGACY": 7}"#,
        )
        .unwrap();

        let mut store = SettingsStore::open(tmp.path()).await.unwrap();
        assert_eq!(store.self_roles("g1"), Some(&["Old".to_string()][..]));
        store
            .set_self_roles("g2", vec!["Staff".into(), "Mod".into()])
            .unwrap();

        let reopened = SettingsStore::open(tmp.path()).await.unwrap();
        assert_eq!(
            reopened.self_roles("g2"),
            Some(&["Staff".to_string(), "Mod".to_string()][..])
        );
        assert_eq!(reopened.settings().extra.get("LEGACY"), Some(&serde_json::json!(7)));
    }

    #[tokio::test]
    async fn concurrent_writers_leave_a_valid_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = SettingsStore::open(tmp.path()).await.unwrap().path().to_path_buf();

        let writers: Vec<_> = (0..4)
            .map(|w| {
                let path = path.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let body = format!(r#"{{"ROLES": {{"g{}": ["R{}"]}}}}"#, w, i);
                        write_file_locked(&path, &body).unwrap();
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: AdminSettings = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.roles.len(), 1);
        assert!(!sidecar(&path, "tmp").exists());
        assert!(sidecar(&path, "lock").exists());
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("admin")).unwrap();
        std::fs::write(tmp.path().join("admin/settings.json"), "{not json").unwrap();
        let err = SettingsStore::open(tmp.path()).await.unwrap_err();
        assert!(matches!(err, SettingsError::Json { .. }));
    }
}
