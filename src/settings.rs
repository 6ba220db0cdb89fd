//! Persisted stamp settings
//!
//! The record lives at `.gitstamp/settings.toml` under the project directory
//! and holds two keys: where the hash is written and whether dirty builds
//! need confirmation. It is created with defaults on first access and only
//! changed through `SettingsStore::update`.

use fs2::FileExt;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Settings file location, relative to the project directory
pub const SETTINGS_FILE_PATH: &str = ".gitstamp/settings.toml";

/// Default stamp location, relative to the project directory
pub const DEFAULT_HASH_FILE_PATH: &str = "assets/git_hash.txt";

const HASH_PATH_KEY: &str = "GitHashTextAssetPath";
const SHOW_WARNING_KEY: &str = "ShowWarning";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to access settings file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to edit settings file {path:?}: {source}")]
    Edit {
        path: PathBuf,
        #[source]
        source: toml_edit::TomlError,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// The persisted record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionRecord {
    /// Where the hash is written; relative paths are under the project directory
    #[serde(rename = "GitHashTextAssetPath")]
    pub hash_file_path: String,

    /// Ask before stamping a build from a dirty working tree
    #[serde(rename = "ShowWarning")]
    pub show_warning: bool,
}

impl Default for VersionRecord {
    fn default() -> Self {
        VersionRecord { hash_file_path: DEFAULT_HASH_FILE_PATH.to_string(), show_warning: true }
    }
}

/// Loads, creates and updates the settings record of one project
#[derive(Debug, Clone)]
pub struct SettingsStore {
    project_dir: PathBuf,
    path: PathBuf,
}

impl SettingsStore {
    /// Store for the settings file under `project_dir`
    pub fn for_project(project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        let path = project_dir.join(SETTINGS_FILE_PATH);
        SettingsStore { project_dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve the record's output path against the project directory
    pub fn resolve_output_path(&self, record: &VersionRecord) -> PathBuf {
        resolve_against(&self.project_dir, &record.hash_file_path)
    }

    /// Load the record, creating and persisting the defaults if it does not exist yet
    pub fn get_or_create(&self) -> Result<VersionRecord, SettingsError> {
        if let Some(record) = self.load()? {
            return Ok(record);
        }

        let record = VersionRecord::default();
        let content = toml::to_string(&record)?;
        self.write_locked(&content)?;
        info!("Created settings file {:?} with defaults", self.path);
        Ok(record)
    }

    /// Change either field and persist immediately
    ///
    /// The document is edited in place, so comments and unrelated keys survive.
    /// The stored record is validated only after the change, so an update can
    /// repair a bad hand edit.
    pub fn update(
        &self,
        hash_file_path: Option<&str>,
        show_warning: Option<bool>,
    ) -> Result<VersionRecord, SettingsError> {
        let content = if self.path.exists() {
            self.read_to_string()?
        } else {
            toml::to_string(&VersionRecord::default())?
        };
        let mut doc: toml_edit::DocumentMut =
            content.parse().map_err(|source| SettingsError::Edit { path: self.path.clone(), source })?;

        if let Some(path) = hash_file_path {
            doc[HASH_PATH_KEY] = toml_edit::value(path);
        }
        if let Some(show) = show_warning {
            doc[SHOW_WARNING_KEY] = toml_edit::value(show);
        }

        let edited = doc.to_string();
        let updated = content_to_record(&edited, &self.path)?;
        self.write_locked(&edited)?;
        debug!("Updated settings {:?}: {:?}", self.path, updated);
        Ok(updated)
    }

    /// Read the record if the file exists
    fn load(&self) -> Result<Option<VersionRecord>, SettingsError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = self.read_to_string()?;
        let record = content_to_record(&content, &self.path)?;
        debug!("Loaded settings {:?}: {:?}", self.path, record);
        Ok(Some(record))
    }

    fn read_to_string(&self) -> Result<String, SettingsError> {
        let mut content = String::new();
        File::open(&self.path)
            .and_then(|mut f| f.read_to_string(&mut content))
            .map_err(|source| self.io_error(source))?;
        Ok(content)
    }

    /// Replace the file content while holding an exclusive lock on it
    fn write_locked(&self, content: &str) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        file.lock_exclusive().map_err(|source| self.io_error(source))?;

        let result = file
            .set_len(0)
            .and_then(|_| file.seek(SeekFrom::Start(0)))
            .and_then(|_| file.write_all(content.as_bytes()))
            .and_then(|_| file.flush());

        if let Err(e) = FileExt::unlock(&file) {
            debug!("Failed to unlock settings file {:?}: {}", self.path, e);
        }
        result.map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> SettingsError {
        SettingsError::Io { path: self.path.clone(), source }
    }
}

/// Parse and validate a settings document
fn content_to_record(content: &str, path: &Path) -> Result<VersionRecord, SettingsError> {
    let record: VersionRecord =
        toml::from_str(content).map_err(|source| SettingsError::Parse { path: path.to_path_buf(), source })?;
    if record.hash_file_path.trim().is_empty() {
        return Err(SettingsError::Invalid { key: HASH_PATH_KEY, reason: "path must not be empty".to_string() });
    }
    Ok(record)
}

/// Join a relative path onto `base`; absolute paths pass through
pub fn resolve_against(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() { path.to_path_buf() } else { base.join(path) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::for_project(dir.path());
        assert!(!store.path().exists());

        let record = store.get_or_create().expect("create");
        assert_eq!(record, VersionRecord::default());
        assert!(record.show_warning);
        assert_eq!(record.hash_file_path, DEFAULT_HASH_FILE_PATH);

        let on_disk = fs::read_to_string(store.path()).unwrap();
        assert!(on_disk.contains("GitHashTextAssetPath"));
        assert!(on_disk.contains("ShowWarning = true"));
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::for_project(dir.path());

        let first = store.get_or_create().unwrap();
        let written = fs::read_to_string(store.path()).unwrap();
        let second = store.get_or_create().unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read_to_string(store.path()).unwrap(), written);
    }

    #[test]
    fn test_existing_values_are_not_reset() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::for_project(dir.path());
        store.update(Some("out/hash.txt"), Some(false)).unwrap();

        let record = store.get_or_create().unwrap();
        assert_eq!(record.hash_file_path, "out/hash.txt");
        assert!(!record.show_warning);
    }

    #[test]
    fn test_partial_update_keeps_other_field_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::for_project(dir.path());
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "# stamp settings\nGitHashTextAssetPath = \"res/hash.txt\"\nShowWarning = true\n")
            .unwrap();

        let record = store.update(None, Some(false)).unwrap();
        assert_eq!(record.hash_file_path, "res/hash.txt");
        assert!(!record.show_warning);

        let on_disk = fs::read_to_string(store.path()).unwrap();
        assert!(on_disk.starts_with("# stamp settings\n"));
        assert!(on_disk.contains("ShowWarning = false"));
        assert_eq!(store.get_or_create().unwrap(), record);
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::for_project(dir.path());
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "ShowWarning = false\n").unwrap();

        let record = store.get_or_create().unwrap();
        assert_eq!(record.hash_file_path, DEFAULT_HASH_FILE_PATH);
        assert!(!record.show_warning);
    }

    #[test]
    fn test_empty_output_path_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::for_project(dir.path());
        let err = store.update(Some("  "), None).unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { .. }));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_update_repairs_empty_output_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::for_project(dir.path());
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "GitHashTextAssetPath = \"\"\nShowWarning = true\n").unwrap();
        assert!(matches!(store.get_or_create(), Err(SettingsError::Invalid { .. })));

        let record = store.update(Some("assets/ok.txt"), None).expect("update should repair the path");
        assert_eq!(record.hash_file_path, "assets/ok.txt");
        assert!(record.show_warning);
        assert_eq!(store.get_or_create().unwrap(), record);
    }

    #[test]
    fn test_update_without_file_starts_from_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::for_project(dir.path());

        let record = store.update(None, Some(false)).unwrap();
        assert_eq!(record.hash_file_path, DEFAULT_HASH_FILE_PATH);
        assert!(!record.show_warning);
        assert_eq!(store.get_or_create().unwrap(), record);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::for_project(dir.path());
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "ShowWarning = \"maybe\"\n").unwrap();
        assert!(matches!(store.get_or_create(), Err(SettingsError::Parse { .. })));
    }

    #[test]
    fn test_resolve_output_path() {
        let store = SettingsStore::for_project("/project");
        let record = VersionRecord::default();
        assert_eq!(store.resolve_output_path(&record), Path::new("/project").join(DEFAULT_HASH_FILE_PATH));

        let abs = if cfg!(windows) { "C:\\out\\hash.txt" } else { "/out/hash.txt" };
        assert_eq!(resolve_against(Path::new("/project"), abs), PathBuf::from(abs));
    }
}
