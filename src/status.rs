//! Read-only status report: what would be stamped, and what is stamped now.

use crate::git::RevisionProbe;
use crate::settings::{SettingsError, SettingsStore};
use crate::stamp;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub revision: String,
    pub revision_found: bool,
    pub pending_changes: usize,
    pub show_warning: bool,
    pub stamp_path: PathBuf,
    /// Content of the stamp file, if one exists
    pub stamp: Option<String>,
    pub settings_path: PathBuf,
    pub checked_at: String,
}

impl StatusReport {
    pub fn collect(probe: &RevisionProbe<'_>, settings: &SettingsStore) -> Result<Self, SettingsError> {
        let record = settings.get_or_create()?;
        let stamp_path = settings.resolve_output_path(&record);
        let stamp = stamp::read_stamp(&stamp_path)
            .map_err(|source| SettingsError::Io { path: stamp_path.clone(), source })?;
        let revision = probe.current_short_revision();

        Ok(StatusReport {
            revision: revision.short_hash,
            revision_found: revision.found,
            pending_changes: probe.pending_change_count(),
            show_warning: record.show_warning,
            stamp_path,
            stamp,
            settings_path: settings.path().to_path_buf(),
            checked_at: chrono::Local::now().to_rfc3339(),
        })
    }

    /// Whether the stamp file matches what a clean/dirty build would write now
    pub fn is_current(&self) -> bool {
        let suffix = if self.pending_changes > 0 { stamp::DIRTY_SUFFIX } else { "" };
        self.stamp.as_deref() == Some(format!("{}{}", self.revision, suffix).as_str())
    }

    pub fn to_text(&self) -> String {
        let stamp = match &self.stamp {
            Some(content) if self.is_current() => format!("{} (up to date)", content),
            Some(content) => format!("{} (stale)", content),
            None => "(not written yet)".to_string(),
        };
        format!(
            "Revision:        {}\nPending changes: {}\nStamp file:      {}\nStamp:           {}\nShow warning:    {}\nSettings:        {}",
            self.revision,
            self.pending_changes,
            self.stamp_path.display(),
            stamp,
            self.show_warning,
            self.settings_path.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(revision: &str, pending: usize, stamp: Option<&str>) -> StatusReport {
        StatusReport {
            revision: revision.to_string(),
            revision_found: true,
            pending_changes: pending,
            show_warning: true,
            stamp_path: PathBuf::from("assets/git_hash.txt"),
            stamp: stamp.map(str::to_string),
            settings_path: PathBuf::from(".gitstamp/settings.toml"),
            checked_at: "2024-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_is_current() {
        assert!(report("a1b2c3d", 0, Some("a1b2c3d")).is_current());
        assert!(report("a1b2c3d", 3, Some("a1b2c3d+")).is_current());
        assert!(!report("a1b2c3d", 3, Some("a1b2c3d")).is_current());
        assert!(!report("a1b2c3d", 0, None).is_current());
    }

    #[test]
    fn test_text_and_json() {
        let r = report("a1b2c3d", 0, None);
        assert!(r.to_text().contains("(not written yet)"));

        let json: serde_json::Value = serde_json::to_value(&r).unwrap();
        assert_eq!(json["revision"], "a1b2c3d");
        assert_eq!(json["pending_changes"], 0);
        assert!(json["stamp"].is_null());
    }
}
