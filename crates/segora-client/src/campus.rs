//! Which campus the explore page filters by.
//!
//! The profile's campus wins. Without one, the last campus the user picked
//! on this device is used, and failing that the feed is unconstrained.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ClientError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub campus: Option<String>,
}

impl Preferences {
    /// `<config dir>/segora/preferences.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("segora").join("preferences.json"))
    }

    /// Read preferences from `path`. A missing or unreadable file yields the
    /// defaults.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return Self::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Ignoring corrupt preferences at {}: {}", path.display(), e);
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ClientError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// Remember a campus picked by hand. Blank clears the selection.
    pub fn select_campus(&mut self, campus: Option<&str>) {
        self.campus = non_blank(campus).map(str::to_string);
    }
}

pub fn resolve_campus(profile_campus: Option<&str>, prefs: &Preferences) -> Option<String> {
    non_blank(profile_campus)
        .or_else(|| non_blank(prefs.campus.as_deref()))
        .map(str::to_string)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
