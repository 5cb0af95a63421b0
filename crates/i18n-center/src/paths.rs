//! Filesystem layout helpers for i18n-center.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::Result;

use crate::error::CoreError;

/// Environment variable that overrides the default root directory.
const ROOT_ENV_KEY: &str = "I18N_CENTER_ROOT";
const DEFAULT_ROOT_DIRNAME: &str = ".i18n-center";
const SETTINGS_FILENAME: &str = "i18n.toml";
const CATALOG_FILENAME: &str = "messages.po";

/// Descriptor for the on-disk directory structure.
#[derive(Clone, Debug)]
pub struct Layout {
    root: PathBuf,
    config_dir: PathBuf,
    locale_dir: PathBuf,
    content_dir: PathBuf,
    logs_dir: PathBuf,
}

impl Layout {
    /// Construct a new layout without touching the filesystem.
    pub fn new(root: PathBuf) -> Self {
        let config_dir = root.join("config");
        let locale_dir = root.join("locale");
        let content_dir = root.join("content");
        let logs_dir = root.join("logs");

        Self { root, config_dir, locale_dir, content_dir, logs_dir }
    }

    /// Ensure that all directories exist on disk.
    pub fn ensure(&self) -> Result<()> {
        for dir in [
            self.root(),
            self.config_dir(),
            self.locale_dir(),
            self.content_dir(),
            self.logs_dir(),
        ] {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(|source| CoreError::CreateDirectory {
                    path: dir.to_path_buf(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    /// Root directory path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Top-level config directory.
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Directory holding one sub-directory of catalogs per language.
    pub fn locale_dir(&self) -> &Path {
        &self.locale_dir
    }

    /// Directory of pages served (and localized) by the HTTP server.
    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    /// Directory that stores server logs.
    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// Path to the settings file.
    pub fn settings_path(&self) -> PathBuf {
        self.config_dir().join(SETTINGS_FILENAME)
    }

    /// Path to the catalog of a language, by canonical tag.
    pub fn catalog_path(&self, tag: &str) -> PathBuf {
        self.locale_dir().join(tag).join(CATALOG_FILENAME)
    }

    /// Catalog file name looked up inside each language directory.
    pub fn catalog_filename() -> &'static str {
        CATALOG_FILENAME
    }
}

/// Determine the default root directory for i18n-center.
pub fn default_root() -> Result<PathBuf> {
    if let Ok(value) = env::var(ROOT_ENV_KEY) {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }

    let home = user_home_dir().ok_or(CoreError::HomeDirectoryUnknown)?;
    Ok(home.join(DEFAULT_ROOT_DIRNAME))
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: PathBuf) -> Result<PathBuf> {
    if let Some(str_path) = path.to_str() {
        if let Some(stripped) = str_path.strip_prefix('~') {
            let home = user_home_dir().ok_or(CoreError::HomeDirectoryUnknown)?;
            if stripped.is_empty() {
                return Ok(home);
            }
            let stripped = stripped.strip_prefix('/').unwrap_or(stripped);
            return Ok(home.join(stripped));
        }
    }
    Ok(path)
}

fn user_home_dir() -> Option<PathBuf> {
    if let Ok(home) = env::var("HOME") {
        if !home.is_empty() {
            return Some(PathBuf::from(home));
        }
    }

    if let Ok(profile) = env::var("USERPROFILE") {
        if !profile.is_empty() {
            return Some(PathBuf::from(profile));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn ensure_creates_all_directories() {
        let tmp = tempdir().unwrap();
        let layout = Layout::new(tmp.path().join("ws"));
        layout.ensure().unwrap();

        assert!(layout.config_dir().is_dir());
        assert!(layout.locale_dir().is_dir());
        assert!(layout.content_dir().is_dir());
        assert!(layout.logs_dir().is_dir());
    }

    #[test]
    fn catalog_path_is_per_language() {
        let layout = Layout::new(PathBuf::from("/srv/app"));
        assert_eq!(
            layout.catalog_path("fr-CA"),
            PathBuf::from("/srv/app/locale/fr-CA/messages.po")
        );
        assert_eq!(layout.settings_path(), PathBuf::from("/srv/app/config/i18n.toml"));
    }

    #[test]
    fn expand_tilde_keeps_plain_paths() {
        let path = PathBuf::from("/var/lib/i18n");
        assert_eq!(expand_tilde(path.clone()).unwrap(), path);
    }
}
