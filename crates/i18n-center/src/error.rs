use std::{
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use toml_edit::de::Error as TomlDeError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("language tag cannot be empty")]
    LanguageTagEmpty,

    #[error("invalid language tag '{tag}'")]
    LanguageTagInvalid { tag: String },

    #[error("failed to create directory {path}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read directory {path}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read catalog {path}")]
    CatalogRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed catalog {path} at line {line}: {reason}")]
    CatalogParse { path: PathBuf, line: usize, reason: String },

    #[error("failed to read settings file {path}")]
    SettingsRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse settings file {path}")]
    SettingsParse {
        path: PathBuf,
        #[source]
        source: TomlDeError,
    },

    #[error("invalid url exclusion pattern '{pattern}'")]
    ExclusionPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("response has already been flushed")]
    ResponseAlreadyFlushed,

    #[error("malformed partial-update fragment at offset {offset}: {reason}")]
    FragmentMalformed { offset: usize, reason: &'static str },

    #[error("unable to determine user home directory for I18N_CENTER_ROOT")]
    HomeDirectoryUnknown,
}

impl CoreError {
    /// Stable identifier for the error kind, used in API payloads.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::LanguageTagEmpty => "language_tag_empty",
            CoreError::LanguageTagInvalid { .. } => "language_tag_invalid",
            CoreError::CreateDirectory { .. } => "create_dir_failed",
            CoreError::ReadDirectory { .. } => "read_dir_failed",
            CoreError::CatalogRead { .. } => "catalog_read_failed",
            CoreError::CatalogParse { .. } => "catalog_parse_failed",
            CoreError::SettingsRead { .. } => "settings_read_failed",
            CoreError::SettingsParse { .. } => "settings_parse_failed",
            CoreError::ExclusionPattern { .. } => "exclusion_pattern_invalid",
            CoreError::ResponseAlreadyFlushed => "response_already_flushed",
            CoreError::FragmentMalformed { .. } => "fragment_malformed",
            CoreError::HomeDirectoryUnknown => "home_dir_unknown",
        }
    }

    pub fn placeholders(&self) -> Vec<(&'static str, String)> {
        match self {
            CoreError::LanguageTagEmpty
            | CoreError::ResponseAlreadyFlushed
            | CoreError::HomeDirectoryUnknown => Vec::new(),
            CoreError::LanguageTagInvalid { tag } => vec![("tag", tag.clone())],
            CoreError::CreateDirectory { path, source }
            | CoreError::ReadDirectory { path, source }
            | CoreError::CatalogRead { path, source }
            | CoreError::SettingsRead { path, source } => {
                vec![("path", display_path(path)), ("error", source.to_string())]
            }
            CoreError::CatalogParse { path, line, reason } => vec![
                ("path", display_path(path)),
                ("line", line.to_string()),
                ("error", reason.clone()),
            ],
            CoreError::SettingsParse { path, source } => {
                vec![("path", display_path(path)), ("error", source.to_string())]
            }
            CoreError::ExclusionPattern { pattern, source } => {
                vec![("pattern", pattern.clone()), ("error", source.to_string())]
            }
            CoreError::FragmentMalformed { offset, reason } => {
                vec![("offset", offset.to_string()), ("error", reason.to_string())]
            }
        }
    }
}

impl From<CoreError> for io::Error {
    fn from(err: CoreError) -> Self {
        io::Error::other(err)
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}
