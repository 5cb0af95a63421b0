use std::fs;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{error::CoreError, language::LanguageTag, paths::Layout};

const DEFAULT_ENVIRONMENT: &str = "default";
const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_ASYNC_POSTBACK_TYPES: &str = "updatePanel,scriptStartupBlock,pageTitle";
const DEFAULT_URL_EXCLUSION: &str =
    r"(?i)\.(?:css|js|map|png|jpe?g|gif|svg|ico|webp|woff2?|ttf|eot|otf|pdf|zip|mp4|webm)(?:[?#].*)?$";

/// Process-wide localization settings, read from `config/i18n.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Scope name prefixed to every cache key.
    pub environment: String,
    /// Language the message keys are written in.
    pub default_language: String,
    /// Treat a message key as its own translation in the default language.
    pub message_key_is_value_in_default_language: bool,
    /// Fold a nugget's comment into its message key.
    pub message_context_enabled_from_comment: bool,
    /// Comma-separated section types of a delta fragment that get localized.
    pub async_postback_types: String,
    pub nugget: NuggetSyntax,
    pub url_localization: UrlLocalizationSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: DEFAULT_ENVIRONMENT.to_string(),
            default_language: DEFAULT_LANGUAGE.to_string(),
            message_key_is_value_in_default_language: true,
            message_context_enabled_from_comment: false,
            async_postback_types: DEFAULT_ASYNC_POSTBACK_TYPES.to_string(),
            nugget: NuggetSyntax::default(),
            url_localization: UrlLocalizationSettings::default(),
        }
    }
}

/// Delimiters of the nugget token syntax.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NuggetSyntax {
    pub begin_token: String,
    pub end_token: String,
    pub delimiter_token: String,
    pub comment_token: String,
}

impl Default for NuggetSyntax {
    fn default() -> Self {
        Self {
            begin_token: "[[[".to_string(),
            end_token: "]]]".to_string(),
            delimiter_token: "|||".to_string(),
            comment_token: "///".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UrlLocalizationSettings {
    pub enabled: bool,
    /// Regex of URLs never rewritten (static assets by default).
    pub exclusion_pattern: String,
}

impl Default for UrlLocalizationSettings {
    fn default() -> Self {
        Self { enabled: true, exclusion_pattern: DEFAULT_URL_EXCLUSION.to_string() }
    }
}

impl Settings {
    /// Load settings for a workspace; a missing file yields the defaults.
    pub fn load(layout: &Layout) -> Result<Self> {
        let path = layout.settings_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .map_err(|source| CoreError::SettingsRead { path: path.clone(), source })?;
        let settings: Settings = toml_edit::de::from_str(&content)
            .map_err(|source| CoreError::SettingsParse { path: path.clone(), source })?;
        settings.default_language_tag()?;
        Ok(settings)
    }

    pub fn default_language_tag(&self) -> Result<LanguageTag> {
        Ok(LanguageTag::parse(&self.default_language)?)
    }

    /// Section types eligible for localization in a delta fragment.
    pub fn async_postback_types(&self) -> Vec<String> {
        self.async_postback_types
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempdir().unwrap();
        let layout = Layout::new(tmp.path().to_path_buf());
        let settings = Settings::load(&layout).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.default_language_tag().unwrap().to_string(), "en");
    }

    #[test]
    fn parses_partial_toml_over_defaults() {
        let tmp = tempdir().unwrap();
        let layout = Layout::new(tmp.path().to_path_buf());
        layout.ensure().unwrap();
        let mut file = fs::File::create(layout.settings_path()).unwrap();
        writeln!(
            file,
            r#"
environment = "staging"
default_language = "fr_ca"
async_postback_types = "updatePanel, pageTitle,"

[url_localization]
enabled = false
"#
        )
        .unwrap();

        let settings = Settings::load(&layout).unwrap();
        assert_eq!(settings.environment, "staging");
        assert_eq!(settings.default_language_tag().unwrap().to_string(), "fr-CA");
        assert_eq!(settings.async_postback_types(), vec!["updatePanel", "pageTitle"]);
        assert!(!settings.url_localization.enabled);
        assert_eq!(settings.nugget.begin_token, "[[[");
        assert!(settings.message_key_is_value_in_default_language);
    }

    #[test]
    fn rejects_invalid_default_language() {
        let tmp = tempdir().unwrap();
        let layout = Layout::new(tmp.path().to_path_buf());
        layout.ensure().unwrap();
        fs::write(layout.settings_path(), "default_language = \"not a tag\"\n").unwrap();

        let err = Settings::load(&layout).unwrap_err();
        assert!(err.to_string().contains("invalid language tag"), "unexpected error: {err:?}");
    }

    #[test]
    fn rejects_malformed_toml() {
        let tmp = tempdir().unwrap();
        let layout = Layout::new(tmp.path().to_path_buf());
        layout.ensure().unwrap();
        fs::write(layout.settings_path(), "environment = [\n").unwrap();

        let err = Settings::load(&layout).unwrap_err();
        assert!(err.to_string().contains("failed to parse settings"), "unexpected error: {err:?}");
    }
}
