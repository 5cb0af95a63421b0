use std::{fmt, str::FromStr};

use crate::error::CoreError;

/// Normalized language identifier: `lang[-Script][-REGION][-x-private]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LanguageTag {
    language: String,
    script: Option<String>,
    region: Option<String>,
    private_use: Option<String>,
}

impl LanguageTag {
    /// Parse a tag, accepting `_` separators and any letter case.
    ///
    /// Variant and extension subtags are accepted and dropped; only the
    /// language, script, region and private-use parts are kept.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::LanguageTagEmpty);
        }
        let invalid = || CoreError::LanguageTagInvalid { tag: trimmed.to_string() };

        let normalized = trimmed.replace('_', "-");
        let mut subtags = normalized.split('-');

        let language = subtags.next().unwrap_or_default();
        if !(2..=3).contains(&language.len()) || !language.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(invalid());
        }

        let mut tag = LanguageTag {
            language: language.to_ascii_lowercase(),
            script: None,
            region: None,
            private_use: None,
        };

        while let Some(subtag) = subtags.next() {
            if subtag.is_empty()
                || subtag.len() > 8
                || !subtag.chars().all(|c| c.is_ascii_alphanumeric())
            {
                return Err(invalid());
            }
            if subtag.eq_ignore_ascii_case("x") {
                let rest: Vec<&str> = subtags.by_ref().collect();
                if rest.is_empty() || rest.iter().any(|part| part.is_empty()) {
                    return Err(invalid());
                }
                tag.private_use = Some(rest.join("-").to_ascii_lowercase());
                break;
            }
            let alphabetic = subtag.chars().all(|c| c.is_ascii_alphabetic());
            let numeric = subtag.chars().all(|c| c.is_ascii_digit());
            if subtag.len() == 4 && alphabetic && tag.script.is_none() && tag.region.is_none() {
                let mut script = subtag.to_ascii_lowercase();
                script[..1].make_ascii_uppercase();
                tag.script = Some(script);
            } else if tag.region.is_none()
                && ((subtag.len() == 2 && alphabetic) || (subtag.len() == 3 && numeric))
            {
                tag.region = Some(subtag.to_ascii_uppercase());
            }
        }

        Ok(tag)
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn script(&self) -> Option<&str> {
        self.script.as_deref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn private_use(&self) -> Option<&str> {
        self.private_use.as_deref()
    }

    /// Key identifying this language across caches: `lang-<canonical lowercased>`.
    pub fn global_key(&self) -> String {
        format!("lang-{}", self.to_string().to_ascii_lowercase())
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.language)?;
        if let Some(script) = &self.script {
            write!(f, "-{script}")?;
        }
        if let Some(region) = &self.region {
            write!(f, "-{region}")?;
        }
        if let Some(private_use) = &self.private_use {
            write!(f, "-x-{private_use}")?;
        }
        Ok(())
    }
}

impl FromStr for LanguageTag {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LanguageTag::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_case_and_separators() {
        let tag = LanguageTag::parse("zh_hant_tw").unwrap();
        assert_eq!(tag.to_string(), "zh-Hant-TW");
        assert_eq!(tag.language(), "zh");
        assert_eq!(tag.script(), Some("Hant"));
        assert_eq!(tag.region(), Some("TW"));
    }

    #[test]
    fn parses_numeric_region_and_private_use() {
        let tag = LanguageTag::parse("es-419-x-Formal").unwrap();
        assert_eq!(tag.region(), Some("419"));
        assert_eq!(tag.private_use(), Some("formal"));
        assert_eq!(tag.to_string(), "es-419-x-formal");
    }

    #[test]
    fn drops_variants() {
        let tag = LanguageTag::parse("de-DE-1996").unwrap();
        assert_eq!(tag.to_string(), "de-DE");
    }

    #[test]
    fn global_key_is_lowercase() {
        let tag = LanguageTag::parse("pt-BR").unwrap();
        assert_eq!(tag.global_key(), "lang-pt-br");
    }

    #[test]
    fn rejects_malformed_tags() {
        assert!(matches!(LanguageTag::parse(""), Err(CoreError::LanguageTagEmpty)));
        for raw in ["e", "english", "en--US", "en-x", "en US", "1a"] {
            assert!(
                matches!(LanguageTag::parse(raw), Err(CoreError::LanguageTagInvalid { .. })),
                "expected '{raw}' to be rejected"
            );
        }
    }

    #[test]
    fn equality_is_on_canonical_form() {
        let a: LanguageTag = "EN-gb".parse().unwrap();
        let b: LanguageTag = "en_GB".parse().unwrap();
        assert_eq!(a, b);
    }
}
