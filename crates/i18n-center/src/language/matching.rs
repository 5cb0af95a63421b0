use anyhow::Result;

use super::{LanguageItem, LanguageTag};

/// Quality of a match between a requested and an available language, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchGrade {
    /// Identical tags.
    Exact = 0,
    /// Same language and script, one side carries no region (`en-GB` ~ `en`).
    DefaultRegion = 1,
    /// Same language and the same explicit script, regions may differ.
    ScriptMatch = 2,
    /// Same primary language subtag.
    LanguageMatch = 3,
}

impl MatchGrade {
    pub const MAX: MatchGrade = MatchGrade::LanguageMatch;
    pub const ALL: [MatchGrade; 4] = [
        MatchGrade::Exact,
        MatchGrade::DefaultRegion,
        MatchGrade::ScriptMatch,
        MatchGrade::LanguageMatch,
    ];

    pub fn from_pass(pass: usize) -> Option<MatchGrade> {
        Self::ALL.get(pass).copied()
    }
}

/// Pass index of the implicit default-language fallback that follows every grade.
pub const DEFAULT_FALLBACK_PASS: usize = MatchGrade::MAX as usize + 1;

impl LanguageTag {
    /// Whether `self` and `other` are compatible at the given grade.
    pub fn matches(&self, other: &LanguageTag, grade: MatchGrade) -> bool {
        match grade {
            MatchGrade::Exact => self == other,
            MatchGrade::DefaultRegion => {
                self.language() == other.language()
                    && self.script() == other.script()
                    && (self.region().is_none() || other.region().is_none())
            }
            MatchGrade::ScriptMatch => {
                self.language() == other.language()
                    && self.script().is_some()
                    && self.script() == other.script()
            }
            MatchGrade::LanguageMatch => self.language() == other.language(),
        }
    }
}

/// Existence oracle consulted by [`rank`].
pub trait TextProbe {
    /// Text recorded for `key` in `language`, or `None` when there is none.
    ///
    /// With `key == None` the question is whether the language has any
    /// content at all; an existing language answers `Some` (text unspecified).
    fn text_for(&self, language: &LanguageTag, key: Option<&str>) -> Result<Option<String>>;
}

/// Outcome of a successful [`rank`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedMatch {
    pub language: LanguageTag,
    /// Resolved text; `None` when ranking ran without a key.
    pub text: Option<String>,
    pub grade: MatchGrade,
}

/// Pick the best available language for the requester's preferences.
///
/// Passes run from [`MatchGrade::Exact`] up to `max_grade`; within a pass the
/// requester's items are tried in slice order and the available languages in
/// iteration order. The first pairing that matches at the pass grade and for
/// which `probe` finds text wins. Wildcard items never match.
pub fn rank<'a, I>(
    requested: &[LanguageItem],
    available: I,
    key: Option<&str>,
    probe: &dyn TextProbe,
    max_grade: MatchGrade,
) -> Result<Option<RankedMatch>>
where
    I: IntoIterator<Item = &'a LanguageTag>,
    I::IntoIter: Clone,
{
    let available = available.into_iter();
    for grade in MatchGrade::ALL.into_iter().filter(|grade| *grade <= max_grade) {
        for item in requested {
            let Some(wanted) = item.tag.as_ref() else {
                continue;
            };
            for candidate in available.clone() {
                if !wanted.matches(candidate, grade) {
                    continue;
                }
                if let Some(text) = probe.text_for(candidate, key)? {
                    return Ok(Some(RankedMatch {
                        language: candidate.clone(),
                        text: key.map(|_| text),
                        grade,
                    }));
                }
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        collections::{HashMap, HashSet},
    };

    use super::*;
    use crate::language::{LanguageSource, parse_accept_language};

    fn tag(raw: &str) -> LanguageTag {
        LanguageTag::parse(raw).unwrap()
    }

    fn items(raw: &[&str]) -> Vec<LanguageItem> {
        raw.iter().map(|raw| LanguageItem::new(tag(raw), LanguageSource::AcceptLanguage)).collect()
    }

    #[derive(Default)]
    struct MapProbe {
        texts: HashMap<(String, String), String>,
        languages: HashSet<String>,
        calls: RefCell<Vec<String>>,
    }

    impl MapProbe {
        fn with(mut self, lang: &str, key: &str, text: &str) -> Self {
            self.languages.insert(tag(lang).to_string());
            self.texts.insert((tag(lang).to_string(), key.to_string()), text.to_string());
            self
        }
    }

    impl TextProbe for MapProbe {
        fn text_for(&self, language: &LanguageTag, key: Option<&str>) -> Result<Option<String>> {
            self.calls.borrow_mut().push(language.to_string());
            Ok(match key {
                None => self.languages.contains(&language.to_string()).then(String::new),
                Some(key) => self.texts.get(&(language.to_string(), key.to_string())).cloned(),
            })
        }
    }

    #[test]
    fn grade_semantics() {
        assert!(tag("en-GB").matches(&tag("en"), MatchGrade::DefaultRegion));
        assert!(!tag("en-GB").matches(&tag("en-US"), MatchGrade::DefaultRegion));
        assert!(tag("zh-Hant-TW").matches(&tag("zh-Hant-HK"), MatchGrade::ScriptMatch));
        assert!(!tag("zh-Hant-TW").matches(&tag("zh-Hans-CN"), MatchGrade::ScriptMatch));
        assert!(!tag("pt-BR").matches(&tag("pt-PT"), MatchGrade::ScriptMatch));
        assert!(tag("pt-BR").matches(&tag("pt-PT"), MatchGrade::LanguageMatch));
        assert!(!tag("pt-BR").matches(&tag("pt-PT"), MatchGrade::Exact));
        assert_eq!(MatchGrade::from_pass(DEFAULT_FALLBACK_PASS), None);
    }

    #[test]
    fn exact_pass_wins_over_earlier_preference_with_weaker_grade() {
        let app = [tag("fr"), tag("fr-CA")];
        let probe = MapProbe::default().with("fr", "hi", "salut").with("fr-CA", "hi", "allo");

        let found = rank(&items(&["fr-CA", "fr"]), app.iter(), Some("hi"), &probe, MatchGrade::MAX)
            .unwrap()
            .unwrap();
        assert_eq!(found.language, tag("fr-CA"));
        assert_eq!(found.text.as_deref(), Some("allo"));
        assert_eq!(found.grade, MatchGrade::Exact);
    }

    #[test]
    fn falls_through_to_language_match() {
        let app = [tag("pt-PT")];
        let probe = MapProbe::default().with("pt-PT", "hi", "olá");

        let found = rank(&items(&["pt-BR"]), app.iter(), Some("hi"), &probe, MatchGrade::MAX)
            .unwrap()
            .unwrap();
        assert_eq!(found.grade, MatchGrade::LanguageMatch);

        let capped =
            rank(&items(&["pt-BR"]), app.iter(), Some("hi"), &probe, MatchGrade::ScriptMatch)
                .unwrap();
        assert!(capped.is_none());
    }

    #[test]
    fn skips_languages_missing_the_key() {
        let app = [tag("de"), tag("fr")];
        let probe = MapProbe::default().with("de", "other", "x").with("fr", "hi", "salut");

        let found = rank(&items(&["de", "fr"]), app.iter(), Some("hi"), &probe, MatchGrade::MAX)
            .unwrap()
            .unwrap();
        assert_eq!(found.language, tag("fr"));
    }

    #[test]
    fn wildcards_never_match() {
        let app = [tag("en")];
        let probe = MapProbe::default().with("en", "hi", "hello");
        let requested = parse_accept_language("*");

        let found = rank(&requested, app.iter(), Some("hi"), &probe, MatchGrade::MAX).unwrap();
        assert!(found.is_none());
        assert!(probe.calls.borrow().is_empty());
    }

    #[test]
    fn keyless_rank_reports_language_only() {
        let app = [tag("en"), tag("es")];
        let probe = MapProbe::default().with("es", "hi", "hola");

        let found =
            rank(&items(&["es-MX"]), app.iter(), None, &probe, MatchGrade::MAX).unwrap().unwrap();
        assert_eq!(found.language, tag("es"));
        assert_eq!(found.text, None);
        assert_eq!(found.grade, MatchGrade::DefaultRegion);
    }
}
