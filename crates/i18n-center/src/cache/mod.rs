//! Process-scoped cache of application languages and per-language message tables.
//!
//! Both structures are populate-once, read-many. Readers take a shared lock
//! only long enough to clone an `Arc`; first population of the language set
//! or of any language's table is serialized on a single mutex and re-checks
//! the cache after acquiring it, so each is fetched from the repository at
//! most once between resets.

mod unescape;

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use anyhow::Result;
use tracing::{debug, info};

use crate::{
    config::Settings,
    language::LanguageTag,
    repository::{MessageTable, TranslationRepository, normalize_line_endings},
};

pub use unescape::unescape_code_points;

/// Every language the application serves, keyed by canonical tag.
pub type AppLanguageSet = BTreeMap<String, LanguageTag>;

const APP_LANGUAGES_KEY: &str = "i18n.AppLanguages";

/// Policy knobs of a [`TranslationCache`].
#[derive(Debug, Clone)]
pub struct CachePolicy {
    pub environment: String,
    pub default_language: LanguageTag,
    pub message_key_is_value_in_default_language: bool,
}

impl CachePolicy {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            environment: settings.environment.clone(),
            default_language: settings.default_language_tag()?,
            message_key_is_value_in_default_language: settings
                .message_key_is_value_in_default_language,
        })
    }
}

pub struct TranslationCache {
    policy: CachePolicy,
    repository: Arc<dyn TranslationRepository>,
    app_languages: RwLock<Option<Arc<AppLanguageSet>>>,
    tables: RwLock<HashMap<String, Arc<MessageTable>>>,
    population: Mutex<()>,
}

impl std::fmt::Debug for TranslationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationCache")
            .field("policy", &self.policy)
            .field("tables", &read_lock(&self.tables).len())
            .finish_non_exhaustive()
    }
}

impl TranslationCache {
    pub fn new(policy: CachePolicy, repository: Arc<dyn TranslationRepository>) -> Self {
        Self {
            policy,
            repository,
            app_languages: RwLock::new(None),
            tables: RwLock::new(HashMap::new()),
            population: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn default_language(&self) -> &LanguageTag {
        &self.policy.default_language
    }

    /// Cache key of a language's message table: `{environment}.{global key}`.
    pub fn cache_key_for(&self, language: &LanguageTag) -> String {
        format!("{}.{}", self.policy.environment, language.global_key())
    }

    /// Cache key of the application language set.
    pub fn app_languages_key(&self) -> String {
        format!("{}.{}", self.policy.environment, APP_LANGUAGES_KEY)
    }

    /// The languages the application currently has content for.
    pub fn app_languages(&self) -> Result<Arc<AppLanguageSet>> {
        if let Some(languages) = read_lock(&self.app_languages).as_ref() {
            return Ok(languages.clone());
        }

        let _population = lock(&self.population);
        if let Some(languages) = read_lock(&self.app_languages).as_ref() {
            return Ok(languages.clone());
        }

        let mut candidates = self.repository.available_languages()?;
        let default_language = self.default_language();
        if self.policy.message_key_is_value_in_default_language
            && !candidates.contains(default_language)
        {
            candidates.push(default_language.clone());
        }

        let mut languages = AppLanguageSet::new();
        for language in candidates {
            if self.is_language_valid(&language)? {
                languages.insert(language.to_string(), language);
            } else {
                debug!(language = %language, "dropping language without content");
            }
        }

        let languages = Arc::new(languages);
        *write_lock(&self.app_languages) = Some(languages.clone());
        info!(
            key = %self.app_languages_key(),
            languages = ?languages.keys().collect::<Vec<_>>(),
            "application languages cached"
        );
        Ok(languages)
    }

    /// Load the message table of `language` unless it is already cached.
    ///
    /// Returns `true` when this call fetched the table from the repository.
    pub fn ensure_loaded(&self, language: &LanguageTag) -> Result<bool> {
        let key = self.cache_key_for(language);
        if read_lock(&self.tables).contains_key(&key) {
            return Ok(false);
        }

        let _population = lock(&self.population);
        if read_lock(&self.tables).contains_key(&key) {
            return Ok(false);
        }

        let mut table = self.repository.translation(language)?;
        index_decoded_keys(&mut table);
        let table = Arc::new(table);
        info!(key = %key, entries = table.len(), "message table cached");
        write_lock(&self.tables).insert(key, table);
        Ok(true)
    }

    /// Cached table of `language`, without loading it.
    pub fn cached_table(&self, language: &LanguageTag) -> Option<Arc<MessageTable>> {
        read_lock(&self.tables).get(&self.cache_key_for(language)).cloned()
    }

    /// Table of `language`, loading it on first use.
    pub fn table(&self, language: &LanguageTag) -> Result<Arc<MessageTable>> {
        loop {
            if let Some(table) = self.cached_table(language) {
                return Ok(table);
            }
            // A reset between load and read simply triggers another load.
            self.ensure_loaded(language)?;
        }
    }

    /// Text recorded for `key` in `language`; empty values count as missing.
    ///
    /// A miss on a key containing `\uXXXX` escapes is retried once with the
    /// escapes decoded. Escaped catalog keys are also indexed under their
    /// decoded form when the table is loaded, so literal keys find them.
    pub fn lookup(&self, language: &LanguageTag, key: &str) -> Result<Option<String>> {
        let key = normalize_line_endings(key);
        let table = self.table(language)?;
        if let Some(text) = non_empty(table.get(&*key)) {
            return Ok(Some(text));
        }

        match unescape_code_points(&key) {
            Some(decoded) if decoded.as_str() != &*key => {
                debug!(language = %language, "retrying lookup with decoded escapes");
                Ok(non_empty(table.get(&decoded)))
            }
            _ => Ok(None),
        }
    }

    /// Whether `language` has any content.
    ///
    /// The default language is always valid under the key-is-value policy; a
    /// cached table is taken as proof; otherwise the repository is asked
    /// without loading the full table.
    pub fn is_language_valid(&self, language: &LanguageTag) -> Result<bool> {
        if self.policy.message_key_is_value_in_default_language
            && language == self.default_language()
        {
            return Ok(true);
        }
        if read_lock(&self.tables).contains_key(&self.cache_key_for(language)) {
            return Ok(true);
        }
        self.repository.translation_exists(language)
    }

    /// Discard the language set and every message table of this environment.
    pub fn reset(&self) {
        let _population = lock(&self.population);
        *write_lock(&self.app_languages) = None;
        let dropped = {
            let mut tables = write_lock(&self.tables);
            let dropped = tables.len();
            tables.clear();
            dropped
        };
        info!(environment = %self.policy.environment, tables = dropped, "translation cache reset");
    }
}

/// Add the decoded spelling of every escaped key that has no literal twin.
fn index_decoded_keys(table: &mut MessageTable) {
    let decoded: Vec<(String, String)> = table
        .iter()
        .filter_map(|(key, text)| {
            let literal = unescape_code_points(key)?;
            (literal != *key && !table.contains_key(&literal)).then(|| (literal, text.clone()))
        })
        .collect();
    table.extend(decoded);
}

fn non_empty(text: Option<&String>) -> Option<String> {
    text.filter(|text| !text.is_empty()).cloned()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
