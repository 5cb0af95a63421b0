use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Result;
use tracing::{debug, warn};

use super::{MessageTable, TranslationRepository, message_key, normalize_line_endings};
use crate::{error::CoreError, language::LanguageTag, paths::Layout};

/// One translatable entry of a gettext catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoEntry {
    /// Extracted comment (`#.` lines), joined with `\n`.
    pub comment: Option<String>,
    pub context: Option<String>,
    pub msgid: String,
    pub msgstr: String,
}

impl PoEntry {
    /// Disambiguating comment used for key construction: `msgctxt`, else `#.`.
    pub fn key_comment(&self) -> Option<&str> {
        self.context.as_deref().or(self.comment.as_deref())
    }
}

/// Catalogs stored as `<locale_dir>/<tag>/messages.po`.
#[derive(Debug, Clone)]
pub struct PoRepository {
    locale_dir: PathBuf,
    include_comment: bool,
}

impl PoRepository {
    pub fn new(locale_dir: PathBuf, include_comment: bool) -> Self {
        Self { locale_dir, include_comment }
    }

    pub fn from_layout(layout: &Layout, include_comment: bool) -> Self {
        Self::new(layout.locale_dir().to_path_buf(), include_comment)
    }

    /// Language directories paired with their parsed tags.
    fn language_dirs(&self) -> Result<Vec<(LanguageTag, PathBuf)>> {
        let root = &self.locale_dir;
        if !root.exists() {
            return Ok(Vec::new());
        }

        let mut dirs = Vec::new();
        for entry in fs::read_dir(root)
            .map_err(|source| CoreError::ReadDirectory { path: root.clone(), source })?
        {
            let entry =
                entry.map_err(|source| CoreError::ReadDirectory { path: root.clone(), source })?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            match LanguageTag::parse(name) {
                Ok(tag) => dirs.push((tag, path)),
                Err(err) => debug!(dir = %path.display(), error = %err, "skipping non-language directory"),
            }
        }
        dirs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(dirs)
    }

    fn catalog_path(&self, language: &LanguageTag) -> Result<Option<PathBuf>> {
        let direct = self.locale_dir.join(language.to_string()).join(Layout::catalog_filename());
        if direct.is_file() {
            return Ok(Some(direct));
        }
        Ok(self
            .language_dirs()?
            .into_iter()
            .find(|(tag, _)| tag == language)
            .map(|(_, dir)| dir.join(Layout::catalog_filename()))
            .filter(|path| path.is_file()))
    }
}

impl TranslationRepository for PoRepository {
    fn available_languages(&self) -> Result<Vec<LanguageTag>> {
        Ok(self
            .language_dirs()?
            .into_iter()
            .filter(|(_, dir)| dir.join(Layout::catalog_filename()).is_file())
            .map(|(tag, _)| tag)
            .collect())
    }

    fn translation_exists(&self, language: &LanguageTag) -> Result<bool> {
        let Some(path) = self.catalog_path(language)? else {
            return Ok(false);
        };
        let metadata = fs::metadata(&path)
            .map_err(|source| CoreError::CatalogRead { path: path.clone(), source })?;
        Ok(metadata.len() > 0)
    }

    fn translation(&self, language: &LanguageTag) -> Result<MessageTable> {
        let Some(path) = self.catalog_path(language)? else {
            return Ok(MessageTable::new());
        };
        let content = fs::read_to_string(&path)
            .map_err(|source| CoreError::CatalogRead { path: path.clone(), source })?;
        let entries = parse_po(&content, &path)?;

        let mut table = MessageTable::with_capacity(entries.len());
        for entry in entries {
            let key = message_key(&entry.msgid, entry.key_comment(), self.include_comment);
            let key = normalize_line_endings(&key).into_owned();
            if table.insert(key, entry.msgstr).is_some() {
                warn!(
                    language = %language,
                    msgid = %entry.msgid,
                    "duplicate catalog entry, keeping the last one"
                );
            }
        }
        debug!(language = %language, entries = table.len(), path = %path.display(), "catalog loaded");
        Ok(table)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    None,
    Context,
    Id,
    IdPlural,
    Str,
    StrOther,
}

/// Parse a gettext catalog. The header entry and obsolete (`#~`) entries are skipped.
pub fn parse_po(content: &str, path: &Path) -> Result<Vec<PoEntry>, CoreError> {
    let mut entries = Vec::new();
    let mut current = PoEntry::default();
    let mut has_id = false;
    let mut has_str = false;
    let mut field = Field::None;

    let parse_err = |line: usize, reason: &str| CoreError::CatalogParse {
        path: path.to_path_buf(),
        line,
        reason: reason.to_string(),
    };

    let mut finish = |entry: &mut PoEntry, has_id: &mut bool, has_str: &mut bool| {
        if *has_id && !entry.msgid.is_empty() {
            entries.push(std::mem::take(entry));
        } else {
            *entry = PoEntry::default();
        }
        *has_id = false;
        *has_str = false;
    };

    for (index, raw) in content.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();

        if line.is_empty() {
            if has_str {
                finish(&mut current, &mut has_id, &mut has_str);
            }
            field = Field::None;
            continue;
        }

        if line.starts_with("#~") {
            continue;
        }

        if let Some(comment) = line.strip_prefix("#.") {
            if has_str {
                finish(&mut current, &mut has_id, &mut has_str);
            }
            let comment = comment.trim();
            current.comment = Some(match current.comment.take() {
                Some(existing) => format!("{existing}\n{comment}"),
                None => comment.to_string(),
            });
            field = Field::None;
            continue;
        }

        if line.starts_with('#') {
            if has_str {
                finish(&mut current, &mut has_id, &mut has_str);
            }
            field = Field::None;
            continue;
        }

        if line.starts_with('"') {
            let value = unquote(line).ok_or_else(|| parse_err(line_no, "unterminated string"))?;
            match field {
                Field::Context => current.context.get_or_insert_with(String::new).push_str(&value),
                Field::Id => current.msgid.push_str(&value),
                Field::Str => current.msgstr.push_str(&value),
                Field::IdPlural | Field::StrOther => {}
                Field::None => return Err(parse_err(line_no, "string continuation without keyword")),
            }
            continue;
        }

        let (keyword, rest) = line
            .split_once(|c: char| c.is_ascii_whitespace())
            .ok_or_else(|| parse_err(line_no, "expected keyword and string"))?;
        let value =
            unquote(rest.trim()).ok_or_else(|| parse_err(line_no, "unterminated string"))?;

        match keyword {
            "msgctxt" => {
                if has_str {
                    finish(&mut current, &mut has_id, &mut has_str);
                }
                current.context = Some(value);
                field = Field::Context;
            }
            "msgid" => {
                if has_str {
                    finish(&mut current, &mut has_id, &mut has_str);
                }
                current.msgid = value;
                has_id = true;
                field = Field::Id;
            }
            "msgid_plural" => field = Field::IdPlural,
            "msgstr" | "msgstr[0]" => {
                if !has_id {
                    return Err(parse_err(line_no, "msgstr without msgid"));
                }
                current.msgstr = value;
                has_str = true;
                field = Field::Str;
            }
            other if other.starts_with("msgstr[") => field = Field::StrOther,
            _ => return Err(parse_err(line_no, "unknown keyword")),
        }
    }

    if has_str {
        finish(&mut current, &mut has_id, &mut has_str);
    }
    Ok(entries)
}

/// Strip the surrounding quotes of a catalog string and decode C escapes.
///
/// `\u` and other unknown escapes are kept verbatim.
fn unquote(raw: &str) -> Option<String> {
    let inner = raw.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Some(out)
}
