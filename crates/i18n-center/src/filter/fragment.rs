//! Partial-update ("delta") response bodies.
//!
//! A fragment is a run of `length|type|id|content|` records where `length`
//! counts the UTF-16 code units of `content`.

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub kind: String,
    pub id: String,
    pub content: String,
}

impl Section {
    pub fn new(kind: impl Into<String>, id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { kind: kind.into(), id: id.into(), content: content.into() }
    }
}

pub fn parse_fragment(text: &str) -> Result<Vec<Section>, CoreError> {
    let mut sections = Vec::new();
    let mut offset = 0;
    while offset < text.len() {
        let (length, next) = field(text, offset)?;
        let length: usize = length
            .trim()
            .parse()
            .map_err(|_| CoreError::FragmentMalformed { offset, reason: "invalid length" })?;
        let (kind, next) = field(text, next)?;
        let (id, next) = field(text, next)?;
        let end = advance_utf16(text, next, length)?;
        if text.as_bytes().get(end) != Some(&b'|') {
            return Err(CoreError::FragmentMalformed {
                offset: end,
                reason: "content not terminated",
            });
        }
        sections.push(Section::new(kind, id, &text[next..end]));
        offset = end + 1;
    }
    Ok(sections)
}

pub fn serialize_fragment(sections: &[Section]) -> String {
    sections
        .iter()
        .map(|section| {
            let length = section.content.encode_utf16().count();
            format!("{length}|{}|{}|{}|", section.kind, section.id, section.content)
        })
        .collect()
}

/// Field starting at `start`, up to the next separator.
fn field(text: &str, start: usize) -> Result<(&str, usize), CoreError> {
    let end = text[start..]
        .find('|')
        .map(|pos| start + pos)
        .ok_or(CoreError::FragmentMalformed { offset: start, reason: "missing separator" })?;
    Ok((&text[start..end], end + 1))
}

/// Byte offset reached after `units` UTF-16 code units from `start`.
fn advance_utf16(text: &str, start: usize, units: usize) -> Result<usize, CoreError> {
    let mut consumed = 0;
    let mut end = start;
    for ch in text[start..].chars() {
        if consumed >= units {
            break;
        }
        consumed += ch.len_utf16();
        end += ch.len_utf8();
    }
    if consumed != units {
        return Err(CoreError::FragmentMalformed { offset: start, reason: "length out of range" });
    }
    Ok(end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_records_in_order() {
        let text = "5|updatePanel|p1|hello|0|hiddenField|__VIEWSTATE||9|pageTitle||Home page|";
        let sections = parse_fragment(text).unwrap();
        assert_eq!(
            sections,
            vec![
                Section::new("updatePanel", "p1", "hello"),
                Section::new("hiddenField", "__VIEWSTATE", ""),
                Section::new("pageTitle", "", "Home page"),
            ]
        );
    }

    #[test]
    fn content_may_contain_separators() {
        let sections = parse_fragment("7|updatePanel|p|a|b|c|d|").unwrap();
        assert_eq!(sections[0].content, "a|b|c|d");
    }

    #[test]
    fn lengths_count_utf16_units() {
        let sections = vec![Section::new("updatePanel", "p", "café 😀")];
        let text = serialize_fragment(&sections);
        assert_eq!(text, "7|updatePanel|p|café 😀|");
        assert_eq!(parse_fragment(&text).unwrap(), sections);
    }

    #[test]
    fn serializes_records_back_to_back() {
        assert_eq!(serialize_fragment(&[]), "");
        let sections = [
            Section::new("updatePanel", "p1", "hello"),
            Section::new("hiddenField", "__VIEWSTATE", ""),
        ];
        assert_eq!(serialize_fragment(&sections), "5|updatePanel|p1|hello|0|hiddenField|__VIEWSTATE||");
    }

    #[test]
    fn rejects_malformed_fragments() {
        for text in ["<html>", "x|updatePanel|p|a|", "9|updatePanel|p|short|", "3|t|i|abcd|"] {
            let err = parse_fragment(text).unwrap_err();
            assert_eq!(err.code(), "fragment_malformed", "{text}");
        }
    }
}
