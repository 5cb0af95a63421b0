use super::LanguageTag;

/// Where a requested language came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageSource {
    UrlPrefix,
    AcceptLanguage,
    Default,
}

/// One entry of a requester's ranked language preferences.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageItem {
    /// `None` for the `*` wildcard.
    pub tag: Option<LanguageTag>,
    pub quality: f32,
    /// Position in the originating header.
    pub ordinal: usize,
    pub source: LanguageSource,
}

impl LanguageItem {
    pub fn new(tag: LanguageTag, source: LanguageSource) -> Self {
        Self { tag: Some(tag), quality: 1.0, ordinal: 0, source }
    }
}

/// Parse an `Accept-Language` header into preference order.
///
/// Items are ordered by quality (descending), then header position. Entries
/// with an unparsable tag or `q=0` are dropped; a malformed `q` counts as 1.
pub fn parse_accept_language(header: &str) -> Vec<LanguageItem> {
    let mut items: Vec<LanguageItem> = header
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .enumerate()
        .filter_map(|(ordinal, part)| {
            let mut components = part.split(';');
            let raw_tag = components.next().unwrap_or_default().trim();
            let tag = if raw_tag == "*" { None } else { Some(LanguageTag::parse(raw_tag).ok()?) };
            let quality = components
                .filter_map(|param| {
                    let (name, value) = param.split_once('=')?;
                    name.trim().eq_ignore_ascii_case("q").then(|| value.trim())
                })
                .next()
                .map(|value| value.parse::<f32>().map(|q| q.clamp(0.0, 1.0)).unwrap_or(1.0))
                .unwrap_or(1.0);
            (quality > 0.0).then_some(LanguageItem {
                tag,
                quality,
                ordinal,
                source: LanguageSource::AcceptLanguage,
            })
        })
        .collect();

    items.sort_by(|a, b| b.quality.total_cmp(&a.quality).then(a.ordinal.cmp(&b.ordinal)));
    items
}
