//! Buffering writer that localizes a response body once it is complete.

pub mod fragment;

use std::{
    fmt,
    io::{self, Write},
    sync::Arc,
};

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};
use tracing::{debug, warn};

use crate::{
    error::CoreError,
    language::{LanguageItem, LanguageTag},
    nugget::NuggetProcessor,
    url_localizer::{RequestContext, UrlProcessor},
};

pub use fragment::{Section, parse_fragment, serialize_fragment};

const GZIP_SIGNATURE: [u8; 2] = [0x1F, 0x8B];

/// Everything a filter needs to know about the response it localizes.
#[derive(Clone)]
pub struct FilterContext {
    /// Requester's languages, best first.
    pub languages: Vec<LanguageItem>,
    pub principal: LanguageTag,
    pub request: RequestContext,
    pub encoding: &'static Encoding,
    /// The body is a partial-update fragment.
    pub partial_update: bool,
    /// Fragment section types whose content gets localized.
    pub async_postback_types: Vec<String>,
    pub nuggets: Option<Arc<dyn NuggetProcessor>>,
    pub urls: Option<Arc<dyn UrlProcessor>>,
}

impl FilterContext {
    pub fn new(languages: Vec<LanguageItem>, principal: LanguageTag) -> Self {
        Self {
            languages,
            principal,
            request: RequestContext::default(),
            encoding: UTF_8,
            partial_update: false,
            async_postback_types: Vec::new(),
            nuggets: None,
            urls: None,
        }
    }

    /// Use the encoding named by a `charset` label; unknown labels keep UTF-8.
    pub fn with_charset(mut self, label: Option<&str>) -> Self {
        if let Some(encoding) = label.and_then(|label| Encoding::for_label(label.trim().as_bytes()))
        {
            self.encoding = encoding;
        }
        self
    }
}

impl fmt::Debug for FilterContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterContext")
            .field("principal", &self.principal)
            .field("request", &self.request)
            .field("encoding", &self.encoding.name())
            .field("partial_update", &self.partial_update)
            .field("nuggets", &self.nuggets.is_some())
            .field("urls", &self.urls.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    Buffering,
    CompressedPassthrough,
    Flushed,
}

/// Wraps the downstream writer of one response.
///
/// Text bodies are held back until [`ResponseFilter::complete`]; a body whose
/// first bytes carry the gzip signature is forwarded untouched.
pub struct ResponseFilter<W: Write> {
    inner: W,
    context: FilterContext,
    buffer: Vec<u8>,
    state: FilterState,
}

impl<W: Write> ResponseFilter<W> {
    pub fn new(inner: W, context: FilterContext) -> Self {
        Self { inner, context, buffer: Vec::new(), state: FilterState::Buffering }
    }

    pub fn state(&self) -> FilterState {
        self.state
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn write(&mut self, data: &[u8]) -> io::Result<()> {
        match self.state {
            FilterState::Flushed => Err(CoreError::ResponseAlreadyFlushed.into()),
            FilterState::CompressedPassthrough => self.inner.write_all(data),
            FilterState::Buffering => {
                if self.buffer.is_empty() && data.starts_with(&GZIP_SIGNATURE) {
                    debug!("compressed body detected, passing through");
                    self.state = FilterState::CompressedPassthrough;
                    return self.inner.write_all(data);
                }
                self.buffer.extend_from_slice(data);
                Ok(())
            }
        }
    }

    /// Localize the buffered body and hand it downstream.
    ///
    /// Calling it again once flushed does nothing.
    pub fn complete(&mut self) -> io::Result<()> {
        match self.state {
            FilterState::Flushed => Ok(()),
            FilterState::CompressedPassthrough => self.inner.flush(),
            FilterState::Buffering => {
                let buffer = std::mem::take(&mut self.buffer);
                let (text, malformed) =
                    self.context.encoding.decode_without_bom_handling(&buffer);
                if malformed {
                    warn!(encoding = self.context.encoding.name(), "body has malformed sequences");
                }
                let text = text.into_owned();
                drop(buffer);

                let text = self.localize(text).map_err(io::Error::other)?;
                self.inner.write_all(&encode(self.context.encoding, &text))?;
                self.inner.flush()?;
                self.state = FilterState::Flushed;
                Ok(())
            }
        }
    }

    fn localize(&self, text: String) -> anyhow::Result<String> {
        let context = &self.context;
        let text = match &context.nuggets {
            Some(nuggets) if context.partial_update && !first_line_blank(&text) => {
                self.localize_fragment(nuggets.as_ref(), text)?
            }
            Some(nuggets) => nuggets.process(&text, &context.languages)?,
            None => text,
        };
        match &context.urls {
            Some(urls) => urls.process(&text, &context.principal, &context.request),
            None => Ok(text),
        }
    }

    fn localize_fragment(
        &self,
        nuggets: &dyn NuggetProcessor,
        text: String,
    ) -> anyhow::Result<String> {
        let context = &self.context;
        let mut sections = match parse_fragment(&text) {
            Ok(sections) => sections,
            Err(err) => {
                warn!(error = %err, "partial update is not a delta fragment, localizing whole body");
                return nuggets.process(&text, &context.languages);
            }
        };
        for section in sections
            .iter_mut()
            .filter(|section| context.async_postback_types.iter().any(|kind| *kind == section.kind))
        {
            section.content = nuggets.process(&section.content, &context.languages)?;
        }
        Ok(serialize_fragment(&sections))
    }
}

impl<W: Write> Write for ResponseFilter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        ResponseFilter::write(self, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.complete()
    }
}

/// Encode `text` back into the body's own encoding.
///
/// `Encoding::encode` emits UTF-8 for the UTF-16 family, so those are written
/// out code unit by code unit.
fn encode(encoding: &'static Encoding, text: &str) -> Vec<u8> {
    if encoding == UTF_16LE {
        text.encode_utf16().flat_map(u16::to_le_bytes).collect()
    } else if encoding == UTF_16BE {
        text.encode_utf16().flat_map(u16::to_be_bytes).collect()
    } else {
        encoding.encode(text).0.into_owned()
    }
}

fn first_line_blank(text: &str) -> bool {
    text.lines().next().is_none_or(|line| line.trim().is_empty())
}
