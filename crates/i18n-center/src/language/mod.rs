//! Language tags, requester preferences and match grading.

mod accept;
mod matching;
mod tag;

pub use accept::{LanguageItem, LanguageSource, parse_accept_language};
pub use matching::{DEFAULT_FALLBACK_PASS, MatchGrade, RankedMatch, TextProbe, rank};
pub use tag::LanguageTag;
