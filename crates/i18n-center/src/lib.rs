//! Translation cache, message resolution and response localization.

pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod language;
pub mod nugget;
pub mod paths;
pub mod repository;
pub mod resolver;
pub mod serve;
pub mod url_localizer;

pub use cache::{CachePolicy, TranslationCache};
pub use config::Settings;
pub use error::CoreError;
pub use language::{LanguageItem, LanguageTag};
pub use paths::{Layout, default_root};
pub use resolver::{Resolution, TextLocalizer};

// Web / HTTP 模块
pub mod web {
    pub mod http;
    pub mod localize;
}
