mod settings;

pub use settings::{NuggetSyntax, Settings, UrlLocalizationSettings};
