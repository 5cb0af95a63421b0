use std::{env, path::PathBuf, process};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use i18n_center::{
    LanguageItem, LanguageTag, Settings, TextLocalizer,
    language::{LanguageSource, parse_accept_language},
    serve::{self, ServeArgs, open_cache, resolve_layout},
};
use locale_config::Locale;

const LANG_ENV: &str = "I18N_CENTER_LANG";

#[derive(Parser, Debug)]
#[command(
    name = "i18n-center",
    version,
    about = "Serve localized content from gettext catalogs"
)]
struct Cli {
    /// Override the workspace root directory (fallback env I18N_CENTER_ROOT).
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the localizing HTTP server.
    Serve(ServeArgs),
    /// Resolve one message key and print `language<TAB>text`.
    Lookup(LookupArgs),
    /// List the application languages.
    Languages,
}

#[derive(Args, Debug)]
struct LookupArgs {
    /// Message key (msgid).
    key: String,
    /// Disambiguating comment folded into the key when enabled in settings.
    #[arg(long)]
    comment: Option<String>,
    /// Accept-Language style preference list; defaults to the OS locale.
    #[arg(long, value_name = "TAGS")]
    lang: Option<String>,
    /// Number of match passes to try; omitted means all, with default-language fallback.
    #[arg(long, value_name = "N")]
    max_passes: Option<usize>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve(mut args) => {
            args.root = cli.root;
            serve::run(args).await
        }
        Command::Lookup(args) => lookup(cli.root, args),
        Command::Languages => languages(cli.root),
    }
}

fn lookup(root: Option<PathBuf>, args: LookupArgs) -> Result<()> {
    let layout = resolve_layout(root)?;
    let settings = Settings::load(&layout)?;
    let cache = open_cache(&layout, &settings)?;
    let localizer = TextLocalizer::new(cache, settings.message_context_enabled_from_comment);

    let preferences = match args.lang.as_deref() {
        Some(raw) => parse_accept_language(raw),
        None => system_languages(),
    };
    match localizer.resolve(&args.key, args.comment.as_deref(), &preferences, args.max_passes)? {
        Some(found) => {
            println!("{}\t{}", found.language, found.text);
            Ok(())
        }
        None => {
            eprintln!("no translation found for '{}'", args.key);
            process::exit(1);
        }
    }
}

fn languages(root: Option<PathBuf>) -> Result<()> {
    let layout = resolve_layout(root)?;
    let settings = Settings::load(&layout)?;
    let cache = open_cache(&layout, &settings)?;
    for language in cache.app_languages()?.keys() {
        println!("{language}");
    }
    Ok(())
}

/// Preferences from `I18N_CENTER_LANG`, else the user's OS locale.
fn system_languages() -> Vec<LanguageItem> {
    if let Ok(value) = env::var(LANG_ENV) {
        let items = parse_accept_language(&value);
        if !items.is_empty() {
            return items;
        }
    }

    let mut tags: Vec<LanguageTag> = Vec::new();
    for (_category, range) in Locale::user_default().tags() {
        let raw: &str = range.as_ref();
        // POSIX forms such as `de_DE.UTF-8@euro`.
        let raw = raw.split(['.', '@']).next().unwrap_or(raw);
        if let Ok(tag) = LanguageTag::parse(raw) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }
    tags.into_iter()
        .enumerate()
        .map(|(ordinal, tag)| LanguageItem {
            ordinal,
            ..LanguageItem::new(tag, LanguageSource::AcceptLanguage)
        })
        .collect()
}
