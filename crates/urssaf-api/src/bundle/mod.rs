// Configuration extraction from the authority's JavaScript bundle.
//
// The site ships its OAuth settings inside a minified object literal in
// `main.<hash>.js`. This module recovers it with a small tokenizer and a
// chain of text rewrites, each one a separate function:
//
//   quote_keys → substitute → evaluate_parse_int → concat_strings
//   → reduce_ternaries → concat_strings → serde_json
//
// Nothing here performs I/O; `Session` fetches the texts and calls
// `extract_oauth_config`.

pub mod braces;
pub mod extract;
pub mod rewrite;
mod tokens;

use thiserror::Error;

pub use extract::{extract_oauth_config, find_main_script, parse_static_config};

/// Structural failure while recovering configuration from the site.
///
/// All of these mean the site changed shape upstream. None is retried.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("expected exactly one main script in the application shell, found {count}")]
    MainScript { count: usize },

    #[error("static configuration is malformed: {message}")]
    StaticConfig { message: String },

    #[error("`oauth:` marker not found in the bundle")]
    MissingMarker,

    #[error("unbalanced braces: {message}")]
    UnbalancedBraces { message: &'static str },

    #[error("no identifier references the static configuration")]
    NoConfigAlias,

    #[error("expected exactly one location-derived variable, found {count}")]
    LocationVariable { count: usize },

    #[error("unterminated string literal at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("template literal with interpolation at offset {offset}")]
    TemplateLiteral { offset: usize },

    #[error("cannot evaluate parseInt({args})")]
    ParseInt { args: String },

    #[error("cannot reduce ternary: {message}")]
    Ternary { message: String },

    #[error("unresolved identifier {name:?}")]
    UnresolvedIdentifier { name: String },

    #[error("reduced configuration is not valid JSON: {message}")]
    Json { message: String, text: String },

    #[error("oauth section is incomplete: {message}")]
    OAuthSection { message: String },

    #[error("bundle configuration has no baseURL for feature {feature:?}")]
    MissingFeature { feature: String },

    #[error("unexpected HTML: {message}")]
    Html { message: String },
}
