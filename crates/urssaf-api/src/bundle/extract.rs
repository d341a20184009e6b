// Locating and reducing the configuration object in the bundle.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use super::ExtractError;
use super::braces::{enclosing_opening_brace, matching_braces};
use super::rewrite::{concat_strings, evaluate_parse_int, quote_keys, reduce_ternaries, substitute};
use crate::models::OAuthConfig;

const OAUTH_MARKER: &str = "oauth:";

static SHORTHAND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z_$][\w$]*)\s*=\s*([\w$.]+),").expect("valid regex"));

static LOCATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z_$][\w$]*)\s*=\s*[^,]*\blocation\b[^,]*,").expect("valid regex"));

// ── Static configuration ─────────────────────────────────────────────

/// Parse the JS-assignment-wrapped JSON served as the static configuration.
///
/// Takes the first value starting at the first `{`, tolerating the
/// trailing comma the site leaves before the closing brace.
pub fn parse_static_config(text: &str) -> Result<Map<String, Value>, ExtractError> {
    let start = text.find('{').ok_or_else(|| ExtractError::StaticConfig {
        message: "no object in static configuration".into(),
    })?;
    let cleaned = text[start..]
        .replace(",\n}", "\n}")
        .replace(",\r\n}", "\r\n}");

    let mut values = serde_json::Deserializer::from_str(&cleaned).into_iter::<Value>();
    match values.next() {
        Some(Ok(Value::Object(map))) => Ok(map),
        Some(Ok(other)) => Err(ExtractError::StaticConfig {
            message: format!("expected an object, got {other}"),
        }),
        Some(Err(e)) => Err(ExtractError::StaticConfig {
            message: e.to_string(),
        }),
        None => Err(ExtractError::StaticConfig {
            message: "empty static configuration".into(),
        }),
    }
}

// ── Application shell ────────────────────────────────────────────────

/// Find the unique `main.<hash>.js` script referenced by the application shell.
pub fn find_main_script(html: &str, page_url: &Url) -> Result<Url, ExtractError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("script[src]").map_err(|e| ExtractError::Html {
        message: e.to_string(),
    })?;

    let mut scripts: Vec<Url> = document
        .select(&selector)
        .filter_map(|element| element.value().attr("src"))
        .filter_map(|src| page_url.join(src).ok())
        .filter(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back())
                .is_some_and(|name| name.starts_with("main.") && name.ends_with(".js"))
        })
        .collect();

    match scripts.len() {
        1 => Ok(scripts.remove(0)),
        count => Err(ExtractError::MainScript { count }),
    }
}

// ── Bundle configuration ─────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OAuthSection {
    response_type: String,
    client_id: String,
    redirect_uri: String,
    scope: String,
    login_url: String,
    #[serde(default)]
    token_endpoint: Option<String>,
}

/// Recover the OAuth configuration embedded in the bundle.
///
/// `services_url` is the value bound to the bundle variable computed from
/// `window.location`.
pub fn extract_oauth_config(
    static_config: &Map<String, Value>,
    bundle: &str,
    services_url: &Url,
) -> Result<OAuthConfig, ExtractError> {
    let document = reduce_config_object(static_config, bundle, services_url)?;
    oauth_config_from_document(&document)
}

/// Reduce the object literal enclosing `oauth:` to a JSON document.
pub fn reduce_config_object(
    static_config: &Map<String, Value>,
    bundle: &str,
    services_url: &Url,
) -> Result<Value, ExtractError> {
    let marker = bundle.find(OAUTH_MARKER).ok_or(ExtractError::MissingMarker)?;
    let start = enclosing_opening_brace(bundle, marker)?;
    let object = quote_keys(matching_braces(&bundle[start..])?)?;
    debug!(start, len = object.len(), "located bundle configuration object");

    let alias = config_alias(static_config, &object)?;
    debug!(alias = %alias, "static configuration alias");

    let mut replacements: IndexMap<String, String> = static_config
        .iter()
        .map(|(key, value)| (format!("{alias}.{key}"), js_literal(value)))
        .collect();

    let prelude_start = bundle[..start].rfind(';').map_or(0, |i| i + 1);
    let prelude = &bundle[prelude_start..start];

    let mut locals: IndexMap<String, String> = SHORTHAND_RE
        .captures_iter(prelude)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect();
    locals.shift_remove(&alias);

    let location_vars: Vec<&str> = LOCATION_RE
        .captures_iter(prelude)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    let [location_var] = location_vars[..] else {
        return Err(ExtractError::LocationVariable {
            count: location_vars.len(),
        });
    };
    locals.insert(
        location_var.to_string(),
        Value::String(services_url.to_string()).to_string(),
    );

    for (name, expr) in locals {
        let resolved = replacements.get(&expr).cloned().unwrap_or(expr);
        replacements.insert(name, resolved);
    }

    let text = substitute(&object, &replacements)?;
    let text = evaluate_parse_int(&text)?;
    let text = concat_strings(&text)?;
    let text = reduce_ternaries(&text)?;
    let text = concat_strings(&text)?;

    serde_json::from_str(&text).map_err(|e| ExtractError::Json {
        message: e.to_string(),
        text,
    })
}

/// The identifier most often used as `<identifier>.<static key>` in the object.
///
/// Ties go to the identifier seen first.
fn config_alias(static_config: &Map<String, Value>, object: &str) -> Result<String, ExtractError> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for key in static_config.keys() {
        let pattern = format!(r"([A-Za-z_$][\w$]*)\.{}\b", regex::escape(key));
        let re = Regex::new(&pattern).map_err(|e| ExtractError::StaticConfig {
            message: format!("unusable key {key:?}: {e}"),
        })?;
        for caps in re.captures_iter(object) {
            *counts.entry(caps[1].to_string()).or_default() += 1;
        }
    }

    let mut best: Option<(&String, usize)> = None;
    for (name, &count) in &counts {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((name, count));
        }
    }
    best.map(|(name, _)| name.clone()).ok_or(ExtractError::NoConfigAlias)
}

/// JavaScript source text for a static configuration value.
fn js_literal(value: &Value) -> String {
    value.to_string()
}

fn oauth_config_from_document(document: &Value) -> Result<OAuthConfig, ExtractError> {
    let section = document.get("oauth").ok_or_else(|| ExtractError::OAuthSection {
        message: "no oauth object".into(),
    })?;
    let section = OAuthSection::deserialize(section).map_err(|e| ExtractError::OAuthSection {
        message: e.to_string(),
    })?;

    let base_urls: BTreeMap<String, String> = document
        .as_object()
        .into_iter()
        .flatten()
        .filter_map(|(feature, value)| {
            value
                .get("baseURL")
                .and_then(Value::as_str)
                .map(|url| (feature.clone(), url.to_string()))
        })
        .collect();

    Ok(OAuthConfig {
        response_type: section.response_type,
        client_id: section.client_id,
        redirect_uri: section.redirect_uri,
        scope: section.scope,
        login_url: section.login_url,
        token_endpoint: section.token_endpoint,
        base_urls,
    })
}
