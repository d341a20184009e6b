// Authority URLs and XHR endpoints.
//
// Everything the session talks to is described here rather than at the
// call sites: the site's bundle changes between deployments, so paths
// must stay overridable from configuration.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;

/// Production front-end of the authority.
pub const DEFAULT_BASE_URL: &str = "https://www.autoentrepreneur.urssaf.fr/";

/// An XHR endpoint: a path appended to the `baseURL` of a bundle feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Feature key in the bundle configuration (`profil`, `mandat`, ...).
    pub feature: String,
    /// Path appended verbatim to that feature's `baseURL`.
    pub path: String,
}

impl Endpoint {
    pub fn new(feature: &str, path: &str) -> Self {
        Self {
            feature: feature.into(),
            path: path.into(),
        }
    }
}

/// The six endpoints of the declaration flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub profile_context: Endpoint,
    pub mandates: Endpoint,
    pub declaration_context: Endpoint,
    pub calculate: Endpoint,
    pub validate: Endpoint,
    pub pay: Endpoint,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            profile_context: Endpoint::new("profil", "/contexte"),
            mandates: Endpoint::new("mandat", "/mandat/lister"),
            declaration_context: Endpoint::new("declaration", "/declaration/contexte"),
            calculate: Endpoint::new("declaration", "/declaration/calculer"),
            validate: Endpoint::new("declaration", "/declaration/valider"),
            pay: Endpoint::new("declaration", "/paiement/sepa"),
        }
    }
}

/// Where the authority lives and how its configuration is discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    /// Site root.
    pub base_url: Url,
    /// Single-page application shell; also the value bound to the
    /// bundle's `location`-derived variable.
    pub services_url: Url,
    /// JS-assignment-wrapped JSON with the runtime configuration.
    pub static_config_url: Url,
    /// Static-config key holding the login API root; the JWKS lives at
    /// `<value>jwks`.
    pub login_api_key: String,
    pub endpoints: Endpoints,
}

impl SiteConfig {
    /// Derive the standard layout from a site root.
    pub fn from_base_url(base_url: Url) -> Result<Self, Error> {
        let services_url = base_url.join("services/")?;
        let static_config_url = services_url.join("assets/config/config.js")?;
        Ok(Self {
            base_url,
            services_url,
            static_config_url,
            login_api_key: "ARCHIMED_LOGIN_API_URL".into(),
            endpoints: Endpoints::default(),
        })
    }

    /// The production authority.
    pub fn production() -> Result<Self, Error> {
        Self::from_base_url(Url::parse(DEFAULT_BASE_URL)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn derives_services_and_config_urls() {
        let site = SiteConfig::production().unwrap();
        assert_eq!(
            site.services_url.as_str(),
            "https://www.autoentrepreneur.urssaf.fr/services/"
        );
        assert_eq!(
            site.static_config_url.as_str(),
            "https://www.autoentrepreneur.urssaf.fr/services/assets/config/config.js"
        );
        assert_eq!(site.endpoints.pay.path, "/paiement/sepa");
    }

    #[test]
    fn partial_endpoint_override_keeps_defaults() {
        let endpoints: Endpoints = serde_json::from_value(serde_json::json!({
            "pay": { "feature": "paiement", "path": "/sepa" }
        }))
        .unwrap();
        assert_eq!(endpoints.pay, Endpoint::new("paiement", "/sepa"));
        assert_eq!(endpoints.validate, Endpoint::new("declaration", "/declaration/valider"));
    }
}
