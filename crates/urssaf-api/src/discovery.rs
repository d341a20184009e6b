// Runtime configuration discovery
//
// The static config (plain JSON behind a JS assignment) and the OAuth
// settings buried in the main bundle are fetched once per session.
// The bundle itself is large and changes per deployment: it is never
// cached.

use serde_json::{Map, Value};
use tracing::{debug, info};
use url::Url;

use crate::bundle::{self, ExtractError};
use crate::error::Error;
use crate::models::OAuthConfig;
use crate::session::Session;
use crate::transport::Retry;

impl Session {
    /// The site's static configuration, fetched on first use.
    pub async fn static_config(&mut self) -> Result<&Map<String, Value>, Error> {
        let config = match self.static_config.take() {
            Some(config) => config,
            None => {
                let (text, _) = self.get_text(self.site.static_config_url.clone()).await?;
                let config = bundle::parse_static_config(&text)?;
                debug!(keys = config.len(), "loaded static configuration");
                config
            }
        };
        Ok(self.static_config.insert(config))
    }

    /// Download the application's main bundle.
    pub async fn fetch_bundle(&self) -> Result<String, Error> {
        let (shell, shell_url) = self.get_text(self.site.services_url.clone()).await?;
        let script_url = bundle::find_main_script(&shell, &shell_url)?;
        debug!("main bundle at {}", script_url);
        let (text, _) = self.get_text(script_url).await?;
        Ok(text)
    }

    /// OAuth and feature configuration, extracted on first use.
    pub async fn oauth_config(&mut self) -> Result<&OAuthConfig, Error> {
        let config = match self.oauth.take() {
            Some(config) => config,
            None => {
                let static_config = self.static_config().await?.clone();
                let bundle = self.fetch_bundle().await?;
                let config =
                    bundle::extract_oauth_config(&static_config, &bundle, &self.site.services_url)?;
                info!(
                    flow = %config.response_type,
                    features = config.base_urls.len(),
                    "extracted site configuration"
                );
                config
            }
        };
        Ok(self.oauth.insert(config))
    }

    /// URL of the authority's JSON Web Key Set.
    pub(crate) async fn jwks_url(&mut self) -> Result<Url, Error> {
        let key = self.site.login_api_key.clone();
        let root = self
            .static_config()
            .await?
            .get(&key)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| ExtractError::StaticConfig {
                message: format!("no {key} entry"),
            })?;
        Ok(self.site.base_url.join(&format!("{root}jwks"))?)
    }

    /// GET a text resource, returning it with the final URL after redirects.
    async fn get_text(&self, url: Url) -> Result<(String, Url), Error> {
        let resp = self
            .transport
            .request(self.transport.http().get(url), Retry::Transient)
            .await?;
        let final_url = resp.url().clone();
        Ok((resp.text().await?, final_url))
    }
}
