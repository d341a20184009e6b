// Profile context and payment mandates
//
// Both are read-only for the session's lifetime: fetched on first use,
// then served from the session.

use serde_json::{Value, json};
use tracing::debug;

use crate::error::Error;
use crate::models::{Mandate, RawMandateList};
use crate::session::Session;
use crate::transport::Retry;

impl Session {
    /// The account's profile context, the body of most later XHRs.
    pub async fn profile_context(&mut self) -> Result<&Value, Error> {
        let context = match self.profile_context.take() {
            Some(context) => context,
            None => {
                let endpoint = self.site.endpoints.profile_context.clone();
                let url = self.endpoint_url(&endpoint).await?;
                self.transport.post_json(url, &json!({}), Retry::Transient).await?
            }
        };
        Ok(self.profile_context.insert(context))
    }

    /// SEPA mandates registered on the account.
    ///
    /// An empty list is a valid answer: the account has no way to pay.
    pub async fn mandates(&mut self) -> Result<&[Mandate], Error> {
        let mandates = match self.mandates.take() {
            Some(mandates) => mandates,
            None => {
                let body = self.profile_context().await?.clone();
                let endpoint = self.site.endpoints.mandates.clone();
                let url = self.endpoint_url(&endpoint).await?;
                let list: RawMandateList =
                    self.transport.post_json(url, &body, Retry::Transient).await?;
                let mandates: Vec<Mandate> =
                    list.contexte.mandats.into_iter().map(Mandate::from).collect();
                debug!(count = mandates.len(), "fetched mandates");
                mandates
            }
        };
        Ok(self.mandates.insert(mandates))
    }
}
