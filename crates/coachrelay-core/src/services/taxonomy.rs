//! Taxonomy lookup service.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::UpstreamChatBody;
use crate::error::RelayError;
use crate::ports::{UpstreamCall, UpstreamPort, UpstreamReply};
use crate::settings::{API_KEY_ENV, RelaySettings};
use crate::taxonomy::{TAXONOMY_TEMPERATURE, TaxonomyKind, TaxonomyListing};

/// Asks the upstream model for an industry or position list.
///
/// Every upstream problem is absorbed into the built-in fallback lists; the
/// only error surfaced is a missing credential.
#[derive(Debug, Clone)]
pub struct TaxonomyService {
    upstream: Arc<dyn UpstreamPort>,
    settings: Arc<RelaySettings>,
}

impl TaxonomyService {
    pub fn new(upstream: Arc<dyn UpstreamPort>, settings: Arc<RelaySettings>) -> Self {
        Self { upstream, settings }
    }

    pub async fn lookup(&self, kind: &TaxonomyKind) -> Result<TaxonomyListing, RelayError> {
        let api_key = self
            .settings
            .api_key
            .clone()
            .ok_or(RelayError::MissingCredential(API_KEY_ENV))?;

        let body = UpstreamChatBody {
            model: self.settings.default_model.clone(),
            messages: kind.prompt_messages(),
            temperature: TAXONOMY_TEMPERATURE,
            stream: false,
        };
        let deadline = self.settings.request_deadline;
        let call = UpstreamCall::new(api_key, body, deadline);

        // The port enforces the deadline too; this bounds body buffering.
        let reply = match tokio::time::timeout(deadline, self.upstream.send(call)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(failure)) => {
                warn!(?kind, error = %failure, "Taxonomy upstream failed, using fallback");
                return Ok(kind.fallback());
            }
            Err(_) => {
                warn!(?kind, ?deadline, "Taxonomy upstream timed out, using fallback");
                return Ok(kind.fallback());
            }
        };

        let UpstreamReply::Complete { body, .. } = reply else {
            warn!(?kind, "Taxonomy upstream unexpectedly streamed, using fallback");
            return Ok(kind.fallback());
        };

        let listing = reply_content(&body).and_then(|content| kind.listing_from_reply(&content));
        Ok(listing.unwrap_or_else(|| {
            debug!(?kind, "Taxonomy reply held no usable names, using fallback");
            kind.fallback()
        }))
    }
}

// `choices[0].message.content` of an OpenAI-style completion.
fn reply_content(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
}
