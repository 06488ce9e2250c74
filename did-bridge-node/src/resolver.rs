//! JSON-RPC DID resolution over HTTP.
//!
//! The resolver endpoint takes
//! `{"id": .., "method": "resolvedid", "params": {"did": .., "all": ..}}`
//! and answers with the resolution result. A non-200 answer means the
//! endpoint has nothing for the DID; a transport failure is a network error.

use std::time::Duration;

use did_bridge_core::provider::{ProviderError, ProviderResult};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;

#[derive(Serialize)]
struct ResolveRequest<'a> {
    id: &'a str,
    method: &'static str,
    params: ResolveParams<'a>,
}

#[derive(Serialize)]
struct ResolveParams<'a> {
    did: &'a str,
    all: bool,
}

/// HTTP client for one resolver endpoint.
#[derive(Debug, Clone)]
pub struct HttpResolver {
    client: Client,
    url: String,
}

impl HttpResolver {
    /// Creates a resolver for `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// The endpoint this resolver talks to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Resolves `did`, returning the endpoint's JSON answer.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The request cannot be sent or the connection drops
    /// - The endpoint answers 200 with a body that is not JSON
    pub async fn resolve(&self, request_id: &str, did: &str, all: bool) -> ProviderResult<Option<Value>> {
        debug!(url = %self.url, did, all, "Resolving DID");

        let request = ResolveRequest {
            id: request_id,
            method: "resolvedid",
            params: ResolveParams { did, all },
        };
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if response.status() != StatusCode::OK {
            debug!(status = %response.status(), did, "Resolver has no answer");
            return Ok(None);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| ProviderError::Failed(format!("malformed resolver response: {e}")))
    }
}
