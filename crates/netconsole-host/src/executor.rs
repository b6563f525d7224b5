//! HTTP execution path: one request descriptor in, one normalized outcome
//! out. Ordinary network failure is data, not a panic; the tab controller
//! turns either arm into a REQUEST_COMPLETE.

use async_trait::async_trait;
use netconsole_protocol::{
    flat_pairs_to_headers, AuthorizationDescriptor, BodyPayload, ProtocolError,
    RequestDescriptor, ResponseOutcome,
};
use netconsole_protocol::{OutcomeStatus, ResponseData};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::debug;

use crate::config::ConfigurationManager;

/// Verbs the transport layer accepts. Anything else fails before any network
/// I/O happens.
pub const SUPPORTED_VERBS: &[&str] = &[
    "GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS", "TRACE",
];

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("invalid request header \"{0}\"")]
    Header(String),
    #[error(transparent)]
    Payload(#[from] ProtocolError),
}

#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(
        &self,
        request: &RequestDescriptor,
        authorization: &AuthorizationDescriptor,
    ) -> Result<ResponseOutcome, ExecutorError>;
}

/// Production executor on reqwest.
pub struct HttpExecutor {
    config: Arc<ConfigurationManager>,
}

impl HttpExecutor {
    pub fn new(config: Arc<ConfigurationManager>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn execute(
        &self,
        request: &RequestDescriptor,
        authorization: &AuthorizationDescriptor,
    ) -> Result<ResponseOutcome, ExecutorError> {
        let verb = request.verb.to_ascii_uppercase();
        if !SUPPORTED_VERBS.contains(&verb.as_str()) {
            debug!(event = "invalid_verb", verb = %request.verb);
            return Ok(ResponseOutcome::invalid_verb());
        }
        let method =
            Method::from_bytes(verb.as_bytes()).map_err(|err| ExecutorError::Transport(err.to_string()))?;

        // 4xx/5xx are completed outcomes here, and reqwest agrees: only
        // connection-level problems surface as errors.
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(self.config.snapshot().ignore_https_certificate_errors)
            .build()
            .map_err(|err| ExecutorError::Transport(err.to_string()))?;

        // Last write wins on duplicate names; the ordered list stays the
        // source of truth at the protocol boundary.
        let mut headers = HeaderMap::new();
        for header in &request.headers {
            let name = HeaderName::from_bytes(header.key.as_bytes())
                .map_err(|_| ExecutorError::Header(header.key.clone()))?;
            let value = HeaderValue::from_str(&header.value)
                .map_err(|_| ExecutorError::Header(header.key.clone()))?;
            headers.insert(name, value);
        }

        let mut builder = client.request(method, &request.url).headers(headers);
        builder = match authorization {
            AuthorizationDescriptor::None => builder,
            AuthorizationDescriptor::Basic {
                username, password, ..
            } => builder.basic_auth(username, Some(password)),
            AuthorizationDescriptor::Token { token } => builder.bearer_auth(token),
        };
        if let Some(body) = &request.body {
            if !body.is_empty() {
                // A body on GET rides along like any other verb's.
                builder = builder.body(body.decode()?);
            }
        }

        let started = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|err| ExecutorError::Transport(err.to_string()))?;
        let status = response.status();
        let raw_headers = flatten_response_headers(response.headers());
        let bytes = response
            .bytes()
            .await
            .map_err(|err| ExecutorError::Transport(err.to_string()))?;
        let duration = started.elapsed().as_millis() as u64;

        Ok(ResponseOutcome {
            duration,
            status: OutcomeStatus::Complete,
            response: ResponseData {
                status_code: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                size: bytes.len() as u64,
                body: BodyPayload::from_bytes(&bytes),
                headers: flat_pairs_to_headers(&raw_headers),
            },
        })
    }
}

/// Flattens the transport's header map into the alternating name/value array
/// and back through the positional pairing, so repeated names (Set-Cookie)
/// stay repeated and ordered.
fn flatten_response_headers(headers: &HeaderMap) -> Vec<String> {
    let mut flat = Vec::with_capacity(headers.len() * 2);
    for (name, value) in headers {
        flat.push(name.as_str().to_string());
        flat.push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use netconsole_protocol::HttpHeader;

    #[tokio::test]
    async fn unsupported_verb_fails_without_network_io() {
        let executor = HttpExecutor::new(Arc::new(ConfigurationManager::default()));
        let request = RequestDescriptor {
            name: String::new(),
            description: String::new(),
            verb: "BREW".to_string(),
            // Unroutable on purpose; the verb check must trip first.
            url: "http://192.0.2.1/teapot".to_string(),
            headers: Vec::new(),
            body: None,
        };

        let outcome = executor
            .execute(&request, &AuthorizationDescriptor::None)
            .await
            .expect("failure outcome, not error");
        assert_eq!(outcome.status, OutcomeStatus::ErrorBelowApplicationLayer);
        assert_eq!(outcome.duration, 0);
        assert_eq!(outcome.response.status_text, "E_INVALID_HTTP_VERB");
    }

    #[test]
    fn response_header_flattening_keeps_repeated_names_ordered() {
        let mut headers = HeaderMap::new();
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));
        headers.append("content-type", HeaderValue::from_static("text/plain"));

        let reassembled = flat_pairs_to_headers(&flatten_response_headers(&headers));
        let cookies: Vec<&str> = reassembled
            .iter()
            .filter(|h| h.key == "set-cookie")
            .map(|h| h.value.as_str())
            .collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
        assert!(reassembled.contains(&HttpHeader::new("content-type", "text/plain")));
    }
}
