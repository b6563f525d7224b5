use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// One request header. Headers are an ordered list and duplicate keys are
/// legal, so this never collapses into a map at the protocol boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpHeader {
    pub key: String,
    pub value: String,
}

impl HttpHeader {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Opaque binary payload, base64 text at the boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BodyPayload {
    pub content: String,
}

impl BodyPayload {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            content: STANDARD.encode(bytes),
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>, ProtocolError> {
        STANDARD
            .decode(&self.content)
            .map_err(|err| ProtocolError::Base64(err.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub verb: String,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<HttpHeader>,
    #[serde(default)]
    pub body: Option<BodyPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthorizationDescriptor {
    None,
    #[serde(rename_all = "camelCase")]
    Basic {
        username: String,
        password: String,
        #[serde(default)]
        show_password: bool,
    },
    Token {
        token: String,
    },
}

impl Default for AuthorizationDescriptor {
    fn default() -> Self {
        Self::None
    }
}

/// Transport-level disposition of an executed request. HTTP-level failures
/// (4xx/5xx) are still `Complete`; only failures below the application layer
/// get their own tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Complete,
    ErrorBelowApplicationLayer,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseData {
    pub status_code: u16,
    pub status_text: String,
    pub size: u64,
    pub body: BodyPayload,
    pub headers: Vec<HttpHeader>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseOutcome {
    pub duration: u64,
    pub status: OutcomeStatus,
    pub response: ResponseData,
}

impl ResponseOutcome {
    /// Failure outcome for a verb the transport does not support. No network
    /// I/O happened, so the duration is zero.
    pub fn invalid_verb() -> Self {
        Self {
            duration: 0,
            status: OutcomeStatus::ErrorBelowApplicationLayer,
            response: ResponseData {
                status_code: 0,
                status_text: "E_INVALID_HTTP_VERB".to_string(),
                size: 0,
                body: BodyPayload::default(),
                headers: Vec::new(),
            },
        }
    }

    /// Synthetic outcome answered immediately when an execute-request targets
    /// a websocket URL. The socket may still be connecting.
    pub fn websocket_upgrade() -> Self {
        Self {
            duration: 0,
            status: OutcomeStatus::Complete,
            response: ResponseData {
                status_code: 101,
                status_text: "Switching Protocols".to_string(),
                size: 0,
                body: BodyPayload::default(),
                headers: Vec::new(),
            },
        }
    }
}

/// Flattens an ordered header list into the alternating name/value array used
/// by raw transport APIs. Index pairs stay positional so repeated names
/// survive the trip.
pub fn headers_to_flat_pairs(headers: &[HttpHeader]) -> Vec<String> {
    let mut flat = Vec::with_capacity(headers.len() * 2);
    for header in headers {
        flat.push(header.key.clone());
        flat.push(header.value.clone());
    }
    flat
}

/// Reassembles the alternating name/value array into an ordered header list.
/// A trailing name with no value slot is dropped.
pub fn flat_pairs_to_headers(pairs: &[String]) -> Vec<HttpHeader> {
    pairs
        .chunks_exact(2)
        .map(|pair| HttpHeader::new(pair[0].clone(), pair[1].clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_payload_round_trips_binary_content() {
        let raw: Vec<u8> = (0u8..=255).collect();
        let body = BodyPayload::from_bytes(&raw);
        assert_eq!(body.decode().expect("decode"), raw);
    }

    #[test]
    fn body_payload_rejects_invalid_base64() {
        let body = BodyPayload {
            content: "not valid base64!!!".to_string(),
        };
        assert!(matches!(body.decode(), Err(ProtocolError::Base64(_))));
    }

    #[test]
    fn flat_pairs_preserve_repeated_header_names_in_order() {
        let headers = vec![
            HttpHeader::new("Content-Type", "text/html"),
            HttpHeader::new("Set-Cookie", "a=1"),
            HttpHeader::new("Set-Cookie", "b=2"),
            HttpHeader::new("set-cookie", "c=3"),
        ];
        let flat = headers_to_flat_pairs(&headers);
        assert_eq!(flat.len(), 8);
        assert_eq!(flat_pairs_to_headers(&flat), headers);
    }

    #[test]
    fn flat_pairs_drop_dangling_trailing_name() {
        let pairs = vec!["Host".to_string(), "example".to_string(), "Orphan".to_string()];
        let headers = flat_pairs_to_headers(&pairs);
        assert_eq!(headers, vec![HttpHeader::new("Host", "example")]);
    }

    #[test]
    fn invalid_verb_outcome_has_no_duration_and_distinct_status() {
        let outcome = ResponseOutcome::invalid_verb();
        assert_eq!(outcome.duration, 0);
        assert_eq!(outcome.status, OutcomeStatus::ErrorBelowApplicationLayer);
        assert_eq!(outcome.response.status_text, "E_INVALID_HTTP_VERB");
    }

    #[test]
    fn websocket_upgrade_outcome_reports_101() {
        let outcome = ResponseOutcome::websocket_upgrade();
        assert_eq!(outcome.status, OutcomeStatus::Complete);
        assert_eq!(outcome.response.status_code, 101);
    }

    #[test]
    fn authorization_uses_lowercase_type_tags() {
        let basic = AuthorizationDescriptor::Basic {
            username: "ada".to_string(),
            password: "hunter2".to_string(),
            show_password: false,
        };
        let value = serde_json::to_value(&basic).expect("serialize");
        assert_eq!(value["type"], "basic");
        assert_eq!(value["showPassword"], false);

        let none: AuthorizationDescriptor =
            serde_json::from_str(r#"{"type":"none"}"#).expect("parse");
        assert_eq!(none, AuthorizationDescriptor::None);
    }
}
