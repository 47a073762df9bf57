use crate::payments::error::{PaymentError, PaymentResult};
use crate::retry::RetryPolicy;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;

/// How a processor request authenticates
#[derive(Debug, Clone, Copy)]
pub enum RequestAuth<'a> {
    None,
    Bearer(&'a str),
    Basic {
        username: &'a str,
        password: &'a str,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum RequestBody<'a> {
    Empty,
    Json(&'a JsonValue),
    /// Pre-encoded JSON, sent byte for byte
    EncodedJson(&'a str),
    /// Pre-encoded `application/x-www-form-urlencoded` payload
    Form(&'a str),
}

/// Structured error body returned by the processor on 4xx/5xx.
///
/// Covers both the REST shape (`name`, `message`, `debug_id`, `details`) and the
/// OAuth shape (`error`, `error_description`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderErrorBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub debug_id: Option<String>,
    #[serde(default)]
    pub details: Vec<ProviderErrorDetail>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderErrorDetail {
    pub issue: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
}

impl ProviderErrorDetail {
    pub fn summary(&self) -> String {
        match &self.description {
            Some(description) => format!("{}: {}", self.issue, description),
            None => self.issue.clone(),
        }
    }
}

#[derive(Clone)]
pub struct PaymentHttpClient {
    client: Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl PaymentHttpClient {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> PaymentResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;

        Ok(Self {
            client,
            timeout,
            retry,
        })
    }

    /// Send a request and decode the JSON response, retrying transient
    /// failures (network errors, 429, 5xx) according to the retry policy.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        auth: RequestAuth<'_>,
        body: RequestBody<'_>,
        additional_headers: &[(&str, &str)],
    ) -> PaymentResult<T> {
        self.retry
            .run(
                "processor_request",
                move |_| self.send_once(method.clone(), url, auth, body, additional_headers),
                PaymentError::is_retryable,
            )
            .await
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        auth: RequestAuth<'_>,
        body: RequestBody<'_>,
        additional_headers: &[(&str, &str)],
    ) -> PaymentResult<T> {
        let mut request = self.client.request(method, url).timeout(self.timeout);

        request = match auth {
            RequestAuth::None => request,
            RequestAuth::Bearer(token) => request.bearer_auth(token),
            RequestAuth::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        };
        for (k, v) in additional_headers {
            request = request.header(*k, *v);
        }
        request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(payload) => request.json(payload),
            RequestBody::EncodedJson(encoded) => request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(encoded.to_string()),
            RequestBody::Form(encoded) => request
                .header(
                    reqwest::header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .body(encoded.to_string()),
        };

        let response = request
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError {
                message: format!("processor request failed: {}", e),
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PaymentError::NetworkError {
                message: format!("failed to read processor response: {}", e),
            })?;

        if status.is_success() {
            return serde_json::from_str::<T>(&text).map_err(|e| PaymentError::ProviderError {
                message: format!("invalid processor JSON response: {}", e),
                provider_code: Some(status.as_u16().to_string()),
                debug_id: None,
                retryable: false,
            });
        }

        Err(classify_failure(status, &text))
    }
}

/// Map a non-success processor response onto a [`PaymentError`]
pub fn classify_failure(status: StatusCode, text: &str) -> PaymentError {
    let body = serde_json::from_str::<ProviderErrorBody>(text).unwrap_or_default();
    let code = Some(status.as_u16().to_string());

    match status.as_u16() {
        401 => PaymentError::AuthenticationFailed {
            message: body
                .error_description
                .or(body.message)
                .unwrap_or_else(|| "unauthorized".to_string()),
        },
        429 => PaymentError::RateLimitError {
            message: "processor rate limit exceeded".to_string(),
            retry_after_seconds: None,
        },
        _ if status.is_server_error() => PaymentError::ProviderError {
            message: format!("HTTP {}", status),
            provider_code: code,
            debug_id: body.debug_id,
            retryable: true,
        },
        _ => match body.name {
            Some(name) => PaymentError::Rejected {
                status: status.as_u16(),
                name,
                message: body.message.unwrap_or_default(),
                debug_id: body.debug_id,
                details: body.details,
            },
            None => PaymentError::ProviderError {
                message: format!("HTTP {}: {}", status, truncate(text, 200)),
                provider_code: code,
                debug_id: None,
                retryable: false,
            },
        },
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_4xx_becomes_rejection() {
        let body = r#"{
            "name": "UNPROCESSABLE_ENTITY",
            "message": "The requested action could not be performed.",
            "debug_id": "abc123",
            "details": [{"issue": "INSTRUMENT_DECLINED", "description": "declined"}]
        }"#;

        match classify_failure(StatusCode::UNPROCESSABLE_ENTITY, body) {
            PaymentError::Rejected {
                status,
                name,
                debug_id,
                details,
                ..
            } => {
                assert_eq!(status, 422);
                assert_eq!(name, "UNPROCESSABLE_ENTITY");
                assert_eq!(debug_id.as_deref(), Some("abc123"));
                assert_eq!(details[0].issue, "INSTRUMENT_DECLINED");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn oauth_401_is_authentication_failure() {
        let body = r#"{"error":"invalid_client","error_description":"Client Authentication failed"}"#;
        let err = classify_failure(StatusCode::UNAUTHORIZED, body);
        assert!(matches!(err, PaymentError::AuthenticationFailed { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn server_errors_are_retryable() {
        let err = classify_failure(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert!(err.is_retryable());
        assert!(classify_failure(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
    }

    #[test]
    fn unstructured_4xx_is_permanent() {
        let err = classify_failure(StatusCode::BAD_REQUEST, "nope");
        assert!(matches!(err, PaymentError::ProviderError { retryable: false, .. }));
    }
}
