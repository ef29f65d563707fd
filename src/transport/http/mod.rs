use std::pin::Pin;
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::multipart::Form;
use reqwest::{RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::error::{ConfigError, TransportError};

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Server-sent event payloads (`data:` fields) in arrival order.
pub type EventDataStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Single-shot HTTP client. Every call issues exactly one request; there is
/// no retry loop, and failures are returned as classified [`TransportError`]s.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT_MS)
    }

    pub fn with_connect_timeout(connect_timeout_ms: u64) -> Result<Self, ConfigError> {
        validate_timeout(Duration::from_millis(connect_timeout_ms))?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(connect_timeout_ms))
            .build()
            .map_err(|error| ConfigError::ClientBuild {
                reason: error.to_string(),
            })?;

        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn post_json<TReq, TResp>(
        &self,
        url: &str,
        api_key: Option<&str>,
        body: &TReq,
        timeout: Duration,
    ) -> Result<TResp, TransportError>
    where
        TReq: Serialize + ?Sized,
        TResp: DeserializeOwned,
    {
        let response = self
            .send(self.json_request(url, api_key, body, timeout)?, url)
            .await?;
        let response = ensure_success(response, url).await?;
        decode_json(response, url).await
    }

    /// Posts JSON and returns the raw response body, for binary payloads
    /// such as synthesized audio.
    pub async fn post_json_for_bytes<TReq>(
        &self,
        url: &str,
        api_key: Option<&str>,
        body: &TReq,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>
    where
        TReq: Serialize + ?Sized,
    {
        let response = self
            .send(self.json_request(url, api_key, body, timeout)?, url)
            .await?;
        let response = ensure_success(response, url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|error| TransportError::from_reqwest(&error, url))?;
        Ok(bytes.to_vec())
    }

    /// Posts JSON and reports the status code without treating non-2xx as an
    /// error. Used by credential pings that judge the status themselves.
    pub async fn post_json_for_status<TReq>(
        &self,
        url: &str,
        api_key: Option<&str>,
        body: &TReq,
        timeout: Duration,
    ) -> Result<u16, TransportError>
    where
        TReq: Serialize + ?Sized,
    {
        let response = self
            .send(self.json_request(url, api_key, body, timeout)?, url)
            .await?;
        Ok(response.status().as_u16())
    }

    pub async fn post_multipart<TResp>(
        &self,
        url: &str,
        api_key: Option<&str>,
        form: Form,
        timeout: Duration,
    ) -> Result<TResp, TransportError>
    where
        TResp: DeserializeOwned,
    {
        validate_request_timeout(timeout, url)?;
        let request = self
            .client
            .post(url)
            .timeout(timeout)
            .headers(auth_headers(api_key, url)?)
            .multipart(form);

        let response = self.send(request, url).await?;
        let response = ensure_success(response, url).await?;
        decode_json(response, url).await
    }

    /// Posts JSON and yields the `data:` payload of each server-sent event.
    pub async fn post_json_events<TReq>(
        &self,
        url: &str,
        api_key: Option<&str>,
        body: &TReq,
        timeout: Duration,
    ) -> Result<EventDataStream, TransportError>
    where
        TReq: Serialize + ?Sized,
    {
        let response = self
            .send(self.json_request(url, api_key, body, timeout)?, url)
            .await?;
        let response = ensure_success(response, url).await?;

        let owned_url = url.to_string();
        let events = response.bytes_stream().eventsource().map(move |event| {
            event
                .map(|event| event.data)
                .map_err(|error| TransportError::Protocol {
                    url: Some(owned_url.clone()),
                    message: format!("invalid event stream: {error}"),
                })
        });

        Ok(Box::pin(events))
    }

    fn json_request<TReq>(
        &self,
        url: &str,
        api_key: Option<&str>,
        body: &TReq,
        timeout: Duration,
    ) -> Result<RequestBuilder, TransportError>
    where
        TReq: Serialize + ?Sized,
    {
        validate_request_timeout(timeout, url)?;
        let payload = serde_json::to_vec(body).map_err(|error| TransportError::Request {
            url: Some(url.to_string()),
            message: format!("failed to encode request body: {error}"),
        })?;

        Ok(self
            .client
            .post(url)
            .timeout(timeout)
            .headers(auth_headers(api_key, url)?)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(payload))
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, TransportError> {
        tracing::debug!(url, "sending provider request");
        request
            .send()
            .await
            .map_err(|error| TransportError::from_reqwest(&error, url))
    }
}

fn auth_headers(api_key: Option<&str>, url: &str) -> Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();
    if let Some(api_key) = api_key {
        let value = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|error| {
            TransportError::Request {
                url: Some(url.to_string()),
                message: format!("invalid bearer token header value: {error}"),
            }
        })?;
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

async fn ensure_success(response: Response, url: &str) -> Result<Response, TransportError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status_code = response.status().as_u16();
    let message = match response.text().await {
        Ok(body) if !body.trim().is_empty() => body,
        Ok(_) => format!("http status {status_code}"),
        Err(error) => format!("http status {status_code}; failed to read response body: {error}"),
    };

    Err(TransportError::Status {
        url: Some(url.to_string()),
        status_code,
        message,
    })
}

async fn decode_json<TResp>(response: Response, url: &str) -> Result<TResp, TransportError>
where
    TResp: DeserializeOwned,
{
    let body = response
        .bytes()
        .await
        .map_err(|error| TransportError::from_reqwest(&error, url))?;

    serde_json::from_slice(&body).map_err(|error| TransportError::Protocol {
        url: Some(url.to_string()),
        message: format!("failed to decode response body: {error}"),
    })
}

fn validate_timeout(timeout: Duration) -> Result<(), ConfigError> {
    if timeout.is_zero() {
        return Err(ConfigError::InvalidTimeout { timeout_ms: 0 });
    }
    Ok(())
}

fn validate_request_timeout(timeout: Duration, url: &str) -> Result<(), TransportError> {
    validate_timeout(timeout).map_err(|error| TransportError::Request {
        url: Some(url.to_string()),
        message: error.to_string(),
    })
}
