use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::InvokeError;

pub const ENDPOINT_URL_KEY: &str = "endpoint_url";
pub const API_KEY_KEY: &str = "api_key";
pub const TIMEOUT_KEY: &str = "timeout";
pub const CONTEXT_SIZE_KEY: &str = "context_size";
pub const MODE_KEY: &str = "mode";

pub const DEFAULT_TIMEOUT_SECS: f64 = 12.0;
pub const DEFAULT_CONTEXT_SIZE: u32 = 512;

/// Host-supplied credential mapping.
///
/// Values are kept as raw JSON because the host sends form input, so numeric
/// settings may arrive either as numbers or as numeric strings. The type has
/// no in-place mutators: every rewrite returns a new value and the caller's
/// copy stays untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials {
    values: IndexMap<String, Value>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Builder-style setter that consumes `self`; used while assembling a
    /// credential set, never on a borrowed host value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns a non-blank string value for `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    pub fn endpoint_url(&self) -> Result<&str, InvokeError> {
        self.get_str(ENDPOINT_URL_KEY)
            .ok_or_else(|| missing_key_error(ENDPOINT_URL_KEY))
    }

    pub fn api_key(&self) -> Option<&str> {
        self.get_str(API_KEY_KEY)
    }

    pub fn require_api_key(&self) -> Result<&str, InvokeError> {
        self.api_key().ok_or_else(|| missing_key_error(API_KEY_KEY))
    }

    pub fn mode(&self) -> Option<&str> {
        self.get_str(MODE_KEY).map(str::trim)
    }

    /// Request timeout, 12 seconds when unset.
    pub fn timeout(&self) -> Result<Duration, InvokeError> {
        let seconds = match self.values.get(TIMEOUT_KEY) {
            None | Some(Value::Null) => DEFAULT_TIMEOUT_SECS,
            Some(value) => parse_f64(value).ok_or_else(|| invalid_value_error(TIMEOUT_KEY, value))?,
        };

        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(InvokeError::BadRequest(format!(
                "credential {TIMEOUT_KEY} must be a positive number of seconds, got {seconds}"
            )));
        }

        Duration::try_from_secs_f64(seconds).map_err(|_| {
            InvokeError::BadRequest(format!(
                "credential {TIMEOUT_KEY} is out of range, got {seconds}"
            ))
        })
    }

    /// Declared context window, 512 when unset.
    pub fn context_size(&self) -> Result<u32, InvokeError> {
        self.context_size_or(DEFAULT_CONTEXT_SIZE)
    }

    pub fn context_size_or(&self, default: u32) -> Result<u32, InvokeError> {
        match self.values.get(CONTEXT_SIZE_KEY) {
            None | Some(Value::Null) => Ok(default),
            Some(value) => {
                parse_u32(value).ok_or_else(|| invalid_value_error(CONTEXT_SIZE_KEY, value))
            }
        }
    }

    /// Returns a copy with only `endpoint_url` replaced.
    pub fn with_endpoint_url(&self, endpoint_url: impl Into<String>) -> Self {
        let mut values = self.values.clone();
        values.insert(ENDPOINT_URL_KEY.to_string(), Value::String(endpoint_url.into()));
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn parse_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn parse_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => text.trim().parse::<u32>().ok(),
        _ => None,
    }
}

fn missing_key_error(key: &str) -> InvokeError {
    InvokeError::BadRequest(format!("missing required credential: {key}"))
}

fn invalid_value_error(key: &str, value: &Value) -> InvokeError {
    InvokeError::BadRequest(format!("invalid value for credential {key}: {value}"))
}
