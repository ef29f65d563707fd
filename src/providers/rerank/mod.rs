use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::core::credentials::Credentials;
use crate::core::error::{
    ConfigError, ErrorMapping, INVOKE_ERROR_MAPPING, InvokeError, TransportError,
    map_transport_error,
};
use crate::core::traits::RerankModel;
use crate::core::types::{
    DEFAULT_RERANK_TOP_N, ModelPropertyKey, ModelSchema, ModelType, RerankDocument,
    RerankRequest, RerankResult,
};
use crate::endpoint::rerank_credentials;
use crate::transport::http::HttpTransport;

pub const RERANK_PATH: &str = "/v1/rerank";

pub const VALIDATION_QUERY: &str = "中国的首都是哪里？";
pub const VALIDATION_DOCS: [&str; 2] = [
    "北京市是中华人民共和国的首都，位于中国华北地区，是全国的政治、文化、国际交往和科技创新中心。北京拥有三千多年建城史，是一座历史悠久的古都。",
    "上海市是中国的经济、金融、贸易和航运中心，位于中国东部沿海，是重要的国际化大都市，但并非首都。",
];
pub const VALIDATION_SCORE_THRESHOLD: f64 = 0.8;

/// Rerank adapter calling the provider's `/v1/rerank` route directly.
#[derive(Debug, Clone)]
pub struct InsigmaRerankAdapter {
    transport: HttpTransport,
}

impl InsigmaRerankAdapter {
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self::with_transport(HttpTransport::new()?))
    }

    pub fn with_transport(transport: HttpTransport) -> Self {
        Self { transport }
    }

    /// Table used for transport failures that are not status errors.
    pub fn invoke_error_mapping(&self) -> &'static [ErrorMapping] {
        INVOKE_ERROR_MAPPING
    }

    fn map_error(&self, error: TransportError) -> InvokeError {
        // Status errors skip the table: any non-2xx from the rerank route is
        // reported as the server being unavailable.
        if error.is_status() {
            return InvokeError::ServerUnavailable(error.to_string());
        }
        map_transport_error(self.invoke_error_mapping(), &error)
    }
}

#[async_trait]
impl RerankModel for InsigmaRerankAdapter {
    async fn invoke(
        &self,
        model: &str,
        credentials: &Credentials,
        request: &RerankRequest,
    ) -> Result<RerankResult, InvokeError> {
        if request.docs.is_empty() {
            return Ok(RerankResult {
                model: model.to_string(),
                docs: Vec::new(),
            });
        }

        let top_n = request.top_n.unwrap_or(DEFAULT_RERANK_TOP_N);
        let model = model.trim();
        let credentials = rerank_credentials(credentials)?;
        let url = format!("{}{RERANK_PATH}", credentials.endpoint_url()?);
        let api_key = credentials.require_api_key()?;
        let timeout = credentials.timeout()?;

        let body = RerankBody {
            model,
            query: &request.query,
            documents: &request.docs,
            top_n,
        };

        tracing::debug!(model, docs = request.docs.len(), top_n, "sending rerank request");
        let response: RerankResponse = self
            .transport
            .post_json(&url, Some(api_key), &body, timeout)
            .await
            .map_err(|error| self.map_error(error))?;

        let mut docs = Vec::with_capacity(response.results.len());
        for item in response.results {
            let text = match item.document {
                Some(document) => document.text,
                None => request.docs.get(item.index).cloned().ok_or_else(|| {
                    InvokeError::ServerUnavailable(format!(
                        "rerank result index {} out of range for {} documents",
                        item.index,
                        request.docs.len()
                    ))
                })?,
            };

            let passes = request
                .score_threshold
                .is_none_or(|threshold| item.relevance_score >= threshold);
            if passes {
                docs.push(RerankDocument {
                    index: item.index,
                    text,
                    score: item.relevance_score,
                });
            }
        }

        Ok(RerankResult {
            model: model.to_string(),
            docs,
        })
    }

    async fn validate_credentials(
        &self,
        model: &str,
        credentials: &Credentials,
    ) -> Result<(), InvokeError> {
        let request = RerankRequest::new(
            VALIDATION_QUERY,
            VALIDATION_DOCS.iter().map(|doc| doc.to_string()).collect(),
        )
        .with_score_threshold(VALIDATION_SCORE_THRESHOLD);

        self.invoke(model, credentials, &request)
            .await
            .map(|_| ())
            .map_err(|error| InvokeError::credentials_invalid(&error))
    }

    fn customizable_model_schema(
        &self,
        model: &str,
        credentials: &Credentials,
    ) -> Result<Option<ModelSchema>, InvokeError> {
        let mut schema = ModelSchema::customizable(model, ModelType::Rerank);
        schema.model_properties.insert(
            ModelPropertyKey::ContextSize,
            json!(credentials.context_size()?),
        );
        Ok(Some(schema))
    }
}

#[derive(Debug, Serialize)]
struct RerankBody<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: u32,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResponseItem>,
}

#[derive(Debug, Deserialize)]
struct RerankResponseItem {
    index: usize,
    relevance_score: f64,
    #[serde(default)]
    document: Option<RerankResponseDocument>,
}

#[derive(Debug, Deserialize)]
struct RerankResponseDocument {
    text: String,
}
