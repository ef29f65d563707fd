use std::sync::Arc;

use async_trait::async_trait;

use crate::core::credentials::Credentials;
use crate::core::error::{ConfigError, InvokeError};
use crate::core::traits::TextEmbeddingModel;
use crate::core::types::{EmbeddingInputType, EmbeddingResult, ModelSchema};
use crate::endpoint::openai_compat_credentials;
use crate::providers::openai_compat::OpenAiCompatClient;

/// Embedding adapter; normalizes the endpoint and defers to the
/// OpenAI-compatible embedding path.
pub struct InsigmaTextEmbeddingAdapter {
    inner: Arc<dyn TextEmbeddingModel>,
}

impl InsigmaTextEmbeddingAdapter {
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self::with_inner(Arc::new(OpenAiCompatClient::new()?)))
    }

    pub fn with_inner(inner: Arc<dyn TextEmbeddingModel>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl TextEmbeddingModel for InsigmaTextEmbeddingAdapter {
    async fn invoke(
        &self,
        model: &str,
        credentials: &Credentials,
        texts: &[String],
        user: Option<&str>,
        input_type: EmbeddingInputType,
    ) -> Result<EmbeddingResult, InvokeError> {
        let compatible = openai_compat_credentials(credentials)?;
        self.inner
            .invoke(model, &compatible, texts, user, input_type)
            .await
    }

    async fn validate_credentials(
        &self,
        model: &str,
        credentials: &Credentials,
    ) -> Result<(), InvokeError> {
        let compatible = openai_compat_credentials(credentials)?;
        self.inner.validate_credentials(model, &compatible).await
    }

    fn customizable_model_schema(
        &self,
        model: &str,
        credentials: &Credentials,
    ) -> Result<Option<ModelSchema>, InvokeError> {
        self.inner.customizable_model_schema(model, credentials)
    }
}
